use super::{ContentCatalog, ContentOrder, ContentQuery, InteractionStore};
use crate::error::Result;
use crate::models::{
    Category, CategoryFilter, ContentMetadata, InteractionType, Language, PopularityCounts,
    UserInteraction,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// Redis key prefixes
const USER_INTERACTIONS_KEY: &str = "interactions:user:";
const CONTENT_USERS_KEY: &str = "interactions:content:";
const POPULARITY_KEY: &str = "popularity:";
const CONTENT_KEY: &str = "content:";
const CONTENT_RECENT_KEY: &str = "content:recent";
const CONTENT_POPULAR_KEY: &str = "content:popular";
const CONTENT_CATEGORY_KEY: &str = "content:category:";
const POPULAR_SUFFIX: &str = ":popular";

/// Members scanned per round trip when paging eligible content
const QUERY_PAGE_SIZE: isize = 200;
/// Hard stop for a single eligibility scan
const MAX_SCANNED_ITEMS: isize = 10_000;

/// Interaction store and content catalog backed by Redis.
///
/// Layout:
/// - `interactions:user:{user_id}` -> ZSET of `{content_id}:{TYPE}` (score = unix secs)
/// - `interactions:content:{content_id}` -> SET of user ids
/// - `popularity:{content_id}` -> HASH views/likes/comments/saves/shares
/// - `content:{content_id}` -> HASH category/language/created_at
/// - `content:recent`, `content:category:{CATEGORY}` -> ZSET of content ids (score = created_at)
/// - `content:popular`, `content:category:{CATEGORY}:popular` -> ZSET of content ids
///   (score = popularity score)
///
/// All calls share one auto-reconnecting multiplexed connection.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(manager))
    }

    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Walk a listing in score order until `limit` eligible items are found.
    async fn scan(&self, key: &str, query: &ContentQuery) -> Result<Vec<ContentMetadata>> {
        let mut eligible = Vec::with_capacity(query.limit.min(MAX_SCANNED_ITEMS as usize));
        let mut offset: isize = 0;

        while eligible.len() < query.limit && offset < MAX_SCANNED_ITEMS {
            let page: Vec<String> = self
                .connection()
                .zrevrange(key, offset, offset + QUERY_PAGE_SIZE - 1)
                .await?;
            if page.is_empty() {
                break;
            }
            offset += page.len() as isize;

            for meta in self.metadata_of(&eligible_ids(&page, query)).await? {
                if query.accepts(&meta) {
                    eligible.push(meta);
                    if eligible.len() >= query.limit {
                        break;
                    }
                }
            }
        }

        debug!(
            key = %key,
            scanned = offset,
            eligible = eligible.len(),
            "Content query completed"
        );

        Ok(eligible)
    }

    /// Distinct random members of a listing, filtered to eligible content.
    async fn sample(&self, key: &str, query: &ContentQuery) -> Result<Vec<ContentMetadata>> {
        let count = random_draw_size(query.limit, query.exclude.len());
        let drawn: Vec<String> = redis::cmd("ZRANDMEMBER")
            .arg(key)
            .arg(count)
            .query_async(&mut self.connection())
            .await?;

        let mut eligible: Vec<ContentMetadata> = self
            .metadata_of(&eligible_ids(&drawn, query))
            .await?
            .into_iter()
            .filter(|meta| query.accepts(meta))
            .collect();
        eligible.truncate(query.limit);

        debug!(
            key = %key,
            drawn = drawn.len(),
            eligible = eligible.len(),
            "Random content sample completed"
        );

        Ok(eligible)
    }
}

fn user_interactions_key(user_id: Uuid) -> String {
    format!("{}{}", USER_INTERACTIONS_KEY, user_id)
}

fn content_users_key(content_id: Uuid) -> String {
    format!("{}{}", CONTENT_USERS_KEY, content_id)
}

fn popularity_key(content_id: Uuid) -> String {
    format!("{}{}", POPULARITY_KEY, content_id)
}

fn content_key(content_id: Uuid) -> String {
    format!("{}{}", CONTENT_KEY, content_id)
}

fn listing_key(filter: &CategoryFilter, order: ContentOrder) -> String {
    match (filter, order) {
        (CategoryFilter::Only(category), ContentOrder::MostPopular) => {
            format!("{}{}{}", CONTENT_CATEGORY_KEY, category, POPULAR_SUFFIX)
        }
        (CategoryFilter::Only(category), _) => format!("{}{}", CONTENT_CATEGORY_KEY, category),
        (_, ContentOrder::MostPopular) => CONTENT_POPULAR_KEY.to_string(),
        _ => CONTENT_RECENT_KEY.to_string(),
    }
}

/// Members to draw so that exclusions and the category filter still leave
/// `limit` eligible items in the common case.
fn random_draw_size(limit: usize, excluded: usize) -> isize {
    let wanted = limit.saturating_add(excluded).saturating_mul(2);
    wanted.min(MAX_SCANNED_ITEMS as usize) as isize
}

fn eligible_ids(members: &[String], query: &ContentQuery) -> Vec<Uuid> {
    members
        .iter()
        .filter_map(|m| Uuid::parse_str(m).ok())
        .filter(|id| !query.exclude.contains(id))
        .collect()
}

/// Parse a `{content_id}:{TYPE}` member of the user interaction set.
fn parse_interaction_member(member: &str, score: f64) -> Option<UserInteraction> {
    let (content_id, interaction_type) = member.rsplit_once(':')?;
    Some(UserInteraction {
        content_id: Uuid::parse_str(content_id).ok()?,
        interaction_type: interaction_type.parse().ok()?,
        occurred_at: DateTime::from_timestamp(score as i64, 0)?,
    })
}

fn parse_metadata(content_id: Uuid, fields: &HashMap<String, String>) -> Option<ContentMetadata> {
    let category = Category::parse(fields.get("category")?).ok()?;
    let language = Language::new(fields.get("language")?);
    let created_at: i64 = fields.get("created_at")?.parse().ok()?;

    Some(ContentMetadata {
        content_id,
        category,
        language,
        created_at: DateTime::<Utc>::from_timestamp(created_at, 0)?,
    })
}

fn parse_counts(fields: &HashMap<String, String>) -> PopularityCounts {
    let field = |name: &str| {
        fields
            .get(name)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
    };

    PopularityCounts {
        views: field("views"),
        likes: field("likes"),
        comments: field("comments"),
        saves: field("saves"),
        shares: field("shares"),
    }
}

#[async_trait]
impl InteractionStore for RedisStore {
    async fn interactions_of(&self, user_id: Uuid) -> Result<Vec<UserInteraction>> {
        let mut conn = self.connection();

        let members: Vec<(String, f64)> = conn
            .zrevrange_withscores(user_interactions_key(user_id), 0, -1)
            .await?;

        let interactions = members
            .into_iter()
            .filter_map(|(member, score)| {
                let parsed = parse_interaction_member(&member, score);
                if parsed.is_none() {
                    warn!(user_id = %user_id, member = %member, "Skipping malformed interaction");
                }
                parsed
            })
            .collect();

        Ok(interactions)
    }

    async fn users_who_interacted_with(&self, content_id: Uuid) -> Result<Vec<Uuid>> {
        let mut conn = self.connection();

        let members: Vec<String> = conn.smembers(content_users_key(content_id)).await?;

        Ok(members
            .iter()
            .filter_map(|m| Uuid::parse_str(m).ok())
            .collect())
    }

    async fn popularity_of(&self, content_ids: &[Uuid]) -> Result<HashMap<Uuid, PopularityCounts>> {
        if content_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = self.connection();
        let mut pipe = redis::pipe();
        for id in content_ids {
            pipe.hgetall(popularity_key(*id));
        }
        let rows: Vec<HashMap<String, String>> = pipe.query_async(&mut conn).await?;

        Ok(content_ids
            .iter()
            .zip(rows)
            .filter(|(_, fields)| !fields.is_empty())
            .map(|(id, fields)| (*id, parse_counts(&fields)))
            .collect())
    }
}

#[async_trait]
impl ContentCatalog for RedisStore {
    async fn metadata_of(&self, content_ids: &[Uuid]) -> Result<Vec<ContentMetadata>> {
        if content_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.connection();
        let mut pipe = redis::pipe();
        for id in content_ids {
            pipe.hgetall(content_key(*id));
        }
        let rows: Vec<HashMap<String, String>> = pipe.query_async(&mut conn).await?;

        Ok(content_ids
            .iter()
            .zip(rows)
            .filter_map(|(id, fields)| {
                if fields.is_empty() {
                    return None;
                }
                let parsed = parse_metadata(*id, &fields);
                if parsed.is_none() {
                    warn!(content_id = %id, "Skipping malformed content metadata");
                }
                parsed
            })
            .collect())
    }

    async fn query(&self, query: &ContentQuery) -> Result<Vec<ContentMetadata>> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let key = listing_key(&query.filter, query.order);
        match query.order {
            ContentOrder::Random => self.sample(&key, query).await,
            ContentOrder::Newest | ContentOrder::MostPopular => self.scan(&key, query).await,
        }
    }
}
