use chrono::{Duration, Utc};
use recommendation_service::config::RecommendationConfig;
use recommendation_service::models::{
    Category, CategoryFilter, ContentMetadata, ExcludeSet, FeedRequest, InteractionType, Language,
};
use recommendation_service::services::{CandidateStrategy, FetchRequest};
use recommendation_service::{FeedComposer, InMemoryStore, StrategySet};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const REGULAR_CATEGORIES: [&str; 3] = ["FOOD", "TRAVEL", "DAILY"];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Fixture {
    store: Arc<InMemoryStore>,
    categories: HashMap<Uuid, Category>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            categories: HashMap::new(),
        }
    }

    fn add(&mut self, category: &str, age_days: i64) -> Uuid {
        let content_id = Uuid::new_v4();
        let category = Category::parse(category).unwrap();
        self.store.insert_content(ContentMetadata {
            content_id,
            category: category.clone(),
            language: Language::new("ko"),
            created_at: Utc::now() - Duration::days(age_days),
        });
        self.categories.insert(content_id, category);
        content_id
    }

    /// 60 regular items and 20 FUN items with varied age and engagement
    fn populated() -> Self {
        let mut fixture = Self::new();
        for i in 0..60 {
            let id = fixture.add(REGULAR_CATEGORIES[i % 3], (i % 40) as i64);
            fixture.store.record_views(id, (i * 7 % 50) as u64);
        }
        for i in 0..20 {
            let id = fixture.add("FUN", (i % 30) as i64);
            fixture.store.record_views(id, (i * 3 % 20) as u64);
        }
        fixture
    }

    fn like(&self, user: Uuid, content: Uuid, interaction_type: InteractionType) {
        self.store
            .record_interaction(user, content, interaction_type, Utc::now());
    }

    fn composer(&self) -> FeedComposer {
        FeedComposer::from_stores(
            self.store.clone(),
            self.store.clone(),
            RecommendationConfig::default(),
        )
        .unwrap()
    }

    fn is_fun(&self, id: &Uuid) -> bool {
        self.categories[id] == Category::fun()
    }
}

fn feed_request(user_id: Uuid, limit: i32) -> FeedRequest {
    FeedRequest {
        user_id,
        limit,
        ..Default::default()
    }
}

fn assert_unique(feed: &[Uuid]) {
    let unique: HashSet<&Uuid> = feed.iter().collect();
    assert_eq!(unique.len(), feed.len(), "duplicate ids in {:?}", feed);
}

#[tokio::test]
async fn test_feed_has_no_duplicates_respects_exclusions_and_limit() {
    init_tracing();
    let fixture = Fixture::populated();
    let ids: Vec<Uuid> = fixture.categories.keys().copied().collect();

    // a handful of users with overlapping histories
    let users: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
    for (u, user) in users.iter().enumerate() {
        for (i, content) in ids.iter().enumerate().skip(u * 3).take(12) {
            let kind = match i % 3 {
                0 => InteractionType::Like,
                1 => InteractionType::Save,
                _ => InteractionType::Share,
            };
            fixture.like(*user, *content, kind);
        }
    }

    let composer = fixture.composer();
    for (round, limit) in [1, 3, 7, 10, 25, 50].into_iter().enumerate() {
        let mut request = feed_request(users[round % users.len()], limit);
        request.exclude_ids = ids.iter().copied().skip(round * 5).take(10).collect();

        let feed = composer.compose(&request).await.unwrap();

        assert!(feed.len() <= limit as usize);
        assert_unique(&feed);
        assert!(feed.iter().all(|id| !request.exclude_ids.contains(id)));
    }
}

#[tokio::test]
async fn test_collaborative_ranking_follows_interaction_weight() {
    init_tracing();
    let mut fixture = Fixture::new();
    let c1 = fixture.add("DAILY", 2);
    let c2 = fixture.add("DAILY", 2);
    let c3 = fixture.add("DAILY", 2);

    let user = Uuid::new_v4();
    let sharer = Uuid::new_v4();
    let liker = Uuid::new_v4();
    fixture.like(user, c1, InteractionType::Like);
    fixture.like(sharer, c1, InteractionType::Like);
    fixture.like(sharer, c2, InteractionType::Share);
    fixture.like(liker, c1, InteractionType::Like);
    fixture.like(liker, c3, InteractionType::Like);

    let strategies = StrategySet::from_stores(
        fixture.store.clone(),
        fixture.store.clone(),
        &RecommendationConfig::default(),
    );
    let exclude = ExcludeSet::new();
    let request = FetchRequest {
        user_id: user,
        limit: 2,
        exclude: &exclude,
        filter: &CategoryFilter::Any,
        language: None,
    };

    let result = strategies.collaborative.fetch(&request).await.unwrap();
    assert_eq!(result, vec![c2, c3]);
}

#[tokio::test]
async fn test_cold_start_user_gets_a_full_feed() {
    init_tracing();
    let fixture = Fixture::populated();
    let composer = fixture.composer();

    let (feed, stats) = composer
        .compose_with_stats(&feed_request(Uuid::new_v4(), 20))
        .await
        .unwrap();

    assert_eq!(feed.len(), 20);
    assert_unique(&feed);
    assert!(stats.failed_strategies.is_empty());
    // the collaborative slot is served by the popularity fallback
    assert!(stats.collaborative_count > 0);
}

#[tokio::test]
async fn test_category_feed_only_contains_that_category() {
    init_tracing();
    let fixture = Fixture::populated();
    let composer = fixture.composer();

    let mut request = feed_request(Uuid::new_v4(), 15);
    request.category = Some("fun".to_string());
    let feed = composer.compose(&request).await.unwrap();

    assert_eq!(feed.len(), 15);
    assert!(feed.iter().all(|id| fixture.is_fun(id)));

    request.category = Some("TRAVEL".to_string());
    let feed = composer.compose(&request).await.unwrap();
    assert!(!feed.is_empty());
    assert!(feed
        .iter()
        .all(|id| fixture.categories[id].as_str() == "TRAVEL"));
}

#[tokio::test]
async fn test_main_feed_interleaves_one_fun_in_five() {
    init_tracing();
    let fixture = Fixture::populated();
    let composer = fixture.composer();

    let (mut fun, mut total) = (0usize, 0usize);
    for _ in 0..20 {
        let feed = composer
            .compose(&feed_request(Uuid::new_v4(), 10))
            .await
            .unwrap();

        assert_eq!(feed.len(), 10);
        assert_unique(&feed);
        // positions 5 and 10 carry the FUN items
        assert!(fixture.is_fun(&feed[4]));
        assert!(fixture.is_fun(&feed[9]));

        fun += feed.iter().filter(|id| fixture.is_fun(id)).count();
        total += feed.len();
    }

    let ratio = fun as f64 / total as f64;
    assert!((ratio - 0.2).abs() < 0.05, "FUN ratio was {}", ratio);
}

#[tokio::test]
async fn test_exhausted_personalisation_degrades_gracefully() {
    init_tracing();
    let mut fixture = Fixture::populated();
    let user = Uuid::new_v4();
    let neighbor = Uuid::new_v4();
    let seen = fixture.add("FOOD", 1);
    let recommended = fixture.add("FOOD", 1);
    fixture.like(user, seen, InteractionType::Like);
    fixture.like(neighbor, seen, InteractionType::Like);
    fixture.like(neighbor, recommended, InteractionType::Share);

    let composer = fixture.composer();
    let mut request = feed_request(user, 10);
    request.exclude_ids = [seen, recommended].into_iter().collect();

    let feed = composer.compose(&request).await.unwrap();

    assert_eq!(feed.len(), 10);
    assert_unique(&feed);
    assert!(!feed.contains(&seen));
    assert!(!feed.contains(&recommended));
}

#[tokio::test]
async fn test_invalid_requests_are_rejected_before_fetching() {
    let fixture = Fixture::populated();
    let composer = fixture.composer();

    let err = composer
        .compose(&feed_request(Uuid::new_v4(), -1))
        .await
        .unwrap_err();
    assert!(err.is_client_error());

    let mut request = feed_request(Uuid::new_v4(), 10);
    request.category = Some("FUN; DROP".to_string());
    let err = composer.compose(&request).await.unwrap_err();
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_empty_catalog_returns_empty_feed() {
    let fixture = Fixture::new();
    let composer = fixture.composer();

    let feed = composer
        .compose(&feed_request(Uuid::new_v4(), 10))
        .await
        .unwrap();
    assert!(feed.is_empty());
}

#[tokio::test]
async fn test_main_feed_without_discovery_content_keeps_the_regular_share() {
    init_tracing();
    let mut fixture = Fixture::new();
    for i in 0..40 {
        let id = fixture.add(REGULAR_CATEGORIES[i % 3], i as i64);
        fixture.store.record_views(id, i as u64);
    }
    let composer = fixture.composer();

    let (feed, stats) = composer
        .compose_with_stats(&feed_request(Uuid::new_v4(), 10))
        .await
        .unwrap();

    // round(10 * 0.2) discovery slots stay empty
    assert_eq!(feed.len(), 8);
    assert_unique(&feed);
    assert!(feed.iter().all(|id| !fixture.is_fun(id)));
    assert_eq!(stats.discovery_count, 0);
}
