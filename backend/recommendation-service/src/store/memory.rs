use super::{ContentCatalog, ContentOrder, ContentQuery, InteractionStore};
use crate::error::Result;
use crate::models::{ContentMetadata, InteractionType, PopularityCounts, UserInteraction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::seq::SliceRandom;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// In-process interaction store and content catalog.
///
/// Backs tests and embedders that already hold their data in memory.
/// Popularity counters are derived from recorded interactions plus
/// explicitly recorded views.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    content: DashMap<Uuid, ContentMetadata>,
    user_interactions: DashMap<Uuid, Vec<UserInteraction>>,
    content_users: DashMap<Uuid, HashSet<Uuid>>,
    popularity: DashMap<Uuid, PopularityCounts>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_content(&self, meta: ContentMetadata) {
        self.content.insert(meta.content_id, meta);
    }

    pub fn record_interaction(
        &self,
        user_id: Uuid,
        content_id: Uuid,
        interaction_type: InteractionType,
        occurred_at: DateTime<Utc>,
    ) {
        self.user_interactions
            .entry(user_id)
            .or_default()
            .push(UserInteraction {
                content_id,
                interaction_type,
                occurred_at,
            });
        self.content_users
            .entry(content_id)
            .or_default()
            .insert(user_id);

        let mut counts = self.popularity.entry(content_id).or_default();
        match interaction_type {
            InteractionType::Like => counts.likes += 1,
            InteractionType::Save => counts.saves += 1,
            InteractionType::Share => counts.shares += 1,
            InteractionType::Comment => counts.comments += 1,
        }
    }

    pub fn record_views(&self, content_id: Uuid, views: u64) {
        self.popularity.entry(content_id).or_default().views += views;
    }

    fn popularity_score(&self, content_id: &Uuid) -> f64 {
        self.popularity
            .get(content_id)
            .map(|counts| counts.score())
            .unwrap_or(0.0)
    }
}

#[async_trait]
impl InteractionStore for InMemoryStore {
    async fn interactions_of(&self, user_id: Uuid) -> Result<Vec<UserInteraction>> {
        let mut interactions = self
            .user_interactions
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        interactions.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(interactions)
    }

    async fn users_who_interacted_with(&self, content_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .content_users
            .get(&content_id)
            .map(|entry| entry.value().iter().copied().collect())
            .unwrap_or_default())
    }

    async fn popularity_of(&self, content_ids: &[Uuid]) -> Result<HashMap<Uuid, PopularityCounts>> {
        Ok(content_ids
            .iter()
            .filter_map(|id| self.popularity.get(id).map(|counts| (*id, *counts.value())))
            .collect())
    }
}

#[async_trait]
impl ContentCatalog for InMemoryStore {
    async fn metadata_of(&self, content_ids: &[Uuid]) -> Result<Vec<ContentMetadata>> {
        Ok(content_ids
            .iter()
            .filter_map(|id| self.content.get(id).map(|meta| meta.value().clone()))
            .collect())
    }

    async fn query(&self, query: &ContentQuery) -> Result<Vec<ContentMetadata>> {
        let mut eligible: Vec<ContentMetadata> = self
            .content
            .iter()
            .filter(|entry| query.accepts(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        let newest_first = |a: &ContentMetadata, b: &ContentMetadata| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.content_id.cmp(&b.content_id))
        };

        match query.order {
            ContentOrder::Newest => eligible.sort_by(newest_first),
            ContentOrder::MostPopular => {
                let scores: HashMap<Uuid, f64> = eligible
                    .iter()
                    .map(|meta| (meta.content_id, self.popularity_score(&meta.content_id)))
                    .collect();
                eligible.sort_by(|a, b| {
                    scores[&b.content_id]
                        .partial_cmp(&scores[&a.content_id])
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| newest_first(a, b))
                });
            }
            ContentOrder::Random => eligible.shuffle(&mut rand::thread_rng()),
        }
        eligible.truncate(query.limit);

        Ok(eligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, CategoryFilter, Language};
    use chrono::Duration;

    fn meta(category: &str, age_days: i64) -> ContentMetadata {
        ContentMetadata {
            content_id: Uuid::new_v4(),
            category: Category::parse(category).unwrap(),
            language: Language::new("ko"),
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[tokio::test]
    async fn test_query_orders_newest_first_and_filters() {
        let store = InMemoryStore::new();
        let old = meta("FOOD", 10);
        let fresh = meta("FOOD", 1);
        let fun = meta("FUN", 0);
        store.insert_content(old.clone());
        store.insert_content(fresh.clone());
        store.insert_content(fun.clone());

        let query = ContentQuery {
            filter: CategoryFilter::Exclude(Category::fun()),
            limit: 10,
            ..Default::default()
        };
        let result = store.query(&query).await.unwrap();
        let ids: Vec<Uuid> = result.iter().map(|m| m.content_id).collect();
        assert_eq!(ids, vec![fresh.content_id, old.content_id]);

        let mut exclude = HashSet::new();
        exclude.insert(fresh.content_id);
        let query = ContentQuery::new(&CategoryFilter::Any, &exclude, 1);
        let result = store.query(&query).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].content_id, fun.content_id);
    }

    #[tokio::test]
    async fn test_popular_order_reaches_past_the_newest_items() {
        let store = InMemoryStore::new();
        let viral = meta("FOOD", 30);
        store.insert_content(viral.clone());
        store.record_views(viral.content_id, 1_000_000);
        for age in 0..20 {
            let item = meta("FOOD", age);
            store.insert_content(item.clone());
            store.record_views(item.content_id, 1);
        }

        let newest = store
            .query(&ContentQuery::new(&CategoryFilter::Any, &HashSet::new(), 5))
            .await
            .unwrap();
        assert!(newest.iter().all(|m| m.content_id != viral.content_id));

        let popular = store
            .query(
                &ContentQuery::new(&CategoryFilter::Any, &HashSet::new(), 5)
                    .ordered_by(ContentOrder::MostPopular),
            )
            .await
            .unwrap();
        assert_eq!(popular.len(), 5);
        assert_eq!(popular[0].content_id, viral.content_id);
    }

    #[tokio::test]
    async fn test_random_order_draws_from_the_whole_eligible_set() {
        let store = InMemoryStore::new();
        let oldest = meta("FOOD", 100);
        store.insert_content(oldest.clone());
        for age in 0..9 {
            store.insert_content(meta("FOOD", age));
        }

        let query = ContentQuery::new(&CategoryFilter::Any, &HashSet::new(), 3)
            .ordered_by(ContentOrder::Random);
        let mut drawn_oldest = false;
        for _ in 0..200 {
            let sample = store.query(&query).await.unwrap();
            assert_eq!(sample.len(), 3);
            drawn_oldest |= sample.iter().any(|m| m.content_id == oldest.content_id);
        }
        // P(never drawn in 200 rounds) = 0.7^200
        assert!(drawn_oldest);
    }

    #[test]
    fn test_metadata_batch_skips_unknown_ids() {
        let store = InMemoryStore::new();
        let known = meta("FUN", 0);
        store.insert_content(known.clone());

        let result =
            tokio_test::block_on(store.metadata_of(&[Uuid::new_v4(), known.content_id])).unwrap();
        assert_eq!(result, vec![known]);
    }

    #[tokio::test]
    async fn test_interactions_feed_popularity_and_reverse_lookup() {
        let store = InMemoryStore::new();
        let content = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store.record_interaction(alice, content, InteractionType::Like, Utc::now());
        store.record_interaction(bob, content, InteractionType::Share, Utc::now());
        store.record_interaction(bob, content, InteractionType::Comment, Utc::now());
        store.record_views(content, 12);

        let users = store.users_who_interacted_with(content).await.unwrap();
        assert_eq!(users.len(), 2);

        let popularity = store.popularity_of(&[content, Uuid::new_v4()]).await.unwrap();
        assert_eq!(popularity.len(), 1);
        let counts = popularity[&content];
        assert_eq!((counts.views, counts.likes, counts.shares, counts.comments), (12, 1, 1, 1));

        let bob_history = store.interactions_of(bob).await.unwrap();
        assert_eq!(bob_history.len(), 2);
        assert!(store.interactions_of(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
