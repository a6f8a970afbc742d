use super::{CandidateStrategy, FetchRequest, ScoreAdjustment};
use crate::error::Result;
use crate::models::{ContentMetadata, Strategy};
use crate::store::{ContentCatalog, ContentOrder, ContentQuery, InteractionStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Popularity ranking
///
/// Score = views×1 + likes×5 + comments×3 + saves×7 + shares×10,
/// multiplied by the score adjustment (language preference). The pool is
/// the catalog's most popular eligible content, re-ranked after adjustment.
pub struct PopularStrategy {
    interactions: Arc<dyn InteractionStore>,
    catalog: Arc<dyn ContentCatalog>,
    adjustment: Arc<dyn ScoreAdjustment>,
    pool_size: usize,
}

impl PopularStrategy {
    pub fn new(
        interactions: Arc<dyn InteractionStore>,
        catalog: Arc<dyn ContentCatalog>,
        adjustment: Arc<dyn ScoreAdjustment>,
        pool_size: usize,
    ) -> Self {
        Self {
            interactions,
            catalog,
            adjustment,
            pool_size,
        }
    }
}

#[async_trait]
impl CandidateStrategy for PopularStrategy {
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Vec<Uuid>> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let query = ContentQuery::new(
            request.filter,
            request.exclude,
            self.pool_size.max(request.limit),
        )
        .ordered_by(ContentOrder::MostPopular);
        let pool = self.catalog.query(&query).await?;
        if pool.is_empty() {
            debug!(user_id = %request.user_id, "No eligible content for popular strategy");
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = pool.iter().map(|meta| meta.content_id).collect();
        let counts = self.interactions.popularity_of(&ids).await?;

        let mut scored: Vec<(f64, ContentMetadata)> = pool
            .into_iter()
            .map(|meta| {
                let popularity = counts
                    .get(&meta.content_id)
                    .map(|c| c.score())
                    .unwrap_or(0.0);
                (popularity * self.adjustment.factor(request, &meta), meta)
            })
            .collect();

        scored.sort_by(|(a_score, a), (b_score, b)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.content_id.cmp(&b.content_id))
        });

        Ok(scored
            .into_iter()
            .take(request.limit)
            .map(|(_, meta)| meta.content_id)
            .collect())
    }

    fn strategy(&self) -> Strategy {
        Strategy::Popular
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, CategoryFilter, ExcludeSet, InteractionType, Language};
    use crate::services::strategies::{LanguageWeighting, Neutral};
    use crate::store::InMemoryStore;
    use chrono::{Duration, Utc};

    fn insert(store: &InMemoryStore, category: &str, language: &str, age_days: i64) -> Uuid {
        let content_id = Uuid::new_v4();
        store.insert_content(ContentMetadata {
            content_id,
            category: Category::parse(category).unwrap(),
            language: Language::new(language),
            created_at: Utc::now() - Duration::days(age_days),
        });
        content_id
    }

    #[tokio::test]
    async fn test_popular_ranks_by_weighted_engagement() {
        let store = Arc::new(InMemoryStore::new());
        let viewed = insert(&store, "FOOD", "ko", 1);
        let shared = insert(&store, "FOOD", "ko", 1);
        let quiet = insert(&store, "FOOD", "ko", 0);
        let excluded = insert(&store, "FOOD", "ko", 0);

        store.record_views(viewed, 9);
        store.record_interaction(Uuid::new_v4(), shared, InteractionType::Share, Utc::now());
        store.record_views(excluded, 1000);

        let strategy = PopularStrategy::new(store.clone(), store, Arc::new(Neutral), 100);
        let exclude: ExcludeSet = [excluded].into_iter().collect();
        let request = FetchRequest {
            user_id: Uuid::new_v4(),
            limit: 3,
            exclude: &exclude,
            filter: &CategoryFilter::Any,
            language: None,
        };

        let result = strategy.fetch(&request).await.unwrap();
        assert_eq!(result, vec![shared, viewed, quiet]);
    }

    #[tokio::test]
    async fn test_popular_honours_language_and_category() {
        let store = Arc::new(InMemoryStore::new());
        let english = insert(&store, "FUN", "en", 0);
        let korean = insert(&store, "FUN", "ko", 0);
        let other_category = insert(&store, "FOOD", "ko", 0);

        store.record_views(english, 15);
        store.record_views(korean, 10);
        store.record_views(other_category, 100);

        let strategy = PopularStrategy::new(
            store.clone(),
            store,
            Arc::new(LanguageWeighting::new(0.5)),
            100,
        );
        let exclude = ExcludeSet::new();
        let preferred = Language::new("ko");
        let filter = CategoryFilter::Only(Category::fun());
        let request = FetchRequest {
            user_id: Uuid::new_v4(),
            limit: 10,
            exclude: &exclude,
            filter: &filter,
            language: Some(&preferred),
        };

        let result = strategy.fetch(&request).await.unwrap();
        assert_eq!(result, vec![korean, english]);
    }

    #[tokio::test]
    async fn test_popular_empty_catalog() {
        let store = Arc::new(InMemoryStore::new());
        let strategy = PopularStrategy::new(store.clone(), store, Arc::new(Neutral), 100);
        let exclude = ExcludeSet::new();
        let request = FetchRequest {
            user_id: Uuid::new_v4(),
            limit: 5,
            exclude: &exclude,
            filter: &CategoryFilter::Any,
            language: None,
        };

        assert!(strategy.fetch(&request).await.unwrap().is_empty());
        assert_eq!(strategy.strategy(), Strategy::Popular);
    }

    #[tokio::test]
    async fn test_old_popular_item_outranks_a_full_pool_of_new_ones() {
        let store = Arc::new(InMemoryStore::new());
        for hours in 0..300 {
            let content_id = Uuid::new_v4();
            store.insert_content(ContentMetadata {
                content_id,
                category: Category::parse("FOOD").unwrap(),
                language: Language::new("ko"),
                created_at: Utc::now() - Duration::hours(hours),
            });
            store.record_views(content_id, 1);
        }
        let viral = insert(&store, "FOOD", "ko", 30);
        store.record_views(viral, 1_000_000);

        let strategy = PopularStrategy::new(store.clone(), store, Arc::new(Neutral), 300);
        let exclude = ExcludeSet::new();
        let request = FetchRequest {
            user_id: Uuid::new_v4(),
            limit: 5,
            exclude: &exclude,
            filter: &CategoryFilter::Any,
            language: None,
        };

        let result = strategy.fetch(&request).await.unwrap();
        assert_eq!(result.len(), 5);
        assert_eq!(result[0], viral);
    }
}
