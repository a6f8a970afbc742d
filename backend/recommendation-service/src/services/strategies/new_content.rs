use super::{CandidateStrategy, FetchRequest};
use crate::error::Result;
use crate::models::Strategy;
use crate::store::{ContentCatalog, ContentQuery};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Newest eligible content first.
pub struct NewContentStrategy {
    catalog: Arc<dyn ContentCatalog>,
}

impl NewContentStrategy {
    pub fn new(catalog: Arc<dyn ContentCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl CandidateStrategy for NewContentStrategy {
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Vec<Uuid>> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let query = ContentQuery::new(request.filter, request.exclude, request.limit);
        let newest = self.catalog.query(&query).await?;

        Ok(newest.into_iter().map(|meta| meta.content_id).collect())
    }

    fn strategy(&self) -> Strategy {
        Strategy::New
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, CategoryFilter, ContentMetadata, ExcludeSet, Language};
    use crate::store::InMemoryStore;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_newest_first_with_exclusions() {
        let store = Arc::new(InMemoryStore::new());
        let ids: Vec<Uuid> = (0..5)
            .map(|age| {
                let content_id = Uuid::new_v4();
                store.insert_content(ContentMetadata {
                    content_id,
                    category: Category::parse("TRAVEL").unwrap(),
                    language: Language::new("ko"),
                    created_at: Utc::now() - Duration::hours(age),
                });
                content_id
            })
            .collect();

        let strategy = NewContentStrategy::new(store);
        let exclude: ExcludeSet = [ids[0]].into_iter().collect();
        let request = FetchRequest {
            user_id: Uuid::new_v4(),
            limit: 3,
            exclude: &exclude,
            filter: &CategoryFilter::Any,
            language: None,
        };

        let result = strategy.fetch(&request).await.unwrap();
        assert_eq!(result, vec![ids[1], ids[2], ids[3]]);
    }
}
