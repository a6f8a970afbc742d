use super::{CandidateStrategy, FetchRequest};
use crate::error::Result;
use crate::models::{ContentMetadata, Strategy};
use crate::store::{ContentCatalog, ContentOrder, ContentQuery};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::sync::Arc;
use uuid::Uuid;

/// Uniform sample from the eligible pool, for discovery.
pub struct RandomStrategy {
    catalog: Arc<dyn ContentCatalog>,
    pool_size: usize,
}

impl RandomStrategy {
    pub fn new(catalog: Arc<dyn ContentCatalog>, pool_size: usize) -> Self {
        Self { catalog, pool_size }
    }
}

fn sample(pool: &[ContentMetadata], limit: usize) -> Vec<Uuid> {
    let mut rng = rand::thread_rng();
    pool.choose_multiple(&mut rng, limit)
        .map(|meta| meta.content_id)
        .collect()
}

#[async_trait]
impl CandidateStrategy for RandomStrategy {
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Vec<Uuid>> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let query = ContentQuery::new(
            request.filter,
            request.exclude,
            self.pool_size.max(request.limit),
        )
        .ordered_by(ContentOrder::Random);
        let pool = self.catalog.query(&query).await?;

        Ok(sample(&pool, request.limit))
    }

    fn strategy(&self) -> Strategy {
        Strategy::Random
    }
}
