//! Read-only collaborators of the recommender.
//!
//! The interaction store owns user actions and engagement counters, the
//! content catalog owns content metadata. Both are external systems; the
//! recommender only reads from them.

mod memory;
mod redis_store;

use crate::error::Result;
use crate::models::{CategoryFilter, ContentMetadata, ExcludeSet, PopularityCounts, UserInteraction};
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

pub use memory::InMemoryStore;
pub use redis_store::RedisStore;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// All interactions of a user, most recent first.
    async fn interactions_of(&self, user_id: Uuid) -> Result<Vec<UserInteraction>>;

    async fn users_who_interacted_with(&self, content_id: Uuid) -> Result<Vec<Uuid>>;

    /// Engagement counters per content id. Unknown ids are absent.
    async fn popularity_of(&self, content_ids: &[Uuid]) -> Result<HashMap<Uuid, PopularityCounts>>;
}

/// Order in which the catalog walks eligible content before truncating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentOrder {
    /// Newest first
    #[default]
    Newest,
    /// Highest popularity score first
    MostPopular,
    /// Uniformly random over the whole eligible set
    Random,
}

/// Eligibility query against the catalog.
#[derive(Debug, Clone, Default)]
pub struct ContentQuery {
    pub filter: CategoryFilter,
    pub exclude: ExcludeSet,
    pub limit: usize,
    pub order: ContentOrder,
}

impl ContentQuery {
    pub fn new(filter: &CategoryFilter, exclude: &ExcludeSet, limit: usize) -> Self {
        Self {
            filter: filter.clone(),
            exclude: exclude.clone(),
            limit,
            order: ContentOrder::Newest,
        }
    }

    pub fn ordered_by(mut self, order: ContentOrder) -> Self {
        self.order = order;
        self
    }

    pub fn accepts(&self, meta: &ContentMetadata) -> bool {
        !self.exclude.contains(&meta.content_id) && self.filter.matches(&meta.category)
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContentCatalog: Send + Sync {
    /// Batched metadata lookup. Unknown ids are silently absent.
    async fn metadata_of(&self, content_ids: &[Uuid]) -> Result<Vec<ContentMetadata>>;

    async fn query(&self, query: &ContentQuery) -> Result<Vec<ContentMetadata>>;
}
