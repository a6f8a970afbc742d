mod collaborative;
mod new_content;
mod popular;
mod random;

use crate::error::Result;
use crate::models::{CategoryFilter, ContentMetadata, ExcludeSet, Language, Strategy};
use async_trait::async_trait;
use uuid::Uuid;

pub use collaborative::{Backfill, CollaborativeStrategy};
pub use new_content::NewContentStrategy;
pub use popular::PopularStrategy;
pub use random::RandomStrategy;

/// Parameters shared by every candidate fetch
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub user_id: Uuid,
    pub limit: usize,
    pub exclude: &'a ExcludeSet,
    pub filter: &'a CategoryFilter,
    pub language: Option<&'a Language>,
}

impl<'a> FetchRequest<'a> {
    pub fn with_limit(self, limit: usize) -> Self {
        Self { limit, ..self }
    }
}

/// Candidate generator for one feed slot.
///
/// Implementations return at most `limit` ids, never an id from the
/// exclude set, and an empty list when nothing is eligible.
#[async_trait]
pub trait CandidateStrategy: Send + Sync {
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Vec<Uuid>>;
    fn strategy(&self) -> Strategy;
}

/// Multiplicative score adjustment applied by ranking fetchers.
pub trait ScoreAdjustment: Send + Sync {
    fn factor(&self, request: &FetchRequest<'_>, meta: &ContentMetadata) -> f64;
}

/// Down-weights content outside the requested language.
#[derive(Debug, Clone, Copy)]
pub struct LanguageWeighting {
    foreign_weight: f64,
}

impl LanguageWeighting {
    pub fn new(foreign_weight: f64) -> Self {
        Self {
            foreign_weight: foreign_weight.clamp(0.0, 1.0),
        }
    }
}

impl ScoreAdjustment for LanguageWeighting {
    fn factor(&self, request: &FetchRequest<'_>, meta: &ContentMetadata) -> f64 {
        match request.language {
            Some(preferred) if *preferred != meta.language => self.foreign_weight,
            _ => 1.0,
        }
    }
}

/// No adjustment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Neutral;

impl ScoreAdjustment for Neutral {
    fn factor(&self, _request: &FetchRequest<'_>, _meta: &ContentMetadata) -> f64 {
        1.0
    }
}
