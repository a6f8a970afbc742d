pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{RecommendationError, Result};
pub use models::{FeedRequest, FeedStats, Strategy};
pub use services::{FeedComposer, SimilarityScorer, StrategySet};
pub use store::{ContentCatalog, InMemoryStore, InteractionStore, RedisStore};
