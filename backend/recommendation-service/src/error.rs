use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommendationError>;

#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store unavailable: {0}")]
    Store(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RecommendationError {
    /// Collaborator failures that may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RecommendationError::Store(_)
                | RecommendationError::Redis(_)
                | RecommendationError::Timeout(_)
        )
    }

    /// Errors caused by the request itself (4xx at the boundary).
    pub fn is_client_error(&self) -> bool {
        matches!(self, RecommendationError::InvalidInput(_))
    }
}

impl From<envy::Error> for RecommendationError {
    fn from(err: envy::Error) -> Self {
        RecommendationError::Config(err.to_string())
    }
}
