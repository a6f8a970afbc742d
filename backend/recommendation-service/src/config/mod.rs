use serde::Deserialize;
use std::time::Duration;

use crate::error::{RecommendationError, Result};
use crate::models::{Category, StrategyRatios};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub redis: RedisConfig,
    pub recommendation: RecommendationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

/// Feed composition tunables, read from `RECOMMENDATION_*`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationConfig {
    #[serde(default = "default_collaborative_ratio")]
    pub collaborative_ratio: f64,
    #[serde(default = "default_popular_ratio")]
    pub popular_ratio: f64,
    #[serde(default = "default_new_ratio")]
    pub new_ratio: f64,
    #[serde(default = "default_random_ratio")]
    pub random_ratio: f64,

    /// Share of the main feed reserved for the discovery category
    #[serde(default = "default_discovery_ratio")]
    pub discovery_ratio: f64,
    #[serde(default = "default_discovery_category")]
    pub discovery_category: String,
    #[serde(default = "default_interleave_regular")]
    pub interleave_regular: usize,
    #[serde(default = "default_interleave_discovery")]
    pub interleave_discovery: usize,

    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    #[serde(default = "default_strategy_timeout_ms")]
    pub strategy_timeout_ms: u64,

    #[serde(default = "default_neighbor_fetch_concurrency")]
    pub neighbor_fetch_concurrency: usize,
    #[serde(default = "default_max_seed_items")]
    pub max_seed_items: usize,
    #[serde(default = "default_max_neighbors")]
    pub max_neighbors: usize,
    #[serde(default = "default_candidate_pool_size")]
    pub candidate_pool_size: usize,

    /// Score multiplier for content outside the preferred language
    #[serde(default = "default_foreign_language_weight")]
    pub foreign_language_weight: f64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_collaborative_ratio() -> f64 {
    0.4
}

fn default_popular_ratio() -> f64 {
    0.3
}

fn default_new_ratio() -> f64 {
    0.1
}

fn default_random_ratio() -> f64 {
    0.2
}

fn default_discovery_ratio() -> f64 {
    0.2
}

fn default_discovery_category() -> String {
    "FUN".to_string()
}

fn default_interleave_regular() -> usize {
    4
}

fn default_interleave_discovery() -> usize {
    1
}

fn default_max_limit() -> usize {
    100
}

fn default_strategy_timeout_ms() -> u64 {
    800
}

fn default_neighbor_fetch_concurrency() -> usize {
    16
}

fn default_max_seed_items() -> usize {
    50
}

fn default_max_neighbors() -> usize {
    200
}

fn default_candidate_pool_size() -> usize {
    300
}

fn default_foreign_language_weight() -> f64 {
    0.5
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            collaborative_ratio: default_collaborative_ratio(),
            popular_ratio: default_popular_ratio(),
            new_ratio: default_new_ratio(),
            random_ratio: default_random_ratio(),
            discovery_ratio: default_discovery_ratio(),
            discovery_category: default_discovery_category(),
            interleave_regular: default_interleave_regular(),
            interleave_discovery: default_interleave_discovery(),
            max_limit: default_max_limit(),
            strategy_timeout_ms: default_strategy_timeout_ms(),
            neighbor_fetch_concurrency: default_neighbor_fetch_concurrency(),
            max_seed_items: default_max_seed_items(),
            max_neighbors: default_max_neighbors(),
            candidate_pool_size: default_candidate_pool_size(),
            foreign_language_weight: default_foreign_language_weight(),
        }
    }
}

impl Config {
    /// Load configuration from the environment (and `.env` when present).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let redis = envy::prefixed("REDIS_").from_env::<RedisConfig>()?;
        let recommendation =
            envy::prefixed("RECOMMENDATION_").from_env::<RecommendationConfig>()?;
        recommendation.validate()?;

        Ok(Config {
            redis,
            recommendation,
        })
    }
}

impl RecommendationConfig {
    pub fn validate(&self) -> Result<()> {
        let ratios = [
            ("collaborative_ratio", self.collaborative_ratio),
            ("popular_ratio", self.popular_ratio),
            ("new_ratio", self.new_ratio),
            ("random_ratio", self.random_ratio),
            ("discovery_ratio", self.discovery_ratio),
            ("foreign_language_weight", self.foreign_language_weight),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(RecommendationError::Config(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.max_limit == 0 {
            return Err(RecommendationError::Config(
                "max_limit must be positive".to_string(),
            ));
        }
        if self.interleave_regular == 0 || self.interleave_discovery == 0 {
            return Err(RecommendationError::Config(
                "interleave steps must be positive".to_string(),
            ));
        }
        if self.strategy_timeout_ms == 0 {
            return Err(RecommendationError::Config(
                "strategy_timeout_ms must be positive".to_string(),
            ));
        }
        if self.neighbor_fetch_concurrency == 0 {
            return Err(RecommendationError::Config(
                "neighbor_fetch_concurrency must be positive".to_string(),
            ));
        }

        self.discovery_category()?;
        Ok(())
    }

    pub fn ratios(&self) -> StrategyRatios {
        StrategyRatios {
            collaborative: self.collaborative_ratio,
            popular: self.popular_ratio,
            new: self.new_ratio,
            random: self.random_ratio,
        }
    }

    pub fn discovery_category(&self) -> Result<Category> {
        Category::parse(&self.discovery_category)
            .map_err(|e| RecommendationError::Config(e.to_string()))
    }

    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_millis(self.strategy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RecommendationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ratios(), StrategyRatios::default());
        assert_eq!(config.discovery_category().unwrap(), Category::fun());
        assert_eq!(config.strategy_timeout(), Duration::from_millis(800));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = RecommendationConfig {
            popular_ratio: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RecommendationConfig {
            interleave_regular: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RecommendationConfig {
            discovery_category: "not a category".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_envy_defaults() {
        let vars = vec![("RECOMMENDATION_MAX_LIMIT".to_string(), "50".to_string())];
        let config: RecommendationConfig = envy::prefixed("RECOMMENDATION_")
            .from_iter(vars)
            .unwrap();

        assert_eq!(config.max_limit, 50);
        assert_eq!(config.collaborative_ratio, 0.4);
        assert_eq!(config.discovery_category, "FUN");
    }
}
