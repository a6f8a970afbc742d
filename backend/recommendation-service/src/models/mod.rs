use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::RecommendationError;

/// Content ids the caller has already seen.
pub type ExcludeSet = HashSet<Uuid>;

/// User action recorded by the interaction store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionType {
    Like,
    Save,
    Share,
    Comment,
}

impl InteractionType {
    /// Ranking weight of one interaction. Comments never contribute.
    pub fn weight(&self) -> f64 {
        match self {
            InteractionType::Like => 1.0,
            InteractionType::Save => 1.5,
            InteractionType::Share => 2.0,
            InteractionType::Comment => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::Like => "LIKE",
            InteractionType::Save => "SAVE",
            InteractionType::Share => "SHARE",
            InteractionType::Comment => "COMMENT",
        }
    }
}

impl FromStr for InteractionType {
    type Err = RecommendationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LIKE" => Ok(InteractionType::Like),
            "SAVE" => Ok(InteractionType::Save),
            "SHARE" => Ok(InteractionType::Share),
            "COMMENT" => Ok(InteractionType::Comment),
            other => Err(RecommendationError::InvalidInput(format!(
                "unknown interaction type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInteraction {
    pub content_id: Uuid,
    pub interaction_type: InteractionType,
    pub occurred_at: DateTime<Utc>,
}

/// Content category, e.g. `FUN`.
///
/// Stored upper-case; 1..=32 chars of `A-Z`, `0-9` or `_`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Category(String);

const MAX_CATEGORY_LEN: usize = 32;

impl Category {
    pub fn parse(raw: &str) -> Result<Self, RecommendationError> {
        let normalized = raw.trim().to_ascii_uppercase();

        if normalized.is_empty() || normalized.len() > MAX_CATEGORY_LEN {
            return Err(RecommendationError::InvalidInput(format!(
                "category must be 1..={} characters, got {:?}",
                MAX_CATEGORY_LEN, raw
            )));
        }

        if !normalized
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(RecommendationError::InvalidInput(format!(
                "malformed category: {:?}",
                raw
            )));
        }

        Ok(Self(normalized))
    }

    /// The discovery category interleaved into the main feed.
    pub fn fun() -> Self {
        Self("FUN".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Language(String);

impl Language {
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentMetadata {
    pub content_id: Uuid,
    pub category: Category,
    pub language: Language,
    pub created_at: DateTime<Utc>,
}

/// Which categories a fetch may return.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    Any,
    Only(Category),
    Exclude(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: &Category) -> bool {
        match self {
            CategoryFilter::Any => true,
            CategoryFilter::Only(wanted) => wanted == category,
            CategoryFilter::Exclude(unwanted) => unwanted != category,
        }
    }
}

/// Aggregated engagement counters for one piece of content.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PopularityCounts {
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub saves: u64,
    pub shares: u64,
}

impl PopularityCounts {
    pub const VIEW_WEIGHT: f64 = 1.0;
    pub const LIKE_WEIGHT: f64 = 5.0;
    pub const COMMENT_WEIGHT: f64 = 3.0;
    pub const SAVE_WEIGHT: f64 = 7.0;
    pub const SHARE_WEIGHT: f64 = 10.0;

    pub fn score(&self) -> f64 {
        self.views as f64 * Self::VIEW_WEIGHT
            + self.likes as f64 * Self::LIKE_WEIGHT
            + self.comments as f64 * Self::COMMENT_WEIGHT
            + self.saves as f64 * Self::SAVE_WEIGHT
            + self.shares as f64 * Self::SHARE_WEIGHT
    }
}

/// Collaborative-filtering candidate with its raw and time-decayed score.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredCandidate {
    pub content_id: Uuid,
    pub raw_score: f64,
    pub decayed_score: f64,
}

/// Candidate generation strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Strategy {
    Collaborative, // similar users
    Popular,       // engagement ranking
    New,           // newest first
    Random,        // discovery
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Collaborative => "collaborative",
            Strategy::Popular => "popular",
            Strategy::New => "new",
            Strategy::Random => "random",
        }
    }
}

/// Per-strategy quotas for one page.
///
/// Each share is rounded up, so the quotas always cover `limit`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct StrategyLimits {
    pub collaborative: usize,
    pub popular: usize,
    pub new: usize,
    pub random: usize,
}

impl StrategyLimits {
    pub fn split(limit: usize, ratios: &StrategyRatios) -> Self {
        // 10 * 0.3 is 3.0000000000000004 in f64
        let share = |ratio: f64| ((limit as f64 * ratio) - 1e-9).ceil().max(0.0) as usize;
        Self {
            collaborative: share(ratios.collaborative),
            popular: share(ratios.popular),
            new: share(ratios.new),
            random: share(ratios.random),
        }
    }

    pub fn get(&self, strategy: Strategy) -> usize {
        match strategy {
            Strategy::Collaborative => self.collaborative,
            Strategy::Popular => self.popular,
            Strategy::New => self.new,
            Strategy::Random => self.random,
        }
    }

    pub fn total(&self) -> usize {
        self.collaborative + self.popular + self.new + self.random
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StrategyRatios {
    pub collaborative: f64,
    pub popular: f64,
    pub new: f64,
    pub random: f64,
}

impl Default for StrategyRatios {
    fn default() -> Self {
        Self {
            collaborative: 0.4,
            popular: 0.3,
            new: 0.1,
            random: 0.2,
        }
    }
}

/// Raw feed request as received from the boundary layer.
#[derive(Debug, Clone, Default)]
pub struct FeedRequest {
    pub user_id: Uuid,
    pub limit: i32,
    pub exclude_ids: ExcludeSet,
    pub language: Option<Language>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedStats {
    pub collaborative_count: usize,
    pub popular_count: usize,
    pub new_count: usize,
    pub random_count: usize,
    pub failed_strategies: Vec<Strategy>,
    pub backfill_count: usize,
    pub discovery_count: usize,
    pub final_count: usize,
}

impl FeedStats {
    pub(crate) fn record(&mut self, strategy: Strategy, delivered: usize) {
        match strategy {
            Strategy::Collaborative => self.collaborative_count += delivered,
            Strategy::Popular => self.popular_count += delivered,
            Strategy::New => self.new_count += delivered,
            Strategy::Random => self.random_count += delivered,
        }
    }

    pub(crate) fn merge(&mut self, other: FeedStats) {
        self.collaborative_count += other.collaborative_count;
        self.popular_count += other.popular_count;
        self.new_count += other.new_count;
        self.random_count += other.random_count;
        self.backfill_count += other.backfill_count;
        for strategy in other.failed_strategies {
            if !self.failed_strategies.contains(&strategy) {
                self.failed_strategies.push(strategy);
            }
        }
    }
}
