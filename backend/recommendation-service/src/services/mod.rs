pub mod composer;
pub mod similarity;
pub mod strategies;

pub use composer::{FeedComposer, StrategySet};
pub use similarity::{SimilarityScorer, TimeDecay};
pub use strategies::{CandidateStrategy, FetchRequest};
