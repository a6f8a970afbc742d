mod decay;

pub use decay::TimeDecay;

use crate::config::RecommendationConfig;
use crate::error::Result;
use crate::models::{CategoryFilter, ContentMetadata, ExcludeSet, ScoredCandidate, UserInteraction};
use crate::store::{ContentCatalog, InteractionStore};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Fan-out limits for one scoring pass
#[derive(Debug, Clone, Copy)]
pub struct ScorerSettings {
    pub max_seed_items: usize,
    pub max_neighbors: usize,
    pub neighbor_fetch_concurrency: usize,
}

impl From<&RecommendationConfig> for ScorerSettings {
    fn from(config: &RecommendationConfig) -> Self {
        Self {
            max_seed_items: config.max_seed_items,
            max_neighbors: config.max_neighbors,
            neighbor_fetch_concurrency: config.neighbor_fetch_concurrency.max(1),
        }
    }
}

impl Default for ScorerSettings {
    fn default() -> Self {
        Self::from(&RecommendationConfig::default())
    }
}

/// Item-based collaborative filtering scorer
///
/// Algorithm:
/// 1. Seed set = content the user interacted with
/// 2. Neighbors = other users who interacted with any seed item
/// 3. Every neighbor interaction outside the seed set and the exclude set
///    adds its interaction weight to that content's raw score
/// 4. Raw scores are time-decayed by content age and sorted descending
///
/// Formula: score[c] = Σ weight(type) × e^(-λ × age_days(c))
pub struct SimilarityScorer {
    interactions: Arc<dyn InteractionStore>,
    catalog: Arc<dyn ContentCatalog>,
    decay: TimeDecay,
    settings: ScorerSettings,
}

impl SimilarityScorer {
    pub fn new(
        interactions: Arc<dyn InteractionStore>,
        catalog: Arc<dyn ContentCatalog>,
        decay: TimeDecay,
        settings: ScorerSettings,
    ) -> Self {
        Self {
            interactions,
            catalog,
            decay,
            settings,
        }
    }

    /// Ranked candidates for `user_id`, best first.
    ///
    /// Cold start (no history, no neighbors, everything excluded) yields an
    /// empty list; only store failures are errors.
    pub async fn score(
        &self,
        user_id: Uuid,
        exclude: &ExcludeSet,
        filter: &CategoryFilter,
    ) -> Result<Vec<ScoredCandidate>> {
        Ok(self
            .score_with_metadata(user_id, exclude, filter)
            .await?
            .into_iter()
            .map(|(candidate, _)| candidate)
            .collect())
    }

    /// Same as [`score`](Self::score), keeping the catalog entry of each
    /// candidate for adjustments applied by the caller.
    pub async fn score_with_metadata(
        &self,
        user_id: Uuid,
        exclude: &ExcludeSet,
        filter: &CategoryFilter,
    ) -> Result<Vec<(ScoredCandidate, ContentMetadata)>> {
        // Step 1: seed set
        let seed_ids = self.seed_items(user_id).await?;
        if seed_ids.is_empty() {
            info!(user_id = %user_id, "No interactions for user, collaborative scoring skipped");
            return Ok(Vec::new());
        }

        // Step 2: neighbors
        let neighbors = self.neighbors(user_id, &seed_ids).await?;
        if neighbors.is_empty() {
            info!(
                user_id = %user_id,
                seed_items = seed_ids.len(),
                "No neighbors found for seed items"
            );
            return Ok(Vec::new());
        }

        // Step 3: neighbor histories, fetched concurrently
        let histories = self.neighbor_histories(&neighbors).await?;

        // Step 4: accumulate, decay and rank
        let seed_set: HashSet<Uuid> = seed_ids.iter().copied().collect();
        let raw_scores = accumulate_scores(&seed_set, exclude, histories.iter().map(Vec::as_slice));
        if raw_scores.is_empty() {
            debug!(
                user_id = %user_id,
                neighbors = neighbors.len(),
                "Neighbors produced no unseen candidates"
            );
            return Ok(Vec::new());
        }

        let candidate_ids: Vec<Uuid> = raw_scores.keys().copied().collect();
        let metadata = self.catalog.metadata_of(&candidate_ids).await?;
        let ranked = rank_candidates(&raw_scores, metadata, &self.decay, Utc::now(), filter);

        info!(
            user_id = %user_id,
            seed_items = seed_ids.len(),
            neighbors = neighbors.len(),
            candidates = ranked.len(),
            "Collaborative candidates scored"
        );

        Ok(ranked)
    }

    async fn seed_items(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let history = self.interactions.interactions_of(user_id).await?;

        let mut seen = HashSet::new();
        Ok(history
            .into_iter()
            .map(|interaction| interaction.content_id)
            .filter(|id| seen.insert(*id))
            .take(self.settings.max_seed_items)
            .collect())
    }

    /// Distinct users (other than `user_id`) who touched any seed item.
    async fn neighbors(&self, user_id: Uuid, seed_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let per_seed: Vec<Result<Vec<Uuid>>> = stream::iter(seed_ids.iter().copied())
            .map(|content_id| async move {
                self.interactions.users_who_interacted_with(content_id).await
            })
            .buffered(self.settings.neighbor_fetch_concurrency)
            .collect()
            .await;

        let mut seen = HashSet::new();
        let mut neighbors = Vec::new();
        for users in per_seed {
            for neighbor in users? {
                if neighbor != user_id && seen.insert(neighbor) {
                    neighbors.push(neighbor);
                }
            }
        }
        neighbors.truncate(self.settings.max_neighbors);

        Ok(neighbors)
    }

    async fn neighbor_histories(&self, neighbors: &[Uuid]) -> Result<Vec<Vec<UserInteraction>>> {
        let results: Vec<Result<Vec<UserInteraction>>> = stream::iter(neighbors.iter().copied())
            .map(|neighbor| async move { self.interactions.interactions_of(neighbor).await })
            .buffer_unordered(self.settings.neighbor_fetch_concurrency)
            .collect()
            .await;

        results.into_iter().collect()
    }
}

/// Sum interaction weights per candidate content.
///
/// Content in the seed set or the exclude set never becomes a candidate,
/// and zero-weight interactions (comments) never create one.
pub fn accumulate_scores<'a>(
    seed: &HashSet<Uuid>,
    exclude: &ExcludeSet,
    histories: impl IntoIterator<Item = &'a [UserInteraction]>,
) -> HashMap<Uuid, f64> {
    let mut scores: HashMap<Uuid, f64> = HashMap::new();

    for history in histories {
        for interaction in history {
            let weight = interaction.interaction_type.weight();
            if weight <= 0.0
                || seed.contains(&interaction.content_id)
                || exclude.contains(&interaction.content_id)
            {
                continue;
            }
            *scores.entry(interaction.content_id).or_insert(0.0) += weight;
        }
    }

    scores
}

/// Apply time decay and the category filter, then sort best first.
///
/// Candidates without catalog metadata are dropped. Ties go to the newer
/// content, then to the smaller id.
pub fn rank_candidates(
    raw_scores: &HashMap<Uuid, f64>,
    metadata: Vec<ContentMetadata>,
    decay: &TimeDecay,
    now: DateTime<Utc>,
    filter: &CategoryFilter,
) -> Vec<(ScoredCandidate, ContentMetadata)> {
    let mut ranked: Vec<(ScoredCandidate, ContentMetadata)> = metadata
        .into_iter()
        .filter(|meta| filter.matches(&meta.category))
        .filter_map(|meta| {
            let raw_score = *raw_scores.get(&meta.content_id)?;
            let age_days = TimeDecay::age_days(meta.created_at, now);
            let candidate = ScoredCandidate {
                content_id: meta.content_id,
                raw_score,
                decayed_score: decay.apply(raw_score, age_days),
            };
            Some((candidate, meta))
        })
        .collect();

    ranked.sort_by(|(a, a_meta), (b, b_meta)| {
        b.decayed_score
            .partial_cmp(&a.decayed_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b_meta.created_at.cmp(&a_meta.created_at))
            .then_with(|| a.content_id.cmp(&b.content_id))
    });

    ranked
}
