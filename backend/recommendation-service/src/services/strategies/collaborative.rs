use super::{CandidateStrategy, FetchRequest, ScoreAdjustment};
use crate::error::Result;
use crate::models::{ExcludeSet, Strategy};
use crate::services::similarity::SimilarityScorer;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What to do with a collaborative result of `found` items for a slot of `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backfill {
    /// Nothing scored: the whole slot comes from the fallback strategy
    Fallback,
    /// Short by this many: the fallback strategy tops up
    Supplement(usize),
    /// Enough results: cut down to the limit
    Truncate,
}

impl Backfill {
    pub fn plan(found: usize, limit: usize) -> Self {
        if found == 0 {
            Backfill::Fallback
        } else if found < limit {
            Backfill::Supplement(limit - found)
        } else {
            Backfill::Truncate
        }
    }
}

/// Collaborative filtering with popularity backfill
pub struct CollaborativeStrategy {
    scorer: SimilarityScorer,
    adjustment: Arc<dyn ScoreAdjustment>,
    fallback: Arc<dyn CandidateStrategy>,
}

impl CollaborativeStrategy {
    pub fn new(
        scorer: SimilarityScorer,
        adjustment: Arc<dyn ScoreAdjustment>,
        fallback: Arc<dyn CandidateStrategy>,
    ) -> Self {
        Self {
            scorer,
            adjustment,
            fallback,
        }
    }

    /// Scorer output re-ranked by the score adjustment.
    async fn ranked(&self, request: &FetchRequest<'_>) -> Result<Vec<Uuid>> {
        let scored = self
            .scorer
            .score_with_metadata(request.user_id, request.exclude, request.filter)
            .await?;

        let mut adjusted: Vec<(f64, Uuid)> = scored
            .into_iter()
            .map(|(candidate, meta)| {
                (
                    candidate.decayed_score * self.adjustment.factor(request, &meta),
                    candidate.content_id,
                )
            })
            .collect();

        // stable: equal adjusted scores keep the scorer's order
        adjusted.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(adjusted.into_iter().map(|(_, id)| id).collect())
    }
}

#[async_trait]
impl CandidateStrategy for CollaborativeStrategy {
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Vec<Uuid>> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let mut chosen = self.ranked(request).await?;

        match Backfill::plan(chosen.len(), request.limit) {
            Backfill::Fallback => {
                info!(
                    user_id = %request.user_id,
                    fallback = self.fallback.strategy().as_str(),
                    "No collaborative candidates, falling back"
                );
                self.fallback.fetch(request).await
            }
            Backfill::Supplement(missing) => {
                let mut grown: ExcludeSet = request.exclude.clone();
                grown.extend(chosen.iter().copied());

                let supplement = match self
                    .fallback
                    .fetch(&FetchRequest {
                        exclude: &grown,
                        ..request.with_limit(missing)
                    })
                    .await
                {
                    Ok(ids) => ids,
                    Err(e) => {
                        warn!(
                            user_id = %request.user_id,
                            fallback = self.fallback.strategy().as_str(),
                            collaborative = chosen.len(),
                            error = %e,
                            "Supplement failed, keeping collaborative candidates"
                        );
                        return Ok(chosen);
                    }
                };

                debug!(
                    user_id = %request.user_id,
                    collaborative = chosen.len(),
                    supplemented = supplement.len(),
                    "Collaborative candidates supplemented"
                );
                chosen.extend(supplement);
                Ok(chosen)
            }
            Backfill::Truncate => {
                chosen.truncate(request.limit);
                Ok(chosen)
            }
        }
    }

    fn strategy(&self) -> Strategy {
        Strategy::Collaborative
    }
}
