//! Exponential time decay over content age
//!
//! Formula: score × e^(-λ × age_days)
//!
//! The default λ is fitted to two retention checkpoints:
//! - 14 days → ~75% of the original score
//! - 60 days → ~30% of the original score

use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Used only if the checkpoint fit is degenerate
const FALLBACK_DECAY_RATE: f64 = 0.0206;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeDecay {
    rate: f64,
}

impl TimeDecay {
    /// (age_days, retained_fraction)
    pub const CHECKPOINTS: [(f64, f64); 2] = [(14.0, 0.75), (60.0, 0.30)];

    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate.max(0.0),
        }
    }

    /// Least-squares fit of λ through the origin of ln(retained) = -λ × age.
    ///
    /// Returns `None` when no checkpoint has a positive age and a retained
    /// fraction in (0, 1].
    pub fn fit(checkpoints: &[(f64, f64)]) -> Option<Self> {
        let (numerator, denominator) = checkpoints
            .iter()
            .filter(|(age, retained)| *age > 0.0 && *retained > 0.0 && *retained <= 1.0)
            .fold((0.0, 0.0), |(num, den), (age, retained)| {
                (num - age * retained.ln(), den + age * age)
            });

        if denominator <= 0.0 {
            return None;
        }

        Some(Self::new(numerator / denominator))
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Fraction of the score retained at `age_days`; negative ages count as fresh.
    pub fn factor(&self, age_days: f64) -> f64 {
        (-self.rate * age_days.max(0.0)).exp()
    }

    pub fn apply(&self, raw_score: f64, age_days: f64) -> f64 {
        raw_score * self.factor(age_days)
    }

    pub fn age_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        ((now - created_at).num_seconds() as f64 / SECONDS_PER_DAY).max(0.0)
    }
}

impl Default for TimeDecay {
    fn default() -> Self {
        Self::fit(&Self::CHECKPOINTS).unwrap_or_else(|| Self::new(FALLBACK_DECAY_RATE))
    }
}
