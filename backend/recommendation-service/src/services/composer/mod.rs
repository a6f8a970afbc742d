use crate::config::{Config, RecommendationConfig};
use crate::error::{RecommendationError, Result};
use crate::models::{
    Category, CategoryFilter, ExcludeSet, FeedRequest, FeedStats, Language, Strategy,
    StrategyLimits,
};
use crate::services::similarity::{ScorerSettings, SimilarityScorer, TimeDecay};
use crate::services::strategies::{
    CandidateStrategy, CollaborativeStrategy, FetchRequest, LanguageWeighting, NewContentStrategy,
    PopularStrategy, RandomStrategy, ScoreAdjustment,
};
use crate::store::{ContentCatalog, InteractionStore, RedisStore};
use crate::utils::{interleave, retain_unique};
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The four candidate generators a feed page draws from
#[derive(Clone)]
pub struct StrategySet {
    pub collaborative: Arc<dyn CandidateStrategy>,
    pub popular: Arc<dyn CandidateStrategy>,
    pub new: Arc<dyn CandidateStrategy>,
    pub random: Arc<dyn CandidateStrategy>,
}

impl StrategySet {
    /// Standard wiring over a pair of stores.
    pub fn from_stores(
        interactions: Arc<dyn InteractionStore>,
        catalog: Arc<dyn ContentCatalog>,
        config: &RecommendationConfig,
    ) -> Self {
        let adjustment: Arc<dyn ScoreAdjustment> =
            Arc::new(LanguageWeighting::new(config.foreign_language_weight));

        let popular: Arc<dyn CandidateStrategy> = Arc::new(PopularStrategy::new(
            interactions.clone(),
            catalog.clone(),
            adjustment.clone(),
            config.candidate_pool_size,
        ));

        let scorer = SimilarityScorer::new(
            interactions,
            catalog.clone(),
            TimeDecay::default(),
            ScorerSettings::from(config),
        );

        Self {
            collaborative: Arc::new(CollaborativeStrategy::new(
                scorer,
                adjustment,
                popular.clone(),
            )),
            popular,
            new: Arc::new(NewContentStrategy::new(catalog.clone())),
            random: Arc::new(RandomStrategy::new(catalog, config.candidate_pool_size)),
        }
    }

    fn get(&self, strategy: Strategy) -> &Arc<dyn CandidateStrategy> {
        match strategy {
            Strategy::Collaborative => &self.collaborative,
            Strategy::Popular => &self.popular,
            Strategy::New => &self.new,
            Strategy::Random => &self.random,
        }
    }
}

/// A feed request that passed validation
#[derive(Debug)]
struct ValidatedRequest<'a> {
    user_id: Uuid,
    limit: usize,
    exclude: &'a ExcludeSet,
    language: Option<&'a Language>,
    category: Option<Category>,
}

/// Feed composer
///
/// Splits a page into per-strategy quotas, runs the four strategies
/// concurrently, merges and shuffles their output. The unfiltered main
/// feed is built from two such pipelines, regular content and the
/// discovery category, interleaved at a fixed ratio.
pub struct FeedComposer {
    strategies: StrategySet,
    config: RecommendationConfig,
    discovery_category: Category,
}

impl FeedComposer {
    pub fn new(strategies: StrategySet, config: RecommendationConfig) -> Result<Self> {
        config.validate()?;
        let discovery_category = config.discovery_category()?;

        Ok(Self {
            strategies,
            config,
            discovery_category,
        })
    }

    pub fn from_stores(
        interactions: Arc<dyn InteractionStore>,
        catalog: Arc<dyn ContentCatalog>,
        config: RecommendationConfig,
    ) -> Result<Self> {
        let strategies = StrategySet::from_stores(interactions, catalog, &config);
        Self::new(strategies, config)
    }

    /// Redis-backed composer from the loaded service configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(RedisStore::connect(&config.redis.url).await?);
        Self::from_stores(store.clone(), store, config.recommendation.clone())
    }

    /// Ranked content ids for one feed page.
    ///
    /// Only invalid input is an error. Failing or slow strategies shrink
    /// their share of the page instead.
    pub async fn compose(&self, request: &FeedRequest) -> Result<Vec<Uuid>> {
        let (ids, _) = self.compose_with_stats(request).await?;
        Ok(ids)
    }

    pub async fn compose_with_stats(&self, request: &FeedRequest) -> Result<(Vec<Uuid>, FeedStats)> {
        let validated = self.validate(request)?;

        let (ids, stats) = match &validated.category {
            Some(category) => {
                let filter = CategoryFilter::Only(category.clone());
                self.run_pipeline(&validated, validated.limit, &filter).await
            }
            None => self.compose_main_feed(&validated).await,
        };

        info!(
            user_id = %validated.user_id,
            limit = validated.limit,
            category = validated.category.as_ref().map(|c| c.as_str()).unwrap_or("main"),
            collaborative = stats.collaborative_count,
            popular = stats.popular_count,
            new = stats.new_count,
            random = stats.random_count,
            backfill = stats.backfill_count,
            discovery = stats.discovery_count,
            failed = stats.failed_strategies.len(),
            total = stats.final_count,
            "Feed composed"
        );

        Ok((ids, stats))
    }

    fn validate<'a>(&self, request: &'a FeedRequest) -> Result<ValidatedRequest<'a>> {
        if request.limit <= 0 {
            return Err(RecommendationError::InvalidInput(format!(
                "limit must be positive, got {}",
                request.limit
            )));
        }
        let limit = request.limit as usize;
        if limit > self.config.max_limit {
            return Err(RecommendationError::InvalidInput(format!(
                "limit must be at most {}, got {}",
                self.config.max_limit, limit
            )));
        }

        let category = request
            .category
            .as_deref()
            .map(Category::parse)
            .transpose()?;

        Ok(ValidatedRequest {
            user_id: request.user_id,
            limit,
            exclude: &request.exclude_ids,
            language: request.language.as_ref(),
            category,
        })
    }

    /// Regular and discovery pipelines interleaved at the configured ratio.
    ///
    /// The discovery share is never refilled with regular content, so a
    /// catalog without discovery items yields a page of `limit - discovery_target`.
    async fn compose_main_feed(&self, request: &ValidatedRequest<'_>) -> (Vec<Uuid>, FeedStats) {
        let discovery_target =
            ((request.limit as f64 * self.config.discovery_ratio).round() as usize).min(request.limit);
        let regular_target = request.limit - discovery_target;

        let regular_filter = CategoryFilter::Exclude(self.discovery_category.clone());
        let discovery_filter = CategoryFilter::Only(self.discovery_category.clone());

        let ((regular, regular_stats), (discovery, discovery_stats)) = tokio::join!(
            self.run_pipeline(request, regular_target, &regular_filter),
            self.run_pipeline(request, discovery_target, &discovery_filter),
        );

        let discovery_count = discovery.len().min(request.limit);
        let mut feed = interleave(
            regular,
            discovery,
            self.config.interleave_regular,
            self.config.interleave_discovery,
        );
        retain_unique(&mut feed);
        feed.truncate(request.limit);

        let mut stats = regular_stats;
        stats.merge(discovery_stats);
        stats.discovery_count = discovery_count;
        stats.final_count = feed.len();

        debug!(
            user_id = %request.user_id,
            regular_target,
            discovery_target,
            "Main feed interleaved"
        );

        (feed, stats)
    }

    /// One four-strategy pass restricted to `filter`, at most `target` ids.
    async fn run_pipeline(
        &self,
        request: &ValidatedRequest<'_>,
        target: usize,
        filter: &CategoryFilter,
    ) -> (Vec<Uuid>, FeedStats) {
        let mut stats = FeedStats::default();
        if target == 0 {
            return (Vec::new(), stats);
        }

        let limits = StrategyLimits::split(target, &self.config.ratios());
        let fetch = FetchRequest {
            user_id: request.user_id,
            limit: target,
            exclude: request.exclude,
            filter,
            language: request.language,
        };

        // All four strategies concurrently
        let (collaborative, popular, new, random) = tokio::join!(
            self.run_strategy(Strategy::Collaborative, fetch.with_limit(limits.collaborative)),
            self.run_strategy(Strategy::Popular, fetch.with_limit(limits.popular)),
            self.run_strategy(Strategy::New, fetch.with_limit(limits.new)),
            self.run_strategy(Strategy::Random, fetch.with_limit(limits.random)),
        );

        let mut seen: HashSet<Uuid> = request.exclude.clone();
        let mut merged = Vec::with_capacity(limits.total());

        for (strategy, result) in [
            (Strategy::Collaborative, collaborative),
            (Strategy::Popular, popular),
            (Strategy::New, new),
            (Strategy::Random, random),
        ] {
            match result {
                Some(ids) => {
                    let before = merged.len();
                    for id in ids.into_iter().take(limits.get(strategy)) {
                        if seen.insert(id) {
                            merged.push(id);
                        }
                    }
                    stats.record(strategy, merged.len() - before);
                }
                None => stats.failed_strategies.push(strategy),
            }
        }

        // Duplicates across strategies or a failed slot can leave the page short
        if merged.len() < target {
            stats.backfill_count = self
                .backfill(&fetch, target - merged.len(), &mut seen, &mut merged)
                .await;
        }

        merged.shuffle(&mut rand::thread_rng());
        merged.truncate(target);
        stats.final_count = merged.len();

        (merged, stats)
    }

    /// Fill `missing` slots from popular, then new, excluding everything chosen so far.
    async fn backfill(
        &self,
        fetch: &FetchRequest<'_>,
        missing: usize,
        seen: &mut HashSet<Uuid>,
        merged: &mut Vec<Uuid>,
    ) -> usize {
        let start = merged.len();

        for strategy in [Strategy::Popular, Strategy::New] {
            let deficit = missing.saturating_sub(merged.len() - start);
            if deficit == 0 {
                break;
            }

            let grown = seen.clone();
            let request = FetchRequest {
                exclude: &grown,
                ..fetch.with_limit(deficit)
            };
            if let Some(ids) = self.run_strategy(strategy, request).await {
                for id in ids.into_iter().take(deficit) {
                    if seen.insert(id) {
                        merged.push(id);
                    }
                }
            }
        }

        let filled = merged.len() - start;
        if filled > 0 {
            debug!(user_id = %fetch.user_id, missing, filled, "Feed backfilled");
        }
        filled
    }

    /// Run one strategy under the per-strategy timeout. `None` on failure.
    async fn run_strategy(&self, strategy: Strategy, request: FetchRequest<'_>) -> Option<Vec<Uuid>> {
        let budget = self.config.strategy_timeout();
        let fetcher = self.strategies.get(strategy);

        let result = match timeout(budget, fetcher.fetch(&request)).await {
            Ok(result) => result,
            Err(_) => Err(RecommendationError::Timeout(budget)),
        };

        match result {
            Ok(ids) => {
                debug!(
                    user_id = %request.user_id,
                    strategy = strategy.as_str(),
                    requested = request.limit,
                    returned = ids.len(),
                    "Strategy fetched"
                );
                Some(ids)
            }
            Err(e) => {
                warn!(
                    user_id = %request.user_id,
                    strategy = strategy.as_str(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "Strategy failed, treating as empty"
                );
                None
            }
        }
    }
}
