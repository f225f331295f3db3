//! Subject-centric entry point: cached recommendations for one profile.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use matchwise_common::{EngineConfig, MatchError, Profile, Recommendation};

use crate::cache::{CacheLayer, CacheNamespace};
use crate::cancel::ensure_active;
use crate::gateway::EntityGateway;
use crate::notify::{MatchTrigger, NotificationPlanner};
use crate::recommend::{GenerateRequest, GenerationReport, RecommendationGenerator};
use crate::stats::BatchSummary;

/// How many of a fresh batch's top results are run through the alert rules.
const NOTIFY_TOP: usize = 5;
const BATCH_COUNTER_KEY: &str = "recommendation_batches";

/// Per-call overrides. Unset fields fall back to `EngineConfig`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendOptions {
    pub min_score: Option<f64>,
    pub max_results: Option<usize>,
    pub include_existing: bool,
    /// Skip the cache read and overwrite whatever is there.
    pub force_refresh: bool,
}

#[derive(Debug, Clone)]
pub struct RecommendationSet {
    pub subject_id: Uuid,
    pub recommendations: Vec<Recommendation>,
    /// Served from cache; nothing was generated or notified.
    pub cached: bool,
    /// Present only for fresh computations.
    pub report: Option<GenerationReport>,
    pub notifications: BatchSummary,
}

#[derive(Clone)]
pub struct MatchService {
    gateway: EntityGateway,
    generator: RecommendationGenerator,
    planner: NotificationPlanner,
    cache: CacheLayer,
    config: EngineConfig,
}

impl MatchService {
    pub fn new(
        gateway: EntityGateway,
        generator: RecommendationGenerator,
        planner: NotificationPlanner,
        cache: CacheLayer,
        config: EngineConfig,
    ) -> Self {
        Self {
            gateway,
            generator,
            planner,
            cache,
            config,
        }
    }

    /// Ranked counterparts for `subject_id`: seekers for a provider, providers
    /// for a seeker.
    pub async fn recommendations_for(
        &self,
        subject_id: Uuid,
        options: RecommendOptions,
        cancel: &CancellationToken,
    ) -> Result<RecommendationSet, MatchError> {
        ensure_active(cancel)?;
        let subject = self.gateway.require(subject_id, cancel).await?;

        let (providers, seekers) = if subject.category.is_provider() {
            (vec![subject.clone()], self.gateway.seekers(cancel).await?)
        } else {
            (self.gateway.providers(cancel).await?, vec![subject.clone()])
        };
        let candidates: HashMap<Uuid, Profile> = providers
            .iter()
            .chain(seekers.iter())
            .map(|p| (p.id, p.clone()))
            .collect();

        let min_score = options.min_score.unwrap_or(self.config.min_score);
        let max_results = options.max_results.unwrap_or(self.config.max_results);
        let key = format!(
            "{subject_id}:{min_score:.3}:{max_results}:{}",
            options.include_existing
        );
        let request = GenerateRequest::builder()
            .providers(providers)
            .seekers(seekers)
            .min_score(min_score)
            .max_results(max_results)
            .include_existing(options.include_existing)
            .build();

        let mut fresh: Option<GenerationReport> = None;
        let fresh_slot = &mut fresh;
        let generator = &self.generator;
        let recommendations: Vec<Recommendation> = self
            .cache
            .get_or_compute(
                CacheNamespace::Recommendations.as_str(),
                &key,
                self.config.recommendation_ttl,
                options.force_refresh,
                cancel,
                move || async move {
                    let report = generator.generate(request, cancel).await?;
                    let recommendations = report.recommendations.clone();
                    *fresh_slot = Some(report);
                    Ok(recommendations)
                },
            )
            .await?;

        let Some(report) = fresh else {
            info!(subject_id = %subject_id, count = recommendations.len(), "Recommendations served from cache");
            return Ok(RecommendationSet {
                subject_id,
                recommendations,
                cached: true,
                report: None,
                notifications: BatchSummary::default(),
            });
        };

        self.cache
            .increment(
                CacheNamespace::Statistics.as_str(),
                BATCH_COUNTER_KEY,
                1,
                CacheNamespace::Statistics.default_ttl(),
                cancel,
            )
            .await?;

        let notifications = self
            .notify_top(&recommendations, &candidates, cancel)
            .await?;

        Ok(RecommendationSet {
            subject_id,
            recommendations,
            cached: false,
            report: Some(report),
            notifications,
        })
    }

    async fn notify_top(
        &self,
        recommendations: &[Recommendation],
        candidates: &HashMap<Uuid, Profile>,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary, MatchError> {
        let mut summary = BatchSummary::default();
        for rec in recommendations.iter().take(NOTIFY_TOP) {
            let (Some(provider), Some(seeker)) = (
                candidates.get(&rec.provider_id),
                candidates.get(&rec.seeker_id),
            ) else {
                warn!(recommendation_id = %rec.id, "Recommended profiles not in candidate set");
                continue;
            };
            let trigger = MatchTrigger {
                reasons: rec.reasons.clone(),
                recommendation_id: Some(rec.id),
                ..MatchTrigger::new(provider.clone(), seeker.clone(), rec.score)
            };
            let report = self.planner.evaluate(&trigger, cancel).await?;
            summary.attempted += report.summary.attempted;
            summary.succeeded += report.summary.succeeded;
            summary.failed.extend(report.summary.failed);
        }
        Ok(summary)
    }
}
