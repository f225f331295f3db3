//! Batch recommendation generation.
//!
//! Fan-out: providers × seekers are enumerated lazily and scored on a bounded
//! `buffer_unordered` pool. Fan-in: survivors are sorted (score desc, then pair
//! key asc) and truncated once every worker has finished, so output order never
//! depends on completion order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use matchwise_common::{
    EngineConfig, MatchError, PairKey, Profile, Recommendation, ValidationError,
};

use crate::cancel::{cancellable, ensure_active};
use crate::dedup::Deduplicator;
use crate::scoring::{ScoreOutcome, Scorer, SignalCollector};
use crate::stats::BatchSummary;
use crate::traits::RecommendationStore;

#[derive(Debug, Clone, TypedBuilder)]
pub struct GenerateRequest {
    pub providers: Vec<Profile>,
    pub seekers: Vec<Profile>,
    #[builder(default = 0.5)]
    pub min_score: f64,
    #[builder(default = 20)]
    pub max_results: usize,
    /// Keep pairs that already have a relationship.
    #[builder(default = false)]
    pub include_existing: bool,
    #[builder(default = Utc::now())]
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    /// Ranked results, regardless of whether persisting them succeeded.
    pub recommendations: Vec<Recommendation>,
    /// Per-pair scoring attempts; a pair fails when its existence check errors.
    pub scoring: BatchSummary,
    /// Per-recommendation persistence attempts.
    pub writes: BatchSummary,
    pub pairs_considered: u32,
    pub pairs_skipped_existing: u32,
    pub pairs_below_threshold: u32,
    /// Factors zeroed because an input signal failed to load.
    pub factor_errors: u32,
}

enum PairOutcome {
    Scored { pair: PairKey, outcome: ScoreOutcome },
    Existing,
    Failed { pair: PairKey, reason: String },
}

#[derive(Clone)]
pub struct RecommendationGenerator {
    dedup: Deduplicator,
    signals: SignalCollector,
    scorer: Scorer,
    store: Arc<dyn RecommendationStore>,
    worker_concurrency: usize,
    write_concurrency: usize,
}

impl RecommendationGenerator {
    pub fn new(
        dedup: Deduplicator,
        signals: SignalCollector,
        scorer: Scorer,
        store: Arc<dyn RecommendationStore>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            dedup,
            signals,
            scorer,
            store,
            worker_concurrency: config.worker_concurrency.max(1),
            write_concurrency: config.write_concurrency.max(1),
        }
    }

    pub async fn generate(
        &self,
        request: GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationReport, MatchError> {
        ensure_active(cancel)?;
        if !(0.0..=1.0).contains(&request.min_score) {
            return Err(ValidationError::ScoreOutOfRange(request.min_score).into());
        }

        let start = Instant::now();
        let GenerateRequest {
            providers,
            seekers,
            min_score,
            max_results,
            include_existing,
            as_of,
        } = request;

        let signals = self.signals.for_batch();
        let mut seen: HashSet<PairKey> = HashSet::new();
        let pairs = providers
            .iter()
            .flat_map(|p| seekers.iter().map(move |s| (p, s)))
            .filter(|(p, s)| {
                let key = PairKey::new(p.id, s.id);
                !key.is_self_pair() && seen.insert(key)
            });

        let mut outcomes = stream::iter(pairs)
            .map(|(p, s)| self.evaluate(&signals, p, s, include_existing, as_of, cancel))
            .buffer_unordered(self.worker_concurrency);

        let mut report = GenerationReport::default();
        let mut kept: Vec<(PairKey, ScoreOutcome)> = Vec::new();
        while let Some(outcome) = outcomes.next().await {
            report.pairs_considered += 1;
            match outcome? {
                PairOutcome::Existing => {
                    report.pairs_skipped_existing += 1;
                }
                PairOutcome::Failed { pair, reason } => {
                    report.scoring.record_failure(pair.to_string(), reason);
                }
                PairOutcome::Scored { pair, outcome } => {
                    report.scoring.record_success();
                    report.factor_errors += outcome.errors.len() as u32;
                    if outcome.score >= min_score {
                        kept.push((pair, outcome));
                    } else {
                        report.pairs_below_threshold += 1;
                    }
                }
            }
        }
        drop(outcomes);

        kept.sort_by(|(pa, a), (pb, b)| b.score.total_cmp(&a.score).then(pa.cmp(pb)));
        kept.truncate(max_results);

        report.recommendations = kept
            .into_iter()
            .map(|(pair, outcome)| Recommendation::new(pair, outcome.score, outcome.reasons, as_of))
            .collect();

        report.writes = self.persist(&report.recommendations, cancel).await?;

        info!(
            pairs = report.pairs_considered,
            skipped_existing = report.pairs_skipped_existing,
            kept = report.recommendations.len(),
            failed_writes = report.writes.failed_count(),
            factor_errors = report.factor_errors,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recommendation batch complete"
        );

        Ok(report)
    }

    async fn evaluate(
        &self,
        signals: &SignalCollector,
        provider: &Profile,
        seeker: &Profile,
        include_existing: bool,
        as_of: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<PairOutcome, MatchError> {
        let pair = PairKey::new(provider.id, seeker.id);

        if !include_existing {
            match self.dedup.exact_match(pair, cancel).await {
                Ok(Some(_)) => return Ok(PairOutcome::Existing),
                Ok(None) => {}
                Err(MatchError::Cancelled) => return Err(MatchError::Cancelled),
                Err(e) => {
                    warn!(pair = %pair, error = %e, "Existence check failed, skipping pair");
                    return Ok(PairOutcome::Failed {
                        pair,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let history = signals.collect(provider, seeker, as_of, cancel).await?;
        let outcome = self.scorer.score(provider, seeker, &history);
        Ok(PairOutcome::Scored { pair, outcome })
    }

    /// Write each recommendation independently; failures are counted, not raised.
    async fn persist(
        &self,
        recommendations: &[Recommendation],
        cancel: &CancellationToken,
    ) -> Result<BatchSummary, MatchError> {
        let results: Vec<_> = stream::iter(recommendations)
            .map(|rec| async move { (rec, cancellable(cancel, self.store.save(rec)).await) })
            .buffer_unordered(self.write_concurrency)
            .collect()
            .await;

        let mut summary = BatchSummary::default();
        for (rec, result) in results {
            match result? {
                Ok(()) => summary.record_success(),
                Err(e) => {
                    warn!(recommendation_id = %rec.id, error = %e, "Failed to persist recommendation");
                    summary.record_failure(rec.id.to_string(), e.to_string());
                }
            }
        }
        Ok(summary)
    }
}
