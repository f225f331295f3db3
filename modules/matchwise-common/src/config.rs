use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::MatchError;

/// Longest accepted day window for lookbacks and TTLs.
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Engine tuning, loaded from `MATCHWISE_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    // Recommendation batches
    pub min_score: f64,
    pub max_results: usize,
    /// Concurrent pair scorers in a batch.
    pub worker_concurrency: usize,
    /// Concurrent recommendation writes in a batch.
    pub write_concurrency: usize,

    // Deduplication
    pub dedup_lookback_days: i64,
    pub recent_window_days: i64,
    pub max_similar_suggestions: usize,

    // Signals
    pub activity_lookback_days: i64,

    // Cache
    pub recommendation_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_score: 0.5,
            max_results: 20,
            worker_concurrency: 8,
            write_concurrency: 4,
            dedup_lookback_days: 30,
            recent_window_days: 7,
            max_similar_suggestions: 3,
            activity_lookback_days: 14,
            recommendation_ttl: Duration::from_secs(30 * 60),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by any `MATCHWISE_*` variables that are set.
    pub fn from_env() -> Result<Self, MatchError> {
        let defaults = Self::default();
        let config = Self {
            min_score: optional_env("MATCHWISE_MIN_SCORE")?.unwrap_or(defaults.min_score),
            max_results: optional_env("MATCHWISE_MAX_RESULTS")?.unwrap_or(defaults.max_results),
            worker_concurrency: optional_env("MATCHWISE_WORKERS")?
                .unwrap_or(defaults.worker_concurrency),
            write_concurrency: optional_env("MATCHWISE_WRITE_WORKERS")?
                .unwrap_or(defaults.write_concurrency),
            dedup_lookback_days: optional_env("MATCHWISE_DEDUP_LOOKBACK_DAYS")?
                .unwrap_or(defaults.dedup_lookback_days),
            recent_window_days: optional_env("MATCHWISE_RECENT_WINDOW_DAYS")?
                .unwrap_or(defaults.recent_window_days),
            max_similar_suggestions: optional_env("MATCHWISE_MAX_SIMILAR_SUGGESTIONS")?
                .unwrap_or(defaults.max_similar_suggestions),
            activity_lookback_days: optional_env("MATCHWISE_ACTIVITY_LOOKBACK_DAYS")?
                .unwrap_or(defaults.activity_lookback_days),
            recommendation_ttl: optional_env::<u64>("MATCHWISE_RECOMMENDATION_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.recommendation_ttl),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(MatchError::Config(format!(
                "min_score {} is outside [0, 1]",
                self.min_score
            )));
        }
        if self.worker_concurrency == 0 || self.write_concurrency == 0 {
            return Err(MatchError::Config(
                "worker and write concurrency must be at least 1".to_string(),
            ));
        }
        for (name, days) in [
            ("dedup_lookback_days", self.dedup_lookback_days),
            ("recent_window_days", self.recent_window_days),
            ("activity_lookback_days", self.activity_lookback_days),
        ] {
            if !(1..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(MatchError::Config(format!(
                    "{name} {days} is outside [1, {MAX_WINDOW_DAYS}]"
                )));
            }
        }
        if self.recommendation_ttl.is_zero() || self.recommendation_ttl > max_window() {
            return Err(MatchError::Config(format!(
                "recommendation_ttl {}s is outside [1s, {MAX_WINDOW_DAYS} days]",
                self.recommendation_ttl.as_secs()
            )));
        }
        if self.dedup_lookback_days < self.recent_window_days {
            return Err(MatchError::Config(
                "dedup lookback must cover the recent window".to_string(),
            ));
        }
        Ok(())
    }

    pub fn log(&self) {
        info!(
            min_score = self.min_score,
            max_results = self.max_results,
            workers = self.worker_concurrency,
            dedup_lookback_days = self.dedup_lookback_days,
            recent_window_days = self.recent_window_days,
            recommendation_ttl_secs = self.recommendation_ttl.as_secs(),
            "Engine config loaded"
        );
    }
}

/// `MAX_WINDOW_DAYS` as a std duration.
pub fn max_window() -> Duration {
    Duration::from_secs(MAX_WINDOW_DAYS as u64 * 24 * 60 * 60)
}

/// A day window as a chrono duration, clamped to `[0, MAX_WINDOW_DAYS]`.
pub fn day_window(days: i64) -> chrono::Duration {
    chrono::Duration::days(days.clamp(0, MAX_WINDOW_DAYS))
}

/// `now - window`, saturating at the earliest representable instant.
pub fn window_start(now: DateTime<Utc>, window: chrono::Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn optional_env<T: FromStr>(key: &str) -> Result<Option<T>, MatchError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| MatchError::Config(format!("{key} has an unparseable value: {raw}"))),
        Err(_) => Ok(None),
    }
}
