pub mod cache;
pub mod cancel;
pub mod dedup;
pub mod gateway;
pub mod leads;
pub mod memory;
pub mod notify;
pub mod recommend;
pub mod scoring;
pub mod service;
pub mod similarity;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod workflow;

pub use cache::{CacheLayer, CacheNamespace};
pub use dedup::{DuplicateCheck, DuplicateSuggestion, Deduplicator, SuggestionTier};
pub use gateway::EntityGateway;
pub use leads::{CreateOutcome, LeadService};
pub use notify::{MatchTrigger, NotificationPlanner, NotifyReport};
pub use recommend::{GenerateRequest, GenerationReport, RecommendationGenerator};
pub use scoring::{HistorySignals, ScoreOutcome, Scorer};
pub use service::{MatchService, RecommendOptions, RecommendationSet};
pub use stats::BatchSummary;
pub use workflow::plan_workflow;
