//! Score thresholds shared by the engine, the notification rules, and callers.

/// Scores at or above this are high confidence / high priority.
pub const CONFIDENCE_HIGH: f64 = 0.8;

/// Scores at or above this (and below `CONFIDENCE_HIGH`) are medium.
pub const CONFIDENCE_MEDIUM: f64 = 0.6;

/// Reciprocal notifications to privileged seekers start here.
pub const RECIPROCAL_MIN_SCORE: f64 = 0.7;

/// Workflows above this score switch to call-led steps and gain the executive step.
pub const HIGH_VALUE_WORKFLOW_SCORE: f64 = 0.7;

/// Factor weights. Sum to 1.0.
pub const WEIGHT_INDUSTRY: f64 = 0.25;
pub const WEIGHT_ORGANIZATION: f64 = 0.20;
pub const WEIGHT_BEHAVIORAL: f64 = 0.20;
pub const WEIGHT_NETWORK: f64 = 0.15;
pub const WEIGHT_CONTEXTUAL: f64 = 0.10;
pub const WEIGHT_SEMANTIC: f64 = 0.10;

/// Bound on the summed rule adjustments, in either direction.
pub const MAX_ADJUSTMENT: f64 = 0.1;

/// Fuzzy duplicate at or above this blocks creation.
pub const FUZZY_DUPLICATE_THRESHOLD: f64 = 0.8;

/// Fuzzy duplicate at or above this is surfaced as a suggestion.
pub const FUZZY_SUGGESTION_THRESHOLD: f64 = 0.5;

/// Similar recent leads at or above this are surfaced as suggestions.
pub const SIMILAR_RECENT_THRESHOLD: f64 = 0.6;
