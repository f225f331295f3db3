//! Weighted multi-factor compatibility scoring.
//!
//! Six factors, fixed weights (see `matchwise_common::scoring`), then a bounded set of
//! rule adjustments. `Scorer::score` is a pure function of two profiles and their
//! pre-fetched `HistorySignals`, so identical inputs always produce identical output
//! and pairs can be scored in parallel.

pub mod factors;
pub mod signals;

use matchwise_common::{
    Profile, ScoreBreakdown, MAX_ADJUSTMENT, WEIGHT_BEHAVIORAL, WEIGHT_CONTEXTUAL,
    WEIGHT_INDUSTRY, WEIGHT_NETWORK, WEIGHT_ORGANIZATION, WEIGHT_SEMANTIC,
};

pub use signals::{role_pair, HistorySignals, NetworkSignal, Signal, SignalCollector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Factor {
    Industry,
    Organization,
    Behavioral,
    Network,
    Contextual,
    Semantic,
}

impl Factor {
    /// Table order; reasons are emitted in this order.
    pub const ALL: [Factor; 6] = [
        Factor::Industry,
        Factor::Organization,
        Factor::Behavioral,
        Factor::Network,
        Factor::Contextual,
        Factor::Semantic,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Factor::Industry => "industry_alignment",
            Factor::Organization => "organization_compatibility",
            Factor::Behavioral => "behavioral",
            Factor::Network => "network",
            Factor::Contextual => "contextual",
            Factor::Semantic => "semantic",
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Factor::Industry => WEIGHT_INDUSTRY,
            Factor::Organization => WEIGHT_ORGANIZATION,
            Factor::Behavioral => WEIGHT_BEHAVIORAL,
            Factor::Network => WEIGHT_NETWORK,
            Factor::Contextual => WEIGHT_CONTEXTUAL,
            Factor::Semantic => WEIGHT_SEMANTIC,
        }
    }

    /// A factor above this value earns a line in `reasons`.
    pub fn notable_threshold(&self) -> f64 {
        match self {
            Factor::Industry => 0.7,
            Factor::Organization => 0.6,
            Factor::Behavioral => 0.6,
            Factor::Network => 0.4,
            Factor::Contextual => 0.5,
            Factor::Semantic => 0.3,
        }
    }

    fn reason(&self, value: f64) -> String {
        let pct = (value * 100.0).round();
        match self {
            Factor::Industry => format!("Industry aligns with stated interests ({pct}%)"),
            Factor::Organization => format!("Compatible organization size and budget ({pct}%)"),
            Factor::Behavioral => format!("Similar engagement and communication style ({pct}%)"),
            Factor::Network => format!("Connected through a shared network ({pct}%)"),
            Factor::Contextual => format!("Good timing and complementary roles ({pct}%)"),
            Factor::Semantic => format!("Profile descriptions overlap with interests ({pct}%)"),
        }
    }
}

/// A factor whose input signal failed to load.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorError {
    pub factor: Factor,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub score: f64,
    pub reasons: Vec<String>,
    pub breakdown: ScoreBreakdown,
    pub errors: Vec<FactorError>,
}

impl ScoreOutcome {
    pub fn factor(&self, factor: Factor) -> f64 {
        self.breakdown.get(factor.key()).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer;

impl Scorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, a: &Profile, b: &Profile, history: &HistorySignals) -> ScoreOutcome {
        let mut breakdown = ScoreBreakdown::new();
        let mut errors = Vec::new();

        let mut record = |factor: Factor, value: Result<f64, String>| -> f64 {
            match value {
                Ok(v) => {
                    let v = v.clamp(0.0, 1.0);
                    breakdown.insert(factor.key().to_string(), v);
                    v
                }
                Err(message) => {
                    breakdown.insert(factor.key().to_string(), 0.0);
                    breakdown.insert(format!("{}_error", factor.key()), 1.0);
                    errors.push(FactorError { factor, message });
                    0.0
                }
            }
        };

        let industry = record(Factor::Industry, Ok(factors::industry_alignment(a, b)));
        let organization = record(
            Factor::Organization,
            Ok(factors::organization_compatibility(a, b)),
        );
        let behavioral = record(Factor::Behavioral, behavioral_input(a, b, history));
        let network = record(Factor::Network, network_input(history));
        let contextual = record(
            Factor::Contextual,
            Ok(factors::contextual(a, b, history.as_of)),
        );
        let semantic = record(Factor::Semantic, Ok(factors::semantic(a, b)));

        let values = [industry, organization, behavioral, network, contextual, semantic];
        let weighted: f64 = Factor::ALL
            .iter()
            .zip(values)
            .map(|(f, v)| f.weight() * v)
            .sum();

        let success = (a.completeness() + b.completeness()) / 2.0;
        let adjustment = adjustments(industry, organization, behavioral, network, contextual, success);
        breakdown.insert("adjustment".to_string(), adjustment);

        let score = (weighted + adjustment).clamp(0.0, 1.0);

        let reasons = Factor::ALL
            .iter()
            .zip(values)
            .filter(|(f, v)| *v > f.notable_threshold())
            .map(|(f, v)| f.reason(v))
            .collect();

        ScoreOutcome {
            score,
            reasons,
            breakdown,
            errors,
        }
    }
}

fn behavioral_input(a: &Profile, b: &Profile, history: &HistorySignals) -> Result<f64, String> {
    if let Some(msg) = history
        .activity_a
        .failure()
        .or_else(|| history.activity_b.failure())
    {
        return Err(msg.to_string());
    }
    let activity = (factors::activity_level(history.activity_a.known())
        + factors::activity_level(history.activity_b.known()))
        / 2.0;
    Ok(factors::behavioral(a, b, activity))
}

fn network_input(history: &HistorySignals) -> Result<f64, String> {
    match &history.network {
        Signal::Known(n) => Ok(factors::network(n.already_linked, n.shared_industry_peers)),
        Signal::Missing => Ok(factors::network(false, 0)),
        Signal::Failed(msg) => Err(msg.clone()),
    }
}

/// Rule bonuses and penalties, bounded to ±`MAX_ADJUSTMENT` in total.
fn adjustments(
    industry: f64,
    organization: f64,
    behavioral: f64,
    network: f64,
    contextual: f64,
    historical_success: f64,
) -> f64 {
    let mut total: f64 = 0.0;
    if industry > 0.7 && behavioral > 0.5 {
        total += 0.05;
    }
    if network > 0.4 && contextual > 0.3 {
        total += 0.04;
    }
    if organization < 0.3 && behavioral < 0.3 {
        total -= 0.03;
    }
    if historical_success > 0.6 {
        total += 0.06;
    }
    total.clamp(-MAX_ADJUSTMENT, MAX_ADJUSTMENT)
}
