//! Per-factor compatibility functions. Pure; every missing input has a default.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use matchwise_common::{present, ActivityCounts, Profile};

use crate::similarity::{interest_tags, jaccard, normalize, token_overlap, tokens};

/// Industry score when no direction has both an industry and interests.
pub const INDUSTRY_BASELINE: f64 = 0.3;
/// Ceiling for partial (token) industry matches; exact tag matches score 1.0.
pub const INDUSTRY_PARTIAL_CAP: f64 = 0.8;
/// Industry tokens must be longer than this to count as shared.
const INDUSTRY_TOKEN_MIN_LEN: usize = 4;

/// Default for any sub-metric whose inputs are missing.
pub const NEUTRAL: f64 = 0.5;

/// Combined interactions at which a profile counts as fully active.
const ACTIVITY_SATURATION: f64 = 10.0;

pub const NETWORK_EXISTING_LINK: f64 = 0.8;
pub const NETWORK_PER_PEER: f64 = 0.1;
pub const NETWORK_PEER_CAP: f64 = 0.6;

const CONTEXT_ACTIVE_TODAY: f64 = 0.4;
const CONTEXT_COMPLEMENTARY: f64 = 0.3;
const CONTEXT_AVAILABILITY: f64 = 0.3;

/// Best alignment of one side's industry against the other side's interest tags.
pub fn industry_alignment(a: &Profile, b: &Profile) -> f64 {
    [
        (a.industry(), b.interests()),
        (b.industry(), a.interests()),
    ]
    .into_iter()
    .filter_map(|pair| match pair {
        (Some(industry), Some(interests)) => Some(directional_alignment(industry, interests)),
        _ => None,
    })
    .reduce(f64::max)
    .unwrap_or(INDUSTRY_BASELINE)
}

fn directional_alignment(industry: &str, interests: &str) -> f64 {
    let industry_lower = industry.trim().to_lowercase();
    if interest_tags(interests).iter().any(|tag| *tag == industry_lower) {
        return 1.0;
    }

    let industry_tokens = long_tokens(industry);
    if industry_tokens.is_empty() {
        return 0.0;
    }
    let interest_tokens = long_tokens(interests);
    let shared = industry_tokens.intersection(&interest_tokens).count();
    let fraction = shared as f64 / industry_tokens.len() as f64;
    (fraction * INDUSTRY_PARTIAL_CAP).min(INDUSTRY_PARTIAL_CAP)
}

fn long_tokens(s: &str) -> HashSet<String> {
    tokens(s)
        .into_iter()
        .filter(|t| t.chars().count() >= INDUSTRY_TOKEN_MIN_LEN)
        .collect()
}

/// Size-band proximity (40%), budget alignment (35%), business-model overlap (25%).
pub fn organization_compatibility(a: &Profile, b: &Profile) -> f64 {
    let size = match (a.size_band, b.size_band) {
        (Some(x), Some(y)) => x.proximity(&y),
        _ => NEUTRAL,
    };
    let budget = match (a.budget_band, b.budget_band) {
        (Some(x), Some(y)) => x.alignment(&y),
        _ => NEUTRAL,
    };
    let model = match (present(&a.business_model), present(&b.business_model)) {
        (Some(x), Some(y)) => token_overlap(x, y),
        _ => NEUTRAL,
    };
    0.40 * size + 0.35 * budget + 0.25 * model
}

/// Normalized activity of one profile; `None` means no history was available.
pub fn activity_level(counts: Option<&ActivityCounts>) -> f64 {
    match counts {
        Some(c) => (c.total() as f64 / ACTIVITY_SATURATION).min(1.0),
        None => NEUTRAL,
    }
}

/// Activity (40%), profile completeness (30%), communication-style match (30%).
pub fn behavioral(a: &Profile, b: &Profile, activity: f64) -> f64 {
    let completeness = (a.completeness() + b.completeness()) / 2.0;
    let style = match (
        present(&a.communication_style),
        present(&b.communication_style),
    ) {
        (Some(x), Some(y)) if normalize(x) == normalize(y) => 1.0,
        (Some(x), Some(y)) => token_overlap(x, y),
        _ => NEUTRAL,
    };
    0.40 * activity + 0.30 * completeness + 0.30 * style
}

pub fn network(already_linked: bool, shared_industry_peers: u32) -> f64 {
    if already_linked {
        NETWORK_EXISTING_LINK
    } else {
        (shared_industry_peers as f64 * NETWORK_PER_PEER).min(NETWORK_PEER_CAP)
    }
}

pub fn contextual(a: &Profile, b: &Profile, as_of: DateTime<Utc>) -> f64 {
    let today = as_of.date_naive();
    let active_today = |p: &Profile| p.last_active_at.is_some_and(|t| t.date_naive() == today);

    let mut score = 0.0;
    if active_today(a) && active_today(b) {
        score += CONTEXT_ACTIVE_TODAY;
    }
    if a.category.complements(&b.category) {
        score += CONTEXT_COMPLEMENTARY;
    }
    score += CONTEXT_AVAILABILITY * availability_overlap(a, b);
    score.min(1.0)
}

fn availability_overlap(a: &Profile, b: &Profile) -> f64 {
    if a.availability.is_empty() || b.availability.is_empty() {
        return NEUTRAL;
    }
    let left: HashSet<_> = a.availability.iter().collect();
    let right: HashSet<_> = b.availability.iter().collect();
    let union = left.union(&right).count();
    left.intersection(&right).count() as f64 / union as f64
}

/// Overlap of one side's self-description with the other side's interests.
pub fn semantic(a: &Profile, b: &Profile) -> f64 {
    let describe = |p: &Profile| {
        let mut text = String::new();
        for part in [p.biography(), present(&p.job_title), Some(p.category.label())]
            .into_iter()
            .flatten()
        {
            text.push_str(part);
            text.push(' ');
        }
        tokens(&text)
    };
    let interests = |p: &Profile| p.interests().map(tokens).unwrap_or_default();

    let forward = jaccard(&describe(a), &interests(b));
    let backward = jaccard(&describe(b), &interests(a));
    forward.max(backward)
}
