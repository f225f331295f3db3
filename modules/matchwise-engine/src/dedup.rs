//! Three-tier duplicate detection for provider/seeker relationships.
//!
//! - Tier 1: exact pair match. Blocks.
//! - Tier 2: fuzzy identity match against relationships touching either side
//!   within the lookback window. Blocks at >= 0.8, suggests at >= 0.5.
//! - Tier 3: profile-pair similarity against all recent relationships. Never
//!   blocks; surfaces the closest few as suggestions.
//!
//! The store's unique constraint stays authoritative. This is the fast path.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use matchwise_common::{
    day_window, window_start, EngineConfig, MatchError, PairKey, Profile, Relationship,
    FUZZY_DUPLICATE_THRESHOLD, FUZZY_SUGGESTION_THRESHOLD, SIMILAR_RECENT_THRESHOLD,
};

use crate::cancel::store_call;
use crate::gateway::EntityGateway;
use crate::similarity::{email_similarity, phones_match, string_similarity, token_overlap};
use crate::traits::RelationshipStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuggestionTier {
    /// Same person or company under clerical variation.
    Fuzzy,
    /// A recent lead with a very similar profile pairing.
    SimilarRecent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateSuggestion {
    pub relationship_id: Uuid,
    pub pair: PairKey,
    pub confidence: f64,
    pub tier: SuggestionTier,
}

impl std::fmt::Display for DuplicateSuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.tier {
            SuggestionTier::Fuzzy => "possible duplicate",
            SuggestionTier::SimilarRecent => "similar recent lead",
        };
        write!(
            f,
            "{label}: relationship {} ({:.0}% match)",
            self.relationship_id,
            self.confidence * 100.0
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateCheck {
    /// Creation should be blocked.
    pub exists: bool,
    pub matched_id: Option<Uuid>,
    pub confidence: f64,
    /// Advisory, non-blocking matches.
    pub suggestions: Vec<DuplicateSuggestion>,
}

impl DuplicateCheck {
    pub fn none() -> Self {
        Self {
            exists: false,
            matched_id: None,
            confidence: 0.0,
            suggestions: Vec::new(),
        }
    }

    pub fn exact(matched_id: Uuid) -> Self {
        Self {
            exists: true,
            matched_id: Some(matched_id),
            confidence: 1.0,
            suggestions: Vec::new(),
        }
    }

    pub fn suggestion_lines(&self) -> Vec<String> {
        self.suggestions.iter().map(ToString::to_string).collect()
    }
}

#[derive(Clone)]
pub struct Deduplicator {
    relationships: Arc<dyn RelationshipStore>,
    gateway: EntityGateway,
    lookback: Duration,
    recent_window: Duration,
    max_similar: usize,
}

impl Deduplicator {
    pub fn new(
        relationships: Arc<dyn RelationshipStore>,
        gateway: EntityGateway,
        config: &EngineConfig,
    ) -> Self {
        Self {
            relationships,
            gateway,
            lookback: day_window(config.dedup_lookback_days),
            recent_window: day_window(config.recent_window_days),
            max_similar: config.max_similar_suggestions,
        }
    }

    /// Tier 1 only. Used by batch generation to skip already-linked pairs.
    pub async fn exact_match(
        &self,
        pair: PairKey,
        cancel: &CancellationToken,
    ) -> Result<Option<Uuid>, MatchError> {
        let existing = store_call(cancel, self.relationships.find_by_pair(pair)).await?;
        Ok(existing.map(|r| r.id))
    }

    pub async fn check_duplicate(
        &self,
        provider_id: Uuid,
        seeker_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<DuplicateCheck, MatchError> {
        let pair = PairKey::new(provider_id, seeker_id);

        if let Some(id) = self.exact_match(pair, cancel).await? {
            debug!(pair = %pair, relationship_id = %id, "Exact duplicate");
            return Ok(DuplicateCheck::exact(id));
        }

        let incoming = self.gateway.find_many([provider_id, seeker_id], cancel).await?;
        let (Some(provider), Some(seeker)) = (incoming.get(&provider_id), incoming.get(&seeker_id))
        else {
            warn!(pair = %pair, "Profiles missing, skipping fuzzy duplicate tiers");
            return Ok(DuplicateCheck::none());
        };

        let now = Utc::now();
        let mut check = DuplicateCheck::none();
        let mut examined: HashSet<Uuid> = HashSet::new();

        // --- Tier 2: fuzzy identity match ---
        let touching = self.touching(pair, window_start(now, self.lookback), cancel).await?;
        let counterpart_ids = touching.iter().flat_map(|r| [r.provider_id, r.seeker_id]);
        let known = self.gateway.find_many(counterpart_ids, cancel).await?;

        let mut best: Option<(f64, &Relationship)> = None;
        for rel in &touching {
            examined.insert(rel.id);
            let similarity = if rel.provider_id == provider_id {
                known
                    .get(&rel.seeker_id)
                    .map(|existing| identity_similarity(seeker, existing))
            } else if rel.seeker_id == seeker_id {
                known
                    .get(&rel.provider_id)
                    .map(|existing| identity_similarity(provider, existing))
            } else {
                None
            };
            let Some(similarity) = similarity else {
                continue;
            };

            if similarity >= FUZZY_DUPLICATE_THRESHOLD {
                let better = match best {
                    None => true,
                    Some((score, current)) => {
                        similarity > score || (similarity == score && rel.id < current.id)
                    }
                };
                if better {
                    best = Some((similarity, rel));
                }
            } else if similarity >= FUZZY_SUGGESTION_THRESHOLD {
                check.suggestions.push(DuplicateSuggestion {
                    relationship_id: rel.id,
                    pair: rel.pair(),
                    confidence: similarity,
                    tier: SuggestionTier::Fuzzy,
                });
            }
        }

        if let Some((confidence, rel)) = best {
            info!(
                pair = %pair,
                matched = %rel.id,
                confidence,
                "Fuzzy duplicate detected"
            );
            check.exists = true;
            check.matched_id = Some(rel.id);
            check.confidence = confidence;
        }

        // --- Tier 3: similar recent leads ---
        let recent = store_call(
            cancel,
            self.relationships.find_recent(window_start(now, self.recent_window)),
        )
        .await?;
        let recent: Vec<Relationship> = recent
            .into_iter()
            .filter(|r| !examined.contains(&r.id) && r.pair() != pair)
            .collect();
        let recent_ids = recent.iter().flat_map(|r| [r.provider_id, r.seeker_id]);
        let recent_profiles = self.gateway.find_many(recent_ids, cancel).await?;

        let mut similar: Vec<DuplicateSuggestion> = recent
            .iter()
            .filter_map(|rel| {
                let other_provider = recent_profiles.get(&rel.provider_id)?;
                let other_seeker = recent_profiles.get(&rel.seeker_id)?;
                let confidence = pair_similarity((provider, seeker), (other_provider, other_seeker));
                (confidence >= SIMILAR_RECENT_THRESHOLD).then(|| DuplicateSuggestion {
                    relationship_id: rel.id,
                    pair: rel.pair(),
                    confidence,
                    tier: SuggestionTier::SimilarRecent,
                })
            })
            .collect();
        similar.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(a.relationship_id.cmp(&b.relationship_id))
        });
        similar.truncate(self.max_similar);

        check.suggestions.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(a.relationship_id.cmp(&b.relationship_id))
        });
        check.suggestions.extend(similar);

        Ok(check)
    }

    async fn touching(
        &self,
        pair: PairKey,
        since: chrono::DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Relationship>, MatchError> {
        let mut by_id: HashMap<Uuid, Relationship> = HashMap::new();
        for id in [pair.provider_id, pair.seeker_id] {
            for rel in store_call(cancel, self.relationships.find_for_profile(id, since)).await? {
                if rel.pair() != pair {
                    by_id.insert(rel.id, rel);
                }
            }
        }
        let mut touching: Vec<Relationship> = by_id.into_values().collect();
        touching.sort_by_key(|r| r.id);
        Ok(touching)
    }
}

/// Weighted identity similarity of two profiles: email 0.3, organization 0.25,
/// display name 0.2, phone 0.15, industry/interest overlap 0.1.
pub fn identity_similarity(a: &Profile, b: &Profile) -> f64 {
    let email = match (a.email(), b.email()) {
        (Some(x), Some(y)) => email_similarity(x, y),
        _ => 0.0,
    };
    let organization = match (a.organization(), b.organization()) {
        (Some(x), Some(y)) => string_similarity(x, y),
        _ => 0.0,
    };
    let name = string_similarity(&a.display_name, &b.display_name);
    let phone = match (a.phone(), b.phone()) {
        (Some(x), Some(y)) if phones_match(x, y) => 1.0,
        _ => 0.0,
    };
    let topics = token_overlap(&topic_text(a), &topic_text(b));

    0.30 * email + 0.25 * organization + 0.20 * name + 0.15 * phone + 0.10 * topics
}

fn topic_text(p: &Profile) -> String {
    [p.industry(), p.interests()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity of two provider/seeker pairings: industry 0.3, size band 0.2,
/// interests 0.25, exact budget 0.15, category pair 0.1. Per-side terms are
/// averaged across the provider and seeker sides.
pub fn pair_similarity(incoming: (&Profile, &Profile), existing: (&Profile, &Profile)) -> f64 {
    let sides = [(incoming.0, existing.0), (incoming.1, existing.1)];

    let industry = side_mean(&sides, |x, y| match (x.industry(), y.industry()) {
        (Some(a), Some(b)) => string_similarity(a, b),
        _ => 0.0,
    });
    let size = side_mean(&sides, |x, y| match (x.size_band, y.size_band) {
        (Some(a), Some(b)) => a.proximity(&b),
        _ => 0.0,
    });
    let interests = side_mean(&sides, |x, y| match (x.interests(), y.interests()) {
        (Some(a), Some(b)) => token_overlap(a, b),
        _ => 0.0,
    });
    let budget = side_mean(&sides, |x, y| match (x.budget_band, y.budget_band) {
        (Some(a), Some(b)) if a == b => 1.0,
        _ => 0.0,
    });
    let category = if incoming.0.category == existing.0.category
        && incoming.1.category == existing.1.category
    {
        1.0
    } else {
        0.0
    };

    0.30 * industry + 0.20 * size + 0.25 * interests + 0.15 * budget + 0.10 * category
}

fn side_mean(sides: &[(&Profile, &Profile); 2], f: fn(&Profile, &Profile) -> f64) -> f64 {
    sides.iter().map(|(x, y)| f(x, y)).sum::<f64>() / sides.len() as f64
}
