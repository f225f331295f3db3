use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::scoring::{CONFIDENCE_HIGH, CONFIDENCE_MEDIUM};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

// --- Enums ---

/// Which side of the pairing a profile sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Exhibitor, sponsor, vendor.
    Provider,
    /// Regular attendee.
    Seeker,
    /// VIP or hosted buyer. Matched as a seeker, notified reciprocally.
    PrivilegedSeeker,
}

impl Category {
    pub fn is_provider(&self) -> bool {
        matches!(self, Category::Provider)
    }

    pub fn is_seeker(&self) -> bool {
        matches!(self, Category::Seeker | Category::PrivilegedSeeker)
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Category::PrivilegedSeeker)
    }

    /// Provider on one side, any kind of seeker on the other.
    pub fn complements(&self, other: &Category) -> bool {
        (self.is_provider() && other.is_seeker()) || (self.is_seeker() && other.is_provider())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Provider => "provider exhibitor",
            Category::Seeker => "seeker attendee",
            Category::PrivilegedSeeker => "seeker hosted buyer",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Provider => write!(f, "Provider"),
            Category::Seeker => write!(f, "Seeker"),
            Category::PrivilegedSeeker => write!(f, "PrivilegedSeeker"),
        }
    }
}

/// Headcount band of the profile's organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SizeBand {
    /// 1-10
    Micro,
    /// 11-50
    Small,
    /// 51-250
    Medium,
    /// 251-1000
    Large,
    /// 1000+
    Enterprise,
}

impl SizeBand {
    pub const MAX_RANK: u8 = 4;

    pub fn rank(&self) -> u8 {
        *self as u8
    }

    /// 1.0 for the same band, falling linearly to 0.0 at the opposite ends.
    pub fn proximity(&self, other: &SizeBand) -> f64 {
        let gap = self.rank().abs_diff(other.rank()) as f64;
        1.0 - gap / Self::MAX_RANK as f64
    }
}

/// Spend tier: a seeker's budget or a provider's pricing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BudgetBand {
    Low,
    Medium,
    High,
    Premium,
}

impl BudgetBand {
    pub const MAX_RANK: u8 = 3;

    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn alignment(&self, other: &BudgetBand) -> f64 {
        let gap = self.rank().abs_diff(other.rank()) as f64;
        1.0 - gap / Self::MAX_RANK as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Closed,
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeadStatus::New => write!(f, "new"),
            LeadStatus::Contacted => write!(f, "contacted"),
            LeadStatus::Qualified => write!(f, "qualified"),
            LeadStatus::Converted => write!(f, "converted"),
            LeadStatus::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Scan,
    Manual,
    Recommendation,
}

/// Follow-up priority, derived from score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// score >= 0.8 → High, 0.6 <= score < 0.8 → Medium, else Low.
    pub fn from_score(score: f64) -> Self {
        if score >= CONFIDENCE_HIGH {
            Priority::High
        } else if score >= CONFIDENCE_MEDIUM {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

/// Coarse classification of a recommendation score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBucket {
    High,
    Medium,
    Low,
}

impl ConfidenceBucket {
    pub fn from_score(score: f64) -> Self {
        if score >= CONFIDENCE_HIGH {
            ConfidenceBucket::High
        } else if score >= CONFIDENCE_MEDIUM {
            ConfidenceBucket::Medium
        } else {
            ConfidenceBucket::Low
        }
    }
}

// --- Profile ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NotificationPreferences {
    /// Whether high-value matches also produce an escalation message.
    pub escalation_enabled: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            escalation_enabled: true,
        }
    }
}

/// A participant on either side of the pairing. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    #[serde(default)]
    pub organization: Option<String>,
    pub category: Category,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub size_band: Option<SizeBand>,
    /// Free-text interest tags, comma separated.
    #[serde(default)]
    pub interests: Option<String>,
    #[serde(default)]
    pub budget_band: Option<BudgetBand>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub business_model: Option<String>,
    #[serde(default)]
    pub communication_style: Option<String>,
    #[serde(default)]
    pub availability: Vec<DayPart>,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub social_links: Vec<String>,
    #[serde(default)]
    pub preferences: NotificationPreferences,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Minimal profile with every optional field empty.
    pub fn new(id: Uuid, display_name: impl Into<String>, category: Category) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            organization: None,
            category,
            job_title: None,
            industry: None,
            size_band: None,
            interests: None,
            budget_band: None,
            biography: None,
            business_model: None,
            communication_style: None,
            availability: Vec::new(),
            contact: ContactInfo::default(),
            social_links: Vec::new(),
            preferences: NotificationPreferences::default(),
            created_at: Utc::now(),
            last_active_at: None,
        }
    }

    /// Schema checks applied once when a profile crosses the gateway.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::NilId("profile"));
        }
        if self.display_name.trim().is_empty() {
            return Err(ValidationError::EmptyDisplayName(self.id));
        }
        if let Some(email) = present(&self.contact.email) {
            if !EMAIL_RE.is_match(email) {
                return Err(ValidationError::InvalidEmail(email.to_string()));
            }
        }
        Ok(())
    }

    /// Fraction of the optional descriptive fields that are populated.
    pub fn completeness(&self) -> f64 {
        let fields = [
            present(&self.organization).is_some(),
            present(&self.job_title).is_some(),
            present(&self.industry).is_some(),
            self.size_band.is_some(),
            present(&self.interests).is_some(),
            self.budget_band.is_some(),
            present(&self.biography).is_some(),
            present(&self.contact.email).is_some(),
            present(&self.contact.phone).is_some(),
            !self.social_links.is_empty(),
        ];
        let filled = fields.iter().filter(|f| **f).count();
        filled as f64 / fields.len() as f64
    }

    pub fn organization(&self) -> Option<&str> {
        present(&self.organization)
    }

    pub fn industry(&self) -> Option<&str> {
        present(&self.industry)
    }

    pub fn interests(&self) -> Option<&str> {
        present(&self.interests)
    }

    pub fn biography(&self) -> Option<&str> {
        present(&self.biography)
    }

    pub fn email(&self) -> Option<&str> {
        present(&self.contact.email)
    }

    pub fn phone(&self) -> Option<&str> {
        present(&self.contact.phone)
    }
}

/// Treat blank strings the same as absent ones.
pub fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// --- Pairs ---

/// Role-ordered pair identity. Orders by provider, then seeker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PairKey {
    pub provider_id: Uuid,
    pub seeker_id: Uuid,
}

impl PairKey {
    pub fn new(provider_id: Uuid, seeker_id: Uuid) -> Self {
        Self {
            provider_id,
            seeker_id,
        }
    }

    pub fn is_self_pair(&self) -> bool {
        self.provider_id == self.seeker_id
    }

    pub fn touches(&self, id: Uuid) -> bool {
        self.provider_id == id || self.seeker_id == id
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider_id, self.seeker_id)
    }
}

// --- Relationship ---

/// A persisted, de-duplicated lead between a provider and a seeker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Relationship {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub seeker_id: Uuid,
    pub score: f64,
    pub status: LeadStatus,
    pub priority: Priority,
    pub source: LeadSource,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Relationship {
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.provider_id, self.seeker_id)
    }
}

/// Caller input for creating a relationship. `score` is computed when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RelationshipDraft {
    pub provider_id: Uuid,
    pub seeker_id: Uuid,
    #[serde(default)]
    pub score: Option<f64>,
    pub source: LeadSource,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RelationshipDraft {
    pub fn new(provider_id: Uuid, seeker_id: Uuid, source: LeadSource) -> Self {
        Self {
            provider_id,
            seeker_id,
            score: None,
            source,
            tags: Vec::new(),
            notes: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn pair(&self) -> PairKey {
        PairKey::new(self.provider_id, self.seeker_id)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.provider_id.is_nil() {
            return Err(ValidationError::NilId("provider"));
        }
        if self.seeker_id.is_nil() {
            return Err(ValidationError::NilId("seeker"));
        }
        if self.pair().is_self_pair() {
            return Err(ValidationError::SelfPair(self.provider_id));
        }
        if let Some(score) = self.score {
            if !(0.0..=1.0).contains(&score) {
                return Err(ValidationError::ScoreOutOfRange(score));
            }
        }
        Ok(())
    }

    /// Materialize into a relationship with a final score.
    pub fn into_relationship(self, score: f64, now: DateTime<Utc>) -> Relationship {
        Relationship {
            id: Uuid::new_v4(),
            provider_id: self.provider_id,
            seeker_id: self.seeker_id,
            score,
            status: LeadStatus::New,
            priority: Priority::from_score(score),
            source: self.source,
            tags: self.tags,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }
}

// --- Recommendation ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Recommendation {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub seeker_id: Uuid,
    pub score: f64,
    pub confidence: ConfidenceBucket,
    pub reasons: Vec<String>,
    pub used: bool,
    pub converted_relationship_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Recommendation {
    pub fn new(pair: PairKey, score: f64, reasons: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_id: pair.provider_id,
            seeker_id: pair.seeker_id,
            score,
            confidence: ConfidenceBucket::from_score(score),
            reasons,
            used: false,
            converted_relationship_id: None,
            created_at: now,
        }
    }

    pub fn pair(&self) -> PairKey {
        PairKey::new(self.provider_id, self.seeker_id)
    }
}

// --- Scoring output ---

/// Per-factor sub-scores keyed by factor name. Not persisted.
pub type ScoreBreakdown = BTreeMap<String, f64>;

// --- Notifications ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    HighValueMatch,
    TeamBroadcast,
    Escalation,
    StandardMatch,
    ReciprocalInterest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub payload: serde_json::Value,
    pub priority: Priority,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

// --- Workflow ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Message,
    Call,
    Content,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepConditions {
    pub wait_for_response_days: Option<u32>,
    pub only_if_high_value: bool,
}

/// One scheduled touchpoint in a nurturing workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowStep {
    pub step_index: usize,
    pub kind: StepKind,
    pub title: String,
    pub description: String,
    pub day_offset: u32,
    pub scheduled_for: DateTime<Utc>,
    pub template_id: String,
    pub priority: Priority,
    pub conditions: StepConditions,
}

// --- History signals ---

/// Recent interaction counts for one profile over a lookback window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActivityCounts {
    pub check_ins: u32,
    pub profile_views: u32,
    pub shared_sessions: u32,
}

impl ActivityCounts {
    pub fn total(&self) -> u32 {
        self.check_ins
            .saturating_add(self.profile_views)
            .saturating_add(self.shared_sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_mapping_is_exhaustive_at_boundaries() {
        assert_eq!(Priority::from_score(1.0), Priority::High);
        assert_eq!(Priority::from_score(0.8), Priority::High);
        assert_eq!(Priority::from_score(0.7999), Priority::Medium);
        assert_eq!(Priority::from_score(0.6), Priority::Medium);
        assert_eq!(Priority::from_score(0.5999), Priority::Low);
        assert_eq!(Priority::from_score(0.0), Priority::Low);
    }

    #[test]
    fn confidence_bucket_matches_priority_thresholds() {
        for score in [0.0, 0.3, 0.6, 0.65, 0.8, 0.95] {
            let bucket = ConfidenceBucket::from_score(score);
            let expected = match Priority::from_score(score) {
                Priority::High => ConfidenceBucket::High,
                Priority::Medium => ConfidenceBucket::Medium,
                Priority::Low => ConfidenceBucket::Low,
            };
            assert_eq!(bucket, expected, "score {score}");
        }
    }

    #[test]
    fn draft_rejects_self_pair_and_bad_score() {
        let id = Uuid::new_v4();
        let draft = RelationshipDraft::new(id, id, LeadSource::Manual);
        assert!(matches!(draft.validate(), Err(ValidationError::SelfPair(_))));

        let draft = RelationshipDraft::new(Uuid::new_v4(), Uuid::new_v4(), LeadSource::Scan)
            .with_score(1.4);
        assert!(matches!(
            draft.validate(),
            Err(ValidationError::ScoreOutOfRange(_))
        ));
    }

    #[test]
    fn profile_validation_checks_email_shape() {
        let mut p = Profile::new(Uuid::new_v4(), "Ada", Category::Seeker);
        assert!(p.validate().is_ok());
        p.contact.email = Some("not-an-email".into());
        assert!(matches!(p.validate(), Err(ValidationError::InvalidEmail(_))));
        p.contact.email = Some("ada@example.com".into());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn blank_fields_count_as_missing() {
        let mut p = Profile::new(Uuid::new_v4(), "Ada", Category::Seeker);
        p.industry = Some("   ".into());
        assert_eq!(p.industry(), None);
        assert_eq!(p.completeness(), 0.0);
    }

    #[test]
    fn size_band_proximity_spans_unit_interval() {
        assert_eq!(SizeBand::Micro.proximity(&SizeBand::Micro), 1.0);
        assert_eq!(SizeBand::Micro.proximity(&SizeBand::Enterprise), 0.0);
        assert_eq!(SizeBand::Small.proximity(&SizeBand::Medium), 0.75);
    }

    #[test]
    fn activity_total_saturates() {
        let counts = ActivityCounts {
            check_ins: u32::MAX,
            profile_views: 7,
            shared_sessions: 1,
        };
        assert_eq!(counts.total(), u32::MAX);
    }

    #[test]
    fn pair_key_orders_by_provider_then_seeker() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let mut keys = vec![PairKey::new(b, a), PairKey::new(a, b), PairKey::new(a, a)];
        keys.sort();
        assert_eq!(keys[0], PairKey::new(a, a));
        assert_eq!(keys[1], PairKey::new(a, b));
        assert_eq!(keys[2], PairKey::new(b, a));
    }
}
