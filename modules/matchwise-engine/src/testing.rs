// Test helpers for the matchwise engine.
//
// - Profile fixtures: provider / seeker / vip plus "tech" variants that score high
// - Failure-injecting collaborators, one per trait boundary that must degrade
// - Harness: every component wired over a single InMemoryStore

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use matchwise_common::{
    ActivityCounts, BudgetBand, Category, DayPart, EngineConfig, LeadStatus, NotificationRecord,
    PairKey, Profile, Recommendation, Relationship, SizeBand,
};

use crate::cache::CacheLayer;
use crate::dedup::Deduplicator;
use crate::gateway::EntityGateway;
use crate::leads::LeadService;
use crate::memory::InMemoryStore;
use crate::notify::NotificationPlanner;
use crate::recommend::RecommendationGenerator;
use crate::scoring::{Scorer, SignalCollector};
use crate::service::MatchService;
use crate::traits::{
    CacheStore, HistoryStore, InsertOutcome, NotificationOutbox, RecommendationStore,
    RelationshipStore,
};

// ---------------------------------------------------------------------------
// Profile fixtures
// ---------------------------------------------------------------------------

pub fn provider(organization: &str, name: &str) -> Profile {
    let mut p = Profile::new(Uuid::new_v4(), name, Category::Provider);
    p.organization = Some(organization.to_string());
    p
}

pub fn seeker(name: &str) -> Profile {
    Profile::new(Uuid::new_v4(), name, Category::Seeker)
}

/// Privileged seeker (hosted buyer).
pub fn vip(name: &str) -> Profile {
    Profile::new(Uuid::new_v4(), name, Category::PrivilegedSeeker)
}

/// A fully described technology vendor.
pub fn tech_provider(organization: &str, name: &str) -> Profile {
    let mut p = provider(organization, name);
    p.job_title = Some("Head of Partnerships".into());
    p.industry = Some("Technology".into());
    p.size_band = Some(SizeBand::Medium);
    p.budget_band = Some(BudgetBand::High);
    p.interests = Some("cloud platforms, data analytics, automation".into());
    p.biography = Some("We build cloud data platforms and analytics automation".into());
    p.business_model = Some("b2b saas".into());
    p.communication_style = Some("direct".into());
    p.availability = vec![DayPart::Morning, DayPart::Afternoon];
    p.contact.email = Some(format!("{}@{}.example", slug(name), slug(organization)));
    p.contact.phone = Some("+1 555 0100".into());
    p.social_links = vec![format!("https://social.example/{}", slug(name))];
    p
}

/// A fully described seeker interested in technology.
pub fn tech_seeker(name: &str) -> Profile {
    let mut p = seeker(name);
    p.organization = Some(format!("{name} Logistics"));
    p.job_title = Some("CTO".into());
    p.industry = Some("Logistics".into());
    p.size_band = Some(SizeBand::Medium);
    p.budget_band = Some(BudgetBand::High);
    p.interests = Some("technology, cloud platforms, data analytics".into());
    p.biography = Some("Modernising logistics with cloud analytics".into());
    p.business_model = Some("b2b saas".into());
    p.communication_style = Some("direct".into());
    p.availability = vec![DayPart::Morning];
    p.contact.email = Some(format!("{}@logistics.example", slug(name)));
    p.contact.phone = Some("+1 555 0200".into());
    p.social_links = vec![format!("https://social.example/{}", slug(name))];
    p
}

/// Same id and fields as `profile` but active at `at`.
pub fn active_at(mut profile: Profile, at: DateTime<Utc>) -> Profile {
    profile.last_active_at = Some(at);
    profile
}

fn slug(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

// ---------------------------------------------------------------------------
// Failure-injecting collaborators
// ---------------------------------------------------------------------------

/// Cache whose backend is down. Every call errors.
pub struct UnreachableCache;

#[async_trait]
impl CacheStore for UnreachableCache {
    async fn get(&self, _namespace: &str, _key: &str) -> Result<Option<String>> {
        bail!("cache connection refused")
    }

    async fn set(&self, _namespace: &str, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
        bail!("cache connection refused")
    }

    async fn delete(&self, _namespace: &str, _key: &str) -> Result<()> {
        bail!("cache connection refused")
    }

    async fn increment(&self, _namespace: &str, _key: &str, _by: i64, _ttl: Duration) -> Result<i64> {
        bail!("cache connection refused")
    }
}

/// Outbox that rejects every append.
pub struct FailingOutbox;

#[async_trait]
impl NotificationOutbox for FailingOutbox {
    async fn append(&self, _record: &NotificationRecord) -> Result<()> {
        bail!("outbox unavailable")
    }
}

/// History backend that is down.
pub struct FailingHistoryStore;

#[async_trait]
impl HistoryStore for FailingHistoryStore {
    async fn activity(&self, _profile_id: Uuid, _since: DateTime<Utc>) -> Result<ActivityCounts> {
        bail!("history query timed out")
    }
}

/// Accepts writes except for the listed pairs.
pub struct FlakyRecommendationStore {
    inner: Arc<InMemoryStore>,
    reject: Vec<PairKey>,
}

impl FlakyRecommendationStore {
    pub fn new(inner: Arc<InMemoryStore>, reject: impl IntoIterator<Item = PairKey>) -> Self {
        Self {
            inner,
            reject: reject.into_iter().collect(),
        }
    }
}

#[async_trait]
impl RecommendationStore for FlakyRecommendationStore {
    async fn save(&self, recommendation: &Recommendation) -> Result<()> {
        if self.reject.contains(&recommendation.pair()) {
            bail!("write rejected for {}", recommendation.pair());
        }
        self.inner.save(recommendation).await
    }

    async fn find(&self, id: Uuid) -> Result<Option<Recommendation>> {
        self.inner.find(id).await
    }

    async fn mark_used(&self, id: Uuid, relationship_id: Uuid) -> Result<()> {
        self.inner.mark_used(id, relationship_id).await
    }
}

/// Relationship store whose lookups see nothing while inserts reach the real
/// table, so the fast-path duplicate check loses the race.
pub struct BlindRelationshipStore {
    inner: Arc<InMemoryStore>,
}

impl BlindRelationshipStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RelationshipStore for BlindRelationshipStore {
    async fn exists(&self, _pair: PairKey) -> Result<bool> {
        Ok(false)
    }

    async fn find_by_pair(&self, _pair: PairKey) -> Result<Option<Relationship>> {
        Ok(None)
    }

    async fn insert(&self, relationship: &Relationship) -> Result<InsertOutcome> {
        self.inner.insert(relationship).await
    }

    async fn find_recent(&self, _since: DateTime<Utc>) -> Result<Vec<Relationship>> {
        Ok(Vec::new())
    }

    async fn find_for_profile(
        &self,
        _profile_id: Uuid,
        _since: DateTime<Utc>,
    ) -> Result<Vec<Relationship>> {
        Ok(Vec::new())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Relationship>> {
        self.inner.find_by_id(id).await
    }

    async fn update_status(&self, id: Uuid, status: LeadStatus, now: DateTime<Utc>) -> Result<()> {
        self.inner.update_status(id, status, now).await
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Every component wired over one `InMemoryStore`, the way the CLI wires them.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub config: EngineConfig,
    pub gateway: EntityGateway,
    pub dedup: Deduplicator,
    pub signals: SignalCollector,
    pub generator: RecommendationGenerator,
    pub planner: NotificationPlanner,
    pub leads: LeadService,
    pub service: MatchService,
}

impl Harness {
    pub fn new(profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self::build(profiles, EngineConfig::default(), CacheLayer::disabled())
    }

    pub fn with_cache(
        profiles: impl IntoIterator<Item = Profile>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self::build(profiles, EngineConfig::default(), CacheLayer::new(cache))
    }

    pub fn with_config(profiles: impl IntoIterator<Item = Profile>, config: EngineConfig) -> Self {
        Self::build(profiles, config, CacheLayer::disabled())
    }

    fn build(
        profiles: impl IntoIterator<Item = Profile>,
        config: EngineConfig,
        cache: CacheLayer,
    ) -> Self {
        let store = Arc::new(InMemoryStore::with_profiles(profiles));
        let gateway = EntityGateway::new(store.clone());
        let dedup = Deduplicator::new(store.clone(), gateway.clone(), &config);
        let signals = SignalCollector::new(
            Some(store.clone() as Arc<dyn HistoryStore>),
            store.clone(),
            gateway.clone(),
            config.activity_lookback_days,
        );
        let generator = RecommendationGenerator::new(
            dedup.clone(),
            signals.clone(),
            Scorer::new(),
            store.clone(),
            &config,
        );
        let planner = NotificationPlanner::new(store.clone(), gateway.clone());
        let leads = LeadService::new(
            gateway.clone(),
            store.clone(),
            store.clone(),
            dedup.clone(),
            signals.clone(),
            Scorer::new(),
            planner.clone(),
        );
        let service = MatchService::new(
            gateway.clone(),
            generator.clone(),
            planner.clone(),
            cache,
            config.clone(),
        );
        Self {
            store,
            config,
            gateway,
            dedup,
            signals,
            generator,
            planner,
            leads,
            service,
        }
    }
}
