// Trait abstractions for the engine's external collaborators.
//
// EntityStore and HistoryStore are read-only views owned by other systems.
// RelationshipStore is authoritative for pair uniqueness.
// CacheStore is advisory; the engine runs without one.
//
// Everything behind these traits is swappable: `memory` provides in-process
// implementations used by the CLI and the test suite.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use matchwise_common::{
    ActivityCounts, Category, LeadStatus, NotificationRecord, PairKey, Profile, Recommendation,
    Relationship,
};

// ---------------------------------------------------------------------------
// EntityStore: profiles, read-only
// ---------------------------------------------------------------------------

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>>;

    async fn find_by_category(&self, category: Category) -> Result<Vec<Profile>>;

    /// Profiles whose organization matches `organization` case-insensitively.
    async fn find_by_organization(&self, organization: &str) -> Result<Vec<Profile>>;
}

// ---------------------------------------------------------------------------
// RelationshipStore: leads, authoritative for pair uniqueness
// ---------------------------------------------------------------------------

/// Result of an insert against the pair-unique relationship store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Uuid),
    /// The store already holds a relationship for this pair.
    Conflict { existing_id: Uuid },
}

#[async_trait]
pub trait RelationshipStore: Send + Sync {
    async fn exists(&self, pair: PairKey) -> Result<bool>;

    async fn find_by_pair(&self, pair: PairKey) -> Result<Option<Relationship>>;

    /// Insert, enforcing at most one relationship per pair.
    async fn insert(&self, relationship: &Relationship) -> Result<InsertOutcome>;

    /// Relationships created at or after `since`.
    async fn find_recent(&self, since: DateTime<Utc>) -> Result<Vec<Relationship>>;

    /// Relationships created at or after `since` where `profile_id` is either side.
    async fn find_for_profile(
        &self,
        profile_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Relationship>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Relationship>>;

    async fn update_status(&self, id: Uuid, status: LeadStatus, now: DateTime<Utc>)
        -> Result<()>;
}

// ---------------------------------------------------------------------------
// HistoryStore: interaction counts, read-only
// ---------------------------------------------------------------------------

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Check-ins, profile views, and shared sessions for `profile_id` since `since`.
    async fn activity(&self, profile_id: Uuid, since: DateTime<Utc>) -> Result<ActivityCounts>;
}

// ---------------------------------------------------------------------------
// RecommendationStore: batch output persistence
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn save(&self, recommendation: &Recommendation) -> Result<()>;

    async fn find(&self, id: Uuid) -> Result<Option<Recommendation>>;

    /// Flag a recommendation as converted into `relationship_id`.
    async fn mark_used(&self, id: Uuid, relationship_id: Uuid) -> Result<()>;
}

// ---------------------------------------------------------------------------
// CacheStore: namespaced TTL key-value, advisory
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    async fn set(&self, namespace: &str, key: &str, value: String, ttl: Duration) -> Result<()>;

    async fn delete(&self, namespace: &str, key: &str) -> Result<()>;

    /// Add `by` to a counter, creating it with `ttl` when absent. Returns the new value.
    async fn increment(&self, namespace: &str, key: &str, by: i64, ttl: Duration)
        -> Result<i64>;
}

// ---------------------------------------------------------------------------
// NotificationOutbox: write-only
// ---------------------------------------------------------------------------

#[async_trait]
pub trait NotificationOutbox: Send + Sync {
    async fn append(&self, record: &NotificationRecord) -> Result<()>;
}
