//! In-process implementations of every collaborator trait.
//!
//! `InMemoryStore` backs the CLI and the scenario tests. It enforces pair
//! uniqueness the same way a real relationship table would (insert returns
//! `Conflict`), so lost-race handling is exercised end to end.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use matchwise_common::{
    max_window, ActivityCounts, Category, LeadStatus, NotificationRecord, PairKey, Profile, Recommendation,
    Relationship,
};

use crate::traits::{
    CacheStore, EntityStore, HistoryStore, InsertOutcome, NotificationOutbox,
    RecommendationStore, RelationshipStore,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    CheckIn,
    ProfileView,
    SharedSession,
}

#[derive(Debug, Clone, Copy)]
struct ActivityEvent {
    profile_id: Uuid,
    kind: ActivityKind,
    at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// InMemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryStore {
    profiles: Mutex<HashMap<Uuid, Profile>>,
    relationships: Mutex<BTreeMap<PairKey, Relationship>>,
    activity: Mutex<Vec<ActivityEvent>>,
    recommendations: Mutex<HashMap<Uuid, Recommendation>>,
    outbox: Mutex<Vec<NotificationRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let store = Self::new();
        for profile in profiles {
            store.add_profile(profile);
        }
        store
    }

    pub fn add_profile(&self, profile: Profile) {
        lock(&self.profiles).insert(profile.id, profile);
    }

    /// Seed a relationship directly. Replaces any existing one for the pair.
    pub fn add_relationship(&self, relationship: Relationship) {
        lock(&self.relationships).insert(relationship.pair(), relationship);
    }

    pub fn record_activity(&self, profile_id: Uuid, kind: ActivityKind, at: DateTime<Utc>) {
        lock(&self.activity).push(ActivityEvent {
            profile_id,
            kind,
            at,
        });
    }

    pub fn relationships(&self) -> Vec<Relationship> {
        lock(&self.relationships).values().cloned().collect()
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        let mut recs: Vec<_> = lock(&self.recommendations).values().cloned().collect();
        recs.sort_by_key(|r| (r.pair(), r.id));
        recs
    }

    pub fn notifications(&self) -> Vec<NotificationRecord> {
        lock(&self.outbox).clone()
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>> {
        Ok(lock(&self.profiles).get(&id).cloned())
    }

    async fn find_by_category(&self, category: Category) -> Result<Vec<Profile>> {
        Ok(lock(&self.profiles)
            .values()
            .filter(|p| p.category == category)
            .cloned()
            .collect())
    }

    async fn find_by_organization(&self, organization: &str) -> Result<Vec<Profile>> {
        let wanted = organization.trim();
        Ok(lock(&self.profiles)
            .values()
            .filter(|p| p.organization().is_some_and(|o| o.eq_ignore_ascii_case(wanted)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RelationshipStore for InMemoryStore {
    async fn exists(&self, pair: PairKey) -> Result<bool> {
        Ok(lock(&self.relationships).contains_key(&pair))
    }

    async fn find_by_pair(&self, pair: PairKey) -> Result<Option<Relationship>> {
        Ok(lock(&self.relationships).get(&pair).cloned())
    }

    async fn insert(&self, relationship: &Relationship) -> Result<InsertOutcome> {
        let mut relationships = lock(&self.relationships);
        if let Some(existing) = relationships.get(&relationship.pair()) {
            return Ok(InsertOutcome::Conflict {
                existing_id: existing.id,
            });
        }
        relationships.insert(relationship.pair(), relationship.clone());
        Ok(InsertOutcome::Inserted(relationship.id))
    }

    async fn find_recent(&self, since: DateTime<Utc>) -> Result<Vec<Relationship>> {
        Ok(lock(&self.relationships)
            .values()
            .filter(|r| r.created_at >= since)
            .cloned()
            .collect())
    }

    async fn find_for_profile(
        &self,
        profile_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Relationship>> {
        Ok(lock(&self.relationships)
            .values()
            .filter(|r| r.created_at >= since && r.pair().touches(profile_id))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Relationship>> {
        Ok(lock(&self.relationships)
            .values()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: LeadStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut relationships = lock(&self.relationships);
        let rel = relationships
            .values_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow!("relationship {id} not found"))?;
        rel.status = status;
        rel.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn activity(&self, profile_id: Uuid, since: DateTime<Utc>) -> Result<ActivityCounts> {
        let mut counts = ActivityCounts::default();
        for event in lock(&self.activity)
            .iter()
            .filter(|e| e.profile_id == profile_id && e.at >= since)
        {
            match event.kind {
                ActivityKind::CheckIn => counts.check_ins += 1,
                ActivityKind::ProfileView => counts.profile_views += 1,
                ActivityKind::SharedSession => counts.shared_sessions += 1,
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl RecommendationStore for InMemoryStore {
    async fn save(&self, recommendation: &Recommendation) -> Result<()> {
        lock(&self.recommendations).insert(recommendation.id, recommendation.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Recommendation>> {
        Ok(lock(&self.recommendations).get(&id).cloned())
    }

    async fn mark_used(&self, id: Uuid, relationship_id: Uuid) -> Result<()> {
        let mut recommendations = lock(&self.recommendations);
        let rec = recommendations
            .get_mut(&id)
            .ok_or_else(|| anyhow!("recommendation {id} not found"))?;
        rec.used = true;
        rec.converted_relationship_id = Some(relationship_id);
        Ok(())
    }
}

#[async_trait]
impl NotificationOutbox for InMemoryStore {
    async fn append(&self, record: &NotificationRecord) -> Result<()> {
        lock(&self.outbox).push(record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryCacheStore
// ---------------------------------------------------------------------------

struct CacheSlot {
    value: String,
    expires_at: Instant,
}

/// TTL key-value cache on the tokio clock, so paused-time tests can expire entries.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<(String, String), CacheSlot>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Expiry for a write at `now`; TTLs beyond `max_window()` are clamped.
fn expiry(now: Instant, ttl: Duration) -> Instant {
    now + ttl.min(max_window())
}

fn slot_key(namespace: &str, key: &str) -> (String, String) {
    (namespace.to_string(), key.to_string())
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let mut entries = lock(&self.entries);
        let slot_key = slot_key(namespace, key);
        match entries.get(&slot_key) {
            Some(slot) if slot.expires_at > Instant::now() => Ok(Some(slot.value.clone())),
            Some(_) => {
                entries.remove(&slot_key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, namespace: &str, key: &str, value: String, ttl: Duration) -> Result<()> {
        lock(&self.entries).insert(
            slot_key(namespace, key),
            CacheSlot {
                value,
                expires_at: expiry(Instant::now(), ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        lock(&self.entries).remove(&slot_key(namespace, key));
        Ok(())
    }

    async fn increment(
        &self,
        namespace: &str,
        key: &str,
        by: i64,
        ttl: Duration,
    ) -> Result<i64> {
        let now = Instant::now();
        let mut entries = lock(&self.entries);
        let slot = entries
            .entry(slot_key(namespace, key))
            .or_insert_with(|| CacheSlot {
                value: "0".to_string(),
                expires_at: expiry(now, ttl),
            });
        if slot.expires_at <= now {
            slot.value = "0".to_string();
            slot.expires_at = expiry(now, ttl);
        }
        let current: i64 = slot
            .value
            .parse()
            .map_err(|_| anyhow!("cached value for {namespace}:{key} is not a counter"))?;
        let next = current + by;
        slot.value = next.to_string();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use matchwise_common::{LeadSource, RelationshipDraft};

    #[tokio::test]
    async fn insert_enforces_pair_uniqueness() {
        let store = InMemoryStore::new();
        let (p, s) = (Uuid::new_v4(), Uuid::new_v4());
        let first = RelationshipDraft::new(p, s, LeadSource::Scan).into_relationship(0.7, Utc::now());
        let second =
            RelationshipDraft::new(p, s, LeadSource::Manual).into_relationship(0.4, Utc::now());

        assert_eq!(
            store.insert(&first).await.unwrap(),
            InsertOutcome::Inserted(first.id)
        );
        assert_eq!(
            store.insert(&second).await.unwrap(),
            InsertOutcome::Conflict {
                existing_id: first.id
            }
        );
        assert_eq!(store.relationships().len(), 1);
    }

    #[tokio::test]
    async fn activity_counts_respect_window() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        let now = Utc::now();
        store.record_activity(id, ActivityKind::CheckIn, now);
        store.record_activity(id, ActivityKind::ProfileView, now);
        store.record_activity(id, ActivityKind::ProfileView, now - ChronoDuration::days(40));

        let counts = store.activity(id, now - ChronoDuration::days(7)).await.unwrap();
        assert_eq!(counts.check_ins, 1);
        assert_eq!(counts.profile_views, 1);
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn counters_reset_after_expiry() {
        let cache = MemoryCacheStore::new();
        let ttl = Duration::from_secs(60);
        assert_eq!(cache.increment("stats", "scans", 1, ttl).await.unwrap(), 1);
        assert_eq!(cache.increment("stats", "scans", 2, ttl).await.unwrap(), 3);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.increment("stats", "scans", 1, ttl).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_ttl_is_clamped() {
        let cache = MemoryCacheStore::new();
        cache
            .set("recommendations", "k", "v".to_string(), Duration::MAX)
            .await
            .unwrap();
        assert_eq!(
            cache.increment("stats", "scans", 1, Duration::MAX).await.unwrap(),
            1
        );
        assert_eq!(
            cache.get("recommendations", "k").await.unwrap(),
            Some("v".to_string())
        );
    }
}
