//! Pre-fetched history inputs for scoring.
//!
//! Scoring itself never touches a store. `SignalCollector` gathers everything up
//! front and records per-signal failures instead of aborting, so the scorer can
//! zero the affected factor and keep going.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use matchwise_common::{
    day_window, window_start, ActivityCounts, MatchError, PairKey, Profile,
};

use crate::cancel::cancellable;
use crate::gateway::EntityGateway;
use crate::traits::{HistoryStore, RelationshipStore};

/// A pre-fetched input that may be unknown or may have failed to load.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal<T> {
    Known(T),
    /// No data exists; the factor falls back to its default.
    Missing,
    /// The fetch failed; the factor contributes zero.
    Failed(String),
}

impl<T> Signal<T> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Signal::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            Signal::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkSignal {
    /// A relationship already links the pair.
    pub already_linked: bool,
    /// Other seekers in the provider's network sharing the seeker's industry.
    pub shared_industry_peers: u32,
}

/// Everything the scorer needs beyond the two profiles.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySignals {
    /// Evaluation instant; "active today" is relative to this.
    pub as_of: DateTime<Utc>,
    pub activity_a: Signal<ActivityCounts>,
    pub activity_b: Signal<ActivityCounts>,
    pub network: Signal<NetworkSignal>,
}

impl HistorySignals {
    /// No history at all; every factor uses its default.
    pub fn empty(as_of: DateTime<Utc>) -> Self {
        Self {
            as_of,
            activity_a: Signal::Missing,
            activity_b: Signal::Missing,
            network: Signal::Missing,
        }
    }
}

/// Orient a pair by role; falls back to argument order for same-side pairs.
pub fn role_pair(a: &Profile, b: &Profile) -> PairKey {
    if b.category.is_provider() && !a.category.is_provider() {
        PairKey::new(b.id, a.id)
    } else {
        PairKey::new(a.id, b.id)
    }
}

/// Seekers linked to a provider, with each seeker's industry if known.
type ProviderNetwork = Arc<Vec<(Uuid, Option<String>)>>;

/// Gathers `HistorySignals` for a pair from the history and relationship stores.
#[derive(Clone)]
pub struct SignalCollector {
    history: Option<Arc<dyn HistoryStore>>,
    relationships: Arc<dyn RelationshipStore>,
    gateway: EntityGateway,
    activity_lookback: Duration,
    networks: Option<Arc<Mutex<HashMap<Uuid, ProviderNetwork>>>>,
}

impl SignalCollector {
    pub fn new(
        history: Option<Arc<dyn HistoryStore>>,
        relationships: Arc<dyn RelationshipStore>,
        gateway: EntityGateway,
        activity_lookback_days: i64,
    ) -> Self {
        Self {
            history,
            relationships,
            gateway,
            activity_lookback: day_window(activity_lookback_days),
            networks: None,
        }
    }

    /// A collector that loads each provider's network at most once. The memo
    /// is never refreshed, so use one per batch.
    pub fn for_batch(&self) -> Self {
        Self {
            networks: Some(Arc::default()),
            ..self.clone()
        }
    }

    /// Only cancellation is an error; store failures become `Signal::Failed`.
    pub async fn collect(
        &self,
        a: &Profile,
        b: &Profile,
        as_of: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<HistorySignals, MatchError> {
        let since = window_start(as_of, self.activity_lookback);
        let (activity_a, activity_b, network) = tokio::join!(
            self.activity(a, since, cancel),
            self.activity(b, since, cancel),
            self.network(a, b, cancel),
        );
        Ok(HistorySignals {
            as_of,
            activity_a: activity_a?,
            activity_b: activity_b?,
            network: network?,
        })
    }

    async fn activity(
        &self,
        profile: &Profile,
        since: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Signal<ActivityCounts>, MatchError> {
        let Some(history) = &self.history else {
            return Ok(Signal::Missing);
        };
        match cancellable(cancel, history.activity(profile.id, since)).await? {
            Ok(counts) => Ok(Signal::Known(counts)),
            Err(e) => {
                warn!(profile_id = %profile.id, error = %e, "Activity lookup failed");
                Ok(Signal::Failed(e.to_string()))
            }
        }
    }

    async fn network(
        &self,
        a: &Profile,
        b: &Profile,
        cancel: &CancellationToken,
    ) -> Result<Signal<NetworkSignal>, MatchError> {
        let pair = role_pair(a, b);
        match self.network_inner(pair, a, b, cancel).await {
            Ok(signal) => Ok(Signal::Known(signal)),
            Err(MatchError::Cancelled) => Err(MatchError::Cancelled),
            Err(e) => {
                warn!(pair = %pair, error = %e, "Network lookup failed");
                Ok(Signal::Failed(e.to_string()))
            }
        }
    }

    async fn network_inner(
        &self,
        pair: PairKey,
        a: &Profile,
        b: &Profile,
        cancel: &CancellationToken,
    ) -> Result<NetworkSignal, MatchError> {
        let already_linked = cancellable(cancel, self.relationships.exists(pair))
            .await?
            .map_err(MatchError::store)?;
        if already_linked {
            return Ok(NetworkSignal {
                already_linked,
                shared_industry_peers: 0,
            });
        }

        let seeker = if pair.seeker_id == b.id { b } else { a };
        let Some(industry) = seeker.industry() else {
            return Ok(NetworkSignal::default());
        };

        let network = self.provider_network(pair.provider_id, cancel).await?;
        let peers = network
            .iter()
            .filter(|(peer_id, peer_industry)| {
                *peer_id != pair.seeker_id
                    && peer_industry
                        .as_deref()
                        .is_some_and(|i| i.eq_ignore_ascii_case(industry))
            })
            .count() as u32;

        Ok(NetworkSignal {
            already_linked,
            shared_industry_peers: peers,
        })
    }

    /// Seekers linked to the provider with their industries. Served from the
    /// batch memo when there is one.
    async fn provider_network(
        &self,
        provider_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<ProviderNetwork, MatchError> {
        let memoized = self
            .networks
            .as_ref()
            .and_then(|memo| lock(memo).get(&provider_id).cloned());
        if let Some(network) = memoized {
            return Ok(network);
        }

        let linked = cancellable(
            cancel,
            self.relationships
                .find_for_profile(provider_id, DateTime::<Utc>::MIN_UTC),
        )
        .await?
        .map_err(MatchError::store)?;
        let peers = self
            .gateway
            .find_many(linked.iter().map(|r| r.seeker_id), cancel)
            .await?;

        let network: ProviderNetwork = Arc::new(
            linked
                .iter()
                .map(|r| {
                    let industry = peers
                        .get(&r.seeker_id)
                        .and_then(|p| p.industry())
                        .map(str::to_string);
                    (r.seeker_id, industry)
                })
                .collect(),
        );
        if let Some(memo) = &self.networks {
            lock(memo).insert(provider_id, network.clone());
        }
        Ok(network)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use matchwise_common::{LeadSource, LeadStatus, Relationship, RelationshipDraft};

    use crate::memory::InMemoryStore;
    use crate::testing::{provider, seeker};
    use crate::traits::InsertOutcome;

    /// Counts full-history loads and delegates everything to the inner store.
    struct CountingRelationships {
        inner: Arc<InMemoryStore>,
        history_loads: AtomicUsize,
    }

    #[async_trait]
    impl RelationshipStore for CountingRelationships {
        async fn exists(&self, pair: PairKey) -> anyhow::Result<bool> {
            self.inner.exists(pair).await
        }

        async fn find_by_pair(&self, pair: PairKey) -> anyhow::Result<Option<Relationship>> {
            self.inner.find_by_pair(pair).await
        }

        async fn insert(&self, relationship: &Relationship) -> anyhow::Result<InsertOutcome> {
            self.inner.insert(relationship).await
        }

        async fn find_recent(&self, since: DateTime<Utc>) -> anyhow::Result<Vec<Relationship>> {
            self.inner.find_recent(since).await
        }

        async fn find_for_profile(
            &self,
            profile_id: Uuid,
            since: DateTime<Utc>,
        ) -> anyhow::Result<Vec<Relationship>> {
            self.history_loads.fetch_add(1, Ordering::SeqCst);
            self.inner.find_for_profile(profile_id, since).await
        }

        async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Relationship>> {
            RelationshipStore::find_by_id(self.inner.as_ref(), id).await
        }

        async fn update_status(
            &self,
            id: Uuid,
            status: LeadStatus,
            now: DateTime<Utc>,
        ) -> anyhow::Result<()> {
            self.inner.update_status(id, status, now).await
        }
    }

    fn in_industry(mut profile: Profile, industry: &str) -> Profile {
        profile.industry = Some(industry.into());
        profile
    }

    /// Provider linked to two retail seekers and one fintech seeker, plus two
    /// unlinked retail candidates.
    fn networked() -> (Arc<CountingRelationships>, SignalCollector, Profile, [Profile; 2]) {
        let p = provider("Acme", "Ana");
        let linked = [
            in_industry(seeker("Lia"), "Retail"),
            in_industry(seeker("Lou"), "retail"),
            in_industry(seeker("Fin"), "Fintech"),
        ];
        let candidates = [
            in_industry(seeker("Sam"), "Retail"),
            in_industry(seeker("Sia"), "Retail"),
        ];
        let store = Arc::new(InMemoryStore::with_profiles(
            std::iter::once(p.clone())
                .chain(linked.iter().cloned())
                .chain(candidates.iter().cloned()),
        ));
        for s in &linked {
            store.add_relationship(
                RelationshipDraft::new(p.id, s.id, LeadSource::Manual)
                    .into_relationship(0.6, Utc::now()),
            );
        }
        let relationships = Arc::new(CountingRelationships {
            inner: store.clone(),
            history_loads: AtomicUsize::new(0),
        });
        let collector = SignalCollector::new(
            None,
            relationships.clone(),
            EntityGateway::new(store),
            14,
        );
        (relationships, collector, p, candidates)
    }

    #[tokio::test]
    async fn batch_collector_loads_each_provider_network_once() {
        let (relationships, collector, p, candidates) = networked();
        let batch = collector.for_batch();
        let cancel = CancellationToken::new();

        for s in &candidates {
            let signals = batch.collect(&p, s, Utc::now(), &cancel).await.unwrap();
            assert_eq!(
                signals.network,
                Signal::Known(NetworkSignal {
                    already_linked: false,
                    shared_industry_peers: 2,
                })
            );
            assert_eq!(signals.activity_a, Signal::Missing);
        }
        assert_eq!(relationships.history_loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn plain_collector_reloads_per_pair() {
        let (relationships, collector, p, candidates) = networked();
        let cancel = CancellationToken::new();

        for s in &candidates {
            let signals = collector.collect(s, &p, Utc::now(), &cancel).await.unwrap();
            assert_eq!(
                signals.network.known().map(|n| n.shared_industry_peers),
                Some(2)
            );
        }
        assert_eq!(relationships.history_loads.load(Ordering::SeqCst), 2);
    }
}
