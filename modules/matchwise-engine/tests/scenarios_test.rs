//! End-to-end scenarios over the in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use matchwise_common::{EngineConfig, LeadSource, MatchError, PairKey, Profile, RelationshipDraft};
use matchwise_engine::memory::{ActivityKind, MemoryCacheStore};
use matchwise_engine::scoring::factors::industry_alignment;
use matchwise_engine::scoring::SignalCollector;
use matchwise_engine::traits::HistoryStore;
use matchwise_engine::testing::{
    active_at, provider, seeker, tech_provider, tech_seeker, BlindRelationshipStore,
    FailingHistoryStore, FlakyRecommendationStore, Harness,
};
use matchwise_engine::{
    plan_workflow, CreateOutcome, Deduplicator, GenerateRequest, LeadService, RecommendOptions,
    RecommendationGenerator, Scorer,
};

fn three_by_four() -> (Vec<Profile>, Vec<Profile>) {
    let providers = vec![
        tech_provider("Acme Cloud", "Ana"),
        tech_provider("Globex", "Gus"),
        provider("Initech", "Olu"),
    ];
    let seekers = vec![
        tech_seeker("Sam"),
        tech_seeker("Sia"),
        tech_seeker("Sol"),
        seeker("Zed"),
    ];
    (providers, seekers)
}

#[tokio::test]
async fn three_by_four_batch_respects_threshold_and_limit() {
    let (providers, seekers) = three_by_four();
    let h = Harness::new(providers.iter().chain(seekers.iter()).cloned());

    let request = GenerateRequest::builder()
        .providers(providers)
        .seekers(seekers)
        .min_score(0.5)
        .max_results(5)
        .build();
    let report = h
        .generator
        .generate(request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.pairs_considered, 12);
    assert_eq!(report.pairs_below_threshold, 6);
    assert_eq!(report.recommendations.len(), 5);
    assert!(report.recommendations.iter().all(|r| r.score >= 0.5));
    for window in report.recommendations.windows(2) {
        let (a, b) = (&window[0], &window[1]);
        assert!(a.score >= b.score);
        if a.score == b.score {
            assert!(a.pair() < b.pair());
        }
    }
    assert!(report.writes.is_clean());
    assert_eq!(h.store.recommendations().len(), 5);
}

#[tokio::test]
async fn generation_is_deterministic() {
    let (providers, seekers) = three_by_four();
    let h = Harness::new(providers.iter().chain(seekers.iter()).cloned());
    let as_of = Utc::now();
    let request = || {
        GenerateRequest::builder()
            .providers(providers.clone())
            .seekers(seekers.clone())
            .min_score(0.0)
            .max_results(12)
            .as_of(as_of)
            .build()
    };
    let cancel = CancellationToken::new();

    let first = h.generator.generate(request(), &cancel).await.unwrap();
    let second = h.generator.generate(request(), &cancel).await.unwrap();
    let ranked = |recs: &[matchwise_common::Recommendation]| {
        recs.iter()
            .map(|r| (r.pair(), r.score, r.reasons.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(ranked(&first.recommendations), ranked(&second.recommendations));
}

#[tokio::test]
async fn existing_relationships_are_skipped_unless_requested() {
    let p = tech_provider("Acme", "Ana");
    let (s1, s2) = (tech_seeker("Sam"), tech_seeker("Sia"));
    let h = Harness::new([p.clone(), s1.clone(), s2.clone()]);
    h.store.add_relationship(
        RelationshipDraft::new(p.id, s1.id, LeadSource::Scan).into_relationship(0.7, Utc::now()),
    );
    let cancel = CancellationToken::new();

    let skipped = h
        .generator
        .generate(
            GenerateRequest::builder()
                .providers(vec![p.clone()])
                .seekers(vec![s1.clone(), s2.clone()])
                .min_score(0.0)
                .build(),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(skipped.pairs_skipped_existing, 1);
    assert_eq!(skipped.recommendations.len(), 1);
    assert_eq!(skipped.recommendations[0].seeker_id, s2.id);

    let included = h
        .generator
        .generate(
            GenerateRequest::builder()
                .providers(vec![p])
                .seekers(vec![s1, s2])
                .min_score(0.0)
                .include_existing(true)
                .build(),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(included.recommendations.len(), 2);
}

#[tokio::test]
async fn self_pairs_and_repeats_are_not_scored() {
    let p = tech_provider("Acme", "Ana");
    let (s1, s2) = (tech_seeker("Sam"), tech_seeker("Sia"));
    let h = Harness::new([p.clone(), s1.clone(), s2.clone()]);
    let report = h
        .generator
        .generate(
            GenerateRequest::builder()
                .providers(vec![p.clone(), p.clone()])
                .seekers(vec![s1.clone(), p.clone(), s2.clone()])
                .min_score(0.0)
                .build(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.pairs_considered, 2);
    assert_eq!(report.recommendations.len(), 2);
    assert!(report
        .recommendations
        .iter()
        .all(|r| r.provider_id == p.id && r.seeker_id != p.id));
}

#[tokio::test]
async fn persistence_failures_are_counted_not_raised() {
    let (providers, seekers) = three_by_four();
    let h = Harness::new(providers.iter().chain(seekers.iter()).cloned());
    let rejected = PairKey::new(providers[0].id, seekers[0].id);
    let generator = RecommendationGenerator::new(
        h.dedup.clone(),
        h.signals.clone(),
        Scorer::new(),
        Arc::new(FlakyRecommendationStore::new(h.store.clone(), [rejected])),
        &h.config,
    );

    let report = generator
        .generate(
            GenerateRequest::builder()
                .providers(providers)
                .seekers(seekers)
                .min_score(0.0)
                .build(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.recommendations.len(), 12);
    assert_eq!(report.writes.attempted, 12);
    assert_eq!(report.writes.failed_count(), 1);
    let rejected_id = report
        .recommendations
        .iter()
        .find(|r| r.pair() == rejected)
        .map(|r| r.id.to_string());
    assert_eq!(Some(report.writes.failed[0].item.clone()), rejected_id);
    assert_eq!(h.store.recommendations().len(), 11);
}

#[tokio::test]
async fn history_outage_degrades_to_factor_errors() {
    let p = tech_provider("Acme", "Ana");
    let s = tech_seeker("Sam");
    let h = Harness::new([p.clone(), s.clone()]);
    let signals = SignalCollector::new(
        Some(Arc::new(FailingHistoryStore) as Arc<dyn HistoryStore>),
        h.store.clone(),
        h.gateway.clone(),
        h.config.activity_lookback_days,
    );
    let generator = RecommendationGenerator::new(
        h.dedup.clone(),
        signals,
        Scorer::new(),
        h.store.clone(),
        &h.config,
    );

    let report = generator
        .generate(
            GenerateRequest::builder()
                .providers(vec![p])
                .seekers(vec![s])
                .min_score(0.0)
                .build(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.recommendations.len(), 1);
    assert_eq!(report.factor_errors, 1);
    assert!(report.scoring.is_clean());
}

#[tokio::test]
async fn recent_activity_lifts_score() {
    let now = Utc::now();
    let p = active_at(tech_provider("Acme", "Ana"), now);
    let s = active_at(tech_seeker("Sam"), now);
    let quiet = Harness::new([p.clone(), s.clone()]);
    let busy = Harness::new([p.clone(), s.clone()]);
    for id in [p.id, s.id] {
        for _ in 0..5 {
            busy.store.record_activity(id, ActivityKind::CheckIn, now);
            busy.store.record_activity(id, ActivityKind::SharedSession, now);
        }
    }

    let request = || {
        GenerateRequest::builder()
            .providers(vec![p.clone()])
            .seekers(vec![s.clone()])
            .min_score(0.0)
            .as_of(now)
            .build()
    };
    let cancel = CancellationToken::new();
    let low = quiet.generator.generate(request(), &cancel).await.unwrap();
    let high = busy.generator.generate(request(), &cancel).await.unwrap();
    assert!(high.recommendations[0].score > low.recommendations[0].score);
}

#[tokio::test]
async fn cancelled_batch_returns_cancelled() {
    let (providers, seekers) = three_by_four();
    let h = Harness::new(providers.iter().chain(seekers.iter()).cloned());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = h
        .generator
        .generate(
            GenerateRequest::builder()
                .providers(providers)
                .seekers(seekers)
                .build(),
            &cancel,
        )
        .await;
    assert!(matches!(result, Err(MatchError::Cancelled)));
}

#[tokio::test]
async fn out_of_range_threshold_is_rejected() {
    let h = Harness::new(Vec::<Profile>::new());
    let result = h
        .generator
        .generate(
            GenerateRequest::builder()
                .providers(vec![])
                .seekers(vec![])
                .min_score(1.5)
                .build(),
            &CancellationToken::new(),
        )
        .await;
    assert!(matches!(result, Err(MatchError::Validation(_))));
}

#[tokio::test]
async fn store_conflict_is_reported_as_duplicate() {
    let (p, s) = (provider("Acme", "Ana"), seeker("Sam"));
    let h = Harness::new([p.clone(), s.clone()]);
    let blind = Arc::new(BlindRelationshipStore::new(h.store.clone()));
    let dedup = Deduplicator::new(blind.clone(), h.gateway.clone(), &h.config);
    let leads = LeadService::new(
        h.gateway.clone(),
        blind,
        h.store.clone(),
        dedup,
        h.signals.clone(),
        Scorer::new(),
        h.planner.clone(),
    );
    let cancel = CancellationToken::new();

    let draft = || RelationshipDraft::new(p.id, s.id, LeadSource::Scan).with_score(0.6);
    let first = leads.create_relationship(draft(), &cancel).await.unwrap();
    let first_id = first.relationship().unwrap().id;

    match leads.create_relationship(draft(), &cancel).await.unwrap() {
        CreateOutcome::Duplicate(check) => {
            assert!(check.exists);
            assert_eq!(check.matched_id, Some(first_id));
            assert_eq!(check.confidence, 1.0);
        }
        other => panic!("expected duplicate, got {other:?}"),
    }
    assert_eq!(h.store.relationships().len(), 1);
}

#[tokio::test]
async fn exact_duplicate_check_reports_full_confidence() {
    let (p, s) = (provider("Acme", "Ana"), seeker("Sam"));
    let h = Harness::new([p.clone(), s.clone()]);
    let rel = RelationshipDraft::new(p.id, s.id, LeadSource::Manual).into_relationship(0.5, Utc::now());
    h.store.add_relationship(rel.clone());

    let check = h
        .dedup
        .check_duplicate(p.id, s.id, &CancellationToken::new())
        .await
        .unwrap();
    assert!(check.exists);
    assert_eq!(check.matched_id, Some(rel.id));
    assert_eq!(check.confidence, 1.0);
}

#[tokio::test]
async fn fuzzy_duplicate_blocks_clerical_variant() {
    let p = provider("Acme", "Ana");
    let mut original = seeker("Jane Doe");
    original.contact.email = Some("jane.doe@globex.com".into());
    original.organization = Some("Globex Corporation".into());
    original.contact.phone = Some("+1 555 010 2000".into());
    let mut variant = seeker("Jane  Doe");
    variant.contact.email = Some("jane.doe@globex.com".into());
    variant.organization = Some("Globex Corp".into());
    variant.contact.phone = Some("15550102000".into());
    original.interests = Some("logistics, automation".into());
    variant.interests = Some("automation, logistics".into());

    let h = Harness::new([p.clone(), original.clone(), variant.clone()]);
    let existing =
        RelationshipDraft::new(p.id, original.id, LeadSource::Scan).into_relationship(0.6, Utc::now());
    h.store.add_relationship(existing.clone());

    let outcome = h
        .leads
        .create_relationship(
            RelationshipDraft::new(p.id, variant.id, LeadSource::Manual).with_score(0.6),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    match outcome {
        CreateOutcome::Duplicate(check) => {
            assert_eq!(check.matched_id, Some(existing.id));
            assert!(check.confidence >= 0.8 && check.confidence < 1.0);
        }
        other => panic!("expected fuzzy duplicate, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn cached_recommendations_expire_after_ttl() {
    let p = tech_provider("Acme", "Ana");
    let s = tech_seeker("Sam");
    let config = EngineConfig {
        recommendation_ttl: Duration::from_secs(60),
        ..EngineConfig::default()
    };
    let cache = Arc::new(MemoryCacheStore::new());
    let h = Harness::with_cache([p.clone(), s.clone()], cache.clone());
    let service = matchwise_engine::MatchService::new(
        h.gateway.clone(),
        h.generator.clone(),
        h.planner.clone(),
        matchwise_engine::CacheLayer::new(cache),
        config,
    );
    let cancel = CancellationToken::new();
    let options = RecommendOptions::default();

    let first = service
        .recommendations_for(p.id, options.clone(), &cancel)
        .await
        .unwrap();
    assert!(!first.cached);

    tokio::time::advance(Duration::from_secs(30)).await;
    let warm = service
        .recommendations_for(p.id, options.clone(), &cancel)
        .await
        .unwrap();
    assert!(warm.cached);

    tokio::time::advance(Duration::from_secs(31)).await;
    let cold = service
        .recommendations_for(p.id, options.clone(), &cancel)
        .await
        .unwrap();
    assert!(!cold.cached);

    let forced = service
        .recommendations_for(
            p.id,
            RecommendOptions {
                force_refresh: true,
                ..options
            },
            &cancel,
        )
        .await
        .unwrap();
    assert!(!forced.cached);
}

#[tokio::test]
async fn fresh_high_value_results_notify_once() {
    let p = tech_provider("Acme", "Ana");
    let s = tech_seeker("Sam");
    let h = Harness::with_cache([p.clone(), s.clone()], Arc::new(MemoryCacheStore::new()));
    let cancel = CancellationToken::new();

    let fresh = h
        .service
        .recommendations_for(p.id, RecommendOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(fresh.recommendations.len(), 1);
    let sent = h.store.notifications().len();
    assert!(sent > 0);
    assert_eq!(fresh.notifications.succeeded as usize, sent);

    let cached = h
        .service
        .recommendations_for(p.id, RecommendOptions::default(), &cancel)
        .await
        .unwrap();
    assert!(cached.cached);
    assert_eq!(h.store.notifications().len(), sent);
}

#[test]
fn exact_interest_tag_scores_full_industry_alignment() {
    let mut p = provider("Acme", "Ana");
    p.industry = Some("Technology".into());
    let mut s = seeker("Sam");
    s.interests = Some("technology, innovation".into());
    assert_eq!(industry_alignment(&p, &s), 1.0);
}

#[test]
fn workflow_length_tracks_score_tier() {
    let (p, s) = (provider("Acme", "Ana"), seeker("Sam"));
    let high = RelationshipDraft::new(p.id, s.id, LeadSource::Scan).into_relationship(0.85, Utc::now());
    let low = RelationshipDraft::new(p.id, s.id, LeadSource::Scan).into_relationship(0.5, Utc::now());
    assert!(plan_workflow(&high, &p, &s).iter().any(|step| step.day_offset == 21));
    assert!(plan_workflow(&low, &p, &s).iter().all(|step| step.day_offset != 21));
}
