//! Rule-based match alerts appended to the notification outbox.
//!
//! The planner never delivers anything. It decides which records a scored
//! pair deserves, appends them one by one, and publishes each successful
//! append on its own broadcast channel for in-process listeners.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use matchwise_common::{
    MatchError, NotificationKind, NotificationRecord, Priority, Profile, CONFIDENCE_HIGH,
    CONFIDENCE_MEDIUM, RECIPROCAL_MIN_SCORE,
};

use crate::cancel::cancellable;
use crate::gateway::EntityGateway;
use crate::stats::BatchSummary;
use crate::traits::NotificationOutbox;

const HIGH_VALUE_EXPIRY_HOURS: i64 = 24;
const STANDARD_EXPIRY_HOURS: i64 = 72;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A freshly scored pairing. The provider owns the lead.
#[derive(Debug, Clone)]
pub struct MatchTrigger {
    pub provider: Profile,
    pub seeker: Profile,
    pub score: f64,
    pub reasons: Vec<String>,
    pub relationship_id: Option<Uuid>,
    pub recommendation_id: Option<Uuid>,
}

impl MatchTrigger {
    pub fn new(provider: Profile, seeker: Profile, score: f64) -> Self {
        Self {
            provider,
            seeker,
            score,
            reasons: Vec::new(),
            relationship_id: None,
            recommendation_id: None,
        }
    }

    fn payload(&self) -> serde_json::Value {
        json!({
            "provider_id": self.provider.id,
            "seeker_id": self.seeker.id,
            "score": self.score,
            "reasons": self.reasons,
            "relationship_id": self.relationship_id,
            "recommendation_id": self.recommendation_id,
        })
    }

    fn percent(&self) -> u32 {
        (self.score * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotifyReport {
    /// Records the outbox accepted.
    pub appended: Vec<NotificationRecord>,
    pub summary: BatchSummary,
}

impl NotifyReport {
    pub fn count(&self, kind: NotificationKind) -> usize {
        self.appended.iter().filter(|r| r.kind == kind).count()
    }
}

#[derive(Clone)]
pub struct NotificationPlanner {
    outbox: Arc<dyn NotificationOutbox>,
    gateway: EntityGateway,
    events: broadcast::Sender<NotificationRecord>,
}

impl NotificationPlanner {
    pub fn new(outbox: Arc<dyn NotificationOutbox>, gateway: EntityGateway) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            outbox,
            gateway,
            events,
        }
    }

    /// Receive every record this planner appends from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationRecord> {
        self.events.subscribe()
    }

    /// Apply the alert rules to one scored pair. Outbox failures are counted
    /// per record; only cancellation is returned as an error.
    pub async fn evaluate(
        &self,
        trigger: &MatchTrigger,
        cancel: &CancellationToken,
    ) -> Result<NotifyReport, MatchError> {
        let now = Utc::now();
        let mut report = NotifyReport::default();

        let colleagues = if trigger.score >= CONFIDENCE_HIGH {
            match self.gateway.colleagues(&trigger.provider, cancel).await {
                Ok(colleagues) => colleagues,
                Err(MatchError::Cancelled) => return Err(MatchError::Cancelled),
                Err(e) => {
                    warn!(provider_id = %trigger.provider.id, error = %e, "Team lookup failed, skipping broadcast");
                    report.summary.record_failure("team_broadcast", e.to_string());
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let records = plan_notifications(trigger, &colleagues, now);
        if records.is_empty() {
            debug!(score = trigger.score, "Score below notification thresholds");
            return Ok(report);
        }

        for record in records {
            match cancellable(cancel, self.outbox.append(&record)).await? {
                Ok(()) => {
                    report.summary.record_success();
                    let _ = self.events.send(record.clone());
                    report.appended.push(record);
                }
                Err(e) => {
                    warn!(
                        recipient_id = %record.recipient_id,
                        kind = ?record.kind,
                        error = %e,
                        "Failed to append notification"
                    );
                    report
                        .summary
                        .record_failure(format!("{:?}:{}", record.kind, record.recipient_id), e.to_string());
                }
            }
        }

        info!(
            provider_id = %trigger.provider.id,
            seeker_id = %trigger.seeker.id,
            score = trigger.score,
            appended = report.appended.len(),
            failed = report.summary.failed_count(),
            "Match notifications evaluated"
        );
        Ok(report)
    }
}

/// The records a trigger deserves, in append order. Pure.
pub fn plan_notifications(
    trigger: &MatchTrigger,
    colleagues: &[Profile],
    now: DateTime<Utc>,
) -> Vec<NotificationRecord> {
    let provider = &trigger.provider;
    let seeker = &trigger.seeker;
    let pct = trigger.percent();
    let payload = trigger.payload();
    let mut records = Vec::new();

    let record = |recipient_id: Uuid,
                  kind: NotificationKind,
                  title: String,
                  message: String,
                  priority: Priority,
                  expiry_hours: i64| NotificationRecord {
        id: Uuid::new_v4(),
        recipient_id,
        kind,
        title,
        message,
        payload: payload.clone(),
        priority,
        read: false,
        created_at: now,
        expires_at: Some(now + Duration::hours(expiry_hours)),
    };

    if trigger.score >= CONFIDENCE_HIGH {
        records.push(record(
            provider.id,
            NotificationKind::HighValueMatch,
            "High-value match".to_string(),
            format!("{} is a {pct}% match for you", seeker.display_name),
            Priority::High,
            HIGH_VALUE_EXPIRY_HOURS,
        ));
        for colleague in colleagues.iter().filter(|c| c.id != provider.id) {
            records.push(record(
                colleague.id,
                NotificationKind::TeamBroadcast,
                "High-value match for your team".to_string(),
                format!(
                    "{} matched {} at {pct}%",
                    seeker.display_name, provider.display_name
                ),
                Priority::High,
                HIGH_VALUE_EXPIRY_HOURS,
            ));
        }
        if provider.preferences.escalation_enabled {
            records.push(record(
                provider.id,
                NotificationKind::Escalation,
                "Follow up today".to_string(),
                format!(
                    "Reach out to {} within {HIGH_VALUE_EXPIRY_HOURS} hours",
                    seeker.display_name
                ),
                Priority::High,
                HIGH_VALUE_EXPIRY_HOURS,
            ));
        }
    } else if trigger.score >= CONFIDENCE_MEDIUM {
        records.push(record(
            provider.id,
            NotificationKind::StandardMatch,
            "New match".to_string(),
            format!("{} is a {pct}% match for you", seeker.display_name),
            Priority::Medium,
            STANDARD_EXPIRY_HOURS,
        ));
    }

    if trigger.score >= RECIPROCAL_MIN_SCORE && seeker.category.is_privileged() {
        records.push(record(
            seeker.id,
            NotificationKind::ReciprocalInterest,
            "Someone wants to meet you".to_string(),
            format!(
                "{} is a {pct}% match for your interests",
                provider.display_name
            ),
            Priority::from_score(trigger.score),
            STANDARD_EXPIRY_HOURS,
        ));
    }

    records
}
