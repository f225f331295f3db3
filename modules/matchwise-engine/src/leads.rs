//! Relationship lifecycle: create with dedup, convert recommendations, move status.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use matchwise_common::{
    LeadSource, LeadStatus, MatchError, Relationship, RelationshipDraft, ValidationError,
    WorkflowStep,
};

use crate::cancel::{ensure_active, store_call};
use crate::dedup::{DuplicateCheck, DuplicateSuggestion, Deduplicator};
use crate::gateway::EntityGateway;
use crate::notify::{MatchTrigger, NotificationPlanner, NotifyReport};
use crate::scoring::{Scorer, SignalCollector};
use crate::traits::{InsertOutcome, RecommendationStore, RelationshipStore};
use crate::workflow::plan_workflow;

#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created {
        relationship: Relationship,
        workflow: Vec<WorkflowStep>,
        /// Non-blocking near matches the caller may want to review.
        suggestions: Vec<DuplicateSuggestion>,
        notify: NotifyReport,
    },
    /// Blocked by a detected duplicate or by the store's pair constraint.
    Duplicate(DuplicateCheck),
}

impl CreateOutcome {
    pub fn relationship(&self) -> Option<&Relationship> {
        match self {
            CreateOutcome::Created { relationship, .. } => Some(relationship),
            CreateOutcome::Duplicate(_) => None,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, CreateOutcome::Duplicate(_))
    }
}

#[derive(Clone)]
pub struct LeadService {
    gateway: EntityGateway,
    relationships: Arc<dyn RelationshipStore>,
    recommendations: Arc<dyn RecommendationStore>,
    dedup: Deduplicator,
    signals: SignalCollector,
    scorer: Scorer,
    planner: NotificationPlanner,
}

impl LeadService {
    pub fn new(
        gateway: EntityGateway,
        relationships: Arc<dyn RelationshipStore>,
        recommendations: Arc<dyn RecommendationStore>,
        dedup: Deduplicator,
        signals: SignalCollector,
        scorer: Scorer,
        planner: NotificationPlanner,
    ) -> Self {
        Self {
            gateway,
            relationships,
            recommendations,
            dedup,
            signals,
            scorer,
            planner,
        }
    }

    pub async fn create_relationship(
        &self,
        draft: RelationshipDraft,
        cancel: &CancellationToken,
    ) -> Result<CreateOutcome, MatchError> {
        ensure_active(cancel)?;
        draft.validate()?;

        let provider = self.gateway.require(draft.provider_id, cancel).await?;
        let seeker = self.gateway.require(draft.seeker_id, cancel).await?;
        let now = Utc::now();

        let (score, reasons) = match draft.score {
            Some(score) => (score, Vec::new()),
            None => {
                let history = self.signals.collect(&provider, &seeker, now, cancel).await?;
                let outcome = self.scorer.score(&provider, &seeker, &history);
                (outcome.score, outcome.reasons)
            }
        };

        let check = self
            .dedup
            .check_duplicate(draft.provider_id, draft.seeker_id, cancel)
            .await?;
        if check.exists {
            info!(
                pair = %draft.pair(),
                matched = ?check.matched_id,
                confidence = check.confidence,
                "Relationship blocked as duplicate"
            );
            return Ok(CreateOutcome::Duplicate(check));
        }

        let relationship = draft.into_relationship(score, now);
        match store_call(cancel, self.relationships.insert(&relationship)).await? {
            InsertOutcome::Inserted(_) => {}
            InsertOutcome::Conflict { existing_id } => {
                info!(
                    pair = %relationship.pair(),
                    existing = %existing_id,
                    "Store rejected duplicate pair"
                );
                return Ok(CreateOutcome::Duplicate(DuplicateCheck::exact(existing_id)));
            }
        }

        let workflow = plan_workflow(&relationship, &provider, &seeker);

        let trigger = MatchTrigger {
            reasons,
            relationship_id: Some(relationship.id),
            ..MatchTrigger::new(provider, seeker, score)
        };
        let notify = match self.planner.evaluate(&trigger, cancel).await {
            Ok(report) => report,
            Err(e) => {
                warn!(relationship_id = %relationship.id, error = %e, "Notification evaluation aborted");
                let mut report = NotifyReport::default();
                report.summary.record_failure("notifications", e.to_string());
                report
            }
        };

        info!(
            relationship_id = %relationship.id,
            score = relationship.score,
            priority = ?relationship.priority,
            steps = workflow.len(),
            "Relationship created"
        );

        Ok(CreateOutcome::Created {
            relationship,
            workflow,
            suggestions: check.suggestions,
            notify,
        })
    }

    /// Turn a stored recommendation into a relationship and mark it used.
    pub async fn convert_recommendation(
        &self,
        recommendation_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<CreateOutcome, MatchError> {
        let recommendation = store_call(cancel, self.recommendations.find(recommendation_id))
            .await?
            .ok_or_else(|| MatchError::NotFound(format!("recommendation {recommendation_id}")))?;
        if recommendation.used {
            return Err(ValidationError::AlreadyConverted(recommendation_id).into());
        }

        let mut draft = RelationshipDraft::new(
            recommendation.provider_id,
            recommendation.seeker_id,
            LeadSource::Recommendation,
        )
        .with_score(recommendation.score);
        if !recommendation.reasons.is_empty() {
            draft.notes = Some(recommendation.reasons.join("; "));
        }

        let outcome = self.create_relationship(draft, cancel).await?;
        if let Some(relationship) = outcome.relationship() {
            if let Err(e) = store_call(
                cancel,
                self.recommendations
                    .mark_used(recommendation_id, relationship.id),
            )
            .await
            {
                warn!(
                    recommendation_id = %recommendation_id,
                    relationship_id = %relationship.id,
                    error = %e,
                    "Failed to mark recommendation used"
                );
            }
        }
        Ok(outcome)
    }

    pub async fn update_status(
        &self,
        relationship_id: Uuid,
        status: LeadStatus,
        cancel: &CancellationToken,
    ) -> Result<Relationship, MatchError> {
        let mut relationship = store_call(cancel, self.relationships.find_by_id(relationship_id))
            .await?
            .ok_or_else(|| MatchError::NotFound(format!("relationship {relationship_id}")))?;

        if relationship.status == LeadStatus::Closed && status != LeadStatus::Closed {
            return Err(ValidationError::ClosedRelationship(relationship_id).into());
        }

        let now = Utc::now();
        store_call(
            cancel,
            self.relationships.update_status(relationship_id, status, now),
        )
        .await?;

        info!(
            relationship_id = %relationship_id,
            from = %relationship.status,
            to = %status,
            "Relationship status updated"
        );
        relationship.status = status;
        relationship.updated_at = now;
        Ok(relationship)
    }
}
