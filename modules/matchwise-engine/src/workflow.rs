//! Nurturing schedule for a new relationship.
//!
//! A fixed cadence of touchpoints. Score tier picks the tone and the offsets
//! within each window; interest keywords pick the content templates.

use chrono::Duration;

use matchwise_common::{
    Priority, Profile, Relationship, StepConditions, StepKind, WorkflowStep,
    HIGH_VALUE_WORKFLOW_SCORE,
};

/// Day offsets as (high tier, standard tier).
const CADENCE: [(u32, u32); 6] = [(1, 1), (2, 3), (4, 5), (7, 7), (10, 10), (14, 14)];
const EXECUTIVE_DAY: u32 = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentBucket {
    Technology,
    Sustainability,
    Marketing,
    Leadership,
    General,
}

impl ContentBucket {
    const KEYWORDED: [ContentBucket; 4] = [
        ContentBucket::Technology,
        ContentBucket::Sustainability,
        ContentBucket::Marketing,
        ContentBucket::Leadership,
    ];

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            ContentBucket::Technology => &[
                "tech",
                "software",
                "cloud",
                "data",
                "digital",
                "innovation",
                "automation",
                "cyber",
                "machine learning",
                "artificial intelligence",
            ],
            ContentBucket::Sustainability => &[
                "sustainab",
                "green",
                "climate",
                "renewable",
                "energy",
                "environment",
                "esg",
                "circular",
            ],
            ContentBucket::Marketing => &[
                "marketing",
                "brand",
                "advertis",
                "growth",
                "social media",
                "content",
                "seo",
            ],
            ContentBucket::Leadership => &[
                "leadership",
                "management",
                "strategy",
                "executive",
                "coaching",
                "governance",
            ],
            ContentBucket::General => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentBucket::Technology => "technology",
            ContentBucket::Sustainability => "sustainability",
            ContentBucket::Marketing => "marketing",
            ContentBucket::Leadership => "leadership",
            ContentBucket::General => "general",
        }
    }

    /// Bucket with the most keyword hits; earlier buckets win ties.
    pub fn detect(text: &str) -> Self {
        let text = text.to_lowercase();
        let mut best = (ContentBucket::General, 0usize);
        for bucket in Self::KEYWORDED {
            let hits = bucket
                .keywords()
                .iter()
                .filter(|kw| text.contains(*kw))
                .count();
            if hits > best.1 {
                best = (bucket, hits);
            }
        }
        best.0
    }
}

/// Interest text the templates key off: seeker first, then provider.
fn topic_text(provider: &Profile, seeker: &Profile) -> String {
    [
        seeker.interests(),
        seeker.industry(),
        provider.interests(),
        provider.industry(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
}

struct StepDraft {
    kind: StepKind,
    title: String,
    description: String,
    template: String,
    wait_for_response_days: Option<u32>,
}

pub fn plan_workflow(
    relationship: &Relationship,
    provider: &Profile,
    seeker: &Profile,
) -> Vec<WorkflowStep> {
    let high = relationship.score > HIGH_VALUE_WORKFLOW_SCORE;
    let tier = if high { "priority" } else { "standard" };
    let bucket = ContentBucket::detect(&topic_text(provider, seeker));
    let topic = bucket.as_str();
    let who = &seeker.display_name;

    let touch = |call_title: &str, message_title: &str, slug: &str| -> (StepKind, String, String) {
        if high {
            (StepKind::Call, call_title.to_string(), format!("{tier}_{slug}_call"))
        } else {
            (StepKind::Message, message_title.to_string(), format!("{tier}_{slug}_message"))
        }
    };

    let mut drafts = Vec::with_capacity(CADENCE.len() + 1);

    drafts.push(StepDraft {
        kind: StepKind::Message,
        title: "Personal thank-you".to_string(),
        description: format!("Thank {who} for connecting and recap what you discussed"),
        template: format!("{tier}_thank_you"),
        wait_for_response_days: None,
    });

    let (kind, title, template) = touch("Discovery call", "Check-in message", "discovery");
    drafts.push(StepDraft {
        kind,
        title,
        description: format!("Learn what {who} is trying to solve right now"),
        template,
        wait_for_response_days: None,
    });

    drafts.push(StepDraft {
        kind: StepKind::Content,
        title: format!("Share {topic} resource"),
        description: format!("Send {who} a {topic} guide matched to their interests"),
        template: format!("content_{topic}"),
        wait_for_response_days: Some(2),
    });

    let (kind, title, template) = touch("Proposal walkthrough", "Resource follow-up", "follow_up");
    drafts.push(StepDraft {
        kind,
        title,
        description: format!("Ask {who} for feedback and propose next steps"),
        template,
        wait_for_response_days: Some(3),
    });

    drafts.push(StepDraft {
        kind: StepKind::Content,
        title: format!("{} case study", capitalize(topic)),
        description: format!("Share a {topic} customer story relevant to {who}"),
        template: format!("case_study_{topic}"),
        wait_for_response_days: Some(3),
    });

    let (kind, title, template) = touch("Decision check-in", "Two-week check-in", "check_in");
    drafts.push(StepDraft {
        kind,
        title,
        description: format!("Confirm whether {who} wants to move forward"),
        template,
        wait_for_response_days: Some(4),
    });

    let mut steps: Vec<WorkflowStep> = drafts
        .into_iter()
        .zip(CADENCE)
        .enumerate()
        .map(|(i, (draft, (high_day, standard_day)))| {
            let day = if high { high_day } else { standard_day };
            WorkflowStep {
                step_index: i + 1,
                kind: draft.kind,
                title: draft.title,
                description: draft.description,
                day_offset: day,
                scheduled_for: relationship.created_at + Duration::days(day as i64),
                template_id: draft.template,
                priority: relationship.priority,
                conditions: StepConditions {
                    wait_for_response_days: draft.wait_for_response_days,
                    only_if_high_value: false,
                },
            }
        })
        .collect();

    if high {
        steps.push(WorkflowStep {
            step_index: steps.len() + 1,
            kind: StepKind::Call,
            title: "Executive introduction".to_string(),
            description: format!(
                "Introduce {who} to a senior contact at {}",
                provider.organization().unwrap_or(&provider.display_name)
            ),
            day_offset: EXECUTIVE_DAY,
            scheduled_for: relationship.created_at + Duration::days(EXECUTIVE_DAY as i64),
            template_id: "executive_intro".to_string(),
            priority: Priority::High,
            conditions: StepConditions {
                wait_for_response_days: Some(7),
                only_if_high_value: true,
            },
        });
    }

    steps
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use matchwise_common::{LeadSource, RelationshipDraft};

    use crate::testing::{provider, seeker};

    fn relationship(score: f64, p: &Profile, s: &Profile) -> Relationship {
        RelationshipDraft::new(p.id, s.id, LeadSource::Scan).into_relationship(score, Utc::now())
    }

    #[test]
    fn high_scores_get_executive_step() {
        let (p, s) = (provider("Acme", "Ana"), seeker("Sam"));
        let steps = plan_workflow(&relationship(0.85, &p, &s), &p, &s);

        let days: Vec<u32> = steps.iter().map(|s| s.day_offset).collect();
        assert_eq!(days, vec![1, 2, 4, 7, 10, 14, 21]);

        let last = steps.last().unwrap();
        assert_eq!(last.kind, StepKind::Call);
        assert!(last.conditions.only_if_high_value);
        assert_eq!(last.priority, Priority::High);
        assert!(steps.iter().any(|s| s.kind == StepKind::Call && s.day_offset == 2));
    }

    #[test]
    fn standard_scores_stop_at_two_weeks() {
        let (p, s) = (provider("Acme", "Ana"), seeker("Sam"));
        let steps = plan_workflow(&relationship(0.5, &p, &s), &p, &s);

        let days: Vec<u32> = steps.iter().map(|s| s.day_offset).collect();
        assert_eq!(days, vec![1, 3, 5, 7, 10, 14]);
        assert!(steps.iter().all(|s| s.kind != StepKind::Call));
        assert!(steps.iter().all(|s| !s.conditions.only_if_high_value));
    }

    #[test]
    fn exactly_threshold_is_not_high_tier() {
        let (p, s) = (provider("Acme", "Ana"), seeker("Sam"));
        let steps = plan_workflow(&relationship(0.7, &p, &s), &p, &s);
        assert!(steps.iter().all(|s| s.day_offset != EXECUTIVE_DAY));
    }

    #[test]
    fn steps_are_scheduled_from_creation() {
        let (p, s) = (provider("Acme", "Ana"), seeker("Sam"));
        let rel = relationship(0.9, &p, &s);
        for (i, step) in plan_workflow(&rel, &p, &s).iter().enumerate() {
            assert_eq!(step.step_index, i + 1);
            assert_eq!(
                step.scheduled_for,
                rel.created_at + Duration::days(step.day_offset as i64)
            );
        }
    }

    #[test]
    fn templates_follow_interest_bucket() {
        let p = provider("Acme", "Ana");
        let mut s = seeker("Sam");
        s.interests = Some("cloud migration, data platforms".into());
        let steps = plan_workflow(&relationship(0.6, &p, &s), &p, &s);
        assert!(steps.iter().any(|s| s.template_id == "content_technology"));

        s.interests = Some("renewable energy, climate reporting".into());
        let steps = plan_workflow(&relationship(0.6, &p, &s), &p, &s);
        assert!(steps.iter().any(|s| s.template_id == "content_sustainability"));
    }

    #[test]
    fn bucket_detection() {
        assert_eq!(ContentBucket::detect("Brand strategy and SEO"), ContentBucket::Marketing);
        assert_eq!(
            ContentBucket::detect("executive coaching, leadership"),
            ContentBucket::Leadership
        );
        assert_eq!(ContentBucket::detect("woodworking"), ContentBucket::General);
        assert_eq!(ContentBucket::detect(""), ContentBucket::General);
    }
}
