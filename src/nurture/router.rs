//! Nurture router — applies a classified intent to a lead's nurture state.
//!
//! The intent fully determines the write; the lead's current status is
//! irrelevant. Routing is idempotent per call: the same intent against the
//! same lead snapshot always yields the same resulting state. Task dedup
//! is the caller's responsibility — the webhook handler invokes
//! classify + route exactly once per persisted inbound message.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use uuid::Uuid;

use crate::intent::{ClassifiedIntent, Intent};
use crate::nurture::stage::Stage;
use crate::store::model::{FollowUpTask, Lead, NurtureStatus, TaskPriority};

/// The state write for a routed lead.
///
/// `stage: None` leaves the stage unchanged; `next_nurture_at` and
/// `nurture_locked_until` are absolute — `None` clears the column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NurtureUpdate {
    pub status: NurtureStatus,
    pub stage: Option<Stage>,
    pub next_nurture_at: Option<DateTime<Utc>>,
    pub nurture_locked_until: Option<DateTime<Utc>>,
}

/// What routing decided: an optional state write and an optional task.
#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub update: Option<NurtureUpdate>,
    pub task: Option<FollowUpTask>,
}

impl RouteOutcome {
    fn unchanged() -> Self {
        Self {
            update: None,
            task: None,
        }
    }
}

/// Routes classified intents to nurture-state transitions.
#[derive(Debug, Clone)]
pub struct NurtureRouter {
    /// How long a NOT_NOW reply parks the lead before the next touch.
    long_term_snooze_days: i64,
}

impl NurtureRouter {
    pub fn new(long_term_snooze_days: i64) -> Self {
        Self {
            long_term_snooze_days,
        }
    }

    /// Decide the lead's new nurture state for one classified reply.
    ///
    /// `now` is the routing instant — injected so callers and tests agree
    /// on the reference time.
    pub fn route(
        &self,
        lead: &Lead,
        reply: &ClassifiedIntent,
        now: DateTime<Utc>,
    ) -> RouteOutcome {
        match reply.intent {
            // Compliance: drop out of automation entirely, no side effects.
            Intent::Stop => RouteOutcome {
                update: Some(NurtureUpdate {
                    status: NurtureStatus::Stopped,
                    stage: None,
                    next_nurture_at: None,
                    nurture_locked_until: None,
                }),
                task: None,
            },

            // Hand to a human: automation off, high-priority task due now.
            Intent::Positive => RouteOutcome {
                update: Some(NurtureUpdate {
                    status: NurtureStatus::Engaged,
                    stage: None,
                    next_nurture_at: None,
                    nurture_locked_until: None,
                }),
                task: Some(self.follow_up_task(lead, &reply.text, now)),
            },

            // Keep nurturing, but park in the long-term stage.
            Intent::NotNow => RouteOutcome {
                update: Some(NurtureUpdate {
                    status: NurtureStatus::Active,
                    stage: Some(Stage::LongTerm),
                    next_nurture_at: Some(
                        now + ChronoDuration::days(self.long_term_snooze_days),
                    ),
                    nurture_locked_until: None,
                }),
                task: None,
            },

            Intent::Negative => RouteOutcome {
                update: Some(NurtureUpdate {
                    status: NurtureStatus::Closed,
                    stage: None,
                    next_nurture_at: None,
                    nurture_locked_until: None,
                }),
                task: None,
            },

            // Question is reserved until a detector exists; both leave the
            // lead untouched. The message itself is already persisted.
            Intent::Question | Intent::Unknown => RouteOutcome::unchanged(),
        }
    }

    fn follow_up_task(&self, lead: &Lead, body: &str, now: DateTime<Utc>) -> FollowUpTask {
        let who = lead.name.as_deref().unwrap_or(&lead.phone);
        FollowUpTask {
            id: Uuid::new_v4(),
            lead_id: lead.id,
            title: format!("Follow up with {who} — replied to nurture text"),
            notes: format!("Lead replied: \"{body}\""),
            due_at: now,
            priority: TaskPriority::High,
            assigned_to: lead.assigned_agent.clone(),
            created_at: now,
        }
    }
}
