//! Persistence data model — leads, messages, and follow-up tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::nurture::stage::Stage;

/// Automation status of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NurtureStatus {
    /// Under automation; `next_nurture_at` drives the sweep.
    Active,
    /// Temporarily held; `nurture_locked_until` gates release.
    Snoozed,
    /// Replied positively; handed to a human, automation off.
    Engaged,
    /// Opted out. Never contacted again.
    Stopped,
    /// Declined; automation off.
    Closed,
}

impl NurtureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Snoozed => "snoozed",
            Self::Engaged => "engaged",
            Self::Stopped => "stopped",
            Self::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "snoozed" => Some(Self::Snoozed),
            "engaged" => Some(Self::Engaged),
            "stopped" => Some(Self::Stopped),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// A sales lead under (or released from) nurture automation.
///
/// Invariants maintained by the router, sweep, and expirer:
/// - `next_nurture_at` is non-null only while status is `Active`;
/// - a `Snoozed` lead has `nurture_locked_until` set and `next_nurture_at`
///   null until the expirer releases it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    /// First name used in templates; `None` renders as "there".
    pub name: Option<String>,
    /// Contact phone as captured; normalized at dispatch time.
    pub phone: String,
    pub nurture_status: NurtureStatus,
    pub nurture_stage: Stage,
    /// When the next automated send is due. Absent = not scheduled.
    pub next_nurture_at: Option<DateTime<Utc>>,
    pub last_nurture_sent_at: Option<DateTime<Utc>>,
    /// Temporary hold released by the snooze expirer.
    pub nurture_locked_until: Option<DateTime<Utc>>,
    /// Agent who owns this lead; follow-up tasks are assigned to them.
    pub assigned_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// New lead enrolled at the start of the sequence, due immediately.
    pub fn new(phone: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: None,
            phone: phone.into(),
            nurture_status: NurtureStatus::Active,
            nurture_stage: Stage::initial(),
            next_nurture_at: Some(now),
            last_nurture_sent_at: None,
            nurture_locked_until: None,
            assigned_agent: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: set name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: set owning agent.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.assigned_agent = Some(agent.into());
        self
    }

    /// Builder: set due time.
    pub fn with_next_nurture_at(mut self, at: DateTime<Utc>) -> Self {
        self.next_nurture_at = Some(at);
        self
    }

    /// Builder: set stage.
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.nurture_stage = stage;
        self
    }
}

/// Message direction relative to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            _ => None,
        }
    }
}

/// One communication, inbound or outbound. Append-only, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    /// Absent when an inbound sender matched no lead; the message is
    /// still logged.
    pub lead_id: Option<Uuid>,
    pub direction: Direction,
    pub channel: String,
    pub body: String,
    /// True for system-generated sends.
    pub is_auto: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Outbound auto message from the sweep.
    pub fn outbound_auto(lead_id: Uuid, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id: Some(lead_id),
            direction: Direction::Outbound,
            channel: "sms".to_string(),
            body: body.into(),
            is_auto: true,
            created_at: Utc::now(),
        }
    }

    /// Inbound message from the webhook, matched or not.
    pub fn inbound(lead_id: Option<Uuid>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            direction: Direction::Inbound,
            channel: "sms".to_string(),
            body: body.into(),
            is_auto: false,
            created_at: Utc::now(),
        }
    }
}

/// Task priority for follow-up items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Normal,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// A follow-up action item for a human agent.
///
/// Created by the router on a positive reply; the engine never mutates it
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpTask {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub title: String,
    pub notes: String,
    pub due_at: DateTime<Utc>,
    pub priority: TaskPriority,
    /// Agent assigned to the lead at creation time.
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_lead_is_due_immediately() {
        let lead = Lead::new("+15551234567").with_name("Dana");
        assert_eq!(lead.nurture_status, NurtureStatus::Active);
        assert_eq!(lead.nurture_stage, Stage::Day1);
        assert!(lead.next_nurture_at.is_some());
        assert!(lead.nurture_locked_until.is_none());
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            NurtureStatus::Active,
            NurtureStatus::Snoozed,
            NurtureStatus::Engaged,
            NurtureStatus::Stopped,
            NurtureStatus::Closed,
        ] {
            assert_eq!(NurtureStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(NurtureStatus::parse("paused"), None);
    }

    #[test]
    fn outbound_auto_message_is_flagged() {
        let lead_id = Uuid::new_v4();
        let msg = MessageRecord::outbound_auto(lead_id, "hello");
        assert_eq!(msg.direction, Direction::Outbound);
        assert!(msg.is_auto);
        assert_eq!(msg.lead_id, Some(lead_id));
    }

    #[test]
    fn unmatched_inbound_message_has_no_lead() {
        let msg = MessageRecord::inbound(None, "who dis");
        assert_eq!(msg.direction, Direction::Inbound);
        assert!(!msg.is_auto);
        assert!(msg.lead_id.is_none());
    }
}
