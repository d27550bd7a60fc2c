//! `NurtureStore` trait — single async interface for all persistence.
//!
//! The engine treats every store failure as "state unchanged, caller
//! decides retry": per-lead failures are isolated inside the sweeps, and
//! a failed due-list read aborts the whole run for the next trigger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::nurture::router::NurtureUpdate;
use crate::nurture::stage::Stage;
use crate::store::model::{FollowUpTask, Lead, MessageRecord};

/// Backend-agnostic store covering leads, messages, and tasks.
#[async_trait]
pub trait NurtureStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), StoreError>;

    // ── Leads ───────────────────────────────────────────────────────

    /// Insert a new lead.
    async fn insert_lead(&self, lead: &Lead) -> Result<(), StoreError>;

    /// Get a lead by id.
    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, StoreError>;

    /// Find the lead whose phone matches the given digit key
    /// (see `phone::match_key`).
    async fn find_lead_by_phone_key(&self, key: &str) -> Result<Option<Lead>, StoreError>;

    /// Active leads due at or before `now`, oldest-due first, up to `limit`.
    async fn list_due_leads(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError>;

    /// Atomically claim a due lead by clearing `next_nurture_at`.
    ///
    /// Returns `false` when another sweep already claimed it (the
    /// conditional update matched no row) — the caller skips silently.
    async fn claim_due_lead(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Put a claimed lead back in the due pool after a failed dispatch.
    async fn restore_due(&self, id: Uuid, due_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Record a successful send: last-sent timestamp, new stage, and the
    /// next due time (`None` = terminal, lead drops out of the sweep).
    async fn advance_lead(
        &self,
        id: Uuid,
        stage: Stage,
        sent_at: DateTime<Utc>,
        next_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Apply a router decision to a lead.
    async fn apply_update(&self, id: Uuid, update: &NurtureUpdate) -> Result<(), StoreError>;

    /// Snoozed leads whose lock expired at or before `now`, oldest expiry
    /// first, up to `limit`.
    async fn list_expired_snoozes(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError>;

    /// Release expired snoozes in one batch: set `next_nurture_at = now`
    /// and clear the lock. Status is left alone. Returns rows touched.
    async fn release_snoozes(
        &self,
        ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    // ── Messages ────────────────────────────────────────────────────

    /// Append a message record.
    async fn insert_message(&self, message: &MessageRecord) -> Result<(), StoreError>;

    /// Messages for a lead, most recent first.
    async fn list_messages_for_lead(
        &self,
        lead_id: Uuid,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StoreError>;

    // ── Tasks ───────────────────────────────────────────────────────

    /// Insert a follow-up task.
    async fn insert_task(&self, task: &FollowUpTask) -> Result<(), StoreError>;

    /// Tasks for a lead, most recent first.
    async fn list_tasks_for_lead(&self, lead_id: Uuid) -> Result<Vec<FollowUpTask>, StoreError>;
}
