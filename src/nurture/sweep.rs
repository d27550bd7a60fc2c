//! Sweep scheduler — sends due nurture messages and advances leads.
//!
//! Each run selects a bounded batch of due leads and processes them
//! independently: one lead's failure never blocks the rest. Per lead the
//! sequence is claim → normalize → render → dispatch → log → advance,
//! with "advance last" so a crash mid-iteration leaves the lead
//! retryable. A duplicate send on retry is the accepted tradeoff —
//! delivery is at-least-once, not exactly-once.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::Error;
use crate::nurture::timing::TimingPolicy;
use crate::phone;
use crate::store::NurtureStore;
use crate::store::model::{Lead, MessageRecord};
use crate::transport::SmsTransport;

/// Result of one sweep run. Individual per-lead errors are collected
/// here, never raised.
#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    /// Leads selected as due this run.
    pub selected: usize,
    /// Successful sends.
    pub sent: usize,
    /// Leads another overlapping run claimed first.
    pub claim_misses: usize,
    /// Per-lead failures (validation, transport, store).
    pub errors: Vec<String>,
}

enum LeadOutcome {
    Sent,
    ClaimMiss,
    Failed(String),
}

/// The periodic send job. Idempotent and safe to trigger concurrently —
/// the per-lead claim serializes overlapping runs.
pub struct SweepScheduler {
    store: Arc<dyn NurtureStore>,
    transport: Arc<dyn SmsTransport>,
    policy: TimingPolicy,
    batch_size: usize,
    concurrency: usize,
}

impl SweepScheduler {
    pub fn new(
        store: Arc<dyn NurtureStore>,
        transport: Arc<dyn SmsTransport>,
        policy: TimingPolicy,
        batch_size: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            transport,
            policy,
            batch_size,
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(
        config: &EngineConfig,
        store: Arc<dyn NurtureStore>,
        transport: Arc<dyn SmsTransport>,
    ) -> Self {
        Self::new(
            store,
            transport,
            TimingPolicy::new(config.jitter, config.send_window, config.local_offset_minutes),
            config.sweep_batch_size,
            config.sweep_concurrency,
        )
    }

    /// Run one sweep. A failure reading the due list aborts the whole
    /// attempt (retried on the next trigger); everything after that is
    /// isolated per lead.
    pub async fn run_once(&self) -> Result<SweepReport, Error> {
        let now = Utc::now();
        let due = self.store.list_due_leads(now, self.batch_size).await?;

        let mut report = SweepReport {
            selected: due.len(),
            ..SweepReport::default()
        };
        if due.is_empty() {
            debug!("No leads due");
            return Ok(report);
        }

        let outcomes: Vec<LeadOutcome> = futures::stream::iter(due)
            .map(|lead| self.process_lead(lead))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                LeadOutcome::Sent => report.sent += 1,
                LeadOutcome::ClaimMiss => report.claim_misses += 1,
                LeadOutcome::Failed(reason) => report.errors.push(reason),
            }
        }

        info!(
            selected = report.selected,
            sent = report.sent,
            claim_misses = report.claim_misses,
            errors = report.errors.len(),
            "Nurture sweep complete"
        );
        Ok(report)
    }

    /// One lead, start to finish. Never propagates: every failure maps
    /// to an outcome.
    async fn process_lead(&self, lead: Lead) -> LeadOutcome {
        let now = Utc::now();

        // Claim first: an overlapping sweep may have already taken this
        // lead. A miss is silent by design.
        match self.store.claim_due_lead(lead.id, now).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(lead_id = %lead.id, "Lead already claimed, skipping");
                return LeadOutcome::ClaimMiss;
            }
            Err(e) => return LeadOutcome::Failed(format!("lead {}: claim failed: {e}", lead.id)),
        }

        // Validation failures are never retried: the lead stays
        // unclaimed-from-the-pool (next_nurture_at cleared) until the
        // phone is fixed.
        let to = match phone::normalize(&lead.phone) {
            Ok(to) => to,
            Err(e) => {
                warn!(lead_id = %lead.id, error = %e, "Skipping lead with bad phone");
                return LeadOutcome::Failed(format!("lead {}: {e}", lead.id));
            }
        };

        let body = lead.nurture_stage.render(lead.name.as_deref());

        // Dispatch. On failure, restore the due time so the next sweep
        // retries; no state has changed.
        if let Err(e) = self.transport.send(&to, &body).await {
            warn!(lead_id = %lead.id, error = %e, "Transport send failed, lead stays due");
            let due_at = lead.next_nurture_at.unwrap_or(now);
            if let Err(restore_err) = self.store.restore_due(lead.id, due_at).await {
                warn!(
                    lead_id = %lead.id,
                    error = %restore_err,
                    "Failed to restore due time after transport failure"
                );
            }
            return LeadOutcome::Failed(format!("lead {}: {e}", lead.id));
        }

        let sent_at = Utc::now();

        // Log the outbound message. Losing the log row is less harmful
        // than stalling the lead, so a failure here still advances.
        if let Err(e) = self
            .store
            .insert_message(&MessageRecord::outbound_auto(lead.id, body))
            .await
        {
            warn!(lead_id = %lead.id, error = %e, "Failed to persist outbound message");
        }

        // Advance last, from the actual send instant.
        let next = {
            let mut rng = rand::thread_rng();
            self.policy.next_send(lead.nurture_stage, sent_at, &mut rng)
        };
        let (stage, next_at) = match next {
            Some(next) => (next.stage, Some(next.send_at)),
            // Terminal stage: keep the stage, leave next_nurture_at null
            // so the lead drops out of future sweeps.
            None => (lead.nurture_stage, None),
        };

        if let Err(e) = self.store.advance_lead(lead.id, stage, sent_at, next_at).await {
            warn!(lead_id = %lead.id, error = %e, "Failed to advance lead after send");
            return LeadOutcome::Failed(format!("lead {}: advance failed: {e}", lead.id));
        }

        debug!(
            lead_id = %lead.id,
            stage = stage.as_str(),
            next_at = ?next_at,
            "Lead nurture advanced"
        );
        LeadOutcome::Sent
    }
}
