//! Snooze expirer — releases leads whose temporary hold has elapsed.
//!
//! Finds `snoozed` leads with an expired lock and puts them back in the
//! sweep pool by setting `next_nurture_at = now` in one batch update.
//! Status is intentionally left alone — releasing the hold is all this
//! job does.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::Error;
use crate::store::NurtureStore;

/// Result of one expiry run.
#[derive(Debug, Default, Serialize)]
pub struct ExpireReport {
    /// List-only mode: nothing was mutated.
    pub dry_run: bool,
    /// Leads whose lock had expired, oldest expiry first.
    pub matched: Vec<Uuid>,
    /// Rows actually released (0 in dry-run).
    pub released: usize,
}

/// The periodic snooze-release job.
pub struct SnoozeExpirer {
    store: Arc<dyn NurtureStore>,
    batch_size: usize,
}

impl SnoozeExpirer {
    pub fn new(store: Arc<dyn NurtureStore>, batch_size: usize) -> Self {
        Self { store, batch_size }
    }

    pub fn from_config(config: &EngineConfig, store: Arc<dyn NurtureStore>) -> Self {
        Self::new(store, config.expire_batch_size)
    }

    /// Run one expiry pass. `dry_run` lists matches without mutating.
    pub async fn run_once(&self, dry_run: bool) -> Result<ExpireReport, Error> {
        let now = Utc::now();
        let expired = self.store.list_expired_snoozes(now, self.batch_size).await?;
        let matched: Vec<Uuid> = expired.iter().map(|lead| lead.id).collect();

        if dry_run {
            debug!(matched = matched.len(), "Snooze expiry dry-run");
            return Ok(ExpireReport {
                dry_run: true,
                matched,
                released: 0,
            });
        }

        let released = if matched.is_empty() {
            0
        } else {
            self.store.release_snoozes(&matched, now).await?
        };

        info!(matched = matched.len(), released, "Snooze expiry complete");
        Ok(ExpireReport {
            dry_run: false,
            matched,
            released,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    use crate::store::LibSqlBackend;
    use crate::store::model::{Lead, NurtureStatus};

    async fn snoozed_lead(store: &dyn NurtureStore, lock_offset_hours: i64) -> Lead {
        let mut lead = Lead::new("+15551234567");
        lead.nurture_status = NurtureStatus::Snoozed;
        lead.next_nurture_at = None;
        lead.nurture_locked_until =
            Some(Utc::now() + ChronoDuration::hours(lock_offset_hours));
        store.insert_lead(&lead).await.unwrap();
        lead
    }

    #[tokio::test]
    async fn dry_run_lists_without_mutating() {
        let store: Arc<dyn NurtureStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let lead = snoozed_lead(store.as_ref(), -1).await;

        let report = SnoozeExpirer::new(Arc::clone(&store), 100)
            .run_once(true)
            .await
            .unwrap();
        assert!(report.dry_run);
        assert_eq!(report.matched, vec![lead.id]);
        assert_eq!(report.released, 0);

        let loaded = store.get_lead(lead.id).await.unwrap().unwrap();
        assert!(loaded.nurture_locked_until.is_some());
        assert!(loaded.next_nurture_at.is_none());
    }

    #[tokio::test]
    async fn apply_releases_expired_locks_only() {
        let store: Arc<dyn NurtureStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let expired = snoozed_lead(store.as_ref(), -1).await;
        let still_locked = snoozed_lead(store.as_ref(), 24).await;

        let report = SnoozeExpirer::new(Arc::clone(&store), 100)
            .run_once(false)
            .await
            .unwrap();
        assert_eq!(report.matched, vec![expired.id]);
        assert_eq!(report.released, 1);

        let released = store.get_lead(expired.id).await.unwrap().unwrap();
        assert!(released.nurture_locked_until.is_none());
        assert!(released.next_nurture_at.is_some());
        // Status untouched by the expirer
        assert_eq!(released.nurture_status, NurtureStatus::Snoozed);

        let untouched = store.get_lead(still_locked.id).await.unwrap().unwrap();
        assert!(untouched.nurture_locked_until.is_some());
        assert!(untouched.next_nurture_at.is_none());
    }

    #[tokio::test]
    async fn empty_pool_is_a_noop() {
        let store: Arc<dyn NurtureStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let report = SnoozeExpirer::new(store, 100).run_once(false).await.unwrap();
        assert!(report.matched.is_empty());
        assert_eq!(report.released, 0);
    }

    #[tokio::test]
    async fn batch_is_bounded_oldest_first() {
        let store: Arc<dyn NurtureStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let older = snoozed_lead(store.as_ref(), -48).await;
        let _newer = snoozed_lead(store.as_ref(), -1).await;

        let report = SnoozeExpirer::new(Arc::clone(&store), 1)
            .run_once(false)
            .await
            .unwrap();
        assert_eq!(report.matched, vec![older.id]);
        assert_eq!(report.released, 1);
    }
}
