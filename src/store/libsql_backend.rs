//! libSQL backend — async `NurtureStore` implementation.
//!
//! Supports local file and in-memory databases. All timestamps are
//! written as fixed-precision RFC 3339 so SQLite's text comparison
//! matches chronological order, which the due-predicate queries and the
//! conditional claim rely on.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::nurture::router::NurtureUpdate;
use crate::nurture::stage::Stage;
use crate::nurture::timing::parse_timestamp;
use crate::phone;
use crate::store::migrations;
use crate::store::model::{
    Direction, FollowUpTask, Lead, MessageRecord, NurtureStatus, TaskPriority,
};
use crate::store::traits::NurtureStore;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical timestamp write format: fixed precision, `Z` suffix, so text
/// ordering is chronological ordering.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_ts(dt: Option<DateTime<Utc>>) -> libsql::Value {
    match dt {
        Some(dt) => libsql::Value::Text(ts(dt)),
        None => libsql::Value::Null,
    }
}

fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Strictly parse a scheduling-critical column; `None` passes through.
fn parse_opt_ts(raw: Option<String>, column: &str, id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
    match raw {
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .map_err(|e| StoreError::Query(format!("lead {id}: bad {column}: {e}"))),
        None => Ok(None),
    }
}

/// Lenient parse for audit columns — malformed values degrade to the
/// epoch minimum instead of poisoning the row.
fn parse_audit_ts(s: &str) -> DateTime<Utc> {
    parse_timestamp(s).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Column order shared by all lead SELECTs:
/// 0:id, 1:name, 2:phone, 3:nurture_status, 4:nurture_stage,
/// 5:next_nurture_at, 6:last_nurture_sent_at, 7:nurture_locked_until,
/// 8:assigned_agent, 9:created_at, 10:updated_at
const LEAD_COLUMNS: &str = "id, name, phone, nurture_status, nurture_stage, \
     next_nurture_at, last_nurture_sent_at, nurture_locked_until, \
     assigned_agent, created_at, updated_at";

fn row_to_lead(row: &libsql::Row) -> Result<Lead, StoreError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| StoreError::Query(format!("lead row missing id: {e}")))?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| StoreError::Query(format!("lead {id_str}: bad id: {e}")))?;

    let status_str: String = row
        .get(3)
        .map_err(|e| StoreError::Query(format!("lead {id_str}: missing status: {e}")))?;
    let nurture_status = NurtureStatus::parse(&status_str)
        .ok_or_else(|| StoreError::Query(format!("lead {id_str}: unknown status {status_str:?}")))?;

    let stage_str: String = row
        .get(4)
        .map_err(|e| StoreError::Query(format!("lead {id_str}: missing stage: {e}")))?;
    let nurture_stage = Stage::parse(&stage_str)
        .ok_or_else(|| StoreError::Query(format!("lead {id_str}: unknown stage {stage_str:?}")))?;

    Ok(Lead {
        id,
        name: row.get::<String>(1).ok(),
        phone: row
            .get(2)
            .map_err(|e| StoreError::Query(format!("lead {id_str}: missing phone: {e}")))?,
        nurture_status,
        nurture_stage,
        next_nurture_at: parse_opt_ts(row.get::<String>(5).ok(), "next_nurture_at", &id_str)?,
        last_nurture_sent_at: parse_opt_ts(
            row.get::<String>(6).ok(),
            "last_nurture_sent_at",
            &id_str,
        )?,
        nurture_locked_until: parse_opt_ts(
            row.get::<String>(7).ok(),
            "nurture_locked_until",
            &id_str,
        )?,
        assigned_agent: row.get::<String>(8).ok(),
        created_at: parse_audit_ts(&row.get::<String>(9).unwrap_or_default()),
        updated_at: parse_audit_ts(&row.get::<String>(10).unwrap_or_default()),
    })
}

fn row_to_message(row: &libsql::Row) -> Result<MessageRecord, StoreError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| StoreError::Query(format!("message row missing id: {e}")))?;
    let direction_str: String = row
        .get(2)
        .map_err(|e| StoreError::Query(format!("message {id_str}: missing direction: {e}")))?;

    Ok(MessageRecord {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| StoreError::Query(format!("message {id_str}: bad id: {e}")))?,
        lead_id: row
            .get::<String>(1)
            .ok()
            .and_then(|s| Uuid::parse_str(&s).ok()),
        direction: Direction::parse(&direction_str).ok_or_else(|| {
            StoreError::Query(format!("message {id_str}: unknown direction {direction_str:?}"))
        })?,
        channel: row.get::<String>(3).unwrap_or_else(|_| "sms".into()),
        body: row
            .get(4)
            .map_err(|e| StoreError::Query(format!("message {id_str}: missing body: {e}")))?,
        is_auto: row.get::<i64>(5).unwrap_or(0) != 0,
        created_at: parse_audit_ts(&row.get::<String>(6).unwrap_or_default()),
    })
}

fn row_to_task(row: &libsql::Row) -> Result<FollowUpTask, StoreError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| StoreError::Query(format!("task row missing id: {e}")))?;
    let lead_str: String = row
        .get(1)
        .map_err(|e| StoreError::Query(format!("task {id_str}: missing lead_id: {e}")))?;

    Ok(FollowUpTask {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| StoreError::Query(format!("task {id_str}: bad id: {e}")))?,
        lead_id: Uuid::parse_str(&lead_str)
            .map_err(|e| StoreError::Query(format!("task {id_str}: bad lead_id: {e}")))?,
        title: row
            .get(2)
            .map_err(|e| StoreError::Query(format!("task {id_str}: missing title: {e}")))?,
        notes: row.get::<String>(3).unwrap_or_default(),
        due_at: parse_audit_ts(&row.get::<String>(4).unwrap_or_default()),
        priority: TaskPriority::parse(&row.get::<String>(5).unwrap_or_default())
            .unwrap_or(TaskPriority::Normal),
        assigned_to: row.get::<String>(6).ok(),
        created_at: parse_audit_ts(&row.get::<String>(7).unwrap_or_default()),
    })
}

/// Collect leads from a result set, skipping (and logging) unreadable
/// rows so one bad record can't poison a whole sweep.
async fn collect_leads(mut rows: libsql::Rows) -> Result<Vec<Lead>, StoreError> {
    let mut leads = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| StoreError::Query(format!("Failed to read lead rows: {e}")))?
    {
        match row_to_lead(&row) {
            Ok(lead) => leads.push(lead),
            Err(e) => warn!(error = %e, "Skipping unreadable lead row"),
        }
    }
    Ok(leads)
}

#[async_trait]
impl NurtureStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), StoreError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Leads ───────────────────────────────────────────────────────

    async fn insert_lead(&self, lead: &Lead) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO leads (id, name, phone, phone_key, nurture_status, nurture_stage,
                    next_nurture_at, last_nurture_sent_at, nurture_locked_until,
                    assigned_agent, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    lead.id.to_string(),
                    opt_text(lead.name.as_deref()),
                    lead.phone.clone(),
                    phone::match_key(&lead.phone),
                    lead.nurture_status.as_str(),
                    lead.nurture_stage.as_str(),
                    opt_ts(lead.next_nurture_at),
                    opt_ts(lead.last_nurture_sent_at),
                    opt_ts(lead.nurture_locked_until),
                    opt_text(lead.assigned_agent.as_deref()),
                    ts(lead.created_at),
                    ts(lead.updated_at),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to insert lead: {e}")))?;
        Ok(())
    }

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to get lead: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read lead: {e}")))?
        {
            Some(row) => Ok(Some(row_to_lead(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_lead_by_phone_key(&self, key: &str) -> Result<Option<Lead>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {LEAD_COLUMNS} FROM leads WHERE phone_key = ?1
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![key],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to find lead by phone: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read lead: {e}")))?
        {
            Some(row) => Ok(Some(row_to_lead(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_due_leads(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {LEAD_COLUMNS} FROM leads
                     WHERE nurture_status = 'active'
                       AND next_nurture_at IS NOT NULL
                       AND next_nurture_at <= ?1
                     ORDER BY next_nurture_at ASC
                     LIMIT ?2"
                ),
                params![ts(now), limit as i64],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to list due leads: {e}")))?;

        collect_leads(rows).await
    }

    async fn claim_due_lead(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE leads SET next_nurture_at = NULL, updated_at = ?2
                 WHERE id = ?1
                   AND nurture_status = 'active'
                   AND next_nurture_at IS NOT NULL
                   AND next_nurture_at <= ?3",
                params![id.to_string(), ts(now), ts(now)],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to claim lead: {e}")))?;
        Ok(affected == 1)
    }

    async fn restore_due(&self, id: Uuid, due_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "UPDATE leads SET next_nurture_at = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), ts(due_at), ts(Utc::now())],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to restore due lead: {e}")))?;
        Ok(())
    }

    async fn advance_lead(
        &self,
        id: Uuid,
        stage: Stage,
        sent_at: DateTime<Utc>,
        next_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "UPDATE leads SET nurture_stage = ?2, last_nurture_sent_at = ?3,
                    next_nurture_at = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    stage.as_str(),
                    ts(sent_at),
                    opt_ts(next_at),
                    ts(Utc::now()),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to advance lead: {e}")))?;
        Ok(())
    }

    async fn apply_update(&self, id: Uuid, update: &NurtureUpdate) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "UPDATE leads SET nurture_status = ?2,
                    nurture_stage = COALESCE(?3, nurture_stage),
                    next_nurture_at = ?4,
                    nurture_locked_until = ?5,
                    updated_at = ?6
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    update.status.as_str(),
                    opt_text(update.stage.map(|s| s.as_str())),
                    opt_ts(update.next_nurture_at),
                    opt_ts(update.nurture_locked_until),
                    ts(Utc::now()),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to apply lead update: {e}")))?;
        Ok(())
    }

    async fn list_expired_snoozes(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {LEAD_COLUMNS} FROM leads
                     WHERE nurture_status = 'snoozed'
                       AND nurture_locked_until IS NOT NULL
                       AND nurture_locked_until <= ?1
                     ORDER BY nurture_locked_until ASC
                     LIMIT ?2"
                ),
                params![ts(now), limit as i64],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to list expired snoozes: {e}")))?;

        collect_leads(rows).await
    }

    async fn release_snoozes(
        &self,
        ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        // One batch update over the id list.
        let placeholders = (0..ids.len())
            .map(|i| format!("?{}", i + 3))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE leads SET next_nurture_at = ?1, nurture_locked_until = NULL, updated_at = ?2
             WHERE id IN ({placeholders})"
        );

        let mut values: Vec<libsql::Value> = vec![
            libsql::Value::Text(ts(now)),
            libsql::Value::Text(ts(Utc::now())),
        ];
        values.extend(ids.iter().map(|id| libsql::Value::Text(id.to_string())));

        let affected = self
            .conn()
            .execute(&sql, values)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to release snoozes: {e}")))?;
        Ok(affected as usize)
    }

    // ── Messages ────────────────────────────────────────────────────

    async fn insert_message(&self, message: &MessageRecord) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO messages (id, lead_id, direction, channel, body, is_auto, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    message.id.to_string(),
                    opt_text(message.lead_id.map(|id| id.to_string()).as_deref()),
                    message.direction.as_str(),
                    message.channel.clone(),
                    message.body.clone(),
                    message.is_auto as i64,
                    ts(message.created_at),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to insert message: {e}")))?;
        Ok(())
    }

    async fn list_messages_for_lead(
        &self,
        lead_id: Uuid,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, lead_id, direction, channel, body, is_auto, created_at
                 FROM messages WHERE lead_id = ?1
                 ORDER BY created_at DESC LIMIT ?2",
                params![lead_id.to_string(), limit as i64],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to list messages: {e}")))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read message rows: {e}")))?
        {
            messages.push(row_to_message(&row)?);
        }
        Ok(messages)
    }

    // ── Tasks ───────────────────────────────────────────────────────

    async fn insert_task(&self, task: &FollowUpTask) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO tasks (id, lead_id, title, notes, due_at, priority, assigned_to, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    task.id.to_string(),
                    task.lead_id.to_string(),
                    task.title.clone(),
                    task.notes.clone(),
                    ts(task.due_at),
                    task.priority.as_str(),
                    opt_text(task.assigned_to.as_deref()),
                    ts(task.created_at),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to insert task: {e}")))?;
        Ok(())
    }

    async fn list_tasks_for_lead(&self, lead_id: Uuid) -> Result<Vec<FollowUpTask>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, lead_id, title, notes, due_at, priority, assigned_to, created_at
                 FROM tasks WHERE lead_id = ?1
                 ORDER BY created_at DESC",
                params![lead_id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to list tasks: {e}")))?;

        let mut tasks = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read task rows: {e}")))?
        {
            tasks.push(row_to_task(&row)?);
        }
        Ok(tasks)
    }
}
