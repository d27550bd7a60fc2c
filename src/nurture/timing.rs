//! Stage timing policy — computes when the next nurture send is due.
//!
//! Target = last send + the current stage's offset, plus 15–65 minutes of
//! random jitter so sends never look mechanically periodic, then clamped
//! into the daily send window in the lead's local time.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveTime, Utc};
use rand::Rng;

use crate::config::{JitterBounds, SendWindow};
use crate::error::ValidationError;
use crate::nurture::stage::Stage;

/// The computed successor for a lead after a successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextSend {
    pub stage: Stage,
    pub send_at: DateTime<Utc>,
}

/// Strictly parse a stored timestamp.
///
/// Accepts RFC 3339 (the canonical write format) and SQLite `datetime()`
/// output. Anything else is a `ValidationError` — the offending lead is
/// logged and skipped, never retried.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(ndt.and_utc());
    }
    Err(ValidationError::BadTimestamp {
        value: s.to_string(),
    })
}

/// Stage timing policy. Pure: all state comes in through the call.
#[derive(Debug, Clone)]
pub struct TimingPolicy {
    jitter: JitterBounds,
    window: SendWindow,
    /// Lead-local offset from UTC in minutes.
    local_offset_minutes: i32,
}

impl TimingPolicy {
    pub fn new(jitter: JitterBounds, window: SendWindow, local_offset_minutes: i32) -> Self {
        Self {
            jitter,
            window,
            local_offset_minutes,
        }
    }

    /// Successor stage and send time, or `None` when the current stage is
    /// terminal (Day7, LongTerm).
    pub fn next_send(
        &self,
        current: Stage,
        last_sent_at: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> Option<NextSend> {
        let stage = current.successor()?;
        let offset_hours = current.advance_offset_hours()?;

        let jitter_secs =
            rng.gen_range(self.jitter.min_minutes * 60..=self.jitter.max_minutes * 60);
        let target = last_sent_at
            + ChronoDuration::hours(offset_hours)
            + ChronoDuration::seconds(jitter_secs);

        Some(NextSend {
            stage,
            send_at: self.clamp_to_window(target),
        })
    }

    /// As [`next_send`](Self::next_send), parsing the stored last-send
    /// timestamp first.
    pub fn next_send_from_str(
        &self,
        current: Stage,
        last_sent_at: &str,
        rng: &mut impl Rng,
    ) -> Result<Option<NextSend>, ValidationError> {
        let last = parse_timestamp(last_sent_at)?;
        Ok(self.next_send(current, last, rng))
    }

    /// Move a target into the daily send window, lead-local time:
    /// before the window opens → same day at the window start; at or past
    /// close → next day at the window start; inside → unchanged.
    fn clamp_to_window(&self, target: DateTime<Utc>) -> DateTime<Utc> {
        let offset = FixedOffset::east_opt(self.local_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        let local = target.with_timezone(&offset);

        let start = NaiveTime::from_hms_opt(self.window.start_hour, self.window.start_minute, 0)
            .unwrap_or(NaiveTime::MIN);
        let end = NaiveTime::from_hms_opt(self.window.end_hour, self.window.end_minute, 0)
            .unwrap_or(NaiveTime::MIN);

        let time = local.time();
        let snap_date = if time < start {
            Some(local.date_naive())
        } else if time >= end {
            Some(local.date_naive() + ChronoDuration::days(1))
        } else {
            None
        };

        match snap_date {
            Some(date) => date
                .and_time(start)
                .and_local_timezone(offset)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(target),
            None => target,
        }
    }
}
