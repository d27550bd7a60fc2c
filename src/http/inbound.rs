//! Inbound SMS webhook handling.
//!
//! Receives the already-normalized `{from_phone, text}` record from the
//! provider glue, matches the sender to a lead, persists the message,
//! then classifies and routes. Provider retries are tolerated: message
//! persistence is at-least-once and routing is idempotent on identical
//! intent.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Error;
use crate::http::EngineState;
use crate::intent::{ClassifiedIntent, Intent};
use crate::phone;
use crate::store::NurtureStore;
use crate::store::model::MessageRecord;

/// Normalized inbound delivery from the webhook receiver.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundDelivery {
    pub from_phone: String,
    #[serde(default)]
    pub text: String,
}

/// What the handler did with one delivery.
#[derive(Debug, Serialize)]
pub struct InboundOutcome {
    /// Whether the sender matched a lead.
    pub matched: bool,
    /// Classified intent, when a lead matched.
    pub intent: Option<Intent>,
    /// Whether the lead's nurture state was written.
    pub state_changed: bool,
    /// Whether a follow-up task was created.
    pub task_created: bool,
}

/// Process one inbound delivery end to end.
pub async fn handle_inbound(
    state: &EngineState,
    delivery: &InboundDelivery,
) -> Result<InboundOutcome, Error> {
    let key = phone::match_key(&delivery.from_phone);
    let lead = if key.is_empty() {
        None
    } else {
        state.store.find_lead_by_phone_key(&key).await?
    };

    // Persist first, matched or not. An unmatched message stays in the
    // log with no lead attached.
    let record = MessageRecord::inbound(lead.as_ref().map(|l| l.id), delivery.text.clone());
    state.store.insert_message(&record).await?;

    let Some(lead) = lead else {
        info!(from = %delivery.from_phone, "Inbound SMS from unknown sender logged");
        return Ok(InboundOutcome {
            matched: false,
            intent: None,
            state_changed: false,
            task_created: false,
        });
    };

    let intent = state.classifier.classify(&delivery.text);
    let reply = ClassifiedIntent {
        intent,
        text: delivery.text.clone(),
    };
    let outcome = state.router.route(&lead, &reply, Utc::now());

    info!(
        lead_id = %lead.id,
        intent = intent.label(),
        "Inbound SMS classified"
    );

    // The state write lands before any side effect, so a STOP sticks
    // even if task creation fails afterwards.
    let state_changed = match &outcome.update {
        Some(update) => {
            state.store.apply_update(lead.id, update).await?;
            true
        }
        None => false,
    };

    let task_created = match outcome.task {
        Some(task) => match state.store.insert_task(&task).await {
            Ok(()) => true,
            Err(e) => {
                warn!(lead_id = %lead.id, error = %e, "Failed to create follow-up task");
                false
            }
        },
        None => false,
    };

    Ok(InboundOutcome {
        matched: true,
        intent: Some(intent),
        state_changed,
        task_created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration as ChronoDuration;

    use crate::http::test_support::test_state;
    use crate::store::model::{Lead, NurtureStatus};

    fn delivery(from: &str, text: &str) -> InboundDelivery {
        InboundDelivery {
            from_phone: from.to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn stop_reply_halts_automation() {
        let state = test_state().await;
        let lead = Lead::new("+15551234567").with_name("Dana");
        state.store.insert_lead(&lead).await.unwrap();

        let outcome = handle_inbound(&state, &delivery("+15551234567", "STOP"))
            .await
            .unwrap();
        assert!(outcome.matched);
        assert_eq!(outcome.intent, Some(Intent::Stop));
        assert!(outcome.state_changed);
        assert!(!outcome.task_created);

        let loaded = state.store.get_lead(lead.id).await.unwrap().unwrap();
        assert_eq!(loaded.nurture_status, NurtureStatus::Stopped);
        assert!(loaded.next_nurture_at.is_none());
        assert!(state
            .store
            .list_tasks_for_lead(lead.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn positive_reply_engages_and_creates_task() {
        let state = test_state().await;
        let lead = Lead::new("+15551234567").with_name("Dana").with_agent("a1");
        state.store.insert_lead(&lead).await.unwrap();

        let outcome = handle_inbound(&state, &delivery("+15551234567", "yes, call me tomorrow"))
            .await
            .unwrap();
        assert_eq!(outcome.intent, Some(Intent::Positive));
        assert!(outcome.task_created);

        let loaded = state.store.get_lead(lead.id).await.unwrap().unwrap();
        assert_eq!(loaded.nurture_status, NurtureStatus::Engaged);
        assert!(loaded.next_nurture_at.is_none());

        let tasks = state.store.list_tasks_for_lead(lead.id).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].title.contains("Dana"));
        assert!(tasks[0].notes.contains("call me tomorrow"));
    }

    #[tokio::test]
    async fn not_now_reply_parks_long_term() {
        let state = test_state().await;
        let lead = Lead::new("+15551234567");
        state.store.insert_lead(&lead).await.unwrap();

        let outcome = handle_inbound(&state, &delivery("+15551234567", "yes but not until spring"))
            .await
            .unwrap();
        assert_eq!(outcome.intent, Some(Intent::NotNow));

        let loaded = state.store.get_lead(lead.id).await.unwrap().unwrap();
        assert_eq!(loaded.nurture_status, NurtureStatus::Active);
        assert_eq!(loaded.nurture_stage, crate::nurture::Stage::LongTerm);
        let next = loaded.next_nurture_at.unwrap();
        assert!(next > Utc::now() + ChronoDuration::days(29));
    }

    #[tokio::test]
    async fn unknown_reply_only_logs_message() {
        let state = test_state().await;
        let lead = Lead::new("+15551234567");
        state.store.insert_lead(&lead).await.unwrap();
        let before = state.store.get_lead(lead.id).await.unwrap().unwrap();

        let outcome = handle_inbound(&state, &delivery("+15551234567", "hmm interesting"))
            .await
            .unwrap();
        assert_eq!(outcome.intent, Some(Intent::Unknown));
        assert!(!outcome.state_changed);

        let after = state.store.get_lead(lead.id).await.unwrap().unwrap();
        assert_eq!(after.nurture_status, before.nurture_status);
        assert_eq!(after.nurture_stage, before.nurture_stage);

        let messages = state.store.list_messages_for_lead(lead.id, 10).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].is_auto);
    }

    #[tokio::test]
    async fn unmatched_sender_message_is_logged_unattached() {
        let state = test_state().await;

        let outcome = handle_inbound(&state, &delivery("+15559999999", "hello?"))
            .await
            .unwrap();
        assert!(!outcome.matched);
        assert!(outcome.intent.is_none());
        assert!(!outcome.state_changed);
    }

    #[tokio::test]
    async fn provider_retry_is_safe() {
        let state = test_state().await;
        let lead = Lead::new("+15551234567");
        state.store.insert_lead(&lead).await.unwrap();

        let dup = delivery("+15551234567", "STOP");
        handle_inbound(&state, &dup).await.unwrap();
        handle_inbound(&state, &dup).await.unwrap();

        // At-least-once persistence: both deliveries logged; state
        // converges to the same result.
        let messages = state.store.list_messages_for_lead(lead.id, 10).await.unwrap();
        assert_eq!(messages.len(), 2);
        let loaded = state.store.get_lead(lead.id).await.unwrap().unwrap();
        assert_eq!(loaded.nurture_status, NurtureStatus::Stopped);
    }

    #[tokio::test]
    async fn sender_with_different_formatting_still_matches() {
        let state = test_state().await;
        let lead = Lead::new("(555) 123-4567");
        state.store.insert_lead(&lead).await.unwrap();

        let outcome = handle_inbound(&state, &delivery("+15551234567", "not interested"))
            .await
            .unwrap();
        assert!(outcome.matched);
        assert_eq!(outcome.intent, Some(Intent::Negative));

        let loaded = state.store.get_lead(lead.id).await.unwrap().unwrap();
        assert_eq!(loaded.nurture_status, NurtureStatus::Closed);
    }
}
