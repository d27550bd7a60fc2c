//! Inbound reply intent classification.

pub mod classifier;
pub mod vocabulary;

pub use classifier::IntentClassifier;
pub use vocabulary::Vocabulary;

use serde::{Deserialize, Serialize};

/// The classified purpose of an inbound reply.
///
/// Consumed by the nurture router to decide the lead's next state
/// transition. `Question` is reserved — nothing produces it yet, and the
/// router treats it the same as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Opt-out. Compliance check, always wins over any other signal.
    Stop,
    /// Wants human contact: appointment, call-back, valuation, or a plain yes.
    Positive,
    /// Interested but not yet; keep nurturing, don't escalate.
    NotNow,
    /// Declined.
    Negative,
    /// Reserved for a future question detector.
    Question,
    /// No recognizable signal.
    Unknown,
}

impl Intent {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Positive => "positive",
            Self::NotNow => "not_now",
            Self::Negative => "negative",
            Self::Question => "question",
            Self::Unknown => "unknown",
        }
    }
}

/// One classified inbound message. Transient — produced once per inbound
/// message and consumed immediately by the router, never persisted.
#[derive(Debug, Clone)]
pub struct ClassifiedIntent {
    pub intent: Intent,
    /// The original (un-normalized) inbound text.
    pub text: String,
}
