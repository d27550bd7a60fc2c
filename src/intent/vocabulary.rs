//! Keyword vocabulary for intent classification.
//!
//! All keyword lists are data, not logic. The compiled defaults below
//! cover the common cases; deployments can override any category by
//! deserializing a `Vocabulary` from JSON and handing it to
//! `IntentClassifier::new`.
//!
//! Matching rules (applied by the classifier):
//! - single-word entries match as whole tokens;
//! - multi-word entries match as word-bounded phrases;
//! - STOP single words match only when they are the entire message, so
//!   "stop bothering me" can still reach the negative bucket.

use serde::Deserialize;

/// Keyword lists per recognized category.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Opt-out keywords. Checked before everything else.
    pub stop: Vec<String>,
    /// Negation tokens that, near a contact token, mean "don't call".
    pub negation: Vec<String>,
    /// Contact-channel tokens a negation can apply to.
    pub contact: Vec<String>,
    /// Standalone "text me instead" phrases.
    pub prefer_text: Vec<String>,
    /// Deferral tokens ("later", seasons, "next year").
    pub delay: Vec<String>,
    /// Appointment/logistics vocabulary, the strongest positive signal.
    pub appointment: Vec<String>,
    /// Call-back request vocabulary.
    pub call: Vec<String>,
    /// Home valuation / price vocabulary.
    pub valuation: Vec<String>,
    /// General affirmatives.
    pub affirmative: Vec<String>,
    /// Declines.
    pub negative: Vec<String>,
}

fn list(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|s| s.to_string()).collect()
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            stop: list(&[
                "stop",
                "stopall",
                "unsubscribe",
                "cancel",
                "end",
                "quit",
                "remove",
                "do not text",
                "dont text",
                "don't text",
                "stop texting",
                "stop messaging",
                "opt out",
                "remove me",
            ]),
            negation: list(&[
                "don't", "dont", "no", "not", "can't", "cant", "won't", "wont", "never",
                "quit", "without",
            ]),
            contact: list(&["call", "calls", "calling", "phone", "ring"]),
            prefer_text: list(&[
                "prefer text",
                "text only",
                "text is fine",
                "text is better",
                "just text",
                "text me instead",
                "rather text",
            ]),
            delay: list(&[
                "later",
                "not yet",
                "eventually",
                "someday",
                "down the road",
                "next month",
                "next year",
                "few months",
                "couple months",
                "spring",
                "summer",
                "fall",
                "winter",
                "after the holidays",
            ]),
            appointment: list(&[
                "appointment",
                "schedule",
                "showing",
                "meet",
                "meeting",
                "tour",
                "visit",
                "come by",
                "stop by",
                "swing by",
                "open house",
                "today",
                "tonight",
                "tomorrow",
                "this week",
                "this weekend",
                "monday",
                "tuesday",
                "wednesday",
                "thursday",
                "friday",
                "saturday",
                "sunday",
                "what time",
            ]),
            call: list(&[
                "call",
                "call me",
                "give me a call",
                "phone",
                "ring me",
                "reach me",
            ]),
            valuation: list(&[
                "value",
                "worth",
                "price",
                "pricing",
                "valuation",
                "estimate",
                "appraisal",
                "cma",
                "market analysis",
                "how much",
                "comps",
            ]),
            // "interested" stays phrase-bound ("i'm interested") so that
            // "not interested" falls through to the negative bucket.
            affirmative: list(&[
                "yes",
                "yeah",
                "yep",
                "yup",
                "sure",
                "ok",
                "okay",
                "definitely",
                "absolutely",
                "sounds good",
                "please do",
                "i'm interested",
                "im interested",
                "very interested",
                "still interested",
            ]),
            negative: list(&[
                "no thanks",
                "no thank you",
                "not interested",
                "not selling",
                "no longer interested",
                "stop bothering",
                "leave me alone",
                "go away",
                "wrong number",
                "nope",
                "nah",
                "lose my number",
            ]),
        }
    }
}
