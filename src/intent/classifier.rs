//! Keyword intent classifier — deterministic, total, never fails.
//!
//! Checks run in fixed priority order; the first match wins:
//! 1. STOP vocabulary (compliance overrides any other signal)
//! 2. negation-before-contact window, or a "prefer text" phrase → NotNow
//! 3. affirmative followed later by a delay token → NotNow
//! 4. positive buckets, strongest first: appointment > call > valuation >
//!    affirmative → Positive
//! 5. negative vocabulary → Negative
//! 6. otherwise Unknown
//!
//! Negation detection is a sliding-window scan over normalized tokens.

use crate::intent::{Intent, Vocabulary};

/// How many tokens before a contact token a negation still applies.
const NEGATION_WINDOW: usize = 3;

/// Classifies raw inbound SMS text into an [`Intent`].
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    vocab: Vocabulary,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(Vocabulary::default())
    }
}

impl IntentClassifier {
    pub fn new(vocab: Vocabulary) -> Self {
        Self { vocab }
    }

    /// Classify arbitrary user-typed text. Empty input is `Unknown`.
    pub fn classify(&self, text: &str) -> Intent {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Intent::Unknown;
        }
        let joined = tokens.join(" ");

        if self.matches_stop(&joined) {
            return Intent::Stop;
        }

        if self.negated_contact(&tokens) || any_match(&self.vocab.prefer_text, &joined) {
            return Intent::NotNow;
        }

        if self.affirmative_then_delay(&joined) {
            return Intent::NotNow;
        }

        let positive_buckets = [
            &self.vocab.appointment,
            &self.vocab.call,
            &self.vocab.valuation,
            &self.vocab.affirmative,
        ];
        for bucket in positive_buckets {
            if any_match(bucket, &joined) {
                return Intent::Positive;
            }
        }

        if any_match(&self.vocab.negative, &joined) {
            return Intent::Negative;
        }

        Intent::Unknown
    }

    /// Single-word STOP keywords must be the entire message ("STOP",
    /// "unsubscribe"); multi-word phrases ("do not text") match anywhere.
    /// Keeps "stop bothering me" eligible for the negative bucket.
    fn matches_stop(&self, joined: &str) -> bool {
        self.vocab.stop.iter().any(|entry| {
            if entry.contains(' ') {
                contains_phrase(joined, entry)
            } else {
                joined == entry
            }
        })
    }

    /// A negation token within `NEGATION_WINDOW` tokens before a
    /// contact-channel token: "please don't call me" → NotNow.
    fn negated_contact(&self, tokens: &[String]) -> bool {
        for (i, token) in tokens.iter().enumerate() {
            if !self.vocab.contact.iter().any(|c| c == token) {
                continue;
            }
            let window_start = i.saturating_sub(NEGATION_WINDOW);
            if tokens[window_start..i]
                .iter()
                .any(|t| self.vocab.negation.iter().any(|n| n == t))
            {
                return true;
            }
        }
        false
    }

    /// "yes ... later" — the delay must strictly follow the affirmative.
    /// "later ... yes" does not count.
    fn affirmative_then_delay(&self, joined: &str) -> bool {
        let affirmative = first_match_offset(&self.vocab.affirmative, joined);
        let delay = first_match_offset(&self.vocab.delay, joined);
        match (affirmative, delay) {
            (Some(a), Some(d)) => a < d,
            _ => false,
        }
    }
}

/// Lowercase, strip punctuation (apostrophes survive so "don't" stays one
/// token), collapse whitespace.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .map(|t| t.trim_matches('\'').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Word-bounded containment of `entry` in the normalized text.
fn contains_phrase(joined: &str, entry: &str) -> bool {
    format!(" {joined} ").contains(&format!(" {entry} "))
}

fn any_match(entries: &[String], joined: &str) -> bool {
    entries.iter().any(|e| contains_phrase(joined, e))
}

/// Byte offset of the earliest match from `entries` in the padded text.
/// Offsets are only compared against each other, so padding is harmless.
fn first_match_offset(entries: &[String], joined: &str) -> Option<usize> {
    let padded = format!(" {joined} ");
    entries
        .iter()
        .filter_map(|e| padded.find(&format!(" {e} ")))
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Intent {
        IntentClassifier::default().classify(text)
    }

    // ── STOP ────────────────────────────────────────────────────────

    #[test]
    fn stop_exact_match() {
        assert_eq!(classify("STOP"), Intent::Stop);
        assert_eq!(classify("  stop  "), Intent::Stop);
        assert_eq!(classify("Stop."), Intent::Stop);
        assert_eq!(classify("UNSUBSCRIBE"), Intent::Stop);
        assert_eq!(classify("quit"), Intent::Stop);
    }

    #[test]
    fn stop_phrase_anywhere() {
        assert_eq!(classify("please do not text me again"), Intent::Stop);
        assert_eq!(classify("I'd like to opt out of these"), Intent::Stop);
        assert_eq!(classify("stop texting me"), Intent::Stop);
    }

    #[test]
    fn stop_wins_over_positive_keywords() {
        // Appointment keyword present, but the opt-out phrase wins.
        assert_eq!(classify("don't text me, maybe call tomorrow"), Intent::Stop);
    }

    #[test]
    fn bare_stop_word_inside_sentence_is_not_stop() {
        // Exact-match rule: "stop" mid-sentence doesn't opt out, so
        // "stop bothering" can still reach the negative bucket.
        assert_eq!(classify("stop bothering me"), Intent::Negative);
    }

    // ── NOT_NOW: contact negation ───────────────────────────────────

    #[test]
    fn negation_before_call() {
        assert_eq!(classify("please don't call me, text is fine"), Intent::NotNow);
        assert_eq!(classify("no calls please"), Intent::NotNow);
        assert_eq!(classify("can't talk, never phone me"), Intent::NotNow);
    }

    #[test]
    fn negation_window_is_three_tokens() {
        // "don't" sits five tokens before "call" — out of window, so
        // "call" falls through to the call bucket.
        assert_eq!(
            classify("don't you think you should call"),
            Intent::Positive
        );
    }

    #[test]
    fn prefer_text_phrase() {
        assert_eq!(classify("text only"), Intent::NotNow);
        assert_eq!(classify("i'd rather text"), Intent::NotNow);
    }

    #[test]
    fn call_without_negation_is_positive() {
        assert_eq!(classify("call me"), Intent::Positive);
    }

    // ── NOT_NOW: affirmative then delay ─────────────────────────────

    #[test]
    fn affirmative_before_delay() {
        assert_eq!(classify("yes but not until spring"), Intent::NotNow);
        assert_eq!(classify("sure, maybe next year"), Intent::NotNow);
    }

    #[test]
    fn delay_before_affirmative_is_not_deferral() {
        // Delay precedes the affirmative — falls through to the
        // affirmative bucket.
        assert_eq!(classify("spring is when, yes"), Intent::Positive);
    }

    #[test]
    fn delay_alone_is_unknown() {
        assert_eq!(classify("maybe in the spring"), Intent::Unknown);
    }

    // ── Positive buckets, strength order ────────────────────────────

    #[test]
    fn appointment_wins_over_call() {
        // "tomorrow" (appointment) outranks the call-request bucket.
        assert_eq!(classify("can you call me tomorrow"), Intent::Positive);
    }

    #[test]
    fn valuation_keywords() {
        assert_eq!(classify("what's my house worth"), Intent::Positive);
        assert_eq!(classify("how much could we list for"), Intent::Positive);
    }

    #[test]
    fn plain_affirmative() {
        assert_eq!(classify("yes"), Intent::Positive);
        assert_eq!(classify("sounds good"), Intent::Positive);
    }

    // ── Negative ────────────────────────────────────────────────────

    #[test]
    fn negative_phrases() {
        assert_eq!(classify("no thanks"), Intent::Negative);
        assert_eq!(classify("we are not interested"), Intent::Negative);
        assert_eq!(classify("wrong number"), Intent::Negative);
    }

    // ── Unknown ─────────────────────────────────────────────────────

    #[test]
    fn empty_and_noise_are_unknown() {
        assert_eq!(classify(""), Intent::Unknown);
        assert_eq!(classify("   "), Intent::Unknown);
        assert_eq!(classify("!!!"), Intent::Unknown);
        assert_eq!(classify("who is this"), Intent::Unknown);
    }

    #[test]
    fn custom_vocabulary_is_honored() {
        let vocab: Vocabulary = serde_json::from_str(r#"{"stop": ["basta"]}"#).unwrap();
        let classifier = IntentClassifier::new(vocab);
        assert_eq!(classifier.classify("basta"), Intent::Stop);
        // Default entries for other categories still apply
        assert_eq!(classifier.classify("call me tomorrow"), Intent::Positive);
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = IntentClassifier::default();
        let text = "yes, can you call me tomorrow about the price";
        let first = classifier.classify(text);
        for _ in 0..10 {
            assert_eq!(classifier.classify(text), first);
        }
    }
}
