//! Nurture stages — the ordered drip sequence with templates and offsets.

use serde::{Deserialize, Serialize};

/// A named position in the nurture sequence.
///
/// The tight loop runs Day1 → Day7 on fixed offsets; `LongTerm` is the
/// parking stage for "not now" replies and is terminal for automatic
/// advancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Day1,
    Day2,
    Day3,
    Day5,
    Day7,
    LongTerm,
}

impl Stage {
    /// Stage to start newly-enrolled leads on.
    pub fn initial() -> Self {
        Self::Day1
    }

    /// DB string for this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day1 => "day_1",
            Self::Day2 => "day_2",
            Self::Day3 => "day_3",
            Self::Day5 => "day_5",
            Self::Day7 => "day_7",
            Self::LongTerm => "long_term",
        }
    }

    /// Parse a DB string. Unknown values map to `None` — the timing policy
    /// treats them as terminal rather than crashing the sweep.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "day_1" => Some(Self::Day1),
            "day_2" => Some(Self::Day2),
            "day_3" => Some(Self::Day3),
            "day_5" => Some(Self::Day5),
            "day_7" => Some(Self::Day7),
            "long_term" => Some(Self::LongTerm),
            _ => None,
        }
    }

    /// The next stage in the sequence, or `None` at the end of the loop.
    pub fn successor(&self) -> Option<Self> {
        match self {
            Self::Day1 => Some(Self::Day2),
            Self::Day2 => Some(Self::Day3),
            Self::Day3 => Some(Self::Day5),
            Self::Day5 => Some(Self::Day7),
            Self::Day7 | Self::LongTerm => None,
        }
    }

    /// Hours from the last send until the successor stage is due.
    pub fn advance_offset_hours(&self) -> Option<i64> {
        match self {
            Self::Day1 | Self::Day2 => Some(24),
            Self::Day3 | Self::Day5 => Some(48),
            Self::Day7 | Self::LongTerm => None,
        }
    }

    /// Message template for this stage. `{name}` is substituted at render
    /// time.
    pub fn template(&self) -> &'static str {
        match self {
            Self::Day1 => {
                "Hi {name}, thanks for reaching out about your home. \
                 I'd love to help — is there a good time to connect this week?"
            }
            Self::Day2 => {
                "Hi {name}, just following up. Happy to answer any questions \
                 about the market in your neighborhood."
            }
            Self::Day3 => {
                "Hi {name}, homes near you have been moving quickly. Want a \
                 quick rundown of what that means for your place?"
            }
            Self::Day5 => {
                "Hi {name}, I put together some recent sale numbers for your \
                 area. Want me to text them over?"
            }
            Self::Day7 => {
                "Hi {name}, I'll stop filling your inbox after this one — \
                 reply anytime and I'll pick it right back up."
            }
            Self::LongTerm => {
                "Hi {name}, checking back in — still thinking about a move? \
                 No pressure either way."
            }
        }
    }

    /// Render this stage's template for a lead. Missing names fall back to
    /// "there".
    pub fn render(&self, name: Option<&str>) -> String {
        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n,
            _ => "there",
        };
        self.template().replace("{name}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_runs_day1_to_day7() {
        let mut stage = Stage::initial();
        let mut seen = vec![stage];
        while let Some(next) = stage.successor() {
            seen.push(next);
            stage = next;
        }
        assert_eq!(
            seen,
            vec![Stage::Day1, Stage::Day2, Stage::Day3, Stage::Day5, Stage::Day7]
        );
    }

    #[test]
    fn offsets_match_sequence_gaps() {
        assert_eq!(Stage::Day1.advance_offset_hours(), Some(24));
        assert_eq!(Stage::Day2.advance_offset_hours(), Some(24));
        assert_eq!(Stage::Day3.advance_offset_hours(), Some(48));
        assert_eq!(Stage::Day5.advance_offset_hours(), Some(48));
        assert_eq!(Stage::Day7.advance_offset_hours(), None);
        assert_eq!(Stage::LongTerm.advance_offset_hours(), None);
    }

    #[test]
    fn db_strings_round_trip() {
        for stage in [
            Stage::Day1,
            Stage::Day2,
            Stage::Day3,
            Stage::Day5,
            Stage::Day7,
            Stage::LongTerm,
        ] {
            assert_eq!(Stage::parse(stage.as_str()), Some(stage));
        }
        assert_eq!(Stage::parse("day_99"), None);
    }

    #[test]
    fn render_substitutes_name() {
        let body = Stage::Day1.render(Some("Dana"));
        assert!(body.contains("Hi Dana,"));
        assert!(!body.contains("{name}"));
    }

    #[test]
    fn render_falls_back_to_there() {
        assert!(Stage::Day1.render(None).contains("Hi there,"));
        assert!(Stage::Day1.render(Some("  ")).contains("Hi there,"));
    }
}
