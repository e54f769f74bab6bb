//! Severity tiers and the policy tables derived from them.
//!
//! Both the review deadline and the nominal reward are pure functions of
//! severity. They are snapshotted onto the report at intake/award time, so
//! a later policy change never retroactively alters existing reports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity classification of a defect report, fixed at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Review SLA in hours for this severity. Informational only: nothing
    /// enforces the deadline or escalates automatically.
    pub fn review_deadline_hours(self) -> u32 {
        match self {
            Self::High => 6,
            Self::Medium => 4,
            Self::Low => 2,
        }
    }

    /// Nominal reward in points for a verified report of this severity.
    ///
    /// The server is the sole source of truth for reward amounts; a
    /// caller-supplied amount must match this table (or be an explicit 0).
    pub fn nominal_reward(self) -> u64 {
        match self {
            Self::High => 500,
            Self::Medium => 300,
            Self::Low => 150,
        }
    }

    /// Canonical lowercase name, used for storage and wire formats.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Strict parse of a canonical severity name.
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Lenient parse for intake input: case-insensitive and trimmed.
    /// Returns `None` for absent or unrecognized input.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.map(str::trim)
            .map(str::to_ascii_lowercase)
            .and_then(|s| Self::from_str(&s))
    }

    /// Severity for intake input: absent or unrecognized input falls back
    /// to `Medium`.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        Self::parse(raw).unwrap_or(Self::Medium)
    }

    /// Review deadline snapshot for raw intake input.
    ///
    /// Recognized severities use the table. Absent or unrecognized input is
    /// handled asymmetrically: the severity itself defaults to `Medium`, but
    /// the deadline falls back to the *value* 2 (the fastest SLA), not to
    /// medium's 4. Unclassifiable input gets the most conservative review
    /// window without inheriting the low tier's other effects.
    pub fn deadline_for_input(raw: Option<&str>) -> u32 {
        match Self::parse(raw) {
            Some(severity) => severity.review_deadline_hours(),
            None => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
