//! Report records and intake drafts.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EngineError;
use crate::severity::Severity;
use crate::status::ReportStatus;
use crate::user::UserId;

/// Display identity stored for reports submitted anonymously. The crediting
/// user id is always retained so points can still be awarded.
pub const ANONYMOUS_DISPLAY: &str = "anonymous";

/// Newtype for the human-readable report identifier (e.g. `BUG-042`).
///
/// Ids are allocated by the repository from a monotonic sequence claimed in
/// the same transaction that inserts the report, so concurrent intakes can
/// never mint duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(pub String);

impl ReportId {
    /// Format a claimed sequence number as a prefixed, zero-padded id.
    /// Width 3 grows naturally once the sequence passes 999.
    pub fn from_sequence(prefix: &str, seq: u64) -> Self {
        Self(format!("{}-{:03}", prefix, seq))
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ReportId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ReportId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A persisted defect report.
///
/// `status` is mutable only through the transition engine; `awarded_points`
/// is set exactly once, when the report enters `Verified`. Reports are never
/// deleted: point awards are currency-like and need an audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub title: String,
    pub description: String,
    pub steps: String,
    pub environment: String,
    pub app_name: String,
    pub severity: Severity,
    pub status: ReportStatus,
    pub awarded_points: u64,
    /// Review SLA snapshot taken from the severity table at intake.
    pub review_deadline_hours: u32,
    pub reporter_id: UserId,
    /// Display identity; `ANONYMOUS_DISPLAY` when the reporter opted out.
    pub reporter_display: String,
    /// Unix seconds.
    pub submitted_at: i64,
}

/// Intake payload for a new report, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportDraft {
    pub title: String,
    pub description: String,
    pub steps: String,
    pub environment: String,
    pub app_name: String,
    /// Raw severity input; absent or unrecognized values fall back to medium.
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
}

impl ReportDraft {
    /// Validates that every required field is non-empty (after trimming),
    /// reporting the first missing field by name.
    pub fn validate(&self) -> Result<(), EngineError> {
        let required = [
            ("title", &self.title),
            ("description", &self.description),
            ("steps", &self.steps),
            ("environment", &self.environment),
            ("app_name", &self.app_name),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(EngineError::validation(format!(
                    "required field '{}' is missing",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Severity resolved with the intake default.
    pub fn resolved_severity(&self) -> Severity {
        Severity::parse_or_default(self.severity.as_deref())
    }

    /// Review deadline snapshot for this draft. Recognized severities use
    /// the table; absent or unrecognized input falls back to the value 2
    /// even though the severity resolves to medium.
    pub fn resolved_deadline_hours(&self) -> u32 {
        Severity::deadline_for_input(self.severity.as_deref())
    }
}
