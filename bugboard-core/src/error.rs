//! Error taxonomy for the lifecycle engine.
//!
//! Every failure a caller can observe is one of five kinds:
//! - `Validation`: malformed or missing input; the caller can correct and retry.
//! - `NotFound`: unknown report id; terminal for that request.
//! - `InvalidTransition`: state machine violation; the report is unchanged.
//! - `Authorization`: caller lacks the admin role.
//! - `Storage`: the storage layer failed; the transaction was rolled back and
//!   no partial state is observable.
//!
//! The engine never retries internally; retries of `transition` are safe
//! because a repeated target is a self-loop and fails with `InvalidTransition`.

use std::fmt;

use crate::status::ReportStatus;

/// Errors surfaced by intake, transition and leaderboard operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed or missing input.
    Validation { message: String },
    /// No report with the given id exists.
    NotFound { report_id: String },
    /// The requested status change is not an allowed edge.
    InvalidTransition { message: String },
    /// The caller is not an administrator.
    Authorization { message: String },
    /// The storage layer failed; no partial state was committed.
    Storage {
        operation: String,
        message: String,
    },
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(report_id: impl fmt::Display) -> Self {
        Self::NotFound {
            report_id: report_id.to_string(),
        }
    }

    pub fn invalid_transition(from: ReportStatus, to: ReportStatus) -> Self {
        Self::InvalidTransition {
            message: format!("no transition from '{}' to '{}'", from, to),
        }
    }

    /// The caller asked for a target status that does not name any state.
    /// The state machine treats this the same as an illegal edge.
    pub fn unknown_target(raw: &str) -> Self {
        Self::InvalidTransition {
            message: format!("unknown target status '{}'", raw),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable kind, used by the HTTP layer for error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Authorization { .. } => "authorization",
            Self::Storage { .. } => "storage",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { message } => write!(f, "validation failed: {}", message),
            Self::NotFound { report_id } => write!(f, "report '{}' not found", report_id),
            Self::InvalidTransition { message } => write!(f, "invalid transition: {}", message),
            Self::Authorization { message } => write!(f, "not authorized: {}", message),
            Self::Storage { operation, message } => {
                write!(f, "storage failure during {}: {}", operation, message)
            }
        }
    }
}

impl std::error::Error for EngineError {}
