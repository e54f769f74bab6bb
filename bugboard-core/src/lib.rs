//! Domain types and lifecycle rules for bug report tracking.
//!
//! This crate is pure: no I/O, no async, no storage. It defines the
//! severity policy (review deadlines and reward amounts), the report
//! status state machine, the report and user records, and the error
//! taxonomy shared by the service layer.

pub mod error;
pub mod report;
pub mod severity;
pub mod status;
pub mod user;

pub use error::EngineError;
pub use report::{Report, ReportDraft, ReportId, ANONYMOUS_DISPLAY};
pub use severity::Severity;
pub use status::ReportStatus;
pub use user::{Role, User, UserId};
