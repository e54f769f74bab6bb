//! Repository abstraction for report and user persistence.
//!
//! The trait is deliberately coarse: id allocation happens inside
//! [`ReportRepository::insert_report`] and the status compare-and-set plus
//! point award happen inside [`ReportRepository::apply_transition`], so each
//! backend can make the whole operation a single transaction. The engine
//! never sees a half-applied transition.

mod memory;
mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bugboard_core::{Report, ReportId, ReportStatus, Severity, User, UserId};

/// Fields of a report the caller supplies; the repository assigns the id,
/// sets `status = Submitted` and `awarded_points = 0`.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub title: String,
    pub description: String,
    pub steps: String,
    pub environment: String,
    pub app_name: String,
    pub severity: Severity,
    pub review_deadline_hours: u32,
    pub reporter_id: UserId,
    pub reporter_display: String,
    pub submitted_at: i64,
}

/// Result of the atomic status compare-and-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The CAS matched and the update (plus any award) committed.
    Applied(Report),
    /// The report's status was not the expected one; a concurrent
    /// transition won. Nothing was written.
    StatusConflict { actual: ReportStatus },
    /// The report disappeared between the engine's read and the apply.
    ReportMissing,
}

/// One row of the derived leaderboard read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub name: String,
    pub point_balance: u64,
    pub report_count: u64,
}

/// Errors from a storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The backend failed to perform an operation.
    Storage {
        operation: &'static str,
        message: String,
    },
    /// Stored data could not be interpreted (e.g. an unknown status name).
    Corruption { what: String },
}

impl RepositoryError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }

    pub fn corruption(what: impl Into<String>) -> Self {
        Self::Corruption { what: what.into() }
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage { operation, message } => {
                write!(f, "storage error during {}: {}", operation, message)
            }
            Self::Corruption { what } => write!(f, "corrupted {} in storage", what),
        }
    }
}

impl std::error::Error for RepositoryError {}

/// Current unix timestamp in seconds.
pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Repository trait for reports, users and the leaderboard read.
///
/// Implementations must guarantee that `insert_report` and
/// `apply_transition` are atomic: either every write in the operation is
/// visible or none is.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Create a user if it does not exist yet. Existing users are left
    /// untouched, so repeated identity materialization is idempotent.
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError>;

    /// Fetch a user by id.
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;

    /// Allocate the next report id and persist the report in one
    /// transaction. Returns the stored record.
    async fn insert_report(&self, new: NewReport) -> Result<Report, RepositoryError>;

    /// Fetch a report by id.
    async fn get_report(&self, id: &ReportId) -> Result<Option<Report>, RepositoryError>;

    /// Atomically: verify the report's status equals `expected`, move it to
    /// `target`, record `award` as the report's awarded points when `target`
    /// is point-bearing, and credit the reporter's balance by `award`.
    /// All of it commits together or not at all.
    async fn apply_transition(
        &self,
        id: &ReportId,
        expected: ReportStatus,
        target: ReportStatus,
        award: u64,
    ) -> Result<TransitionOutcome, RepositoryError>;

    /// Derived read: non-admin users with a positive balance, ordered by
    /// balance descending, then by earliest balance achievement, then by id.
    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, RepositoryError>;

    /// All reports, oldest first. Audit/status surface; reports are never
    /// deleted.
    async fn list_reports(&self) -> Result<Vec<Report>, RepositoryError>;
}
