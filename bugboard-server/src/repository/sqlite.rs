//! SQLite implementation of `ReportRepository`.
//!
//! This provides persistent storage that survives service restarts.
//!
//! # Schema Versioning
//!
//! The database has a `schema_version` table that tracks the schema version.
//! When the schema needs to change, increment `CURRENT_SCHEMA_VERSION` and add
//! a migration in `run_migrations()`. Migrations run sequentially from the
//! current version to the target version.
//!
//! # Atomicity
//!
//! The two correctness-critical operations run inside explicit transactions:
//! - `insert_report` claims the next sequence number and inserts the row in
//!   one transaction, so concurrent intakes can never mint duplicate ids.
//! - `apply_transition` reads the status, applies the compare-and-set update
//!   and credits the reporter's balance in one transaction; a rollback leaves
//!   no trace of any of the three writes.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::warn;

use bugboard_core::{Report, ReportId, ReportStatus, Role, Severity, User, UserId};

use super::{
    now_secs, LeaderboardEntry, NewReport, ReportRepository, RepositoryError, TransitionOutcome,
};

/// Current schema version. Increment this when making schema changes and add
/// corresponding migration logic in `run_migrations()`.
const CURRENT_SCHEMA_VERSION: i64 = 1;

/// SQLite-backed report repository.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous rusqlite operations
/// without blocking the async runtime. The `Mutex` serializes access to the
/// connection, which rusqlite requires.
pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
    id_prefix: String,
}

impl SqliteRepository {
    /// Create a new SQLite repository at the given path.
    ///
    /// Creates the database file and schema if they don't exist, and runs any
    /// pending migrations otherwise.
    ///
    /// # Durability
    ///
    /// The database is configured with:
    /// - `journal_mode = WAL` for better concurrency and crash safety
    /// - `synchronous = FULL` for maximum durability
    /// - `busy_timeout = 5000ms` to handle concurrent access gracefully
    pub fn new<P: AsRef<Path>>(path: P, id_prefix: impl Into<String>) -> Result<Self, RepositoryError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy();
        let is_in_memory = path_str == ":memory:";

        if !is_in_memory && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepositoryError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| RepositoryError::storage("open database", e.to_string()))?;

        // Verify WAL mode was actually enabled - SQLite can silently keep
        // DELETE mode on filesystems that don't support shared memory.
        // In-memory databases report "memory", which is fine: they are
        // ephemeral by design.
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| RepositoryError::storage("set journal_mode", e.to_string()))?;
        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));
        if !journal_mode_ok {
            return Err(RepositoryError::storage(
                "configure journal_mode",
                format!(
                    "Failed to enable WAL mode: SQLite returned '{}' instead of 'wal'. \
                     The database requires WAL mode for durability and concurrency guarantees.",
                    journal_mode
                ),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            PRAGMA foreign_keys = ON;
            "#,
        )
        .map_err(|e| RepositoryError::storage("configure pragmas", e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| RepositoryError::storage("create schema_version table", e.to_string()))?;

        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RepositoryError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            id_prefix: id_prefix.into(),
        })
    }

    /// Create a new in-memory SQLite repository (for testing).
    pub fn new_in_memory(id_prefix: impl Into<String>) -> Result<Self, RepositoryError> {
        Self::new(":memory:", id_prefix)
    }

    /// Run migrations from `from_version` to `CURRENT_SCHEMA_VERSION`.
    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), RepositoryError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(RepositoryError::storage(
                "schema version",
                format!(
                    "Database schema version {} is newer than supported version {}. \
                     Please upgrade the application.",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }
        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        // Migration from version 0 (fresh database) to version 1
        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    role TEXT NOT NULL CHECK (role IN ('reporter', 'admin')),
                    point_balance INTEGER NOT NULL DEFAULT 0 CHECK (point_balance >= 0),
                    balance_updated_at INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS reports (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    steps TEXT NOT NULL,
                    environment TEXT NOT NULL,
                    app_name TEXT NOT NULL,
                    severity TEXT NOT NULL CHECK (severity IN ('low', 'medium', 'high')),
                    status TEXT NOT NULL CHECK (status IN (
                        'submitted', 'in_review', 'verified', 'rejected', 'fixed', 'rewarded'
                    )),
                    awarded_points INTEGER NOT NULL DEFAULT 0 CHECK (awarded_points >= 0),
                    review_deadline_hours INTEGER NOT NULL,
                    reporter_id TEXT NOT NULL REFERENCES users(id),
                    reporter_display TEXT NOT NULL,
                    submitted_at INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_reports_reporter ON reports(reporter_id);
                CREATE INDEX IF NOT EXISTS idx_reports_status ON reports(status);

                CREATE TABLE IF NOT EXISTS report_sequence (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    next INTEGER NOT NULL
                );
                INSERT OR IGNORE INTO report_sequence (id, next) VALUES (1, 1);
                "#,
            )
            .map_err(|e| RepositoryError::storage("migration v1", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| RepositoryError::storage("update schema version", e.to_string()))?;

        Ok(())
    }
}

/// Convert a usize limit to i64 for a SQLite LIMIT clause.
///
/// Returns an error if the value exceeds i64::MAX, which would silently wrap
/// with `as i64` and change SQLite's LIMIT behavior.
fn usize_to_i64_limit(limit: usize, operation: &'static str) -> Result<i64, RepositoryError> {
    i64::try_from(limit).map_err(|_| {
        RepositoryError::storage(
            operation,
            format!("limit {} exceeds maximum storable value", limit),
        )
    })
}

/// Convert a non-negative i64 from SQLite to u64.
///
/// Negative values indicate database corruption (the schema CHECKs forbid
/// them), so they surface as corruption rather than being clamped.
fn i64_to_u64(value: i64, what: &str) -> Result<u64, RepositoryError> {
    u64::try_from(value).map_err(|_| RepositoryError::corruption(what.to_string()))
}

const REPORT_COLUMNS: &str = "id, title, description, steps, environment, app_name, \
     severity, status, awarded_points, review_deadline_hours, \
     reporter_id, reporter_display, submitted_at";

/// Map a row selected with `REPORT_COLUMNS` into a `Report`.
///
/// Enum columns are validated strictly: an unknown severity or status string
/// means the database was written by something else and is treated as
/// corruption, not coerced.
fn report_from_row(row: &Row<'_>) -> Result<Report, RepositoryError> {
    let severity_raw: String = row
        .get(6)
        .map_err(|e| RepositoryError::storage("read report row", e.to_string()))?;
    let status_raw: String = row
        .get(7)
        .map_err(|e| RepositoryError::storage("read report row", e.to_string()))?;
    let awarded_points: i64 = row
        .get(8)
        .map_err(|e| RepositoryError::storage("read report row", e.to_string()))?;

    let get_text = |idx: usize| -> Result<String, RepositoryError> {
        row.get(idx)
            .map_err(|e| RepositoryError::storage("read report row", e.to_string()))
    };

    Ok(Report {
        id: ReportId(get_text(0)?),
        title: get_text(1)?,
        description: get_text(2)?,
        steps: get_text(3)?,
        environment: get_text(4)?,
        app_name: get_text(5)?,
        severity: Severity::from_str(&severity_raw)
            .ok_or_else(|| RepositoryError::corruption(format!("severity '{}'", severity_raw)))?,
        status: ReportStatus::from_str(&status_raw)
            .ok_or_else(|| RepositoryError::corruption(format!("status '{}'", status_raw)))?,
        awarded_points: i64_to_u64(awarded_points, "awarded_points")?,
        review_deadline_hours: row
            .get::<_, i64>(9)
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| RepositoryError::corruption("review_deadline_hours"))?,
        reporter_id: UserId(get_text(10)?),
        reporter_display: get_text(11)?,
        submitted_at: row
            .get(12)
            .map_err(|e| RepositoryError::storage("read report row", e.to_string()))?,
    })
}

/// Map a `users` row into a `User`.
fn user_from_row(row: &Row<'_>) -> Result<User, RepositoryError> {
    let role_raw: String = row
        .get(2)
        .map_err(|e| RepositoryError::storage("read user row", e.to_string()))?;
    let balance: i64 = row
        .get(3)
        .map_err(|e| RepositoryError::storage("read user row", e.to_string()))?;

    Ok(User {
        id: UserId(
            row.get(0)
                .map_err(|e| RepositoryError::storage("read user row", e.to_string()))?,
        ),
        name: row
            .get(1)
            .map_err(|e| RepositoryError::storage("read user row", e.to_string()))?,
        role: Role::from_str(&role_raw)
            .ok_or_else(|| RepositoryError::corruption(format!("role '{}'", role_raw)))?,
        point_balance: i64_to_u64(balance, "point_balance")?,
        balance_updated_at: row
            .get(4)
            .map_err(|e| RepositoryError::storage("read user row", e.to_string()))?,
    })
}

/// Read a report inside an open transaction.
fn get_report_tx(tx: &Transaction<'_>, id: &str) -> Result<Option<Report>, RepositoryError> {
    tx.query_row(
        &format!("SELECT {} FROM reports WHERE id = ?1", REPORT_COLUMNS),
        params![id],
        |row| Ok(report_from_row(row)),
    )
    .optional()
    .map_err(|e| RepositoryError::storage("get report", e.to_string()))?
    .transpose()
}

#[async_trait]
impl ReportRepository for SqliteRepository {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        let conn = self.conn.clone();
        let user = user.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            // INSERT OR IGNORE keeps identity materialization idempotent.
            conn.execute(
                "INSERT OR IGNORE INTO users (id, name, role, point_balance, balance_updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.0,
                    user.name,
                    user.role.as_str(),
                    i64::try_from(user.point_balance).map_err(|_| {
                        RepositoryError::storage("create_user", "point balance overflow")
                    })?,
                    user.balance_updated_at
                ],
            )
            .map_err(|e| RepositoryError::storage("create_user", e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| RepositoryError::storage("create_user", e.to_string()))?
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let conn = self.conn.clone();
        let id = id.0.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.query_row(
                "SELECT id, name, role, point_balance, balance_updated_at
                 FROM users WHERE id = ?1",
                params![id],
                |row| Ok(user_from_row(row)),
            )
            .optional()
            .map_err(|e| RepositoryError::storage("get_user", e.to_string()))?
            .transpose()
        })
        .await
        .map_err(|e| RepositoryError::storage("get_user", e.to_string()))?
    }

    async fn insert_report(&self, new: NewReport) -> Result<Report, RepositoryError> {
        let conn = self.conn.clone();
        let prefix = self.id_prefix.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap();
            let tx = conn
                .transaction()
                .map_err(|e| RepositoryError::storage("insert_report", e.to_string()))?;

            // Claim the next sequence number inside the same transaction as
            // the insert. Counting existing rows instead would race under
            // concurrent intake and mint duplicate ids.
            let seq: i64 = tx
                .query_row(
                    "UPDATE report_sequence SET next = next + 1 WHERE id = 1 RETURNING next - 1",
                    [],
                    |row| row.get(0),
                )
                .map_err(|e| RepositoryError::storage("claim report sequence", e.to_string()))?;
            let id = ReportId::from_sequence(&prefix, i64_to_u64(seq, "report sequence")?);

            let status = ReportStatus::Submitted;
            tx.execute(
                "INSERT INTO reports (id, title, description, steps, environment, app_name,
                                      severity, status, awarded_points, review_deadline_hours,
                                      reporter_id, reporter_display, submitted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10, ?11, ?12)",
                params![
                    id.0,
                    new.title,
                    new.description,
                    new.steps,
                    new.environment,
                    new.app_name,
                    new.severity.as_str(),
                    status.as_str(),
                    new.review_deadline_hours,
                    new.reporter_id.0,
                    new.reporter_display,
                    new.submitted_at
                ],
            )
            .map_err(|e| RepositoryError::storage("insert_report", e.to_string()))?;

            let report = get_report_tx(&tx, &id.0)?
                .ok_or_else(|| RepositoryError::corruption("freshly inserted report"))?;

            tx.commit()
                .map_err(|e| RepositoryError::storage("insert_report commit", e.to_string()))?;
            Ok(report)
        })
        .await
        .map_err(|e| RepositoryError::storage("insert_report", e.to_string()))?
    }

    async fn get_report(&self, id: &ReportId) -> Result<Option<Report>, RepositoryError> {
        let conn = self.conn.clone();
        let id = id.0.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.query_row(
                &format!("SELECT {} FROM reports WHERE id = ?1", REPORT_COLUMNS),
                params![id],
                |row| Ok(report_from_row(row)),
            )
            .optional()
            .map_err(|e| RepositoryError::storage("get_report", e.to_string()))?
            .transpose()
        })
        .await
        .map_err(|e| RepositoryError::storage("get_report", e.to_string()))?
    }

    async fn apply_transition(
        &self,
        id: &ReportId,
        expected: ReportStatus,
        target: ReportStatus,
        award: u64,
    ) -> Result<TransitionOutcome, RepositoryError> {
        let conn = self.conn.clone();
        let id = id.0.clone();
        let award_i64 = i64::try_from(award)
            .map_err(|_| RepositoryError::storage("apply_transition", "award overflow"))?;

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap();
            let tx = conn
                .transaction()
                .map_err(|e| RepositoryError::storage("apply_transition", e.to_string()))?;

            let current = match get_report_tx(&tx, &id)? {
                Some(report) => report,
                None => return Ok(TransitionOutcome::ReportMissing),
            };
            if current.status != expected {
                // A concurrent transition committed first. Dropping the
                // transaction rolls back; nothing was written yet.
                return Ok(TransitionOutcome::StatusConflict {
                    actual: current.status,
                });
            }

            // Compare-and-set on the status column. The WHERE clause repeats
            // the expected status so the update itself is conditional, not
            // just the read above.
            let updated_rows = if target.awards_points_on_entry() {
                tx.execute(
                    "UPDATE reports SET status = ?1, awarded_points = ?2
                     WHERE id = ?3 AND status = ?4",
                    params![target.as_str(), award_i64, id, expected.as_str()],
                )
            } else {
                tx.execute(
                    "UPDATE reports SET status = ?1 WHERE id = ?2 AND status = ?3",
                    params![target.as_str(), id, expected.as_str()],
                )
            }
            .map_err(|e| RepositoryError::storage("apply_transition", e.to_string()))?;

            if updated_rows != 1 {
                warn!(report_id = %id, "transition CAS matched the read but updated {} rows", updated_rows);
                return Ok(TransitionOutcome::StatusConflict {
                    actual: current.status,
                });
            }

            if award > 0 {
                let credited = tx
                    .execute(
                        "UPDATE users
                         SET point_balance = point_balance + ?1, balance_updated_at = ?2
                         WHERE id = ?3",
                        params![award_i64, now_secs(), current.reporter_id.0],
                    )
                    .map_err(|e| RepositoryError::storage("credit points", e.to_string()))?;
                if credited != 1 {
                    // Reporter row missing would de-couple the award from the
                    // status change; roll the whole transition back.
                    return Err(RepositoryError::corruption(format!(
                        "reporter '{}' for report '{}'",
                        current.reporter_id, id
                    )));
                }
            }

            let updated = get_report_tx(&tx, &id)?
                .ok_or_else(|| RepositoryError::corruption("report vanished mid-transaction"))?;

            tx.commit()
                .map_err(|e| RepositoryError::storage("apply_transition commit", e.to_string()))?;
            Ok(TransitionOutcome::Applied(updated))
        })
        .await
        .map_err(|e| RepositoryError::storage("apply_transition", e.to_string()))?
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, RepositoryError> {
        let conn = self.conn.clone();
        let limit = usize_to_i64_limit(limit, "leaderboard")?;

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT u.id, u.name, u.point_balance,
                            (SELECT COUNT(*) FROM reports r WHERE r.reporter_id = u.id)
                     FROM users u
                     WHERE u.role <> 'admin' AND u.point_balance > 0
                     ORDER BY u.point_balance DESC, u.balance_updated_at ASC, u.id ASC
                     LIMIT ?1",
                )
                .map_err(|e| RepositoryError::storage("leaderboard", e.to_string()))?;

            let rows = stmt
                .query_map(params![limit], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })
                .map_err(|e| RepositoryError::storage("leaderboard", e.to_string()))?;

            let mut entries = Vec::new();
            for row in rows {
                let (id, name, balance, count) =
                    row.map_err(|e| RepositoryError::storage("leaderboard", e.to_string()))?;
                entries.push(LeaderboardEntry {
                    user_id: UserId(id),
                    name,
                    point_balance: i64_to_u64(balance, "point_balance")?,
                    report_count: i64_to_u64(count, "report_count")?,
                });
            }
            Ok(entries)
        })
        .await
        .map_err(|e| RepositoryError::storage("leaderboard", e.to_string()))?
    }

    async fn list_reports(&self) -> Result<Vec<Report>, RepositoryError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM reports ORDER BY submitted_at ASC, id ASC",
                    REPORT_COLUMNS
                ))
                .map_err(|e| RepositoryError::storage("list_reports", e.to_string()))?;

            let rows = stmt
                .query_map([], |row| Ok(report_from_row(row)))
                .map_err(|e| RepositoryError::storage("list_reports", e.to_string()))?;

            let mut reports = Vec::new();
            for row in rows {
                reports
                    .push(row.map_err(|e| RepositoryError::storage("list_reports", e.to_string()))??);
            }
            Ok(reports)
        })
        .await
        .map_err(|e| RepositoryError::storage("list_reports", e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bugboard_core::Role;

    fn new_report(reporter: &str, severity: Severity) -> NewReport {
        NewReport {
            title: "Crash on login".to_string(),
            description: "crashes with long password".to_string(),
            steps: "enter 200 chars, tap login".to_string(),
            environment: "Pixel 8".to_string(),
            app_name: "acme-mobile".to_string(),
            severity,
            review_deadline_hours: severity.review_deadline_hours(),
            reporter_id: UserId::from(reporter),
            reporter_display: "Ada".to_string(),
            submitted_at: 1_700_000_000,
        }
    }

    async fn repo_with_user(id: &str, role: Role) -> SqliteRepository {
        let repo = SqliteRepository::new_in_memory("BUG").unwrap();
        repo.create_user(&User::new(id, "Ada", role)).await.unwrap();
        repo
    }

    #[test]
    fn test_fresh_database_lands_on_current_version() {
        let repo = SqliteRepository::new_in_memory("BUG").unwrap();
        let conn = repo.conn.lock().unwrap();
        let version: i64 = conn
            .query_row("SELECT version FROM schema_version WHERE id = 1", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_insert_and_round_trip() {
        let repo = repo_with_user("u1", Role::Reporter).await;

        let report = repo
            .insert_report(new_report("u1", Severity::High))
            .await
            .unwrap();
        assert_eq!(report.id.0, "BUG-001");
        assert_eq!(report.status, ReportStatus::Submitted);
        assert_eq!(report.awarded_points, 0);
        assert_eq!(report.review_deadline_hours, 6);

        let fetched = repo.get_report(&report.id).await.unwrap().unwrap();
        assert_eq!(fetched, report);
    }

    #[tokio::test]
    async fn test_sequence_survives_across_inserts() {
        let repo = repo_with_user("u1", Role::Reporter).await;
        for expected in ["BUG-001", "BUG-002", "BUG-003"] {
            let report = repo
                .insert_report(new_report("u1", Severity::Low))
                .await
                .unwrap();
            assert_eq!(report.id.0, expected);
        }
    }

    #[tokio::test]
    async fn test_apply_transition_credits_balance_atomically() {
        let repo = repo_with_user("u1", Role::Reporter).await;
        let report = repo
            .insert_report(new_report("u1", Severity::High))
            .await
            .unwrap();

        let outcome = repo
            .apply_transition(&report.id, ReportStatus::Submitted, ReportStatus::Verified, 500)
            .await
            .unwrap();
        let updated = match outcome {
            TransitionOutcome::Applied(r) => r,
            other => panic!("expected Applied, got {:?}", other),
        };
        assert_eq!(updated.status, ReportStatus::Verified);
        assert_eq!(updated.awarded_points, 500);

        let user = repo.get_user(&UserId::from("u1")).await.unwrap().unwrap();
        assert_eq!(user.point_balance, 500);
        assert!(user.balance_updated_at > 0);
    }

    #[tokio::test]
    async fn test_cas_conflict_leaves_everything_unchanged() {
        let repo = repo_with_user("u1", Role::Reporter).await;
        let report = repo
            .insert_report(new_report("u1", Severity::High))
            .await
            .unwrap();

        repo.apply_transition(&report.id, ReportStatus::Submitted, ReportStatus::Rejected, 0)
            .await
            .unwrap();

        // Stale expectation: the report is already Rejected.
        let outcome = repo
            .apply_transition(&report.id, ReportStatus::Submitted, ReportStatus::Verified, 500)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::StatusConflict {
                actual: ReportStatus::Rejected
            }
        );

        let user = repo.get_user(&UserId::from("u1")).await.unwrap().unwrap();
        assert_eq!(user.point_balance, 0);
        let fetched = repo.get_report(&report.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ReportStatus::Rejected);
        assert_eq!(fetched.awarded_points, 0);
    }

    #[tokio::test]
    async fn test_missing_reporter_rolls_back_status_change() {
        // Bypass the FK by disabling it for this connection, simulating a
        // corrupted database where the reporter row is gone. The transition
        // must roll back entirely rather than commit a status change whose
        // award went nowhere.
        let repo = SqliteRepository::new_in_memory("BUG").unwrap();
        repo.create_user(&User::new("u1", "Ada", Role::Reporter))
            .await
            .unwrap();
        let report = repo
            .insert_report(new_report("u1", Severity::High))
            .await
            .unwrap();
        {
            let conn = repo.conn.lock().unwrap();
            conn.execute_batch("PRAGMA foreign_keys = OFF; DELETE FROM users WHERE id = 'u1';")
                .unwrap();
        }

        let err = repo
            .apply_transition(&report.id, ReportStatus::Submitted, ReportStatus::Verified, 500)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Corruption { .. }));

        let fetched = repo.get_report(&report.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ReportStatus::Submitted);
        assert_eq!(fetched.awarded_points, 0);
    }

    #[tokio::test]
    async fn test_leaderboard_excludes_admins_and_zero_balances() {
        let repo = SqliteRepository::new_in_memory("BUG").unwrap();
        for (id, role) in [
            ("alice", Role::Reporter),
            ("bob", Role::Reporter),
            ("zero", Role::Reporter),
            ("root", Role::Admin),
        ] {
            repo.create_user(&User::new(id, id, role)).await.unwrap();
        }
        {
            let conn = repo.conn.lock().unwrap();
            conn.execute_batch(
                "UPDATE users SET point_balance = 300, balance_updated_at = 100 WHERE id = 'alice';
                 UPDATE users SET point_balance = 500, balance_updated_at = 200 WHERE id = 'bob';
                 UPDATE users SET point_balance = 9000, balance_updated_at = 1 WHERE id = 'root';",
            )
            .unwrap();
        }

        let board = repo.leaderboard(10).await.unwrap();
        let ids: Vec<&str> = board.iter().map(|e| e.user_id.0.as_str()).collect();
        assert_eq!(ids, vec!["bob", "alice"]);
    }

    #[tokio::test]
    async fn test_leaderboard_deterministic_tie_break() {
        let repo = SqliteRepository::new_in_memory("BUG").unwrap();
        for id in ["late", "early", "also_early"] {
            repo.create_user(&User::new(id, id, Role::Reporter))
                .await
                .unwrap();
        }
        {
            let conn = repo.conn.lock().unwrap();
            conn.execute_batch(
                "UPDATE users SET point_balance = 500, balance_updated_at = 100 WHERE id = 'early';
                 UPDATE users SET point_balance = 500, balance_updated_at = 100 WHERE id = 'also_early';
                 UPDATE users SET point_balance = 500, balance_updated_at = 900 WHERE id = 'late';",
            )
            .unwrap();
        }

        let board = repo.leaderboard(10).await.unwrap();
        let ids: Vec<&str> = board.iter().map(|e| e.user_id.0.as_str()).collect();
        // Same balance and same timestamp falls back to id order.
        assert_eq!(ids, vec!["also_early", "early", "late"]);
    }

    #[tokio::test]
    async fn test_list_reports_ordered() {
        let repo = repo_with_user("u1", Role::Reporter).await;
        repo.insert_report(new_report("u1", Severity::Low))
            .await
            .unwrap();
        repo.insert_report(new_report("u1", Severity::High))
            .await
            .unwrap();

        let all = repo.list_reports().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id.0, "BUG-001");
        assert_eq!(all[1].id.0, "BUG-002");
    }
}
