//! The bug-report lifecycle engine.
//!
//! Two responsibilities live here, coordinated over the repository:
//!
//! - **Report registry** ([`LifecycleEngine::intake`]): validates the intake
//!   draft, snapshots the severity-derived review deadline, and persists the
//!   record. Id allocation is delegated to the repository so it shares the
//!   insert transaction.
//! - **Transition engine** ([`LifecycleEngine::transition`]): checks the
//!   caller's role, validates the requested edge against the pure state
//!   machine, derives the point award server-side, and hands the repository
//!   one atomic compare-and-set. Two concurrent transitions on the same
//!   report cannot both succeed: the loser's CAS misses and surfaces as
//!   `InvalidTransition`.
//!
//! The leaderboard is a derived read over committed balances; no separate
//! component owns it.

use std::sync::Arc;

use tracing::info;

use bugboard_core::{
    EngineError, Report, ReportDraft, ReportId, ReportStatus, Role, User, UserId,
    ANONYMOUS_DISPLAY,
};

use crate::repository::{
    now_secs, LeaderboardEntry, NewReport, ReportRepository, RepositoryError, TransitionOutcome,
};

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Storage { operation, message } => {
                EngineError::storage(operation, message)
            }
            RepositoryError::Corruption { what } => {
                EngineError::storage("read", format!("corrupted {}", what))
            }
        }
    }
}

/// Coordinates intake, transitions and the leaderboard read over a
/// repository backend.
pub struct LifecycleEngine {
    repo: Arc<dyn ReportRepository>,
}

impl LifecycleEngine {
    pub fn new(repo: Arc<dyn ReportRepository>) -> Self {
        Self { repo }
    }

    /// Materialize a user identity supplied by the external identity
    /// collaborator. Idempotent: an existing user is left untouched.
    /// This is not signup; credentials and sessions live elsewhere.
    pub async fn register_user(
        &self,
        id: impl Into<UserId>,
        name: impl Into<String>,
        role: Role,
    ) -> Result<User, EngineError> {
        let user = User::new(id, name, role);
        self.repo.create_user(&user).await?;
        // Return the stored record, which may predate this call.
        Ok(self
            .repo
            .get_user(&user.id)
            .await?
            .unwrap_or(user))
    }

    /// Intake a new defect report.
    ///
    /// Validates required fields, resolves severity (defaulting to medium),
    /// snapshots the review deadline (the severity table for recognized
    /// input, the 2 hour fallback otherwise), and persists the record with
    /// `status = Submitted` and no points awarded.
    pub async fn intake(
        &self,
        draft: ReportDraft,
        reporter_id: &UserId,
    ) -> Result<Report, EngineError> {
        draft.validate()?;

        let reporter = self
            .repo
            .get_user(reporter_id)
            .await?
            .ok_or_else(|| {
                EngineError::validation(format!("unknown reporter '{}'", reporter_id))
            })?;

        let severity = draft.resolved_severity();
        // Deadline comes from the raw input, not the resolved severity:
        // unrecognized or absent input defaults the severity to medium but
        // snapshots the fastest (2 hour) review window.
        let review_deadline_hours = draft.resolved_deadline_hours();
        let reporter_display = if draft.anonymous {
            ANONYMOUS_DISPLAY.to_string()
        } else {
            reporter.name.clone()
        };

        let report = self
            .repo
            .insert_report(NewReport {
                title: draft.title,
                description: draft.description,
                steps: draft.steps,
                environment: draft.environment,
                app_name: draft.app_name,
                severity,
                review_deadline_hours,
                reporter_id: reporter.id.clone(),
                reporter_display,
                submitted_at: now_secs(),
            })
            .await?;

        info!(
            report_id = %report.id,
            severity = %report.severity,
            deadline_hours = report.review_deadline_hours,
            "report intake complete"
        );
        Ok(report)
    }

    /// Apply an administrator-invoked status transition.
    ///
    /// The status write and (for transitions into `Verified`) the reporter's
    /// balance credit commit as a single atomic unit. Retrying a transition
    /// whose target is already current fails with `InvalidTransition` (a
    /// self-loop is not an allowed edge), so points can never be awarded
    /// twice for one report.
    pub async fn transition(
        &self,
        report_id: &ReportId,
        target: ReportStatus,
        points: u64,
        caller_id: &UserId,
    ) -> Result<Report, EngineError> {
        // Authorization first: non-admins learn nothing about the report.
        let caller = self
            .repo
            .get_user(caller_id)
            .await?
            .ok_or_else(|| {
                EngineError::authorization(format!("unknown caller '{}'", caller_id))
            })?;
        if !caller.role.is_admin() {
            return Err(EngineError::authorization(format!(
                "user '{}' is not an administrator",
                caller.id
            )));
        }

        let report = self
            .repo
            .get_report(report_id)
            .await?
            .ok_or_else(|| EngineError::not_found(report_id))?;

        if !report.status.can_transition_to(target) {
            return Err(EngineError::invalid_transition(report.status, target));
        }

        // The server derives the reward from severity. A caller-supplied
        // amount must match the nominal table, or be an explicit 0 (a legal
        // no-award verification). Points on non-point-bearing edges are a
        // caller error.
        let award = if target.awards_points_on_entry() {
            let nominal = report.severity.nominal_reward();
            if points != nominal && points != 0 {
                return Err(EngineError::validation(format!(
                    "points {} do not match the nominal reward {} for severity '{}'",
                    points, nominal, report.severity
                )));
            }
            points
        } else {
            if points != 0 {
                return Err(EngineError::validation(format!(
                    "transition to '{}' does not award points, got {}",
                    target, points
                )));
            }
            0
        };

        match self
            .repo
            .apply_transition(report_id, report.status, target, award)
            .await?
        {
            TransitionOutcome::Applied(updated) => {
                info!(
                    report_id = %updated.id,
                    from = %report.status,
                    to = %updated.status,
                    award,
                    "transition applied"
                );
                Ok(updated)
            }
            TransitionOutcome::StatusConflict { actual } => {
                // A concurrent transition won the race; this request now
                // describes an edge from the observed committed state.
                Err(EngineError::invalid_transition(actual, target))
            }
            TransitionOutcome::ReportMissing => Err(EngineError::not_found(report_id)),
        }
    }

    /// Ranked leaderboard of committed point balances. Admins and
    /// zero-balance users are excluded; ordering is deterministic.
    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, EngineError> {
        Ok(self.repo.leaderboard(limit).await?)
    }

    /// Fetch one report.
    pub async fn get_report(&self, id: &ReportId) -> Result<Report, EngineError> {
        self.repo
            .get_report(id)
            .await?
            .ok_or_else(|| EngineError::not_found(id))
    }

    /// All reports, oldest first.
    pub async fn list_reports(&self) -> Result<Vec<Report>, EngineError> {
        Ok(self.repo.list_reports().await?)
    }
}
