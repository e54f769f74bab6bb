//! In-memory implementation of `ReportRepository`.
//!
//! All state is held in memory and lost on restart. Used by unit tests and
//! as the reference semantics for the SQLite backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use bugboard_core::{Report, ReportId, ReportStatus, User, UserId};

use super::{
    now_secs, LeaderboardEntry, NewReport, ReportRepository, RepositoryError, TransitionOutcome,
};

/// Everything lives under one lock: a transition's status write and balance
/// credit must be observable together, never one without the other.
struct Inner {
    users: HashMap<UserId, User>,
    reports: HashMap<ReportId, Report>,
    /// Insertion order, for `list_reports`.
    report_order: Vec<ReportId>,
    /// Next sequence number to hand out.
    next_seq: u64,
}

/// In-memory report repository.
pub struct InMemoryRepository {
    inner: RwLock<Inner>,
    id_prefix: String,
}

impl InMemoryRepository {
    pub fn new(id_prefix: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                users: HashMap::new(),
                reports: HashMap::new(),
                report_order: Vec::new(),
                next_seq: 1,
            }),
            id_prefix: id_prefix.into(),
        }
    }
}

#[async_trait]
impl ReportRepository for InMemoryRepository {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        inner
            .users
            .entry(user.id.clone())
            .or_insert_with(|| user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(id).cloned())
    }

    async fn insert_report(&self, new: NewReport) -> Result<Report, RepositoryError> {
        let mut inner = self.inner.write().await;

        if !inner.users.contains_key(&new.reporter_id) {
            return Err(RepositoryError::storage(
                "insert_report",
                format!("reporter '{}' does not exist", new.reporter_id),
            ));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let id = ReportId::from_sequence(&self.id_prefix, seq);

        let report = Report {
            id: id.clone(),
            title: new.title,
            description: new.description,
            steps: new.steps,
            environment: new.environment,
            app_name: new.app_name,
            severity: new.severity,
            status: ReportStatus::Submitted,
            awarded_points: 0,
            review_deadline_hours: new.review_deadline_hours,
            reporter_id: new.reporter_id,
            reporter_display: new.reporter_display,
            submitted_at: new.submitted_at,
        };

        inner.reports.insert(id.clone(), report.clone());
        inner.report_order.push(id);
        Ok(report)
    }

    async fn get_report(&self, id: &ReportId) -> Result<Option<Report>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.reports.get(id).cloned())
    }

    async fn apply_transition(
        &self,
        id: &ReportId,
        expected: ReportStatus,
        target: ReportStatus,
        award: u64,
    ) -> Result<TransitionOutcome, RepositoryError> {
        // The write guard is held across the status check, the report
        // update and the balance credit, so the CAS and the award are
        // one atomic unit.
        let mut inner = self.inner.write().await;

        let current = match inner.reports.get(id) {
            Some(report) => report.status,
            None => return Ok(TransitionOutcome::ReportMissing),
        };
        if current != expected {
            return Ok(TransitionOutcome::StatusConflict { actual: current });
        }

        let reporter_id = {
            let report = inner
                .reports
                .get_mut(id)
                .ok_or_else(|| RepositoryError::corruption("report map"))?;
            report.status = target;
            if target.awards_points_on_entry() {
                report.awarded_points = award;
            }
            report.reporter_id.clone()
        };

        if award > 0 {
            let user = inner
                .users
                .get_mut(&reporter_id)
                .ok_or_else(|| RepositoryError::corruption("reporter reference"))?;
            user.point_balance += award;
            user.balance_updated_at = now_secs();
        }

        let updated = inner
            .reports
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::corruption("report map"))?;
        Ok(TransitionOutcome::Applied(updated))
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, RepositoryError> {
        let inner = self.inner.read().await;

        let mut report_counts: HashMap<&UserId, u64> = HashMap::new();
        for report in inner.reports.values() {
            *report_counts.entry(&report.reporter_id).or_default() += 1;
        }

        let mut rows: Vec<&User> = inner
            .users
            .values()
            .filter(|u| !u.role.is_admin() && u.point_balance > 0)
            .collect();
        rows.sort_by(|a, b| {
            b.point_balance
                .cmp(&a.point_balance)
                .then(a.balance_updated_at.cmp(&b.balance_updated_at))
                .then(a.id.0.cmp(&b.id.0))
        });

        Ok(rows
            .into_iter()
            .take(limit)
            .map(|u| LeaderboardEntry {
                user_id: u.id.clone(),
                name: u.name.clone(),
                point_balance: u.point_balance,
                report_count: report_counts.get(&u.id).copied().unwrap_or(0),
            })
            .collect())
    }

    async fn list_reports(&self) -> Result<Vec<Report>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .report_order
            .iter()
            .filter_map(|id| inner.reports.get(id).cloned())
            .collect())
    }
}
