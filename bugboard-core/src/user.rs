//! User identity as consumed by the lifecycle engine.
//!
//! Credential issuance and session validation live in an external
//! collaborator; this crate only needs a stable id, a display name, an
//! explicit role, and the point balance the transition engine credits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype for a stable user identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Explicit role capability. Modeled as an enum rather than an `is_admin`
/// boolean so further roles can be added without schema archaeology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reporter,
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reporter => "reporter",
            Self::Admin => "admin",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "reporter" => Some(Self::Reporter),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user record as the engine sees it.
///
/// `point_balance` is monotonically non-decreasing: the only writer is the
/// transition engine's commit path, and no deduction path exists.
/// `balance_updated_at` records when the balance last changed and breaks
/// leaderboard ties deterministically (earliest achievement wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub point_balance: u64,
    pub balance_updated_at: i64,
}

impl User {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            point_balance: 0,
            balance_updated_at: 0,
        }
    }
}
