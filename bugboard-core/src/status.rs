//! The report status state machine.
//!
//! Following the principle of "make illegal states unrepresentable", the
//! allowed edges live in exactly one place: [`ReportStatus::can_transition_to`].
//! Nothing else in the codebase is permitted to decide whether a status
//! change is legal.
//!
//! `Rewarded` exists as a status value but has no transition into it; it is
//! deliberately unreachable until the product defines one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a report.
///
/// Initial state is `Submitted`. `Rejected`, `Fixed` and `Rewarded` are
/// terminal: no outgoing edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Submitted,
    InReview,
    Verified,
    Rejected,
    Fixed,
    Rewarded,
}

impl ReportStatus {
    /// Returns whether the state machine allows moving from `self` to
    /// `target`. Self-loops are never allowed; a retried transition whose
    /// target is already current must fail rather than re-award points.
    ///
    /// `Submitted -> InReview` exists so an admin can mark a report as
    /// picked up for triage before deciding its fate; without that edge
    /// `InReview` would have no transition into it and the status would be
    /// unreachable, like `Rewarded`. It is optional: `Submitted` may also
    /// go straight to `Verified` or `Rejected`.
    pub fn can_transition_to(self, target: ReportStatus) -> bool {
        use ReportStatus::*;
        matches!(
            (self, target),
            (Submitted, InReview)
                | (Submitted, Verified)
                | (Submitted, Rejected)
                | (InReview, Verified)
                | (InReview, Rejected)
                | (Verified, Fixed)
        )
    }

    /// Returns true if no outgoing transitions exist from this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Fixed | Self::Rewarded)
    }

    /// Returns true if entering this status carries a point award.
    /// Only `Verified` is point-bearing.
    pub fn awards_points_on_entry(self) -> bool {
        matches!(self, Self::Verified)
    }

    /// Canonical snake_case name, used for storage and wire formats.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::InReview => "in_review",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
            Self::Fixed => "fixed",
            Self::Rewarded => "rewarded",
        }
    }

    /// Strict parse of a canonical status name.
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "submitted" => Some(Self::Submitted),
            "in_review" => Some(Self::InReview),
            "verified" => Some(Self::Verified),
            "rejected" => Some(Self::Rejected),
            "fixed" => Some(Self::Fixed),
            "rewarded" => Some(Self::Rewarded),
            _ => None,
        }
    }

    /// All status values, in declaration order.
    pub fn all() -> [ReportStatus; 6] {
        [
            Self::Submitted,
            Self::InReview,
            Self::Verified,
            Self::Rejected,
            Self::Fixed,
            Self::Rewarded,
        ]
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use ReportStatus::*;

    /// The edge list, written out independently of the implementation so a
    /// typo in one place cannot hide in the other.
    const ALLOWED_EDGES: [(ReportStatus, ReportStatus); 6] = [
        (Submitted, InReview),
        (Submitted, Verified),
        (Submitted, Rejected),
        (InReview, Verified),
        (InReview, Rejected),
        (Verified, Fixed),
    ];

    fn arb_status() -> impl Strategy<Value = ReportStatus> {
        prop::sample::select(ReportStatus::all().to_vec())
    }

    #[test]
    fn test_allowed_edges_exact() {
        for from in ReportStatus::all() {
            for to in ReportStatus::all() {
                let expected = ALLOWED_EDGES.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "edge {} -> {} disagrees with the edge list",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(Rejected.is_terminal());
        assert!(Fixed.is_terminal());
        assert!(Rewarded.is_terminal());
        assert!(!Submitted.is_terminal());
        assert!(!InReview.is_terminal());
        assert!(!Verified.is_terminal());
    }

    #[test]
    fn test_only_verified_awards_points() {
        for status in ReportStatus::all() {
            assert_eq!(status.awards_points_on_entry(), status == Verified);
        }
    }

    #[test]
    fn test_rewarded_is_unreachable() {
        for from in ReportStatus::all() {
            assert!(
                !from.can_transition_to(Rewarded),
                "no transition into Rewarded may exist without product clarification"
            );
        }
    }

    #[test]
    fn test_str_round_trip() {
        for status in ReportStatus::all() {
            assert_eq!(ReportStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ReportStatus::from_str("Verified"), None);
        assert_eq!(ReportStatus::from_str("bogus"), None);
    }

    proptest! {
        /// Property: terminal states have no outgoing edges at all.
        #[test]
        fn terminal_states_reject_every_target(from in arb_status(), to in arb_status()) {
            if from.is_terminal() {
                prop_assert!(!from.can_transition_to(to));
            }
        }

        /// Property: self-loops are never allowed, so a retried transition
        /// whose target is already current always fails.
        #[test]
        fn self_loops_never_allowed(status in arb_status()) {
            prop_assert!(!status.can_transition_to(status));
        }

        /// Property: is_terminal agrees with the edge list.
        #[test]
        fn is_terminal_matches_edge_list(from in arb_status()) {
            let has_outgoing = ReportStatus::all()
                .iter()
                .any(|to| from.can_transition_to(*to));
            prop_assert_eq!(from.is_terminal(), !has_outgoing);
        }
    }
}
