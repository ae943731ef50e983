//! Membership status state machine.
//!
//! Shared by reconciliation and by the local join, approval and
//! administration flows. A state of `None` stands for "no record": creation
//! is `None -> Some(_)` and removal is `Some(_) -> None`.

use group_sync_sdk::{ApprovalDecision, MembershipStatus};

use super::error::DomainError;

/// Who drives a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOrigin {
    /// A user's own join or leave request.
    LocalRequest,
    /// A decision on a pending request.
    Approval,
    /// Directory reconciliation (first sighting, rejoin, tag-and-sweep).
    Reconciliation,
    /// An explicit administrative action.
    Administration,
}

/// Validate a status transition.
///
/// Staying in the same status is always valid.
///
/// # Errors
///
/// Returns `DomainError::Validation` for any transition not listed in the
/// membership lifecycle.
pub fn check_transition(
    from: Option<MembershipStatus>,
    to: Option<MembershipStatus>,
    origin: TransitionOrigin,
) -> Result<(), DomainError> {
    use MembershipStatus::{Admin, Member, Pending, Rejected};
    use TransitionOrigin::{Administration, Approval, LocalRequest, Reconciliation};

    if from == to {
        return Ok(());
    }

    let allowed = match (from, to) {
        (None, Some(Pending)) => origin == LocalRequest,
        (None, Some(Member)) => matches!(origin, LocalRequest | Reconciliation),
        (Some(Pending), Some(Member)) => matches!(origin, Approval | Reconciliation),
        (Some(Pending), Some(Rejected)) => origin == Approval,
        (Some(Rejected), Some(Member)) => matches!(origin, Reconciliation | LocalRequest),
        (Some(Member), Some(Admin)) | (Some(Admin), Some(Member) | None) => {
            origin == Administration
        }
        (Some(Pending | Member | Rejected), None) => {
            matches!(origin, Reconciliation | Administration | LocalRequest)
        }
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(DomainError::validation(
            "status",
            format!(
                "transition {} -> {} is not allowed for {origin:?}",
                label(from),
                label(to)
            ),
        ))
    }
}

/// Status reached by applying an approval decision.
///
/// # Errors
///
/// Fails unless the record is `pending`, and when a rejection carries no
/// reason.
pub fn approval_target(
    current: MembershipStatus,
    decision: &ApprovalDecision,
) -> Result<MembershipStatus, DomainError> {
    if current != MembershipStatus::Pending {
        return Err(DomainError::validation(
            "status",
            format!("only pending memberships can be approved or rejected, found {current}"),
        ));
    }
    let target = match decision {
        ApprovalDecision::Approve => MembershipStatus::Member,
        ApprovalDecision::Reject { reason } => {
            if reason.trim().is_empty() {
                return Err(DomainError::validation(
                    "reject_reason",
                    "a reason is required when rejecting",
                ));
            }
            MembershipStatus::Rejected
        }
    };
    check_transition(Some(current), Some(target), TransitionOrigin::Approval)?;
    Ok(target)
}

/// Valid path from `current` to `admin` for a configured administrator:
/// pending and rejected records go through `member` first.
///
/// # Errors
///
/// Fails if any step of the path is invalid.
pub fn admin_promotion_path(
    current: Option<MembershipStatus>,
) -> Result<Vec<MembershipStatus>, DomainError> {
    use MembershipStatus::{Admin, Member, Pending, Rejected};

    let path: &[(Option<MembershipStatus>, MembershipStatus, TransitionOrigin)] = match current {
        Some(Admin) => &[],
        Some(Member) => &[(Some(Member), Admin, TransitionOrigin::Administration)],
        Some(Pending) => &[
            (Some(Pending), Member, TransitionOrigin::Reconciliation),
            (Some(Member), Admin, TransitionOrigin::Administration),
        ],
        Some(Rejected) => &[
            (Some(Rejected), Member, TransitionOrigin::Reconciliation),
            (Some(Member), Admin, TransitionOrigin::Administration),
        ],
        None => &[
            (None, Member, TransitionOrigin::Reconciliation),
            (Some(Member), Admin, TransitionOrigin::Administration),
        ],
    };

    path.iter()
        .map(|&(from, to, origin)| check_transition(from, Some(to), origin).map(|()| to))
        .collect()
}

fn label(status: Option<MembershipStatus>) -> &'static str {
    status.map_or("(none)", MembershipStatus::as_str)
}
