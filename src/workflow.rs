// workflow.rs
// The client lifecycle state machine: an enumerated status type and a static
// table of permitted (from-state, action, to-state, role) tuples. Every
// status mutation in the service resolves against this table; a pair outside
// it is rejected before anything is written.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::UserRole;

/// Pipeline position of a client. Encodings match the human-facing literals
/// stored in the database.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Status {
    Pending,
    Finance,
    Planning,
    CustomerCare,
    DocumentOfficer,
    Clearance,
    Completed,
    Archived,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::Finance => "Finance",
            Status::Planning => "Planning",
            Status::CustomerCare => "CustomerCare",
            Status::DocumentOfficer => "DocumentOfficer",
            Status::Clearance => "Clearance",
            Status::Completed => "Completed",
            Status::Archived => "Archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(Status::Pending),
            "Finance" => Some(Status::Finance),
            "Planning" => Some(Status::Planning),
            "CustomerCare" => Some(Status::CustomerCare),
            "DocumentOfficer" => Some(Status::DocumentOfficer),
            "Clearance" => Some(Status::Clearance),
            "Completed" => Some(Status::Completed),
            "Archived" => Some(Status::Archived),
            _ => None,
        }
    }
}

pub const SUB_NEW: &str = "New";
pub const SUB_FOR_REVIEW: &str = "For Review";
pub const SUB_RETURNED_FOR_REVIEW: &str = "Returned for Review";

/// Department hand-off actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowAction {
    SendToPlanning,
    ProceedToLiaison,
    BackToFinance,
    CompletePlanning,
    ProceedToDocumentOfficer,
    ReturnToPlanning,
    ProceedToFinance,
    ReturnToCustomerCare,
    ReturnToDocumentOfficer,
    Archive,
}

impl WorkflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowAction::SendToPlanning => "SendToPlanning",
            WorkflowAction::ProceedToLiaison => "ProceedToLiaison",
            WorkflowAction::BackToFinance => "BackToFinance",
            WorkflowAction::CompletePlanning => "CompletePlanning",
            WorkflowAction::ProceedToDocumentOfficer => "ProceedToDocumentOfficer",
            WorkflowAction::ReturnToPlanning => "ReturnToPlanning",
            WorkflowAction::ProceedToFinance => "ProceedToFinance",
            WorkflowAction::ReturnToCustomerCare => "ReturnToCustomerCare",
            WorkflowAction::ReturnToDocumentOfficer => "ReturnToDocumentOfficer",
            WorkflowAction::Archive => "Archive",
        }
    }

    /// The transition that must not fire while a required requirement is
    /// missing its proof files.
    pub fn requires_complete_requirements(&self) -> bool {
        matches!(self, WorkflowAction::ProceedToDocumentOfficer)
    }
}

/// Resolved outcome of a permitted transition. `sub_status: None` leaves the
/// stored qualifier untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub to: Status,
    pub sub_status: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The client's current status is not a valid predecessor for the action.
    InvalidFromState {
        action: WorkflowAction,
        from: Status,
    },
    /// None of the caller's roles may perform the action.
    RoleDenied { action: WorkflowAction },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::InvalidFromState { action, from } => write!(
                f,
                "{} is not permitted while the client is in status {}",
                action.as_str(),
                from.as_str()
            ),
            TransitionError::RoleDenied { action } => {
                write!(f, "caller's roles may not perform {}", action.as_str())
            }
        }
    }
}

struct Rule {
    action: WorkflowAction,
    /// Empty slice means any status except Archived.
    from: &'static [Status],
    to: Status,
    sub_status: Option<&'static str>,
    roles: &'static [UserRole],
}

const RULES: &[Rule] = &[
    Rule {
        action: WorkflowAction::SendToPlanning,
        from: &[Status::Pending, Status::Finance],
        to: Status::Planning,
        sub_status: None,
        roles: &[UserRole::Finance],
    },
    Rule {
        action: WorkflowAction::ProceedToLiaison,
        from: &[Status::Planning],
        to: Status::CustomerCare,
        sub_status: Some(SUB_NEW),
        roles: &[UserRole::PlanningOfficer],
    },
    Rule {
        action: WorkflowAction::BackToFinance,
        from: &[Status::Planning],
        to: Status::Finance,
        sub_status: Some(SUB_FOR_REVIEW),
        roles: &[UserRole::PlanningOfficer],
    },
    Rule {
        action: WorkflowAction::CompletePlanning,
        from: &[Status::Planning],
        to: Status::Completed,
        sub_status: None,
        roles: &[UserRole::PlanningOfficer],
    },
    Rule {
        action: WorkflowAction::ProceedToDocumentOfficer,
        from: &[Status::CustomerCare],
        to: Status::DocumentOfficer,
        sub_status: Some(SUB_NEW),
        roles: &[UserRole::CustomerCare],
    },
    Rule {
        action: WorkflowAction::ReturnToPlanning,
        from: &[Status::CustomerCare],
        to: Status::Planning,
        sub_status: Some(SUB_FOR_REVIEW),
        roles: &[UserRole::CustomerCare],
    },
    Rule {
        action: WorkflowAction::ProceedToFinance,
        from: &[Status::DocumentOfficer],
        to: Status::Clearance,
        sub_status: Some(SUB_NEW),
        roles: &[UserRole::DocumentOfficer],
    },
    Rule {
        action: WorkflowAction::ReturnToCustomerCare,
        from: &[Status::DocumentOfficer],
        to: Status::CustomerCare,
        sub_status: Some(SUB_RETURNED_FOR_REVIEW),
        roles: &[UserRole::DocumentOfficer],
    },
    Rule {
        action: WorkflowAction::ReturnToDocumentOfficer,
        from: &[Status::Clearance],
        to: Status::DocumentOfficer,
        sub_status: None,
        roles: &[UserRole::Finance],
    },
    Rule {
        action: WorkflowAction::Archive,
        from: &[],
        to: Status::Archived,
        sub_status: None,
        roles: &[UserRole::Finance, UserRole::DocumentOfficer],
    },
];

/// Checks the transition table. Admin passes every role gate; nobody passes
/// a from-state gate.
pub fn resolve(
    action: WorkflowAction,
    from: Status,
    roles: &[UserRole],
) -> Result<Transition, TransitionError> {
    let rule = RULES
        .iter()
        .find(|r| r.action == action)
        .expect("every action has a rule");

    let from_ok = if rule.from.is_empty() {
        from != Status::Archived
    } else {
        rule.from.contains(&from)
    };
    if !from_ok {
        return Err(TransitionError::InvalidFromState { action, from });
    }

    let role_ok = roles.contains(&UserRole::Admin)
        || roles.iter().any(|r| rule.roles.contains(r));
    if !role_ok {
        return Err(TransitionError::RoleDenied { action });
    }

    Ok(Transition {
        to: rule.to,
        sub_status: rule.sub_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_through_every_department() {
        let steps = [
            (WorkflowAction::SendToPlanning, Status::Pending, UserRole::Finance, Status::Planning),
            (
                WorkflowAction::ProceedToLiaison,
                Status::Planning,
                UserRole::PlanningOfficer,
                Status::CustomerCare,
            ),
            (
                WorkflowAction::ProceedToDocumentOfficer,
                Status::CustomerCare,
                UserRole::CustomerCare,
                Status::DocumentOfficer,
            ),
            (
                WorkflowAction::ProceedToFinance,
                Status::DocumentOfficer,
                UserRole::DocumentOfficer,
                Status::Clearance,
            ),
            (
                WorkflowAction::Archive,
                Status::Clearance,
                UserRole::Finance,
                Status::Archived,
            ),
        ];
        for (action, from, role, to) in steps {
            let t = resolve(action, from, &[role]).unwrap();
            assert_eq!(t.to, to, "{:?} from {:?}", action, from);
        }
    }

    #[test]
    fn return_paths_set_review_qualifiers() {
        let t = resolve(
            WorkflowAction::BackToFinance,
            Status::Planning,
            &[UserRole::PlanningOfficer],
        )
        .unwrap();
        assert_eq!(t.sub_status, Some(SUB_FOR_REVIEW));

        let t = resolve(
            WorkflowAction::ReturnToCustomerCare,
            Status::DocumentOfficer,
            &[UserRole::DocumentOfficer],
        )
        .unwrap();
        assert_eq!(t.sub_status, Some(SUB_RETURNED_FOR_REVIEW));
    }

    #[test]
    fn wrong_from_state_is_rejected() {
        let err = resolve(
            WorkflowAction::ProceedToDocumentOfficer,
            Status::Pending,
            &[UserRole::CustomerCare],
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidFromState { .. }));
    }

    #[test]
    fn role_outside_the_allow_list_is_rejected() {
        let err = resolve(
            WorkflowAction::SendToPlanning,
            Status::Pending,
            &[UserRole::CustomerCare],
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::RoleDenied { .. }));
    }

    #[test]
    fn admin_passes_role_gates_but_not_state_gates() {
        assert!(resolve(
            WorkflowAction::SendToPlanning,
            Status::Pending,
            &[UserRole::Admin]
        )
        .is_ok());
        let err = resolve(
            WorkflowAction::SendToPlanning,
            Status::Archived,
            &[UserRole::Admin],
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidFromState { .. }));
    }

    #[test]
    fn archive_accepts_any_active_status_but_not_archived() {
        for from in [
            Status::Pending,
            Status::Finance,
            Status::Planning,
            Status::CustomerCare,
            Status::DocumentOfficer,
            Status::Clearance,
            Status::Completed,
        ] {
            assert!(resolve(WorkflowAction::Archive, from, &[UserRole::Finance]).is_ok());
        }
        assert!(resolve(WorkflowAction::Archive, Status::Archived, &[UserRole::Finance]).is_err());
    }

    #[test]
    fn status_encodings_round_trip() {
        for s in [
            Status::Pending,
            Status::Finance,
            Status::Planning,
            Status::CustomerCare,
            Status::DocumentOfficer,
            Status::Clearance,
            Status::Completed,
            Status::Archived,
        ] {
            assert_eq!(Status::parse(s.as_str()), Some(s));
        }
    }
}
