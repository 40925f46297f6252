use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

use crate::directory::{Directory, PersonId};
use crate::voucher::{ValidationError, Voucher, VoucherStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Submit,
    Approve,
    Recycle,
    Reject,
    Finalize,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Submit => write!(f, "submit"),
            Action::Approve => write!(f, "approve"),
            Action::Recycle => write!(f, "recycle"),
            Action::Reject => write!(f, "reject"),
            Action::Finalize => write!(f, "finalize"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    #[error("Unknown person: {0}")]
    UnknownPerson(PersonId),
    #[error("No reporting manager on record for {0}")]
    NoManager(PersonId),
    #[error("Cannot {action} a voucher that is {status}")]
    NotAllowed { action: Action, status: VoucherStatus },
    #[error("Person {actor} may not {action} this voucher")]
    NotAuthorized { actor: PersonId, action: Action },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Start a draft for `employee`, routing it to the manager the directory
/// reports for them.
pub fn start_draft(
    directory: &dyn Directory,
    employee: PersonId,
    voucher_date: NaiveDate,
) -> Result<Voucher, WorkflowError> {
    let person = directory
        .person(employee)
        .ok_or(WorkflowError::UnknownPerson(employee))?;
    let manager = directory
        .manager_of(employee)
        .ok_or(WorkflowError::NoManager(employee))?;
    Ok(Voucher::new(
        person.id,
        &person.name,
        &person.department,
        manager.id,
        voucher_date,
    ))
}

/// Where `action` takes a voucher currently in `status`, if anywhere.
pub fn next_status(status: VoucherStatus, action: Action) -> Option<VoucherStatus> {
    use VoucherStatus::*;
    match (status, action) {
        (Draft | Recycle, Action::Submit) => Some(PendingWithManager),
        (PendingWithManager, Action::Approve) => Some(PendingWithAccount),
        (PendingWithAccount, Action::Finalize) => Some(Completed),
        (PendingWithManager | PendingWithAccount, Action::Recycle) => Some(Recycle),
        (PendingWithManager | PendingWithAccount, Action::Reject) => Some(Rejected),
        _ => None,
    }
}

/// Apply `action` by `actor`, recording `comment` against the stage that acted.
///
/// Submission belongs to the voucher's employee, the manager stage to the
/// voucher's recorded reporting manager, and the accounts stage to any member
/// of the accounts group.
pub fn apply(
    voucher: &mut Voucher,
    directory: &dyn Directory,
    actor: PersonId,
    action: Action,
    comment: Option<String>,
) -> Result<VoucherStatus, WorkflowError> {
    let status = voucher.status;
    let next = next_status(status, action).ok_or(WorkflowError::NotAllowed { action, status })?;

    let authorized = match status {
        VoucherStatus::Draft | VoucherStatus::Recycle => actor == voucher.employee,
        VoucherStatus::PendingWithManager => actor == voucher.manager,
        VoucherStatus::PendingWithAccount => directory.is_accounts_member(actor),
        VoucherStatus::Rejected | VoucherStatus::Completed => false,
    };
    if !authorized {
        return Err(WorkflowError::NotAuthorized { actor, action });
    }

    match status {
        VoucherStatus::Draft | VoucherStatus::Recycle => {
            voucher.validate_for_submission()?;
            if comment.is_some() {
                voucher.employee_comment = comment;
            }
        }
        VoucherStatus::PendingWithManager => voucher.manager_comment = comment,
        _ => voucher.account_comment = comment,
    }

    tracing::info!(
        voucher = ?voucher.id,
        %actor,
        %action,
        from = %status,
        to = %next,
        "Voucher status changed"
    );
    voucher.status = next;
    Ok(next)
}
