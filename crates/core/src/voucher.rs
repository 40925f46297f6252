use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::directory::PersonId;
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoucherId(pub i64);

impl fmt::Display for VoucherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoucherStatus {
    Draft,
    #[serde(rename = "Pending with Manager")]
    PendingWithManager,
    #[serde(rename = "Pending with Account")]
    PendingWithAccount,
    Recycle,
    Rejected,
    Completed,
}

impl VoucherStatus {
    pub const ALL: [VoucherStatus; 6] = [
        VoucherStatus::Draft,
        VoucherStatus::PendingWithManager,
        VoucherStatus::PendingWithAccount,
        VoucherStatus::Recycle,
        VoucherStatus::Rejected,
        VoucherStatus::Completed,
    ];

    /// The employee may still change the voucher.
    pub fn is_editable(self) -> bool {
        matches!(self, VoucherStatus::Draft | VoucherStatus::Recycle)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, VoucherStatus::Rejected | VoucherStatus::Completed)
    }
}

impl fmt::Display for VoucherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoucherStatus::Draft => write!(f, "Draft"),
            VoucherStatus::PendingWithManager => write!(f, "Pending with Manager"),
            VoucherStatus::PendingWithAccount => write!(f, "Pending with Account"),
            VoucherStatus::Recycle => write!(f, "Recycle"),
            VoucherStatus::Rejected => write!(f, "Rejected"),
            VoucherStatus::Completed => write!(f, "Completed"),
        }
    }
}

impl std::str::FromStr for VoucherStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VoucherStatus::ALL
            .into_iter()
            .find(|status| status.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown voucher status: '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Currency is required")]
    MissingCurrency,
    #[error("Project-related must be answered")]
    MissingProjectRelated,
    #[error("A project must be selected for project-related vouchers")]
    MissingProject,
    #[error("Voucher has no expense items")]
    NoItems,
    #[error("Expense item {0} has no expense head")]
    MissingHead(usize),
    #[error("Expense item {0} has no amount")]
    MissingAmount(usize),
    #[error("No expense item at index {0}")]
    NoSuchItem(usize),
    #[error("Voucher cannot be edited while {0}")]
    NotEditable(VoucherStatus),
}

/// One line of a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseItem {
    /// Expense category, e.g. "Travel".
    pub head: String,
    pub description: String,
    pub date: NaiveDate,
    pub amount: Option<Money>,
    /// Amount or date was filled from a scanned receipt.
    #[serde(default)]
    pub receipt_scanned: bool,
}

impl ExpenseItem {
    pub fn new(head: &str, description: &str, date: NaiveDate, amount: Option<Money>) -> Self {
        ExpenseItem {
            head: head.to_string(),
            description: description.to_string(),
            date,
            amount,
            receipt_scanned: false,
        }
    }

    pub fn blank(date: NaiveDate) -> Self {
        ExpenseItem::new("", "", date, None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: Option<VoucherId>,
    pub employee: PersonId,
    pub employee_name: String,
    pub department: String,
    /// Reporting manager at the time the voucher was raised.
    pub manager: PersonId,
    pub currency: String,
    pub project_related: Option<bool>,
    pub project: Option<String>,
    pub voucher_date: NaiveDate,
    pub items: Vec<ExpenseItem>,
    pub status: VoucherStatus,
    pub employee_comment: Option<String>,
    pub manager_comment: Option<String>,
    pub account_comment: Option<String>,
}

impl Voucher {
    pub fn new(
        employee: PersonId,
        employee_name: &str,
        department: &str,
        manager: PersonId,
        voucher_date: NaiveDate,
    ) -> Self {
        Voucher {
            id: None,
            employee,
            employee_name: employee_name.to_string(),
            department: department.to_string(),
            manager,
            currency: String::new(),
            project_related: None,
            project: None,
            voucher_date,
            items: vec![],
            status: VoucherStatus::Draft,
            employee_comment: None,
            manager_comment: None,
            account_comment: None,
        }
    }

    /// Sum of item amounts; items without an amount count as zero.
    pub fn total(&self) -> Money {
        self.items.iter().filter_map(|i| i.amount).sum()
    }

    pub fn ensure_editable(&self) -> Result<(), ValidationError> {
        if self.status.is_editable() {
            Ok(())
        } else {
            Err(ValidationError::NotEditable(self.status))
        }
    }

    pub fn add_item(&mut self, item: ExpenseItem) -> Result<usize, ValidationError> {
        self.ensure_editable()?;
        self.items.push(item);
        Ok(self.items.len() - 1)
    }

    pub fn remove_item(&mut self, index: usize) -> Result<ExpenseItem, ValidationError> {
        self.ensure_editable()?;
        if index >= self.items.len() {
            return Err(ValidationError::NoSuchItem(index));
        }
        Ok(self.items.remove(index))
    }

    /// Write a receipt reading into the item at `index`. Fields the receipt did
    /// not yield leave the item's existing value in place.
    pub fn apply_scan(
        &mut self,
        index: usize,
        amount: Option<Money>,
        date: Option<NaiveDate>,
    ) -> Result<(), ValidationError> {
        self.ensure_editable()?;
        let item = self
            .items
            .get_mut(index)
            .ok_or(ValidationError::NoSuchItem(index))?;
        if let Some(amount) = amount {
            item.amount = Some(amount);
        }
        if let Some(date) = date {
            item.date = date;
        }
        item.receipt_scanned = true;
        Ok(())
    }

    /// Checks required before a voucher leaves the employee's hands.
    pub fn validate_for_submission(&self) -> Result<(), ValidationError> {
        if self.currency.trim().is_empty() {
            return Err(ValidationError::MissingCurrency);
        }
        match self.project_related {
            None => return Err(ValidationError::MissingProjectRelated),
            Some(true) if self.project.as_deref().map_or(true, |p| p.trim().is_empty()) => {
                return Err(ValidationError::MissingProject)
            }
            _ => {}
        }
        if self.items.is_empty() {
            return Err(ValidationError::NoItems);
        }
        for (idx, item) in self.items.iter().enumerate() {
            if item.head.trim().is_empty() {
                return Err(ValidationError::MissingHead(idx));
            }
            if item.amount.is_none() {
                return Err(ValidationError::MissingAmount(idx));
            }
        }
        Ok(())
    }
}
