use serde::{Deserialize, Serialize};

use crate::directory::PersonId;
use crate::period::DateRange;
use crate::voucher::{Voucher, VoucherStatus};

/// Criteria for the "my requests" view and the approval queues.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoucherFilter {
    pub employee: Option<PersonId>,
    pub manager: Option<PersonId>,
    pub status: Option<VoucherStatus>,
    /// Case-insensitive substring of department or project.
    pub search: Option<String>,
    pub dates: DateRange,
}

impl VoucherFilter {
    pub fn for_employee(employee: PersonId) -> Self {
        VoucherFilter { employee: Some(employee), ..Default::default() }
    }

    pub fn with_status(mut self, status: VoucherStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_search(mut self, term: &str) -> Self {
        let term = term.trim();
        self.search = (!term.is_empty()).then(|| term.to_string());
        self
    }

    pub fn with_dates(mut self, dates: DateRange) -> Self {
        self.dates = dates;
        self
    }

    pub fn matches(&self, voucher: &Voucher) -> bool {
        if self.employee.is_some_and(|e| e != voucher.employee) {
            return false;
        }
        if self.manager.is_some_and(|m| m != voucher.manager) {
            return false;
        }
        if self.status.is_some_and(|s| s != voucher.status) {
            return false;
        }
        if !self.dates.contains(voucher.voucher_date) {
            return false;
        }
        match &self.search {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                voucher.department.to_lowercase().contains(&term)
                    || voucher
                        .project
                        .as_deref()
                        .is_some_and(|p| p.to_lowercase().contains(&term))
            }
        }
    }
}
