use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use voucher_core::{DateFormat, Money};

/// Date placeholder when no date could be read off a receipt.
pub const NOT_FOUND: &str = "Not Found";

/// A monetary match on one receipt line, scored by where it appeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountCandidate {
    pub value: Decimal,
    pub weight: u32,
}

/// What a receipt yielded, in the string shapes the expense form consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpretationResult {
    /// Two-decimal amount, or empty when nothing qualified.
    pub amount: String,
    /// Canonical date, or [`NOT_FOUND`].
    pub date: String,
}

impl InterpretationResult {
    pub fn empty() -> Self {
        Self { amount: String::new(), date: NOT_FOUND.to_string() }
    }

    pub fn has_amount(&self) -> bool {
        !self.amount.is_empty()
    }

    pub fn has_date(&self) -> bool {
        self.date != NOT_FOUND
    }

    /// Amount as shown to the user; an empty amount reads as "Not Found".
    pub fn amount_label(&self) -> &str {
        if self.has_amount() { &self.amount } else { NOT_FOUND }
    }

    pub fn amount_value(&self) -> Option<Money> {
        self.amount.parse().ok()
    }

    /// Parse the date back, given the format it was written in.
    pub fn date_value(&self, format: DateFormat) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, format.pattern()).ok()
    }
}

/// The reading for one expense line, keyed by its position in the voucher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemScan {
    pub index: usize,
    pub ocr_text: String,
    pub result: InterpretationResult,
}
