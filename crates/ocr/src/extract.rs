use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use voucher_core::{DateFormat, ExtractionSettings};

use crate::corrections::CorrectionTable;
use crate::types::{AmountCandidate, InterpretationResult, NOT_FOUND};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Cents are mandatory: bare integers on receipts are mostly quantities and
// reference numbers. Digits and word boundaries are ASCII-only; OCR noise in
// other scripts must not shadow a later, readable match.
re!(re_amount,
    r"(?-u:\b)[0-9]{1,3}(?:[,\s]?[0-9]{3})*\.[0-9]{2}(?-u:\b)");
re!(re_split_digits,
    r"[0-9]\s+[0-9]");

re!(re_date_day_first,
    r"(?-u:\b)([0-9]{1,2})[/.\-]([0-9]{1,2})[/.\-]([0-9]{2,4})(?-u:\b)");
re!(re_date_year_first,
    r"(?-u:\b)([0-9]{4})[/.\-]([0-9]{1,2})[/.\-]([0-9]{1,2})(?-u:\b)");
re!(re_date_month_name,
    r"(?i)(?-u:\b)(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\s+([0-9]{1,2})(?:,\s*|\s+)([0-9]{2,4})(?-u:\b)");

// ── Public extraction API ─────────────────────────────────────────────────────

/// Turns raw receipt OCR text into a best-guess amount and date.
///
/// Holds no per-call state; one instance can serve any number of receipts.
#[derive(Debug, Clone)]
pub struct Interpreter {
    keywords: Vec<String>,
    keyword_weight: u32,
    base_weight: u32,
    min_amount: Decimal,
    max_amount: Decimal,
    date_format: DateFormat,
    corrections: CorrectionTable,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(&ExtractionSettings::default())
    }
}

impl Interpreter {
    pub fn new(settings: &ExtractionSettings) -> Self {
        Self {
            keywords: settings.keywords.iter().map(|k| k.to_lowercase()).collect(),
            keyword_weight: settings.keyword_weight,
            base_weight: settings.base_weight,
            min_amount: Decimal::from(settings.min_amount),
            max_amount: Decimal::from(settings.max_amount),
            date_format: settings.date_format,
            corrections: CorrectionTable::new(&settings.corrections),
        }
    }

    pub fn date_format(&self) -> DateFormat {
        self.date_format
    }

    pub fn interpret(&self, ocr_text: &str) -> InterpretationResult {
        InterpretationResult {
            amount: self.extract_amount(ocr_text),
            date: self.extract_date(ocr_text),
        }
    }

    // ── Amount ────────────────────────────────────────────────────────────────

    /// The most plausible total, two decimals, or an empty string.
    pub fn extract_amount(&self, ocr_text: &str) -> String {
        self.best_amount(ocr_text)
            .map(|c| format!("{:.2}", c.value))
            .unwrap_or_default()
    }

    /// Highest weight wins; among equals the larger value, since a grand
    /// total is never smaller than the lines it sums.
    pub fn best_amount(&self, ocr_text: &str) -> Option<AmountCandidate> {
        self.amount_candidates(ocr_text)
            .into_iter()
            .max_by(|a, b| a.weight.cmp(&b.weight).then(a.value.cmp(&b.value)))
    }

    pub fn amount_candidates(&self, ocr_text: &str) -> Vec<AmountCandidate> {
        let mut candidates = Vec::new();
        for line in ocr_text.lines().map(|l| l.trim().to_lowercase()) {
            let weight = if self.keywords.iter().any(|k| line.contains(k.as_str())) {
                self.keyword_weight
            } else {
                self.base_weight
            };
            for m in re_amount().find_iter(&line) {
                let raw = m.as_str();
                // Space-separated digit runs are phone or reference fragments.
                if re_split_digits().is_match(raw) {
                    continue;
                }
                let Some(value) = parse_amount(raw) else { continue };
                if value < self.min_amount || value > self.max_amount {
                    continue;
                }
                candidates.push(AmountCandidate { value, weight });
            }
        }
        candidates
    }

    // ── Date ─────────────────────────────────────────────────────────────────

    /// The first readable date, canonically formatted, or "Not Found".
    pub fn extract_date(&self, ocr_text: &str) -> String {
        self.find_date(ocr_text)
            .map(|d| d.format(self.date_format.pattern()).to_string())
            .unwrap_or_else(|| NOT_FOUND.to_string())
    }

    /// Day-first numeric dates are tried before year-first, and spelled-out
    /// months last. Only the first match of each shape is considered; if it
    /// is not a real calendar date the next shape gets its turn.
    pub fn find_date(&self, ocr_text: &str) -> Option<NaiveDate> {
        let text = self.corrections.apply(ocr_text);
        let shapes: [(fn() -> &'static Regex, fn(&Captures) -> Option<NaiveDate>); 3] = [
            (re_date_day_first, day_first),
            (re_date_year_first, year_first),
            (re_date_month_name, month_name_first),
        ];
        shapes
            .iter()
            .find_map(|(re, parse)| re().captures(&text).and_then(|c| parse(&c)))
    }
}

// ── Date helpers ──────────────────────────────────────────────────────────────

fn day_first(c: &Captures) -> Option<NaiveDate> {
    let day: u32 = c.get(1)?.as_str().parse().ok()?;
    let month: u32 = c.get(2)?.as_str().parse().ok()?;
    let year = expand_year(c.get(3)?.as_str())?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn year_first(c: &Captures) -> Option<NaiveDate> {
    let year: i32 = c.get(1)?.as_str().parse().ok()?;
    let month: u32 = c.get(2)?.as_str().parse().ok()?;
    let day: u32 = c.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_name_first(c: &Captures) -> Option<NaiveDate> {
    let month = abbr_month_to_num(c.get(1)?.as_str())?;
    let day: u32 = c.get(2)?.as_str().parse().ok()?;
    let year = expand_year(c.get(3)?.as_str())?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Two-digit years are 20YY. Three digits is OCR debris, not a year.
fn expand_year(digits: &str) -> Option<i32> {
    let y: i32 = digits.parse().ok()?;
    match digits.len() {
        2 => Some(2000 + y),
        4 => Some(y),
        _ => None,
    }
}

fn abbr_month_to_num(name: &str) -> Option<u32> {
    match name.to_lowercase().as_str() {
        "jan" => Some(1), "feb" => Some(2), "mar" => Some(3), "apr" => Some(4),
        "may" => Some(5), "jun" => Some(6), "jul" => Some(7), "aug" => Some(8),
        "sep" => Some(9), "oct" => Some(10), "nov" => Some(11), "dec" => Some(12),
        _ => None,
    }
}

// ── Amount parsing ────────────────────────────────────────────────────────────

fn parse_amount(raw: &str) -> Option<Decimal> {
    let clean: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    Decimal::from_str(&clean).ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use voucher_core::Correction;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ── Amount ────────────────────────────────────────────────────────────────

    #[test]
    fn labeled_total() {
        let i = Interpreter::default();
        assert_eq!(i.extract_amount("CAFE MOCHA\nTotal: 45.00\nThank you"), "45.00");
    }

    #[test]
    fn keyword_line_beats_larger_stray_number() {
        let i = Interpreter::default();
        let text = "Item A 12.00\nSubtotal 20.00\nRef 9999.00\nTotal 45.00";
        assert_eq!(i.extract_amount(text), "45.00");

        let text = "9999.00\nTotal 45.00";
        assert_eq!(i.extract_amount(text), "45.00");
    }

    #[test]
    fn equal_weights_prefer_larger_value() {
        let i = Interpreter::default();
        assert_eq!(i.extract_amount("Net 30.00\nPaid 50.00"), "50.00");
        assert_eq!(i.extract_amount("Paid 50.00\nNet 30.00"), "50.00");
    }

    #[test]
    fn keywords_ignore_case() {
        let i = Interpreter::default();
        assert_eq!(i.extract_amount("Chai 80.00\nGRAND TOTAL 40.00"), "40.00");
        assert_eq!(i.extract_amount("bill amt 15.50\nsnacks 99.00"), "15.50");
    }

    #[test]
    fn out_of_range_values_excluded() {
        let i = Interpreter::default();
        assert_eq!(i.extract_amount("Total 99999.99"), "");
        assert_eq!(i.extract_amount("Total 0.99"), "");
        assert_eq!(i.extract_amount("Total 1.00"), "1.00");
        assert_eq!(i.extract_amount("Total 50,000.00"), "50000.00");
    }

    #[test]
    fn space_split_digits_excluded() {
        let i = Interpreter::default();
        let candidates = i.amount_candidates("Ph 12 345.00");
        assert!(candidates.is_empty(), "got {candidates:?}");
        assert_eq!(i.extract_amount("Ph 12 345.00\nTotal 45.00"), "45.00");
    }

    #[test]
    fn thousands_commas_are_stripped() {
        let i = Interpreter::default();
        assert_eq!(i.extract_amount("Amount Due 1,234.56"), "1234.56");
    }

    #[test]
    fn bare_integers_are_not_amounts() {
        let i = Interpreter::default();
        assert_eq!(i.extract_amount("Qty 3\nTotal: 45"), "");
    }

    #[test]
    fn candidates_carry_weights() {
        let i = Interpreter::default();
        let c = i.amount_candidates("Tea 20.00\nTotal 45.00");
        assert_eq!(
            c,
            vec![
                AmountCandidate { value: Decimal::new(2000, 2), weight: 1 },
                AmountCandidate { value: Decimal::new(4500, 2), weight: 10 },
            ]
        );
    }

    #[test]
    fn empty_text_has_no_amount() {
        assert_eq!(Interpreter::default().extract_amount(""), "");
    }

    #[test]
    fn configured_keywords_and_bounds() {
        let settings = ExtractionSettings {
            keywords: vec!["Summe".to_string()],
            max_amount: 100,
            ..ExtractionSettings::default()
        };
        let i = Interpreter::new(&settings);
        assert_eq!(i.extract_amount("Total 90.00\nSumme 12.00"), "12.00");
        assert_eq!(i.extract_amount("Summe 150.00"), "");
    }

    // ── Date ─────────────────────────────────────────────────────────────────

    #[test]
    fn day_first_numeric() {
        let i = Interpreter::default();
        assert_eq!(i.find_date("Date 01/02/24"), Some(date(2024, 2, 1)));
        assert_eq!(i.find_date("05.08.2024 10:42"), Some(date(2024, 8, 5)));
        assert_eq!(i.find_date("31-12-2023"), Some(date(2023, 12, 31)));
    }

    #[test]
    fn year_first_numeric() {
        let i = Interpreter::default();
        assert_eq!(i.find_date("Order 2024-03-15"), Some(date(2024, 3, 15)));
        assert_eq!(i.find_date("2024/8/5"), Some(date(2024, 8, 5)));
    }

    #[test]
    fn month_name_first() {
        let i = Interpreter::default();
        assert_eq!(i.find_date("Jan 5 2024"), Some(date(2024, 1, 5)));
        assert_eq!(i.find_date("March 12, 24"), Some(date(2024, 3, 12)));
        assert_eq!(i.find_date("SEPT 9,2023"), Some(date(2023, 9, 9)));
    }

    #[test]
    fn hug_is_read_as_aug() {
        let i = Interpreter::default();
        assert_eq!(i.extract_date("Aug 5, 2024"), "2024-08-05");
        assert_eq!(i.extract_date("hug 5, 2024"), "2024-08-05");
        assert_eq!(i.extract_date("HUG 5, 2024"), "2024-08-05");
    }

    #[test]
    fn day_first_wins_over_other_shapes() {
        let i = Interpreter::default();
        let text = "Printed 2023-01-01\nVisit Jan 9 2024\nBill date 07/03/24";
        assert_eq!(i.find_date(text), Some(date(2024, 3, 7)));
    }

    #[test]
    fn first_match_in_document_order() {
        let i = Interpreter::default();
        assert_eq!(i.find_date("10/01/24\n11/01/24"), Some(date(2024, 1, 10)));
    }

    #[test]
    fn invalid_match_falls_through_to_next_shape() {
        let i = Interpreter::default();
        assert_eq!(i.find_date("Ref 45/13/2024\nIssued 2024-02-29"), Some(date(2024, 2, 29)));
        assert_eq!(i.extract_date("31/02/2024"), NOT_FOUND);
    }

    #[test]
    fn non_ascii_digits_do_not_shadow_later_date() {
        let i = Interpreter::default();
        assert_eq!(i.find_date("Ref １２/０５/２０２４\nDate 05/08/2024"), Some(date(2024, 8, 5)));
        assert_eq!(i.find_date("Ref ٠١/٠٢/٢٤\nDate 05/08/2024"), Some(date(2024, 8, 5)));
        assert_eq!(i.extract_amount("٤٥.٠٠\nTotal 45.00"), "45.00");
    }

    #[test]
    fn three_digit_year_is_not_a_date() {
        assert_eq!(Interpreter::default().extract_date("12/05/202"), NOT_FOUND);
    }

    #[test]
    fn no_date_is_not_found() {
        let i = Interpreter::default();
        assert_eq!(i.extract_date("TOTAL 45.00\nTHANK YOU"), NOT_FOUND);
        assert_eq!(i.extract_date(""), NOT_FOUND);
    }

    #[test]
    fn canonical_date_roundtrips() {
        for format in [DateFormat::Iso, DateFormat::UsShort] {
            let settings = ExtractionSettings { date_format: format, ..Default::default() };
            let i = Interpreter::new(&settings);
            let s = i.extract_date("Date: 29/02/2024");
            let parsed = NaiveDate::parse_from_str(&s, format.pattern()).unwrap();
            assert_eq!(parsed, date(2024, 2, 29), "format {format:?} gave {s}");
        }
    }

    #[test]
    fn us_short_output() {
        let settings = ExtractionSettings { date_format: DateFormat::UsShort, ..Default::default() };
        assert_eq!(Interpreter::new(&settings).extract_date("hug 5, 2024"), "08/05/24");
    }

    #[test]
    fn extra_corrections_from_settings() {
        let mut settings = ExtractionSettings::default();
        settings.corrections.push(Correction::new("0ct", "Oct"));
        let i = Interpreter::new(&settings);
        assert_eq!(i.find_date("0ct 3 2024"), Some(date(2024, 10, 3)));
    }

    // ── Whole receipt ────────────────────────────────────────────────────────

    #[test]
    fn interpret_full_receipt() {
        let text = "SPICE ROUTE RESTAURANT\nTel 080 4123 4567\nDate: 05/08/2024\n\
                    Paneer Tikka 320.00\nNaan x2 90.00\nSubtotal 410.00\nGST 5% 20.50\n\
                    Net Amount 430.50\nThank you!";
        let r = Interpreter::default().interpret(text);
        assert_eq!(r.amount, "430.50");
        assert_eq!(r.date, "2024-08-05");
    }

    #[test]
    fn interpret_garbage() {
        let r = Interpreter::default().interpret("!@#$%^&*()\n\0\x01\x02");
        assert_eq!(r, InterpretationResult::empty());
    }
}
