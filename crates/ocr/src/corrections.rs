use regex::{NoExpand, Regex};
use std::borrow::Cow;
use voucher_core::Correction;

/// Known OCR misreads, fixed up before date matching.
///
/// Each entry replaces a whole word, case-insensitively. Entries apply in
/// order, so a later entry sees the output of earlier ones.
#[derive(Debug, Clone)]
pub struct CorrectionTable {
    rules: Vec<(Regex, String)>,
}

impl CorrectionTable {
    pub fn new(entries: &[Correction]) -> Self {
        let rules = entries
            .iter()
            .filter(|c| !c.word.trim().is_empty())
            .filter_map(|c| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(c.word.trim()));
                Regex::new(&pattern).ok().map(|re| (re, c.replacement.clone()))
            })
            .collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let mut out = Cow::Borrowed(text);
        for (re, replacement) in &self.rules {
            if re.is_match(&out) {
                out = Cow::Owned(re.replace_all(&out, NoExpand(replacement.as_str())).into_owned());
            }
        }
        out
    }
}

impl Default for CorrectionTable {
    /// `hug` is how the recognizer tends to read a printed "Aug".
    fn default() -> Self {
        Self::new(&[Correction::new("hug", "Aug")])
    }
}
