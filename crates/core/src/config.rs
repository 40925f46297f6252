//! Workspace configuration, read from a TOML file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::directory::{Person, PersonId, StaticDirectory};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoucherConfig {
    pub ocr: OcrSettings,
    pub extraction: ExtractionSettings,
    pub storage: StorageSettings,
    pub people: Vec<Person>,
    pub accounts_team: Vec<PersonId>,
}

impl VoucherConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn directory(&self) -> StaticDirectory {
        StaticDirectory::new(self.people.iter().cloned(), self.accounts_team.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Tesseract language code handed to the recognizer.
    pub language: String,
    pub tesseract_data_path: Option<String>,
    /// Grayscale and contrast-stretch images before recognition.
    pub preprocess: bool,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            tesseract_data_path: None,
            preprocess: true,
        }
    }
}

/// Canonical output shape for interpreted dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// `YYYY-MM-DD`
    #[default]
    Iso,
    /// `MM/DD/YY`
    UsShort,
}

impl DateFormat {
    /// chrono format string for this shape.
    pub fn pattern(self) -> &'static str {
        match self {
            DateFormat::Iso => "%Y-%m-%d",
            DateFormat::UsShort => "%m/%d/%y",
        }
    }
}

/// A whole-word, case-insensitive OCR fix-up applied before date matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub word: String,
    pub replacement: String,
}

impl Correction {
    pub fn new(word: &str, replacement: &str) -> Self {
        Self { word: word.to_string(), replacement: replacement.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Lines containing any of these mark their amounts as likely totals.
    pub keywords: Vec<String>,
    pub keyword_weight: u32,
    pub base_weight: u32,
    /// Inclusive plausibility bounds for amounts, in whole currency units.
    pub min_amount: u32,
    pub max_amount: u32,
    pub date_format: DateFormat,
    pub corrections: Vec<Correction>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            keywords: ["total", "amount", "paid", "net", "bill"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            keyword_weight: 10,
            base_weight: 1,
            min_amount: 1,
            max_amount: 50_000,
            date_format: DateFormat::Iso,
            corrections: vec![Correction::new("hug", "Aug")],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Defaults to the platform data directory when unset.
    pub data_dir: Option<PathBuf>,
}

impl StorageSettings {
    pub const DB_FILE: &'static str = "vouchers.db";

    pub fn db_path(&self, default_dir: &Path) -> PathBuf {
        self.data_dir
            .as_deref()
            .unwrap_or(default_dir)
            .join(Self::DB_FILE)
    }
}
