use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available; build with the `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over an OCR backend.
/// Implementations accept raw PNG/JPEG image bytes plus a language code and
/// return the recognized text. Calls may block.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8], lang: &str) -> Result<String, OcrError>;
}

// ── Mock backends (always available, used for tests) ────────────────────────

/// Returns a pre-set string, for exercising the interpreter and the
/// orchestrator without Tesseract installed.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8], _lang: &str) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

/// Fails every call with an engine error.
pub struct FailingRecognizer;

impl OcrBackend for FailingRecognizer {
    fn recognize(&self, _image_bytes: &[u8], _lang: &str) -> Result<String, OcrError> {
        Err(OcrError::Engine("recognizer offline".to_string()))
    }
}

/// Stand-in used when the binary is built without the `tesseract` feature.
pub struct UnavailableRecognizer;

impl OcrBackend for UnavailableRecognizer {
    fn recognize(&self, _image_bytes: &[u8], _lang: &str) -> Result<String, OcrError> {
        Err(OcrError::NotAvailable)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use leptess::LepTess;

    pub struct TesseractRecognizer {
        data_path: Option<String>,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>) -> Self {
            Self { data_path }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8], lang: &str) -> Result<String, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}
