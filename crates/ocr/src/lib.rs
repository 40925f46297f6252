pub mod corrections;
pub mod extract;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod types;

pub use corrections::CorrectionTable;
pub use extract::Interpreter;
pub use pipeline::{ImagePayload, PayloadError, RecognitionOrchestrator, ScanOutcome};
pub use preprocess::{prepare_for_ocr, PreprocessError};
pub use recognizer::{FailingRecognizer, MockRecognizer, OcrBackend, OcrError, UnavailableRecognizer};
pub use types::{AmountCandidate, InterpretationResult, ItemScan, NOT_FOUND};

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;
