use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;
use tokio::task::JoinSet;
use voucher_core::OcrSettings;

use crate::extract::Interpreter;
use crate::preprocess;
use crate::recognizer::OcrBackend;
use crate::types::{InterpretationResult, ItemScan};

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Data URL is not base64-encoded")]
    NotBase64DataUrl,
}

/// A receipt image as handed over by the caller.
#[derive(Debug, Clone)]
pub enum ImagePayload {
    Bytes(Vec<u8>),
    /// Bare base64, or a `data:<mime>;base64,` URL as browsers produce.
    Base64(String),
}

impl ImagePayload {
    pub fn decode(self) -> Result<Vec<u8>, PayloadError> {
        match self {
            ImagePayload::Bytes(b) => Ok(b),
            ImagePayload::Base64(s) => {
                let s = s.trim();
                let body = match s.strip_prefix("data:") {
                    Some(rest) => {
                        let (meta, data) = rest.split_once(',').ok_or(PayloadError::NotBase64DataUrl)?;
                        if !meta.ends_with(";base64") {
                            return Err(PayloadError::NotBase64DataUrl);
                        }
                        data
                    }
                    None => s,
                };
                let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
                Ok(STANDARD.decode(compact)?)
            }
        }
    }
}

/// What one receipt scan produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Raw recognizer output; empty when recognition failed.
    pub ocr_text: String,
    pub result: InterpretationResult,
}

/// Orchestrates: decode → preprocess → OCR → interpret.
///
/// Every failure on the way to text is logged and treated as "nothing
/// recognized", so a scan always yields a result. Cloning is cheap; clones
/// share the recognizer.
pub struct RecognitionOrchestrator<R: OcrBackend> {
    recognizer: Arc<R>,
    interpreter: Arc<Interpreter>,
    language: String,
    preprocess: bool,
}

impl<R: OcrBackend> Clone for RecognitionOrchestrator<R> {
    fn clone(&self) -> Self {
        Self {
            recognizer: Arc::clone(&self.recognizer),
            interpreter: Arc::clone(&self.interpreter),
            language: self.language.clone(),
            preprocess: self.preprocess,
        }
    }
}

impl<R: OcrBackend + 'static> RecognitionOrchestrator<R> {
    pub fn new(recognizer: R, interpreter: Interpreter, settings: &OcrSettings) -> Self {
        Self {
            recognizer: Arc::new(recognizer),
            interpreter: Arc::new(interpreter),
            language: settings.language.clone(),
            preprocess: settings.preprocess,
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Read an image file fully and scan it.
    pub async fn scan_file(&self, path: &Path) -> std::io::Result<ScanOutcome> {
        let bytes = tokio::fs::read(path).await?;
        tracing::info!("Scanning receipt: {}", path.display());
        Ok(self.scan(ImagePayload::Bytes(bytes)).await)
    }

    pub async fn scan(&self, payload: ImagePayload) -> ScanOutcome {
        let ocr_text = self.recognize_text(payload).await;
        let result = self.interpreter.interpret(&ocr_text);
        tracing::debug!(amount = %result.amount_label(), date = %result.date, "Receipt interpreted");
        ScanOutcome { ocr_text, result }
    }

    /// Scan several receipts concurrently, one per expense line. Results come
    /// back in completion order, each tagged with its line index.
    pub async fn scan_items(&self, receipts: Vec<(usize, ImagePayload)>) -> Vec<ItemScan> {
        let mut tasks = JoinSet::new();
        for (index, payload) in receipts {
            let this = self.clone();
            tasks.spawn(async move {
                let outcome = this.scan(payload).await;
                ItemScan { index, ocr_text: outcome.ocr_text, result: outcome.result }
            });
        }

        let mut scans = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(scan) => scans.push(scan),
                Err(e) => tracing::warn!("Receipt scan task failed: {e}"),
            }
        }
        scans
    }

    /// Recognized text, or an empty string if any step fails.
    pub async fn recognize_text(&self, payload: ImagePayload) -> String {
        let bytes = match payload.decode() {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("OCR skipped: {e}");
                return String::new();
            }
        };

        let recognizer = Arc::clone(&self.recognizer);
        let language = self.language.clone();
        let preprocess = self.preprocess;

        let joined = tokio::task::spawn_blocking(move || {
            let image = if preprocess {
                match preprocess::prepare_for_ocr(&bytes) {
                    Ok(png) => png,
                    Err(e) => {
                        tracing::debug!("Preprocessing failed, using original image: {e}");
                        bytes
                    }
                }
            } else {
                bytes
            };
            recognizer.recognize(&image, &language)
        })
        .await;

        match joined {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!("OCR Error: {e}");
                String::new()
            }
            Err(e) => {
                tracing::warn!("OCR task failed: {e}");
                String::new()
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::tests::receipt_png;
    use crate::recognizer::{FailingRecognizer, MockRecognizer, OcrError};
    use std::sync::Mutex;

    const RECEIPT: &str = "CITY CABS\nTrip 12.00\nTotal: 45.00\nhug 5, 2024";

    fn orchestrator<R: OcrBackend + 'static>(r: R) -> RecognitionOrchestrator<R> {
        RecognitionOrchestrator::new(r, Interpreter::default(), &OcrSettings::default())
    }

    /// Records what the recognizer was handed.
    struct Spy {
        seen: Mutex<Vec<(usize, String)>>,
    }

    impl OcrBackend for Spy {
        fn recognize(&self, image_bytes: &[u8], lang: &str) -> Result<String, OcrError> {
            self.seen.lock().unwrap().push((image_bytes.len(), lang.to_string()));
            Ok("Total 10.00".to_string())
        }
    }

    #[test]
    fn decode_raw_bytes_passthrough() {
        assert_eq!(ImagePayload::Bytes(vec![1, 2, 3]).decode().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn decode_bare_and_data_url_base64() {
        let bare = ImagePayload::Base64("aGVs\nbG8=".to_string());
        assert_eq!(bare.decode().unwrap(), b"hello");
        let url = ImagePayload::Base64("data:image/png;base64,aGVsbG8=".to_string());
        assert_eq!(url.decode().unwrap(), b"hello");
    }

    #[test]
    fn decode_rejects_bad_payloads() {
        let plain = ImagePayload::Base64("data:text/plain,hello".to_string());
        assert!(matches!(plain.decode(), Err(PayloadError::NotBase64DataUrl)));
        let junk = ImagePayload::Base64("!!!".to_string());
        assert!(matches!(junk.decode(), Err(PayloadError::Base64(_))));
    }

    #[tokio::test]
    async fn scan_interprets_recognized_text() {
        let o = orchestrator(MockRecognizer::new(RECEIPT));
        let out = o.scan(ImagePayload::Bytes(receipt_png(8, 8))).await;
        assert_eq!(out.ocr_text, RECEIPT);
        assert_eq!(out.result.amount, "45.00");
        assert_eq!(out.result.date, "2024-08-05");
    }

    #[tokio::test]
    async fn ocr_failure_degrades_to_empty_result() {
        let o = orchestrator(FailingRecognizer);
        let out = o.scan(ImagePayload::Bytes(receipt_png(8, 8))).await;
        assert_eq!(out.ocr_text, "");
        assert_eq!(out.result, InterpretationResult::empty());
    }

    #[tokio::test]
    async fn undecodable_payload_degrades_to_empty_result() {
        let o = orchestrator(MockRecognizer::new(RECEIPT));
        let out = o.scan(ImagePayload::Base64("%%%".to_string())).await;
        assert_eq!(out.result, InterpretationResult::empty());
    }

    #[tokio::test]
    async fn language_hint_and_preprocessing_reach_the_backend() {
        let o = orchestrator(Spy { seen: Mutex::new(vec![]) });
        let original = receipt_png(8, 8);
        o.scan(ImagePayload::Bytes(original.clone())).await;
        // Non-image bytes pass straight through when preprocessing cannot decode them.
        o.scan(ImagePayload::Bytes(b"raw".to_vec())).await;

        let seen = o.recognizer.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(_, lang)| lang == "eng"));
        assert_eq!(seen[1].0, 3);
    }

    #[tokio::test]
    async fn scan_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        std::fs::write(&path, receipt_png(8, 8)).unwrap();

        let o = orchestrator(MockRecognizer::new(RECEIPT));
        assert_eq!(o.scan_file(&path).await.unwrap().result.amount, "45.00");
        assert!(o.scan_file(&dir.path().join("missing.png")).await.is_err());
    }

    #[tokio::test]
    async fn scan_items_tags_each_result_with_its_line() {
        let o = orchestrator(MockRecognizer::new(RECEIPT));
        let mut scans = o
            .scan_items(vec![
                (2, ImagePayload::Bytes(receipt_png(4, 4))),
                (0, ImagePayload::Base64("%%% not base64".to_string())),
            ])
            .await;
        scans.sort_by_key(|s| s.index);

        assert_eq!(scans.len(), 2);
        assert_eq!(scans[0].index, 0);
        assert_eq!(scans[0].result, InterpretationResult::empty());
        assert_eq!(scans[1].index, 2);
        assert_eq!(scans[1].result.amount, "45.00");
    }
}
