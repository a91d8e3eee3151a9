//! Interchangeable OCR backends behind one extraction contract.
//!
//! Two backends are provided:
//! - [`TesseractBackend`]: runs the local `tesseract` executable on a
//!   preprocessed binary image (`spa`, `--psm 6` by default).
//! - [`VisionBackend`]: sends the source image to Google Cloud Vision
//!   `TEXT_DETECTION` over HTTPS.
//!
//! Both return an [`Extraction`]: the recognized text, or an
//! [`ExtractionError`] telling apart "nothing to read", "backend not
//! reachable" and "backend failed". Pick one with [`OcrConfig`] and build an
//! [`OcrEngine`] once per run.

mod config;
mod engine;
mod result;
mod tesseract;
mod vision;

pub use config::{BackendKind, OcrConfig, TesseractConfig, VisionConfig};
pub use engine::{InputPreference, OcrBackend, OcrEngine, OcrInput};
pub use result::{Extraction, ExtractionError, non_empty};
pub use tesseract::TesseractBackend;
pub use vision::{DEFAULT_ENDPOINT, HttpReply, ReqwestTransport, VisionBackend, VisionTransport};

/// Crate-wide result type for setup code; per-image outcomes use [`Extraction`].
pub type OcrResult<T> = anyhow::Result<T>;
