
use image::GrayImage;
use tracing::debug;

use crate::OcrResult;
use crate::config::{BackendKind, OcrConfig};
use crate::result::Extraction;
use crate::tesseract::TesseractBackend;
use crate::vision::{ReqwestTransport, VisionBackend};

/// What a backend is handed to read.
#[derive(Debug, Clone, Copy)]
pub enum OcrInput<'a> {
    /// A preprocessed two-level image held in memory.
    Binary(&'a GrayImage),
    /// Encoded image file bytes (PNG, JPEG, ...), untouched.
    Encoded(&'a [u8]),
}

/// Which input a backend reads best.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPreference {
    /// Run the preprocessing transform first and pass the binary image.
    Preprocessed,
    /// Pass the source bytes as they are on disk.
    Source,
}

/// Capability shared by every OCR backend.
pub trait OcrBackend: Send {
    fn kind(&self) -> BackendKind;

    fn preferred_input(&self) -> InputPreference;

    /// Recognize all text in `input`.
    fn extract(&self, input: OcrInput<'_>) -> Extraction;
}

/// High-level OCR engine holding the configured backend.
///
/// Built once per run and reused for every image, so the HTTP client (or any
/// other per-backend state) is only set up a single time.
pub struct OcrEngine {
    backend: Box<dyn OcrBackend>,
}

impl OcrEngine {
    /// Build the backend selected in `config`.
    pub fn new(config: OcrConfig) -> OcrResult<Self> {
        let backend: Box<dyn OcrBackend> = match config.backend {
            BackendKind::Tesseract => Box::new(TesseractBackend::new(config.tesseract)),
            BackendKind::GoogleVision => {
                let transport = ReqwestTransport::new()?;
                Box::new(VisionBackend::new(config.vision, Box::new(transport)))
            }
        };
        Ok(Self::with_backend(backend))
    }

    /// Wrap an already constructed backend.
    pub fn with_backend(backend: Box<dyn OcrBackend>) -> Self {
        Self { backend }
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn preferred_input(&self) -> InputPreference {
        self.backend.preferred_input()
    }

    /// Run OCR on a preprocessed binary image.
    pub fn recognize_image(&self, binary: &GrayImage) -> Extraction {
        debug!(
            backend = %self.kind(),
            width = binary.width(),
            height = binary.height(),
            "recognizing binary image"
        );
        self.backend.extract(OcrInput::Binary(binary))
    }

    /// Run OCR on encoded image bytes.
    pub fn recognize_bytes(&self, bytes: &[u8]) -> Extraction {
        debug!(backend = %self.kind(), len = bytes.len(), "recognizing encoded image");
        self.backend.extract(OcrInput::Encoded(bytes))
    }
}
