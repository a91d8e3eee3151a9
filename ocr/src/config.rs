use std::fmt;
use std::path::PathBuf;

use crate::vision::DEFAULT_ENDPOINT;

/// Which OCR backend a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Local Tesseract executable.
    #[default]
    Tesseract,
    /// Google Cloud Vision `TEXT_DETECTION`.
    GoogleVision,
}

impl BackendKind {
    /// `--use_google_vision` style switch.
    pub fn from_flag(use_google_vision: bool) -> Self {
        if use_google_vision {
            Self::GoogleVision
        } else {
            Self::Tesseract
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tesseract => f.write_str("tesseract"),
            Self::GoogleVision => f.write_str("google-vision"),
        }
    }
}

/// Tunable parameters of the local Tesseract engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TesseractConfig {
    /// Executable name or path.
    pub binary: PathBuf,
    /// Trained language model (`-l`), e.g. `spa`.
    pub language: String,
    /// Page segmentation mode (`--psm`); 6 assumes a single uniform block of text.
    pub psm: u8,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "spa".to_string(),
            psm: 6,
        }
    }
}

/// Endpoint and credentials for the remote Vision API.
#[derive(Clone, PartialEq, Eq)]
pub struct VisionConfig {
    endpoint: String,
    api_key: Option<String>,
}

impl VisionConfig {
    /// Create a configuration against the public endpoint.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    /// Point at a different `images:annotate` endpoint (proxies, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self::new(None)
    }
}

// Keeps the key out of logs.
impl fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Everything needed to build an [`crate::OcrEngine`].
#[derive(Debug, Clone, Default)]
pub struct OcrConfig {
    pub backend: BackendKind,
    pub tesseract: TesseractConfig,
    pub vision: VisionConfig,
}

impl OcrConfig {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    pub fn with_tesseract(mut self, tesseract: TesseractConfig) -> Self {
        self.tesseract = tesseract;
        self
    }

    pub fn with_vision(mut self, vision: VisionConfig) -> Self {
        self.vision = vision;
        self
    }
}
