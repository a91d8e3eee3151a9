use std::io::{self, Write};
use std::path::Path;
use std::process::Command;

use image::ImageFormat;
use tracing::{debug, warn};

use crate::config::{BackendKind, TesseractConfig};
use crate::engine::{InputPreference, OcrBackend, OcrInput};
use crate::result::{Extraction, ExtractionError, non_empty};

/// Local OCR through the `tesseract` command-line tool.
///
/// The image is written to a scratch file and the recognized text is read from
/// stdout, so no native bindings are needed at build time.
pub struct TesseractBackend {
    config: TesseractConfig,
}

impl TesseractBackend {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TesseractConfig {
        &self.config
    }

    /// Whether the configured executable can be launched.
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.binary)
            .arg("--version")
            .output()
            .is_ok_and(|output| output.status.success())
    }

    fn run(&self, input_path: &Path) -> Extraction {
        let output = Command::new(&self.config.binary)
            .arg(input_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .arg("--psm")
            .arg(self.config.psm.to_string())
            .output()
            .map_err(|err| self.classify_spawn_error(err))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, "tesseract exited with failure");
            return Err(ExtractionError::BackendError(format!(
                "tesseract failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        // Every page ends with a form feed.
        let text = String::from_utf8_lossy(&output.stdout);
        non_empty(text.trim_end_matches('\u{c}'))
    }

    fn classify_spawn_error(&self, err: io::Error) -> ExtractionError {
        if err.kind() == io::ErrorKind::NotFound {
            ExtractionError::BackendUnavailable(format!(
                "{} is not installed or not in PATH",
                self.config.binary.display()
            ))
        } else {
            ExtractionError::BackendError(format!(
                "failed to run {}: {err}",
                self.config.binary.display()
            ))
        }
    }
}

impl OcrBackend for TesseractBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Tesseract
    }

    fn preferred_input(&self) -> InputPreference {
        InputPreference::Preprocessed
    }

    fn extract(&self, input: OcrInput<'_>) -> Extraction {
        let mut scratch = tempfile::Builder::new()
            .prefix("page-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|err| scratch_error(&err))?;

        match input {
            OcrInput::Binary(binary) => {
                if image_proc::is_uniform(binary) {
                    debug!("binary image is blank, skipping tesseract");
                    return Err(ExtractionError::NoTextFound);
                }
                binary
                    .save_with_format(scratch.path(), ImageFormat::Png)
                    .map_err(|err| {
                        ExtractionError::BackendError(format!("failed to encode image: {err}"))
                    })?;
            }
            OcrInput::Encoded(bytes) => {
                // Leptonica sniffs the real format; the suffix is cosmetic.
                scratch
                    .write_all(bytes)
                    .and_then(|_| scratch.flush())
                    .map_err(|err| scratch_error(&err))?;
            }
        }

        self.run(scratch.path())
    }
}

fn scratch_error(err: &io::Error) -> ExtractionError {
    ExtractionError::BackendError(format!("failed to prepare scratch image: {err}"))
}
