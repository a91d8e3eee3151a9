/// Why an extraction produced no text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// The backend ran but returned nothing but whitespace.
    #[error("no text was extracted")]
    NoTextFound,
    /// The backend could not be reached at all (binary missing, no credentials).
    #[error("OCR backend unavailable: {0}")]
    BackendUnavailable(String),
    /// The backend was reached and failed.
    #[error("OCR backend error: {0}")]
    BackendError(String),
}

/// Outcome of a single OCR call: the full recognized text or a classified failure.
pub type Extraction = Result<String, ExtractionError>;

/// Classify raw backend output, treating whitespace-only text as [`ExtractionError::NoTextFound`].
pub fn non_empty(text: impl Into<String>) -> Extraction {
    let text = text.into();
    if text.trim().is_empty() {
        Err(ExtractionError::NoTextFound)
    } else {
        Ok(text)
    }
}
