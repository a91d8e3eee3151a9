use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::OcrResult;
use crate::config::{BackendKind, VisionConfig};
use crate::engine::{InputPreference, OcrBackend, OcrInput};
use crate::result::{Extraction, ExtractionError, non_empty};

/// Public `images:annotate` endpoint of Google Cloud Vision.
pub const DEFAULT_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Status and body of an HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Moves a JSON request to the Vision endpoint and returns the raw reply.
///
/// `Err` is reserved for transport failures (DNS, TLS, connection reset); any
/// reply with a status code, successful or not, is `Ok`.
pub trait VisionTransport: Send {
    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<HttpReply, String>;
}

/// Blocking transport over `reqwest`. No timeout or retry is configured.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> OcrResult<Self> {
        let client = reqwest::blocking::Client::builder().build()?;
        Ok(Self { client })
    }
}

impl VisionTransport for ReqwestTransport {
    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<HttpReply, String> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .map_err(|err| format!("request failed: {}", err.without_url()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| format!("failed to read response body: {}", err.without_url()))?;
        Ok(HttpReply { status, body })
    }
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

/// Remote OCR through Google Cloud Vision `TEXT_DETECTION`.
///
/// The first text annotation of the first response holds the full page text;
/// the remaining annotations are per-word and ignored.
pub struct VisionBackend {
    config: VisionConfig,
    transport: Box<dyn VisionTransport>,
}

impl VisionBackend {
    pub fn new(config: VisionConfig, transport: Box<dyn VisionTransport>) -> Self {
        Self { config, transport }
    }

    /// JSON body for a single-image text detection request.
    pub fn request_body(image_bytes: &[u8]) -> serde_json::Value {
        json!({
            "requests": [{
                "image": { "content": STANDARD.encode(image_bytes) },
                "features": [{ "type": "TEXT_DETECTION" }],
            }]
        })
    }

    /// Pull the full text out of an `images:annotate` reply body.
    pub fn parse_reply(body: &str) -> Extraction {
        let parsed: AnnotateResponse = serde_json::from_str(body).map_err(|err| {
            ExtractionError::BackendError(format!("malformed Vision response: {err}"))
        })?;
        let Some(first) = parsed.responses.into_iter().next() else {
            return Err(ExtractionError::NoTextFound);
        };
        if let Some(status) = first.error {
            return Err(ExtractionError::BackendError(format!(
                "Vision error {}: {}",
                status.code, status.message
            )));
        }
        match first.text_annotations.into_iter().next() {
            Some(annotation) => non_empty(annotation.description),
            None => Err(ExtractionError::NoTextFound),
        }
    }
}

impl OcrBackend for VisionBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::GoogleVision
    }

    fn preferred_input(&self) -> InputPreference {
        InputPreference::Source
    }

    fn extract(&self, input: OcrInput<'_>) -> Extraction {
        let Some(api_key) = self.config.api_key() else {
            return Err(ExtractionError::BackendUnavailable(
                "GOOGLE_API_KEY is not set".to_string(),
            ));
        };

        let encoded;
        let bytes = match input {
            OcrInput::Encoded(bytes) => bytes,
            OcrInput::Binary(binary) => {
                let mut buffer = Cursor::new(Vec::new());
                binary
                    .write_to(&mut buffer, ImageFormat::Png)
                    .map_err(|err| {
                        ExtractionError::BackendError(format!("failed to encode image: {err}"))
                    })?;
                encoded = buffer.into_inner();
                encoded.as_slice()
            }
        };

        let body = Self::request_body(bytes);
        let url = format!("{}?key={}", self.config.endpoint(), api_key);
        debug!(len = bytes.len(), endpoint = self.config.endpoint(), "calling Vision API");

        let reply = self
            .transport
            .post_json(&url, &body)
            .map_err(ExtractionError::BackendError)?;

        if reply.status != 200 {
            warn!(status = reply.status, "Vision API returned an error status");
            return Err(ExtractionError::BackendError(format!(
                "HTTP {} - {}",
                reply.status,
                reply.body.trim()
            )));
        }

        Self::parse_reply(&reply.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_annotate_schema() {
        let body = VisionBackend::request_body(b"abc");
        assert_eq!(body["requests"][0]["image"]["content"], "YWJj");
        assert_eq!(body["requests"][0]["features"][0]["type"], "TEXT_DETECTION");
        assert_eq!(body["requests"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["requests"][0]["features"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn first_annotation_is_the_full_text() {
        let body = r#"{"responses":[{"textAnnotations":[
            {"description":"Hola mundo\nAdiós"},
            {"description":"Hola"}
        ]}]}"#;
        assert_eq!(
            VisionBackend::parse_reply(body),
            Ok("Hola mundo\nAdiós".to_string())
        );
    }

    #[test]
    fn missing_annotations_mean_no_text() {
        assert_eq!(
            VisionBackend::parse_reply(r#"{"responses":[{}]}"#),
            Err(ExtractionError::NoTextFound)
        );
        assert_eq!(
            VisionBackend::parse_reply(r#"{"responses":[]}"#),
            Err(ExtractionError::NoTextFound)
        );
        assert_eq!(
            VisionBackend::parse_reply("{}"),
            Err(ExtractionError::NoTextFound)
        );
    }

    #[test]
    fn per_image_errors_and_garbage_are_backend_errors() {
        let body = r#"{"responses":[{"error":{"code":3,"message":"Bad image data."}}]}"#;
        assert!(matches!(
            VisionBackend::parse_reply(body),
            Err(ExtractionError::BackendError(msg)) if msg.contains("Bad image data.")
        ));
        assert!(matches!(
            VisionBackend::parse_reply("<html>"),
            Err(ExtractionError::BackendError(_))
        ));
    }
}
