use std::sync::{Arc, Mutex};

use image::{GrayImage, Luma};
use ocr::{
    BackendKind, ExtractionError, HttpReply, OcrConfig, OcrEngine, TesseractBackend,
    TesseractConfig, VisionBackend, VisionConfig, VisionTransport,
};

/// Transport returning a canned reply and remembering what it was sent.
struct FakeTransport {
    reply: Result<HttpReply, String>,
    seen: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
}

impl FakeTransport {
    fn replying(status: u16, body: &str) -> (Self, Arc<Mutex<Vec<(String, serde_json::Value)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let transport = Self {
            reply: Ok(HttpReply {
                status,
                body: body.to_string(),
            }),
            seen: seen.clone(),
        };
        (transport, seen)
    }
}

impl VisionTransport for FakeTransport {
    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<HttpReply, String> {
        self.seen
            .lock()
            .expect("lock")
            .push((url.to_string(), body.clone()));
        self.reply.clone()
    }
}

fn vision_engine(status: u16, body: &str) -> (OcrEngine, Arc<Mutex<Vec<(String, serde_json::Value)>>>) {
    let (transport, seen) = FakeTransport::replying(status, body);
    let config = VisionConfig::new(Some("test-key".into())).with_endpoint("https://vision.test/annotate");
    let backend = VisionBackend::new(config, Box::new(transport));
    (OcrEngine::with_backend(Box::new(backend)), seen)
}

#[test]
fn non_200_status_is_a_backend_error() {
    for status in [201u16, 400, 403, 429, 500] {
        let (engine, _) = vision_engine(status, r#"{"error":{"message":"quota"}}"#);
        let result = engine.recognize_bytes(b"\x89PNG fake");
        assert!(
            matches!(&result, Err(ExtractionError::BackendError(msg)) if msg.contains(&status.to_string())),
            "status {status} gave {result:?}"
        );
    }
}

#[test]
fn successful_reply_returns_first_annotation() {
    let (engine, seen) = vision_engine(
        200,
        r#"{"responses":[{"textAnnotations":[{"description":"Capítulo I\n"},{"description":"Capítulo"}]}]}"#,
    );
    assert_eq!(engine.recognize_bytes(b"jpeg"), Ok("Capítulo I\n".to_string()));

    let calls = seen.lock().expect("lock");
    assert_eq!(calls.len(), 1);
    let (url, body) = &calls[0];
    assert_eq!(url, "https://vision.test/annotate?key=test-key");
    assert_eq!(body["requests"][0]["image"]["content"], "anBlZw==");
}

#[test]
fn binary_images_are_png_encoded_for_the_remote_backend() {
    let (engine, seen) = vision_engine(200, r#"{"responses":[{"textAnnotations":[{"description":"x"}]}]}"#);
    let mut binary = GrayImage::new(8, 8);
    binary.put_pixel(1, 1, Luma([245]));
    assert_eq!(engine.recognize_image(&binary), Ok("x".to_string()));

    let calls = seen.lock().expect("lock");
    let content = calls[0].1["requests"][0]["image"]["content"]
        .as_str()
        .expect("base64 string");
    // base64 of the PNG signature
    assert!(content.starts_with("iVBORw0KGgo"));
}

#[test]
fn transport_failures_are_backend_errors() {
    let transport = FakeTransport {
        reply: Err("connection reset".to_string()),
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let backend = VisionBackend::new(VisionConfig::new(Some("k".into())), Box::new(transport));
    let engine = OcrEngine::with_backend(Box::new(backend));
    assert_eq!(
        engine.recognize_bytes(b"img"),
        Err(ExtractionError::BackendError("connection reset".to_string()))
    );
}

#[test]
fn missing_api_key_is_unavailable_without_a_request() {
    let (transport, seen) = FakeTransport::replying(200, "{}");
    let backend = VisionBackend::new(VisionConfig::new(None), Box::new(transport));
    let engine = OcrEngine::with_backend(Box::new(backend));
    assert!(matches!(
        engine.recognize_bytes(b"img"),
        Err(ExtractionError::BackendUnavailable(_))
    ));
    assert!(seen.lock().expect("lock").is_empty());
}

#[test]
fn local_backend_reports_blank_pages_as_no_text() {
    let engine = OcrEngine::new(OcrConfig::new(BackendKind::Tesseract)).expect("engine builds");
    for value in [0u8, 255] {
        let blank = GrayImage::from_pixel(64, 48, Luma([value]));
        assert_eq!(engine.recognize_image(&blank), Err(ExtractionError::NoTextFound));
    }
}

// Needs a real tesseract install with Spanish data; run with:
// cargo test -p ocr -- --ignored
#[test]
#[ignore = "requires tesseract with the spa language pack"]
fn runs_tesseract_against_rendered_block() {
    let backend = TesseractBackend::new(TesseractConfig::default());
    assert!(backend.is_available(), "tesseract should be on PATH");

    // A solid bar is not text; tesseract may legitimately find nothing.
    let mut img = GrayImage::new(200, 60);
    for y in 25..35 {
        for x in 20..180 {
            img.put_pixel(x, y, Luma([245]));
        }
    }
    let engine = OcrEngine::with_backend(Box::new(backend));
    match engine.recognize_image(&img) {
        Ok(_) | Err(ExtractionError::NoTextFound) => {}
        Err(other) => panic!("tesseract run failed: {other}"),
    }
}
