//! Integration tests for the analysis pipeline.
//!
//! The model service is mocked behind the `ModelClient` seam, so every test
//! here runs offline and deterministically: what is under test is the
//! pipeline's policy — encoding, validation, the state machine, and the
//! failure taxonomy — not any provider.

use async_trait::async_trait;
use doculens::batch::analyze_batch_with_client;
use doculens::{
    AnalysisConfig, AnalysisError, AnalysisPhase, AnalysisRequest, AnalysisResult, CropRect,
    DocumentInput, FailureKind, KeyFact, ModelClient, RawModelOutput, ToDoItem,
};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test doubles ─────────────────────────────────────────────────────────────

/// What the mock should do when invoked.
enum Reply {
    Json(&'static str),
    ServiceError,
    Timeout,
}

/// A scriptable stand-in for the model service.
struct MockClient {
    reply: Reply,
    delay: Duration,
    calls: AtomicUsize,
    last_request: Mutex<Option<AnalysisRequest>>,
}

impl MockClient {
    fn json(reply: &'static str) -> Arc<Self> {
        Arc::new(Self {
            reply: Reply::Json(reply),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn slow_json(reply: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Reply::Json(reply),
            delay,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn failing(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for MockClient {
    async fn invoke(&self, request: &AnalysisRequest) -> Result<RawModelOutput, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.reply {
            Reply::Json(text) => Ok(RawModelOutput {
                text: text.to_string(),
                input_tokens: 1500,
                output_tokens: 220,
                duration_ms: self.delay.as_millis() as u64,
            }),
            Reply::ServiceError => Err(AnalysisError::Service {
                detail: "HTTP 503 from provider".into(),
            }),
            Reply::Timeout => Err(AnalysisError::Timeout { secs: 60 }),
        }
    }
}

fn orchestrator_with(client: Arc<MockClient>) -> doculens::Orchestrator {
    doculens::Orchestrator::with_client(AnalysisConfig::default(), client)
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

/// A 2 MB "photo of a lease agreement": JPEG magic bytes plus filler.
fn lease_photo() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.resize(2 * 1024 * 1024, 0x42);
    bytes
}

/// A real (tiny) PNG for the crop pipeline.
fn capture_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        width,
        height,
        image::Rgba([200, 180, 40, 255]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("png encode");
    buf
}

const LEASE_REPLY: &str = r#"{
    "documentType": "Lease Agreement",
    "summary": "Twelve-month apartment lease for 123 Main St.",
    "keyFacts": [
        {"fact": "Monthly rent is $1,850", "citation": "Page 1, Section 3"}
    ],
    "risksAndFees": [],
    "toDoItems": [
        {"item": "Pay the security deposit", "deadline": "2023-08-01", "citation": "Page 2, Section 5"}
    ]
}"#;

const LEASE_REPLY_MISSING_CITATION: &str = r#"{
    "documentType": "Lease Agreement",
    "summary": "Twelve-month apartment lease for 123 Main St.",
    "keyFacts": [
        {"fact": "Monthly rent is $1,850"}
    ],
    "risksAndFees": [],
    "toDoItems": []
}"#;

fn expected_lease_result() -> AnalysisResult {
    AnalysisResult {
        document_type: "Lease Agreement".into(),
        summary: "Twelve-month apartment lease for 123 Main St.".into(),
        key_facts: vec![KeyFact {
            fact: "Monthly rent is $1,850".into(),
            citation: "Page 1, Section 3".into(),
        }],
        risks_and_fees: vec![],
        to_do_items: vec![ToDoItem {
            item: "Pay the security deposit".into(),
            deadline: Some("2023-08-01".into()),
            citation: "Page 2, Section 5".into(),
        }],
    }
}

// ── Success path ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn lease_photo_succeeds_with_exact_fields() {
    let client = MockClient::json(LEASE_REPLY);
    let orchestrator = orchestrator_with(client.clone());

    let outcome = orchestrator
        .analyze(&lease_photo(), "image/jpeg")
        .await
        .expect("analysis should succeed");

    assert_eq!(orchestrator.phase(), AnalysisPhase::Succeeded);
    assert_eq!(outcome.result, expected_lease_result());
    assert_eq!(outcome.stats.input_tokens, 1500);
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn request_carries_a_round_trippable_data_uri() {
    let client = MockClient::json(LEASE_REPLY);
    let orchestrator = orchestrator_with(client.clone());
    let photo = lease_photo();

    orchestrator
        .analyze(&photo, "image/jpeg")
        .await
        .expect("analysis should succeed");

    let request = client
        .last_request
        .lock()
        .unwrap()
        .clone()
        .expect("mock saw a request");
    assert!(doculens::contract::is_data_uri(&request.document_data_uri));
    assert!(request
        .document_data_uri
        .starts_with("data:image/jpeg;base64,"));

    let (mime, bytes) = doculens::contract::parse_data_uri(&request.document_data_uri).unwrap();
    assert_eq!(mime, "image/jpeg");
    assert_eq!(bytes, photo, "payload must decode to exactly the input bytes");
}

#[tokio::test]
async fn cropped_capture_succeeds() {
    let client = MockClient::json(LEASE_REPLY);
    let orchestrator = orchestrator_with(client.clone());

    let rect = CropRect {
        x: 4,
        y: 4,
        width: 24,
        height: 16,
    };
    let outcome = orchestrator
        .analyze_cropped(&capture_png(64, 48), "image/png", rect)
        .await
        .expect("cropped analysis should succeed");

    assert_eq!(outcome.result.document_type, "Lease Agreement");

    // The payload the model saw is the cropped PNG, not the original.
    let request = client.last_request.lock().unwrap().clone().unwrap();
    let (mime, bytes) = doculens::contract::parse_data_uri(&request.document_data_uri).unwrap();
    assert_eq!(mime, "image/png");
    let cropped = image::load_from_memory(&bytes).unwrap();
    assert_eq!((cropped.width(), cropped.height()), (24, 16));
}

// ── Failure taxonomy ─────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_citation_fails_with_schema_violation() {
    let client = MockClient::json(LEASE_REPLY_MISSING_CITATION);
    let orchestrator = orchestrator_with(client.clone());

    let err = orchestrator
        .analyze(&lease_photo(), "image/jpeg")
        .await
        .expect_err("missing citation must be rejected");

    assert_eq!(err.kind(), FailureKind::SchemaViolation);
    assert_eq!(
        orchestrator.phase(),
        AnalysisPhase::Failed(FailureKind::SchemaViolation)
    );
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn oversize_pdf_never_reaches_the_model() {
    let client = MockClient::json(LEASE_REPLY);
    let orchestrator = orchestrator_with(client.clone());

    // 50 MB against the default 10 MiB ceiling.
    let mut big = b"%PDF-1.7".to_vec();
    big.resize(50 * 1024 * 1024, 0);

    let err = orchestrator
        .analyze(&big, "application/pdf")
        .await
        .expect_err("oversize document must be rejected");

    assert_eq!(err.kind(), FailureKind::InvalidInput);
    assert!(matches!(err, AnalysisError::DocumentTooLarge { .. }));
    assert_eq!(
        orchestrator.phase(),
        AnalysisPhase::Failed(FailureKind::InvalidInput)
    );
    assert_eq!(client.calls(), 0, "no network call on local-validation failure");
}

#[tokio::test]
async fn degenerate_crop_never_reaches_the_model() {
    let client = MockClient::json(LEASE_REPLY);
    let orchestrator = orchestrator_with(client.clone());

    let rect = CropRect {
        x: 0,
        y: 0,
        width: 0,
        height: 10,
    };
    let err = orchestrator
        .analyze_cropped(&capture_png(32, 32), "image/png", rect)
        .await
        .expect_err("degenerate crop must be rejected");

    assert_eq!(err.kind(), FailureKind::InvalidInput);
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn service_error_is_a_retryable_terminal_failure() {
    let client = MockClient::failing(Reply::ServiceError);
    let orchestrator = orchestrator_with(client);

    let err = orchestrator
        .analyze(&lease_photo(), "image/jpeg")
        .await
        .expect_err("service error must surface");

    assert_eq!(err.kind(), FailureKind::Service);
    assert!(err.is_retryable());
    assert_eq!(
        orchestrator.phase(),
        AnalysisPhase::Failed(FailureKind::Service)
    );
}

#[tokio::test]
async fn timeout_is_logged_as_its_own_kind() {
    let client = MockClient::failing(Reply::Timeout);
    let orchestrator = orchestrator_with(client);

    let err = orchestrator
        .analyze(&lease_photo(), "image/jpeg")
        .await
        .expect_err("timeout must surface");

    assert_eq!(err.kind(), FailureKind::Timeout);
    assert!(err.is_retryable());
    assert_eq!(
        orchestrator.phase(),
        AnalysisPhase::Failed(FailureKind::Timeout)
    );
}

// ── Overlap rejection ────────────────────────────────────────────────────────

#[tokio::test]
async fn overlapping_analyze_is_rejected_and_first_is_unaffected() {
    let client = MockClient::slow_json(LEASE_REPLY, Duration::from_millis(200));
    let orchestrator = Arc::new(orchestrator_with(client));

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.analyze(&lease_photo(), "image/jpeg").await })
    };

    // Let the first request reach the model stage, then overlap it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(orchestrator.phase(), AnalysisPhase::Requesting);

    let err = orchestrator
        .analyze(&lease_photo(), "image/jpeg")
        .await
        .expect_err("second request must be rejected");
    assert!(matches!(err, AnalysisError::Busy));
    assert_eq!(err.kind(), FailureKind::Busy);

    // The rejection must not disturb the in-flight request.
    let outcome = first.await.unwrap().expect("first request must succeed");
    assert_eq!(outcome.result, expected_lease_result());
    assert_eq!(orchestrator.phase(), AnalysisPhase::Succeeded);
}

#[tokio::test]
async fn instance_is_reusable_after_terminal_state() {
    let client = MockClient::json(LEASE_REPLY);
    let orchestrator = orchestrator_with(client);

    assert!(orchestrator
        .analyze(&lease_photo(), "image/jpeg")
        .await
        .is_ok());
    assert!(orchestrator
        .analyze(&lease_photo(), "image/jpeg")
        .await
        .is_ok());
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_mixes_successes_and_failures_in_input_order() {
    let client: Arc<dyn ModelClient> = MockClient::json(LEASE_REPLY);
    let config = AnalysisConfig::default();

    let inputs = vec![
        DocumentInput {
            name: "lease.jpg".into(),
            bytes: lease_photo(),
            mime_type: "image/jpeg".into(),
        },
        DocumentInput {
            name: "notes.txt".into(),
            bytes: b"plain text".to_vec(),
            mime_type: "text/plain".into(),
        },
        DocumentInput {
            name: "tos.pdf".into(),
            bytes: b"%PDF-1.7 terms".to_vec(),
            mime_type: "application/pdf".into(),
        },
    ];

    let items = analyze_batch_with_client(inputs, &config, client, 3).await;

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].name, "lease.jpg");
    assert!(items[0].outcome.is_ok());
    assert_eq!(
        items[1].outcome.as_ref().unwrap_err().kind(),
        FailureKind::InvalidInput
    );
    assert!(items[2].outcome.is_ok());
}
