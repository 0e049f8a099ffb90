//! Integration tests for `POST /upload`.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot` and a
//! scripted [`VisionModel`], so no network access or API key is needed.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use table2json::{
    router, AppState, ExtractError, InlinePayload, ServerConfig, StartupError, TableExtractor,
    VisionModel,
};
use tower::ServiceExt;

// ── Test helpers ─────────────────────────────────────────────────────────────

const BOUNDARY: &str = "----table2json-test-boundary";

/// What the scripted model answers.
#[derive(Clone)]
enum Script {
    /// Always this text.
    Fixed(String),
    /// A fenced JSON array with one record naming the decoded file content.
    Echo,
}

struct ScriptedModel {
    script: Script,
    calls: AtomicUsize,
}

#[async_trait]
impl VisionModel for ScriptedModel {
    async fn complete(&self, prompt: &str, payload: InlinePayload) -> Result<String, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(prompt.contains("JSON array"));
        match &self.script {
            Script::Fixed(text) => Ok(text.clone()),
            Script::Echo => {
                let bytes = STANDARD.decode(&payload.data).expect("payload is base64");
                let content = String::from_utf8_lossy(&bytes).to_string();
                // Let concurrent requests overlap inside the model call.
                tokio::time::sleep(Duration::from_millis(25)).await;
                let rows = json!([{ "source": content, "mimeType": payload.mime_type }]);
                Ok(format!("```json\n{rows}\n```"))
            }
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

struct Harness {
    app: Router,
    model: Arc<ScriptedModel>,
    uploads: tempfile::TempDir,
}

impl Harness {
    fn new(script: Script) -> Self {
        Self::with_limit(script, table2json::config::DEFAULT_MAX_UPLOAD_BYTES)
    }

    fn with_limit(script: Script, limit: usize) -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel {
            script,
            calls: AtomicUsize::new(0),
        });
        let config = ServerConfig::builder()
            .uploads_dir(uploads.path())
            .max_upload_bytes(limit)
            .build()
            .unwrap();
        let extractor = TableExtractor::new(model.clone());
        let app = router(AppState::new(config, extractor));
        Self {
            app,
            model,
            uploads,
        }
    }

    fn calls(&self) -> usize {
        self.model.calls.load(Ordering::SeqCst)
    }

    fn stored_files(&self) -> Vec<String> {
        list_dir(self.uploads.path())
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

struct Part<'a> {
    name: &'a str,
    filename: Option<&'a str>,
    content_type: Option<&'a str>,
    body: &'a [u8],
}

fn file_part<'a>(filename: &'a str, content_type: &'a str, body: &'a [u8]) -> Part<'a> {
    Part {
        name: "file",
        filename: Some(filename),
        content_type: Some(content_type),
        body,
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(f) = part.filename {
            disposition.push_str(&format!("; filename=\"{f}\""));
        }
        out.extend_from_slice(disposition.as_bytes());
        out.extend_from_slice(b"\r\n");
        if let Some(ct) = part.content_type {
            out.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(part.body);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    out
}

fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

// ── Success path ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn image_upload_returns_records() {
    let rows = r#"[{"frontLabor":"1910_OB6_TJ-650","tonnage":320},{"frontLabor":"1880_OB2","tonnage":95}]"#;
    let h = Harness::new(Script::Fixed(rows.to_string()));

    let (status, body) = h
        .send(upload_request(&[file_part("sheet.png", "image/png", b"png-bytes")]))
        .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["originalname"], json!("sheet.png"));
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(body["recordsExtracted"], json!(data.len()));
    assert_eq!(data[0]["frontLabor"], json!("1910_OB6_TJ-650"));
    assert_eq!(h.calls(), 1);

    // Stored as <epoch-ms>-<random>-<original> in the uploads directory.
    let filename = body["filename"].as_str().unwrap();
    assert_eq!(h.stored_files(), vec![filename.to_string()]);
    let mut pieces = filename.splitn(3, '-');
    assert!(pieces.next().unwrap().parse::<i64>().is_ok());
    assert!(pieces.next().unwrap().parse::<u32>().is_ok());
    assert_eq!(pieces.next().unwrap(), "sheet.png");
    assert_eq!(
        std::fs::read(h.uploads.path().join(filename)).unwrap(),
        b"png-bytes"
    );
}

#[tokio::test]
async fn pdf_upload_is_accepted() {
    let h = Harness::new(Script::Echo);
    let (status, body) = h
        .send(upload_request(&[file_part(
            "report.pdf",
            "application/pdf",
            b"%PDF-1.7 rows",
        )]))
        .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["data"][0]["source"], json!("%PDF-1.7 rows"));
    assert_eq!(body["data"][0]["mimeType"], json!("application/pdf"));
}

#[tokio::test]
async fn empty_array_is_success() {
    let h = Harness::new(Script::Fixed("[]".into()));
    let (status, body) = h
        .send(upload_request(&[file_part("blank.jpg", "image/jpeg", b"jpg")]))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recordsExtracted"], json!(0));
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn fenced_and_unfenced_replies_give_same_data() {
    let rows = r#"[{"frontLabor":"1910_OB6_TJ-650","tonnage":320}]"#;
    let plain = Harness::new(Script::Fixed(rows.to_string()));
    let fenced = Harness::new(Script::Fixed(format!("```json\n{rows}\n```\n")));

    let (s1, b1) = plain
        .send(upload_request(&[file_part("a.png", "image/png", b"x")]))
        .await;
    let (s2, b2) = fenced
        .send(upload_request(&[file_part("a.png", "image/png", b"x")]))
        .await;

    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(b1["data"], b2["data"]);
}

#[tokio::test]
async fn text_fields_are_ignored() {
    let h = Harness::new(Script::Fixed("[]".into()));
    let (status, _) = h
        .send(upload_request(&[
            Part {
                name: "note",
                filename: None,
                content_type: None,
                body: b"night shift",
            },
            file_part("a.png", "image/png", b"x"),
        ]))
        .await;
    assert_eq!(status, StatusCode::OK);
}

// ── Validation (400) ─────────────────────────────────────────────────────────

#[tokio::test]
async fn unsupported_type_is_rejected_without_model_call() {
    let h = Harness::new(Script::Echo);
    let (status, body) = h
        .send(upload_request(&[file_part("rows.csv", "text/csv", b"a,b\n1,2")]))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("text/csv"));
    assert_eq!(h.calls(), 0);
    assert!(h.stored_files().is_empty());
}

#[tokio::test]
async fn missing_content_type_is_rejected() {
    let h = Harness::new(Script::Echo);
    let (status, _) = h
        .send(upload_request(&[Part {
            name: "file",
            filename: Some("mystery.bin"),
            content_type: None,
            body: b"??",
        }]))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.calls(), 0);
}

#[tokio::test]
async fn oversize_file_is_rejected_before_extraction() {
    let h = Harness::new(Script::Echo);
    let big = vec![0u8; 10 * 1024 * 1024 + 1];
    let (status, body) = h
        .send(upload_request(&[file_part("huge.png", "image/png", &big)]))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
    assert!(body["error"].as_str().unwrap().contains("too large"));
    assert_eq!(h.calls(), 0);
    assert!(h.stored_files().is_empty());
}

#[tokio::test]
async fn file_at_exact_limit_is_accepted() {
    let h = Harness::with_limit(Script::Fixed("[]".into()), 1024);
    let exact = vec![7u8; 1024];
    let (status, _) = h
        .send(upload_request(&[file_part("edge.png", "image/png", &exact)]))
        .await;
    assert_eq!(status, StatusCode::OK);

    let over = vec![7u8; 1025];
    let (status, body) = h
        .send(upload_request(&[file_part("edge.png", "image/png", &over)]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("The file is too large (max. 1 KB)"));
    assert_eq!(h.calls(), 1);
}

#[tokio::test]
async fn large_text_field_does_not_count_against_file_limit() {
    let h = Harness::with_limit(Script::Fixed("[]".into()), 1024);
    let note = vec![b'n'; 70 * 1024];
    let (status, body) = h
        .send(upload_request(&[
            Part {
                name: "note",
                filename: None,
                content_type: None,
                body: &note,
            },
            file_part("tiny.png", "image/png", b"ok"),
        ]))
        .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(h.calls(), 1);
}

#[tokio::test]
async fn oversized_text_field_is_not_reported_as_large_file() {
    let h = Harness::with_limit(Script::Fixed("[]".into()), 1024);
    let note = vec![b'n'; table2json::server::FORM_FIELDS_ALLOWANCE + 4096];
    let (status, body) = h
        .send(upload_request(&[
            Part {
                name: "note",
                filename: None,
                content_type: None,
                body: &note,
            },
            file_part("tiny.png", "image/png", b"ok"),
        ]))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("request body is too large"), "got: {error}");
    assert_eq!(h.calls(), 0);
    assert!(h.stored_files().is_empty());
}

#[tokio::test]
async fn missing_file_is_rejected() {
    let h = Harness::new(Script::Echo);
    let (status, body) = h
        .send(upload_request(&[Part {
            name: "note",
            filename: None,
            content_type: None,
            body: b"no file here",
        }]))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("No file"));
    assert!(body.get("data").is_none());
    assert_eq!(h.calls(), 0);
}

#[tokio::test]
async fn second_file_is_rejected() {
    let h = Harness::new(Script::Echo);
    let (status, _) = h
        .send(upload_request(&[
            file_part("a.png", "image/png", b"a"),
            file_part("b.png", "image/png", b"b"),
        ]))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.calls(), 0);
}

#[tokio::test]
async fn file_under_other_field_is_rejected() {
    let h = Harness::new(Script::Echo);
    let (status, body) = h
        .send(upload_request(&[Part {
            name: "image",
            filename: Some("a.png"),
            content_type: Some("image/png"),
            body: b"a",
        }]))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("image"));
}

#[tokio::test]
async fn non_multipart_body_is_rejected() {
    let h = Harness::new(Script::Echo);
    let req = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"file": "nope"}"#))
        .unwrap();
    let (status, body) = h.send(req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(h.calls(), 0);
}

// ── Extraction failures (500) ────────────────────────────────────────────────

#[tokio::test]
async fn non_json_reply_is_500_without_data() {
    let h = Harness::new(Script::Fixed("Sorry, I can't read that table.".into()));
    let (status, body) = h
        .send(upload_request(&[file_part("sheet.jpg", "image/jpeg", b"jpg")]))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], json!(table2json::error::EXTRACTION_FAILED));
    let details = body["details"].as_str().unwrap();
    assert!(details.starts_with(table2json::error::EXTRACTION_FAILED), "got: {details}");
    assert!(details.contains("not valid JSON"));
    assert!(body.get("data").is_none());

    // The upload is not rolled back.
    assert_eq!(h.stored_files().len(), 1);
}

#[tokio::test]
async fn json_object_reply_is_500() {
    let h = Harness::new(Script::Fixed(r#"{"rows": []}"#.into()));
    let (status, body) = h
        .send(upload_request(&[file_part("sheet.jpg", "image/jpeg", b"jpg")]))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn model_failure_is_500_with_details() {
    struct Down;

    #[async_trait]
    impl VisionModel for Down {
        async fn complete(&self, _: &str, _: InlinePayload) -> Result<String, ExtractError> {
            Err(ExtractError::ModelCall {
                model: "down".into(),
                message: "429 Resource exhausted".into(),
            })
        }

        fn model(&self) -> &str {
            "down"
        }
    }

    let uploads = tempfile::tempdir().unwrap();
    let config = ServerConfig::builder()
        .uploads_dir(uploads.path())
        .build()
        .unwrap();
    let app = router(AppState::new(config, TableExtractor::new(Arc::new(Down))));

    let resp = app
        .oneshot(upload_request(&[file_part("s.png", "image/png", b"x")]))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["details"].as_str().unwrap().contains("429"));
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_do_not_mix() {
    let h = Harness::new(Script::Echo);

    let requests = (0..8).map(|i| {
        let app = h.app.clone();
        let content = format!("sheet number {i}");
        tokio::spawn(async move {
            let req = upload_request(&[file_part("s.png", "image/png", content.as_bytes())]);
            let resp = app.oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
                .await
                .unwrap();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            (content, body)
        })
    });
    let handles: Vec<_> = requests.collect();

    for handle in handles {
        let (content, body) = handle.await.unwrap();
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["source"], json!(content));
    }
    assert_eq!(h.calls(), 8);
    assert_eq!(h.stored_files().len(), 8);
}

// ── Misc routes & startup ────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_ok() {
    let h = Harness::new(Script::Echo);
    let resp = h
        .app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_credential_prevents_binding() {
    // Grab a free port, release it, and ask the server to use it.
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);

    let dir = tempfile::tempdir().unwrap();
    let uploads = dir.path().join("uploads");
    let config = ServerConfig::builder()
        .host("127.0.0.1")
        .port(port)
        .uploads_dir(&uploads)
        .api_key_var("TABLE2JSON_TEST_KEY_THAT_IS_NEVER_SET")
        .build()
        .unwrap();

    let err = table2json::run(config).await.unwrap_err();
    assert!(matches!(err, StartupError::MissingCredential { ref var } if var == "TABLE2JSON_TEST_KEY_THAT_IS_NEVER_SET"));

    // Nothing was bound and nothing was created.
    assert!(std::net::TcpListener::bind(("127.0.0.1", port)).is_ok());
    assert!(!uploads.exists());
}
