//! Router-level tests for the HTTP façade.
//!
//! Requests are driven through `tower::ServiceExt::oneshot` against a router
//! backed by a scripted OCR engine, so no `tesseract` install is needed.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use futures::future::BoxFuture;
use futures::FutureExt;
use profile_ocr::{
    router, AppState, CorsPolicy, OcrEngine, ProfileOcrError, ServiceConfig, UploadedImage,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const BOUNDARY: &str = "----profile-ocr-test-boundary";

const JANE: &str = "Jane Doe\nTraveler\nFoodie\n1234 Followers\n56 Following\nMumbai, India\n";

// ── Test helpers ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Script {
    Text(&'static str),
    Fail(&'static str),
    Hang,
    Panic,
}

struct ScriptedEngine {
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
    seen_language: std::sync::Mutex<Option<String>>,
}

impl ScriptedEngine {
    fn new(script: Script) -> Arc<Self> {
        Self::with_delay(script, Duration::ZERO)
    }

    fn with_delay(script: Script, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script,
            delay,
            calls: AtomicUsize::new(0),
            seen_language: std::sync::Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn recognize<'a>(
        &'a self,
        image: &'a UploadedImage,
        language: &'a str,
    ) -> BoxFuture<'a, Result<String, ProfileOcrError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_language.lock().unwrap() = Some(language.to_string());
        assert!(!image.is_empty());
        async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.script {
                Script::Text(t) => Ok(t.to_string()),
                Script::Fail(m) => Err(ProfileOcrError::ocr(m)),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(String::new())
                }
                Script::Panic => panic!("engine exploded"),
            }
        }
        .boxed()
    }
}

fn test_config() -> ServiceConfig {
    ServiceConfig::builder()
        .max_upload_bytes(1024)
        .ocr_timeout(Duration::from_millis(200))
        .build()
        .unwrap()
}

fn app(engine: &Arc<ScriptedEngine>, config: ServiceConfig) -> Router {
    router(AppState::new(engine.clone(), config))
}

struct Part<'a> {
    name: &'a str,
    file_name: Option<&'a str>,
    content_type: Option<&'a str>,
    data: &'a [u8],
}

fn file_part<'a>(content_type: &'a str, data: &'a [u8]) -> Part<'a> {
    Part {
        name: "screenshot",
        file_name: Some("profile.png"),
        content_type: Some(content_type),
        data,
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for p in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", p.name);
        if let Some(f) = p.file_name {
            disposition.push_str(&format!("; filename=\"{f}\""));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(ct) = p.content_type {
            body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(p.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("non-JSON body ({e}): {}", String::from_utf8_lossy(&bytes)));
    (status, json)
}

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n-not-really-a-png";

// ── Liveness ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_healthy_with_timestamp() {
    let engine = ScriptedEngine::new(Script::Text(""));
    for uri in ["/", "/health"] {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        let (status, json) = send(app(&engine, test_config()), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        let ts = json["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok(), "bad timestamp {ts}");
    }
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let engine = ScriptedEngine::new(Script::Text(""));
    let req = Request::get("/nope").body(Body::empty()).unwrap();
    let (status, json) = send(app(&engine, test_config()), req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Not found");
}

#[tokio::test]
async fn wrong_method_is_json_405() {
    let engine = ScriptedEngine::new(Script::Text(JANE));
    for (method, uri) in [(Method::POST, "/"), (Method::GET, "/upload"), (Method::DELETE, "/health")] {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(app(&engine, test_config()), req).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{uri}");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Method not allowed");
    }
    assert_eq!(engine.calls(), 0);
}

// ── Successful uploads ───────────────────────────────────────────────────────

#[tokio::test]
async fn upload_returns_profile_record() {
    let engine = ScriptedEngine::new(Script::Text(JANE));
    let req = upload_request("/upload", &[file_part("image/png", PNG)]);
    let (status, json) = send(app(&engine, test_config()), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(json.get("error").is_none());
    let data = &json["data"];
    assert_eq!(data["name"], "Jane Doe");
    assert_eq!(data["bio"], "Traveler Foodie");
    assert!(data["followers"].as_str().unwrap().contains("Followers"));
    assert!(data["following"].as_str().unwrap().contains("Following"));
    assert!(data["guessLocation"].as_str().unwrap().contains("India"));
    assert_eq!(engine.calls(), 1);
    assert_eq!(engine.seen_language.lock().unwrap().as_deref(), Some("eng"));
}

#[tokio::test]
async fn api_alias_behaves_like_upload() {
    let engine = ScriptedEngine::new(Script::Text("Sam\nBaker"));
    let req = upload_request("/api/upload", &[file_part("image/jpeg", PNG)]);
    let (status, json) = send(app(&engine, test_config()), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "Sam");
    assert_eq!(json["data"]["bio"], "Baker");
    assert_eq!(json["data"]["followers"], "");
}

#[tokio::test]
async fn other_fields_are_ignored() {
    let engine = ScriptedEngine::new(Script::Text("Sam"));
    let parts = [
        Part {
            name: "note",
            file_name: None,
            content_type: None,
            data: b"hello",
        },
        file_part("image/png", PNG),
    ];
    let (status, _) = send(app(&engine, test_config()), upload_request("/upload", &parts)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn configured_language_reaches_engine() {
    let engine = ScriptedEngine::new(Script::Text("x"));
    let config = ServiceConfig::builder().language("eng+hin").build().unwrap();
    let req = upload_request("/upload", &[file_part("image/png", PNG)]);
    let (status, _) = send(app(&engine, config), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(engine.seen_language.lock().unwrap().as_deref(), Some("eng+hin"));
}

#[tokio::test]
async fn concurrent_uploads_are_independent() {
    let engine = ScriptedEngine::with_delay(Script::Text(JANE), Duration::from_millis(50));
    let router = app(&engine, test_config());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let router = router.clone();
            tokio::spawn(async move {
                send(router, upload_request("/upload", &[file_part("image/png", PNG)])).await
            })
        })
        .collect();

    for h in handles {
        let (status, json) = h.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["name"], "Jane Doe");
    }
    assert_eq!(engine.calls(), 8);
}

// ── Intake failures ──────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_file_field_is_400_without_engine_call() {
    let engine = ScriptedEngine::new(Script::Text(JANE));
    let parts = [Part {
        name: "avatar",
        file_name: Some("a.png"),
        content_type: Some("image/png"),
        data: PNG,
    }];
    let (status, json) = send(app(&engine, test_config()), upload_request("/upload", &parts)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "No file uploaded");
    assert!(json.get("data").is_none());
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn non_multipart_body_is_missing_file() {
    let engine = ScriptedEngine::new(Script::Text(JANE));
    let req = Request::post("/upload").body(Body::empty()).unwrap();
    let (status, json) = send(app(&engine, test_config()), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file uploaded");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn empty_file_part_is_missing_file() {
    let engine = ScriptedEngine::new(Script::Text(JANE));
    let parts = [Part {
        name: "screenshot",
        file_name: Some(""),
        content_type: Some("application/octet-stream"),
        data: b"",
    }];
    let (status, json) = send(app(&engine, test_config()), upload_request("/upload", &parts)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file uploaded");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn text_field_under_file_name_is_missing_file() {
    let engine = ScriptedEngine::new(Script::Text(JANE));
    let parts = [Part {
        name: "screenshot",
        file_name: None,
        content_type: None,
        data: b"hello",
    }];
    let (status, json) = send(app(&engine, test_config()), upload_request("/upload", &parts)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file uploaded");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn empty_non_image_file_is_missing_file() {
    let engine = ScriptedEngine::new(Script::Text(JANE));
    let parts = [Part {
        name: "screenshot",
        file_name: Some("a.txt"),
        content_type: Some("text/plain"),
        data: b"",
    }];
    let (status, json) = send(app(&engine, test_config()), upload_request("/upload", &parts)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file uploaded");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn empty_file_part_is_skipped_for_a_later_one() {
    let engine = ScriptedEngine::new(Script::Text(JANE));
    let parts = [
        Part {
            name: "screenshot",
            file_name: Some("empty.png"),
            content_type: Some("image/png"),
            data: b"",
        },
        file_part("image/png", PNG),
    ];
    let (status, json) = send(app(&engine, test_config()), upload_request("/upload", &parts)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "Jane Doe");
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn non_image_is_400_without_engine_call() {
    let engine = ScriptedEngine::new(Script::Text(JANE));
    let req = upload_request("/upload", &[file_part("text/plain", b"just text")]);
    let (status, json) = send(app(&engine, test_config()), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Only image files are allowed");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn oversized_file_is_400_without_engine_call() {
    let engine = ScriptedEngine::new(Script::Text(JANE));
    let big = vec![7u8; 2048];
    let req = upload_request("/upload", &[file_part("image/png", &big)]);
    let (status, json) = send(app(&engine, test_config()), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "File too large");
    assert!(json["details"].as_str().unwrap().contains("1024"));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn body_beyond_transport_limit_is_400() {
    let engine = ScriptedEngine::new(Script::Text(JANE));
    let config = test_config();
    let huge = vec![1u8; config.body_limit() + 1];
    let req = upload_request("/upload", &[file_part("image/png", &huge)]);
    let (status, json) = send(app(&engine, config), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "File too large");
    assert_eq!(engine.calls(), 0);
}

// ── Recognition failures ─────────────────────────────────────────────────────

#[tokio::test]
async fn engine_timeout_is_500_without_data() {
    let engine = ScriptedEngine::new(Script::Hang);
    let req = upload_request("/upload", &[file_part("image/png", PNG)]);
    let (status, json) = send(app(&engine, test_config()), req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Failed to process image");
    assert!(json["details"].as_str().unwrap().contains("timed out"));
    assert!(json.get("data").is_none());
}

#[tokio::test]
async fn engine_failure_is_500_with_details() {
    let engine = ScriptedEngine::new(Script::Fail("Error opening data file eng.traineddata"));
    let req = upload_request("/upload", &[file_part("image/png", PNG)]);
    let (status, json) = send(app(&engine, test_config()), req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Failed to process image");
    assert!(json["details"].as_str().unwrap().contains("eng.traineddata"));
    assert!(json.get("data").is_none());
}

#[tokio::test]
async fn handler_panic_is_json_500() {
    let engine = ScriptedEngine::new(Script::Panic);
    let req = upload_request("/upload", &[file_part("image/png", PNG)]);
    let (status, json) = send(app(&engine, test_config()), req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Internal server error");
}

// ── CORS ─────────────────────────────────────────────────────────────────────

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri("/upload")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn allow_listed_origin_gets_cors_headers() {
    let engine = ScriptedEngine::new(Script::Text(""));
    let resp = app(&engine, test_config())
        .oneshot(preflight("http://localhost:3001"))
        .await
        .unwrap();
    let headers = resp.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3001"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}

#[tokio::test]
async fn unknown_origin_gets_no_cors_headers() {
    let engine = ScriptedEngine::new(Script::Text(""));
    let resp = app(&engine, test_config())
        .oneshot(preflight("https://evil.example"))
        .await
        .unwrap();
    assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn wildcard_policy_allows_any_origin() {
    let engine = ScriptedEngine::new(Script::Text(""));
    let config = ServiceConfig::builder().cors(CorsPolicy::Any).build().unwrap();
    let resp = app(&engine, config)
        .oneshot(preflight("https://anywhere.example"))
        .await
        .unwrap();
    assert_eq!(
        resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}
