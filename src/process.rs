//! Request pipeline: drive one upload from intake to a [`ProfileRecord`].
//!
//! ```text
//! Received ──▶ Validated ──▶ Recognizing ──▶ Extracting ──▶ Responded
//! ```
//!
//! Any stage before `Responded` can end the request in `Failed(kind)`.
//! Intake failures are raised before the engine is called. Requests share
//! nothing but the immutable config and the engine handle.

use crate::config::ServiceConfig;
use crate::error::ProfileOcrError;
use crate::observer::{RequestStage, SharedObserver};
use crate::pipeline::extract::{self, ProfileRecord};
use crate::pipeline::intake::{self, UploadedImage};
use crate::pipeline::ocr::OcrEngine;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Tracks the stage of a single request and reports transitions.
pub struct RequestTracker {
    id: u64,
    stage: RequestStage,
    started: Instant,
    observer: Option<SharedObserver>,
}

impl RequestTracker {
    /// Begin a request in the `Received` stage.
    pub fn start(config: &ServiceConfig) -> Self {
        let tracker = Self {
            id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            stage: RequestStage::Received,
            started: Instant::now(),
            observer: config.observer.clone(),
        };
        tracker.notify();
        tracker
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn stage(&self) -> RequestStage {
        self.stage
    }

    fn advance(&mut self, stage: RequestStage) {
        debug_assert!(!self.stage.is_terminal(), "request {} already finished", self.id);
        debug!("Request {}: {} → {}", self.id, self.stage, stage);
        self.stage = stage;
        self.notify();
    }

    fn notify(&self) {
        if let Some(ref obs) = self.observer {
            obs.on_stage(self.id, self.stage);
        }
    }

    /// Move to `Failed(kind)` and hand the error back for propagation.
    pub fn fail(mut self, err: ProfileOcrError) -> ProfileOcrError {
        let kind = err.kind();
        if kind.is_intake() {
            info!("Request {}: rejected upload: {}", self.id, err);
        } else {
            warn!(
                "Request {}: failed after {}ms: {}",
                self.id,
                self.started.elapsed().as_millis(),
                err
            );
        }
        self.advance(RequestStage::Failed(kind));
        if let Some(ref obs) = self.observer {
            obs.on_failed(kind, &err.to_string());
        }
        err
    }
}

/// Validate, recognize and extract a single upload.
///
/// `upload` is `None` when the form carried no file.
pub async fn process_upload(
    engine: &dyn OcrEngine,
    config: &ServiceConfig,
    upload: Option<UploadedImage>,
) -> Result<ProfileRecord, ProfileOcrError> {
    run(RequestTracker::start(config), engine, config, upload).await
}

/// Continue a request that has already been received by `tracker`.
pub async fn run(
    mut tracker: RequestTracker,
    engine: &dyn OcrEngine,
    config: &ServiceConfig,
    upload: Option<UploadedImage>,
) -> Result<ProfileRecord, ProfileOcrError> {
    // ── Step 1: Validate ─────────────────────────────────────────────────
    let image = match intake::validate(upload, config.max_upload_bytes) {
        Ok(image) => image,
        Err(e) => return Err(tracker.fail(e)),
    };
    tracker.advance(RequestStage::Validated);
    info!(
        "Request {}: accepted {} ({} bytes)",
        tracker.id(),
        image.file_name.as_deref().unwrap_or("<unnamed>"),
        image.len()
    );

    // ── Step 2: Recognize ────────────────────────────────────────────────
    tracker.advance(RequestStage::Recognizing);
    let ocr_start = Instant::now();
    let text = match recognize_with_timeout(engine, &image, &config.language, config.ocr_timeout)
        .await
    {
        Ok(text) => text,
        Err(e) => return Err(tracker.fail(e)),
    };
    debug!(
        "Request {}: {} recognized {} chars in {}ms",
        tracker.id(),
        engine.name(),
        text.len(),
        ocr_start.elapsed().as_millis()
    );

    // ── Step 3: Extract ──────────────────────────────────────────────────
    tracker.advance(RequestStage::Extracting);
    let record = extract::extract(&text);

    tracker.advance(RequestStage::Responded);
    info!(
        "Request {}: done in {}ms (name {:?})",
        tracker.id(),
        tracker.started.elapsed().as_millis(),
        record.name
    );
    Ok(record)
}

/// Run one recognition, giving up after `timeout`.
///
/// Dropping the engine future on timeout releases whatever it holds
/// (temporary files, child processes).
pub async fn recognize_with_timeout(
    engine: &dyn OcrEngine,
    image: &UploadedImage,
    language: &str,
    timeout: Duration,
) -> Result<String, ProfileOcrError> {
    let start = Instant::now();
    match tokio::time::timeout(timeout, engine.recognize(image, language)).await {
        Ok(result) => result,
        Err(_) => Err(ProfileOcrError::OcrTimeout {
            elapsed_ms: start.elapsed().as_millis() as u64,
        }),
    }
}
