//! Observer trait for per-request pipeline events.
//!
//! Attach an [`Arc<dyn PipelineObserver>`] via
//! [`crate::config::ServiceConfigBuilder::observer`] to be told each time a
//! request moves between stages:
//!
//! ```text
//! Received ──▶ Validated ──▶ Recognizing ──▶ Extracting ──▶ Responded
//!     │            │              │               │
//!     └────────────┴──────────────┴───────────────┴──▶ Failed(kind)
//! ```
//!
//! # Example
//!
//! ```rust
//! use profile_ocr::{ErrorKind, PipelineObserver, ServiceConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! #[derive(Default)]
//! struct FailureCounter {
//!     failures: AtomicUsize,
//! }
//!
//! impl PipelineObserver for FailureCounter {
//!     fn on_failed(&self, _kind: ErrorKind, _message: &str) {
//!         self.failures.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ServiceConfig::builder()
//!     .observer(Arc::new(FailureCounter::default()))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ErrorKind;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Where a request currently is in the upload pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "stage", content = "kind")]
pub enum RequestStage {
    Received,
    Validated,
    Recognizing,
    Extracting,
    Responded,
    Failed(ErrorKind),
}

impl RequestStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStage::Responded | RequestStage::Failed(_))
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStage::Received => f.write_str("received"),
            RequestStage::Validated => f.write_str("validated"),
            RequestStage::Recognizing => f.write_str("recognizing"),
            RequestStage::Extracting => f.write_str("extracting"),
            RequestStage::Responded => f.write_str("responded"),
            RequestStage::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

/// Called by the pipeline as each request advances.
///
/// Requests are handled concurrently, so implementations must be
/// `Send + Sync` and guard their own mutable state. All methods default to
/// no-ops.
pub trait PipelineObserver: Send + Sync {
    /// Called on every transition, from `Received` to the terminal stage.
    fn on_stage(&self, request_id: u64, stage: RequestStage) {
        let _ = (request_id, stage);
    }

    /// Called once when a request ends in `Failed(kind)`, after the
    /// matching [`on_stage`](Self::on_stage) call.
    fn on_failed(&self, kind: ErrorKind, message: &str) {
        let _ = (kind, message);
    }
}

/// Observer used when none is configured.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ServiceConfig`].
pub type SharedObserver = Arc<dyn PipelineObserver>;
