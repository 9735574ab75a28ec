//! # profile-ocr
//!
//! Turn a screenshot of a social-media profile into a small JSON record.
//!
//! The service accepts an image upload, runs OCR over it with an external
//! engine (the `tesseract` program by default) and splits the recognized
//! text into a [`ProfileRecord`]: name, bio, follower and following counts,
//! and a guessed location.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /upload (multipart, field "screenshot")
//!  │
//!  ├─ 1. Intake    presence, image/* content type, size ceiling
//!  ├─ 2. OCR       OcrEngine::recognize, bounded by a timeout
//!  ├─ 3. Extract   line heuristics → ProfileRecord
//!  └─ 4. Respond   { success, data } or { success: false, error, details }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use profile_ocr::{router, AppState, ServiceConfig, TesseractEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder().port(3000).build()?;
//!     let engine = Arc::new(TesseractEngine::from_config(&config));
//!     let addr = config.socket_addr();
//!     let app = router(AppState::new(engine, config));
//!
//!     let listener = tokio::net::TcpListener::bind(addr).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! Without HTTP, the pipeline is a single call:
//!
//! ```rust,no_run
//! # use profile_ocr::{process_upload, ServiceConfig, TesseractEngine, UploadedImage};
//! # async fn demo(bytes: Vec<u8>) -> Result<(), profile_ocr::ProfileOcrError> {
//! let config = ServiceConfig::default();
//! let engine = TesseractEngine::from_config(&config);
//! let upload = UploadedImage::new(bytes, "image/png");
//! let record = process_upload(&engine, &config, Some(upload)).await?;
//! println!("{}: {}", record.name, record.followers);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `profile-ocr` server binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod observer;
pub mod pipeline;
pub mod process;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CorsPolicy, ServiceConfig, ServiceConfigBuilder};
pub use error::{ErrorKind, ProfileOcrError};
pub use observer::{NoopObserver, PipelineObserver, RequestStage, SharedObserver};
pub use pipeline::extract::{extract, ProfileRecord};
pub use pipeline::intake::UploadedImage;
pub use pipeline::ocr::{OcrEngine, TesseractEngine};
pub use process::{process_upload, recognize_with_timeout};
pub use server::{router, ApiResponse, AppState};
