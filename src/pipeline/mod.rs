//! Pipeline stages for screenshot-to-profile extraction.
//!
//! Each submodule implements exactly one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ ocr ──▶ extract
//! (multipart)  (engine)  (heuristics)
//! ```
//!
//! 1. [`intake`] : pull the screenshot out of the multipart form and check
//!    presence, content type and size before anything expensive runs
//! 2. [`ocr`]    : hand the bytes to an [`ocr::OcrEngine`]; the only stage
//!    with process or file-system I/O
//! 3. [`extract`]: split the recognized text into lines and fill a
//!    [`extract::ProfileRecord`]; pure and infallible

pub mod extract;
pub mod intake;
pub mod ocr;
