//! Error types for the profile-ocr library.
//!
//! Every failure a request can hit is a variant of [`ProfileOcrError`]. The
//! variants fall into two families that the HTTP layer treats differently:
//!
//! * **Intake**: the upload itself is unusable (no file, wrong type, too
//!   large, corrupt multipart). Detected before the OCR engine is touched and
//!   answered with `400`.
//!
//! * **Recognition**: the engine timed out or failed. Answered with `500`.
//!
//! [`ErrorKind`] is the fieldless projection of the enum, used for stage
//! reporting and for the status-code mapping.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// All errors returned by the profile-ocr library.
#[derive(Debug, Error)]
pub enum ProfileOcrError {
    // ── Intake errors ─────────────────────────────────────────────────────
    /// The multipart form carried no file under the expected field name.
    #[error("No file uploaded")]
    MissingFile,

    /// The declared content type is not an `image/*` type.
    #[error("Only image files are allowed (got content type {content_type:?})")]
    InvalidType { content_type: String },

    /// The upload exceeded the configured byte ceiling.
    ///
    /// `size` is `None` when the body limit tripped before the whole file was
    /// read, so the real length is unknown.
    #[error("Upload of {} exceeds the {limit} byte limit", describe_size(.size))]
    PayloadTooLarge { size: Option<usize>, limit: usize },

    /// The multipart stream could not be parsed.
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    // ── Recognition errors ────────────────────────────────────────────────
    /// The OCR engine did not answer within the configured timeout.
    #[error("OCR timed out after {elapsed_ms}ms")]
    OcrTimeout { elapsed_ms: u64 },

    /// The OCR engine failed. `message` is for diagnostics only.
    #[error("OCR failed: {message}")]
    OcrFailure { message: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProfileOcrError {
    /// Shorthand for an [`ProfileOcrError::OcrFailure`] from any displayable error.
    pub fn ocr(err: impl fmt::Display) -> Self {
        ProfileOcrError::OcrFailure {
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProfileOcrError::MissingFile => ErrorKind::MissingFile,
            ProfileOcrError::InvalidType { .. } => ErrorKind::InvalidType,
            ProfileOcrError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            ProfileOcrError::MalformedUpload(_) => ErrorKind::MalformedUpload,
            ProfileOcrError::OcrTimeout { .. } => ErrorKind::OcrTimeout,
            ProfileOcrError::OcrFailure { .. } => ErrorKind::OcrFailure,
            ProfileOcrError::InvalidConfig(_) | ProfileOcrError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Short, stable message shown to API clients in the `error` field.
    pub fn public_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::MissingFile => "No file uploaded",
            ErrorKind::InvalidType => "Only image files are allowed",
            ErrorKind::PayloadTooLarge => "File too large",
            ErrorKind::MalformedUpload => "Malformed upload",
            ErrorKind::OcrTimeout | ErrorKind::OcrFailure => "Failed to process image",
            ErrorKind::Internal => "Internal server error",
        }
    }

    /// Diagnostic text for the `details` field, if the variant carries any.
    pub fn details(&self) -> Option<String> {
        match self {
            ProfileOcrError::MissingFile | ProfileOcrError::InvalidType { .. } => None,
            other => Some(other.to_string()),
        }
    }
}

fn describe_size(size: &Option<usize>) -> String {
    match size {
        Some(s) => format!("{s} bytes"),
        None => "unknown size".to_string(),
    }
}

/// Fieldless classification of [`ProfileOcrError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingFile,
    InvalidType,
    PayloadTooLarge,
    MalformedUpload,
    OcrTimeout,
    OcrFailure,
    Internal,
}

impl ErrorKind {
    /// True for failures detected while validating the upload.
    pub fn is_intake(self) -> bool {
        matches!(
            self,
            ErrorKind::MissingFile
                | ErrorKind::InvalidType
                | ErrorKind::PayloadTooLarge
                | ErrorKind::MalformedUpload
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::MissingFile => "missing_file",
            ErrorKind::InvalidType => "invalid_type",
            ErrorKind::PayloadTooLarge => "payload_too_large",
            ErrorKind::MalformedUpload => "malformed_upload",
            ErrorKind::OcrTimeout => "ocr_timeout",
            ErrorKind::OcrFailure => "ocr_failure",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}
