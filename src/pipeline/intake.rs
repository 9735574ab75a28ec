//! Upload intake: pull the screenshot out of a multipart form and validate it.
//!
//! Checks run in a fixed order (presence, content type, size) and all of
//! them happen before the OCR engine is involved. The file body is read
//! chunk by chunk so an oversized upload is rejected as soon as it crosses
//! the ceiling instead of after it has been buffered in full.

use crate::error::ProfileOcrError;
use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use tracing::{debug, trace};

/// A file received from a client. Lives only for the duration of a request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    /// Declared MIME type, as sent by the client.
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl UploadedImage {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: Some(content_type.into()),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// True when `content_type` names an `image/*` media type.
pub fn is_image_type(content_type: &str) -> bool {
    content_type
        .trim_start()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// Validate an upload that has already been read into memory.
///
/// An empty buffer counts as no file at all.
pub fn validate(
    upload: Option<UploadedImage>,
    max_bytes: usize,
) -> Result<UploadedImage, ProfileOcrError> {
    let upload = upload
        .filter(|u| !u.is_empty())
        .ok_or(ProfileOcrError::MissingFile)?;
    check_content_type(upload.content_type.as_deref())?;
    if upload.len() > max_bytes {
        return Err(ProfileOcrError::PayloadTooLarge {
            size: Some(upload.len()),
            limit: max_bytes,
        });
    }
    Ok(upload)
}

/// Read the file field named `field_name` from a multipart stream.
///
/// Returns `Ok(None)` when the form has no such file part, or only an empty
/// one (browsers send an empty part with `filename=""` when nothing was
/// chosen). A plain text field under the same name is not a file. Other
/// fields are skipped; if the file part repeats, the first non-empty one
/// wins and the rest of the body is left unread.
///
/// The content type is checked once the first bytes arrive, so an empty
/// part is reported as missing rather than mistyped.
pub async fn read_upload(
    multipart: &mut Multipart,
    field_name: &str,
    max_bytes: usize,
) -> Result<Option<UploadedImage>, ProfileOcrError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or("");
        if name != field_name {
            trace!("Ignoring multipart field {:?}", name);
            continue;
        }
        let Some(file_name) = field.file_name().filter(|f| !f.is_empty()) else {
            debug!("Field {:?} sent without a file", name);
            continue;
        };
        let file_name = Some(file_name.to_string());
        let content_type = field.content_type().map(str::to_string);

        let Some(first) = first_chunk(&mut field, max_bytes).await? else {
            debug!("Field {:?} sent an empty file", field_name);
            continue;
        };
        check_content_type(content_type.as_deref())?;
        let bytes = read_capped(field, first, max_bytes).await?;

        debug!(
            "Read upload {:?} ({} bytes, {})",
            file_name.as_deref().unwrap_or("<unnamed>"),
            bytes.len(),
            content_type.as_deref().unwrap_or("")
        );
        return Ok(Some(UploadedImage {
            bytes,
            content_type,
            file_name,
        }));
    }
    Ok(None)
}

fn check_content_type(content_type: Option<&str>) -> Result<(), ProfileOcrError> {
    match content_type {
        Some(ct) if is_image_type(ct) => Ok(()),
        other => Err(ProfileOcrError::InvalidType {
            content_type: other.unwrap_or_default().to_string(),
        }),
    }
}

/// First non-empty chunk of `field`, or `None` if the body is empty.
async fn first_chunk(
    field: &mut Field<'_>,
    max_bytes: usize,
) -> Result<Option<Bytes>, ProfileOcrError> {
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if !chunk.is_empty() {
            return Ok(Some(chunk));
        }
    }
    Ok(None)
}

async fn read_capped(
    mut field: Field<'_>,
    first: Bytes,
    max_bytes: usize,
) -> Result<Bytes, ProfileOcrError> {
    let too_large = || ProfileOcrError::PayloadTooLarge {
        size: None,
        limit: max_bytes,
    };
    if first.len() > max_bytes {
        return Err(too_large());
    }
    let mut buf: Vec<u8> = first.to_vec();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if buf.len() + chunk.len() > max_bytes {
            return Err(too_large());
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}

/// The body limit surfaces as a multipart error; report it as an oversized
/// upload rather than a malformed one.
fn multipart_error(err: MultipartError, max_bytes: usize) -> ProfileOcrError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ProfileOcrError::PayloadTooLarge {
            size: None,
            limit: max_bytes,
        }
    } else {
        ProfileOcrError::MalformedUpload(err.body_text())
    }
}
