//! OCR engines: image bytes → recognized text.
//!
//! [`OcrEngine`] is the seam between the pipeline and whatever does the
//! actual recognition. The shipped implementation, [`TesseractEngine`],
//! drives the `tesseract` command-line program. Engines that can read an
//! in-memory buffer implement the trait directly and never touch the disk.
//!
//! ## Temporary files
//!
//! `tesseract` wants a path, so [`TesseractEngine`] writes each upload into
//! its own `TempDir`. The directory guard lives inside the recognition
//! future: it is removed when the call returns, fails, or is dropped by the
//! pipeline's timeout. The child process is spawned with `kill_on_drop`, so
//! a timed-out recognition does not leave `tesseract` running either.

use crate::config::ServiceConfig;
use crate::error::ProfileOcrError;
use crate::pipeline::intake::UploadedImage;
use futures::future::BoxFuture;
use futures::FutureExt;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Something that turns an image into text.
///
/// One call per request, no retries; the caller applies the timeout.
pub trait OcrEngine: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Recognize the text in `image` using the given language code.
    fn recognize<'a>(
        &'a self,
        image: &'a UploadedImage,
        language: &'a str,
    ) -> BoxFuture<'a, Result<String, ProfileOcrError>>;

    /// Check that the engine is usable, returning a version string.
    fn probe(&self) -> BoxFuture<'_, Result<String, ProfileOcrError>> {
        let name = self.name().to_string();
        async move { Ok(name) }.boxed()
    }
}

/// Runs `tesseract <file> stdout -l <language> [--psm <n>]`.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    page_segmentation_mode: Option<u8>,
    /// Parent of the per-request temp dirs. `None` uses the system default.
    temp_root: Option<PathBuf>,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TesseractEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            page_segmentation_mode: None,
            temp_root: None,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            binary: config.tesseract_bin.clone(),
            page_segmentation_mode: config.page_segmentation_mode,
            temp_root: None,
        }
    }

    pub fn with_page_segmentation_mode(mut self, psm: u8) -> Self {
        self.page_segmentation_mode = Some(psm);
        self
    }

    /// Create per-request temp dirs under `dir` instead of the system default.
    pub fn with_temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(dir.into());
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, input: &Path, language: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(input).arg("stdout").arg("-l").arg(language);
        if let Some(psm) = self.page_segmentation_mode {
            cmd.arg("--psm").arg(psm.to_string());
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, image: &UploadedImage, language: &str) -> Result<String, ProfileOcrError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("profile-ocr-");
        let temp_dir = match self.temp_root {
            Some(ref root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| ProfileOcrError::ocr(format!("failed to create temp dir: {e}")))?;
        let input_path = temp_dir
            .path()
            .join(format!("upload.{}", file_extension(&image.bytes)));

        tokio::fs::write(&input_path, &image.bytes)
            .await
            .map_err(|e| ProfileOcrError::ocr(format!("failed to write temp file: {e}")))?;

        debug!(
            "Running {} on {} ({} bytes, lang={})",
            self.binary.display(),
            input_path.display(),
            image.len(),
            language
        );

        let output = self
            .command(&input_path, language)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(ProfileOcrError::OcrFailure {
                message: if stderr.is_empty() {
                    format!("tesseract exited with {}", output.status)
                } else {
                    format!("tesseract exited with {}: {}", output.status, stderr)
                },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn version(&self) -> Result<String, ProfileOcrError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(ProfileOcrError::ocr(format!(
                "`{} --version` exited with {}",
                self.binary.display(),
                output.status
            )));
        }
        // Older releases print the banner on stderr.
        let text = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&text)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn spawn_error(&self, err: std::io::Error) -> ProfileOcrError {
        if err.kind() == std::io::ErrorKind::NotFound {
            ProfileOcrError::ocr(format!(
                "tesseract executable not found at '{}'; install tesseract-ocr or set TESSERACT_BIN",
                self.binary.display()
            ))
        } else {
            ProfileOcrError::ocr(format!(
                "failed to run '{}': {err}",
                self.binary.display()
            ))
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize<'a>(
        &'a self,
        image: &'a UploadedImage,
        language: &'a str,
    ) -> BoxFuture<'a, Result<String, ProfileOcrError>> {
        self.run(image, language).boxed()
    }

    fn probe(&self) -> BoxFuture<'_, Result<String, ProfileOcrError>> {
        self.version().boxed()
    }
}

/// File extension matching the image's magic bytes.
///
/// Leptonica sniffs the format itself; the extension only keeps the temp
/// file recognisable when debugging.
pub fn file_extension(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "png",
        Ok(ImageFormat::Jpeg) => "jpg",
        Ok(ImageFormat::Gif) => "gif",
        Ok(ImageFormat::WebP) => "webp",
        Ok(ImageFormat::Tiff) => "tif",
        Ok(ImageFormat::Bmp) => "bmp",
        _ => "img",
    }
}
