//! Service configuration.
//!
//! Every knob the service exposes lives in [`ServiceConfig`], built via
//! [`ServiceConfigBuilder`]. The binary maps CLI flags and environment
//! variables onto the builder; tests construct configs directly.

use crate::error::ProfileOcrError;
use crate::observer::PipelineObserver;
use axum::http::HeaderValue;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// 5 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

pub const DEFAULT_PORT: u16 = 3000;

pub const DEFAULT_OCR_TIMEOUT: Duration = Duration::from_secs(20);

pub const DEFAULT_LANGUAGE: &str = "eng";

/// Multipart field carrying the screenshot.
pub const DEFAULT_FILE_FIELD: &str = "screenshot";

pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:3001"];

/// Tesseract language code: one or more traineddata names joined by `+`.
static RE_LANGUAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+(\+[A-Za-z0-9_]+)*$").unwrap());

/// Configuration for the OCR service.
///
/// Built via [`ServiceConfig::builder()`] or using [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use profile_ocr::{CorsPolicy, ServiceConfig};
///
/// let config = ServiceConfig::builder()
///     .port(8080)
///     .cors(CorsPolicy::AllowList(vec!["https://app.example.com".into()]))
///     .ocr_timeout_secs(10)
///     .build()
///     .unwrap();
/// assert_eq!(config.port, 8080);
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Interface to bind. Default: `0.0.0.0`.
    pub host: IpAddr,

    /// Listening port. Default: 3000.
    pub port: u16,

    /// Cross-origin policy applied to every route.
    pub cors: CorsPolicy,

    /// Largest accepted upload in bytes. Default: 5 MiB.
    pub max_upload_bytes: usize,

    /// Upper bound on a single recognition call. Default: 20 s.
    pub ocr_timeout: Duration,

    /// Recognition language code passed to the engine. Default: `eng`.
    pub language: String,

    /// Multipart field name holding the image. Default: `screenshot`.
    pub file_field: String,

    /// Path or name of the `tesseract` executable.
    pub tesseract_bin: PathBuf,

    /// Tesseract page segmentation mode (`--psm`). `None` keeps the engine default.
    pub page_segmentation_mode: Option<u8>,

    /// Receives stage transitions for every request.
    pub observer: Option<Arc<dyn PipelineObserver>>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            cors: CorsPolicy::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            ocr_timeout: DEFAULT_OCR_TIMEOUT,
            language: DEFAULT_LANGUAGE.to_string(),
            file_field: DEFAULT_FILE_FIELD.to_string(),
            tesseract_bin: PathBuf::from("tesseract"),
            page_segmentation_mode: None,
            observer: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("cors", &self.cors)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("ocr_timeout", &self.ocr_timeout)
            .field("language", &self.language)
            .field("file_field", &self.file_field)
            .field("tesseract_bin", &self.tesseract_bin)
            .field("page_segmentation_mode", &self.page_segmentation_mode)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn PipelineObserver>"))
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// HTTP body limit for upload routes.
    ///
    /// Leaves room for multipart framing and small companion fields on top of
    /// the file ceiling itself; the exact file size is checked during intake.
    pub fn body_limit(&self) -> usize {
        self.max_upload_bytes.saturating_add(64 * 1024)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn host(mut self, host: IpAddr) -> Self {
        self.config.host = host;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn cors(mut self, policy: CorsPolicy) -> Self {
        self.config.cors = policy;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn ocr_timeout(mut self, timeout: Duration) -> Self {
        self.config.ocr_timeout = timeout;
        self
    }

    pub fn ocr_timeout_secs(self, secs: u64) -> Self {
        self.ocr_timeout(Duration::from_secs(secs))
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    pub fn file_field(mut self, name: impl Into<String>) -> Self {
        self.config.file_field = name.into();
        self
    }

    pub fn tesseract_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_bin = path.into();
        self
    }

    pub fn page_segmentation_mode(mut self, psm: u8) -> Self {
        self.config.page_segmentation_mode = Some(psm);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ProfileOcrError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(ProfileOcrError::InvalidConfig(
                "max upload size must be at least 1 byte".into(),
            ));
        }
        if c.ocr_timeout.is_zero() {
            return Err(ProfileOcrError::InvalidConfig(
                "OCR timeout must be greater than zero".into(),
            ));
        }
        if !RE_LANGUAGE.is_match(&c.language) {
            return Err(ProfileOcrError::InvalidConfig(format!(
                "invalid OCR language code {:?} (expected e.g. \"eng\" or \"eng+hin\")",
                c.language
            )));
        }
        if c.file_field.trim().is_empty() {
            return Err(ProfileOcrError::InvalidConfig(
                "upload field name must not be empty".into(),
            ));
        }
        if let Some(psm) = c.page_segmentation_mode {
            if psm > 13 {
                return Err(ProfileOcrError::InvalidConfig(format!(
                    "page segmentation mode must be 0–13, got {psm}"
                )));
            }
        }
        c.cors.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which browser origins may call the API.
///
/// Requests without an `Origin` header (curl, mobile apps, server-to-server)
/// are unaffected by either policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    /// Only the listed origins, with credentials allowed.
    AllowList(Vec<String>),
    /// Any origin, without credentials.
    Any,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        CorsPolicy::AllowList(DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect())
    }
}

impl CorsPolicy {
    /// Parse the allow-list into header values.
    pub fn header_values(&self) -> Result<Vec<HeaderValue>, ProfileOcrError> {
        match self {
            CorsPolicy::Any => Ok(Vec::new()),
            CorsPolicy::AllowList(origins) => origins
                .iter()
                .map(|o| {
                    HeaderValue::from_str(o.trim_end_matches('/')).map_err(|_| {
                        ProfileOcrError::InvalidConfig(format!("invalid CORS origin {o:?}"))
                    })
                })
                .collect(),
        }
    }

    fn validate(&self) -> Result<(), ProfileOcrError> {
        if let CorsPolicy::AllowList(origins) = self {
            if let Some(bad) = origins
                .iter()
                .find(|o| !(o.starts_with("http://") || o.starts_with("https://")))
            {
                return Err(ProfileOcrError::InvalidConfig(format!(
                    "CORS origin {bad:?} must start with http:// or https://"
                )));
            }
        }
        self.header_values().map(|_| ())
    }
}
