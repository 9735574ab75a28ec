//! Server binary for profile-ocr.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ServiceConfig`, then serves the router until shutdown.

use anyhow::{Context, Result};
use clap::Parser;
use profile_ocr::{router, AppState, CorsPolicy, OcrEngine, ServiceConfig, TesseractEngine};
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Defaults: port 3000, 5 MiB uploads, 20 s OCR timeout, English
  profile-ocr

  # Production origin allow-list
  profile-ocr --allowed-origin https://app.example.com --allowed-origin https://admin.example.com

  # Accept any origin (no credentials)
  profile-ocr --any-origin

  # English + Hindi traineddata, single-block segmentation
  profile-ocr --language eng+hin --psm 6

  # Try it
  curl -F screenshot=@profile.png http://localhost:3000/upload

ENVIRONMENT VARIABLES:
  PORT, PROFILE_OCR_HOST  Listening address
  ALLOWED_ORIGINS         Comma-separated CORS allow-list
  CORS_ANY_ORIGIN         Allow every origin
  MAX_UPLOAD_BYTES        Upload ceiling in bytes
  OCR_TIMEOUT_SECS        Recognition timeout in seconds
  OCR_LANGUAGE            Tesseract language code
  TESSERACT_BIN           Path to the tesseract executable
  TESSERACT_PSM           Tesseract page segmentation mode
  RUST_LOG                Log filter (overrides --verbose)
"#;

/// Extract profile details from social-media screenshots over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "profile-ocr",
    version,
    about = "Extract profile details from social-media screenshots over HTTP",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Interface to bind.
    #[arg(long, env = "PROFILE_OCR_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Listening port.
    #[arg(short, long, env = "PORT", default_value_t = profile_ocr::config::DEFAULT_PORT)]
    port: u16,

    /// Allowed CORS origin; repeat for several.
    #[arg(
        long = "allowed-origin",
        env = "ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_values_t = profile_ocr::config::DEFAULT_ALLOWED_ORIGINS
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
    )]
    allowed_origins: Vec<String>,

    /// Allow every origin instead of the allow-list.
    #[arg(long, env = "CORS_ANY_ORIGIN")]
    any_origin: bool,

    /// Largest accepted upload, in bytes.
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = profile_ocr::config::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Recognition timeout in seconds.
    #[arg(long = "ocr-timeout", env = "OCR_TIMEOUT_SECS", default_value_t = 20)]
    ocr_timeout_secs: u64,

    /// Tesseract language code (e.g. eng, eng+hin).
    #[arg(long, env = "OCR_LANGUAGE", default_value = profile_ocr::config::DEFAULT_LANGUAGE)]
    language: String,

    /// Path to the tesseract executable.
    #[arg(long = "tesseract", env = "TESSERACT_BIN", default_value = "tesseract")]
    tesseract_bin: PathBuf,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, env = "TESSERACT_PSM",
          value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: Option<u8>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PROFILE_OCR_VERBOSE")]
    verbose: bool,
}

fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let cors = if cli.any_origin {
        CorsPolicy::Any
    } else {
        CorsPolicy::AllowList(
            cli.allowed_origins
                .iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        )
    };

    let mut builder = ServiceConfig::builder()
        .host(cli.host)
        .port(cli.port)
        .cors(cors)
        .max_upload_bytes(cli.max_upload_bytes)
        .ocr_timeout(Duration::from_secs(cli.ocr_timeout_secs))
        .language(cli.language.clone())
        .tesseract_bin(cli.tesseract_bin.clone());
    if let Some(psm) = cli.psm {
        builder = builder.page_segmentation_mode(psm);
    }
    builder.build().context("Invalid configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    info!("Starting profile-ocr with {:?}", config);

    // ── Probe the OCR engine ─────────────────────────────────────────────
    let engine = TesseractEngine::from_config(&config);
    match engine.probe().await {
        Ok(version) => info!("OCR engine ready: {}", version),
        Err(e) => warn!("OCR engine unavailable, uploads will fail until it is installed: {}", e),
    }

    // ── Serve ────────────────────────────────────────────────────────────
    let addr = config.socket_addr();
    let app = router(AppState::new(Arc::new(engine), config));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_match_library_defaults() {
        let cli = Cli::parse_from(["profile-ocr"]);
        let config = build_config(&cli).unwrap();
        let defaults = ServiceConfig::default();
        assert_eq!(config.max_upload_bytes, defaults.max_upload_bytes);
        assert_eq!(config.ocr_timeout, defaults.ocr_timeout);
        assert_eq!(config.language, defaults.language);
        assert_eq!(config.cors, defaults.cors);
    }

    #[test]
    fn repeated_origins_and_any_origin() {
        let cli = Cli::parse_from([
            "profile-ocr",
            "--allowed-origin",
            "https://a.example",
            "--allowed-origin",
            "https://b.example",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(
            config.cors,
            CorsPolicy::AllowList(vec!["https://a.example".into(), "https://b.example".into()])
        );

        let cli = Cli::parse_from(["profile-ocr", "--any-origin"]);
        assert_eq!(build_config(&cli).unwrap().cors, CorsPolicy::Any);
    }

    #[test]
    fn invalid_language_is_rejected() {
        let cli = Cli::parse_from(["profile-ocr", "--language", "eng;rm"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn psm_range_is_enforced_by_clap() {
        assert!(Cli::try_parse_from(["profile-ocr", "--psm", "14"]).is_err());
        let cli = Cli::parse_from(["profile-ocr", "--psm", "6"]);
        assert_eq!(build_config(&cli).unwrap().page_segmentation_mode, Some(6));
    }
}
