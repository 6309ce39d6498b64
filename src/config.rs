// src/config.rs
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::extractors::image::DEFAULT_LANGUAGE;
use crate::extractors::PdfStrategy;
use crate::fetch::client::DEFAULT_USER_AGENT;
use crate::gateway::GatewayConfig;
use crate::utils::AppError;

/// HTTP service that extracts text and tables from images, PDFs and web pages
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to bind
    #[arg(long, env = "EXTRACT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "EXTRACT_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Tesseract executable used for image OCR
    #[arg(long, env = "TESSERACT_BIN", default_value = "tesseract")]
    pub tesseract_bin: PathBuf,

    /// OCR language model
    #[arg(long, env = "OCR_LANGUAGE", default_value = DEFAULT_LANGUAGE)]
    pub ocr_language: String,

    /// PDF partitioning strategy
    #[arg(long, env = "PDF_STRATEGY", value_enum, default_value = "hi_res")]
    pub pdf_strategy: PdfStrategy,

    /// Largest accepted request body, in megabytes
    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 50)]
    pub max_upload_mb: usize,

    /// Timeout for web page downloads in seconds (no timeout when unset)
    #[arg(long, env = "FETCH_TIMEOUT_SECS")]
    pub fetch_timeout_secs: Option<u64>,

    /// User-Agent sent when downloading web pages
    #[arg(long, env = "FETCH_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Directory for transient uploads (OS temp dir when unset)
    #[arg(long, env = "EXTRACT_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,
}

impl Args {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_upload_mb == 0 {
            return Err(AppError::Config("--max-upload-mb must be at least 1".to_string()));
        }
        if self.ocr_language.trim().is_empty() {
            return Err(AppError::Config("--ocr-language must not be empty".to_string()));
        }
        if self.fetch_timeout_secs == Some(0) {
            return Err(AppError::Config(
                "--fetch-timeout-secs must be positive; omit it to disable the timeout".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            ocr_language: self.ocr_language.clone(),
            pdf_strategy: self.pdf_strategy,
        }
    }
}
