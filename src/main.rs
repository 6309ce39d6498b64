// src/main.rs
mod config;
mod extractors;
mod fetch;
mod gateway;
mod storage;
mod utils;

use std::sync::Arc;

use clap::Parser;
use config::Args;
use extractors::{LopdfPartitioner, OcrEngine, TesseractCli};
use fetch::PageFetcher;
use gateway::Gateway;
use storage::TransientStore;
use utils::AppError;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    args.validate()?;
    tracing::info!("Starting extraction gateway with args: {:?}", args);

    // 3. Wire the extraction collaborators
    let tesseract = TesseractCli::new(&args.tesseract_bin);
    if !tesseract.is_available() {
        // Image requests and scanned PDF pages will fail with a launch error until it is installed
        tracing::warn!(
            "OCR engine '{}' could not be started; image extraction is unavailable",
            args.tesseract_bin.display()
        );
    }
    let ocr: Arc<dyn OcrEngine> = Arc::new(tesseract);
    let partitioner = LopdfPartitioner::new().with_ocr(Arc::clone(&ocr), args.ocr_language.clone());
    let fetcher = PageFetcher::new(&args.user_agent, args.fetch_timeout())?;
    let store = TransientStore::new(args.temp_dir.clone())?;

    let gateway = Gateway::new(
        args.gateway_config(),
        ocr,
        Arc::new(partitioner),
        fetcher,
        store,
    );

    // 4. Serve until Ctrl-C
    let app = gateway::routes::router(Arc::new(gateway), args.max_upload_bytes());
    let listener = tokio::net::TcpListener::bind(args.bind_addr()).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler, never resolve and keep serving
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
