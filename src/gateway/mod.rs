// src/gateway/mod.rs
pub mod models;
pub mod routes;

use std::sync::Arc;

use crate::extractors::{self, DocumentPartitioner, OcrEngine, PdfStrategy};
use crate::fetch::PageFetcher;
use crate::storage::TransientStore;
use crate::utils::GatewayError;

use models::{ExtractionRequest, ExtractionResult, Source, Table, Upload};

/// Per-deployment knobs the strategies need.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub ocr_language: String,
    pub pdf_strategy: PdfStrategy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ocr_language: extractors::image::DEFAULT_LANGUAGE.to_string(),
            pdf_strategy: PdfStrategy::HiRes,
        }
    }
}

/// Validates extraction requests and routes each to exactly one strategy.
///
/// File-based strategies and HTML parsing run on tokio's blocking pool; staged uploads
/// are owned by the worker closure, so they're removed however the worker exits.
pub struct Gateway {
    config: GatewayConfig,
    ocr: Arc<dyn OcrEngine>,
    partitioner: Arc<dyn DocumentPartitioner>,
    fetcher: PageFetcher,
    store: TransientStore,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        ocr: Arc<dyn OcrEngine>,
        partitioner: Arc<dyn DocumentPartitioner>,
        fetcher: PageFetcher,
        store: TransientStore,
    ) -> Self {
        Self {
            config,
            ocr,
            partitioner,
            fetcher,
            store,
        }
    }

    pub async fn handle(&self, request: ExtractionRequest) -> Result<ExtractionResult, GatewayError> {
        let source = request.validate()?;
        tracing::info!("Handling {} extraction", source.kind());

        match source {
            Source::Image(upload) => self.extract_image(upload).await,
            Source::Pdf(upload) => self.extract_pdf(upload).await,
            Source::Web(url) => self.extract_web(&url).await,
        }
    }

    async fn extract_image(&self, upload: Upload) -> Result<ExtractionResult, GatewayError> {
        let store = self.store.clone();
        let ocr = Arc::clone(&self.ocr);
        let language = self.config.ocr_language.clone();

        tokio::task::spawn_blocking(move || -> Result<ExtractionResult, GatewayError> {
            let staged = store.stage(&upload)?;
            let result = extractors::image::extract_from_image(ocr.as_ref(), staged.path(), &language)?;
            Ok(result)
        })
        .await?
    }

    async fn extract_pdf(&self, upload: Upload) -> Result<ExtractionResult, GatewayError> {
        let store = self.store.clone();
        let partitioner = Arc::clone(&self.partitioner);
        let strategy = self.config.pdf_strategy;

        tokio::task::spawn_blocking(move || -> Result<ExtractionResult, GatewayError> {
            let staged = store.stage(&upload)?;
            let result = extractors::pdf::extract_from_pdf(partitioner.as_ref(), staged.path(), strategy)?;
            Ok(result)
        })
        .await?
    }

    async fn extract_web(&self, url: &str) -> Result<ExtractionResult, GatewayError> {
        let html = self.fetcher.fetch_page(url).await?;
        let tables = tokio::task::spawn_blocking(move || extractors::web::extract_tables(&html)).await??;

        Ok(ExtractionResult {
            text: String::new(),
            tables: tables.into_iter().map(Table::Columns).collect(),
        })
    }
}
