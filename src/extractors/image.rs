// src/extractors/image.rs
use std::path::{Path, PathBuf};
use std::process::Command;

use image::{GrayImage, ImageFormat, ImageReader};

use crate::gateway::models::ExtractionResult;
use crate::utils::error::OcrError;

pub const DEFAULT_LANGUAGE: &str = "eng";

/// Turns a grayscale raster into text.
///
/// Implementations are blocking and are only ever called from the blocking worker pool.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    fn recognize(&self, image: &GrayImage, language: &str) -> Result<String, OcrError>;
}

/// OCR through the `tesseract` command-line program.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
}

impl TesseractCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// True when the binary can be launched.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

impl OcrEngine for TesseractCli {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &GrayImage, language: &str) -> Result<String, OcrError> {
        // Tesseract reads from a path; the PNG lives only as long as `input`
        let input = tempfile::Builder::new()
            .prefix("ocr-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(input.path(), ImageFormat::Png)?;

        let output = Command::new(&self.binary)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .output()
            .map_err(|source| OcrError::Launch {
                binary: self.binary.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Decodes the image at `path`, converts it to grayscale and runs OCR on it.
/// OCR does no table detection, so `tables` is always empty.
pub fn extract_from_image(
    engine: &dyn OcrEngine,
    path: &Path,
    language: &str,
) -> Result<ExtractionResult, OcrError> {
    // Sniff the format from content; the staged name may have no extension
    let raster = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_luma8();

    tracing::debug!(
        "Running {} OCR on {}x{} raster",
        engine.name(),
        raster.width(),
        raster.height()
    );

    let text = engine.recognize(&raster, language)?;
    Ok(ExtractionResult::text_only(text))
}
