// src/extractors/mod.rs
pub mod image;
pub mod pdf;
pub mod web;

// Re-export key extraction types for convenience
pub use self::image::{OcrEngine, TesseractCli};
pub use self::pdf::{DocumentPartitioner, LopdfPartitioner, PdfStrategy};
