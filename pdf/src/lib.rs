//! Selective-OCR PDF text extraction.
//!
//! Decides, per document, whether native text extraction is sufficient or a
//! rasterised OCR pass is required, and produces an ordered sequence of
//! per-page text ready for chunking.

mod error;
mod model;
mod ocr;
mod parser;
mod pdfium;

pub use error::{ExtractError, Result};
pub use model::{ExtractOptions, ExtractedDocument, OcrOptions, Page, PaddleOcrConfig};

use std::path::{Path, PathBuf};

/// Extract text from a PDF file on disk.
pub fn extract_from_path(path: impl AsRef<Path>, options: &ExtractOptions) -> Result<ExtractedDocument> {
    parser::extract_from_path(path.as_ref(), options)
}

/// Extract text from PDF bytes held in memory.
pub fn extract_from_bytes(bytes: &[u8], options: &ExtractOptions) -> Result<ExtractedDocument> {
    parser::extract_from_bytes(bytes, options)
}

/// A PDF source that can be extracted from, deferring the choice of
/// path-backed or in-memory input to call time.
#[derive(Debug, Clone)]
pub enum PdfSource {
    /// A PDF file on disk.
    Path(PathBuf),
    /// PDF bytes already loaded into memory.
    Bytes(Vec<u8>),
}

impl PdfSource {
    /// Extract text using this source.
    pub fn extract(&self, options: &ExtractOptions) -> Result<ExtractedDocument> {
        match self {
            Self::Path(path) => extract_from_path(path, options),
            Self::Bytes(bytes) => extract_from_bytes(bytes, options),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_invalid_pdf_errors() {
        let result = extract_from_bytes(b"not-a-pdf", &ExtractOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn pdf_source_bytes_roundtrips_error() {
        let source = PdfSource::Bytes(b"not-a-pdf".to_vec());
        let result = source.extract(&ExtractOptions::default());
        assert!(matches!(result, Err(ExtractError::Unreadable(_))));
    }
}
