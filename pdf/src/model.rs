use std::path::PathBuf;

/// Paddle OCR model bundle configuration.
#[derive(Debug, Clone)]
pub struct PaddleOcrConfig {
    /// Path to the text detection model (.onnx).
    pub det_model_path: String,
    /// Optional path to the text line orientation model (.onnx).
    pub cls_model_path: Option<String>,
    /// Path to the text recognition model (.onnx).
    pub rec_model_path: String,
    /// Path to the OCR character dictionary file.
    pub char_dict_path: String,
}

/// OCR behavior when native text extraction is too sparse.
#[derive(Debug, Clone)]
pub struct OcrOptions {
    /// Whether OCR fallback may run at all. Independent of whether the
    /// `ocr` feature is compiled in; if the feature is absent this is
    /// downgraded to `false` regardless of the configured value.
    pub enabled: bool,
    /// Render DPI used to rasterise pages before recognition.
    pub dpi: u16,
    /// Number of pages rasterised and recognised per batch, to bound peak
    /// memory on large documents.
    pub batch_pages: usize,
    /// Absolute path to the Pdfium dynamic library.
    pub pdfium_library_path: Option<PathBuf>,
    /// Paddle OCR model bundle. Required when `enabled` and the `ocr`
    /// feature is active.
    pub paddle: Option<PaddleOcrConfig>,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            dpi: 200,
            batch_pages: 20,
            pdfium_library_path: None,
            paddle: None,
        }
    }
}

/// Runtime options for [`crate::extract_from_path`] / [`crate::extract_from_bytes`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Maximum number of pages read from any single document.
    pub max_pages: usize,
    /// Minimum average characters per page before native extraction is
    /// considered sufficient; below this, OCR is attempted if enabled.
    pub min_chars_per_page: f64,
    /// OCR fallback configuration.
    pub ocr: OcrOptions,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_pages: 2000,
            min_chars_per_page: 50.0,
            ocr: OcrOptions::default(),
        }
    }
}

/// A single extracted page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page ordinal within the document.
    pub index: usize,
    /// Extracted text, possibly empty.
    pub text: String,
    /// Whether this page's text came from OCR rather than native extraction.
    pub ocr_used: bool,
}

/// Result of extracting text from one PDF document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Per-page extracted text, in page order.
    pub pages: Vec<Page>,
    /// True if OCR was used anywhere in this document.
    pub ocr_used: bool,
    /// Total page count of the source PDF, before any `max_pages` cap.
    pub total_pages: usize,
}

impl ExtractedDocument {
    /// Concatenate all page texts, separated by a blank line, as the
    /// Chunker's input contract expects.
    #[must_use]
    pub fn joined_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Byte offset within [`Self::joined_text`] at which each page begins,
    /// paired with that page's 1-based index. Mirrors the `"\n\n"` join
    /// performed there.
    #[must_use]
    pub fn page_offsets(&self) -> Vec<(usize, u32)> {
        let mut offsets = Vec::with_capacity(self.pages.len());
        let mut pos = 0usize;
        for page in &self.pages {
            offsets.push((pos, page.index as u32));
            pos += page.text.len() + 2;
        }
        offsets
    }
}
