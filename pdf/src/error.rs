use thiserror::Error;

/// Errors raised while extracting text from a PDF document.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The PDF could not be parsed at all.
    #[error("PDF is unreadable: {0}")]
    Unreadable(String),
    /// The PDF parsed but no page yielded usable text, and OCR did not
    /// recover any either.
    #[error("extraction truncated: only {pages_read} of {total_pages} pages yielded text")]
    Truncated {
        /// Pages that produced any text at all.
        pages_read: usize,
        /// Total pages in the source document (pre-cap).
        total_pages: usize,
    },
    /// Native text was too sparse and OCR is disabled or not compiled in.
    #[error("OCR is unavailable and native text extraction was insufficient")]
    OcrUnavailable,
    /// Filesystem I/O failure reading the source file.
    #[error("failed to read PDF: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, ExtractError>;
