#[cfg(feature = "ocr")]
use pdfium_render::prelude::{Pdfium, PdfiumError};

#[cfg(feature = "ocr")]
use crate::error::{ExtractError, Result};
#[cfg(feature = "ocr")]
use crate::model::OcrOptions;

#[cfg(feature = "ocr")]
pub(crate) fn bind_pdfium(options: &OcrOptions) -> Result<Pdfium> {
    let bound = match options.pdfium_library_path.as_deref() {
        Some(path) => Pdfium::bind_to_library(path).map_err(map_pdfium_error)?,
        None => Pdfium::bind_to_system_library().map_err(map_pdfium_error)?,
    };
    Ok(Pdfium::new(bound))
}

#[cfg(feature = "ocr")]
fn map_pdfium_error(error: PdfiumError) -> ExtractError {
    ExtractError::Unreadable(format!("pdfium: {error}"))
}
