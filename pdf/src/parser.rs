use std::path::Path;

use lopdf::Document;

use crate::error::{ExtractError, Result};
use crate::model::{ExtractOptions, ExtractedDocument, Page};
use crate::ocr::{OcrSource, ocr_pages};

pub(crate) fn extract_from_path(path: &Path, options: &ExtractOptions) -> Result<ExtractedDocument> {
    let doc = Document::load(path).map_err(|e| ExtractError::Unreadable(e.to_string()))?;
    extract_document(doc, OcrSource::Path(path), options)
}

pub(crate) fn extract_from_bytes(
    bytes: &[u8],
    options: &ExtractOptions,
) -> Result<ExtractedDocument> {
    let doc = Document::load_mem(bytes).map_err(|e| ExtractError::Unreadable(e.to_string()))?;
    extract_document(doc, OcrSource::Bytes(bytes), options)
}

fn extract_document(
    doc: Document,
    ocr_source: OcrSource<'_>,
    options: &ExtractOptions,
) -> Result<ExtractedDocument> {
    let page_map = doc.get_pages();
    let mut page_numbers: Vec<u32> = page_map.keys().copied().collect();
    page_numbers.sort_unstable();
    let total_pages = page_numbers.len();

    if total_pages > options.max_pages {
        tracing::warn!(
            total_pages,
            max_pages = options.max_pages,
            "document exceeds page cap; processing a prefix only"
        );
    }
    page_numbers.truncate(options.max_pages);

    let mut native_texts = Vec::with_capacity(page_numbers.len());
    let mut total_chars = 0usize;
    let mut pages_read = 0usize;
    for &page_number in &page_numbers {
        let text = doc
            .extract_text(&[page_number])
            .map(|t| normalize_text(&t))
            .unwrap_or_default();
        if !text.is_empty() {
            pages_read += 1;
        }
        total_chars += text.chars().count();
        native_texts.push(text);
    }

    let avg_chars_per_page = if page_numbers.is_empty() {
        0.0
    } else {
        total_chars as f64 / page_numbers.len() as f64
    };
    tracing::info!(
        total_chars,
        pages = page_numbers.len(),
        avg_chars_per_page,
        "native text extraction complete"
    );

    if avg_chars_per_page >= options.min_chars_per_page {
        let pages = native_texts
            .into_iter()
            .enumerate()
            .map(|(idx, text)| Page {
                index: idx + 1,
                text,
                ocr_used: false,
            })
            .collect();
        return Ok(ExtractedDocument {
            pages,
            ocr_used: false,
            total_pages,
        });
    }

    tracing::warn!(
        avg_chars_per_page,
        min_chars_per_page = options.min_chars_per_page,
        "native text too sparse"
    );

    if !options.ocr.enabled {
        if pages_read == 0 {
            return Err(ExtractError::OcrUnavailable);
        }
        return Ok(ExtractedDocument {
            pages: native_texts
                .into_iter()
                .enumerate()
                .map(|(idx, text)| Page {
                    index: idx + 1,
                    text,
                    ocr_used: false,
                })
                .collect(),
            ocr_used: false,
            total_pages,
        });
    }

    tracing::info!("falling back to OCR");
    let ocr_texts = ocr_pages(ocr_source, &page_numbers, &options.ocr);
    let any_ocr_text = ocr_texts.iter().any(|t| t.as_ref().is_some_and(|s| !s.is_empty()));

    if !any_ocr_text {
        if pages_read == 0 {
            return Err(ExtractError::Truncated {
                pages_read,
                total_pages,
            });
        }
        return Ok(ExtractedDocument {
            pages: native_texts
                .into_iter()
                .enumerate()
                .map(|(idx, text)| Page {
                    index: idx + 1,
                    text,
                    ocr_used: false,
                })
                .collect(),
            ocr_used: false,
            total_pages,
        });
    }

    let pages = ocr_texts
        .into_iter()
        .enumerate()
        .map(|(idx, text)| {
            let text = text.unwrap_or_default();
            Page {
                index: idx + 1,
                text,
                ocr_used: true,
            }
        })
        .collect();

    Ok(ExtractedDocument {
        pages,
        ocr_used: true,
        total_pages,
    })
}

fn normalize_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_blank_lines() {
        let text = "  hello  \n\n   \nworld\n";
        assert_eq!(normalize_text(text), "hello\nworld");
    }

    #[test]
    fn extract_from_bytes_rejects_garbage() {
        let options = ExtractOptions::default();
        let result = extract_from_bytes(b"not a pdf", &options);
        assert!(result.is_err());
    }
}
