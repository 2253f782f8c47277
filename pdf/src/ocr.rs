use std::path::Path;

use crate::model::OcrOptions;

#[derive(Clone, Copy)]
#[cfg_attr(not(feature = "ocr"), allow(dead_code))]
pub(crate) enum OcrSource<'a> {
    Path(&'a Path),
    Bytes(&'a [u8]),
}

/// Rasterise `page_numbers` in batches of `options.batch_pages` and run OCR
/// over each batch, returning one recognised string (or `None` on a
/// per-page failure) per input page number, in the same order.
#[cfg(feature = "ocr")]
pub(crate) fn ocr_pages(
    source: OcrSource<'_>,
    page_numbers: &[u32],
    options: &OcrOptions,
) -> Vec<Option<String>> {
    use crate::pdfium::bind_pdfium;

    let Some(models) = options.paddle.as_ref() else {
        return vec![None; page_numbers.len()];
    };

    let Ok(pdfium) = bind_pdfium(options) else {
        tracing::warn!("pdfium library could not be bound; OCR skipped");
        return vec![None; page_numbers.len()];
    };

    let doc = match source {
        OcrSource::Path(path) => pdfium.load_pdf_from_file(path, None),
        OcrSource::Bytes(bytes) => pdfium.load_pdf_from_byte_vec(bytes.to_vec(), None),
    };
    let Ok(doc) = doc else {
        tracing::warn!("pdfium failed to open document for OCR");
        return vec![None; page_numbers.len()];
    };

    let Ok(mut ocr) = build_ocr_pipeline(models) else {
        tracing::warn!("OCR pipeline failed to initialize");
        return vec![None; page_numbers.len()];
    };

    let mut results = vec![None; page_numbers.len()];
    let batch_size = options.batch_pages.max(1);

    for batch_start in (0..page_numbers.len()).step_by(batch_size) {
        let batch_end = (batch_start + batch_size).min(page_numbers.len());
        let batch = &page_numbers[batch_start..batch_end];
        tracing::info!(
            batch_start,
            batch_end,
            total = page_numbers.len(),
            "rendering OCR batch"
        );

        let images: Vec<_> = batch
            .iter()
            .filter_map(|&page_number| render_page_to_rgb(&doc, page_number, options.dpi))
            .collect();
        if images.is_empty() {
            continue;
        }

        let Ok(predictions) = ocr.predict(images) else {
            tracing::warn!(batch_start, "OCR recognition failed for batch");
            continue;
        };

        for (offset, prediction) in predictions.into_iter().enumerate() {
            let text = join_text_regions(prediction);
            if let Some(slot) = results.get_mut(batch_start + offset) {
                *slot = text;
            }
        }
    }

    results
}

#[cfg(not(feature = "ocr"))]
pub(crate) fn ocr_pages(
    _source: OcrSource<'_>,
    page_numbers: &[u32],
    _options: &OcrOptions,
) -> Vec<Option<String>> {
    vec![None; page_numbers.len()]
}

#[cfg(feature = "ocr")]
fn join_text_regions(result: oar_ocr::oarocr::OAROCRResult) -> Option<String> {
    let mut lines = Vec::new();
    for region in result.text_regions {
        if let Some(text) = region.text {
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[cfg(feature = "ocr")]
fn build_ocr_pipeline(
    models: &crate::model::PaddleOcrConfig,
) -> std::result::Result<oar_ocr::oarocr::OAROCR, oar_ocr::error::OCRError> {
    let mut builder = oar_ocr::oarocr::OAROCRBuilder::new(
        &models.det_model_path,
        &models.rec_model_path,
        &models.char_dict_path,
    );
    if let Some(cls) = models.cls_model_path.as_deref() {
        builder = builder.with_text_line_orientation_classification(cls);
    }
    builder.image_batch_size(8).region_batch_size(16).build()
}

#[cfg(feature = "ocr")]
fn render_page_to_rgb(
    doc: &pdfium_render::prelude::PdfDocument<'_>,
    page_number: u32,
    dpi: u16,
) -> Option<image::RgbImage> {
    use pdfium_render::prelude::*;

    let page_index = page_number.checked_sub(1)? as u16;
    let page = doc.pages().get(page_index).ok()?;

    let width_pt = page.width().value.max(1.0);
    let dpi = dpi.max(72);
    let target_width = ((width_pt / 72.0) * f32::from(dpi)).round().max(256.0) as i32;

    let render_config = PdfRenderConfig::new()
        .set_target_width(target_width)
        .rotate_if_landscape(PdfPageRenderRotation::None, true);

    let image = page
        .render_with_config(&render_config)
        .ok()?
        .as_image()
        .into_rgb8();
    Some(image)
}
