//! Physical-size PDF assembly from rendered card sides.
//!
//! Each page is exactly the card's trim size in millimetres and carries one
//! full-bleed raster of the side, flattened onto white.

use printpdf::image_crate::{DynamicImage, RgbImage};
use printpdf::{Image, ImageTransform, Mm, PdfDocument, PdfDocumentReference};
use tiny_skia::Pixmap;

use crate::error::{RenderError, RenderResult};

const LAYER: &str = "Card";

/// Incrementally built multi-page PDF.
pub(crate) struct PdfWriter {
    title: String,
    width_mm: f64,
    height_mm: f64,
    doc: Option<PdfDocumentReference>,
    pages: usize,
}

impl PdfWriter {
    /// Start an empty document whose pages are `width_mm` x `height_mm`.
    pub(crate) fn new(title: &str, width_mm: f64, height_mm: f64) -> Self {
        Self {
            title: title.to_string(),
            width_mm,
            height_mm,
            doc: None,
            pages: 0,
        }
    }

    /// Pages added so far.
    pub(crate) fn pages(&self) -> usize {
        self.pages
    }

    /// Append a page showing `pixmap` stretched over the full page.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub(crate) fn add_page(&mut self, pixmap: &Pixmap) -> RenderResult<()> {
        let page_w = Mm(self.width_mm as f32);
        let page_h = Mm(self.height_mm as f32);
        let (page, layer) = match &self.doc {
            Some(doc) => doc.add_page(page_w, page_h, LAYER),
            None => {
                let (doc, page, layer) = PdfDocument::new(self.title.as_str(), page_w, page_h, LAYER);
                self.doc = Some(doc);
                (page, layer)
            }
        };
        let doc = self
            .doc
            .as_ref()
            .ok_or_else(|| RenderError::Pdf("document was not created".to_string()))?;
        let current_layer = doc.get_page(page).get_layer(layer);

        let image = Image::from_dynamic_image(&flatten_on_white(pixmap)?);

        // The image's natural size at this resolution is exactly the page width.
        let dpi = pixmap.width() as f32 / (self.width_mm as f32 / 25.4);
        let natural_height_mm = pixmap.height() as f32 / dpi * 25.4;
        let transform = ImageTransform {
            translate_x: Some(Mm(0.0)),
            translate_y: Some(Mm(0.0)),
            dpi: Some(dpi),
            scale_y: Some(self.height_mm as f32 / natural_height_mm),
            ..Default::default()
        };
        image.add_to_layer(current_layer, transform);

        self.pages += 1;
        Ok(())
    }

    /// Serialize the document, or `None` if no page was added.
    pub(crate) fn finish(self) -> RenderResult<Option<Vec<u8>>> {
        match self.doc {
            Some(doc) => doc
                .save_to_bytes()
                .map(Some)
                .map_err(|e| RenderError::Pdf(format!("PDF save failed: {e}"))),
            None => Ok(None),
        }
    }
}

/// Composite a premultiplied RGBA pixmap over white.
fn flatten_on_white(pixmap: &Pixmap) -> RenderResult<DynamicImage> {
    let mut rgb = Vec::with_capacity(pixmap.data().len() / 4 * 3);
    for px in pixmap.data().chunks_exact(4) {
        // Premultiplied: c <= a, so c + (255 - a) stays in range.
        let cover = 255 - px[3];
        rgb.extend(px[..3].iter().map(|c| c.saturating_add(cover)));
    }
    RgbImage::from_raw(pixmap.width(), pixmap.height(), rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| RenderError::Pdf("pixel buffer size mismatch".to_string()))
}
