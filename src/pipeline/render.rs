//! Page rasterisation: the [`PageRasterizer`] seam and its pdfium implementation.
//!
//! pdfium is not async-safe and rendering is CPU-bound, so every pdfium call
//! runs inside `tokio::task::spawn_blocking`. The library is bound through
//! `pdfium-auto`, which downloads and caches libpdfium on first use.

use crate::error::{MindmapError, PageError};
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Counts and renders pages of a document. Page numbers are 1-based.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Number of pages in the document.
    async fn page_count(&self, path: &Path) -> Result<usize, MindmapError>;

    /// Render one page as PNG bytes, zoomed by `scale` (1.0 = 72 DPI).
    async fn render_page(
        &self,
        path: &Path,
        page_number: usize,
        scale: f32,
    ) -> Result<Vec<u8>, PageError>;
}

/// pdfium-backed rasterizer.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_rendered_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(max_rendered_pixels: u32) -> Self {
        Self {
            max_rendered_pixels,
        }
    }
}

impl Default for PdfiumRasterizer {
    fn default() -> Self {
        Self::new(2000)
    }
}

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn page_count(&self, path: &Path) -> Result<usize, MindmapError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || page_count_blocking(&path))
            .await
            .map_err(|e| MindmapError::Internal(format!("Page-count task panicked: {}", e)))?
    }

    async fn render_page(
        &self,
        path: &Path,
        page_number: usize,
        scale: f32,
    ) -> Result<Vec<u8>, PageError> {
        let path = path.to_path_buf();
        let max_pixels = self.max_rendered_pixels;
        tokio::task::spawn_blocking(move || render_page_blocking(&path, page_number, scale, max_pixels))
            .await
            .map_err(|e| PageError::TaskFailed {
                page: page_number,
                detail: format!("render task panicked: {}", e),
            })?
    }
}

fn bind() -> Result<Pdfium, String> {
    pdfium_auto::bind_pdfium_silent().map_err(|e| e.to_string())
}

/// Blocking implementation of page counting.
fn page_count_blocking(pdf_path: &Path) -> Result<usize, MindmapError> {
    let unreadable = |detail: String| MindmapError::UnreadableDocument {
        path: PathBuf::from(pdf_path),
        detail,
    };

    let pdfium = bind().map_err(unreadable)?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| unreadable(format!("{:?}", e)))?;

    let count = document.pages().len() as usize;
    debug!("PDF loaded: {} pages", count);
    Ok(count)
}

/// Blocking implementation of single-page rendering.
fn render_page_blocking(
    pdf_path: &Path,
    page_number: usize,
    scale: f32,
    max_pixels: u32,
) -> Result<Vec<u8>, PageError> {
    let failed = |detail: String| PageError::RenderFailed {
        page: page_number,
        detail,
    };

    if page_number == 0 {
        return Err(failed("page numbers are 1-based".into()));
    }

    let pdfium = bind().map_err(failed)?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| failed(format!("{:?}", e)))?;

    let pages = document.pages();
    let page = pages
        .get((page_number - 1) as u16)
        .map_err(|e| failed(format!("{:?}", e)))?;

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| failed(format!("{:?}", e)))?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        page_number,
        image.width(),
        image.height()
    );

    to_png(&image).map_err(|e| failed(format!("PNG encoding failed: {}", e)))
}

/// PNG is lossless; slide text stays crisp for the vision model.
fn to_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn to_png_writes_png_magic() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = to_png(&img).expect("encode should succeed");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn page_zero_is_rejected_before_binding() {
        let err = render_page_blocking(Path::new("deck.pdf"), 0, 1.0, 2000).unwrap_err();
        assert!(matches!(err, PageError::RenderFailed { page: 0, .. }));
    }
}
