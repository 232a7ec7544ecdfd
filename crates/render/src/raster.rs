//! Renderer for a single large raster image
//!
//! The whole image is one page. Tiles are produced by nearest-neighbour
//! sampling of the decoded image at the requested scale.

use crate::renderer::page_size;
use crate::{DocumentSource, PixelBuffer, Rect, RenderError, RenderResult, Renderer, Size};
use image::RgbaImage;

pub struct ImageRenderer {
    source: Option<DocumentSource>,
    image: Option<RgbaImage>,
    pages: Vec<Size>,
}

impl ImageRenderer {
    /// Create a renderer that decodes `source` when opened
    pub fn new(source: impl Into<DocumentSource>) -> Self {
        Self {
            source: Some(source.into()),
            image: None,
            pages: Vec::new(),
        }
    }

    /// Create a renderer over an already decoded image
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            source: None,
            image: Some(image),
            pages: Vec::new(),
        }
    }
}

impl Renderer for ImageRenderer {
    fn open(&mut self) -> RenderResult<Vec<Size>> {
        if self.image.is_none() {
            let source = self
                .source
                .take()
                .ok_or_else(|| RenderError::Backend("image source already consumed".into()))?;
            let bytes = source.read_all()?;
            let decoded = image::load_from_memory(&bytes)?.to_rgba8();
            tracing::debug!(
                width = decoded.width(),
                height = decoded.height(),
                "decoded image"
            );
            self.image = Some(decoded);
        }

        let image = self.image.as_ref().ok_or(RenderError::NotOpen)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(RenderError::EmptyDocument);
        }
        self.pages = vec![Size::new(image.width() as i32, image.height() as i32)];
        Ok(self.pages.clone())
    }

    fn pages_size(&self) -> &[Size] {
        &self.pages
    }

    fn render_page_clip(
        &mut self,
        buffer: &mut PixelBuffer,
        page: usize,
        scale: f32,
        region: Rect,
    ) -> RenderResult<()> {
        let image = self.image.as_ref().ok_or(RenderError::NotOpen)?;
        let size = page_size(&self.pages, page)?;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(RenderError::Page {
                page,
                reason: format!("invalid scale {scale}"),
            });
        }

        let scaled_width = (size.width as f32 * scale) as i32;
        let scaled_height = (size.height as f32 * scale) as i32;
        let width = region.width().min(buffer.width() as i32);
        let height = region.height().min(buffer.height() as i32);
        let max_x = image.width() - 1;
        let max_y = image.height() - 1;

        for dy in 0..height {
            let y = region.top + dy;
            if y < 0 || y >= scaled_height {
                continue;
            }
            let sy = (((y as f32 + 0.5) / scale) as u32).min(max_y);
            for dx in 0..width {
                let x = region.left + dx;
                if x < 0 || x >= scaled_width {
                    continue;
                }
                let sx = (((x as f32 + 0.5) / scale) as u32).min(max_x);
                buffer.put_pixel(dx as u32, dy as u32, *image.get_pixel(sx, sy));
            }
        }

        Ok(())
    }

    fn release(&mut self) {
        self.image = None;
        self.pages.clear();
    }
}
