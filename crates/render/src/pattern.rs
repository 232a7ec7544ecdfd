//! Synthetic renderer producing checkerboard pages
//!
//! Useful wherever a real decoder is not available: tests, demos and
//! benchmarks of the tiling engine. Pages can be configured to fail so error
//! paths can be exercised.

use crate::renderer::page_size;
use crate::{PixelBuffer, Rect, RenderError, RenderResult, Renderer, Size};
use image::Rgba;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Checker square edge in original page units
const CHECKER: i32 = 32;

const TINTS: [[u8; 3]; 4] = [
    [230, 240, 255],
    [255, 238, 226],
    [232, 252, 232],
    [250, 248, 220],
];

pub struct PatternRenderer {
    pages: Vec<Size>,
    opened: Vec<Size>,
    open_error: Option<String>,
    failing_pages: HashSet<usize>,
    opened_pages: HashSet<usize>,
    error_pages: HashSet<usize>,
    delay: Option<Duration>,
    render_calls: Arc<AtomicUsize>,
}

impl PatternRenderer {
    pub fn new(pages: Vec<Size>) -> Self {
        Self {
            pages,
            opened: Vec::new(),
            open_error: None,
            failing_pages: HashSet::new(),
            opened_pages: HashSet::new(),
            error_pages: HashSet::new(),
            delay: None,
            render_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `count` pages of the same size
    pub fn uniform(count: usize, size: Size) -> Self {
        Self::new(vec![size; count])
    }

    /// Make `open` fail with `message`
    pub fn with_open_error(mut self, message: impl Into<String>) -> Self {
        self.open_error = Some(message.into());
        self
    }

    /// Make every render of `page` fail
    pub fn with_failing_page(mut self, page: usize) -> Self {
        self.failing_pages.insert(page);
        self
    }

    /// Sleep for `delay` inside every render call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared counter of render calls that reached the page
    pub fn render_calls(&self) -> Arc<AtomicUsize> {
        self.render_calls.clone()
    }

    /// Color of the pattern at scaled page position (`x`, `y`)
    pub fn color_at(page: usize, scale: f32, x: i32, y: i32) -> Rgba<u8> {
        let [r, g, b] = TINTS[page % TINTS.len()];
        let ox = (x as f32 / scale) as i32 / CHECKER;
        let oy = (y as f32 / scale) as i32 / CHECKER;
        if (ox + oy) % 2 == 0 {
            Rgba([r, g, b, 255])
        } else {
            Rgba([
                (r as u16 * 7 / 8) as u8,
                (g as u16 * 7 / 8) as u8,
                (b as u16 * 7 / 8) as u8,
                255,
            ])
        }
    }

    /// Open a page once; failures are remembered until the next `open`
    fn open_page(&mut self, page: usize) -> RenderResult<()> {
        if self.opened_pages.contains(&page) {
            return Ok(());
        }
        if self.error_pages.contains(&page) || self.failing_pages.contains(&page) {
            self.error_pages.insert(page);
            return Err(RenderError::Page {
                page,
                reason: "page could not be opened".to_string(),
            });
        }
        self.opened_pages.insert(page);
        Ok(())
    }
}

impl Renderer for PatternRenderer {
    fn open(&mut self) -> RenderResult<Vec<Size>> {
        if let Some(message) = &self.open_error {
            return Err(RenderError::Backend(message.clone()));
        }
        if self.pages.is_empty() {
            return Err(RenderError::EmptyDocument);
        }
        self.opened_pages.clear();
        self.error_pages.clear();
        self.opened = self.pages.clone();
        Ok(self.opened.clone())
    }

    fn pages_size(&self) -> &[Size] {
        &self.opened
    }

    fn render_page_clip(
        &mut self,
        buffer: &mut PixelBuffer,
        page: usize,
        scale: f32,
        region: Rect,
    ) -> RenderResult<()> {
        if self.opened.is_empty() {
            return Err(RenderError::NotOpen);
        }
        let size = page_size(&self.opened, page)?;
        self.open_page(page)?;

        self.render_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let scaled_width = (size.width as f32 * scale) as i32;
        let scaled_height = (size.height as f32 * scale) as i32;
        let width = region.width().min(buffer.width() as i32);
        let height = region.height().min(buffer.height() as i32);

        for dy in 0..height {
            let y = region.top + dy;
            if y < 0 || y >= scaled_height {
                continue;
            }
            for dx in 0..width {
                let x = region.left + dx;
                if x < 0 || x >= scaled_width {
                    continue;
                }
                buffer.put_pixel(dx as u32, dy as u32, Self::color_at(page, scale, x, y));
            }
        }

        Ok(())
    }

    fn release(&mut self) {
        self.opened.clear();
        self.opened_pages.clear();
        self.error_pages.clear();
    }
}
