//! The decoder contract consumed by the render scheduler.

use crate::{PixelBuffer, Rect, Size};

/// Errors reported by a [`Renderer`]
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image decode error: {0}")]
    Decode(#[from] image::ImageError),
    #[error("document is not open")]
    NotOpen,
    #[error("document has no pages")]
    EmptyDocument,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: usize, page_count: usize },
    #[error("failed to render page {page}: {reason}")]
    Page { page: usize, reason: String },
    #[error("backend error: {0}")]
    Backend(String),
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Decoder for one document
///
/// Implementations are driven from a single worker thread, so they need to be
/// `Send` but never see concurrent calls. `open` is called exactly once
/// before any rendering; `release` is called when the document is replaced
/// or the scheduler shuts down.
pub trait Renderer: Send {
    /// Open the document and return the original size of every page
    fn open(&mut self) -> RenderResult<Vec<Size>>;

    /// Original page sizes, empty until `open` succeeds
    fn pages_size(&self) -> &[Size];

    /// Render `region` of `page` at `scale` into the top-left corner of `buffer`
    ///
    /// `region` is expressed in scaled page pixels. Pixels of the buffer
    /// outside the region are left untouched.
    fn render_page_clip(
        &mut self,
        buffer: &mut PixelBuffer,
        page: usize,
        scale: f32,
        region: Rect,
    ) -> RenderResult<()>;

    /// Close the document and drop decoder resources
    fn release(&mut self);

    fn page_count(&self) -> usize {
        self.pages_size().len()
    }
}

/// Look up the original size of `page`, failing with `PageOutOfRange`
pub fn page_size(pages: &[Size], page: usize) -> RenderResult<Size> {
    pages.get(page).copied().ok_or(RenderError::PageOutOfRange {
        page,
        page_count: pages.len(),
    })
}
