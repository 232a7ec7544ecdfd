//! Scale policy: how far the document zooms and where it starts.

use docview_render::Size;
use serde::{Deserialize, Serialize};

/// Default space kept on each side of the widest page at the initial scale
pub const DEFAULT_FULL_WIDTH_MARGIN: i32 = 24;

/// Scales derived for one viewport size
///
/// Scales are absolute page scales. `page_margin` is in original page units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLimits {
    pub initial: f32,
    pub min: f32,
    pub mid: f32,
    pub max: f32,
    pub page_margin: i32,
}

impl Default for ScaleLimits {
    fn default() -> Self {
        Self {
            initial: 1.0,
            min: 1.0,
            mid: 1.0,
            max: 1.0,
            page_margin: 0,
        }
    }
}

impl ScaleLimits {
    /// Clamp an absolute scale into `[min, max]`
    pub fn clamp(&self, scale: f32) -> f32 {
        scale.clamp(self.min, self.max)
    }
}

/// Chooses scale limits from the viewport and page sizes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalePolicy {
    /// Widest page fills the view width minus `full_width_margin` per side
    ///
    /// The minimum scale fits the tallest page, the double tap scale is the
    /// larger of fit width and fit height, and the maximum is three view
    /// widths.
    FitWidth { full_width_margin: i32 },

    /// Fixed scales regardless of the viewport
    Fixed {
        initial: f32,
        min: f32,
        mid: f32,
        max: f32,
        page_margin: i32,
    },
}

impl Default for ScalePolicy {
    fn default() -> Self {
        ScalePolicy::FitWidth {
            full_width_margin: DEFAULT_FULL_WIDTH_MARGIN,
        }
    }
}

impl ScalePolicy {
    /// Limits for `view` showing `pages` (sizes after crop)
    pub fn limits(&self, view: Size, pages: &[Size]) -> ScaleLimits {
        match *self {
            ScalePolicy::FitWidth { full_width_margin } => {
                Self::fit_width(full_width_margin, view, pages)
            }
            ScalePolicy::Fixed {
                initial,
                min,
                mid,
                max,
                page_margin,
            } => ScaleLimits {
                initial,
                min,
                mid,
                max,
                page_margin,
            },
        }
    }

    fn fit_width(margin: i32, view: Size, pages: &[Size]) -> ScaleLimits {
        let max_width = pages.iter().map(|page| page.width).max().unwrap_or(0);
        let max_height = pages.iter().map(|page| page.height).max().unwrap_or(0);
        if max_width <= 0 || max_height <= 0 || view.is_empty() {
            return ScaleLimits::default();
        }

        let (width_scale, page_margin) = if view.width <= 2 * margin {
            (view.width as f32 / max_width as f32, 0)
        } else {
            let scale = (view.width - 2 * margin) as f32 / max_width as f32;
            (scale, (margin as f32 / scale) as i32)
        };
        let height_scale = view.height as f32 / (max_height + 2 * page_margin) as f32;

        let min = width_scale.min(height_scale);
        let mid = width_scale.max(height_scale);
        let max = (view.width as f32 * 3.0 / max_width as f32).max(mid);

        ScaleLimits {
            initial: width_scale,
            min,
            mid,
            max,
            page_margin,
        }
    }
}
