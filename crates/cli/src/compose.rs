//! Paint a viewer draw list into an RGBA image.

use docview_render::{Rect, Rgba, WHITE};
use docview_viewer::{DrawItem, DrawList};
use image::RgbaImage;

/// Color behind the pages
pub const BACKDROP: Rgba<u8> = Rgba([64, 64, 64, 255]);

/// Composite `list` the way a host would paint it
///
/// Page backgrounds are filled white, tiles are copied with nearest
/// neighbour sampling so thumbnails stretch over their destination, and
/// placeholders leave the page background visible.
pub fn compose(list: &DrawList<'_>) -> RgbaImage {
    let view = list.view_size();
    let mut image = RgbaImage::from_pixel(
        view.width.max(0) as u32,
        view.height.max(0) as u32,
        BACKDROP,
    );
    let frame = Rect::from_size(view);

    for item in list.iter() {
        match item {
            DrawItem::PageBackground { dst, .. } => fill(&mut image, &frame, dst, WHITE),
            DrawItem::Tile {
                dst, src, buffer, ..
            } => {
                let Some(visible) = dst.intersection(&frame) else {
                    continue;
                };
                let max_x = buffer.width().saturating_sub(1);
                let max_y = buffer.height().saturating_sub(1);

                for y in visible.top..visible.bottom {
                    let sy = src.top + (y - dst.top) * src.height() / dst.height();
                    for x in visible.left..visible.right {
                        let sx = src.left + (x - dst.left) * src.width() / dst.width();
                        let pixel = buffer.pixel(
                            (sx.max(0) as u32).min(max_x),
                            (sy.max(0) as u32).min(max_y),
                        );
                        image.put_pixel(x as u32, y as u32, pixel);
                    }
                }
            }
            DrawItem::Placeholder { .. } => {}
        }
    }
    image
}

fn fill(image: &mut RgbaImage, frame: &Rect, rect: &Rect, color: Rgba<u8>) {
    let Some(visible) = rect.intersection(frame) else {
        return;
    };
    for y in visible.top..visible.bottom {
        for x in visible.left..visible.right {
            image.put_pixel(x as u32, y as u32, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docview_render::{PatternRenderer, Size};
    use docview_viewer::{DocumentViewer, ScalePolicy, ViewerConfig};
    use std::time::Duration;

    fn viewer() -> DocumentViewer {
        let config = ViewerConfig::default().with_scale_policy(ScalePolicy::Fixed {
            initial: 1.0,
            min: 0.5,
            mid: 1.0,
            max: 2.0,
            page_margin: 10,
        });
        let mut viewer = DocumentViewer::new(config).unwrap();
        viewer.resize(300, 300);
        viewer.open(Box::new(PatternRenderer::uniform(1, Size::new(256, 256))));
        assert!(viewer.pump_until_idle(Duration::from_secs(10)));
        viewer
    }

    #[test]
    fn test_compose_places_page_in_view() {
        let viewer = viewer();
        // A 276 pixel document centered in 300 pixels starts at -12
        assert_eq!(viewer.offset(), (-12, -12));

        let image = compose(&viewer.draw_list());
        assert_eq!(image.dimensions(), (300, 300));
        assert_eq!(*image.get_pixel(2, 2), BACKDROP);
        assert_eq!(
            *image.get_pixel(27, 27),
            PatternRenderer::color_at(0, 1.0, 5, 5)
        );
        assert_eq!(
            *image.get_pixel(22 + 200, 22 + 40),
            PatternRenderer::color_at(0, 1.0, 200, 40)
        );
    }

    #[test]
    fn test_compose_while_zooming_covers_page() {
        let mut viewer = viewer();
        viewer.zoom_to(2.0, 0.0, 0.0);
        assert!(viewer.pump_until_idle(Duration::from_secs(10)));
        assert_eq!(viewer.offset(), (0, 0));

        let image = compose(&viewer.draw_list());
        // The page starts at twice the margin and runs past the view
        for y in 20..300 {
            for x in 20..300 {
                assert_ne!(*image.get_pixel(x, y), BACKDROP, "({x}, {y})");
            }
        }
        assert_eq!(*image.get_pixel(10, 10), BACKDROP);
    }
}
