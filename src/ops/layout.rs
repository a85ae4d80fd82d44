// ============================================================================
// VIEW LAYOUT — fit-to-viewport scale, pan-clamped placement, display render
// ============================================================================

use image::RgbaImage;
use image::imageops;

use crate::canvas::{ImageState, Layer, LayerStack, PixelBuffer, ViewTransform};
use crate::error::Result;
use crate::ops::compositor::{apply_alpha_channels, composite_stack};
use crate::ops::transform::{Interpolation, resize};

/// Margin kept around the image when fitting it to the viewport.
pub const DEFAULT_PADDING: u32 = 50;

pub const MIN_SCALE_PERCENT: u32 = 12;
pub const MAX_FIT_PERCENT: u32 = 100;

/// Largest on-screen margin the pan clamp insists on, in pixels.
const MAX_MIN_VISIBLE: f32 = 100.0;

/// Zoom percentage that fits the image inside the padded viewport.
/// Never upscales past 100% and never drops below 12%.
pub fn optimal_scale(img_w: u32, img_h: u32, view_w: u32, view_h: u32, padding: u32) -> u32 {
    if img_w == 0 || img_h == 0 {
        return MAX_FIT_PERCENT;
    }
    let avail_w = view_w as f64 - padding as f64 * 2.0;
    let avail_h = view_h as f64 - padding as f64 * 2.0;
    let scale = (avail_w / img_w as f64).min(avail_h / img_h as f64).min(1.0);
    let percent = (scale * 100.0).round();
    if percent.is_nan() || percent < MIN_SCALE_PERCENT as f64 {
        MIN_SCALE_PERCENT
    } else {
        percent as u32
    }
}

/// Where the scaled image lands in the viewport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// `round(dim * percent / 100)`.
pub fn scaled_size(width: u32, height: u32, scale_percent: u32) -> (u32, u32) {
    let f = scale_percent as f64 / 100.0;
    ((width as f64 * f).round() as u32, (height as f64 * f).round() as u32)
}

/// Center the scaled image, offset by `pan`, then clamp so that at least
/// `min(100, 10% of the scaled size)` stays visible on each axis.
pub fn place_with_pan(
    img_w: u32,
    img_h: u32,
    scale_percent: u32,
    view_w: u32,
    view_h: u32,
    pan: (f32, f32),
) -> Placement {
    let (width, height) = scaled_size(img_w, img_h, scale_percent);
    let x = clamp_axis(view_w as f32, width as f32, pan.0);
    let y = clamp_axis(view_h as f32, height as f32, pan.1);
    Placement { x, y, width, height }
}

fn clamp_axis(view: f32, size: f32, pan: f32) -> i32 {
    let pos = ((view - size) / 2.0 + pan).round();
    let min_visible = MAX_MIN_VISIBLE.min(size * 0.1);
    let max = view - min_visible;
    let min = -size + min_visible;
    // Bounds can be fractional; snap the clamped value back to whole pixels
    pos.max(min).min(max).round() as i32
}

/// Flatten the document at its original size: layers, then alpha channels.
/// A document with no layers shows its base image as-is.
pub fn flatten(stack: &LayerStack, image: &ImageState) -> Result<Option<PixelBuffer>> {
    let (w, h) = (image.original_width, image.original_height);
    if w == 0 || h == 0 {
        return Ok(None);
    }
    let composite = if stack.layers.is_empty() {
        match &image.image {
            Some(base) => composite_stack(&[Layer::new_image("base", base.clone())], w, h)?,
            None => return Ok(None),
        }
    } else {
        composite_stack(&stack.layers, w, h)?
    };
    Ok(Some(apply_alpha_channels(&composite, &stack.alpha_channels)))
}

/// Produce the display buffer: flatten, resample to the zoomed size and copy
/// it into a transparent viewport at the pan-clamped position.
pub fn render_view(
    stack: &LayerStack,
    image: &ImageState,
    view: &ViewTransform,
    viewport: (u32, u32),
    interpolation: Interpolation,
) -> Result<PixelBuffer> {
    let (vw, vh) = viewport;
    let mut out = RgbaImage::new(vw, vh);

    let Some(flat) = flatten(stack, image)? else {
        return Ok(out);
    };

    let place = place_with_pan(flat.width(), flat.height(), view.scale_percent, vw, vh, view.pan);
    if place.width == 0 || place.height == 0 {
        return Ok(out);
    }
    let scaled = if (place.width, place.height) == flat.dimensions() {
        flat
    } else {
        resize(&flat, place.width, place.height, interpolation)?
    };

    imageops::replace(&mut out, &scaled, place.x as i64, place.y as i64);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::BlendMode;
    use image::Rgba;

    #[test]
    fn small_images_stay_at_100() {
        assert_eq!(optimal_scale(100, 80, 1920, 1080, DEFAULT_PADDING), 100);
        assert_eq!(optimal_scale(1, 1, 200, 200, DEFAULT_PADDING), 100);
    }

    #[test]
    fn large_images_shrink_to_fit() {
        // (1000 - 100) / 1800 = 0.5
        assert_eq!(optimal_scale(1800, 900, 1000, 1000, DEFAULT_PADDING), 50);
        assert_eq!(optimal_scale(4000, 3000, 1100, 1100, DEFAULT_PADDING), 25);
    }

    #[test]
    fn scale_is_floored_at_12() {
        assert_eq!(optimal_scale(100_000, 100_000, 800, 600, DEFAULT_PADDING), 12);
        // Viewport smaller than the padding
        assert_eq!(optimal_scale(10, 10, 50, 50, DEFAULT_PADDING), 12);
    }

    #[test]
    fn scale_always_in_bounds() {
        for (iw, ih) in [(1, 1), (640, 480), (5000, 20), (20, 5000), (65535, 65535)] {
            for (vw, vh) in [(0, 0), (320, 240), (1920, 1080), (8000, 8000)] {
                let s = optimal_scale(iw, ih, vw, vh, DEFAULT_PADDING);
                assert!((MIN_SCALE_PERCENT..=MAX_FIT_PERCENT).contains(&s), "{}x{} in {}x{} -> {}", iw, ih, vw, vh, s);
            }
        }
    }

    #[test]
    fn centered_without_pan() {
        let p = place_with_pan(200, 100, 100, 1000, 500, (0.0, 0.0));
        assert_eq!(p, Placement { x: 400, y: 200, width: 200, height: 100 });
        let half = place_with_pan(200, 100, 50, 1000, 500, (10.0, -10.0));
        assert_eq!(half, Placement { x: 460, y: 215, width: 100, height: 50 });
    }

    #[test]
    fn pan_is_clamped_to_keep_image_visible() {
        // 2000 px wide: min visible = 100
        let right = place_with_pan(2000, 2000, 100, 800, 600, (1e6, 1e6));
        assert_eq!(right.x, 700);
        assert_eq!(right.y, 500);
        let left = place_with_pan(2000, 2000, 100, 800, 600, (-1e6, -1e6));
        assert_eq!(left.x, -1900);
        assert_eq!(left.y, -1900);
        // 200 px wide: min visible = 20
        let small = place_with_pan(200, 200, 100, 800, 600, (-1e6, 0.0));
        assert_eq!(small.x, -180);
    }

    #[test]
    fn render_view_blits_into_transparent_viewport() {
        let mut stack = LayerStack::default();
        stack.add_layer(Layer::new_color("bg", "#ff0000"));
        let image = ImageState { original_width: 4, original_height: 2, image: None };
        let view = ViewTransform::default();
        let out = render_view(&stack, &image, &view, (8, 6), Interpolation::Nearest).unwrap();
        assert_eq!(out.dimensions(), (8, 6));
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(2, 2).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(5, 3).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(6, 2)[3], 0);
    }

    #[test]
    fn render_view_zooms() {
        let mut stack = LayerStack::default();
        let img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
        stack.add_layer(Layer::new_image("img", img.clone()).with_blend(BlendMode::Normal, 1.0));
        let image = ImageState::from_image(img);
        let view = ViewTransform { scale_percent: 50, pan: (0.0, 0.0) };
        let out = render_view(&stack, &image, &view, (10, 10), Interpolation::Bilinear).unwrap();
        let painted = out.pixels().filter(|p| p[3] > 0).count();
        assert_eq!(painted, 4);
        assert_eq!(out.get_pixel(4, 4).0, [0, 0, 255, 255]);
    }

    #[test]
    fn render_view_of_empty_document() {
        let out = render_view(
            &LayerStack::default(),
            &ImageState::default(),
            &ViewTransform::default(),
            (3, 3),
            Interpolation::Bilinear,
        )
        .unwrap();
        assert!(out.pixels().all(|p| p[3] == 0));
    }
}
