// ============================================================================
// RESAMPLING — nearest-neighbour and bilinear resize
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use crate::canvas::PixelBuffer;
use crate::error::{EditorError, Result};

/// Interpolation method for resize operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
}

impl Interpolation {
    pub fn all() -> &'static [Interpolation] {
        &[Interpolation::Nearest, Interpolation::Bilinear]
    }

    pub fn key(&self) -> &'static str {
        match self {
            Interpolation::Nearest => "nearest",
            Interpolation::Bilinear => "bilinear",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Interpolation::Nearest => "Nearest neighbour",
            Interpolation::Bilinear => "Bilinear",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_lowercase().as_str() {
            "nearest" | "nn" => Some(Interpolation::Nearest),
            "bilinear" | "linear" => Some(Interpolation::Bilinear),
            _ => None,
        }
    }
}

pub const MAX_RESIZE_PIXELS: u32 = 10_000;
pub const MAX_RESIZE_PERCENT: u32 = 1_000;

/// Requested output size, either absolute or relative to the current size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeTarget {
    Pixels { width: u32, height: u32 },
    Percent { width: u32, height: u32 },
}

impl ResizeTarget {
    /// Absolute size for an image of `orig_w × orig_h`, validated against
    /// 1..=10000 px or 1..=1000 %.
    pub fn resolve(&self, orig_w: u32, orig_h: u32) -> Result<(u32, u32)> {
        match *self {
            ResizeTarget::Pixels { width, height } => {
                for v in [width, height] {
                    if !(1..=MAX_RESIZE_PIXELS).contains(&v) {
                        return Err(EditorError::InvalidDimensions(format!(
                            "{} px is outside 1..={}",
                            v, MAX_RESIZE_PIXELS
                        )));
                    }
                }
                Ok((width, height))
            }
            ResizeTarget::Percent { width, height } => {
                for v in [width, height] {
                    if !(1..=MAX_RESIZE_PERCENT).contains(&v) {
                        return Err(EditorError::InvalidDimensions(format!(
                            "{}% is outside 1..={}",
                            v, MAX_RESIZE_PERCENT
                        )));
                    }
                }
                let w = (width as f64 / 100.0 * orig_w as f64).round() as u32;
                let h = (height as f64 / 100.0 * orig_h as f64).round() as u32;
                Ok((w.max(1), h.max(1)))
            }
        }
    }
}

/// Height matching `new_w` under the original aspect ratio.
pub fn keep_aspect_height(orig_w: u32, orig_h: u32, new_w: u32) -> u32 {
    if orig_w == 0 || orig_h == 0 {
        return new_w;
    }
    let aspect = orig_w as f64 / orig_h as f64;
    ((new_w as f64 / aspect).round() as u32).max(1)
}

/// Resize `src` to `dst_w × dst_h`. Both source and target must be non-empty.
pub fn resize(src: &PixelBuffer, dst_w: u32, dst_h: u32, interp: Interpolation) -> Result<PixelBuffer> {
    if dst_w == 0 || dst_h == 0 || src.width() == 0 || src.height() == 0 {
        return Err(EditorError::InvalidDimensions(format!(
            "cannot resize {}x{} to {}x{}",
            src.width(),
            src.height(),
            dst_w,
            dst_h
        )));
    }
    Ok(match interp {
        Interpolation::Nearest => nearest_neighbor(src, dst_w, dst_h),
        Interpolation::Bilinear => bilinear(src, dst_w, dst_h),
    })
}

/// Each output pixel copies the source pixel at `round(x * sw / dw)`, clamped.
///
/// # Panics
/// On an empty source or target; [`resize`] rejects those with an error.
pub fn nearest_neighbor(src: &PixelBuffer, dst_w: u32, dst_h: u32) -> PixelBuffer {
    debug_assert!(src.width() > 0 && src.height() > 0 && dst_w > 0 && dst_h > 0);
    let (sw, sh) = (src.width() as usize, src.height() as usize);
    let (dw, dh) = (dst_w as usize, dst_h as usize);
    let x_ratio = sw as f64 / dw as f64;
    let y_ratio = sh as f64 / dh as f64;
    let src_raw = src.as_raw();

    // Column lookup is shared by every row
    let src_cols: Vec<usize> = (0..dw)
        .map(|x| ((x as f64 * x_ratio).round() as usize).min(sw - 1))
        .collect();

    let mut dst_raw = vec![0u8; dw * dh * 4];
    dst_raw.par_chunks_mut(dw * 4).enumerate().for_each(|(y, row_out)| {
        let sy = ((y as f64 * y_ratio).round() as usize).min(sh - 1);
        let row_in = &src_raw[sy * sw * 4..(sy + 1) * sw * 4];
        for (x, &sx) in src_cols.iter().enumerate() {
            row_out[x * 4..x * 4 + 4].copy_from_slice(&row_in[sx * 4..sx * 4 + 4]);
        }
    });

    RgbaImage::from_raw(dst_w, dst_h, dst_raw).unwrap_or_else(|| RgbaImage::new(dst_w, dst_h))
}

/// Sample at `x * (sw - 1) / dw`, blending the four surrounding pixels.
/// All four channels, alpha included, are interpolated and rounded.
///
/// # Panics
/// On an empty source or target; [`resize`] rejects those with an error.
pub fn bilinear(src: &PixelBuffer, dst_w: u32, dst_h: u32) -> PixelBuffer {
    debug_assert!(src.width() > 0 && src.height() > 0 && dst_w > 0 && dst_h > 0);
    let (sw, sh) = (src.width() as usize, src.height() as usize);
    let (dw, dh) = (dst_w as usize, dst_h as usize);
    let x_ratio = (sw - 1) as f64 / dw as f64;
    let y_ratio = (sh - 1) as f64 / dh as f64;
    let src_raw = src.as_raw();

    let mut dst_raw = vec![0u8; dw * dh * 4];
    dst_raw.par_chunks_mut(dw * 4).enumerate().for_each(|(y, row_out)| {
        let src_y = y as f64 * y_ratio;
        let y1 = src_y.floor() as usize;
        let y2 = (y1 + 1).min(sh - 1);
        let fy = src_y - y1 as f64;

        for x in 0..dw {
            let src_x = x as f64 * x_ratio;
            let x1 = src_x.floor() as usize;
            let x2 = (x1 + 1).min(sw - 1);
            let fx = src_x - x1 as f64;

            let tl = (y1 * sw + x1) * 4;
            let tr = (y1 * sw + x2) * 4;
            let bl = (y2 * sw + x1) * 4;
            let br = (y2 * sw + x2) * 4;

            for c in 0..4 {
                let top = src_raw[tl + c] as f64 * (1.0 - fx) + src_raw[tr + c] as f64 * fx;
                let bottom = src_raw[bl + c] as f64 * (1.0 - fx) + src_raw[br + c] as f64 * fx;
                let v = top * (1.0 - fy) + bottom * fy;
                row_out[x * 4 + c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    RgbaImage::from_raw(dst_w, dst_h, dst_raw).unwrap_or_else(|| RgbaImage::new(dst_w, dst_h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checker(w: u32, h: u32) -> PixelBuffer {
        RgbaImage::from_fn(w, h, |x, y| {
            let v = if (x + y) % 2 == 0 { 255 } else { 0 };
            Rgba([v, 0, 255 - v, 200])
        })
    }

    #[test]
    fn nearest_same_size_is_identity() {
        let src = checker(5, 4);
        assert_eq!(nearest_neighbor(&src, 5, 4), src);
    }

    #[test]
    fn nearest_upscale_replicates_pixels() {
        let mut src = RgbaImage::new(2, 1);
        src.put_pixel(0, 0, Rgba([10, 20, 30, 40]));
        src.put_pixel(1, 0, Rgba([50, 60, 70, 80]));
        let out = nearest_neighbor(&src, 4, 1);
        // x * 0.5 rounded: 0, 1 (0.5 rounds away from zero), 1, 2 → clamped to 1
        assert_eq!(out.get_pixel(0, 0).0, [10, 20, 30, 40]);
        assert_eq!(out.get_pixel(1, 0).0, [50, 60, 70, 80]);
        assert_eq!(out.get_pixel(3, 0).0, [50, 60, 70, 80]);
    }

    #[test]
    fn nearest_copies_only_source_values() {
        let src = checker(7, 3);
        let out = nearest_neighbor(&src, 13, 11);
        for px in out.pixels() {
            assert!(src.pixels().any(|s| s == px));
        }
    }

    #[test]
    fn bilinear_interpolates_between_columns() {
        let mut src = RgbaImage::new(3, 1);
        src.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        src.put_pixel(1, 0, Rgba([100, 100, 100, 100]));
        src.put_pixel(2, 0, Rgba([200, 200, 200, 200]));
        let out = bilinear(&src, 4, 1);
        // ratio (3-1)/4 = 0.5 → samples at 0, 0.5, 1.0, 1.5
        let got: Vec<u8> = out.pixels().map(|p| p[0]).collect();
        assert_eq!(got, vec![0, 50, 100, 150]);
        assert_eq!(out.get_pixel(1, 0)[3], 50);
    }

    #[test]
    fn bilinear_on_uniform_image_is_uniform() {
        let src = RgbaImage::from_pixel(9, 6, Rgba([12, 34, 56, 78]));
        let out = bilinear(&src, 4, 17);
        assert!(out.pixels().all(|p| p.0 == [12, 34, 56, 78]));
    }

    #[test]
    fn bilinear_single_pixel_source() {
        let src = RgbaImage::from_pixel(1, 1, Rgba([1, 2, 3, 4]));
        let out = bilinear(&src, 3, 2);
        assert_eq!(out.dimensions(), (3, 2));
        assert!(out.pixels().all(|p| p.0 == [1, 2, 3, 4]));
    }

    #[test]
    fn resize_targets_resolve_and_validate() {
        let px = ResizeTarget::Pixels { width: 640, height: 480 };
        assert_eq!(px.resolve(10, 10).unwrap(), (640, 480));
        assert!(ResizeTarget::Pixels { width: 0, height: 5 }.resolve(10, 10).is_err());
        assert!(ResizeTarget::Pixels { width: 10_001, height: 5 }.resolve(10, 10).is_err());

        let pct = ResizeTarget::Percent { width: 50, height: 200 };
        assert_eq!(pct.resolve(101, 30).unwrap(), (51, 60));
        assert!(ResizeTarget::Percent { width: 1_001, height: 100 }.resolve(10, 10).is_err());
        assert_eq!(ResizeTarget::Percent { width: 1, height: 1 }.resolve(10, 10).unwrap(), (1, 1));
    }

    #[test]
    fn aspect_height() {
        assert_eq!(keep_aspect_height(1920, 1080, 960), 540);
        assert_eq!(keep_aspect_height(3, 2, 100), 67);
    }

    #[test]
    fn resize_rejects_zero_target() {
        let src = checker(2, 2);
        assert!(resize(&src, 0, 2, Interpolation::Nearest).is_err());
        assert!(resize(&RgbaImage::new(0, 0), 2, 2, Interpolation::Bilinear).is_err());
        assert!(resize(&RgbaImage::new(3, 0), 2, 2, Interpolation::Nearest).is_err());
        assert!(resize(&src, 2, 0, Interpolation::Bilinear).is_err());
        assert_eq!(resize(&src, 3, 5, Interpolation::Bilinear).unwrap().dimensions(), (3, 5));
    }
}
