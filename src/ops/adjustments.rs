// ============================================================================
// TONE CURVES — two-point LUT, histogram
// ============================================================================
//
// A curve is two control points joined by a straight segment and held flat
// outside them. The LUT is applied either to R, G and B together or to alpha
// alone. Rows are processed in parallel via rayon.
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use crate::canvas::PixelBuffer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurvePoint {
    pub input: u8,
    pub output: u8,
}

impl CurvePoint {
    pub fn new(input: u8, output: u8) -> Self {
        Self { input, output }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CurveChannel {
    #[default]
    Rgb,
    Alpha,
}

impl CurveChannel {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "rgb" => Some(CurveChannel::Rgb),
            "alpha" | "a" => Some(CurveChannel::Alpha),
            _ => None,
        }
    }
}

/// `point1.input <= point2.input` is expected but not enforced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurvesSettings {
    pub point1: CurvePoint,
    pub point2: CurvePoint,
    pub target_channel: CurveChannel,
}

impl Default for CurvesSettings {
    fn default() -> Self {
        Self {
            point1: CurvePoint::new(0, 0),
            point2: CurvePoint::new(255, 255),
            target_channel: CurveChannel::Rgb,
        }
    }
}

pub type Lut = [u8; 256];

/// Build the 256-entry lookup table for a two-point curve.
///
/// Inputs at or below `p1.input` map to `p1.output`; at or above `p2.input`
/// to `p2.output`; in between the segment is interpolated. When both inputs
/// coincide the curve is a step at that input (the `<=` branch wins).
pub fn build_lut(p1: CurvePoint, p2: CurvePoint) -> Lut {
    let (x1, y1) = (p1.input as f32, p1.output as f32);
    let (x2, y2) = (p2.input as f32, p2.output as f32);

    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        let v = i as f32;
        let out = if v <= x1 {
            y1
        } else if v >= x2 {
            y2
        } else {
            // x2 > v > x1 here, so the width is never zero
            y1 + (v - x1) / (x2 - x1) * (y2 - y1)
        };
        *slot = out.round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Map the targeted channel(s) through the curve; everything else is copied.
pub fn apply_curve(src: &PixelBuffer, settings: &CurvesSettings) -> PixelBuffer {
    let lut = build_lut(settings.point1, settings.point2);
    apply_lut(src, &lut, settings.target_channel)
}

pub fn apply_lut(src: &PixelBuffer, lut: &Lut, channel: CurveChannel) -> PixelBuffer {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 {
        return src.clone();
    }
    let src_raw = src.as_raw();
    let stride = w * 4;
    let mut dst_raw = src_raw.clone();

    dst_raw.par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            match channel {
                CurveChannel::Rgb => {
                    px[0] = lut[px[0] as usize];
                    px[1] = lut[px[1] as usize];
                    px[2] = lut[px[2] as usize];
                }
                CurveChannel::Alpha => {
                    px[3] = lut[px[3] as usize];
                }
            }
        }
    });

    RgbaImage::from_raw(w as u32, h as u32, dst_raw).unwrap_or_else(|| src.clone())
}

// ============================================================================
// HISTOGRAM
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Histogram {
    pub red: [u32; 256],
    pub green: [u32; 256],
    pub blue: [u32; 256],
    pub alpha: [u32; 256],
    pub total: u64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self {
            red: [0; 256],
            green: [0; 256],
            blue: [0; 256],
            alpha: [0; 256],
            total: 0,
        }
    }
}

impl Histogram {
    fn merge(mut self, other: Histogram) -> Histogram {
        for i in 0..256 {
            self.red[i] += other.red[i];
            self.green[i] += other.green[i];
            self.blue[i] += other.blue[i];
            self.alpha[i] += other.alpha[i];
        }
        self.total += other.total;
        self
    }
}

/// Per-channel value counts in one pass over the pixels.
pub fn histogram(src: &PixelBuffer) -> Histogram {
    let stride = (src.width() as usize * 4).max(4);
    src.as_raw()
        .par_chunks(stride)
        .fold(Histogram::default, |mut hist, row| {
            for px in row.chunks_exact(4) {
                hist.red[px[0] as usize] += 1;
                hist.green[px[1] as usize] += 1;
                hist.blue[px[2] as usize] += 1;
                hist.alpha[px[3] as usize] += 1;
                hist.total += 1;
            }
            hist
        })
        .reduce(Histogram::default, Histogram::merge)
}

/// Scale counts so the tallest bucket equals `max_height`.
pub fn normalize_for_display(counts: &[u32; 256], max_height: f32) -> [f32; 256] {
    let mut out = [0.0f32; 256];
    let max = counts.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return out;
    }
    for (o, &c) in out.iter_mut().zip(counts.iter()) {
        *o = c as f32 / max as f32 * max_height;
    }
    out
}

/// Polyline of the curve in a `graph_size` square with y pointing down,
/// including the flat runs to the graph edges.
pub fn curve_points(p1: CurvePoint, p2: CurvePoint, graph_size: f32) -> Vec<(f32, f32)> {
    let scale = graph_size / 255.0;
    let y1 = graph_size - p1.output as f32 * scale;
    let y2 = graph_size - p2.output as f32 * scale;
    let mut points = Vec::with_capacity(4);

    if p1.input > 0 {
        points.push((0.0, y1));
    }
    points.push((p1.input as f32 * scale, y1));
    points.push((p2.input as f32 * scale, y2));
    if p2.input < 255 {
        points.push((graph_size, y2));
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient() -> PixelBuffer {
        RgbaImage::from_fn(256, 2, |x, y| {
            let v = x as u8;
            Rgba([v, 255 - v, v / 2, if y == 0 { v } else { 255 - v }])
        })
    }

    #[test]
    fn identity_curve_is_identity() {
        let src = gradient();
        let settings = CurvesSettings::default();
        assert_eq!(apply_curve(&src, &settings), src);
        let alpha = CurvesSettings { target_channel: CurveChannel::Alpha, ..settings };
        assert_eq!(apply_curve(&src, &alpha), src);
    }

    #[test]
    fn lut_clamps_outside_points() {
        let lut = build_lut(CurvePoint::new(50, 20), CurvePoint::new(200, 240));
        assert_eq!(lut[0], 20);
        assert_eq!(lut[50], 20);
        assert_eq!(lut[200], 240);
        assert_eq!(lut[255], 240);
        // midpoint of the segment
        assert_eq!(lut[125], 130);
    }

    #[test]
    fn inverted_curve() {
        let lut = build_lut(CurvePoint::new(0, 255), CurvePoint::new(255, 0));
        assert_eq!(lut[0], 255);
        assert_eq!(lut[255], 0);
        assert_eq!(lut[100], 155);
    }

    #[test]
    fn coincident_inputs_form_a_step() {
        let lut = build_lut(CurvePoint::new(128, 0), CurvePoint::new(128, 255));
        assert_eq!(lut[127], 0);
        assert_eq!(lut[128], 0);
        assert_eq!(lut[129], 255);
    }

    #[test]
    fn alpha_curve_leaves_rgb() {
        let src = gradient();
        let settings = CurvesSettings {
            point1: CurvePoint::new(0, 255),
            point2: CurvePoint::new(255, 255),
            target_channel: CurveChannel::Alpha,
        };
        let out = apply_curve(&src, &settings);
        for (o, s) in out.pixels().zip(src.pixels()) {
            assert_eq!(&o.0[..3], &s.0[..3]);
            assert_eq!(o[3], 255);
        }
    }

    #[test]
    fn rgb_curve_leaves_alpha() {
        let src = gradient();
        let settings = CurvesSettings {
            point1: CurvePoint::new(0, 0),
            point2: CurvePoint::new(0, 0),
            target_channel: CurveChannel::Rgb,
        };
        let out = apply_curve(&src, &settings);
        for (o, s) in out.pixels().zip(src.pixels()) {
            assert_eq!(&o.0[..3], &[0, 0, 0]);
            assert_eq!(o[3], s[3]);
        }
    }

    #[test]
    fn histogram_counts_every_pixel() {
        let src = gradient();
        let hist = histogram(&src);
        assert_eq!(hist.total, 512);
        assert!(hist.red.iter().all(|&c| c == 2));
        assert_eq!(hist.red.iter().map(|&c| c as u64).sum::<u64>(), 512);
        assert_eq!(hist.alpha.iter().map(|&c| c as u64).sum::<u64>(), 512);
        assert_eq!(hist.blue[0], 4);
    }

    #[test]
    fn histogram_of_empty_image() {
        let hist = histogram(&RgbaImage::new(0, 0));
        assert_eq!(hist.total, 0);
    }

    #[test]
    fn display_normalization() {
        let mut counts = [0u32; 256];
        counts[3] = 10;
        counts[7] = 5;
        let n = normalize_for_display(&counts, 100.0);
        assert_eq!(n[3], 100.0);
        assert_eq!(n[7], 50.0);
        assert_eq!(normalize_for_display(&[0; 256], 100.0)[0], 0.0);
    }

    #[test]
    fn curve_polyline_extends_to_edges() {
        let pts = curve_points(CurvePoint::new(51, 0), CurvePoint::new(204, 255), 255.0);
        assert_eq!(pts, vec![(0.0, 255.0), (51.0, 255.0), (204.0, 0.0), (255.0, 0.0)]);
        let full = curve_points(CurvePoint::new(0, 0), CurvePoint::new(255, 255), 255.0);
        assert_eq!(full.len(), 2);
    }

    #[test]
    fn channel_names() {
        assert_eq!(CurveChannel::from_name("RGB"), Some(CurveChannel::Rgb));
        assert_eq!(CurveChannel::from_name("alpha"), Some(CurveChannel::Alpha));
        assert_eq!(CurveChannel::from_name("red"), None);
    }
}
