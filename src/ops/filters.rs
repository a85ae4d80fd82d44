// ============================================================================
// IMAGE FILTERS — 3×3 convolution with clamp-to-edge padding
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use crate::canvas::PixelBuffer;
use crate::error::{EditorError, Result};

/// Row-major 3×3 kernel.
pub type Kernel = [[f32; 3]; 3];

/// Built-in kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum KernelPreset {
    #[default]
    Identity,
    Sharpen,
    Gaussian,
    BoxBlur,
    PrewittX,
    PrewittY,
}

impl KernelPreset {
    pub fn all() -> &'static [KernelPreset] {
        &[
            KernelPreset::Identity,
            KernelPreset::Sharpen,
            KernelPreset::Gaussian,
            KernelPreset::BoxBlur,
            KernelPreset::PrewittX,
            KernelPreset::PrewittY,
        ]
    }

    /// Identifier used on the command line.
    pub fn key(&self) -> &'static str {
        match self {
            KernelPreset::Identity => "identity",
            KernelPreset::Sharpen => "sharpen",
            KernelPreset::Gaussian => "gaussian",
            KernelPreset::BoxBlur => "box-blur",
            KernelPreset::PrewittX => "prewitt-x",
            KernelPreset::PrewittY => "prewitt-y",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            KernelPreset::Identity => "Identity",
            KernelPreset::Sharpen => "Sharpen",
            KernelPreset::Gaussian => "Gaussian Blur (3x3)",
            KernelPreset::BoxBlur => "Box Blur",
            KernelPreset::PrewittX => "Prewitt (X)",
            KernelPreset::PrewittY => "Prewitt (Y)",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|p| p.key() == key.to_lowercase())
    }

    pub fn kernel(&self) -> Kernel {
        match self {
            KernelPreset::Identity => [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]],
            KernelPreset::Sharpen => [[0.0, -1.0, 0.0], [-1.0, 5.0, -1.0], [0.0, -1.0, 0.0]],
            KernelPreset::Gaussian => [[1.0, 2.0, 1.0], [2.0, 4.0, 2.0], [1.0, 2.0, 1.0]],
            KernelPreset::BoxBlur => [[1.0; 3]; 3],
            KernelPreset::PrewittX => [[-1.0, 0.0, 1.0], [-1.0, 0.0, 1.0], [-1.0, 0.0, 1.0]],
            KernelPreset::PrewittY => [[-1.0, -1.0, -1.0], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
        }
    }

    pub fn divisor(&self) -> f32 {
        match self {
            KernelPreset::Gaussian => 16.0,
            KernelPreset::BoxBlur => 9.0,
            _ => 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterPreset {
    Named(KernelPreset),
    Custom,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterSettings {
    pub preset: FilterPreset,
    pub kernel: Kernel,
    pub divisor: f32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self::from_preset(KernelPreset::Identity)
    }
}

impl FilterSettings {
    pub fn from_preset(preset: KernelPreset) -> Self {
        Self {
            preset: FilterPreset::Named(preset),
            kernel: preset.kernel(),
            divisor: preset.divisor(),
        }
    }

    /// Custom kernel; `divisor: None` picks [`suggest_divisor`].
    pub fn custom(kernel: Kernel, divisor: Option<f32>) -> Self {
        Self {
            preset: FilterPreset::Custom,
            kernel,
            divisor: divisor.unwrap_or_else(|| suggest_divisor(&kernel)),
        }
    }

    pub fn apply(&self, src: &PixelBuffer) -> Result<PixelBuffer> {
        convolve(src, &self.kernel, self.divisor)
    }
}

/// Sum of the positive kernel entries, or 1 when there are none.
pub fn suggest_divisor(kernel: &Kernel) -> f32 {
    let sum: f32 = kernel.iter().flatten().filter(|v| **v > 0.0).sum();
    if sum > 0.0 { sum } else { 1.0 }
}

pub fn flatten_kernel(kernel: &Kernel) -> Vec<f32> {
    kernel.iter().flatten().copied().collect()
}

pub fn unflatten_kernel(values: &[f32]) -> Result<Kernel> {
    if values.len() != 9 {
        return Err(EditorError::InvalidKernelSize(values.len()));
    }
    Ok([
        [values[0], values[1], values[2]],
        [values[3], values[4], values[5]],
        [values[6], values[7], values[8]],
    ])
}

/// Add a 1-pixel border replicating the nearest edge pixel.
pub fn pad(src: &PixelBuffer) -> PixelBuffer {
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return RgbaImage::new(w + 2, h + 2);
    }
    RgbaImage::from_fn(w + 2, h + 2, |x, y| {
        let sx = x.saturating_sub(1).min(w - 1);
        let sy = y.saturating_sub(1).min(h - 1);
        *src.get_pixel(sx, sy)
    })
}

/// Convolve R, G and B with `kernel / divisor`; alpha is copied through.
pub fn convolve(src: &PixelBuffer, kernel: &Kernel, divisor: f32) -> Result<PixelBuffer> {
    if divisor == 0.0 || !divisor.is_finite() {
        return Err(EditorError::DivisionByZero("filter divisor must be a non-zero number"));
    }
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 {
        return Ok(src.clone());
    }

    let padded = pad(src);
    let p_raw = padded.as_raw();
    let p_stride = (w + 2) * 4;
    let src_raw = src.as_raw();
    let stride = w * 4;
    let mut dst_raw = vec![0u8; w * h * 4];

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            let pi = x * 4;
            for c in 0..3 {
                let mut sum = 0.0f32;
                for (ky, krow) in kernel.iter().enumerate() {
                    let row = (y + ky) * p_stride;
                    for (kx, &kv) in krow.iter().enumerate() {
                        sum += p_raw[row + (x + kx) * 4 + c] as f32 * kv;
                    }
                }
                let v = (sum / divisor).round();
                // NaN from non-finite kernel entries collapses to 0
                row_out[pi + c] = if v.is_nan() { 0 } else { v.clamp(0.0, 255.0) as u8 };
            }
            row_out[pi + 3] = src_raw[y * stride + pi + 3];
        }
    });

    RgbaImage::from_raw(w as u32, h as u32, dst_raw)
        .ok_or_else(|| EditorError::InvalidDimensions("convolution output size mismatch".into()))
}
