// ============================================================================
// COLOUR SPACES — sRGB → XYZ / Lab / OKLCh, WCAG contrast
// ============================================================================
//
// Pure functions on single samples (eyedropper readout, contrast check).
// Malformed input is not validated; it simply produces NaN downstream.
// ============================================================================

use crate::error::{EditorError, Result};

/// D65 reference white, scaled to Y = 100.
const WHITE_D65: (f64, f64, f64) = (95.047, 100.0, 108.883);

/// WCAG AA threshold for normal text.
pub const WCAG_AA_RATIO: f64 = 4.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Lower-case `#rrggbb`.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Oklch {
    pub l: f64,
    pub c: f64,
    /// Degrees in [0, 360).
    pub h: f64,
}

/// Parse `#rrggbb` (leading `#` optional, case-insensitive).
pub fn parse_hex_color(hex: &str) -> Result<Rgb> {
    let s = hex.trim();
    let s = s.strip_prefix('#').unwrap_or(s);
    if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(EditorError::InvalidColor(hex.to_string()));
    }
    let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16)
        .map_err(|_| EditorError::InvalidColor(hex.to_string()));
    Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
}

/// sRGB transfer decode with the IEC threshold.
fn srgb_to_linear(c: u8) -> f64 {
    let c = c as f64 / 255.0;
    if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

/// Same curve with the older WCAG 2.x threshold.
fn wcag_linear(c: u8) -> f64 {
    let c = c as f64 / 255.0;
    if c <= 0.03928 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub fn rgb_to_xyz(rgb: Rgb) -> Xyz {
    let r = srgb_to_linear(rgb.r);
    let g = srgb_to_linear(rgb.g);
    let b = srgb_to_linear(rgb.b);

    let x = r * 0.4124564 + g * 0.3575761 + b * 0.1804375;
    let y = r * 0.2126729 + g * 0.7151522 + b * 0.0721750;
    let z = r * 0.0193339 + g * 0.1191920 + b * 0.9503041;

    Xyz { x: x * 100.0, y: y * 100.0, z: z * 100.0 }
}

fn lab_f(t: f64) -> f64 {
    let delta: f64 = 6.0 / 29.0;
    if t > delta.powi(3) {
        t.cbrt()
    } else {
        t / (3.0 * delta * delta) + 4.0 / 29.0
    }
}

pub fn xyz_to_lab(xyz: Xyz) -> Lab {
    let fx = lab_f(xyz.x / WHITE_D65.0);
    let fy = lab_f(xyz.y / WHITE_D65.1);
    let fz = lab_f(xyz.z / WHITE_D65.2);

    Lab {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

pub fn rgb_to_lab(rgb: Rgb) -> Lab {
    xyz_to_lab(rgb_to_xyz(rgb))
}

pub fn rgb_to_oklch(rgb: Rgb) -> Oklch {
    let r = srgb_to_linear(rgb.r);
    let g = srgb_to_linear(rgb.g);
    let b = srgb_to_linear(rgb.b);

    let l = 0.2126729 * r + 0.7151522 * g + 0.0721750 * b;
    let m = 0.6068909 * r + 0.1735011 * g + 0.2003480 * b;
    let s = 0.0231499 * r + 0.1411905 * g + 0.9180240 * b;

    // f64::cbrt keeps the sign
    let (l_, m_, s_) = (l.cbrt(), m.cbrt(), s.cbrt());

    let lab_l = 0.2104542553 * l_ + 0.7936177850 * m_ - 0.0040720468 * s_;
    let lab_a = 1.9779984951 * l_ - 2.4285922050 * m_ + 0.4505937099 * s_;
    let lab_b = 0.0259040371 * l_ + 0.7827717662 * m_ - 0.8086757660 * s_;

    let c = (lab_a * lab_a + lab_b * lab_b).sqrt();
    let mut h = lab_b.atan2(lab_a).to_degrees();
    if h < 0.0 {
        h += 360.0;
    }
    if h >= 360.0 {
        h -= 360.0;
    }

    Oklch { l: lab_l, c, h }
}

/// WCAG relative luminance in [0, 1].
pub fn relative_luminance(rgb: Rgb) -> f64 {
    0.2126 * wcag_linear(rgb.r) + 0.7152 * wcag_linear(rgb.g) + 0.0722 * wcag_linear(rgb.b)
}

/// Contrast ratio in [1, 21], symmetric in its arguments.
pub fn wcag_contrast(c1: Rgb, c2: Rgb) -> f64 {
    let l1 = relative_luminance(c1);
    let l2 = relative_luminance(c2);
    (l1.max(l2) + 0.05) / (l1.min(l2) + 0.05)
}

pub fn is_contrast_sufficient(ratio: f64) -> bool {
    ratio >= WCAG_AA_RATIO
}
