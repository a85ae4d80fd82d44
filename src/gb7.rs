// ============================================================================
// GRAYBIT-7 CODEC
// ============================================================================
//
// Layout (all multi-byte fields big-endian):
//
//   0..4   signature   47 42 37 1D
//   4      version     must be 1
//   5      flags       bit0 = has mask
//   6..8   width       u16
//   8..10  height      u16
//   10..12 reserved    u16
//   12..   width*height bytes: bits 0-6 gray (0..=127), bit 7 mask (1 = opaque)
// ============================================================================

use image::{GrayImage, Luma, Rgba, RgbaImage};

use crate::canvas::{MaskBuffer, PixelBuffer};
use crate::error::{EditorError, Result};

pub const SIGNATURE: [u8; 4] = [0x47, 0x42, 0x37, 0x1D];
pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 12;
pub const COLOR_DEPTH: u8 = 7;

pub const FLAG_HAS_MASK: u8 = 0x01;
const MASK_BIT: u8 = 0x80;
const GRAY_BITS: u8 = 0x7F;

/// Alpha at or above this counts as opaque when packing the mask bit.
const OPAQUE_THRESHOLD: u8 = 128;

/// A decoded GrayBit-7 file, still in its packed per-pixel form.
#[derive(Clone, Debug, PartialEq)]
pub struct Gb7Image {
    pub width: u32,
    pub height: u32,
    /// One byte per pixel, gray in the low 7 bits, mask in bit 7.
    pub pixels: Vec<u8>,
    pub color_depth: u8,
    pub has_mask: bool,
    pub version: u8,
    pub flags: u8,
    pub reserved: u16,
}

impl Gb7Image {
    /// 7-bit gray sample (0..=127) at pixel index `i`.
    pub fn gray_at(&self, i: usize) -> u8 {
        self.pixels[i] & GRAY_BITS
    }

    /// Mask bit at pixel index `i`; always true when the file has no mask.
    pub fn is_opaque_at(&self, i: usize) -> bool {
        !self.has_mask || self.pixels[i] & MASK_BIT != 0
    }

    /// Opaque RGBA view: gray shifted up one bit, alpha forced to 255.
    pub fn to_rgba(&self) -> PixelBuffer {
        let mut img = RgbaImage::new(self.width, self.height);
        for (i, px) in img.pixels_mut().enumerate() {
            let g = self.gray_at(i) << 1;
            *px = Rgba([g, g, g, 255]);
        }
        img
    }

    /// RGBA view with alpha taken from the mask bit (0 or 255).
    pub fn to_rgba_masked(&self) -> PixelBuffer {
        let mut img = RgbaImage::new(self.width, self.height);
        for (i, px) in img.pixels_mut().enumerate() {
            let g = self.gray_at(i) << 1;
            let a = if self.is_opaque_at(i) { 255 } else { 0 };
            *px = Rgba([g, g, g, a]);
        }
        img
    }

    /// Separate mask image (255 where bit 7 is set), only for masked files.
    pub fn mask_image(&self) -> Option<MaskBuffer> {
        if !self.has_mask {
            return None;
        }
        let mut mask = GrayImage::new(self.width, self.height);
        for (i, px) in mask.pixels_mut().enumerate() {
            *px = Luma([if self.pixels[i] & MASK_BIT != 0 { 255 } else { 0 }]);
        }
        Some(mask)
    }
}

/// Parse a GrayBit-7 byte buffer.
pub fn decode(bytes: &[u8]) -> Result<Gb7Image> {
    if bytes.len() < HEADER_LEN {
        return Err(EditorError::Format(format!(
            "file is {} bytes, shorter than the {}-byte header",
            bytes.len(),
            HEADER_LEN
        )));
    }
    if bytes[0..4] != SIGNATURE {
        return Err(EditorError::Format(format!(
            "bad signature {:02X} {:02X} {:02X} {:02X}",
            bytes[0], bytes[1], bytes[2], bytes[3]
        )));
    }

    let version = bytes[4];
    if version != VERSION {
        return Err(EditorError::UnsupportedVersion(version));
    }

    let flags = bytes[5];
    let width = u16::from_be_bytes([bytes[6], bytes[7]]) as u32;
    let height = u16::from_be_bytes([bytes[8], bytes[9]]) as u32;
    let reserved = u16::from_be_bytes([bytes[10], bytes[11]]);

    let count = width as usize * height as usize;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() < count {
        return Err(EditorError::Format(format!(
            "{}x{} image needs {} pixel bytes, found {}",
            width,
            height,
            count,
            payload.len()
        )));
    }

    Ok(Gb7Image {
        width,
        height,
        pixels: payload[..count].to_vec(),
        color_depth: COLOR_DEPTH,
        has_mask: flags & FLAG_HAS_MASK != 0,
        version,
        flags,
        reserved,
    })
}

/// BT.601 luma rounded to 0..=255, then scaled to 7 bits.
fn to_gray7(r: u8, g: u8, b: u8) -> u8 {
    let gray = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u32;
    (gray.min(255) * 127 / 255) as u8
}

/// Encode an RGBA buffer. A mask is written only when some pixel has alpha < 255.
pub fn encode(img: &PixelBuffer) -> Result<Vec<u8>> {
    let (w, h) = img.dimensions();
    if w > u16::MAX as u32 || h > u16::MAX as u32 {
        return Err(EditorError::InvalidDimensions(format!(
            "{}x{} exceeds the GrayBit-7 limit of {}",
            w,
            h,
            u16::MAX
        )));
    }

    let has_mask = img.pixels().any(|p| p[3] < 255);
    let flags = if has_mask { FLAG_HAS_MASK } else { 0 };

    let mut out = Vec::with_capacity(HEADER_LEN + (w * h) as usize);
    out.extend_from_slice(&SIGNATURE);
    out.push(VERSION);
    out.push(flags);
    out.extend_from_slice(&(w as u16).to_be_bytes());
    out.extend_from_slice(&(h as u16).to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());

    out.extend(img.pixels().map(|p| {
        let mut byte = to_gray7(p[0], p[1], p[2]);
        if has_mask && p[3] >= OPAQUE_THRESHOLD {
            byte |= MASK_BIT;
        }
        byte
    }));

    Ok(out)
}
