// ============================================================================
// COMPOSITOR — blend modes, layer stack flattening, alpha-channel masking
// ============================================================================
//
// All math runs on normalized [0, 1] samples and is rounded back to u8 once
// per channel. Layers smaller than the canvas are anchored at the top-left;
// pixels they don't cover act as fully transparent.
// ============================================================================

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{AlphaChannel, BlendMode, Layer, LayerKind, PixelBuffer};
use crate::error::{EditorError, Result};
use crate::ops::color_space::parse_hex_color;

/// Composite background: white with zero alpha.
const EMPTY_CANVAS: Rgba<u8> = Rgba([255, 255, 255, 0]);

#[inline]
fn overlay_channel(base: f32, over: f32) -> f32 {
    if base < 0.5 {
        2.0 * base * over
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - over)
    }
}

#[inline]
fn blend_channel(mode: BlendMode, base: f32, over: f32) -> f32 {
    match mode {
        BlendMode::Normal => over,
        BlendMode::Multiply => base * over,
        BlendMode::Screen => 1.0 - (1.0 - base) * (1.0 - over),
        BlendMode::Overlay => overlay_channel(base, over),
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Blend one overlay pixel onto one base pixel.
#[inline]
pub fn blend_pixel(base: [u8; 4], over: [u8; 4], mode: BlendMode, opacity: f32) -> [u8; 4] {
    let a = over[3] as f32 / 255.0 * opacity;
    let inv = 1.0 - a;
    let mut out = [0u8; 4];
    for c in 0..3 {
        let b = base[c] as f32 / 255.0;
        let o = over[c] as f32 / 255.0;
        let res = blend_channel(mode, b, o);
        out[c] = to_u8(res * a + b * inv);
    }
    out[3] = to_u8((base[3] as f32 / 255.0).max(a));
    out
}

/// Blend `overlay` onto `base`, returning a new buffer of the base's size.
pub fn blend(base: &PixelBuffer, overlay: &PixelBuffer, mode: BlendMode, opacity: f32) -> PixelBuffer {
    let (w, h) = base.dimensions();
    let (ow, oh) = overlay.dimensions();
    let opacity = opacity.clamp(0.0, 1.0);
    let stride = w as usize * 4;
    if stride == 0 || h == 0 {
        return base.clone();
    }

    let over_raw = overlay.as_raw();
    let mut dst_raw = base.as_raw().clone();

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        if y as u32 >= oh {
            return;
        }
        let over_row = &over_raw[y * ow as usize * 4..(y + 1) * ow as usize * 4];
        for (x, px) in row.chunks_exact_mut(4).enumerate().take(ow as usize) {
            let o = &over_row[x * 4..x * 4 + 4];
            let out = blend_pixel([px[0], px[1], px[2], px[3]], [o[0], o[1], o[2], o[3]], mode, opacity);
            px.copy_from_slice(&out);
        }
    });

    RgbaImage::from_raw(w, h, dst_raw).unwrap_or_else(|| base.clone())
}

/// Opaque single-colour buffer from `#rrggbb`.
pub fn color_fill(hex: &str, w: u32, h: u32) -> Result<PixelBuffer> {
    let rgb = parse_hex_color(hex)?;
    Ok(RgbaImage::from_pixel(w, h, Rgba([rgb.r, rgb.g, rgb.b, 255])))
}

/// Flatten the stack bottom → top at `w × h`.
///
/// Hidden and zero-opacity layers are skipped. Colour layers are synthesized,
/// empty image layers paint nothing.
pub fn composite_stack(layers: &[Layer], w: u32, h: u32) -> Result<PixelBuffer> {
    if w == 0 || h == 0 {
        return Err(EditorError::InvalidDimensions(format!("cannot composite onto {}x{}", w, h)));
    }
    let mut result = RgbaImage::from_pixel(w, h, EMPTY_CANVAS);

    for layer in layers.iter().filter(|l| l.contributes()) {
        match &layer.kind {
            LayerKind::Color(hex) => {
                let fill = color_fill(hex, w, h)?;
                result = blend(&result, &fill, layer.blend_mode, layer.opacity);
            }
            LayerKind::Image(Some(pixels)) => {
                result = blend(&result, pixels, layer.blend_mode, layer.opacity);
            }
            LayerKind::Image(None) => {}
        }
    }

    Ok(result)
}

/// Multiply alpha by the product of every visible channel's mask value.
/// Channels without an image, or hidden ones, are ignored. Pixels outside a
/// smaller mask count as fully masked out.
pub fn apply_alpha_channels(src: &PixelBuffer, channels: &[AlphaChannel]) -> PixelBuffer {
    let masks: Vec<&PixelBuffer> = channels
        .iter()
        .filter(|c| c.visible)
        .filter_map(|c| c.image.as_ref())
        .collect();
    let (w, h) = src.dimensions();
    if masks.is_empty() || w == 0 || h == 0 {
        return src.clone();
    }

    let stride = w as usize * 4;
    let mut dst_raw = src.as_raw().clone();

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let mut combined = 1.0f32;
            for mask in &masks {
                let m = if (x as u32) < mask.width() && (y as u32) < mask.height() {
                    mask.get_pixel(x as u32, y as u32)[0]
                } else {
                    0
                };
                combined *= m as f32 / 255.0;
            }
            px[3] = (px[3] as f32 * combined).round().clamp(0.0, 255.0) as u8;
        }
    });

    RgbaImage::from_raw(w, h, dst_raw).unwrap_or_else(|| src.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> PixelBuffer {
        RgbaImage::from_pixel(w, h, Rgba(px))
    }

    #[test]
    fn normal_full_opacity_replaces_base() {
        let base = solid(2, 2, [10, 20, 30, 255]);
        let over = solid(2, 2, [200, 100, 50, 255]);
        let out = blend(&base, &over, BlendMode::Normal, 1.0);
        assert!(out.pixels().all(|p| p.0 == [200, 100, 50, 255]));
    }

    #[test]
    fn zero_opacity_keeps_base() {
        let base = solid(2, 1, [10, 20, 30, 255]);
        let over = solid(2, 1, [200, 100, 50, 255]);
        for mode in BlendMode::all() {
            let out = blend(&base, &over, *mode, 0.0);
            assert_eq!(out, base, "{:?}", mode);
        }
    }

    #[test]
    fn multiply_and_screen() {
        let base = [128, 255, 0, 255];
        let over = [128, 128, 128, 255];
        let m = blend_pixel(base, over, BlendMode::Multiply, 1.0);
        assert_eq!(m, [64, 128, 0, 255]);
        let s = blend_pixel(base, over, BlendMode::Screen, 1.0);
        assert_eq!(s, [192, 255, 128, 255]);
    }

    #[test]
    fn overlay_switches_on_base() {
        // dark base → 2ab, light base → screen-like
        let dark = blend_pixel([64, 64, 64, 255], [128, 128, 128, 255], BlendMode::Overlay, 1.0);
        assert_eq!(dark[0], 64);
        let light = blend_pixel([192, 192, 192, 255], [128, 128, 128, 255], BlendMode::Overlay, 1.0);
        assert_eq!(light[0], 192);
    }

    #[test]
    fn half_opacity_mixes() {
        let out = blend_pixel([0, 0, 0, 255], [255, 255, 255, 255], BlendMode::Normal, 0.5);
        assert_eq!(out, [128, 128, 128, 255]);
        let onto_empty = blend_pixel([255, 255, 255, 0], [0, 0, 0, 255], BlendMode::Normal, 0.5);
        assert_eq!(onto_empty[3], 128);
    }

    #[test]
    fn color_fill_is_opaque() {
        let img = color_fill("#ff8000", 3, 2).unwrap();
        assert!(img.pixels().all(|p| p.0 == [255, 128, 0, 255]));
        assert!(color_fill("orange", 1, 1).is_err());
    }

    #[test]
    fn empty_stack_is_transparent() {
        let out = composite_stack(&[], 2, 2).unwrap();
        assert!(out.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn hidden_and_transparent_layers_are_skipped() {
        let bottom = Layer::new_image("bottom", solid(2, 2, [10, 20, 30, 255]));
        let mut hidden = Layer::new_color("hidden", "#ff0000");
        hidden.visible = false;
        let faded = Layer::new_color("faded", "#00ff00").with_blend(BlendMode::Normal, 0.0);
        // An invalid colour would fail if the layer were not skipped
        let mut broken = Layer::new_color("broken", "nope");
        broken.visible = false;

        let only_bottom = composite_stack(&[bottom.clone()], 2, 2).unwrap();
        let all = composite_stack(&[bottom, hidden, faded, broken], 2, 2).unwrap();
        assert_eq!(all, only_bottom);
        assert!(all.pixels().all(|p| p.0 == [10, 20, 30, 255]));
    }

    #[test]
    fn color_layer_multiplies_image() {
        let bottom = Layer::new_image("img", solid(1, 1, [200, 100, 50, 255]));
        let tint = Layer::new_color("tint", "#808080").with_blend(BlendMode::Multiply, 1.0);
        let out = composite_stack(&[bottom, tint], 1, 1).unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [100, 50, 25, 255]);
    }

    #[test]
    fn empty_image_layer_paints_nothing() {
        let bottom = Layer::new_color("bg", "#102030");
        let mut empty = Layer::new_image("empty", solid(1, 1, [0, 0, 0, 255]));
        empty.kind = LayerKind::Image(None);
        let out = composite_stack(&[bottom, empty], 2, 2).unwrap();
        assert!(out.pixels().all(|p| p.0 == [0x10, 0x20, 0x30, 255]));
    }

    #[test]
    fn smaller_layer_anchors_top_left() {
        let bg = Layer::new_color("bg", "#000000");
        let patch = Layer::new_image("patch", solid(1, 1, [255, 255, 255, 255]));
        let out = composite_stack(&[bg, patch], 2, 2).unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(out.get_pixel(1, 1).0, [0, 0, 0, 255]);
    }

    #[test]
    fn alpha_channels_multiply() {
        let src = solid(2, 1, [50, 50, 50, 200]);
        let mut mask = RgbaImage::new(2, 1);
        mask.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        mask.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let half = solid(2, 1, [128, 128, 128, 255]);

        let a = AlphaChannel::new("a", Some(mask));
        let mut hidden = AlphaChannel::new("hidden", Some(half.clone()));
        hidden.visible = false;
        let empty = AlphaChannel::new("empty", None);

        let out = apply_alpha_channels(&src, &[a.clone(), hidden, empty]);
        assert_eq!(out.get_pixel(0, 0)[3], 200);
        assert_eq!(out.get_pixel(1, 0)[3], 0);
        assert_eq!(&out.get_pixel(0, 0).0[..3], &[50, 50, 50]);

        let b = AlphaChannel::new("b", Some(half));
        let out = apply_alpha_channels(&src, &[a, b]);
        assert_eq!(out.get_pixel(0, 0)[3], 100);
    }

    #[test]
    fn no_visible_channels_is_identity() {
        let src = solid(3, 3, [1, 2, 3, 4]);
        assert_eq!(apply_alpha_channels(&src, &[]), src);
    }
}
