use std::path::PathBuf;
use uuid::Uuid;

use crate::canvas::{
    AlphaChannel, ImageState, Layer, LayerKind, LayerStack, MaskBuffer, PixelBuffer, ViewTransform,
};
use crate::error::{EditorError, Result};
use crate::ops::adjustments::{self, CurvesSettings, Histogram};
use crate::ops::color_space::{self, Lab, Oklch, Rgb, Xyz};
use crate::ops::filters::FilterSettings;
use crate::ops::layout::{self, optimal_scale, place_with_pan};
use crate::ops::transform::{self, Interpolation, ResizeTarget};
use crate::{log_info, log_warn};

/// Bits per pixel reported for PNG/JPEG sources.
pub const NATIVE_COLOR_DEPTH: u8 = 24;

/// Active pointer tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Hand,
    Eyedropper,
}

/// Status-bar readout for the loaded image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasStatus {
    pub width: u32,
    pub height: u32,
    pub color_depth: u8,
}

/// Eyedropper sample in every supported colour space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorInfo {
    pub rgb: Rgb,
    pub xyz: Xyz,
    pub lab: Lab,
    pub oklch: Oklch,
    pub position: (u32, u32),
}

impl ColorInfo {
    pub fn from_rgb(rgb: Rgb, position: (u32, u32)) -> Self {
        Self {
            rgb,
            xyz: color_space::rgb_to_xyz(rgb),
            lab: color_space::rgb_to_lab(rgb),
            oklch: color_space::rgb_to_oklch(rgb),
            position,
        }
    }
}

/// Single open document: image, layers, masks and how it is being viewed.
pub struct Document {
    pub id: Uuid,
    /// Display name (derived from path or "Untitled-X")
    pub name: String,
    /// `None` for unsaved/untitled files.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,

    pub status: Option<CanvasStatus>,
    pub image: ImageState,
    pub layers: LayerStack,
    pub view: ViewTransform,
    pub tool: Tool,
    pub last_sample: Option<ColorInfo>,
}

impl Document {
    pub fn new_untitled(untitled_counter: usize, max_layers: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: format!("Untitled-{}", untitled_counter),
            path: None,
            is_dirty: false,
            status: None,
            image: ImageState::default(),
            layers: LayerStack::new(max_layers),
            view: ViewTransform::default(),
            tool: Tool::default(),
            last_sample: None,
        }
    }

    /// Document holding `image` as its single "Background" layer.
    pub fn from_image(path: Option<PathBuf>, image: PixelBuffer, color_depth: u8, max_layers: usize) -> Self {
        let mut doc = Self::new_untitled(1, max_layers);
        doc.path = path;
        doc.update_name_from_path();
        doc.set_image(image, color_depth);
        doc
    }

    /// Replace the image and reset layers and masks around it.
    pub fn set_image(&mut self, image: PixelBuffer, color_depth: u8) {
        let (w, h) = image.dimensions();
        let max_layers = self.layers.max_layers;
        self.layers = LayerStack::new(max_layers);
        self.layers.add_layer(Layer::new_image("Background", image.clone()));
        self.image = ImageState::from_image(image);
        self.status = Some(CanvasStatus { width: w, height: h, color_depth });
        self.view = ViewTransform::default();
        self.last_sample = None;
    }

    pub fn has_image(&self) -> bool {
        self.image.image.is_some()
    }

    /// Add a mask (e.g. a GrayBit-7 mask bit plane) as an alpha channel.
    pub fn attach_mask(&mut self, name: impl Into<String>, mask: &MaskBuffer) -> Uuid {
        self.mark_dirty();
        self.layers.add_alpha_channel(AlphaChannel::from_mask(name, mask))
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    pub fn update_name_from_path(&mut self) {
        if let Some(ref path) = self.path {
            self.name = path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string());
        }
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }

    // ========================================================================
    // VIEW
    // ========================================================================

    /// Pick the zoom that fits the padded viewport and recenter.
    pub fn fit_to_viewport(&mut self, view_w: u32, view_h: u32, padding: u32) -> u32 {
        let scale = optimal_scale(
            self.image.original_width,
            self.image.original_height,
            view_w,
            view_h,
            padding,
        );
        self.view = ViewTransform { scale_percent: scale, pan: (0.0, 0.0) };
        scale
    }

    pub fn set_zoom(&mut self, scale_percent: u32) {
        self.view.scale_percent = scale_percent.max(1);
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.view.pan.0 += dx;
        self.view.pan.1 += dy;
    }

    /// Map a viewport position to image coordinates, if it lands on the image.
    pub fn view_to_image(&self, vx: f32, vy: f32, viewport: (u32, u32)) -> Option<(u32, u32)> {
        let (w, h) = (self.image.original_width, self.image.original_height);
        let place = place_with_pan(w, h, self.view.scale_percent, viewport.0, viewport.1, self.view.pan);
        if place.width == 0 || place.height == 0 {
            return None;
        }
        let lx = vx - place.x as f32;
        let ly = vy - place.y as f32;
        if lx < 0.0 || ly < 0.0 || lx >= place.width as f32 || ly >= place.height as f32 {
            return None;
        }
        let ix = ((lx * w as f32 / place.width as f32) as u32).min(w - 1);
        let iy = ((ly * h as f32 / place.height as f32) as u32).min(h - 1);
        Some((ix, iy))
    }

    /// Composite + masks at the original resolution.
    pub fn flatten(&self) -> Result<Option<PixelBuffer>> {
        layout::flatten(&self.layers, &self.image)
    }

    /// Display buffer for a `viewport`-sized surface.
    pub fn render(&self, viewport: (u32, u32), interpolation: Interpolation) -> Result<PixelBuffer> {
        layout::render_view(&self.layers, &self.image, &self.view, viewport, interpolation)
    }

    // ========================================================================
    // EYEDROPPER
    // ========================================================================

    /// Read the composited colour at image coordinates and remember it.
    pub fn sample_color(&mut self, x: u32, y: u32) -> Result<Option<ColorInfo>> {
        let Some(flat) = self.flatten()? else {
            return Ok(None);
        };
        if x >= flat.width() || y >= flat.height() {
            return Ok(None);
        }
        let px = flat.get_pixel(x, y);
        let info = ColorInfo::from_rgb(Rgb::new(px[0], px[1], px[2]), (x, y));
        self.last_sample = Some(info);
        Ok(Some(info))
    }

    // ========================================================================
    // EDITS ON THE ACTIVE LAYER
    // ========================================================================

    fn active_pixels(&self) -> Result<(Uuid, &PixelBuffer)> {
        let layer = self
            .layers
            .active_layer()
            .ok_or_else(|| EditorError::InvalidDimensions("no active layer".into()))?;
        match &layer.kind {
            LayerKind::Image(Some(pixels)) => Ok((layer.id, pixels)),
            _ => Err(EditorError::InvalidDimensions(format!(
                "layer '{}' has no pixels to edit",
                layer.name
            ))),
        }
    }

    /// Run `op` on a copy of the active layer's pixels and install the result.
    pub fn edit_active_layer(&mut self, op: impl FnOnce(&PixelBuffer) -> Result<PixelBuffer>) -> Result<()> {
        let (id, pixels) = self.active_pixels()?;
        let result = op(pixels)?;
        self.replace_layer_pixels(id, result);
        Ok(())
    }

    /// Swap in pixels computed elsewhere (e.g. by a background job).
    pub fn replace_layer_pixels(&mut self, layer_id: Uuid, pixels: PixelBuffer) -> bool {
        let updated = self.layers.update_layer(layer_id, |l| {
            if let LayerKind::Image(slot) = &mut l.kind {
                *slot = Some(pixels);
            }
        });
        if updated {
            self.mark_dirty();
        }
        updated
    }

    pub fn apply_curves(&mut self, settings: &CurvesSettings) -> Result<()> {
        let settings = *settings;
        self.edit_active_layer(|px| Ok(adjustments::apply_curve(px, &settings)))
    }

    pub fn apply_filter(&mut self, settings: &FilterSettings) -> Result<()> {
        let settings = *settings;
        self.edit_active_layer(|px| settings.apply(px))
    }

    pub fn active_histogram(&self) -> Result<Histogram> {
        let (_, pixels) = self.active_pixels()?;
        Ok(adjustments::histogram(pixels))
    }

    // ========================================================================
    // RESIZE
    // ========================================================================

    /// Resample the image, every image layer and every mask to the new size.
    pub fn resize_image(&mut self, target: ResizeTarget, interpolation: Interpolation) -> Result<(u32, u32)> {
        if !self.has_image() {
            log_warn!("Resize requested with no image loaded");
            return Err(EditorError::InvalidDimensions("no image loaded".into()));
        }
        let (w, h) = target.resolve(self.image.original_width, self.image.original_height)?;

        // Resample everything first so a failure leaves the document untouched
        let base = match &self.image.image {
            Some(img) => Some(transform::resize(img, w, h, interpolation)?),
            None => None,
        };
        let mut layer_pixels = Vec::with_capacity(self.layers.layers.len());
        for layer in &self.layers.layers {
            layer_pixels.push(match &layer.kind {
                LayerKind::Image(Some(px)) => Some(transform::resize(px, w, h, interpolation)?),
                _ => None,
            });
        }
        let mut channel_pixels = Vec::with_capacity(self.layers.alpha_channels.len());
        for channel in &self.layers.alpha_channels {
            channel_pixels.push(match &channel.image {
                Some(img) => Some(transform::resize(img, w, h, interpolation)?),
                None => None,
            });
        }

        if let Some(img) = base {
            self.image = ImageState::from_image(img);
        }
        for (layer, resized) in self.layers.layers.iter_mut().zip(layer_pixels) {
            if let (LayerKind::Image(slot), Some(px)) = (&mut layer.kind, resized) {
                *slot = Some(px);
            }
        }
        for (channel, resized) in self.layers.alpha_channels.iter_mut().zip(channel_pixels) {
            if resized.is_some() {
                channel.image = resized;
            }
        }

        let color_depth = self.status.map(|s| s.color_depth).unwrap_or(NATIVE_COLOR_DEPTH);
        self.status = Some(CanvasStatus { width: w, height: h, color_depth });
        self.mark_dirty();
        log_info!("Resized '{}' to {}x{} ({})", self.name, w, h, interpolation.key());
        Ok((w, h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::BlendMode;
    use crate::ops::adjustments::CurvePoint;
    use crate::ops::filters::KernelPreset;
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    fn doc_with(w: u32, h: u32, px: [u8; 4]) -> Document {
        Document::from_image(
            Some(PathBuf::from("/tmp/photo.png")),
            RgbaImage::from_pixel(w, h, Rgba(px)),
            NATIVE_COLOR_DEPTH,
            2,
        )
    }

    #[test]
    fn loading_creates_background_layer() {
        let doc = doc_with(4, 3, [1, 2, 3, 255]);
        assert_eq!(doc.name, "photo.png");
        assert_eq!(doc.layers.layers.len(), 1);
        assert_eq!(doc.layers.active_layer().unwrap().name, "Background");
        assert_eq!(doc.status, Some(CanvasStatus { width: 4, height: 3, color_depth: 24 }));
        assert!(!doc.is_dirty);
    }

    #[test]
    fn dirty_title() {
        let mut doc = Document::new_untitled(3, 2);
        assert_eq!(doc.display_title(), "Untitled-3");
        doc.mark_dirty();
        assert_eq!(doc.display_title(), "Untitled-3*");
        doc.mark_clean();
        assert_eq!(doc.display_title(), "Untitled-3");
    }

    #[test]
    fn fit_uses_optimal_scale() {
        let mut doc = doc_with(1800, 900, [0, 0, 0, 255]);
        doc.pan_by(30.0, 40.0);
        assert_eq!(doc.fit_to_viewport(1000, 1000, 50), 50);
        assert_eq!(doc.view.pan, (0.0, 0.0));
    }

    #[test]
    fn eyedropper_reads_composite() {
        let mut doc = doc_with(2, 2, [255, 255, 255, 255]);
        doc.layers
            .add_layer(Layer::new_color("tint", "#ff0000").with_blend(BlendMode::Multiply, 1.0));
        let info = doc.sample_color(1, 1).unwrap().unwrap();
        assert_eq!(info.rgb, Rgb::new(255, 0, 0));
        assert_eq!(info.position, (1, 1));
        assert!(info.lab.a > 70.0);
        assert_eq!(doc.last_sample, Some(info));
        assert!(doc.sample_color(5, 0).unwrap().is_none());
    }

    #[test]
    fn view_mapping_hits_image() {
        let mut doc = doc_with(100, 50, [0, 0, 0, 255]);
        doc.set_zoom(200);
        // 200x100 centered in 400x200 → origin (100, 50)
        assert_eq!(doc.view_to_image(100.0, 50.0, (400, 200)), Some((0, 0)));
        assert_eq!(doc.view_to_image(299.0, 149.0, (400, 200)), Some((99, 49)));
        assert_eq!(doc.view_to_image(99.0, 50.0, (400, 200)), None);
    }

    #[test]
    fn curves_edit_active_layer() {
        let mut doc = doc_with(2, 1, [100, 100, 100, 255]);
        let settings = CurvesSettings {
            point1: CurvePoint::new(0, 255),
            point2: CurvePoint::new(255, 0),
            ..Default::default()
        };
        doc.apply_curves(&settings).unwrap();
        let layer = doc.layers.active_layer().unwrap();
        assert_eq!(layer.pixels().unwrap().get_pixel(0, 0).0, [155, 155, 155, 255]);
        assert!(doc.is_dirty);
        // Source image is untouched
        assert_eq!(doc.image.image.as_ref().unwrap().get_pixel(0, 0)[0], 100);
    }

    #[test]
    fn filter_on_color_layer_is_rejected() {
        let mut doc = doc_with(2, 2, [0, 0, 0, 255]);
        doc.layers.add_layer(Layer::new_color("fill", "#00ff00"));
        let err = doc.apply_filter(&FilterSettings::from_preset(KernelPreset::Sharpen));
        assert!(err.is_err());
    }

    #[test]
    fn resize_updates_everything() {
        let mut doc = doc_with(4, 4, [9, 9, 9, 255]);
        doc.attach_mask("mask", &GrayImage::from_pixel(4, 4, Luma([255])));
        let size = doc
            .resize_image(ResizeTarget::Percent { width: 50, height: 50 }, Interpolation::Nearest)
            .unwrap();
        assert_eq!(size, (2, 2));
        assert_eq!((doc.image.original_width, doc.image.original_height), (2, 2));
        assert_eq!(doc.layers.layers[0].pixels().unwrap().dimensions(), (2, 2));
        assert_eq!(doc.layers.alpha_channels[0].image.as_ref().unwrap().dimensions(), (2, 2));
        assert_eq!(doc.status.unwrap().width, 2);
    }

    #[test]
    fn failed_resize_leaves_document_unchanged() {
        let mut doc = doc_with(4, 4, [9, 9, 9, 255]);
        doc.attach_mask("mask", &GrayImage::from_pixel(4, 4, Luma([255])));
        doc.layers.add_layer(Layer::new_image("empty", RgbaImage::new(0, 0)));
        doc.mark_clean();

        let r = doc.resize_image(ResizeTarget::Pixels { width: 2, height: 2 }, Interpolation::Bilinear);
        assert!(matches!(r, Err(EditorError::InvalidDimensions(_))));
        assert_eq!((doc.image.original_width, doc.image.original_height), (4, 4));
        assert_eq!(doc.image.image.as_ref().unwrap().dimensions(), (4, 4));
        assert_eq!(doc.layers.layers[0].pixels().unwrap().dimensions(), (4, 4));
        assert_eq!(doc.layers.layers[1].pixels().unwrap().dimensions(), (0, 0));
        assert_eq!(doc.layers.alpha_channels[0].image.as_ref().unwrap().dimensions(), (4, 4));
        assert_eq!(doc.status.unwrap().width, 4);
        assert!(!doc.is_dirty);
    }

    #[test]
    fn resize_without_image_fails() {
        let mut doc = Document::new_untitled(1, 2);
        let r = doc.resize_image(ResizeTarget::Pixels { width: 2, height: 2 }, Interpolation::Bilinear);
        assert!(r.is_err());
    }

    #[test]
    fn mask_hides_pixels() {
        let mut doc = doc_with(2, 1, [50, 60, 70, 255]);
        let mut mask = GrayImage::new(2, 1);
        mask.put_pixel(0, 0, Luma([255]));
        doc.attach_mask("m", &mask);
        let flat = doc.flatten().unwrap().unwrap();
        assert_eq!(flat.get_pixel(0, 0)[3], 255);
        assert_eq!(flat.get_pixel(1, 0)[3], 0);
    }
}
