use image::{GrayImage, RgbaImage};
use uuid::Uuid;

use crate::log_warn;

/// RGBA, 8 bits per channel, row-major. `image` guarantees `len == w * h * 4`.
pub type PixelBuffer = RgbaImage;

/// Single-channel mask image (GrayBit-7 mask view).
pub type MaskBuffer = GrayImage;

/// Default layer capacity.
pub const DEFAULT_MAX_LAYERS: usize = 2;

// ============================================================================
// BLEND MODES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
}

impl BlendMode {
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Overlay,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
        }
    }

    /// Parse a mode name; unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "normal" => Some(BlendMode::Normal),
            "multiply" => Some(BlendMode::Multiply),
            "screen" => Some(BlendMode::Screen),
            "overlay" => Some(BlendMode::Overlay),
            _ => None,
        }
    }

    /// Convert to a stable u8 for binary serialization
    pub fn to_u8(&self) -> u8 {
        match self {
            BlendMode::Normal => 0,
            BlendMode::Multiply => 1,
            BlendMode::Screen => 2,
            BlendMode::Overlay => 3,
        }
    }

    /// Reconstruct from a u8 (defaults to Normal for unknown values)
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => BlendMode::Multiply,
            2 => BlendMode::Screen,
            3 => BlendMode::Overlay,
            _ => BlendMode::Normal,
        }
    }
}

// ============================================================================
// LAYERS & ALPHA CHANNELS
// ============================================================================

/// What a layer paints. Image layers may be empty (treated as transparent).
#[derive(Clone, Debug, PartialEq)]
pub enum LayerKind {
    Image(Option<PixelBuffer>),
    /// Solid colour as `#rrggbb`, synthesized at composite time.
    Color(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub id: Uuid,
    pub name: String,
    pub visible: bool,
    /// 0.0 ..= 1.0
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub kind: LayerKind,
}

impl Layer {
    /// Visible, fully opaque, normal blend.
    pub fn new(name: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            kind,
        }
    }

    pub fn new_image(name: impl Into<String>, pixels: PixelBuffer) -> Self {
        Self::new(name, LayerKind::Image(Some(pixels)))
    }

    pub fn new_color(name: impl Into<String>, hex: impl Into<String>) -> Self {
        Self::new(name, LayerKind::Color(hex.into()))
    }

    pub fn with_blend(mut self, mode: BlendMode, opacity: f32) -> Self {
        self.blend_mode = mode;
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Pixels of an image layer, if any.
    pub fn pixels(&self) -> Option<&PixelBuffer> {
        match &self.kind {
            LayerKind::Image(img) => img.as_ref(),
            LayerKind::Color(_) => None,
        }
    }

    /// True when the layer can contribute to a composite at all.
    pub fn contributes(&self) -> bool {
        self.visible && self.opacity > 0.0
    }
}

/// Independent grayscale mask multiplied into the final composite alpha.
#[derive(Clone, Debug, PartialEq)]
pub struct AlphaChannel {
    pub id: Uuid,
    pub name: String,
    pub visible: bool,
    /// Stored gray-on-all-channels; the red component is the mask value.
    pub image: Option<PixelBuffer>,
}

impl AlphaChannel {
    pub fn new(name: impl Into<String>, image: Option<PixelBuffer>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            visible: true,
            image,
        }
    }

    /// Build a channel from a single-channel mask (e.g. a GrayBit-7 mask view).
    pub fn from_mask(name: impl Into<String>, mask: &MaskBuffer) -> Self {
        let mut img = RgbaImage::new(mask.width(), mask.height());
        for (dst, src) in img.pixels_mut().zip(mask.pixels()) {
            let v = src[0];
            *dst = image::Rgba([v, v, v, 255]);
        }
        Self::new(name, Some(img))
    }
}

// ============================================================================
// LAYER STACK
// ============================================================================

/// Ordered layers (index 0 paints first) plus the free-standing alpha channels.
#[derive(Clone, Debug)]
pub struct LayerStack {
    pub layers: Vec<Layer>,
    pub alpha_channels: Vec<AlphaChannel>,
    active_layer_id: Option<Uuid>,
    pub max_layers: usize,
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LAYERS)
    }
}

impl LayerStack {
    pub fn new(max_layers: usize) -> Self {
        Self {
            layers: Vec::new(),
            alpha_channels: Vec::new(),
            active_layer_id: None,
            max_layers,
        }
    }

    pub fn active_layer_id(&self) -> Option<Uuid> {
        self.active_layer_id
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        let id = self.active_layer_id?;
        self.layer(id)
    }

    pub fn layer(&self, id: Uuid) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn index_of(&self, id: Uuid) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn is_full(&self) -> bool {
        self.layers.len() >= self.max_layers
    }

    /// Append a layer on top and make it active.
    /// Returns `None` (stack unchanged) once `max_layers` is reached.
    pub fn add_layer(&mut self, layer: Layer) -> Option<Uuid> {
        if self.is_full() {
            log_warn!(
                "Layer limit reached ({}), '{}' not added",
                self.max_layers,
                layer.name
            );
            return None;
        }
        let id = layer.id;
        self.layers.push(layer);
        self.active_layer_id = Some(id);
        Some(id)
    }

    /// Remove a layer. The active layer falls back to the bottom-most remaining one.
    pub fn remove_layer(&mut self, id: Uuid) -> Option<Layer> {
        let idx = self.index_of(id)?;
        let removed = self.layers.remove(idx);
        self.active_layer_id = self.layers.first().map(|l| l.id);
        Some(removed)
    }

    /// Returns false when no layer has that id.
    pub fn set_active_layer(&mut self, id: Uuid) -> bool {
        if self.index_of(id).is_none() {
            return false;
        }
        self.active_layer_id = Some(id);
        true
    }

    /// Mutate a layer in place (opacity, blend, visibility, pixels...).
    pub fn update_layer(&mut self, id: Uuid, update: impl FnOnce(&mut Layer)) -> bool {
        match self.layers.iter_mut().find(|l| l.id == id) {
            Some(layer) => {
                update(layer);
                layer.opacity = layer.opacity.clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }

    /// Move the layer at `from` to position `to` (both clamped to the stack).
    pub fn reorder_layers(&mut self, from: usize, to: usize) {
        if from >= self.layers.len() {
            return;
        }
        let layer = self.layers.remove(from);
        let to = to.min(self.layers.len());
        self.layers.insert(to, layer);
    }

    pub fn add_alpha_channel(&mut self, channel: AlphaChannel) -> Uuid {
        let id = channel.id;
        self.alpha_channels.push(channel);
        id
    }

    pub fn remove_alpha_channel(&mut self, id: Uuid) -> Option<AlphaChannel> {
        let idx = self.alpha_channels.iter().position(|c| c.id == id)?;
        Some(self.alpha_channels.remove(idx))
    }

    pub fn update_alpha_channel(&mut self, id: Uuid, update: impl FnOnce(&mut AlphaChannel)) -> bool {
        match self.alpha_channels.iter_mut().find(|c| c.id == id) {
            Some(ch) => {
                update(ch);
                true
            }
            None => false,
        }
    }

    /// Drop every layer and channel; capacity resets to the default.
    pub fn clear_all(&mut self) {
        self.layers.clear();
        self.alpha_channels.clear();
        self.active_layer_id = None;
        self.max_layers = DEFAULT_MAX_LAYERS;
    }
}

// ============================================================================
// IMAGE & VIEW STATE
// ============================================================================

/// Source-resolution record, independent of the current zoom.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageState {
    pub original_width: u32,
    pub original_height: u32,
    pub image: Option<PixelBuffer>,
}

impl ImageState {
    pub fn from_image(image: PixelBuffer) -> Self {
        Self {
            original_width: image.width(),
            original_height: image.height(),
            image: Some(image),
        }
    }
}

/// Presentation-only zoom and pan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub scale_percent: u32,
    pub pan: (f32, f32),
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self { scale_percent: 100, pan: (0.0, 0.0) }
    }
}
