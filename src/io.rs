use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::canvas::{AlphaChannel, BlendMode, Layer, LayerKind, LayerStack, PixelBuffer};
use crate::error::{EditorError, Result};
use crate::gb7;
use crate::project::{CanvasStatus, Document, NATIVE_COLOR_DEPTH};
use crate::{log_info, log_warn};

// ============================================================================
// DECODING
// ============================================================================

/// Turns encoded bytes (PNG, JPEG, ...) into an RGBA buffer.
pub trait ImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer>;
}

/// Decoder backed by the `image` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeDecoder;

impl ImageDecoder for NativeDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer> {
        Ok(image::load_from_memory(bytes)?.to_rgba8())
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn is_native_extension(ext: &str) -> bool {
    matches!(ext, "png" | "jpg" | "jpeg")
}

fn unsupported(path: &Path) -> EditorError {
    EditorError::Decode(format!("unsupported file type: {}", path.display()))
}

/// Synchronously load any supported file into a [`Document`].
///
/// Supported inputs:
/// - `.gbx` — layered project file (layers and masks preserved)
/// - `.gb7` — GrayBit-7; a mask bit plane becomes an alpha channel
/// - `.png` / `.jpg` / `.jpeg` — through `decoder`
pub fn load_document(path: &Path, decoder: &dyn ImageDecoder, max_layers: usize) -> Result<Document> {
    let ext = extension_of(path);

    if ext == "gbx" {
        return load_project(path);
    }

    let bytes = std::fs::read(path)?;
    let doc = match ext.as_str() {
        "gb7" => {
            let decoded = gb7::decode(&bytes)?;
            let mut doc = Document::from_image(
                Some(path.to_path_buf()),
                decoded.to_rgba(),
                decoded.color_depth,
                max_layers,
            );
            if let Some(mask) = decoded.mask_image() {
                doc.attach_mask("GB7 mask", &mask);
                doc.mark_clean();
            }
            doc
        }
        e if is_native_extension(e) => {
            let img = decoder.decode(&bytes)?;
            Document::from_image(Some(path.to_path_buf()), img, NATIVE_COLOR_DEPTH, max_layers)
        }
        _ => return Err(unsupported(path)),
    };

    log_info!(
        "Loaded '{}' ({}x{})",
        path.display(),
        doc.image.original_width,
        doc.image.original_height
    );
    Ok(doc)
}

/// [`load_document`] with the built-in decoder.
pub fn load_image_sync(path: &Path, max_layers: usize) -> Result<Document> {
    load_document(path, &NativeDecoder, max_layers)
}

/// Pixels for a new image layer. GrayBit-7 masks become real transparency.
pub fn load_layer_image(path: &Path, decoder: &dyn ImageDecoder) -> Result<PixelBuffer> {
    let ext = extension_of(path);
    let bytes = std::fs::read(path)?;
    match ext.as_str() {
        "gb7" => Ok(gb7::decode(&bytes)?.to_rgba_masked()),
        e if is_native_extension(e) => decoder.decode(&bytes),
        _ => Err(unsupported(path)),
    }
}

/// Alpha channel from a file. GrayBit-7 files contribute their mask bit when
/// present, anything else its red (gray) channel.
pub fn load_alpha_channel(path: &Path, decoder: &dyn ImageDecoder) -> Result<AlphaChannel> {
    let ext = extension_of(path);
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Alpha")
        .to_string();
    let bytes = std::fs::read(path)?;
    match ext.as_str() {
        "gb7" => {
            let decoded = gb7::decode(&bytes)?;
            Ok(match decoded.mask_image() {
                Some(mask) => AlphaChannel::from_mask(name, &mask),
                None => AlphaChannel::new(name, Some(decoded.to_rgba())),
            })
        }
        e if is_native_extension(e) => Ok(AlphaChannel::new(name, Some(decoder.decode(&bytes)?))),
        _ => Err(unsupported(path)),
    }
}

// ============================================================================
// ENCODING
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveFormat {
    Png,
    Jpeg,
    Gb7,
    /// Layered project file.
    Gbx,
}

impl SaveFormat {
    pub fn all() -> &'static [SaveFormat] {
        &[SaveFormat::Png, SaveFormat::Jpeg, SaveFormat::Gb7, SaveFormat::Gbx]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Gb7 => "gb7",
            SaveFormat::Gbx => "gbx",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "gb7" => Some(SaveFormat::Gb7),
            "gbx" => Some(SaveFormat::Gbx),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        Self::from_name(&extension_of(path))
    }
}

/// Encode and write a flat image. Project files go through [`save_project`].
pub fn encode_and_write(image: &RgbaImage, path: &Path, format: SaveFormat, quality: u8) -> Result<()> {
    if format == SaveFormat::Gbx {
        return Err(EditorError::Project(
            "project files are written from a document, not a flat image".into(),
        ));
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        SaveFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            #[allow(deprecated)]
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Jpeg => {
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            encoder.encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        SaveFormat::Gb7 => {
            writer.write_all(&gb7::encode(image)?)?;
        }
        SaveFormat::Gbx => {}
    }

    writer.flush()?;
    Ok(())
}

/// Write the document: flattened and masked at the original size, or as a
/// project file for [`SaveFormat::Gbx`].
pub fn export_document(doc: &Document, path: &Path, format: SaveFormat, quality: u8) -> Result<()> {
    if format == SaveFormat::Gbx {
        return save_project(doc, path);
    }
    let flat = doc
        .flatten()?
        .ok_or_else(|| EditorError::InvalidDimensions("document has no image to export".into()))?;
    encode_and_write(&flat, path, format, quality)?;
    log_info!(
        "Exported '{}' as {:?} ({}x{})",
        path.display(),
        format,
        flat.width(),
        flat.height()
    );
    Ok(())
}

// ============================================================================
// GBX PROJECT FILE FORMAT
// ============================================================================

const GBX_MAGIC: &str = "GBX1";

/// Maximum supported canvas dimension in pixels (per axis).
/// Prevents memory exhaustion from crafted project files.
const MAX_CANVAS_DIM: u32 = 32_768;
/// Maximum number of layers or alpha channels in a project file.
const MAX_PROJECT_ENTRIES: usize = 256;

#[derive(Serialize, Deserialize)]
struct ProjectFile {
    magic: String,
    name: String,
    width: u32,
    height: u32,
    color_depth: u8,
    max_layers: usize,
    active_layer_index: Option<usize>,
    base_image: Option<Vec<u8>>,
    layers: Vec<LayerData>,
    alpha_channels: Vec<AlphaChannelData>,
}

#[derive(Serialize, Deserialize)]
struct RasterData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct LayerData {
    name: String,
    visible: bool,
    opacity: f32,
    blend_mode: u8,
    /// Set for colour layers.
    color: Option<String>,
    /// Set for image layers that hold pixels.
    raster: Option<RasterData>,
}

#[derive(Serialize, Deserialize)]
struct AlphaChannelData {
    name: String,
    visible: bool,
    raster: Option<RasterData>,
}

impl RasterData {
    fn from_image(img: &PixelBuffer) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            pixels: img.as_raw().clone(),
        }
    }

    fn into_image(self, owner: &str) -> Result<PixelBuffer> {
        if self.width > MAX_CANVAS_DIM || self.height > MAX_CANVAS_DIM {
            return Err(EditorError::Project(format!(
                "'{}' is {}x{}, larger than {}x{}",
                owner, self.width, self.height, MAX_CANVAS_DIM, MAX_CANVAS_DIM
            )));
        }
        let expected = self.width as usize * self.height as usize * 4;
        if self.pixels.len() != expected {
            return Err(EditorError::Project(format!(
                "'{}' has {} pixel bytes, expected {}",
                owner,
                self.pixels.len(),
                expected
            )));
        }
        RgbaImage::from_raw(self.width, self.height, self.pixels)
            .ok_or_else(|| EditorError::Project(format!("failed to rebuild pixels of '{}'", owner)))
    }
}

fn build_project(doc: &Document) -> ProjectFile {
    let stack = &doc.layers;
    let active_layer_index = stack.active_layer_id().and_then(|id| stack.index_of(id));

    let layers = stack
        .layers
        .iter()
        .map(|layer| {
            let (color, raster) = match &layer.kind {
                LayerKind::Color(hex) => (Some(hex.clone()), None),
                LayerKind::Image(img) => (None, img.as_ref().map(RasterData::from_image)),
            };
            LayerData {
                name: layer.name.clone(),
                visible: layer.visible,
                opacity: layer.opacity,
                blend_mode: layer.blend_mode.to_u8(),
                color,
                raster,
            }
        })
        .collect();

    let alpha_channels = stack
        .alpha_channels
        .iter()
        .map(|ch| AlphaChannelData {
            name: ch.name.clone(),
            visible: ch.visible,
            raster: ch.image.as_ref().map(RasterData::from_image),
        })
        .collect();

    ProjectFile {
        magic: GBX_MAGIC.to_string(),
        name: doc.name.clone(),
        width: doc.image.original_width,
        height: doc.image.original_height,
        color_depth: doc.status.map(|s| s.color_depth).unwrap_or(NATIVE_COLOR_DEPTH),
        max_layers: stack.max_layers,
        active_layer_index,
        base_image: doc.image.image.as_ref().map(|img| img.as_raw().clone()),
        layers,
        alpha_channels,
    }
}

/// Save a document as a .gbx project file
pub fn save_project(doc: &Document, path: &Path) -> Result<()> {
    let project = build_project(doc);
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    bincode::serialize_into(writer, &project)?;
    log_info!("Saved project '{}' ({} layers)", path.display(), project.layers.len());
    Ok(())
}

/// Load a .gbx project file
pub fn load_project(path: &Path) -> Result<Document> {
    let raw = std::fs::read(path)?;
    if raw.len() < 12 {
        return Err(EditorError::Project("file too small".into()));
    }
    // bincode writes a String as an 8-byte length prefix + UTF-8 data,
    // so bytes 8..12 hold the magic.
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != GBX_MAGIC {
        return Err(EditorError::Project(format!("unknown magic '{}'", magic)));
    }

    let project: ProjectFile = bincode::deserialize(&raw)?;
    document_from_project(project, path.to_path_buf())
}

fn document_from_project(project: ProjectFile, path: PathBuf) -> Result<Document> {
    let (w, h) = (project.width, project.height);
    if w == 0 || h == 0 {
        return Err(EditorError::Project("canvas dimensions cannot be zero".into()));
    }
    if w > MAX_CANVAS_DIM || h > MAX_CANVAS_DIM {
        return Err(EditorError::Project(format!(
            "canvas size {}x{} exceeds maximum allowed {}x{}",
            w, h, MAX_CANVAS_DIM, MAX_CANVAS_DIM
        )));
    }
    if project.layers.len() > MAX_PROJECT_ENTRIES || project.alpha_channels.len() > MAX_PROJECT_ENTRIES {
        return Err(EditorError::Project(format!(
            "project lists {} layers and {} channels, maximum is {}",
            project.layers.len(),
            project.alpha_channels.len(),
            MAX_PROJECT_ENTRIES
        )));
    }

    let mut doc = Document::new_untitled(1, project.max_layers.max(1));
    doc.path = Some(path);
    doc.update_name_from_path();

    if let Some(pixels) = project.base_image {
        let base = RasterData { width: w, height: h, pixels }.into_image("base image")?;
        doc.set_image(base, project.color_depth);
    } else {
        doc.image.original_width = w;
        doc.image.original_height = h;
        doc.status = Some(CanvasStatus { width: w, height: h, color_depth: project.color_depth });
    }

    let capacity = project.max_layers.max(project.layers.len()).max(1);
    if capacity > project.max_layers {
        log_warn!(
            "Project holds {} layers but allows {}; raising the limit",
            project.layers.len(),
            project.max_layers
        );
    }
    let mut stack = LayerStack::new(capacity);

    for ld in project.layers {
        let kind = match (ld.color, ld.raster) {
            (Some(hex), _) => LayerKind::Color(hex),
            (None, Some(raster)) => LayerKind::Image(Some(raster.into_image(&ld.name)?)),
            (None, None) => LayerKind::Image(None),
        };
        let mut layer = Layer::new(ld.name, kind);
        layer.visible = ld.visible;
        layer.opacity = ld.opacity.clamp(0.0, 1.0);
        layer.blend_mode = BlendMode::from_u8(ld.blend_mode);
        stack.add_layer(layer);
    }
    for cd in project.alpha_channels {
        let image = match cd.raster {
            Some(r) => Some(r.into_image(&cd.name)?),
            None => None,
        };
        let mut channel = AlphaChannel::new(cd.name, image);
        channel.visible = cd.visible;
        stack.add_alpha_channel(channel);
    }
    if let Some(idx) = project.active_layer_index
        && let Some(id) = stack.layers.get(idx).map(|l| l.id)
    {
        stack.set_active_layer(id);
    }

    doc.layers = stack;
    doc.mark_clean();
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gb7studio-io-{}-{}", uuid::Uuid::new_v4(), name))
    }

    #[test]
    fn format_names() {
        for f in SaveFormat::all() {
            assert_eq!(SaveFormat::from_name(f.extension()), Some(*f));
        }
        assert_eq!(SaveFormat::from_path(Path::new("a/b.JPEG")), Some(SaveFormat::Jpeg));
        assert_eq!(SaveFormat::from_path(Path::new("a/b.tiff")), None);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let path = temp_path("x.bmp");
        std::fs::write(&path, b"BM").unwrap();
        assert!(matches!(load_image_sync(&path, 2), Err(EditorError::Decode(_))));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn corrupt_png_is_a_decode_error() {
        let path = temp_path("broken.png");
        std::fs::write(&path, b"not a png at all").unwrap();
        assert!(matches!(load_image_sync(&path, 2), Err(EditorError::Decode(_))));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn gbx_cannot_be_flat_encoded() {
        let img = RgbaImage::new(1, 1);
        let r = encode_and_write(&img, &temp_path("x.gbx"), SaveFormat::Gbx, 90);
        assert!(matches!(r, Err(EditorError::Project(_))));
    }

    #[test]
    fn png_round_trip_keeps_alpha() {
        let path = temp_path("rt.png");
        let img = RgbaImage::from_fn(3, 2, |x, y| Rgba([x as u8 * 80, y as u8 * 100, 7, 128 + x as u8]));
        encode_and_write(&img, &path, SaveFormat::Png, 90).unwrap();
        let back = load_layer_image(&path, &NativeDecoder).unwrap();
        assert_eq!(back, img);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn masked_gb7_loads_with_alpha_channel() {
        let path = temp_path("masked.gb7");
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 0, Rgba([255, 255, 255, 0]));
        encode_and_write(&img, &path, SaveFormat::Gb7, 90).unwrap();

        let doc = load_image_sync(&path, 2).unwrap();
        assert_eq!(doc.status.unwrap().color_depth, 7);
        assert_eq!(doc.layers.alpha_channels.len(), 1);
        assert!(!doc.is_dirty);
        let flat = doc.flatten().unwrap().unwrap();
        assert_eq!(flat.get_pixel(0, 0).0, [254, 254, 254, 255]);
        assert_eq!(flat.get_pixel(1, 0)[3], 0);

        let layer_px = load_layer_image(&path, &NativeDecoder).unwrap();
        assert_eq!(layer_px.get_pixel(1, 0)[3], 0);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn project_rejects_wrong_magic() {
        let path = temp_path("bad.gbx");
        std::fs::write(&path, [0u8; 32]).unwrap();
        assert!(matches!(load_project(&path), Err(EditorError::Project(_))));
        let _ = std::fs::remove_file(path);
    }

    struct SolidDecoder;

    impl ImageDecoder for SolidDecoder {
        fn decode(&self, _bytes: &[u8]) -> Result<PixelBuffer> {
            Ok(RgbaImage::from_pixel(3, 3, Rgba([1, 2, 3, 255])))
        }
    }

    #[test]
    fn custom_decoder_is_used_for_native_files() {
        let path = temp_path("fake.jpg");
        std::fs::write(&path, b"whatever").unwrap();
        let doc = load_document(&path, &SolidDecoder, 2).unwrap();
        assert_eq!(doc.image.original_width, 3);
        assert_eq!(doc.status.unwrap().color_depth, 24);
        let _ = std::fs::remove_file(path);
    }
}
