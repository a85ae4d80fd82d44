// ============================================================================
// Gb7Studio CLI — headless batch processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   gb7studio -i photo.png -o photo.gb7                      (format from output ext)
//   gb7studio -i scan.gb7 --curve 30,0,220,255 --filter sharpen -o out.png
//   gb7studio -i *.jpg --overlay-color "#ff8000" --blend multiply --opacity 0.5 --output-dir tinted/
//   gb7studio -i photo.png --mask matte.gb7 --resize 50% --interpolation nearest -f png
//   gb7studio -i photo.png --sample 10,20 --info
//
// Each file runs load → curves → filter (both on the bottom layer) →
// second layer and masks → resize → report → export. Curves and filters go
// through the background job dispatcher and are waited on before the next step.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::{BlendMode, Layer};
use crate::io::{NativeDecoder, SaveFormat, export_document, load_alpha_channel, load_image_sync, load_layer_image};
use crate::jobs::{JobClass, JobDispatcher, OperationKind};
use crate::ops::adjustments::{self, CurveChannel, CurvePoint, CurvesSettings};
use crate::ops::color_space::{self, Rgb};
use crate::ops::filters::{FilterSettings, KernelPreset, unflatten_kernel};
use crate::ops::transform::{Interpolation, ResizeTarget};
use crate::project::{ColorInfo, Document};
use crate::settings::EditorSettings;
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Gb7Studio headless image processor.
#[derive(Parser, Debug)]
#[command(
    name = "gb7studio",
    about = "Gb7Studio headless batch image processor",
    long_about = "Composite, correct, resize and convert images without a GUI.\n\
                  Reads PNG, JPEG, GrayBit-7 (.gb7) and Gb7Studio projects (.gbx);\n\
                  writes PNG, JPEG, GrayBit-7 and projects.\n\n\
                  Example:\n  \
                  gb7studio -i photo.png --curve 0,20,255,235 --filter gaussian -o soft.gb7\n  \
                  gb7studio -i *.png --overlay-color \"#3050ff\" --blend screen --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "scans/*.gb7").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, gb7, gbx.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100). Defaults to the saved setting.
    #[arg(short, long, value_name = "1-100")]
    pub quality: Option<u8>,

    /// Second layer from an image file.
    #[arg(long, value_name = "FILE", conflicts_with = "overlay_color")]
    pub overlay: Option<PathBuf>,

    /// Second layer as a solid colour (#rrggbb).
    #[arg(long, value_name = "HEX")]
    pub overlay_color: Option<String>,

    /// Blend mode of the second layer: normal, multiply, screen, overlay.
    #[arg(long, default_value = "normal", value_name = "MODE")]
    pub blend: String,

    /// Opacity of the second layer (0.0–1.0).
    #[arg(long, default_value_t = 1.0, value_name = "0-1")]
    pub opacity: f32,

    /// Alpha channel file(s) multiplied into the final alpha. Repeatable.
    #[arg(long, value_name = "FILE")]
    pub mask: Vec<PathBuf>,

    /// Two-point tone curve "x1,y1,x2,y2" applied to the bottom layer.
    #[arg(long, value_name = "X1,Y1,X2,Y2")]
    pub curve: Option<String>,

    /// Channel the curve targets: rgb or alpha.
    #[arg(long, default_value = "rgb", value_name = "CHANNEL")]
    pub curve_channel: String,

    /// Kernel preset: identity, sharpen, gaussian, box-blur, prewitt-x, prewitt-y.
    #[arg(long, value_name = "PRESET", conflicts_with = "kernel")]
    pub filter: Option<String>,

    /// Custom 3×3 kernel as nine comma-separated values, row-major.
    #[arg(long, value_name = "K0,..,K8", allow_hyphen_values = true)]
    pub kernel: Option<String>,

    /// Divisor for --kernel. Defaults to the sum of positive entries.
    #[arg(long, value_name = "D", allow_hyphen_values = true)]
    pub divisor: Option<f32>,

    /// Resize to "WxH" pixels or "N%" of the current size.
    #[arg(long, value_name = "WxH|N%")]
    pub resize: Option<String>,

    /// Resampling method: nearest or bilinear. Defaults to the saved setting.
    #[arg(long, value_name = "METHOD")]
    pub interpolation: Option<String>,

    /// Print the composited colour at "X,Y" in every colour space.
    #[arg(long, value_name = "X,Y")]
    pub sample: Option<String>,

    /// Print size, colour depth, layers and fit-to-view scale.
    #[arg(long)]
    pub info: bool,

    /// Also write the fit-to-viewport display render as PNG.
    #[arg(long, value_name = "FILE")]
    pub preview: Option<PathBuf>,

    /// Print per-file timing and mirror the session log to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Second-layer source.
#[derive(Clone, Debug, PartialEq)]
enum OverlaySource {
    File(PathBuf),
    Color(String),
}

/// Everything `run_one` needs, validated once for the whole batch.
#[derive(Clone, Debug)]
struct Pipeline {
    overlay: Option<OverlaySource>,
    blend: BlendMode,
    opacity: f32,
    masks: Vec<PathBuf>,
    curve: Option<CurvesSettings>,
    filter: Option<FilterSettings>,
    resize: Option<ResizeTarget>,
    interpolation: Interpolation,
    sample: Option<(u32, u32)>,
    info: bool,
    preview: Option<PathBuf>,
    format: SaveFormat,
    quality: u8,
    max_layers: usize,
    viewport: (u32, u32),
    view_padding: u32,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs, settings: &EditorSettings) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let pipeline = match build_pipeline(&args, settings) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;
    let mut jobs = JobDispatcher::new();

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let output_path = match build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            pipeline.format,
        ) {
            Some(p) => p,
            None => {
                eprintln!(
                    "  error: cannot determine output path for '{}'.",
                    input_path.display()
                );
                any_failure = true;
                continue;
            }
        };

        match run_one(input_path, &output_path, &pipeline, &mut jobs) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn build_pipeline(args: &CliArgs, settings: &EditorSettings) -> Result<Pipeline, String> {
    let overlay = match (&args.overlay, &args.overlay_color) {
        (Some(path), _) => Some(OverlaySource::File(path.clone())),
        (None, Some(hex)) => {
            color_space::parse_hex_color(hex).map_err(|e| e.to_string())?;
            Some(OverlaySource::Color(hex.clone()))
        }
        (None, None) => None,
    };

    let blend = BlendMode::from_name(&args.blend)
        .ok_or_else(|| format!("unknown blend mode '{}'", args.blend))?;
    if !(0.0..=1.0).contains(&args.opacity) {
        return Err(format!("opacity {} is outside 0..1", args.opacity));
    }

    let curve = match &args.curve {
        Some(raw) => {
            let channel = CurveChannel::from_name(&args.curve_channel)
                .ok_or_else(|| format!("unknown curve channel '{}'", args.curve_channel))?;
            Some(parse_curve(raw, channel)?)
        }
        None => None,
    };

    let filter = match (&args.filter, &args.kernel) {
        (Some(name), _) => {
            let preset = KernelPreset::from_key(name).ok_or_else(|| {
                let known: Vec<&str> = KernelPreset::all().iter().map(|p| p.key()).collect();
                format!("unknown filter '{}' (expected one of: {})", name, known.join(", "))
            })?;
            Some(FilterSettings::from_preset(preset))
        }
        (None, Some(values)) => {
            let values = parse_numbers(values)?;
            let kernel = unflatten_kernel(&values).map_err(|e| e.to_string())?;
            if args.divisor == Some(0.0) {
                return Err("--divisor must not be zero".into());
            }
            Some(FilterSettings::custom(kernel, args.divisor))
        }
        (None, None) => None,
    };

    let resize = args.resize.as_deref().map(parse_resize).transpose()?;

    let interpolation = match &args.interpolation {
        Some(name) => Interpolation::from_key(name)
            .ok_or_else(|| format!("unknown interpolation '{}'", name))?,
        None => settings.interpolation,
    };

    let sample = args.sample.as_deref().map(parse_point).transpose()?;

    let format = parse_format(args.format.as_deref(), args.output.as_deref())?;
    let quality = args.quality.unwrap_or(settings.jpeg_quality);
    if !(1..=100).contains(&quality) {
        return Err(format!("quality {} is outside 1..100", quality));
    }

    Ok(Pipeline {
        overlay,
        blend,
        opacity: args.opacity,
        masks: args.mask.clone(),
        curve,
        filter,
        resize,
        interpolation,
        sample,
        info: args.info,
        preview: args.preview.clone(),
        format,
        quality,
        max_layers: settings.max_layers,
        viewport: (settings.viewport_width, settings.viewport_height),
        view_padding: settings.view_padding,
    })
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    input: &Path,
    output: &Path,
    pipeline: &Pipeline,
    jobs: &mut JobDispatcher<image::RgbaImage>,
) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let mut doc = load_image_sync(input, pipeline.max_layers).map_err(|e| format!("load failed: {}", e))?;

    // -- Step 2: Per-layer corrections on the bottom layer -------------------
    if let Some(base_id) = doc.layers.layers.first().map(|l| l.id) {
        doc.layers.set_active_layer(base_id);

        if let Some(settings) = pipeline.curve {
            run_layer_job(&mut doc, jobs, OperationKind::Curves, move |px| {
                Ok(adjustments::apply_curve(&px, &settings))
            })?;
        }
        if let Some(settings) = pipeline.filter {
            run_layer_job(&mut doc, jobs, OperationKind::Filter, move |px| settings.apply(&px))?;
        }
    }

    // -- Step 3: Second layer and alpha channels -------------------------
    if let Some(source) = &pipeline.overlay {
        let layer = match source {
            OverlaySource::File(path) => {
                let px = load_layer_image(path, &NativeDecoder)
                    .map_err(|e| format!("overlay '{}': {}", path.display(), e))?;
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "Overlay".to_string());
                Layer::new_image(name, px)
            }
            OverlaySource::Color(hex) => Layer::new_color("Color", hex.clone()),
        };
        let layer = layer.with_blend(pipeline.blend, pipeline.opacity);
        if doc.layers.add_layer(layer).is_none() {
            return Err(format!("layer limit of {} reached", doc.layers.max_layers));
        }
        doc.mark_dirty();
    }
    for path in &pipeline.masks {
        let channel = load_alpha_channel(path, &NativeDecoder)
            .map_err(|e| format!("mask '{}': {}", path.display(), e))?;
        doc.layers.add_alpha_channel(channel);
        doc.mark_dirty();
    }

    // -- Step 4: Resize ---------------------------------------------------
    if let Some(target) = pipeline.resize {
        doc.resize_image(target, pipeline.interpolation)
            .map_err(|e| format!("resize failed: {}", e))?;
    }

    // -- Step 5: Report ---------------------------------------------------
    if pipeline.info {
        print_info(&mut doc, pipeline);
    }
    if let Some((x, y)) = pipeline.sample {
        match doc.sample_color(x, y).map_err(|e| e.to_string())? {
            Some(info) => print_sample(&info),
            None => println!("  sample ({}, {}) is outside the image", x, y),
        }
    }
    if let Some(path) = &pipeline.preview {
        doc.fit_to_viewport(pipeline.viewport.0, pipeline.viewport.1, pipeline.view_padding);
        let view = doc
            .render(pipeline.viewport, pipeline.interpolation)
            .map_err(|e| format!("preview failed: {}", e))?;
        crate::io::encode_and_write(&view, path, SaveFormat::Png, pipeline.quality)
            .map_err(|e| format!("preview failed: {}", e))?;
    }

    // -- Step 6: Save -----------------------------------------------------
    export_document(&doc, output, pipeline.format, pipeline.quality)
        .map_err(|e| format!("save failed: {}", e))?;
    doc.mark_clean();
    log_info!("{} → {}", input.display(), output.display());

    Ok(())
}

/// Run `op` on a copy of the active layer in the background and install the
/// result once it arrives.
fn run_layer_job(
    doc: &mut Document,
    jobs: &mut JobDispatcher<image::RgbaImage>,
    kind: OperationKind,
    op: impl FnOnce(image::RgbaImage) -> crate::error::Result<image::RgbaImage> + Send + 'static,
) -> Result<(), String> {
    let layer = doc
        .layers
        .active_layer()
        .ok_or_else(|| "no active layer".to_string())?;
    let layer_id = layer.id;
    let Some(pixels) = layer.pixels().cloned() else {
        return Err(format!("layer '{}' has no pixels", layer.name));
    };

    let class = JobClass::new(Some(layer_id), kind);
    let result = jobs
        .run_blocking(class, move || op(pixels))
        .map_err(|e| format!("{} failed: {}", kind.name(), e))?;
    doc.replace_layer_pixels(layer_id, result);
    Ok(())
}

fn print_info(doc: &mut Document, pipeline: &Pipeline) {
    if let Some(status) = doc.status {
        println!(
            "  size: {}x{}  colour depth: {} bit",
            status.width, status.height, status.color_depth
        );
    }
    for (i, layer) in doc.layers.layers.iter().enumerate() {
        println!(
            "  layer {}: '{}' {} {:.0}%{}",
            i,
            layer.name,
            layer.blend_mode.name(),
            layer.opacity * 100.0,
            if layer.visible { "" } else { " (hidden)" }
        );
    }
    if !doc.layers.alpha_channels.is_empty() {
        println!("  alpha channels: {}", doc.layers.alpha_channels.len());
    }
    if let Ok(hist) = doc.active_histogram() {
        let peak = |c: &[u32; 256]| c.iter().enumerate().max_by_key(|(_, n)| **n).map(|(i, _)| i).unwrap_or(0);
        println!(
            "  histogram peaks: R {} G {} B {} A {}",
            peak(&hist.red),
            peak(&hist.green),
            peak(&hist.blue),
            peak(&hist.alpha)
        );
    }
    let scale = doc.fit_to_viewport(pipeline.viewport.0, pipeline.viewport.1, pipeline.view_padding);
    println!(
        "  fit to {}x{} viewport: {}%",
        pipeline.viewport.0, pipeline.viewport.1, scale
    );
}

fn print_sample(info: &ColorInfo) {
    let (x, y) = info.position;
    println!("  sample ({}, {}): {}", x, y, info.rgb.to_hex());
    println!(
        "    RGB   {} {} {}",
        info.rgb.r, info.rgb.g, info.rgb.b
    );
    println!(
        "    XYZ   {:.2} {:.2} {:.2}",
        info.xyz.x, info.xyz.y, info.xyz.z
    );
    println!(
        "    Lab   {:.2} {:.2} {:.2}",
        info.lab.l, info.lab.a, info.lab.b
    );
    println!(
        "    OKLCh {:.3} {:.3} {:.1}",
        info.oklch.l, info.oklch.c, info.oklch.h
    );
    for (label, other) in [("white", Rgb::WHITE), ("black", Rgb::BLACK)] {
        let ratio = color_space::wcag_contrast(info.rgb, other);
        println!(
            "    contrast vs {}: {:.2}:1 {}",
            label,
            ratio,
            if color_space::is_contrast_sufficient(ratio) { "(AA)" } else { "" }
        );
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the [`SaveFormat`] from the `--format` string or infer it from the
/// output file extension. Defaults to PNG when neither is given.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> Result<SaveFormat, String> {
    if let Some(f) = format_arg {
        return SaveFormat::from_name(f).ok_or_else(|| format!("unknown output format '{}'", f));
    }
    Ok(output.and_then(SaveFormat::from_path).unwrap_or(SaveFormat::Png))
}

fn parse_numbers(s: &str) -> Result<Vec<f32>, String> {
    s.split(',')
        .map(|v| {
            v.trim()
                .parse::<f32>()
                .map_err(|_| format!("'{}' is not a number", v.trim()))
        })
        .collect()
}

fn parse_u8_list(s: &str, expected: usize) -> Result<Vec<u8>, String> {
    let values: Vec<u8> = s
        .split(',')
        .map(|v| v.trim().parse::<u8>().map_err(|_| format!("'{}' is not in 0..255", v.trim())))
        .collect::<Result<_, _>>()?;
    if values.len() != expected {
        return Err(format!("expected {} values, got {}", expected, values.len()));
    }
    Ok(values)
}

fn parse_curve(s: &str, channel: CurveChannel) -> Result<CurvesSettings, String> {
    let v = parse_u8_list(s, 4).map_err(|e| format!("--curve: {}", e))?;
    if v[0] > v[2] {
        return Err(format!("--curve: x1 ({}) must not exceed x2 ({})", v[0], v[2]));
    }
    Ok(CurvesSettings {
        point1: CurvePoint::new(v[0], v[1]),
        point2: CurvePoint::new(v[2], v[3]),
        target_channel: channel,
    })
}

/// "WxH" in pixels or "N%" for both axes.
fn parse_resize(s: &str) -> Result<ResizeTarget, String> {
    let s = s.trim();
    if let Some(pct) = s.strip_suffix('%') {
        let p = pct
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("--resize: '{}' is not a percentage", s))?;
        return Ok(ResizeTarget::Percent { width: p, height: p });
    }
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("--resize: expected WxH or N%, got '{}'", s))?;
    let width = w.trim().parse::<u32>().map_err(|_| format!("--resize: bad width '{}'", w))?;
    let height = h.trim().parse::<u32>().map_err(|_| format!("--resize: bad height '{}'", h))?;
    Ok(ResizeTarget::Pixels { width, height })
}

fn parse_point(s: &str) -> Result<(u32, u32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("--sample: expected X,Y, got '{}'", s))?;
    let x = x.trim().parse().map_err(|_| format!("--sample: bad x '{}'", x))?;
    let y = y.trim().parse().map_err(|_| format!("--sample: bad y '{}'", y))?;
    Ok((x, y))
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, same stem, new extension
///    (appends `_out` to stem if it would collide with the input path)
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));

    // Avoid silent overwrite of the input
    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["gb7studio", "-i", "in.png"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn format_from_flag_or_extension() {
        assert_eq!(parse_format(Some("GB7"), None), Ok(SaveFormat::Gb7));
        assert_eq!(parse_format(None, Some(Path::new("x.jpeg"))), Ok(SaveFormat::Jpeg));
        assert_eq!(parse_format(None, Some(Path::new("x.webp"))), Ok(SaveFormat::Png));
        assert_eq!(parse_format(None, None), Ok(SaveFormat::Png));
        assert!(parse_format(Some("tiff"), None).is_err());
    }

    #[test]
    fn output_path_rules() {
        let input = Path::new("dir/photo.png");
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out")), SaveFormat::Gb7),
            Some(PathBuf::from("out/photo.gb7"))
        );
        assert_eq!(
            build_output_path(input, None, None, SaveFormat::Png),
            Some(PathBuf::from("dir/photo_out.png"))
        );
        assert_eq!(
            build_output_path(input, Some(Path::new("x.jpg")), None, SaveFormat::Jpeg),
            Some(PathBuf::from("x.jpg"))
        );
    }

    #[test]
    fn resize_and_point_parsing() {
        assert_eq!(parse_resize("640x480"), Ok(ResizeTarget::Pixels { width: 640, height: 480 }));
        assert_eq!(parse_resize("50%"), Ok(ResizeTarget::Percent { width: 50, height: 50 }));
        assert!(parse_resize("big").is_err());
        assert_eq!(parse_point("3, 4"), Ok((3, 4)));
        assert!(parse_point("3").is_err());
    }

    #[test]
    fn curve_parsing() {
        let c = parse_curve("10,0,200,255", CurveChannel::Alpha).unwrap();
        assert_eq!(c.point1, CurvePoint::new(10, 0));
        assert_eq!(c.point2, CurvePoint::new(200, 255));
        assert_eq!(c.target_channel, CurveChannel::Alpha);
        assert!(parse_curve("10,0,200", CurveChannel::Rgb).is_err());
        assert!(parse_curve("10,0,300,1", CurveChannel::Rgb).is_err());
        assert!(parse_curve("200,0,10,1", CurveChannel::Rgb).is_err());
    }

    #[test]
    fn pipeline_from_args() {
        let settings = EditorSettings::default();
        let p = build_pipeline(
            &args(&["--overlay-color", "#ff0000", "--blend", "screen", "--opacity", "0.5", "--filter", "box-blur"]),
            &settings,
        )
        .unwrap();
        assert_eq!(p.overlay, Some(OverlaySource::Color("#ff0000".into())));
        assert_eq!(p.blend, BlendMode::Screen);
        assert_eq!(p.filter.unwrap().divisor, 9.0);
        assert_eq!(p.quality, settings.jpeg_quality);
        assert_eq!(p.interpolation, settings.interpolation);
    }

    #[test]
    fn custom_kernel_with_negative_values() {
        let p = build_pipeline(&args(&["--kernel", "0,-1,0,-1,5,-1,0,-1,0"]), &EditorSettings::default()).unwrap();
        let f = p.filter.unwrap();
        assert_eq!(f.kernel, KernelPreset::Sharpen.kernel());
        assert_eq!(f.divisor, 5.0);
    }

    #[test]
    fn invalid_options_are_rejected() {
        let s = EditorSettings::default();
        assert!(build_pipeline(&args(&["--blend", "dodge"]), &s).is_err());
        assert!(build_pipeline(&args(&["--overlay-color", "red"]), &s).is_err());
        assert!(build_pipeline(&args(&["--opacity", "2"]), &s).is_err());
        assert!(build_pipeline(&args(&["--kernel", "1,2,3"]), &s).is_err());
        assert!(build_pipeline(&args(&["--kernel", "1,1,1,1,1,1,1,1,1", "--divisor", "0"]), &s).is_err());
        assert!(build_pipeline(&args(&["--filter", "emboss"]), &s).is_err());
        assert!(build_pipeline(&args(&["--quality", "0"]), &s).is_err());
    }
}
