// ============================================================================
// Gb7Studio — raster editing engine: colour spaces, GrayBit-7 codec,
// convolution, curves, resampling, layer compositing, view layout and
// background jobs, plus the headless command-line front end.
// ============================================================================

#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod error;
pub mod gb7;
pub mod io;
pub mod jobs;
pub mod ops;
pub mod project;
pub mod settings;

pub use canvas::{BlendMode, Layer, LayerStack, PixelBuffer};
pub use error::{EditorError, Result};
pub use project::Document;
