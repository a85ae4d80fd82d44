// ============================================================================
// OPS — pixel engine
// ============================================================================
//
// Layout:
//   color_space.rs — sRGB → XYZ / Lab / OKLCh, WCAG contrast
//   adjustments.rs — two-point tone curve LUT, histogram
//   filters.rs     — 3×3 convolution and kernel presets
//   transform.rs   — nearest-neighbour / bilinear resampling
//   compositor.rs  — blend modes, stack flattening, alpha-channel masks
//   layout.rs      — fit-to-view scale, pan clamp, display render
// ============================================================================

pub mod adjustments;
pub mod color_space;
pub mod compositor;
pub mod filters;
pub mod layout;
pub mod transform;

pub use compositor::{apply_alpha_channels, blend, color_fill, composite_stack};
pub use layout::{optimal_scale, place_with_pan, render_view};
pub use transform::{Interpolation, resize};
