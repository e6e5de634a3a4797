//! Engine collaborator traits for watermark application.
//!
//! The command core never touches pixels. It talks to an engine through
//! three seams: a loader that produces overlay handles, overlay handles
//! that expose their dimensions and resize in place, and a background
//! handle that composites overlays and renders text labels.
//!
//! Implementations live behind these traits so the dispatcher can run
//! against any raster backend (or a recording fake in tests). The crate
//! ships one real engine in [`raster`].
//!
//! # Example
//!
//! ```ignore
//! use imagemark::engine::{Background, OverlayLoader};
//!
//! fn apply<B, L>(background: &mut B, loader: &L)
//! where
//!     B: Background,
//!     L: OverlayLoader<Overlay = B::Overlay>,
//! {
//!     let overlay = loader.load("/assets/logo.png")?;
//!     background.composite(&overlay, BlendMode::Over, 10, 10)?;
//! }
//! ```

pub mod raster;

use crate::blend::BlendMode;
use crate::color::Rgb;
use crate::constants::{DEFAULT_FONT_FAMILY, LABEL_NOMINAL_WIDTH};
use crate::geometry::{BackgroundDimensions, OverlayDimensions};
use thiserror::Error;

/// Opaque engine failure carrying a human-readable message.
///
/// The dispatcher wraps this into the operation-specific
/// [`WatermarkError`](crate::error::WatermarkError) variant.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        EngineError {
            message: message.into(),
        }
    }
}

/// Resampling kernel for overlay resizing.
///
/// `Auto` lets the engine pick a kernel appropriate for the scale
/// direction; the dispatcher always requests `Auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeKernel {
    #[default]
    Auto,
    Nearest,
    Linear,
    Cubic,
    Lanczos3,
}

/// Horizontal alignment of label text within its nominal box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelAlignment {
    Left,
    #[default]
    Center,
    Right,
}

/// Fully resolved text label description handed to the engine.
///
/// `color` and `opacity` are `None` when the command left them to the
/// engine's defaults. `shadow`, `rotate_degrees`, and `fill_mode` are
/// carried verbatim from the command; engines are free to ignore the
/// ones they do not support.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelStyle {
    pub text: String,
    pub font_family: String,
    /// Nominal box width used for placement
    pub width: u32,
    /// Nominal box height derived from the font size
    pub height: u32,
    pub alignment: LabelAlignment,
    pub color: Option<Rgb>,
    pub opacity: Option<f32>,
    /// Resolved top-left placement of the box
    pub offset_x: i32,
    pub offset_y: i32,
    pub shadow: i32,
    pub rotate_degrees: i32,
    pub fill_mode: i32,
}

impl Default for LabelStyle {
    fn default() -> Self {
        LabelStyle {
            text: String::new(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            width: LABEL_NOMINAL_WIDTH,
            height: 0,
            alignment: LabelAlignment::Center,
            color: None,
            opacity: None,
            offset_x: 0,
            offset_y: 0,
            shadow: 0,
            rotate_degrees: 0,
            fill_mode: 0,
        }
    }
}

/// Handle to a loaded overlay image.
pub trait Overlay {
    /// Current dimensions of the overlay
    fn metadata(&self) -> OverlayDimensions;

    /// Resize the overlay in place by a uniform scale factor
    fn resize(&mut self, scale: f64, kernel: ResizeKernel) -> Result<(), EngineError>;
}

/// Produces overlay handles from fully resolved paths.
pub trait OverlayLoader {
    type Overlay: Overlay;

    /// Load the overlay at `path` (already prefixed by the caller)
    fn load(&self, path: &str) -> Result<Self::Overlay, EngineError>;
}

/// Handle to the background image being watermarked.
pub trait Background {
    type Overlay: Overlay;

    /// Current dimensions of the background
    fn metadata(&self) -> BackgroundDimensions;

    /// Composite an overlay at the given top-left position.
    ///
    /// Coordinates may be negative or out of bounds; the engine clips
    /// the overlay to the visible region.
    fn composite(
        &mut self,
        overlay: &Self::Overlay,
        mode: BlendMode,
        x: i32,
        y: i32,
    ) -> Result<(), EngineError>;

    /// Render a text label described by `style` onto the background
    fn label(&mut self, style: &LabelStyle) -> Result<(), EngineError>;
}
