//! Raster engine backed by in-memory RGBA buffers.
//!
//! This module provides the crate's shipped engine implementation:
//! overlays load from the filesystem, compositing runs per pixel over
//! the visible region, and labels render through runtime-registered
//! fonts.
//!
//! # Features
//!
//! - Alpha compositing with `Over` and `Screen` blend modes
//! - Convolution-based resizing with automatic kernel selection
//! - Kerned single-line label layout with alignment, shadow, and rotation
//!
//! # Example
//!
//! ```ignore
//! use imagemark::engine::raster::{FontCatalog, FsOverlayLoader, RasterBackground};
//! use std::sync::Arc;
//!
//! let mut fonts = FontCatalog::new();
//! fonts.load("OPPOSans R", "/etc/imagemark/fonts/opposans.ttf")?;
//!
//! let background = image::open("photo.jpg")?.to_rgba8();
//! let mut background = RasterBackground::new(background, Arc::new(fonts));
//! ```

use super::{
    Background, EngineError, LabelAlignment, LabelStyle, Overlay, OverlayLoader, ResizeKernel,
};
use crate::blend::BlendMode;
use crate::color::Rgb;
use crate::geometry::{BackgroundDimensions, OverlayDimensions};
use ab_glyph::{point, Font, FontVec, GlyphId, PxScale, ScaleFont};
use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::fs;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;

/// Glyph height used when the label box height is zero.
const DEFAULT_GLYPH_HEIGHT_PX: f32 = 24.0;

/// Offset of the shadow pass relative to the main glyph pass.
const SHADOW_OFFSET_PX: f32 = 2.0;

// === Font Catalog ===

/// Runtime-registered fonts, keyed by family name.
///
/// Label styles name a font family; the catalog resolves it to parsed
/// font data. Families are registered from files or raw bytes, so the
/// crate ships no font assets of its own.
#[derive(Default)]
pub struct FontCatalog {
    fonts: HashMap<String, FontVec>,
}

impl FontCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a font family from a file on disk.
    pub fn load(
        &mut self,
        family: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<(), EngineError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| {
            EngineError::new(format!("failed to read font file '{}': {}", path.display(), e))
        })?;
        self.insert(family, data)
    }

    /// Register a font family from raw font bytes.
    pub fn insert(&mut self, family: impl Into<String>, data: Vec<u8>) -> Result<(), EngineError> {
        let font = FontVec::try_from_vec(data)
            .map_err(|e| EngineError::new(format!("invalid font data: {}", e)))?;
        self.fonts.insert(family.into(), font);
        Ok(())
    }

    /// Look up a registered family.
    pub fn get(&self, family: &str) -> Option<&FontVec> {
        self.fonts.get(family)
    }

    /// Iterate over the registered family names.
    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.fonts.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

impl std::fmt::Debug for FontCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontCatalog")
            .field("families", &self.fonts.keys().collect::<Vec<_>>())
            .finish()
    }
}

// === Overlay ===

/// Overlay handle over an RGBA buffer.
pub struct RasterOverlay {
    image: RgbaImage,
}

impl RasterOverlay {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl std::fmt::Debug for RasterOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterOverlay")
            .field("dimensions", &(self.image.width(), self.image.height()))
            .finish()
    }
}

impl Overlay for RasterOverlay {
    fn metadata(&self) -> OverlayDimensions {
        OverlayDimensions {
            width: self.image.width(),
            height: self.image.height(),
        }
    }

    fn resize(&mut self, scale: f64, kernel: ResizeKernel) -> Result<(), EngineError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(EngineError::new(format!("invalid resize factor {}", scale)));
        }

        let src_w = self.image.width();
        let src_h = self.image.height();
        let dst_w = ((src_w as f64 * scale).round() as u32).max(1);
        let dst_h = ((src_h as f64 * scale).round() as u32).max(1);

        if dst_w == src_w && dst_h == src_h {
            return Ok(());
        }

        let src_width = NonZeroU32::new(src_w)
            .ok_or_else(|| EngineError::new("source width is 0"))?;
        let src_height = NonZeroU32::new(src_h)
            .ok_or_else(|| EngineError::new("source height is 0"))?;
        let dst_width = NonZeroU32::new(dst_w)
            .ok_or_else(|| EngineError::new("target width is 0"))?;
        let dst_height = NonZeroU32::new(dst_h)
            .ok_or_else(|| EngineError::new("target height is 0"))?;

        let src_image = Image::from_vec_u8(
            src_width,
            src_height,
            self.image.as_raw().clone(),
            PixelType::U8x4,
        )
        .map_err(|e| EngineError::new(format!("failed to create resize source: {:?}", e)))?;

        let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);

        let mut resizer = Resizer::new(resolve_algorithm(kernel, scale));
        resizer
            .resize(&src_image.view(), &mut dst_image.view_mut())
            .map_err(|e| EngineError::new(format!("resize operation failed: {:?}", e)))?;

        self.image = RgbaImage::from_raw(dst_w, dst_h, dst_image.into_vec())
            .ok_or_else(|| EngineError::new("resized buffer has unexpected length"))?;

        Ok(())
    }
}

/// Map the requested kernel to a resize algorithm.
///
/// `Auto` follows the scale direction: Lanczos3 preserves detail when
/// shrinking, Catmull-Rom avoids ringing when growing.
fn resolve_algorithm(kernel: ResizeKernel, scale: f64) -> ResizeAlg {
    match kernel {
        ResizeKernel::Auto => {
            if scale < 1.0 {
                ResizeAlg::Convolution(FilterType::Lanczos3)
            } else {
                ResizeAlg::Convolution(FilterType::CatmullRom)
            }
        }
        ResizeKernel::Nearest => ResizeAlg::Nearest,
        ResizeKernel::Linear => ResizeAlg::Convolution(FilterType::Bilinear),
        ResizeKernel::Cubic => ResizeAlg::Convolution(FilterType::CatmullRom),
        ResizeKernel::Lanczos3 => ResizeAlg::Convolution(FilterType::Lanczos3),
    }
}

// === Overlay Loader ===

/// Loads overlays from the filesystem.
///
/// The dispatcher resolves the object prefix into the path, so a prefix
/// names the asset root directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsOverlayLoader;

impl OverlayLoader for FsOverlayLoader {
    type Overlay = RasterOverlay;

    fn load(&self, path: &str) -> Result<RasterOverlay, EngineError> {
        let image = image::open(path)
            .map_err(|e| EngineError::new(format!("failed to open '{}': {}", path, e)))?
            .to_rgba8();
        Ok(RasterOverlay { image })
    }
}

// === Background ===

/// Background handle over an RGBA buffer plus a shared font catalog.
pub struct RasterBackground {
    image: RgbaImage,
    fonts: Arc<FontCatalog>,
}

impl RasterBackground {
    pub fn new(image: RgbaImage, fonts: Arc<FontCatalog>) -> Self {
        Self { image, fonts }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl std::fmt::Debug for RasterBackground {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterBackground")
            .field("dimensions", &(self.image.width(), self.image.height()))
            .field("fonts", &self.fonts)
            .finish()
    }
}

impl Background for RasterBackground {
    type Overlay = RasterOverlay;

    fn metadata(&self) -> BackgroundDimensions {
        BackgroundDimensions {
            width: self.image.width(),
            height: self.image.height(),
        }
    }

    fn composite(
        &mut self,
        overlay: &RasterOverlay,
        mode: BlendMode,
        x: i32,
        y: i32,
    ) -> Result<(), EngineError> {
        blend_overlay(&mut self.image, &overlay.image, mode, x, y);
        Ok(())
    }

    fn label(&mut self, style: &LabelStyle) -> Result<(), EngineError> {
        if style.text.is_empty() {
            return Err(EngineError::new("cannot render empty label text"));
        }

        let font = self.fonts.get(&style.font_family).ok_or_else(|| {
            EngineError::new(format!(
                "font family '{}' is not registered",
                style.font_family
            ))
        })?;

        let canvas = render_label_canvas(style, font);
        let (canvas, x, y) = if style.rotate_degrees != 0 {
            let rotated = rotate_canvas(&canvas, style.rotate_degrees as f32);
            // Keep the box center fixed while the canvas changes extent
            let x = style.offset_x + (canvas.width() as i32 - rotated.width() as i32) / 2;
            let y = style.offset_y + (canvas.height() as i32 - rotated.height() as i32) / 2;
            (rotated, x, y)
        } else {
            (canvas, style.offset_x, style.offset_y)
        };

        blend_overlay(&mut self.image, &canvas, BlendMode::Over, x, y);
        Ok(())
    }
}

// === Compositing ===

/// Blend an overlay onto the target, clipped to the visible region.
fn blend_overlay(target: &mut RgbaImage, overlay: &RgbaImage, mode: BlendMode, x: i32, y: i32) {
    let target_width = target.width() as i32;
    let target_height = target.height() as i32;

    let overlay_width = overlay.width() as i32;
    let overlay_height = overlay.height() as i32;

    let x_start = x.max(0);
    let y_start = y.max(0);
    let x_end = (x + overlay_width).min(target_width);
    let y_end = (y + overlay_height).min(target_height);

    for ty in y_start..y_end {
        for tx in x_start..x_end {
            let ox = (tx - x) as u32;
            let oy = (ty - y) as u32;

            let overlay_pixel = overlay.get_pixel(ox, oy);
            let target_pixel = target.get_pixel(tx as u32, ty as u32);

            let blended = match mode {
                BlendMode::Over => blend_over(*target_pixel, *overlay_pixel),
                BlendMode::Screen => blend_screen(*target_pixel, *overlay_pixel),
            };
            target.put_pixel(tx as u32, ty as u32, blended);
        }
    }
}

/// Porter-Duff "over": result = foreground + background * (1 - foreground.alpha)
fn blend_over(background: Rgba<u8>, foreground: Rgba<u8>) -> Rgba<u8> {
    let fg_alpha = foreground[3] as f32 / 255.0;
    let bg_alpha = background[3] as f32 / 255.0;

    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend_channel = |fg: u8, bg: u8| -> u8 {
        let fg_f = fg as f32 / 255.0;
        let bg_f = bg as f32 / 255.0;
        let result = (fg_f * fg_alpha + bg_f * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        (result * 255.0).clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend_channel(foreground[0], background[0]),
        blend_channel(foreground[1], background[1]),
        blend_channel(foreground[2], background[2]),
        (out_alpha * 255.0) as u8,
    ])
}

/// Screen blend: s + d - s*d per channel, then alpha compositing.
fn blend_screen(background: Rgba<u8>, foreground: Rgba<u8>) -> Rgba<u8> {
    let fg_alpha = foreground[3] as f32 / 255.0;
    let bg_alpha = background[3] as f32 / 255.0;

    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend_channel = |fg: u8, bg: u8| -> u8 {
        let s = fg as f32 / 255.0;
        let d = bg as f32 / 255.0;
        let screened = s + d - s * d;
        let result = (fg_alpha * (1.0 - bg_alpha) * s
            + bg_alpha * (1.0 - fg_alpha) * d
            + fg_alpha * bg_alpha * screened)
            / out_alpha;
        (result * 255.0).clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend_channel(foreground[0], background[0]),
        blend_channel(foreground[1], background[1]),
        blend_channel(foreground[2], background[2]),
        (out_alpha * 255.0) as u8,
    ])
}

// === Label Rendering ===

/// Render the label into a transparent box-sized canvas.
///
/// Text wider than the nominal box clips at the canvas edge.
fn render_label_canvas(style: &LabelStyle, font: &FontVec) -> RgbaImage {
    let px_height = if style.height > 0 {
        style.height as f32
    } else {
        DEFAULT_GLYPH_HEIGHT_PX
    };
    let scale = PxScale::from(px_height);

    let text_width = measure_line_width(font, scale, &style.text);
    let box_width = style.width.max(1) as f32;
    let origin_x = match style.alignment {
        LabelAlignment::Left => 0.0,
        LabelAlignment::Center => (box_width - text_width) / 2.0,
        LabelAlignment::Right => box_width - text_width,
    };

    let mut canvas = RgbaImage::new(style.width.max(1), px_height.ceil().max(1.0) as u32);

    let color = style.color.unwrap_or_else(Rgb::black);
    let opacity = style.opacity.unwrap_or(1.0).clamp(0.0, 1.0);
    let alpha = (opacity * 255.0) as u8;

    if style.shadow > 0 {
        let strength = style.shadow.min(100) as f32 / 100.0;
        let shadow_alpha = (opacity * strength * 255.0) as u8;
        draw_line(
            &mut canvas,
            font,
            scale,
            &style.text,
            origin_x + SHADOW_OFFSET_PX,
            SHADOW_OFFSET_PX,
            Rgb::black(),
            shadow_alpha,
        );
    }

    draw_line(
        &mut canvas,
        font,
        scale,
        &style.text,
        origin_x,
        0.0,
        color,
        alpha,
    );

    canvas
}

/// Advance width of a single line, kerning included.
fn measure_line_width(font: &FontVec, scale: PxScale, text: &str) -> f32 {
    let scaled_font = font.as_scaled(scale);

    let mut width = 0.0f32;
    let mut prev_glyph: Option<GlyphId> = None;

    for c in text.chars() {
        let glyph_id = scaled_font.glyph_id(c);
        if let Some(prev) = prev_glyph {
            width += scaled_font.kern(prev, glyph_id);
        }
        width += scaled_font.h_advance(glyph_id);
        prev_glyph = Some(glyph_id);
    }

    width
}

/// Draw one glyph run onto the canvas at the given origin.
#[allow(clippy::too_many_arguments)]
fn draw_line(
    canvas: &mut RgbaImage,
    font: &FontVec,
    scale: PxScale,
    text: &str,
    origin_x: f32,
    origin_y: f32,
    color: Rgb,
    alpha: u8,
) {
    let scaled_font = font.as_scaled(scale);
    let canvas_width = canvas.width() as i32;
    let canvas_height = canvas.height() as i32;

    let baseline_y = origin_y + scaled_font.ascent();
    let mut cursor_x = origin_x;
    let mut prev_glyph: Option<GlyphId> = None;

    for c in text.chars() {
        let glyph_id = scaled_font.glyph_id(c);
        if let Some(prev) = prev_glyph {
            cursor_x += scaled_font.kern(prev, glyph_id);
        }

        let glyph = glyph_id.with_scale_and_position(scale, point(cursor_x, baseline_y));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();

            outlined.draw(|px, py, coverage| {
                let x = px as i32 + bounds.min.x as i32;
                let y = py as i32 + bounds.min.y as i32;

                if x >= 0 && y >= 0 && x < canvas_width && y < canvas_height {
                    let pixel_alpha = (coverage * alpha as f32) as u8;
                    let pixel = Rgba([color.r, color.g, color.b, pixel_alpha]);

                    // Blend with existing coverage to keep anti-aliasing
                    let existing = canvas.get_pixel(x as u32, y as u32);
                    let blended = blend_over(*existing, pixel);
                    canvas.put_pixel(x as u32, y as u32, blended);
                }
            });
        }

        cursor_x += scaled_font.h_advance(glyph_id);
        prev_glyph = Some(glyph_id);
    }
}

/// Rotate the canvas clockwise, expanding to the rotated bounding box.
///
/// Nearest-neighbor sampling; pixels outside the source stay transparent.
fn rotate_canvas(canvas: &RgbaImage, degrees: f32) -> RgbaImage {
    let radians = degrees.to_radians();
    let (sin, cos) = radians.sin_cos();

    let src_w = canvas.width() as f32;
    let src_h = canvas.height() as f32;

    let dst_w = (src_w * cos.abs() + src_h * sin.abs()).ceil().max(1.0) as u32;
    let dst_h = (src_w * sin.abs() + src_h * cos.abs()).ceil().max(1.0) as u32;

    let mut rotated = RgbaImage::new(dst_w, dst_h);

    let src_cx = src_w / 2.0;
    let src_cy = src_h / 2.0;
    let dst_cx = dst_w as f32 / 2.0;
    let dst_cy = dst_h as f32 / 2.0;

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            // Inverse-rotate the destination pixel into source space
            let rx = dx as f32 + 0.5 - dst_cx;
            let ry = dy as f32 + 0.5 - dst_cy;

            let sx = rx * cos + ry * sin + src_cx;
            let sy = ry * cos - rx * sin + src_cy;

            if sx >= 0.0 && sy >= 0.0 && sx < src_w && sy < src_h {
                rotated.put_pixel(dx, dy, *canvas.get_pixel(sx as u32, sy as u32));
            }
        }
    }

    rotated
}
