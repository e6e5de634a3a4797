//! Watermark dispatcher.
//!
//! This module provides the high-level API for applying a watermark
//! command to a background image.
//!
//! # Flow
//!
//! Tokens fold into parameters first; any decode failure aborts before
//! the engine is touched. A command naming neither an overlay nor text
//! succeeds as a no-op. When both are named, the image overlay wins and
//! the text parameters are ignored.
//!
//! # Example
//!
//! ```ignore
//! use imagemark::processor::WatermarkProcessor;
//!
//! let processor = WatermarkProcessor::new(config, loader);
//!
//! // Composite /assets/logo.png into the north-west corner
//! processor.process(
//!     &mut background,
//!     "/assets",
//!     ["image_bG9nby5wbmc", "g_nw", "x_10", "y_10"],
//! )?;
//! ```

use crate::blend::select_blend_mode;
use crate::color::parse_hex_color;
use crate::config::WatermarkConfig;
use crate::constants::{LABEL_HEIGHT_FACTOR, LABEL_NOMINAL_WIDTH};
use crate::engine::{Background, LabelStyle, Overlay, OverlayLoader, ResizeKernel};
use crate::error::WatermarkError;
use crate::geometry::{resolve_placement, Gravity, OverlayDimensions};
use crate::params::WatermarkParams;

/// Applies watermark commands against an engine.
///
/// The processor owns the overlay loader; the background handle arrives
/// per call so one processor serves many images.
pub struct WatermarkProcessor<L> {
    config: WatermarkConfig,
    loader: L,
}

impl<L: OverlayLoader> WatermarkProcessor<L> {
    /// Create a new processor with the given defaults and overlay loader.
    pub fn new(config: WatermarkConfig, loader: L) -> Self {
        Self { config, loader }
    }

    /// Apply a watermark command to a background image.
    ///
    /// # Arguments
    ///
    /// * `background` - The image being watermarked
    /// * `object_prefix` - Per-request prefix prepended to overlay paths
    /// * `tokens` - Ordered `key_value` command tokens
    ///
    /// # Returns
    ///
    /// `Ok(())` when the watermark was applied, or when the command named
    /// neither an overlay nor text and there was nothing to do.
    pub fn process<'a, B, I>(
        &self,
        background: &mut B,
        object_prefix: &str,
        tokens: I,
    ) -> Result<(), WatermarkError>
    where
        B: Background<Overlay = L::Overlay>,
        I: IntoIterator<Item = &'a str>,
    {
        let params = WatermarkParams::from_tokens(&self.config, tokens)?;

        // Nothing to draw; succeed without touching the engine
        if !params.has_overlay() && !params.has_text() {
            return Ok(());
        }

        if params.has_overlay() {
            self.composite_overlay(background, object_prefix, &params)
        } else {
            self.render_label(background, &params)
        }
    }

    /// Load, optionally resize, place, and composite the image overlay.
    ///
    /// The overlay handle lives only in this scope, so it is released on
    /// every exit path, including resize and composite failures.
    fn composite_overlay<B>(
        &self,
        background: &mut B,
        object_prefix: &str,
        params: &WatermarkParams,
    ) -> Result<(), WatermarkError>
    where
        B: Background<Overlay = L::Overlay>,
    {
        let path = resolve_overlay_path(object_prefix, &params.overlay_path);

        let mut overlay = self
            .loader
            .load(&path)
            .map_err(|e| WatermarkError::overlay_load_failed(&path, e))?;

        if params.overlay_scale_percent > 0 {
            let scale = params.overlay_scale_percent as f64 / 100.0;
            if let Err(e) = overlay.resize(scale, ResizeKernel::Auto) {
                tracing::warn!(scale, error = %e, "overlay resize failed");
                return Err(WatermarkError::overlay_resize_failed(scale, e));
            }
        }

        let gravity = Gravity::from_code(&params.gravity);
        let position = resolve_placement(
            gravity,
            &background.metadata(),
            &overlay.metadata(),
            params.offset_x,
            params.offset_y,
        );
        let mode = select_blend_mode(params.opacity_percent);

        tracing::debug!(x = position.x, y = position.y, mode = ?mode, "compositing overlay");

        background
            .composite(&overlay, mode, position.x, position.y)
            .map_err(|e| WatermarkError::CompositeFailed { source: e })
    }

    /// Build the label style, place its nominal box, and render.
    fn render_label<B>(
        &self,
        background: &mut B,
        params: &WatermarkParams,
    ) -> Result<(), WatermarkError>
    where
        B: Background<Overlay = L::Overlay>,
    {
        let font_family = if params.font_family.is_empty() {
            self.config.default_font_family.clone()
        } else {
            params.font_family.clone()
        };

        let mut style = LabelStyle {
            text: params.text.clone(),
            font_family,
            width: LABEL_NOMINAL_WIDTH,
            height: label_box_height(params.font_size),
            shadow: params.shadow,
            rotate_degrees: params.rotate_degrees,
            fill_mode: params.fill_mode,
            ..LabelStyle::default()
        };

        if !params.font_color.is_empty() {
            match parse_hex_color(&params.font_color) {
                Ok(color) => style.color = Some(color),
                Err(e) => {
                    tracing::warn!(color = %params.font_color, "font color parse failed");
                    return Err(e);
                }
            }
        }

        let gravity = Gravity::from_code(&params.gravity);
        let box_dims = OverlayDimensions {
            width: style.width,
            height: style.height,
        };
        let position = resolve_placement(
            gravity,
            &background.metadata(),
            &box_dims,
            params.offset_x,
            params.offset_y,
        );
        style.offset_x = position.x;
        style.offset_y = position.y;

        if params.opacity_percent > 0 {
            style.opacity = Some(params.opacity_percent as f32 / 100.0);
        }

        tracing::debug!(
            text = %style.text,
            x = style.offset_x,
            y = style.offset_y,
            "rendering label"
        );

        background
            .label(&style)
            .map_err(|e| WatermarkError::LabelRenderFailed { source: e })
    }
}

/// Join the per-request prefix and the overlay path, inserting the
/// leading slash when the command omitted it.
fn resolve_overlay_path(object_prefix: &str, overlay_path: &str) -> String {
    if overlay_path.starts_with('/') {
        format!("{}{}", object_prefix, overlay_path)
    } else {
        format!("{}/{}", object_prefix, overlay_path)
    }
}

/// Nominal label box height derived from the font size, floored at zero.
fn label_box_height(font_size: i32) -> u32 {
    let height = font_size as f64 * LABEL_HEIGHT_FACTOR;
    if height > 0.0 {
        height as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend::BlendMode;
    use crate::color::Rgb;
    use crate::engine::{EngineError, LabelAlignment};
    use crate::geometry::BackgroundDimensions;
    use std::cell::RefCell;
    use std::rc::Rc;

    // Pre-encoded command tokens used across the suite
    const IMAGE_LOGO: &str = "image_bG9nby5wbmc"; // "logo.png"
    const IMAGE_SLASH_LOGO: &str = "image_L2xvZ28ucG5n"; // "/logo.png"
    const TEXT_HELLO: &str = "text_aGVsbG8"; // "hello"
    const TYPE_ARIAL: &str = "type_QXJpYWw"; // "Arial"

    #[derive(Debug, Clone, PartialEq)]
    enum EngineCall {
        Load {
            path: String,
        },
        Resize {
            scale: f64,
            kernel: ResizeKernel,
        },
        Composite {
            mode: BlendMode,
            x: i32,
            y: i32,
            overlay: OverlayDimensions,
        },
        Label(LabelStyle),
    }

    /// Shared call recorder, including how many overlay handles were
    /// released.
    #[derive(Default)]
    struct EngineLog {
        calls: Vec<EngineCall>,
        overlay_drops: usize,
    }

    type SharedLog = Rc<RefCell<EngineLog>>;

    struct MockOverlay {
        log: SharedLog,
        size: OverlayDimensions,
        fail_resize: bool,
    }

    impl Overlay for MockOverlay {
        fn metadata(&self) -> OverlayDimensions {
            self.size
        }

        fn resize(&mut self, scale: f64, kernel: ResizeKernel) -> Result<(), EngineError> {
            self.log
                .borrow_mut()
                .calls
                .push(EngineCall::Resize { scale, kernel });
            if self.fail_resize {
                return Err(EngineError::new("simulated resize failure"));
            }
            self.size = OverlayDimensions {
                width: (self.size.width as f64 * scale) as u32,
                height: (self.size.height as f64 * scale) as u32,
            };
            Ok(())
        }
    }

    impl Drop for MockOverlay {
        fn drop(&mut self) {
            self.log.borrow_mut().overlay_drops += 1;
        }
    }

    struct MockLoader {
        log: SharedLog,
        size: OverlayDimensions,
        fail_load: bool,
        fail_resize: bool,
    }

    impl OverlayLoader for MockLoader {
        type Overlay = MockOverlay;

        fn load(&self, path: &str) -> Result<MockOverlay, EngineError> {
            self.log.borrow_mut().calls.push(EngineCall::Load {
                path: path.to_string(),
            });
            if self.fail_load {
                return Err(EngineError::new("simulated load failure"));
            }
            Ok(MockOverlay {
                log: Rc::clone(&self.log),
                size: self.size,
                fail_resize: self.fail_resize,
            })
        }
    }

    struct MockBackground {
        log: SharedLog,
        size: BackgroundDimensions,
        fail_composite: bool,
        fail_label: bool,
    }

    impl Background for MockBackground {
        type Overlay = MockOverlay;

        fn metadata(&self) -> BackgroundDimensions {
            self.size
        }

        fn composite(
            &mut self,
            overlay: &MockOverlay,
            mode: BlendMode,
            x: i32,
            y: i32,
        ) -> Result<(), EngineError> {
            self.log.borrow_mut().calls.push(EngineCall::Composite {
                mode,
                x,
                y,
                overlay: overlay.size,
            });
            if self.fail_composite {
                return Err(EngineError::new("simulated composite failure"));
            }
            Ok(())
        }

        fn label(&mut self, style: &LabelStyle) -> Result<(), EngineError> {
            self.log
                .borrow_mut()
                .calls
                .push(EngineCall::Label(style.clone()));
            if self.fail_label {
                return Err(EngineError::new("simulated label failure"));
            }
            Ok(())
        }
    }

    fn new_log() -> SharedLog {
        Rc::new(RefCell::new(EngineLog::default()))
    }

    fn mock_loader(log: &SharedLog, width: u32, height: u32) -> MockLoader {
        MockLoader {
            log: Rc::clone(log),
            size: OverlayDimensions { width, height },
            fail_load: false,
            fail_resize: false,
        }
    }

    fn mock_background(log: &SharedLog, width: u32, height: u32) -> MockBackground {
        MockBackground {
            log: Rc::clone(log),
            size: BackgroundDimensions { width, height },
            fail_composite: false,
            fail_label: false,
        }
    }

    fn processor(loader: MockLoader) -> WatermarkProcessor<MockLoader> {
        WatermarkProcessor::new(WatermarkConfig::default(), loader)
    }

    // Test: empty commands never touch the engine
    #[test]
    fn test_noop_without_overlay_or_text() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        p.process(&mut bg, "/assets", ["x_10", "t_50", "g_nw"]).unwrap();

        assert!(log.borrow().calls.is_empty());
        assert_eq!(log.borrow().overlay_drops, 0);
    }

    #[test]
    fn test_noop_with_empty_token_list() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        p.process(&mut bg, "/assets", []).unwrap();

        assert!(log.borrow().calls.is_empty());
    }

    // Test: image branch orchestration
    #[test]
    fn test_image_branch_loads_places_and_composites() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        p.process(&mut bg, "/assets", [IMAGE_LOGO, "g_nw", "x_10", "y_20"])
            .unwrap();

        let log = log.borrow();
        assert_eq!(
            log.calls,
            vec![
                EngineCall::Load {
                    path: "/assets/logo.png".to_string()
                },
                EngineCall::Composite {
                    mode: BlendMode::Over,
                    x: 10,
                    y: 20,
                    overlay: OverlayDimensions {
                        width: 100,
                        height: 100
                    },
                },
            ]
        );
        assert_eq!(log.overlay_drops, 1);
    }

    #[test]
    fn test_default_gravity_places_bottom_right() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        p.process(&mut bg, "", [IMAGE_LOGO]).unwrap();

        match &log.borrow().calls[1] {
            EngineCall::Composite { x, y, .. } => assert_eq!((*x, *y), (400, 400)),
            other => panic!("unexpected call: {other:?}"),
        };
    }

    #[test]
    fn test_unrecognized_gravity_falls_back_south_east() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        p.process(&mut bg, "", [IMAGE_LOGO, "g_diagonal"]).unwrap();

        match &log.borrow().calls[1] {
            EngineCall::Composite { x, y, .. } => assert_eq!((*x, *y), (400, 400)),
            other => panic!("unexpected call: {other:?}"),
        };
    }

    #[test]
    fn test_leading_slash_added_to_overlay_path() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        // Encoded "/logo.png" keeps its slash; "logo.png" gains one
        p.process(&mut bg, "/assets", [IMAGE_SLASH_LOGO]).unwrap();

        assert_eq!(
            log.borrow().calls[0],
            EngineCall::Load {
                path: "/assets/logo.png".to_string()
            }
        );
    }

    #[test]
    fn test_resize_runs_before_placement() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        p.process(&mut bg, "", [IMAGE_LOGO, "P_50"]).unwrap();

        let log = log.borrow();
        assert_eq!(
            log.calls[1],
            EngineCall::Resize {
                scale: 0.5,
                kernel: ResizeKernel::Auto
            }
        );
        // Placement uses the resized 50x50 dimensions: 500 - 50 = 450
        assert_eq!(
            log.calls[2],
            EngineCall::Composite {
                mode: BlendMode::Over,
                x: 450,
                y: 450,
                overlay: OverlayDimensions {
                    width: 50,
                    height: 50
                },
            }
        );
    }

    #[test]
    fn test_no_resize_for_zero_or_negative_scale() {
        for scale_token in ["P_0", "P_-20"] {
            let log = new_log();
            let mut bg = mock_background(&log, 500, 500);
            let p = processor(mock_loader(&log, 100, 100));

            p.process(&mut bg, "", [IMAGE_LOGO, scale_token]).unwrap();

            assert!(log
                .borrow()
                .calls
                .iter()
                .all(|c| !matches!(c, EngineCall::Resize { .. })));
        }
    }

    #[test]
    fn test_blend_mode_follows_opacity_band() {
        for (token, expected) in [
            ("t_60", BlendMode::Screen),
            ("t_80", BlendMode::Over),
            ("t_100", BlendMode::Over),
        ] {
            let log = new_log();
            let mut bg = mock_background(&log, 500, 500);
            let p = processor(mock_loader(&log, 100, 100));

            p.process(&mut bg, "", [IMAGE_LOGO, token]).unwrap();

            match &log.borrow().calls[1] {
                EngineCall::Composite { mode, .. } => assert_eq!(*mode, expected),
                other => panic!("unexpected call: {other:?}"),
            };
        }
    }

    #[test]
    fn test_image_wins_over_text() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        p.process(&mut bg, "", [IMAGE_LOGO, TEXT_HELLO]).unwrap();

        let log = log.borrow();
        assert!(log
            .calls
            .iter()
            .any(|c| matches!(c, EngineCall::Composite { .. })));
        assert!(log.calls.iter().all(|c| !matches!(c, EngineCall::Label(_))));
    }

    // Test: overlay handles are released exactly once on every path
    #[test]
    fn test_load_failure_maps_error() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let mut loader = mock_loader(&log, 100, 100);
        loader.fail_load = true;
        let p = processor(loader);

        let err = p.process(&mut bg, "/assets", [IMAGE_LOGO]).unwrap_err();

        match err {
            WatermarkError::OverlayLoadFailed { path, .. } => {
                assert_eq!(path, "/assets/logo.png");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let log = log.borrow();
        assert_eq!(log.calls.len(), 1);
        assert_eq!(log.overlay_drops, 0);
    }

    #[test]
    fn test_resize_failure_releases_overlay_and_skips_composite() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let mut loader = mock_loader(&log, 100, 100);
        loader.fail_resize = true;
        let p = processor(loader);

        let err = p.process(&mut bg, "", [IMAGE_LOGO, "P_50"]).unwrap_err();

        assert!(matches!(err, WatermarkError::OverlayResizeFailed { .. }));
        let log = log.borrow();
        assert!(log
            .calls
            .iter()
            .all(|c| !matches!(c, EngineCall::Composite { .. })));
        assert_eq!(log.overlay_drops, 1);
    }

    #[test]
    fn test_composite_failure_releases_overlay() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        bg.fail_composite = true;
        let p = processor(mock_loader(&log, 100, 100));

        let err = p.process(&mut bg, "", [IMAGE_LOGO]).unwrap_err();

        assert!(matches!(err, WatermarkError::CompositeFailed { .. }));
        assert_eq!(log.borrow().overlay_drops, 1);
    }

    #[test]
    fn test_malformed_token_aborts_before_engine_calls() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        let err = p.process(&mut bg, "", [IMAGE_LOGO, "x_10_20"]).unwrap_err();

        assert!(matches!(err, WatermarkError::MalformedToken { .. }));
        assert!(log.borrow().calls.is_empty());
    }

    // Test: text branch style construction
    #[test]
    fn test_label_style_carries_command_parameters() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        p.process(
            &mut bg,
            "",
            [
                TEXT_HELLO, "size_40", "color_ff0000", "t_60", "g_nw", "x_10", "y_20",
                "shadow_50", "rotate_30", "fill_1",
            ],
        )
        .unwrap();

        let log = log.borrow();
        match &log.calls[0] {
            EngineCall::Label(style) => {
                assert_eq!(style.text, "hello");
                assert_eq!(style.font_family, "OPPOSans R");
                assert_eq!(style.width, LABEL_NOMINAL_WIDTH);
                assert_eq!(style.height, 30); // 40 * 0.75
                assert_eq!(style.alignment, LabelAlignment::Center);
                assert_eq!(style.color, Some(Rgb { r: 255, g: 0, b: 0 }));
                assert_eq!(style.opacity, Some(0.6));
                assert_eq!((style.offset_x, style.offset_y), (10, 20));
                assert_eq!(style.shadow, 50);
                assert_eq!(style.rotate_degrees, 30);
                assert_eq!(style.fill_mode, 1);
            }
            other => panic!("unexpected call: {other:?}"),
        }
        assert_eq!(log.overlay_drops, 0);
    }

    #[test]
    fn test_label_box_placed_by_gravity() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        p.process(&mut bg, "", [TEXT_HELLO, "size_40"]).unwrap();

        match &log.borrow().calls[0] {
            EngineCall::Label(style) => {
                // South-east default: 500 - 200 = 300, 500 - 30 = 470
                assert_eq!((style.offset_x, style.offset_y), (300, 470));
            }
            other => panic!("unexpected call: {other:?}"),
        };
    }

    #[test]
    fn test_label_font_family_override() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        p.process(&mut bg, "", [TEXT_HELLO, TYPE_ARIAL]).unwrap();

        match &log.borrow().calls[0] {
            EngineCall::Label(style) => assert_eq!(style.font_family, "Arial"),
            other => panic!("unexpected call: {other:?}"),
        };
    }

    #[test]
    fn test_label_uses_configured_default_font_family() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let config = WatermarkConfig {
            default_font_family: "Noto Sans".to_string(),
            ..Default::default()
        };
        let p = WatermarkProcessor::new(config, mock_loader(&log, 100, 100));

        p.process(&mut bg, "", [TEXT_HELLO]).unwrap();

        match &log.borrow().calls[0] {
            EngineCall::Label(style) => assert_eq!(style.font_family, "Noto Sans"),
            other => panic!("unexpected call: {other:?}"),
        };
    }

    #[test]
    fn test_label_defaults_leave_color_unset() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        p.process(&mut bg, "", [TEXT_HELLO]).unwrap();

        match &log.borrow().calls[0] {
            EngineCall::Label(style) => {
                assert_eq!(style.color, None);
                // Default opacity 100 is positive, so it is forwarded
                assert_eq!(style.opacity, Some(1.0));
            }
            other => panic!("unexpected call: {other:?}"),
        };
    }

    #[test]
    fn test_label_opacity_unset_for_non_positive_percent() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        p.process(&mut bg, "", [TEXT_HELLO, "t_0"]).unwrap();

        match &log.borrow().calls[0] {
            EngineCall::Label(style) => assert_eq!(style.opacity, None),
            other => panic!("unexpected call: {other:?}"),
        };
    }

    #[test]
    fn test_label_negative_font_size_floors_height() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        p.process(&mut bg, "", [TEXT_HELLO, "size_-10"]).unwrap();

        match &log.borrow().calls[0] {
            EngineCall::Label(style) => assert_eq!(style.height, 0),
            other => panic!("unexpected call: {other:?}"),
        };
    }

    #[test]
    fn test_label_invalid_color_aborts_before_engine() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        let p = processor(mock_loader(&log, 100, 100));

        let err = p
            .process(&mut bg, "", [TEXT_HELLO, "color_zz0000"])
            .unwrap_err();

        assert!(matches!(err, WatermarkError::InvalidColor { .. }));
        assert!(log.borrow().calls.is_empty());
    }

    #[test]
    fn test_label_failure_maps_error() {
        let log = new_log();
        let mut bg = mock_background(&log, 500, 500);
        bg.fail_label = true;
        let p = processor(mock_loader(&log, 100, 100));

        let err = p.process(&mut bg, "", [TEXT_HELLO]).unwrap_err();

        assert!(matches!(err, WatermarkError::LabelRenderFailed { .. }));
    }

    // Test: helpers
    #[test]
    fn test_resolve_overlay_path() {
        assert_eq!(resolve_overlay_path("/assets", "logo.png"), "/assets/logo.png");
        assert_eq!(resolve_overlay_path("/assets", "/logo.png"), "/assets/logo.png");
        assert_eq!(resolve_overlay_path("", "logo.png"), "/logo.png");
    }

    #[test]
    fn test_label_box_height() {
        assert_eq!(label_box_height(40), 30);
        assert_eq!(label_box_height(41), 30); // 30.75 truncates
        assert_eq!(label_box_height(0), 0);
        assert_eq!(label_box_height(-10), 0);
    }
}
