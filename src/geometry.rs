//! Placement geometry for watermark commands.
//!
//! Gravity codes select one of nine anchors on the background: the four
//! corners, the four edge midpoints, or the center. Raw command offsets are
//! clamped against the full background dimensions first, then applied away
//! from the anchored edge; axes that are centered discard their offset.
//!
//! # Example
//!
//! ```ignore
//! use imagemark::geometry::{resolve_placement, BackgroundDimensions, Gravity, OverlayDimensions};
//!
//! let background = BackgroundDimensions { width: 800, height: 600 };
//! let overlay = OverlayDimensions { width: 100, height: 50 };
//!
//! let pos = resolve_placement(Gravity::SouthEast, &background, &overlay, 10, 10);
//! assert_eq!((pos.x, pos.y), (690, 540)); // 800 - 100 - 10, 600 - 50 - 10
//! ```

/// Dimensions of the background image being watermarked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundDimensions {
    pub width: u32,
    pub height: u32,
}

/// Dimensions of the overlay (image watermark or label box) to be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayDimensions {
    pub width: u32,
    pub height: u32,
}

/// Final top-left placement of the overlay.
///
/// Coordinates may be negative or exceed the background when the overlay
/// is larger than the background; engines clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementPosition {
    pub x: i32,
    pub y: i32,
}

impl PlacementPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Anchor on the background's 9-grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
}

impl Gravity {
    /// Maps a gravity code string onto the grid.
    ///
    /// Codes are case-sensitive. Unrecognized or empty codes resolve to
    /// the south-east default rather than failing.
    pub fn from_code(code: &str) -> Self {
        match code {
            "nw" => Gravity::NorthWest,
            "n" => Gravity::North,
            "ne" => Gravity::NorthEast,
            "w" => Gravity::West,
            "center" => Gravity::Center,
            "e" => Gravity::East,
            "sw" => Gravity::SouthWest,
            "s" => Gravity::South,
            _ => Gravity::SouthEast,
        }
    }
}

impl Default for Gravity {
    fn default() -> Self {
        Gravity::SouthEast
    }
}

/// Resolves the final top-left position for an overlay.
///
/// The raw offsets are clamped into `[0, background width]` and
/// `[0, background height]` before the anchor math runs; the clamp bound
/// is the full background dimension, not background minus overlay, so a
/// resolved position can still land outside the background. Offsets near
/// the east/south anchors subtract from that edge (inward), offsets near
/// the west/north anchors add from that edge.
///
/// # Arguments
///
/// * `gravity` - The resolved anchor
/// * `background` - Dimensions of the background image
/// * `overlay` - Dimensions of the overlay being placed
/// * `offset_x` - Raw horizontal offset from the command
/// * `offset_y` - Raw vertical offset from the command
///
/// # Returns
///
/// The (x, y) coordinates where the overlay's top-left corner lands.
pub fn resolve_placement(
    gravity: Gravity,
    background: &BackgroundDimensions,
    overlay: &OverlayDimensions,
    offset_x: i32,
    offset_y: i32,
) -> PlacementPosition {
    let bg_w = background.width as i32;
    let bg_h = background.height as i32;
    let ov_w = overlay.width as i32;
    let ov_h = overlay.height as i32;

    let x = offset_x.clamp(0, bg_w);
    let y = offset_y.clamp(0, bg_h);

    match gravity {
        // Top row
        Gravity::NorthWest => PlacementPosition::new(x, y),
        Gravity::North => PlacementPosition::new((bg_w - ov_w) / 2, y),
        Gravity::NorthEast => PlacementPosition::new(bg_w - ov_w - x, y),

        // Center row
        Gravity::West => PlacementPosition::new(x, (bg_h - ov_h) / 2),
        Gravity::Center => PlacementPosition::new((bg_w - ov_w) / 2, (bg_h - ov_h) / 2),
        Gravity::East => PlacementPosition::new(bg_w - ov_w - x, (bg_h - ov_h) / 2),

        // Bottom row
        Gravity::SouthWest => PlacementPosition::new(x, bg_h - ov_h - y),
        Gravity::South => PlacementPosition::new((bg_w - ov_w) / 2, bg_h - ov_h - y),
        Gravity::SouthEast => PlacementPosition::new(bg_w - ov_w - x, bg_h - ov_h - y),
    }
}
