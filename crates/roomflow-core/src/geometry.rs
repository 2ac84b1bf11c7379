//! Viewport transform and grid/angle snapping math.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Minimum allowed zoom level.
pub const MIN_ZOOM: f64 = 0.25;
/// Maximum allowed zoom level.
pub const MAX_ZOOM: f64 = 4.0;

/// Grid pitch in real-world inches once a scale calibration exists.
pub const GRID_INCHES: f64 = 6.0;
/// Pixels-per-inch assumed before any calibration is set.
pub const DEFAULT_PIXELS_PER_INCH: f64 = 2.0;
/// Lower bound on the calibrated grid pitch in canvas pixels.
pub const MIN_GRID_PX: f64 = 8.0;
/// Grid pitch in canvas pixels when no calibration exists.
pub const FALLBACK_GRID_PX: f64 = 32.0;

/// Rotation snap increment in degrees.
pub const ANGLE_SNAP_INCREMENT: f64 = 5.0;

/// Viewport manages the view transform for the layout canvas.
///
/// It represents the canvas-to-screen affine transform: translate by
/// `(x, y)`, then scale by `zoom`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Horizontal translation in screen pixels.
    pub x: f64,
    /// Vertical translation in screen pixels.
    pub y: f64,
    /// Zoom level, kept within `[MIN_ZOOM, MAX_ZOOM]`.
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    /// Create a viewport at the origin with 100% zoom.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a screen point to canvas coordinates.
    pub fn screen_to_canvas(&self, screen_point: Point) -> Point {
        Point::new(
            (screen_point.x - self.x) / self.zoom,
            (screen_point.y - self.y) / self.zoom,
        )
    }

    /// Convert a canvas point to screen coordinates.
    pub fn canvas_to_screen(&self, canvas_point: Point) -> Point {
        Point::new(
            canvas_point.x * self.zoom + self.x,
            canvas_point.y * self.zoom + self.y,
        )
    }

    /// Zoom by `factor`, keeping the canvas point under `anchor` (a screen
    /// position) fixed.
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        let canvas_point = self.screen_to_canvas(anchor);
        let next_zoom = clamp_zoom(self.zoom * factor);

        self.zoom = next_zoom;
        self.x = anchor.x - canvas_point.x * next_zoom;
        self.y = anchor.y - canvas_point.y * next_zoom;
    }

    /// Round the translation to whole pixels and clamp the zoom.
    ///
    /// Commits into history go through this so that sub-pixel jitter from
    /// consecutive pan/zoom gestures compares equal.
    pub fn rounded(&self) -> Self {
        Self {
            x: self.x.round(),
            y: self.y.round(),
            zoom: clamp_zoom(self.zoom),
        }
    }
}

/// Clamp a zoom level into `[MIN_ZOOM, MAX_ZOOM]`.
///
/// Non-finite input maps to 1.0 rather than propagating.
pub fn clamp_zoom(zoom: f64) -> f64 {
    if !zoom.is_finite() {
        return 1.0;
    }
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}

/// Snap a scalar to the nearest multiple of `grid_size`.
///
/// A non-positive (or non-finite) grid disables snapping and returns the
/// value unchanged.
pub fn snap_to_grid(value: f64, grid_size: f64) -> f64 {
    if !(grid_size > 0.0) {
        return value;
    }
    (value / grid_size).round() * grid_size
}

/// Snap an angle to the nearest increment, normalized to `[0, 360)`.
pub fn snap_angle(angle_degrees: f64, increment: f64) -> f64 {
    let snapped = (angle_degrees / increment).round() * increment;
    if snapped < 0.0 {
        snapped + 360.0
    } else if snapped >= 360.0 {
        snapped - 360.0
    } else {
        snapped
    }
}

/// Effective grid pitch in canvas pixels.
///
/// With a calibration the grid tracks [`GRID_INCHES`] real-world inches,
/// floored at [`MIN_GRID_PX`]; without one a fixed fallback pitch is used.
pub fn grid_size_px(pixels_per_inch: Option<f64>) -> f64 {
    match pixels_per_inch {
        Some(ppi) => (GRID_INCHES * ppi).max(MIN_GRID_PX),
        None => FALLBACK_GRID_PX,
    }
}

/// The four corners of a `width_px` x `length_px` rectangle centered at
/// `center`, rotated by `rotation_deg` degrees.
pub fn oriented_corners(
    center: Point,
    width_px: f64,
    length_px: f64,
    rotation_deg: f64,
) -> [Point; 4] {
    let half_width = width_px / 2.0;
    let half_length = length_px / 2.0;
    let radians = rotation_deg.to_radians();
    let cos = radians.cos();
    let sin = radians.sin();

    let local = [
        (-half_width, -half_length),
        (half_width, -half_length),
        (half_width, half_length),
        (-half_width, half_length),
    ];

    local.map(|(dx, dy)| {
        Point::new(
            center.x + dx * cos - dy * sin,
            center.y + dx * sin + dy * cos,
        )
    })
}

/// Axis-aligned bounding box of a corner set.
///
/// For rotated rectangles this is an approximate envelope, not an exact
/// oriented-rectangle test: it over-covers near diagonal rotations.
pub fn axis_aligned_bounds(corners: &[Point; 4]) -> Rect {
    let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = corners
        .iter()
        .map(|p| p.x)
        .fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = corners
        .iter()
        .map(|p| p.y)
        .fold(f64::NEG_INFINITY, f64::max);

    Rect::new(min_x, min_y, max_x, max_y)
}

/// Closed-interval overlap test between two axis-aligned boxes.
pub fn boxes_overlap(a: &Rect, b: &Rect) -> bool {
    let separated = a.x1 < b.x0 || a.x0 > b.x1 || a.y1 < b.y0 || a.y0 > b.y1;
    !separated
}
