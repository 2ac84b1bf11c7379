//! Per-render collision detection between placed items.

use crate::geometry::{axis_aligned_bounds, boxes_overlap, oriented_corners};
use crate::scene::PlacedItem;
use kurbo::{Point, Rect};
use std::collections::HashSet;

/// Smallest on-canvas footprint for a placed item, in pixels per side.
pub const MIN_ITEM_PX: f64 = 24.0;

/// A placed item projected into canvas pixels for one render pass.
///
/// Carries the live preview position/rotation when the item is mid-drag, so
/// collision feedback tracks the pointer rather than the last commit.
#[derive(Debug, Clone)]
pub struct RenderItem {
    pub id: String,
    pub room: String,
    pub name: String,
    pub position: Point,
    pub rotation: f64,
    pub width_px: f64,
    pub length_px: f64,
    pub bounding_box: Rect,
}

impl RenderItem {
    /// Project an item at the given position/rotation (which may be preview
    /// values rather than the committed ones).
    pub fn project(
        item: &PlacedItem,
        pixels_per_inch: f64,
        position: Point,
        rotation: f64,
    ) -> Self {
        let width_px = (item.width_inches * pixels_per_inch).max(MIN_ITEM_PX);
        let length_px = (item.length_inches * pixels_per_inch).max(MIN_ITEM_PX);
        let corners = oriented_corners(position, width_px, length_px, rotation);

        Self {
            id: item.id.clone(),
            room: item.room.clone(),
            name: item.name.clone(),
            position,
            rotation,
            width_px,
            length_px,
            bounding_box: axis_aligned_bounds(&corners),
        }
    }
}

/// Ids of every item whose bounding box overlaps another item in the same
/// room. Items in different rooms never flag each other, so adjoining rooms
/// can overlap at their boundary without warnings.
pub fn collision_ids(items: &[RenderItem]) -> HashSet<String> {
    let mut ids = HashSet::new();

    for (index, first) in items.iter().enumerate() {
        for second in &items[index + 1..] {
            if first.room != second.room {
                continue;
            }
            if boxes_overlap(&first.bounding_box, &second.bounding_box) {
                ids.insert(first.id.clone());
                ids.insert(second.id.clone());
            }
        }
    }

    ids
}
