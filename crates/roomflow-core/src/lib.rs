//! Roomflow Core Library
//!
//! Platform-agnostic scene model and interaction logic for the Roomflow
//! floor-plan layout designer.

pub mod collision;
pub mod designer;
pub mod geometry;
pub mod history;
pub mod sanitize;
pub mod scene;
pub mod storage;

pub use collision::{RenderItem, collision_ids};
pub use designer::{
    InteractionState, LayoutDesigner, Modifiers, MouseButton, PointerTarget, RenderFragment,
};
pub use geometry::{Viewport, clamp_zoom, grid_size_px, snap_angle, snap_to_grid};
pub use history::HistoryMachine;
pub use sanitize::sanitize_scene;
pub use scene::{
    FloorPlanRef, InventoryItem, PathRecord, PlacedItem, ScaleCalibration, SceneState,
    VectorFragment, VectorPlan,
};
pub use storage::{KeyValueStore, MemoryStore, StorageError};
