//! Scene document model for the layout designer.
//!
//! The whole scene is one serde document: replacing the floor plan, moving an
//! item, or ingesting a vector plan all produce a new `SceneState` that the
//! history machine swaps in wholesale. Nothing here mutates in place across
//! commits.

use crate::geometry::Viewport;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reference object with a known real-world length, used to calibrate the
/// canvas scale against a measured pixel distance.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceObject {
    pub id: &'static str,
    pub label: &'static str,
    pub inches: f64,
}

/// Built-in calibration references.
pub const REFERENCE_OBJECTS: &[ReferenceObject] = &[
    ReferenceObject {
        id: "door",
        label: "Standard Door",
        inches: 36.0,
    },
    ReferenceObject {
        id: "queen-bed",
        label: "Queen Bed (width)",
        inches: 60.0,
    },
    ReferenceObject {
        id: "sofa",
        label: "Full Sofa (length)",
        inches: 84.0,
    },
];

/// Look up a built-in reference object by id.
pub fn reference_object(id: &str) -> Option<&'static ReferenceObject> {
    REFERENCE_OBJECTS.iter().find(|entry| entry.id == id)
}

/// An entry in the external furniture inventory.
///
/// The inventory itself is a collaborator; the designer only reads entries
/// when one is dropped onto the canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    /// Width in inches.
    pub width: f64,
    /// Length in inches.
    pub length: f64,
    pub room: String,
}

/// The uploaded floor-plan raster image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorPlanRef {
    pub name: String,
    pub data_url: String,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub aspect_ratio: Option<f64>,
}

impl FloorPlanRef {
    /// Describe an uploaded image, deriving the aspect ratio when both
    /// dimensions are known and positive.
    pub fn new(name: impl Into<String>, data_url: impl Into<String>, width: f64, height: f64) -> Self {
        let aspect_ratio = (width > 0.0 && height > 0.0).then(|| width / height);
        Self {
            name: name.into(),
            data_url: data_url.into(),
            width: (width > 0.0).then_some(width),
            height: (height > 0.0).then_some(height),
            aspect_ratio,
        }
    }
}

/// The inches-per-pixel ratio derived from a measured reference object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleCalibration {
    pub reference_id: Option<String>,
    pub reference_inches: Option<f64>,
    pub pixel_measure: Option<f64>,
    /// Always strictly positive.
    pub inches_per_pixel: f64,
}

impl ScaleCalibration {
    /// Derive a calibration from a reference object measured at
    /// `pixel_measure` pixels. Non-positive or non-finite measurements
    /// cannot produce a valid ratio.
    pub fn derive(reference: &ReferenceObject, pixel_measure: f64) -> Option<Self> {
        if !(pixel_measure > 0.0) || !pixel_measure.is_finite() {
            return None;
        }
        Some(Self {
            reference_id: Some(reference.id.to_string()),
            reference_inches: Some(reference.inches),
            pixel_measure: Some(pixel_measure),
            inches_per_pixel: reference.inches / pixel_measure,
        })
    }

    /// Canvas pixels per real-world inch.
    pub fn pixels_per_inch(&self) -> f64 {
        1.0 / self.inches_per_pixel
    }
}

/// A furniture rectangle placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedItem {
    pub id: String,
    pub inventory_id: Option<String>,
    pub name: String,
    pub room: String,
    pub width_inches: f64,
    pub length_inches: f64,
    /// Degrees, kept within `[0, 360)`.
    pub rotation: f64,
    /// Center position in canvas coordinates.
    pub position: Point,
}

impl PlacedItem {
    /// Create a placement from an inventory entry dropped at `position`.
    pub fn from_inventory(source: &InventoryItem, position: Point) -> Self {
        Self {
            id: new_placement_id(),
            inventory_id: Some(source.id.clone()),
            name: source.name.clone(),
            room: source.room.clone(),
            width_inches: source.width,
            length_inches: source.length,
            rotation: 0.0,
            position,
        }
    }
}

/// Raw vector geometry plus styling for a single path element.
///
/// Opaque to the engine beyond rendering and grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRecord {
    pub id: String,
    pub d: String,
    pub fill: String,
    pub stroke: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

/// An independently draggable group of path records.
///
/// `translation` is the only spatial property that changes after ingestion;
/// the path geometry itself is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorFragment {
    pub id: String,
    /// The grouping key the fragment was built from.
    pub source_id: String,
    pub translation: Point,
    /// Never empty.
    pub paths: Vec<PathRecord>,
}

/// A complete vector rendition of the floor plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorPlan {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub view_box: Option<[f64; 4]>,
    pub fragments: Vec<VectorFragment>,
    /// Milliseconds since the Unix epoch.
    pub generated_at: u64,
    pub provider: Option<String>,
    pub raw_svg: Option<String>,
    pub source: Option<String>,
}

/// The complete designer scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneState {
    pub floor_plan: Option<FloorPlanRef>,
    pub scale: Option<ScaleCalibration>,
    pub items: Vec<PlacedItem>,
    pub viewport: Viewport,
    pub vector_plan: Option<VectorPlan>,
}

impl SceneState {
    /// Find a placed item by id.
    pub fn item(&self, id: &str) -> Option<&PlacedItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Find a vector fragment by id.
    pub fn fragment(&self, id: &str) -> Option<&VectorFragment> {
        self.vector_plan
            .as_ref()
            .and_then(|plan| plan.fragments.iter().find(|fragment| fragment.id == id))
    }

    /// Canvas pixels per inch, if a calibration exists.
    pub fn pixels_per_inch(&self) -> Option<f64> {
        self.scale.as_ref().map(ScaleCalibration::pixels_per_inch)
    }
}

/// Fresh id for a new placement.
pub fn new_placement_id() -> String {
    format!("placement-{}", Uuid::new_v4().simple())
}

/// Fresh id for an ingested fragment, keyed by its grouping id.
pub fn new_fragment_id(source_id: &str) -> String {
    format!("{}-{}", source_id, Uuid::new_v4().simple())
}
