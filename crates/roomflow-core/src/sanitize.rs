//! Total decoder from untrusted JSON to a well-formed [`SceneState`].
//!
//! Persisted documents come from a key-value store the engine does not
//! control and may be stale, truncated, or hand-edited. This boundary never
//! fails: every malformed field collapses to a safe default and every
//! unrecoverable entry is dropped, so a partially corrupt document still
//! hydrates into a usable scene.

use crate::geometry::{Viewport, clamp_zoom};
use crate::scene::{
    FloorPlanRef, PathRecord, PlacedItem, ScaleCalibration, SceneState, VectorFragment, VectorPlan,
    new_fragment_id, new_placement_id,
};
use kurbo::Point;
use serde_json::Value;
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Decode an untrusted document into a scene, substituting defaults for
/// anything malformed. Never fails.
pub fn sanitize_scene(raw: &Value) -> SceneState {
    let mut scene = SceneState::default();

    let Some(obj) = raw.as_object() else {
        return scene;
    };

    if let Some(floor_plan) = obj.get("floorPlan").and_then(sanitize_floor_plan) {
        scene.floor_plan = Some(floor_plan);
    }

    if let Some(scale) = obj.get("scale").and_then(sanitize_scale) {
        scene.scale = Some(scale);
    }

    if let Some(items) = obj.get("items").and_then(Value::as_array) {
        let mut seen = HashSet::new();
        for entry in items {
            match sanitize_item(entry) {
                Some(item) if seen.insert(item.id.clone()) => scene.items.push(item),
                Some(item) => {
                    log::warn!("dropping placed item with duplicate id {}", item.id);
                }
                None => log::warn!("dropping malformed placed item entry"),
            }
        }
    }

    if let Some(viewport) = obj.get("viewport").and_then(Value::as_object) {
        scene.viewport = Viewport {
            x: number_or_zero(viewport.get("x")),
            y: number_or_zero(viewport.get("y")),
            zoom: clamp_zoom(coerce_number(viewport.get("zoom")).unwrap_or(f64::NAN)),
        };
    }

    scene.vector_plan = obj.get("vectorPlan").and_then(sanitize_vector_plan);

    scene
}

fn sanitize_floor_plan(raw: &Value) -> Option<FloorPlanRef> {
    let obj = raw.as_object()?;
    let data_url = string_field(obj.get("dataUrl")).filter(|value| !value.is_empty())?;

    Some(FloorPlanRef {
        name: string_field(obj.get("name")).unwrap_or_else(|| "Floor plan".to_string()),
        data_url,
        width: number_or_none(obj.get("width")),
        height: number_or_none(obj.get("height")),
        aspect_ratio: obj.get("aspectRatio").and_then(Value::as_f64),
    })
}

fn sanitize_scale(raw: &Value) -> Option<ScaleCalibration> {
    let obj = raw.as_object()?;
    let inches_per_pixel = coerce_number(obj.get("inchesPerPixel")).filter(|value| *value > 0.0)?;

    Some(ScaleCalibration {
        reference_id: string_field(obj.get("referenceId")),
        reference_inches: number_or_none(obj.get("referenceInches")),
        pixel_measure: number_or_none(obj.get("pixelMeasure")),
        inches_per_pixel,
    })
}

fn sanitize_item(raw: &Value) -> Option<PlacedItem> {
    let obj = raw.as_object()?;
    let position = obj.get("position").and_then(Value::as_object);

    Some(PlacedItem {
        id: string_field(obj.get("id")).unwrap_or_else(new_placement_id),
        inventory_id: string_field(obj.get("inventoryId")),
        name: string_field(obj.get("name")).unwrap_or_else(|| "Furniture".to_string()),
        room: string_field(obj.get("room")).unwrap_or_else(|| "Miscellaneous".to_string()),
        width_inches: number_or_zero(obj.get("widthInches")),
        length_inches: number_or_zero(obj.get("lengthInches")),
        rotation: wrap_rotation(number_or_zero(obj.get("rotation"))),
        position: Point::new(
            number_or_zero(position.and_then(|p| p.get("x"))),
            number_or_zero(position.and_then(|p| p.get("y"))),
        ),
    })
}

fn sanitize_vector_plan(raw: &Value) -> Option<VectorPlan> {
    let obj = raw.as_object()?;
    let raw_fragments = obj.get("fragments").and_then(Value::as_array)?;
    if raw_fragments.is_empty() {
        return None;
    }

    let mut seen = HashSet::new();
    let mut fragments = Vec::new();
    for (index, entry) in raw_fragments.iter().enumerate() {
        match sanitize_fragment(entry, index) {
            Some(fragment) if seen.insert(fragment.id.clone()) => fragments.push(fragment),
            Some(fragment) => {
                log::warn!("dropping vector fragment with duplicate id {}", fragment.id);
            }
            None => log::warn!("dropping malformed vector fragment entry {index}"),
        }
    }
    if fragments.is_empty() {
        return None;
    }

    Some(VectorPlan {
        width: number_or_none(obj.get("width")),
        height: number_or_none(obj.get("height")),
        view_box: sanitize_view_box(obj.get("viewBox")),
        fragments,
        generated_at: coerce_number(obj.get("generatedAt"))
            .filter(|value| *value > 0.0)
            .map(|value| value as u64)
            .unwrap_or_else(timestamp_millis),
        provider: string_field(obj.get("provider")),
        raw_svg: string_field(obj.get("rawSvg")),
        source: string_field(obj.get("source")),
    })
}

fn sanitize_fragment(raw: &Value, index: usize) -> Option<VectorFragment> {
    let obj = raw.as_object()?;
    let translation = obj.get("translation").and_then(Value::as_object);

    // Older documents stored single-path fragments with the path fields
    // inlined on the fragment itself.
    let path_entries: Vec<&Value> = match obj.get("paths").and_then(Value::as_array) {
        Some(paths) => paths.iter().collect(),
        None => vec![raw],
    };

    let fragment_key = string_field(obj.get("id")).unwrap_or_else(|| format!("fragment-{index}"));
    let paths: Vec<PathRecord> = path_entries
        .iter()
        .enumerate()
        .filter_map(|(path_index, entry)| sanitize_path(entry, &fragment_key, path_index))
        .collect();
    if paths.is_empty() {
        return None;
    }

    Some(VectorFragment {
        id: string_field(obj.get("id")).unwrap_or_else(|| new_fragment_id(&fragment_key)),
        source_id: string_field(obj.get("sourceId")).unwrap_or(fragment_key),
        translation: Point::new(
            number_or_zero(translation.and_then(|t| t.get("x"))),
            number_or_zero(translation.and_then(|t| t.get("y"))),
        ),
        paths,
    })
}

fn sanitize_path(raw: &Value, fragment_key: &str, path_index: usize) -> Option<PathRecord> {
    let obj = raw.as_object()?;

    let fill_opacity = obj
        .get("fillOpacity")
        .and_then(Value::as_f64)
        .or_else(|| obj.get("opacity").and_then(Value::as_f64));

    Some(PathRecord {
        id: string_field(obj.get("id"))
            .unwrap_or_else(|| format!("{fragment_key}-path-{path_index}")),
        d: string_field(obj.get("d")).unwrap_or_default(),
        fill: string_field(obj.get("fill")).unwrap_or_else(|| "#000000".to_string()),
        stroke: string_field(obj.get("stroke")).unwrap_or_else(|| "none".to_string()),
        fill_opacity,
        transform: string_field(obj.get("transform")),
    })
}

fn sanitize_view_box(raw: Option<&Value>) -> Option<[f64; 4]> {
    let numbers: Vec<f64> = match raw? {
        Value::Array(values) => values
            .iter()
            .map(|value| coerce_number(Some(value)).unwrap_or(0.0))
            .collect(),
        Value::String(text) => text
            .split_whitespace()
            .map(|token| token.parse::<f64>().unwrap_or(0.0))
            .collect(),
        _ => return None,
    };
    if numbers.len() < 4 {
        return None;
    }
    Some([numbers[0], numbers[1], numbers[2], numbers[3]])
}

impl SceneState {
    /// Re-apply the model invariants to a programmatically built scene.
    ///
    /// Every candidate entering the history machine passes through here, so
    /// typed updates obey the same rules as decoded documents: zoom clamped,
    /// rotations wrapped into `[0, 360)`, a scale without a positive ratio
    /// dropped, fragments without paths dropped, and a vector plan without
    /// fragments dropped.
    pub fn sanitized(mut self) -> SceneState {
        self.viewport.zoom = clamp_zoom(self.viewport.zoom);
        if !self.viewport.x.is_finite() {
            self.viewport.x = 0.0;
        }
        if !self.viewport.y.is_finite() {
            self.viewport.y = 0.0;
        }

        if self
            .floor_plan
            .as_ref()
            .is_some_and(|floor_plan| floor_plan.data_url.is_empty())
        {
            self.floor_plan = None;
        }

        if self.scale.as_ref().is_some_and(|scale| {
            !(scale.inches_per_pixel > 0.0 && scale.inches_per_pixel.is_finite())
        }) {
            self.scale = None;
        }

        let mut seen = HashSet::new();
        self.items.retain(|item| seen.insert(item.id.clone()));
        for item in &mut self.items {
            item.rotation = wrap_rotation(item.rotation);
            if !item.position.x.is_finite() {
                item.position.x = 0.0;
            }
            if !item.position.y.is_finite() {
                item.position.y = 0.0;
            }
        }

        if let Some(plan) = &mut self.vector_plan {
            let mut seen = HashSet::new();
            plan.fragments
                .retain(|fragment| !fragment.paths.is_empty() && seen.insert(fragment.id.clone()));
        }
        if self
            .vector_plan
            .as_ref()
            .is_some_and(|plan| plan.fragments.is_empty())
        {
            self.vector_plan = None;
        }

        self
    }
}

/// Wrap a rotation into `[0, 360)`; non-finite input maps to 0.
fn wrap_rotation(rotation: f64) -> f64 {
    if !rotation.is_finite() {
        return 0.0;
    }
    rotation.rem_euclid(360.0)
}

/// Milliseconds since the Unix epoch.
pub fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Numeric coercion in the tolerant style of the persisted format: JSON
/// numbers pass through, numeric strings parse, everything else is rejected.
/// Non-finite results are rejected.
fn coerce_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64().filter(|parsed| parsed.is_finite()),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|parsed| parsed.is_finite()),
        _ => None,
    }
}

fn number_or_zero(value: Option<&Value>) -> f64 {
    coerce_number(value).unwrap_or(0.0)
}

/// `Number(x) || null` semantics: missing, malformed, and zero all decode to
/// absent.
fn number_or_none(value: Option<&Value>) -> Option<f64> {
    coerce_number(value).filter(|parsed| *parsed != 0.0)
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}
