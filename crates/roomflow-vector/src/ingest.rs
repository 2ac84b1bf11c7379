//! Ingestion pipeline from provider-supplied markup to a vector plan.
//!
//! The provider is opaque: whatever produced the markup, anything satisfying
//! the contract here becomes an editable fragment collection. Exactly two
//! conditions abort ingestion (no root element, no path elements); every
//! other kind of malformed attribute degrades to a default instead.

use crate::markup::{MarkupElement, parse_markup};
use kurbo::Point;
use roomflow_core::sanitize::timestamp_millis;
use roomflow_core::scene::{PathRecord, VectorFragment, VectorPlan, new_fragment_id};
use thiserror::Error;

/// Why ingestion rejected a markup document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("markup is missing a root <svg> element")]
    MissingRoot,
    #[error("markup did not contain any <path> elements")]
    NoPaths,
}

/// Caller-supplied fallbacks for fields the markup may omit, typically taken
/// from the original raster image.
#[derive(Debug, Clone, Default)]
pub struct IngestMetadata {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub provider: Option<String>,
}

/// Transform a markup document into a [`VectorPlan`].
///
/// Pure: no scene is touched on failure, and the raw markup text is retained
/// in the plan for export and debugging.
pub fn ingest_vector_plan(svg: &str, metadata: &IngestMetadata) -> Result<VectorPlan, IngestError> {
    let tree = parse_markup(svg).ok_or(IngestError::MissingRoot)?;
    let root = tree
        .descendants()
        .find(|element| element.name() == "svg")
        .ok_or(IngestError::MissingRoot)?;

    let width = parse_svg_number(root.attribute("width"));
    let height = parse_svg_number(root.attribute("height"));
    let view_box = parse_view_box(root.attribute("viewBox"));

    let path_nodes: Vec<&MarkupElement> = root
        .descendants()
        .filter(|element| element.name() == "path")
        .collect();
    if path_nodes.is_empty() {
        return Err(IngestError::NoPaths);
    }

    let mut fragments: Vec<VectorFragment> = Vec::new();
    for (index, node) in path_nodes.iter().enumerate() {
        let raw_key = node
            .attribute("data-fragment-id")
            .or_else(|| node.attribute("id"))
            .unwrap_or("")
            .trim();
        // A synthetic key keeps every path grouped even on markup that
        // carries no identifiers at all.
        let key = if raw_key.is_empty() {
            format!("fragment-{index}")
        } else {
            raw_key.to_string()
        };

        let fragment = match fragments
            .iter()
            .position(|fragment| fragment.source_id == key)
        {
            Some(position) => &mut fragments[position],
            None => {
                fragments.push(VectorFragment {
                    id: new_fragment_id(&key),
                    source_id: key,
                    translation: Point::ZERO,
                    paths: Vec::new(),
                });
                fragments.last_mut().expect("fragment just pushed")
            }
        };

        let fill_opacity = node
            .attribute("fill-opacity")
            .or_else(|| node.attribute("opacity"))
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite());

        fragment.paths.push(PathRecord {
            id: format!("{}-path-{}", fragment.id, fragment.paths.len()),
            d: node.attribute("d").unwrap_or("").to_string(),
            fill: node.attribute("fill").unwrap_or("#000000").to_string(),
            stroke: node.attribute("stroke").unwrap_or("none").to_string(),
            fill_opacity,
            transform: node.attribute("transform").map(str::to_string),
        });
    }

    fragments.retain(|fragment| !fragment.paths.is_empty());
    if fragments.is_empty() {
        return Err(IngestError::NoPaths);
    }

    log::debug!(
        "ingested {} fragments from {} path elements",
        fragments.len(),
        path_nodes.len()
    );

    Ok(VectorPlan {
        width: width.or(metadata.width),
        height: height.or(metadata.height),
        view_box,
        fragments,
        generated_at: timestamp_millis(),
        provider: metadata.provider.clone(),
        raw_svg: Some(svg.to_string()),
        source: Some("ai".to_string()),
    })
}

/// Parse a dimension attribute, tolerating a `px` suffix in any case.
fn parse_svg_number(value: Option<&str>) -> Option<f64> {
    let text = value?.trim().to_ascii_lowercase();
    let text = text.strip_suffix("px").unwrap_or(&text).trim();
    text.parse::<f64>().ok().filter(|parsed| parsed.is_finite())
}

/// Parse a viewBox attribute: exactly four whitespace-separated finite
/// numbers, anything else discarded.
fn parse_view_box(value: Option<&str>) -> Option<[f64; 4]> {
    let tokens: Vec<&str> = value?.split_whitespace().collect();
    if tokens.len() < 4 {
        return None;
    }
    let numbers: Vec<f64> = tokens
        .iter()
        .filter_map(|token| token.parse::<f64>().ok())
        .filter(|parsed| parsed.is_finite())
        .collect();
    if numbers.len() != 4 {
        return None;
    }
    Some([numbers[0], numbers[1], numbers[2], numbers[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouping_by_fragment_id() {
        let _ = env_logger::builder().is_test(true).try_init();
        let svg = r#"<svg width="400" height="300" viewBox="0 0 400 300"><path data-fragment-id="wall-a" d="M0 0 L10 10"/><path data-fragment-id="wall-a" d="M10 10 L20 20"/></svg>"#;
        let plan = ingest_vector_plan(svg, &IngestMetadata::default()).unwrap();

        assert_eq!(plan.width, Some(400.0));
        assert_eq!(plan.height, Some(300.0));
        assert_eq!(plan.view_box, Some([0.0, 0.0, 400.0, 300.0]));
        assert_eq!(plan.fragments.len(), 1);

        let fragment = &plan.fragments[0];
        assert_eq!(fragment.source_id, "wall-a");
        assert_eq!(fragment.translation, Point::ZERO);
        assert_eq!(fragment.paths.len(), 2);
        assert_eq!(fragment.paths[0].d, "M0 0 L10 10");
        assert_eq!(fragment.paths[1].d, "M10 10 L20 20");
    }

    #[test]
    fn test_missing_root() {
        assert_eq!(
            ingest_vector_plan("<div><path d=\"M0 0\"/></div>", &IngestMetadata::default()),
            Err(IngestError::MissingRoot)
        );
        assert_eq!(
            ingest_vector_plan("not markup", &IngestMetadata::default()),
            Err(IngestError::MissingRoot)
        );
    }

    #[test]
    fn test_no_paths() {
        assert_eq!(
            ingest_vector_plan("<svg><rect width=\"4\"/></svg>", &IngestMetadata::default()),
            Err(IngestError::NoPaths)
        );
    }

    #[test]
    fn test_grouping_fallbacks() {
        // First path groups by generic id, the other two are anonymous and
        // each get a synthetic per-index key.
        let svg = r#"<svg><path id="door" d="M0 0"/><path d="M1 1"/><path d="M2 2"/></svg>"#;
        let plan = ingest_vector_plan(svg, &IngestMetadata::default()).unwrap();
        assert_eq!(plan.fragments.len(), 3);
        assert_eq!(plan.fragments[0].source_id, "door");
        assert_eq!(plan.fragments[1].source_id, "fragment-1");
        assert_eq!(plan.fragments[2].source_id, "fragment-2");
    }

    #[test]
    fn test_nested_paths_found_in_document_order() {
        let svg = r#"<svg><g data-fragment-id="outer"><path data-fragment-id="room" d="M0 0"/></g><path data-fragment-id="room" d="M5 5"/></svg>"#;
        let plan = ingest_vector_plan(svg, &IngestMetadata::default()).unwrap();
        assert_eq!(plan.fragments.len(), 1);
        assert_eq!(plan.fragments[0].paths.len(), 2);
        assert_eq!(plan.fragments[0].paths[0].d, "M0 0");
        assert_eq!(plan.fragments[0].paths[1].d, "M5 5");
    }

    #[test]
    fn test_styling_defaults_and_overrides() {
        let svg = r##"<svg><path d="M0 0" fill="#abcdef" stroke="#123" fill-opacity="0.5" transform="translate(3,4)"/><path d="M1 1" opacity="0.25"/><path d="M2 2" fill-opacity="oops"/></svg>"##;
        let plan = ingest_vector_plan(svg, &IngestMetadata::default()).unwrap();
        let all_paths: Vec<&PathRecord> = plan
            .fragments
            .iter()
            .flat_map(|fragment| &fragment.paths)
            .collect();

        assert_eq!(all_paths[0].fill, "#abcdef");
        assert_eq!(all_paths[0].stroke, "#123");
        assert_eq!(all_paths[0].fill_opacity, Some(0.5));
        assert_eq!(all_paths[0].transform.as_deref(), Some("translate(3,4)"));

        assert_eq!(all_paths[1].fill, "#000000");
        assert_eq!(all_paths[1].stroke, "none");
        assert_eq!(all_paths[1].fill_opacity, Some(0.25));

        // Unparseable opacity degrades to absent rather than failing.
        assert_eq!(all_paths[2].fill_opacity, None);
    }

    #[test]
    fn test_metadata_fallback_for_dimensions() {
        let metadata = IngestMetadata {
            width: Some(1200.0),
            height: Some(800.0),
            provider: Some("potrace".to_string()),
        };
        let plan = ingest_vector_plan("<svg><path d=\"M0 0\"/></svg>", &metadata).unwrap();
        assert_eq!(plan.width, Some(1200.0));
        assert_eq!(plan.height, Some(800.0));
        assert_eq!(plan.provider.as_deref(), Some("potrace"));
        assert_eq!(plan.source.as_deref(), Some("ai"));
    }

    #[test]
    fn test_declared_dimensions_win_over_metadata() {
        let metadata = IngestMetadata {
            width: Some(1200.0),
            height: Some(800.0),
            provider: None,
        };
        let plan = ingest_vector_plan(
            r#"<svg width="400px" height="300PX"><path d="M0 0"/></svg>"#,
            &metadata,
        )
        .unwrap();
        assert_eq!(plan.width, Some(400.0));
        assert_eq!(plan.height, Some(300.0));
    }

    #[test]
    fn test_malformed_view_box_discarded() {
        let plan = ingest_vector_plan(
            r#"<svg viewBox="0 0 400"><path d="M0 0"/></svg>"#,
            &IngestMetadata::default(),
        )
        .unwrap();
        assert_eq!(plan.view_box, None);

        let plan = ingest_vector_plan(
            r#"<svg viewBox="0 0 400 oops"><path d="M0 0"/></svg>"#,
            &IngestMetadata::default(),
        )
        .unwrap();
        assert_eq!(plan.view_box, None);
    }

    #[test]
    fn test_raw_markup_retained() {
        let svg = r#"<svg><path d="M0 0"/></svg>"#;
        let plan = ingest_vector_plan(svg, &IngestMetadata::default()).unwrap();
        assert_eq!(plan.raw_svg.as_deref(), Some(svg));
        assert!(plan.generated_at > 0);
    }

    #[test]
    fn test_ingested_plan_drives_the_designer() {
        use roomflow_core::{LayoutDesigner, MouseButton, PointerTarget};

        let mut designer = LayoutDesigner::new();
        designer.set_floor_plan(roomflow_core::FloorPlanRef::new(
            "plan.png",
            "data:image/png;base64,AA==",
            1200.0,
            800.0,
        ));

        let svg = r#"<svg width="1200" height="800"><path data-fragment-id="kitchen" d="M0 0 L50 0"/><path data-fragment-id="kitchen" d="M50 0 L50 40"/><path data-fragment-id="bath" d="M90 0 L120 0"/></svg>"#;
        let metadata = IngestMetadata {
            width: Some(1200.0),
            height: Some(800.0),
            provider: Some("potrace".to_string()),
        };
        let plan = ingest_vector_plan(svg, &metadata).unwrap();
        assert_eq!(plan.fragments.len(), 2);

        assert!(designer.set_vector_plan(plan.clone()));
        let kitchen_id = plan.fragments[0].id.clone();

        // Drag the kitchen fragment and make sure only it moved, as a
        // single history entry.
        let depth = designer.history().past_len();
        designer.pointer_down(
            PointerTarget::Fragment(kitchen_id.clone()),
            1,
            MouseButton::Left,
            kurbo::Point::ZERO,
        );
        designer.pointer_move(1, kurbo::Point::new(64.0, 32.0));
        designer.pointer_up(1);
        assert_eq!(designer.history().past_len(), depth + 1);

        let scene = designer.scene();
        assert_eq!(
            scene.fragment(&kitchen_id).unwrap().translation,
            kurbo::Point::new(64.0, 32.0)
        );
        assert_eq!(
            scene.fragment(&plan.fragments[1].id).unwrap().translation,
            kurbo::Point::ZERO
        );

        // Undo restores the ingested placement exactly.
        assert!(designer.undo());
        assert_eq!(
            designer.scene().fragment(&kitchen_id).unwrap().translation,
            kurbo::Point::ZERO
        );
    }

    #[test]
    fn test_failed_ingestion_leaves_scene_untouched() {
        use roomflow_core::LayoutDesigner;

        let mut designer = LayoutDesigner::new();
        designer.set_floor_plan(roomflow_core::FloorPlanRef::new(
            "plan.png", "data:x", 100.0, 100.0,
        ));
        let before = designer.scene().clone();

        let result = ingest_vector_plan("<svg><g/></svg>", &IngestMetadata::default());
        assert_eq!(result, Err(IngestError::NoPaths));
        assert_eq!(designer.scene(), &before);
        assert!(designer.scene().vector_plan.is_none());
    }

    #[test]
    fn test_ingested_plan_survives_sanitization() {
        let svg = r##"<svg width="400" height="300"><path data-fragment-id="wall-a" d="M0 0 L10 10" fill="#fff"/></svg>"##;
        let plan = ingest_vector_plan(svg, &IngestMetadata::default()).unwrap();

        let mut scene = roomflow_core::SceneState::default();
        scene.vector_plan = Some(plan.clone());
        let raw = serde_json::to_value(&scene).unwrap();
        let decoded = roomflow_core::sanitize_scene(&raw);
        assert_eq!(decoded.vector_plan, Some(plan));
    }
}
