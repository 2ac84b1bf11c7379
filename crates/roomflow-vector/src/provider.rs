//! Request/response contract with the external vectorization provider.
//!
//! The provider is an opaque collaborator that accepts an image and returns
//! vector markup text. The engine never inspects which backend produced the
//! markup; anything satisfying the ingestion contract is acceptable.

use roomflow_core::scene::{FloorPlanRef, ScaleCalibration};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future for the provider call, the engine's sole suspension point.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Provider used when the caller expresses no preference.
pub const DEFAULT_VECTOR_PROVIDER: &str = "potrace";

/// Provider call failures. The scene is never touched on failure; the
/// message is surfaced to the user as-is.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Vectorization request failed ({status}): {message}")]
    Request { status: u16, message: String },
    #[error("Provider response missing SVG content")]
    MissingSvg,
    #[error("Provider error: {0}")]
    Other(String),
}

/// A vectorization request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorizeRequest {
    /// The floor-plan raster as a data URL.
    pub image_data_url: String,
    /// Provider identifier, e.g. `potrace`, `openai`, `gemini`.
    pub provider: String,
    /// Extra instructions prepended to the provider's base prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction_overrides: Option<String>,
}

/// A vectorization response: the markup text wrapped in a single field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizeResponse {
    pub svg: String,
}

/// An opaque raster-to-vector backend.
///
/// One request is in flight at a time per designer instance and there is no
/// cancellation token: a response that arrives after a reset or a new upload
/// still applies to whatever scene exists when it resolves.
pub trait VectorProvider {
    /// Convert an image to vector markup text.
    fn vectorize(&self, request: &VectorizeRequest) -> BoxFuture<'_, Result<String, ProviderError>>;
}

/// Build the instruction overrides describing the source image and the
/// fragment contract the ingestion pipeline expects back.
pub fn instruction_overrides(
    floor_plan: &FloorPlanRef,
    scale: Option<&ScaleCalibration>,
) -> String {
    let mut parts = Vec::new();

    if !floor_plan.name.is_empty() {
        parts.push(format!("Source file name: {}.", floor_plan.name));
    }
    if let Some(width) = floor_plan.width {
        parts.push(format!("Source image width: {width}px."));
    }
    if let Some(height) = floor_plan.height {
        parts.push(format!("Source image height: {height}px."));
    }
    if let Some(aspect_ratio) = floor_plan.aspect_ratio {
        parts.push(format!("Aspect ratio: {aspect_ratio:.6}."));
    }
    if let Some(scale) = scale {
        parts.push(format!(
            "Approximate pixels per inch: {:.4}.",
            scale.pixels_per_inch()
        ));
    }
    parts.push(
        "Reproduce every wall, fixture, label, hatch, and furniture outline exactly as seen, \
         matching colours, stroke weights, and spacing."
            .to_string(),
    );
    parts.push(
        "Structure each room or fixture cluster as <path> elements carrying a shared \
         data-fragment-id attribute to allow precise repositioning."
            .to_string(),
    );
    parts.push("Return only the raw <svg>...</svg> markup string with no JSON, markdown, or commentary.".to_string());

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        // Simple blocking executor for tests
        use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

        fn dummy_raw_waker() -> RawWaker {
            fn no_op(_: *const ()) {}
            fn clone(_: *const ()) -> RawWaker {
                dummy_raw_waker()
            }
            static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
            RawWaker::new(std::ptr::null(), &VTABLE)
        }

        let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
        let mut cx = Context::from_waker(&waker);
        let mut f = std::pin::pin!(f);

        loop {
            match f.as_mut().poll(&mut cx) {
                Poll::Ready(result) => return result,
                Poll::Pending => {}
            }
        }
    }

    /// Canned provider returning a fixed markup string.
    struct FixedProvider {
        svg: String,
    }

    impl VectorProvider for FixedProvider {
        fn vectorize(
            &self,
            _request: &VectorizeRequest,
        ) -> BoxFuture<'_, Result<String, ProviderError>> {
            Box::pin(async move { Ok(self.svg.clone()) })
        }
    }

    #[test]
    fn test_request_serde_shape() {
        let request = VectorizeRequest {
            image_data_url: "data:image/png;base64,AA==".to_string(),
            provider: DEFAULT_VECTOR_PROVIDER.to_string(),
            instruction_overrides: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["imageDataUrl"], "data:image/png;base64,AA==");
        assert_eq!(json["provider"], "potrace");
        assert!(json.get("instructionOverrides").is_none());
    }

    #[test]
    fn test_response_unwraps_svg_field() {
        let response: VectorizeResponse =
            serde_json::from_str(r#"{"svg":"<svg><path d=\"M0 0\"/></svg>"}"#).unwrap();
        assert!(response.svg.starts_with("<svg>"));
    }

    #[test]
    fn test_provider_round_trip() {
        let provider = FixedProvider {
            svg: "<svg><path d=\"M0 0\"/></svg>".to_string(),
        };
        let request = VectorizeRequest {
            image_data_url: "data:image/png;base64,AA==".to_string(),
            provider: "potrace".to_string(),
            instruction_overrides: None,
        };
        let markup = block_on(provider.vectorize(&request)).unwrap();
        assert_eq!(markup, "<svg><path d=\"M0 0\"/></svg>");
    }

    #[test]
    fn test_instruction_overrides_mention_source() {
        let plan = FloorPlanRef::new("plan.png", "data:x", 1200.0, 800.0);
        let scale = ScaleCalibration {
            reference_id: None,
            reference_inches: None,
            pixel_measure: None,
            inches_per_pixel: 0.5,
        };
        let text = instruction_overrides(&plan, Some(&scale));
        assert!(text.contains("plan.png"));
        assert!(text.contains("1200px"));
        assert!(text.contains("2.0000"));
        assert!(text.contains("data-fragment-id"));
    }
}
