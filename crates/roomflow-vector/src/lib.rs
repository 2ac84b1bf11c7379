//! Roomflow Vector Ingestion
//!
//! Turns externally produced vector markup into the editable fragment model
//! of `roomflow-core`, and defines the contract with the opaque
//! vectorization provider.

pub mod ingest;
pub mod markup;
pub mod provider;

pub use ingest::{IngestError, IngestMetadata, ingest_vector_plan};
pub use markup::{MarkupElement, parse_markup};
pub use provider::{
    BoxFuture, DEFAULT_VECTOR_PROVIDER, ProviderError, VectorProvider, VectorizeRequest,
    VectorizeResponse, instruction_overrides,
};
