// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod enrich;
pub mod explain;
pub mod factpack;
pub mod llm;
pub mod pipeline;
pub mod score;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::Config;
pub use crate::factpack::{EnrichedFactpack, ExplainReport, Factpack};
pub use crate::llm::{build_client, DynLlmClient, LlmClient};
pub use crate::pipeline::run_pipeline;
