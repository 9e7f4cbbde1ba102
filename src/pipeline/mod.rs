//! Channel processing pipeline
//!
//! Data flows strictly forward: raw records from the sources are
//! normalized, probed for liveness, deduplicated, and enriched; the
//! orchestrator sequences the stages, applies the failure policy between
//! them, and gates publication.

pub mod orchestrator;
pub mod stages;

pub use orchestrator::{PipelineOrchestrator, PipelineOutcome};
