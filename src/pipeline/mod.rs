//! Staged generation pipeline.
//!
//! Drives one project's document from raw narrative text to a final video
//! reference, split into two externally triggered phases by the human
//! character-confirmation gate.

pub mod orchestrator;

pub use orchestrator::{GateResponse, Pipeline};
