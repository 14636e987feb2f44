//! storyreel - staged text-to-anime generation pipeline
//!
//! Turns narrative text into a final video reference through a fixed stage
//! sequence (parse -> characters -> fine-tunes -> keyframes -> videos ->
//! composition), with a human confirmation gate after character generation.
//!
//! # Architecture
//!
//! All durable state lives in one versioned document per project:
//! - Every committed mutation bumps the version by exactly one
//! - Top-level commits snapshot the pre-image, so any version can be
//!   restored via rollback
//! - Both pipeline phases are resumable purely from the document; only the
//!   in-memory progress cursor is lost with a pipeline instance
//!
//! # Modules
//!
//! - `store`: versioned per-project context store (snapshots, rollback)
//! - `pipeline`: the two-phase stage orchestrator
//! - `clients`: capability interfaces + HTTP clients for the generation
//!   services (LLM, image, fine-tune, video)
//! - `domain`: document model and typed update commands
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Phase 1: parse text, generate character candidates, stop at the gate
//! storyreel run --input story.txt
//!
//! # Pick candidate 1 for the character "Akira"
//! storyreel confirm <project-id> Akira 1
//!
//! # Phase 2: fine-tunes, keyframes, videos, final composition
//! storyreel continue <project-id>
//!
//! # Inspect / time-travel
//! storyreel status <project-id>
//! storyreel rollback <project-id> 3
//! ```

pub mod cli;
pub mod clients;
pub mod config;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod store;

// Re-export main types at crate root for convenience
pub use domain::{
    CharacterField, CharacterRecord, ContextUpdate, ProjectContext, ProjectProgress,
    ProjectStatus, SceneField, SceneRecord, StyleConfig,
};
pub use error::{Error, Result};
pub use pipeline::{GateResponse, Pipeline};
pub use store::ContextStore;
