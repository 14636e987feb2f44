//! Domain types for the storyreel pipeline.
//!
//! This module contains the core data structures:
//! - ProjectContext: the versioned per-project document
//! - ContextUpdate / CharacterField / SceneField: typed mutation commands
//! - ProjectProgress: the ephemeral per-run progress cursor

pub mod context;
pub mod progress;
pub mod update;

// Re-export commonly used types
pub use context::{
    CameraSpec, CharacterRecord, Meta, ProjectContext, ProjectStatus, SceneAssets, SceneRecord,
    StyleConfig,
};
pub use progress::ProjectProgress;
pub use update::{CharacterField, ContextUpdate, SceneField};
