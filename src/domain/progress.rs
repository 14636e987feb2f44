//! Ephemeral progress cursor for one pipeline instance.
//!
//! Not persisted. Cheap to poll while a phase is running; anything durable
//! lives in the project document instead.

use serde::Serialize;

use super::context::ProjectStatus;

/// In-memory progress of a running pipeline
#[derive(Debug, Clone, Serialize)]
pub struct ProjectProgress {
    pub project_id: String,

    /// Stage the pipeline is currently executing
    pub stage: ProjectStatus,

    /// Rough completion percentage (0-100)
    pub percent: u8,

    /// Human-readable description of the current work item
    pub task: String,

    /// Error message if the phase aborted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProjectProgress {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            stage: ProjectStatus::Initializing,
            percent: 0,
            task: String::new(),
            error: None,
        }
    }

    pub(crate) fn enter_stage(&mut self, stage: ProjectStatus, percent: u8) {
        self.stage = stage;
        self.percent = percent;
        self.task.clear();
    }

    pub(crate) fn set_task(&mut self, task: impl Into<String>) {
        self.task = task.into();
    }
}
