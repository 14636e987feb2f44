//! The versioned per-project document.
//!
//! One `ProjectContext` exists per project id. Every committed mutation bumps
//! `meta.version` by exactly one; pre-mutation snapshots make any version
//! reachable again via rollback.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The complete durable state of one project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectContext {
    pub meta: Meta,

    /// Current pipeline stage (or terminal failed/completed)
    pub status: ProjectStatus,

    /// Generation defaults, supplied at initialization and never mutated
    /// by the pipeline
    pub style: StyleConfig,

    /// Characters detected in the source text, keyed by name
    pub characters: BTreeMap<String, CharacterRecord>,

    /// Scenes in narrative order. Order also defines the keyframe
    /// continuity chain.
    pub scenes: Vec<SceneRecord>,

    /// Path of the final composed video, set by the concatenation stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video: Option<String>,

    /// Human-readable error recorded when a phase fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProjectContext {
    /// Create a fresh version-1 document for a project
    pub fn new(project_id: String, source_text: String, style: StyleConfig) -> Self {
        Self {
            meta: Meta {
                project_id,
                version: 1,
                created_at: Utc::now(),
                updated_at: None,
                source_text,
            },
            status: ProjectStatus::Parsing,
            style,
            characters: BTreeMap::new(),
            scenes: Vec::new(),
            final_video: None,
            error: None,
        }
    }

    /// Look up a scene by its stable id
    pub fn scene(&self, scene_id: &str) -> Option<&SceneRecord> {
        self.scenes.iter().find(|s| s.id == scene_id)
    }

    pub(crate) fn scene_mut(&mut self, scene_id: &str) -> Option<&mut SceneRecord> {
        self.scenes.iter_mut().find(|s| s.id == scene_id)
    }
}

/// Document metadata and version counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub project_id: String,

    /// Starts at 1, increments by exactly 1 per committed mutation
    pub version: u64,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// The raw narrative text the project was created from
    pub source_text: String,
}

/// Pipeline stage the document is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Initializing,
    Parsing,
    GeneratingCharacters,
    WaitingCharacterConfirmation,
    TrainingLoras,
    GeneratingKeyframes,
    GeneratingVideos,
    Concatenating,
    Completed,
    Failed,
}

impl ProjectStatus {
    /// Wire/display name (matches the serialized form)
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Initializing => "initializing",
            ProjectStatus::Parsing => "parsing",
            ProjectStatus::GeneratingCharacters => "generating_characters",
            ProjectStatus::WaitingCharacterConfirmation => "waiting_character_confirmation",
            ProjectStatus::TrainingLoras => "training_loras",
            ProjectStatus::GeneratingKeyframes => "generating_keyframes",
            ProjectStatus::GeneratingVideos => "generating_videos",
            ProjectStatus::Concatenating => "concatenating",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation defaults (model name and base seed)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    pub model: String,
    pub seed: u64,
}

/// Per-character state, filled in incrementally as stages complete.
///
/// Absence of a field means that stage has not yet run for this character.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterRecord {
    #[serde(default)]
    pub description: String,

    /// Visual prompt derived from the description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Candidate images awaiting human selection, in generation order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<String>>,

    /// The candidate the human confirmed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_image: Option<String>,

    /// Fine-tuned model reference trained on the selected image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lora_path: Option<String>,
}

impl CharacterRecord {
    /// Reference used to bias scene images toward this character's likeness:
    /// the fine-tune if trained, else the confirmed image, else none.
    pub fn reference(&self) -> Option<&str> {
        self.lora_path
            .as_deref()
            .or(self.selected_image.as_deref())
    }
}

/// One scene in narrative order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRecord {
    /// Stable id, unique within the document, never reassigned
    pub id: String,

    /// Location/time/mood description
    pub setting: String,

    /// Names of characters appearing in the scene
    #[serde(default)]
    pub characters: Vec<String>,

    pub camera: CameraSpec,

    /// Character name -> spoken line
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dialogue: BTreeMap<String, String>,

    /// Generated media, filled in by the keyframe and video stages
    #[serde(default)]
    pub assets: SceneAssets,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Camera direction for a scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSpec {
    /// Shot type (push_in, pull_out, pan, close_up, wide_shot, ...)
    #[serde(rename = "type")]
    pub kind: String,

    /// Target clip duration in seconds
    pub duration_s: u32,
}

/// Generated media references for one scene
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneAssets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_frame: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_frame: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_mp4: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> ProjectContext {
        ProjectContext::new(
            "proj-1".to_string(),
            "Once upon a time".to_string(),
            StyleConfig {
                model: "SDXL_Niji6".to_string(),
                seed: 777_312,
            },
        )
    }

    #[test]
    fn test_new_context_starts_at_version_one() {
        let ctx = sample_context();
        assert_eq!(ctx.meta.version, 1);
        assert_eq!(ctx.status, ProjectStatus::Parsing);
        assert!(ctx.characters.is_empty());
        assert!(ctx.scenes.is_empty());
        assert!(ctx.meta.updated_at.is_none());
    }

    #[test]
    fn test_status_round_trip() {
        let json = serde_json::to_string(&ProjectStatus::WaitingCharacterConfirmation).unwrap();
        assert_eq!(json, "\"waiting_character_confirmation\"");

        let parsed: ProjectStatus = serde_json::from_str("\"generating_keyframes\"").unwrap();
        assert_eq!(parsed, ProjectStatus::GeneratingKeyframes);
        assert_eq!(parsed.to_string(), "generating_keyframes");
    }

    #[test]
    fn test_character_reference_precedence() {
        let mut record = CharacterRecord {
            description: "silver-haired swordswoman".to_string(),
            ..Default::default()
        };
        assert_eq!(record.reference(), None);

        record.selected_image = Some("img://akira/1".to_string());
        assert_eq!(record.reference(), Some("img://akira/1"));

        record.lora_path = Some("lora://akira".to_string());
        assert_eq!(record.reference(), Some("lora://akira"));
    }

    #[test]
    fn test_sparse_serialization() {
        let ctx = sample_context();
        let json = serde_json::to_value(&ctx).unwrap();

        // Unset optional fields stay out of the document entirely
        assert!(json.get("final_video").is_none());
        assert!(json.get("error").is_none());
        assert_eq!(json["status"], "parsing");
    }

    #[test]
    fn test_scene_wire_format() {
        let raw = r#"{
            "id": "scene_01",
            "setting": "moonlit rooftop",
            "characters": ["Akira"],
            "camera": {"type": "close_up", "duration_s": 6},
            "dialogue": {"Akira": "It ends tonight."}
        }"#;

        let scene: SceneRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(scene.camera.kind, "close_up");
        assert_eq!(scene.camera.duration_s, 6);
        assert!(scene.assets.start_frame.is_none());

        let back = serde_json::to_value(&scene).unwrap();
        assert_eq!(back["camera"]["type"], "close_up");
    }
}
