//! Typed mutation commands for the project document.
//!
//! Merge semantics live in these types rather than in runtime inspection of
//! loosely-typed maps: a top-level commit shallow-merges the character map
//! and replaces everything else it names, while per-character and per-scene
//! field writes can only touch the field their variant carries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::context::{CharacterRecord, ProjectStatus, SceneRecord};

/// A top-level partial update, applied atomically by `ContextStore::commit`.
///
/// Fields left as `None` are untouched. `characters` entries are merged into
/// the existing map (existing names not listed survive); `scenes` replaces
/// the scene list wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub characters: Option<BTreeMap<String, CharacterRecord>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenes: Option<Vec<SceneRecord>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video: Option<String>,
}

impl ContextUpdate {
    pub fn status(status: ProjectStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// The durable failure marker written when a phase aborts
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(ProjectStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// A single-field write to one character record.
///
/// The record is created (with an empty description) if the character does
/// not exist yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterField {
    Description(String),
    Prompt(String),
    Candidates(Vec<String>),
    SelectedImage(String),
    LoraPath(String),
}

impl CharacterField {
    pub(crate) fn apply(self, record: &mut CharacterRecord) {
        match self {
            CharacterField::Description(v) => record.description = v,
            CharacterField::Prompt(v) => record.prompt = Some(v),
            CharacterField::Candidates(v) => record.candidates = Some(v),
            CharacterField::SelectedImage(v) => record.selected_image = Some(v),
            CharacterField::LoraPath(v) => record.lora_path = Some(v),
        }
    }
}

/// A single-field write to one scene, found by id.
///
/// Media fields land in the scene's asset map; `Status`/`Error` live on the
/// scene itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneField {
    Status(String),
    Error(String),
    StartFrame(String),
    EndFrame(String),
    VideoMp4(String),
}

impl SceneField {
    pub(crate) fn apply(self, scene: &mut SceneRecord) {
        match self {
            SceneField::Status(v) => scene.status = Some(v),
            SceneField::Error(v) => scene.error = Some(v),
            SceneField::StartFrame(v) => scene.assets.start_frame = Some(v),
            SceneField::EndFrame(v) => scene.assets.end_frame = Some(v),
            SceneField::VideoMp4(v) => scene.assets.video_mp4 = Some(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::{CameraSpec, SceneAssets};

    fn sample_scene() -> SceneRecord {
        SceneRecord {
            id: "scene_01".to_string(),
            setting: "rainy alley".to_string(),
            characters: vec!["Akira".to_string()],
            camera: CameraSpec {
                kind: "wide_shot".to_string(),
                duration_s: 6,
            },
            dialogue: BTreeMap::new(),
            assets: SceneAssets::default(),
            status: None,
            error: None,
        }
    }

    #[test]
    fn test_character_field_touches_only_its_target() {
        let mut record = CharacterRecord {
            description: "tall, quiet".to_string(),
            prompt: Some("anime style, tall figure".to_string()),
            ..Default::default()
        };

        CharacterField::SelectedImage("img://akira/2".to_string()).apply(&mut record);

        assert_eq!(record.selected_image.as_deref(), Some("img://akira/2"));
        assert_eq!(record.description, "tall, quiet");
        assert_eq!(record.prompt.as_deref(), Some("anime style, tall figure"));
        assert!(record.lora_path.is_none());
    }

    #[test]
    fn test_media_fields_route_into_assets() {
        let mut scene = sample_scene();

        SceneField::StartFrame("img://s1/start".to_string()).apply(&mut scene);
        SceneField::VideoMp4("vid://s1".to_string()).apply(&mut scene);
        SceneField::Status("rendered".to_string()).apply(&mut scene);

        assert_eq!(scene.assets.start_frame.as_deref(), Some("img://s1/start"));
        assert_eq!(scene.assets.video_mp4.as_deref(), Some("vid://s1"));
        assert!(scene.assets.end_frame.is_none());
        assert_eq!(scene.status.as_deref(), Some("rendered"));
        assert!(scene.error.is_none());
    }

    #[test]
    fn test_failed_update_shape() {
        let update = ContextUpdate::failed("image service down");
        assert_eq!(update.status, Some(ProjectStatus::Failed));
        assert_eq!(update.error.as_deref(), Some("image service down"));
        assert!(update.characters.is_none());
        assert!(update.scenes.is_none());
    }
}
