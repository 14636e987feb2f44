//! Pipeline orchestrator for one project.
//!
//! Phase 1 (`run`) parses the text and generates character candidates, then
//! stops at the confirmation gate. A human selects one candidate per
//! character by writing `selected_image` through the store. Phase 2
//! (`continue_after_confirmation`) trains fine-tunes, generates keyframes and
//! per-scene videos, and records the final artifact reference.
//!
//! Stages and the loops within them run strictly sequentially; correctness
//! comes from in-order document mutation, not from synchronization. A stage
//! failure is recorded durably (`status=failed` plus the error message) and
//! re-raised; nothing is rolled back automatically.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::clients::{
    ImageClient, ImageGenerator, LlmClient, LoraClient, LoraTrainer, ScriptAnalyzer,
    VideoClient, VideoSynthesizer,
};
use crate::domain::{
    CharacterField, ContextUpdate, ProjectContext, ProjectProgress, ProjectStatus, SceneField,
    StyleConfig,
};
use crate::error::{Error, Result};
use crate::store::ContextStore;

/// Candidate images generated per character for human selection
const CANDIDATES_PER_CHARACTER: usize = 3;

/// Response returned when phase 1 reaches the confirmation gate
#[derive(Debug, Clone, Serialize)]
pub struct GateResponse {
    pub project_id: String,
    pub status: ProjectStatus,
    pub message: String,
}

/// Orchestrator for one project's generation pipeline
pub struct Pipeline {
    project_id: String,
    store: ContextStore,
    analyzer: Arc<dyn ScriptAnalyzer>,
    images: Arc<dyn ImageGenerator>,
    trainer: Arc<dyn LoraTrainer>,
    video: Arc<dyn VideoSynthesizer>,
    style: StyleConfig,
    final_dir: PathBuf,
    progress: Mutex<ProjectProgress>,
}

impl Pipeline {
    /// Build a pipeline from the global configuration, generating a fresh
    /// project id if none is given
    pub async fn from_config(project_id: Option<String>) -> Result<Self> {
        let cfg = crate::config::config().map_err(|e| Error::Validation {
            service: "config".to_string(),
            reason: e.to_string(),
        })?;

        let project_id = project_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let store = ContextStore::open(&project_id).await?;

        Ok(Self::with_parts(
            project_id,
            store,
            Arc::new(LlmClient::new(cfg.services.llm.clone(), cfg.retry.clone())),
            Arc::new(ImageClient::new(cfg.services.image.clone(), cfg.retry.clone())),
            Arc::new(LoraClient::new(cfg.services.lora.clone(), cfg.retry.clone())),
            Arc::new(VideoClient::new(cfg.services.video.clone(), cfg.retry.clone())),
            StyleConfig {
                model: cfg.style.model.clone(),
                seed: cfg.style.seed,
            },
            cfg.home.join("videos").join("final"),
        ))
    }

    /// Build a pipeline from explicit collaborators
    #[allow(clippy::too_many_arguments)]
    pub fn with_parts(
        project_id: String,
        store: ContextStore,
        analyzer: Arc<dyn ScriptAnalyzer>,
        images: Arc<dyn ImageGenerator>,
        trainer: Arc<dyn LoraTrainer>,
        video: Arc<dyn VideoSynthesizer>,
        style: StyleConfig,
        final_dir: PathBuf,
    ) -> Self {
        let progress = Mutex::new(ProjectProgress::new(project_id.clone()));
        Self {
            project_id,
            store,
            analyzer,
            images,
            trainer,
            video,
            style,
            final_dir,
            progress,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Current ephemeral progress (lost with the instance; the durable view
    /// lives in the document)
    pub fn progress(&self) -> ProjectProgress {
        self.progress.lock().expect("progress lock poisoned").clone()
    }

    /// Phase 1: initialize the document, parse the text, generate character
    /// candidates, stop at the confirmation gate.
    #[instrument(skip(self, text), fields(project_id = %self.project_id))]
    pub async fn run(&self, text: &str) -> Result<GateResponse> {
        info!("Starting generation pipeline");

        // A pre-existing document is a caller error, not a stage failure;
        // it must not overwrite the existing project's status
        self.store.initialize(text, self.style.clone()).await?;

        match self.run_phase_one(text).await {
            Ok(gate) => Ok(gate),
            Err(e) => Err(self.record_failure(e).await),
        }
    }

    /// Phase 2: reload the (possibly confirmed) document, train fine-tunes,
    /// generate keyframes and videos, compose the final reference.
    ///
    /// There is no intra-phase checkpoint: re-running after a failure redoes
    /// the whole phase.
    #[instrument(skip(self), fields(project_id = %self.project_id))]
    pub async fn continue_after_confirmation(&self) -> Result<String> {
        info!("Continuing pipeline after character confirmation");

        // Must observe any confirmations applied since phase 1; a missing
        // document surfaces as NotFound rather than a recorded failure
        let context = self.store.load().await?;

        match self.run_phase_two(context).await {
            Ok(final_video) => Ok(final_video),
            Err(e) => Err(self.record_failure(e).await),
        }
    }

    async fn run_phase_one(&self, text: &str) -> Result<GateResponse> {
        self.parse_stage(text).await?;
        self.character_stage().await?;

        self.store
            .commit(ContextUpdate::status(
                ProjectStatus::WaitingCharacterConfirmation,
            ))
            .await?;
        self.enter_stage(ProjectStatus::WaitingCharacterConfirmation, 30);

        Ok(GateResponse {
            project_id: self.project_id.clone(),
            status: ProjectStatus::WaitingCharacterConfirmation,
            message: "Characters generated. Confirm a candidate per character to proceed."
                .to_string(),
        })
    }

    async fn run_phase_two(&self, context: ProjectContext) -> Result<String> {
        self.train_stage(&context).await?;

        // Reload so keyframe references see the fine-tunes written above
        let context = self.store.load().await?;
        self.keyframe_stage(&context).await?;
        self.video_stage(&context).await?;
        let final_video = self.concat_stage(&context).await?;

        self.enter_stage(ProjectStatus::Completed, 100);
        info!(final_video = %final_video, "Pipeline completed");
        Ok(final_video)
    }

    /// Parsing stage: text -> characters + ordered scenes
    async fn parse_stage(&self, text: &str) -> Result<()> {
        self.enter_stage(ProjectStatus::Parsing, 10);
        self.set_task("Parsing narrative text");

        let breakdown = self.analyzer.parse_script(text).await?;
        info!(
            characters = breakdown.characters.len(),
            scenes = breakdown.scenes.len(),
            "Parsed narrative"
        );

        self.store
            .commit(ContextUpdate {
                status: Some(ProjectStatus::GeneratingCharacters),
                characters: Some(breakdown.characters),
                scenes: Some(breakdown.scenes),
                ..Default::default()
            })
            .await?;

        self.set_percent(20);
        Ok(())
    }

    /// Character stage: derive a prompt and a fixed-size candidate batch per
    /// character, committed via targeted updates
    async fn character_stage(&self) -> Result<()> {
        self.enter_stage(ProjectStatus::GeneratingCharacters, 20);
        let context = self.store.load().await?;

        for (name, record) in &context.characters {
            self.set_task(format!("Generating character: {}", name));

            let prompt = self.analyzer.character_prompt(&record.description).await?;
            let candidates = self
                .images
                .variants(&prompt, &self.style.model, CANDIDATES_PER_CHARACTER)
                .await?;

            self.store
                .update_character(name, CharacterField::Candidates(candidates))
                .await?;
            self.store
                .update_character(name, CharacterField::Prompt(prompt))
                .await?;
        }

        self.set_percent(30);
        Ok(())
    }

    /// Fine-tune stage: train on each confirmed character's selected image.
    /// Unconfirmed characters are skipped, not an error.
    async fn train_stage(&self, context: &ProjectContext) -> Result<()> {
        self.store
            .commit(ContextUpdate::status(ProjectStatus::TrainingLoras))
            .await?;
        self.enter_stage(ProjectStatus::TrainingLoras, 30);

        for (name, record) in &context.characters {
            let Some(selected) = record.selected_image.clone() else {
                info!(character = %name, "No confirmed image, skipping fine-tune");
                continue;
            };

            self.set_task(format!("Training fine-tune for: {}", name));
            let lora_path = self.trainer.train(&[selected], name).await?;
            self.store
                .update_character(name, CharacterField::LoraPath(lora_path))
                .await?;
        }

        self.set_percent(50);
        Ok(())
    }

    /// Keyframe stage: start/end frame per scene, chaining each scene's end
    /// frame into the next scene's end-frame reference for visual continuity
    async fn keyframe_stage(&self, context: &ProjectContext) -> Result<()> {
        self.store
            .commit(ContextUpdate::status(ProjectStatus::GeneratingKeyframes))
            .await?;
        self.enter_stage(ProjectStatus::GeneratingKeyframes, 50);

        let total = context.scenes.len();
        let mut prev_end_frame: Option<String> = None;

        for (i, scene) in context.scenes.iter().enumerate() {
            self.set_task(format!("Generating keyframes for scene {}/{}", i + 1, total));

            let prompt = self
                .analyzer
                .scene_prompt(&scene.setting, &scene.characters)
                .await?;

            // Likeness bias: the first listed character's fine-tune, else
            // its confirmed image, else nothing
            let character_ref = scene
                .characters
                .first()
                .and_then(|name| context.characters.get(name))
                .and_then(|record| record.reference());

            let start = self
                .images
                .generate(
                    &format!("{} (start)", prompt),
                    character_ref,
                    &self.style.model,
                    None,
                )
                .await?;

            // The previous scene's end frame carries pose continuity into
            // this scene; the character reference is only the fallback
            let end_ref = prev_end_frame.as_deref().or(character_ref);
            let end = self
                .images
                .generate(
                    &format!("{} (end)", prompt),
                    end_ref,
                    &self.style.model,
                    None,
                )
                .await?;

            self.store
                .update_scene(&scene.id, SceneField::StartFrame(start.image_url))
                .await?;
            self.store
                .update_scene(&scene.id, SceneField::EndFrame(end.image_url.clone()))
                .await?;

            prev_end_frame = Some(end.image_url);
        }

        self.set_percent(70);
        Ok(())
    }

    /// Video stage: one clip per scene from its persisted frame pair
    async fn video_stage(&self, context: &ProjectContext) -> Result<()> {
        self.store
            .commit(ContextUpdate::status(ProjectStatus::GeneratingVideos))
            .await?;
        self.enter_stage(ProjectStatus::GeneratingVideos, 70);

        let total = context.scenes.len();

        for (i, scene) in context.scenes.iter().enumerate() {
            self.set_task(format!("Generating video for scene {}/{}", i + 1, total));

            let persisted = self
                .store
                .get_scene(&scene.id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("scene {}", scene.id)))?;

            let start = persisted
                .assets
                .start_frame
                .ok_or_else(|| Error::NotFound(format!("start frame for scene {}", scene.id)))?;
            let end = persisted
                .assets
                .end_frame
                .ok_or_else(|| Error::NotFound(format!("end frame for scene {}", scene.id)))?;

            let clip = self
                .video
                .interpolate(&start, &end, scene.camera.duration_s)
                .await?;

            self.store
                .update_scene(&scene.id, SceneField::VideoMp4(clip))
                .await?;
        }

        self.set_percent(90);
        Ok(())
    }

    /// Concatenation stage: record the deterministic final artifact path and
    /// mark the document completed. Scenes without a clip are excluded.
    async fn concat_stage(&self, context: &ProjectContext) -> Result<String> {
        self.store
            .commit(ContextUpdate::status(ProjectStatus::Concatenating))
            .await?;
        self.enter_stage(ProjectStatus::Concatenating, 90);
        self.set_task("Composing scene videos");

        let current = self.store.load().await?;
        let clips: Vec<String> = context
            .scenes
            .iter()
            .filter_map(|scene| current.scene(&scene.id))
            .filter_map(|scene| scene.assets.video_mp4.clone())
            .collect();

        let final_video = self
            .final_dir
            .join(format!("{}_final.mp4", self.project_id))
            .to_string_lossy()
            .into_owned();

        info!(clips = clips.len(), final_video = %final_video, "Composed final video reference");

        self.store
            .commit(ContextUpdate {
                status: Some(ProjectStatus::Completed),
                final_video: Some(final_video.clone()),
                ..Default::default()
            })
            .await?;

        self.set_percent(95);
        Ok(final_video)
    }

    /// Record a phase failure on the progress cursor and, durably, on the
    /// document, then hand the error back to the caller
    async fn record_failure(&self, err: Error) -> Error {
        let message = err.to_string();
        error!(error = %message, "Pipeline phase failed");

        {
            let mut progress = self.progress.lock().expect("progress lock poisoned");
            progress.error = Some(message.clone());
        }

        if let Err(commit_err) = self.store.commit(ContextUpdate::failed(&message)).await {
            error!(error = %commit_err, "Could not record failure on the project document");
        }

        err
    }

    fn enter_stage(&self, stage: ProjectStatus, percent: u8) {
        let mut progress = self.progress.lock().expect("progress lock poisoned");
        progress.enter_stage(stage, percent);
    }

    fn set_task(&self, task: impl Into<String>) {
        let mut progress = self.progress.lock().expect("progress lock poisoned");
        progress.set_task(task);
    }

    fn set_percent(&self, percent: u8) {
        let mut progress = self.progress.lock().expect("progress lock poisoned");
        progress.percent = percent;
    }
}
