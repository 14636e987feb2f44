//! Durable, versioned context store for one project.
//!
//! The live document lives at `<projects>/<project_id>.json`; immutable
//! pre-mutation snapshots at `<projects>/history/<project_id>/v<N>.json`.
//! Snapshot `v` captures the document while its version was still `v`, so
//! rolling back to `v` reproduces the exact pre-image of the mutation that
//! produced `v + 1`.
//!
//! Every read-modify-write runs under a per-project advisory file lock, so
//! two processes mutating the same project id cannot interleave version
//! bumps.

use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use tokio::fs;
use tracing::debug;

use crate::domain::{
    CharacterField, CharacterRecord, ContextUpdate, ProjectContext, SceneField, SceneRecord,
    StyleConfig,
};
use crate::error::{Error, Result};

/// File-based store for one project's versioned document
pub struct ContextStore {
    project_id: String,

    /// Path to the live document
    context_path: PathBuf,

    /// Directory holding version-addressed snapshots
    history_dir: PathBuf,

    /// Advisory lock file guarding mutations
    lock_path: PathBuf,
}

/// Exclusive per-project lock, released on drop
struct ProjectLock {
    file: std::fs::File,
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl ContextStore {
    /// Create or open the store for a project under the configured home
    pub async fn open(project_id: &str) -> Result<Self> {
        let projects_dir = crate::config::projects_dir()
            .map_err(|e| Error::Validation {
                service: "config".to_string(),
                reason: e.to_string(),
            })?;
        Self::open_in(&projects_dir, project_id).await
    }

    /// Create or open the store rooted at an explicit projects directory
    pub async fn open_in(projects_dir: &Path, project_id: &str) -> Result<Self> {
        let history_dir = projects_dir.join("history").join(project_id);

        // Lazy, idempotent directory creation on first access
        fs::create_dir_all(&history_dir).await?;

        Ok(Self {
            project_id: project_id.to_string(),
            context_path: projects_dir.join(format!("{}.json", project_id)),
            history_dir,
            lock_path: projects_dir
                .join("history")
                .join(project_id)
                .join(".lock"),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Path to the live document
    pub fn context_path(&self) -> &Path {
        &self.context_path
    }

    /// Path of the snapshot for a given version
    pub fn snapshot_path(&self, version: u64) -> PathBuf {
        self.history_dir.join(format!("v{}.json", version))
    }

    /// Create the version-1 document for this project.
    ///
    /// Fails with `AlreadyExists` if a live document is already present.
    /// No snapshot is written (there is no pre-image to capture).
    pub async fn initialize(
        &self,
        source_text: &str,
        style: StyleConfig,
    ) -> Result<ProjectContext> {
        let _lock = self.acquire_lock().await?;

        if fs::try_exists(&self.context_path).await? {
            return Err(Error::AlreadyExists(self.project_id.clone()));
        }

        let context =
            ProjectContext::new(self.project_id.clone(), source_text.to_string(), style);
        self.save(&context).await?;

        debug!(project_id = %self.project_id, "Initialized project context");
        Ok(context)
    }

    /// Load the live document
    pub async fn load(&self) -> Result<ProjectContext> {
        if !fs::try_exists(&self.context_path).await? {
            return Err(Error::NotFound(format!("project {}", self.project_id)));
        }

        let raw = fs::read_to_string(&self.context_path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Apply a top-level update: snapshot the current version, merge the
    /// update, bump the version, persist.
    ///
    /// The whole commit is atomic from a reader's point of view: the new
    /// document is written to a temp sibling and renamed into place.
    pub async fn commit(&self, update: ContextUpdate) -> Result<ProjectContext> {
        let _lock = self.acquire_lock().await?;

        let mut context = self.load().await?;
        self.snapshot(&context).await?;

        if let Some(status) = update.status {
            context.status = status;
        }
        if let Some(error) = update.error {
            context.error = Some(error);
        }
        if let Some(characters) = update.characters {
            // Shallow merge: listed names are replaced, others survive
            context.characters.extend(characters);
        }
        if let Some(scenes) = update.scenes {
            context.scenes = scenes;
        }
        if let Some(final_video) = update.final_video {
            context.final_video = Some(final_video);
        }

        self.bump_and_save(&mut context).await?;
        Ok(context)
    }

    /// Targeted single-field write to one character record.
    ///
    /// Creates the record if the character is new. Bumps the version but
    /// deliberately skips the snapshot: this is the lightweight path for
    /// high-frequency per-item writes, asymmetric with `commit`.
    pub async fn update_character(
        &self,
        name: &str,
        field: CharacterField,
    ) -> Result<ProjectContext> {
        let _lock = self.acquire_lock().await?;

        let mut context = self.load().await?;
        let record = context.characters.entry(name.to_string()).or_default();
        field.apply(record);

        self.bump_and_save(&mut context).await?;
        Ok(context)
    }

    /// Targeted single-field write to one scene, found by id.
    ///
    /// Same no-snapshot contract as `update_character`. Fails with
    /// `NotFound` if the scene id does not exist.
    pub async fn update_scene(&self, scene_id: &str, field: SceneField) -> Result<ProjectContext> {
        let _lock = self.acquire_lock().await?;

        let mut context = self.load().await?;
        let scene = context
            .scene_mut(scene_id)
            .ok_or_else(|| Error::NotFound(format!("scene {}", scene_id)))?;
        field.apply(scene);

        self.bump_and_save(&mut context).await?;
        Ok(context)
    }

    /// Point lookup of one character; absent is not an error
    pub async fn get_character(&self, name: &str) -> Result<Option<CharacterRecord>> {
        let context = self.load().await?;
        Ok(context.characters.get(name).cloned())
    }

    /// Point lookup of one scene; absent is not an error
    pub async fn get_scene(&self, scene_id: &str) -> Result<Option<SceneRecord>> {
        let context = self.load().await?;
        Ok(context.scene(scene_id).cloned())
    }

    /// Replace the live document with the snapshot for `version`.
    ///
    /// The rollback itself is not snapshotted, and later snapshots are left
    /// in place as orphaned history. Snapshots are addressed by their own
    /// version number, so rolling back repeatedly is always possible.
    pub async fn rollback(&self, version: u64) -> Result<ProjectContext> {
        let _lock = self.acquire_lock().await?;

        let snapshot = self.snapshot_path(version);
        if !fs::try_exists(&snapshot).await? {
            return Err(Error::NotFound(format!(
                "snapshot v{} for project {}",
                version, self.project_id
            )));
        }

        fs::copy(&snapshot, &self.context_path).await?;
        debug!(project_id = %self.project_id, version, "Rolled back project context");
        self.load().await
    }

    /// Acquire the per-project lock. `lock_exclusive` blocks the calling
    /// thread under cross-process contention, so it runs on the blocking
    /// pool instead of a runtime worker.
    async fn acquire_lock(&self) -> Result<ProjectLock> {
        let lock_path = self.lock_path.clone();
        let file = tokio::task::spawn_blocking(move || {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(&lock_path)?;
            file.lock_exclusive()?;
            Ok::<_, std::io::Error>(file)
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        Ok(ProjectLock { file })
    }

    /// Write the pre-mutation snapshot, addressed by the current version
    async fn snapshot(&self, context: &ProjectContext) -> Result<()> {
        let path = self.snapshot_path(context.meta.version);
        let json = serde_json::to_string_pretty(context)?;
        fs::write(&path, json).await?;
        Ok(())
    }

    async fn bump_and_save(&self, context: &mut ProjectContext) -> Result<()> {
        context.meta.version += 1;
        context.meta.updated_at = Some(Utc::now());
        self.save(context).await
    }

    /// Persist the live document via temp-file-and-rename so readers never
    /// observe a torn write
    async fn save(&self, context: &ProjectContext) -> Result<()> {
        let json = serde_json::to_string_pretty(context)?;
        let tmp = self.context_path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.context_path).await?;
        Ok(())
    }
}
