//! Episode publication: artifact storage, then the episode record.
//!
//! Stored artifacts are laid out by date under the storage root:
//!
//! ```text
//! storage_root/
//! └── podcast/
//!     └── 2025/
//!         └── 05/
//!             └── 06/
//!                 ├── 07-30-12.mp3
//!                 └── 07-30-12_1.mp3
//! ```
//!
//! The local artifact is dropped (and so deleted) once storage succeeds. When
//! the upload fails it is retained so an operator can recover it by hand.

use crate::audio::assemble::LocalArtifact;
use crate::error::PublishFailure;
use crate::models::Episode;
use crate::store::EpisodeStore;
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{error, info, instrument, warn};

/// Where finished artifacts go.
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    /// Store the file at `local` and return the opaque stored path.
    /// `index` disambiguates several uploads within the same second.
    async fn upload(&self, local: &Path, index: Option<usize>) -> Result<String, PublishFailure>;
}

/// Stored path relative to the storage root.
pub fn stored_relative_path(now: NaiveDateTime, index: Option<usize>) -> PathBuf {
    let file_name = match index {
        Some(i) => format!("{}_{}.mp3", now.format("%H-%M-%S"), i),
        None => format!("{}.mp3", now.format("%H-%M-%S")),
    };
    PathBuf::from("podcast")
        .join(now.format("%Y").to_string())
        .join(now.format("%m").to_string())
        .join(now.format("%d").to_string())
        .join(file_name)
}

/// Copies artifacts into a directory tree, usually a mounted share.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    root: Option<PathBuf>,
}

impl DirectoryStorage {
    /// `None` disables storage: every upload fails with
    /// [`PublishFailure::StorageDisabled`].
    pub fn new(root: Option<PathBuf>) -> Self {
        if root.is_none() {
            warn!("No storage directory configured; uploads will fail");
        }
        Self { root }
    }

    /// Free destination for `relative`, suffixing `-1`, `-2`, ... on collision.
    async fn free_destination(root: &Path, relative: &Path) -> PathBuf {
        let first = root.join(relative);
        if !fs::try_exists(&first).await.unwrap_or(false) {
            return first;
        }
        let stem = relative
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut n = 1;
        loop {
            let candidate = first.with_file_name(format!("{stem}-{n}.mp3"));
            if !fs::try_exists(&candidate).await.unwrap_or(false) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[async_trait]
impl ArtifactStorage for DirectoryStorage {
    #[instrument(level = "info", skip_all, fields(local = %local.display()))]
    async fn upload(&self, local: &Path, index: Option<usize>) -> Result<String, PublishFailure> {
        let root = self.root.as_ref().ok_or(PublishFailure::StorageDisabled)?;
        let relative = stored_relative_path(Local::now().naive_local(), index);
        let dest = Self::free_destination(root, &relative).await;

        if let Some(dir) = dest.parent() {
            if let Err(e) = fs::create_dir_all(dir).await {
                error!(dir = %dir.display(), error = %e, "Failed to create storage dir");
                return Err(PublishFailure::Upload(e.to_string()));
            }
        }
        let bytes = fs::copy(local, &dest)
            .await
            .map_err(|e| PublishFailure::Upload(e.to_string()))?;
        info!(dest = %dest.display(), bytes, "Artifact stored");
        Ok(dest.display().to_string())
    }
}

/// Uploads an artifact and records the episode.
#[derive(Clone)]
pub struct Publisher {
    storage: Arc<dyn ArtifactStorage>,
    store: Arc<dyn EpisodeStore>,
}

impl Publisher {
    pub fn new(storage: Arc<dyn ArtifactStorage>, store: Arc<dyn EpisodeStore>) -> Self {
        Self { storage, store }
    }

    /// Publish `episode`, whose audio is `file`. Returns the stored path.
    ///
    /// Upload failure keeps the local file; any other outcome removes it.
    #[instrument(level = "info", skip_all, fields(title = %episode.title, link = %episode.link))]
    pub async fn publish(
        &self,
        episode: &Episode,
        file: LocalArtifact,
        index: Option<usize>,
    ) -> Result<String, PublishFailure> {
        let stored_path = match self.storage.upload(file.path(), index).await {
            Ok(path) => path,
            Err(e) => {
                let kept = file.retain();
                error!(error = %e, kept = %kept.display(), "Upload failed; local artifact kept");
                return Err(e);
            }
        };
        drop(file);

        self.store.insert_episode(episode, &stored_path).await?;
        info!(
            %stored_path,
            local = %episode.artifact_path.display(),
            size_bytes = episode.size_bytes,
            duration_ms = episode.duration_ms,
            "Episode published"
        );
        Ok(stored_path)
    }
}
