//! Landing storage
//!
//! Where ingested source files are written. Every successful write emits a
//! storage-change notification, which is what drives the pipeline.

use async_trait::async_trait;
use sluice_core::domain::event::{StorageEvent, StorageEventType};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    #[error("failed to write '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Object store for the landing area
#[async_trait]
pub trait LandingStore: Send + Sync {
    /// Bucket the store writes into
    fn bucket(&self) -> &str;

    /// Writes `body` under `key`, replacing any existing object
    async fn put_object(&self, key: &str, body: &[u8]) -> Result<(), StorageError>;
}

/// Filesystem-backed landing store
///
/// Objects live at `<root>/<bucket>/<key>`.
pub struct FsLandingStore {
    root: PathBuf,
    bucket: String,
    notifier: Option<mpsc::Sender<StorageEvent>>,
}

impl FsLandingStore {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
            notifier: None,
        }
    }

    /// Emits a `Created` storage event on `notifier` after each write
    pub fn with_notifier(mut self, notifier: mpsc::Sender<StorageEvent>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Filesystem path of `key`
    pub fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(&self.bucket).join(relative))
    }
}

#[async_trait]
impl LandingStore for FsLandingStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(&self, key: &str, body: &[u8]) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        let io_error = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(&path, body).await.map_err(io_error)?;
        debug!("Wrote {} byte(s) to {}", body.len(), path.display());

        if let Some(notifier) = &self.notifier {
            let event = StorageEvent::new(&self.bucket, key, StorageEventType::Created);
            if notifier.send(event).await.is_err() {
                warn!(
                    "Storage notification for '{}' dropped, no dispatcher listening",
                    key
                );
            }
        }

        Ok(())
    }
}
