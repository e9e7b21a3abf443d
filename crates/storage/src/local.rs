//! Filesystem-backed object store for local runs.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use pipeline_core::{Error, ObjectStore, Result};
use tracing::debug;

/// Stores objects at `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let relative = Path::new(bucket).join(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || bucket.is_empty() || key.is_empty() {
            return Err(Error::object_store(format!(
                "invalid object location {}/{}",
                bucket, key
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get_text(&self, bucket: &str, key: &str) -> Result<String> {
        let path = self.path_for(bucket, key)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            Error::object_store(format!("read {} failed: {}", path.display(), e))
        })?;

        String::from_utf8(bytes)
            .map_err(|e| Error::tabular(format!("{} is not valid UTF-8: {}", path.display(), e)))
    }

    async fn put(&self, bucket: &str, key: &str, body: Bytes, _content_type: &str) -> Result<()> {
        let path = self.path_for(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::object_store(format!("create {} failed: {}", parent.display(), e))
            })?;
        }

        tokio::fs::write(&path, &body).await.map_err(|e| {
            Error::object_store(format!("write {} failed: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), bytes = body.len(), "Stored object");
        Ok(())
    }

    fn location(&self, bucket: &str, key: &str) -> String {
        format!("file://{}", self.root.join(bucket).join(key).display())
    }
}
