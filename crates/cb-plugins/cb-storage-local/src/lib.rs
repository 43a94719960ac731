//! # cb-storage-local
//! Local filesystem implementation of `MediaStore`.
//! Objects keep their upload name and land in a directory sharded by the
//! SHA-256 of that name, so one folder never collects every upload.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use cb_core::{AppError, MediaStore, Result};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g., "./data/media")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/media")
    url_prefix: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root_path: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// "ab/cd" for a name whose digest starts with "abcd".
    fn shard(name: &str) -> String {
        let digest = hex::encode(Sha256::digest(name.as_bytes()));
        format!("{}/{}", &digest[0..2], &digest[2..4])
    }

    fn object_path(&self, shard: &str, name: &str) -> PathBuf {
        let mut path = self.root_path.clone();
        path.extend(shard.split('/'));
        path.push(name);
        path
    }

    /// Names are single plain file names; anything path-like is refused.
    fn check_name(name: &str) -> Result<()> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(()),
            _ => Err(AppError::validation(format!("invalid media object name: {name:?}"))),
        }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(&self, name: &str, data: Vec<u8>, content_type: &str) -> Result<String> {
        Self::check_name(name)?;
        let shard = Self::shard(name);
        let target = self.object_path(&shard, name);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Unavailable(format!("media directory: {e}")))?;
        }
        if fs::try_exists(&target).await.unwrap_or(false) {
            return Err(AppError::Conflict(format!("media object {name} already exists")));
        }
        fs::write(&target, &data)
            .await
            .map_err(|e| AppError::Unavailable(format!("media write {name}: {e}")))?;

        debug!(name, content_type, bytes = data.len(), "media stored");
        Ok(format!("{}/{}/{}", self.url_prefix, shard, name))
    }
}
