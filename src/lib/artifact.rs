// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::fetch::write_file;
use crate::{ErrorKind, EucanetdError};

/// Directory of JSON documents a driver renders its artifacts into.
///
/// Each artifact is replaced atomically through a temporary file persisted
/// over the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.as_path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub async fn prepare(&self) -> Result<(), EucanetdError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            EucanetdError::new(
                ErrorKind::DriverFailure,
                format!("Failed to create {}: {e}", self.dir.display()),
            )
        })
    }

    pub async fn exists(&self, name: &str) -> bool {
        tokio::fs::metadata(self.path(name)).await.is_ok()
    }

    pub async fn write<T: Serialize + Sync>(
        &self,
        name: &str,
        content: &T,
    ) -> Result<(), EucanetdError> {
        let data = serde_json::to_vec_pretty(content)?;
        let path = self.path(name);
        let target = path.clone();
        let result = tokio::task::spawn_blocking(move || {
            write_file(&target, &data, 0o644)
        })
        .await
        .map_err(std::io::Error::other)
        .and_then(|r| r);
        if let Err(e) = result {
            return Err(EucanetdError::new(
                ErrorKind::ApplyFailure,
                format!("Failed to write {}: {e}", path.display()),
            ));
        }
        log::debug!("Artifact {} updated", path.display());
        Ok(())
    }

    pub async fn read<T: DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Option<T>, EucanetdError> {
        match tokio::fs::read(self.path(name)).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns whether the artifact existed.
    pub async fn remove(&self, name: &str) -> Result<bool, EucanetdError> {
        match tokio::fs::remove_file(self.path(name)).await {
            Ok(()) => {
                log::debug!("Artifact {} removed", self.path(name).display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(EucanetdError::new(
                ErrorKind::ApplyFailure,
                format!("Failed to remove {}: {e}", self.path(name).display()),
            )),
        }
    }

    /// Names of the artifacts currently present
    pub async fn list(&self) -> Result<Vec<String>, EucanetdError> {
        let mut ret = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ret);
            }
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(name) = name.strip_suffix(".json") {
                if !name.starts_with('.') {
                    ret.push(name.to_string());
                }
            }
        }
        ret.sort();
        Ok(ret)
    }
}
