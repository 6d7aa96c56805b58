// SPDX-License-Identifier: Apache-2.0

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;

use crate::{ConfigValues, ErrorKind, EucanetdError};

const FILE_URI_PREFIX: &str = "file://";

/// Keeps a private copy of a remote (currently `file://` only) document.
///
/// The private copy is replaced atomically so readers never observe a
/// partially written document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicFile {
    source: PathBuf,
    dest: PathBuf,
}

impl AtomicFile {
    pub fn new(source_uri: &str, dest: &Path) -> Self {
        let source = source_uri.strip_prefix(FILE_URI_PREFIX).unwrap_or(source_uri);
        Self {
            source: PathBuf::from(source),
            dest: dest.to_path_buf(),
        }
    }

    pub fn source(&self) -> &Path {
        self.source.as_path()
    }

    pub fn dest(&self) -> &Path {
        self.dest.as_path()
    }

    /// Refresh the private copy, returning whether its content changed.
    pub fn get(&self) -> Result<bool, EucanetdError> {
        let new_content = std::fs::read(&self.source).map_err(|e| {
            EucanetdError::new(
                ErrorKind::TransientInput,
                format!("Failed to read {}: {e}", self.source.display()),
            )
        })?;
        if let Ok(old_content) = std::fs::read(&self.dest) {
            if old_content == new_content {
                return Ok(false);
            }
        }
        if let Err(e) = write_file(&self.dest, &new_content, 0o644) {
            return Err(EucanetdError::new(
                ErrorKind::TransientInput,
                format!(
                    "Failed to update {} from {}: {e}",
                    self.dest.display(),
                    self.source.display()
                ),
            ));
        }
        log::debug!(
            "{} changed, copied into {}",
            self.source.display(),
            self.dest.display()
        );
        Ok(true)
    }
}

/// Replace `path` with `content` and permission `mode` through a temporary
/// file in the same directory, readers see either the old or new content.
pub fn write_file(
    path: &Path,
    content: &[u8],
    mode: u32,
) -> Result<(), std::io::Error> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.as_file()
        .set_permissions(std::fs::Permissions::from_mode(mode))?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Detects modifications of eucalyptus.conf by its modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFileWatcher {
    path: PathBuf,
    mtime: Option<SystemTime>,
}

impl ConfigFileWatcher {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            mtime: None,
        }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    fn current_mtime(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
    }

    /// Read the file regardless of modification, remembering its mtime
    pub fn read(&mut self) -> Result<ConfigValues, EucanetdError> {
        let mtime = self.current_mtime();
        let values = ConfigValues::from_file(&self.path)?;
        self.mtime = mtime;
        Ok(values)
    }

    /// `None` when the file is unchanged since the last read.
    pub fn read_if_modified(
        &mut self,
    ) -> Result<Option<ConfigValues>, EucanetdError> {
        let mtime = self.current_mtime();
        if mtime.is_some() && mtime == self.mtime {
            return Ok(None);
        }
        if mtime.is_none() && self.mtime.is_none() {
            return Ok(None);
        }
        log::info!("{} changed, reloading", self.path.display());
        self.read().map(Some)
    }
}
