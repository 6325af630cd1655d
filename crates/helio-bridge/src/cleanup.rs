//! Scratch directory and temporary request files.
//!
//! Every request file is owned by a [`TempArtifact`]. Releasing the
//! artifact, or dropping it on an error path or a cancelled call, deletes
//! the file.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, warn};

use crate::registry::CommandFamily;

const TOKEN_LEN: usize = 12;

/// Directory where request files are written.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Use `path` as the scratch directory. It is created on first use.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A `helio-bridge` directory under the system temp dir.
    #[must_use]
    pub fn system_default() -> Self {
        Self::new(std::env::temp_dir().join("helio-bridge"))
    }

    /// The directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `contents` to a new `<family>_request_<token>.json` file.
    ///
    /// The file is created exclusively with a random token, so concurrent
    /// requests never share a path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub fn create_artifact(
        &self,
        family: CommandFamily,
        contents: &[u8],
    ) -> io::Result<TempArtifact> {
        std::fs::create_dir_all(&self.path)?;

        let prefix = format!("{}_request_", family.as_str());
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".json")
            .rand_bytes(TOKEN_LEN)
            .tempfile_in(&self.path)?;

        file.write_all(contents)?;
        file.flush()?;

        // Close our handle so the engine can open the file on every platform.
        let path = file.into_temp_path();
        debug!(path = %path.display(), bytes = contents.len(), "Wrote request file");

        Ok(TempArtifact { path: Some(path) })
    }
}

/// A temporary request file that is deleted when released or dropped.
#[derive(Debug)]
pub struct TempArtifact {
    path: Option<TempPath>,
}

impl TempArtifact {
    /// Path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Delete the file now.
    pub fn release(mut self) {
        self.delete();
    }

    fn delete(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        let shown = path.display().to_string();
        match path.close() {
            Ok(()) => debug!(path = %shown, "Removed request file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {},
            Err(e) => warn!(path = %shown, error = %e, "Failed to remove request file"),
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        self.delete();
    }
}
