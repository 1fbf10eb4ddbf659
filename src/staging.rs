//! src/staging.rs
//! Scratch directory that holds staged archives until they are bundled.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Owns the scratch directory for one packaging run.
///
/// The directory is removed recursively by [`ScratchDir::remove`] on the
/// success path, or on drop if the run bailed out early.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    /// Creates the scratch directory if absent. An existing one is reused.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path).map_err(|e| Error::fs(&path, e))?;

        let leftovers = fs::read_dir(&path).map_err(|e| Error::fs(&path, e))?.count();
        if leftovers > 0 {
            tracing::warn!(
                "scratch directory {} already holds {} entries; they will be bundled too",
                path.display(),
                leftovers
            );
        }
        tracing::debug!("scratch directory ready at {}", path.display());
        Ok(ScratchDir { path, removed: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory and everything in it.
    pub fn remove(mut self) -> Result<()> {
        self.removed = true;
        fs::remove_dir_all(&self.path).map_err(|e| Error::fs(&self.path, e))?;
        tracing::debug!("removed scratch directory {}", self.path.display());
        Ok(())
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.removed || !self.path.exists() {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.path) {
            tracing::warn!("could not clean up scratch directory {}: {}", self.path.display(), e);
        }
    }
}
