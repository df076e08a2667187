//! Authentication artefacts removed on shutdown.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Credential material the server must delete when it stops.
pub trait AuthArtifact: Send + Sync {
    /// Deletes the artefact. Missing artefacts count as removed.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error when deletion fails.
    fn remove(&self) -> io::Result<()>;
}

/// Cookie file in the runtime directory.
#[derive(Debug, Clone)]
pub struct CookieFile {
    path: PathBuf,
}

impl CookieFile {
    /// Wraps the cookie at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cookie location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuthArtifact for CookieFile {
    fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
