use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::{debug, info};

/// Scratch directory for audit copies of downloaded and corrected files.
/// Never a correctness dependency: the pipeline output goes to the bucket,
/// this is purely for debugging. The directory is removed on drop unless the
/// caller asked to keep it.
pub struct DebugCache {
    dir: Option<CacheDir>,
}

enum CacheDir {
    Scratch(TempDir),
    Kept(PathBuf),
}

impl CacheDir {
    fn path(&self) -> &Path {
        match self {
            CacheDir::Scratch(dir) => dir.path(),
            CacheDir::Kept(path) => path,
        }
    }
}

impl DebugCache {
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn new(keep: bool) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("scoutsheet-")
            .tempdir()
            .context("failed to create cache directory")?;
        let dir = if keep {
            let path = scratch.keep();
            info!(path = %path.display(), "cache directory will be kept after the run");
            CacheDir::Kept(path)
        } else {
            CacheDir::Scratch(scratch)
        };
        Ok(Self { dir: Some(dir) })
    }

    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(CacheDir::path)
    }

    /// Writes one audit copy. Object keys become flat file names so nested
    /// prefixes cannot escape the cache directory.
    pub fn save(&self, key: &str, contents: &[u8]) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let file_name = key.replace(['/', '\\'], "__");
        let path = dir.path().join(file_name);
        fs::write(&path, contents)
            .with_context(|| format!("failed to write cache file {}", path.display()))?;
        debug!(path = %path.display(), "wrote cache copy");
        Ok(())
    }
}
