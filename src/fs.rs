//! Filesystem collaborators
//!
//! The core never touches the filesystem directly. Validators ask a
//! [`PathOracle`] whether referenced files exist, and rendered artifacts are
//! handed to an [`ArtifactWriter`].

use crate::error::Result;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Answers whether a referenced path exists
pub trait PathOracle: fmt::Debug + Send + Sync {
    /// Check that `path` exists
    fn exists(&self, path: &Path) -> bool;
}

/// Path oracle backed by the real filesystem
#[derive(Debug, Clone, Default)]
pub struct FsPathOracle {
    /// Directory that relative paths are resolved against
    base_dir: Option<PathBuf>,
}

impl FsPathOracle {
    /// Create an oracle resolving relative paths against the process cwd
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `base_dir`
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }
}

impl PathOracle for FsPathOracle {
    fn exists(&self, path: &Path) -> bool {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path).exists(),
            _ => path.exists(),
        }
    }
}

/// Path oracle over a fixed set of paths
#[derive(Debug, Clone, Default)]
pub struct StaticPathOracle {
    paths: HashSet<PathBuf>,
    allow_all: bool,
}

impl StaticPathOracle {
    /// Create an oracle that knows exactly `paths`
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            allow_all: false,
        }
    }

    /// Create an oracle that reports every path as present
    pub fn allow_all() -> Self {
        Self {
            paths: HashSet::new(),
            allow_all: true,
        }
    }
}

impl PathOracle for StaticPathOracle {
    fn exists(&self, path: &Path) -> bool {
        self.allow_all || self.paths.contains(path)
    }
}

/// Persists rendered artifacts
pub trait ArtifactWriter {
    /// Write `content` to `path`
    fn write(&self, path: &Path, content: &str) -> Result<()>;
}

/// Artifact writer backed by the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArtifactWriter;

impl ArtifactWriter for FsArtifactWriter {
    fn write(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        tracing::debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fs_oracle_resolves_relative_to_base() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("db.env"), "A=1").unwrap();

        let oracle = FsPathOracle::with_base_dir(dir.path());
        assert!(oracle.exists(Path::new("db.env")));
        assert!(!oracle.exists(Path::new("missing.env")));
        assert!(oracle.exists(&dir.path().join("db.env")));
    }

    #[test]
    fn test_static_oracle() {
        let oracle = StaticPathOracle::new(["./secrets/db.txt"]);
        assert!(oracle.exists(Path::new("./secrets/db.txt")));
        assert!(!oracle.exists(Path::new("./secrets/other.txt")));
        assert!(StaticPathOracle::allow_all().exists(Path::new("/anything")));
    }

    #[test]
    fn test_fs_writer_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("compose.yaml");

        FsArtifactWriter.write(&path, "services:\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "services:\n");
    }
}
