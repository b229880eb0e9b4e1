//! Harness configuration
//!
//! All paths the harness touches are carried in one value and threaded into
//! the catalog, provisioner and progress store constructors. Nothing here is
//! process-global.

use std::path::{Path, PathBuf};

use crate::error::{GymError, Result};

/// Reserved cluster name for the cluster-namespace backend. Clusters are
/// exercise-scoped and never reused, so one name is enough.
pub const RESERVED_CLUSTER_NAME: &str = "opsgym";

/// Compose project name for the container-stack backend.
pub const RESERVED_STACK_PROJECT: &str = "opsgym";

/// Harness paths and defaults
#[derive(Debug, Clone)]
pub struct GymConfig {
    /// Root directory containing exercise definitions
    pub exercises_dir: PathBuf,
    /// Persisted progress document
    pub progress_path: PathBuf,
    /// Current-exercise pointer file (last-writer-wins)
    pub current_path: PathBuf,
    /// Parent of per-exercise work directories
    pub work_root: PathBuf,
}

impl GymConfig {
    /// Build a config rooted under `base` (normally `~/.opsgym`).
    pub fn rooted_at(base: impl AsRef<Path>, exercises_dir: PathBuf) -> Self {
        let base = base.as_ref();
        Self {
            exercises_dir,
            progress_path: base.join("progress.yaml"),
            current_path: base.join("current"),
            work_root: base.join("work"),
        }
    }

    /// Resolve the exercises directory and assemble the default config.
    ///
    /// Resolution order: explicit override, `./exercises` (development),
    /// `~/.opsgym/exercises`.
    pub fn resolve(exercises_override: Option<PathBuf>) -> Result<Self> {
        let base = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".opsgym");

        if let Some(dir) = exercises_override {
            let meta = std::fs::metadata(&dir).map_err(|e| GymError::CatalogIo {
                path: dir.clone(),
                source: e,
            })?;
            if !meta.is_dir() {
                return Err(GymError::CatalogIo {
                    path: dir,
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "not a directory",
                    ),
                });
            }
            return Ok(Self::rooted_at(&base, dir));
        }

        let local = PathBuf::from("exercises");
        if local.is_dir() {
            return Ok(Self::rooted_at(&base, local));
        }

        let user = base.join("exercises");
        if user.is_dir() {
            return Ok(Self::rooted_at(&base, user));
        }

        Err(GymError::CatalogIo {
            path: user,
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no exercises directory found; pass --exercises-dir or install to ~/.opsgym/exercises",
            ),
        })
    }

    /// Per-exercise scratch directory where staged files land and relative
    /// check paths resolve.
    pub fn work_dir(&self, exercise: &str) -> PathBuf {
        self.work_root.join(exercise)
    }
}
