//! Persisted progress
//!
//! One YAML document holds the status of every exercise the user has
//! touched. Every mutation is a whole-document read-modify-write through
//! [`ProgressStore`]; a missing file reads as empty, a file that fails to
//! parse is a hard error rather than a silent restart from zero.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GymError, Result};

pub const PROGRESS_VERSION: u32 = 1;

/// Lifecycle state of one exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseState {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Stopped,
}

/// Per-exercise record as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseStatus {
    #[serde(default)]
    pub status: ExerciseState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// Written by older harness versions; carried through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub hints_used: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub resets: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub score: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// The whole progress document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressFile {
    pub version: u32,
    #[serde(default)]
    pub exercises: BTreeMap<String, ExerciseStatus>,
}

impl Default for ProgressFile {
    fn default() -> Self {
        ProgressFile {
            version: PROGRESS_VERSION,
            exercises: BTreeMap::new(),
        }
    }
}

impl ProgressFile {
    pub fn status(&self, exercise: &str) -> ExerciseStatus {
        self.exercises.get(exercise).cloned().unwrap_or_default()
    }
}

/// Read-modify-write access to the progress document.
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ProgressStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ProgressFile> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ProgressFile::default());
            }
            Err(e) => return Err(GymError::Io(e)),
        };
        let mut file: ProgressFile =
            serde_yaml::from_str(&data).map_err(|e| GymError::ProgressCorrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        if file.version == 0 {
            file.version = PROGRESS_VERSION;
        }
        Ok(file)
    }

    pub fn save(&self, file: &ProgressFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_yaml::to_string(file).map_err(|e| GymError::ProgressCorrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }

    /// Transition to in-progress. A fresh start zeroes the hint and reset
    /// counters; resuming a stopped or completed exercise keeps them.
    pub fn mark_started(&self, exercise: &str) -> Result<()> {
        self.update(exercise, |entry| {
            if entry.status == ExerciseState::NotStarted {
                entry.started_at = Some(now_rfc3339());
                entry.hints_used = 0;
                entry.resets = 0;
            }
            entry.status = ExerciseState::InProgress;
        })
    }

    pub fn mark_completed(&self, exercise: &str, score: u32) -> Result<()> {
        self.update(exercise, |entry| {
            entry.status = ExerciseState::Completed;
            entry.completed_at = Some(now_rfc3339());
            entry.score = score;
        })
    }

    /// Stop keeps `started_at` so elapsed time stays meaningful on resume.
    pub fn mark_stopped(&self, exercise: &str) -> Result<()> {
        self.update(exercise, |entry| {
            entry.status = ExerciseState::Stopped;
        })
    }

    pub fn mark_reset(&self, exercise: &str) -> Result<()> {
        self.update(exercise, |entry| {
            entry.resets += 1;
            entry.status = ExerciseState::InProgress;
            entry.started_at = Some(now_rfc3339());
        })
    }

    /// Record how many hints have been revealed in total.
    pub fn record_hints(&self, exercise: &str, used: u32) -> Result<()> {
        self.update(exercise, |entry| {
            entry.hints_used = used;
        })
    }

    fn update(&self, exercise: &str, apply: impl FnOnce(&mut ExerciseStatus)) -> Result<()> {
        let mut file = self.load()?;
        let entry = file.exercises.entry(exercise.to_string()).or_default();
        apply(entry);
        debug!(exercise, status = ?entry.status, "progress updated");
        self.save(&file)
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
