//! Exercise catalog
//!
//! Loads exercise definitions from a directory tree into an in-memory
//! registry keyed by name. Load order per file: read raw text, validate
//! against the fixed schema, then decode into the typed model. Loading is
//! fail-fast: one invalid definition aborts the whole catalog.

pub mod schema;
pub mod types;
pub mod wire;

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{GymError, Result};
use types::ExerciseDefinition;

/// File name the catalog walk looks for.
pub const DEFINITION_FILE: &str = "exercise.yaml";

/// A loaded definition with its source location. The directory anchors
/// relative references: manifests, build contexts, copy sources, hint files.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub exercise: ExerciseDefinition,
    pub path: PathBuf,
    pub dir: PathBuf,
}

/// In-memory registry of exercise definitions.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Walk `root` and load every definition file found.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let meta = std::fs::metadata(root).map_err(|e| GymError::CatalogIo {
            path: root.to_path_buf(),
            source: e,
        })?;
        if !meta.is_dir() {
            return Err(GymError::CatalogIo {
                path: root.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            });
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| GymError::CatalogIo {
                path: root.to_path_buf(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() || entry.file_name() != DEFINITION_FILE {
                continue;
            }

            let path = entry.path().to_path_buf();
            let exercise = load_definition_file(&path)?;
            debug!(name = %exercise.name, path = %path.display(), "loaded exercise");
            entries.push(CatalogEntry {
                exercise,
                dir: path.parent().expect("definition file has a parent").into(),
                path,
            });
        }

        Ok(Self { entries })
    }

    /// Linear scan by exercise name. Catalogs are small.
    pub fn find(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.exercise.name == name)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Load a single definition file: validate first, decode second.
pub fn load_definition_file(path: &Path) -> Result<ExerciseDefinition> {
    let raw_text = std::fs::read_to_string(path).map_err(|e| GymError::CatalogIo {
        path: path.to_path_buf(),
        source: e,
    })?;

    let doc: serde_json::Value =
        serde_yaml::from_str(&raw_text).map_err(|e| GymError::DefinitionInvalid {
            path: path.to_path_buf(),
            reasons: vec![format!("not valid yaml: {e}")],
        })?;

    let violations = schema::validate_document(&doc);
    if !violations.is_empty() {
        return Err(GymError::DefinitionInvalid {
            path: path.to_path_buf(),
            reasons: violations,
        });
    }

    let raw: wire::RawExercise =
        serde_yaml::from_str(&raw_text).map_err(|e| GymError::DefinitionInvalid {
            path: path.to_path_buf(),
            reasons: vec![format!("decode: {e}")],
        })?;

    types::from_wire(&raw).map_err(|reasons| GymError::DefinitionInvalid {
        path: path.to_path_buf(),
        reasons,
    })
}
