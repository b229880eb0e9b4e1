//! Verification-driven training harness for infrastructure exercises.
//!
//! Exercises are YAML definitions describing an environment (a Docker
//! container stack or a kind cluster with a namespace), a list of automated
//! checks that decide whether the learner solved the task, and optional
//! paid hints. The harness provisions the environment, evaluates the
//! checks against the live state, and persists per-exercise progress.
//!
//! ## Module Structure
//!
//! - `catalog/`: definition files, schema validation, typed exercise model
//! - `environment/`: the two provisioning backends and their shared contract
//! - `checks/`: check engine and the value comparison algebra
//! - `progress`: persisted per-exercise state machine
//! - `lifecycle`: the start/check/stop/reset/hint operations
//! - `runner`: external process boundary (`docker`, `kind`, `kubectl`)

/// Exercise definitions and loading
pub mod catalog;

/// Check engine
pub mod checks;

/// Paths and reserved identifiers
pub mod config;

/// Environment provisioning backends
pub mod environment;

/// Error taxonomy
pub mod error;

/// Lifecycle operations behind the CLI verbs
pub mod lifecycle;

/// Persisted progress document
pub mod progress;

/// External process execution
pub mod runner;

/// Small filesystem and parsing helpers
pub mod util;

pub use catalog::{Catalog, CatalogEntry};
pub use checks::{CheckEngine, CheckResult};
pub use config::GymConfig;
pub use error::{GymError, Result};
pub use lifecycle::{Gym, HintOutcome, ResetOptions, StartOptions};
pub use runner::{ProcessRunner, SystemRunner};
