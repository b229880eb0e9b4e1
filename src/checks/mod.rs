//! Exercise verification: the check engine and its comparison algebra.

pub mod compare;
pub mod engine;

pub use engine::{CheckEngine, CheckResult};
