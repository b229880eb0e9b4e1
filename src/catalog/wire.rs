//! Flat wire model for exercise definition files
//!
//! The on-disk YAML keeps every check field in one flat record classified by
//! a string tag. It is decoded here as-is and converted into the closed
//! types of [`crate::catalog::types`] immediately after load.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExercise {
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    pub metadata: RawMetadata,
    pub spec: RawSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMetadata {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSpec {
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub points: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    pub environment: RawEnvironment,
    #[serde(default)]
    pub checks: Vec<RawCheck>,
    #[serde(default)]
    pub hints: Vec<RawHint>,
    #[serde(default)]
    pub success_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEnvironment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "cluster-namespace", alias = "kubernetes", default)]
    pub cluster: Option<RawClusterEnv>,
    #[serde(rename = "container-stack", alias = "docker", default)]
    pub stack: Option<RawStackEnv>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawClusterEnv {
    #[serde(default)]
    pub create_cluster: Option<bool>,
    #[serde(default)]
    pub cluster_config: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub setup_manifests: Vec<String>,
    #[serde(default)]
    pub wait_for: Vec<RawWaitCondition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWaitCondition {
    pub resource: String,
    pub condition: String,
    #[serde(default)]
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStackEnv {
    #[serde(default)]
    pub compose_file: Option<String>,
    #[serde(default)]
    pub containers: Vec<RawContainer>,
    #[serde(default)]
    pub copy_files: Vec<RawCopyFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawContainer {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub ports: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCopyFile {
    pub from: String,
    pub to: String,
}

/// One flat check record. Which fields are meaningful depends on `kind`;
/// the conversion in `types.rs` enforces that.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCheck {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub jsonpath: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub value_type: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub expect_exit_code: Option<i32>,
    #[serde(default)]
    pub expect_output: Option<RawExpectation>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub expect_status: Option<u16>,
    #[serde(default)]
    pub expect_body: Option<RawExpectation>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub check: Option<String>,
    #[serde(default)]
    pub exists: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExpectation {
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(default)]
    pub not_contains: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawHint {
    pub cost: u32,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}
