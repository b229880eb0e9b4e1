//! Ephemeral single-node cluster management via the `kind` CLI.

use std::io::Write;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::runner::{ProcessRunner, RunOpts};

pub struct ClusterManager {
    runner: Arc<dyn ProcessRunner>,
    cluster_name: String,
}

impl ClusterManager {
    pub fn new(runner: Arc<dyn ProcessRunner>, cluster_name: impl Into<String>) -> Self {
        Self {
            runner,
            cluster_name: cluster_name.into(),
        }
    }

    /// Create the cluster, optionally from an inline configuration payload
    /// written to a transient file.
    pub async fn create(&self, inline_config: Option<&str>) -> Result<()> {
        let mut args = vec![
            "create".to_string(),
            "cluster".to_string(),
            "--name".to_string(),
            self.cluster_name.clone(),
        ];

        // NamedTempFile removes itself when dropped, after the tool exits.
        let mut config_file = None;
        if let Some(payload) = inline_config {
            let mut file = tempfile::Builder::new()
                .prefix("opsgym-cluster-")
                .suffix(".yaml")
                .tempfile()?;
            file.write_all(payload.as_bytes())?;
            file.flush()?;
            args.push("--config".to_string());
            args.push(file.path().to_string_lossy().to_string());
            config_file = Some(file);
        }

        info!(cluster = %self.cluster_name, "creating cluster");
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner.run("kind", &arg_refs, RunOpts::default()).await?;
        drop(config_file);
        Ok(())
    }

    pub async fn delete(&self) -> Result<()> {
        info!(cluster = %self.cluster_name, "deleting cluster");
        self.runner
            .run(
                "kind",
                &["delete", "cluster", "--name", &self.cluster_name],
                RunOpts::default(),
            )
            .await?;
        Ok(())
    }

    /// Whether a cluster with the reserved name already exists.
    pub async fn exists(&self) -> Result<bool> {
        let output = self
            .runner
            .run("kind", &["get", "clusters"], RunOpts::default())
            .await?;
        Ok(output
            .lines()
            .map(str::trim)
            .any(|line| line == self.cluster_name))
    }
}
