//! Container-stack backend
//!
//! Brings up a declared set of containers via the external `docker` CLI:
//! an optional compose file, explicit named containers (image or build
//! context), and files staged into a scratch work directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::types::StackSpec;
use crate::config::RESERVED_STACK_PROJECT;
use crate::error::{GymError, Result};
use crate::runner::{ProcessRunner, RunOpts};
use crate::util;

pub struct StackManager {
    runner: Arc<dyn ProcessRunner>,
    work_dir: PathBuf,
}

impl StackManager {
    pub fn new(runner: Arc<dyn ProcessRunner>, work_dir: PathBuf) -> Self {
        Self { runner, work_dir }
    }

    /// Stage files, then launch containers in declaration order. The first
    /// failure aborts; partial state is left for inspection.
    pub async fn setup(&self, entry_dir: &Path, spec: &StackSpec) -> Result<()> {
        std::fs::create_dir_all(&self.work_dir)?;

        for item in &spec.copy_files {
            let source = util::resolve_path(entry_dir, &item.from);
            let destination = self.work_dir.join(&item.to);
            util::copy_path(&source, &destination)?;
        }

        if let Some(compose) = &spec.compose_file {
            let compose_path = util::resolve_path(entry_dir, compose);
            let compose_dir = compose_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| entry_dir.to_path_buf());
            let compose_str = compose_path.to_string_lossy().to_string();
            self.runner
                .run(
                    "docker",
                    &[
                        "compose",
                        "-p",
                        RESERVED_STACK_PROJECT,
                        "-f",
                        &compose_str,
                        "up",
                        "-d",
                    ],
                    RunOpts::in_dir(compose_dir),
                )
                .await?;
        }

        for container in &spec.containers {
            let image = match (&container.build, &container.image) {
                (Some(build), _) => {
                    let tagged = format!("{}:latest", container.name);
                    let build_dir = util::resolve_path(entry_dir, build);
                    info!(container = %container.name, image = %tagged, "building image");
                    self.runner
                        .run(
                            "docker",
                            &["build", "-t", &tagged, "."],
                            RunOpts::in_dir(build_dir),
                        )
                        .await?;
                    tagged
                }
                (None, Some(image)) => image.clone(),
                (None, None) => {
                    return Err(GymError::Provision(format!(
                        "container {} missing image or build",
                        container.name
                    )))
                }
            };

            let mut args = vec!["run", "-d", "--name", container.name.as_str()];
            for port in &container.ports {
                args.push("-p");
                args.push(port.as_str());
            }
            args.push(image.as_str());
            self.runner.run("docker", &args, RunOpts::default()).await?;
            info!(container = %container.name, "container started");
        }

        Ok(())
    }

    /// Best-effort teardown: compose down, remove named containers, delete
    /// the work directory. Failures are collected and reported, never raised.
    pub async fn teardown(&self, entry_dir: &Path, spec: &StackSpec) -> Vec<String> {
        let mut swallowed = Vec::new();

        if let Some(compose) = &spec.compose_file {
            let compose_path = util::resolve_path(entry_dir, compose);
            let compose_dir = compose_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| entry_dir.to_path_buf());
            let compose_str = compose_path.to_string_lossy().to_string();
            if let Err(e) = self
                .runner
                .run(
                    "docker",
                    &[
                        "compose",
                        "-p",
                        RESERVED_STACK_PROJECT,
                        "-f",
                        &compose_str,
                        "down",
                        "-v",
                    ],
                    RunOpts::in_dir(compose_dir),
                )
                .await
            {
                swallowed.push(format!("compose down: {e}"));
            }
        }

        for container in &spec.containers {
            if let Err(e) = self
                .runner
                .run(
                    "docker",
                    &["rm", "-f", container.name.as_str()],
                    RunOpts::default(),
                )
                .await
            {
                swallowed.push(format!("rm {}: {e}", container.name));
            }
        }

        if self.work_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.work_dir) {
                swallowed.push(format!("remove work dir: {e}"));
            }
        }

        for item in &swallowed {
            debug!("teardown swallowed: {item}");
        }
        swallowed
    }
}
