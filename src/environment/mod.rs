//! Environment provisioning
//!
//! Two backends share one contract: `setup` builds the declared environment
//! from scratch, `teardown` is idempotent and best-effort. Environments are
//! exclusive, not stacked: each backend owns one reserved identifier, and
//! starting a new exercise reclaims it.

pub mod cluster;
pub mod manifests;
pub mod stack;

use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::types::{ClusterSpec, EnvironmentSpec};
use crate::catalog::CatalogEntry;
use crate::config::{GymConfig, RESERVED_CLUSTER_NAME};
use crate::error::Result;
use crate::runner::ProcessRunner;

pub use cluster::ClusterManager;
pub use stack::StackManager;

/// Creates and destroys concrete resources for a declared environment.
pub struct Provisioner {
    runner: Arc<dyn ProcessRunner>,
    config: GymConfig,
}

impl Provisioner {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: GymConfig) -> Self {
        Self { runner, config }
    }

    /// Bring the declared environment up. Failures abort immediately and
    /// leave partial state in place; teardown is always an explicit call.
    pub async fn setup(&self, entry: &CatalogEntry) -> Result<()> {
        match &entry.exercise.environment {
            EnvironmentSpec::ContainerStack(spec) => {
                let work_dir = self.config.work_dir(&entry.exercise.name);
                StackManager::new(self.runner.clone(), work_dir)
                    .setup(&entry.dir, spec)
                    .await
            }
            EnvironmentSpec::ClusterNamespace(spec) => self.setup_cluster(entry, spec).await,
        }
    }

    async fn setup_cluster(&self, entry: &CatalogEntry, spec: &ClusterSpec) -> Result<()> {
        if spec.create_cluster {
            let manager = ClusterManager::new(self.runner.clone(), RESERVED_CLUSTER_NAME);
            // Clusters are never reused; a leftover one is torn down first
            // to guarantee a clean start.
            if manager.exists().await? {
                info!("removing leftover cluster before setup");
                manager.delete().await?;
            }
            manager.create(spec.cluster_config.as_deref()).await?;
        }

        let paths = manifests::resolve_manifest_paths(&entry.dir, &spec.setup_manifests);
        if !paths.is_empty() {
            manifests::apply_manifests(&self.runner, &spec.namespace, &paths).await?;
        }

        for wait in &spec.wait_for {
            manifests::wait_for_condition(&self.runner, &spec.namespace, wait).await?;
        }

        Ok(())
    }

    /// Tear the environment down. Safe on never- or partially-set-up state;
    /// returns the errors it swallowed instead of raising them.
    pub async fn teardown(&self, entry: &CatalogEntry) -> Vec<String> {
        let swallowed = match &entry.exercise.environment {
            EnvironmentSpec::ContainerStack(spec) => {
                let work_dir = self.config.work_dir(&entry.exercise.name);
                StackManager::new(self.runner.clone(), work_dir)
                    .teardown(&entry.dir, spec)
                    .await
            }
            EnvironmentSpec::ClusterNamespace(spec) => {
                let mut swallowed = Vec::new();
                if spec.create_cluster {
                    let manager =
                        ClusterManager::new(self.runner.clone(), RESERVED_CLUSTER_NAME);
                    if let Err(e) = manager.delete().await {
                        swallowed.push(format!("delete cluster: {e}"));
                    }
                }
                swallowed
            }
        };

        for item in &swallowed {
            warn!("teardown: {item}");
        }
        swallowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::{Check, ExerciseDefinition, StackSpec, WaitCondition};
    use crate::runner::testing::{Response, ScriptedRunner};
    use std::path::PathBuf;

    fn cluster_entry(create_cluster: bool) -> CatalogEntry {
        CatalogEntry {
            exercise: ExerciseDefinition {
                name: "k8s-demo".into(),
                title: "K8s Demo".into(),
                difficulty: None,
                estimated_time: None,
                points: 0,
                description: String::new(),
                environment: EnvironmentSpec::ClusterNamespace(ClusterSpec {
                    create_cluster,
                    cluster_config: None,
                    namespace: "lab".into(),
                    setup_manifests: vec!["deploy.yaml".into()],
                    wait_for: vec![WaitCondition {
                        resource: "deployment/web".into(),
                        condition: "Available".into(),
                        timeout: None,
                    }],
                }),
                checks: Vec::<Check>::new(),
                hints: vec![],
                success_message: None,
            },
            path: PathBuf::from("/ex/k8s-demo/exercise.yaml"),
            dir: PathBuf::from("/ex/k8s-demo"),
        }
    }

    fn test_config() -> GymConfig {
        GymConfig::rooted_at("/tmp/opsgym-test", PathBuf::from("/ex"))
    }

    #[tokio::test]
    async fn test_cluster_setup_reclaims_reserved_name() {
        let scripted = Arc::new(ScriptedRunner::ok_all().on(
            "kind get clusters",
            Response::Ok(RESERVED_CLUSTER_NAME.to_string()),
        ));
        let provisioner = Provisioner::new(scripted.clone(), test_config());
        provisioner.setup(&cluster_entry(true)).await.unwrap();

        let calls = scripted.calls();
        assert_eq!(calls[0], "kind get clusters");
        assert!(calls[1].starts_with("kind delete cluster"));
        assert!(calls[2].starts_with("kind create cluster"));
        assert!(calls[3].starts_with("kubectl apply -f /ex/k8s-demo/deploy.yaml -n lab"));
        assert!(calls[4].starts_with("kubectl wait --for=condition=Available"));
    }

    #[tokio::test]
    async fn test_cluster_setup_without_cluster_creation() {
        let scripted = Arc::new(ScriptedRunner::ok_all());
        let provisioner = Provisioner::new(scripted.clone(), test_config());
        provisioner.setup(&cluster_entry(false)).await.unwrap();
        let calls = scripted.calls();
        assert!(calls.iter().all(|c| !c.starts_with("kind")));
    }

    #[tokio::test]
    async fn test_wait_failure_aborts_setup_verbatim() {
        let scripted = Arc::new(
            ScriptedRunner::ok_all()
                .on("kind get clusters", Response::Ok(String::new()))
                .on(
                    "kubectl wait",
                    Response::Exit(1, "timed out waiting for the condition".to_string()),
                ),
        );
        let provisioner = Provisioner::new(scripted, test_config());
        let err = provisioner.setup(&cluster_entry(true)).await.unwrap_err();
        assert!(err.to_string().contains("timed out waiting for the condition"));
    }

    #[tokio::test]
    async fn test_cluster_teardown_swallows_delete_failure() {
        let scripted = Arc::new(ScriptedRunner::fail_all("not found"));
        let provisioner = Provisioner::new(scripted, test_config());
        let swallowed = provisioner.teardown(&cluster_entry(true)).await;
        assert_eq!(swallowed.len(), 1);
        assert!(swallowed[0].contains("delete cluster"));
    }

    #[tokio::test]
    async fn test_stack_teardown_never_fatal_on_fresh_state() {
        let scripted = Arc::new(ScriptedRunner::ok_all());
        let provisioner = Provisioner::new(scripted, test_config());
        let entry = CatalogEntry {
            exercise: ExerciseDefinition {
                name: "fresh".into(),
                title: "Fresh".into(),
                difficulty: None,
                estimated_time: None,
                points: 0,
                description: String::new(),
                environment: EnvironmentSpec::ContainerStack(StackSpec::default()),
                checks: Vec::<Check>::new(),
                hints: vec![],
                success_message: None,
            },
            path: PathBuf::from("/ex/fresh/exercise.yaml"),
            dir: PathBuf::from("/ex/fresh"),
        };
        assert!(provisioner.teardown(&entry).await.is_empty());
        assert!(provisioner.teardown(&entry).await.is_empty());
    }
}
