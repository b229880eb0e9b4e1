//! Manifest application and condition waits via the `kubectl` CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::catalog::types::WaitCondition;
use crate::error::Result;
use crate::runner::{ProcessRunner, RunOpts};
use crate::util;

/// Default blocking-wait timeout, passed through to the tool.
pub const DEFAULT_WAIT_TIMEOUT: &str = "120s";

/// Headroom on top of the declared wait timeout before the child is killed,
/// so a hung tool is reported as a timeout rather than waited on forever.
const WAIT_DEADLINE_SLACK: Duration = Duration::from_secs(30);

pub async fn apply_manifests(
    runner: &Arc<dyn ProcessRunner>,
    namespace: &str,
    manifest_paths: &[PathBuf],
) -> Result<()> {
    for path in manifest_paths {
        let path_str = path.to_string_lossy().to_string();
        let mut args = vec!["apply", "-f", path_str.as_str()];
        if !namespace.is_empty() {
            args.push("-n");
            args.push(namespace);
        }
        info!(manifest = %path.display(), namespace, "applying manifest");
        runner.run("kubectl", &args, RunOpts::default()).await?;
    }
    Ok(())
}

/// Block until the resource reports the condition or the timeout elapses.
/// The underlying tool failure is surfaced verbatim on timeout.
pub async fn wait_for_condition(
    runner: &Arc<dyn ProcessRunner>,
    namespace: &str,
    wait: &WaitCondition,
) -> Result<()> {
    if wait.resource.is_empty() || wait.condition.is_empty() {
        return Ok(());
    }
    let timeout = wait.timeout.as_deref().unwrap_or(DEFAULT_WAIT_TIMEOUT);

    let for_arg = format!("--for=condition={}", wait.condition);
    let timeout_arg = format!("--timeout={timeout}");
    let mut args = vec![
        "wait",
        for_arg.as_str(),
        timeout_arg.as_str(),
        wait.resource.as_str(),
    ];
    if !namespace.is_empty() {
        args.push("-n");
        args.push(namespace);
    }

    let deadline = util::parse_duration(timeout)
        .unwrap_or(Duration::from_secs(120))
        + WAIT_DEADLINE_SLACK;
    info!(resource = %wait.resource, condition = %wait.condition, timeout, "waiting for condition");
    runner
        .run(
            "kubectl",
            &args,
            RunOpts {
                dir: None,
                timeout: Some(deadline),
            },
        )
        .await?;
    Ok(())
}

/// Resolve manifest references relative to the exercise directory.
pub fn resolve_manifest_paths(base_dir: &Path, manifests: &[String]) -> Vec<PathBuf> {
    manifests
        .iter()
        .map(|m| util::resolve_path(base_dir, m))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::ScriptedRunner;

    #[tokio::test]
    async fn test_apply_targets_namespace() {
        let scripted = Arc::new(ScriptedRunner::ok_all());
        let runner: Arc<dyn ProcessRunner> = scripted.clone();
        apply_manifests(
            &runner,
            "lab",
            &[PathBuf::from("/ex/deploy.yaml"), PathBuf::from("/ex/svc.yaml")],
        )
        .await
        .unwrap();
        assert_eq!(
            scripted.calls(),
            vec![
                "kubectl apply -f /ex/deploy.yaml -n lab",
                "kubectl apply -f /ex/svc.yaml -n lab"
            ]
        );
    }

    #[tokio::test]
    async fn test_wait_uses_default_timeout() {
        let scripted = Arc::new(ScriptedRunner::ok_all());
        let runner: Arc<dyn ProcessRunner> = scripted.clone();
        wait_for_condition(
            &runner,
            "default",
            &WaitCondition {
                resource: "deployment/web".into(),
                condition: "Available".into(),
                timeout: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(
            scripted.calls(),
            vec!["kubectl wait --for=condition=Available --timeout=120s deployment/web -n default"]
        );
    }

    #[tokio::test]
    async fn test_wait_skips_empty_condition() {
        let scripted = Arc::new(ScriptedRunner::ok_all());
        let runner: Arc<dyn ProcessRunner> = scripted.clone();
        wait_for_condition(
            &runner,
            "default",
            &WaitCondition {
                resource: String::new(),
                condition: "Ready".into(),
                timeout: None,
            },
        )
        .await
        .unwrap();
        assert!(scripted.calls().is_empty());
    }

    #[test]
    fn test_resolve_manifest_paths() {
        let paths = resolve_manifest_paths(
            Path::new("/exercises/01"),
            &["deploy.yaml".to_string(), "/abs/svc.yaml".to_string()],
        );
        assert_eq!(paths[0], PathBuf::from("/exercises/01/deploy.yaml"));
        assert_eq!(paths[1], PathBuf::from("/abs/svc.yaml"));
    }
}
