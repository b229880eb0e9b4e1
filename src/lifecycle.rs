//! Exercise lifecycle
//!
//! The operations behind the CLI verbs: start, check, stop, reset, hint.
//! Each one composes the catalog, the provisioner, the check engine and the
//! progress store. Progress is only written after the environment work for
//! the operation has succeeded, so a failed setup never marks an exercise
//! as started.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::catalog::types::{EnvironmentSpec, Hint};
use crate::catalog::{Catalog, CatalogEntry};
use crate::checks::{CheckEngine, CheckResult};
use crate::config::GymConfig;
use crate::environment::Provisioner;
use crate::error::{GymError, Result};
use crate::progress::{ProgressFile, ProgressStore};
use crate::runner::ProcessRunner;

#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    /// Skip cluster creation and target whatever cluster kubectl points at.
    pub no_cluster: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResetOptions {
    pub no_cluster: bool,
    /// Keep the work directory contents instead of clearing them.
    pub keep_work: bool,
}

#[derive(Debug)]
pub struct StartOutcome {
    pub work_dir: PathBuf,
}

#[derive(Debug)]
pub struct CheckOutcome {
    pub results: Vec<CheckResult>,
    pub all_passed: bool,
    /// Score recorded on completion.
    pub score: Option<u32>,
    pub success_message: Option<String>,
}

impl CheckOutcome {
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }
}

/// A hint made visible to the user.
#[derive(Debug)]
pub struct RevealedHint {
    /// 1-based position in the exercise's hint list.
    pub number: usize,
    pub cost: u32,
    pub content: String,
}

#[derive(Debug)]
pub enum HintOutcome {
    Revealed {
        hints: Vec<RevealedHint>,
        remaining: usize,
    },
    Exhausted,
}

/// The training harness: a loaded catalog plus the runtime it drives.
pub struct Gym {
    config: GymConfig,
    catalog: Catalog,
    runner: Arc<dyn ProcessRunner>,
}

impl Gym {
    pub fn new(config: GymConfig, runner: Arc<dyn ProcessRunner>) -> Result<Self> {
        let catalog = Catalog::load(&config.exercises_dir)?;
        Ok(Gym {
            config,
            catalog,
            runner,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &GymConfig {
        &self.config
    }

    pub fn entry(&self, name: &str) -> Result<&CatalogEntry> {
        self.catalog
            .find(name)
            .ok_or_else(|| GymError::ExerciseNotFound(name.to_string()))
    }

    pub fn progress(&self) -> Result<ProgressFile> {
        self.store().load()
    }

    /// The exercise an unqualified command applies to: the explicit name if
    /// given, otherwise the current-exercise pointer.
    pub fn resolve_target(&self, name: Option<&str>) -> Result<String> {
        match name {
            Some(name) => Ok(name.to_string()),
            None => self.current_exercise(),
        }
    }

    pub fn current_exercise(&self) -> Result<String> {
        let data = std::fs::read_to_string(&self.config.current_path)
            .map_err(|_| GymError::NoCurrentExercise)?;
        let name = data.trim();
        if name.is_empty() {
            return Err(GymError::NoCurrentExercise);
        }
        Ok(name.to_string())
    }

    fn write_current(&self, name: &str) -> Result<()> {
        if let Some(parent) = self.config.current_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config.current_path, format!("{name}\n"))?;
        Ok(())
    }

    fn store(&self) -> ProgressStore {
        ProgressStore::new(&self.config.progress_path)
    }

    fn provisioner(&self) -> Provisioner {
        Provisioner::new(self.runner.clone(), self.config.clone())
    }

    /// Apply `--no-cluster`: the entry is used as declared except that no
    /// cluster is created or destroyed on its behalf.
    fn effective_entry(&self, entry: &CatalogEntry, no_cluster: bool) -> CatalogEntry {
        let mut entry = entry.clone();
        if no_cluster {
            if let EnvironmentSpec::ClusterNamespace(spec) = &mut entry.exercise.environment {
                spec.create_cluster = false;
            }
        }
        entry
    }

    /// Provision the environment, then record the start. The work directory
    /// always exists afterwards, for both backends.
    pub async fn start(&self, name: &str, opts: StartOptions) -> Result<StartOutcome> {
        let entry = self.effective_entry(self.entry(name)?, opts.no_cluster);
        info!(exercise = name, backend = entry.exercise.environment.kind_name(), "starting");

        self.provisioner().setup(&entry).await?;

        let work_dir = self.config.work_dir(name);
        std::fs::create_dir_all(&work_dir)?;

        self.store().mark_started(name)?;
        self.write_current(name)?;

        Ok(StartOutcome { work_dir })
    }

    /// Run every check; record completion when all of them pass.
    pub async fn check(&self, name: &str) -> Result<CheckOutcome> {
        let entry = self.entry(name)?;
        let work_dir = match &entry.exercise.environment {
            EnvironmentSpec::ContainerStack(_) => self.config.work_dir(name),
            EnvironmentSpec::ClusterNamespace(_) => PathBuf::new(),
        };

        let engine = CheckEngine::new(self.runner.clone());
        let (results, all_passed) = engine.evaluate(&entry.exercise, &work_dir).await;

        let mut score = None;
        if all_passed {
            let points = entry.exercise.score_points();
            self.store().mark_completed(name, points)?;
            score = Some(points);
        }

        Ok(CheckOutcome {
            results,
            all_passed,
            score,
            success_message: entry.exercise.success_message.clone(),
        })
    }

    /// Tear the environment down and mark the exercise stopped. The work
    /// directory is preserved. Returns the teardown errors that were
    /// swallowed.
    pub async fn stop(&self, name: &str) -> Result<Vec<String>> {
        let entry = self.entry(name)?;
        let swallowed = self.provisioner().teardown(entry).await;
        self.store().mark_stopped(name)?;
        Ok(swallowed)
    }

    /// Tear down and set the environment up again from its declaration.
    pub async fn reset(&self, name: &str, opts: ResetOptions) -> Result<StartOutcome> {
        let entry = self.effective_entry(self.entry(name)?, opts.no_cluster);
        info!(exercise = name, "resetting");

        self.provisioner().teardown(&entry).await;

        let work_dir = self.config.work_dir(name);
        if !opts.keep_work && work_dir.is_dir() {
            std::fs::remove_dir_all(&work_dir)?;
        }

        self.provisioner().setup(&entry).await?;
        std::fs::create_dir_all(&work_dir)?;

        self.store().mark_reset(name)?;
        self.write_current(name)?;

        Ok(StartOutcome { work_dir })
    }

    /// Reveal the next unseen hint, or all remaining ones. Revealed hints
    /// stay revealed; the counter never goes down except through a fresh
    /// start.
    pub fn hint(&self, name: &str, reveal_all: bool) -> Result<HintOutcome> {
        let entry = self.entry(name)?;
        let hints = &entry.exercise.hints;

        let store = self.store();
        let used = store.load()?.status(name).hints_used as usize;
        if used >= hints.len() {
            return Ok(HintOutcome::Exhausted);
        }

        let end = if reveal_all { hints.len() } else { used + 1 };
        let mut revealed = Vec::with_capacity(end - used);
        for (i, hint) in hints.iter().enumerate().take(end).skip(used) {
            revealed.push(RevealedHint {
                number: i + 1,
                cost: hint.cost,
                content: self.hint_content(entry, hint)?,
            });
        }

        store.record_hints(name, end as u32)?;
        Ok(HintOutcome::Revealed {
            hints: revealed,
            remaining: hints.len() - end,
        })
    }

    fn hint_content(&self, entry: &CatalogEntry, hint: &Hint) -> Result<String> {
        if let Some(content) = &hint.content {
            return Ok(content.clone());
        }
        let Some(file) = &hint.file else {
            return Err(GymError::HintUnreadable(
                "hint has no content or file".to_string(),
            ));
        };
        let path = crate::util::resolve_path(&entry.dir, file);
        std::fs::read_to_string(&path)
            .map_err(|e| GymError::HintUnreadable(format!("read {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ExerciseState;
    use crate::runner::testing::{Response, ScriptedRunner};

    const STACK_EXERCISE: &str = r#"
metadata:
  name: web-101
  title: Serve a page
spec:
  points: 25
  environment:
    type: container-stack
    container-stack:
      containers:
        - name: web
          image: nginx:alpine
  checks:
    - type: docker-container
      container: web
      property: state
      operator: equals
      value: running
  hints:
    - cost: 5
      content: Check the container state.
    - cost: 10
      file: hints/second.txt
"#;

    fn workspace() -> (tempfile::TempDir, GymConfig) {
        let dir = tempfile::tempdir().unwrap();
        let exercises = dir.path().join("exercises");
        std::fs::create_dir_all(exercises.join("web-101").join("hints")).unwrap();
        std::fs::write(
            exercises.join("web-101").join("exercise.yaml"),
            STACK_EXERCISE,
        )
        .unwrap();
        std::fs::write(
            exercises.join("web-101").join("hints").join("second.txt"),
            "Look at docker logs.\n",
        )
        .unwrap();
        let config = GymConfig::rooted_at(dir.path().join("home"), exercises);
        (dir, config)
    }

    const CLUSTER_EXERCISE: &str = r#"
metadata:
  name: k8s-101
  title: Existing cluster
spec:
  environment:
    type: cluster-namespace
    cluster-namespace:
      createCluster: false
      namespace: training
"#;

    fn workspace_with_cluster() -> (tempfile::TempDir, GymConfig) {
        let dir = tempfile::tempdir().unwrap();
        let exercises = dir.path().join("exercises");
        std::fs::create_dir_all(exercises.join("k8s-101")).unwrap();
        std::fs::write(
            exercises.join("k8s-101").join("exercise.yaml"),
            CLUSTER_EXERCISE,
        )
        .unwrap();
        let config = GymConfig::rooted_at(dir.path().join("home"), exercises);
        (dir, config)
    }

    fn gym(config: GymConfig) -> Gym {
        Gym::new(config, Arc::new(ScriptedRunner::ok_all())).unwrap()
    }

    #[tokio::test]
    async fn test_start_provisions_then_records() {
        let (_dir, config) = workspace();
        let gym = gym(config.clone());
        let outcome = gym.start("web-101", StartOptions::default()).await.unwrap();
        assert!(outcome.work_dir.is_dir());
        assert_eq!(gym.current_exercise().unwrap(), "web-101");
        let status = gym.progress().unwrap().status("web-101");
        assert_eq!(status.status, ExerciseState::InProgress);
    }

    #[tokio::test]
    async fn test_failed_setup_leaves_progress_untouched() {
        let (_dir, config) = workspace();
        let gym = Gym::new(
            config,
            Arc::new(ScriptedRunner::fail_all("docker daemon unreachable")),
        )
        .unwrap();
        let err = gym
            .start("web-101", StartOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("docker daemon unreachable"));
        let status = gym.progress().unwrap().status("web-101");
        assert_eq!(status.status, ExerciseState::NotStarted);
        assert!(gym.current_exercise().is_err());
    }

    #[tokio::test]
    async fn test_unknown_exercise() {
        let (_dir, config) = workspace();
        let gym = gym(config);
        match gym.start("nope", StartOptions::default()).await {
            Err(GymError::ExerciseNotFound(name)) => assert_eq!(name, "nope"),
            other => panic!("expected ExerciseNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_check_completion_records_declared_points() {
        let (_dir, config) = workspace();
        let gym = Gym::new(
            config,
            Arc::new(ScriptedRunner::new(Response::Ok("running".to_string()))),
        )
        .unwrap();
        gym.start("web-101", StartOptions::default()).await.unwrap();
        let outcome = gym.check("web-101").await.unwrap();
        assert!(outcome.all_passed, "{:?}", outcome.results);
        assert_eq!(outcome.score, Some(25));
        let status = gym.progress().unwrap().status("web-101");
        assert_eq!(status.status, ExerciseState::Completed);
        assert_eq!(status.score, 25);
    }

    #[tokio::test]
    async fn test_failed_check_does_not_complete() {
        let (_dir, config) = workspace();
        let gym = gym(config);
        gym.start("web-101", StartOptions::default()).await.unwrap();
        let outcome = gym.check("web-101").await.unwrap();
        assert!(!outcome.all_passed);
        assert_eq!(outcome.score, None);
        let status = gym.progress().unwrap().status("web-101");
        assert_eq!(status.status, ExerciseState::InProgress);
    }

    #[tokio::test]
    async fn test_stop_tears_down_stack_work_dir() {
        let (_dir, config) = workspace();
        let gym = gym(config);
        let outcome = gym.start("web-101", StartOptions::default()).await.unwrap();
        std::fs::write(outcome.work_dir.join("notes.txt"), "wip").unwrap();

        let swallowed = gym.stop("web-101").await.unwrap();
        assert!(swallowed.is_empty());
        assert!(!outcome.work_dir.exists());
        let status = gym.progress().unwrap().status("web-101");
        assert_eq!(status.status, ExerciseState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_preserves_cluster_work_dir() {
        let (_dir, config) = workspace_with_cluster();
        let gym = gym(config);
        let outcome = gym.start("k8s-101", StartOptions::default()).await.unwrap();
        std::fs::write(outcome.work_dir.join("notes.txt"), "wip").unwrap();

        gym.stop("k8s-101").await.unwrap();
        assert!(outcome.work_dir.join("notes.txt").is_file());
    }

    #[tokio::test]
    async fn test_reset_clears_work_dir_and_counts() {
        let (_dir, config) = workspace();
        let gym = gym(config);
        let outcome = gym.start("web-101", StartOptions::default()).await.unwrap();
        std::fs::write(outcome.work_dir.join("notes.txt"), "wip").unwrap();

        gym.reset("web-101", ResetOptions::default()).await.unwrap();
        assert!(!outcome.work_dir.join("notes.txt").exists());
        assert!(outcome.work_dir.is_dir());
        let status = gym.progress().unwrap().status("web-101");
        assert_eq!(status.resets, 1);
        assert_eq!(status.status, ExerciseState::InProgress);
    }

    #[tokio::test]
    async fn test_reset_keep_work_on_cluster_backend() {
        // cluster teardown leaves the work directory alone, so keep-work
        // actually preserves it there
        let (_dir, config) = workspace_with_cluster();
        let gym = gym(config);
        let outcome = gym.start("k8s-101", StartOptions::default()).await.unwrap();
        std::fs::write(outcome.work_dir.join("notes.txt"), "wip").unwrap();
        gym.reset(
            "k8s-101",
            ResetOptions {
                keep_work: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(outcome.work_dir.join("notes.txt").is_file());

        gym.reset("k8s-101", ResetOptions::default()).await.unwrap();
        assert!(!outcome.work_dir.join("notes.txt").exists());
        assert_eq!(gym.progress().unwrap().status("k8s-101").resets, 2);
    }

    #[tokio::test]
    async fn test_hints_reveal_in_order_and_exhaust() {
        let (_dir, config) = workspace();
        let gym = gym(config);
        gym.start("web-101", StartOptions::default()).await.unwrap();

        let first = gym.hint("web-101", false).unwrap();
        match first {
            HintOutcome::Revealed { hints, remaining } => {
                assert_eq!(hints.len(), 1);
                assert_eq!(hints[0].number, 1);
                assert_eq!(hints[0].cost, 5);
                assert!(hints[0].content.contains("container state"));
                assert_eq!(remaining, 1);
            }
            HintOutcome::Exhausted => panic!("expected a hint"),
        }

        // second hint comes from a file next to the definition
        match gym.hint("web-101", false).unwrap() {
            HintOutcome::Revealed { hints, .. } => {
                assert_eq!(hints[0].number, 2);
                assert!(hints[0].content.contains("docker logs"));
            }
            HintOutcome::Exhausted => panic!("expected a hint"),
        }

        assert!(matches!(
            gym.hint("web-101", false).unwrap(),
            HintOutcome::Exhausted
        ));
        assert_eq!(gym.progress().unwrap().status("web-101").hints_used, 2);
    }

    #[tokio::test]
    async fn test_reveal_all_hints() {
        let (_dir, config) = workspace();
        let gym = gym(config);
        match gym.hint("web-101", true).unwrap() {
            HintOutcome::Revealed { hints, remaining } => {
                assert_eq!(hints.len(), 2);
                assert_eq!(remaining, 0);
            }
            HintOutcome::Exhausted => panic!("expected hints"),
        }
    }

    #[tokio::test]
    async fn test_resolve_target_prefers_explicit_name() {
        let (_dir, config) = workspace();
        let gym = gym(config);
        assert!(matches!(
            gym.resolve_target(None),
            Err(GymError::NoCurrentExercise)
        ));
        gym.start("web-101", StartOptions::default()).await.unwrap();
        assert_eq!(gym.resolve_target(None).unwrap(), "web-101");
        assert_eq!(gym.resolve_target(Some("other")).unwrap(), "other");
    }
}
