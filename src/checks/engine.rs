//! Check evaluation
//!
//! Runs every check of an exercise in declaration order and reports one
//! result per check. A failing probe command, a missing file, or a kind
//! the active backend cannot serve all become failed results with a
//! message; evaluation itself never errors and never stops early.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::catalog::types::{
    Check, CheckKind, ComparisonSpec, ContainerProperty, DockerfileAssertion, EnvironmentSpec,
    ExerciseDefinition, ImageProperty, Operator, OutputExpectation, ValueType,
};
use crate::checks::compare::{self, compare_int, compare_with_spec, parse_size};
use crate::runner::{ProcessRunner, RunOpts, RunResult};
use crate::util::parse_duration;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a single check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

impl CheckResult {
    fn pass(name: &str) -> Self {
        CheckResult {
            name: name.to_string(),
            passed: true,
            message: String::new(),
        }
    }

    fn fail(name: &str, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.to_string(),
            passed: false,
            message: message.into(),
        }
    }

    fn from_verdict(name: &str, verdict: (bool, String)) -> Self {
        CheckResult {
            name: name.to_string(),
            passed: verdict.0,
            message: verdict.1,
        }
    }
}

pub struct CheckEngine {
    runner: Arc<dyn ProcessRunner>,
    http: reqwest::Client,
}

impl CheckEngine {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        CheckEngine {
            runner,
            http: reqwest::Client::new(),
        }
    }

    /// Evaluate every check of the exercise. Returns the per-check results
    /// and whether all of them passed.
    pub async fn evaluate(
        &self,
        exercise: &ExerciseDefinition,
        work_dir: &Path,
    ) -> (Vec<CheckResult>, bool) {
        let mut results = Vec::with_capacity(exercise.checks.len());
        let mut all_passed = true;
        for check in &exercise.checks {
            let result = self.run_check(exercise, work_dir, check).await;
            debug!(
                check = %result.name,
                passed = result.passed,
                "check evaluated"
            );
            if !result.passed {
                all_passed = false;
            }
            results.push(result);
        }
        (results, all_passed)
    }

    async fn run_check(
        &self,
        exercise: &ExerciseDefinition,
        work_dir: &Path,
        check: &Check,
    ) -> CheckResult {
        let name = check.name.as_str();

        // Backend-agnostic kinds first
        match &check.kind {
            CheckKind::Script {
                script,
                expect_exit_code,
                expect_output,
            } => {
                return self
                    .script_check(name, script, *expect_exit_code, expect_output.as_ref(), work_dir)
                    .await;
            }
            CheckKind::Http {
                url,
                method,
                headers,
                timeout,
                expect_status,
                expect_body,
            } => {
                return self
                    .http_check(
                        name,
                        url,
                        method.as_deref(),
                        headers,
                        timeout.as_deref(),
                        *expect_status,
                        expect_body.as_ref(),
                    )
                    .await;
            }
            CheckKind::File {
                path,
                exists,
                comparison,
            } => return file_check(name, path, *exists, comparison.as_ref(), work_dir),
            _ => {}
        }

        match &exercise.environment {
            EnvironmentSpec::ClusterNamespace(cluster) => {
                let env_ns = cluster.namespace.as_str();
                match &check.kind {
                    CheckKind::JsonPath {
                        resource,
                        jsonpath,
                        namespace,
                        comparison,
                    } => {
                        self.jsonpath_check(
                            name,
                            resource,
                            jsonpath,
                            effective_namespace(namespace, env_ns),
                            comparison,
                        )
                        .await
                    }
                    CheckKind::Condition {
                        resource,
                        condition,
                        status,
                        namespace,
                    } => {
                        self.condition_check(
                            name,
                            resource,
                            condition,
                            status,
                            effective_namespace(namespace, env_ns),
                        )
                        .await
                    }
                    CheckKind::ResourceExists {
                        resource,
                        namespace,
                        exists,
                    } => {
                        self.resource_exists_check(
                            name,
                            resource,
                            effective_namespace(namespace, env_ns),
                            *exists,
                        )
                        .await
                    }
                    CheckKind::PodLogs {
                        resource,
                        selector,
                        container,
                        since,
                        namespace,
                        comparison,
                    } => {
                        self.pod_logs_check(
                            name,
                            resource.as_deref(),
                            selector.as_deref(),
                            container.as_deref(),
                            since.as_deref(),
                            effective_namespace(namespace, env_ns),
                            comparison,
                        )
                        .await
                    }
                    CheckKind::Exec {
                        resource,
                        container,
                        namespace,
                        command,
                        expect_exit_code,
                        expect_output,
                    } => {
                        let Some(resource) = resource.as_deref() else {
                            return CheckResult::fail(name, "missing resource or command for exec");
                        };
                        self.kubernetes_exec_check(
                            name,
                            resource,
                            container.as_deref(),
                            effective_namespace(namespace, env_ns),
                            command,
                            *expect_exit_code,
                            expect_output.as_ref(),
                        )
                        .await
                    }
                    other => CheckResult::fail(
                        name,
                        format!("unsupported check type: {}", other.tag()),
                    ),
                }
            }
            EnvironmentSpec::ContainerStack(_) => match &check.kind {
                CheckKind::DockerImage {
                    image,
                    property,
                    comparison,
                } => self.docker_image_check(name, image, *property, comparison).await,
                CheckKind::DockerContainer {
                    container,
                    property,
                    comparison,
                } => {
                    self.docker_container_check(name, container, *property, comparison)
                        .await
                }
                CheckKind::DockerLogs {
                    container,
                    since,
                    comparison,
                } => {
                    self.docker_logs_check(name, container, since.as_deref(), comparison)
                        .await
                }
                CheckKind::Dockerfile {
                    path,
                    assertion,
                    comparison,
                } => dockerfile_check(name, path, *assertion, comparison, work_dir),
                CheckKind::Exec {
                    container,
                    command,
                    expect_exit_code,
                    expect_output,
                    ..
                } => {
                    let Some(container) = container.as_deref() else {
                        return CheckResult::fail(name, "missing container or command for exec");
                    };
                    let mut args: Vec<&str> = vec!["exec", container];
                    args.extend(command.iter().map(String::as_str));
                    let outcome = self.runner.run("docker", &args, RunOpts::default()).await;
                    judge_process(name, outcome, *expect_exit_code, expect_output.as_ref())
                }
                other => {
                    CheckResult::fail(name, format!("unsupported check type: {}", other.tag()))
                }
            },
        }
    }

    async fn script_check(
        &self,
        name: &str,
        script: &str,
        expect_exit_code: Option<i32>,
        expect_output: Option<&OutputExpectation>,
        work_dir: &Path,
    ) -> CheckResult {
        let outcome = self
            .runner
            .run("bash", &["-c", script], RunOpts::in_dir(work_dir))
            .await;
        judge_process(name, outcome, expect_exit_code, expect_output)
    }

    #[allow(clippy::too_many_arguments)]
    async fn http_check(
        &self,
        name: &str,
        url: &str,
        method: Option<&str>,
        headers: &HashMap<String, String>,
        timeout: Option<&str>,
        expect_status: Option<u16>,
        expect_body: Option<&OutputExpectation>,
    ) -> CheckResult {
        let method = method.unwrap_or("GET");
        let method = match reqwest::Method::from_bytes(method.to_uppercase().as_bytes()) {
            Ok(m) => m,
            Err(e) => return CheckResult::fail(name, format!("create request: {e}")),
        };
        let timeout = timeout
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT);

        let mut request = self.http.request(method, url).timeout(timeout);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return CheckResult::fail(name, format!("request failed: {e}")),
        };

        if let Some(want) = expect_status {
            let got = response.status().as_u16();
            if got != want {
                return CheckResult::fail(name, format!("expected status {want}, got {got}"));
            }
        }

        if let Some(expect) = expect_body {
            let body = match response.text().await {
                Ok(b) => b,
                Err(e) => return CheckResult::fail(name, format!("read body: {e}")),
            };
            if let Some(needle) = &expect.contains {
                if !needle.is_empty() && !body.contains(needle.as_str()) {
                    return CheckResult::fail(name, format!("body does not contain: {needle}"));
                }
            }
            if let Some(needle) = &expect.not_contains {
                if !needle.is_empty() && body.contains(needle.as_str()) {
                    return CheckResult::fail(name, format!("body contains: {needle}"));
                }
            }
            if let Some(pattern) = &expect.regex {
                if !pattern.is_empty() {
                    match regex::Regex::new(pattern) {
                        Err(e) => return CheckResult::fail(name, format!("invalid regex: {e}")),
                        Ok(re) => {
                            if !re.is_match(&body) {
                                return CheckResult::fail(
                                    name,
                                    format!("body does not match regex: {pattern}"),
                                );
                            }
                        }
                    }
                }
            }
        }

        CheckResult::pass(name)
    }

    async fn jsonpath_check(
        &self,
        name: &str,
        resource: &str,
        jsonpath: &str,
        namespace: &str,
        comparison: &ComparisonSpec,
    ) -> CheckResult {
        let expr = format!("jsonpath={jsonpath}");
        let args = ["get", resource, "-o", expr.as_str(), "-n", namespace];
        match self.runner.run("kubectl", &args, RunOpts::default()).await {
            Err(e) => CheckResult::fail(name, e.to_string()),
            Ok(output) => {
                CheckResult::from_verdict(name, compare_with_spec(output.trim(), comparison))
            }
        }
    }

    async fn condition_check(
        &self,
        name: &str,
        resource: &str,
        condition: &str,
        status: &str,
        namespace: &str,
    ) -> CheckResult {
        let expr = format!("jsonpath={{.status.conditions[?(@.type==\"{condition}\")].status}}");
        let args = ["get", resource, "-o", expr.as_str(), "-n", namespace];
        match self.runner.run("kubectl", &args, RunOpts::default()).await {
            Err(e) => CheckResult::fail(name, e.to_string()),
            Ok(output) => {
                let output = output.trim();
                if output == status {
                    CheckResult::pass(name)
                } else {
                    CheckResult::fail(name, format!("expected {status}, got {output}"))
                }
            }
        }
    }

    async fn resource_exists_check(
        &self,
        name: &str,
        resource: &str,
        namespace: &str,
        expected: bool,
    ) -> CheckResult {
        let args = ["get", resource, "-n", namespace];
        let exists = self
            .runner
            .run("kubectl", &args, RunOpts::default())
            .await
            .is_ok();
        if exists == expected {
            CheckResult::pass(name)
        } else {
            CheckResult::fail(name, format!("expected exists={expected}, got {exists}"))
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn pod_logs_check(
        &self,
        name: &str,
        resource: Option<&str>,
        selector: Option<&str>,
        container: Option<&str>,
        since: Option<&str>,
        namespace: &str,
        comparison: &ComparisonSpec,
    ) -> CheckResult {
        let mut args: Vec<&str> = vec!["logs"];
        match (selector, resource) {
            (Some(selector), _) => {
                args.push("-l");
                args.push(selector);
            }
            (None, Some(resource)) => args.push(resource),
            (None, None) => {
                return CheckResult::fail(name, "missing selector or resource for pod logs");
            }
        }
        args.push("-n");
        args.push(namespace);
        if let Some(container) = container {
            args.push("-c");
            args.push(container);
        }
        if let Some(since) = since {
            args.push("--since");
            args.push(since);
        }
        match self.runner.run("kubectl", &args, RunOpts::default()).await {
            Err(e) => CheckResult::fail(name, e.to_string()),
            Ok(output) => CheckResult::from_verdict(
                name,
                compare::compare(
                    &output,
                    comparison.operator,
                    &comparison.expected_string(),
                    ValueType::String,
                ),
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn kubernetes_exec_check(
        &self,
        name: &str,
        resource: &str,
        container: Option<&str>,
        namespace: &str,
        command: &[String],
        expect_exit_code: Option<i32>,
        expect_output: Option<&OutputExpectation>,
    ) -> CheckResult {
        let mut args: Vec<&str> = vec!["exec", resource, "-n", namespace];
        if let Some(container) = container {
            args.push("-c");
            args.push(container);
        }
        args.push("--");
        args.extend(command.iter().map(String::as_str));
        let outcome = self.runner.run("kubectl", &args, RunOpts::default()).await;
        judge_process(name, outcome, expect_exit_code, expect_output)
    }

    async fn docker_image_check(
        &self,
        name: &str,
        image: &str,
        property: ImageProperty,
        comparison: &ComparisonSpec,
    ) -> CheckResult {
        let format = match property {
            ImageProperty::Size => "{{.Size}}",
            ImageProperty::Layers => "{{len .RootFS.Layers}}",
            ImageProperty::BaseImage => "{{.ContainerConfig.Image}}",
            ImageProperty::Labels => "{{.Config.Labels}}",
        };
        let args = ["image", "inspect", image, "--format", format];
        let output = match self.runner.run("docker", &args, RunOpts::default()).await {
            Err(e) => return CheckResult::fail(name, e.to_string()),
            Ok(output) => output.trim().to_string(),
        };

        match property {
            ImageProperty::Size => {
                let Ok(actual) = output.parse::<i64>() else {
                    return CheckResult::fail(name, format!("invalid image size: {output}"));
                };
                let expected = match parse_size(&comparison.expected_string()) {
                    Ok(size) => size,
                    Err(e) => return CheckResult::fail(name, e),
                };
                CheckResult::from_verdict(name, compare_int(actual, expected, comparison.operator))
            }
            ImageProperty::Layers => {
                let Ok(actual) = output.parse::<i64>() else {
                    return CheckResult::fail(name, format!("invalid layer count: {output}"));
                };
                let expected_str = comparison.expected_string();
                let Ok(expected) = expected_str.trim().parse::<i64>() else {
                    return CheckResult::fail(
                        name,
                        format!("invalid expected layers: {expected_str}"),
                    );
                };
                CheckResult::from_verdict(name, compare_int(actual, expected, comparison.operator))
            }
            ImageProperty::BaseImage | ImageProperty::Labels => CheckResult::from_verdict(
                name,
                compare::compare(
                    &output,
                    comparison.operator,
                    &comparison.expected_string(),
                    ValueType::String,
                ),
            ),
        }
    }

    async fn docker_container_check(
        &self,
        name: &str,
        container: &str,
        property: ContainerProperty,
        comparison: &ComparisonSpec,
    ) -> CheckResult {
        let outcome = match property {
            ContainerProperty::State => {
                let args = ["inspect", container, "--format", "{{.State.Status}}"];
                self.runner.run("docker", &args, RunOpts::default()).await
            }
            ContainerProperty::Health => {
                let args = ["inspect", container, "--format", "{{.State.Health.Status}}"];
                self.runner.run("docker", &args, RunOpts::default()).await
            }
            ContainerProperty::ExitCode => {
                let args = ["inspect", container, "--format", "{{.State.ExitCode}}"];
                self.runner.run("docker", &args, RunOpts::default()).await
            }
            ContainerProperty::Ports => {
                self.runner
                    .run("docker", &["port", container], RunOpts::default())
                    .await
            }
        };
        let output = match outcome {
            Err(e) => return CheckResult::fail(name, e.to_string()),
            Ok(output) => output.trim().to_string(),
        };

        match property {
            ContainerProperty::Health if comparison.operator == Operator::Exists => {
                if output.is_empty() {
                    CheckResult::fail(name, "health status not found")
                } else {
                    CheckResult::pass(name)
                }
            }
            // exit codes compare numerically so ordered operators work
            ContainerProperty::ExitCode => CheckResult::from_verdict(
                name,
                compare::compare(
                    &output,
                    comparison.operator,
                    &comparison.expected_string(),
                    ValueType::Number,
                ),
            ),
            _ => CheckResult::from_verdict(
                name,
                compare::compare(
                    &output,
                    comparison.operator,
                    &comparison.expected_string(),
                    ValueType::String,
                ),
            ),
        }
    }

    async fn docker_logs_check(
        &self,
        name: &str,
        container: &str,
        since: Option<&str>,
        comparison: &ComparisonSpec,
    ) -> CheckResult {
        let mut args: Vec<&str> = vec!["logs"];
        if let Some(since) = since {
            args.push("--since");
            args.push(since);
        }
        args.push(container);
        match self.runner.run("docker", &args, RunOpts::default()).await {
            Err(e) => CheckResult::fail(name, e.to_string()),
            Ok(output) => CheckResult::from_verdict(
                name,
                compare::compare(
                    &output,
                    comparison.operator,
                    &comparison.expected_string(),
                    ValueType::String,
                ),
            ),
        }
    }
}

fn effective_namespace<'a>(check_ns: &'a Option<String>, env_ns: &'a str) -> &'a str {
    match check_ns.as_deref() {
        Some(ns) if !ns.is_empty() => ns,
        _ => env_ns,
    }
}

/// Shared exit-code and output judgement for script and exec checks. The
/// exit-code gate runs first; output expectations only apply once it holds.
fn judge_process(
    name: &str,
    outcome: RunResult,
    expect_exit_code: Option<i32>,
    expect_output: Option<&OutputExpectation>,
) -> CheckResult {
    let output = if let Some(want) = expect_exit_code {
        let (code, output) = match &outcome {
            Ok(output) => (0, output.clone()),
            Err(e) => match e.exit_code() {
                Some(code) => (code, e.output().to_string()),
                None => return CheckResult::fail(name, e.to_string()),
            },
        };
        if code != want {
            return CheckResult::fail(name, format!("expected exit code {want}, got {code}"));
        }
        output
    } else {
        match outcome {
            Ok(output) => output,
            Err(e) => return CheckResult::fail(name, e.to_string()),
        }
    };

    let Some(expect) = expect_output else {
        return CheckResult::pass(name);
    };

    if let Some(needle) = &expect.contains {
        if !needle.is_empty() && !output.contains(needle.as_str()) {
            return CheckResult::fail(name, format!("output does not contain: {needle}"));
        }
    }
    if let Some(needle) = &expect.not_contains {
        if !needle.is_empty() && output.contains(needle.as_str()) {
            return CheckResult::fail(name, format!("output contains: {needle}"));
        }
    }
    if let Some(pattern) = &expect.regex {
        if !pattern.is_empty() {
            match regex::Regex::new(pattern) {
                Err(e) => return CheckResult::fail(name, format!("invalid regex: {e}")),
                Ok(re) => {
                    if !re.is_match(&output) {
                        return CheckResult::fail(
                            name,
                            format!("output does not match regex: {pattern}"),
                        );
                    }
                }
            }
        }
    }
    CheckResult::pass(name)
}

fn file_check(
    name: &str,
    path: &str,
    exists: Option<bool>,
    comparison: Option<&ComparisonSpec>,
    work_dir: &Path,
) -> CheckResult {
    let resolved = if Path::new(path).is_absolute() {
        Path::new(path).to_path_buf()
    } else {
        work_dir.join(path)
    };

    let metadata = std::fs::metadata(&resolved).ok();
    let present = metadata.is_some();

    if let Some(expected) = exists {
        if present != expected {
            return if expected {
                CheckResult::fail(name, format!("file not found: {path}"))
            } else {
                CheckResult::fail(name, format!("file exists but should not: {path}"))
            };
        }
        if !expected {
            return CheckResult::pass(name);
        }
    }

    let Some(metadata) = metadata else {
        return CheckResult::fail(name, format!("file not found: {path}"));
    };

    if metadata.is_dir() {
        return if comparison.is_none() {
            CheckResult::pass(name)
        } else {
            CheckResult::fail(name, "cannot check content of directory")
        };
    }

    let Some(comparison) = comparison else {
        return CheckResult::pass(name);
    };

    match std::fs::read_to_string(&resolved) {
        Err(e) => CheckResult::fail(name, format!("read file: {e}")),
        Ok(content) => CheckResult::from_verdict(
            name,
            compare::compare(
                &content,
                comparison.operator,
                &comparison.expected_string(),
                ValueType::String,
            ),
        ),
    }
}

fn dockerfile_check(
    name: &str,
    path: &str,
    assertion: DockerfileAssertion,
    comparison: &ComparisonSpec,
    work_dir: &Path,
) -> CheckResult {
    let resolved = if Path::new(path).is_absolute() {
        Path::new(path).to_path_buf()
    } else {
        work_dir.join(path)
    };
    let content = match std::fs::read_to_string(&resolved) {
        Ok(c) => c,
        Err(e) => return CheckResult::fail(name, format!("read dockerfile: {e}")),
    };

    let mut from_count = 0;
    let mut first_from = String::new();
    let mut user_found = false;
    let mut copy_from_found = false;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let upper = trimmed.to_uppercase();
        if upper.starts_with("FROM ") {
            from_count += 1;
            if first_from.is_empty() {
                first_from = trimmed[5..].trim().to_string();
            }
        }
        if upper.starts_with("USER ") {
            user_found = true;
        }
        if upper.contains("COPY --FROM=") {
            copy_from_found = true;
        }
    }

    let string_compare = |actual: &str| {
        CheckResult::from_verdict(
            name,
            compare::compare(
                actual,
                comparison.operator,
                &comparison.expected_string(),
                ValueType::String,
            ),
        )
    };

    match assertion {
        DockerfileAssertion::MultiStage => string_compare(&(from_count > 1).to_string()),
        DockerfileAssertion::BaseImage => string_compare(&first_from),
        DockerfileAssertion::CopyFrom => string_compare(&copy_from_found.to_string()),
        DockerfileAssertion::UserInstruction => {
            if comparison.operator == Operator::Exists {
                if user_found {
                    CheckResult::pass(name)
                } else {
                    CheckResult::fail(name, "USER instruction not found")
                }
            } else {
                string_compare(&user_found.to_string())
            }
        }
    }
}
