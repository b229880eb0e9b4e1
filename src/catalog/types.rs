//! Typed exercise model
//!
//! Closed sum types per concept. The flat wire records are classified here,
//! once, right after decoding; everything downstream matches exhaustively.

use std::collections::HashMap;

use super::wire::{
    RawCheck, RawClusterEnv, RawContainer, RawCopyFile, RawExercise, RawExpectation, RawHint,
    RawStackEnv,
};

/// Points awarded when an exercise declares zero or no points.
pub const DEFAULT_POINTS: u32 = 100;

/// An exercise definition, immutable once loaded.
#[derive(Debug, Clone)]
pub struct ExerciseDefinition {
    pub name: String,
    pub title: String,
    pub difficulty: Option<String>,
    pub estimated_time: Option<String>,
    pub points: u32,
    pub description: String,
    pub environment: EnvironmentSpec,
    pub checks: Vec<Check>,
    pub hints: Vec<Hint>,
    pub success_message: Option<String>,
}

impl ExerciseDefinition {
    /// Declared points with the zero/absent default applied.
    pub fn score_points(&self) -> u32 {
        if self.points == 0 {
            DEFAULT_POINTS
        } else {
            self.points
        }
    }
}

/// Environment declaration, exactly one backend per exercise.
#[derive(Debug, Clone)]
pub enum EnvironmentSpec {
    ContainerStack(StackSpec),
    ClusterNamespace(ClusterSpec),
}

impl EnvironmentSpec {
    pub fn kind_name(&self) -> &'static str {
        match self {
            EnvironmentSpec::ContainerStack(_) => "container-stack",
            EnvironmentSpec::ClusterNamespace(_) => "cluster-namespace",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StackSpec {
    pub compose_file: Option<String>,
    pub containers: Vec<ContainerSpec>,
    pub copy_files: Vec<CopyFile>,
}

#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: Option<String>,
    pub build: Option<String>,
    pub ports: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CopyFile {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct ClusterSpec {
    pub create_cluster: bool,
    pub cluster_config: Option<String>,
    pub namespace: String,
    pub setup_manifests: Vec<String>,
    pub wait_for: Vec<WaitCondition>,
}

#[derive(Debug, Clone)]
pub struct WaitCondition {
    pub resource: String,
    pub condition: String,
    pub timeout: Option<String>,
}

/// One automated assertion.
#[derive(Debug, Clone)]
pub struct Check {
    /// Display name; falls back to the kind tag when absent.
    pub name: String,
    pub kind: CheckKind,
}

/// Comparison operators of the value algebra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    #[default]
    Equals,
    NotEquals,
    Contains,
    Regex,
    Exists,
    GreaterThan,
    LessThan,
}

impl Operator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "equals" => Some(Operator::Equals),
            "notEquals" => Some(Operator::NotEquals),
            "contains" => Some(Operator::Contains),
            "regex" => Some(Operator::Regex),
            "exists" => Some(Operator::Exists),
            "greaterThan" => Some(Operator::GreaterThan),
            "lessThan" => Some(Operator::LessThan),
        _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "notEquals",
            Operator::Contains => "contains",
            Operator::Regex => "regex",
            Operator::Exists => "exists",
            Operator::GreaterThan => "greaterThan",
            Operator::LessThan => "lessThan",
        }
    }
}

/// How the two sides of an ordered comparison are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    #[default]
    String,
    Number,
    Quantity,
}

impl ValueType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(ValueType::String),
            "number" => Some(ValueType::Number),
            "quantity" => Some(ValueType::Quantity),
            _ => None,
        }
    }
}

/// Operator + expected value + value type, judging an observed string.
#[derive(Debug, Clone, Default)]
pub struct ComparisonSpec {
    pub operator: Operator,
    pub value: Option<serde_json::Value>,
    pub value_type: ValueType,
}

impl ComparisonSpec {
    /// Expected value rendered as the string the algebra compares against.
    pub fn expected_string(&self) -> String {
        match &self.value {
            None => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
        }
    }
}

/// Assertions on captured process output or an HTTP body.
#[derive(Debug, Clone, Default)]
pub struct OutputExpectation {
    pub contains: Option<String>,
    pub not_contains: Option<String>,
    pub regex: Option<String>,
}

/// Inspected property of a container image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageProperty {
    Size,
    Layers,
    BaseImage,
    Labels,
}

/// Inspected property of a running/stopped container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerProperty {
    State,
    Health,
    ExitCode,
    Ports,
}

/// Structural assertions over a Dockerfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockerfileAssertion {
    MultiStage,
    BaseImage,
    CopyFrom,
    UserInstruction,
}

/// The closed set of check kinds.
#[derive(Debug, Clone)]
pub enum CheckKind {
    Script {
        script: String,
        expect_exit_code: Option<i32>,
        expect_output: Option<OutputExpectation>,
    },
    Http {
        url: String,
        method: Option<String>,
        headers: HashMap<String, String>,
        timeout: Option<String>,
        expect_status: Option<u16>,
        expect_body: Option<OutputExpectation>,
    },
    File {
        path: String,
        exists: Option<bool>,
        comparison: Option<ComparisonSpec>,
    },
    JsonPath {
        resource: String,
        jsonpath: String,
        namespace: Option<String>,
        comparison: ComparisonSpec,
    },
    Condition {
        resource: String,
        condition: String,
        status: String,
        namespace: Option<String>,
    },
    ResourceExists {
        resource: String,
        namespace: Option<String>,
        exists: bool,
    },
    PodLogs {
        resource: Option<String>,
        selector: Option<String>,
        container: Option<String>,
        since: Option<String>,
        namespace: Option<String>,
        comparison: ComparisonSpec,
    },
    Exec {
        resource: Option<String>,
        container: Option<String>,
        namespace: Option<String>,
        command: Vec<String>,
        expect_exit_code: Option<i32>,
        expect_output: Option<OutputExpectation>,
    },
    DockerImage {
        image: String,
        property: ImageProperty,
        comparison: ComparisonSpec,
    },
    DockerContainer {
        container: String,
        property: ContainerProperty,
        comparison: ComparisonSpec,
    },
    DockerLogs {
        container: String,
        since: Option<String>,
        comparison: ComparisonSpec,
    },
    Dockerfile {
        path: String,
        assertion: DockerfileAssertion,
        comparison: ComparisonSpec,
    },
}

impl CheckKind {
    pub fn tag(&self) -> &'static str {
        match self {
            CheckKind::Script { .. } => "script",
            CheckKind::Http { .. } => "http",
            CheckKind::File { .. } => "file",
            CheckKind::JsonPath { .. } => "jsonpath",
            CheckKind::Condition { .. } => "condition",
            CheckKind::ResourceExists { .. } => "resourceExists",
            CheckKind::PodLogs { .. } => "podLogs",
            CheckKind::Exec { .. } => "exec",
            CheckKind::DockerImage { .. } => "docker-image",
            CheckKind::DockerContainer { .. } => "docker-container",
            CheckKind::DockerLogs { .. } => "docker-logs",
            CheckKind::Dockerfile { .. } => "dockerfile",
        }
    }
}

/// A paid hint.
#[derive(Debug, Clone)]
pub struct Hint {
    pub cost: u32,
    pub file: Option<String>,
    pub content: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire conversion
// ---------------------------------------------------------------------------

fn convert_expectation(raw: &RawExpectation) -> OutputExpectation {
    OutputExpectation {
        contains: raw.contains.clone(),
        not_contains: raw.not_contains.clone(),
        regex: raw.regex.clone(),
    }
}

fn convert_comparison(raw: &RawCheck, at: &str, errors: &mut Vec<String>) -> ComparisonSpec {
    let operator = match raw.operator.as_deref() {
        None => Operator::Equals,
        Some(op) => Operator::parse(op).unwrap_or_else(|| {
            errors.push(format!("{at}.operator: unsupported operator: {op}"));
            Operator::Equals
        }),
    };
    let value_type = match raw.value_type.as_deref() {
        None => ValueType::String,
        Some(vt) => ValueType::parse(vt).unwrap_or_else(|| {
            errors.push(format!("{at}.valueType: unsupported value type: {vt}"));
            ValueType::String
        }),
    };
    ComparisonSpec {
        operator,
        value: raw.value.clone(),
        value_type,
    }
}

fn require<'a>(
    field: Option<&'a str>,
    at: &str,
    name: &str,
    errors: &mut Vec<String>,
) -> &'a str {
    match field {
        Some(v) if !v.is_empty() => v,
        _ => {
            errors.push(format!("{at}.{name}: required for this check type"));
            ""
        }
    }
}

fn convert_check(raw: &RawCheck, at: &str, errors: &mut Vec<String>) -> Check {
    let name = raw
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| raw.kind.clone());

    let kind = match raw.kind.as_str() {
        "script" => CheckKind::Script {
            script: require(raw.script.as_deref(), at, "script", errors).to_string(),
            expect_exit_code: raw.expect_exit_code,
            expect_output: raw.expect_output.as_ref().map(convert_expectation),
        },
        "http" => CheckKind::Http {
            url: require(raw.url.as_deref(), at, "url", errors).to_string(),
            method: raw.method.clone(),
            headers: raw.headers.clone(),
            timeout: raw.timeout.clone(),
            expect_status: raw.expect_status,
            expect_body: raw.expect_body.as_ref().map(convert_expectation),
        },
        "file" => CheckKind::File {
            path: require(raw.path.as_deref(), at, "path", errors).to_string(),
            exists: raw.exists,
            comparison: if raw.value.is_some() || raw.operator.is_some() {
                Some(convert_comparison(raw, at, errors))
            } else {
                None
            },
        },
        "jsonpath" => CheckKind::JsonPath {
            resource: require(raw.resource.as_deref(), at, "resource", errors).to_string(),
            jsonpath: require(raw.jsonpath.as_deref(), at, "jsonpath", errors).to_string(),
            namespace: raw.namespace.clone(),
            comparison: convert_comparison(raw, at, errors),
        },
        "condition" => CheckKind::Condition {
            resource: require(raw.resource.as_deref(), at, "resource", errors).to_string(),
            condition: require(raw.condition.as_deref(), at, "condition", errors).to_string(),
            status: raw.status.clone().unwrap_or_else(|| "True".to_string()),
            namespace: raw.namespace.clone(),
        },
        "resourceExists" => CheckKind::ResourceExists {
            resource: require(raw.resource.as_deref(), at, "resource", errors).to_string(),
            namespace: raw.namespace.clone(),
            exists: raw.exists.unwrap_or(true),
        },
        "podLogs" => {
            if raw.selector.is_none() && raw.resource.is_none() {
                errors.push(format!("{at}: podLogs requires selector or resource"));
            }
            CheckKind::PodLogs {
                resource: raw.resource.clone(),
                selector: raw.selector.clone(),
                container: raw.container.clone(),
                since: raw.timeout.clone(),
                namespace: raw.namespace.clone(),
                comparison: convert_comparison(raw, at, errors),
            }
        }
        "exec" => {
            if raw.command.is_empty() {
                errors.push(format!("{at}.command: required for this check type"));
            }
            if raw.resource.is_none() && raw.container.is_none() {
                errors.push(format!("{at}: exec requires resource or container"));
            }
            CheckKind::Exec {
                resource: raw.resource.clone(),
                container: raw.container.clone(),
                namespace: raw.namespace.clone(),
                command: raw.command.clone(),
                expect_exit_code: raw.expect_exit_code,
                expect_output: raw.expect_output.as_ref().map(convert_expectation),
            }
        }
        "docker-image" => {
            let property = match require(raw.property.as_deref(), at, "property", errors) {
                "size" => ImageProperty::Size,
                "layers" => ImageProperty::Layers,
                "baseImage" => ImageProperty::BaseImage,
                "labels" => ImageProperty::Labels,
                other => {
                    if !other.is_empty() {
                        errors.push(format!("{at}.property: unsupported image property: {other}"));
                    }
                    ImageProperty::Size
                }
            };
            CheckKind::DockerImage {
                image: require(raw.image.as_deref(), at, "image", errors).to_string(),
                property,
                comparison: convert_comparison(raw, at, errors),
            }
        }
        "docker-container" => {
            let property = match require(raw.property.as_deref(), at, "property", errors) {
                "state" => ContainerProperty::State,
                "health" => ContainerProperty::Health,
                "exitCode" => ContainerProperty::ExitCode,
                "ports" => ContainerProperty::Ports,
                other => {
                    if !other.is_empty() {
                        errors.push(format!(
                            "{at}.property: unsupported container property: {other}"
                        ));
                    }
                    ContainerProperty::State
                }
            };
            CheckKind::DockerContainer {
                container: require(raw.container.as_deref(), at, "container", errors).to_string(),
                property,
                comparison: convert_comparison(raw, at, errors),
            }
        }
        "docker-logs" => CheckKind::DockerLogs {
            container: require(raw.container.as_deref(), at, "container", errors).to_string(),
            since: raw.timeout.clone(),
            comparison: convert_comparison(raw, at, errors),
        },
        "dockerfile" => {
            let assertion = match require(raw.check.as_deref(), at, "check", errors) {
                "multiStage" => DockerfileAssertion::MultiStage,
                "baseImage" => DockerfileAssertion::BaseImage,
                "copyFrom" => DockerfileAssertion::CopyFrom,
                "userInstruction" => DockerfileAssertion::UserInstruction,
                other => {
                    if !other.is_empty() {
                        errors.push(format!("{at}.check: unsupported dockerfile check: {other}"));
                    }
                    DockerfileAssertion::MultiStage
                }
            };
            CheckKind::Dockerfile {
                path: require(raw.path.as_deref(), at, "path", errors).to_string(),
                assertion,
                comparison: convert_comparison(raw, at, errors),
            }
        }
        other => {
            errors.push(format!("{at}.type: unknown check type: {other}"));
            CheckKind::Script {
                script: String::new(),
                expect_exit_code: None,
                expect_output: None,
            }
        }
    };

    Check { name, kind }
}

fn convert_stack(raw: &RawStackEnv) -> StackSpec {
    StackSpec {
        compose_file: raw.compose_file.clone(),
        containers: raw
            .containers
            .iter()
            .map(|c: &RawContainer| ContainerSpec {
                name: c.name.clone(),
                image: c.image.clone(),
                build: c.build.clone(),
                ports: c.ports.clone(),
            })
            .collect(),
        copy_files: raw
            .copy_files
            .iter()
            .map(|c: &RawCopyFile| CopyFile {
                from: c.from.clone(),
                to: c.to.clone(),
            })
            .collect(),
    }
}

fn convert_cluster(raw: &RawClusterEnv) -> ClusterSpec {
    ClusterSpec {
        create_cluster: raw.create_cluster.unwrap_or(true),
        cluster_config: raw.cluster_config.clone(),
        namespace: raw
            .namespace
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "default".to_string()),
        setup_manifests: raw.setup_manifests.clone(),
        wait_for: raw
            .wait_for
            .iter()
            .map(|w| WaitCondition {
                resource: w.resource.clone(),
                condition: w.condition.clone(),
                timeout: w.timeout.clone(),
            })
            .collect(),
    }
}

fn convert_hint(raw: &RawHint, at: &str, errors: &mut Vec<String>) -> Hint {
    if raw.content.is_none() && raw.file.is_none() {
        errors.push(format!("{at}: hint requires content or file"));
    }
    Hint {
        cost: raw.cost,
        file: raw.file.clone(),
        content: raw.content.clone(),
    }
}

/// Classify a decoded wire document into the typed model, collecting every
/// problem instead of stopping at the first.
pub fn from_wire(raw: &RawExercise) -> std::result::Result<ExerciseDefinition, Vec<String>> {
    let mut errors = Vec::new();

    let environment = match raw.spec.environment.kind.as_str() {
        "container-stack" | "docker" => match &raw.spec.environment.stack {
            Some(stack) => Some(EnvironmentSpec::ContainerStack(convert_stack(stack))),
            None => {
                errors.push(
                    "spec.environment: container-stack environment requires a container-stack block"
                        .to_string(),
                );
                None
            }
        },
        "cluster-namespace" | "kubernetes" => match &raw.spec.environment.cluster {
            Some(cluster) => Some(EnvironmentSpec::ClusterNamespace(convert_cluster(cluster))),
            None => {
                errors.push(
                    "spec.environment: cluster-namespace environment requires a cluster-namespace block"
                        .to_string(),
                );
                None
            }
        },
        other => {
            errors.push(format!(
                "spec.environment.type: unsupported environment type: {other}"
            ));
            None
        }
    };

    let checks = raw
        .spec
        .checks
        .iter()
        .enumerate()
        .map(|(i, c)| convert_check(c, &format!("spec.checks[{i}]"), &mut errors))
        .collect();

    let hints = raw
        .spec
        .hints
        .iter()
        .enumerate()
        .map(|(i, h)| convert_hint(h, &format!("spec.hints[{i}]"), &mut errors))
        .collect();

    if raw.metadata.name.is_empty() {
        errors.push("metadata.name: must not be empty".to_string());
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ExerciseDefinition {
        name: raw.metadata.name.clone(),
        title: raw
            .metadata
            .title
            .clone()
            .unwrap_or_else(|| raw.metadata.name.clone()),
        difficulty: raw.spec.difficulty.clone(),
        estimated_time: raw.spec.estimated_time.clone(),
        points: raw.spec.points.unwrap_or(0),
        description: raw.spec.description.clone().unwrap_or_default(),
        environment: environment.expect("checked above"),
        checks,
        hints,
        success_message: raw.spec.success_message.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_stack_yaml() -> &'static str {
        r#"
metadata:
  name: demo
spec:
  environment:
    type: container-stack
    container-stack:
      containers:
        - name: web
          image: nginx:alpine
          ports: ["8080:80"]
  checks:
    - type: docker-container
      container: web
      property: state
      operator: equals
      value: running
"#
    }

    #[test]
    fn test_from_wire_classifies_stack_exercise() {
        let raw: RawExercise = serde_yaml::from_str(minimal_stack_yaml()).unwrap();
        let def = from_wire(&raw).unwrap();
        assert_eq!(def.name, "demo");
        assert!(matches!(def.environment, EnvironmentSpec::ContainerStack(_)));
        assert_eq!(def.checks.len(), 1);
        assert_eq!(def.checks[0].name, "docker-container");
        assert!(matches!(
            def.checks[0].kind,
            CheckKind::DockerContainer {
                property: ContainerProperty::State,
                ..
            }
        ));
    }

    #[test]
    fn test_docker_alias_accepted() {
        let yaml = r#"
metadata:
  name: demo
spec:
  environment:
    type: docker
    docker:
      containers: []
"#;
        let raw: RawExercise = serde_yaml::from_str(yaml).unwrap();
        let def = from_wire(&raw).unwrap();
        assert_eq!(def.environment.kind_name(), "container-stack");
    }

    #[test]
    fn test_missing_backend_block_collected() {
        let yaml = r#"
metadata:
  name: demo
spec:
  environment:
    type: cluster-namespace
"#;
        let raw: RawExercise = serde_yaml::from_str(yaml).unwrap();
        let errs = from_wire(&raw).unwrap_err();
        assert!(errs[0].contains("cluster-namespace block"));
    }

    #[test]
    fn test_check_field_errors_carry_path() {
        let yaml = r#"
metadata:
  name: demo
spec:
  environment:
    type: container-stack
    container-stack: {}
  checks:
    - type: script
    - type: exec
      command: []
"#;
        let raw: RawExercise = serde_yaml::from_str(yaml).unwrap();
        let errs = from_wire(&raw).unwrap_err();
        assert!(errs.iter().any(|e| e.starts_with("spec.checks[0].script")));
        assert!(errs.iter().any(|e| e.starts_with("spec.checks[1]")));
    }

    #[test]
    fn test_points_default_applied_at_scoring() {
        let raw: RawExercise = serde_yaml::from_str(minimal_stack_yaml()).unwrap();
        let def = from_wire(&raw).unwrap();
        assert_eq!(def.points, 0);
        assert_eq!(def.score_points(), DEFAULT_POINTS);
    }

    #[test]
    fn test_cluster_defaults() {
        let yaml = r#"
metadata:
  name: k8s-demo
spec:
  points: 50
  environment:
    type: cluster-namespace
    cluster-namespace:
      setupManifests: ["deploy.yaml"]
"#;
        let raw: RawExercise = serde_yaml::from_str(yaml).unwrap();
        let def = from_wire(&raw).unwrap();
        match &def.environment {
            EnvironmentSpec::ClusterNamespace(spec) => {
                assert!(spec.create_cluster);
                assert_eq!(spec.namespace, "default");
            }
            _ => panic!("expected cluster environment"),
        }
        assert_eq!(def.score_points(), 50);
    }
}
