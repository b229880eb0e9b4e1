//! Structural validation of definition documents
//!
//! Runs against the raw value tree before serde decoding so malformed input
//! fails with field-level diagnostics instead of opaque decode errors. The
//! schema is fixed: known keys, known tag values, correct value shapes.

use serde_json::Value;

const CHECK_TYPES: &[&str] = &[
    "script",
    "http",
    "file",
    "jsonpath",
    "condition",
    "resourceExists",
    "podLogs",
    "exec",
    "docker-image",
    "docker-container",
    "docker-logs",
    "dockerfile",
];

const OPERATORS: &[&str] = &[
    "equals",
    "notEquals",
    "contains",
    "regex",
    "exists",
    "greaterThan",
    "lessThan",
];

const VALUE_TYPES: &[&str] = &["string", "number", "quantity"];

const ENVIRONMENT_TYPES: &[&str] = &[
    "container-stack",
    "cluster-namespace",
    "docker",
    "kubernetes",
];

/// Validate a decoded YAML document. Returns every violation found.
pub fn validate_document(doc: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(root) = doc.as_object() else {
        return vec!["document must be a mapping".to_string()];
    };

    match root.get("metadata").and_then(Value::as_object) {
        None => errors.push("metadata: required mapping".to_string()),
        Some(meta) => match meta.get("name").and_then(Value::as_str) {
            None => errors.push("metadata.name: required string".to_string()),
            Some("") => errors.push("metadata.name: must not be empty".to_string()),
            Some(_) => {}
        },
    }

    let Some(spec) = root.get("spec").and_then(Value::as_object) else {
        errors.push("spec: required mapping".to_string());
        return errors;
    };

    if let Some(points) = spec.get("points") {
        if !points.is_u64() {
            errors.push("spec.points: must be a non-negative integer".to_string());
        }
    }

    match spec.get("environment").and_then(Value::as_object) {
        None => errors.push("spec.environment: required mapping".to_string()),
        Some(env) => match env.get("type").and_then(Value::as_str) {
            None => errors.push("spec.environment.type: required string".to_string()),
            Some(t) if !ENVIRONMENT_TYPES.contains(&t) => errors.push(format!(
                "spec.environment.type: must be one of container-stack, cluster-namespace (got {t})"
            )),
            Some(_) => {}
        },
    }

    if let Some(checks) = spec.get("checks") {
        match checks.as_array() {
            None => errors.push("spec.checks: must be a sequence".to_string()),
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    validate_check(item, i, &mut errors);
                }
            }
        }
    }

    if let Some(hints) = spec.get("hints") {
        match hints.as_array() {
            None => errors.push("spec.hints: must be a sequence".to_string()),
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    validate_hint(item, i, &mut errors);
                }
            }
        }
    }

    errors
}

fn validate_check(item: &Value, index: usize, errors: &mut Vec<String>) {
    let at = format!("spec.checks[{index}]");
    let Some(check) = item.as_object() else {
        errors.push(format!("{at}: must be a mapping"));
        return;
    };

    match check.get("type").and_then(Value::as_str) {
        None => errors.push(format!("{at}.type: required string")),
        Some(t) if !CHECK_TYPES.contains(&t) => {
            errors.push(format!("{at}.type: unknown check type: {t}"))
        }
        Some(_) => {}
    }

    if let Some(op) = check.get("operator") {
        match op.as_str() {
            None => errors.push(format!("{at}.operator: must be a string")),
            Some(op) if !OPERATORS.contains(&op) => {
                errors.push(format!("{at}.operator: unsupported operator: {op}"))
            }
            Some(_) => {}
        }
    }

    if let Some(vt) = check.get("valueType") {
        match vt.as_str() {
            None => errors.push(format!("{at}.valueType: must be a string")),
            Some(vt) if !VALUE_TYPES.contains(&vt) => {
                errors.push(format!("{at}.valueType: unsupported value type: {vt}"))
            }
            Some(_) => {}
        }
    }

    if let Some(cmd) = check.get("command") {
        if !cmd.is_array() {
            errors.push(format!("{at}.command: must be a sequence of strings"));
        }
    }

    if let Some(code) = check.get("expectExitCode") {
        if !code.is_i64() && !code.is_u64() {
            errors.push(format!("{at}.expectExitCode: must be an integer"));
        }
    }

    if let Some(exists) = check.get("exists") {
        if !exists.is_boolean() {
            errors.push(format!("{at}.exists: must be a boolean"));
        }
    }
}

fn validate_hint(item: &Value, index: usize, errors: &mut Vec<String>) {
    let at = format!("spec.hints[{index}]");
    let Some(hint) = item.as_object() else {
        errors.push(format!("{at}: must be a mapping"));
        return;
    };

    match hint.get("cost") {
        None => errors.push(format!("{at}.cost: required integer")),
        Some(cost) if !cost.is_u64() => {
            errors.push(format!("{at}.cost: must be a non-negative integer"))
        }
        Some(_) => {}
    }

    let has_content = hint.get("content").and_then(Value::as_str).is_some();
    let has_file = hint.get("file").and_then(Value::as_str).is_some();
    if !has_content && !has_file {
        errors.push(format!("{at}: requires content or file"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_valid_document_passes() {
        let doc = parse(
            r#"
metadata:
  name: demo
spec:
  points: 20
  environment:
    type: container-stack
    container-stack: {}
  checks:
    - type: file
      path: app.txt
      exists: true
  hints:
    - cost: 5
      content: look closer
"#,
        );
        assert!(validate_document(&doc).is_empty());
    }

    #[test]
    fn test_missing_name_and_environment() {
        let doc = parse("spec: {}");
        let errs = validate_document(&doc);
        assert!(errs.iter().any(|e| e.starts_with("metadata")));
        assert!(errs.iter().any(|e| e.starts_with("spec.environment")));
    }

    #[test]
    fn test_unknown_check_type_reported_with_index() {
        let doc = parse(
            r#"
metadata:
  name: demo
spec:
  environment:
    type: docker
    docker: {}
  checks:
    - type: file
      path: ok
    - type: telepathy
"#,
        );
        let errs = validate_document(&doc);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("spec.checks[1].type"));
        assert!(errs[0].contains("telepathy"));
    }

    #[test]
    fn test_bad_operator_and_value_type() {
        let doc = parse(
            r#"
metadata:
  name: demo
spec:
  environment:
    type: kubernetes
    kubernetes: {}
  checks:
    - type: jsonpath
      resource: deploy/web
      jsonpath: "{.status.replicas}"
      operator: approximately
      valueType: fuzzy
"#,
        );
        let errs = validate_document(&doc);
        assert!(errs.iter().any(|e| e.contains("approximately")));
        assert!(errs.iter().any(|e| e.contains("fuzzy")));
    }

    #[test]
    fn test_hint_without_content_or_file() {
        let doc = parse(
            r#"
metadata:
  name: demo
spec:
  environment:
    type: docker
    docker: {}
  hints:
    - cost: 5
"#,
        );
        let errs = validate_document(&doc);
        assert!(errs.iter().any(|e| e.contains("spec.hints[0]")));
    }

    #[test]
    fn test_non_mapping_document() {
        let doc = parse("- just\n- a\n- list");
        assert_eq!(validate_document(&doc), vec!["document must be a mapping"]);
    }
}
