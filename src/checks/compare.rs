//! Value comparison algebra
//!
//! Judges an observed string against an expected value under one of a fixed
//! set of operators. Shared by nearly every check kind.

use crate::catalog::types::{ComparisonSpec, Operator, ValueType};

/// Outcome of a comparison: pass/fail plus a message on failure.
pub type Verdict = (bool, String);

fn pass() -> Verdict {
    (true, String::new())
}

fn fail(message: impl Into<String>) -> Verdict {
    (false, message.into())
}

/// Apply a full comparison spec to an observed value.
pub fn compare_with_spec(actual: &str, spec: &ComparisonSpec) -> Verdict {
    compare(
        actual,
        spec.operator,
        &spec.expected_string(),
        spec.value_type,
    )
}

/// Core comparison. `exists` ignores the expected value entirely.
pub fn compare(actual: &str, operator: Operator, expected: &str, value_type: ValueType) -> Verdict {
    match operator {
        Operator::Exists => {
            if actual.is_empty() {
                fail("value not found")
            } else {
                pass()
            }
        }
        Operator::Equals => {
            if actual == expected {
                pass()
            } else {
                fail(format!("expected {expected}, got {actual}"))
            }
        }
        Operator::NotEquals => {
            if actual != expected {
                pass()
            } else {
                fail(format!("expected not {expected}, got {actual}"))
            }
        }
        Operator::Contains => {
            if actual.contains(expected) {
                pass()
            } else {
                fail(format!("expected contains {expected}, got {actual}"))
            }
        }
        Operator::Regex => match regex::Regex::new(expected) {
            Err(e) => fail(format!("invalid regex: {e}")),
            Ok(re) => {
                if re.is_match(actual) {
                    pass()
                } else {
                    fail(format!("expected {actual} to match {expected}"))
                }
            }
        },
        Operator::GreaterThan | Operator::LessThan => {
            compare_ordered(actual, expected, operator, value_type)
        }
    }
}

fn compare_ordered(
    actual: &str,
    expected: &str,
    operator: Operator,
    value_type: ValueType,
) -> Verdict {
    let (actual_num, expected_num) = match value_type {
        ValueType::Number => {
            let Ok(a) = actual.trim().parse::<f64>() else {
                return fail(format!("invalid number: {actual}"));
            };
            let Ok(e) = expected.trim().parse::<f64>() else {
                return fail(format!("invalid expected number: {expected}"));
            };
            (a, e)
        }
        ValueType::Quantity => {
            let Some(a) = parse_quantity(actual) else {
                return fail(format!("invalid quantity: {actual}"));
            };
            let Some(e) = parse_quantity(expected) else {
                return fail(format!("invalid expected quantity: {expected}"));
            };
            (a, e)
        }
        ValueType::String => return fail("valueType required for ordered comparison"),
    };

    match operator {
        Operator::GreaterThan => {
            if actual_num > expected_num {
                pass()
            } else {
                fail(format!("expected {actual} > {expected}"))
            }
        }
        _ => {
            if actual_num < expected_num {
                pass()
            } else {
                fail(format!("expected {actual} < {expected}"))
            }
        }
    }
}

/// Integer comparison used by image size/layer checks.
pub fn compare_int(actual: i64, expected: i64, operator: Operator) -> Verdict {
    match operator {
        Operator::Equals => {
            if actual == expected {
                pass()
            } else {
                fail(format!("expected {expected}, got {actual}"))
            }
        }
        Operator::NotEquals => {
            if actual != expected {
                pass()
            } else {
                fail(format!("expected not {expected}, got {actual}"))
            }
        }
        Operator::GreaterThan => {
            if actual > expected {
                pass()
            } else {
                fail(format!("expected {actual} > {expected}"))
            }
        }
        Operator::LessThan => {
            if actual < expected {
                pass()
            } else {
                fail(format!("expected {actual} < {expected}"))
            }
        }
        other => fail(format!("unsupported operator: {}", other.as_str())),
    }
}

/// Parse a magnitude with an optional unit suffix: binary (Ki, Mi, Gi, Ti,
/// Pi, Ei) or SI (m, k, M, G, T, P, E). Plain and exponent-form numbers
/// parse as-is. Magnitudes are compared as f64.
pub fn parse_quantity(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    const BINARY: &[(&str, f64)] = &[
        ("Ki", 1024.0),
        ("Mi", 1024.0 * 1024.0),
        ("Gi", 1024.0 * 1024.0 * 1024.0),
        ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("Pi", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("Ei", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ];
    const SI: &[(&str, f64)] = &[
        ("m", 1e-3),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
        ("E", 1e18),
    ];

    for (suffix, multiplier) in BINARY.iter().chain(SI) {
        if let Some(number) = value.strip_suffix(suffix) {
            // "1e3" must not be read as exa; require a clean number prefix
            if let Ok(n) = number.parse::<f64>() {
                return Some(n * multiplier);
            }
        }
    }

    value.parse::<f64>().ok()
}

/// Parse a byte size like `100MB`, `1.5GB`, `512` (binary multiples).
pub fn parse_size(value: &str) -> Result<i64, String> {
    let value = value.trim().to_uppercase();
    if value.is_empty() {
        return Err("size is empty".to_string());
    }

    let (number, multiplier) = if let Some(n) = value.strip_suffix("GB") {
        (n, 1024.0 * 1024.0 * 1024.0)
    } else if let Some(n) = value.strip_suffix("MB") {
        (n, 1024.0 * 1024.0)
    } else if let Some(n) = value.strip_suffix("KB") {
        (n, 1024.0)
    } else if let Some(n) = value.strip_suffix('B') {
        (n, 1.0)
    } else {
        (value.as_str(), 1.0)
    };

    number
        .trim()
        .parse::<f64>()
        .map(|n| (n * multiplier) as i64)
        .map_err(|_| format!("invalid size: {value}"))
}
