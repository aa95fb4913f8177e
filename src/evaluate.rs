use crate::snapshot::ResponseSnapshot;
use crate::types::{Expectation, FieldPath, Mismatch, Predicate, Verdict};
use serde_json::Value;

/// Compares a response snapshot against an expectation. Pure and
/// deterministic; every check runs so the verdict captures all violations
/// in one pass, not just the first.
pub fn evaluate(snapshot: &ResponseSnapshot, expect: &Expectation) -> Verdict {
    let mut mismatches = Vec::new();

    if !expect.status.matches(snapshot.status()) {
        mismatches.push(Mismatch {
            check: "status".to_string(),
            expected: expect.status.to_string(),
            actual: snapshot.status().to_string(),
        });
    }

    if let Some(want) = &expect.content_type {
        let actual = snapshot.content_type();
        if !actual.is_some_and(|ct| content_type_matches(want, ct)) {
            mismatches.push(Mismatch {
                check: "content-type".to_string(),
                expected: want.clone(),
                actual: actual.unwrap_or("<missing>").to_string(),
            });
        }
    }

    for (name, want) in &expect.headers {
        match snapshot.header(name) {
            Some(actual) if actual == want => {}
            Some(actual) => mismatches.push(Mismatch {
                check: format!("header {name}"),
                expected: want.clone(),
                actual: actual.to_string(),
            }),
            None => mismatches.push(Mismatch {
                check: format!("header {name}"),
                expected: want.clone(),
                actual: "<missing>".to_string(),
            }),
        }
    }

    if !expect.predicates.is_empty() {
        match snapshot.body_json() {
            Ok(body) => {
                for (path, predicate) in &expect.predicates {
                    if let Some(mismatch) = check_predicate(body, path, predicate) {
                        mismatches.push(mismatch);
                    }
                }
            }
            // One violation, attributed to the first predicate that needed
            // the parsed body; the rest share the same root cause.
            Err(e) => {
                let (path, predicate) = &expect.predicates[0];
                mismatches.push(Mismatch {
                    check: check_label(path, predicate),
                    expected: predicate.to_string(),
                    actual: e.to_string(),
                });
            }
        }
    }

    Verdict::from_mismatches(mismatches)
}

/// Media-type tokens compare case-insensitively. Parameters (charset) only
/// count when the expectation itself pins them.
pub fn content_type_matches(expected: &str, actual: &str) -> bool {
    if expected.contains(';') {
        normalize_content_type(expected) == normalize_content_type(actual)
    } else {
        let actual_token = actual.split(';').next().unwrap_or(actual).trim();
        expected.trim().eq_ignore_ascii_case(actual_token)
    }
}

fn normalize_content_type(value: &str) -> String {
    value
        .split(';')
        .map(|part| part.trim().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("; ")
}

fn check_label(path: &FieldPath, predicate: &Predicate) -> String {
    format!("body {path}: {predicate}")
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn check_predicate(body: &Value, path: &FieldPath, predicate: &Predicate) -> Option<Mismatch> {
    let Some(actual) = path.resolve(body) else {
        return Some(Mismatch {
            check: check_label(path, predicate),
            expected: predicate.to_string(),
            actual: "field not found".to_string(),
        });
    };

    let violation: Option<(String, String)> = match predicate {
        Predicate::Equals(want) => {
            (actual != want).then(|| (render(want), render(actual)))
        }
        Predicate::NotNull => actual
            .is_null()
            .then(|| ("non-null value".to_string(), "null".to_string())),
        Predicate::NotEmpty => {
            let is_empty = match actual {
                Value::Array(items) => Some(items.is_empty()),
                Value::Object(map) => Some(map.is_empty()),
                Value::String(s) => Some(s.is_empty()),
                _ => None,
            };
            match is_empty {
                None => Some((
                    "non-empty value".to_string(),
                    format!("not a collection or string: {}", render(actual)),
                )),
                Some(true) => Some(("non-empty value".to_string(), "empty".to_string())),
                Some(false) => None,
            }
        }
        Predicate::GreaterThan(min) => match actual.as_f64() {
            None => Some((
                format!("number > {min}"),
                format!("not a number: {}", render(actual)),
            )),
            Some(n) if n <= *min => Some((format!("number > {min}"), n.to_string())),
            Some(_) => None,
        },
        Predicate::Matches(re) => match actual.as_str() {
            None => Some((
                format!("string matching /{}/", re.as_str()),
                format!("not a string: {}", render(actual)),
            )),
            Some(s) if !re.is_match(s) => {
                Some((format!("string matching /{}/", re.as_str()), s.to_string()))
            }
            Some(_) => None,
        },
    };

    violation.map(|(expected, actual)| Mismatch {
        check: check_label(path, predicate),
        expected,
        actual,
    })
}
