use crate::transport::DEFAULT_TIMEOUT;
use crate::types::{
    Expectation, FieldPath, Method, Predicate, RequestDescriptor, RunConfig, Scenario,
    ScenarioSuite, StatusRule,
};
use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use walkdir::WalkDir;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "PascalCase")]
pub struct RawConfig {
    pub base_url: Option<String>,
    pub auth: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum RawPredicate {
    Equals(Value),
    NotNull,
    NotEmpty,
    GreaterThan(f64),
    Matches(String),
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct RawRequest {
    pub method: Method,
    pub path: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct RawExpect {
    pub status: OneOrMany<u16>,
    pub content_type: Option<String>,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub body: IndexMap<String, OneOrMany<RawPredicate>>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct RawTest {
    pub request: RawRequest,
    pub expect: RawExpect,
    // One scenario per row; `{key}` placeholders substitute row values
    #[serde(default)]
    pub cases: Vec<IndexMap<String, Value>>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct RawSpec {
    pub config: Option<RawConfig>,
    pub tests: IndexMap<String, RawTest>,
}

#[derive(Debug, Clone)]
pub struct SuiteWithConfig {
    pub suite: ScenarioSuite,
    pub base_url: Option<String>,
    pub auth: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl SuiteWithConfig {
    /// Merges the suite's `Config` block with command-line overrides into
    /// the effective run configuration. Overrides win. A run without a base
    /// URL from either source cannot start.
    pub fn resolve(
        &self,
        base_url: Option<&str>,
        auth: Option<&str>,
        timeout_secs: Option<u64>,
    ) -> Result<RunConfig> {
        let base_url = base_url
            .map(str::to_string)
            .or_else(|| self.base_url.clone())
            .ok_or_else(|| {
                anyhow!(
                    "suite `{}` has no BaseUrl and none was given on the command line",
                    self.suite.name
                )
            })?;
        let auth = auth.map(str::to_string).or_else(|| self.auth.clone());
        let timeout = timeout_secs
            .or(self.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        Ok(RunConfig {
            base_url,
            auth,
            timeout,
        })
    }
}

/// Loads every YAML suite under `paths` (directories are walked).
pub fn load_suites(paths: &[PathBuf]) -> Result<Vec<SuiteWithConfig>> {
    let mut files = Vec::new();
    for p in paths {
        if p.is_dir() {
            for entry in WalkDir::new(p) {
                let entry = entry?;
                if entry.file_type().is_file() {
                    let path = entry.path();
                    if let Some(ext) = path.extension() {
                        if ext == "yaml" || ext == "yml" {
                            files.push(path.to_path_buf());
                        }
                    }
                }
            }
        } else {
            files.push(p.clone());
        }
    }
    let mut out = Vec::new();
    for f in files {
        let content = fs::read_to_string(&f)
            .with_context(|| format!("failed to read suite file {}", f.display()))?;
        let raw: RawSpec = serde_yaml::from_str(&content)
            .with_context(|| format!("invalid YAML in suite file {}", f.display()))?;
        let name = f
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "suite".to_string());
        out.push(
            build_suite(name, raw)
                .with_context(|| format!("invalid suite file {}", f.display()))?,
        );
    }
    Ok(out)
}

fn build_suite(name: String, raw: RawSpec) -> Result<SuiteWithConfig> {
    let config = raw.config.unwrap_or_default();
    let base_url = config
        .base_url
        .as_deref()
        .map(expand_env)
        .transpose()?
        .map(|s| s.trim().to_string());
    let auth = config
        .auth
        .as_deref()
        .map(expand_env)
        .transpose()?
        .map(|s| s.trim().to_string());

    let mut scenarios = Vec::new();
    for (test_name, test) in &raw.tests {
        let test_name = test_name.trim();
        if test.cases.is_empty() {
            scenarios.push(
                build_scenario(test_name.to_string(), test, &IndexMap::new())
                    .with_context(|| format!("test `{test_name}`"))?,
            );
        } else {
            for row in &test.cases {
                let id = match row.first() {
                    Some((key, value)) => {
                        format!("{test_name}: {key}={}", render_value(value))
                    }
                    None => test_name.to_string(),
                };
                scenarios.push(
                    build_scenario(id, test, row).with_context(|| format!("test `{test_name}`"))?,
                );
            }
        }
    }

    Ok(SuiteWithConfig {
        suite: ScenarioSuite { name, scenarios },
        base_url,
        auth,
        timeout_secs: config.timeout_secs,
    })
}

fn build_scenario(id: String, test: &RawTest, row: &IndexMap<String, Value>) -> Result<Scenario> {
    let request = build_request(&test.request, row)?;
    let expect = build_expectation(&test.expect, row)?;
    Ok(Scenario {
        id,
        request,
        expect,
    })
}

fn build_request(raw: &RawRequest, row: &IndexMap<String, Value>) -> Result<RequestDescriptor> {
    let target = match (&raw.url, &raw.path) {
        (Some(_), Some(_)) => return Err(anyhow!("request has both Url and Path")),
        (Some(url), None) => url,
        (None, Some(path)) => path,
        (None, None) => return Err(anyhow!("request needs either Path or Url")),
    };
    if raw.body.is_some() && !raw.method.allows_body() {
        return Err(anyhow!("a {} request must not carry a body", raw.method));
    }
    let mut headers = IndexMap::new();
    for (name, value) in &raw.headers {
        headers.insert(name.trim().to_string(), subst_str(value.trim(), row));
    }
    Ok(RequestDescriptor {
        method: raw.method,
        url: subst_str(target.trim(), row),
        headers,
        body: raw.body.as_ref().map(|b| subst_value(b, row)),
    })
}

fn build_expectation(raw: &RawExpect, row: &IndexMap<String, Value>) -> Result<Expectation> {
    let status = match raw.status.clone().into_vec().as_slice() {
        [] => return Err(anyhow!("expectation needs at least one Status code")),
        [one] => StatusRule::One(*one),
        many => StatusRule::OneOf(many.to_vec()),
    };
    let headers = raw
        .headers
        .iter()
        .map(|(name, value)| (name.trim().to_string(), subst_str(value.trim(), row)))
        .collect();
    let mut predicates = Vec::new();
    for (path, raw_predicates) in &raw.body {
        let path = FieldPath::parse(path);
        for raw_predicate in raw_predicates.clone().into_vec() {
            predicates.push((path.clone(), build_predicate(raw_predicate, row)?));
        }
    }
    Ok(Expectation {
        status,
        content_type: raw.content_type.as_ref().map(|ct| ct.trim().to_string()),
        headers,
        predicates,
    })
}

fn build_predicate(raw: RawPredicate, row: &IndexMap<String, Value>) -> Result<Predicate> {
    Ok(match raw {
        RawPredicate::Equals(value) => Predicate::Equals(subst_value(&value, row)),
        RawPredicate::NotNull => Predicate::NotNull,
        RawPredicate::NotEmpty => Predicate::NotEmpty,
        RawPredicate::GreaterThan(min) => Predicate::GreaterThan(min),
        RawPredicate::Matches(pattern) => {
            let pattern = subst_str(&pattern, row);
            Predicate::Matches(
                Regex::new(&pattern)
                    .with_context(|| format!("invalid Matches pattern `{pattern}`"))?,
            )
        }
    })
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn subst_str(s: &str, row: &IndexMap<String, Value>) -> String {
    let mut out = s.to_string();
    for (key, value) in row {
        out = out.replace(&format!("{{{key}}}"), &render_value(value));
    }
    out
}

/// A string that is exactly one `{key}` placeholder takes the row value
/// with its type preserved; anything else substitutes textually.
fn subst_value(value: &Value, row: &IndexMap<String, Value>) -> Value {
    match value {
        Value::String(s) => {
            if let Some(key) = s.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
                if let Some(replacement) = row.get(key) {
                    return replacement.clone();
                }
            }
            Value::String(subst_str(s, row))
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| subst_value(v, row)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), subst_value(v, row)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Expands `${VAR}` references from the environment. Referencing an unset
/// variable is a configuration error, surfaced before any scenario runs.
fn expand_env(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| anyhow!("unterminated ${{...}} reference in `{s}`"))?;
        let name = &after[..end];
        let value = std::env::var(name)
            .map_err(|_| anyhow!("environment variable `{name}` referenced by Config is not set"))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
