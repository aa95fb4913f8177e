use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }

    /// GET, HEAD and DELETE exchanges must not carry a body.
    pub fn allows_body(self) -> bool {
        !matches!(self, Method::Get | Method::Head | Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective configuration for one run: resolved before any scenario
/// executes and passed down explicitly, never held in global state.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub base_url: String,
    /// Opaque `Authorization` header value.
    pub auth: Option<String>,
    /// Per-exchange timeout.
    pub timeout: Duration,
}

/// One HTTP exchange to perform. `url` holds the suite-relative path until
/// [`RequestDescriptor::resolve`] joins it onto the configured base URL.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: IndexMap<String, String>,
    pub body: Option<Value>,
}

impl RequestDescriptor {
    /// Builds the descriptor actually sent: absolute URL plus the configured
    /// authorization header, unless the scenario already set one.
    pub fn resolve(&self, cfg: &RunConfig) -> RequestDescriptor {
        let url = if self.url.starts_with("http://") || self.url.starts_with("https://") {
            self.url.clone()
        } else {
            format!(
                "{}/{}",
                cfg.base_url.trim_end_matches('/'),
                self.url.trim_start_matches('/')
            )
        };
        let mut headers = self.headers.clone();
        if let Some(auth) = &cfg.auth {
            if !headers.keys().any(|k| k.eq_ignore_ascii_case("authorization")) {
                headers.insert("Authorization".to_string(), auth.clone());
            }
        }
        RequestDescriptor {
            method: self.method,
            url,
            headers,
            body: self.body.clone(),
        }
    }
}

/// Acceptable status codes for a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusRule {
    One(u16),
    OneOf(Vec<u16>),
}

impl StatusRule {
    pub fn matches(&self, status: u16) -> bool {
        match self {
            StatusRule::One(code) => *code == status,
            StatusRule::OneOf(codes) => codes.contains(&status),
        }
    }
}

impl fmt::Display for StatusRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusRule::One(code) => write!(f, "{code}"),
            StatusRule::OneOf(codes) => {
                let list: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
                write!(f, "one of [{}]", list.join(", "))
            }
        }
    }
}

/// Dot-separated access path into a parsed JSON body. Numeric segments
/// index arrays; the empty path (or `$`) denotes the whole body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> FieldPath {
        let raw = raw.trim();
        if raw.is_empty() || raw == "$" {
            return FieldPath {
                segments: Vec::new(),
            };
        }
        FieldPath {
            segments: raw.split('.').map(|s| s.trim().to_string()).collect(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Descends into `body` segment by segment. `None` means a key or index
    /// was absent, which callers report as a mismatch rather than a fault.
    pub fn resolve<'a>(&self, body: &'a Value) -> Option<&'a Value> {
        let mut current = body;
        for segment in &self.segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("$")
        } else {
            f.write_str(&self.segments.join("."))
        }
    }
}

/// A single check against one field of the parsed body.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Deep structural equality: order-sensitive for arrays,
    /// key-set-and-value equality for objects.
    Equals(Value),
    NotNull,
    /// Non-empty array, object or string.
    NotEmpty,
    GreaterThan(f64),
    Matches(Regex),
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Equals(v) => write!(f, "equals({v})"),
            Predicate::NotNull => f.write_str("not_null()"),
            Predicate::NotEmpty => f.write_str("not_empty()"),
            Predicate::GreaterThan(min) => write!(f, "greater_than({min})"),
            Predicate::Matches(re) => write!(f, "matches({})", re.as_str()),
        }
    }
}

/// What a correct response must satisfy. Checks run in declaration order:
/// status, content type, headers, body predicates.
#[derive(Debug, Clone)]
pub struct Expectation {
    pub status: StatusRule,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub predicates: Vec<(FieldPath, Predicate)>,
}

impl Expectation {
    pub fn check_count(&self) -> usize {
        1 + usize::from(self.content_type.is_some()) + self.headers.len() + self.predicates.len()
    }
}

/// One specific contract violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub check: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, Default)]
pub struct Verdict {
    pub passed: bool,
    pub mismatches: Vec<Mismatch>,
}

impl Verdict {
    pub fn from_mismatches(mismatches: Vec<Mismatch>) -> Verdict {
        Verdict {
            passed: mismatches.is_empty(),
            mismatches,
        }
    }
}

/// One complete (request, expectation) unit of verification.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub id: String,
    pub request: RequestDescriptor,
    pub expect: Expectation,
}

#[derive(Debug, Clone)]
pub struct ScenarioSuite {
    pub name: String,
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub id: String,
    pub verdict: Verdict,
    /// Transport-level failure message; the scenario counts as errored.
    pub error: Option<String>,
    pub elapsed: Duration,
    /// Rendered exchange trace, captured when the verdict failed.
    pub diagnostics: Option<String>,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.verdict.passed
    }

    pub fn errored(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total: usize,  // Total number of scenarios
    pub passed: usize, // Number of passed scenarios
    pub failed: usize, // Number of failed scenarios, errored included
    pub errored: usize,
    pub cases: Vec<ScenarioResult>,

    // Check-level counts for more granular reporting
    pub total_checks: usize,
    pub passed_checks: usize,
    pub failed_checks: usize,
}

impl RunSummary {
    pub fn merge(&mut self, other: RunSummary) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.errored += other.errored;
        self.total_checks += other.total_checks;
        self.passed_checks += other.passed_checks;
        self.failed_checks += other.failed_checks;
        self.cases.extend(other.cases);
    }
}
