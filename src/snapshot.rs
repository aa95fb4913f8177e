use indexmap::IndexMap;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// The body claimed a parseable content type but could not be parsed.
#[derive(Debug, Clone, Error)]
#[error("body is not parseable JSON: {0}")]
pub struct MalformedBody(pub String);

/// Normalized capture of one HTTP exchange's result. Created exactly once
/// per exchange and read-only afterward; the JSON parse of the body is
/// deferred to first access and cached, so scenarios that never look at the
/// body pay nothing and cannot fail on it.
#[derive(Debug)]
pub struct ResponseSnapshot {
    status: u16,
    headers: IndexMap<String, String>,
    body: Vec<u8>,
    elapsed: Duration,
    parsed: OnceLock<Result<Value, MalformedBody>>,
}

impl ResponseSnapshot {
    pub fn new(
        status: u16,
        headers: IndexMap<String, String>,
        body: Vec<u8>,
        elapsed: Duration,
    ) -> ResponseSnapshot {
        ResponseSnapshot {
            status,
            headers,
            body,
            elapsed,
            parsed: OnceLock::new(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Headers in insertion order, as received from the transport.
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    pub fn body_raw(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Media-type token of the content type, parameters stripped.
    pub fn media_type(&self) -> Option<&str> {
        self.content_type()
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
    }

    pub fn is_json(&self) -> bool {
        match self.media_type() {
            Some(token) => {
                let token = token.to_ascii_lowercase();
                token.ends_with("/json") || token.ends_with("+json")
            }
            None => false,
        }
    }

    /// The body parsed as JSON, computed on first access and cached. Fails
    /// when the content type does not indicate JSON, or claims JSON but the
    /// bytes do not parse.
    pub fn body_json(&self) -> Result<&Value, MalformedBody> {
        let parsed = self.parsed.get_or_init(|| {
            if !self.is_json() {
                return Err(MalformedBody(format!(
                    "content type `{}` does not indicate JSON",
                    self.content_type().unwrap_or("<missing>")
                )));
            }
            serde_json::from_slice(&self.body).map_err(|e| MalformedBody(e.to_string()))
        });
        match parsed {
            Ok(value) => Ok(value),
            Err(e) => Err(e.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(content_type: &str, body: &[u8]) -> ResponseSnapshot {
        let mut headers = IndexMap::new();
        headers.insert("Content-Type".to_string(), content_type.to_string());
        ResponseSnapshot::new(200, headers, body.to_vec(), Duration::from_millis(1))
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let snap = snapshot("application/json", b"{}");
        assert_eq!(snap.header("content-type"), Some("application/json"));
        assert_eq!(snap.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(snap.header("x-missing"), None);
    }

    #[test]
    fn media_type_strips_parameters() {
        let snap = snapshot("application/json; charset=utf-8", b"{}");
        assert_eq!(snap.media_type(), Some("application/json"));
        assert!(snap.is_json());
    }

    #[test]
    fn body_parses_lazily_and_caches() {
        let snap = snapshot("application/json; charset=utf-8", br#"{"id": 1}"#);
        let first = snap.body_json().expect("valid JSON");
        assert_eq!(first, &json!({"id": 1}));
        // Second access returns the same cached value
        let second = snap.body_json().expect("cached JSON");
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn malformed_json_reports_error_not_panic() {
        let snap = snapshot("application/json", b"{not json");
        assert!(snap.body_json().is_err());
        // The failure is cached too
        assert!(snap.body_json().is_err());
    }

    #[test]
    fn non_json_content_type_refuses_parse() {
        let snap = snapshot("text/html", b"<html></html>");
        let err = snap.body_json().unwrap_err();
        assert!(err.to_string().contains("text/html"));
    }

    #[test]
    fn suffixed_json_media_types_count_as_json() {
        let snap = snapshot("application/hal+json", br#"{"ok": true}"#);
        assert!(snap.is_json());
        assert!(snap.body_json().is_ok());
    }
}
