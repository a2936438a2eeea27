use std::collections::BTreeMap;

use axum::http::header::HOST;
use axum::http::{HeaderMap, Method, Uri};

use super::cookies::parse_cookie_header;
use crate::types::{CookieSpec, RedirectIntent, SessionUser};

/// The parts of an incoming request the gate looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    /// Hostname without port, lowercased.
    pub host: Option<String>,
    /// Raw cookie values by name.
    pub cookies: BTreeMap<String, String>,
}

impl GateRequest {
    /// Bare `GET` for `uri` (path and optional query) with no host or cookies.
    #[must_use]
    pub fn get(uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (uri, None),
        };
        Self {
            method: Method::GET,
            path: path.to_string(),
            query,
            host: None,
            cookies: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn from_http(method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        let host = uri
            .host()
            .map(str::to_string)
            .or_else(|| {
                headers
                    .get(HOST)
                    .and_then(|v| v.to_str().ok())
                    .map(strip_port)
            })
            .map(|h| h.to_ascii_lowercase());

        Self {
            method: method.clone(),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            host,
            cookies: parse_cookie_header(headers),
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }
}

fn strip_port(authority: &str) -> String {
    if authority.starts_with('[') {
        // [::1]:3000
        match authority.find(']') {
            Some(end) => authority[..=end].to_string(),
            None => authority.to_string(),
        }
    } else {
        authority.split(':').next().unwrap_or_default().to_string()
    }
}

/// What the gate decided to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Continue to the downstream handler.
    Pass,
    /// 303 to sign-in, carrying the intended destination.
    RedirectSignIn {
        location: String,
        intent: RedirectIntent,
    },
    /// 303 away from a public entry point for a signed-in user.
    RedirectDashboard { location: String },
}

/// Outcome plus everything that must travel with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub outcome: GateOutcome,
    /// Resolved user, if any. Inserted into request extensions on pass-through.
    pub user: Option<SessionUser>,
    /// Provider cookies first, then the gate's own fallback-cookie instruction.
    pub cookies: Vec<CookieSpec>,
}

impl GateDecision {
    #[must_use]
    pub fn pass() -> Self {
        Self {
            outcome: GateOutcome::Pass,
            user: None,
            cookies: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_pass(&self) -> bool {
        matches!(self.outcome, GateOutcome::Pass)
    }

    /// Redirect target, if the outcome is a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match &self.outcome {
            GateOutcome::Pass => None,
            GateOutcome::RedirectSignIn { location, .. }
            | GateOutcome::RedirectDashboard { location } => Some(location),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use axum::http::header::COOKIE;

    use super::*;

    #[test]
    fn get_splits_query() {
        let req = GateRequest::get("/dashboard/settings?tab=grades");
        assert_eq!(req.path, "/dashboard/settings");
        assert_eq!(req.query.as_deref(), Some("tab=grades"));
        assert_eq!(GateRequest::get("/").query, None);
    }

    #[test]
    fn from_http_reads_host_header_and_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("LocalHost:3000"));
        headers.insert(COOKIE, HeaderValue::from_static("a=1"));
        let uri: Uri = "/collections?page=2".parse().unwrap();

        let req = GateRequest::from_http(&Method::GET, &uri, &headers);
        assert_eq!(req.host.as_deref(), Some("localhost"));
        assert_eq!(req.path, "/collections");
        assert_eq!(req.query.as_deref(), Some("page=2"));
        assert_eq!(req.cookies.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn strips_ipv6_port() {
        assert_eq!(strip_port("[::1]:3000"), "[::1]");
        assert_eq!(strip_port("127.0.0.1:8080"), "127.0.0.1");
        assert_eq!(strip_port("example.com"), "example.com");
    }
}
