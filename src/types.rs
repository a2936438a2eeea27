use axum_extra::extract::cookie::{Cookie, SameSite};
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use time::Duration;

/// Provider-assigned user identifier (opaque string, UUID in practice).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct UserId(pub String);

/// The authenticated user behind a request.
///
/// The gate only cares that `id` exists. `email` is carried along for
/// downstream handlers and logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

impl SessionUser {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: UserId(id.into()),
            email: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A single `Set-Cookie` instruction.
///
/// Every field is explicit. `max_age: None` is a session cookie and
/// `Some(Duration::ZERO)` with an empty value removes the cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSpec {
    pub name: String,
    pub value: String,
    pub http_only: bool,
    pub same_site: SameSite,
    pub max_age: Option<Duration>,
    pub path: String,
}

impl CookieSpec {
    /// Lax, root-scoped, script-readable session cookie.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            http_only: false,
            same_site: SameSite::Lax,
            max_age: None,
            path: "/".into(),
        }
    }

    /// Instruction that deletes `name` at `Path=/`.
    #[must_use]
    pub fn removal(name: impl Into<String>) -> Self {
        Self::new(name, "").with_max_age(Duration::ZERO)
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.max_age == Some(Duration::ZERO)
    }

    /// Build the wire cookie. The value is written as-is, callers encode it.
    #[must_use]
    pub fn to_cookie(&self) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), self.value.clone()))
            .http_only(self.http_only)
            .same_site(self.same_site)
            .path(self.path.clone());
        if let Some(max_age) = self.max_age {
            builder = builder.max_age(max_age);
        }
        builder.build()
    }

    /// Rendered `Set-Cookie` header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        self.to_cookie().to_string()
    }
}

/// Where an unauthenticated visitor was headed when the gate stopped them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectIntent {
    pub target_path: String,
    pub target_query: String,
}

impl RedirectIntent {
    #[must_use]
    pub fn new(path: impl Into<String>, query: Option<&str>) -> Self {
        Self {
            target_path: path.into(),
            target_query: query.unwrap_or_default().to_string(),
        }
    }

    /// `path` or `path?query`.
    #[must_use]
    pub fn target(&self) -> String {
        if self.target_query.is_empty() {
            self.target_path.clone()
        } else {
            format!("{}?{}", self.target_path, self.target_query)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_from_string() {
        let id = UserId::from("8d0f-user".to_string());
        assert_eq!(id.to_string(), "8d0f-user");
    }

    #[test]
    fn session_user_deserializes_without_email() {
        let user: SessionUser = serde_json::from_str(r#"{"id":"u-1"}"#).unwrap();
        assert_eq!(user, SessionUser::new("u-1"));
    }

    #[test]
    fn cookie_header_carries_every_attribute() {
        let header = CookieSpec::new("bb_redirect_to", "%2Fdashboard")
            .with_http_only(true)
            .with_max_age(Duration::seconds(300))
            .header_value();

        assert!(header.starts_with("bb_redirect_to=%2Fdashboard"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("SameSite=Lax"));
        assert!(header.contains("Path=/"));
        assert!(header.contains("Max-Age=300"));
    }

    #[test]
    fn session_cookie_has_no_max_age() {
        let header = CookieSpec::new("sb-abc-auth-token", "v").header_value();
        assert!(!header.contains("Max-Age"));
        assert!(!header.contains("HttpOnly"));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let cookie = CookieSpec::removal("bb_redirect_to");
        assert!(cookie.is_removal());
        assert!(cookie.value.is_empty());
        assert!(cookie.header_value().contains("Max-Age=0"));
    }

    #[test]
    fn intent_target_includes_query_only_when_present() {
        assert_eq!(RedirectIntent::new("/dashboard", None).target(), "/dashboard");
        assert_eq!(
            RedirectIntent::new("/dashboard/settings", Some("tab=grades")).target(),
            "/dashboard/settings?tab=grades"
        );
        assert_eq!(RedirectIntent::new("/collections", Some("")).target(), "/collections");
    }
}
