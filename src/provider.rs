//! Client for a Supabase-style hosted auth API.
//!
//! The session lives in a cookie named `sb-<project-ref>-auth-token` holding
//! the session JSON, optionally `base64-` prefixed and split into numbered
//! chunks when it outgrows a single cookie.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use time::{Duration, OffsetDateTime};

use crate::error::Error;
use crate::middleware::{CookieJar, IdentityProvider, ProviderCredentials};
use crate::types::{CookieSpec, SessionUser};

const BASE64_PREFIX: &str = "base64-";
/// Largest cookie value written before splitting into chunks.
const MAX_CHUNK_SIZE: usize = 3180;
/// Refresh this close to expiry rather than sending a dying token.
const EXPIRY_MARGIN_SECS: i64 = 10;
const SESSION_COOKIE_MAX_AGE_DAYS: i64 = 400;
const PING_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(1);

/// Session payload stored in the auth cookie.
#[derive(Debug, Clone, Deserialize)]
struct StoredSession {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

impl StoredSession {
    fn expires_soon(&self, now: OffsetDateTime) -> bool {
        self.expires_at
            .is_some_and(|at| at.saturating_sub(EXPIRY_MARGIN_SECS) <= now.unix_timestamp())
    }
}

/// Identity provider client for the hosted auth service.
pub struct AuthClient {
    base_url: String,
    anon_key: String,
    cookie_name: String,
    http: reqwest::Client,
}

impl AuthClient {
    /// Create a client; the session cookie name is derived from the URL host.
    #[must_use]
    pub fn new(credentials: ProviderCredentials) -> Self {
        let project_ref = credentials
            .url
            .host_str()
            .and_then(|host| host.split('.').next())
            .unwrap_or_default()
            .to_string();

        Self {
            base_url: credentials.url.as_str().trim_end_matches('/').to_string(),
            anon_key: credentials.anon_key,
            cookie_name: format!("sb-{project_ref}-auth-token"),
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Override the session cookie name.
    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    // ── Cookie storage ─────────────────────────────────────────────

    /// Whole cookie value, joining `name.0`, `name.1`, ... when chunked.
    fn read_cookie(&self, jar: &dyn CookieJar) -> Option<String> {
        if let Some(value) = jar.get(&self.cookie_name) {
            return Some(value.to_string());
        }

        let mut joined = String::new();
        for index in 0.. {
            match jar.get(&chunk_name(&self.cookie_name, index)) {
                Some(chunk) => joined.push_str(chunk),
                None => break,
            }
        }
        (!joined.is_empty()).then_some(joined)
    }

    /// Names of every cookie currently holding part of the session.
    fn existing_cookie_names(&self, jar: &dyn CookieJar) -> Vec<String> {
        let mut names = Vec::new();
        if jar.get(&self.cookie_name).is_some() {
            names.push(self.cookie_name.clone());
        }
        for index in 0.. {
            let name = chunk_name(&self.cookie_name, index);
            if jar.get(&name).is_none() {
                break;
            }
            names.push(name);
        }
        names
    }

    fn write_session(&self, jar: &mut dyn CookieJar, raw_json: &str) {
        let value = format!("{BASE64_PREFIX}{}", URL_SAFE_NO_PAD.encode(raw_json));
        let written: Vec<CookieSpec> = if value.len() <= MAX_CHUNK_SIZE {
            vec![session_cookie(&self.cookie_name, value)]
        } else {
            value
                .as_bytes()
                .chunks(MAX_CHUNK_SIZE)
                .enumerate()
                .map(|(index, chunk)| {
                    // base64url output is ASCII, any byte split is a char boundary
                    let chunk = String::from_utf8_lossy(chunk).into_owned();
                    session_cookie(&chunk_name(&self.cookie_name, index), chunk)
                })
                .collect()
        };

        let stale: Vec<CookieSpec> = self
            .existing_cookie_names(jar)
            .into_iter()
            .filter(|name| !written.iter().any(|c| &c.name == name))
            .map(CookieSpec::removal)
            .collect();

        jar.set_all(written.into_iter().chain(stale).collect());
    }

    fn clear_session(&self, jar: &mut dyn CookieJar) {
        let removals = self
            .existing_cookie_names(jar)
            .into_iter()
            .map(CookieSpec::removal)
            .collect();
        jar.set_all(removals);
    }

    // ── Auth API ───────────────────────────────────────────────────

    /// Exchange a refresh token for a new session, returned as raw JSON.
    async fn refresh(&self, refresh_token: &str) -> Result<String, Error> {
        if refresh_token.is_empty() {
            return Err(Error::NoRefreshToken);
        }

        let response = self
            .http
            .post(self.endpoint("/auth/v1/token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let response = Self::ensure_success(response, "token refresh").await?;
        Ok(response.text().await?)
    }

    async fn fetch_user(&self, access_token: &str) -> Result<SessionUser, Error> {
        let response = self
            .http
            .get(self.endpoint("/auth/v1/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let response = Self::ensure_success(response, "get user").await?;
        response.json::<SessionUser>().await.map_err(Into::into)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if is_missing_refresh_token(&body) {
            return Err(Error::NoRefreshToken);
        }
        Err(Error::Provider {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

impl IdentityProvider for AuthClient {
    async fn get_user(&self, jar: &mut dyn CookieJar) -> Result<Option<SessionUser>, Error> {
        let Some(raw) = self.read_cookie(jar) else {
            return Ok(None);
        };
        let mut session = decode_session(&raw)?;

        if session.expires_soon(OffsetDateTime::now_utc()) {
            let refreshed = match self.refresh(&session.refresh_token).await {
                Ok(json) => json,
                Err(e @ Error::NoRefreshToken) => {
                    self.clear_session(jar);
                    return Err(e);
                }
                Err(e) => return Err(e),
            };
            session = serde_json::from_str(&refreshed)
                .map_err(|e| Error::MalformedSession(format!("refresh response: {e}")))?;
            self.write_session(jar, &refreshed);
            tracing::debug!("Session refreshed");
        }

        self.fetch_user(&session.access_token).await.map(Some)
    }

    async fn sign_out(&self, jar: &mut dyn CookieJar) -> Result<(), Error> {
        let session = self.read_cookie(jar).and_then(|raw| decode_session(&raw).ok());
        self.clear_session(jar);

        let Some(session) = session else {
            return Ok(());
        };

        let response = self
            .http
            .post(self.endpoint("/auth/v1/logout"))
            .query(&[("scope", "local")])
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        // Already signed out or token expired: the cookies are gone either way.
        if matches!(response.status().as_u16(), 401 | 403 | 404) {
            return Ok(());
        }
        Self::ensure_success(response, "sign out").await.map(|_| ())
    }

    async fn ping(&self) -> Result<(), Error> {
        let response = self
            .http
            .head(self.endpoint("/rest/v1/"))
            .header("apikey", &self.anon_key)
            .timeout(PING_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 404 {
            return Ok(());
        }
        Err(Error::Provider {
            operation: "readiness ping",
            status: Some(status.as_u16()),
            detail: String::new(),
        })
    }
}

fn chunk_name(base: &str, index: usize) -> String {
    format!("{base}.{index}")
}

fn session_cookie(name: &str, value: String) -> CookieSpec {
    CookieSpec::new(name, value).with_max_age(Duration::days(SESSION_COOKIE_MAX_AGE_DAYS))
}

fn decode_session(raw: &str) -> Result<StoredSession, Error> {
    let json = match raw.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => {
            let bytes = URL_SAFE_NO_PAD
                .decode(encoded.trim_end_matches('='))
                .map_err(|e| Error::MalformedSession(format!("base64: {e}")))?;
            String::from_utf8(bytes).map_err(|e| Error::MalformedSession(e.to_string()))?
        }
        None => urlencoding::decode(raw)
            .map_err(|e| Error::MalformedSession(e.to_string()))?
            .into_owned(),
    };
    serde_json::from_str(&json).map_err(|e| Error::MalformedSession(format!("json: {e}")))
}

fn is_missing_refresh_token(body: &str) -> bool {
    serde_json::from_str::<JsonValue>(body).is_ok_and(|json| {
        ["error_code", "code"]
            .iter()
            .filter_map(|key| json.get(key).and_then(JsonValue::as_str))
            .any(|code| code == "refresh_token_not_found")
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::middleware::RequestCookies;

    fn client(server: &MockServer) -> AuthClient {
        AuthClient::new(ProviderCredentials::new(
            server.uri().parse().unwrap(),
            "anon-key",
        ))
    }

    fn session_json(access_token: &str, expires_at: i64) -> String {
        serde_json::json!({
            "access_token": access_token,
            "refresh_token": "refresh-1",
            "expires_at": expires_at,
            "token_type": "bearer",
        })
        .to_string()
    }

    fn encoded(json: &str) -> String {
        format!("{BASE64_PREFIX}{}", URL_SAFE_NO_PAD.encode(json))
    }

    fn far_future() -> i64 {
        OffsetDateTime::now_utc().unix_timestamp() + 3600
    }

    fn jar(cookies: &[(&str, &str)]) -> RequestCookies {
        RequestCookies::new(
            cookies
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    async fn mount_user(server: &MockServer, token: &str) {
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "user-42",
                "email": "kumu@example.org",
                "aud": "authenticated",
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn cookie_name_uses_project_ref() {
        let client = AuthClient::new(ProviderCredentials::new(
            "https://abcdefgh.supabase.co".parse().unwrap(),
            "k",
        ));
        assert_eq!(client.cookie_name(), "sb-abcdefgh-auth-token");
    }

    #[test]
    fn decodes_plain_and_base64_sessions() {
        let json = session_json("tok", 1);
        assert_eq!(decode_session(&json).unwrap().access_token, "tok");
        assert_eq!(decode_session(&encoded(&json)).unwrap().access_token, "tok");
        assert_eq!(
            decode_session(&urlencoding::encode(&json)).unwrap().access_token,
            "tok"
        );
    }

    #[test]
    fn rejects_garbage_sessions() {
        assert!(matches!(
            decode_session("base64-!!!"),
            Err(Error::MalformedSession(_))
        ));
        assert!(matches!(
            decode_session("not json"),
            Err(Error::MalformedSession(_))
        ));
    }

    #[test]
    fn expiry_check_survives_extreme_timestamps() {
        let now = OffsetDateTime::now_utc();
        let ancient =
            decode_session(r#"{"access_token":"a","expires_at":-9223372036854775808}"#).unwrap();
        assert!(ancient.expires_soon(now));

        let distant =
            decode_session(r#"{"access_token":"a","expires_at":9223372036854775807}"#).unwrap();
        assert!(!distant.expires_soon(now));

        let unknown = decode_session(r#"{"access_token":"a"}"#).unwrap();
        assert!(!unknown.expires_soon(now));
    }

    #[test]
    fn recognizes_missing_refresh_token_body() {
        assert!(is_missing_refresh_token(
            r#"{"code":400,"error_code":"refresh_token_not_found","msg":"Invalid Refresh Token"}"#
        ));
        assert!(is_missing_refresh_token(r#"{"code":"refresh_token_not_found"}"#));
        assert!(!is_missing_refresh_token(r#"{"error_code":"bad_jwt"}"#));
        assert!(!is_missing_refresh_token("oops"));
    }

    #[tokio::test]
    async fn no_cookie_means_no_user() {
        let server = MockServer::start().await;
        let mut jar = jar(&[]);

        let user = client(&server).get_user(&mut jar).await.unwrap();
        assert!(user.is_none());
        assert!(jar.pending().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn valid_session_resolves_user() {
        let server = MockServer::start().await;
        mount_user(&server, "access-1").await;
        let client = client(&server);
        let cookie = encoded(&session_json("access-1", far_future()));
        let mut jar = jar(&[(client.cookie_name(), cookie.as_str())]);

        let user = client.get_user(&mut jar).await.unwrap().expect("user");
        assert_eq!(user.id.to_string(), "user-42");
        assert_eq!(user.email.as_deref(), Some("kumu@example.org"));
        assert!(jar.pending().is_empty());
    }

    #[tokio::test]
    async fn chunked_session_is_joined() {
        let server = MockServer::start().await;
        mount_user(&server, "access-1").await;
        let client = client(&server);
        let cookie = encoded(&session_json("access-1", far_future()));
        let (first, second) = cookie.split_at(cookie.len() / 2);
        let name0 = format!("{}.0", client.cookie_name());
        let name1 = format!("{}.1", client.cookie_name());
        let mut jar = jar(&[(name0.as_str(), first), (name1.as_str(), second)]);

        let user = client.get_user(&mut jar).await.unwrap();
        assert!(user.is_some());
    }

    #[tokio::test]
    async fn expired_session_is_refreshed_and_rewritten() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(session_json("access-2", far_future())),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_user(&server, "access-2").await;

        let client = client(&server);
        let cookie = encoded(&session_json("access-1", 0));
        let mut jar = jar(&[(client.cookie_name(), cookie.as_str())]);

        let user = client.get_user(&mut jar).await.unwrap();
        assert!(user.is_some());

        let written = jar.pending();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].name, client.cookie_name());
        let rewritten = decode_session(&written[0].value).unwrap();
        assert_eq!(rewritten.access_token, "access-2");
    }

    #[tokio::test]
    async fn missing_refresh_token_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 400,
                "error_code": "refresh_token_not_found",
                "msg": "Invalid Refresh Token: Refresh Token Not Found",
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let cookie = encoded(&session_json("access-1", 0));
        let mut jar = jar(&[(client.cookie_name(), cookie.as_str())]);

        let err = client.get_user(&mut jar).await.unwrap_err();
        assert!(matches!(err, Error::NoRefreshToken));
        assert!(jar.pending().iter().all(CookieSpec::is_removal));
        assert!(jar.get(client.cookie_name()).is_none());
    }

    #[tokio::test]
    async fn rejected_token_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"msg":"bad jwt"}"#))
            .mount(&server)
            .await;

        let client = client(&server);
        let cookie = encoded(&session_json("access-1", far_future()));
        let mut jar = jar(&[(client.cookie_name(), cookie.as_str())]);

        let err = client.get_user(&mut jar).await.unwrap_err();
        assert!(matches!(err, Error::Provider { status: Some(401), .. }));
    }

    #[test]
    fn large_sessions_are_chunked_and_stale_cookies_cleared() {
        let client = AuthClient::new(ProviderCredentials::new(
            "https://abcdefgh.supabase.co".parse().unwrap(),
            "k",
        ));
        let big = serde_json::json!({
            "access_token": "a".repeat(4000),
            "refresh_token": "r",
        })
        .to_string();
        let mut jar = jar(&[("sb-abcdefgh-auth-token", "old")]);

        client.write_session(&mut jar, &big);

        let names: Vec<&str> = jar.pending().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "sb-abcdefgh-auth-token.0",
                "sb-abcdefgh-auth-token.1",
                "sb-abcdefgh-auth-token",
            ]
        );
        assert!(jar.pending()[2].is_removal());
        assert_eq!(
            decode_session(&client.read_cookie(&jar).unwrap())
                .unwrap()
                .access_token
                .len(),
            4000
        );
    }

    #[tokio::test]
    async fn sign_out_clears_cookies_and_revokes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let cookie = encoded(&session_json("access-1", far_future()));
        let mut jar = jar(&[(client.cookie_name(), cookie.as_str())]);

        client.sign_out(&mut jar).await.unwrap();
        assert_eq!(jar.pending().len(), 1);
        assert!(jar.pending()[0].is_removal());
    }

    #[tokio::test]
    async fn ping_accepts_404_root() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/rest/v1/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(client(&server).ping().await.is_ok());
    }
}
