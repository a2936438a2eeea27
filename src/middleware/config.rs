use std::fmt;

use time::Duration;
use url::Url;

use super::error::GateError;
use crate::signing::{CookieSigner, MIN_SECRET_LEN};

const DEFAULT_REDIRECT_COOKIE: &str = "bb_redirect_to";
const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 5_000;

/// Identity provider endpoint and public (anon) key.
#[derive(Clone)]
pub struct ProviderCredentials {
    pub url: Url,
    pub anon_key: String,
}

impl ProviderCredentials {
    #[must_use]
    pub fn new(url: Url, anon_key: impl Into<String>) -> Self {
        Self {
            url,
            anon_key: anon_key.into(),
        }
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

/// Request gate configuration.
///
/// Built once at startup and shared read-only by every request. Nothing in
/// the gate reads the environment after construction.
///
/// Use [`from_env()`](GateConfig::from_env) for convention-based setup,
/// or [`new()`](GateConfig::new) with `with_*` methods for full control.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub(crate) protected_prefixes: Vec<String>,
    pub(crate) entry_points: Vec<String>,
    pub(crate) internal_prefixes: Vec<String>,
    pub(crate) static_extensions: Vec<String>,
    pub(crate) credentials: Option<ProviderCredentials>,
    pub(crate) screenshot_mode: bool,
    pub(crate) sign_in_path: String,
    pub(crate) dashboard_path: String,
    pub(crate) redirect_cookie_name: String,
    pub(crate) redirect_cookie_max_age: Duration,
    pub(crate) cookie_signer: CookieSigner,
    pub(crate) provider_timeout: std::time::Duration,
    pub(crate) commit: Option<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GateConfig {
    /// Configuration with no provider credentials and the stock path sets.
    #[must_use]
    pub fn new() -> Self {
        Self {
            protected_prefixes: strings(&["/dashboard", "/collections", "/profile"]),
            entry_points: strings(&["/", "/sign-in", "/sign-up"]),
            internal_prefixes: strings(&["/_next", "/favicon", "/static", "/assets"]),
            static_extensions: strings(&[
                "css", "js", "map", "ico", "png", "jpg", "jpeg", "gif", "webp", "svg", "ttf",
                "woff", "woff2", "txt", "xml",
            ]),
            credentials: None,
            screenshot_mode: false,
            sign_in_path: "/sign-in".into(),
            dashboard_path: "/dashboard".into(),
            redirect_cookie_name: DEFAULT_REDIRECT_COOKIE.into(),
            redirect_cookie_max_age: Duration::minutes(5),
            cookie_signer: CookieSigner::generate(),
            provider_timeout: std::time::Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
            commit: None,
        }
    }

    /// Create config from process environment variables.
    ///
    /// # Env vars
    /// - `SUPABASE_URL` or `NEXT_PUBLIC_SUPABASE_URL`: provider base URL
    /// - `SUPABASE_ANON_KEY` or `NEXT_PUBLIC_SUPABASE_ANON_KEY`: provider public key
    /// - `SCREENSHOT_MODE` or `NEXT_PUBLIC_SCREENSHOT_MODE`: `"1"` enables
    ///   the loopback-only bypass
    /// - `GATE_PROVIDER_TIMEOUT_MS`: bound on the provider call (default 5000)
    /// - `GATE_COOKIE_SECRET`: key for signing the fallback cookie, at least
    ///   32 bytes. Without it a random per-process key is used.
    /// - `COMMIT_SHA` or `VERCEL_GIT_COMMIT_SHA`: reported by the health probe
    ///
    /// Missing credentials are not an error: the gate then fails closed for
    /// protected paths and open for public ones.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Config`] if the provider URL, timeout or cookie
    /// secret is invalid.
    pub fn from_env() -> Result<Self, GateError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env()`](GateConfig::from_env), reading from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Config`] if the provider URL, timeout or cookie
    /// secret is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(k))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        let url = first(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]);
        let anon_key = first(&["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"]);

        let credentials = match (url, anon_key) {
            (Some(url), Some(key)) => {
                let url: Url = url
                    .parse()
                    .map_err(|e| GateError::Config(format!("SUPABASE_URL: {e}")))?;
                Some(ProviderCredentials::new(url, key))
            }
            _ => None,
        };

        let screenshot_mode = ["SCREENSHOT_MODE", "NEXT_PUBLIC_SCREENSHOT_MODE"]
            .iter()
            .any(|k| lookup(k).as_deref() == Some("1"));

        let mut config = Self::new()
            .with_screenshot_mode(screenshot_mode)
            .with_commit(first(&["COMMIT_SHA", "VERCEL_GIT_COMMIT_SHA"]));
        config.credentials = credentials;

        if let Some(ms) = first(&["GATE_PROVIDER_TIMEOUT_MS"]) {
            let ms: u64 = ms
                .parse()
                .map_err(|e| GateError::Config(format!("GATE_PROVIDER_TIMEOUT_MS: {e}")))?;
            config = config.with_provider_timeout(std::time::Duration::from_millis(ms));
        }

        match first(&["GATE_COOKIE_SECRET"]) {
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                return Err(GateError::Config(format!(
                    "GATE_COOKIE_SECRET must be at least {MIN_SECRET_LEN} bytes"
                )));
            }
            Some(secret) => {
                let signer = CookieSigner::new(secret)
                    .map_err(|e| GateError::Config(format!("GATE_COOKIE_SECRET: {e}")))?;
                config = config.with_cookie_signer(signer);
            }
            None => tracing::warn!(
                "GATE_COOKIE_SECRET not set, fallback cookies are signed with a per-process key"
            ),
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: ProviderCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn with_protected_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_entry_points<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entry_points = paths.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_screenshot_mode(mut self, enabled: bool) -> Self {
        self.screenshot_mode = enabled;
        self
    }

    #[must_use]
    pub fn with_sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.sign_in_path = path.into();
        self
    }

    #[must_use]
    pub fn with_dashboard_path(mut self, path: impl Into<String>) -> Self {
        self.dashboard_path = path.into();
        self
    }

    #[must_use]
    pub fn with_redirect_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.redirect_cookie_name = name.into();
        self
    }

    /// Key for signing the fallback cookie. Every instance behind one
    /// hostname needs the same secret.
    #[must_use]
    pub fn with_cookie_signer(mut self, signer: CookieSigner) -> Self {
        self.cookie_signer = signer;
        self
    }

    #[must_use]
    pub fn with_provider_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_commit(mut self, commit: Option<String>) -> Self {
        self.commit = commit;
        self
    }

    #[must_use]
    pub fn credentials(&self) -> Option<&ProviderCredentials> {
        self.credentials.as_ref()
    }

    #[must_use]
    pub fn redirect_cookie_name(&self) -> &str {
        &self.redirect_cookie_name
    }

    #[must_use]
    pub fn cookie_signer(&self) -> &CookieSigner {
        &self.cookie_signer
    }

    #[must_use]
    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    #[must_use]
    pub fn dashboard_path(&self) -> &str {
        &self.dashboard_path
    }

    /// `path` equals a protected prefix or sits underneath one.
    ///
    /// `/dashboarding` is not under `/dashboard`.
    #[must_use]
    pub fn is_protected(&self, path: &str) -> bool {
        self.protected_prefixes.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    #[must_use]
    pub fn is_entry_point(&self, path: &str) -> bool {
        self.entry_points.iter().any(|p| p == path)
    }

    /// Framework internals and static files never need a session.
    #[must_use]
    pub fn is_fast_exit(&self, path: &str) -> bool {
        if self
            .internal_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return true;
        }

        let last_segment = path.rsplit('/').next().unwrap_or_default();
        last_segment.rsplit_once('.').is_some_and(|(_, ext)| {
            self.static_extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ext))
        })
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}
