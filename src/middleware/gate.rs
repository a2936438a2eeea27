//! Per-request authentication gate.
//!
//! [`evaluate`] is the decision: a function of the request, the config and
//! whatever the identity provider answers. [`gate`] wraps it as Axum
//! middleware and renders the decision into a response.

use std::panic::AssertUnwindSafe;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use futures::FutureExt;

use super::config::GateConfig;
use super::cookies::{self, RequestCookies};
use super::state::GateState;
use super::traits::IdentityProvider;
use super::types::{GateDecision, GateOutcome, GateRequest};
use crate::error::Error;
use crate::redirect;
use crate::types::{CookieSpec, RedirectIntent, SessionUser};

const LOOPBACK_HOSTS: [&str; 4] = ["localhost", "127.0.0.1", "[::1]", "::1"];

/// Axum middleware running the gate in front of every route.
///
/// ```rust,ignore
/// let state = GateState::from_config(GateConfig::from_env()?);
/// let app = Router::new()
///     .route("/dashboard", get(dashboard))
///     .layer(axum::middleware::from_fn_with_state(state, gate::<AuthClient>));
/// ```
pub async fn gate<P: IdentityProvider>(
    State(state): State<GateState<P>>,
    mut request: Request,
    next: Next,
) -> Response {
    let gate_request = GateRequest::from_http(request.method(), request.uri(), request.headers());
    let GateDecision {
        outcome,
        user,
        cookies,
    } = evaluate(&gate_request, &state.config, state.provider.as_deref()).await;

    let mut response = match outcome {
        GateOutcome::Pass => {
            if let Some(user) = user {
                request.extensions_mut().insert(user);
            }
            next.run(request).await
        }
        GateOutcome::RedirectSignIn { location, .. }
        | GateOutcome::RedirectDashboard { location } => Redirect::to(&location).into_response(),
    };

    cookies::append_set_cookies(response.headers_mut(), &cookies);
    response
}

/// Decide what happens to `request`.
///
/// `provider` is `None` when credentials are not configured. Provider errors
/// and timeouts never escape: they turn into an anonymous request.
pub async fn evaluate<P: IdentityProvider>(
    request: &GateRequest,
    config: &GateConfig,
    provider: Option<&P>,
) -> GateDecision {
    let path = normalize_path(&request.path);

    if config.is_fast_exit(path) {
        return GateDecision::pass();
    }

    if config.screenshot_mode && is_loopback(request.host.as_deref()) {
        tracing::debug!(path, "Screenshot mode: gate bypassed");
        return GateDecision::pass();
    }

    let protected = config.is_protected(path);

    let Some(provider) = provider else {
        tracing::warn!(path, protected, "Identity provider not configured");
        return if protected {
            sign_in_redirect(config, path, request.query.as_deref(), Vec::new())
        } else {
            GateDecision::pass()
        };
    };

    let mut jar = RequestCookies::new(request.cookies.clone());
    let user = resolve_user(provider, &mut jar, config, path).await;
    let provider_cookies = jar.into_pending();

    match user {
        None if protected => {
            sign_in_redirect(config, path, request.query.as_deref(), provider_cookies)
        }
        Some(user) if config.is_entry_point(path) => {
            dashboard_redirect(config, user, provider_cookies)
        }
        user => GateDecision {
            outcome: GateOutcome::Pass,
            user,
            cookies: provider_cookies,
        },
    }
}

async fn resolve_user<P: IdentityProvider>(
    provider: &P,
    jar: &mut RequestCookies,
    config: &GateConfig,
    path: &str,
) -> Option<SessionUser> {
    let call = AssertUnwindSafe(provider.get_user(jar)).catch_unwind();
    let result = match tokio::time::timeout(config.provider_timeout, call).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => {
            tracing::error!(path, "Identity provider panicked, treating as anonymous");
            return None;
        }
        Err(_) => Err(Error::Timeout),
    };

    match result {
        Ok(user) => user,
        Err(e) if e.is_benign() => {
            tracing::debug!(path, error = %e, "No session to resolve");
            None
        }
        Err(e) => {
            tracing::warn!(path, error = %e, "Session resolution failed, treating as anonymous");
            None
        }
    }
}

fn sign_in_redirect(
    config: &GateConfig,
    path: &str,
    query: Option<&str>,
    mut cookies: Vec<CookieSpec>,
) -> GateDecision {
    let intent = RedirectIntent::new(path, query);
    let target = intent.target();

    cookies.push(cookies::redirect_cookie(config, &target));

    GateDecision {
        outcome: GateOutcome::RedirectSignIn {
            location: redirect::sign_in_location(&config.sign_in_path, &target),
            intent,
        },
        user: None,
        cookies,
    }
}

fn dashboard_redirect(
    config: &GateConfig,
    user: SessionUser,
    mut cookies: Vec<CookieSpec>,
) -> GateDecision {
    cookies.push(cookies::clear_redirect_cookie(&config.redirect_cookie_name));

    GateDecision {
        outcome: GateOutcome::RedirectDashboard {
            location: config.dashboard_path.clone(),
        },
        user: Some(user),
        cookies,
    }
}

/// Strip trailing slashes, keeping the root as `/`.
pub(crate) fn normalize_path(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

fn is_loopback(host: Option<&str>) -> bool {
    host.is_some_and(|h| LOOPBACK_HOSTS.contains(&h))
}
