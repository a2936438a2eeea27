use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::cookies::{self, RequestCookies};
use super::error::GateError;
use super::state::GateState;
use super::traits::IdentityProvider;
use crate::error::Error;

pub const REDIRECT_FALLBACK_PATH: &str = "/api/redirect-fallback";
pub const SIGN_OUT_PATH: &str = "/dashboard/signout";
pub const HEALTH_PATH: &str = "/api/health";
pub const READY_PATH: &str = "/api/ready";

/// Companion routes for the gate: fallback reader, sign-out and probes.
pub fn gate_routes<P: IdentityProvider>(state: GateState<P>) -> Router {
    Router::new()
        .route(REDIRECT_FALLBACK_PATH, get(redirect_fallback::<P>))
        .route(SIGN_OUT_PATH, get(sign_out::<P>).post(sign_out::<P>))
        .route(HEALTH_PATH, get(health::<P>))
        .route(READY_PATH, get(ready::<P>))
        .with_state(state)
}

// ── Redirect fallback ──────────────────────────────────────────────

/// Hand back the remembered destination once, then forget it.
async fn redirect_fallback<P: IdentityProvider>(
    State(state): State<GateState<P>>,
    headers: HeaderMap,
) -> Response {
    let cookie_name = state.config.redirect_cookie_name();
    let redirect_to = cookies::parse_cookie_header(&headers)
        .get(cookie_name)
        .and_then(|raw| {
            let target = cookies::read_redirect_cookie(&state.config, raw);
            if target.is_none() {
                tracing::debug!("Discarding untrusted redirect fallback cookie");
            }
            target
        })
        .unwrap_or_default();

    let mut response = (
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
            (CACHE_CONTROL, "no-store"),
        ],
        redirect_to,
    )
        .into_response();

    cookies::append_set_cookies(
        response.headers_mut(),
        &[cookies::clear_redirect_cookie(cookie_name)],
    );
    response
}

// ── Sign-out ───────────────────────────────────────────────────────

async fn sign_out<P: IdentityProvider>(
    State(state): State<GateState<P>>,
    headers: HeaderMap,
) -> Response {
    let mut jar = RequestCookies::from_headers(&headers);
    let result = match state.provider.as_deref() {
        Some(provider) => provider.sign_out(&mut jar).await,
        None => Ok(()),
    };

    let mut response = match result {
        Err(e) => GateError::from(e).into_response(),
        Ok(()) if wants_html(&headers) => {
            // 303 so the browser follows with GET, never POST /sign-in.
            Redirect::to(state.config.sign_in_path()).into_response()
        }
        Ok(()) => Json(json!({ "ok": true })).into_response(),
    };

    cookies::append_set_cookies(response.headers_mut(), jar.pending());
    response
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

// ── Probes ─────────────────────────────────────────────────────────

async fn health<P: IdentityProvider>(State(state): State<GateState<P>>) -> Response {
    let body = json!({
        "status": "ok",
        "uptime": state.started_at.elapsed().as_secs_f64(),
        "timestamp": OffsetDateTime::now_utc().format(&Rfc3339).ok(),
        "commit": state.config.commit,
    });
    ([(CACHE_CONTROL, "no-store")], Json(body)).into_response()
}

async fn ready<P: IdentityProvider>(State(state): State<GateState<P>>) -> Response {
    let Some(provider) = state.provider.as_deref() else {
        return unready(json!({ "status": "error", "reason": "missing_provider_env" }));
    };

    match provider.ping().await {
        Ok(()) => (
            [(CACHE_CONTROL, "no-store")],
            Json(json!({ "status": "ready" })),
        )
            .into_response(),
        Err(Error::Provider { status, .. }) => unready(json!({
            "status": "error",
            "reason": "provider_unreachable",
            "code": status,
        })),
        Err(e) => {
            tracing::debug!(error = %e, "Readiness ping failed");
            unready(json!({ "status": "error", "reason": "provider_timeout_or_network" }))
        }
    }
}

fn unready(body: serde_json::Value) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(CACHE_CONTROL, "no-store")],
        Json(body),
    )
        .into_response()
}
