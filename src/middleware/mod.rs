//! Redirect-preserving authentication gate for Axum.
//!
//! Every request passes through [`gate`]: protected paths require a session
//! resolved by the [`IdentityProvider`], anonymous visitors are sent to
//! sign-in with their destination remembered, and signed-in users are moved
//! off the public entry pages.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bb_gate::middleware::{GateConfig, GateState, protect};
//!
//! // 1. Configure from environment (provider URL/key, screenshot flag)
//! let state = GateState::from_config(GateConfig::from_env()?);
//!
//! // 2. Mount pages, then wrap them with the gate and its companion routes
//! let app = protect(
//!     axum::Router::new()
//!         .route("/", get(home))
//!         .route("/dashboard", get(dashboard)),
//!     state,
//! );
//!
//! // 3. Read the user in handlers
//! async fn dashboard(CurrentUser(user): CurrentUser) -> String { user.id.to_string() }
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod gate;
mod routes;
mod state;
mod traits;
mod types;

use axum::Router;

pub use config::{GateConfig, ProviderCredentials};
pub use cookies::RequestCookies;
pub use error::GateError;
pub use extractor::CurrentUser;
pub use gate::{evaluate, gate};
pub use routes::{
    HEALTH_PATH, READY_PATH, REDIRECT_FALLBACK_PATH, SIGN_OUT_PATH, gate_routes,
};
pub use state::GateState;
pub use traits::{CookieJar, IdentityProvider};
pub use types::{GateDecision, GateOutcome, GateRequest};

/// Merge the companion routes into `router` and put the gate in front of all of it.
pub fn protect<P: IdentityProvider>(router: Router, state: GateState<P>) -> Router {
    router
        .merge(gate_routes(state.clone()))
        .layer(axum::middleware::from_fn_with_state(state, gate::<P>))
}
