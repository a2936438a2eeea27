#![doc = include_str!("../README.md")]

pub mod error;
pub mod middleware;
#[cfg(feature = "provider")]
pub mod provider;
pub mod redirect;
pub mod signing;
pub mod types;

// Re-exports for convenient access
pub use error::Error;
pub use middleware::{
    CookieJar, CurrentUser, GateConfig, GateError, GateState, IdentityProvider,
    ProviderCredentials, gate, protect,
};
#[cfg(feature = "provider")]
pub use provider::AuthClient;
pub use redirect::{is_valid_redirect, resolve_redirect_path, with_redirect_param};
pub use signing::CookieSigner;
pub use types::{CookieSpec, RedirectIntent, SessionUser, UserId};
