use std::future::Future;

use crate::error::Error;
use crate::types::{CookieSpec, SessionUser};

/// Cookie read/write capability bound to one request/response pair.
///
/// Reads see the request cookies, overlaid by anything set earlier through
/// the same jar. Writes are collected and attached to whatever response the
/// gate finally returns.
pub trait CookieJar: Send {
    /// Current value of `name`, if any. Values are raw (not percent-decoded).
    fn get(&self, name: &str) -> Option<&str>;

    /// Queue cookies for the outgoing response.
    fn set_all(&mut self, cookies: Vec<CookieSpec>);
}

/// Delegated identity provider.
///
/// The gate calls [`get_user`](IdentityProvider::get_user) once per
/// non-static request. Implementations may refresh the session and write the
/// new session cookies through `jar`.
///
/// # Example
///
/// ```rust,ignore
/// impl IdentityProvider for MyProvider {
///     async fn get_user(&self, jar: &mut dyn CookieJar) -> Result<Option<SessionUser>, Error> {
///         let Some(token) = jar.get("session") else { return Ok(None) };
///         self.lookup(token).await
///     }
///
///     async fn sign_out(&self, jar: &mut dyn CookieJar) -> Result<(), Error> {
///         jar.set_all(vec![CookieSpec::removal("session")]);
///         Ok(())
///     }
/// }
/// ```
pub trait IdentityProvider: Send + Sync + 'static {
    /// Resolve the signed-in user from request cookies.
    ///
    /// `Ok(None)` means no session. Errors are treated as "no session" by the gate.
    fn get_user(
        &self,
        jar: &mut dyn CookieJar,
    ) -> impl Future<Output = Result<Option<SessionUser>, Error>> + Send;

    /// End the session and clear its cookies through `jar`.
    fn sign_out(&self, jar: &mut dyn CookieJar) -> impl Future<Output = Result<(), Error>> + Send;

    /// Reachability check for the readiness probe.
    fn ping(&self) -> impl Future<Output = Result<(), Error>> + Send {
        async { Ok(()) }
    }
}
