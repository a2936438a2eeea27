use std::convert::Infallible;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;

use super::error::GateError;
use crate::types::SessionUser;

/// Signed-in user resolved by the gate.
///
/// The gate stores the user in request extensions when it lets a request
/// through. Returns `401 Unauthorized` if there is none, which on a
/// protected path means the gate was not mounted in front of the handler.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     format!("Hello, {}", user.id)
/// }
///
/// // Public pages can still personalize.
/// async fn catalog(user: Option<CurrentUser>) -> impl IntoResponse {
///     match user {
///         Some(CurrentUser(u)) => format!("Welcome back, {}", u.id),
///         None => "Welcome".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or(GateError::Unauthenticated)
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<SessionUser>().cloned().map(CurrentUser))
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;

    async fn whoami(CurrentUser(user): CurrentUser) -> String {
        user.id.to_string()
    }

    async fn greeting(user: Option<CurrentUser>) -> &'static str {
        if user.is_some() { "member" } else { "guest" }
    }

    fn app() -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .route("/greeting", get(greeting))
    }

    #[tokio::test]
    async fn rejects_without_user() {
        let request = Request::builder().uri("/whoami").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn extracts_user_from_extensions() {
        let mut request = Request::builder().uri("/whoami").body(Body::empty()).unwrap();
        request.extensions_mut().insert(SessionUser::new("user-7"));

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"user-7");
    }

    #[tokio::test]
    async fn optional_extraction_never_rejects() {
        let request = Request::builder().uri("/greeting").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"guest");
    }
}
