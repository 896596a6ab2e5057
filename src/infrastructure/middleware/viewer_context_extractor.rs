// ViewerContext extractors for handlers
// `Vc` gives any handler the request viewer; `LoggedIn` additionally requires
// an authenticated user and bounces everyone else to the login page.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::infrastructure::viewer::ViewerContext;
use crate::models::User;

/// Login endpoint owned by the authentication collaborator.
pub const LOGIN_URL: &str = "/auth/login/";

/// Cheap-to-clone handle on the request's ViewerContext.
#[derive(Debug, Clone)]
pub struct Vc(Arc<ViewerContext>);

impl Vc {
    pub fn new(vc: Arc<ViewerContext>) -> Self {
        Self(vc)
    }

    pub fn arc(self) -> Arc<ViewerContext> {
        self.0
    }
}

// Field access straight through: vc.request_id, vc.user_id(), ...
impl std::ops::Deref for Vc {
    type Target = ViewerContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Vc
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let vc = parts
            .extensions
            .get::<Arc<ViewerContext>>()
            .map(|vc| Vc(vc.clone()))
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR);

        async move { vc }
    }
}

/// An authenticated viewer.
#[derive(Debug, Clone)]
pub struct LoggedIn {
    pub user: User,
    pub vc: Vc,
}

impl<S> FromRequestParts<S> for LoggedIn
where
    S: Send + Sync,
{
    type Rejection = Response;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let result = match parts.extensions.get::<Arc<ViewerContext>>() {
            Some(vc) => match vc.user() {
                Some(user) => Ok(LoggedIn {
                    user: user.clone(),
                    vc: Vc(vc.clone()),
                }),
                None => Err(login_redirect(
                    parts
                        .uri
                        .path_and_query()
                        .map(|pq| pq.as_str())
                        .unwrap_or_else(|| parts.uri.path()),
                )),
            },
            None => Err(StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        };

        async move { result }
    }
}

/// `302 Found` pointing at `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Login page that sends the viewer back to `next` (path and query) afterwards.
pub fn login_redirect(next: &str) -> Response {
    found(&format!("{}?next={}", LOGIN_URL, encode_next(next)))
}

// Percent-encode every segment; `/` stays readable
fn encode_next(next: &str) -> String {
    next.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(vc: Option<ViewerContext>, uri: &str) -> Parts {
        let mut request = Request::builder().uri(uri).body(()).unwrap();
        if let Some(vc) = vc {
            request.extensions_mut().insert(Arc::new(vc));
        }
        request.into_parts().0
    }

    fn user() -> User {
        User {
            id: 7,
            username: "auth".into(),
        }
    }

    #[tokio::test]
    async fn test_vc_deref() {
        let mut parts = parts_with(
            Some(ViewerContext::authenticated(user(), "test-request".into())),
            "/",
        );
        let vc = Vc::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(vc.request_id, "test-request");
        assert_eq!(vc.user_id(), Some(7));
        assert_eq!(vc.arc().request_id, "test-request");
    }

    #[tokio::test]
    async fn test_logged_in_accepts_authenticated_viewer() {
        let mut parts = parts_with(
            Some(ViewerContext::authenticated(user(), "r".into())),
            "/create/",
        );
        let logged_in = LoggedIn::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(logged_in.user.username, "auth");
    }

    #[tokio::test]
    async fn test_logged_in_redirects_anonymous_to_login() {
        let mut parts = parts_with(Some(ViewerContext::anonymous("r".into())), "/create/");
        let rejection = LoggedIn::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();

        assert_eq!(rejection.status(), StatusCode::FOUND);
        assert_eq!(
            rejection.headers()[header::LOCATION],
            "/auth/login/?next=/create/"
        );
    }

    #[tokio::test]
    async fn test_login_redirect_keeps_query_and_encodes_next() {
        let mut parts = parts_with(
            Some(ViewerContext::anonymous("r".into())),
            "/follow/?page=2",
        );
        let rejection = LoggedIn::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(
            rejection.headers()[header::LOCATION],
            "/auth/login/?next=/follow/%3Fpage%3D2"
        );

        let rejection = login_redirect("/profile/a+b@c/follow/");
        assert_eq!(
            rejection.headers()[header::LOCATION],
            "/auth/login/?next=/profile/a%2Bb%40c/follow/"
        );
    }

    #[tokio::test]
    async fn test_missing_context_is_server_error() {
        let mut parts = parts_with(None, "/");
        assert_eq!(
            Vc::from_request_parts(&mut parts, &()).await.unwrap_err(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
