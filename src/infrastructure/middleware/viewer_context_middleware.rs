// ViewerContext Middleware
// Builds the request-scoped viewer from the identity header set by the upstream
// authentication proxy and injects it into request extensions

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::infrastructure::store::PostStore;
use crate::infrastructure::viewer::ViewerContext;

/// Header carrying the authenticated username.
pub const VIEWER_HEADER: &str = "x-authenticated-user";

/// Trait for application state that can resolve viewers
pub trait HasPostStore {
    fn post_store(&self) -> &Arc<dyn PostStore>;
}

pub async fn viewer_context_middleware<T>(
    State(app_state): State<T>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError>
where
    T: HasPostStore + Clone + Send + Sync + 'static,
{
    let username = extract_viewer_username(request.headers())?;
    let viewer_context = create_viewer_context(username, app_state.post_store().as_ref()).await?;

    request.extensions_mut().insert(viewer_context);

    Ok(next.run(request).await)
}

fn extract_viewer_username(headers: &HeaderMap) -> AppResult<Option<String>> {
    let Some(value) = headers.get(VIEWER_HEADER) else {
        return Ok(None);
    };
    let username = value
        .to_str()
        .map_err(|_| AppError::BadRequest(format!("{} header is not valid UTF-8", VIEWER_HEADER)))?
        .trim();

    if username.is_empty() {
        Ok(None)
    } else {
        Ok(Some(username.to_string()))
    }
}

/// Unknown usernames fall back to an anonymous viewer.
pub async fn create_viewer_context(
    username: Option<String>,
    store: &dyn PostStore,
) -> AppResult<Arc<ViewerContext>> {
    let request_id = format!("req-{}", Uuid::new_v4());

    let viewer_context = match username {
        Some(username) => match store.get_user_by_username(&username).await? {
            Some(user) => ViewerContext::authenticated(user, request_id),
            None => {
                warn!(%username, "unknown viewer, serving request anonymously");
                ViewerContext::anonymous(request_id)
            }
        },
        None => ViewerContext::anonymous(request_id),
    };

    Ok(Arc::new(viewer_context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::MemoryPostStore;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_viewer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(VIEWER_HEADER, HeaderValue::from_static(" auth "));

        assert_eq!(
            extract_viewer_username(&headers).unwrap(),
            Some("auth".to_string())
        );
    }

    #[test]
    fn test_missing_or_blank_header_is_anonymous() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_viewer_username(&headers).unwrap(), None);

        headers.insert(VIEWER_HEADER, HeaderValue::from_static("  "));
        assert_eq!(extract_viewer_username(&headers).unwrap(), None);
    }

    #[test]
    fn test_non_utf8_header_is_bad_request() {
        let mut headers = HeaderMap::new();
        headers.insert(VIEWER_HEADER, HeaderValue::from_bytes(b"\xff\xfe").unwrap());

        assert!(matches!(
            extract_viewer_username(&headers),
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_create_viewer_context_resolves_known_users() {
        let store = MemoryPostStore::default();
        let user = store.create_user("auth").await.unwrap();

        let known = create_viewer_context(Some("auth".into()), &store).await.unwrap();
        assert_eq!(known.user_id(), Some(user.id));
        assert!(known.request_id.starts_with("req-"));

        let unknown = create_viewer_context(Some("ghost".into()), &store).await.unwrap();
        assert!(!unknown.is_authenticated());
    }
}
