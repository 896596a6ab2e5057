use crate::models::{User, UserId};

/// Request-scoped identity of whoever is looking at the feed.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub request_id: String,
    pub viewer: Option<User>,
}

impl ViewerContext {
    pub fn anonymous(request_id: String) -> Self {
        ViewerContext {
            request_id,
            viewer: None,
        }
    }

    pub fn authenticated(user: User, request_id: String) -> Self {
        ViewerContext {
            request_id,
            viewer: Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.viewer.is_some()
    }

    pub fn user(&self) -> Option<&User> {
        self.viewer.as_ref()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.viewer.as_ref().map(|user| user.id)
    }
}
