// ViewerContext middleware and extractors

pub mod viewer_context_extractor;
pub mod viewer_context_middleware;

pub use viewer_context_extractor::{found, login_redirect, LoggedIn, Vc, LOGIN_URL};
pub use viewer_context_middleware::{viewer_context_middleware, HasPostStore, VIEWER_HEADER};
