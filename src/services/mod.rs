pub mod feed_composer;
pub mod follow_graph;
pub mod paginator;
pub mod post_service;

pub use feed_composer::{FeedComposer, FeedView};
pub use follow_graph::FollowGraph;
pub use paginator::{parse_page_number, Page, Paginator};
pub use post_service::{CommentForm, PostForm, PostService};
