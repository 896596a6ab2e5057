// FeedComposer - ordered post sequences for the global, group, profile and follow views

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::AppResult;
use crate::infrastructure::store::PostStore;
use crate::models::{feed_order, GroupId, Post, PostFilter, UserId};
use crate::services::follow_graph::FollowGraph;

/// Which feed a viewer is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedView {
    Global,
    Group(GroupId),
    Profile(UserId),
    /// Personalized feed of the given (authenticated) viewer.
    Follow(UserId),
}

#[derive(Clone)]
pub struct FeedComposer {
    store: Arc<dyn PostStore>,
    follows: FollowGraph,
}

impl FeedComposer {
    pub fn new(store: Arc<dyn PostStore>, follows: FollowGraph) -> Self {
        Self { store, follows }
    }

    /// Posts of `view`, newest first with ties broken by id.
    #[instrument(skip(self))]
    pub async fn compose(&self, view: FeedView) -> AppResult<Vec<Post>> {
        let filter = match view {
            FeedView::Global => PostFilter::All,
            FeedView::Group(group_id) => PostFilter::Group(group_id),
            FeedView::Profile(author_id) => PostFilter::Author(author_id),
            FeedView::Follow(viewer_id) => {
                let authors = self.follows.followed_authors(viewer_id).await?;
                if authors.is_empty() {
                    debug!(viewer_id, "viewer follows nobody");
                    return Ok(Vec::new());
                }
                PostFilter::Authors(authors)
            }
        };

        let mut posts = self.store.query_posts(&filter).await?;
        posts.sort_by(feed_order);
        debug!(count = posts.len(), "feed composed");
        Ok(posts)
    }

    pub async fn global_feed(&self) -> AppResult<Vec<Post>> {
        self.compose(FeedView::Global).await
    }

    pub async fn group_feed(&self, group_id: GroupId) -> AppResult<Vec<Post>> {
        self.compose(FeedView::Group(group_id)).await
    }

    pub async fn profile_feed(&self, author_id: UserId) -> AppResult<Vec<Post>> {
        self.compose(FeedView::Profile(author_id)).await
    }

    pub async fn follow_feed(&self, viewer_id: UserId) -> AppResult<Vec<Post>> {
        self.compose(FeedView::Follow(viewer_id)).await
    }
}
