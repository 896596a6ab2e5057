// FollowGraph - directed user -> author edges feeding the personalized feed

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::infrastructure::store::PostStore;
use crate::models::{FollowEdge, UserId};

#[derive(Clone)]
pub struct FollowGraph {
    store: Arc<dyn PostStore>,
}

impl FollowGraph {
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self { store }
    }

    /// Returns `true` only when a new edge was stored. Self-follows and
    /// repeated follows are silently ignored.
    pub async fn follow(&self, user_id: UserId, author_id: UserId) -> AppResult<bool> {
        let edge = FollowEdge::new(user_id, author_id);
        if edge.is_self_follow() {
            debug!(user_id, "ignoring self-follow");
            return Ok(false);
        }

        let created = self.store.insert_follow(edge).await?;
        if created {
            info!(user_id, author_id, "follow edge created");
        } else {
            debug!(user_id, author_id, "already following");
        }
        Ok(created)
    }

    /// Removing an edge that does not exist is a no-op.
    pub async fn unfollow(&self, user_id: UserId, author_id: UserId) -> AppResult<bool> {
        let removed = self
            .store
            .delete_follow(FollowEdge::new(user_id, author_id))
            .await?;
        if removed {
            info!(user_id, author_id, "follow edge removed");
        }
        Ok(removed)
    }

    pub async fn is_following(&self, user_id: UserId, author_id: UserId) -> AppResult<bool> {
        let edge = FollowEdge::new(user_id, author_id);
        if edge.is_self_follow() {
            return Ok(false);
        }
        self.store.follow_exists(edge).await
    }

    pub async fn followed_authors(&self, user_id: UserId) -> AppResult<BTreeSet<UserId>> {
        self.store.followed_authors(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::MemoryPostStore;

    fn graph() -> FollowGraph {
        FollowGraph::new(Arc::new(MemoryPostStore::default()))
    }

    #[tokio::test]
    async fn test_follow_is_idempotent() {
        let graph = graph();

        assert!(graph.follow(1, 2).await.unwrap());
        assert!(!graph.follow(1, 2).await.unwrap());

        assert_eq!(graph.followed_authors(1).await.unwrap().len(), 1);
        assert!(graph.is_following(1, 2).await.unwrap());
        assert!(!graph.is_following(2, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_unfollow_then_unfollow_again_is_noop() {
        let graph = graph();

        graph.follow(1, 2).await.unwrap();
        assert!(graph.unfollow(1, 2).await.unwrap());
        assert!(graph.followed_authors(1).await.unwrap().is_empty());

        assert!(!graph.unfollow(1, 2).await.unwrap());
        assert!(graph.followed_authors(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_self_follow_is_ignored() {
        let graph = graph();

        assert!(!graph.follow(3, 3).await.unwrap());
        assert!(!graph.is_following(3, 3).await.unwrap());
        assert!(graph.followed_authors(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_followed_authors_is_per_user() {
        let graph = graph();

        graph.follow(1, 2).await.unwrap();
        graph.follow(1, 3).await.unwrap();
        graph.follow(4, 2).await.unwrap();

        assert_eq!(
            graph.followed_authors(1).await.unwrap(),
            [2, 3].into_iter().collect()
        );
        assert_eq!(
            graph.followed_authors(4).await.unwrap(),
            [2].into_iter().collect()
        );
    }
}
