// Post store interface - persistence collaborator behind the feed services
// Holds users, groups, posts, comments and follow edges.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::AppResult;
use crate::models::{
    Comment, FollowEdge, Group, GroupId, NewComment, NewGroup, NewPost, Post, PostFilter, PostId,
    PostUpdate, User, UserId,
};

pub use memory::MemoryPostStore;
pub use sqlite::SqlitePostStore;

/// Storage operations used by the feed, follow and post services.
///
/// `query_posts` must return posts in feed order (created_at desc, id desc).
/// Follow-edge writes are atomic per edge and report whether they changed anything.
#[async_trait]
pub trait PostStore: Send + Sync {
    // Users
    async fn create_user(&self, username: &str) -> AppResult<User>;
    async fn get_user(&self, id: UserId) -> AppResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>>;

    // Groups
    async fn create_group(&self, group: NewGroup) -> AppResult<Group>;
    async fn get_group(&self, id: GroupId) -> AppResult<Option<Group>>;
    async fn get_group_by_slug(&self, slug: &str) -> AppResult<Option<Group>>;
    async fn list_groups(&self) -> AppResult<Vec<Group>>;

    // Posts
    async fn create_post(&self, post: NewPost) -> AppResult<Post>;
    /// Store several posts under a single creation timestamp.
    async fn create_posts(&self, posts: Vec<NewPost>) -> AppResult<Vec<Post>>;
    async fn get_post(&self, id: PostId) -> AppResult<Option<Post>>;
    async fn update_post(&self, id: PostId, update: PostUpdate) -> AppResult<Option<Post>>;
    /// Removes the post together with its comments.
    async fn delete_post(&self, id: PostId) -> AppResult<bool>;
    async fn query_posts(&self, filter: &PostFilter) -> AppResult<Vec<Post>>;

    // Comments
    async fn create_comment(&self, comment: NewComment) -> AppResult<Comment>;
    /// Oldest first.
    async fn comments_for_post(&self, post_id: PostId) -> AppResult<Vec<Comment>>;

    // Follow edges
    async fn insert_follow(&self, edge: FollowEdge) -> AppResult<bool>;
    async fn delete_follow(&self, edge: FollowEdge) -> AppResult<bool>;
    async fn follow_exists(&self, edge: FollowEdge) -> AppResult<bool>;
    async fn followed_authors(&self, user_id: UserId) -> AppResult<BTreeSet<UserId>>;
}
