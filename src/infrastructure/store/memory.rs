// In-memory post store - append-only arenas with id and key indexes

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::infrastructure::clock::{Clock, SystemClock};
use crate::infrastructure::id_generator::IdGenerator;
use crate::infrastructure::store::PostStore;
use crate::models::{
    feed_order, Comment, FollowEdge, Group, GroupId, NewComment, NewGroup, NewPost, NewUser, Post,
    PostFilter, PostId, PostUpdate, User, UserId,
};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    users_by_id: HashMap<UserId, usize>,
    users_by_name: HashMap<String, usize>,
    groups: Vec<Group>,
    groups_by_id: HashMap<GroupId, usize>,
    groups_by_slug: HashMap<String, usize>,
    // Deleted posts and their comments leave `None` slots so arena indexes stay valid
    posts: Vec<Option<Post>>,
    posts_by_id: HashMap<PostId, usize>,
    comments: Vec<Option<Comment>>,
    comments_by_post: HashMap<PostId, Vec<usize>>,
    follows: HashSet<FollowEdge>,
}

impl Tables {
    fn user(&self, id: UserId) -> Option<&User> {
        self.users_by_id.get(&id).map(|&idx| &self.users[idx])
    }

    fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups_by_id.get(&id).map(|&idx| &self.groups[idx])
    }

    fn post(&self, id: PostId) -> Option<&Post> {
        self.posts_by_id
            .get(&id)
            .and_then(|&idx| self.posts[idx].as_ref())
    }

    fn check_post_refs(&self, author_id: UserId, group_id: Option<GroupId>) -> AppResult<()> {
        if self.user(author_id).is_none() {
            return Err(AppError::NotFound(format!("User {} not found", author_id)));
        }
        if let Some(group_id) = group_id {
            if self.group(group_id).is_none() {
                return Err(AppError::Validation(format!("Unknown group {}", group_id)));
            }
        }
        Ok(())
    }

    fn push_post(&mut self, post: Post) {
        self.posts_by_id.insert(post.id, self.posts.len());
        self.posts.push(Some(post));
    }
}

/// Process-local store, used for tests and the `memory` database URL.
pub struct MemoryPostStore {
    tables: RwLock<Tables>,
    ids: IdGenerator,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MemoryPostStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPostStore")
            .field("ids", &self.ids)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for MemoryPostStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), 0)
    }
}

impl MemoryPostStore {
    pub fn new(clock: Arc<dyn Clock>, id_node: u16) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            ids: IdGenerator::new(id_node),
            clock,
        }
    }
}

#[async_trait]
impl PostStore for MemoryPostStore {
    async fn create_user(&self, username: &str) -> AppResult<User> {
        NewUser {
            username: username.to_string(),
        }
        .validate()?;

        let mut tables = self.tables.write().await;
        if tables.users_by_name.contains_key(username) {
            return Err(AppError::Validation(format!(
                "Username {} is already taken",
                username
            )));
        }

        let user = User {
            id: self.ids.next_id(),
            username: username.to_string(),
        };
        let idx = tables.users.len();
        tables.users_by_id.insert(user.id, idx);
        tables.users_by_name.insert(user.username.clone(), idx);
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.user(id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users_by_name
            .get(username)
            .map(|&idx| tables.users[idx].clone()))
    }

    async fn create_group(&self, group: NewGroup) -> AppResult<Group> {
        group.validate()?;

        let mut tables = self.tables.write().await;
        if tables.groups_by_slug.contains_key(&group.slug) {
            return Err(AppError::Validation(format!(
                "Group slug {} is already taken",
                group.slug
            )));
        }

        let group = Group {
            id: self.ids.next_id(),
            title: group.title,
            slug: group.slug,
            description: group.description,
        };
        let idx = tables.groups.len();
        tables.groups_by_id.insert(group.id, idx);
        tables.groups_by_slug.insert(group.slug.clone(), idx);
        tables.groups.push(group.clone());
        Ok(group)
    }

    async fn get_group(&self, id: GroupId) -> AppResult<Option<Group>> {
        Ok(self.tables.read().await.group(id).cloned())
    }

    async fn get_group_by_slug(&self, slug: &str) -> AppResult<Option<Group>> {
        let tables = self.tables.read().await;
        Ok(tables
            .groups_by_slug
            .get(slug)
            .map(|&idx| tables.groups[idx].clone()))
    }

    async fn list_groups(&self) -> AppResult<Vec<Group>> {
        let mut groups = self.tables.read().await.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn create_post(&self, post: NewPost) -> AppResult<Post> {
        let mut created = self.create_posts(vec![post]).await?;
        created
            .pop()
            .ok_or_else(|| AppError::Internal("Post insert returned nothing".to_string()))
    }

    async fn create_posts(&self, posts: Vec<NewPost>) -> AppResult<Vec<Post>> {
        let mut tables = self.tables.write().await;
        for post in &posts {
            tables.check_post_refs(post.author_id, post.group_id)?;
        }

        let now = self.clock.now();
        let mut created = Vec::with_capacity(posts.len());
        for new_post in posts {
            let post = Post {
                id: self.ids.next_id(),
                author_id: new_post.author_id,
                text: new_post.text,
                group_id: new_post.group_id,
                image: new_post.image,
                created_at: now,
            };
            tables.push_post(post.clone());
            created.push(post);
        }
        Ok(created)
    }

    async fn get_post(&self, id: PostId) -> AppResult<Option<Post>> {
        Ok(self.tables.read().await.post(id).cloned())
    }

    async fn update_post(&self, id: PostId, update: PostUpdate) -> AppResult<Option<Post>> {
        let mut tables = self.tables.write().await;
        let Some(&idx) = tables.posts_by_id.get(&id) else {
            return Ok(None);
        };
        if let Some(group_id) = update.group_id {
            if tables.group(group_id).is_none() {
                return Err(AppError::Validation(format!("Unknown group {}", group_id)));
            }
        }

        let Some(post) = tables.posts[idx].as_mut() else {
            return Ok(None);
        };
        post.text = update.text;
        post.group_id = update.group_id;
        if update.image.is_some() {
            post.image = update.image;
        }
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: PostId) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(idx) = tables.posts_by_id.remove(&id) else {
            return Ok(false);
        };
        tables.posts[idx] = None;
        let comment_indexes = tables.comments_by_post.remove(&id).unwrap_or_default();
        for comment_idx in comment_indexes {
            tables.comments[comment_idx] = None;
        }
        Ok(true)
    }

    async fn query_posts(&self, filter: &PostFilter) -> AppResult<Vec<Post>> {
        let tables = self.tables.read().await;
        let mut posts: Vec<Post> = tables
            .posts
            .iter()
            .flatten()
            .filter(|post| filter.matches(post))
            .cloned()
            .collect();
        posts.sort_by(feed_order);
        Ok(posts)
    }

    async fn create_comment(&self, comment: NewComment) -> AppResult<Comment> {
        let mut tables = self.tables.write().await;
        if tables.post(comment.post_id).is_none() {
            return Err(AppError::NotFound(format!("Post {} not found", comment.post_id)));
        }
        if tables.user(comment.author_id).is_none() {
            return Err(AppError::NotFound(format!("User {} not found", comment.author_id)));
        }

        let comment = Comment {
            id: self.ids.next_id(),
            post_id: comment.post_id,
            author_id: comment.author_id,
            text: comment.text,
            created_at: self.clock.now(),
        };
        let idx = tables.comments.len();
        tables
            .comments_by_post
            .entry(comment.post_id)
            .or_default()
            .push(idx);
        tables.comments.push(Some(comment.clone()));
        Ok(comment)
    }

    async fn comments_for_post(&self, post_id: PostId) -> AppResult<Vec<Comment>> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments_by_post
            .get(&post_id)
            .map(|indexes| {
                indexes
                    .iter()
                    .filter_map(|&idx| tables.comments[idx].clone())
                    .collect()
            })
            .unwrap_or_default();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn insert_follow(&self, edge: FollowEdge) -> AppResult<bool> {
        Ok(self.tables.write().await.follows.insert(edge))
    }

    async fn delete_follow(&self, edge: FollowEdge) -> AppResult<bool> {
        Ok(self.tables.write().await.follows.remove(&edge))
    }

    async fn follow_exists(&self, edge: FollowEdge) -> AppResult<bool> {
        Ok(self.tables.read().await.follows.contains(&edge))
    }

    async fn followed_authors(&self, user_id: UserId) -> AppResult<BTreeSet<UserId>> {
        Ok(self
            .tables
            .read()
            .await
            .follows
            .iter()
            .filter(|edge| edge.user_id == user_id)
            .map(|edge| edge.author_id)
            .collect())
    }
}
