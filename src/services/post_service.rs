// PostService - author-side writes: posts, comments, and the admin/seeding paths for users and groups

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::infrastructure::store::PostStore;
use crate::models::{
    Comment, Group, GroupId, NewComment, NewGroup, NewPost, Post, PostId, PostUpdate, User,
};

/// Body of the create and edit endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct PostForm {
    pub text: String,
    #[serde(default)]
    pub group: Option<GroupId>,
    #[serde(default)]
    pub image: Option<String>,
}

impl PostForm {
    fn validate(&self) -> AppResult<()> {
        if self.text.trim().is_empty() {
            return Err(AppError::Validation("Post text is required".to_string()));
        }
        if matches!(&self.image, Some(image) if image.trim().is_empty()) {
            return Err(AppError::Validation("Image reference is empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentForm {
    pub text: String,
}

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn PostStore>,
}

impl PostService {
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self { store }
    }

    pub async fn register_user(&self, username: &str) -> AppResult<User> {
        let user = self.store.create_user(username).await?;
        info!(user_id = user.id, username = %user.username, "user registered");
        Ok(user)
    }

    pub async fn create_group(&self, group: NewGroup) -> AppResult<Group> {
        let group = self.store.create_group(group).await?;
        info!(group_id = group.id, slug = %group.slug, "group created");
        Ok(group)
    }

    /// New posts are not pushed into the cached global feed.
    pub async fn create_post(&self, author: &User, form: PostForm) -> AppResult<Post> {
        form.validate()?;
        let post = self
            .store
            .create_post(NewPost {
                author_id: author.id,
                text: form.text,
                group_id: form.group,
                image: form.image,
            })
            .await?;
        info!(post_id = post.id, author_id = author.id, "post created");
        Ok(post)
    }

    /// Only the author may edit; anyone else gets `Forbidden`.
    pub async fn edit_post(&self, editor: &User, post_id: PostId, form: PostForm) -> AppResult<Post> {
        self.owned_post(editor, post_id).await?;
        form.validate()?;

        let post = self
            .store
            .update_post(
                post_id,
                PostUpdate {
                    text: form.text,
                    group_id: form.group,
                    image: form.image,
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;
        info!(post_id, "post edited");
        Ok(post)
    }

    pub async fn delete_post(&self, user: &User, post_id: PostId) -> AppResult<()> {
        self.owned_post(user, post_id).await?;
        self.store.delete_post(post_id).await?;
        info!(post_id, "post deleted");
        Ok(())
    }

    /// A blank comment is dropped without error; `None` tells the caller nothing was stored.
    pub async fn add_comment(
        &self,
        author: &User,
        post_id: PostId,
        form: CommentForm,
    ) -> AppResult<Option<Comment>> {
        self.get_post(post_id).await?;
        if form.text.trim().is_empty() {
            debug!(post_id, "blank comment ignored");
            return Ok(None);
        }

        let comment = self
            .store
            .create_comment(NewComment {
                post_id,
                author_id: author.id,
                text: form.text,
            })
            .await?;
        info!(post_id, comment_id = comment.id, "comment added");
        Ok(Some(comment))
    }

    pub async fn get_post(&self, post_id: PostId) -> AppResult<Post> {
        self.store
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))
    }

    pub async fn post_detail(&self, post_id: PostId) -> AppResult<(Post, Vec<Comment>)> {
        let post = self.get_post(post_id).await?;
        let comments = self.store.comments_for_post(post_id).await?;
        Ok((post, comments))
    }

    async fn owned_post(&self, user: &User, post_id: PostId) -> AppResult<Post> {
        let post = self.get_post(post_id).await?;
        if post.author_id != user.id {
            return Err(AppError::Forbidden(format!(
                "User {} is not the author of post {}",
                user.id, post_id
            )));
        }
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::MemoryPostStore;

    async fn service_with_users() -> (PostService, User, User) {
        let service = PostService::new(Arc::new(MemoryPostStore::default()));
        let author = service.register_user("auth").await.unwrap();
        let other = service.register_user("other").await.unwrap();
        (service, author, other)
    }

    fn form(text: &str) -> PostForm {
        PostForm {
            text: text.to_string(),
            group: None,
            image: None,
        }
    }

    #[tokio::test]
    async fn test_create_post_sets_author_and_group() {
        let (service, author, _) = service_with_users().await;
        let group = service
            .create_group(NewGroup {
                title: "test_group".into(),
                slug: "test_slug".into(),
                description: "Описание".into(),
            })
            .await
            .unwrap();

        let post = service
            .create_post(
                &author,
                PostForm {
                    text: "Тестовый текст2".into(),
                    group: Some(group.id),
                    image: Some("posts/small.gif".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(post.author_id, author.id);
        assert_eq!(post.group_id, Some(group.id));
        assert_eq!(post.image.as_deref(), Some("posts/small.gif"));
    }

    #[tokio::test]
    async fn test_blank_text_is_rejected() {
        let (service, author, _) = service_with_users().await;
        assert!(matches!(
            service.create_post(&author, form("   ")).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_only_author_can_edit_or_delete() {
        let (service, author, other) = service_with_users().await;
        let post = service.create_post(&author, form("original")).await.unwrap();

        assert!(matches!(
            service.edit_post(&other, post.id, form("hijacked")).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete_post(&other, post.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(service.get_post(post.id).await.unwrap().text, "original");

        let edited = service.edit_post(&author, post.id, form("edited")).await.unwrap();
        assert_eq!(edited.text, "edited");
        assert_eq!(edited.author_id, author.id);

        service.delete_post(&author, post.id).await.unwrap();
        assert!(matches!(
            service.get_post(post.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_edit_missing_post_is_not_found() {
        let (service, author, _) = service_with_users().await;
        assert!(matches!(
            service.edit_post(&author, 404, form("x")).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_comments_append_in_order() {
        let (service, author, other) = service_with_users().await;
        let post = service.create_post(&author, form("post")).await.unwrap();

        service
            .add_comment(&other, post.id, CommentForm { text: "first".into() })
            .await
            .unwrap();
        let blank = service
            .add_comment(&other, post.id, CommentForm { text: " ".into() })
            .await
            .unwrap();
        assert!(blank.is_none());
        service
            .add_comment(&author, post.id, CommentForm { text: "second".into() })
            .await
            .unwrap();

        let (_, comments) = service.post_detail(post.id).await.unwrap();
        let texts: Vec<_> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(comments[0].author_id, other.id);
    }

    #[tokio::test]
    async fn test_comment_on_missing_post_is_not_found() {
        let (service, author, _) = service_with_users().await;
        assert!(matches!(
            service
                .add_comment(&author, 1, CommentForm { text: "hi".into() })
                .await,
            Err(AppError::NotFound(_))
        ));
    }
}
