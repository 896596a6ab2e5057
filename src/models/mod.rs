// Blog domain model - users, groups, posts, comments and follow edges

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{AppError, AppResult};

pub type UserId = i64;
pub type GroupId = i64;
pub type PostId = i64;
pub type CommentId = i64;

/// Characters shown by a post's short display form.
pub const POST_EXCERPT_CHARS: usize = 15;
pub const USERNAME_MAX_CHARS: usize = 150;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid"));
static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub text: String,
    pub group_id: Option<GroupId>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn excerpt(&self) -> &str {
        match self.text.char_indices().nth(POST_EXCERPT_CHARS) {
            Some((idx, _)) => &self.text[..idx],
            None => &self.text,
        }
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.excerpt())
    }
}

/// Total feed order: newest first, ties on the timestamp broken by the larger id.
pub fn feed_order(a: &Post, b: &Post) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FollowEdge {
    pub user_id: UserId,
    pub author_id: UserId,
}

impl FollowEdge {
    pub fn new(user_id: UserId, author_id: UserId) -> Self {
        Self { user_id, author_id }
    }

    pub fn is_self_follow(&self) -> bool {
        self.user_id == self.author_id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
}

impl NewUser {
    pub fn validate(&self) -> AppResult<()> {
        if self.username.chars().count() > USERNAME_MAX_CHARS || !USERNAME_RE.is_match(&self.username) {
            return Err(AppError::Validation(format!(
                "Invalid username: {:?}",
                self.username
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

impl NewGroup {
    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("Group title is required".to_string()));
        }
        if !SLUG_RE.is_match(&self.slug) {
            return Err(AppError::Validation(format!("Invalid slug: {:?}", self.slug)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: UserId,
    pub text: String,
    pub group_id: Option<GroupId>,
    pub image: Option<String>,
}

/// Editable part of a post. `image: None` keeps the stored image.
#[derive(Debug, Clone)]
pub struct PostUpdate {
    pub text: String,
    pub group_id: Option<GroupId>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: PostId,
    pub author_id: UserId,
    pub text: String,
}

/// Selection predicate behind every feed view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(GroupId),
    Author(UserId),
    Authors(BTreeSet<UserId>),
}

impl PostFilter {
    pub fn matches(&self, post: &Post) -> bool {
        match self {
            PostFilter::All => true,
            PostFilter::Group(group_id) => post.group_id == Some(*group_id),
            PostFilter::Author(author_id) => post.author_id == *author_id,
            PostFilter::Authors(authors) => authors.contains(&post.author_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(id: PostId, secs: i64) -> Post {
        Post {
            id,
            author_id: 1,
            text: format!("post {}", id),
            group_id: None,
            image: None,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_feed_order_newest_first_then_id() {
        let mut posts = vec![post(1, 10), post(3, 20), post(2, 20), post(4, 5)];
        posts.sort_by(feed_order);
        let ids: Vec<_> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 2, 1, 4]);
    }

    #[test]
    fn test_excerpt_counts_characters() {
        let mut p = post(1, 0);
        p.text = "Тестовый текст для проверки".to_string();
        assert_eq!(p.excerpt(), "Тестовый текст ");
        assert_eq!(p.to_string().chars().count(), POST_EXCERPT_CHARS);

        p.text = "short".to_string();
        assert_eq!(p.excerpt(), "short");
    }

    #[test]
    fn test_slug_and_username_validation() {
        let ok = NewGroup {
            title: "Cats".into(),
            slug: "cats_and-dogs".into(),
            description: String::new(),
        };
        assert!(ok.validate().is_ok());

        let bad = NewGroup {
            slug: "cats and dogs".into(),
            ..ok
        };
        assert!(bad.validate().is_err());

        assert!(NewUser { username: "leo.tolstoy@+-".into() }.validate().is_ok());
        assert!(NewUser { username: "no spaces".into() }.validate().is_err());
        assert!(NewUser { username: String::new() }.validate().is_err());
    }

    #[test]
    fn test_filter_matches() {
        let mut p = post(1, 0);
        p.group_id = Some(7);
        assert!(PostFilter::All.matches(&p));
        assert!(PostFilter::Group(7).matches(&p));
        assert!(!PostFilter::Group(8).matches(&p));
        assert!(PostFilter::Author(1).matches(&p));
        assert!(PostFilter::Authors([1, 2].into_iter().collect()).matches(&p));
        assert!(!PostFilter::Authors(BTreeSet::new()).matches(&p));
    }
}
