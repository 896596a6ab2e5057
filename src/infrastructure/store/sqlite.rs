use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::infrastructure::clock::Clock;
use crate::infrastructure::id_generator::IdGenerator;
use crate::infrastructure::store::PostStore;
use crate::models::{
    Comment, FollowEdge, Group, GroupId, NewComment, NewGroup, NewPost, NewUser, Post, PostFilter,
    PostId, PostUpdate, User, UserId,
};

const POST_COLUMNS: &str = "id, author_id, text, group_id, image, created_at";

/// SQLite implementation of the post store
pub struct SqlitePostStore {
    pool: SqlitePool,
    ids: IdGenerator,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SqlitePostStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePostStore")
            .field("pool_size", &self.pool.size())
            .field("ids", &self.ids)
            .finish()
    }
}

impl SqlitePostStore {
    pub async fn connect(
        url: &str,
        max_connections: u32,
        clock: Arc<dyn Clock>,
        id_node: u16,
    ) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::ConfigurationError(format!("Invalid database URL {}: {}", url, e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` opens its own database, so keep one
        let max_connections = if url.contains(":memory:") { 1 } else { max_connections.max(1) };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect to {}: {}", url, e)))?;

        let store = Self {
            pool,
            ids: IdGenerator::new(id_node),
            clock,
        };
        store.initialize().await?;
        Ok(store)
    }

    pub async fn new_in_memory(clock: Arc<dyn Clock>) -> AppResult<Self> {
        Self::connect("sqlite::memory:", 1, clock, 0).await
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn initialize(&self) -> AppResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS groups (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT ''
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text TEXT NOT NULL,
                group_id INTEGER REFERENCES groups(id) ON DELETE SET NULL,
                image TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY,
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS follows (
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (user_id, author_id),
                CHECK (user_id <> author_id)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_posts_feed ON posts(created_at DESC, id DESC)",
            "CREATE INDEX IF NOT EXISTS idx_posts_group ON posts(group_id, created_at DESC)",
            "CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id, created_at DESC)",
            "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to initialize schema: {}", e)))?;
        }
        Ok(())
    }

    /// Stored timestamps carry microsecond precision.
    fn now_micros(&self) -> i64 {
        self.clock.now().timestamp_micros()
    }

    async fn ensure_group_exists(&self, group_id: Option<GroupId>) -> AppResult<()> {
        if let Some(group_id) = group_id {
            if self.get_group(group_id).await?.is_none() {
                return Err(AppError::Validation(format!("Unknown group {}", group_id)));
            }
        }
        Ok(())
    }
}

fn from_micros(micros: i64) -> AppResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| AppError::DatabaseError(format!("Invalid timestamp {}", micros)))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}

fn user_from_row(row: &SqliteRow) -> AppResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
    })
}

fn group_from_row(row: &SqliteRow) -> AppResult<Group> {
    Ok(Group {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
    })
}

fn post_from_row(row: &SqliteRow) -> AppResult<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        text: row.try_get("text")?,
        group_id: row.try_get("group_id")?,
        image: row.try_get("image")?,
        created_at: from_micros(row.try_get("created_at")?)?,
    })
}

fn comment_from_row(row: &SqliteRow) -> AppResult<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        author_id: row.try_get("author_id")?,
        text: row.try_get("text")?,
        created_at: from_micros(row.try_get("created_at")?)?,
    })
}

#[async_trait]
impl PostStore for SqlitePostStore {
    async fn create_user(&self, username: &str) -> AppResult<User> {
        NewUser {
            username: username.to_string(),
        }
        .validate()?;

        let user = User {
            id: self.ids.next_id(),
            username: username.to_string(),
        };
        sqlx::query("INSERT INTO users (id, username) VALUES (?, ?)")
            .bind(user.id)
            .bind(&user.username)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Validation(format!("Username {} is already taken", username))
                } else {
                    AppError::from(e)
                }
            })?;
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> AppResult<Option<User>> {
        sqlx::query("SELECT id, username FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| user_from_row(&row))
            .transpose()
    }

    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        sqlx::query("SELECT id, username FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| user_from_row(&row))
            .transpose()
    }

    async fn create_group(&self, group: NewGroup) -> AppResult<Group> {
        group.validate()?;

        let group = Group {
            id: self.ids.next_id(),
            title: group.title,
            slug: group.slug,
            description: group.description,
        };
        sqlx::query("INSERT INTO groups (id, title, slug, description) VALUES (?, ?, ?, ?)")
            .bind(group.id)
            .bind(&group.title)
            .bind(&group.slug)
            .bind(&group.description)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Validation(format!("Group slug {} is already taken", group.slug))
                } else {
                    AppError::from(e)
                }
            })?;
        Ok(group)
    }

    async fn get_group(&self, id: GroupId) -> AppResult<Option<Group>> {
        sqlx::query("SELECT id, title, slug, description FROM groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| group_from_row(&row))
            .transpose()
    }

    async fn get_group_by_slug(&self, slug: &str) -> AppResult<Option<Group>> {
        sqlx::query("SELECT id, title, slug, description FROM groups WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| group_from_row(&row))
            .transpose()
    }

    async fn list_groups(&self) -> AppResult<Vec<Group>> {
        sqlx::query("SELECT id, title, slug, description FROM groups ORDER BY title")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(group_from_row)
            .collect()
    }

    async fn create_post(&self, post: NewPost) -> AppResult<Post> {
        let mut created = self.create_posts(vec![post]).await?;
        created
            .pop()
            .ok_or_else(|| AppError::Internal("Post insert returned nothing".to_string()))
    }

    async fn create_posts(&self, posts: Vec<NewPost>) -> AppResult<Vec<Post>> {
        for post in &posts {
            if self.get_user(post.author_id).await?.is_none() {
                return Err(AppError::NotFound(format!("User {} not found", post.author_id)));
            }
            self.ensure_group_exists(post.group_id).await?;
        }

        let created_micros = self.now_micros();
        let created_at = from_micros(created_micros)?;
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(posts.len());

        for new_post in posts {
            let post = Post {
                id: self.ids.next_id(),
                author_id: new_post.author_id,
                text: new_post.text,
                group_id: new_post.group_id,
                image: new_post.image,
                created_at,
            };
            sqlx::query(
                "INSERT INTO posts (id, author_id, text, group_id, image, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(post.id)
            .bind(post.author_id)
            .bind(&post.text)
            .bind(post.group_id)
            .bind(&post.image)
            .bind(created_micros)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create post: {}", e)))?;
            created.push(post);
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn get_post(&self, id: PostId) -> AppResult<Option<Post>> {
        sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| post_from_row(&row))
            .transpose()
    }

    async fn update_post(&self, id: PostId, update: PostUpdate) -> AppResult<Option<Post>> {
        self.ensure_group_exists(update.group_id).await?;

        let result = sqlx::query(
            "UPDATE posts SET text = ?, group_id = ?, image = COALESCE(?, image) WHERE id = ?",
        )
        .bind(&update.text)
        .bind(update.group_id)
        .bind(&update.image)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to update post {}: {}", id, e)))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_post(id).await
    }

    async fn delete_post(&self, id: PostId) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM comments WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn query_posts(&self, filter: &PostFilter) -> AppResult<Vec<Post>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM posts", POST_COLUMNS));

        match filter {
            PostFilter::All => {}
            PostFilter::Group(group_id) => {
                qb.push(" WHERE group_id = ");
                qb.push_bind(*group_id);
            }
            PostFilter::Author(author_id) => {
                qb.push(" WHERE author_id = ");
                qb.push_bind(*author_id);
            }
            PostFilter::Authors(authors) => {
                if authors.is_empty() {
                    return Ok(Vec::new());
                }
                qb.push(" WHERE author_id IN (");
                let mut separated = qb.separated(", ");
                for author_id in authors {
                    separated.push_bind(*author_id);
                }
                separated.push_unseparated(")");
            }
        }
        qb.push(" ORDER BY created_at DESC, id DESC");

        qb.build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to query posts: {}", e)))?
            .iter()
            .map(post_from_row)
            .collect()
    }

    async fn create_comment(&self, comment: NewComment) -> AppResult<Comment> {
        if self.get_post(comment.post_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Post {} not found", comment.post_id)));
        }
        if self.get_user(comment.author_id).await?.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", comment.author_id)));
        }

        let created_micros = self.now_micros();
        let comment = Comment {
            id: self.ids.next_id(),
            post_id: comment.post_id,
            author_id: comment.author_id,
            text: comment.text,
            created_at: from_micros(created_micros)?,
        };
        sqlx::query(
            "INSERT INTO comments (id, post_id, author_id, text, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(comment.id)
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(&comment.text)
        .bind(created_micros)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create comment: {}", e)))?;
        Ok(comment)
    }

    async fn comments_for_post(&self, post_id: PostId) -> AppResult<Vec<Comment>> {
        sqlx::query(
            "SELECT id, post_id, author_id, text, created_at FROM comments WHERE post_id = ? ORDER BY created_at, id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(comment_from_row)
        .collect()
    }

    async fn insert_follow(&self, edge: FollowEdge) -> AppResult<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?, ?)")
            .bind(edge.user_id)
            .bind(edge.author_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_follow(&self, edge: FollowEdge) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(edge.user_id)
            .bind(edge.author_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn follow_exists(&self, edge: FollowEdge) -> AppResult<bool> {
        let row = sqlx::query("SELECT 1 FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(edge.user_id)
            .bind(edge.author_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn followed_authors(&self, user_id: UserId) -> AppResult<BTreeSet<UserId>> {
        sqlx::query("SELECT author_id FROM follows WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| row.try_get::<i64, _>("author_id").map_err(AppError::from))
            .collect()
    }
}
