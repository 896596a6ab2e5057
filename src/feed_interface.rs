// Feed Interface - HTTP access layer for the blog feeds
// Wires the composer, paginator, cache and post service into JSON pages and redirects.

use std::collections::HashMap;
use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, Path as AxumPath, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    config::FeedConfig,
    error::{AppError, AppResult},
    infrastructure::{
        cache::{CacheStats, FeedCache},
        clock::Clock,
        middleware::{found, viewer_context_middleware, HasPostStore, LoggedIn, Vc},
        store::PostStore,
    },
    models::{Post, PostId, User},
    services::{CommentForm, FeedComposer, FollowGraph, Page, Paginator, PostForm, PostService},
};

pub const FOLLOW_FEED_TITLE: &str = "Posts from authors you follow";

/// Cached global feed: the whole composed sequence, paginated per request.
pub type GlobalFeed = Arc<Vec<Post>>;

#[derive(Clone)]
pub struct FeedInterface {
    store: Arc<dyn PostStore>,
    composer: FeedComposer,
    follows: FollowGraph,
    posts: PostService,
    feed_cache: Arc<FeedCache<GlobalFeed>>,
    paginator: Paginator,
}

impl HasPostStore for FeedInterface {
    fn post_store(&self) -> &Arc<dyn PostStore> {
        &self.store
    }
}

impl FeedInterface {
    pub fn new(store: Arc<dyn PostStore>, clock: Arc<dyn Clock>, config: &FeedConfig) -> Self {
        let follows = FollowGraph::new(store.clone());
        let ttl = Duration::seconds(config.cache_ttl_secs.min(u32::MAX as u64) as i64);
        Self {
            composer: FeedComposer::new(store.clone(), follows.clone()),
            posts: PostService::new(store.clone()),
            feed_cache: Arc::new(FeedCache::new(ttl, clock)),
            paginator: Paginator::new(config.page_size),
            follows,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn PostStore> {
        &self.store
    }

    pub fn composer(&self) -> &FeedComposer {
        &self.composer
    }

    pub fn follow_graph(&self) -> &FollowGraph {
        &self.follows
    }

    pub fn post_service(&self) -> &PostService {
        &self.posts
    }

    pub fn paginator(&self) -> Paginator {
        self.paginator
    }

    pub fn feed_cache_stats(&self) -> CacheStats {
        self.feed_cache.stats()
    }

    /// Global feed, served from the cache while it is fresh.
    pub async fn global_feed(&self) -> AppResult<GlobalFeed> {
        if let Some(posts) = self.feed_cache.get().await {
            return Ok(posts);
        }
        let posts = Arc::new(self.composer.global_feed().await?);
        self.feed_cache.set(posts.clone()).await;
        Ok(posts)
    }

    pub async fn invalidate_feed_cache(&self) {
        self.feed_cache.invalidate().await;
    }

    async fn user_by_username(&self, username: &str) -> AppResult<User> {
        self.store
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", username)))
    }

    // JSON page builders

    pub async fn index_page(&self, raw_page: Option<&str>) -> AppResult<Json<Value>> {
        let posts = self.global_feed().await?;
        let page = self.paginator.paginate(&posts, raw_page);
        Ok(Json(json!({ "page": page })))
    }

    pub async fn group_page(&self, slug: &str, raw_page: Option<&str>) -> AppResult<Json<Value>> {
        let group = self
            .store
            .get_group_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group {} not found", slug)))?;
        let posts = self.composer.group_feed(group.id).await?;
        let page = self.paginator.paginate(&posts, raw_page);
        Ok(Json(json!({ "group": group, "page": page })))
    }

    pub async fn profile_page(
        &self,
        vc: &Vc,
        username: &str,
        raw_page: Option<&str>,
    ) -> AppResult<Json<Value>> {
        let author = self.user_by_username(username).await?;
        let posts = self.composer.profile_feed(author.id).await?;
        let page = self.paginator.paginate(&posts, raw_page);
        let following = match vc.user_id() {
            Some(viewer_id) => self.follows.is_following(viewer_id, author.id).await?,
            None => false,
        };
        Ok(Json(json!({
            "author": author,
            "following": following,
            "page": page,
        })))
    }

    pub async fn post_detail_page(&self, post_id: PostId) -> AppResult<Json<Value>> {
        let (post, comments) = self.posts.post_detail(post_id).await?;
        let author = self.store.get_user(post.author_id).await?;
        let group = match post.group_id {
            Some(group_id) => self.store.get_group(group_id).await?,
            None => None,
        };
        Ok(Json(json!({
            "post": post,
            "author": author,
            "group": group,
            "comments": comments,
        })))
    }

    pub async fn follow_page(&self, viewer: &User, raw_page: Option<&str>) -> AppResult<Json<Value>> {
        let posts = self.composer.follow_feed(viewer.id).await?;
        let page: Page<Post> = self.paginator.paginate(&posts, raw_page);
        Ok(Json(json!({ "title": FOLLOW_FEED_TITLE, "page": page })))
    }
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

pub fn post_detail_url(post_id: PostId) -> String {
    format!("/posts/{}/", post_id)
}

fn page_param(params: &HashMap<String, String>) -> Option<&str> {
    params.get("page").map(String::as_str)
}

// Path segments that are not ids cannot name a post
fn parse_post_id(raw: &str) -> AppResult<PostId> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("Post {} not found", raw)))
}

fn form_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(form)| form)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

// HTTP Handlers

pub async fn index_handler(
    State(feed): State<FeedInterface>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, AppError> {
    feed.index_page(page_param(&params)).await
}

pub async fn group_posts_handler(
    State(feed): State<FeedInterface>,
    AxumPath(slug): AxumPath<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, AppError> {
    feed.group_page(&slug, page_param(&params)).await
}

pub async fn profile_handler(
    State(feed): State<FeedInterface>,
    vc: Vc,
    AxumPath(username): AxumPath<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, AppError> {
    feed.profile_page(&vc, &username, page_param(&params)).await
}

pub async fn post_detail_handler(
    State(feed): State<FeedInterface>,
    AxumPath(post_id): AxumPath<String>,
) -> Result<Json<Value>, AppError> {
    feed.post_detail_page(parse_post_id(&post_id)?).await
}

pub async fn post_create_handler(
    State(feed): State<FeedInterface>,
    LoggedIn { user, .. }: LoggedIn,
    body: Result<Json<PostForm>, JsonRejection>,
) -> Result<Response, AppError> {
    let form = form_body(body)?;
    feed.posts.create_post(&user, form).await?;
    Ok(found(&profile_url(&user.username)))
}

pub async fn post_edit_handler(
    State(feed): State<FeedInterface>,
    LoggedIn { user, .. }: LoggedIn,
    AxumPath(post_id): AxumPath<String>,
    body: Result<Json<PostForm>, JsonRejection>,
) -> Result<Response, AppError> {
    let post_id = parse_post_id(&post_id)?;
    let detail = found(&post_detail_url(post_id));

    // Authorship is settled before the form is looked at
    let post = feed.posts.get_post(post_id).await?;
    if post.author_id != user.id {
        debug!(post_id, user_id = user.id, "edit by non-author redirected");
        return Ok(detail);
    }

    let form = form_body(body)?;
    feed.posts.edit_post(&user, post_id, form).await?;
    Ok(detail)
}

pub async fn post_delete_handler(
    State(feed): State<FeedInterface>,
    LoggedIn { user, .. }: LoggedIn,
    AxumPath(post_id): AxumPath<String>,
) -> Result<Response, AppError> {
    let post_id = parse_post_id(&post_id)?;
    match feed.posts.delete_post(&user, post_id).await {
        Ok(()) => Ok(found(&profile_url(&user.username))),
        Err(AppError::Forbidden(_)) => Ok(found(&post_detail_url(post_id))),
        Err(err) => Err(err),
    }
}

pub async fn add_comment_handler(
    State(feed): State<FeedInterface>,
    LoggedIn { user, .. }: LoggedIn,
    AxumPath(post_id): AxumPath<String>,
    body: Result<Json<CommentForm>, JsonRejection>,
) -> Result<Response, AppError> {
    let post_id = parse_post_id(&post_id)?;
    // An unreadable body counts as a blank comment
    let form = body
        .map(|Json(form)| form)
        .unwrap_or_else(|_| CommentForm { text: String::new() });
    feed.posts.add_comment(&user, post_id, form).await?;
    Ok(found(&post_detail_url(post_id)))
}

pub async fn follow_index_handler(
    State(feed): State<FeedInterface>,
    LoggedIn { user, .. }: LoggedIn,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, AppError> {
    feed.follow_page(&user, page_param(&params)).await
}

pub async fn profile_follow_handler(
    State(feed): State<FeedInterface>,
    LoggedIn { user, .. }: LoggedIn,
    AxumPath(username): AxumPath<String>,
) -> Result<Response, AppError> {
    let author = feed.user_by_username(&username).await?;
    feed.follows.follow(user.id, author.id).await?;
    Ok(found(&profile_url(&author.username)))
}

pub async fn profile_unfollow_handler(
    State(feed): State<FeedInterface>,
    LoggedIn { user, .. }: LoggedIn,
    AxumPath(username): AxumPath<String>,
) -> Result<Response, AppError> {
    let author = feed.user_by_username(&username).await?;
    feed.follows.unfollow(user.id, author.id).await?;
    Ok(found(&profile_url(&author.username)))
}

pub async fn invalidate_cache_handler(
    State(feed): State<FeedInterface>,
    LoggedIn { user, .. }: LoggedIn,
) -> StatusCode {
    debug!(user_id = user.id, "feed cache invalidation requested");
    feed.invalidate_feed_cache().await;
    StatusCode::NO_CONTENT
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn not_found_handler() -> Response {
    AppError::NotFound("No route matches this path".to_string()).into_response()
}

// Create the feed router
pub fn create_feed_router(feed: FeedInterface) -> Router {
    Router::new()
        // Feeds
        .route("/", get(index_handler))
        .route("/group/{slug}/", get(group_posts_handler))
        .route("/profile/{username}/", get(profile_handler))
        .route("/follow/", get(follow_index_handler))

        // Posts
        .route("/create/", post(post_create_handler))
        .route("/posts/{post_id}/", get(post_detail_handler))
        .route("/posts/{post_id}/edit/", post(post_edit_handler))
        .route("/posts/{post_id}/delete/", post(post_delete_handler))
        .route("/posts/{post_id}/comment/", post(add_comment_handler))

        // Follow edges
        .route("/profile/{username}/follow/", get(profile_follow_handler))
        .route("/profile/{username}/unfollow/", get(profile_unfollow_handler))

        // Operations
        .route("/admin/cache/invalidate/", post(invalidate_cache_handler))
        .route("/health", get(health_handler))

        .fallback(not_found_handler)
        .layer(middleware::from_fn_with_state(
            feed.clone(),
            viewer_context_middleware::<FeedInterface>,
        ))
        .with_state(feed)
}
