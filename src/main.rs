// Blog Feed Server

use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use blog_feed::{
    app_state::AppState,
    config::Config,
    data_seeder::seed_sample_data,
    feed_interface::create_feed_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;

    if config.feed.seed_sample_data {
        seed_sample_data(&app_state.feed_interface).await?;
    }

    // Build main application router
    let app = create_feed_router(app_state.feed_interface.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = config.server_address();
    info!("Blog feed server starting on http://{}", addr);
    info!(
        page_size = config.feed.page_size.get(),
        cache_ttl_secs = config.feed.cache_ttl_secs,
        "feed settings"
    );
    info!("Routes:");
    info!("  GET  /                              - Global feed (cached)");
    info!("  GET  /group/{{slug}}/                 - Group feed");
    info!("  GET  /profile/{{username}}/           - Author profile feed");
    info!("  GET  /posts/{{post_id}}/              - Post with comments");
    info!("  POST /create/                       - Create post");
    info!("  POST /posts/{{post_id}}/edit/         - Edit post");
    info!("  POST /posts/{{post_id}}/delete/       - Delete post");
    info!("  POST /posts/{{post_id}}/comment/      - Add comment");
    info!("  GET  /follow/                       - Follow feed");
    info!("  GET  /profile/{{username}}/follow/    - Follow author");
    info!("  GET  /profile/{{username}}/unfollow/  - Unfollow author");
    info!("  POST /admin/cache/invalidate/       - Clear global feed cache");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
