use std::sync::Arc;
use tracing::info;

use crate::{
    config::Config,
    feed_interface::FeedInterface,
    infrastructure::{
        clock::{Clock, SystemClock},
        store::{MemoryPostStore, PostStore, SqlitePostStore},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub feed_interface: FeedInterface,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        // Initialize store
        let store: Arc<dyn PostStore> = if config.uses_memory_store() {
            info!("using in-memory post store");
            Arc::new(MemoryPostStore::new(clock.clone(), config.database.id_node))
        } else {
            info!(url = %config.database.url, "connecting to SQLite post store");
            Arc::new(
                SqlitePostStore::connect(
                    &config.database.url,
                    config.database.max_connections,
                    clock.clone(),
                    config.database.id_node,
                )
                .await?,
            )
        };

        Ok(Self::with_store(config, store, clock))
    }

    /// Build the state around an existing store, e.g. one driven by a manual clock.
    pub fn with_store(config: Config, store: Arc<dyn PostStore>, clock: Arc<dyn Clock>) -> Self {
        let feed_interface = FeedInterface::new(store, clock, &config.feed);
        Self {
            feed_interface,
            config,
        }
    }
}
