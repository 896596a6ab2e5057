use serde::{Deserialize, Serialize};
use std::env;
use std::num::NonZeroUsize;

/// Posts per feed page when `POST_LIMIT` is not set.
pub const DEFAULT_POST_LIMIT: usize = 10;
/// Lifetime of the cached global feed when `FEED_CACHE_TTL_SECS` is not set.
pub const DEFAULT_FEED_CACHE_TTL_SECS: u64 = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `memory` selects the in-process store, anything else is a SQLite URL.
    pub url: String,
    pub max_connections: u32,
    pub id_node: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub page_size: NonZeroUsize,
    pub cache_ttl_secs: u64,
    pub seed_sample_data: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 5,
                id_node: 0,
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            feed: FeedConfig {
                page_size: NonZeroUsize::new(DEFAULT_POST_LIMIT).unwrap_or(NonZeroUsize::MIN),
                cache_ttl_secs: DEFAULT_FEED_CACHE_TTL_SECS,
                seed_sample_data: false,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let page_size: usize = env::var("POST_LIMIT")
            .unwrap_or_else(|_| DEFAULT_POST_LIMIT.to_string())
            .parse()
            .unwrap_or(DEFAULT_POST_LIMIT);
        let page_size = NonZeroUsize::new(page_size)
            .ok_or_else(|| anyhow::anyhow!("POST_LIMIT must be a positive integer"))?;

        let id_node: u16 = env::var("ID_NODE")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .unwrap_or(0);
        if id_node >= 1024 {
            anyhow::bail!("ID_NODE must be less than 1024, got {}", id_node);
        }

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
                id_node,
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .unwrap_or(8000),
            },
            feed: FeedConfig {
                page_size,
                cache_ttl_secs: env::var("FEED_CACHE_TTL_SECS")
                    .unwrap_or_else(|_| DEFAULT_FEED_CACHE_TTL_SECS.to_string())
                    .parse()
                    .unwrap_or(DEFAULT_FEED_CACHE_TTL_SECS),
                seed_sample_data: env::var("SEED_SAMPLE_DATA")
                    .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                    .unwrap_or(false),
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database.url == "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = Config::default();
        assert_eq!(config.feed.page_size.get(), 10);
        assert_eq!(config.feed.cache_ttl_secs, 20);
        assert_eq!(config.server_address(), "0.0.0.0:8000");
        assert!(!config.uses_memory_store());
    }
}
