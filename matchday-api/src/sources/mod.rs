//! HTTP clients of the external content sources.

pub mod search_oracle;
pub mod static_feed;

pub use search_oracle::HttpSearchOracle;
pub use static_feed::HttpStaticFeed;

use std::sync::Arc;
use std::time::Duration;

use matchday_core::{MatchdayResult, SearchOracle, SourceError, StaticFeed, StructuredStore};
use matchday_storage::{InMemoryStructuredStore, RedisStructuredStore};

use crate::config::AppConfig;

/// External collaborators the engine reads from.
#[derive(Clone)]
pub struct Sources {
    pub feed: Arc<dyn StaticFeed>,
    pub store: Arc<dyn StructuredStore>,
    pub oracle: Option<Arc<dyn SearchOracle>>,
}

/// Build every source client from configuration.
///
/// An unreachable Redis is fatal. Without a Redis URL the process runs on an
/// empty in-memory store, which only makes sense in development.
pub async fn connect(config: &AppConfig) -> MatchdayResult<Sources> {
    let timeout = config.engine.fetch_timeout;

    let store: Arc<dyn StructuredStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisStructuredStore::connect(url, timeout).await?),
        None => {
            tracing::warn!("MATCHDAY_REDIS_URL not set, using in-memory structured store");
            Arc::new(InMemoryStructuredStore::new())
        }
    };

    let feed = Arc::new(HttpStaticFeed::new(config.static_feed_url.clone(), timeout)?);

    let oracle = match &config.search {
        Some(search) => {
            let oracle: Arc<dyn SearchOracle> = Arc::new(HttpSearchOracle::new(search.clone(), timeout)?);
            Some(oracle)
        }
        None => None,
    };

    Ok(Sources { feed, store, oracle })
}

/// Map a transport error onto the source taxonomy.
pub(crate) fn transport_error(source_name: &str, timeout: Duration, err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout {
            source_name: source_name.to_string(),
            timeout,
        }
    } else if err.is_decode() {
        SourceError::decode(source_name, err)
    } else {
        SourceError::http(source_name, err)
    }
}
