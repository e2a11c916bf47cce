//! The documentation service, tying the forum client and the topic cache together.

use std::sync::Arc;

use anyhow::{Context, Result};
use url::Url;

use crate::caching::{CacheEntry, TopicCache};
use crate::config::{Config, DocsConfig};
use crate::forum::{ForumClient, TopicFetcher};
use crate::types::{Topic, TopicId};

/// Creates the [`DocsService`] described by `config`, talking to the configured forum.
pub fn create_service(config: &Config) -> Result<DocsService> {
    let forum = ForumClient::from_config(config).context("failed to create the HTTP client")?;
    let cache = TopicCache::from_config(&config.caches.topics);
    DocsService::new(Arc::new(forum), cache, config)
}

/// Serves documentation topics out of a [`TopicCache`].
///
/// This is cheap to clone, all clones share the same cache.
#[derive(Debug, Clone)]
pub struct DocsService {
    fetcher: Arc<dyn TopicFetcher>,
    cache: Arc<TopicCache>,
    docs: Arc<DocsConfig>,
    forum_url: Url,
    index: TopicId,
}

impl DocsService {
    pub fn new(fetcher: Arc<dyn TopicFetcher>, cache: TopicCache, config: &Config) -> Result<Self> {
        let index = config
            .docs
            .index_id()
            .context("`docs.index_path` must be the path of a topic")?;

        Ok(Self {
            fetcher,
            cache: Arc::new(cache),
            docs: Arc::new(config.docs.clone()),
            forum_url: config.forum.url.clone(),
            index,
        })
    }

    /// Returns topic `id`, from the cache if possible.
    pub async fn topic(&self, id: TopicId) -> CacheEntry<Arc<Topic>> {
        self.cache
            .get(id, || self.fetcher.fetch_topic(id))
            .await
    }

    /// Returns the documentation outline topic.
    pub async fn index(&self) -> CacheEntry<Arc<Topic>> {
        self.topic(self.index).await
    }

    /// Forgets the cached copy of topic `id`, so the next request fetches it again.
    pub fn refresh(&self, id: TopicId) {
        if self.cache.invalidate(id) {
            tracing::info!("Asked to refresh {}: discarding topic cache", id);
        } else {
            tracing::info!("Asked to refresh {}: topic was not cached", id);
        }
    }

    /// Searches the documentation.
    ///
    /// The outline topic is never part of the results. Results that come with their content are
    /// put into the cache.
    pub async fn search(&self, query: &str) -> CacheEntry<Vec<Arc<Topic>>> {
        let mut topics = self.fetcher.search(query).await?;
        topics.retain(|topic| topic.id != self.index);

        let complete: Vec<_> = topics
            .iter()
            .filter(|topic| topic.has_content())
            .cloned()
            .collect();
        self.cache.prime(&complete).await;

        Ok(topics)
    }

    /// The id of the documentation outline topic.
    pub fn index_id(&self) -> TopicId {
        self.index
    }

    pub fn docs(&self) -> &DocsConfig {
        &self.docs
    }

    /// The base URL of the mirrored forum.
    pub fn forum_url(&self) -> &Url {
        &self.forum_url
    }

    pub fn cache(&self) -> &TopicCache {
        &self.cache
    }
}
