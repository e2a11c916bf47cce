//! # The topic cache
//!
//! Every page docmirror serves is a forum topic, and fetching a topic from the forum takes a
//! network round trip. This module keeps the last good copy of each topic around and decides
//! whether to serve it, replace it, or fall back to it.
//!
//! ## Lookups
//!
//! A lookup through [`TopicCache::get`] goes through the following steps:
//! - The [`TopicStore`] hands out the [`TopicSlot`] of the topic, creating an empty one on first use.
//! - The slot's own lock is taken, and held until the lookup is done. If the slot was removed
//!   from the store while waiting for the lock, the lookup starts over with a new slot.
//! - If the slot holds a topic fetched less than `fresh_ttl` ago, that topic is returned.
//! - Otherwise the topic is fetched. A successful fetch replaces the slot contents.
//! - If the fetch fails and the slot holds a topic fetched less than `fallback_ttl` ago, that
//!   older topic is returned instead of the error.
//! - Otherwise the slot is evicted from the store and the error is returned, so the next lookup
//!   starts from an empty slot.
//!
//! Holding the slot lock across the fetch means that concurrent lookups of the same topic result
//! in at most one request to the forum, while lookups of other topics are not affected at all.
//! The store lock only protects inserting and removing slots.
//!
//! [`TopicCache::invalidate`] removes a slot unconditionally, so the next lookup has to fetch.
//!
//! NOTE: Every kind of fetch error is masked by the fallback, including a topic that was deleted
//! on the forum. Such a topic stays visible for up to `fallback_ttl`.
//!
//! ### Metrics
//!
//! All metrics are tagged with `cache:topics`:
//!
//! - `caches.access`: All lookups.
//! - `caches.memory.hit`: Lookups served from a fresh slot.
//! - `caches.computation`: Fetches from the forum.
//! - `caches.fallback`: Failed fetches masked by an older topic, tagged with the error kind.
//! - `caches.evict`: Failed fetches without a usable older topic, tagged with the error kind.

use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;

use crate::config::TopicCacheConfig;
use crate::types::{Topic, TopicId};

mod cache_error;
mod policy;
mod store;


pub use cache_error::{CacheEntry, CacheError};
pub use policy::{CachePolicy, Failure, Lookup};
pub use store::{Fetched, TopicSlot, TopicStore};

const CACHE_NAME: &str = "topics";

/// Caches forum topics, see the [module documentation](self).
#[derive(Debug, Default)]
pub struct TopicCache {
    store: TopicStore,
    policy: CachePolicy,
}

impl TopicCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            store: TopicStore::default(),
            policy,
        }
    }

    pub fn from_config(config: &TopicCacheConfig) -> Self {
        Self::new(CachePolicy::from_config(config))
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// The number of topics currently tracked.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Looks up topic `id`, calling `fetch` if there is no fresh copy.
    ///
    /// `fetch` is only called while holding the slot lock of `id`, and not at all if a fresh
    /// topic is cached.
    pub async fn get<F, Fut>(&self, id: TopicId, fetch: F) -> CacheEntry<Arc<Topic>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheEntry<Arc<Topic>>>,
    {
        metric!(counter("caches.access") += 1, "cache" => CACHE_NAME);

        let (slot, mut last) = loop {
            let slot = self.store.lookup_or_create(id);
            let last = slot.lock().await;
            // The slot may have been evicted or invalidated while we were waiting for it.
            // Whoever comes next would create a new one, so use that one instead.
            if self.store.is_registered(id, &slot) {
                break (slot, last);
            }
        };

        let now = Instant::now();
        if let Lookup::Fresh(topic) = self.policy.lookup(last.as_ref(), now) {
            metric!(counter("caches.memory.hit") += 1, "cache" => CACHE_NAME);
            return Ok(topic);
        }

        tracing::debug!(topic = %id, "Fetching topic from the forum");
        metric!(counter("caches.computation") += 1, "cache" => CACHE_NAME);

        let error = match fetch().await {
            Ok(topic) => {
                *last = Some(Fetched {
                    topic: Arc::clone(&topic),
                    at: Instant::now(),
                });
                return Ok(topic);
            }
            Err(error) => error,
        };

        match self.policy.on_failure(last.as_ref(), now) {
            Failure::Fallback(topic) => {
                tracing::warn!(
                    topic = %id,
                    error = &error as &dyn std::error::Error,
                    "Serving cached topic after failed fetch"
                );
                metric!(
                    counter("caches.fallback") += 1,
                    "cache" => CACHE_NAME,
                    "error" => error.metric_tag(),
                );
                Ok(topic)
            }
            Failure::Evict => {
                tracing::debug!(
                    topic = %id,
                    error = &error as &dyn std::error::Error,
                    "Fetching topic failed, evicting it"
                );
                metric!(
                    counter("caches.evict") += 1,
                    "cache" => CACHE_NAME,
                    "error" => error.metric_tag(),
                );
                self.store.evict(id, &slot);
                Err(error)
            }
        }
    }

    /// Drops whatever is cached for `id`, so the next lookup fetches it again.
    ///
    /// Returns `true` if anything was cached.
    pub fn invalidate(&self, id: TopicId) -> bool {
        self.store.invalidate(id)
    }

    /// Stores topics that were obtained by other means than [`get`](Self::get), like a search.
    ///
    /// They count as freshly fetched.
    pub async fn prime(&self, topics: &[Arc<Topic>]) {
        for topic in topics {
            let slot = self.store.lookup_or_create(topic.id);
            let mut last = slot.lock().await;
            *last = Some(Fetched {
                topic: Arc::clone(topic),
                at: Instant::now(),
            });
        }
    }
}
