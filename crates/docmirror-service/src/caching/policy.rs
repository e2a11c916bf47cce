use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::store::Fetched;
use crate::config::TopicCacheConfig;
use crate::types::Topic;

/// What to do with a lookup, before any network access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The cached topic is recent enough to be served as is.
    Fresh(Arc<Topic>),
    /// The topic has to be fetched from the forum.
    Refresh,
}

/// What to do after fetching a topic failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Serve this older topic instead of the error.
    Fallback(Arc<Topic>),
    /// Nothing usable is cached, the slot should go and the error be reported.
    Evict,
}

/// Expiration rules of the topic cache.
///
/// Both windows are measured from the end of the last successful fetch. Failed fetches never
/// move that point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Topics younger than this are served without asking the forum.
    pub fresh_ttl: Duration,
    /// Topics younger than this are served when the forum cannot deliver a newer one.
    pub fallback_ttl: Duration,
}

impl CachePolicy {
    pub fn from_config(config: &TopicCacheConfig) -> Self {
        Self {
            fresh_ttl: config.fresh_ttl,
            fallback_ttl: config.fallback_ttl,
        }
    }

    pub fn lookup(&self, last: Option<&Fetched>, now: Instant) -> Lookup {
        match last {
            Some(last) if now.saturating_duration_since(last.at) < self.fresh_ttl => {
                Lookup::Fresh(Arc::clone(&last.topic))
            }
            _ => Lookup::Refresh,
        }
    }

    pub fn on_failure(&self, last: Option<&Fetched>, now: Instant) -> Failure {
        match last {
            Some(last) if now.saturating_duration_since(last.at) < self.fallback_ttl => {
                Failure::Fallback(Arc::clone(&last.topic))
            }
            _ => Failure::Evict,
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_config(&TopicCacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::types::tests::topic;

    const HOUR: Duration = Duration::from_secs(3600);

    fn fetched(at: Instant) -> Fetched {
        Fetched {
            topic: Arc::new(topic(1, "Policy", "<p>x</p>")),
            at,
        }
    }

    #[test]
    fn test_defaults() {
        let policy = CachePolicy::default();
        assert_eq!(policy.fresh_ttl, HOUR);
        assert_eq!(policy.fallback_ttl, 7 * 24 * HOUR);
    }

    #[test]
    fn test_lookup() {
        let policy = CachePolicy::default();
        let start = Instant::now();
        let last = fetched(start);

        assert_eq!(policy.lookup(None, start), Lookup::Refresh);
        assert_eq!(
            policy.lookup(Some(&last), start + HOUR - Duration::from_secs(1)),
            Lookup::Fresh(Arc::clone(&last.topic))
        );
        assert_eq!(policy.lookup(Some(&last), start + HOUR), Lookup::Refresh);
    }

    #[test]
    fn test_on_failure() {
        let policy = CachePolicy::default();
        let start = Instant::now();
        let last = fetched(start);

        assert_eq!(policy.on_failure(None, start), Failure::Evict);
        assert_eq!(
            policy.on_failure(Some(&last), start + 2 * HOUR),
            Failure::Fallback(Arc::clone(&last.topic))
        );
        assert_eq!(
            policy.on_failure(Some(&last), start + policy.fallback_ttl),
            Failure::Evict
        );
    }
}
