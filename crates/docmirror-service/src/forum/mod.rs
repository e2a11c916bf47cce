//! Access to the forum's JSON API.
//!
//! Two endpoints are used:
//! - `/t/{id}.json` returns a topic along with its posts. Only the first post is kept, it holds
//!   the actual documentation.
//! - `/search.json?q=...` returns matching posts, and the topics they belong to.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::caching::{CacheEntry, CacheError};
use crate::config::{Config, DownloadTimeouts};
use crate::types::{Post, Topic, TopicId, TopicMeta};
use crate::utils::http::create_client;

/// Fetches documentation topics from somewhere.
///
/// [`ForumClient`] is the real thing, tests use in-memory fakes.
pub trait TopicFetcher: Send + Sync + fmt::Debug {
    /// Fetches a single topic.
    fn fetch_topic(&self, id: TopicId) -> BoxFuture<'_, CacheEntry<Arc<Topic>>>;

    /// Searches documentation topics, returning them in the order of relevance.
    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, CacheEntry<Vec<Arc<Topic>>>>;
}

/// A post as it appears in topic and search responses.
#[derive(Debug, Deserialize)]
struct RawPost {
    #[serde(default)]
    username: String,
    /// Not part of search results.
    #[serde(default)]
    cooked: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    topic_id: Option<TopicId>,
    #[serde(default)]
    blurb: String,
}

impl RawPost {
    fn into_parts(self) -> (Post, Option<String>) {
        let post = Post {
            username: self.username,
            updated_at: self.updated_at,
            blurb: self.blurb,
        };
        (post, self.cooked)
    }
}

#[derive(Debug, Default, Deserialize)]
struct PostStream {
    #[serde(default)]
    posts: Vec<RawPost>,
}

/// Response of `/t/{id}.json`.
#[derive(Debug, Deserialize)]
struct TopicResponse {
    #[serde(flatten)]
    meta: TopicMeta,
    #[serde(default)]
    post_stream: PostStream,
}

/// Response of `/search.json`.
#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    posts: Vec<RawPost>,
    #[serde(default)]
    topics: Vec<TopicMeta>,
}

/// A client for the forum's JSON API.
#[derive(Debug, Clone)]
pub struct ForumClient {
    client: reqwest::Client,
    url: Url,
    timeouts: DownloadTimeouts,
}

impl ForumClient {
    pub fn new(client: reqwest::Client, url: Url, timeouts: DownloadTimeouts) -> Self {
        Self {
            client,
            url,
            timeouts,
        }
    }

    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        let client = create_client(&config.timeouts)?;
        Ok(Self::new(client, config.forum.url.clone(), config.timeouts))
    }

    /// The base URL of the forum.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Builds the URL of an API endpoint below the forum's base URL.
    fn endpoint(&self, segments: &[&str]) -> CacheEntry<Url> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|_| CacheError::InternalError)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request_error(&self, error: reqwest::Error) -> CacheError {
        if error.is_timeout() {
            CacheError::Timeout(self.timeouts.max_download)
        } else {
            error.into()
        }
    }

    /// Sends a `GET` request to `url` and parses the JSON body of a `200 OK` response.
    ///
    /// `401` and `404` are reported as [`CacheError::NotFound`].
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: Url,
    ) -> CacheEntry<T> {
        tracing::debug!("Fetching `{}`", url);
        let start = Instant::now();

        let result = self.send_request(url).await;

        metric!(
            timer("forum.request.duration") = start.elapsed(),
            "endpoint" => endpoint,
            "status" => match &result {
                Ok(_) => "ok",
                Err(e) => e.metric_tag(),
            },
        );

        result
    }

    async fn send_request<T: DeserializeOwned>(&self, url: Url) -> CacheEntry<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => return Err(CacheError::NotFound),
            status => {
                tracing::debug!("Unexpected status code from the forum: {}", status);
                return Err(CacheError::DownloadError(format!("got {status} status")));
            }
        }

        let body = response.bytes().await.map_err(|e| self.request_error(e))?;
        serde_json::from_slice(&body).map_err(|e| CacheError::Malformed(e.to_string()))
    }

    fn build_topic(&self, meta: TopicMeta, post: Post, cooked: Option<&str>) -> CacheEntry<Topic> {
        Topic::new(meta, Some(post), cooked, self.url.as_str()).map_err(|e| {
            tracing::error!(
                error = &e as &dyn std::error::Error,
                "Failed to compress topic content"
            );
            CacheError::InternalError
        })
    }
}

impl TopicFetcher for ForumClient {
    fn fetch_topic(&self, id: TopicId) -> BoxFuture<'_, CacheEntry<Arc<Topic>>> {
        Box::pin(fetch_topic(self, id))
    }

    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, CacheEntry<Vec<Arc<Topic>>>> {
        Box::pin(search_topics(self, query))
    }
}

async fn fetch_topic(forum: &ForumClient, id: TopicId) -> CacheEntry<Arc<Topic>> {
    let url = forum.endpoint(&["t", &format!("{id}.json")])?;
    let TopicResponse { meta, post_stream } = forum.get_json("topic", url).await?;

    let first = post_stream
        .posts
        .into_iter()
        .next()
        .ok_or(CacheError::EmptyResponse)?;
    let (post, cooked) = first.into_parts();

    let cooked = cooked.unwrap_or_default();
    let topic = forum.build_topic(meta, post, Some(&cooked))?;
    tracing::debug!(
        topic = %topic,
        compressed_size = topic.compressed_len(),
        "Fetched topic"
    );
    Ok(Arc::new(topic))
}

/// Runs a search for documentation wiki topics.
///
/// Posts are matched up with their topics, in the order the forum returned the posts. Only the
/// first post of each topic is kept, and posts without a known topic are skipped.
async fn search_topics(forum: &ForumClient, query: &str) -> CacheEntry<Vec<Arc<Topic>>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    tracing::info!("Fetching search results for: {}", query);
    metric!(counter("forum.search") += 1);

    let mut url = forum.endpoint(&["search.json"])?;
    url.query_pairs_mut()
        .append_pair("q", &format!("#doc @wiki {query}"));

    let SearchResponse { posts, topics } = forum.get_json("search", url).await?;

    let mut topics: HashMap<TopicId, TopicMeta> =
        topics.into_iter().map(|meta| (meta.id, meta)).collect();

    let mut results = Vec::new();
    for post in posts {
        let Some(meta) = post.topic_id.and_then(|id| topics.remove(&id)) else {
            continue;
        };
        let (post, cooked) = post.into_parts();
        let topic = forum.build_topic(meta, post, cooked.as_deref())?;
        results.push(Arc::new(topic));
    }

    Ok(results)
}
