//! The documentation topics served by the mirror.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Paths of documentation pages: an optional slug, the topic id and an optional post number.
static PAGE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:/([a-z0-9-]+))?/([0-9]+)(?:/[0-9]+)?$").unwrap());

/// Text served in place of content that cannot be decompressed.
const BROKEN_CONTENT: &str = "Internal error: cannot decompress content. Please report!";

/// A request path that does not name a forum topic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported URL path: {0:?}")]
pub struct InvalidPath(pub String);

/// The numeric id of a forum topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(pub u64);

impl TopicId {
    /// Extracts the topic id from a request path such as `/some-slug/1234` or `/1234/5`.
    pub fn from_path(path: &str) -> Result<Self, InvalidPath> {
        PAGE_PATH
            .captures(path)
            .and_then(|captures| captures.get(2))
            .and_then(|id| id.as_str().parse().ok())
            .map(Self)
            .ok_or_else(|| InvalidPath(path.to_owned()))
    }

    /// Whether `path` looks like a topic page.
    pub fn is_page_path(path: &str) -> bool {
        PAGE_PATH.is_match(path)
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TopicId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Metadata of the first post of a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub username: String,
    /// Search results carry no update time.
    pub updated_at: Option<DateTime<Utc>>,
    /// A short plain text excerpt, only present in search results.
    pub blurb: String,
}

/// Topic metadata as the forum reports it, both for single topics and in search results.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopicMeta {
    pub id: TopicId,
    pub slug: String,
    pub title: String,
    #[serde(rename = "category_id")]
    pub category: u64,
    pub bumped_at: DateTime<Utc>,
}

/// A documentation topic, as fetched from the forum.
///
/// Topics are never modified once built. A newer version of the same topic is a new `Topic`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: TopicId,
    pub slug: String,
    pub title: String,
    pub category: u64,
    pub bumped_at: DateTime<Utc>,
    pub post: Option<Post>,
    /// zstd compressed HTML of the first post.
    ///
    /// Search results do not include the post HTML, topics built from them have none.
    content: Option<Vec<u8>>,
}

impl Topic {
    /// Builds a topic from the forum's metadata and the cooked HTML of its first post.
    ///
    /// Relative links into the forum are made absolute, and links to other topics are then
    /// turned back into links within the mirror.
    pub fn new(
        meta: TopicMeta,
        post: Option<Post>,
        cooked: Option<&str>,
        forum_url: &str,
    ) -> std::io::Result<Self> {
        let content = match cooked {
            Some(cooked) => {
                let html = rewrite_links(cooked, forum_url.trim_end_matches('/'));
                Some(zstd::bulk::compress(
                    html.as_bytes(),
                    zstd::DEFAULT_COMPRESSION_LEVEL,
                )?)
            }
            None => None,
        };
        let TopicMeta {
            id,
            slug,
            title,
            category,
            bumped_at,
        } = meta;
        Ok(Self {
            id,
            slug,
            title,
            category,
            bumped_at,
            post,
            content,
        })
    }

    /// The path of this topic within the mirror.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.slug, self.id)
    }

    /// The URL of the discussion on the forum itself.
    pub fn forum_url(&self, forum_url: &str) -> String {
        format!(
            "{}/t/{}/{}",
            forum_url.trim_end_matches('/'),
            self.slug,
            self.id
        )
    }

    /// Whether the HTML content of the first post is known.
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// The HTML content of the topic, empty if it is not known.
    pub fn content(&self) -> String {
        let Some(content) = &self.content else {
            return String::new();
        };
        match zstd::stream::decode_all(content.as_slice()) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::error!(
                    error = &e as &dyn std::error::Error,
                    topic = %self,
                    "Cannot decompress topic content"
                );
                BROKEN_CONTENT.to_owned()
            }
        }
    }

    /// Size of the compressed content in bytes.
    pub fn compressed_len(&self) -> usize {
        self.content.as_ref().map_or(0, Vec::len)
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.post
            .as_ref()
            .and_then(|post| post.updated_at)
            .unwrap_or(self.bumped_at)
    }

    pub fn blurb(&self) -> &str {
        self.post.as_ref().map_or("", |post| post.blurb.as_str())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.slug, self.id)
    }
}

fn rewrite_links(html: &str, forum_url: &str) -> String {
    html.replace(r#"href="/"#, &format!(r#"href="{forum_url}/"#))
        .replace(&format!(r#"href="{forum_url}/t/"#), r#"href="/"#)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn topic(id: u64, title: &str, html: &str) -> Topic {
        let meta = TopicMeta {
            id: TopicId(id),
            slug: title.to_lowercase().replace(' ', "-"),
            title: title.into(),
            category: 15,
            bumped_at: "2018-03-01T10:00:00Z".parse().unwrap(),
        };
        Topic::new(meta, None, Some(html), "https://forum.example.com").unwrap()
    }

    #[test]
    fn test_topic_id_from_path() {
        assert_eq!(TopicId::from_path("/1234"), Ok(TopicId(1234)));
        assert_eq!(TopicId::from_path("/some-slug/1234"), Ok(TopicId(1234)));
        assert_eq!(TopicId::from_path("/some-slug/1234/5"), Ok(TopicId(1234)));
        // Without a slug, a trailing number is taken as the topic id.
        assert_eq!(TopicId::from_path("/1234/5"), Ok(TopicId(5)));

        for path in ["/", "", "/some-slug", "/Some-Slug/12", "/a/b/12", "/12/x", "/12/"] {
            assert!(TopicId::from_path(path).is_err(), "{path} should not parse");
            assert!(!TopicId::is_page_path(path));
        }
    }

    #[test]
    fn test_links_rewritten() {
        let topic = topic(
            1,
            "Links",
            r#"<a href="/t/other/2">x</a> <a href="/u/someone">y</a> <a href="https://example.org/">z</a>"#,
        );
        assert_eq!(
            topic.content(),
            r#"<a href="/other/2">x</a> <a href="https://forum.example.com/u/someone">y</a> <a href="https://example.org/">z</a>"#
        );
    }

    #[test]
    fn test_content_compressed() {
        let html = "<p>hello</p>".repeat(1000);
        let topic = topic(1, "Big", &html);
        assert!(topic.compressed_len() < html.len());
        assert_eq!(topic.content(), html);
    }

    #[test]
    fn test_without_content() {
        let meta = TopicMeta {
            id: TopicId(3),
            slug: "found".into(),
            title: "Found".into(),
            category: 15,
            bumped_at: "2018-03-01T10:00:00Z".parse().unwrap(),
        };
        let topic = Topic::new(meta, None, None, "https://forum.example.com").unwrap();
        assert!(!topic.has_content());
        assert_eq!(topic.content(), "");
        assert_eq!(topic.compressed_len(), 0);
    }

    #[test]
    fn test_paths_and_urls() {
        let topic = topic(42, "The Answer", "");
        assert_eq!(topic.path(), "/the-answer/42");
        assert_eq!(topic.to_string(), "/the-answer/42");
        assert_eq!(
            topic.forum_url("https://forum.example.com/"),
            "https://forum.example.com/t/the-answer/42"
        );
    }

    #[test]
    fn test_last_update_and_blurb() {
        let mut topic = topic(1, "Dates", "");
        assert_eq!(topic.last_update(), topic.bumped_at);
        assert_eq!(topic.blurb(), "");

        let updated_at: DateTime<Utc> = "2019-01-01T00:00:00Z".parse().unwrap();
        topic.post = Some(Post {
            username: "someone".into(),
            updated_at: Some(updated_at),
            blurb: "short".into(),
        });
        assert_eq!(topic.last_update(), updated_at);
        assert_eq!(topic.blurb(), "short");
    }
}
