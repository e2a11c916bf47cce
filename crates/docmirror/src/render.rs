//! HTML pages.
//!
//! Topic content is HTML cooked by the forum and inserted as is. Everything else is escaped.

use std::borrow::Cow;
use std::fmt::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use docmirror_service::config::DocsConfig;
use docmirror_service::types::Topic;

const STYLE: &str = r#"
body { font-family: Helvetica, Arial, sans-serif; margin: 0; }
pre, pre code { font-family: Consolas, Menlo, Monaco, "Liberation Mono", monospace; overflow: auto; max-height: 500px; }
code { background-color: #f5f5f5; color: #333; }
.sidebar { position: fixed; top: 0; bottom: 0; left: 0; width: 280px; padding: 20px; overflow-y: auto; border-right: 1px solid rgba(0,0,0,.1); }
.sidebar ul { padding-left: 0; list-style: none; }
.sidebar a { padding: 5px 10px; text-decoration: none; display: block; }
.content { margin-left: 330px; padding: 0 20px; max-width: 900px; }
.page-footer { margin-bottom: 100px; color: #777; }
img:not(.thumbnail) { max-width: 690px; max-height: 500px; }
img.emoji { width: 20px; height: 20px; vertical-align: top; }
table { border-collapse: collapse; }
table tr { border-bottom: 1px solid #eee; }
table td { padding: 3px 3px 3px 10px; }
@media (max-width: 768px) { .sidebar { position: relative; width: auto; } .content { margin-left: 0; } }
"#;

/// Escapes text for use in HTML content and attribute values.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Splits the outline topic's content at the configured separator.
///
/// Returns the introduction and the outline. Without a separator, the whole content is the
/// outline and there is no introduction.
fn split_index<'a>(content: &'a str, separator: &str) -> (Option<&'a str>, &'a str) {
    match content.find(separator) {
        Some(pos) => (Some(&content[..pos]), &content[pos + separator.len()..]),
        None => (None, content),
    }
}

/// Things shown on every page.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub docs: &'a DocsConfig,
    /// The outline topic, if it could be fetched.
    pub index: Option<&'a Topic>,
    /// Base URL of the forum.
    pub forum_url: &'a str,
}

impl Frame<'_> {
    fn outline(&self) -> String {
        match self.index {
            Some(index) => split_index(&index.content(), &self.docs.index_separator)
                .1
                .to_owned(),
            None => String::new(),
        }
    }

    fn render(&self, title: &str, query: &str, heading: &str, body: &str, footer: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title} - Documentation</title>
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<style>{STYLE}</style>
</head>
<body>
<div class="sidebar">
<form class="search" method="GET" action="/search">
<input type="search" name="q" placeholder="Search" value="{query}">
</form>
<div class="index">
{outline}
</div>
</div>
<div class="content">
<div class="page-header"><h1>{heading}</h1></div>
<div class="page-body">
{body}
</div>
<div class="page-footer">
<hr>
{footer}
</div>
</div>
</body>
</html>
"#,
            title = escape(title),
            query = escape(query),
            heading = escape(heading),
            outline = self.outline(),
        )
    }

    /// Renders a documentation topic.
    ///
    /// The outline topic itself is shown with its introduction only, under the configured title.
    pub fn topic_page(&self, topic: &Topic) -> String {
        let mut content = topic.content();
        let mut title = topic.title.as_str();

        if self.index.is_some_and(|index| index.id == topic.id) {
            if let (Some(intro), _) = split_index(&content, &self.docs.index_separator) {
                content = intro.to_owned();
                title = &self.docs.index_title;
            }
        }

        let footer = format!(
            r#"<div>For questions and comments see <a href="{url}">the forum topic</a>.</div>
<div>Last update on {updated}.</div>"#,
            url = escape(&topic.forum_url(self.forum_url)),
            updated = format_time(topic.last_update()),
        );

        self.render(title, "", title, &content, &footer)
    }

    /// Renders search results, or just a search form if there was no query.
    pub fn search_page(&self, query: &str, results: &[Arc<Topic>]) -> String {
        let query = query.trim();

        let mut body = format!(
            r#"<form class="search" method="GET" action="/search">
<input type="search" name="q" placeholder="Terms to search for" value="{}">
</form>
"#,
            escape(query)
        );
        for topic in results {
            // Blurbs come from the forum and may contain highlighting markup.
            let _ = write!(
                body,
                r#"<h2 class="result-title"><a href="{path}">{title}</a></h2>
<div class="result-blurb">{blurb}</div>
"#,
                path = escape(&topic.path()),
                title = escape(&topic.title),
                blurb = topic.blurb(),
            );
        }
        if results.is_empty() && !query.is_empty() {
            let _ = write!(
                body,
                "<h3>Cannot find any documents matching <code>{}</code> right now.</h3>",
                escape(query)
            );
        }

        let footer = if query.is_empty() {
            String::new()
        } else {
            format!(
                r#"<div>{}Consider asking about it <a href="{}/">in the forum</a>.</div>"#,
                if results.is_empty() {
                    ""
                } else {
                    "Cannot find what you are looking for? "
                },
                escape(self.forum_url.trim_end_matches('/')),
            )
        };

        let title = if query.is_empty() {
            "Search Results"
        } else {
            query
        };
        self.render(title, query, "Search", &body, &footer)
    }
}

#[cfg(test)]
mod tests {
    use docmirror_service::types::{TopicId, TopicMeta};

    use super::*;

    fn topic(id: u64, title: &str, html: &str) -> Topic {
        let meta = TopicMeta {
            id: TopicId(id),
            slug: title.to_lowercase().replace(' ', "-"),
            title: title.into(),
            category: 15,
            bumped_at: "2018-03-01T10:00:00Z".parse().unwrap(),
        };
        Topic::new(meta, None, Some(html), "https://forum.example.com").unwrap()
    }

    fn outline() -> Topic {
        topic(
            3781,
            "Documentation outline",
            r#"<p>Hello there</p><h1>Content</h1><ul><li><a href="/t/install/10">Install</a></li></ul>"#,
        )
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_split_index() {
        assert_eq!(
            split_index("intro<h1>Content</h1>outline", "<h1>Content</h1>"),
            (Some("intro"), "outline")
        );
        assert_eq!(split_index("outline", "<h1>Content</h1>"), (None, "outline"));
    }

    #[test]
    fn test_topic_page() {
        let docs = DocsConfig::default();
        let index = outline();
        let frame = Frame {
            docs: &docs,
            index: Some(&index),
            forum_url: "https://forum.example.com",
        };

        let page = frame.topic_page(&topic(10, "Install <snaps>", "<p>Run it.</p>"));

        assert!(page.contains("<title>Install &lt;snaps&gt; - Documentation</title>"));
        assert!(page.contains("<p>Run it.</p>"));
        assert!(page.contains(r#"<a href="/install/10">Install</a>"#));
        assert!(!page.contains("Hello there"));
        assert!(page.contains("https://forum.example.com/t/install-&lt;snaps&gt;/10"));
        assert!(page.contains("Last update on 2018-03-01 10:00:00 UTC."));
    }

    #[test]
    fn test_index_page() {
        let docs = DocsConfig::default();
        let index = outline();
        let frame = Frame {
            docs: &docs,
            index: Some(&index),
            forum_url: "https://forum.example.com",
        };

        let page = frame.topic_page(&index);

        assert!(page.contains("<h1>Welcome</h1>"));
        assert!(page.contains("<p>Hello there</p>"));
        assert!(!page.contains("Documentation outline"));
        assert!(page.contains(
            r#"<a href="https://forum.example.com/t/documentation-outline/3781">the forum topic</a>"#
        ));
    }

    #[test]
    fn test_page_without_index() {
        let docs = DocsConfig::default();
        let frame = Frame {
            docs: &docs,
            index: None,
            forum_url: "https://forum.example.com",
        };

        let page = frame.topic_page(&topic(10, "Install", "<p>Run it.</p>"));
        assert!(page.contains("<p>Run it.</p>"));
    }

    #[test]
    fn test_search_page() {
        let docs = DocsConfig::default();
        let frame = Frame {
            docs: &docs,
            index: None,
            forum_url: "https://forum.example.com/",
        };
        let results = vec![Arc::new(topic(10, "Install", ""))];

        let page = frame.search_page(" install ", &results);
        assert!(page.contains("<title>install - Documentation</title>"));
        assert!(page.contains(r#"<a href="/install/10">Install</a>"#));
        assert!(page.contains("Cannot find what you are looking for?"));
        assert!(page.contains(r#"<a href="https://forum.example.com/">in the forum</a>"#));

        let page = frame.search_page("<nothing>", &[]);
        assert!(page.contains("matching <code>&lt;nothing&gt;</code>"));
        assert!(!page.contains("Cannot find what you are looking for?"));

        let page = frame.search_page("", &[]);
        assert!(page.contains("<title>Search Results - Documentation</title>"));
        assert!(!page.contains("in the forum"));
    }
}
