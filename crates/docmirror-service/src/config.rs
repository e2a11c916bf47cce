use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use sentry::types::Dsn;
use serde::{Deserialize, Deserializer, de};
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::types::{InvalidPath, TopicId};

/// Controls the log format
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect (pretty for tty, simplified for other)
    Auto,
    /// With colors
    Pretty,
    /// Simplified log output
    Simplified,
    /// Dump out JSON lines
    Json,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub struct HttpsConfig {
    pub certificate_path: PathBuf,
    pub key_path: PathBuf,
}

impl Default for HttpsConfig {
    fn default() -> Self {
        HttpsConfig {
            certificate_path: PathBuf::from("cert.pem"),
            key_path: PathBuf::from("key.pem"),
        }
    }
}

/// Controls the HTTPS server setup
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTPS configuration
    pub https: Option<HttpsConfig>,
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// The log level for docmirror.
    #[serde(deserialize_with = "deserialize_level_filter")]
    pub level: LevelFilter,
    /// Controls the log format.
    pub format: LogFormat,
    /// When set to true, backtraces are forced on.
    pub enable_backtraces: bool,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
            enable_backtraces: true,
        }
    }
}

/// Control the metrics.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Metrics {
    /// host/port of statsd instance
    pub statsd: Option<String>,
    /// The prefix that should be added to all metrics.
    pub prefix: String,
    /// A tag name to report the hostname to, for each metric. Defaults to not sending such a tag.
    pub hostname_tag: Option<String>,
    /// A map containing custom tags and their values.
    ///
    /// These tags will be appended to every metric.
    pub custom_tags: BTreeMap<String, String>,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            statsd: env::var("STATSD_SERVER").ok(),
            prefix: "docmirror".into(),
            hostname_tag: None,
            custom_tags: BTreeMap::new(),
        }
    }
}

/// The forum that hosts the documentation topics.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ForumConfig {
    /// Base URL of the forum, without a trailing slash.
    pub url: Url,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("https://forum.snapcraft.io").expect("static forum URL is valid"),
        }
    }
}

/// Which parts of the forum are considered documentation.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct DocsConfig {
    /// Request path of the topic that holds the documentation outline.
    pub index_path: String,
    /// Marker in the outline topic separating its introduction from the outline itself.
    pub index_separator: String,
    /// Title shown instead of the outline topic's own title on the front page.
    pub index_title: String,
    /// Forum category id of documentation topics.
    ///
    /// Topics from any other category are redirected to the forum.
    pub category: u64,
}

impl DocsConfig {
    /// The id of the outline topic.
    pub fn index_id(&self) -> Result<TopicId, InvalidPath> {
        TopicId::from_path(&self.index_path)
    }
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            index_path: "/documentation-outline/3781".into(),
            index_separator: "<h1>Content</h1>".into(),
            index_title: "Welcome".into(),
            category: 15,
        }
    }
}

/// Fine-tuning the topic cache.
#[derive(Debug, Clone, Copy, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct TopicCacheConfig {
    /// How long a fetched topic is served without asking the forum again.
    #[serde(with = "humantime_serde")]
    pub fresh_ttl: Duration,

    /// How long a fetched topic may still be served when the forum cannot be reached.
    #[serde(with = "humantime_serde")]
    pub fallback_ttl: Duration,
}

impl Default for TopicCacheConfig {
    fn default() -> Self {
        Self {
            fresh_ttl: Duration::from_secs(3600),
            fallback_ttl: Duration::from_secs(3600 * 24 * 7),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct CacheConfigs {
    /// Configure how long forum topics are cached for.
    pub topics: TopicCacheConfig,
}

/// Timeouts for requests to the forum.
#[derive(Debug, Clone, Copy, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct DownloadTimeouts {
    /// The timeout for establishing a connection.
    #[serde(with = "humantime_serde")]
    pub connect: Duration,
    /// Global timeout for one request, including reading the body.
    #[serde(with = "humantime_serde")]
    pub max_download: Duration,
}

impl Default for DownloadTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(2),
            max_download: Duration::from_secs(10),
        }
    }
}

/// The docmirror configuration, usually loaded from a YAML file.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host and port to bind the HTTP webserver to.
    pub bind: Option<String>,

    /// Host and port to bind the HTTPS webserver to.
    pub bind_https: Option<String>,

    /// Configuration for internal logging.
    pub logging: Logging,

    /// Configuration for reporting metrics to a statsd instance.
    pub metrics: Metrics,

    pub server_config: ServerConfig,

    /// DSN to report internal errors to
    pub sentry_dsn: Option<Dsn>,

    /// The forum to mirror.
    pub forum: ForumConfig,

    /// Which forum topics make up the documentation.
    pub docs: DocsConfig,

    /// Fine-tune cache expiry
    pub caches: CacheConfigs,

    /// Timeouts for talking to the forum.
    pub timeouts: DownloadTimeouts,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: Some("127.0.0.1:8080".to_owned()),
            bind_https: None,
            logging: Logging::default(),
            metrics: Metrics::default(),
            server_config: ServerConfig::default(),
            sentry_dsn: None,
            forum: ForumConfig::default(),
            docs: DocsConfig::default(),
            caches: CacheConfigs::default(),
            timeouts: DownloadTimeouts::default(),
        }
    }
}

impl Config {
    pub fn get(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_reader(
                fs::File::open(path).context("failed to open configuration file")?,
            )?,
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn from_reader(mut reader: impl std::io::Read) -> Result<Self> {
        let mut config = String::new();
        reader
            .read_to_string(&mut config)
            .context("failed reading config file")?;
        // check for empty files explicitly
        if config.trim().is_empty() {
            anyhow::bail!("config file empty");
        }
        serde_yaml::from_str(&config).context("failed to parse config YAML")
    }

    /// Checks combinations of settings that cannot be expressed in the types.
    pub fn validate(&self) -> Result<()> {
        if self.bind.is_none() && self.bind_https.is_none() {
            anyhow::bail!("must provide `bind` and/or `bind_https`");
        }
        if self.bind_https.is_some() && self.server_config.https.is_none() {
            anyhow::bail!("`bind_https` requires `server_config.https` with a certificate and key");
        }
        self.docs
            .index_id()
            .context("`docs.index_path` must be the path of a topic")?;
        if self.caches.topics.fallback_ttl < self.caches.topics.fresh_ttl {
            anyhow::bail!("`caches.topics.fallback_ttl` must not be shorter than `fresh_ttl`");
        }
        Ok(())
    }
}

#[derive(Debug)]
struct LevelFilterVisitor;

impl de::Visitor<'_> for LevelFilterVisitor {
    type Value = LevelFilter;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> std::fmt::Result {
        write!(
            formatter,
            r#"one of the strings "off", "error", "warn", "info", "debug", or "trace""#
        )
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match v {
            "off" => Ok(LevelFilter::OFF),
            "error" => Ok(LevelFilter::ERROR),
            "warn" => Ok(LevelFilter::WARN),
            "info" => Ok(LevelFilter::INFO),
            "debug" => Ok(LevelFilter::DEBUG),
            "trace" => Ok(LevelFilter::TRACE),
            _ => Err(de::Error::unknown_variant(
                v,
                &["off", "error", "warn", "info", "debug", "trace"],
            )),
        }
    }
}

fn deserialize_level_filter<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<LevelFilter, D::Error> {
    deserializer.deserialize_str(LevelFilterVisitor)
}
