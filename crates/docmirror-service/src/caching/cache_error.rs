use std::error::Error;
use std::time::Duration;

use thiserror::Error;

/// An error that happens when fetching a topic from the forum.
///
/// The cache never stores these. A failed fetch is either masked by a stale topic or handed to the
/// caller, see [`TopicCache`](super::TopicCache).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The forum has no such topic, or does not let us see it.
    #[error("documentation page not found")]
    NotFound,
    /// The forum did not answer within the configured timeout.
    #[error("cannot obtain documentation page: timed out after {0:?}")]
    Timeout(Duration),
    /// The topic could not be fetched due to another problem,
    /// like connection loss, DNS resolution, or an unexpected status code.
    ///
    /// The attached string contains the underlying error or the forum's status.
    #[error("cannot obtain documentation page: {0}")]
    DownloadError(String),
    /// The forum answered, but the response could not be understood.
    #[error("cannot decode documentation page: {0}")]
    Malformed(String),
    /// The forum answered successfully, but the topic has no posts.
    #[error("documentation page seems empty")]
    EmptyResponse,
    /// An unexpected error in docmirror itself.
    #[error("internal error")]
    InternalError,
}

impl CacheError {
    /// Builds a [`DownloadError`](Self::DownloadError) from the innermost cause of `error`.
    pub(crate) fn download_error(mut error: &dyn Error) -> Self {
        while let Some(src) = error.source() {
            error = src;
        }

        let mut error_string = error.to_string();

        // Special-case a few error strings
        if error_string.contains("certificate verify failed") {
            error_string = "certificate verify failed".to_string();
        }

        Self::DownloadError(error_string)
    }

    /// A short name for metrics tags.
    pub fn metric_tag(&self) -> &'static str {
        match self {
            Self::NotFound => "notfound",
            Self::Timeout(_) => "timeout",
            Self::DownloadError(_) => "downloaderror",
            Self::Malformed(_) => "malformed",
            Self::EmptyResponse => "empty",
            Self::InternalError => "internalerror",
        }
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(error: reqwest::Error) -> Self {
        Self::download_error(&error)
    }
}

/// A topic lookup result, containing either `Ok(T)` or the reason why the topic is unavailable.
pub type CacheEntry<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_download_error_uses_root_cause() {
        let err = Outer(std::io::Error::other("connection reset"));
        assert_eq!(
            CacheError::download_error(&err),
            CacheError::DownloadError("connection reset".into())
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            CacheError::NotFound.to_string(),
            "documentation page not found"
        );
        assert_eq!(
            CacheError::DownloadError("got 502 Bad Gateway status".into()).to_string(),
            "cannot obtain documentation page: got 502 Bad Gateway status"
        );
    }
}
