use std::time::Duration;

use reqwest::redirect;

use crate::config::DownloadTimeouts;

/// The `User-Agent` sent with every request to the forum.
pub const USER_AGENT: &str = concat!("docmirror/", env!("CARGO_PKG_VERSION"));

/// Creates a [`reqwest::Client`] for talking to the forum.
///
/// * `timeouts` controls connection and download timeouts.
/// * Responses are transparently decompressed.
/// * At most 5 redirects are followed, the forum itself never needs more.
pub fn create_client(timeouts: &DownloadTimeouts) -> reqwest::Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .gzip(true)
        .user_agent(USER_AGENT)
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.max_download)
        .pool_idle_timeout(Duration::from_secs(30))
        .redirect(redirect::Policy::limited(5))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::Router;
    use axum::http::HeaderMap;
    use axum::routing::get;

    #[tokio::test]
    async fn test_user_agent() {
        docmirror_test::setup();

        let router = Router::new().route(
            "/agent",
            get(|headers: HeaderMap| async move {
                headers
                    .get("user-agent")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default()
                    .to_owned()
            }),
        );
        let server = docmirror_test::Server::with_router(router);

        let agent = create_client(&Default::default())
            .unwrap()
            .get(server.url("/agent"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert!(agent.starts_with("docmirror/"));
    }

    #[tokio::test]
    async fn test_timeout() {
        docmirror_test::setup();

        let router = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "too late"
            }),
        );
        let server = docmirror_test::Server::with_router(router);

        let timeouts = DownloadTimeouts {
            connect: Duration::from_secs(1),
            max_download: Duration::from_millis(100),
        };
        let err = create_client(&timeouts)
            .unwrap()
            .get(server.url("/slow"))
            .send()
            .await
            .unwrap_err();

        assert!(err.is_timeout());
    }
}
