use std::net::SocketAddr;

use axum::extract::{ConnectInfo, OriginalUri, Query, State};
use axum::http::Uri;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;

use docmirror_service::services::DocsService;
use docmirror_service::types::TopicId;

use crate::render::Frame;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    /// Present, with any value, to drop the cached copy of the topic first.
    refresh: Option<String>,
}

/// Redirects forum style links like `/t/some-slug/1234` to `/some-slug/1234`.
pub async fn strip_t_prefix(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    OriginalUri(uri): OriginalUri,
) -> Redirect {
    let target = uri.path().strip_prefix("/t").unwrap_or(uri.path());
    tracing::info!(
        "Got request for {} from {}: redirecting to strip /t/",
        uri,
        addr
    );
    Redirect::permanent(target)
}

/// Shows the documentation outline.
pub async fn index(
    State(service): State<DocsService>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<PageParams>,
) -> Response {
    tracing::info!("Got request for {} from {}", uri, addr);
    let id = service.index_id();
    show_topic(&service, id, params, &uri, addr).await
}

/// Shows the topic named by the request path.
pub async fn page(
    State(service): State<DocsService>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<PageParams>,
) -> Response {
    tracing::info!("Got request for {} from {}", uri, addr);
    match TopicId::from_path(uri.path()) {
        Ok(id) => show_topic(&service, id, params, &uri, addr).await,
        Err(error) => {
            tracing::info!("Cannot send {} to {}: {}", uri, addr, error);
            Redirect::temporary("/").into_response()
        }
    }
}

async fn show_topic(
    service: &DocsService,
    id: TopicId,
    params: PageParams,
    uri: &Uri,
    addr: SocketAddr,
) -> Response {
    if params.refresh.is_some() {
        service.refresh(id);
    }

    let topic = match service.topic(id).await {
        Ok(topic) => topic,
        Err(error) => {
            tracing::warn!(
                error = &error as &dyn std::error::Error,
                "Cannot send {} to {}",
                uri,
                addr
            );
            return Redirect::temporary("/").into_response();
        }
    };

    let forum_url = service.forum_url().as_str();
    if topic.category != service.docs().category {
        tracing::info!(
            "Cannot send {} to {}: not a documentation topic, redirecting to the forum",
            uri,
            addr
        );
        return Redirect::temporary(&topic.forum_url(forum_url)).into_response();
    }

    let index = service.index().await;
    if let Err(error) = &index {
        tracing::warn!(
            error = error as &dyn std::error::Error,
            "Cannot obtain documentation index"
        );
    }

    let frame = Frame {
        docs: service.docs(),
        index: index.as_deref().ok(),
        forum_url,
    };
    Html(frame.topic_page(&topic)).into_response()
}
