use std::net::SocketAddr;

use axum::extract::{ConnectInfo, OriginalUri, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;

use docmirror_service::services::DocsService;

use crate::render::Frame;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
}

pub async fn search(
    State(service): State<DocsService>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<SearchParams>,
) -> Response {
    tracing::info!("Got request for {} from {}", uri, addr);

    let results = match service.search(&params.q).await {
        Ok(results) => results,
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
        forum_url: service.forum_url().as_str(),
    };
    Html(frame.search_page(&params.q, &results)).into_response()
}
