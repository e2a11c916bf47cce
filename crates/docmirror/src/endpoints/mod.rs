use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::get;
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};
use tower::ServiceBuilder;

use docmirror_service::metric;
use docmirror_service::services::DocsService;

mod metrics;
mod page;
mod search;

use metrics::track_metrics;

pub async fn healthcheck() -> &'static str {
    metric!(counter("healthcheck") += 1);
    "ok"
}

async fn favicon() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Builds the web frontend.
///
/// Only `GET` requests are served, anything else is answered with `405 Method Not Allowed`.
/// Every path that is not routed explicitly is looked up as a topic page.
pub fn create_app(service: DocsService) -> Router {
    // The layers here go "top to bottom" according to the reading order here.
    let layer = ServiceBuilder::new()
        .layer(NewSentryLayer::new_from_top())
        .layer(SentryHttpLayer::new().enable_transaction())
        .layer(middleware::from_fn(track_metrics));

    Router::new()
        .route("/", get(page::index))
        .route("/search", get(search::search))
        .route("/t/*path", get(page::strip_t_prefix))
        .route("/favicon.ico", get(favicon))
        .fallback(get(page::page))
        .with_state(service)
        .layer(layer)
        // the healthcheck is last, as it will bypass all the middlewares
        .route("/health-check", get(healthcheck))
}

#[cfg(test)]
mod tests;
