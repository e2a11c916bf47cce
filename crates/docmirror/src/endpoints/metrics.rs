use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use docmirror_service::metric;

/// Records the duration and status code of every response.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;

    metric!(timer("requests.duration") = start.elapsed());
    metric!(
        counter("responses.status_code") += 1,
        "status" => response.status().as_str(),
    );

    response
}
