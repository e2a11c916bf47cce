//! Helpers for testing the web server and the forum client.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - Hold on to a [`Server`] or [`ForumServer`] until all requests to it have been made. Once
//!    dropped, the server stops accepting connections. Assign it to a variable, like
//!    `let forum = ForumServer::new();`, instead of `let _ = ...`.

use std::collections::BTreeMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{OriginalUri, Path, Query, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the docmirror crates and mutes all
///    other logs (such as hyper or reqwest).
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("docmirror=trace,docmirror_service=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// A test server that binds to a random port and serves a web app.
///
/// This server requires a `tokio` runtime and is supposed to be run in a `tokio::test`. It
/// automatically stops serving when dropped.
#[derive(Debug)]
pub struct Server {
    pub handle: tokio::task::JoinHandle<()>,
    pub socket: SocketAddr,
}

impl Server {
    /// Creates a new test server serving the given router.
    pub fn with_router(router: Router) -> Self {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self { handle, socket }
    }

    /// Returns the socket address that this server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.socket
    }

    /// Returns the port that this server listens on.
    pub fn port(&self) -> u16 {
        self.addr().port()
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> Url {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.port(), path)
            .parse()
            .unwrap()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Builds the JSON the forum returns for `/t/{id}.json`.
pub fn topic_json(id: u64, title: &str, category: u64, cooked: &str) -> Value {
    json!({
        "id": id,
        "slug": title.to_lowercase().replace(' ', "-"),
        "title": title,
        "category_id": category,
        "bumped_at": "2018-03-01T10:00:00.000Z",
        "post_stream": {
            "posts": [{
                "username": "author",
                "cooked": cooked,
                "updated_at": "2018-02-27T09:30:00.000Z",
            }]
        }
    })
}

/// What the mock forum answers for a topic.
#[derive(Debug, Clone)]
enum Reply {
    Json(Value),
    Raw(String),
    Status(StatusCode),
}

#[derive(Debug, Default)]
struct ForumState {
    topics: BTreeMap<u64, Reply>,
    search: Option<Value>,
    queries: Vec<String>,
    delay: Duration,
    hits: BTreeMap<String, usize>,
}

type SharedState = Arc<Mutex<ForumState>>;

/// A mock of the forum's JSON API.
///
/// It serves `/t/{id}.json` for every topic added with [`add_topic`](Self::add_topic), 404 for
/// all others, and `/search.json` with whatever was set through
/// [`set_search_results`](Self::set_search_results). All requests are counted by path.
pub struct ForumServer {
    server: Server,
    state: SharedState,
}

impl ForumServer {
    pub fn new() -> Self {
        let state = SharedState::default();

        let router = Router::new()
            .route("/t/:file", get(topic))
            .route("/search.json", get(search))
            .layer(middleware::from_fn_with_state(state.clone(), count_hits))
            .with_state(state.clone());

        let server = Server::with_router(router);

        Self { server, state }
    }

    /// Serves `topic`, which is usually built by [`topic_json`], under its id.
    pub fn add_topic(&self, topic: Value) {
        let id = topic["id"].as_u64().unwrap();
        self.set_reply(id, Reply::Json(topic));
    }

    /// Answers requests for topic `id` with a bare `status`.
    pub fn respond_status(&self, id: u64, status: StatusCode) {
        self.set_reply(id, Reply::Status(status));
    }

    /// Answers requests for topic `id` with a `200 OK` and `body`.
    pub fn respond_raw(&self, id: u64, body: &str) {
        self.set_reply(id, Reply::Raw(body.to_owned()));
    }

    fn set_reply(&self, id: u64, reply: Reply) {
        self.state.lock().unwrap().topics.insert(id, reply);
    }

    pub fn set_search_results(&self, results: Value) {
        self.state.lock().unwrap().search = Some(results);
    }

    /// Delays every response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    /// Returns how often `path` was requested.
    pub fn hits(&self, path: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.hits.get(path).copied().unwrap_or_default()
    }

    /// Returns the total number of requests made so far.
    pub fn accesses(&self) -> usize {
        self.state.lock().unwrap().hits.values().sum()
    }

    /// Returns all search queries received so far.
    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    /// The base URL of the forum, to be used as `forum.url`.
    pub fn base_url(&self) -> Url {
        self.server.url("")
    }

    pub fn url(&self, path: &str) -> Url {
        self.server.url(path)
    }
}

impl Default for ForumServer {
    fn default() -> Self {
        Self::new()
    }
}

async fn count_hits(
    State(state): State<SharedState>,
    OriginalUri(uri): OriginalUri,
    request: Request,
    next: Next,
) -> Response {
    let delay = {
        let mut state = state.lock().unwrap();
        *state.hits.entry(uri.path().to_owned()).or_default() += 1;
        state.delay
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    next.run(request).await
}

async fn topic(State(state): State<SharedState>, Path(file): Path<String>) -> Response {
    let reply = file
        .strip_suffix(".json")
        .and_then(|id| id.parse().ok())
        .and_then(|id: u64| state.lock().unwrap().topics.get(&id).cloned());

    match reply {
        Some(Reply::Json(value)) => axum::Json(value).into_response(),
        Some(Reply::Raw(body)) => body.into_response(),
        Some(Reply::Status(status)) => status.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: String,
}

async fn search(State(state): State<SharedState>, Query(params): Query<SearchParams>) -> Response {
    let mut state = state.lock().unwrap();
    state.queries.push(params.q);
    let results = state
        .search
        .clone()
        .unwrap_or_else(|| json!({ "posts": [], "topics": [] }));
    axum::Json(results).into_response()
}
