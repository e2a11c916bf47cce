use docmirror_service::config::Config;
use docmirror_service::services::create_service;
use docmirror_test::{ForumServer, Server, topic_json};
use reqwest::StatusCode;
use reqwest::header::LOCATION;
use serde_json::json;

use super::create_app;

const OUTLINE: &str = r#"<p>Welcome to the docs.</p><h1>Content</h1><ul><li><a href="/t/install/10">Install</a></li></ul>"#;

/// A mirror of `forum`, serving the outline and an `Install` topic.
fn mirror(forum: &ForumServer) -> Server {
    forum.add_topic(topic_json(3781, "Documentation outline", 15, OUTLINE));
    forum.add_topic(topic_json(10, "Install", 15, "<p>Run the installer.</p>"));

    let mut config = Config::default();
    config.forum.url = forum.base_url();
    let service = create_service(&config).unwrap();

    Server::with_router(create_app(service))
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

async fn get(server: &Server, path: &str) -> reqwest::Response {
    client().get(server.url(path)).send().await.unwrap()
}

fn location(response: &reqwest::Response) -> &str {
    response.headers()[LOCATION].to_str().unwrap()
}

#[tokio::test]
async fn test_healthcheck() {
    docmirror_test::setup();

    let forum = ForumServer::new();
    let server = mirror(&forum);

    let response = get(&server, "/health-check").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_favicon() {
    docmirror_test::setup();

    let forum = ForumServer::new();
    let server = mirror(&forum);

    let response = get(&server, "/favicon.ico").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(forum.accesses(), 0);
}

#[tokio::test]
async fn test_only_get() {
    docmirror_test::setup();

    let forum = ForumServer::new();
    let server = mirror(&forum);

    for path in ["/", "/install/10", "/search"] {
        let response = client().post(server.url(path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{path}");
    }
}

#[tokio::test]
async fn test_strip_t_prefix() {
    docmirror_test::setup();

    let forum = ForumServer::new();
    let server = mirror(&forum);

    let response = get(&server, "/t/install/10").await;
    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(location(&response), "/install/10");
}

#[tokio::test]
async fn test_index() {
    docmirror_test::setup();

    let forum = ForumServer::new();
    let server = mirror(&forum);

    let response = get(&server, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = response.text().await.unwrap();

    assert!(page.contains("<h1>Welcome</h1>"));
    assert!(page.contains("<p>Welcome to the docs.</p>"));
    assert!(page.contains(r#"<a href="/install/10">Install</a>"#));
    assert_eq!(forum.hits("/t/3781.json"), 1);
}

#[tokio::test]
async fn test_topic_page() {
    docmirror_test::setup();

    let forum = ForumServer::new();
    let server = mirror(&forum);

    for path in ["/install/10", "/10", "/install/10/3"] {
        let response = get(&server, path).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
        let page = response.text().await.unwrap();
        assert!(page.contains("<p>Run the installer.</p>"));
        assert!(page.contains(r#"<a href="/install/10">Install</a>"#));
        assert!(page.contains("Last update on 2018-02-27 09:30:00 UTC."));
    }

    // Everything after the first request came from the cache.
    assert_eq!(forum.hits("/t/10.json"), 1);
    assert_eq!(forum.hits("/t/3781.json"), 1);
}

#[tokio::test]
async fn test_refresh() {
    docmirror_test::setup();

    let forum = ForumServer::new();
    let server = mirror(&forum);

    get(&server, "/install/10").await;
    forum.add_topic(topic_json(10, "Install", 15, "<p>Use the store.</p>"));

    let page = get(&server, "/install/10").await.text().await.unwrap();
    assert!(page.contains("<p>Run the installer.</p>"));

    let page = get(&server, "/install/10?refresh").await.text().await.unwrap();
    assert!(page.contains("<p>Use the store.</p>"));
    assert_eq!(forum.hits("/t/10.json"), 2);
}

#[tokio::test]
async fn test_errors_redirect_home() {
    docmirror_test::setup();

    let forum = ForumServer::new();
    forum.respond_status(11, StatusCode::INTERNAL_SERVER_ERROR);
    let server = mirror(&forum);

    for path in ["/missing/99", "/broken/11", "/not-a-topic", "/Install/10"] {
        let response = get(&server, path).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{path}");
        assert_eq!(location(&response), "/", "{path}");
    }
}

#[tokio::test]
async fn test_foreign_category_redirects_to_forum() {
    docmirror_test::setup();

    let forum = ForumServer::new();
    let server = mirror(&forum);
    forum.add_topic(topic_json(20, "Off topic", 4, "<p>chatter</p>"));

    let response = get(&server, "/off-topic/20").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        forum.url("/t/off-topic/20").as_str()
    );
}

#[tokio::test]
async fn test_search() {
    docmirror_test::setup();

    let forum = ForumServer::new();
    let server = mirror(&forum);
    forum.set_search_results(json!({
        "posts": [
            { "username": "a", "topic_id": 3781, "blurb": "the outline" },
            { "username": "b", "topic_id": 10, "blurb": "run the <b>installer</b>" },
        ],
        "topics": [
            { "id": 3781, "slug": "documentation-outline", "title": "Documentation outline", "category_id": 15, "bumped_at": "2018-01-01T00:00:00Z" },
            { "id": 10, "slug": "install", "title": "Install", "category_id": 15, "bumped_at": "2018-01-02T00:00:00Z" },
        ],
    }));

    let response = get(&server, "/search?q=installer").await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = response.text().await.unwrap();

    assert!(page.contains(r#"<h2 class="result-title"><a href="/install/10">Install</a></h2>"#));
    assert!(page.contains("run the <b>installer</b>"));
    assert!(!page.contains("the outline"));
    assert_eq!(forum.queries(), ["#doc @wiki installer"]);

    // Search results have no content, so the topic page still asks the forum.
    get(&server, "/install/10").await;
    assert_eq!(forum.hits("/t/10.json"), 1);
}

#[tokio::test]
async fn test_empty_search() {
    docmirror_test::setup();

    let forum = ForumServer::new();
    let server = mirror(&forum);

    let response = get(&server, "/search").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("Search Results"));
    assert_eq!(forum.hits("/search.json"), 0);
}
