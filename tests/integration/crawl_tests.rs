//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small site and drive crawl events
//! through the policy and through a fully wired application.

use pantopod::app::Application;
use pantopod::config::parse_config;
use pantopod::crawler::{build_http_client, CrawlPolicy, EventHandler, HttpFetcher};
use pantopod::storage::{CrawlStore, FileCrawlStore, SqliteCrawlStore};
use pantopod::CrawlEvent;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Host and port of the mock server, which doubles as the crawl topic
fn topic(server: &MockServer) -> String {
    let uri = Url::parse(&server.uri()).expect("Failed to parse base URL");
    format!(
        "{}:{}",
        uri.host_str().expect("Failed to extract host"),
        uri.port().expect("Mock server has no port")
    )
}

async fn mount_page(server: &MockServer, page: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..500 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("crawl did not reach the expected state");
}

fn http_fetcher() -> Arc<HttpFetcher> {
    let client = build_http_client(&Default::default(), None).unwrap();
    Arc::new(HttpFetcher::new(client))
}

#[tokio::test]
async fn test_seed_page_yields_follow_ups_and_external_edge() {
    let server = MockServer::start().await;
    let topic = topic(&server);
    mount_page(
        &server,
        "/start/index.html",
        200,
        r#"<html><body>
            <a href="/start/a.html">A</a>
            <a href="/start/a.html">A again</a>
            <a href="b.html">B</a>
            <a href="http://other.com/">Elsewhere</a>
        </body></html>"#,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteCrawlStore::new(&dir.path().join("crawl.db")).unwrap());
    let policy = CrawlPolicy::new(http_fetcher(), store.clone());

    let seed = CrawlEvent::seed(&topic, Some("/start/"), Some("index.html"));
    assert_eq!(
        seed.url.as_deref(),
        Some(format!("http://{}/start/index.html", topic).as_str())
    );

    let next = policy.handle(&seed).await.unwrap();

    assert_eq!(next.len(), 2);
    for event in &next {
        assert_eq!(event.depth, 1);
        assert_eq!(event.chroot.as_deref(), Some("/start/"));
        assert!(!event.url.as_deref().unwrap().contains("other.com"));
    }
    assert_eq!(
        store.external_edges().unwrap(),
        vec![("127.0.0.1".to_string(), "other.com".to_string())]
    );
}

#[tokio::test]
async fn test_not_found_is_recorded_and_not_refetched() {
    let server = MockServer::start().await;
    let topic = topic(&server);
    Mock::given(method("GET"))
        .and(path("/missing.html"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileCrawlStore::new(dir.path()).unwrap());
    let policy = CrawlPolicy::new(http_fetcher(), store.clone());
    let event = CrawlEvent::seed(&topic, None, Some("/missing.html"));

    assert!(policy.handle(&event).await.unwrap().is_empty());
    assert!(policy.handle(&event).await.unwrap().is_empty());

    let url = Url::parse(event.url.as_deref().unwrap()).unwrap();
    assert!(store.has_error(&url).unwrap());
    server.verify().await;
}

#[tokio::test]
async fn test_application_crawls_configured_resource() {
    let server = MockServer::start().await;
    let topic = topic(&server);
    mount_page(
        &server,
        "/start/index.html",
        200,
        r#"<a href="/start/a.html">A</a><a href="/start/gone.html">Gone</a>"#,
    )
    .await;
    mount_page(
        &server,
        "/start/a.html",
        200,
        r#"<a href="/start/index.html">Home</a><a href="/start/b.html">B</a>"#,
    )
    .await;
    mount_page(&server, "/start/b.html", 200, "<p>leaf</p>").await;
    mount_page(&server, "/start/gone.html", 404, "").await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");
    let config = parse_config(&format!(
        r#"
[cluster]
zk-connect-string = "local"
cluster-name = "pantopod"
participant-name = "test-participant"

[broker]
broker-list = "memory"

[output]
database-path = "{}"

[[resource]]
name = "{}"
chroot = "/start/"
start-page = "index.html"
"#,
        db_path.display(),
        topic
    ))
    .unwrap();

    let app = Application::build(config).unwrap();
    app.start().await.unwrap();
    assert_eq!(app.manager().active_consumers(&topic).await, 1);

    let store = SqliteCrawlStore::new(&db_path).unwrap();
    wait_until(|| store.stats().map(|s| s.records == 4).unwrap_or(false)).await;
    app.stop().await;

    let stats = store.stats().unwrap();
    assert_eq!(stats.records, 4);
    assert_eq!(stats.errors, 1);

    let b = Url::parse(&format!("http://{}/start/b.html", topic)).unwrap();
    assert!(!store.should_explore(&b).unwrap());
    assert_eq!(app.manager().active_consumers(&topic).await, 0);
}
