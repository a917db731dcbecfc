// Integration test for the OfflineProxy: online through a live origin, then
// offline from the caches the router filled.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use addremarks::config::WorkerConfig;
use addremarks::server::handler::OfflineProxy;
use addremarks::worker::cache_set::VersionTag;
use addremarks::worker::lifecycle::{ServiceWorker, WorkerState};
use addremarks::worker::network::HttpNetwork;
use addremarks::worker::storage::MemoryCacheStorage;

const SHELL_HTML: &str = "<!doctype html><title>AddRemarks</title>";
const APP_JS: &str = "console.log('addremarks')";

async fn start_origin() -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route(
            "/",
            get(|| async { ([(header::CONTENT_TYPE, "text/html")], SHELL_HTML) }),
        )
        .route(
            "/manifest.json",
            get(|| async { ([(header::CONTENT_TYPE, "application/json")], "{}") }),
        )
        .route("/app.js", get(|| async { APP_JS }))
        .route("/report", get(|| async { "live report" }))
        .route(
            "/upload",
            axum::routing::post(|| async { StatusCode::CREATED.into_response() }),
        );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

fn worker_for(origin: SocketAddr) -> Arc<ServiceWorker> {
    let config = WorkerConfig {
        origin: format!("http://{}", origin),
        ..WorkerConfig::default()
    };
    // No pooled connections, so a stopped origin is really unreachable.
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();
    Arc::new(
        ServiceWorker::with_version(
            &config,
            VersionTag::from("v-1"),
            Arc::new(HttpNetwork::with_client(client)),
            Arc::new(MemoryCacheStorage::new()),
        )
        .unwrap(),
    )
}

async fn get_page(client: &reqwest::Client, url: &str) -> reqwest::Response {
    client
        .get(url)
        .header("sec-fetch-mode", "navigate")
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_proxy_serves_offline_from_cache() {
    let (origin, origin_task) = start_origin().await;
    let proxy = OfflineProxy::start(worker_for(origin)).await.unwrap();
    assert_eq!(proxy.worker().state(), WorkerState::Active);

    let client = reqwest::Client::new();

    // Online: live responses, caches filled along the way.
    let resp = get_page(&client, &proxy.url("/")).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), SHELL_HTML);

    let resp = client.get(proxy.url("/app.js")).send().await.unwrap();
    assert_eq!(resp.text().await.unwrap(), APP_JS);

    let resp = client.get(proxy.url("/report")).send().await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "live report");

    let resp = client.post(proxy.url("/upload")).body("x").send().await.unwrap();
    assert_eq!(resp.status(), 201);

    proxy.worker().settle().await;

    // Offline.
    origin_task.abort();
    let _ = origin_task.await;

    let resp = get_page(&client, &proxy.url("/")).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), SHELL_HTML);

    let resp = get_page(&client, &proxy.url("/history")).await;
    assert_eq!(resp.text().await.unwrap(), SHELL_HTML);

    let resp = client.get(proxy.url("/app.js")).send().await.unwrap();
    assert_eq!(resp.text().await.unwrap(), APP_JS);

    let resp = client.get(proxy.url("/report")).send().await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "live report");

    let resp = client.get(proxy.url("/unknown")).send().await.unwrap();
    assert_eq!(resp.status(), 503);

    let resp = client.post(proxy.url("/upload")).body("x").send().await.unwrap();
    assert_eq!(resp.status(), 502);

    let stats = proxy.worker().stats();
    assert!(stats.cache_hits >= 3);
    assert_eq!(stats.shell_fallbacks, 1);
    assert_eq!(stats.failed, 1);

    proxy.shutdown();
}

#[tokio::test]
async fn test_failed_registration_falls_back_to_pass_through() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let proxy = OfflineProxy::start(worker_for(dead)).await.unwrap();
    assert_eq!(proxy.worker().state(), WorkerState::Redundant);

    let client = reqwest::Client::new();
    let resp = get_page(&client, &proxy.url("/")).await;
    assert_eq!(resp.status(), 502);
    assert_eq!(proxy.worker().stats().passthrough, 1);

    proxy.shutdown();
}
