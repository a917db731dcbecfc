// Axum offline proxy: plays the service-worker role for a browser pointed at it,
// sending every request through the cache router before the origin.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use reqwest::Url;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::MAX_PROXY_BODY_BYTES;
use crate::worker::lifecycle::ServiceWorker;
use crate::worker::network::is_hop_by_hop;
use crate::worker::request::{FetchRequest, FetchResponse, RequestMode};
use crate::worker::router::FetchOutcome;

pub struct OfflineProxy {
    addr: SocketAddr,
    worker: Arc<ServiceWorker>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl OfflineProxy {
    /// Start on a random local port.
    pub async fn start(worker: Arc<ServiceWorker>) -> Result<Self> {
        Self::start_on(worker, SocketAddr::from(([127, 0, 0, 1], 0))).await
    }

    /// Register the worker, then serve. A failed registration is logged and
    /// the proxy keeps forwarding every request unmodified.
    pub async fn start_on(worker: Arc<ServiceWorker>, addr: SocketAddr) -> Result<Self> {
        if let Err(e) = worker.register().await {
            error!("service worker registration failed, serving pass-through: {}", e);
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow!("failed to bind {}: {}", addr, e))?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let app = Router::new()
            .fallback(proxy_handler)
            .with_state(worker.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        info!("offline proxy on http://{} for {}", addr, worker.origin());

        Ok(Self {
            addr,
            worker,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Build a proxy URL for an origin-relative path.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }

    pub fn worker(&self) -> &Arc<ServiceWorker> {
        &self.worker
    }

    /// Shutdown the server gracefully.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Map an incoming request onto the origin. Absolute-form targets keep
/// their own origin so cross-origin traffic stays recognisable.
fn target_url(origin: &Url, uri: &Uri) -> Result<Url> {
    if uri.authority().is_some() {
        return Url::parse(&uri.to_string()).map_err(|e| anyhow!("bad request target: {}", e));
    }
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    origin
        .join(path)
        .map_err(|e| anyhow!("bad request path {}: {}", path, e))
}

fn forwardable(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers.iter() {
        if !is_hop_by_hop(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

async fn to_fetch_request(origin: &Url, req: Request) -> Result<FetchRequest> {
    let (parts, body) = req.into_parts();
    let url = target_url(origin, &parts.uri)?;
    let mode = RequestMode::from_headers(&parts.method, &parts.headers);
    let body = axum::body::to_bytes(body, MAX_PROXY_BODY_BYTES)
        .await
        .map_err(|e| anyhow!("failed to read request body: {}", e))?;

    let mut fetch = FetchRequest::new(parts.method, url, mode).with_body(body);
    fetch.headers = forwardable(&parts.headers);
    Ok(fetch)
}

fn into_response(resp: FetchResponse) -> Response {
    let mut out = Response::new(Body::from(resp.body));
    *out.status_mut() = resp.status;
    *out.headers_mut() = forwardable(&resp.headers);
    out
}

async fn proxy_handler(State(worker): State<Arc<ServiceWorker>>, req: Request) -> Response {
    let fetch = match to_fetch_request(worker.origin(), req).await {
        Ok(f) => f,
        Err(e) => {
            warn!("rejecting request: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    match worker.handle_fetch(&fetch).await {
        FetchOutcome::Respond(resp) => into_response(resp),
        FetchOutcome::Passthrough => match worker.network().fetch(&fetch).await {
            Ok(resp) => into_response(resp),
            Err(e) => {
                warn!("pass-through {} {} failed: {}", fetch.method, fetch.url, e);
                (StatusCode::BAD_GATEWAY, "upstream unavailable").into_response()
            }
        },
        FetchOutcome::Failed => {
            debug!("no response for {} {}", fetch.method, fetch.url);
            (StatusCode::SERVICE_UNAVAILABLE, "offline and not cached").into_response()
        }
    }
}
