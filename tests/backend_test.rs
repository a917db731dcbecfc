// HttpBackend and the full upload flow against a fake processing server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::json;
use tokio::net::TcpListener;

use addremarks::backend::http_backend::HttpBackend;
use addremarks::backend::traits::{Backend, ProcessingStatus, TransferProgress};
use addremarks::config::ClientConfig;
use addremarks::controller::session::{FileOrigin, SelectedFile, UploadStatus};
use addremarks::controller::upload::UploadController;
use addremarks::detect::file_type::CSV_MIME;
use addremarks::error::{ClientError, TransportError};

const FILE_ID: &str = "f-123";
const RESULT_CSV: &str = "name,phone,remarks\nAna,555,ok\n";

#[derive(Default)]
struct FakeState {
    uploads: Vec<Bytes>,
    /// Remaining `processing` answers per file id.
    pending_polls: HashMap<String, u32>,
    status_calls: u32,
}

type Shared = Arc<Mutex<FakeState>>;

async fn upload(State(state): State<Shared>, body: Bytes) -> impl IntoResponse {
    state.lock().uploads.push(body);
    Json(json!({ "file_id": FILE_ID, "message": "File uploaded" }))
}

async fn upload_without_id() -> impl IntoResponse {
    Json(json!({ "message": "File uploaded" }))
}

async fn slow_upload() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "file_id": FILE_ID }))
}

async fn status(State(state): State<Shared>, Path(id): Path<String>) -> impl IntoResponse {
    let mut state = state.lock();
    state.status_calls += 1;
    if id == "broken" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    if id == "rejected" {
        return Json(json!({ "status": "error", "message": "Missing phone column" }))
            .into_response();
    }
    let remaining = state.pending_polls.entry(id.clone()).or_insert(0);
    if *remaining > 0 {
        *remaining -= 1;
        return Json(json!({ "status": "processing" })).into_response();
    }
    Json(json!({
        "status": "completed",
        "download_url": format!("/download/{}", id),
    }))
    .into_response()
}

async fn download(Path(id): Path<String>) -> impl IntoResponse {
    if id != FILE_ID {
        return StatusCode::NOT_FOUND.into_response();
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/csv")],
        RESULT_CSV,
    )
        .into_response()
}

async fn start_server(state: Shared) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/upload", post(upload))
        .route("/status/{id}", get(status))
        .route("/download/{id}", get(download))
        .with_state(state);
    serve(app).await
}

async fn serve(app: Router) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

fn config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        backend_url: format!("http://{}/", addr),
        upload_timeout_secs: 1,
        status_timeout_secs: 1,
        poll_interval_ms: 10,
        max_poll_attempts: 5,
    }
}

fn csv_file(len: usize) -> SelectedFile {
    let mut data = b"name,phone\n".to_vec();
    while data.len() < len {
        data.extend_from_slice(b"Someone,5550100\n");
    }
    SelectedFile::new("contacts.csv", CSV_MIME, data)
}

fn find(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[tokio::test]
async fn test_upload_sends_multipart_and_reports_progress() {
    let state = Shared::default();
    let (addr, _handle) = start_server(state.clone()).await;
    let backend = HttpBackend::new(&config(addr));
    let file = csv_file(200 * 1024);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let progress: TransferProgress =
        Arc::new(move |sent: u64, total: u64| sink.lock().push((sent, total)));

    let resp = backend.upload(&file, progress).await.unwrap();
    assert_eq!(resp.file_id.as_deref(), Some(FILE_ID));
    assert_eq!(resp.message.as_deref(), Some("File uploaded"));

    let body = state.lock().uploads[0].clone();
    assert!(find(&body, b"name=\"file\""));
    assert!(find(&body, b"filename=\"contacts.csv\""));
    assert!(find(&body, b"text/csv"));
    assert!(find(&body, &file.data[..64]));

    let seen = seen.lock();
    let total = file.len() as u64;
    assert!(seen.len() > 1);
    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(seen.last().copied(), Some((total, total)));
}

#[tokio::test]
async fn test_status_and_download() {
    let state = Shared::default();
    state.lock().pending_polls.insert(FILE_ID.to_string(), 1);
    let (addr, _handle) = start_server(state.clone()).await;
    let backend = HttpBackend::new(&config(addr));

    let first = backend.status(FILE_ID).await.unwrap();
    assert_eq!(first.status, ProcessingStatus::Processing);
    assert_eq!(first.download_url, None);

    let second = backend.status(FILE_ID).await.unwrap();
    assert_eq!(second.status, ProcessingStatus::Completed);
    let link = backend.resolve_download_url(second.download_url.as_deref().unwrap());
    assert_eq!(link, format!("http://{}/download/{}", addr, FILE_ID));

    let data = backend.download(&link).await.unwrap();
    assert_eq!(data, RESULT_CSV);

    let rejected = backend.status("rejected").await.unwrap();
    assert_eq!(rejected.status, ProcessingStatus::Error);
    assert_eq!(rejected.message.as_deref(), Some("Missing phone column"));
}

#[tokio::test]
async fn test_error_statuses_are_transport_errors() {
    let (addr, _handle) = start_server(Shared::default()).await;
    let backend = HttpBackend::new(&config(addr));

    let err = backend.status("broken").await.unwrap_err();
    assert_eq!(err, ClientError::Transport(TransportError::Status(500)));

    let missing = format!("http://{}/download/nope", addr);
    let err = backend.download(&missing).await.unwrap_err();
    assert_eq!(err, ClientError::Transport(TransportError::Status(404)));
}

#[tokio::test]
async fn test_upload_timeout() {
    let (addr, _handle) = serve(Router::new().route("/upload", post(slow_upload))).await;
    let backend = HttpBackend::new(&config(addr));

    let err = backend
        .upload(&csv_file(64), Arc::new(|_: u64, _: u64| {}))
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::Transport(TransportError::Timeout));
}

#[tokio::test]
async fn test_unreachable_backend() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let backend = HttpBackend::new(&config(addr));

    let err = backend.status(FILE_ID).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(TransportError::Network(_))));
}

#[tokio::test]
async fn test_end_to_end_processing_to_completed() {
    let state = Shared::default();
    state.lock().pending_polls.insert(FILE_ID.to_string(), 2);
    let (addr, _handle) = start_server(state.clone()).await;
    let config = config(addr);
    let backend = Arc::new(HttpBackend::new(&config));
    let controller = Arc::new(UploadController::new(backend.clone(), &config));

    controller
        .select_file(csv_file(1024), FileOrigin::DragDrop)
        .unwrap();
    let result = controller.start_upload().await;

    assert_eq!(result.status, UploadStatus::Completed);
    assert_eq!(result.progress, 100);
    assert_eq!(result.file_id.as_deref(), Some(FILE_ID));
    let link = result.download_url.unwrap();
    assert_eq!(link, format!("http://{}/download/{}", addr, FILE_ID));
    assert_eq!(state.lock().status_calls, 3);

    assert_eq!(backend.download(&link).await.unwrap(), RESULT_CSV);
}

#[tokio::test]
async fn test_end_to_end_missing_file_id() {
    let (addr, _handle) = serve(Router::new().route("/upload", post(upload_without_id))).await;
    let config = config(addr);
    let controller = Arc::new(UploadController::new(
        Arc::new(HttpBackend::new(&config)),
        &config,
    ));

    controller
        .select_file(csv_file(64), FileOrigin::Picker)
        .unwrap();
    let result = controller.start_upload().await;

    assert_eq!(result.status, UploadStatus::Error);
    assert_eq!(result.message, "Upload failed: no file ID received.");
    assert_eq!(result.file_name.as_deref(), Some("contacts.csv"));
}

#[tokio::test]
async fn test_end_to_end_backend_error() {
    let state = Shared::default();
    let app = Router::new()
        .route(
            "/upload",
            post(|| async { Json(json!({ "file_id": "rejected" })) }),
        )
        .route("/status/{id}", get(status))
        .with_state(state);
    let (addr, _handle) = serve(app).await;
    let config = config(addr);
    let controller = Arc::new(UploadController::new(
        Arc::new(HttpBackend::new(&config)),
        &config,
    ));

    controller
        .select_file(csv_file(64), FileOrigin::Picker)
        .unwrap();
    let result = controller.start_upload().await;

    assert_eq!(result.status, UploadStatus::Error);
    assert_eq!(result.message, "Missing phone column");
    assert!(controller.can_start());
}
