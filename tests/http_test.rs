//! Integration tests for dispatchers built from configuration
//!
//! An axum server bound to a random local port stands in for remote image
//! hosts; local files come from a temporary directory.

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep, timeout};

use pixbox::config::{ByteSize, Config, ManagerKind};
use pixbox::image::Image;
use pixbox::manager::{CompositeImageManager, ImageManager, build_dispatcher};
use pixbox::observability::Metrics;
use pixbox::request::{ImageRequest, RequestOptions, Resource};
use pixbox::task::{Completion, ImageInfo, TaskStatus};

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];

#[derive(Default)]
struct Hits {
    missing: AtomicUsize,
    flaky: AtomicUsize,
    broken: AtomicUsize,
}

async fn serve_png() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], Bytes::from_static(PNG))
}

async fn serve_missing(State(hits): State<Arc<Hits>>) -> StatusCode {
    hits.missing.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

/// Fails twice, then serves the image
async fn serve_flaky(State(hits): State<Arc<Hits>>) -> Response {
    if hits.flaky.fetch_add(1, Ordering::SeqCst) < 2 {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    } else {
        serve_png().await.into_response()
    }
}

async fn serve_broken(State(hits): State<Arc<Hits>>) -> StatusCode {
    hits.broken.fetch_add(1, Ordering::SeqCst);
    StatusCode::SERVICE_UNAVAILABLE
}

async fn serve_slow() -> Bytes {
    sleep(Duration::from_secs(30)).await;
    Bytes::from_static(PNG)
}

async fn serve_large() -> Bytes {
    Bytes::from(vec![0u8; 4096])
}

async fn start_mock_server(hits: Arc<Hits>) -> String {
    let app = Router::new()
        .route("/image.png", get(serve_png))
        .route("/missing.png", get(serve_missing))
        .route("/flaky.png", get(serve_flaky))
        .route("/broken.png", get(serve_broken))
        .route("/slow.png", get(serve_slow))
        .route("/large.png", get(serve_large))
        .with_state(hits);

    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let bound_addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{bound_addr}")
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.http.retry_backoff_ms = 10;
    config.http.max_attempts = 3;
    config.http.request_timeout_ms = 60_000;
    config
}

fn completion() -> (Completion, oneshot::Receiver<(Option<Image>, ImageInfo)>) {
    let (tx, rx) = oneshot::channel();
    let completion: Completion = Box::new(move |image, info| {
        let _ = tx.send((image, info));
    });
    (completion, rx)
}

async fn load(
    dispatcher: &CompositeImageManager,
    request: ImageRequest,
) -> (Option<Image>, ImageInfo) {
    let (done, rx) = completion();
    dispatcher
        .task_for_request(&request, Some(done))
        .expect("request should be accepted");
    timeout(Duration::from_secs(10), rx)
        .await
        .expect("completion should fire")
        .expect("completion sender dropped")
}

struct Harness {
    dispatcher: CompositeImageManager,
    metrics: Arc<Metrics>,
    hits: Arc<Hits>,
    base_url: String,
}

async fn harness(config: Config) -> Harness {
    let hits = Arc::new(Hits::default());
    let base_url = start_mock_server(Arc::clone(&hits)).await;
    let metrics = Arc::new(Metrics::new());
    let dispatcher = build_dispatcher(&config, Arc::clone(&metrics)).unwrap();
    Harness {
        dispatcher,
        metrics,
        hits,
        base_url,
    }
}

impl Harness {
    fn url(&self, path: &str) -> ImageRequest {
        ImageRequest::new(Resource::url(format!("{}{path}", self.base_url)))
    }
}

#[tokio::test]
async fn test_http_image_loads_through_dispatcher() {
    let h = harness(test_config()).await;

    let (image, info) = load(&h.dispatcher, h.url("/image.png")).await;

    let image = image.unwrap();
    assert_eq!(&image.data()[..], PNG);
    assert_eq!(image.content_type(), Some(&mime::IMAGE_PNG));
    assert_eq!(info.status(), Some(TaskStatus::Success));
    assert_eq!(info.manager(), Some("http"));
    assert_eq!(h.metrics.snapshot().tasks_completed, 1);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let h = harness(test_config()).await;

    let (image, info) = load(&h.dispatcher, h.url("/missing.png")).await;

    assert!(image.is_none());
    assert_eq!(info.status(), Some(TaskStatus::Failed));
    assert_eq!(info.error_kind(), Some("not_found"));
    assert_eq!(h.hits.missing.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let h = harness(test_config()).await;

    let (image, info) = load(&h.dispatcher, h.url("/flaky.png")).await;

    assert!(image.is_some());
    assert_eq!(info.status(), Some(TaskStatus::Success));
    assert_eq!(h.hits.flaky.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retries_stop_after_max_attempts() {
    let h = harness(test_config()).await;

    let (_, info) = load(&h.dispatcher, h.url("/broken.png")).await;

    assert_eq!(info.status(), Some(TaskStatus::Failed));
    assert_eq!(info.error_kind(), Some("http_status"));
    assert_eq!(h.hits.broken.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_oversized_response_fails() {
    let mut config = test_config();
    config.http.max_image_bytes = ByteSize(1024);
    let h = harness(config).await;

    let (_, info) = load(&h.dispatcher, h.url("/large.png")).await;

    assert_eq!(info.error_kind(), Some("too_large"));
}

/// Streams `chunks` KiB as a chunked response without a Content-Length,
/// counting the connections it accepts
async fn start_chunked_server(chunks: usize, connections: Arc<AtomicUsize>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bound_addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            connections.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;

                let head = "HTTP/1.1 200 OK\r\ncontent-type: image/png\r\ntransfer-encoding: chunked\r\n\r\n";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                let chunk = [0u8; 1024];
                for _ in 0..chunks {
                    // The client hangs up once the body is over its limit
                    if socket.write_all(b"400\r\n").await.is_err()
                        || socket.write_all(&chunk).await.is_err()
                        || socket.write_all(b"\r\n").await.is_err()
                    {
                        return;
                    }
                }
                let _ = socket.write_all(b"0\r\n\r\n").await;
            });
        }
    });

    format!("http://{bound_addr}")
}

#[tokio::test]
async fn test_chunked_response_over_limit_fails() {
    let connections = Arc::new(AtomicUsize::new(0));
    let base_url = start_chunked_server(4096, Arc::clone(&connections)).await;
    let mut config = test_config();
    config.http.max_image_bytes = ByteSize(1024);
    let dispatcher = build_dispatcher(&config, Arc::new(Metrics::new())).unwrap();

    let request = ImageRequest::new(Resource::url(format!("{base_url}/stream.png")));
    let (image, info) = load(&dispatcher, request).await;

    assert!(image.is_none());
    assert_eq!(info.error_kind(), Some("too_large"));
    // Exceeding the limit is final
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_chunked_response_within_limit_loads() {
    let connections = Arc::new(AtomicUsize::new(0));
    let base_url = start_chunked_server(4, Arc::clone(&connections)).await;
    let mut config = test_config();
    config.http.max_image_bytes = ByteSize(4096);
    let dispatcher = build_dispatcher(&config, Arc::new(Metrics::new())).unwrap();

    let request = ImageRequest::new(Resource::url(format!("{base_url}/stream.png")));
    let (image, info) = load(&dispatcher, request).await;

    assert_eq!(image.unwrap().len(), 4096);
    assert_eq!(info.status(), Some(TaskStatus::Success));
}

#[tokio::test]
async fn test_cancel_in_flight_download() {
    let h = harness(test_config()).await;
    let (done, rx) = completion();

    let task = h
        .dispatcher
        .task_for_request(&h.url("/slow.png"), Some(done))
        .unwrap();
    sleep(Duration::from_millis(50)).await;
    task.cancel();

    let (image, info) = timeout(Duration::from_secs(1), rx).await.unwrap().unwrap();
    assert!(image.is_none());
    assert!(info.is_cancelled());
    assert_eq!(h.metrics.snapshot().tasks_cancelled, 1);
}

#[tokio::test]
async fn test_invalidate_cancels_downloads_and_declines() {
    let h = harness(test_config()).await;
    let (done, rx) = completion();

    h.dispatcher
        .task_for_request(&h.url("/slow.png"), Some(done))
        .unwrap();
    h.dispatcher.invalidate_and_cancel();

    let (_, info) = timeout(Duration::from_secs(1), rx).await.unwrap().unwrap();
    assert!(info.is_cancelled());
    assert!(h.dispatcher.task_for_request(&h.url("/image.png"), None).is_none());
}

#[tokio::test]
async fn test_network_access_forbidden_is_declined() {
    let h = harness(test_config()).await;
    let options = RequestOptions::builder().allows_network_access(false).build();
    let request = ImageRequest::with_options(
        Resource::url(format!("{}/image.png", h.base_url)),
        options,
    );

    assert_eq!(h.dispatcher.route(&request), None);
    assert!(h.dispatcher.task_for_request(&request, None).is_none());
    assert_eq!(h.metrics.snapshot().requests_declined, 1);
}

#[tokio::test]
async fn test_file_manager_resolves_against_root() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("logo.png"), PNG).unwrap();

    let mut config = test_config();
    config.dispatcher.managers = vec![ManagerKind::File];
    config.file.root = Some(temp_dir.path().to_path_buf());
    let h = harness(config).await;

    let (image, info) = load(&h.dispatcher, ImageRequest::new(Resource::file("logo.png"))).await;
    let image = image.unwrap();
    assert_eq!(image.len(), PNG.len());
    assert_eq!(image.content_type(), Some(&mime::IMAGE_PNG));
    assert_eq!(info.manager(), Some("file"));

    let (_, info) = load(&h.dispatcher, ImageRequest::new(Resource::file("nope.png"))).await;
    assert_eq!(info.error_kind(), Some("not_found"));

    // Only the file manager is configured
    assert_eq!(h.dispatcher.route(&h.url("/image.png")), None);
}

#[tokio::test]
async fn test_preheated_download_served_without_refetch() {
    let h = harness(test_config()).await;
    let request = h.url("/flaky.png");

    h.dispatcher.start_preheating(&[request.clone()]);
    for _ in 0..200 {
        if h.hits.flaky.load(Ordering::SeqCst) >= 3 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    // The final response still has to be read and stored
    sleep(Duration::from_millis(100)).await;
    assert_eq!(h.metrics.snapshot().preheats_started, 1);

    let (image, info) = load(&h.dispatcher, request.clone()).await;
    assert!(image.is_some());
    assert_eq!(info.get("preheated"), Some(&serde_json::Value::Bool(true)));
    assert_eq!(h.hits.flaky.load(Ordering::SeqCst), 3);

    h.dispatcher.stop_preheating(&[request]);
}
