//! Integration tests for the HTTP backend
//!
//! A throwaway HTTP/1.1 server on a loopback port answers with canned
//! responses per path.

use posture_monitor_core::{BackendEndpoints, HttpBackend, MonitorError, PostureBackend};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[derive(Clone)]
struct Route {
    status: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
    delay: Duration,
}

impl Route {
    fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: "200 OK",
            content_type,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    fn status(status: &'static str, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

struct TestServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
}

/// Serve `routes` (keyed by path, query ignored) until the test ends
async fn serve(routes: HashMap<&'static str, Route>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let routes = Arc::new(routes);

    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let routes = routes.clone();
            let counter = counter.clone();

            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);

                let request = String::from_utf8_lossy(&request);
                let target = request.split_whitespace().nth(1).unwrap_or("/");
                let path = target.split('?').next().unwrap_or(target);

                let route = routes.get(path).cloned().unwrap_or_else(|| {
                    Route::status("404 NOT FOUND", "text/html", "<h1>Not Found</h1>")
                });
                if !route.delay.is_zero() {
                    tokio::time::sleep(route.delay).await;
                }

                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    route.status,
                    route.content_type,
                    route.body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&route.body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    TestServer { base_url, hits }
}

fn backend(server: &TestServer) -> HttpBackend {
    HttpBackend::new(BackendEndpoints::new(&server.base_url).unwrap()).unwrap()
}

fn mjpeg_body(frames: usize) -> Vec<u8> {
    let mut body = Vec::new();
    for i in 0..frames {
        body.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
        body.extend_from_slice(&[0xFF, 0xD8, i as u8, 0xFF, 0xD9]);
        body.extend_from_slice(b"\r\n");
    }
    body
}

#[tokio::test]
async fn test_fetch_metrics() {
    let server = serve(HashMap::from([(
        "/metrics",
        Route::ok(
            "application/json",
            r#"{"neck_angle": 12.34, "torso_angle": 5, "posture": "bad"}"#,
        ),
    )]))
    .await;

    let sample = backend(&server).fetch_metrics().await.unwrap();
    assert_eq!(sample.neck_angle, 12.34);
    assert_eq!(sample.torso_angle, 5.0);
    assert_eq!(sample.posture, "bad");
}

#[tokio::test]
async fn test_fetch_metrics_error_page_is_parse_failure() {
    let server = serve(HashMap::from([(
        "/metrics",
        Route::status(
            "500 INTERNAL SERVER ERROR",
            "text/html",
            "<h1>Internal Server Error</h1>",
        ),
    )]))
    .await;

    let err = backend(&server).fetch_metrics().await.unwrap_err();
    assert!(matches!(err, MonitorError::Json(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_fetch_metrics_timeout() {
    let server = serve(HashMap::from([(
        "/metrics",
        Route::ok("application/json", "{}").delayed(Duration::from_secs(5)),
    )]))
    .await;

    let backend = backend(&server).with_metrics_timeout(Some(Duration::from_millis(100)));
    let err = backend.fetch_metrics().await.unwrap_err();
    assert!(matches!(err, MonitorError::Timeout(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_stop_camera_success_and_failure() {
    let server = serve(HashMap::from([(
        "/stop_camera",
        Route::ok("application/json", r#"{"success": true}"#),
    )]))
    .await;
    backend(&server).stop_camera().await.unwrap();

    let server = serve(HashMap::from([(
        "/stop_camera",
        Route::status("503 SERVICE UNAVAILABLE", "application/json", "{}"),
    )]))
    .await;
    let err = backend(&server).stop_camera().await.unwrap_err();
    assert!(matches!(err, MonitorError::Status(503, _)), "got {:?}", err);
}

#[tokio::test]
async fn test_start_camera_failure_reports_status() {
    let server = serve(HashMap::from([(
        "/start_camera",
        Route::status(
            "500 INTERNAL SERVER ERROR",
            "application/json",
            r#"{"success": false, "error": "Failed to open camera"}"#,
        ),
    )]))
    .await;

    let err = backend(&server).start_camera().await.unwrap_err();
    assert!(matches!(err, MonitorError::Status(500, _)));
    assert_eq!(server.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_load_stream_counts_frames() {
    let server = serve(HashMap::from([(
        "/video_feed",
        Route::ok("multipart/x-mixed-replace; boundary=frame", mjpeg_body(4)),
    )]))
    .await;

    let backend = backend(&server);
    let url = backend.video_feed_url(1_700_000_000_000);
    let summary = backend.load_stream(&url).await.unwrap();
    assert_eq!(summary.frames, 4);
    assert_eq!(summary.bytes, mjpeg_body(4).len() as u64);
}

#[tokio::test]
async fn test_load_stream_not_found() {
    let server = serve(HashMap::new()).await;

    let backend = backend(&server);
    let url = backend.video_feed_url(1);
    let err = backend.load_stream(&url).await.unwrap_err();
    assert!(matches!(err, MonitorError::Status(404, _)), "got {:?}", err);
}

#[tokio::test]
async fn test_load_stream_rejects_non_image() {
    let server = serve(HashMap::from([(
        "/video_feed",
        Route::ok("text/html", "<html></html>"),
    )]))
    .await;

    let backend = backend(&server);
    let url = backend.video_feed_url(1);
    let err = backend.load_stream(&url).await.unwrap_err();
    assert!(matches!(err, MonitorError::InvalidState(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_unreachable_backend() {
    // Bind and drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let backend = HttpBackend::new(BackendEndpoints::new(&base_url).unwrap()).unwrap();
    let err = backend.stop_camera().await.unwrap_err();
    assert!(matches!(err, MonitorError::ConnectionRefused(_)), "got {:?}", err);
    assert!(err.is_recoverable());
}
