//! Posture service client
//!
//! The backend is reached through four endpoints and one static asset:
//!
//! - `GET /video_feed?t=<millis>`: `multipart/x-mixed-replace` JPEG stream
//! - `GET /metrics`: latest reading as JSON
//! - `GET /stop_camera`: release the camera
//! - `GET /start_camera`: open the camera ahead of streaming
//! - `/static/images/placeholder.svg`: idle image
//!
//! [`PostureBackend`] is the seam the controller talks to; [`HttpBackend`]
//! is the real implementation.

use crate::metrics::MetricsSample;
use crate::{MonitorError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const VIDEO_FEED_PATH: &str = "/video_feed";
pub const METRICS_PATH: &str = "/metrics";
pub const STOP_CAMERA_PATH: &str = "/stop_camera";
pub const START_CAMERA_PATH: &str = "/start_camera";
pub const PLACEHOLDER_PATH: &str = "/static/images/placeholder.svg";

/// What was received from one video stream before it ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub frames: u64,
    pub bytes: u64,
}

/// Operations the detection controller needs from the posture service
#[async_trait]
pub trait PostureBackend: Send + Sync + 'static {
    /// Live stream URL, cache-busted with `timestamp_ms`
    fn video_feed_url(&self, timestamp_ms: i64) -> String;

    /// Image shown while idle
    fn placeholder_url(&self) -> String;

    /// Fetch and parse the latest posture reading
    async fn fetch_metrics(&self) -> Result<MetricsSample>;

    /// Ask the service to release the camera
    async fn stop_camera(&self) -> Result<()>;

    /// Ask the service to open the camera
    async fn start_camera(&self) -> Result<()>;

    /// Load the stream at `url` until it ends
    ///
    /// An error here means the video element failed to load.
    async fn load_stream(&self, url: &str) -> Result<StreamSummary>;
}

/// Absolute URLs of the posture service endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEndpoints {
    base_url: String,
    pub video_feed_path: String,
    pub metrics_path: String,
    pub stop_camera_path: String,
    pub start_camera_path: String,
    pub placeholder_path: String,
}

impl BackendEndpoints {
    /// Endpoints with the default paths under `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| MonitorError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(MonitorError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                base_url,
                parsed.scheme()
            )));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            video_feed_path: VIDEO_FEED_PATH.to_string(),
            metrics_path: METRICS_PATH.to_string(),
            stop_camera_path: STOP_CAMERA_PATH.to_string(),
            start_camera_path: START_CAMERA_PATH.to_string(),
            placeholder_path: PLACEHOLDER_PATH.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub fn video_feed_url(&self, timestamp_ms: i64) -> String {
        format!("{}?t={}", self.url(&self.video_feed_path), timestamp_ms)
    }

    pub fn metrics_url(&self) -> String {
        self.url(&self.metrics_path)
    }

    pub fn stop_camera_url(&self) -> String {
        self.url(&self.stop_camera_path)
    }

    pub fn start_camera_url(&self) -> String {
        self.url(&self.start_camera_path)
    }

    pub fn placeholder_url(&self) -> String {
        self.url(&self.placeholder_path)
    }

    /// Whether `url` points at the live stream (any cache-buster)
    pub fn is_video_feed_url(&self, url: &str) -> bool {
        url.strip_prefix(&self.url(&self.video_feed_path))
            .is_some_and(|rest| rest.starts_with("?t="))
    }
}

/// HTTP implementation of [`PostureBackend`]
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    endpoints: BackendEndpoints,
    metrics_timeout: Option<Duration>,
}

impl HttpBackend {
    pub fn new(endpoints: BackendEndpoints) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            endpoints,
            metrics_timeout: None,
        })
    }

    /// Bound each metrics request; `None` lets a hung request stall its tick
    pub fn with_metrics_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.metrics_timeout = timeout;
        self
    }

    pub fn endpoints(&self) -> &BackendEndpoints {
        &self.endpoints
    }

    async fn get_expecting_success(&self, url: &str, context: &str) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MonitorError::from_reqwest(e, context))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("{} answered {}: {}", url, status, body);
            return Err(MonitorError::Status(status.as_u16(), url.to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl PostureBackend for HttpBackend {
    fn video_feed_url(&self, timestamp_ms: i64) -> String {
        self.endpoints.video_feed_url(timestamp_ms)
    }

    fn placeholder_url(&self) -> String {
        self.endpoints.placeholder_url()
    }

    async fn fetch_metrics(&self) -> Result<MetricsSample> {
        let mut request = self.client.get(self.endpoints.metrics_url());
        if let Some(timeout) = self.metrics_timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MonitorError::from_reqwest(e, "fetching metrics"))?;

        // The body is parsed whatever the status; an error page fails as JSON.
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| MonitorError::from_reqwest(e, "reading metrics"))?;
        if !status.is_success() {
            debug!("Metrics endpoint answered {}", status);
        }

        Ok(serde_json::from_slice(&body)?)
    }

    async fn stop_camera(&self) -> Result<()> {
        self.get_expecting_success(&self.endpoints.stop_camera_url(), "stopping camera")
            .await
    }

    async fn start_camera(&self) -> Result<()> {
        self.get_expecting_success(&self.endpoints.start_camera_url(), "starting camera")
            .await
    }

    async fn load_stream(&self, url: &str) -> Result<StreamSummary> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MonitorError::from_reqwest(e, "opening video feed"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Status(status.as_u16(), url.to_string()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let mut counter = FrameCounter::for_content_type(&content_type).ok_or_else(|| {
            MonitorError::InvalidState(format!(
                "video feed is not an image stream (content-type '{}')",
                content_type
            ))
        })?;

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| MonitorError::from_reqwest(e, "reading video feed"))?;
            counter.feed(&chunk);
        }

        let summary = counter.finish();
        debug!(
            "Video feed ended after {} frames ({} bytes)",
            summary.frames, summary.bytes
        );
        Ok(summary)
    }
}

/// Counts multipart parts in a streamed body
///
/// Boundary markers may be split across chunks, so the tail of each chunk
/// is carried into the next search.
#[derive(Debug)]
pub struct FrameCounter {
    marker: Option<Vec<u8>>,
    carry: Vec<u8>,
    summary: StreamSummary,
}

impl FrameCounter {
    /// Counter for a response content type
    ///
    /// `multipart/*` counts parts by boundary, `image/*` is a single frame;
    /// anything else is not something an image element can show.
    pub fn for_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let marker = if mime.starts_with("multipart/") {
            let boundary = content_type
                .split(';')
                .skip(1)
                .find_map(|param| param.trim().strip_prefix("boundary="))?
                .trim_matches('"');
            Some(format!("--{}", boundary).into_bytes())
        } else if mime.starts_with("image/") {
            None
        } else {
            return None;
        };

        Some(Self {
            marker,
            carry: Vec::new(),
            summary: StreamSummary::default(),
        })
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.summary.bytes += chunk.len() as u64;

        let Some(marker) = &self.marker else {
            return;
        };

        self.carry.extend_from_slice(chunk);
        let found = count_occurrences(&self.carry, marker);
        self.summary.frames += found.count;

        // Keep only what could still be the start of a marker.
        let keep_from = found
            .resume_at
            .max(self.carry.len().saturating_sub(marker.len() - 1));
        self.carry.drain(..keep_from);
    }

    pub fn finish(mut self) -> StreamSummary {
        if self.marker.is_none() && self.summary.bytes > 0 {
            self.summary.frames = 1;
        }
        self.summary
    }
}

struct Occurrences {
    count: u64,
    resume_at: usize,
}

fn count_occurrences(haystack: &[u8], needle: &[u8]) -> Occurrences {
    let mut count = 0;
    let mut pos = 0;
    while pos + needle.len() <= haystack.len() {
        if haystack[pos..].starts_with(needle) {
            count += 1;
            pos += needle.len();
        } else {
            pos += 1;
        }
    }
    Occurrences {
        count,
        resume_at: pos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let endpoints = BackendEndpoints::new("http://localhost:5000/").unwrap();
        assert_eq!(endpoints.base_url(), "http://localhost:5000");
        assert_eq!(
            endpoints.video_feed_url(1_700_000_000_123),
            "http://localhost:5000/video_feed?t=1700000000123"
        );
        assert_eq!(endpoints.metrics_url(), "http://localhost:5000/metrics");
        assert_eq!(endpoints.stop_camera_url(), "http://localhost:5000/stop_camera");
        assert_eq!(endpoints.start_camera_url(), "http://localhost:5000/start_camera");
        assert_eq!(
            endpoints.placeholder_url(),
            "http://localhost:5000/static/images/placeholder.svg"
        );
    }

    #[test]
    fn test_video_feed_url_detection() {
        let endpoints = BackendEndpoints::new("http://localhost:5000").unwrap();
        assert!(endpoints.is_video_feed_url(&endpoints.video_feed_url(42)));
        assert!(!endpoints.is_video_feed_url(&endpoints.placeholder_url()));
        assert!(!endpoints.is_video_feed_url("http://localhost:5000/video_feed"));
    }

    #[test]
    fn test_relative_paths_are_joined() {
        let mut endpoints = BackendEndpoints::new("http://camera.local").unwrap();
        endpoints.metrics_path = "api/metrics".to_string();
        assert_eq!(endpoints.metrics_url(), "http://camera.local/api/metrics");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            BackendEndpoints::new("not a url"),
            Err(MonitorError::InvalidUrl(_))
        ));
        assert!(matches!(
            BackendEndpoints::new("ftp://camera.local"),
            Err(MonitorError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_frame_counter_multipart() {
        let mut counter =
            FrameCounter::for_content_type("multipart/x-mixed-replace; boundary=frame").unwrap();
        counter.feed(b"--frame\r\nContent-Type: image/jpeg\r\n\r\nAAAA\r\n--fr");
        counter.feed(b"ame\r\nContent-Type: image/jpeg\r\n\r\nBBBB\r\n");
        counter.feed(b"--frame\r\n");
        let summary = counter.finish();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.bytes, 95);
    }

    #[test]
    fn test_frame_counter_single_image() {
        let mut counter = FrameCounter::for_content_type("image/svg+xml").unwrap();
        counter.feed(b"<svg/>");
        assert_eq!(counter.finish().frames, 1);
    }

    #[test]
    fn test_frame_counter_rejects_non_images() {
        assert!(FrameCounter::for_content_type("text/html; charset=utf-8").is_none());
        assert!(FrameCounter::for_content_type("multipart/x-mixed-replace").is_none());
        assert!(FrameCounter::for_content_type("").is_none());
    }
}
