//! Detection Controller
//!
//! Owns the streaming state of one page and drives it:
//!
//! - start: point the video element at the live feed, flip the button,
//!   reveal the metrics panel, watch the stream and start polling
//! - stop: back to the placeholder and idle button, hide the panel,
//!   best-effort camera release
//! - poll: fetch `/metrics`, render, sleep, repeat while streaming
//!
//! Every start and stop opens a new session. Background tasks carry the
//! session they were spawned for and only touch the view while that
//! session is current, so a late response after stop is dropped.
//!
//! Transitions (`start_detection`, `stop_detection`, `toggle`) are
//! serialized: a click arriving while a stop is still waiting for the
//! camera release is handled once that stop has settled.

use crate::backend::PostureBackend;
use crate::metrics::{MetricsDisplay, MetricsSample};
use crate::view::{ButtonMode, DetectionView};
use crate::{MonitorError, Result};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Delay between the end of one poll tick and the start of the next
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Upper bound on waiting for the camera release request
pub const DEFAULT_RELEASE_TIMEOUT: Duration = Duration::from_secs(2);

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Delay after each completed tick before the next one
    pub poll_interval: Duration,

    /// How long stop and unload wait for `/stop_camera`
    pub release_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            release_timeout: DEFAULT_RELEASE_TIMEOUT,
        }
    }
}

#[derive(Default)]
struct SessionState {
    streaming: bool,
    session: u64,
    poller: Option<JoinHandle<()>>,
    stream_watcher: Option<JoinHandle<()>>,
}

impl SessionState {
    fn abort_tasks(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        if let Some(watcher) = self.stream_watcher.take() {
            watcher.abort();
        }
    }

    fn is_current(&self, session: u64) -> bool {
        self.streaming && self.session == session
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

struct Inner<B, V> {
    backend: Arc<B>,
    view: V,
    config: ControllerConfig,
    state: Mutex<SessionState>,
    transition: tokio::sync::Mutex<()>,
}

impl<B: PostureBackend, V: DetectionView> Inner<B, V> {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_current(&self, session: u64) -> bool {
        self.lock_state().is_current(session)
    }

    /// Render a sample if `session` is still the live one
    fn apply_sample(&self, session: u64, sample: &MetricsSample) -> bool {
        let state = self.lock_state();
        if !state.is_current(session) {
            return false;
        }
        self.view.render_metrics(&MetricsDisplay::from(sample));
        true
    }

    /// Cancel background work and show the idle page
    ///
    /// Returns whether a session was streaming.
    fn enter_idle(&self) -> bool {
        let mut state = self.lock_state();
        let was_streaming = state.streaming;

        state.abort_tasks();
        state.session += 1;
        state.streaming = false;

        self.view.set_video_source(&self.backend.placeholder_url());
        self.view.set_button_mode(ButtonMode::Start);
        self.view.set_metrics_visible(false);

        was_streaming
    }
}

/// Start/stop controller for one detection page
pub struct DetectionController<B, V> {
    inner: Arc<Inner<B, V>>,
}

impl<B, V> Clone for DetectionController<B, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<B: PostureBackend, V: DetectionView> DetectionController<B, V> {
    /// Create a controller and show the idle page
    pub fn new(backend: B, view: V, config: ControllerConfig) -> Self {
        view.set_video_source(&backend.placeholder_url());
        view.set_button_mode(ButtonMode::Start);
        view.set_metrics_visible(false);

        Self {
            inner: Arc::new(Inner {
                backend: Arc::new(backend),
                view,
                config,
                state: Mutex::new(SessionState::default()),
                transition: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn with_defaults(backend: B, view: V) -> Self {
        Self::new(backend, view, ControllerConfig::default())
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.lock_state().streaming
    }

    /// Current session number; changes on every start and stop
    pub fn session_id(&self) -> u64 {
        self.inner.lock_state().session
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub fn view(&self) -> &V {
        &self.inner.view
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// Button click: start when idle, stop when streaming
    pub async fn toggle(&self) {
        let _transition = self.inner.transition.lock().await;
        if self.is_streaming() {
            self.stop_locked().await;
        } else {
            self.start_locked().await;
        }
    }

    /// Start (or restart) a detection session
    pub async fn start_detection(&self) {
        let _transition = self.inner.transition.lock().await;
        self.start_locked().await;
    }

    /// Return to idle and ask the backend to release the camera
    ///
    /// The view is idle afterwards whatever the backend answers.
    pub async fn stop_detection(&self) {
        let _transition = self.inner.transition.lock().await;
        self.stop_locked().await;
    }

    /// Page teardown
    ///
    /// If a session is streaming, the view goes idle and the camera release
    /// is fired without waiting. Delivery is at most once and not
    /// guaranteed; a host that can afford to wait may await the returned
    /// handle, which is itself bounded by the release timeout.
    pub fn unload(&self) -> Option<JoinHandle<()>> {
        if !self.inner.enter_idle() {
            return None;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime during unload, camera release skipped");
            return None;
        };

        info!("Page unloading, releasing camera");
        let backend = self.inner.backend.clone();
        let timeout = self.inner.config.release_timeout;
        Some(runtime.spawn(async move {
            release_camera(backend.as_ref(), timeout).await;
        }))
    }

    async fn start_locked(&self) {
        if let Err(e) = self.try_start() {
            error!("Failed to start detection: {}", e);
            self.stop_locked().await;
        }
    }

    fn try_start(&self) -> Result<()> {
        let runtime = Handle::try_current()
            .map_err(|e| MonitorError::InvalidState(format!("no async runtime: {}", e)))?;

        let url = self
            .inner
            .backend
            .video_feed_url(chrono::Utc::now().timestamp_millis());

        let mut state = self.inner.lock_state();
        if state.streaming {
            debug!("Restarting detection session {}", state.session);
        }
        state.abort_tasks();
        state.session += 1;
        let session = state.session;

        self.inner.view.set_video_source(&url);
        state.streaming = true;
        self.inner.view.set_button_mode(ButtonMode::Stop);
        self.inner.view.set_metrics_visible(true);

        state.stream_watcher = Some(runtime.spawn(watch_stream(
            Arc::downgrade(&self.inner),
            session,
            url.clone(),
        )));
        state.poller = Some(runtime.spawn(poll_metrics(Arc::downgrade(&self.inner), session)));

        info!("Detection started (session {}): {}", session, url);
        Ok(())
    }

    async fn stop_locked(&self) {
        if self.inner.enter_idle() {
            info!("Detection stopped");
        } else {
            debug!("Stop requested while idle");
        }

        release_camera(self.inner.backend.as_ref(), self.inner.config.release_timeout).await;
    }

    /// Stop on behalf of a background task, unless its session is already over
    async fn stop_session(&self, session: u64) {
        let _transition = self.inner.transition.lock().await;
        if !self.inner.is_current(session) {
            debug!("Ignoring stop from superseded session {}", session);
            return;
        }
        self.stop_locked().await;
    }
}

async fn release_camera<B: PostureBackend>(backend: &B, timeout: Duration) {
    match tokio::time::timeout(timeout, backend.stop_camera()).await {
        Ok(Ok(())) => debug!("Camera released"),
        Ok(Err(e)) => warn!("Error stopping detection: {}", e),
        Err(_) => warn!(
            "Error stopping detection: camera release timed out after {:?}",
            timeout
        ),
    }
}

/// Poll loop for one session
///
/// Ticks never overlap: the request is awaited and applied before the
/// sleep. Failed ticks are logged and skipped.
async fn poll_metrics<B: PostureBackend, V: DetectionView>(inner: Weak<Inner<B, V>>, session: u64) {
    loop {
        let backend = match inner.upgrade() {
            Some(inner) if inner.is_current(session) => inner.backend.clone(),
            _ => break,
        };

        let result = backend.fetch_metrics().await;

        let Some(strong) = inner.upgrade() else {
            break;
        };
        match result {
            Ok(sample) => {
                if !strong.apply_sample(session, &sample) {
                    debug!("Discarding metrics for ended session {}", session);
                }
            }
            Err(e) => warn!("Error polling metrics: {}", e),
        }

        if !strong.is_current(session) {
            break;
        }
        let interval = strong.config.poll_interval;
        drop(strong);

        tokio::time::sleep(interval).await;
    }

    debug!("Metrics polling ended for session {}", session);
}

/// Load the stream; a load failure stops the session it belongs to
async fn watch_stream<B: PostureBackend, V: DetectionView>(
    inner: Weak<Inner<B, V>>,
    session: u64,
    url: String,
) {
    let Some(backend) = inner.upgrade().map(|inner| inner.backend.clone()) else {
        return;
    };

    match backend.load_stream(&url).await {
        Ok(summary) => info!(
            "Video feed ended after {} frames ({} bytes)",
            summary.frames, summary.bytes
        ),
        Err(e) => {
            error!("Video feed error: {}", e);
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let controller = DetectionController { inner };
            // Stop runs as its own task: stopping aborts this watcher.
            tokio::spawn(async move {
                controller.stop_session(session).await;
            });
        }
    }
}
