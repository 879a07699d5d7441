//! Console view
//!
//! Keeps the page model up to date and reports each change through
//! `tracing`, so a terminal session shows what a browser would render.

use posture_monitor_core::{
    ButtonMode, DetectionView, MetricsDisplay, PageSnapshot, PageView, PostureClass,
};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Running posture tally for the current process
#[derive(Debug, Default)]
pub struct PostureStats {
    samples: AtomicU64,
    good: AtomicU64,
}

impl PostureStats {
    fn record(&self, class: PostureClass) {
        self.samples.fetch_add(1, Ordering::Relaxed);
        if class == PostureClass::Good {
            self.good.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    pub fn good(&self) -> u64 {
        self.good.load(Ordering::Relaxed)
    }

    /// Share of good samples, in percent
    pub fn good_percent(&self) -> Option<f64> {
        match self.samples() {
            0 => None,
            n => Some(self.good() as f64 * 100.0 / n as f64),
        }
    }
}

impl fmt::Display for PostureStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.good_percent() {
            Some(pct) => write!(
                f,
                "{} samples, {} good ({:.0}%)",
                self.samples(),
                self.good(),
                pct
            ),
            None => write!(f, "no samples"),
        }
    }
}

/// [`DetectionView`] that mirrors every update into the log
#[derive(Debug, Clone)]
pub struct ConsoleView {
    page: PageView,
    stats: Arc<PostureStats>,
}

impl ConsoleView {
    pub fn new(page: PageView) -> Self {
        Self {
            page,
            stats: Arc::new(PostureStats::default()),
        }
    }

    pub fn snapshot(&self) -> PageSnapshot {
        self.page.snapshot()
    }

    pub fn stats(&self) -> &PostureStats {
        &self.stats
    }
}

impl DetectionView for ConsoleView {
    fn set_video_source(&self, url: &str) {
        info!("Video source: {}", url);
        self.page.set_video_source(url);
    }

    fn set_button_mode(&self, mode: ButtonMode) {
        info!("Button: {}", mode.label());
        self.page.set_button_mode(mode);
    }

    fn set_metrics_visible(&self, visible: bool) {
        debug!("Metrics panel visible: {}", visible);
        self.page.set_metrics_visible(visible);
    }

    fn render_metrics(&self, metrics: &MetricsDisplay) {
        let previous = self.page.snapshot().posture_label;
        self.stats.record(metrics.posture_class);
        self.page.render_metrics(metrics);

        if previous != metrics.posture_label {
            info!(
                "Posture: {} (neck {}, torso {})",
                metrics.posture_label, metrics.neck_angle, metrics.torso_angle
            );
        } else {
            debug!(
                "Posture: {} (neck {}, torso {})",
                metrics.posture_label, metrics.neck_angle, metrics.torso_angle
            );
        }
    }
}

/// Multi-line rendering of a snapshot for the `s` command
pub fn format_snapshot(snapshot: &PageSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!("video:   {}\n", snapshot.video_src));
    out.push_str(&format!(
        "button:  {} [{}]\n",
        snapshot.button_text, snapshot.button_classes
    ));
    if snapshot.metrics_visible {
        out.push_str(&format!("neck:    {}\n", snapshot.neck_angle));
        out.push_str(&format!("torso:   {}\n", snapshot.torso_angle));
        out.push_str(&format!(
            "posture: {} [{}]",
            snapshot.posture_label, snapshot.posture_classes
        ));
    } else {
        out.push_str("metrics: hidden");
    }
    out
}
