//! Detection view
//!
//! [`DetectionView`] is everything the controller is allowed to do to the
//! page. [`PageView`] implements it on top of the six elements of a
//! [`Document`].

use crate::dom::{
    Document, ElementHandle, EMPTY_METRIC_TEXT, HIDDEN_CLASS, METRICS_PANEL_ID, NECK_ANGLE_ID,
    POSTURE_STATUS_ID, START_BUTTON_ID, TORSO_ANGLE_ID, VIDEO_FEED_ID,
};
use crate::metrics::MetricsDisplay;
use crate::{MonitorError, Result};

/// Visual state of the start/stop button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonMode {
    /// Idle: clicking starts detection
    Start,
    /// Streaming: clicking stops detection
    Stop,
}

impl ButtonMode {
    pub fn label(self) -> &'static str {
        match self {
            ButtonMode::Start => "Start Detection",
            ButtonMode::Stop => "Stop Detection",
        }
    }

    pub fn classes(self) -> [&'static str; 2] {
        match self {
            ButtonMode::Start => ["bg-indigo-600", "hover:bg-indigo-700"],
            ButtonMode::Stop => ["bg-red-600", "hover:bg-red-700"],
        }
    }

    fn other(self) -> Self {
        match self {
            ButtonMode::Start => ButtonMode::Stop,
            ButtonMode::Stop => ButtonMode::Start,
        }
    }
}

/// Page operations used by the detection controller
///
/// Calls arrive from the controller's tasks, so implementations must be
/// cheap and must not block.
pub trait DetectionView: Send + Sync + 'static {
    /// Point the video element at `url`
    fn set_video_source(&self, url: &str);

    /// Switch the button label and colors
    fn set_button_mode(&self, mode: ButtonMode);

    /// Show or hide the metrics panel
    fn set_metrics_visible(&self, visible: bool);

    /// Write one projected sample into the metric slots
    fn render_metrics(&self, display: &MetricsDisplay);
}

/// Point-in-time copy of the bound elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub video_src: String,
    pub button_text: String,
    pub button_classes: String,
    pub metrics_visible: bool,
    pub neck_angle: String,
    pub torso_angle: String,
    pub posture_label: String,
    pub posture_classes: String,
}

/// View bound to the elements of a posture page
#[derive(Debug, Clone)]
pub struct PageView {
    video_feed: ElementHandle,
    start_button: ElementHandle,
    metrics: ElementHandle,
    neck_angle: ElementHandle,
    torso_angle: ElementHandle,
    posture_status: ElementHandle,
}

impl PageView {
    /// Look up every element the controller drives
    ///
    /// Fails on the first id the document does not provide.
    pub fn bind(document: &Document) -> Result<Self> {
        let get = |id: &str| {
            document
                .get_element_by_id(id)
                .ok_or_else(|| MonitorError::MissingElement(id.to_string()))
        };

        Ok(Self {
            video_feed: get(VIDEO_FEED_ID)?,
            start_button: get(START_BUTTON_ID)?,
            metrics: get(METRICS_PANEL_ID)?,
            neck_angle: get(NECK_ANGLE_ID)?,
            torso_angle: get(TORSO_ANGLE_ID)?,
            posture_status: get(POSTURE_STATUS_ID)?,
        })
    }

    pub fn snapshot(&self) -> PageSnapshot {
        PageSnapshot {
            video_src: self.video_feed.src().unwrap_or_default(),
            button_text: self.start_button.text(),
            button_classes: self.start_button.class_name(),
            metrics_visible: !self.metrics.has_class(HIDDEN_CLASS),
            neck_angle: self.neck_angle.text(),
            torso_angle: self.torso_angle.text(),
            posture_label: self.posture_status.text(),
            posture_classes: self.posture_status.class_name(),
        }
    }

    /// Whether the metric slots still show their initial placeholder
    pub fn metrics_empty(&self) -> bool {
        self.neck_angle.text() == EMPTY_METRIC_TEXT
    }
}

impl DetectionView for PageView {
    fn set_video_source(&self, url: &str) {
        self.video_feed.lock().src = Some(url.to_string());
    }

    fn set_button_mode(&self, mode: ButtonMode) {
        let mut button = self.start_button.lock();
        button.text_content = mode.label().to_string();
        for class in mode.other().classes() {
            button.class_list.remove(class);
        }
        for class in mode.classes() {
            button.class_list.add(class);
        }
    }

    fn set_metrics_visible(&self, visible: bool) {
        let mut panel = self.metrics.lock();
        if visible {
            panel.class_list.remove(HIDDEN_CLASS);
        } else {
            panel.class_list.add(HIDDEN_CLASS);
        }
    }

    fn render_metrics(&self, display: &MetricsDisplay) {
        self.neck_angle.lock().text_content = display.neck_angle.clone();
        self.torso_angle.lock().text_content = display.torso_angle.clone();

        let mut status = self.posture_status.lock();
        status.text_content = display.posture_label.clone();
        status.class_list.set(display.posture_class.css_class());
    }
}
