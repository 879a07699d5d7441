//! Posture Monitor Core
//!
//! Client side of a posture-detection service: a small element model for
//! the detection page, the controller that starts and stops a session, and
//! the HTTP client for the service's stream, metrics and camera endpoints.

pub mod backend;
pub mod controller;
pub mod dom;
pub mod metrics;
pub mod view;

mod error;

pub use backend::{BackendEndpoints, FrameCounter, HttpBackend, PostureBackend, StreamSummary};
pub use controller::{ControllerConfig, DetectionController};
pub use dom::{ClassList, Document, Element, ElementHandle};
pub use error::{MonitorError, Result};
pub use metrics::{MetricsDisplay, MetricsSample, PostureClass};
pub use view::{ButtonMode, DetectionView, PageSnapshot, PageView};
