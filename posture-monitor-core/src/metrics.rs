//! Posture metrics
//!
//! Wire format of one `/metrics` reading and its projection into display
//! text and a status style.

use serde::{Deserialize, Serialize};

/// Posture label the backend reports for an upright pose
pub const GOOD_POSTURE: &str = "good";

/// One posture reading from the backend
///
/// Consumed by a single poll tick and dropped once rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    /// Neck inclination in degrees
    pub neck_angle: f64,

    /// Torso inclination in degrees
    pub torso_angle: f64,

    /// Classification label: "good", "bad", "checking", "not_detected", ...
    pub posture: String,

    /// Whether the camera faces the subject side-on; not every backend sends it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aligned: Option<bool>,
}

impl MetricsSample {
    pub fn new(neck_angle: f64, torso_angle: f64, posture: impl Into<String>) -> Self {
        Self {
            neck_angle,
            torso_angle,
            posture: posture.into(),
            aligned: None,
        }
    }

    /// Exact, case-sensitive match on the good label
    pub fn is_good(&self) -> bool {
        self.posture == GOOD_POSTURE
    }
}

/// Style applied to the posture label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostureClass {
    Good,
    Bad,
}

impl PostureClass {
    pub fn css_class(self) -> &'static str {
        match self {
            PostureClass::Good => "status-good",
            PostureClass::Bad => "status-bad",
        }
    }
}

/// Display projection of a [`MetricsSample`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsDisplay {
    pub neck_angle: String,
    pub torso_angle: String,
    pub posture_label: String,
    pub posture_class: PostureClass,
}

impl From<&MetricsSample> for MetricsDisplay {
    fn from(sample: &MetricsSample) -> Self {
        Self {
            neck_angle: format_angle(sample.neck_angle),
            torso_angle: format_angle(sample.torso_angle),
            posture_label: capitalize(&sample.posture),
            posture_class: if sample.is_good() {
                PostureClass::Good
            } else {
                PostureClass::Bad
            },
        }
    }
}

/// One decimal place with a degree suffix
pub fn format_angle(degrees: f64) -> String {
    format!("{:.1}°", degrees)
}

/// Upper-case the first character, leave the rest untouched
pub fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_formatting() {
        assert_eq!(format_angle(12.34), "12.3°");
        assert_eq!(format_angle(5.0), "5.0°");
        assert_eq!(format_angle(0.0), "0.0°");
        assert_eq!(format_angle(179.96), "180.0°");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("bad"), "Bad");
        assert_eq!(capitalize("good"), "Good");
        assert_eq!(capitalize("not_detected"), "Not_detected");
        assert_eq!(capitalize("Checking"), "Checking");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_posture_class_only_exact_good() {
        for (label, expected) in [
            ("good", PostureClass::Good),
            ("bad", PostureClass::Bad),
            ("Good", PostureClass::Bad),
            ("good ", PostureClass::Bad),
            ("checking", PostureClass::Bad),
            ("", PostureClass::Bad),
        ] {
            let display = MetricsDisplay::from(&MetricsSample::new(1.0, 2.0, label));
            assert_eq!(display.posture_class, expected, "label {:?}", label);
        }
        assert_eq!(PostureClass::Good.css_class(), "status-good");
        assert_eq!(PostureClass::Bad.css_class(), "status-bad");
    }

    #[test]
    fn test_display_projection() {
        let display = MetricsDisplay::from(&MetricsSample::new(12.34, 5.0, "bad"));
        assert_eq!(display.neck_angle, "12.3°");
        assert_eq!(display.torso_angle, "5.0°");
        assert_eq!(display.posture_label, "Bad");
        assert_eq!(display.posture_class, PostureClass::Bad);
    }

    #[test]
    fn test_sample_deserialization() {
        let sample: MetricsSample =
            serde_json::from_str(r#"{"neck_angle": 12, "torso_angle": 3.5, "posture": "good"}"#)
                .unwrap();
        assert_eq!(sample.neck_angle, 12.0);
        assert!(sample.is_good());
        assert_eq!(sample.aligned, None);

        let sample: MetricsSample = serde_json::from_str(
            r#"{"aligned": true, "neck_angle": 0, "torso_angle": 0, "posture": "not_detected"}"#,
        )
        .unwrap();
        assert_eq!(sample.aligned, Some(true));
    }

    #[test]
    fn test_sample_missing_field_is_rejected() {
        let result: Result<MetricsSample, _> =
            serde_json::from_str(r#"{"neck_angle": 1.0, "posture": "bad"}"#);
        assert!(result.is_err());
    }
}
