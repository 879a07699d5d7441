//! Element Model
//!
//! A minimal in-memory page: elements addressed by id, each carrying text
//! content, an optional source URL and a class list. The host owns the
//! [`Document`]; views hold cloned [`ElementHandle`]s obtained once at bind
//! time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Id of the image element showing the live stream or the placeholder
pub const VIDEO_FEED_ID: &str = "videoFeed";
/// Id of the start/stop button
pub const START_BUTTON_ID: &str = "startButton";
/// Id of the metrics panel container
pub const METRICS_PANEL_ID: &str = "metrics";
/// Id of the neck angle text
pub const NECK_ANGLE_ID: &str = "neckAngle";
/// Id of the torso angle text
pub const TORSO_ANGLE_ID: &str = "torsoAngle";
/// Id of the posture label
pub const POSTURE_STATUS_ID: &str = "postureStatus";

/// Class that hides an element
pub const HIDDEN_CLASS: &str = "hidden";

/// Text shown in a metric slot before the first sample arrives
pub const EMPTY_METRIC_TEXT: &str = "--";

/// Ordered set of CSS class names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassList(Vec<String>);

impl ClassList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a whitespace separated `class` attribute
    pub fn parse(class_name: &str) -> Self {
        let mut list = Self::new();
        for name in class_name.split_whitespace() {
            list.add(name);
        }
        list
    }

    pub fn add(&mut self, name: &str) {
        if !self.contains(name) {
            self.0.push(name.to_string());
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.0.retain(|c| c != name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|c| c == name)
    }

    /// Replace the whole list, like assigning `className`
    pub fn set(&mut self, class_name: &str) {
        *self = Self::parse(class_name);
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render back to a `class` attribute value
    pub fn class_name(&self) -> String {
        self.0.join(" ")
    }
}

/// A single page element
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub id: String,
    pub text_content: String,
    pub src: Option<String>,
    pub class_list: ClassList,
}

impl Element {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = text.into();
        self
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn with_classes(mut self, class_name: &str) -> Self {
        self.class_list = ClassList::parse(class_name);
        self
    }
}

/// Shared handle to an element owned by a [`Document`]
#[derive(Debug, Clone)]
pub struct ElementHandle(Arc<Mutex<Element>>);

impl ElementHandle {
    fn new(element: Element) -> Self {
        Self(Arc::new(Mutex::new(element)))
    }

    /// Lock the element for reading or mutation
    ///
    /// A poisoned lock still yields the element: every mutation is a plain
    /// field assignment, so no half-applied state can be observed.
    pub fn lock(&self) -> MutexGuard<'_, Element> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn text(&self) -> String {
        self.lock().text_content.clone()
    }

    pub fn src(&self) -> Option<String> {
        self.lock().src.clone()
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.lock().class_list.contains(name)
    }

    pub fn class_name(&self) -> String {
        self.lock().class_list.class_name()
    }
}

/// A page: elements keyed by id
#[derive(Debug, Clone, Default)]
pub struct Document {
    elements: HashMap<String, ElementHandle>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the posture page with its initial texts and classes
    pub fn posture_page(placeholder_url: &str) -> Self {
        let mut doc = Self::new();
        doc.insert(Element::new(VIDEO_FEED_ID).with_src(placeholder_url));
        doc.insert(
            Element::new(START_BUTTON_ID)
                .with_text("Start Detection")
                .with_classes("bg-indigo-600 hover:bg-indigo-700"),
        );
        doc.insert(Element::new(METRICS_PANEL_ID).with_classes(HIDDEN_CLASS));
        doc.insert(Element::new(NECK_ANGLE_ID).with_text(EMPTY_METRIC_TEXT));
        doc.insert(Element::new(TORSO_ANGLE_ID).with_text(EMPTY_METRIC_TEXT));
        doc.insert(Element::new(POSTURE_STATUS_ID).with_text(EMPTY_METRIC_TEXT));
        doc
    }

    /// Insert an element, replacing any previous element with the same id
    pub fn insert(&mut self, element: Element) -> ElementHandle {
        let handle = ElementHandle::new(element);
        let id = handle.lock().id.clone();
        self.elements.insert(id, handle.clone());
        handle
    }

    pub fn remove(&mut self, id: &str) -> Option<ElementHandle> {
        self.elements.remove(id)
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<ElementHandle> {
        self.elements.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_list_add_remove() {
        let mut list = ClassList::parse("bg-indigo-600 hover:bg-indigo-700");
        list.remove("bg-indigo-600");
        list.add("bg-red-600");
        list.add("bg-red-600");
        assert_eq!(list.class_name(), "hover:bg-indigo-700 bg-red-600");
        assert!(list.contains("bg-red-600"));
        assert!(!list.contains("bg-indigo-600"));
    }

    #[test]
    fn test_class_list_set_replaces() {
        let mut list = ClassList::parse("status-good extra");
        list.set("status-bad");
        assert_eq!(list.class_name(), "status-bad");
    }

    #[test]
    fn test_posture_page_defaults() {
        let doc = Document::posture_page("/static/images/placeholder.svg");
        assert_eq!(doc.len(), 6);

        let video = doc.get_element_by_id(VIDEO_FEED_ID).unwrap();
        assert_eq!(video.src().as_deref(), Some("/static/images/placeholder.svg"));

        let button = doc.get_element_by_id(START_BUTTON_ID).unwrap();
        assert_eq!(button.text(), "Start Detection");
        assert!(button.has_class("bg-indigo-600"));

        let panel = doc.get_element_by_id(METRICS_PANEL_ID).unwrap();
        assert!(panel.has_class(HIDDEN_CLASS));
    }

    #[test]
    fn test_handles_share_state() {
        let doc = Document::posture_page("/p.svg");
        let a = doc.get_element_by_id(NECK_ANGLE_ID).unwrap();
        let b = doc.get_element_by_id(NECK_ANGLE_ID).unwrap();
        a.lock().text_content = "12.3°".to_string();
        assert_eq!(b.text(), "12.3°");
    }
}
