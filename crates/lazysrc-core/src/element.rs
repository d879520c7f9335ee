//! The element contract and an in-memory implementation of it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::collections::{map::HashMap, OrderedMap};
use crate::config::DEFAULT_SOURCE_ATTRIBUTE;
use crate::error::LoadError;
use crate::geometry::Rect;

/// An image node owned by some host document.
///
/// Handles are cheap to clone and share the underlying node, so every method
/// takes `&self`. The loader only reads and writes attributes and adds
/// classes; it never creates or removes elements.
pub trait ImageElement {
    fn attribute(&self, name: &str) -> Option<String>;

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), LoadError>;

    fn add_class(&self, class: &str) -> Result<(), LoadError>;

    /// Stable identity of the underlying node. Every handle to the same node
    /// returns the same key, and distinct nodes never share one.
    fn key(&self) -> ElementKey;

    fn same_element(&self, other: &Self) -> bool {
        self.key() == other.key()
    }

    /// Short label for log lines.
    fn describe(&self) -> String {
        "<img>".to_string()
    }
}

/// Hashable node identity, used to remember which elements a loader has
/// already seen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey(u64);

static NEXT_ELEMENT_KEY: AtomicU64 = AtomicU64::new(1);

impl ElementKey {
    /// A key no other call has returned in this process.
    pub fn fresh() -> Self {
        Self(NEXT_ELEMENT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Elements that can report their layout box, needed by the headless
/// [`ViewportObserver`](crate::ViewportObserver).
pub trait Bounded {
    fn bounds(&self) -> Rect;
}

struct ImageNode {
    key: ElementKey,
    attributes: OrderedMap<String, String>,
    classes: SmallVec<[String; 2]>,
    bounds: Rect,
    writes: HashMap<String, usize>,
    read_only: bool,
}

impl Default for ImageNode {
    fn default() -> Self {
        Self {
            key: ElementKey::fresh(),
            attributes: OrderedMap::default(),
            classes: SmallVec::new(),
            bounds: Rect::default(),
            writes: HashMap::default(),
            read_only: false,
        }
    }
}

/// Image node that lives outside any browser document.
///
/// Used by the headless observer and by tests. Counts attribute writes so
/// exactly-once behaviour can be asserted.
#[derive(Clone, Default)]
pub struct DetachedImage {
    node: Rc<RefCell<ImageNode>>,
}

impl DetachedImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// New image whose `data-lazy` attribute holds `url`.
    pub fn with_deferred_source(url: impl Into<String>) -> Self {
        Self::new().with_attribute(DEFAULT_SOURCE_ATTRIBUTE, url)
    }

    pub fn with_attribute(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.node
            .borrow_mut()
            .attributes
            .insert(name.into(), value.into());
        self
    }

    pub fn with_bounds(self, bounds: Rect) -> Self {
        self.set_bounds(bounds);
        self
    }

    pub fn set_bounds(&self, bounds: Rect) {
        self.node.borrow_mut().bounds = bounds;
    }

    /// Makes every subsequent mutation fail, like a node detached mid-flight.
    pub fn set_read_only(&self, read_only: bool) {
        self.node.borrow_mut().read_only = read_only;
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.node.borrow_mut().attributes.shift_remove(name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.node.borrow().classes.iter().any(|c| c == class)
    }

    pub fn classes(&self) -> Vec<String> {
        self.node.borrow().classes.to_vec()
    }

    /// How many times `name` has been written through [`ImageElement`].
    pub fn write_count(&self, name: &str) -> usize {
        self.node.borrow().writes.get(name).copied().unwrap_or(0)
    }

    fn ensure_writable(&self, name: &str) -> Result<(), LoadError> {
        if self.node.borrow().read_only {
            return Err(LoadError::Attribute {
                name: name.to_string(),
                message: "node is read-only".into(),
            });
        }
        Ok(())
    }
}

impl ImageElement for DetachedImage {
    fn attribute(&self, name: &str) -> Option<String> {
        self.node.borrow().attributes.get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), LoadError> {
        self.ensure_writable(name)?;
        let mut node = self.node.borrow_mut();
        node.attributes.insert(name.to_string(), value.to_string());
        *node.writes.entry(name.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn add_class(&self, class: &str) -> Result<(), LoadError> {
        self.ensure_writable("class")?;
        let mut node = self.node.borrow_mut();
        if !node.classes.iter().any(|c| c == class) {
            node.classes.push(class.to_string());
        }
        Ok(())
    }

    fn key(&self) -> ElementKey {
        self.node.borrow().key
    }

    fn describe(&self) -> String {
        let node = self.node.borrow();
        match node.attributes.get(DEFAULT_SOURCE_ATTRIBUTE) {
            Some(url) => format!("<img {DEFAULT_SOURCE_ATTRIBUTE}={url:?}>"),
            None => "<img>".to_string(),
        }
    }
}

impl Bounded for DetachedImage {
    fn bounds(&self) -> Rect {
        self.node.borrow().bounds
    }
}

impl PartialEq for DetachedImage {
    fn eq(&self, other: &Self) -> bool {
        self.same_element(other)
    }
}

impl fmt::Debug for DetachedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.node.borrow();
        f.debug_struct("DetachedImage")
            .field("attributes", &node.attributes)
            .field("classes", &node.classes)
            .field("bounds", &node.bounds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_node() {
        let image = DetachedImage::with_deferred_source("photo.jpg");
        let handle = image.clone();

        handle.set_attribute("src", "photo.jpg").unwrap();

        assert_eq!(image.attribute("src").as_deref(), Some("photo.jpg"));
        assert!(image.same_element(&handle));
        assert_eq!(image.key(), handle.key());
        assert!(!image.same_element(&DetachedImage::new()));
    }

    #[test]
    fn add_class_is_idempotent() {
        let image = DetachedImage::new();
        image.add_class("fade").unwrap();
        image.add_class("fade").unwrap();
        assert_eq!(image.classes(), vec!["fade".to_string()]);
    }

    #[test]
    fn writes_are_counted_per_attribute() {
        let image = DetachedImage::new();
        image.set_attribute("src", "a.jpg").unwrap();
        image.set_attribute("src", "b.jpg").unwrap();
        assert_eq!(image.write_count("src"), 2);
        assert_eq!(image.write_count("alt"), 0);
    }

    #[test]
    fn read_only_node_rejects_mutation() {
        let image = DetachedImage::new();
        image.set_read_only(true);

        let err = image.set_attribute("src", "a.jpg").unwrap_err();
        assert!(matches!(err, LoadError::Attribute { ref name, .. } if name == "src"));
        assert!(image.add_class("fade").is_err());
        assert_eq!(image.attribute("src"), None);
    }
}
