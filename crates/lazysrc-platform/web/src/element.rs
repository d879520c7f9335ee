use js_sys::Reflect;
use lazysrc_core::{ElementKey, ImageElement, LoadError};
use wasm_bindgen::JsValue;
use web_sys::Element;

use crate::js_message;

const KEY_PROPERTY: &str = "__lazysrcKey";

/// A DOM element handled by the loader.
#[derive(Clone, Debug, PartialEq)]
pub struct WebImage(Element);

impl WebImage {
    pub fn new(element: Element) -> Self {
        Self(element)
    }

    pub fn element(&self) -> &Element {
        &self.0
    }

    pub fn into_element(self) -> Element {
        self.0
    }
}

impl From<Element> for WebImage {
    fn from(element: Element) -> Self {
        Self(element)
    }
}

impl ImageElement for WebImage {
    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), LoadError> {
        self.0
            .set_attribute(name, value)
            .map_err(|err| LoadError::Attribute {
                name: name.to_string(),
                message: js_message(&err),
            })
    }

    fn add_class(&self, class: &str) -> Result<(), LoadError> {
        self.0
            .class_list()
            .add_1(class)
            .map_err(|err| LoadError::Attribute {
                name: "class".to_string(),
                message: js_message(&err),
            })
    }

    /// Stored as an expando property on the node, so every `WebImage`
    /// wrapping the same DOM element (even from a later query) agrees.
    fn key(&self) -> ElementKey {
        let property = JsValue::from_str(KEY_PROPERTY);
        if let Some(raw) = Reflect::get(&self.0, &property)
            .ok()
            .and_then(|value| value.as_f64())
        {
            return ElementKey::from_raw(raw as u64);
        }
        let key = ElementKey::fresh();
        if Reflect::set(&self.0, &property, &JsValue::from_f64(key.get() as f64)).is_err() {
            log::warn!("{}: cannot tag element, identity is per handle", self.describe());
        }
        key
    }

    fn describe(&self) -> String {
        let tag = self.0.tag_name().to_ascii_lowercase();
        match self.0.id() {
            id if id.is_empty() => format!("<{tag}>"),
            id => format!("<{tag}#{id}>"),
        }
    }
}
