//! Browser adapter for lazysrc.
//!
//! [`WebBackend`] creates one `IntersectionObserver` per registered image and
//! feeds its entries to the image's watcher. [`document_images`] and
//! [`register_document`] cover the common case of lazy-loading every image a
//! page declares.
//!
//! The loader (and with it the backend) must outlive the page's scrolling:
//! dropping the backend drops the JS callbacks the observers call into.

mod document;
mod element;
mod observer;

pub use document::{document_images, register_document};
pub use element::WebImage;
pub use observer::WebBackend;

use wasm_bindgen::{JsCast, JsValue};

/// Best-effort text for a thrown JS value.
pub(crate) fn js_message(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}
