use lazysrc_core::{LazyImageLoader, LoadError};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element};

use crate::{js_message, WebBackend, WebImage};

/// Every element in `document` matching `selector`, in document order.
pub fn document_images(document: &Document, selector: &str) -> Result<Vec<WebImage>, LoadError> {
    let nodes = document
        .query_selector_all(selector)
        .map_err(|err| LoadError::Query {
            selector: selector.to_string(),
            message: js_message(&err),
        })?;

    let images = (0..nodes.length())
        .filter_map(|index| nodes.item(index))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .map(WebImage::new)
        .collect();
    Ok(images)
}

/// Registers every element matching the loader's configured selector.
///
/// Images this loader has already seen are left alone, pending or applied,
/// so calling it again after the page grows only picks up the new ones.
/// Returns how many elements were newly registered.
pub fn register_document(
    loader: &mut LazyImageLoader<WebBackend>,
    document: &Document,
) -> Result<usize, LoadError> {
    let images: Vec<WebImage> = document_images(document, &loader.config().selector)?
        .into_iter()
        .filter(|image| !loader.has_seen(image))
        .collect();
    let found = images.len();
    loader.register(images)?;
    log::info!(
        "lazy-loading {found} image(s) matching {:?}",
        loader.config().selector
    );
    Ok(found)
}
