use std::cell::RefCell;

use lazysrc::prelude::*;
use lazysrc::RootMargin;
use wasm_bindgen::prelude::*;

thread_local! {
    // Observers call back into the backend for as long as the page scrolls.
    static LOADER: RefCell<Option<LazyImageLoader<WebBackend>>> = const { RefCell::new(None) };
}

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::new(log::Level::Debug));
    log::info!("lazysrc web demo starting...");

    if let Err(err) = lazy_load_images(None) {
        log::error!("lazy loading disabled: {err:?}");
    }
}

/// Lazy-loads every `img` on the page. `root_margin` takes CSS margin
/// syntax, e.g. `"200px 0px"` to start loading a little before the fold.
///
/// Calling it again picks up images added since the last call. The margin
/// is fixed by the first call: later calls may omit it or repeat it, and
/// any other margin is rejected.
#[wasm_bindgen]
pub fn lazy_load_images(root_margin: Option<String>) -> Result<usize, JsValue> {
    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let margin = root_margin
        .as_deref()
        .map(RootMargin::parse)
        .transpose()
        .map_err(to_js)?;

    LOADER.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            let mut config = LazyLoadConfig::default();
            if let Some(margin) = margin {
                config = config.with_root_margin(margin);
            }
            *slot = Some(LazyImageLoader::new(WebBackend::new(), config).map_err(to_js)?);
        }

        let loader = slot.as_mut().ok_or_else(|| JsValue::from_str("loader missing"))?;
        if let Some(margin) = margin {
            let current = loader.config().root_margin;
            if margin != current {
                return Err(JsValue::from_str(&format!(
                    "loader already running with root margin \"{current}\", cannot switch to \"{margin}\""
                )));
            }
        }
        register_document(loader, &document).map_err(to_js)
    })
}

/// `(registered, pending, applied)` for the page's loader.
#[wasm_bindgen]
pub fn lazy_load_stats() -> Vec<u32> {
    LOADER.with(|slot| match slot.borrow().as_ref() {
        Some(loader) => {
            let stats = loader.stats();
            vec![stats.registered as u32, stats.pending as u32, stats.applied as u32]
        }
        None => vec![0, 0, 0],
    })
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}
