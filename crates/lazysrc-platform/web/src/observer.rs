use std::cell::RefCell;
use std::rc::{Rc, Weak};

use js_sys::Array;
use lazysrc_core::collections::map::HashMap;
use lazysrc_core::{
    ImageElement, IntersectionEntry, LazyLoadConfig, LoadError, ReleaseHandle, SharedWatcher,
    VisibilityBackend, WatcherId,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit};

use crate::{js_message, WebImage};

type EntryCallback = Closure<dyn FnMut(Array, IntersectionObserver)>;

struct ActiveObserver {
    observer: IntersectionObserver,
    target: WebImage,
    _callback: EntryCallback,
}

#[derive(Default)]
struct Registry {
    active: HashMap<WatcherId, ActiveObserver>,
    /// Released observers whose callbacks may still be on the JS stack.
    retired: Vec<ActiveObserver>,
}

/// [`VisibilityBackend`] backed by the browser's `IntersectionObserver`.
///
/// Each watcher gets its own observer built from the loader's threshold and
/// root margin. Releasing a watcher unobserves and disconnects it; the Rust
/// closure is kept until the next [`WebBackend::prune`] so it is never freed
/// while running.
#[derive(Clone, Default)]
pub struct WebBackend {
    registry: Rc<RefCell<Registry>>,
}

impl WebBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observers still waiting for their element to become visible.
    pub fn active_count(&self) -> usize {
        self.registry.borrow().active.len()
    }

    /// Frees callbacks of released observers. Returns how many were freed.
    pub fn prune(&self) -> usize {
        let retired = std::mem::take(&mut self.registry.borrow_mut().retired);
        retired.len()
    }

    fn release_handle(registry: Weak<RefCell<Registry>>, id: WatcherId) -> ReleaseHandle {
        ReleaseHandle::new(move || {
            let Some(registry) = registry.upgrade() else {
                return;
            };
            let mut registry = registry.borrow_mut();
            if let Some(active) = registry.active.remove(&id) {
                active.observer.unobserve(active.target.element());
                active.observer.disconnect();
                registry.retired.push(active);
            }
        })
    }
}

impl VisibilityBackend for WebBackend {
    type Element = WebImage;

    fn watch(
        &mut self,
        watcher: &SharedWatcher<WebImage>,
        config: &LazyLoadConfig,
    ) -> Result<ReleaseHandle, LoadError> {
        self.prune();

        let (id, target) = {
            let watcher = watcher.borrow();
            (watcher.id(), watcher.element().clone())
        };

        let shared = Rc::clone(watcher);
        let callback: EntryCallback = Closure::new(move |entries: Array, _: IntersectionObserver| {
            for value in entries.iter() {
                let Ok(raw) = value.dyn_into::<IntersectionObserverEntry>() else {
                    continue;
                };
                let entry = IntersectionEntry {
                    watcher: id,
                    is_intersecting: raw.is_intersecting(),
                    intersection_ratio: raw.intersection_ratio(),
                    time: raw.time(),
                };
                let result = shared.borrow_mut().notify(&entry);
                if let Err(err) = result {
                    log::error!("{id}: {err}");
                }
            }
        });

        let options = IntersectionObserverInit::new();
        options.set_threshold(&JsValue::from_f64(config.threshold));
        options.set_root_margin(&config.root_margin.to_string());

        let observer =
            IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &options)
                .map_err(|err| LoadError::Observer(js_message(&err)))?;
        observer.observe(target.element());
        log::debug!("{id}: observing {}", target.describe());

        self.registry.borrow_mut().active.insert(
            id,
            ActiveObserver {
                observer,
                target,
                _callback: callback,
            },
        );
        Ok(Self::release_handle(Rc::downgrade(&self.registry), id))
    }
}
