//! Headless intersection observer.
//!
//! Computes visibility from element layout boxes against a scrollable root
//! rectangle, so the loader can run (and be tested) without a browser.
//! Delivery follows the browser's rules: each new observation gets an initial
//! entry on the next flush, after that only threshold crossings are reported.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use web_time::Instant;

use crate::collections::OrderedMap;
use crate::config::{LazyLoadConfig, RootMargin};
use crate::element::{Bounded, ImageElement};
use crate::error::LoadError;
use crate::geometry::{visibility, Rect};
use crate::loader::VisibilityBackend;
use crate::watcher::{
    IntersectionEntry, Notification, ReleaseHandle, SharedWatcher, WatcherId,
};

struct Observation<E> {
    watcher: SharedWatcher<E>,
    element: E,
    threshold: f64,
    margin: RootMargin,
    /// Triggered state at the last delivered entry; `None` before the first.
    last_triggered: Option<bool>,
}

struct ViewportInner<E> {
    root: Rect,
    observations: OrderedMap<WatcherId, Observation<E>>,
    origin: Instant,
}

/// Outcome of one [`ViewportObserver::flush`].
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Entries handed to watchers.
    pub delivered: usize,
    /// Watchers that transitioned to applied.
    pub applied: usize,
    pub errors: Vec<LoadError>,
}

/// Software stand-in for the browser's `IntersectionObserver`.
///
/// Cloning yields another handle to the same observer, so a test can keep
/// one while the loader owns the other.
pub struct ViewportObserver<E> {
    inner: Rc<RefCell<ViewportInner<E>>>,
}

impl<E> Clone for ViewportObserver<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for ViewportObserver<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ViewportObserver")
            .field("root", &inner.root)
            .field("observed", &inner.observations.len())
            .finish()
    }
}

impl<E: ImageElement + Bounded + Clone + 'static> ViewportObserver<E> {
    /// Creates an observer whose root is `root`, usually the visible part of
    /// the page at scroll offset zero.
    pub fn new(root: Rect) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ViewportInner {
                root,
                observations: OrderedMap::default(),
                origin: Instant::now(),
            })),
        }
    }

    pub fn root(&self) -> Rect {
        self.inner.borrow().root
    }

    pub fn set_root(&self, root: Rect) {
        self.inner.borrow_mut().root = root;
    }

    /// Moves the root's top-left corner to `(x, y)` in page coordinates.
    pub fn scroll_to(&self, x: f32, y: f32) {
        let mut inner = self.inner.borrow_mut();
        inner.root.x = x;
        inner.root.y = y;
    }

    pub fn scroll_by(&self, dx: f32, dy: f32) {
        let mut inner = self.inner.borrow_mut();
        inner.root = inner.root.translate(dx, dy);
    }

    pub fn observed_count(&self) -> usize {
        self.inner.borrow().observations.len()
    }

    pub fn is_observing(&self, id: WatcherId) -> bool {
        self.inner.borrow().observations.contains_key(&id)
    }

    /// Computes pending entries and delivers them in registration order.
    pub fn flush(&self) -> FlushReport {
        let records = self.take_records();
        let mut report = FlushReport::default();

        for (watcher, entry) in records {
            report.delivered += 1;
            let result = watcher.borrow_mut().notify(&entry);
            match result {
                Ok(Notification::Applied { .. }) => report.applied += 1,
                Ok(_) => {}
                Err(err) => {
                    log::error!("{}: {err}", entry.watcher);
                    // A failed write still ends the watcher.
                    report.applied += 1;
                    report.errors.push(err);
                }
            }
        }

        if report.delivered > 0 {
            log::trace!(
                "flush delivered {} entr(ies), {} applied",
                report.delivered,
                report.applied
            );
        }
        report
    }

    fn take_records(&self) -> Vec<(SharedWatcher<E>, IntersectionEntry)> {
        let mut inner = self.inner.borrow_mut();
        let root = inner.root;
        let time = inner.origin.elapsed().as_secs_f64() * 1000.0;

        let mut records = Vec::new();
        for (&id, observation) in inner.observations.iter_mut() {
            let bounds = observation.element.bounds();
            let vis = visibility(&bounds, &root.inflate(&observation.margin));
            let triggered = vis.is_intersecting && vis.ratio >= observation.threshold;
            if observation.last_triggered == Some(triggered) {
                continue;
            }
            observation.last_triggered = Some(triggered);
            records.push((
                Rc::clone(&observation.watcher),
                IntersectionEntry {
                    watcher: id,
                    is_intersecting: vis.is_intersecting,
                    intersection_ratio: vis.ratio,
                    time,
                },
            ));
        }
        records
    }

    fn release_handle(&self, id: WatcherId) -> ReleaseHandle {
        let inner: Weak<RefCell<ViewportInner<E>>> = Rc::downgrade(&self.inner);
        ReleaseHandle::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.borrow_mut().observations.shift_remove(&id);
                log::trace!("{id}: unobserved");
            }
        })
    }
}

impl<E: ImageElement + Bounded + Clone + 'static> VisibilityBackend for ViewportObserver<E> {
    type Element = E;

    fn watch(
        &mut self,
        watcher: &SharedWatcher<E>,
        config: &LazyLoadConfig,
    ) -> Result<ReleaseHandle, LoadError> {
        let (id, element) = {
            let watcher = watcher.borrow();
            (watcher.id(), watcher.element().clone())
        };

        self.inner.borrow_mut().observations.insert(
            id,
            Observation {
                watcher: Rc::clone(watcher),
                element,
                threshold: config.threshold,
                margin: config.root_margin,
                last_triggered: None,
            },
        );
        Ok(self.release_handle(id))
    }
}
