//! Per-element visibility watchers.
//!
//! A [`Watcher`] is the registration record for one element. It starts
//! [`WatcherState::Pending`] and moves to [`WatcherState::Applied`] the first
//! time a qualifying [`IntersectionEntry`] arrives. The transition copies the
//! deferred source into the live attribute, adds the fade marker and fires
//! the backend's [`ReleaseHandle`]. Nothing moves a watcher back.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use web_time::Instant;

use crate::config::{LazyLoadConfig, MissingSourcePolicy};
use crate::element::ImageElement;
use crate::error::LoadError;

/// Identifies one registration. Never reused within a loader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherId(pub(crate) u64);

impl WatcherId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watcher#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatcherState {
    /// Observing; live source not written yet.
    Pending,
    /// Source swapped in and backend registration released. Terminal.
    Applied,
}

/// A visibility notification for a single watched element.
#[derive(Clone, Debug, PartialEq)]
pub struct IntersectionEntry {
    pub watcher: WatcherId,
    pub is_intersecting: bool,
    /// Visible fraction of the element, `0.0..=1.0`.
    pub intersection_ratio: f64,
    /// Milliseconds since the backend's time origin.
    pub time: f64,
}

/// Deregisters a watcher from its backend. Runs at most once.
pub struct ReleaseHandle(Box<dyn FnOnce()>);

impl ReleaseHandle {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self(Box::new(release))
    }

    /// Handle for backends that need no cleanup.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    fn release(self) {
        (self.0)()
    }
}

impl fmt::Debug for ReleaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReleaseHandle(..)")
    }
}

/// What a notification did to the watcher.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// Watcher was already applied; the entry was dropped.
    Ignored,
    /// Entry did not reach the threshold; still pending.
    NotVisible,
    /// Source written. `None` when the element had no deferred source and the
    /// lenient policy wrote an empty value.
    Applied { source: Option<String> },
}

pub type SharedWatcher<E> = Rc<RefCell<Watcher<E>>>;

pub struct Watcher<E> {
    id: WatcherId,
    element: E,
    config: Rc<LazyLoadConfig>,
    state: WatcherState,
    release: Option<ReleaseHandle>,
    registered_at: Instant,
    applied_at: Option<Instant>,
}

impl<E: ImageElement> Watcher<E> {
    pub fn new(id: WatcherId, element: E, config: Rc<LazyLoadConfig>) -> Self {
        Self {
            id,
            element,
            config,
            state: WatcherState::Pending,
            release: None,
            registered_at: Instant::now(),
            applied_at: None,
        }
    }

    pub fn shared(self) -> SharedWatcher<E> {
        Rc::new(RefCell::new(self))
    }

    pub fn id(&self) -> WatcherId {
        self.id
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == WatcherState::Pending
    }

    /// Whether the backend registration is still held.
    pub fn is_registered(&self) -> bool {
        self.release.is_some()
    }

    /// Time between registration and the swap, once applied.
    pub fn time_to_apply(&self) -> Option<std::time::Duration> {
        self.applied_at
            .map(|applied| applied.duration_since(self.registered_at))
    }

    /// Hands the watcher its backend registration.
    ///
    /// Arming an applied watcher releases the handle immediately.
    pub fn arm(&mut self, release: ReleaseHandle) {
        if self.state == WatcherState::Applied {
            release.release();
            return;
        }
        if let Some(previous) = self.release.replace(release) {
            log::warn!("{}: re-armed, releasing previous registration", self.id);
            previous.release();
        }
    }

    /// Feeds one visibility notification through the state machine.
    ///
    /// The transition to `Applied` and the release happen even when writing
    /// to the element fails; that failure is returned afterwards.
    pub fn notify(&mut self, entry: &IntersectionEntry) -> Result<Notification, LoadError> {
        if self.state == WatcherState::Applied {
            log::trace!("{}: ignoring entry after apply", self.id);
            return Ok(Notification::Ignored);
        }
        if !self
            .config
            .is_triggered_by(entry.is_intersecting, entry.intersection_ratio)
        {
            return Ok(Notification::NotVisible);
        }

        let outcome = self.swap_source();

        self.state = WatcherState::Applied;
        self.applied_at = Some(Instant::now());
        if let Some(release) = self.release.take() {
            release.release();
        }
        log::debug!(
            "{}: applied {} at ratio {:.2}",
            self.id,
            self.element.describe(),
            entry.intersection_ratio
        );

        outcome
    }

    fn swap_source(&self) -> Result<Notification, LoadError> {
        let config = &self.config;
        let source = self.element.attribute(&config.source_attribute);

        if source.is_none() {
            match config.missing_source {
                MissingSourcePolicy::Strict => {
                    return Err(LoadError::MissingDeferredSource {
                        watcher: Some(self.id),
                        attribute: config.source_attribute.clone(),
                    });
                }
                MissingSourcePolicy::Lenient => log::warn!(
                    "{}: {} has no `{}`, writing empty `{}`",
                    self.id,
                    self.element.describe(),
                    config.source_attribute,
                    config.live_attribute
                ),
            }
        }

        self.element
            .set_attribute(&config.live_attribute, source.as_deref().unwrap_or(""))?;
        self.element.add_class(&config.fade_class)?;
        Ok(Notification::Applied { source })
    }
}

impl<E> fmt::Debug for Watcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("registered", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::DetachedImage;
    use std::cell::Cell;

    fn visible(id: WatcherId) -> IntersectionEntry {
        IntersectionEntry {
            watcher: id,
            is_intersecting: true,
            intersection_ratio: 1.0,
            time: 0.0,
        }
    }

    fn hidden(id: WatcherId) -> IntersectionEntry {
        IntersectionEntry {
            watcher: id,
            is_intersecting: false,
            intersection_ratio: 0.0,
            time: 0.0,
        }
    }

    fn watcher(image: &DetachedImage, config: LazyLoadConfig) -> Watcher<DetachedImage> {
        Watcher::new(WatcherId(1), image.clone(), Rc::new(config))
    }

    #[test]
    fn swaps_source_once_visible() {
        let image = DetachedImage::with_deferred_source("photo.jpg");
        let mut watcher = watcher(&image, LazyLoadConfig::default());

        assert_eq!(
            watcher.notify(&hidden(watcher.id())).unwrap(),
            Notification::NotVisible
        );
        assert_eq!(image.attribute("src"), None);

        let result = watcher.notify(&visible(watcher.id())).unwrap();
        assert_eq!(
            result,
            Notification::Applied {
                source: Some("photo.jpg".into())
            }
        );
        assert_eq!(image.attribute("src").as_deref(), Some("photo.jpg"));
        assert!(image.has_class("fade"));
        assert_eq!(watcher.state(), WatcherState::Applied);
        assert!(watcher.time_to_apply().is_some());
    }

    #[test]
    fn second_visibility_is_ignored() {
        let image = DetachedImage::with_deferred_source("photo.jpg");
        let mut watcher = watcher(&image, LazyLoadConfig::default());

        watcher.notify(&visible(watcher.id())).unwrap();
        watcher.notify(&hidden(watcher.id())).unwrap();
        let again = watcher.notify(&visible(watcher.id())).unwrap();

        assert_eq!(again, Notification::Ignored);
        assert_eq!(image.write_count("src"), 1);
    }

    #[test]
    fn release_runs_exactly_once() {
        let image = DetachedImage::with_deferred_source("photo.jpg");
        let mut watcher = watcher(&image, LazyLoadConfig::default());
        let released = Rc::new(Cell::new(0));
        let counter = released.clone();
        watcher.arm(ReleaseHandle::new(move || counter.set(counter.get() + 1)));
        assert!(watcher.is_registered());

        watcher.notify(&visible(watcher.id())).unwrap();
        watcher.notify(&visible(watcher.id())).unwrap();

        assert_eq!(released.get(), 1);
        assert!(!watcher.is_registered());
    }

    #[test]
    fn arming_applied_watcher_releases_immediately() {
        let image = DetachedImage::with_deferred_source("photo.jpg");
        let mut watcher = watcher(&image, LazyLoadConfig::default());
        watcher.notify(&visible(watcher.id())).unwrap();

        let released = Rc::new(Cell::new(false));
        let flag = released.clone();
        watcher.arm(ReleaseHandle::new(move || flag.set(true)));

        assert!(released.get());
        assert!(!watcher.is_registered());
    }

    #[test]
    fn threshold_holds_back_partial_visibility() {
        let image = DetachedImage::with_deferred_source("photo.jpg");
        let mut watcher = watcher(&image, LazyLoadConfig::default().with_threshold(0.5));

        let partial = IntersectionEntry {
            intersection_ratio: 0.25,
            ..visible(watcher.id())
        };
        assert_eq!(watcher.notify(&partial).unwrap(), Notification::NotVisible);
        assert!(watcher.is_pending());

        let half = IntersectionEntry {
            intersection_ratio: 0.5,
            ..visible(watcher.id())
        };
        assert!(matches!(
            watcher.notify(&half).unwrap(),
            Notification::Applied { .. }
        ));
    }

    #[test]
    fn lenient_missing_source_writes_empty_value() {
        let image = DetachedImage::new();
        let mut watcher = watcher(&image, LazyLoadConfig::default());

        let result = watcher.notify(&visible(watcher.id())).unwrap();

        assert_eq!(result, Notification::Applied { source: None });
        assert_eq!(image.attribute("src").as_deref(), Some(""));
        assert!(image.has_class("fade"));
    }

    #[test]
    fn strict_missing_source_leaves_element_untouched() {
        let image = DetachedImage::new();
        let mut watcher = watcher(&image, LazyLoadConfig::default().strict());

        let err = watcher.notify(&visible(watcher.id())).unwrap_err();

        assert!(matches!(err, LoadError::MissingDeferredSource { .. }));
        assert_eq!(image.attribute("src"), None);
        assert!(!image.has_class("fade"));
        assert_eq!(watcher.state(), WatcherState::Applied);
    }

    #[test]
    fn write_failure_still_releases() {
        let image = DetachedImage::with_deferred_source("photo.jpg");
        image.set_read_only(true);
        let mut watcher = watcher(&image, LazyLoadConfig::default());
        let released = Rc::new(Cell::new(false));
        let flag = released.clone();
        watcher.arm(ReleaseHandle::new(move || flag.set(true)));

        assert!(watcher.notify(&visible(watcher.id())).is_err());
        assert!(released.get());
        assert_eq!(watcher.state(), WatcherState::Applied);
    }

    #[test]
    fn custom_attribute_names() {
        let image = DetachedImage::new().with_attribute("data-src", "hero.webp");
        let config = LazyLoadConfig::default()
            .with_source_attribute("data-src")
            .with_fade_class("is-loaded");
        let mut watcher = watcher(&image, config);

        watcher.notify(&visible(watcher.id())).unwrap();

        assert_eq!(image.attribute("src").as_deref(), Some("hero.webp"));
        assert!(image.has_class("is-loaded"));
    }
}
