//! The loader: turns a collection of elements into independent watchers.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::collections::{map::HashMap, OrderedMap};
use crate::config::{LazyLoadConfig, MissingSourcePolicy};
use crate::element::{ElementKey, ImageElement};
use crate::error::{ConfigError, LoadError};
use crate::watcher::{ReleaseHandle, SharedWatcher, Watcher, WatcherId, WatcherState};

/// Something that can tell a watcher when its element becomes visible.
///
/// Implementations observe exactly one element per `watch` call and deliver
/// entries by calling [`Watcher::notify`]. The returned handle stops that
/// observation; the watcher invokes it once, on apply.
pub trait VisibilityBackend {
    type Element: ImageElement + Clone + 'static;

    fn watch(
        &mut self,
        watcher: &SharedWatcher<Self::Element>,
        config: &LazyLoadConfig,
    ) -> Result<ReleaseHandle, LoadError>;
}

/// Counters over every watcher a loader has created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoaderStats {
    pub registered: usize,
    pub pending: usize,
    pub applied: usize,
}

pub struct LazyImageLoader<B: VisibilityBackend> {
    backend: B,
    config: Rc<LazyLoadConfig>,
    watchers: OrderedMap<WatcherId, SharedWatcher<B::Element>>,
    /// Every element ever registered, applied or not. Outlives
    /// `forget_applied` so a swapped-in element is never watched again.
    seen: HashMap<ElementKey, WatcherId>,
    /// Applied watchers dropped by `forget_applied`.
    forgotten: usize,
    next_id: u64,
}

impl<B: VisibilityBackend> LazyImageLoader<B> {
    pub fn new(backend: B, config: LazyLoadConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            backend,
            config: Rc::new(config),
            watchers: OrderedMap::default(),
            seen: HashMap::default(),
            forgotten: 0,
            next_id: 1,
        })
    }

    pub fn with_default_config(backend: B) -> Self {
        Self {
            backend,
            config: Rc::new(LazyLoadConfig::default()),
            watchers: OrderedMap::default(),
            seen: HashMap::default(),
            forgotten: 0,
            next_id: 1,
        }
    }

    pub fn config(&self) -> &LazyLoadConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Starts watching every element in `elements`, one watcher each.
    ///
    /// Elements this loader has already registered are skipped, whether their
    /// watcher is still pending or has applied: each element fires once. With
    /// [`MissingSourcePolicy::Strict`] the batch is checked first and nothing
    /// is registered if any element lacks the deferred source attribute.
    /// A backend failure stops the batch; elements before it stay registered.
    pub fn register<I>(&mut self, elements: I) -> Result<(), LoadError>
    where
        I: IntoIterator<Item = B::Element>,
    {
        let elements: SmallVec<[B::Element; 8]> = elements.into_iter().collect();

        if self.config.missing_source == MissingSourcePolicy::Strict {
            if let Some(element) = elements
                .iter()
                .find(|element| element.attribute(&self.config.source_attribute).is_none())
            {
                log::error!(
                    "refusing batch: {} has no `{}`",
                    element.describe(),
                    self.config.source_attribute
                );
                return Err(LoadError::MissingDeferredSource {
                    watcher: None,
                    attribute: self.config.source_attribute.clone(),
                });
            }
        }

        let mut added = 0;
        for element in elements {
            let key = element.key();
            if let Some(existing) = self.seen.get(&key) {
                log::debug!("{} already seen as {existing}, skipping", element.describe());
                continue;
            }

            let id = WatcherId(self.next_id);
            self.next_id += 1;

            let watcher = Watcher::new(id, element, Rc::clone(&self.config)).shared();
            let release = self.backend.watch(&watcher, &self.config)?;
            watcher.borrow_mut().arm(release);
            self.watchers.insert(id, watcher);
            self.seen.insert(key, id);
            added += 1;
        }

        log::debug!("registered {added} watcher(s), {} total", self.watchers.len());
        Ok(())
    }

    /// State of the watcher created for `element`, `None` if it was never
    /// registered. Forgotten watchers report `Applied`.
    pub fn state_of(&self, element: &B::Element) -> Option<WatcherState> {
        let id = self.seen.get(&element.key())?;
        Some(
            self.watchers
                .get(id)
                .map_or(WatcherState::Applied, |watcher| watcher.borrow().state()),
        )
    }

    /// Whether `element` was ever registered with this loader.
    pub fn has_seen(&self, element: &B::Element) -> bool {
        self.seen.contains_key(&element.key())
    }

    pub fn watchers(&self) -> impl Iterator<Item = (WatcherId, WatcherState)> + '_ {
        self.watchers.values().map(|watcher| {
            let watcher = watcher.borrow();
            (watcher.id(), watcher.state())
        })
    }

    pub fn stats(&self) -> LoaderStats {
        let pending = self
            .watchers
            .values()
            .filter(|watcher| watcher.borrow().is_pending())
            .count();
        let tracked = self.watchers.len();
        LoaderStats {
            registered: tracked + self.forgotten,
            pending,
            applied: tracked - pending + self.forgotten,
        }
    }

    /// Drops bookkeeping for applied watchers. Counts survive in [`stats`].
    ///
    /// [`stats`]: Self::stats
    pub fn forget_applied(&mut self) -> usize {
        let before = self.watchers.len();
        self.watchers.retain(|_, watcher| watcher.borrow().is_pending());
        let dropped = before - self.watchers.len();
        self.forgotten += dropped;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::DetachedImage;
    use crate::watcher::IntersectionEntry;
    use std::cell::RefCell;

    /// Backend that hands out watchers to the test instead of observing.
    #[derive(Default)]
    struct ManualBackend {
        watched: Rc<RefCell<Vec<SharedWatcher<DetachedImage>>>>,
        released: Rc<RefCell<Vec<WatcherId>>>,
    }

    impl VisibilityBackend for ManualBackend {
        type Element = DetachedImage;

        fn watch(
            &mut self,
            watcher: &SharedWatcher<DetachedImage>,
            _config: &LazyLoadConfig,
        ) -> Result<ReleaseHandle, LoadError> {
            self.watched.borrow_mut().push(Rc::clone(watcher));
            let id = watcher.borrow().id();
            let released = Rc::clone(&self.released);
            Ok(ReleaseHandle::new(move || released.borrow_mut().push(id)))
        }
    }

    impl ManualBackend {
        fn show(&self, index: usize) {
            let watcher = Rc::clone(&self.watched.borrow()[index]);
            let id = watcher.borrow().id();
            watcher
                .borrow_mut()
                .notify(&IntersectionEntry {
                    watcher: id,
                    is_intersecting: true,
                    intersection_ratio: 1.0,
                    time: 0.0,
                })
                .unwrap();
        }
    }

    #[test]
    fn one_watcher_per_element() {
        let images: Vec<_> = (0..3)
            .map(|i| DetachedImage::with_deferred_source(format!("{i}.jpg")))
            .collect();
        let mut loader = LazyImageLoader::with_default_config(ManualBackend::default());

        loader.register(images.iter().cloned()).unwrap();

        assert_eq!(loader.backend().watched.borrow().len(), 3);
        let ids: Vec<_> = loader.watchers().map(|(id, _)| id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(
            loader.stats(),
            LoaderStats {
                registered: 3,
                pending: 3,
                applied: 0
            }
        );
    }

    #[test]
    fn applying_one_leaves_others_alone() {
        let images: Vec<_> = (0..3)
            .map(|i| DetachedImage::with_deferred_source(format!("{i}.jpg")))
            .collect();
        let mut loader = LazyImageLoader::with_default_config(ManualBackend::default());
        loader.register(images.iter().cloned()).unwrap();

        loader.backend().show(1);

        assert_eq!(images[1].attribute("src").as_deref(), Some("1.jpg"));
        for untouched in [&images[0], &images[2]] {
            assert_eq!(untouched.attribute("src"), None);
            assert!(!untouched.has_class("fade"));
        }
        assert_eq!(*loader.backend().released.borrow(), vec![WatcherId(2)]);
        assert_eq!(loader.state_of(&images[1]), Some(WatcherState::Applied));
        assert_eq!(loader.state_of(&images[0]), Some(WatcherState::Pending));
    }

    #[test]
    fn pending_element_is_not_registered_twice() {
        let image = DetachedImage::with_deferred_source("photo.jpg");
        let mut loader = LazyImageLoader::with_default_config(ManualBackend::default());

        loader.register([image.clone(), image.clone()]).unwrap();
        loader.register([image.clone()]).unwrap();

        assert_eq!(loader.stats().registered, 1);
    }

    #[test]
    fn applied_element_is_not_registered_again() {
        let image = DetachedImage::with_deferred_source("photo.jpg");
        let mut loader = LazyImageLoader::with_default_config(ManualBackend::default());
        loader.register([image.clone()]).unwrap();
        loader.backend().show(0);

        loader.register([image.clone()]).unwrap();

        assert_eq!(loader.backend().watched.borrow().len(), 1);
        assert_eq!(
            loader.stats(),
            LoaderStats {
                registered: 1,
                pending: 0,
                applied: 1
            }
        );
        assert_eq!(loader.state_of(&image), Some(WatcherState::Applied));
        assert_eq!(image.write_count("src"), 1);
    }

    #[test]
    fn forgotten_element_is_still_seen() {
        let image = DetachedImage::with_deferred_source("photo.jpg");
        let mut loader = LazyImageLoader::with_default_config(ManualBackend::default());
        loader.register([image.clone()]).unwrap();
        loader.backend().show(0);
        assert_eq!(loader.forget_applied(), 1);

        loader.register([image.clone()]).unwrap();

        assert!(loader.has_seen(&image));
        assert_eq!(loader.state_of(&image), Some(WatcherState::Applied));
        assert_eq!(loader.watchers().count(), 0);
        assert_eq!(loader.backend().watched.borrow().len(), 1);
        assert_eq!(image.write_count("src"), 1);
    }

    #[test]
    fn unknown_element_has_no_state() {
        let loader = LazyImageLoader::with_default_config(ManualBackend::default());
        let image = DetachedImage::with_deferred_source("photo.jpg");
        assert_eq!(loader.state_of(&image), None);
        assert!(!loader.has_seen(&image));
    }

    #[test]
    fn strict_policy_rejects_whole_batch() {
        let good = DetachedImage::with_deferred_source("photo.jpg");
        let bad = DetachedImage::new();
        let config = LazyLoadConfig::default().strict();
        let mut loader = LazyImageLoader::new(ManualBackend::default(), config).unwrap();

        let err = loader.register([good.clone(), bad]).unwrap_err();

        assert_eq!(
            err,
            LoadError::MissingDeferredSource {
                watcher: None,
                attribute: "data-lazy".into()
            }
        );
        assert_eq!(loader.stats().registered, 0);
        assert!(loader.backend().watched.borrow().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = LazyLoadConfig::default().with_threshold(-0.1);
        let result = LazyImageLoader::new(ManualBackend::default(), config);
        assert!(matches!(result, Err(ConfigError::ThresholdOutOfRange(_))));
    }

    #[test]
    fn forget_applied_keeps_counts() {
        let images: Vec<_> = (0..2)
            .map(|i| DetachedImage::with_deferred_source(format!("{i}.jpg")))
            .collect();
        let mut loader = LazyImageLoader::with_default_config(ManualBackend::default());
        loader.register(images.iter().cloned()).unwrap();
        loader.backend().show(0);

        assert_eq!(loader.forget_applied(), 1);
        assert_eq!(loader.watchers().count(), 1);
        assert_eq!(
            loader.stats(),
            LoaderStats {
                registered: 2,
                pending: 1,
                applied: 1
            }
        );
    }
}
