use lazysrc_core::{
    ConfigError, DetachedImage, FlushReport, ImageElement, LazyImageLoader, LazyLoadConfig,
    LoadError, Rect, ViewportObserver, WatcherState,
};

use crate::matcher::ImageMatcher;

pub const DEFAULT_VIEWPORT_WIDTH: f32 = 400.0;
pub const DEFAULT_VIEWPORT_HEIGHT: f32 = 300.0;

type HeadlessLoader = LazyImageLoader<ViewportObserver<DetachedImage>>;

/// Drives a loader against a page of detached images.
///
/// Images are stacked top to bottom in the order they are added. Scrolling
/// moves the viewport and flushes the observer, the way a frame would in a
/// browser.
pub struct LazyLoadTestRule {
    observer: ViewportObserver<DetachedImage>,
    loader: HeadlessLoader,
    images: Vec<DetachedImage>,
    next_y: f32,
    errors: Vec<LoadError>,
}

impl LazyLoadTestRule {
    pub fn new() -> Self {
        Self::with_viewport(DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT)
    }

    pub fn with_viewport(width: f32, height: f32) -> Self {
        crate::init_logging();
        let observer = ViewportObserver::new(Rect::new(0.0, 0.0, width, height));
        let loader = LazyImageLoader::with_default_config(observer.clone());
        Self::from_parts(observer, loader)
    }

    pub fn with_config(config: LazyLoadConfig) -> Result<Self, ConfigError> {
        crate::init_logging();
        let observer = ViewportObserver::new(Rect::new(
            0.0,
            0.0,
            DEFAULT_VIEWPORT_WIDTH,
            DEFAULT_VIEWPORT_HEIGHT,
        ));
        let loader = LazyImageLoader::new(observer.clone(), config)?;
        Ok(Self::from_parts(observer, loader))
    }

    fn from_parts(observer: ViewportObserver<DetachedImage>, loader: HeadlessLoader) -> Self {
        Self {
            observer,
            loader,
            images: Vec::new(),
            next_y: 0.0,
            errors: Vec::new(),
        }
    }

    /// Appends an image of `height` pixels below the previous one.
    /// `None` leaves out the deferred source attribute.
    pub fn add_image(&mut self, deferred: Option<&str>, height: f32) -> usize {
        let mut image = DetachedImage::new();
        if let Some(url) = deferred {
            image = image.with_attribute(self.loader.config().source_attribute.clone(), url);
        }
        self.push_image(image, height)
    }

    /// Appends an already-built image below the previous one.
    pub fn push_image(&mut self, image: DetachedImage, height: f32) -> usize {
        let width = self.observer.root().width;
        image.set_bounds(Rect::new(0.0, self.next_y, width, height));
        self.next_y += height;
        self.images.push(image);
        self.images.len() - 1
    }

    /// Registers every image added so far.
    pub fn register_all(&mut self) -> Result<(), LoadError> {
        let images = self.images.clone();
        self.loader.register(images)
    }

    pub fn register(&mut self, indices: &[usize]) -> Result<(), LoadError> {
        let images: Vec<_> = indices.iter().map(|&i| self.images[i].clone()).collect();
        self.loader.register(images)
    }

    /// Delivers pending visibility changes, as a rendered frame would.
    pub fn flush(&mut self) -> FlushReport {
        let report = self.observer.flush();
        log::debug!(
            "flush: {} delivered, {} applied, {} error(s)",
            report.delivered,
            report.applied,
            report.errors.len()
        );
        self.errors.extend(report.errors.iter().cloned());
        report
    }

    pub fn scroll_to(&mut self, y: f32) -> FlushReport {
        log::debug!("scroll to y={y} of {}", self.next_y);
        self.observer.scroll_to(0.0, y);
        self.flush()
    }

    pub fn scroll_by(&mut self, dy: f32) -> FlushReport {
        log::debug!("scroll by dy={dy}");
        self.observer.scroll_by(0.0, dy);
        self.flush()
    }

    /// Total height of the stacked page.
    pub fn page_height(&self) -> f32 {
        self.next_y
    }

    pub fn loader(&self) -> &HeadlessLoader {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut HeadlessLoader {
        &mut self.loader
    }

    pub fn observer(&self) -> &ViewportObserver<DetachedImage> {
        &self.observer
    }

    /// Errors collected from every flush so far.
    pub fn errors(&self) -> &[LoadError] {
        &self.errors
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn on_image(&self, index: usize) -> TestImage<'_> {
        assert!(
            index < self.images.len(),
            "image #{index} out of range ({} images)",
            self.images.len()
        );
        TestImage { rule: self, index }
    }

    pub fn on_node(&self, matcher: ImageMatcher) -> TestImage<'_> {
        match self.images.iter().position(|image| matcher.matches(image)) {
            Some(index) => TestImage { rule: self, index },
            None => panic!("no image matches {}", matcher.description()),
        }
    }

    pub fn count(&self, matcher: &ImageMatcher) -> usize {
        self.images
            .iter()
            .filter(|image| matcher.matches(image))
            .count()
    }
}

impl Default for LazyLoadTestRule {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TestImage<'a> {
    rule: &'a LazyLoadTestRule,
    index: usize,
}

impl<'a> TestImage<'a> {
    pub fn element(&self) -> &'a DetachedImage {
        &self.rule.images[self.index]
    }

    pub fn live_source(&self) -> Option<String> {
        self.element()
            .attribute(&self.rule.loader.config().live_attribute)
    }

    pub fn state(&self) -> Option<WatcherState> {
        self.rule.loader.state_of(self.element())
    }

    pub fn assert_loaded(&self, expected: &str) -> &Self {
        assert_eq!(
            self.live_source().as_deref(),
            Some(expected),
            "image #{} live source",
            self.index
        );
        self
    }

    pub fn assert_not_loaded(&self) -> &Self {
        assert_eq!(
            self.live_source(),
            None,
            "image #{} should not have a live source yet",
            self.index
        );
        self
    }

    pub fn assert_faded(&self) -> &Self {
        let class = &self.rule.loader.config().fade_class;
        assert!(
            self.element().has_class(class),
            "image #{} should have class {class:?}",
            self.index
        );
        self
    }

    pub fn assert_not_faded(&self) -> &Self {
        let class = &self.rule.loader.config().fade_class;
        assert!(
            !self.element().has_class(class),
            "image #{} should not have class {class:?}",
            self.index
        );
        self
    }

    pub fn assert_source_writes(&self, expected: usize) -> &Self {
        let live = &self.rule.loader.config().live_attribute;
        assert_eq!(
            self.element().write_count(live),
            expected,
            "image #{} writes to {live:?}",
            self.index
        );
        self
    }

    pub fn assert_state(&self, expected: WatcherState) -> &Self {
        assert_eq!(self.state(), Some(expected), "image #{} watcher", self.index);
        self
    }
}
