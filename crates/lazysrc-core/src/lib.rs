//! Viewport-triggered lazy image loading.
//!
//! Images carry their real URL in a non-fetching attribute (`data-lazy` by
//! default). [`LazyImageLoader::register`] gives every element its own
//! [`Watcher`]; the first time a [`VisibilityBackend`] reports the element as
//! visible, the watcher copies the URL into `src`, adds the `fade` class and
//! releases its observation. Each watcher fires at most once.
//!
//! # Example
//!
//! ```
//! use lazysrc_core::{DetachedImage, ImageElement, LazyImageLoader, Rect, ViewportObserver};
//!
//! let hero = DetachedImage::with_deferred_source("hero.jpg")
//!     .with_bounds(Rect::new(0.0, 900.0, 320.0, 200.0));
//! let observer = ViewportObserver::new(Rect::new(0.0, 0.0, 320.0, 480.0));
//! let mut loader = LazyImageLoader::with_default_config(observer.clone());
//! loader.register([hero.clone()]).unwrap();
//!
//! observer.flush();
//! assert_eq!(hero.attribute("src"), None);
//!
//! observer.scroll_to(0.0, 600.0);
//! observer.flush();
//! assert_eq!(hero.attribute("src").as_deref(), Some("hero.jpg"));
//! assert!(hero.has_class("fade"));
//! ```

pub mod collections;
mod config;
mod element;
mod error;
mod geometry;
mod loader;
mod viewport;
mod watcher;

pub use config::*;
pub use element::*;
pub use error::*;
pub use geometry::*;
pub use loader::*;
pub use viewport::*;
pub use watcher::*;
