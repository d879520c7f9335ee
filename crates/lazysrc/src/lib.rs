//! Lazy-load images when they scroll into view.
//!
//! Re-exports [`lazysrc_core`]; enable the `web` feature for the browser
//! backend under [`web`].

pub use lazysrc_core::*;

#[cfg(feature = "web")]
pub use lazysrc_platform_web as web;

pub mod prelude {
    pub use lazysrc_core::{
        ImageElement, LazyImageLoader, LazyLoadConfig, MissingSourcePolicy, VisibilityBackend,
    };

    #[cfg(feature = "web")]
    pub use lazysrc_platform_web::{register_document, WebBackend, WebImage};
}
