use lazysrc_core::{DetachedImage, ImageElement, DEFAULT_FADE_CLASS, DEFAULT_LIVE_ATTRIBUTE};

pub struct ImageMatcher {
    description: String,
    matcher: Box<dyn Fn(&DetachedImage) -> bool>,
}

impl ImageMatcher {
    pub fn new(
        description: impl Into<String>,
        matcher: impl Fn(&DetachedImage) -> bool + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            matcher: Box::new(matcher),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn matches(&self, image: &DetachedImage) -> bool {
        (self.matcher)(image)
    }

    pub fn and(self, other: ImageMatcher) -> ImageMatcher {
        let description = format!("{} && {}", self.description, other.description);
        ImageMatcher::new(description, move |image| {
            self.matches(image) && other.matches(image)
        })
    }
}

pub fn has_attribute(name: impl Into<String>, value: impl Into<String>) -> ImageMatcher {
    let name = name.into();
    let value = value.into();
    ImageMatcher::new(format!("has_attribute({name:?}, {value:?})"), move |image| {
        image.attribute(&name).as_deref() == Some(value.as_str())
    })
}

pub fn has_deferred_source(url: impl Into<String>) -> ImageMatcher {
    has_attribute(lazysrc_core::DEFAULT_SOURCE_ATTRIBUTE, url)
}

/// The live `src` attribute has been written, whatever its value.
pub fn is_loaded() -> ImageMatcher {
    ImageMatcher::new("is_loaded()", |image| {
        image.attribute(DEFAULT_LIVE_ATTRIBUTE).is_some()
    })
}

pub fn has_class(class: impl Into<String>) -> ImageMatcher {
    let class = class.into();
    ImageMatcher::new(format!("has_class({class:?})"), move |image| {
        image.has_class(&class)
    })
}

pub fn is_faded() -> ImageMatcher {
    has_class(DEFAULT_FADE_CLASS)
}
