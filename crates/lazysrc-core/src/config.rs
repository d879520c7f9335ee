//! Loader configuration.
//!
//! Defaults describe the usual page contract: the real URL waits in
//! `data-lazy`, gets copied into `src` once the image is on screen, and the
//! image receives a `fade` class for the stylesheet to animate.

use std::fmt;

use crate::error::ConfigError;

pub const DEFAULT_SOURCE_ATTRIBUTE: &str = "data-lazy";
pub const DEFAULT_LIVE_ATTRIBUTE: &str = "src";
pub const DEFAULT_FADE_CLASS: &str = "fade";
pub const DEFAULT_SELECTOR: &str = "img";

/// What to do with an element that has no deferred source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingSourcePolicy {
    /// Write an empty live source and still add the fade marker.
    #[default]
    Lenient,
    /// Refuse to register such elements; leave them untouched if the
    /// attribute disappears after registration.
    Strict,
}

/// One side of a root margin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MarginValue {
    Px(f32),
    /// Percentage of the root's width (left/right) or height (top/bottom).
    Percent(f32),
}

impl MarginValue {
    fn parse(token: &str) -> Option<Self> {
        if let Some(px) = token.strip_suffix("px") {
            return px.trim().parse().ok().map(MarginValue::Px);
        }
        if let Some(pct) = token.strip_suffix('%') {
            return pct.trim().parse().ok().map(MarginValue::Percent);
        }
        // A bare zero is the only unitless length CSS accepts.
        match token.parse::<f32>() {
            Ok(value) if value == 0.0 => Some(MarginValue::Px(0.0)),
            _ => None,
        }
    }
}

impl fmt::Display for MarginValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginValue::Px(px) => write!(f, "{px}px"),
            MarginValue::Percent(pct) => write!(f, "{pct}%"),
        }
    }
}

/// Growth applied to the viewport before intersecting, in CSS margin order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootMargin {
    pub top: MarginValue,
    pub right: MarginValue,
    pub bottom: MarginValue,
    pub left: MarginValue,
}

impl RootMargin {
    pub const ZERO: RootMargin = RootMargin::uniform(MarginValue::Px(0.0));

    pub const fn uniform(value: MarginValue) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    /// Parses CSS margin shorthand: one to four `px` or `%` values.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidRootMargin(input.to_string());

        let values = input
            .split_whitespace()
            .map(|token| MarginValue::parse(token).ok_or_else(invalid))
            .collect::<Result<smallvec::SmallVec<[MarginValue; 4]>, _>>()?;

        match values.as_slice() {
            [all] => Ok(Self::uniform(*all)),
            [vertical, horizontal] => Ok(Self {
                top: *vertical,
                right: *horizontal,
                bottom: *vertical,
                left: *horizontal,
            }),
            [top, horizontal, bottom] => Ok(Self {
                top: *top,
                right: *horizontal,
                bottom: *bottom,
                left: *horizontal,
            }),
            [top, right, bottom, left] => Ok(Self {
                top: *top,
                right: *right,
                bottom: *bottom,
                left: *left,
            }),
            _ => Err(invalid()),
        }
    }
}

impl Default for RootMargin {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Always renders the four-value form, which the browser accepts as-is.
impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}

/// Configuration shared by every watcher a loader creates.
#[derive(Clone, Debug, PartialEq)]
pub struct LazyLoadConfig {
    /// Attribute holding the deferred URL.
    pub source_attribute: String,
    /// Attribute the rendering engine fetches from.
    pub live_attribute: String,
    /// Class added once the source has been swapped in.
    pub fade_class: String,
    /// Selector used when scanning a whole document for images.
    pub selector: String,
    /// Minimum visible fraction before the source is applied.
    /// `0.0` fires on any overlap.
    pub threshold: f64,
    pub root_margin: RootMargin,
    pub missing_source: MissingSourcePolicy,
}

impl Default for LazyLoadConfig {
    fn default() -> Self {
        Self {
            source_attribute: DEFAULT_SOURCE_ATTRIBUTE.into(),
            live_attribute: DEFAULT_LIVE_ATTRIBUTE.into(),
            fade_class: DEFAULT_FADE_CLASS.into(),
            selector: DEFAULT_SELECTOR.into(),
            threshold: 0.0,
            root_margin: RootMargin::ZERO,
            missing_source: MissingSourcePolicy::Lenient,
        }
    }
}

impl LazyLoadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_attribute(mut self, name: impl Into<String>) -> Self {
        self.source_attribute = name.into();
        self
    }

    pub fn with_live_attribute(mut self, name: impl Into<String>) -> Self {
        self.live_attribute = name.into();
        self
    }

    pub fn with_fade_class(mut self, class: impl Into<String>) -> Self {
        self.fade_class = class.into();
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_root_margin(mut self, margin: RootMargin) -> Self {
        self.root_margin = margin;
        self
    }

    pub fn with_missing_source(mut self, policy: MissingSourcePolicy) -> Self {
        self.missing_source = policy;
        self
    }

    /// Shorthand for `with_missing_source(MissingSourcePolicy::Strict)`.
    pub fn strict(self) -> Self {
        self.with_missing_source(MissingSourcePolicy::Strict)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.threshold));
        }
        if self.source_attribute.trim().is_empty() {
            return Err(ConfigError::EmptyName("source_attribute"));
        }
        if self.live_attribute.trim().is_empty() {
            return Err(ConfigError::EmptyName("live_attribute"));
        }
        if self.fade_class.trim().is_empty() {
            return Err(ConfigError::EmptyName("fade_class"));
        }
        if self.selector.trim().is_empty() {
            return Err(ConfigError::EmptyName("selector"));
        }
        if self.source_attribute.eq_ignore_ascii_case(&self.live_attribute) {
            return Err(ConfigError::SameAttribute(self.live_attribute.clone()));
        }
        Ok(())
    }

    /// Whether a notification is strong enough to trigger the swap.
    pub(crate) fn is_triggered_by(&self, is_intersecting: bool, ratio: f64) -> bool {
        is_intersecting && ratio >= self.threshold
    }
}
