use std::fmt;

use crate::watcher::WatcherId;

/// Rejected [`LazyLoadConfig`](crate::LazyLoadConfig).
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    ThresholdOutOfRange(f64),
    EmptyName(&'static str),
    /// Deferred and live source point at the same attribute.
    SameAttribute(String),
    InvalidRootMargin(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ThresholdOutOfRange(value) => {
                write!(f, "threshold {value} is outside [0, 1]")
            }
            ConfigError::EmptyName(field) => write!(f, "`{field}` must not be empty"),
            ConfigError::SameAttribute(name) => write!(
                f,
                "deferred and live source both use the `{name}` attribute"
            ),
            ConfigError::InvalidRootMargin(input) => {
                write!(f, "invalid root margin {input:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug, PartialEq)]
pub enum LoadError {
    /// Element has no deferred source and the policy is strict.
    MissingDeferredSource {
        watcher: Option<WatcherId>,
        attribute: String,
    },
    /// The host refused an attribute or class mutation.
    Attribute { name: String, message: String },
    /// The visibility primitive could not be set up.
    Observer(String),
    /// The host could not look up elements for a selector.
    Query { selector: String, message: String },
    Config(ConfigError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::MissingDeferredSource {
                watcher: Some(id),
                attribute,
            } => write!(f, "{id}: element has no `{attribute}` attribute"),
            LoadError::MissingDeferredSource {
                watcher: None,
                attribute,
            } => write!(f, "element has no `{attribute}` attribute"),
            LoadError::Attribute { name, message } => {
                write!(f, "failed to update `{name}`: {message}")
            }
            LoadError::Observer(message) => write!(f, "visibility observer failed: {message}"),
            LoadError::Query { selector, message } => {
                write!(f, "cannot query {selector:?}: {message}")
            }
            LoadError::Config(err) => write!(f, "invalid configuration: {err}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for LoadError {
    fn from(err: ConfigError) -> Self {
        LoadError::Config(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn missing_source_names_the_watcher_when_known() {
        let err = LoadError::MissingDeferredSource {
            watcher: Some(WatcherId(3)),
            attribute: "data-lazy".into(),
        };
        assert_eq!(err.to_string(), "watcher#3: element has no `data-lazy` attribute");
    }

    #[test]
    fn config_errors_chain_as_source() {
        let err = LoadError::from(ConfigError::ThresholdOutOfRange(2.0));
        assert_eq!(
            err.to_string(),
            "invalid configuration: threshold 2 is outside [0, 1]"
        );
        assert!(err.source().is_some());
    }
}
