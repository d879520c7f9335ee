//! Testing utilities and harness for lazysrc

pub mod matcher;
pub mod test_rule;

pub use matcher::*;
pub use test_rule::*;

/// Installs `env_logger` once when the `logging` feature is on.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::builder().is_test(true).try_init();
    }
}
