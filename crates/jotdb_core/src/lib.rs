//! Embeddable JSON flat-file record store.
//! Collections are directories, resources are JSON files inside them.

pub mod logging;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use store::{Driver, DriverOptions, IoOp, NameKind, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
