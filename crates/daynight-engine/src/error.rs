//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can stop the engine before or
//! during the scheduler loop.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration could not be loaded or saved.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: daynight_core::config::ConfigError,
    },

    /// The scheduler could not be started.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: daynight_core::error::SchedulerError,
    },

    /// The log filter from config is not a valid directive.
    #[error("invalid log level '{level}': {message}")]
    LogFilter {
        /// The configured level.
        level: String,
        /// Why it was rejected.
        message: String,
    },
}
