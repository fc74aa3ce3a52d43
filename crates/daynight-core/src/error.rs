//! Error types for scheduler operations.
//!
//! Vote rejections are not errors; they are [`VoteOutcome`] values. What
//! remains here is a bad argument, an unavailable clock, or a failure to
//! persist configuration. None of them is fatal to the host.
//!
//! [`VoteOutcome`]: daynight_types::VoteOutcome

use crate::config::ConfigError;

/// Errors returned by phase and scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A command argument failed validation.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// The argument that was rejected.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The host clock is not ready yet; retry later.
    #[error("clock is not available yet")]
    ClockUnavailable,

    /// The operation needs a started scheduler.
    #[error("scheduler has not been started")]
    NotStarted,

    /// Configuration could not be persisted.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },
}
