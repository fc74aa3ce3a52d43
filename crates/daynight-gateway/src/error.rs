//! Error types for the command gateway.
//!
//! Every [`GatewayError`] displays as a message fit to show the caller, so
//! a parse failure turns straight into a failed reply.

use daynight_types::PhaseState;

/// Errors raised while turning a command line into a [`Command`].
///
/// [`Command`]: crate::command::Command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Nothing but whitespace was entered.
    #[error("No command given. Try daynight.help.")]
    Empty,

    /// The command name is not recognised.
    #[error("Unknown command '{name}'. Try daynight.help.")]
    UnknownCommand {
        /// The name as entered.
        name: String,
    },

    /// A length argument is not a whole number of minutes above zero.
    #[error("Invalid {phase} length. Must be a number greater than 0.")]
    InvalidLength {
        /// Which phase length was being set.
        phase: PhaseState,
        /// The rejected argument.
        value: String,
    },

    /// A `@player` prefix could not be read.
    #[error("Invalid caller '{prefix}'. Expected @<id> or @<id>:<auth level>.")]
    InvalidCaller {
        /// The prefix as entered.
        prefix: String,
    },
}
