//! Command names, aliases, and argument parsing.
//!
//! | Command | Aliases | Argument | Required level |
//! |---------|---------|----------|----------------|
//! | `daynight.daylength` | | `[minutes]` | `auth.commands_level` |
//! | `daynight.nightlength` | | `[minutes]` | `auth.commands_level` |
//! | `daynight.status` | `tod` | | |
//! | `daynight.vote` | `voteday` | | |
//! | `daynight.freeze` | | | `auth.freeze_level` |
//! | `daynight.unfreeze` | | | `auth.freeze_level` |
//! | `daynight.day` | | | `auth.commands_level` |
//! | `daynight.night` | | | `auth.commands_level` |
//! | `daynight.help` | `help` | | |
//!
//! Names are case-insensitive and may carry a leading `/` as typed in chat.

use daynight_core::config::AuthConfig;
use daynight_types::PhaseState;

use crate::error::GatewayError;

/// A parsed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Report or change the day length.
    DayLength {
        /// New length in minutes; `None` reports the current value.
        minutes: Option<u32>,
    },
    /// Report or change the night length.
    NightLength {
        /// New length in minutes; `None` reports the current value.
        minutes: Option<u32>,
    },
    /// Show the time of day and settings.
    Status,
    /// Vote to skip the night.
    Vote,
    /// Freeze time at the configured hour.
    Freeze,
    /// Resume time progression.
    Unfreeze,
    /// Force day now.
    ForceDay,
    /// Force night now.
    ForceNight,
    /// List the available commands.
    Help,
}

impl Command {
    /// Parse a command line such as `/daynight.daylength 45`.
    ///
    /// Arguments after the first are ignored.
    pub fn parse(line: &str) -> Result<Self, GatewayError> {
        let mut words = line.split_whitespace();
        let Some(raw_name) = words.next() else {
            return Err(GatewayError::Empty);
        };
        let name = raw_name.trim_start_matches('/').to_ascii_lowercase();
        let arg = words.next();

        let command = match name.as_str() {
            "daynight.daylength" => Self::DayLength {
                minutes: arg.map(|a| parse_length(PhaseState::Day, a)).transpose()?,
            },
            "daynight.nightlength" => Self::NightLength {
                minutes: arg
                    .map(|a| parse_length(PhaseState::Night, a))
                    .transpose()?,
            },
            "tod" | "daynight.status" => Self::Status,
            "voteday" | "daynight.vote" => Self::Vote,
            "daynight.freeze" => Self::Freeze,
            "daynight.unfreeze" => Self::Unfreeze,
            "daynight.day" => Self::ForceDay,
            "daynight.night" => Self::ForceNight,
            "help" | "daynight.help" => Self::Help,
            _ => {
                return Err(GatewayError::UnknownCommand {
                    name: raw_name.to_owned(),
                });
            }
        };
        Ok(command)
    }

    /// Canonical command name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::DayLength { .. } => "daynight.daylength",
            Self::NightLength { .. } => "daynight.nightlength",
            Self::Status => "daynight.status",
            Self::Vote => "daynight.vote",
            Self::Freeze => "daynight.freeze",
            Self::Unfreeze => "daynight.unfreeze",
            Self::ForceDay => "daynight.day",
            Self::ForceNight => "daynight.night",
            Self::Help => "daynight.help",
        }
    }

    /// Minimum player auth level, or `None` if anyone may run it.
    pub const fn required_level(self, auth: &AuthConfig) -> Option<u8> {
        match self {
            Self::DayLength { .. } | Self::NightLength { .. } | Self::ForceDay | Self::ForceNight => {
                Some(auth.commands_level)
            }
            Self::Freeze | Self::Unfreeze => Some(auth.freeze_level),
            Self::Status | Self::Vote | Self::Help => None,
        }
    }
}

/// Parse a phase length. Anything but a whole number of minutes from 1 up
/// is rejected.
fn parse_length(phase: PhaseState, arg: &str) -> Result<u32, GatewayError> {
    arg.parse::<i64>()
        .ok()
        .filter(|minutes| *minutes >= 1)
        .and_then(|minutes| u32::try_from(minutes).ok())
        .ok_or_else(|| GatewayError::InvalidLength {
            phase,
            value: arg.to_owned(),
        })
}

/// One line of help per command.
pub const HELP_LINES: [&str; 9] = [
    "/tod - Show current time and settings",
    "/voteday - Vote to skip the night",
    "daynight.daylength [minutes] - Show or set the day length",
    "daynight.nightlength [minutes] - Show or set the night length",
    "daynight.freeze - Freeze the time of day",
    "daynight.unfreeze - Resume the time of day",
    "daynight.day - Switch to day now",
    "daynight.night - Switch to night now",
    "daynight.help - Show this list",
];
