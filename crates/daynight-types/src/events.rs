//! Events flowing into and out of the scheduler.
//!
//! [`ClockEdge`] values are raised by the external clock and delivered to
//! subscribers. [`PhaseNotification`] values are raised by the scheduler on
//! every transition and are fire-and-forget: nothing acknowledges them.

use serde::{Deserialize, Serialize};

use crate::enums::{PhaseState, TransitionCause};

/// Edge-triggered event emitted by a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockEdge {
    /// The clock crossed sunrise.
    EnteredDay,
    /// The clock crossed sunset.
    EnteredNight,
    /// A whole in-game hour elapsed.
    HourElapsed,
}

/// Outbound notification raised on each phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseNotification {
    /// The world entered day.
    EnteredDay {
        /// What caused the transition.
        cause: TransitionCause,
    },
    /// The world entered night.
    EnteredNight {
        /// What caused the transition.
        cause: TransitionCause,
    },
}

impl PhaseNotification {
    /// Build the notification announcing entry into `phase`.
    pub const fn entered(phase: PhaseState, cause: TransitionCause) -> Self {
        match phase {
            PhaseState::Day => Self::EnteredDay { cause },
            PhaseState::Night => Self::EnteredNight { cause },
        }
    }

    /// The phase that was entered.
    pub const fn phase(self) -> PhaseState {
        match self {
            Self::EnteredDay { .. } => PhaseState::Day,
            Self::EnteredNight { .. } => PhaseState::Night,
        }
    }

    /// The cause carried by the notification.
    pub const fn cause(self) -> TransitionCause {
        match self {
            Self::EnteredDay { cause } | Self::EnteredNight { cause } => cause,
        }
    }
}
