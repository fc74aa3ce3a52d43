//! Enumeration types for the day/night cycle.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// One of the two mutually exclusive cycle states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    /// Sun is up; the cycle starts here.
    #[default]
    Day,
    /// Sun is down; skip-night voting may be open.
    Night,
}

impl PhaseState {
    /// Return the phase that follows this one.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Day => Self::Night,
            Self::Night => Self::Day,
        }
    }
}

impl core::fmt::Display for PhaseState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Day => f.write_str("day"),
            Self::Night => f.write_str("night"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transition cause
// ---------------------------------------------------------------------------

/// Why a phase transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// The external clock crossed sunrise or sunset.
    ClockEdge,
    /// Hourly reconciliation found the clock and the controller disagreeing.
    Reconciled,
    /// The configured phase length elapsed on tick.
    PhaseElapsed,
    /// The previous phase is configured to be skipped.
    AutoSkip,
    /// Enough players voted to skip the night.
    VoteQuorum,
    /// An operator forced the transition.
    Manual,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_flips_phase() {
        assert_eq!(PhaseState::Day.opposite(), PhaseState::Night);
        assert_eq!(PhaseState::Night.opposite(), PhaseState::Day);
    }

    #[test]
    fn initial_phase_is_day() {
        assert_eq!(PhaseState::default(), PhaseState::Day);
    }
}
