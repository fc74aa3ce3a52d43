//! Vote outcomes for the skip-night vote.
//!
//! A rejected vote is not an error: every rejection is a typed reason the
//! caller can report back to the player.

use serde::{Deserialize, Serialize};

/// Running count of a skip-night vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    /// Accepted votes in the current session.
    pub votes: u32,
    /// Votes needed to reach quorum at the time of the last cast.
    pub required: u32,
    /// Whether the cast that produced this tally reached quorum.
    pub quorum_reached: bool,
}

/// Result of a single vote cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VoteOutcome {
    /// The vote was recorded.
    Accepted(VoteTally),
    /// The voter already voted in this session.
    AlreadyVoted,
    /// The voter voted too recently.
    OnCooldown {
        /// Whole seconds until the voter may vote again (rounded up).
        remaining_seconds: u64,
    },
    /// The session's voting window has closed.
    SessionExpired,
    /// Vote-to-skip is switched off in configuration.
    VotingDisabled,
    /// No vote is open because it is not night.
    NoSession,
}

impl VoteOutcome {
    /// Whether the vote was recorded.
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Whether this cast reached quorum.
    pub const fn reached_quorum(&self) -> bool {
        matches!(
            self,
            Self::Accepted(VoteTally {
                quorum_reached: true,
                ..
            })
        )
    }
}
