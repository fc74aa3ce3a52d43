//! Callers, authorization, and the voter roster.
//!
//! The server console is always authorized. Players carry an auth level
//! (0 = player, 1 = moderator, 2 = owner) that must reach the level a
//! command requires.

use std::collections::BTreeSet;

use daynight_core::scheduler::VoterPopulation;
use daynight_types::VoterId;

use crate::error::GatewayError;

/// Who issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// The server console or an RCON session.
    Console,
    /// A connected player.
    Player {
        /// The player's id.
        id: VoterId,
        /// The player's auth level.
        auth_level: u8,
    },
}

impl Caller {
    /// The voter id, for players.
    pub const fn voter(self) -> Option<VoterId> {
        match self {
            Self::Console => None,
            Self::Player { id, .. } => Some(id),
        }
    }

    /// Whether this caller may run a command needing `required`.
    pub const fn is_authorized(self, required: Option<u8>) -> bool {
        match (self, required) {
            (Self::Console, _) | (_, None) => true,
            (Self::Player { auth_level, .. }, Some(level)) => auth_level >= level,
        }
    }

    /// Split an optional `@<id>[:<level>]` prefix off a command line.
    ///
    /// Lines without the prefix come from the console.
    pub fn split_line(line: &str) -> Result<(Self, &str), GatewayError> {
        let line = line.trim_start();
        let Some(rest) = line.strip_prefix('@') else {
            return Ok((Self::Console, line));
        };
        let (prefix, command) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let invalid = || GatewayError::InvalidCaller {
            prefix: format!("@{prefix}"),
        };

        let (id, level) = match prefix.split_once(':') {
            Some((id, level)) => (id, level.parse::<u8>().ok().ok_or_else(invalid)?),
            None => (prefix, 0),
        };
        let id = id.parse::<VoterId>().ok().ok_or_else(invalid)?;
        Ok((
            Self::Player {
                id,
                auth_level: level,
            },
            command.trim_start(),
        ))
    }
}

/// Players seen since startup, counted as eligible voters.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    /// Known players.
    players: BTreeSet<VoterId>,
}

impl Roster {
    /// Create an empty roster.
    pub const fn new() -> Self {
        Self {
            players: BTreeSet::new(),
        }
    }

    /// Record a player as present. Returns `true` if they were new.
    pub fn join(&mut self, id: VoterId) -> bool {
        self.players.insert(id)
    }

    /// Remove a player. Returns `true` if they were present.
    pub fn leave(&mut self, id: VoterId) -> bool {
        self.players.remove(&id)
    }

    /// Number of players present.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether nobody is present.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl VoterPopulation for Roster {
    fn eligible_voters(&self) -> u32 {
        u32::try_from(self.players.len()).unwrap_or(u32::MAX)
    }
}
