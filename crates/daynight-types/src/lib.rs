//! Shared type definitions for the day/night scheduler.
//!
//! This crate is the single source of truth for the values that cross
//! crate boundaries: the phase enum, voter identifiers, clock edge events,
//! outbound notifications, and the typed results of a vote cast.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifier wrappers for voters and clock subscribers
//! - [`enums`] -- Phase state and transition cause enumerations
//! - [`events`] -- Inbound clock edges and outbound phase notifications
//! - [`vote`] -- Vote outcomes and tallies

pub mod enums;
pub mod events;
pub mod ids;
pub mod vote;

// Re-export all public types at crate root for convenience.
pub use enums::{PhaseState, TransitionCause};
pub use events::{ClockEdge, PhaseNotification};
pub use ids::{SubscriberId, VoterId};
pub use vote::{VoteOutcome, VoteTally};
