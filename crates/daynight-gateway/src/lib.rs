//! Command gateway for the day/night scheduler.
//!
//! Turns raw command lines from the console or from players into
//! scheduler operations and user-facing replies.
//!
//! # Modules
//!
//! - [`command`] -- Command names, aliases, and argument parsing.
//! - [`auth`] -- [`Caller`] identity, auth levels, and the voter [`Roster`].
//! - [`handlers`] -- [`execute`] and [`CommandReply`].
//! - [`error`] -- [`GatewayError`], displayed to callers as-is.
//!
//! [`Caller`]: auth::Caller
//! [`Roster`]: auth::Roster
//! [`execute`]: handlers::execute
//! [`CommandReply`]: handlers::CommandReply
//! [`GatewayError`]: error::GatewayError

pub mod auth;
pub mod command;
pub mod error;
pub mod handlers;
