//! Command execution against a [`Scheduler`].
//!
//! Handlers never fail: every outcome, including bad input and missing
//! permissions, becomes a [`CommandReply`] for the caller.

use chrono::{DateTime, Utc};
use daynight_core::clock::ClockAdapter;
use daynight_core::error::SchedulerError;
use daynight_core::scheduler::{Scheduler, SchedulerStatus, VoterPopulation};
use daynight_types::{PhaseState, VoteOutcome};
use serde::Serialize;
use tracing::{debug, info};

use crate::auth::Caller;
use crate::command::{Command, HELP_LINES};

/// Shown to callers below the required auth level.
pub const NO_PERMISSION: &str = "You do not have permission to use this command.";

/// Shown while the scheduler waits for the clock.
pub const NOT_RUNNING: &str = "The day/night scheduler is not running yet.";

/// The result of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReply {
    /// Whether the command did what was asked.
    pub success: bool,
    /// Text for the caller. May span several lines.
    pub message: String,
}

impl CommandReply {
    /// A successful reply.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// A failed reply.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Parse and execute one raw line, with an optional `@player` prefix.
pub fn execute_line<C: ClockAdapter>(
    scheduler: &mut Scheduler<C>,
    line: &str,
    now: DateTime<Utc>,
    population: &dyn VoterPopulation,
) -> (Caller, CommandReply) {
    let (caller, rest) = match Caller::split_line(line) {
        Ok(split) => split,
        Err(e) => return (Caller::Console, CommandReply::fail(e.to_string())),
    };
    let reply = match Command::parse(rest) {
        Ok(command) => execute(scheduler, caller, command, now, population),
        Err(e) => {
            debug!(error = %e, "Command rejected");
            CommandReply::fail(e.to_string())
        }
    };
    (caller, reply)
}

/// Execute a parsed command on behalf of `caller`.
pub fn execute<C: ClockAdapter>(
    scheduler: &mut Scheduler<C>,
    caller: Caller,
    command: Command,
    now: DateTime<Utc>,
    population: &dyn VoterPopulation,
) -> CommandReply {
    if !caller.is_authorized(command.required_level(&scheduler.config().auth)) {
        info!(command = command.name(), caller = ?caller, "Command denied");
        return CommandReply::fail(NO_PERMISSION);
    }
    if command != Command::Help && !scheduler.is_started() {
        return CommandReply::fail(NOT_RUNNING);
    }

    debug!(command = command.name(), caller = ?caller, "Executing command");
    match command {
        Command::DayLength { minutes } => set_length(scheduler, PhaseState::Day, minutes),
        Command::NightLength { minutes } => set_length(scheduler, PhaseState::Night, minutes),
        Command::Status => CommandReply::ok(format_status(&scheduler.status(now, population))),
        Command::Vote => vote(scheduler, caller, now, population),
        Command::Freeze => scheduler.freeze(now).map_or_else(
            |e| CommandReply::fail(e.to_string()),
            |()| CommandReply::ok("The game time has been frozen."),
        ),
        Command::Unfreeze => scheduler.unfreeze(now).map_or_else(
            |e| CommandReply::fail(e.to_string()),
            |()| CommandReply::ok("The game time has been unfrozen."),
        ),
        Command::ForceDay => force(scheduler, PhaseState::Day, now),
        Command::ForceNight => force(scheduler, PhaseState::Night, now),
        Command::Help => {
            let mut lines = vec!["-------- Available Commands --------"];
            lines.extend(HELP_LINES);
            CommandReply::ok(lines.join("\n"))
        }
    }
}

/// Report or change a phase length.
fn set_length<C: ClockAdapter>(
    scheduler: &mut Scheduler<C>,
    phase: PhaseState,
    minutes: Option<u32>,
) -> CommandReply {
    let (key, label) = match phase {
        PhaseState::Day => ("dayLength", "Day"),
        PhaseState::Night => ("nightLength", "Night"),
    };
    let Some(minutes) = minutes else {
        let current = scheduler.controller().length_of(phase);
        return CommandReply::ok(format!("Current '{key}' is {current}"));
    };

    let result = match phase {
        PhaseState::Day => scheduler.set_day_length(minutes),
        PhaseState::Night => scheduler.set_night_length(minutes),
    };
    match result {
        Ok(()) => CommandReply::ok(format!("{label} length set to {minutes} minutes.")),
        Err(SchedulerError::Validation { .. }) => CommandReply::fail(format!(
            "Invalid {phase} length. Must be a number greater than 0."
        )),
        Err(e) => CommandReply::fail(format!("{label} length could not be saved: {e}")),
    }
}

/// Cast a skip-night vote for a player.
fn vote<C: ClockAdapter>(
    scheduler: &mut Scheduler<C>,
    caller: Caller,
    now: DateTime<Utc>,
    population: &dyn VoterPopulation,
) -> CommandReply {
    let Some(voter) = caller.voter() else {
        return CommandReply::fail("Only players can vote to skip the night.");
    };
    let outcome = match scheduler.cast_vote(voter, now, population) {
        Ok(outcome) => outcome,
        Err(e) => return CommandReply::fail(e.to_string()),
    };
    match outcome {
        VoteOutcome::Accepted(tally) if tally.quorum_reached => CommandReply::ok(format!(
            "Vote counted ({}/{}). The night has been skipped.",
            tally.votes, tally.required
        )),
        VoteOutcome::Accepted(tally) => CommandReply::ok(format!(
            "Vote counted ({}/{} needed to skip the night).",
            tally.votes, tally.required
        )),
        VoteOutcome::AlreadyVoted => CommandReply::fail("You have already voted this night."),
        VoteOutcome::OnCooldown { remaining_seconds } => CommandReply::fail(format!(
            "You must wait {remaining_seconds} seconds before voting again."
        )),
        VoteOutcome::SessionExpired => {
            CommandReply::fail("Voting for this night has closed.")
        }
        VoteOutcome::VotingDisabled => CommandReply::fail("Voting to skip the night is disabled."),
        VoteOutcome::NoSession => CommandReply::fail("There is no night to skip right now."),
    }
}

/// Force a phase, reporting when it is already active.
fn force<C: ClockAdapter>(
    scheduler: &mut Scheduler<C>,
    phase: PhaseState,
    now: DateTime<Utc>,
) -> CommandReply {
    match scheduler.force_phase(phase, now) {
        Ok(true) => CommandReply::ok(match phase {
            PhaseState::Day => "Day has begun.",
            PhaseState::Night => "Night has begun.",
        }),
        Ok(false) => CommandReply::fail(match phase {
            PhaseState::Day => "Day is already active.",
            PhaseState::Night => "Night is already active.",
        }),
        Err(e) => CommandReply::fail(e.to_string()),
    }
}

/// Render the time-of-day report.
pub fn format_status(status: &SchedulerStatus) -> String {
    let mut lines = vec![
        "-------- Time Of Day Settings --------".to_owned(),
        format!("Current Time: {:.2} hours", status.hour),
        format!("Sunrise Hour: {}", clock_face(status.sunrise_hour)),
        format!("Sunset Hour: {}", clock_face(status.sunset_hour)),
        format!("Day Length: {} minutes", status.day_length_minutes),
        format!("Night Length: {} minutes", status.night_length_minutes),
        format!(
            "Phase: {}{}",
            status.phase,
            if status.frozen { " (frozen)" } else { "" }
        ),
    ];
    if let Some(vote) = status.vote {
        lines.push(if vote.expired {
            format!(
                "Skip-night vote: {}/{} (closed)",
                vote.tally.votes, vote.tally.required
            )
        } else {
            format!(
                "Skip-night vote: {}/{} ({}s left)",
                vote.tally.votes, vote.tally.required, vote.remaining_seconds
            )
        });
    }
    lines.join("\n")
}

/// Format a fractional hour as `H:MM`.
fn clock_face(hour: f64) -> String {
    let total = whole_minutes(hour);
    format!("{}:{:02}", total / 60, total % 60)
}

/// Minutes since midnight, rounded.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_minutes(hour: f64) -> u32 {
    (hour * 60.0).round().clamp(0.0, 1439.0) as u32
}
