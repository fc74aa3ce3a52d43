//! Standard input command reader.
//!
//! Each line is one command. Lines prefixed with `@<id>[:<level>]` run as
//! that player and add them to the voter roster; anything else runs as
//! the console. `@<id> leave` takes a player off the roster. Commands are
//! shipped to the scheduler task as jobs and the reply is printed once the
//! job has run.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use daynight_core::clock::SimulatedSky;
use daynight_core::runner::SchedulerJob;
use daynight_core::scheduler::{Scheduler, VoterPopulation};
use daynight_gateway::auth::{Caller, Roster};
use daynight_gateway::handlers::{CommandReply, execute_line};
use daynight_types::VoterId;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc::UnboundedSender, oneshot};
use tracing::{debug, info, warn};

/// The roster shared between the reader and queued jobs.
#[derive(Debug, Clone, Default)]
pub struct SharedRoster {
    /// Players present, behind a lock the reader and jobs share.
    inner: Arc<Mutex<Roster>>,
}

impl SharedRoster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a player as present. Returns `true` if they were new.
    pub fn join(&self, id: VoterId) -> bool {
        let Ok(mut roster) = self.inner.lock() else {
            return false;
        };
        roster.join(id)
    }

    /// Remove a player. Returns `true` if they were present.
    pub fn leave(&self, id: VoterId) -> bool {
        let Ok(mut roster) = self.inner.lock() else {
            return false;
        };
        roster.leave(id)
    }
}

impl VoterPopulation for SharedRoster {
    fn eligible_voters(&self) -> u32 {
        self.inner
            .lock()
            .map_or(0, |roster| roster.eligible_voters())
    }
}

/// Wrap one command line as a scheduler job.
///
/// The eligible voter count is read from `roster` when the job runs.
pub fn command_job(
    line: String,
    roster: SharedRoster,
    reply: oneshot::Sender<CommandReply>,
) -> SchedulerJob<SimulatedSky> {
    Box::new(move |scheduler: &mut Scheduler<SimulatedSky>, now: DateTime<Utc>| {
        let (_, outcome) = execute_line(scheduler, &line, now, &roster);
        // The reader may have gone away during shutdown.
        let _ = reply.send(outcome);
    })
}

/// Read commands from stdin until it closes or the scheduler goes away.
///
/// Dropping `jobs` on return closes the job channel, which ends the
/// scheduler loop.
pub async fn read_commands(jobs: UnboundedSender<SchedulerJob<SimulatedSky>>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let roster = SharedRoster::new();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Standard input closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read standard input");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        if let Ok((Caller::Player { id, .. }, rest)) = Caller::split_line(&line) {
            if rest.trim().eq_ignore_ascii_case("leave") {
                let left = roster.leave(id);
                debug!(player = %id, left, "Player left roster");
                print_reply(&CommandReply::ok(format!("Player {id} left.")));
                continue;
            }
            if roster.join(id) {
                debug!(player = %id, "Player joined roster");
            }
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        if jobs.send(command_job(line, roster.clone(), reply_tx)).is_err() {
            info!("Scheduler loop ended, stopping command reader");
            break;
        }
        match reply_rx.await {
            Ok(reply) => print_reply(&reply),
            Err(_) => break,
        }
    }
}

/// Print a reply to standard output.
#[allow(clippy::print_stdout)]
fn print_reply(reply: &CommandReply) {
    let marker = if reply.success { "ok" } else { "error" };
    println!("[{marker}] {}", reply.message);
}
