//! Day/night phase scheduling with skip-night voting.
//!
//! This crate owns the day/night state machine and everything it needs to
//! run against a host clock: phase timing, auto-skip policy, vote sessions,
//! versioned configuration, and the async driver loop.
//!
//! # Modules
//!
//! - [`clock`] -- [`ClockAdapter`] seam to the host's time of day, plus the
//!   deterministic [`SimulatedSky`].
//! - [`config`] -- `daynight-config.yaml` loading, clamping, and the
//!   [`ConfigStore`] persistence trait.
//! - [`migrate`] -- Schema upgrades for older config files.
//! - [`phase`] -- [`PhaseController`], the day/night state machine.
//! - [`vote`] -- Vote sessions, cooldowns, and quorum math.
//! - [`scheduler`] -- [`Scheduler`], the context object tying it together.
//! - [`runner`] -- [`run_scheduler`], the single task that owns a scheduler.
//! - [`error`] -- [`SchedulerError`].
//!
//! [`ClockAdapter`]: clock::ClockAdapter
//! [`SimulatedSky`]: clock::SimulatedSky
//! [`ConfigStore`]: config::ConfigStore
//! [`PhaseController`]: phase::PhaseController
//! [`Scheduler`]: scheduler::Scheduler
//! [`run_scheduler`]: runner::run_scheduler
//! [`SchedulerError`]: error::SchedulerError

pub mod clock;
pub mod config;
pub mod error;
pub mod migrate;
pub mod phase;
pub mod runner;
pub mod scheduler;
pub mod vote;
