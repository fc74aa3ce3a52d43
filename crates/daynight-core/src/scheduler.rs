//! The scheduler context object.
//!
//! [`Scheduler`] bundles everything one world needs: the phase controller,
//! the clock adapter, the live configuration, and the store it persists
//! to. It is built once at startup and handed to every operation; there
//! is no global state.
//!
//! # Lifecycle
//!
//! ```text
//! new ──► start (subscribe to clock edges) ──► tick / commands ──► shutdown
//!            │                                                       ▲
//!            └── ClockUnavailable: retry later                        │
//!                                                    Drop ────────────┘
//! ```
//!
//! The clock subscription is scoped to the started scheduler. Both
//! [`Scheduler::shutdown`] and `Drop` release it, so no exit path leaves a
//! dangling observer on the host clock.

use chrono::{DateTime, Utc};
use daynight_types::{
    ClockEdge, PhaseNotification, PhaseState, SubscriberId, VoteOutcome, VoteTally, VoterId,
};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::clock::ClockAdapter;
use crate::config::{ConfigStore, ConfigWarning, SchedulerConfig};
use crate::error::SchedulerError;
use crate::phase::{PhaseController, validate_length};
use crate::vote::ceil_seconds;

/// Supplies the number of players eligible to vote, read at call time.
pub trait VoterPopulation {
    /// Players currently eligible to vote.
    fn eligible_voters(&self) -> u32;
}

impl VoterPopulation for u32 {
    fn eligible_voters(&self) -> u32 {
        *self
    }
}

/// A live clock subscription.
#[derive(Debug)]
struct Subscription {
    /// Id handed out by the clock.
    id: SubscriberId,
    /// Receiving half of the edge channel.
    edges: UnboundedReceiver<ClockEdge>,
}

/// Snapshot of the open vote session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteStatus {
    /// Votes against the current population.
    pub tally: VoteTally,
    /// Whole seconds until the session lapses.
    pub remaining_seconds: u64,
    /// Whether the session has already lapsed.
    pub expired: bool,
}

/// Point-in-time view of the scheduler, for status commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStatus {
    /// Current phase.
    pub phase: PhaseState,
    /// Current in-game hour.
    pub hour: f64,
    /// Hour at which day begins.
    pub sunrise_hour: f64,
    /// Hour at which night begins.
    pub sunset_hour: f64,
    /// Configured day length in real minutes.
    pub day_length_minutes: u32,
    /// Configured night length in real minutes.
    pub night_length_minutes: u32,
    /// Whether time is frozen.
    pub frozen: bool,
    /// Whether the scheduler is subscribed to the clock.
    pub started: bool,
    /// The open vote session, if any.
    pub vote: Option<VoteStatus>,
}

/// Owns the phase controller, clock, configuration, and config store.
pub struct Scheduler<C: ClockAdapter> {
    /// Phase state machine.
    controller: PhaseController,
    /// Host clock.
    clock: C,
    /// Live configuration, as last persisted.
    config: SchedulerConfig,
    /// Where configuration changes are saved.
    store: Box<dyn ConfigStore>,
    /// Present while started.
    subscription: Option<Subscription>,
}

impl<C: ClockAdapter> core::fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("phase", &self.controller.phase())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

impl<C: ClockAdapter> Scheduler<C> {
    /// Build a scheduler around an already-loaded configuration.
    pub fn new(config: SchedulerConfig, clock: C, store: Box<dyn ConfigStore>) -> Self {
        Self {
            controller: PhaseController::new(&config),
            clock,
            config,
            store,
            subscription: None,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Subscribe to the clock and settle the starting phase.
    ///
    /// Starting an already started scheduler is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ClockUnavailable`] if the clock is not
    /// ready yet. Nothing is changed and the caller may retry.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        if self.subscription.is_some() {
            return Ok(());
        }
        if !self.clock.is_ready() {
            return Err(SchedulerError::ClockUnavailable);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.clock.subscribe(tx);
        self.subscription = Some(Subscription { id, edges: rx });
        self.clock.sync(now);
        self.controller.start(now, &mut self.clock);

        if self.config.freeze.on_load {
            self.controller
                .freeze(self.config.freeze.hour, now, &mut self.clock);
        }

        info!(
            phase = %self.controller.phase(),
            hour = self.clock.current_hour(),
            subscriber = %id,
            frozen = self.controller.is_frozen(),
            "Scheduler started"
        );
        Ok(())
    }

    /// Release the clock subscription. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.clock.unsubscribe(subscription.id);
            info!(subscriber = %subscription.id, "Scheduler stopped");
        }
    }

    /// Whether the scheduler holds a clock subscription.
    pub const fn is_started(&self) -> bool {
        self.subscription.is_some()
    }

    /// Reload configuration from the store and apply it.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Config`] if the store cannot be read.
    pub fn reload(&mut self) -> Result<Vec<ConfigWarning>, SchedulerError> {
        let loaded = self.store.load()?;
        for warning in &loaded.warnings {
            warn!(%warning, "Config warning on reload");
        }
        self.config = loaded.config;
        self.controller.apply_config(&self.config, &mut self.clock);
        info!("Configuration reloaded");
        Ok(loaded.warnings)
    }

    // -----------------------------------------------------------------------
    // Clock edges
    // -----------------------------------------------------------------------

    /// Handle every clock edge queued since the last call.
    ///
    /// Returns the number of phase transitions the edges caused.
    pub fn pump_clock_edges(&mut self, now: DateTime<Utc>) -> usize {
        let mut edges = Vec::new();
        if let Some(subscription) = self.subscription.as_mut() {
            while let Ok(edge) = subscription.edges.try_recv() {
                edges.push(edge);
            }
        }
        edges
            .into_iter()
            .filter(|edge| self.handle_edge(*edge, now))
            .count()
    }

    /// Route one clock edge to the controller.
    ///
    /// Sunrise and sunset edges are ignored once the clock no longer
    /// agrees with them. That happens when the controller jumped the clock
    /// after the edge was queued.
    pub fn handle_edge(&mut self, edge: ClockEdge, now: DateTime<Utc>) -> bool {
        let daytime = self.clock.is_daytime();
        debug!(edge = ?edge, hour = self.clock.current_hour(), "Clock edge");
        match edge {
            ClockEdge::EnteredDay if daytime => {
                self.controller.on_clock_entered_day(now, &mut self.clock)
            }
            ClockEdge::EnteredNight if !daytime => {
                self.controller.on_clock_entered_night(now, &mut self.clock)
            }
            ClockEdge::HourElapsed => self.controller.on_clock_hour(now, &mut self.clock),
            ClockEdge::EnteredDay | ClockEdge::EnteredNight => {
                debug!(edge = ?edge, "Stale clock edge ignored");
                false
            }
        }
    }

    /// Wait for the next clock edge.
    ///
    /// Never resolves while the scheduler is stopped.
    pub async fn next_edge(&mut self) -> Option<ClockEdge> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.edges.recv().await,
            None => std::future::pending().await,
        }
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Let the clock catch up, handle its edges, then time the phase.
    ///
    /// Returns the number of transitions this tick caused.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotStarted`] before [`start`](Self::start).
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<usize, SchedulerError> {
        self.require_started()?;
        self.clock.sync(now);
        let mut transitions = self.pump_clock_edges(now);
        if self.controller.tick(now, &mut self.clock) {
            transitions = transitions.saturating_add(1);
        }
        Ok(transitions)
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Cast a skip-night vote for `voter`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotStarted`] before [`start`](Self::start).
    pub fn cast_vote(
        &mut self,
        voter: VoterId,
        now: DateTime<Utc>,
        population: &dyn VoterPopulation,
    ) -> Result<VoteOutcome, SchedulerError> {
        self.require_started()?;
        self.pump_clock_edges(now);
        let eligible = population.eligible_voters();
        Ok(self
            .controller
            .cast_vote(voter, now, eligible, &mut self.clock))
    }

    /// Change and persist the day length.
    ///
    /// Nothing changes unless the new length is saved.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Validation`] for a zero length, or
    /// [`SchedulerError::Config`] if the change cannot be saved.
    pub fn set_day_length(&mut self, minutes: u32) -> Result<(), SchedulerError> {
        self.set_length(PhaseState::Day, minutes)?;
        info!(minutes, "Day length changed");
        Ok(())
    }

    /// Change and persist the night length.
    ///
    /// Nothing changes unless the new length is saved.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Validation`] for a zero length, or
    /// [`SchedulerError::Config`] if the change cannot be saved.
    pub fn set_night_length(&mut self, minutes: u32) -> Result<(), SchedulerError> {
        self.set_length(PhaseState::Night, minutes)?;
        info!(minutes, "Night length changed");
        Ok(())
    }

    /// Force `phase` now. Returns `false` if it is already active.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotStarted`] before [`start`](Self::start).
    pub fn force_phase(
        &mut self,
        phase: PhaseState,
        now: DateTime<Utc>,
    ) -> Result<bool, SchedulerError> {
        self.require_started()?;
        self.pump_clock_edges(now);
        Ok(self.controller.force(phase, now, &mut self.clock))
    }

    /// Freeze time at the configured freeze hour. The phase follows the
    /// pinned hour.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotStarted`] before [`start`](Self::start).
    pub fn freeze(&mut self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        self.require_started()?;
        self.pump_clock_edges(now);
        self.controller
            .freeze(self.config.freeze.hour, now, &mut self.clock);
        Ok(())
    }

    /// Resume time progression.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotStarted`] before [`start`](Self::start).
    pub fn unfreeze(&mut self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        self.require_started()?;
        // Catch the sky up while still frozen so the frozen span is not
        // replayed as progression.
        self.clock.sync(now);
        self.controller.unfreeze(now, &mut self.clock);
        Ok(())
    }

    /// Snapshot the scheduler for display.
    pub fn status(&self, now: DateTime<Utc>, population: &dyn VoterPopulation) -> SchedulerStatus {
        let eligible = population.eligible_voters();
        let vote = self.controller.session().and_then(|session| {
            self.controller.votes().tally(eligible).map(|tally| VoteStatus {
                tally,
                remaining_seconds: ceil_seconds(session.remaining(now)),
                expired: session.is_expired(now),
            })
        });
        SchedulerStatus {
            phase: self.controller.phase(),
            hour: self.clock.current_hour(),
            sunrise_hour: self.clock.sunrise_hour(),
            sunset_hour: self.clock.sunset_hour(),
            day_length_minutes: self.controller.length_of(PhaseState::Day),
            night_length_minutes: self.controller.length_of(PhaseState::Night),
            frozen: self.controller.is_frozen(),
            started: self.is_started(),
            vote,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Take every notification raised since the last drain.
    pub fn drain_notifications(&mut self) -> Vec<PhaseNotification> {
        self.controller.drain_notifications()
    }

    /// Current phase.
    pub const fn phase(&self) -> PhaseState {
        self.controller.phase()
    }

    /// Live configuration.
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The phase controller.
    pub const fn controller(&self) -> &PhaseController {
        &self.controller
    }

    /// The host clock.
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Mutable access to the host clock, for hosts and tests that drive it.
    pub const fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    const fn require_started(&self) -> Result<(), SchedulerError> {
        if self.subscription.is_none() {
            return Err(SchedulerError::NotStarted);
        }
        Ok(())
    }

    /// Validate, save, then apply a phase length.
    fn set_length(&mut self, phase: PhaseState, minutes: u32) -> Result<(), SchedulerError> {
        validate_length(phase, minutes)?;
        let mut candidate = self.config.clone();
        match phase {
            PhaseState::Day => candidate.phase.day_length_minutes = minutes,
            PhaseState::Night => candidate.phase.night_length_minutes = minutes,
        }
        self.store.save(&candidate)?;

        match phase {
            PhaseState::Day => self.controller.set_day_length(minutes, &mut self.clock)?,
            PhaseState::Night => self.controller.set_night_length(minutes, &mut self.clock)?,
        }
        self.config = candidate;
        Ok(())
    }
}

impl<C: ClockAdapter> Drop for Scheduler<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeDelta, TimeZone};
    use daynight_types::TransitionCause;

    use super::*;
    use crate::clock::SimulatedSky;
    use crate::config::{ConfigError, LoadedConfig, MemoryStore};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + TimeDelta::try_seconds(secs).unwrap()
    }

    fn scheduler(sky: SimulatedSky) -> Scheduler<SimulatedSky> {
        let mut config = SchedulerConfig::default();
        config.phase.day_length_minutes = 1;
        config.phase.night_length_minutes = 1;
        Scheduler::new(config, sky, Box::new(MemoryStore::default()))
    }

    #[test]
    fn start_waits_for_the_clock() {
        let mut sky = SimulatedSky::default();
        sky.set_ready(false);
        let mut sched = scheduler(sky);
        assert!(matches!(
            sched.start(t(0)),
            Err(SchedulerError::ClockUnavailable)
        ));
        assert!(!sched.is_started());
        assert_eq!(sched.clock().subscriber_count(), 0);

        sched.clock_mut().set_ready(true);
        sched.start(t(1)).unwrap();
        assert!(sched.is_started());
        assert_eq!(sched.clock().subscriber_count(), 1);
    }

    #[test]
    fn shutdown_releases_the_subscription() {
        let mut sched = scheduler(SimulatedSky::default());
        sched.start(t(0)).unwrap();
        sched.start(t(0)).unwrap();
        assert_eq!(sched.clock().subscriber_count(), 1);
        sched.shutdown();
        sched.shutdown();
        assert_eq!(sched.clock().subscriber_count(), 0);
        assert!(matches!(sched.tick(t(1)), Err(SchedulerError::NotStarted)));
    }

    #[test]
    fn commands_need_a_started_scheduler() {
        let mut sched = scheduler(SimulatedSky::default());
        assert!(sched.cast_vote(VoterId::new(1), t(0), &4_u32).is_err());
        assert!(sched.force_phase(PhaseState::Night, t(0)).is_err());
        assert!(sched.freeze(t(0)).is_err());
    }

    #[test]
    fn clock_edges_drive_transitions() {
        let mut sched = scheduler(SimulatedSky::new(17.0, 6.0, 18.0));
        sched.start(t(0)).unwrap();
        sched.clock_mut().advance_hours(1.5);
        assert_eq!(sched.pump_clock_edges(t(1)), 1);
        assert_eq!(sched.phase(), PhaseState::Night);
        assert_eq!(
            sched.drain_notifications(),
            vec![PhaseNotification::entered(
                PhaseState::Night,
                TransitionCause::ClockEdge
            )]
        );
    }

    #[test]
    fn stale_edges_are_ignored() {
        let mut sched = scheduler(SimulatedSky::new(12.0, 6.0, 18.0));
        sched.start(t(0)).unwrap();
        assert!(!sched.handle_edge(ClockEdge::EnteredNight, t(1)));
        assert_eq!(sched.phase(), PhaseState::Day);
    }

    #[test]
    fn tick_counts_one_transition_for_edge_and_timer_together() {
        // Day lasts one minute from sunrise; just over a minute of sync
        // carries the sky past sunset and the timer past its length in
        // the same tick.
        let mut sched = scheduler(SimulatedSky::new(6.0, 6.0, 18.0));
        sched.start(t(0)).unwrap();
        assert_eq!(sched.tick(t(30)).unwrap(), 0);
        assert_eq!(sched.tick(t(61)).unwrap(), 1);
        assert_eq!(sched.phase(), PhaseState::Night);
        assert_eq!(sched.drain_notifications().len(), 1);
    }

    #[test]
    fn length_changes_are_persisted() {
        let mut sched = scheduler(SimulatedSky::default());
        sched.set_day_length(45).unwrap();
        assert_eq!(sched.config().phase.day_length_minutes, 45);
        assert_eq!(sched.status(t(0), &0_u32).day_length_minutes, 45);

        let err = sched.set_night_length(0).unwrap_err();
        assert!(matches!(err, SchedulerError::Validation { .. }));
        assert_eq!(sched.config().phase.night_length_minutes, 1);
    }

    /// A store whose disk is always full.
    #[derive(Debug)]
    struct FullDisk;

    impl ConfigStore for FullDisk {
        fn load(&mut self) -> Result<LoadedConfig, ConfigError> {
            Ok(LoadedConfig {
                config: SchedulerConfig::default(),
                warnings: Vec::new(),
            })
        }

        fn save(&mut self, _config: &SchedulerConfig) -> Result<(), ConfigError> {
            Err(std::io::Error::other("disk full").into())
        }
    }

    #[test]
    fn unsaved_length_changes_are_not_applied() {
        let mut sched = Scheduler::new(
            SchedulerConfig::default(),
            SimulatedSky::new(12.0, 6.0, 18.0),
            Box::new(FullDisk),
        );
        sched.start(t(0)).unwrap();
        let cycle_before = sched.clock().cycle_minutes();

        let err = sched.set_day_length(5).unwrap_err();
        assert!(matches!(err, SchedulerError::Config { .. }));
        assert_eq!(sched.controller().length_of(PhaseState::Day), 30);
        assert_eq!(sched.config().phase.day_length_minutes, 30);
        assert!((sched.clock().cycle_minutes() - cycle_before).abs() < 1e-9);

        assert!(sched.set_night_length(5).is_err());
        assert_eq!(sched.controller().length_of(PhaseState::Night), 30);
    }

    #[test]
    fn reload_picks_up_stored_changes() {
        let store = MemoryStore::with_document(
            "schema_version: 3\nphase:\n  day_length_minutes: 7\n  night_length_minutes: 9\n",
        );
        let mut sched = Scheduler::new(
            SchedulerConfig::default(),
            SimulatedSky::default(),
            Box::new(store),
        );
        sched.start(t(0)).unwrap();
        let warnings = sched.reload().unwrap();
        assert!(warnings.is_empty());
        assert_eq!(sched.controller().length_of(PhaseState::Day), 7);
        assert_eq!(sched.config().phase.night_length_minutes, 9);
        // 7 minutes over a 12 hour day.
        assert!((sched.clock().cycle_minutes() - 14.0).abs() < 1e-9);
    }

    #[test]
    fn freeze_on_load_pins_the_sky() {
        let mut config = SchedulerConfig::default();
        config.freeze.on_load = true;
        config.freeze.hour = 9.0;
        let mut sched = Scheduler::new(
            config,
            SimulatedSky::new(20.0, 6.0, 18.0),
            Box::new(MemoryStore::default()),
        );
        sched.start(t(0)).unwrap();
        let status = sched.status(t(0), &0_u32);
        assert!(status.frozen);
        assert!((status.hour - 9.0).abs() < 1e-9);
        assert_eq!(status.phase, PhaseState::Day);
        assert!(status.vote.is_none());
        assert_eq!(
            sched.cast_vote(VoterId::new(1), t(1), &1_u32).unwrap(),
            VoteOutcome::NoSession
        );
        assert!(!sched.clock().is_progressing());

        sched.unfreeze(t(60)).unwrap();
        assert!(sched.clock().is_progressing());
        assert!((sched.clock().current_hour() - 9.0).abs() < 1e-9);
    }

    #[test]
    fn status_reports_the_open_session() {
        let mut sched = scheduler(SimulatedSky::new(0.0, 6.0, 18.0));
        sched.start(t(0)).unwrap();
        sched.cast_vote(VoterId::new(3), t(10), &10_u32).unwrap();

        let status = sched.status(t(10), &10_u32);
        assert_eq!(status.phase, PhaseState::Night);
        let vote = status.vote.unwrap();
        assert_eq!(vote.tally.votes, 1);
        assert_eq!(vote.tally.required, 5);
        assert_eq!(vote.remaining_seconds, 110);
        assert!(!vote.expired);

        // Rounded up, as cooldowns are.
        let later = t(10) + TimeDelta::try_milliseconds(500).unwrap();
        let vote = sched.status(later, &10_u32).vote.unwrap();
        assert_eq!(vote.remaining_seconds, 110);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["phase"], "night");
        assert_eq!(json["vote"]["tally"]["votes"], 1);
    }

    #[test]
    fn shutdown_leaves_other_subscribers_alone() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut sky = SimulatedSky::default();
        let other = sky.subscribe(tx);
        let mut sched = scheduler(sky);
        sched.start(t(0)).unwrap();
        assert_eq!(sched.clock().subscriber_count(), 2);
        sched.shutdown();
        assert_eq!(sched.clock().subscriber_count(), 1);
        sched.clock_mut().unsubscribe(other);
        assert_eq!(sched.clock().subscriber_count(), 0);
    }
}
