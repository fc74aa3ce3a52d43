//! Phase controller: owns the day/night state machine.
//!
//! The controller decides every transition. Inputs arrive from four
//! directions and all funnel into the same two edge-guarded entry points,
//! [`enter_day`](PhaseController::enter_day) and
//! [`enter_night`](PhaseController::enter_night):
//!
//! - clock edges (sunrise/sunset) and hourly reconciliation,
//! - [`tick`](PhaseController::tick), the polling point that times phases,
//! - vote quorum,
//! - operator overrides.
//!
//! # State Machine
//!
//! ```text
//!          length elapsed | auto-skip day | override
//!   Day  ------------------------------------------->  Night
//!        <-------------------------------------------
//!   length elapsed | auto-skip night | quorum | override
//! ```
//!
//! Entering a phase that is already active is a no-op, so a clock edge
//! that fires after the controller already moved is harmless.
//!
//! Whenever the controller moves on its own (tick, quorum, auto-skip,
//! override) it also jumps the clock to the matching boundary hour so the
//! sky agrees with the phase. A frozen sky is the exception: it keeps its
//! pinned hour, and freezing pulls the phase over to match that hour.

use chrono::{DateTime, TimeDelta, Utc};
use daynight_types::{PhaseNotification, PhaseState, TransitionCause, VoteOutcome, VoterId};
use tracing::{debug, info, warn};

use crate::clock::{ClockAdapter, HOURS_PER_DAY, wrap_hour};
use crate::config::{PhaseConfig, SchedulerConfig, VoteConfig};
use crate::error::SchedulerError;
use crate::vote::{VoteBoard, VoteSession};

/// Real minutes per full cycle that make `phase` last `length_minutes`.
///
/// Returns `None` if the clock's day span is degenerate (sunset at or
/// before sunrise, or a span of the full day).
pub fn cycle_minutes_for(
    phase: PhaseState,
    length_minutes: u32,
    sunrise: f64,
    sunset: f64,
) -> Option<f64> {
    let day_span = sunset - sunrise;
    if !(day_span > 0.0 && day_span < HOURS_PER_DAY) {
        return None;
    }
    let span = match phase {
        PhaseState::Day => day_span,
        PhaseState::Night => HOURS_PER_DAY - day_span,
    };
    Some(f64::from(length_minutes) * (HOURS_PER_DAY / span))
}

/// Owns the phase state, the vote board, and the transition policy.
#[derive(Debug, Clone)]
pub struct PhaseController {
    /// Current phase.
    phase: PhaseState,

    /// Phase lengths and auto-skip flags.
    config: PhaseConfig,

    /// Log auto-skipped phases at info level.
    log_auto_skip: bool,

    /// Skip-night voting state.
    votes: VoteBoard,

    /// Phase time accumulated on ticks since the last transition.
    phase_elapsed: TimeDelta,

    /// Wall time of the previous tick.
    last_tick: Option<DateTime<Utc>>,

    /// When the current phase began.
    phase_started_at: Option<DateTime<Utc>>,

    /// Whether time progression is frozen.
    frozen: bool,

    /// Notifications not yet drained by the owner.
    outbox: Vec<PhaseNotification>,
}

impl PhaseController {
    /// Create a controller in the initial [`PhaseState::Day`] state.
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            phase: PhaseState::Day,
            config: config.phase,
            log_auto_skip: config.logging.log_auto_skip,
            votes: VoteBoard::new(config.vote),
            phase_elapsed: TimeDelta::zero(),
            last_tick: None,
            phase_started_at: None,
            frozen: false,
            outbox: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Current phase.
    pub const fn phase(&self) -> PhaseState {
        self.phase
    }

    /// Active phase configuration.
    pub const fn config(&self) -> &PhaseConfig {
        &self.config
    }

    /// Active vote configuration.
    pub const fn vote_config(&self) -> &VoteConfig {
        self.votes.policy()
    }

    /// The skip-night vote board.
    pub const fn votes(&self) -> &VoteBoard {
        &self.votes
    }

    /// The open vote session, if any.
    pub const fn session(&self) -> Option<&VoteSession> {
        self.votes.session()
    }

    /// Phase time accumulated since the last transition.
    pub const fn phase_elapsed(&self) -> TimeDelta {
        self.phase_elapsed
    }

    /// When the current phase began, once started.
    pub const fn phase_started_at(&self) -> Option<DateTime<Utc>> {
        self.phase_started_at
    }

    /// Whether time is frozen.
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Configured length of `phase`.
    pub const fn length_of(&self, phase: PhaseState) -> u32 {
        match phase {
            PhaseState::Day => self.config.day_length_minutes,
            PhaseState::Night => self.config.night_length_minutes,
        }
    }

    /// Take every notification raised since the last drain.
    pub fn drain_notifications(&mut self) -> Vec<PhaseNotification> {
        std::mem::take(&mut self.outbox)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Align with the clock and settle the starting phase.
    ///
    /// If the clock reports night the controller enters night (opening a
    /// vote session). Either way the auto-skip policy and progression rate
    /// are applied to the starting phase.
    pub fn start(&mut self, now: DateTime<Utc>, clock: &mut dyn ClockAdapter) {
        self.last_tick = Some(now);
        self.phase_started_at = Some(now);
        if clock.is_daytime() {
            self.settle_day(now, clock);
        } else {
            self.enter_night(TransitionCause::Reconciled, now, clock);
        }
    }

    /// Replace phase and vote settings after a reload.
    ///
    /// Takes effect for the live rate immediately and for auto-skip on the
    /// next transition.
    pub fn apply_config(&mut self, config: &SchedulerConfig, clock: &mut dyn ClockAdapter) {
        self.config = config.phase;
        self.log_auto_skip = config.logging.log_auto_skip;
        self.votes.set_policy(config.vote);
        self.apply_rate(self.phase, clock);
    }

    // -----------------------------------------------------------------------
    // Clock edges
    // -----------------------------------------------------------------------

    /// The clock crossed sunrise. No-op if it is already day.
    pub fn on_clock_entered_day(&mut self, now: DateTime<Utc>, clock: &mut dyn ClockAdapter) -> bool {
        self.enter_day(TransitionCause::ClockEdge, now, clock)
    }

    /// The clock crossed sunset. No-op if it is already night.
    pub fn on_clock_entered_night(
        &mut self,
        now: DateTime<Utc>,
        clock: &mut dyn ClockAdapter,
    ) -> bool {
        self.enter_night(TransitionCause::ClockEdge, now, clock)
    }

    /// Hourly reconciliation: follow the clock if an edge was missed.
    pub fn on_clock_hour(&mut self, now: DateTime<Utc>, clock: &mut dyn ClockAdapter) -> bool {
        match (clock.is_daytime(), self.phase) {
            (true, PhaseState::Night) => self.enter_day(TransitionCause::Reconciled, now, clock),
            (false, PhaseState::Day) => self.enter_night(TransitionCause::Reconciled, now, clock),
            _ => false,
        }
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Accumulate phase time since the previous tick and transition once
    /// the configured length is reached.
    ///
    /// At most one transition per call. Frozen time does not accumulate.
    /// Returns `true` if a transition happened.
    pub fn tick(&mut self, now: DateTime<Utc>, clock: &mut dyn ClockAdapter) -> bool {
        let Some(last) = self.last_tick.replace(now) else {
            return false;
        };
        if self.frozen {
            return false;
        }
        let delta = now.signed_duration_since(last).max(TimeDelta::zero());
        self.phase_elapsed = self
            .phase_elapsed
            .checked_add(&delta)
            .unwrap_or(TimeDelta::MAX);

        let length = minutes(self.length_of(self.phase));
        if self.phase_elapsed < length {
            return false;
        }

        debug!(
            phase = %self.phase,
            elapsed_secs = self.phase_elapsed.num_seconds(),
            length_secs = length.num_seconds(),
            "Phase length elapsed"
        );
        let next = self.phase.opposite();
        self.jump_clock_to(next, clock);
        self.enter(next, TransitionCause::PhaseElapsed, now, clock)
    }

    // -----------------------------------------------------------------------
    // Voting
    // -----------------------------------------------------------------------

    /// Cast a skip-night vote. Reaching quorum forces day immediately.
    pub fn cast_vote(
        &mut self,
        voter: VoterId,
        now: DateTime<Utc>,
        eligible_voters: u32,
        clock: &mut dyn ClockAdapter,
    ) -> VoteOutcome {
        let outcome = self.votes.cast(voter, now, eligible_voters);
        match outcome {
            VoteOutcome::Accepted(tally) => {
                info!(
                    voter = %voter,
                    votes = tally.votes,
                    required = tally.required,
                    "Skip-night vote accepted"
                );
                if tally.quorum_reached {
                    info!(votes = tally.votes, "Skip-night quorum reached");
                    self.jump_clock_to(PhaseState::Day, clock);
                    self.enter_day(TransitionCause::VoteQuorum, now, clock);
                }
            }
            rejected => {
                debug!(voter = %voter, outcome = ?rejected, "Skip-night vote rejected");
            }
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Lengths
    // -----------------------------------------------------------------------

    /// Change the day length. Applies the new rate now if it is day.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Validation`] if `minutes` is 0.
    pub fn set_day_length(
        &mut self,
        minutes: u32,
        clock: &mut dyn ClockAdapter,
    ) -> Result<(), SchedulerError> {
        validate_length(PhaseState::Day, minutes)?;
        self.config.day_length_minutes = minutes;
        if self.phase == PhaseState::Day {
            self.apply_rate(PhaseState::Day, clock);
        }
        Ok(())
    }

    /// Change the night length. Applies the new rate now if it is night.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Validation`] if `minutes` is 0.
    pub fn set_night_length(
        &mut self,
        minutes: u32,
        clock: &mut dyn ClockAdapter,
    ) -> Result<(), SchedulerError> {
        validate_length(PhaseState::Night, minutes)?;
        self.config.night_length_minutes = minutes;
        if self.phase == PhaseState::Night {
            self.apply_rate(PhaseState::Night, clock);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Overrides
    // -----------------------------------------------------------------------

    /// Force `phase` now. Returns `false` if it is already active.
    pub fn force(
        &mut self,
        phase: PhaseState,
        now: DateTime<Utc>,
        clock: &mut dyn ClockAdapter,
    ) -> bool {
        if self.phase == phase {
            return false;
        }
        self.jump_clock_to(phase, clock);
        self.enter(phase, TransitionCause::Manual, now, clock)
    }

    /// Stop time progression and pin the sky to `hour`.
    ///
    /// The phase follows the pinned hour. No edge fires while frozen, so
    /// this is the only chance to line the two up.
    pub fn freeze(&mut self, hour: f64, now: DateTime<Utc>, clock: &mut dyn ClockAdapter) {
        clock.set_progress(false);
        clock.set_hour(wrap_hour(hour));
        self.frozen = true;
        info!(hour, "Time frozen");
        self.on_clock_hour(now, clock);
    }

    /// Resume time progression.
    pub fn unfreeze(&mut self, now: DateTime<Utc>, clock: &mut dyn ClockAdapter) {
        clock.set_progress(true);
        self.frozen = false;
        // Frozen time never counts toward the phase length.
        self.last_tick = Some(now);
        info!("Time unfrozen");
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Enter `phase` for `cause`. Returns `false` if it is already active.
    pub fn enter(
        &mut self,
        phase: PhaseState,
        cause: TransitionCause,
        now: DateTime<Utc>,
        clock: &mut dyn ClockAdapter,
    ) -> bool {
        match phase {
            PhaseState::Day => self.enter_day(cause, now, clock),
            PhaseState::Night => self.enter_night(cause, now, clock),
        }
    }

    /// Edge-guarded transition into day.
    pub fn enter_day(
        &mut self,
        cause: TransitionCause,
        now: DateTime<Utc>,
        clock: &mut dyn ClockAdapter,
    ) -> bool {
        if self.phase == PhaseState::Day {
            return false;
        }
        self.begin_phase(PhaseState::Day, now);
        if let Some(closed) = self.votes.close() {
            debug!(votes = closed.votes(), "Vote session closed");
        }
        self.announce(PhaseState::Day, cause);
        self.settle_day(now, clock);
        true
    }

    /// Edge-guarded transition into night.
    pub fn enter_night(
        &mut self,
        cause: TransitionCause,
        now: DateTime<Utc>,
        clock: &mut dyn ClockAdapter,
    ) -> bool {
        if self.phase == PhaseState::Night {
            return false;
        }
        self.begin_phase(PhaseState::Night, now);
        self.announce(PhaseState::Night, cause);
        self.settle_night(now, clock);
        true
    }

    /// Apply the auto-skip policy and rate for a day that just began.
    fn settle_day(&mut self, now: DateTime<Utc>, clock: &mut dyn ClockAdapter) {
        if self.config.auto_skip_day && !self.config.auto_skip_night {
            self.jump_clock_to(PhaseState::Night, clock);
            self.log_skip("Daytime autoskipped");
            self.enter_night(TransitionCause::AutoSkip, now, clock);
            return;
        }
        self.apply_rate(PhaseState::Day, clock);
    }

    /// Apply the auto-skip policy, vote session, and rate for a night that
    /// just began.
    fn settle_night(&mut self, now: DateTime<Utc>, clock: &mut dyn ClockAdapter) {
        if self.config.auto_skip_night {
            self.jump_clock_to(PhaseState::Day, clock);
            self.log_skip("Nighttime autoskipped");
            self.enter_day(TransitionCause::AutoSkip, now, clock);
            return;
        }
        if self.votes.open(now) {
            debug!(
                duration_secs = self.votes.policy().duration_seconds,
                "Vote session opened"
            );
        }
        self.apply_rate(PhaseState::Night, clock);
    }

    /// Reset per-phase bookkeeping.
    fn begin_phase(&mut self, phase: PhaseState, now: DateTime<Utc>) {
        self.phase = phase;
        self.phase_elapsed = TimeDelta::zero();
        self.phase_started_at = Some(now);
        self.last_tick = Some(now);
    }

    /// Raise the outbound notification for a transition.
    fn announce(&mut self, phase: PhaseState, cause: TransitionCause) {
        info!(phase = %phase, cause = ?cause, "Phase transition");
        self.outbox.push(PhaseNotification::entered(phase, cause));
    }

    /// Move the clock to the boundary hour that begins `phase`.
    ///
    /// A frozen sky keeps its pinned hour.
    fn jump_clock_to(&self, phase: PhaseState, clock: &mut dyn ClockAdapter) {
        if self.frozen {
            return;
        }
        let hour = match phase {
            // The next sunrise; hours wrap so this is always forward.
            PhaseState::Day => clock.sunrise_hour(),
            PhaseState::Night => clock.sunset_hour(),
        };
        clock.set_hour(hour);
    }

    /// Set the clock's progression rate so `phase` lasts its configured
    /// length in real minutes.
    fn apply_rate(&self, phase: PhaseState, clock: &mut dyn ClockAdapter) {
        let length = self.length_of(phase);
        match cycle_minutes_for(phase, length, clock.sunrise_hour(), clock.sunset_hour()) {
            Some(cycle) => {
                clock.set_cycle_minutes(cycle);
                debug!(phase = %phase, length_minutes = length, cycle_minutes = cycle, "Progression rate applied");
            }
            None => warn!(
                sunrise = clock.sunrise_hour(),
                sunset = clock.sunset_hour(),
                "Clock has a degenerate day span, progression rate left unchanged"
            ),
        }
    }

    /// Log an auto-skip if configured to.
    fn log_skip(&self, message: &'static str) {
        if self.log_auto_skip {
            info!("{message}");
        }
    }
}

/// Reject zero-length phases.
pub(crate) fn validate_length(phase: PhaseState, minutes: u32) -> Result<(), SchedulerError> {
    if minutes < 1 {
        return Err(SchedulerError::Validation {
            field: match phase {
                PhaseState::Day => "day length",
                PhaseState::Night => "night length",
            },
            reason: "must be a number greater than 0".to_owned(),
        });
    }
    Ok(())
}

/// Convert whole minutes into a [`TimeDelta`].
fn minutes(value: u32) -> TimeDelta {
    TimeDelta::try_minutes(i64::from(value)).unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use daynight_types::VoteTally;

    use super::*;
    use crate::clock::SimulatedSky;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + TimeDelta::try_seconds(secs).unwrap()
    }

    fn config(day: u32, night: u32) -> SchedulerConfig {
        let mut config = SchedulerConfig::default();
        config.phase.day_length_minutes = day;
        config.phase.night_length_minutes = night;
        config.vote.cooldown_seconds = 0;
        config
    }

    fn noon() -> SimulatedSky {
        SimulatedSky::new(12.0, 6.0, 18.0)
    }

    fn midnight() -> SimulatedSky {
        SimulatedSky::new(0.0, 6.0, 18.0)
    }

    #[test]
    fn cycle_rate_stretches_each_phase_to_its_length() {
        let day = cycle_minutes_for(PhaseState::Day, 30, 6.0, 18.0).unwrap();
        assert!((day - 60.0).abs() < 1e-9);
        let night = cycle_minutes_for(PhaseState::Night, 10, 6.0, 20.0).unwrap();
        assert!((night - 24.0).abs() < 1e-9);
        assert!(cycle_minutes_for(PhaseState::Day, 30, 18.0, 6.0).is_none());
    }

    #[test]
    fn starts_in_day_when_clock_is_daytime() {
        let mut sky = noon();
        let mut ctl = PhaseController::new(&config(30, 30));
        ctl.start(t(0), &mut sky);
        assert_eq!(ctl.phase(), PhaseState::Day);
        assert!(ctl.drain_notifications().is_empty());
        assert!((sky.cycle_minutes() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn starts_in_night_with_session_when_clock_is_night() {
        let mut sky = midnight();
        let mut ctl = PhaseController::new(&config(30, 30));
        ctl.start(t(0), &mut sky);
        assert_eq!(ctl.phase(), PhaseState::Night);
        assert!(ctl.session().is_some());
    }

    #[test]
    fn tick_transitions_exactly_once_per_length() {
        let mut sky = noon();
        let mut ctl = PhaseController::new(&config(1, 1));
        ctl.start(t(0), &mut sky);

        assert!(!ctl.tick(t(30), &mut sky));
        assert!(ctl.tick(t(60), &mut sky));
        assert_eq!(ctl.phase(), PhaseState::Night);
        // Same interval again: no double transition.
        assert!(!ctl.tick(t(60), &mut sky));
        assert!(!ctl.tick(t(90), &mut sky));
        assert!(ctl.tick(t(120), &mut sky));
        assert_eq!(ctl.phase(), PhaseState::Day);

        let notes = ctl.drain_notifications();
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| n.cause() == TransitionCause::PhaseElapsed));
    }

    #[test]
    fn long_gap_still_transitions_only_once() {
        let mut sky = noon();
        let mut ctl = PhaseController::new(&config(1, 1));
        ctl.start(t(0), &mut sky);
        assert!(ctl.tick(t(600), &mut sky));
        assert_eq!(ctl.phase(), PhaseState::Night);
        assert_eq!(ctl.drain_notifications().len(), 1);
        assert_eq!(ctl.phase_elapsed(), TimeDelta::zero());
    }

    #[test]
    fn tick_transition_moves_the_clock_to_the_boundary() {
        let mut sky = noon();
        let mut ctl = PhaseController::new(&config(1, 1));
        ctl.start(t(0), &mut sky);
        ctl.tick(t(60), &mut sky);
        assert!(!sky.is_daytime());
        ctl.tick(t(120), &mut sky);
        assert!(sky.is_daytime());
    }

    #[test]
    fn repeated_night_edge_creates_one_session() {
        let mut sky = noon();
        let mut ctl = PhaseController::new(&config(30, 30));
        ctl.start(t(0), &mut sky);

        assert!(ctl.on_clock_entered_night(t(10), &mut sky));
        let opened = ctl.session().unwrap().opened_at();
        assert!(!ctl.on_clock_entered_night(t(20), &mut sky));
        assert_eq!(ctl.session().unwrap().opened_at(), opened);
        assert_eq!(ctl.drain_notifications().len(), 1);
    }

    #[test]
    fn entering_day_discards_session() {
        let mut sky = noon();
        let mut ctl = PhaseController::new(&config(30, 30));
        ctl.start(t(0), &mut sky);
        ctl.on_clock_entered_night(t(1), &mut sky);
        assert!(ctl.session().is_some());
        assert!(ctl.on_clock_entered_day(t(2), &mut sky));
        assert!(ctl.session().is_none());
        assert!(!ctl.on_clock_entered_day(t(3), &mut sky));
    }

    #[test]
    fn voting_disabled_means_no_session() {
        let mut cfg = config(30, 30);
        cfg.vote.enabled = false;
        let mut sky = midnight();
        let mut ctl = PhaseController::new(&cfg);
        ctl.start(t(0), &mut sky);
        assert_eq!(ctl.phase(), PhaseState::Night);
        assert!(ctl.session().is_none());
        assert_eq!(
            ctl.cast_vote(VoterId::new(1), t(1), 4, &mut sky),
            VoteOutcome::VotingDisabled
        );
    }

    #[test]
    fn auto_skip_day_goes_straight_to_night() {
        let mut cfg = config(30, 30);
        cfg.phase.auto_skip_day = true;
        let mut sky = midnight();
        let mut ctl = PhaseController::new(&cfg);
        ctl.start(t(0), &mut sky);
        let _ = ctl.drain_notifications();

        assert!(ctl.on_clock_entered_day(t(1), &mut sky));
        assert_eq!(ctl.phase(), PhaseState::Night);
        assert!((sky.current_hour() - 18.0).abs() < 1e-9);
        let notes = ctl.drain_notifications();
        assert_eq!(
            notes,
            vec![
                PhaseNotification::entered(PhaseState::Day, TransitionCause::ClockEdge),
                PhaseNotification::entered(PhaseState::Night, TransitionCause::AutoSkip),
            ]
        );
        assert!(ctl.session().is_some());
    }

    #[test]
    fn auto_skip_night_goes_straight_to_sunrise() {
        let mut cfg = config(30, 30);
        cfg.phase.auto_skip_night = true;
        let mut sky = noon();
        let mut ctl = PhaseController::new(&cfg);
        ctl.start(t(0), &mut sky);

        assert!(ctl.on_clock_entered_night(t(1), &mut sky));
        assert_eq!(ctl.phase(), PhaseState::Day);
        assert!(ctl.session().is_none());
        assert!((sky.current_hour() - 6.0).abs() < 1e-9);
        assert!(sky.is_daytime());
    }

    #[test]
    fn both_auto_skips_leave_the_world_in_day() {
        let mut cfg = config(30, 30);
        cfg.phase.auto_skip_day = true;
        cfg.phase.auto_skip_night = true;
        let mut sky = noon();
        let mut ctl = PhaseController::new(&cfg);
        ctl.start(t(0), &mut sky);
        assert_eq!(ctl.phase(), PhaseState::Day);

        ctl.on_clock_entered_night(t(1), &mut sky);
        assert_eq!(ctl.phase(), PhaseState::Day);
        assert_eq!(ctl.drain_notifications().len(), 2);
    }

    #[test]
    fn zero_length_is_a_validation_error() {
        let mut sky = noon();
        let mut ctl = PhaseController::new(&config(30, 30));
        ctl.start(t(0), &mut sky);
        let err = ctl.set_day_length(0, &mut sky).unwrap_err();
        assert!(matches!(err, SchedulerError::Validation { .. }));
        assert!(ctl.set_night_length(0, &mut sky).is_err());
        assert_eq!(ctl.config().day_length_minutes, 30);
    }

    #[test]
    fn length_change_applies_rate_only_for_active_phase() {
        let mut sky = noon();
        let mut ctl = PhaseController::new(&config(30, 30));
        ctl.start(t(0), &mut sky);

        ctl.set_day_length(10, &mut sky).unwrap();
        assert!((sky.cycle_minutes() - 20.0).abs() < 1e-9);

        ctl.set_night_length(90, &mut sky).unwrap();
        assert!((sky.cycle_minutes() - 20.0).abs() < 1e-9);
        assert_eq!(ctl.config().night_length_minutes, 90);
    }

    #[test]
    fn quorum_forces_day_and_tears_down_session() {
        let mut cfg = config(1, 1);
        cfg.vote.required_percent = 50;
        cfg.vote.duration_seconds = 60;
        let mut sky = midnight();
        let mut ctl = PhaseController::new(&cfg);
        ctl.start(t(0), &mut sky);
        let _ = ctl.drain_notifications();

        let first = ctl.cast_vote(VoterId::new(1), t(5), 4, &mut sky);
        assert!(first.is_accepted() && !first.reached_quorum());
        assert_eq!(ctl.phase(), PhaseState::Night);

        let second = ctl.cast_vote(VoterId::new(2), t(6), 4, &mut sky);
        assert!(second.reached_quorum());
        assert_eq!(ctl.phase(), PhaseState::Day);
        assert!(ctl.session().is_none());
        assert!(sky.is_daytime());
        assert_eq!(
            ctl.drain_notifications(),
            vec![PhaseNotification::entered(PhaseState::Day, TransitionCause::VoteQuorum)]
        );
    }

    #[test]
    fn vote_during_day_has_no_session() {
        let mut sky = noon();
        let mut ctl = PhaseController::new(&config(30, 30));
        ctl.start(t(0), &mut sky);
        assert_eq!(
            ctl.cast_vote(VoterId::new(1), t(1), 4, &mut sky),
            VoteOutcome::NoSession
        );
    }

    #[test]
    fn frozen_time_does_not_count_toward_phase_length() {
        let mut sky = noon();
        let mut ctl = PhaseController::new(&config(1, 1));
        ctl.start(t(0), &mut sky);
        ctl.freeze(12.0, t(0), &mut sky);
        assert!(!sky.is_progressing());
        assert!(!ctl.tick(t(600), &mut sky));
        assert_eq!(ctl.phase(), PhaseState::Day);

        ctl.unfreeze(t(600), &mut sky);
        assert!(sky.is_progressing());
        assert!(!ctl.tick(t(630), &mut sky));
        assert!(ctl.tick(t(660), &mut sky));
    }

    #[test]
    fn freezing_follows_the_pinned_hour() {
        let mut sky = midnight();
        let mut ctl = PhaseController::new(&config(30, 30));
        ctl.start(t(0), &mut sky);
        assert!(ctl.session().is_some());
        ctl.drain_notifications();

        ctl.freeze(9.0, t(1), &mut sky);
        assert_eq!(ctl.phase(), PhaseState::Day);
        assert!(sky.is_daytime());
        assert!(ctl.session().is_none());
        assert_eq!(
            ctl.drain_notifications(),
            vec![PhaseNotification::entered(
                PhaseState::Day,
                TransitionCause::Reconciled
            )]
        );
    }

    #[test]
    fn overrides_leave_a_frozen_sky_pinned() {
        let mut sky = noon();
        let mut ctl = PhaseController::new(&config(30, 30));
        ctl.start(t(0), &mut sky);
        ctl.freeze(9.0, t(1), &mut sky);

        assert!(ctl.force(PhaseState::Night, t(2), &mut sky));
        assert_eq!(ctl.phase(), PhaseState::Night);
        assert!((sky.current_hour() - 9.0).abs() < 1e-9);

        assert_eq!(
            ctl.cast_vote(VoterId::new(1), t(3), 1, &mut sky),
            VoteOutcome::Accepted(VoteTally {
                votes: 1,
                required: 1,
                quorum_reached: true,
            })
        );
        assert_eq!(ctl.phase(), PhaseState::Day);
        assert!((sky.current_hour() - 9.0).abs() < 1e-9);
    }

    #[test]
    fn hourly_reconciliation_follows_the_clock() {
        let mut sky = noon();
        let mut ctl = PhaseController::new(&config(30, 30));
        ctl.start(t(0), &mut sky);
        sky.set_hour(22.0);
        assert!(ctl.on_clock_hour(t(1), &mut sky));
        assert_eq!(ctl.phase(), PhaseState::Night);
        assert!(!ctl.on_clock_hour(t(2), &mut sky));
        assert_eq!(
            ctl.drain_notifications(),
            vec![PhaseNotification::entered(PhaseState::Night, TransitionCause::Reconciled)]
        );
    }

    #[test]
    fn force_is_a_no_op_for_the_active_phase() {
        let mut sky = noon();
        let mut ctl = PhaseController::new(&config(30, 30));
        ctl.start(t(0), &mut sky);
        assert!(!ctl.force(PhaseState::Day, t(1), &mut sky));
        assert!(ctl.force(PhaseState::Night, t(2), &mut sky));
        assert!(!sky.is_daytime());
        assert_eq!(
            ctl.drain_notifications(),
            vec![PhaseNotification::entered(PhaseState::Night, TransitionCause::Manual)]
        );
    }
}
