//! End-to-end day/night cycles through the [`Scheduler`] context.
//!
//! Every test runs against a [`SimulatedSky`] with scripted wall times, so
//! no test sleeps or depends on the real clock.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use daynight_core::clock::{ClockAdapter, SimulatedSky};
use daynight_core::config::{ConfigStore, MemoryStore, SchedulerConfig, YamlFileStore};
use daynight_core::scheduler::Scheduler;
use daynight_types::{PhaseState, TransitionCause, VoteOutcome, VoterId};

fn t_ms(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + TimeDelta::try_milliseconds(millis).unwrap()
}

fn t(secs: i64) -> DateTime<Utc> {
    t_ms(secs * 1000)
}

fn quick_config(cooldown_seconds: u64) -> SchedulerConfig {
    let mut config = SchedulerConfig::default();
    config.phase.day_length_minutes = 1;
    config.phase.night_length_minutes = 1;
    config.vote.required_percent = 50;
    config.vote.duration_seconds = 60;
    config.vote.cooldown_seconds = cooldown_seconds;
    config
}

fn scheduler(config: SchedulerConfig, sky: SimulatedSky) -> Scheduler<SimulatedSky> {
    Scheduler::new(config, sky, Box::new(MemoryStore::default()))
}

#[test]
fn two_of_four_votes_end_the_night() {
    let mut sched = scheduler(quick_config(300), SimulatedSky::new(6.0, 6.0, 18.0));
    sched.start(t(0)).unwrap();
    assert_eq!(sched.phase(), PhaseState::Day);

    // One minute of day, from sunrise to sunset.
    assert_eq!(sched.tick(t(30)).unwrap(), 0);
    assert!(sched.tick(t(61)).unwrap() >= 1);
    assert_eq!(sched.phase(), PhaseState::Night);
    assert!(sched.controller().session().is_some());

    let first = sched.cast_vote(VoterId::new(1), t(70), &4_u32).unwrap();
    assert!(first.is_accepted());
    assert!(!first.reached_quorum());
    assert_eq!(
        sched.status(t(70), &4_u32).vote.map(|v| (v.tally.votes, v.tally.required)),
        Some((1, 2))
    );

    assert_eq!(
        sched.cast_vote(VoterId::new(1), t(71), &4_u32).unwrap(),
        VoteOutcome::AlreadyVoted
    );

    let second = sched.cast_vote(VoterId::new(2), t(72), &4_u32).unwrap();
    assert!(second.reached_quorum());
    assert_eq!(sched.phase(), PhaseState::Day);
    assert!(sched.controller().session().is_none());
    assert!(sched.clock().is_daytime());

    let notes = sched.drain_notifications();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes.first().map(|n| n.phase()), Some(PhaseState::Night));
    assert_eq!(
        notes.last().map(|n| n.cause()),
        Some(TransitionCause::VoteQuorum)
    );

    // The next night gets a fresh session.
    assert!(sched.force_phase(PhaseState::Night, t(80)).unwrap());
    assert_eq!(sched.controller().session().unwrap().votes(), 0);
}

#[test]
fn cooldown_carries_across_sessions() {
    let mut sched = scheduler(quick_config(30), SimulatedSky::new(0.0, 6.0, 18.0));
    sched.start(t(0)).unwrap();
    let voter = VoterId::new(7);

    assert!(sched.cast_vote(voter, t(0), &10_u32).unwrap().is_accepted());
    assert!(sched.force_phase(PhaseState::Day, t(10)).unwrap());
    assert!(sched.force_phase(PhaseState::Night, t(20)).unwrap());

    assert_eq!(
        sched.cast_vote(voter, t(29), &10_u32).unwrap(),
        VoteOutcome::OnCooldown {
            remaining_seconds: 1
        }
    );
    assert!(sched.cast_vote(voter, t(31), &10_u32).unwrap().is_accepted());
}

#[test]
fn session_expires_at_its_end_time() {
    let mut sched = scheduler(quick_config(0), SimulatedSky::new(0.0, 6.0, 18.0));
    sched.start(t(0)).unwrap();

    assert!(
        sched
            .cast_vote(VoterId::new(1), t_ms(59_999), &10_u32)
            .unwrap()
            .is_accepted()
    );
    assert_eq!(
        sched.cast_vote(VoterId::new(2), t(60), &10_u32).unwrap(),
        VoteOutcome::SessionExpired
    );

    // The lapsed session stays until the night ends.
    let status = sched.status(t(60), &10_u32);
    assert_eq!(status.phase, PhaseState::Night);
    let vote = status.vote.unwrap();
    assert!(vote.expired);
    assert_eq!(vote.remaining_seconds, 0);
}

#[test]
fn votes_during_day_have_no_session() {
    let mut sched = scheduler(quick_config(0), SimulatedSky::new(12.0, 6.0, 18.0));
    sched.start(t(0)).unwrap();
    assert_eq!(
        sched.cast_vote(VoterId::new(1), t(1), &4_u32).unwrap(),
        VoteOutcome::NoSession
    );
}

#[test]
fn auto_skip_night_keeps_the_world_in_day() {
    let mut config = quick_config(0);
    config.phase.auto_skip_night = true;
    let mut sched = scheduler(config, SimulatedSky::new(6.0, 6.0, 18.0));
    sched.start(t(0)).unwrap();

    sched.tick(t(61)).unwrap();
    assert_eq!(sched.phase(), PhaseState::Day);
    assert!(sched.controller().session().is_none());
    let causes: Vec<_> = sched
        .drain_notifications()
        .iter()
        .map(|n| (n.phase(), n.cause()))
        .collect();
    assert_eq!(
        causes,
        vec![
            (PhaseState::Night, TransitionCause::Reconciled),
            (PhaseState::Day, TransitionCause::AutoSkip),
        ]
    );
    assert!(sched.clock().is_daytime());
}

#[test]
fn length_changes_survive_a_restart() {
    let path = std::env::temp_dir().join(format!(
        "daynight-cycle-{}.yaml",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);

    let mut store = YamlFileStore::new(&path);
    let loaded = store.load().unwrap();
    assert!(path.exists());

    let mut sched = Scheduler::new(loaded.config, SimulatedSky::default(), Box::new(store));
    sched.set_day_length(12).unwrap();
    sched.set_night_length(4).unwrap();
    drop(sched);

    let reloaded = YamlFileStore::new(&path).load().unwrap();
    assert_eq!(reloaded.config.phase.day_length_minutes, 12);
    assert_eq!(reloaded.config.phase.night_length_minutes, 4);
    assert!(reloaded.warnings.is_empty());

    let _ = std::fs::remove_file(&path);
}
