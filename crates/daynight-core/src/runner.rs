//! Scheduler driver loop.
//!
//! [`run_scheduler`] is the single task that owns a [`Scheduler`]. It
//! serializes everything that touches scheduler state:
//!
//! - **Ticks** on a fixed interval (clock sync, edge pump, phase timer)
//! - **Clock edges** from host clocks that progress on their own
//! - **Jobs** sent by command front ends over an mpsc channel
//! - **Shutdown** from any future the host supplies (Ctrl-C, a oneshot)
//!
//! After every event the phase notifications are drained into a
//! [`NotificationSink`]. On exit the clock subscription is released.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use daynight_types::PhaseNotification;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::clock::ClockAdapter;
use crate::error::SchedulerError;
use crate::scheduler::Scheduler;

/// Work submitted to the scheduler task. Receives the scheduler and the
/// wall time at which the job runs.
pub type SchedulerJob<C> = Box<dyn FnOnce(&mut Scheduler<C>, DateTime<Utc>) + Send>;

/// Receives phase notifications as they are drained.
pub trait NotificationSink: Send {
    /// Called once per notification, in order.
    fn notify(&mut self, notification: &PhaseNotification);
}

/// A sink that writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&mut self, notification: &PhaseNotification) {
        info!(
            phase = %notification.phase(),
            cause = ?notification.cause(),
            "Phase notification"
        );
    }
}

/// Counters describing a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks executed.
    pub ticks: u64,
    /// Clock edges received over the channel.
    pub edges: u64,
    /// Jobs executed.
    pub jobs: u64,
    /// Notifications delivered to the sink.
    pub notifications: u64,
}

/// Start the scheduler, retrying every `retry` until the clock is ready.
///
/// Returns the number of attempts it took.
///
/// # Errors
///
/// Returns any start error other than [`SchedulerError::ClockUnavailable`].
pub async fn start_when_ready<C: ClockAdapter>(
    scheduler: &mut Scheduler<C>,
    retry: Duration,
) -> Result<u32, SchedulerError> {
    let mut attempts: u32 = 0;
    loop {
        attempts = attempts.saturating_add(1);
        match scheduler.start(Utc::now()) {
            Ok(()) => return Ok(attempts),
            Err(SchedulerError::ClockUnavailable) => {
                warn!(
                    attempt = attempts,
                    retry_ms = retry.as_millis(),
                    "Clock not ready, retrying"
                );
                tokio::time::sleep(retry).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Drive a started scheduler until `shutdown` resolves or the job channel
/// closes.
///
/// The scheduler is shut down (clock subscription released) before this
/// returns.
pub async fn run_scheduler<C, F>(
    scheduler: &mut Scheduler<C>,
    jobs: &mut UnboundedReceiver<SchedulerJob<C>>,
    shutdown: F,
    sink: &mut dyn NotificationSink,
    tick_interval: Duration,
) -> RunSummary
where
    C: ClockAdapter,
    F: Future<Output = ()>,
{
    let mut summary = RunSummary::default();
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(
        tick_interval_ms = tick_interval.as_millis(),
        phase = %scheduler.phase(),
        "Scheduler loop starting"
    );

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            _ = interval.tick() => {
                match scheduler.tick(Utc::now()) {
                    Ok(transitions) => {
                        summary.ticks = summary.ticks.saturating_add(1);
                        if transitions > 0 {
                            debug!(transitions, "Tick caused transitions");
                        }
                    }
                    Err(e) => warn!(error = %e, "Tick skipped"),
                }
            }
            edge = scheduler.next_edge() => {
                match edge {
                    Some(edge) => {
                        summary.edges = summary.edges.saturating_add(1);
                        scheduler.handle_edge(edge, Utc::now());
                    }
                    None => {
                        warn!("Clock edge channel closed");
                        break;
                    }
                }
            }
            job = jobs.recv() => {
                match job {
                    Some(job) => {
                        summary.jobs = summary.jobs.saturating_add(1);
                        job(scheduler, Utc::now());
                    }
                    None => {
                        info!("Job channel closed");
                        break;
                    }
                }
            }
        }

        for notification in scheduler.drain_notifications() {
            sink.notify(&notification);
            summary.notifications = summary.notifications.saturating_add(1);
        }
    }

    scheduler.shutdown();
    info!(
        ticks = summary.ticks,
        edges = summary.edges,
        jobs = summary.jobs,
        notifications = summary.notifications,
        "Scheduler loop ended"
    );
    summary
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use daynight_types::{PhaseState, TransitionCause};
    use tokio::sync::{mpsc, oneshot};

    use super::*;
    use crate::clock::SimulatedSky;
    use crate::config::{MemoryStore, SchedulerConfig};

    #[derive(Default)]
    struct Collect(Vec<PhaseNotification>);

    impl NotificationSink for Collect {
        fn notify(&mut self, notification: &PhaseNotification) {
            self.0.push(*notification);
        }
    }

    fn scheduler(sky: SimulatedSky) -> Scheduler<SimulatedSky> {
        Scheduler::new(
            SchedulerConfig::default(),
            sky,
            Box::new(MemoryStore::default()),
        )
    }

    #[tokio::test]
    async fn start_when_ready_retries_until_the_clock_exists() {
        let sky = SimulatedSky::default()
            .ready_after(std::time::Instant::now() + Duration::from_millis(30));
        let mut sched = scheduler(sky);
        let attempts = start_when_ready(&mut sched, Duration::from_millis(10))
            .await
            .unwrap();
        assert!(attempts > 1);
        assert!(sched.is_started());
    }

    #[tokio::test]
    async fn jobs_run_in_order_and_notifications_reach_the_sink() {
        let mut sched = scheduler(SimulatedSky::default());
        sched.start(Utc::now()).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel::<SchedulerJob<SimulatedSky>>();
        let (done_tx, done_rx) = oneshot::channel::<PhaseState>();
        tx.send(Box::new(|s: &mut Scheduler<SimulatedSky>, now: DateTime<Utc>| {
            s.force_phase(PhaseState::Night, now).unwrap();
        }))
        .unwrap();
        tx.send(Box::new(move |s: &mut Scheduler<SimulatedSky>, _: DateTime<Utc>| {
            let _ = done_tx.send(s.phase());
        }))
        .unwrap();
        drop(tx);

        let mut sink = Collect::default();
        let summary = run_scheduler(
            &mut sched,
            &mut rx,
            std::future::pending(),
            &mut sink,
            Duration::from_secs(3600),
        )
        .await;

        assert_eq!(done_rx.await.unwrap(), PhaseState::Night);
        assert_eq!(summary.jobs, 2);
        assert_eq!(
            sink.0,
            vec![PhaseNotification::entered(
                PhaseState::Night,
                TransitionCause::Manual
            )]
        );
        assert!(!sched.is_started());
        assert_eq!(sched.clock().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_future_stops_the_loop() {
        let mut sched = scheduler(SimulatedSky::default());
        sched.start(Utc::now()).unwrap();
        let (_tx, mut rx) = mpsc::unbounded_channel::<SchedulerJob<SimulatedSky>>();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        stop_tx.send(()).unwrap();

        let mut sink = LogSink;
        let summary = run_scheduler(
            &mut sched,
            &mut rx,
            async {
                let _ = stop_rx.await;
            },
            &mut sink,
            Duration::from_secs(3600),
        )
        .await;

        assert_eq!(summary.jobs, 0);
        assert!(!sched.is_started());
    }
}
