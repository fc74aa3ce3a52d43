//! Clock adapter seam and an in-memory simulated sky.
//!
//! The scheduler never owns astronomical time. It talks to whatever the
//! host uses for its sky through [`ClockAdapter`]: read the hour, read the
//! sunrise and sunset hours, jump the hour, change the progression rate,
//! and subscribe to sunrise/sunset edges.
//!
//! [`SimulatedSky`] is a deterministic implementation driven by wall time.
//! The engine binary runs on it and the tests use it to script days.
//!
//! # Design Principles
//!
//! - Edges are delivered through unbounded channels so the owner of the
//!   scheduler drains them on its own task. Nothing is called re-entrantly.
//! - Jumping the hour with [`ClockAdapter::set_hour`] never fires an edge.
//!   Only progression does.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use daynight_types::{ClockEdge, SubscriberId};
use tokio::sync::mpsc::UnboundedSender;

/// Hours in a full in-game day.
pub const HOURS_PER_DAY: f64 = 24.0;

/// The host's time-of-day component.
///
/// Hours are in-game hours in the range `[0, 24)`. Progression rate is
/// expressed as the number of real minutes a full 24 hour cycle takes.
pub trait ClockAdapter {
    /// Whether the underlying time component exists yet.
    fn is_ready(&self) -> bool;

    /// Current in-game hour.
    fn current_hour(&self) -> f64;

    /// Hour at which day begins.
    fn sunrise_hour(&self) -> f64;

    /// Hour at which night begins.
    fn sunset_hour(&self) -> f64;

    /// Jump to the given hour without firing edges.
    fn set_hour(&mut self, hour: f64);

    /// Set how many real minutes a full 24 hour cycle lasts.
    fn set_cycle_minutes(&mut self, minutes: f64);

    /// Enable or disable time progression.
    fn set_progress(&mut self, progress: bool);

    /// Register an observer for clock edges.
    fn subscribe(&mut self, sender: UnboundedSender<ClockEdge>) -> SubscriberId;

    /// Remove an observer. Unknown ids are ignored.
    fn unsubscribe(&mut self, id: SubscriberId);

    /// Let the clock catch up with wall time. Host clocks that run on
    /// their own keep the default no-op.
    fn sync(&mut self, _now: DateTime<Utc>) {}

    /// Whether the current hour is inside the day window.
    ///
    /// Sunrise itself counts as day, sunset itself as night, so a jump to
    /// either boundary lands in the phase it announces.
    fn is_daytime(&self) -> bool {
        let hour = self.current_hour();
        hour >= self.sunrise_hour() && hour < self.sunset_hour()
    }

    /// Hours of daylight between sunrise and sunset.
    fn day_span_hours(&self) -> f64 {
        self.sunset_hour() - self.sunrise_hour()
    }
}

/// Wrap an hour value into `[0, 24)`.
pub fn wrap_hour(hour: f64) -> f64 {
    let wrapped = hour.rem_euclid(HOURS_PER_DAY);
    if wrapped.is_finite() { wrapped } else { 0.0 }
}

// ---------------------------------------------------------------------------
// SimulatedSky
// ---------------------------------------------------------------------------

/// A deterministic sky that progresses with wall time.
///
/// The hour advances by `elapsed_real_minutes * 24 / cycle_minutes` on
/// every [`sync`](ClockAdapter::sync) or
/// [`advance_minutes`](SimulatedSky::advance_minutes) call, unless time
/// progression is disabled.
#[derive(Debug)]
pub struct SimulatedSky {
    /// Current hour in `[0, 24)`.
    hour: f64,

    /// Hour at which day begins.
    sunrise: f64,

    /// Hour at which night begins.
    sunset: f64,

    /// Real minutes per full 24 hour cycle.
    cycle_minutes: f64,

    /// Whether time progresses.
    progress: bool,

    /// Instant before which the sky reports itself as not ready.
    ready_at: Option<Instant>,

    /// Wall time of the last sync.
    last_sync: Option<DateTime<Utc>>,

    /// Subscribed observers.
    subscribers: BTreeMap<SubscriberId, UnboundedSender<ClockEdge>>,

    /// Next subscriber id to hand out.
    next_subscriber: u64,
}

impl SimulatedSky {
    /// Create a sky starting at `hour` with the given sunrise and sunset.
    ///
    /// The cycle rate defaults to 60 real minutes per in-game day until the
    /// scheduler sets it.
    pub fn new(hour: f64, sunrise: f64, sunset: f64) -> Self {
        Self {
            hour: wrap_hour(hour),
            sunrise,
            sunset,
            cycle_minutes: 60.0,
            progress: true,
            ready_at: None,
            last_sync: None,
            subscribers: BTreeMap::new(),
            next_subscriber: 1,
        }
    }

    /// Report "not ready" until `instant` has passed, as a host sky that is
    /// still loading would.
    #[must_use]
    pub const fn ready_after(mut self, instant: Instant) -> Self {
        self.ready_at = Some(instant);
        self
    }

    /// Mark the sky ready (or not) right now.
    pub fn set_ready(&mut self, ready: bool) {
        self.ready_at = if ready { None } else { Some(far_future()) };
    }

    /// Real minutes per full cycle last set by the scheduler.
    pub const fn cycle_minutes(&self) -> f64 {
        self.cycle_minutes
    }

    /// Whether time is progressing.
    pub const fn is_progressing(&self) -> bool {
        self.progress
    }

    /// Number of subscribed observers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Advance by `real_minutes` of wall time, firing edges for every
    /// sunrise, sunset, and whole hour crossed.
    pub fn advance_minutes(&mut self, real_minutes: f64) {
        if !self.progress || real_minutes <= 0.0 || self.cycle_minutes <= 0.0 {
            return;
        }
        let hours = real_minutes * HOURS_PER_DAY / self.cycle_minutes;
        self.advance_hours(hours);
    }

    /// Advance the in-game hour directly, firing edges on the way.
    pub fn advance_hours(&mut self, hours: f64) {
        if hours <= 0.0 || !hours.is_finite() {
            return;
        }
        let start = self.hour;
        let end = start + hours;

        // Walk every boundary crossed in order so a long jump still
        // delivers alternating edges.
        let mut boundaries: Vec<(f64, ClockEdge)> = Vec::new();
        let mut day_offset = 0.0;
        while day_offset <= end {
            for (boundary, edge) in [
                (self.sunrise, ClockEdge::EnteredDay),
                (self.sunset, ClockEdge::EnteredNight),
            ] {
                let at = day_offset + boundary;
                if at > start && at <= end {
                    boundaries.push((at, edge));
                }
            }
            day_offset += HOURS_PER_DAY;
        }

        let mut whole_hour = start.floor() + 1.0;
        while whole_hour <= end {
            boundaries.push((whole_hour, ClockEdge::HourElapsed));
            whole_hour += 1.0;
        }

        boundaries.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.hour = wrap_hour(end);
        for (_, edge) in boundaries {
            self.fire(edge);
        }
    }

    /// Deliver an edge to every live subscriber, pruning closed channels.
    fn fire(&mut self, edge: ClockEdge) {
        self.subscribers
            .retain(|_, sender| sender.send(edge).is_ok());
    }
}

impl Default for SimulatedSky {
    fn default() -> Self {
        Self::new(12.0, 6.0, 18.0)
    }
}

impl ClockAdapter for SimulatedSky {
    fn is_ready(&self) -> bool {
        self.ready_at.is_none_or(|at| Instant::now() >= at)
    }

    fn current_hour(&self) -> f64 {
        self.hour
    }

    fn sunrise_hour(&self) -> f64 {
        self.sunrise
    }

    fn sunset_hour(&self) -> f64 {
        self.sunset
    }

    fn set_hour(&mut self, hour: f64) {
        self.hour = wrap_hour(hour);
    }

    fn set_cycle_minutes(&mut self, minutes: f64) {
        if minutes > 0.0 && minutes.is_finite() {
            self.cycle_minutes = minutes;
        }
    }

    fn set_progress(&mut self, progress: bool) {
        self.progress = progress;
    }

    fn subscribe(&mut self, sender: UnboundedSender<ClockEdge>) -> SubscriberId {
        let id = SubscriberId::new(self.next_subscriber);
        self.next_subscriber = self.next_subscriber.saturating_add(1);
        self.subscribers.insert(id, sender);
        id
    }

    fn unsubscribe(&mut self, id: SubscriberId) {
        self.subscribers.remove(&id);
    }

    fn sync(&mut self, now: DateTime<Utc>) {
        let Some(last) = self.last_sync.replace(now) else {
            return;
        };
        let elapsed_ms = now.signed_duration_since(last).num_milliseconds().max(0);
        #[allow(clippy::cast_precision_loss)]
        let minutes = elapsed_ms as f64 / 60_000.0;
        self.advance_minutes(minutes);
    }
}

/// An instant far enough ahead to mean "not until told otherwise".
fn far_future() -> Instant {
    let now = Instant::now();
    now.checked_add(std::time::Duration::from_secs(60 * 60 * 24 * 365))
        .unwrap_or(now)
}
