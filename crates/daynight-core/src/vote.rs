//! Skip-night voting: sessions, cooldowns, and quorum math.
//!
//! A [`VoteSession`] exists only while it is night and voting is enabled.
//! It is opened on sunset and torn down on the next transition into day,
//! whatever caused it. Voter cooldowns live in [`VoteCooldowns`], outside
//! the session, so they carry over from one night to the next unless
//! `reset_cooldowns_on_session_end` is set.
//!
//! # Check Order
//!
//! [`VoteBoard::cast`] evaluates, first failure wins:
//!
//! 1. voting enabled
//! 2. a session is open and `now < ends_at`
//! 3. voter has not voted in this session
//! 4. voter is off cooldown

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeDelta, Utc};
use daynight_types::{VoteOutcome, VoteTally, VoterId};

use crate::config::VoteConfig;

/// Votes needed for quorum: `ceil(eligible * percent / 100)`, at least 1.
pub fn required_votes(eligible_voters: u32, required_percent: u32) -> u32 {
    let percent = u64::from(required_percent.min(100));
    let scaled = u64::from(eligible_voters).saturating_mul(percent);
    let required = scaled.div_ceil(100);
    u32::try_from(required).unwrap_or(u32::MAX).max(1)
}

/// Convert whole seconds into a [`TimeDelta`], saturating on overflow.
pub(crate) fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

// ---------------------------------------------------------------------------
// VoteSession
// ---------------------------------------------------------------------------

/// An open skip-night vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteSession {
    /// When the session opened.
    opened_at: DateTime<Utc>,

    /// Votes cast at or after this instant are rejected.
    ends_at: DateTime<Utc>,

    /// Voters who voted in this session.
    voters: BTreeSet<VoterId>,
}

impl VoteSession {
    /// Open a session at `now` lasting `duration`.
    pub fn open(now: DateTime<Utc>, duration: TimeDelta) -> Self {
        Self {
            opened_at: now,
            ends_at: now.checked_add_signed(duration).unwrap_or(DateTime::<Utc>::MAX_UTC),
            voters: BTreeSet::new(),
        }
    }

    /// When the session opened.
    pub const fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// When the voting window closes.
    pub const fn ends_at(&self) -> DateTime<Utc> {
        self.ends_at
    }

    /// Whether the voting window has closed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at
    }

    /// Whether `voter` already voted in this session.
    pub fn has_voted(&self, voter: VoterId) -> bool {
        self.voters.contains(&voter)
    }

    /// Number of accepted votes.
    pub fn votes(&self) -> u32 {
        u32::try_from(self.voters.len()).unwrap_or(u32::MAX)
    }

    /// Voters who voted, in id order.
    pub fn voters(&self) -> impl Iterator<Item = VoterId> + '_ {
        self.voters.iter().copied()
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> TimeDelta {
        self.ends_at
            .signed_duration_since(now)
            .max(TimeDelta::zero())
    }

    /// Record a vote. Returns `false` if the voter had already voted.
    fn record(&mut self, voter: VoterId) -> bool {
        self.voters.insert(voter)
    }
}

// ---------------------------------------------------------------------------
// VoteCooldowns
// ---------------------------------------------------------------------------

/// Last accepted vote per voter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteCooldowns {
    /// Timestamp of each voter's last accepted vote.
    last_vote: BTreeMap<VoterId, DateTime<Utc>>,
}

impl VoteCooldowns {
    /// Time `voter` must still wait at `now`, if any.
    pub fn remaining(
        &self,
        voter: VoterId,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> Option<TimeDelta> {
        let last = self.last_vote.get(&voter)?;
        let elapsed = now.signed_duration_since(*last);
        if elapsed < window {
            window.checked_sub(&elapsed)
        } else {
            None
        }
    }

    /// Stamp `voter`'s cooldown to `now`.
    pub fn stamp(&mut self, voter: VoterId, now: DateTime<Utc>) {
        self.last_vote.insert(voter, now);
    }

    /// Forget every stamp.
    pub fn clear(&mut self) {
        self.last_vote.clear();
    }

    /// Number of voters with a stamp.
    pub fn len(&self) -> usize {
        self.last_vote.len()
    }

    /// Whether no voter has a stamp.
    pub fn is_empty(&self) -> bool {
        self.last_vote.is_empty()
    }
}

// ---------------------------------------------------------------------------
// VoteBoard
// ---------------------------------------------------------------------------

/// Vote-to-skip state owned by the phase controller: the policy, the
/// optional open session, and the accumulated cooldowns.
#[derive(Debug, Clone)]
pub struct VoteBoard {
    /// Active vote settings.
    policy: VoteConfig,

    /// Session open during the current night, if any.
    session: Option<VoteSession>,

    /// Per-voter cooldown stamps, kept across sessions.
    cooldowns: VoteCooldowns,
}

impl VoteBoard {
    /// Create a board with no open session.
    pub fn new(policy: VoteConfig) -> Self {
        Self {
            policy,
            session: None,
            cooldowns: VoteCooldowns::default(),
        }
    }

    /// Active vote settings.
    pub const fn policy(&self) -> &VoteConfig {
        &self.policy
    }

    /// Replace the vote settings. An open session keeps its deadline.
    pub fn set_policy(&mut self, policy: VoteConfig) {
        self.policy = policy;
    }

    /// The open session, if any.
    pub const fn session(&self) -> Option<&VoteSession> {
        self.session.as_ref()
    }

    /// Accumulated cooldown stamps.
    pub const fn cooldowns(&self) -> &VoteCooldowns {
        &self.cooldowns
    }

    /// Open a fresh session at `now`, replacing any previous one.
    ///
    /// Does nothing and returns `false` when voting is disabled.
    pub fn open(&mut self, now: DateTime<Utc>) -> bool {
        if !self.policy.enabled {
            self.session = None;
            return false;
        }
        self.session = Some(VoteSession::open(now, seconds(self.policy.duration_seconds)));
        true
    }

    /// Tear down the open session. Returns the closed session, if any.
    pub fn close(&mut self) -> Option<VoteSession> {
        let closed = self.session.take();
        if closed.is_some() && self.policy.reset_cooldowns_on_session_end {
            self.cooldowns.clear();
        }
        closed
    }

    /// Evaluate a vote by `voter` at `now` against `eligible_voters`.
    ///
    /// On acceptance the vote is recorded, the voter's cooldown stamped,
    /// and quorum recomputed against the population at call time.
    pub fn cast(
        &mut self,
        voter: VoterId,
        now: DateTime<Utc>,
        eligible_voters: u32,
    ) -> VoteOutcome {
        if !self.policy.enabled {
            return VoteOutcome::VotingDisabled;
        }
        let window = seconds(self.policy.cooldown_seconds);
        let Some(session) = self.session.as_mut() else {
            return VoteOutcome::NoSession;
        };
        if session.is_expired(now) {
            return VoteOutcome::SessionExpired;
        }
        if session.has_voted(voter) {
            return VoteOutcome::AlreadyVoted;
        }
        if let Some(remaining) = self.cooldowns.remaining(voter, now, window) {
            return VoteOutcome::OnCooldown {
                remaining_seconds: ceil_seconds(remaining),
            };
        }

        session.record(voter);
        self.cooldowns.stamp(voter, now);

        let votes = session.votes();
        let required = required_votes(eligible_voters, self.policy.required_percent);
        VoteOutcome::Accepted(VoteTally {
            votes,
            required,
            quorum_reached: votes >= required,
        })
    }

    /// Current tally against `eligible_voters`, if a session is open.
    pub fn tally(&self, eligible_voters: u32) -> Option<VoteTally> {
        let session = self.session.as_ref()?;
        let votes = session.votes();
        let required = required_votes(eligible_voters, self.policy.required_percent);
        Some(VoteTally {
            votes,
            required,
            quorum_reached: votes >= required,
        })
    }
}

/// Whole seconds in `delta`, rounded up.
pub(crate) fn ceil_seconds(delta: TimeDelta) -> u64 {
    let millis = u64::try_from(delta.num_milliseconds()).unwrap_or(0);
    millis.div_ceil(1000)
}
