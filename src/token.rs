//! Module that holds the token state of a participant and its transition rules.
//!
//! Everything here is plain data: callers hold the participant's lock while
//! calling into [`TokenState`] and act on the returned outcome afterwards.

use crate::message::Stamp;

/// Stamp used by the initiator to seed the ring.
pub const GENESIS_STAMP: Stamp = 1;

/// Struct that represents the protocol state of one participant.
///
/// `pending_pong` is always `-pending_ping`; only [`TokenState::regenerate`]
/// and [`TokenState::incarnate`] write them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenState {
    saved_stamp: Stamp,
    pending_ping: Stamp,
    pending_pong: Stamp,
    critical_section_pending: bool,
}

/// What to do after a PING has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    /// Older than the last committed stamp. Nothing changed.
    Stale,
    /// The PING came back to the participant that committed it, so the PONG
    /// was lost. Send `PONG(pong)` without committing.
    RegeneratePong { pong: Stamp },
    /// A new round arrived and the critical section is granted.
    Granted,
}

/// What to do after a PONG has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PongOutcome {
    /// Older than the last committed stamp. Nothing changed, nothing forwarded.
    Stale,
    Accepted {
        /// The PONG came back to the participant that committed it, so the PING
        /// was lost. Send `PING(stamp)` right away without committing.
        regenerated_ping: Option<Stamp>,
        /// The PONG to pass downstream.
        forward: PongForward,
    },
}

/// PONG to pass downstream after a PONG has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PongForward {
    pub stamp: Stamp,
    /// False when the PONG carries a fresh incarnation.
    pub commit: bool,
}

impl TokenState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Function that returns the state of the initiator right before genesis.
    pub fn genesis() -> Self {
        let mut state = Self::new();
        state.regenerate(GENESIS_STAMP);
        state
    }

    pub fn saved_stamp(&self) -> Stamp {
        self.saved_stamp
    }

    pub fn pending_ping(&self) -> Stamp {
        self.pending_ping
    }

    pub fn pending_pong(&self) -> Stamp {
        self.pending_pong
    }

    pub fn critical_section_pending(&self) -> bool {
        self.critical_section_pending
    }

    /// Adopt the magnitude of `stamp` without changing the round.
    pub fn regenerate(&mut self, stamp: Stamp) {
        self.pending_ping = stamp.saturating_abs();
        self.pending_pong = -self.pending_ping;
    }

    /// Start a round one higher than the magnitude of `stamp`.
    pub fn incarnate(&mut self, stamp: Stamp) {
        self.pending_ping = stamp.saturating_abs().saturating_add(1);
        self.pending_pong = -self.pending_ping;
    }

    /// Record `stamp` as the new staleness threshold.
    pub fn commit(&mut self, stamp: Stamp) {
        debug_assert!(
            stamp.unsigned_abs() >= self.saved_stamp.unsigned_abs(),
            "committed stamps never shrink: {} after {}",
            stamp,
            self.saved_stamp
        );
        self.saved_stamp = stamp;
    }

    pub fn is_stale_ping(&self, stamp: Stamp) -> bool {
        stamp < self.saved_stamp.saturating_abs()
    }

    pub fn is_stale_pong(&self, stamp: Stamp) -> bool {
        stamp.unsigned_abs() < self.saved_stamp.unsigned_abs()
    }

    /// Apply an inbound PING.
    pub fn on_ping(&mut self, stamp: Stamp) -> PingOutcome {
        if self.is_stale_ping(stamp) {
            return PingOutcome::Stale;
        }

        self.regenerate(stamp);

        if self.saved_stamp == stamp {
            PingOutcome::RegeneratePong {
                pong: self.pending_pong,
            }
        } else {
            self.critical_section_pending = true;
            PingOutcome::Granted
        }
    }

    /// Apply an inbound PONG.
    pub fn on_pong(&mut self, stamp: Stamp) -> PongOutcome {
        if self.is_stale_pong(stamp) {
            return PongOutcome::Stale;
        }

        let mut regenerated_ping = None;
        let mut commit = true;

        if self.critical_section_pending {
            // the ring lapped the participant holding the PING
            self.incarnate(stamp);
            commit = false;
        } else if self.saved_stamp == stamp {
            self.regenerate(stamp);
            regenerated_ping = Some(self.pending_ping);
        } else if self.saved_stamp.unsigned_abs() < stamp.unsigned_abs() {
            self.regenerate(stamp);
        }

        PongOutcome::Accepted {
            regenerated_ping,
            forward: PongForward {
                stamp: self.pending_pong,
                commit,
            },
        }
    }

    /// Leave the critical section and return the PING to pass downstream.
    pub fn release(&mut self) -> Stamp {
        self.critical_section_pending = false;
        self.pending_ping
    }
}
