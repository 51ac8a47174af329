//! Module that holds the runtime configuration of a participant.

use std::time::Duration;
use thiserror::Error;

/// Default chance, in percent, that a simulated loss drops a message.
pub const DEFAULT_LOSS_PERCENT: u8 = 20;

/// Default time a participant spends inside its critical section.
pub const CRITICAL_SECTION_SLEEP_TIME: Duration = Duration::from_millis(1000);

/// Default pause before every outbound PONG.
pub const PONG_SEND_DELAY: Duration = Duration::from_millis(500);

/// Errors detected before the protocol starts. All of them are fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Use only one option switch: --ping or --pong.")]
    ConflictingLossModes,

    #[error("Loss chance must be between 0 and 100 percent, got {0}.")]
    InvalidLossPercent(u8),

    #[error("A loss chance needs a mode: add --ping or --pong.")]
    LossPercentWithoutMode,

    #[error("The ring needs at least one participant.")]
    EmptyRing,

    #[error("Participant {id} is outside of a ring of size {ring_size}.")]
    ParticipantOutOfRange { id: usize, ring_size: usize },
}

/// Which outbound messages a participant may lose on purpose.
///
/// At most one of the two is set. [`crate::fault::FaultInjector::new`] rejects
/// configurations that set both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultConfig {
    pub ping_loss_percent: Option<u8>,
    pub pong_loss_percent: Option<u8>,
}

impl FaultConfig {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn ping_loss(percent: u8) -> Self {
        Self {
            ping_loss_percent: Some(percent),
            pong_loss_percent: None,
        }
    }

    pub fn pong_loss(percent: u8) -> Self {
        Self {
            ping_loss_percent: None,
            pong_loss_percent: Some(percent),
        }
    }

    /// Function that maps the `--ping`/`--pong` switches to a configuration.
    pub fn from_flags(simulate_ping_loss: bool, simulate_pong_loss: bool) -> Self {
        Self {
            ping_loss_percent: simulate_ping_loss.then_some(DEFAULT_LOSS_PERCENT),
            pong_loss_percent: simulate_pong_loss.then_some(DEFAULT_LOSS_PERCENT),
        }
    }

    /// Function that overrides the loss chance of whichever mode is selected.
    pub fn with_percent(mut self, percent: u8) -> Result<Self, ConfigError> {
        if self == Self::none() {
            return Err(ConfigError::LossPercentWithoutMode);
        }
        if self.ping_loss_percent.is_some() {
            self.ping_loss_percent = Some(percent);
        }
        if self.pong_loss_percent.is_some() {
            self.pong_loss_percent = Some(percent);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// How long the default critical section body sleeps.
    pub critical_section: Duration,
    /// Pause applied before sending any PONG.
    pub pong_send_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            critical_section: CRITICAL_SECTION_SLEEP_TIME,
            pong_send_delay: PONG_SEND_DELAY,
        }
    }
}

/// Configuration handed to every participant of the ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerConfig {
    pub timings: Timings,
    pub fault: FaultConfig,
    /// Seed of the loss draws. Participant `i` uses `seed + i`; `None` uses OS entropy.
    pub seed: Option<u64>,
}

impl PeerConfig {
    pub fn with_critical_section(mut self, duration: Duration) -> Self {
        self.timings.critical_section = duration;
        self
    }

    pub fn with_pong_send_delay(mut self, duration: Duration) -> Self {
        self.timings.pong_send_delay = duration;
        self
    }

    pub fn with_fault(mut self, fault: FaultConfig) -> Self {
        self.fault = fault;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Function that returns the seed of a given participant, if any.
    pub fn seed_for(&self, id: usize) -> Option<u64> {
        self.seed.map(|seed| seed.wrapping_add(id as u64))
    }
}
