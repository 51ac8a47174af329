//! Module that simulates the loss of outbound messages.

use crate::{
    config::{ConfigError, FaultConfig},
    message::MessageKind,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::sync::Mutex;

/// Enum that tells which outbound messages may be lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossMode {
    None,
    Ping(u8),
    Pong(u8),
}

/// Struct that decides, send by send, whether a message is lost on purpose.
pub struct FaultInjector {
    mode: LossMode,
    rng: Mutex<SmallRng>,
}

impl FaultInjector {
    /// Function that validates the configuration and creates an injector.
    pub fn new(config: &FaultConfig, seed: Option<u64>) -> Result<Self, ConfigError> {
        let mode = match (config.ping_loss_percent, config.pong_loss_percent) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingLossModes),
            (Some(percent), None) => LossMode::Ping(check_percent(percent)?),
            (None, Some(percent)) => LossMode::Pong(check_percent(percent)?),
            (None, None) => LossMode::None,
        };

        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        Ok(Self {
            mode,
            rng: Mutex::new(rng),
        })
    }

    pub fn mode(&self) -> LossMode {
        self.mode
    }

    /// Function that draws whether an outbound message of `kind` is lost.
    pub fn should_drop(&self, kind: MessageKind) -> bool {
        let percent = match (self.mode, kind) {
            (LossMode::Ping(percent), MessageKind::Ping) => percent,
            (LossMode::Pong(percent), MessageKind::Pong) => percent,
            _ => return false,
        };

        let draw = match self.rng.lock() {
            Ok(mut rng) => rng.random_range(0..100u8),
            Err(poisoned) => poisoned.into_inner().random_range(0..100u8),
        };
        draw < percent
    }
}

fn check_percent(percent: u8) -> Result<u8, ConfigError> {
    if percent > 100 {
        return Err(ConfigError::InvalidLossPercent(percent));
    }
    Ok(percent)
}
