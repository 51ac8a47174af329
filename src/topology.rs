//! Module that places participants on the ring.

use crate::config::ConfigError;
use std::fmt;

/// Ordinal id of the participant that seeds the ring.
pub const INIT_NODE: usize = 0;

/// Function that returns the id messages from `id` are sent to.
pub fn successor_of(id: usize, ring_size: usize) -> usize {
    (id + 1) % ring_size
}

/// Struct that represents one member of the ring. Immutable after startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participant {
    pub id: usize,
    pub ring_size: usize,
    pub successor_id: usize,
}

impl Participant {
    pub fn new(id: usize, ring_size: usize) -> Result<Self, ConfigError> {
        if ring_size == 0 {
            return Err(ConfigError::EmptyRing);
        }
        if id >= ring_size {
            return Err(ConfigError::ParticipantOutOfRange { id, ring_size });
        }

        Ok(Self {
            id,
            ring_size,
            successor_id: successor_of(id, ring_size),
        })
    }

    /// Function that tells if this participant performs genesis.
    pub fn is_initiator(&self) -> bool {
        self.id == INIT_NODE
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node [{}]", self.id)
    }
}
