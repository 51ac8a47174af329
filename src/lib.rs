//! Fault-tolerant mutual exclusion for participants arranged in a ring.
//!
//! Two tokens chase each other around the ring: the PING grants the critical
//! section and the PONG detects its loss. Their stamps let every participant
//! discard stale copies, regenerate a lost token and break ties with a new
//! incarnation.

pub mod config;
pub mod critical_section;
pub mod fault;
pub mod log;
pub mod message;
pub mod peer;
pub mod ring;
pub mod stats;
pub mod sync;
pub mod tcp;
pub mod token;
pub mod topology;
pub mod transport;

pub use config::{ConfigError, FaultConfig, PeerConfig, Timings};
pub use critical_section::{CriticalSection, SleepCriticalSection};
pub use message::{Message, MessageKind, Stamp};
pub use peer::Peer;
pub use ring::{LocalRing, RingHandle};
pub use token::TokenState;
pub use topology::Participant;
