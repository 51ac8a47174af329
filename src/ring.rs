//! Module that runs a whole ring inside one process over in-memory links.

use crate::{
    config::{ConfigError, PeerConfig},
    critical_section::{CriticalSection, SleepCriticalSection},
    peer::Peer,
    stats::StatsSnapshot,
    sync::SharedToken,
    topology::Participant,
    transport::channel_ring,
};
use std::{error::Error, sync::Arc};
use tokio::task::JoinHandle;

pub type RunResult = Result<(), Box<dyn Error + Send + Sync>>;

pub struct LocalRing {
    peers: Vec<Peer>,
}

/// Handle on the participants of a running [`LocalRing`]. Dropping it stops them,
/// there is no other way to shut a ring down.
pub struct RingHandle {
    participants: Vec<JoinHandle<RunResult>>,
}

impl LocalRing {
    /// Function that validates the configuration of every participant up front,
    /// so nothing is sent when any of them is misconfigured.
    pub fn new(
        ring_size: usize,
        config: &PeerConfig,
        critical_section: Arc<dyn CriticalSection>,
    ) -> Result<Self, ConfigError> {
        if ring_size == 0 {
            return Err(ConfigError::EmptyRing);
        }

        let peers = (0..ring_size)
            .map(|id| {
                Peer::new(
                    Participant::new(id, ring_size)?,
                    config,
                    Arc::clone(&critical_section),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { peers })
    }

    /// Function that builds a ring whose critical section sleeps for the configured time.
    pub fn with_sleep(ring_size: usize, config: &PeerConfig) -> Result<Self, ConfigError> {
        let critical_section = Arc::new(SleepCriticalSection::new(config.timings.critical_section));
        Self::new(ring_size, config, critical_section)
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn tokens(&self) -> Vec<SharedToken> {
        self.peers.iter().map(Peer::token).collect()
    }

    pub fn stats(&self) -> Vec<StatsSnapshot> {
        self.peers.iter().map(|peer| peer.stats().snapshot()).collect()
    }

    pub fn spawn(&self) -> RingHandle {
        let participants = self
            .peers
            .iter()
            .cloned()
            .zip(channel_ring(self.peers.len()))
            .map(|(peer, endpoints)| tokio::spawn(peer.run(endpoints)))
            .collect();

        RingHandle { participants }
    }

    /// Function that runs the ring until a participant stops.
    pub async fn run(self) -> RunResult {
        let mut handle = self.spawn();
        handle.wait_any().await
    }
}

impl RingHandle {
    /// Function that returns how many participants are still running.
    pub fn running(&self) -> usize {
        self.participants
            .iter()
            .filter(|participant| !participant.is_finished())
            .count()
    }

    /// Function that waits until any participant stops and returns its result.
    ///
    /// Call it at most once: finished participants are not removed.
    pub async fn wait_any(&mut self) -> RunResult {
        if self.participants.is_empty() {
            return Ok(());
        }

        let (joined, _, _) = futures::future::select_all(self.participants.iter_mut()).await;
        joined?
    }
}

impl Drop for RingHandle {
    fn drop(&mut self) {
        for participant in &self.participants {
            participant.abort();
        }
    }
}
