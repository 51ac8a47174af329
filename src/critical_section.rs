use crate::topology::Participant;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;

/// The exclusive work a participant runs while it holds the grant.
///
/// Implementations must finish in bounded time: the PING stays with the
/// participant until `execute` returns.
#[async_trait]
pub trait CriticalSection: Send + Sync {
    async fn execute(&self, participant: &Participant);
}

/// Critical section that only sleeps for a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct SleepCriticalSection {
    pub duration: Duration,
}

impl SleepCriticalSection {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl CriticalSection for SleepCriticalSection {
    async fn execute(&self, _participant: &Participant) {
        sleep(self.duration).await;
    }
}
