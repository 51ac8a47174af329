use crate::token::TokenState;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, Notify};

/// Struct that shares a participant's [`TokenState`] between its receiver and
/// control loops.
#[derive(Clone, Default)]
pub struct SharedToken {
    state: Arc<Mutex<TokenState>>,
    changed: Arc<Notify>,
}

impl SharedToken {
    pub fn new(state: TokenState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            changed: Arc::new(Notify::new()),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().await
    }

    pub async fn snapshot(&self) -> TokenState {
        *self.state.lock().await
    }

    /// Wake the control loop so it re-checks the state.
    pub fn notify(&self) {
        self.changed.notify_one();
    }

    /// Block until the critical section is granted.
    ///
    /// The predicate is re-checked after every wakeup, stale wakeups included.
    pub async fn wait_for_grant(&self) {
        loop {
            let changed = self.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            if self.state.lock().await.critical_section_pending() {
                return;
            }

            changed.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn spurious_wakeup_does_not_release_waiter() {
        let token = SharedToken::new(TokenState::new());
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.wait_for_grant().await })
        };

        token.notify();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        token.lock().await.on_ping(1);
        token.notify();
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter released after grant")
            .unwrap();
    }

    #[tokio::test]
    async fn grant_before_wait_is_seen() {
        let token = SharedToken::new(TokenState::new());
        token.lock().await.on_ping(1);
        token.notify();

        timeout(Duration::from_secs(1), token.wait_for_grant())
            .await
            .expect("pending grant observed immediately");
    }
}
