//! Module that runs one participant of the ring.
//!
//! A participant runs two tasks over one [`SharedToken`]: the receiver loop
//! applies every inbound message to the token state, and the control loop
//! waits for the grant, runs the critical section and forwards the PING.

use crate::{
    config::{ConfigError, PeerConfig, Timings},
    critical_section::CriticalSection,
    fault::{FaultInjector, LossMode},
    log,
    message::{Message, MessageKind, Stamp},
    stats::PeerStats,
    sync::SharedToken,
    token::{PingOutcome, PongOutcome, TokenState},
    topology::Participant,
    transport::{Endpoints, Inbound, Outbound, TransportError},
};
use color_print::cformat;
use std::{error::Error, sync::Arc};
use tokio::{task::JoinSet, time::sleep};

#[derive(Clone)]
pub struct Peer {
    participant: Participant,
    timings: Timings,
    token: SharedToken,
    fault: Arc<FaultInjector>,
    stats: Arc<PeerStats>,
    critical_section: Arc<dyn CriticalSection>,
}

/// A peer bound to the link towards its successor.
struct Node {
    peer: Peer,
    outbound: Arc<dyn Outbound>,
}

impl Peer {
    pub fn new(
        participant: Participant,
        config: &PeerConfig,
        critical_section: Arc<dyn CriticalSection>,
    ) -> Result<Self, ConfigError> {
        let fault = FaultInjector::new(&config.fault, config.seed_for(participant.id))?;

        Ok(Self {
            participant,
            timings: config.timings,
            token: SharedToken::new(TokenState::new()),
            fault: Arc::new(fault),
            stats: Arc::new(PeerStats::default()),
            critical_section,
        })
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn token(&self) -> SharedToken {
        self.token.clone()
    }

    pub fn stats(&self) -> Arc<PeerStats> {
        Arc::clone(&self.stats)
    }

    /// Function that runs the participant until one of its links fails.
    ///
    /// The initiator seeds the ring once both loops are running.
    pub async fn run(self, endpoints: Endpoints) -> Result<(), Box<dyn Error + Send + Sync>> {
        let Endpoints { inbound, outbound } = endpoints;
        let node = Arc::new(Node {
            peer: self,
            outbound,
        });

        node.info(&cformat!(
            "joined a ring of <bold>{}</bold>, passing tokens to <bold>Node [{}]</bold>.",
            node.peer.participant.ring_size,
            node.peer.participant.successor_id
        ));
        match node.peer.fault.mode() {
            LossMode::None => {}
            LossMode::Ping(percent) => {
                node.info(&cformat!("losing <bold>{percent}%</bold> of forwarded PINGs."))
            }
            LossMode::Pong(percent) => {
                node.info(&cformat!("losing <bold>{percent}%</bold> of forwarded PONGs."))
            }
        }

        // dropping the set aborts both loops
        let mut loops = JoinSet::new();
        loops.spawn(Arc::clone(&node).receive_loop(inbound));
        loops.spawn(Arc::clone(&node).control_loop());

        if node.peer.participant.is_initiator() {
            node.genesis().await?;
        }

        match loops.join_next().await {
            Some(Ok(Err(e))) => {
                node.error(&format!("protocol loop stopped: {e}"));
                Err(e.into())
            }
            Some(Err(e)) => {
                node.error("protocol loop failed.");
                Err(e.into())
            }
            Some(Ok(Ok(()))) | None => Ok(()),
        }
    }
}

impl Node {
    fn debug(&self, event: &str) {
        log::debug(&cformat!("<bold>{}</bold>: {event}", self.peer.participant));
    }

    fn info(&self, event: &str) {
        log::info(&cformat!("<bold>{}</bold>: {event}", self.peer.participant));
    }

    fn warn(&self, event: &str, stamp: Stamp) {
        log::warn(&cformat!(
            "<bold>{}</bold>: {event} <bold>[{stamp}]</bold>",
            self.peer.participant
        ));
    }

    fn error(&self, event: &str) {
        log::error(&cformat!("<bold>{}</bold>: {event}", self.peer.participant));
    }

    async fn send(&self, message: Message) -> Result<(), TransportError> {
        self.debug(&cformat!("sent <bold>{message}</bold>"));
        self.outbound.send(message).await
    }

    /// Seed round one: PING then PONG back to back, neither committed.
    async fn genesis(&self) -> Result<(), TransportError> {
        let mut state = self.peer.token.lock().await;
        *state = TokenState::genesis();

        self.info("seeding the ring.");
        self.send(Message::ping(state.pending_ping())).await?;
        self.send(Message::pong(state.pending_pong())).await
    }

    async fn receive_loop(
        self: Arc<Self>,
        mut inbound: Box<dyn Inbound>,
    ) -> Result<(), TransportError> {
        loop {
            let message = inbound.recv().await?;
            self.debug(&cformat!("received <bold>{message}</bold>"));

            match message.kind {
                MessageKind::Ping => self.handle_ping(message.stamp).await?,
                MessageKind::Pong => {
                    // the PONG is paced here, while it is still in flight
                    sleep(self.peer.timings.pong_send_delay).await;
                    self.handle_pong(message.stamp).await?
                }
            }
        }
    }

    async fn handle_ping(&self, stamp: Stamp) -> Result<(), TransportError> {
        let mut state = self.peer.token.lock().await;
        let already_granted = state.critical_section_pending();
        let outcome = state.on_ping(stamp);

        match outcome {
            PingOutcome::Stale => {
                drop(state);
                self.peer.stats.record_stale();
                self.debug(&format!("stale PING [{stamp}] discarded"));
                return Ok(());
            }
            PingOutcome::RegeneratePong { pong } => {
                self.warn("PING came back, regenerating PONG", pong);
                self.peer.stats.record_pong_regenerated();
                self.send(Message::pong(pong)).await?;
            }
            PingOutcome::Granted if already_granted => {}
            PingOutcome::Granted => self.peer.stats.record_grant(),
        }

        drop(state);
        self.peer.token.notify();
        Ok(())
    }

    /// The PONG forward is decided, committed and sent under one lock, so the
    /// control loop never sees a PONG that is neither in the state nor on the link.
    async fn handle_pong(&self, stamp: Stamp) -> Result<(), TransportError> {
        let mut state = self.peer.token.lock().await;
        let outcome = state.on_pong(stamp);

        let PongOutcome::Accepted {
            regenerated_ping,
            forward,
        } = outcome
        else {
            drop(state);
            self.peer.stats.record_stale();
            self.debug(&format!("stale PONG [{stamp}] discarded"));
            return Ok(());
        };

        if let Some(ping) = regenerated_ping {
            self.warn("PONG came back, regenerating PING", ping);
            self.peer.stats.record_ping_regenerated();
            self.send(Message::ping(ping)).await?;
        }
        if !forward.commit {
            self.warn("PONG lapped the grant, new incarnation", forward.stamp);
            self.peer.stats.record_incarnation();
        }

        if self.peer.fault.should_drop(MessageKind::Pong) {
            self.peer.stats.record_pong_dropped();
            self.warn("simulated loss of PONG", forward.stamp);
        } else {
            if forward.commit {
                state.commit(forward.stamp);
            }
            self.send(Message::pong(forward.stamp)).await?;
            self.peer.stats.record_pong_sent();
        }

        drop(state);
        self.peer.token.notify();
        Ok(())
    }

    async fn control_loop(self: Arc<Self>) -> Result<(), TransportError> {
        loop {
            self.peer.token.wait_for_grant().await;

            self.info("entered critical section");
            self.peer
                .critical_section
                .execute(&self.peer.participant)
                .await;
            self.info("left critical section");
            self.peer.stats.record_critical_section();

            let mut state = self.peer.token.lock().await;
            let ping = state.release();

            if self.peer.fault.should_drop(MessageKind::Ping) {
                self.peer.stats.record_ping_dropped();
                self.warn("simulated loss of PING", ping);
                continue;
            }

            state.commit(ping);
            self.send(Message::ping(ping)).await?;
            self.peer.stats.record_ping_sent();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::FaultConfig, critical_section::SleepCriticalSection, transport::channel_ring,
    };
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Inbound fed by the test, outbound captured by the test.
    fn scripted_endpoints() -> (
        Endpoints,
        mpsc::UnboundedSender<Message>,
        mpsc::UnboundedReceiver<Message>,
    ) {
        struct Script(mpsc::UnboundedReceiver<Message>);
        struct Capture(mpsc::UnboundedSender<Message>);

        #[async_trait::async_trait]
        impl Inbound for Script {
            async fn recv(&mut self) -> Result<Message, TransportError> {
                self.0.recv().await.ok_or(TransportError::Closed)
            }
        }

        #[async_trait::async_trait]
        impl Outbound for Capture {
            async fn send(&self, message: Message) -> Result<(), TransportError> {
                self.0.send(message).map_err(|_| TransportError::Closed)
            }
        }

        let (script_tx, script_rx) = mpsc::unbounded_channel();
        let (capture_tx, capture_rx) = mpsc::unbounded_channel();
        let endpoints = Endpoints {
            inbound: Box::new(Script(script_rx)),
            outbound: Arc::new(Capture(capture_tx)),
        };
        (endpoints, script_tx, capture_rx)
    }

    fn peer(id: usize, ring_size: usize, config: PeerConfig) -> Peer {
        Peer::new(
            Participant::new(id, ring_size).unwrap(),
            &config,
            Arc::new(SleepCriticalSection::new(config.timings.critical_section)),
        )
        .unwrap()
    }

    #[test]
    fn conflicting_loss_modes_fail_before_start() {
        let config = PeerConfig::default().with_fault(FaultConfig::from_flags(true, true));
        let result = Peer::new(
            Participant::new(0, 2).unwrap(),
            &config,
            Arc::new(SleepCriticalSection::new(Duration::ZERO)),
        );
        assert!(matches!(result, Err(ConfigError::ConflictingLossModes)));
    }

    #[tokio::test(start_paused = true)]
    async fn initiator_seeds_ping_then_pong() {
        let peer = peer(0, 3, PeerConfig::default());
        let (endpoints, _script, mut capture) = scripted_endpoints();
        let started = tokio::time::Instant::now();
        let running = tokio::spawn(peer.run(endpoints));

        assert_eq!(capture.recv().await, Some(Message::ping(1)));
        assert_eq!(capture.recv().await, Some(Message::pong(-1)));
        // nothing may overtake the PONG while it waits to be sent
        assert_eq!(started.elapsed(), Duration::ZERO);
        running.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_ping_during_grant_counts_one_grant() {
        let peer = peer(1, 3, PeerConfig::default());
        let stats = peer.stats();
        let (endpoints, script, mut capture) = scripted_endpoints();
        let running = tokio::spawn(peer.run(endpoints));

        script.send(Message::ping(1)).unwrap();
        script.send(Message::ping(1)).unwrap();
        assert_eq!(capture.recv().await, Some(Message::ping(1)));

        let stats = stats.snapshot();
        assert_eq!(stats.grants, 1);
        assert_eq!(stats.critical_sections, 1);
        running.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn pong_is_paced_on_receipt() {
        let config = PeerConfig::default().with_pong_send_delay(Duration::from_millis(300));
        let peer = peer(1, 3, config);
        let (endpoints, script, mut capture) = scripted_endpoints();
        let running = tokio::spawn(peer.run(endpoints));

        let started = tokio::time::Instant::now();
        script.send(Message::pong(-1)).unwrap();
        assert_eq!(capture.recv().await, Some(Message::pong(-1)));
        assert_eq!(started.elapsed(), Duration::from_millis(300));
        running.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn granted_ping_is_forwarded_and_committed() {
        let peer = peer(1, 3, PeerConfig::default());
        let token = peer.token();
        let stats = peer.stats();
        let (endpoints, script, mut capture) = scripted_endpoints();
        let running = tokio::spawn(peer.run(endpoints));

        script.send(Message::ping(1)).unwrap();
        assert_eq!(capture.recv().await, Some(Message::ping(1)));

        let state = token.snapshot().await;
        assert_eq!(state.saved_stamp(), 1);
        assert!(!state.critical_section_pending());
        assert_eq!(stats.snapshot().critical_sections, 1);
        running.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn pong_while_granted_forwards_new_incarnation() {
        let peer = peer(1, 3, PeerConfig::default());
        let token = peer.token();
        let (endpoints, script, mut capture) = scripted_endpoints();
        let running = tokio::spawn(peer.run(endpoints));

        script.send(Message::ping(1)).unwrap();
        script.send(Message::pong(-1)).unwrap();

        // the PONG leaves after half a second, the PING after a full second
        assert_eq!(capture.recv().await, Some(Message::pong(-2)));
        assert_eq!(capture.recv().await, Some(Message::ping(2)));
        assert_eq!(token.snapshot().await.saved_stamp(), 2);
        running.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_messages_are_absorbed() {
        let peer = peer(1, 3, PeerConfig::default());
        let token = peer.token();
        let stats = peer.stats();
        token.lock().await.commit(5);
        let (endpoints, script, mut capture) = scripted_endpoints();
        let running = tokio::spawn(peer.run(endpoints));

        script.send(Message::ping(2)).unwrap();
        script.send(Message::pong(-4)).unwrap();
        script.send(Message::pong(-6)).unwrap();

        assert_eq!(capture.recv().await, Some(Message::pong(-6)));
        assert_eq!(stats.snapshot().stale_discarded, 2);
        assert_eq!(stats.snapshot().grants, 0);
        assert_eq!(token.snapshot().await.saved_stamp(), -6);
        running.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn returning_ping_regenerates_uncommitted_pong() {
        let peer = peer(1, 3, PeerConfig::default());
        let token = peer.token();
        token.lock().await.commit(3);
        let (endpoints, script, mut capture) = scripted_endpoints();
        let running = tokio::spawn(peer.run(endpoints));

        script.send(Message::ping(3)).unwrap();
        assert_eq!(capture.recv().await, Some(Message::pong(-3)));

        let state = token.snapshot().await;
        assert_eq!(state.saved_stamp(), 3);
        assert!(!state.critical_section_pending());
        running.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_ping_is_not_committed() {
        let config = PeerConfig::default()
            .with_fault(FaultConfig::ping_loss(100))
            .with_seed(1);
        let peer = peer(1, 3, config);
        let token = peer.token();
        let stats = peer.stats();
        let (endpoints, script, mut capture) = scripted_endpoints();
        let running = tokio::spawn(peer.run(endpoints));

        script.send(Message::ping(1)).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(capture.try_recv().is_err());
        assert_eq!(stats.snapshot().pings_dropped, 1);
        assert_eq!(token.snapshot().await.saved_stamp(), 0);
        running.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn closed_link_stops_the_participant() {
        let mut endpoints = channel_ring(2);
        let peer = peer(1, 2, PeerConfig::default());
        let mine = endpoints.remove(1);
        drop(endpoints);

        assert!(peer.run(mine).await.is_err());
    }
}
