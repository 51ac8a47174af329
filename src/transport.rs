//! Module that moves messages between neighbours of the ring.

use crate::{message::Message, topology::successor_of};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::codec::LinesCodecError;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("The link to the neighbour is closed.")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Framing error: {0}")]
    Codec(#[from] LinesCodecError),

    #[error("Malformed message: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Sending half of the link to the successor. Shared by both loops of a participant.
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send(&self, message: Message) -> Result<(), TransportError>;
}

/// Receiving half of the link from the predecessor.
#[async_trait]
pub trait Inbound: Send {
    async fn recv(&mut self) -> Result<Message, TransportError>;
}

/// The two link ends a participant is handed at startup.
pub struct Endpoints {
    pub inbound: Box<dyn Inbound>,
    pub outbound: Arc<dyn Outbound>,
}

pub struct ChannelOutbound(UnboundedSender<Message>);

pub struct ChannelInbound(UnboundedReceiver<Message>);

#[async_trait]
impl Outbound for ChannelOutbound {
    async fn send(&self, message: Message) -> Result<(), TransportError> {
        self.0.send(message).map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl Inbound for ChannelInbound {
    async fn recv(&mut self) -> Result<Message, TransportError> {
        self.0.recv().await.ok_or(TransportError::Closed)
    }
}

/// Function that wires `ring_size` participants together with in-memory links.
///
/// The endpoints at index `i` belong to participant `i`; its outbound feeds
/// the inbound of its successor.
pub fn channel_ring(ring_size: usize) -> Vec<Endpoints> {
    let (senders, receivers): (Vec<_>, Vec<_>) =
        (0..ring_size).map(|_| mpsc::unbounded_channel()).unzip();

    receivers
        .into_iter()
        .enumerate()
        .map(|(id, receiver)| Endpoints {
            inbound: Box::new(ChannelInbound(receiver)),
            outbound: Arc::new(ChannelOutbound(
                senders[successor_of(id, ring_size)].clone(),
            )),
        })
        .collect()
}
