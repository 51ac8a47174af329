//! Module that links neighbours of the ring over TCP, one JSON message per line.

use crate::{
    log,
    message::Message,
    transport::{Endpoints, Inbound, Outbound, TransportError},
};
use async_trait::async_trait;
use color_print::cformat;
use futures::{SinkExt, StreamExt};
use std::{error::Error, sync::Arc, time::Duration};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::Mutex,
    time::sleep,
};
use tokio_util::codec::{Framed, LinesCodec};

/// Pause between attempts to reach a successor that is not listening yet.
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(200);

pub struct TcpOutbound {
    lines: Mutex<Framed<TcpStream, LinesCodec>>,
}

pub struct TcpInbound {
    lines: Framed<TcpStream, LinesCodec>,
}

impl TcpOutbound {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            lines: Mutex::new(Framed::new(stream, LinesCodec::new())),
        }
    }
}

impl TcpInbound {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            lines: Framed::new(stream, LinesCodec::new()),
        }
    }
}

#[async_trait]
impl Outbound for TcpOutbound {
    async fn send(&self, message: Message) -> Result<(), TransportError> {
        let line = message.to_json_string()?;
        self.lines.lock().await.send(line).await?;
        Ok(())
    }
}

#[async_trait]
impl Inbound for TcpInbound {
    async fn recv(&mut self) -> Result<Message, TransportError> {
        match self.lines.next().await {
            Some(Ok(line)) => Ok(Message::from_json_string(&line)?),
            Some(Err(e)) => Err(e.into()),
            None => Err(TransportError::Closed),
        }
    }
}

/// Function that keeps trying to reach the successor until it listens.
pub async fn connect_with_retry(
    address: &str,
    retry_delay: Duration,
) -> Result<TcpStream, Box<dyn Error + Send + Sync>> {
    loop {
        match TcpStream::connect(address).await {
            Ok(stream) => return Ok(stream),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => return Err(e.into()),
            Err(_) => {
                log::debug(&cformat!(
                    "Successor at <bold>{address}</bold> is not listening yet."
                ));
                sleep(retry_delay).await;
            }
        }
    }
}

/// Function that opens both links of a participant: it accepts its predecessor
/// on `listener` while connecting to its successor at `successor_address`.
pub async fn connect_ring(
    listener: TcpListener,
    successor_address: &str,
) -> Result<Endpoints, Box<dyn Error + Send + Sync>> {
    let accept_predecessor = async {
        let (stream, address) = listener.accept().await?;
        log::info(&cformat!(
            "Accepted the <bold>predecessor</bold> connection from <bold>{address}</bold>."
        ));
        Ok::<_, Box<dyn Error + Send + Sync>>(stream)
    };

    let (predecessor_stream, successor_stream) = tokio::try_join!(
        accept_predecessor,
        connect_with_retry(successor_address, CONNECT_RETRY_DELAY)
    )?;

    log::info(&cformat!(
        "Connected to the <bold>successor</bold> at <bold>{successor_address}</bold>."
    ));

    Ok(Endpoints {
        inbound: Box::new(TcpInbound::new(predecessor_stream)),
        outbound: Arc::new(TcpOutbound::new(successor_stream)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loopback_link_carries_messages() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let mut endpoints = connect_ring(listener, &address).await.unwrap();
        endpoints.outbound.send(Message::ping(3)).await.unwrap();
        endpoints.outbound.send(Message::pong(-3)).await.unwrap();

        assert_eq!(endpoints.inbound.recv().await.unwrap(), Message::ping(3));
        assert_eq!(endpoints.inbound.recv().await.unwrap(), Message::pong(-3));
    }

    #[tokio::test]
    async fn two_participants_form_a_ring() {
        let listener_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let listener_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address_a = listener_a.local_addr().unwrap().to_string();
        let address_b = listener_b.local_addr().unwrap().to_string();

        let (a, b) = tokio::join!(
            connect_ring(listener_a, &address_b),
            connect_ring(listener_b, &address_a)
        );
        let (mut a, mut b) = (a.unwrap(), b.unwrap());

        a.outbound.send(Message::ping(1)).await.unwrap();
        assert_eq!(b.inbound.recv().await.unwrap(), Message::ping(1));

        b.outbound.send(Message::pong(-2)).await.unwrap();
        assert_eq!(a.inbound.recv().await.unwrap(), Message::pong(-2));
    }

    #[tokio::test]
    async fn garbage_line_is_a_decode_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let (accepted, connected) =
            tokio::join!(listener.accept(), TcpStream::connect(&address));
        let mut inbound = TcpInbound::new(accepted.unwrap().0);
        let mut raw = Framed::new(connected.unwrap(), LinesCodec::new());

        raw.send("hot potato".to_string()).await.unwrap();
        assert!(matches!(
            inbound.recv().await,
            Err(TransportError::Decode(_))
        ));
    }
}
