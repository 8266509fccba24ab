use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures::SinkExt;
use futures::TryStreamExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::message::frame;
use super::message::GossipMessage;
use crate::gossip::errors::MessengerError;
use crate::gossip::traits::Messenger;
use crate::gossip::traits::SynAck;
use crate::models::peer::Peer;
use crate::models::peer::PeerDigest;
use crate::models::peer::PeerIdentity;

/// Default bound on connecting to a target and on waiting for its answer.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// [`Messenger`] opening one TCP connection per request.
///
/// A target that refuses the connection, drops it, or does not answer
/// within the timeout is unreachable.
#[derive(Debug, Clone)]
pub struct TcpMessenger {
    timeout: Duration,
}

impl TcpMessenger {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn connect(&self, address: SocketAddr) -> Result<TcpStream, MessengerError> {
        match timeout(self.timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => {
                debug!("Failed to establish TCP connection to {address}: {e}");
                Err(MessengerError::Unreachable(address))
            }
            Err(_) => {
                debug!("Timed out connecting to {address}");
                Err(MessengerError::Unreachable(address))
            }
        }
    }
}

impl Default for TcpMessenger {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait::async_trait]
impl Messenger for TcpMessenger {
    async fn send_syn(
        &self,
        target: &PeerIdentity,
        known: Vec<PeerDigest>,
    ) -> Result<SynAck, MessengerError> {
        let address = target.address();
        let stream = self.connect(address).await?;
        syn_exchange(stream, address, known, self.timeout).await
    }

    async fn send_ack(
        &self,
        target: &PeerIdentity,
        requested: Vec<Peer>,
    ) -> Result<(), MessengerError> {
        let address = target.address();
        let stream = self.connect(address).await?;
        ack_exchange(stream, address, requested, self.timeout).await
    }
}

pub(crate) async fn syn_exchange<S>(
    stream: S,
    address: SocketAddr,
    known: Vec<PeerDigest>,
    response_timeout: Duration,
) -> Result<SynAck, MessengerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match request(stream, address, GossipMessage::Syn(known), response_timeout).await? {
        GossipMessage::SynAck(syn_ack) => Ok(syn_ack),
        other => Err(unexpected_answer(address, &other)),
    }
}

pub(crate) async fn ack_exchange<S>(
    stream: S,
    address: SocketAddr,
    requested: Vec<Peer>,
    response_timeout: Duration,
) -> Result<(), MessengerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match request(stream, address, GossipMessage::Ack(requested), response_timeout).await? {
        GossipMessage::AckReceived => Ok(()),
        other => Err(unexpected_answer(address, &other)),
    }
}

async fn request<S>(
    stream: S,
    address: SocketAddr,
    message: GossipMessage,
    response_timeout: Duration,
) -> Result<GossipMessage, MessengerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut peer = frame(stream);
    debug!("Sending {} to {address}", message.get_type());
    peer.send(message)
        .await
        .map_err(|e| classify_io_error(address, e))?;

    match timeout(response_timeout, peer.try_next()).await {
        Ok(Ok(Some(answer))) => Ok(answer),
        Ok(Ok(None)) => {
            debug!("{address} closed the connection without answering");
            Err(MessengerError::Unreachable(address))
        }
        Ok(Err(e)) => Err(classify_io_error(address, e)),
        Err(_) => {
            debug!("{address} did not answer in time");
            Err(MessengerError::Unreachable(address))
        }
    }
}

fn unexpected_answer(address: SocketAddr, answer: &GossipMessage) -> MessengerError {
    MessengerError::Transport {
        peer: address,
        reason: format!("unexpected {} answer", answer.get_type()),
    }
}

/// A connection going away is unreachability; anything else, such as a
/// malformed or oversized frame, is a transport failure.
fn classify_io_error(address: SocketAddr, error: io::Error) -> MessengerError {
    match error.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::TimedOut => MessengerError::Unreachable(address),
        _ => MessengerError::Transport {
            peer: address,
            reason: error.to_string(),
        },
    }
}
