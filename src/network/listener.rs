use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use futures::SinkExt;
use futures::TryStreamExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::debug;
use tracing::warn;

use super::message::frame;
use super::message::GossipMessage;
use crate::gossip::service::DiscoveryService;

/// Accept gossip connections forever, answering each on its own task.
pub async fn serve(
    listener: TcpListener,
    service: Arc<DiscoveryService>,
    request_timeout: Duration,
) -> Result<()> {
    loop {
        let (stream, peer_address) = match listener.accept().await {
            Ok(connection) => connection,
            Err(e) => {
                warn!("Failed to accept gossip connection: {e}");
                continue;
            }
        };

        let service = service.clone();
        tokio::spawn(async move {
            if let Err(e) = answer_peer(stream, peer_address, &service, request_timeout).await {
                warn!("Gossip request from {peer_address} failed: {e:#}");
            }
        });
    }
}

/// Answer the single request carried by an incoming connection.
///
/// A connection closed before sending anything is not an error.
pub async fn answer_peer<S>(
    stream: S,
    peer_address: SocketAddr,
    service: &DiscoveryService,
    request_timeout: Duration,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!("Established incoming TCP connection with {peer_address}");
    let mut peer = frame(stream);

    let Some(request) = timeout(request_timeout, peer.try_next()).await?? else {
        debug!("{peer_address} closed the connection without a request");
        return Ok(());
    };

    let answer = match request {
        GossipMessage::Syn(digests) => {
            debug!("Got syn with {} digests from {peer_address}", digests.len());
            GossipMessage::SynAck(service.compare_incoming(&digests).await?)
        }
        GossipMessage::Ack(peers) => {
            debug!("Got ack with {} records from {peer_address}", peers.len());
            service.acknowledge_incoming(peers).await?;
            GossipMessage::AckReceived
        }
        other => bail!("Unexpected {} request from {peer_address}", other.get_type()),
    };

    timeout(request_timeout, peer.send(answer)).await??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;
    use tracing_test::traced_test;

    use super::*;
    use crate::gossip::traits::SynAck;
    use crate::notifier::DiscoveryEvent;
    use crate::tests::shared::get_dummy_digest;
    use crate::tests::shared::get_dummy_identity;
    use crate::tests::shared::get_dummy_peer;
    use crate::tests::shared::get_dummy_seed;
    use crate::tests::shared::get_test_node;
    use crate::tests::shared::to_bytes;
    use crate::tests::shared::StaticNetworker;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn peer_address() -> SocketAddr {
        get_dummy_identity(2).address()
    }

    #[traced_test]
    #[tokio::test]
    async fn syn_is_answered_from_the_known_set() -> Result<()> {
        let node = get_test_node(1, vec![get_dummy_seed(2)], StaticNetworker::healthy()).await;
        let received = vec![get_dummy_digest(5, 100, 10)];
        let expected = SynAck {
            unknown: received.clone(),
            new: vec![node.service.local_peer().await],
        };

        let mock = Builder::new()
            .read(&to_bytes(&GossipMessage::Syn(received))?)
            .write(&to_bytes(&GossipMessage::SynAck(expected))?)
            .build();

        answer_peer(mock, peer_address(), &node.service, TIMEOUT).await
    }

    #[traced_test]
    #[tokio::test]
    async fn ack_records_are_stored() -> Result<()> {
        let node = get_test_node(1, vec![get_dummy_seed(2)], StaticNetworker::healthy()).await;
        let offered = get_dummy_peer(5, 100, 10);

        let mock = Builder::new()
            .read(&to_bytes(&GossipMessage::Ack(vec![offered.clone()]))?)
            .write(&to_bytes(&GossipMessage::AckReceived)?)
            .build();

        answer_peer(mock, peer_address(), &node.service, TIMEOUT).await?;

        assert!(node.service.known_peers().await?.contains(&offered));
        assert_eq!(
            vec![DiscoveryEvent::Discovered(offered)],
            node.notifier.events()
        );
        Ok(())
    }

    #[traced_test]
    #[tokio::test]
    async fn answers_are_not_requests() -> Result<()> {
        let node = get_test_node(1, vec![get_dummy_seed(2)], StaticNetworker::healthy()).await;
        let mock = Builder::new()
            .read(&to_bytes(&GossipMessage::AckReceived)?)
            .build();

        assert!(answer_peer(mock, peer_address(), &node.service, TIMEOUT)
            .await
            .is_err());
        Ok(())
    }

    #[traced_test]
    #[tokio::test]
    async fn silent_connection_is_not_an_error() -> Result<()> {
        let node = get_test_node(1, vec![get_dummy_seed(2)], StaticNetworker::healthy()).await;
        let mock = Builder::new().build();

        answer_peer(mock, peer_address(), &node.service, TIMEOUT).await
    }
}
