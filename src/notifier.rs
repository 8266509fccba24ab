//! Sinks for membership events.

use anyhow::Context;
use anyhow::Result;
use tokio::sync::mpsc;
use tracing::info;

use crate::gossip::traits::Notifier;
use crate::models::peer::Peer;
use crate::models::peer::PeerIdentity;

#[derive(Clone, Debug, PartialEq)]
pub enum DiscoveryEvent {
    Discovered(Peer),
    Reachable(PeerIdentity),
    Unreachable(PeerIdentity),
}

impl DiscoveryEvent {
    pub fn get_type(&self) -> String {
        match self {
            DiscoveryEvent::Discovered(_) => "discovered",
            DiscoveryEvent::Reachable(_) => "reachable",
            DiscoveryEvent::Unreachable(_) => "unreachable",
        }
        .to_string()
    }
}

/// Writes every event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify_discovery(&self, peer: &Peer) -> Result<()> {
        info!(
            "peer discovered: {} status {} version {}",
            peer.identity(),
            peer.status(),
            peer.app_state().version
        );
        Ok(())
    }

    async fn notify_reachable(&self, identity: &PeerIdentity) -> Result<()> {
        info!("peer reachable: {identity}");
        Ok(())
    }

    async fn notify_unreachable(&self, identity: &PeerIdentity) -> Result<()> {
        info!("peer unreachable: {identity}");
        Ok(())
    }
}

/// Forwards every event to an in-process consumer. Fails once the receiving
/// end is gone.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    to_consumer: mpsc::Sender<DiscoveryEvent>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DiscoveryEvent>) {
        let (to_consumer, from_notifier) = mpsc::channel(capacity);
        (Self { to_consumer }, from_notifier)
    }

    async fn forward(&self, event: DiscoveryEvent) -> Result<()> {
        let event_type = event.get_type();
        self.to_consumer
            .send(event)
            .await
            .with_context(|| format!("forwarding {event_type} event"))
    }
}

#[async_trait::async_trait]
impl Notifier for ChannelNotifier {
    async fn notify_discovery(&self, peer: &Peer) -> Result<()> {
        self.forward(DiscoveryEvent::Discovered(peer.clone())).await
    }

    async fn notify_reachable(&self, identity: &PeerIdentity) -> Result<()> {
        self.forward(DiscoveryEvent::Reachable(identity.clone())).await
    }

    async fn notify_unreachable(&self, identity: &PeerIdentity) -> Result<()> {
        self.forward(DiscoveryEvent::Unreachable(identity.clone())).await
    }
}
