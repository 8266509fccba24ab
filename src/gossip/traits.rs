//! Capabilities the gossip protocol consumes from, or exposes to, the rest
//! of the node. Each one is kept narrow so it can be swapped independently.

use std::collections::HashSet;
use std::net::IpAddr;

use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use super::errors::MessengerError;
use super::errors::NetworkCheckError;
use crate::models::peer::GeoPosition;
use crate::models::peer::Peer;
use crate::models::peer::PeerDigest;
use crate::models::peer::PeerIdentity;
use crate::models::peer::Seed;

/// Answer to a SYN.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SynAck {
    /// Peers the target wants full records for.
    pub unknown: Vec<PeerDigest>,

    /// Peers the target offers, unknown to or staler at the initiator.
    pub new: Vec<Peer>,
}

/// Carries SYN and ACK messages to a single target.
///
/// Implementations must report a target that does not answer as
/// [`MessengerError::Unreachable`] and every other failure as something else.
#[async_trait::async_trait]
pub trait Messenger: Send + Sync {
    async fn send_syn(
        &self,
        target: &PeerIdentity,
        known: Vec<PeerDigest>,
    ) -> Result<SynAck, MessengerError>;

    async fn send_ack(&self, target: &PeerIdentity, requested: Vec<Peer>)
        -> Result<(), MessengerError>;
}

/// Storage of the membership view. Must give read-your-writes consistency to
/// the single service using it.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// Insert or replace the record with the same public key.
    async fn store_known_peer(&self, peer: Peer) -> Result<()>;

    async fn list_known_peers(&self) -> Result<Vec<Peer>>;

    async fn count_known_peers(&self) -> Result<usize>;

    async fn store_seed_peer(&self, seed: Seed) -> Result<()>;

    async fn list_seed_peers(&self) -> Result<Vec<Seed>>;

    async fn remove_seed_peer(&self, seed: &Seed) -> Result<()>;

    async fn contains_seed_peer(&self, seed: &Seed) -> Result<bool>;

    async fn store_unreachable_peer(&self, identity: PeerIdentity) -> Result<()>;

    async fn list_unreachable_peers(&self) -> Result<Vec<PeerIdentity>>;

    async fn remove_unreachable_peer(&self, identity: &PeerIdentity) -> Result<()>;

    async fn contains_unreachable_peer(&self, identity: &PeerIdentity) -> Result<bool>;

    /// Known remote peers not recorded as unreachable.
    async fn list_reachable_peers(&self) -> Result<Vec<PeerIdentity>> {
        let unreachable = self.list_unreachable_peers().await?;
        let unreachable_keys = unreachable
            .iter()
            .map(PeerIdentity::public_key)
            .collect::<HashSet<_>>();

        Ok(self
            .list_known_peers()
            .await?
            .into_iter()
            .filter(|peer| !peer.is_local())
            .map(|peer| peer.identity().clone())
            .filter(|identity| !unreachable_keys.contains(identity.public_key()))
            .collect())
    }
}

/// Sink for membership events. An error is fatal for the tick that raised it.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_discovery(&self, peer: &Peer) -> Result<()>;

    async fn notify_reachable(&self, identity: &PeerIdentity) -> Result<()>;

    async fn notify_unreachable(&self, identity: &PeerIdentity) -> Result<()>;
}

/// Host metrics of the local node.
#[async_trait::async_trait]
pub trait PeerInformer: Send + Sync {
    async fn geo_position(&self) -> Result<GeoPosition>;

    async fn cpu_load(&self) -> Result<String>;

    async fn free_disk_space(&self) -> Result<f64>;

    async fn ip(&self) -> Result<IpAddr>;
}

/// Network health probes of the local node.
#[async_trait::async_trait]
pub trait PeerNetworker: Send + Sync {
    async fn check_internet_state(&self) -> Result<(), NetworkCheckError>;

    /// Must report a shifted clock as [`NetworkCheckError::ClockShifted`] and
    /// a silent NTP server as [`NetworkCheckError::NoNtpReply`].
    async fn check_ntp_state(&self) -> Result<(), NetworkCheckError>;
}
