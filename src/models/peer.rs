pub mod app_state;
pub mod heartbeat;
pub mod identity;
pub mod seed;

use std::time::SystemTime;

use serde::Deserialize;
use serde::Serialize;
use tracing::trace;

pub use self::app_state::AppState;
pub use self::app_state::GeoPosition;
pub use self::app_state::LocalMetrics;
pub use self::app_state::PeerStatus;
pub use self::heartbeat::HeartbeatState;
pub use self::identity::PeerIdentity;
pub use self::identity::PublicKey;
pub use self::seed::parse_seed_list;
pub use self::seed::Seed;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PeerParseError {
    #[error("expected `ip:port:publicKey`, got `{0}`")]
    Malformed(String),

    #[error("invalid ip address `{0}`")]
    Ip(String),

    #[error("invalid port `{0}`")]
    Port(String),

    #[error("invalid hex public key `{0}`")]
    PublicKey(String),
}

/// Anything that takes part in anti-entropy reconciliation: it names a peer
/// and carries a heartbeat telling how fresh that copy is.
pub trait Gossiped {
    fn public_key(&self) -> &PublicKey;

    fn heartbeat(&self) -> &HeartbeatState;

    fn more_recent_than<O: Gossiped + ?Sized>(&self, other: &O) -> bool {
        self.heartbeat().more_recent_than(other.heartbeat())
    }
}

/// Lightweight form of a peer record, sent in a SYN.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PeerDigest {
    pub identity: PeerIdentity,
    pub heartbeat: HeartbeatState,
}

impl Gossiped for PeerDigest {
    fn public_key(&self) -> &PublicKey {
        self.identity.public_key()
    }

    fn heartbeat(&self) -> &HeartbeatState {
        &self.heartbeat
    }
}

/// A full peer record.
///
/// `is_local` marks the record describing this very process. It never
/// crosses the wire: every record decoded from a remote peer is non-local.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Peer {
    identity: PeerIdentity,
    heartbeat: HeartbeatState,
    app_state: AppState,

    #[serde(skip)]
    is_local: bool,
}

impl Peer {
    /// A record received from, or describing, another peer.
    pub fn new(identity: PeerIdentity, heartbeat: HeartbeatState, app_state: AppState) -> Self {
        Self {
            identity,
            heartbeat,
            app_state,
            is_local: false,
        }
    }

    /// The record of this process, generated [now](SystemTime::now).
    pub fn new_local(identity: PeerIdentity, app_state: AppState) -> Self {
        Self {
            identity,
            heartbeat: HeartbeatState::now(),
            app_state,
            is_local: true,
        }
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    pub fn app_state(&self) -> &AppState {
        &self.app_state
    }

    pub fn status(&self) -> PeerStatus {
        self.app_state.status
    }

    pub fn is_local(&self) -> bool {
        self.is_local
    }

    pub fn digest(&self) -> PeerDigest {
        PeerDigest {
            identity: self.identity.clone(),
            heartbeat: self.heartbeat,
        }
    }

    /// Refresh heartbeat and host metrics. Does nothing unless this is the
    /// local peer.
    pub fn refresh(&mut self, now: SystemTime, metrics: LocalMetrics) {
        if !self.is_local {
            trace!("refusing to refresh remote peer {}", self.identity);
            return;
        }

        self.heartbeat.refresh(now);
        self.app_state.cpu_load = metrics.cpu_load;
        self.app_state.free_disk_space = metrics.free_disk_space;
        self.app_state.geo_position = metrics.geo_position;
        self.app_state.discovered_peers_number = metrics.discovered_peers_number;
    }

    /// Publish a new health status. Does nothing unless this is the local peer.
    pub fn set_status(&mut self, status: PeerStatus) {
        if !self.is_local {
            trace!("refusing to set status of remote peer {}", self.identity);
            return;
        }

        self.app_state.status = status;
    }
}

impl Gossiped for Peer {
    fn public_key(&self) -> &PublicKey {
        self.identity.public_key()
    }

    fn heartbeat(&self) -> &HeartbeatState {
        &self.heartbeat
    }
}
