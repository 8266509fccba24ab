use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;

/// Health of a peer as judged by the peer itself.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash, strum::EnumIter,
)]
pub enum PeerStatus {
    /// The peer, or the network around it, is still starting up.
    #[default]
    Bootstrapping,

    /// The peer is healthy and may take part in validation and storage.
    Ok,

    /// The peer cannot reach the internet.
    Faulty,

    /// The peer's clock cannot be trusted. It may still serve stored data
    /// but must not take part in time-sensitive validation.
    StorageOnly,
}

impl Display for PeerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Bootstrapping => "bootstrapping",
            Self::Ok => "ok",
            Self::Faulty => "faulty",
            Self::StorageOnly => "storage only",
        };

        write!(f, "{display}")
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Capacity and health snapshot a peer publishes about itself.
///
/// Only the owning node changes its own app state; copies received from
/// other peers are stored as they are.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AppState {
    pub status: PeerStatus,
    pub version: String,
    pub cpu_load: String,
    pub free_disk_space: f64,
    pub geo_position: GeoPosition,
    pub p2p_factor: u32,
    pub discovered_peers_number: u32,
}

impl AppState {
    /// App state of a process that just started.
    pub fn new(version: impl Into<String>, geo_position: GeoPosition, p2p_factor: u32) -> Self {
        Self {
            status: PeerStatus::Bootstrapping,
            version: version.into(),
            cpu_load: String::new(),
            free_disk_space: 0.0,
            geo_position,
            p2p_factor,
            discovered_peers_number: 0,
        }
    }
}

/// Host readings collected once per tick for the local peer.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalMetrics {
    pub cpu_load: String,
    pub free_disk_space: f64,
    pub geo_position: GeoPosition,
    pub discovered_peers_number: u32,
}
