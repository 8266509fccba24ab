//! Health classification of the local peer.
//!
//! The classifier is a pure decision table. The network probes it depends on
//! are run beforehand and handed in as a [`NetworkProbe`].

use tracing::debug;

use super::errors::NetworkCheckError;
use super::traits::PeerNetworker;
use crate::models::peer::Gossiped;
use crate::models::peer::Peer;
use crate::models::peer::PeerStatus;
use crate::models::peer::Seed;

/// A peer younger than this (in seconds) that has discovered fewer peers than
/// the seeds on average is still bootstrapping.
///
/// Candidate for configuration; no production value is known to matter for
/// correctness.
pub const BOOTSTRAPPING_MIN_HEARTBEATS: u64 = 1800;

/// Outcome of the Internet and NTP probes for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkProbe {
    pub internet: Result<(), NetworkCheckError>,
    pub ntp: Result<(), NetworkCheckError>,
}

impl NetworkProbe {
    pub async fn run(networker: &dyn PeerNetworker) -> Self {
        let internet = networker.check_internet_state().await;
        let ntp = networker.check_ntp_state().await;
        Self { internet, ntp }
    }

    pub fn healthy() -> Self {
        Self {
            internet: Ok(()),
            ntp: Ok(()),
        }
    }
}

/// Derive the status of `peer`.
///
/// Fails only when the NTP probe fails for a reason other than a shifted
/// clock or a silent server.
pub fn status(
    peer: &Peer,
    seed_discovery_average: u32,
    probe: &NetworkProbe,
) -> Result<PeerStatus, NetworkCheckError> {
    if let Err(e) = &probe.internet {
        debug!("internet probe failed: {e}");
        return Ok(PeerStatus::Faulty);
    }

    match &probe.ntp {
        Err(e) if e.is_clock_degradation() => {
            debug!("ntp probe degraded: {e}");
            return Ok(PeerStatus::StorageOnly);
        }
        Err(e) => return Err(e.clone()),
        Ok(()) => {}
    }

    if seed_discovery_average == 0 {
        return Ok(PeerStatus::Bootstrapping);
    }

    let young = peer.heartbeat().elapsed_heartbeats() < BOOTSTRAPPING_MIN_HEARTBEATS;
    let behind_seeds = peer.app_state().discovered_peers_number < seed_discovery_average;
    if young && behind_seeds {
        return Ok(PeerStatus::Bootstrapping);
    }

    Ok(PeerStatus::Ok)
}

/// Mean of the discovered-peers metric over all seeds, using the seeds'
/// records in `known`.
///
/// Seeds missing from `known` add nothing to the sum but still count in the
/// divisor. The division truncates.
pub fn seed_discovery_average(seeds: &[Seed], known: &[Peer]) -> u32 {
    if seeds.is_empty() {
        return 0;
    }

    let sum: u64 = seeds
        .iter()
        .filter_map(|seed| {
            known
                .iter()
                .find(|peer| peer.public_key() == seed.public_key())
        })
        .map(|peer| u64::from(peer.app_state().discovered_peers_number))
        .sum();

    let average = sum / seeds.len() as u64;
    u32::try_from(average).unwrap_or(u32::MAX)
}
