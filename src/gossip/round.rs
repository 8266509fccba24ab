use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use super::errors::GossipError;
use super::errors::MessengerError;
use super::traits::Messenger;
use crate::models::peer::Gossiped;
use crate::models::peer::Peer;
use crate::models::peer::PeerDigest;
use crate::models::peer::PeerIdentity;
use crate::models::peer::PublicKey;

/// What one SYN/ACK exchange with a target established.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    /// The exchange completed. `discoveries` are the records the target
    /// offered.
    Reachable {
        target: PeerIdentity,
        discoveries: Vec<Peer>,
    },

    /// The target stopped answering at some point. Nothing it offered is
    /// kept.
    Unreachable { target: PeerIdentity },
}

impl RoundOutcome {
    pub fn target(&self) -> &PeerIdentity {
        match self {
            Self::Reachable { target, .. } | Self::Unreachable { target } => target,
        }
    }
}

/// Exchange membership views with `target`.
///
/// Sends the digests of all `known` peers, answers the target's requests
/// with full records, and returns the records the target offered. A target
/// that turns unreachable during either step yields
/// [`RoundOutcome::Unreachable`]; any other transport failure is an error.
pub async fn run_round(
    messenger: Arc<dyn Messenger>,
    target: PeerIdentity,
    known: Arc<[Peer]>,
) -> Result<RoundOutcome, GossipError> {
    let digests = known.iter().map(Peer::digest).collect::<Vec<_>>();

    let syn_ack = match messenger.send_syn(&target, digests).await {
        Ok(syn_ack) => syn_ack,
        Err(MessengerError::Unreachable(_)) => {
            debug!("SYN to {target} went unanswered");
            return Ok(RoundOutcome::Unreachable { target });
        }
        Err(e) => return Err(e.into()),
    };

    if !syn_ack.unknown.is_empty() {
        let requested = requested_records(&known, &syn_ack.unknown);
        debug!(
            "{target} requested {} records, sending {}",
            syn_ack.unknown.len(),
            requested.len()
        );

        match messenger.send_ack(&target, requested).await {
            Ok(()) => {}
            Err(MessengerError::Unreachable(_)) => {
                debug!("ACK to {target} went unanswered");
                return Ok(RoundOutcome::Unreachable { target });
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(RoundOutcome::Reachable {
        target,
        discoveries: syn_ack.new,
    })
}

/// Full records of the requested peers, in the order of `known`. Requests for
/// peers absent from `known` are ignored.
fn requested_records(known: &[Peer], requested: &[PeerDigest]) -> Vec<Peer> {
    let requested_keys = requested
        .iter()
        .map(Gossiped::public_key)
        .collect::<HashSet<&PublicKey>>();

    known
        .iter()
        .filter(|peer| requested_keys.contains(peer.public_key()))
        .cloned()
        .collect()
}
