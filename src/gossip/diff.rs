//! Anti-entropy reconciliation of two peer sets keyed by public key.
//!
//! Both directions are the same computation with the arguments swapped, so
//! [`new_peers`] is defined in terms of [`unknown_peers`]. Neither function
//! mutates its inputs and the output keeps the order of the collection it is
//! drawn from.

use std::collections::HashMap;

use crate::models::peer::Gossiped;
use crate::models::peer::HeartbeatState;
use crate::models::peer::PublicKey;

/// Peers of `candidate` that `known` lacks, or holds a staler copy of.
pub fn unknown_peers<K, C>(known: &[K], candidate: &[C]) -> Vec<C>
where
    K: Gossiped,
    C: Gossiped + Clone,
{
    let known_heartbeats: HashMap<&PublicKey, &HeartbeatState> = known
        .iter()
        .map(|peer| (peer.public_key(), peer.heartbeat()))
        .collect();

    candidate
        .iter()
        .filter(|peer| match known_heartbeats.get(peer.public_key()) {
            None => true,
            Some(known_heartbeat) => peer.heartbeat().more_recent_than(known_heartbeat),
        })
        .cloned()
        .collect()
}

/// Peers of `known` that `candidate` lacks, or holds a staler copy of.
pub fn new_peers<K, C>(known: &[K], candidate: &[C]) -> Vec<K>
where
    K: Gossiped + Clone,
    C: Gossiped,
{
    unknown_peers(candidate, known)
}

/// Collapse records sharing a public key into the most recent one. The first
/// occurrence of a key decides its position in the output.
pub fn most_recent_per_peer<P>(peers: impl IntoIterator<Item = P>) -> Vec<P>
where
    P: Gossiped,
{
    let mut deduplicated: Vec<P> = vec![];
    let mut positions: HashMap<PublicKey, usize> = HashMap::new();

    for peer in peers {
        match positions.get(peer.public_key()) {
            Some(&position) => {
                if peer.more_recent_than(&deduplicated[position]) {
                    deduplicated[position] = peer;
                }
            }
            None => {
                positions.insert(peer.public_key().clone(), deduplicated.len());
                deduplicated.push(peer);
            }
        }
    }

    deduplicated
}

#[cfg(test)]
mod tests {
    use proptest::collection::vec;
    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::*;
    use crate::models::peer::PeerDigest;
    use crate::tests::shared::get_dummy_digest;
    use crate::tests::shared::get_dummy_peer;

    fn keys<P: Gossiped>(peers: &[P]) -> Vec<PublicKey> {
        peers.iter().map(|p| p.public_key().clone()).collect()
    }

    fn arb_digests() -> impl Strategy<Value = Vec<PeerDigest>> {
        // few distinct keys, so that overlaps between sets are common
        vec((0u8..6, 0u64..3, 0u64..4), 0..8).prop_map(|entries| {
            most_recent_per_peer(
                entries
                    .into_iter()
                    .map(|(n, generation, elapsed)| get_dummy_digest(n, generation, elapsed)),
            )
        })
    }

    #[test]
    fn absent_peers_are_unknown() {
        let known = vec![get_dummy_peer(1, 100, 10)];
        let candidate = vec![get_dummy_peer(1, 100, 10), get_dummy_peer(2, 100, 10)];

        assert_eq!(keys(&[get_dummy_peer(2, 100, 10)]), keys(&unknown_peers(&known, &candidate)));
        assert!(new_peers(&known, &candidate).is_empty());
    }

    #[test]
    fn fresher_copies_are_unknown_staler_copies_are_new() {
        let known = vec![get_dummy_peer(1, 100, 1000), get_dummy_peer(2, 100, 50)];
        let candidate = vec![get_dummy_peer(1, 100, 1200), get_dummy_peer(2, 100, 40)];

        let unknown = unknown_peers(&known, &candidate);
        assert_eq!(1, unknown.len());
        assert_eq!(
            1200,
            unknown[0].heartbeat().elapsed_heartbeats(),
            "the 1200 copy is the more recent one"
        );

        let new = new_peers(&known, &candidate);
        assert_eq!(1, new.len());
        assert_eq!(get_dummy_peer(2, 100, 50), new[0]);
    }

    #[test]
    fn digests_and_full_records_reconcile() {
        let known = vec![get_dummy_peer(1, 100, 10), get_dummy_peer(3, 100, 10)];
        let received = vec![get_dummy_digest(1, 100, 20), get_dummy_digest(2, 100, 1)];

        let unknown = unknown_peers(&known, &received);
        assert_eq!(keys(&received), keys(&unknown));

        let new = new_peers(&known, &received);
        assert_eq!(keys(&[get_dummy_peer(3, 100, 10)]), keys(&new));
    }

    #[test]
    fn most_recent_copy_survives_deduplication() {
        let peers = vec![
            get_dummy_peer(1, 100, 1000),
            get_dummy_peer(2, 100, 5),
            get_dummy_peer(1, 100, 1200),
            get_dummy_peer(1, 90, 5000),
        ];

        let deduplicated = most_recent_per_peer(peers);

        assert_eq!(vec![get_dummy_peer(1, 100, 1200), get_dummy_peer(2, 100, 5)], deduplicated);
    }

    #[proptest]
    fn unknown_and_new_are_duals(
        #[strategy(arb_digests())] known: Vec<PeerDigest>,
        #[strategy(arb_digests())] candidate: Vec<PeerDigest>,
    ) {
        prop_assert_eq!(
            unknown_peers(&known, &candidate),
            new_peers(&candidate, &known)
        );
    }

    #[proptest]
    fn a_set_knows_everything_about_itself(#[strategy(arb_digests())] known: Vec<PeerDigest>) {
        prop_assert!(unknown_peers(&known, &known).is_empty());
        prop_assert!(new_peers(&known, &known).is_empty());
    }

    #[proptest]
    fn reconciliation_is_deterministic(
        #[strategy(arb_digests())] known: Vec<PeerDigest>,
        #[strategy(arb_digests())] candidate: Vec<PeerDigest>,
    ) {
        let known_before = known.clone();
        let first = unknown_peers(&known, &candidate);
        let second = unknown_peers(&known, &candidate);
        prop_assert_eq!(first, second);
        prop_assert_eq!(known_before, known);
    }
}
