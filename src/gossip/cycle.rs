use std::sync::Arc;

use itertools::Itertools;
use rand::seq::IndexedRandom;
use rand::Rng;
use tokio::task::JoinSet;
use tracing::debug;

use super::diff::most_recent_per_peer;
use super::errors::GossipError;
use super::round::run_round;
use super::round::RoundOutcome;
use super::traits::Messenger;
use crate::models::peer::Peer;
use crate::models::peer::PeerIdentity;
use crate::models::peer::Seed;

/// Aggregate result of all rounds of one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleOutcome {
    /// Offered records, at most one per public key.
    pub discoveries: Vec<Peer>,

    /// Targets that completed their exchange this cycle.
    pub reachables: Vec<PeerIdentity>,

    /// Targets that stopped answering this cycle.
    pub unreachables: Vec<PeerIdentity>,
}

impl CycleOutcome {
    fn absorb(&mut self, outcome: RoundOutcome) {
        match outcome {
            RoundOutcome::Reachable {
                target,
                discoveries,
            } => {
                self.reachables.push(target);
                self.discoveries.extend(discoveries);
            }
            RoundOutcome::Unreachable { target } => self.unreachables.push(target),
        }
    }

    fn deduplicate(mut self) -> Self {
        self.discoveries = most_recent_per_peer(self.discoveries);
        self.reachables = self
            .reachables
            .into_iter()
            .unique_by(|identity| identity.public_key().clone())
            .collect();
        self.unreachables = self
            .unreachables
            .into_iter()
            .unique_by(|identity| identity.public_key().clone())
            .collect();
        self
    }
}

/// One gossip iteration: a random sample of at most three targets, each
/// contacted in its own round.
#[derive(Debug, Clone)]
pub struct Cycle {
    local: PeerIdentity,
    seeds: Vec<Seed>,
    reachables: Vec<PeerIdentity>,
    unreachables: Vec<PeerIdentity>,
}

impl Cycle {
    /// Fails when `seeds` is empty: gossip cannot start without one.
    pub fn new(
        local: PeerIdentity,
        seeds: Vec<Seed>,
        reachables: Vec<PeerIdentity>,
        unreachables: Vec<PeerIdentity>,
    ) -> Result<Self, GossipError> {
        if seeds.is_empty() {
            return Err(GossipError::NoSeeds);
        }

        Ok(Self {
            local,
            seeds,
            reachables,
            unreachables,
        })
    }

    /// Pick one seed, one previously reachable and one previously unreachable
    /// peer, uniformly from each non-empty pool. The local peer is never
    /// picked, and a peer picked from two pools is contacted once.
    pub fn select_random_peers<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<PeerIdentity> {
        let seeds = self
            .seeds
            .iter()
            .map(Seed::identity)
            .filter(|identity| !identity.same_peer(&self.local))
            .collect_vec();
        let reachables = self.others(&self.reachables);
        let unreachables = self.others(&self.unreachables);

        [
            seeds.choose(rng),
            reachables.choose(rng),
            unreachables.choose(rng),
        ]
        .into_iter()
        .flatten()
        .map(|&identity| identity.clone())
        .unique_by(|identity| identity.public_key().clone())
        .collect()
    }

    fn others<'a>(&self, pool: &'a [PeerIdentity]) -> Vec<&'a PeerIdentity> {
        pool.iter()
            .filter(|identity| !identity.same_peer(&self.local))
            .collect()
    }

    /// Run one round per selected target concurrently and wait for all of
    /// them. The first round failing with an error other than unreachability
    /// fails the cycle; rounds still in flight are then aborted.
    pub async fn run(
        &self,
        messenger: Arc<dyn Messenger>,
        known: Arc<[Peer]>,
    ) -> Result<CycleOutcome, GossipError> {
        let targets = self.select_random_peers(&mut rand::rng());
        debug!(
            "gossip cycle targets: [{}]",
            targets.iter().map(|t| t.address()).join(", ")
        );

        let mut rounds = JoinSet::new();
        for target in targets {
            rounds.spawn(run_round(messenger.clone(), target, known.clone()));
        }

        let mut outcome = CycleOutcome::default();
        while let Some(joined) = rounds.join_next().await {
            outcome.absorb(joined??);
        }

        Ok(outcome.deduplicate())
    }
}
