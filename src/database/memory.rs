//! Membership view kept in process memory.

use std::collections::HashMap;

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::trace;

use crate::gossip::traits::Repository;
use crate::models::peer::Peer;
use crate::models::peer::PeerIdentity;
use crate::models::peer::PublicKey;
use crate::models::peer::Seed;

#[derive(Debug, Default)]
struct Tables {
    known: HashMap<PublicKey, Peer>,
    seeds: HashMap<PublicKey, Seed>,
    unreachable: HashMap<PublicKey, PeerIdentity>,
}

/// [`Repository`] backed by hash maps keyed by public key, so every store is
/// an upsert. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    async fn store_known_peer(&self, peer: Peer) -> Result<()> {
        trace!("storing known peer {}", peer.identity());
        self.tables
            .write()
            .await
            .known
            .insert(peer.identity().public_key().clone(), peer);
        Ok(())
    }

    async fn list_known_peers(&self) -> Result<Vec<Peer>> {
        Ok(self.tables.read().await.known.values().cloned().collect())
    }

    async fn count_known_peers(&self) -> Result<usize> {
        Ok(self.tables.read().await.known.len())
    }

    async fn store_seed_peer(&self, seed: Seed) -> Result<()> {
        self.tables
            .write()
            .await
            .seeds
            .insert(seed.public_key().clone(), seed);
        Ok(())
    }

    async fn list_seed_peers(&self) -> Result<Vec<Seed>> {
        Ok(self.tables.read().await.seeds.values().cloned().collect())
    }

    async fn remove_seed_peer(&self, seed: &Seed) -> Result<()> {
        self.tables.write().await.seeds.remove(seed.public_key());
        Ok(())
    }

    async fn contains_seed_peer(&self, seed: &Seed) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .await
            .seeds
            .contains_key(seed.public_key()))
    }

    async fn store_unreachable_peer(&self, identity: PeerIdentity) -> Result<()> {
        trace!("storing unreachable peer {identity}");
        self.tables
            .write()
            .await
            .unreachable
            .insert(identity.public_key().clone(), identity);
        Ok(())
    }

    async fn list_unreachable_peers(&self) -> Result<Vec<PeerIdentity>> {
        Ok(self
            .tables
            .read()
            .await
            .unreachable
            .values()
            .cloned()
            .collect())
    }

    async fn remove_unreachable_peer(&self, identity: &PeerIdentity) -> Result<()> {
        self.tables
            .write()
            .await
            .unreachable
            .remove(identity.public_key());
        Ok(())
    }

    async fn contains_unreachable_peer(&self, identity: &PeerIdentity) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .await
            .unreachable
            .contains_key(identity.public_key()))
    }
}
