use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use tokio::select;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio::time;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::cycle::Cycle;
use super::cycle::CycleOutcome;
use super::diff::new_peers;
use super::diff::unknown_peers;
use super::health;
use super::health::NetworkProbe;
use super::traits::Messenger;
use super::traits::Notifier;
use super::traits::PeerInformer;
use super::traits::PeerNetworker;
use super::traits::Repository;
use super::traits::SynAck;
use crate::models::peer::Gossiped;
use crate::models::peer::HeartbeatState;
use crate::models::peer::LocalMetrics;
use crate::models::peer::Peer;
use crate::models::peer::PeerDigest;
use crate::models::peer::PublicKey;
use crate::models::peer::Seed;

/// Protocol default for the time between two ticks.
pub const DEFAULT_GOSSIP_INTERVAL: Duration = Duration::from_secs(3);

/// Everything the service talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub repository: Arc<dyn Repository>,
    pub messenger: Arc<dyn Messenger>,
    pub notifier: Arc<dyn Notifier>,
    pub informer: Arc<dyn PeerInformer>,
    pub networker: Arc<dyn PeerNetworker>,
}

/// Drives the gossip protocol of one node and answers gossip requests from
/// other nodes.
pub struct DiscoveryService {
    local: RwLock<Peer>,
    interval: Duration,
    collaborators: Collaborators,
    last_cycle: RwLock<Option<SystemTime>>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for DiscoveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryService")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl DiscoveryService {
    /// Register the local peer and the seeds with the repository.
    pub async fn new(
        local: Peer,
        seeds: Vec<Seed>,
        interval: Duration,
        collaborators: Collaborators,
    ) -> Result<Self> {
        if !local.is_local() {
            bail!("discovery service needs the local peer, got remote {}", local.identity());
        }
        if interval.is_zero() {
            bail!("gossip interval must be positive");
        }

        let repository = &collaborators.repository;
        repository
            .store_known_peer(local.clone())
            .await
            .context("storing local peer")?;
        for seed in seeds {
            repository
                .store_seed_peer(seed)
                .await
                .context("storing seed peer")?;
        }

        Ok(Self {
            local: RwLock::new(local),
            interval,
            collaborators,
            last_cycle: RwLock::new(None),
        })
    }

    pub async fn local_peer(&self) -> Peer {
        self.local.read().await.clone()
    }

    pub async fn known_peers(&self) -> Result<Vec<Peer>> {
        self.collaborators.repository.list_known_peers().await
    }

    /// Tick every interval until a tick fails, then return its error.
    ///
    /// A tick does not wait for the previous one: when a cycle takes longer
    /// than the interval, ticks overlap. Ticks still in flight when one fails
    /// are aborted.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut timer = time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = JoinSet::new();

        info!(
            "gossip started for {} every {}",
            self.local.read().await.identity(),
            humantime::format_duration(self.interval)
        );

        loop {
            select! {
                _ = timer.tick() => {
                    let service = self.clone();
                    ticks.spawn(async move { service.tick().await });
                }

                Some(joined) = ticks.join_next() => {
                    match joined {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            error!("gossip tick failed, stopping: {e:#}");
                            return Err(e.context("gossip tick failed"));
                        }
                        Err(e) => {
                            error!("gossip tick task failed, stopping: {e}");
                            return Err(anyhow!(e).context("gossip tick task failed"));
                        }
                    }
                }
            }
        }
    }

    /// One gossip iteration: refresh the local peer, run a cycle against the
    /// stored membership view and persist what it found.
    pub async fn tick(&self) -> Result<()> {
        debug!("gossip tick started");
        self.refresh_local_peer().await?;

        let repository = &self.collaborators.repository;
        let known: Arc<[Peer]> = repository.list_known_peers().await?.into();
        let seeds = repository.list_seed_peers().await?;
        let reachables = repository.list_reachable_peers().await?;
        let unreachables = repository.list_unreachable_peers().await?;
        let local_identity = self.local.read().await.identity().clone();

        let cycle = Cycle::new(local_identity, seeds, reachables, unreachables)?;
        let outcome = cycle
            .run(self.collaborators.messenger.clone(), known)
            .await?;
        self.apply_cycle_outcome(outcome).await?;

        *self.last_cycle.write().await = Some(SystemTime::now());
        debug!("gossip tick finished");
        Ok(())
    }

    /// Re-read host metrics, re-classify the local peer and persist it.
    pub async fn refresh_local_peer(&self) -> Result<()> {
        let Collaborators {
            repository,
            informer,
            networker,
            ..
        } = &self.collaborators;

        let ip = informer.ip().await.context("reading local ip")?;
        self.warn_on_ip_change(ip).await;

        let known = repository.list_known_peers().await?;
        let seeds = repository.list_seed_peers().await?;
        let discovered_peers_number = known.iter().filter(|peer| !peer.is_local()).count();
        let metrics = LocalMetrics {
            cpu_load: informer.cpu_load().await.context("reading cpu load")?,
            free_disk_space: informer
                .free_disk_space()
                .await
                .context("reading free disk space")?,
            geo_position: informer
                .geo_position()
                .await
                .context("reading geo position")?,
            discovered_peers_number: u32::try_from(discovered_peers_number).unwrap_or(u32::MAX),
        };
        let probe = NetworkProbe::run(networker.as_ref()).await;
        let seed_average = health::seed_discovery_average(&seeds, &known);

        let refreshed = {
            let mut local = self.local.write().await;
            local.refresh(SystemTime::now(), metrics);
            let status = health::status(&local, seed_average, &probe)
                .context("classifying local peer")?;
            if status != local.status() {
                info!("local peer status changed from {} to {status}", local.status());
            }
            local.set_status(status);
            local.clone()
        };

        repository
            .store_known_peer(refreshed)
            .await
            .context("storing refreshed local peer")
    }

    async fn warn_on_ip_change(&self, ip: IpAddr) {
        let local = self.local.read().await;
        if local.identity().ip() != ip {
            warn!(
                "host ip {ip} differs from the advertised {}; identity is kept",
                local.identity().ip()
            );
        }
    }

    /// Persist discoveries and reachability changes, notifying each one.
    pub async fn apply_cycle_outcome(&self, outcome: CycleOutcome) -> Result<()> {
        let Collaborators {
            repository,
            notifier,
            ..
        } = &self.collaborators;

        self.store_discoveries(outcome.discoveries).await?;

        for identity in outcome.reachables {
            if repository.contains_unreachable_peer(&identity).await? {
                repository.remove_unreachable_peer(&identity).await?;
                info!("peer {identity} is reachable again");
                notifier.notify_reachable(&identity).await?;
            }
        }

        for identity in outcome.unreachables {
            if !repository.contains_unreachable_peer(&identity).await? {
                warn!("peer {identity} became unreachable");
                repository.store_unreachable_peer(identity.clone()).await?;
                notifier.notify_unreachable(&identity).await?;
            }
        }

        Ok(())
    }

    /// Answer a SYN: which of `received` do we want in full, and which of
    /// our records does the sender lack.
    pub async fn compare_incoming(&self, received: &[PeerDigest]) -> Result<SynAck> {
        let known = self.collaborators.repository.list_known_peers().await?;
        Ok(SynAck {
            unknown: unknown_peers(&known, received),
            new: new_peers(&known, received),
        })
    }

    /// Take in the full records sent with an ACK.
    pub async fn acknowledge_incoming(&self, received: Vec<Peer>) -> Result<()> {
        self.store_discoveries(received).await
    }

    /// Store and announce the records fresher than what is known. Stale and
    /// equally fresh copies are dropped, and so is any copy of ourselves.
    async fn store_discoveries(&self, peers: Vec<Peer>) -> Result<()> {
        let local_key = self.local.read().await.public_key().clone();
        let Collaborators {
            repository,
            notifier,
            ..
        } = &self.collaborators;

        let mut known_heartbeats: HashMap<PublicKey, HeartbeatState> = repository
            .list_known_peers()
            .await?
            .iter()
            .map(|peer| (peer.public_key().clone(), *peer.heartbeat()))
            .collect();

        for peer in peers {
            if peer.public_key() == &local_key {
                debug!("ignoring remote copy of the local peer");
                continue;
            }
            if let Some(known_heartbeat) = known_heartbeats.get(peer.public_key()) {
                if !peer.heartbeat().more_recent_than(known_heartbeat) {
                    trace!("ignoring stale copy of {}", peer.identity());
                    continue;
                }
            }

            info!("discovered peer {} ({})", peer.identity(), peer.status());
            known_heartbeats.insert(peer.public_key().clone(), *peer.heartbeat());
            repository.store_known_peer(peer.clone()).await?;
            notifier.notify_discovery(&peer).await?;
        }

        Ok(())
    }

    /// When the last tick completed, if any has since start or the last
    /// reset.
    pub async fn last_cycle_completed(&self) -> Option<SystemTime> {
        *self.last_cycle.read().await
    }

    pub async fn time_since_last_cycle(&self) -> Option<Duration> {
        self.last_cycle_completed()
            .await
            .map(|completed| completed.elapsed().unwrap_or_default())
    }

    pub async fn reset_last_cycle(&self) {
        *self.last_cycle.write().await = None;
    }
}
