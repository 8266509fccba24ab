#![deny(clippy::shadow_unrelated)]
//
// If code coverage tool `cargo-llvm-cov` is running with the nightly toolchain,
// enable the unstable “coverage” attribute. This allows using the annotation
// `#[coverage(off)]` to explicitly exclude certain parts of the code from
// being considered as “code under test.”
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config_models;
pub mod database;
pub mod gossip;
pub mod models;
pub mod network;
pub mod notifier;
pub mod system;


use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use config_models::cli_args;
use tokio::net::TcpListener;
use tokio::select;
use tokio::signal;
use tracing::error;
use tracing::info;

use crate::database::MemoryRepository;
use crate::gossip::service::Collaborators;
use crate::gossip::service::DiscoveryService;
use crate::models::peer::AppState;
use crate::models::peer::GeoPosition;
use crate::models::peer::Peer;
use crate::models::peer::PeerIdentity;
use crate::models::peer::PublicKey;
use crate::network::listener;
use crate::network::messenger::TcpMessenger;
use crate::notifier::LogNotifier;
use crate::system::informer::SystemInformer;
use crate::system::networker::SystemNetworker;

pub const SUCCESS_EXIT_CODE: i32 = 0;
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A bound gossip listener and the service answering on it, ready to run.
pub struct Node {
    service: Arc<DiscoveryService>,
    listener: TcpListener,
    local_address: SocketAddr,
    request_timeout: Duration,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("local_address", &self.local_address)
            .finish_non_exhaustive()
    }
}

/// Bind the gossip port and set up the discovery service with the host's
/// own probes, TCP transport and in-memory storage.
pub async fn initialize(cli_args: cli_args::Args) -> Result<Node> {
    let seeds = cli_args.seed_list().context("parsing --seeds")?;

    let listen_address = cli_args.own_listen_address();
    let listener = TcpListener::bind(listen_address).await.with_context(|| {
        format!("Failed to bind to local TCP port {listen_address}. Is an instance of this program already running?")
    })?;
    let local_address = listener.local_addr()?;

    let public_key = cli_args.public_key.clone().unwrap_or_else(PublicKey::random);
    let identity = PeerIdentity::from_address(local_address, public_key);
    let geo_position = GeoPosition::new(cli_args.latitude, cli_args.longitude);
    info!("Starting gossip node {identity} with {} seeds", seeds.len());

    let collaborators = Collaborators {
        repository: Arc::new(MemoryRepository::new()),
        messenger: Arc::new(TcpMessenger::new(cli_args.connect_timeout)),
        notifier: Arc::new(LogNotifier),
        informer: Arc::new(SystemInformer::new(
            local_address.ip(),
            geo_position,
            cli_args.disk_path.clone(),
        )),
        networker: Arc::new(SystemNetworker::new(
            cli_args.internet_probe.clone(),
            cli_args.ntp_server.clone(),
            cli_args.max_clock_offset,
            cli_args.connect_timeout,
        )),
    };

    let local = Peer::new_local(
        identity,
        AppState::new(VERSION, geo_position, cli_args.p2p_factor),
    );
    let service =
        DiscoveryService::new(local, seeds, cli_args.gossip_interval, collaborators).await?;

    Ok(Node {
        service: Arc::new(service),
        listener,
        local_address,
        request_timeout: cli_args.connect_timeout,
    })
}

impl Node {
    /// The address actually bound, which differs from the configured one
    /// when port 0 was asked for.
    pub fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    pub fn service(&self) -> Arc<DiscoveryService> {
        self.service.clone()
    }

    /// Gossip and answer gossip until Ctrl+C or a fatal gossip error.
    /// Returns the process exit code.
    pub async fn run(self) -> Result<i32> {
        let gossip = self.service.clone().run();
        let serving = listener::serve(self.listener, self.service, self.request_timeout);

        select! {
            result = gossip => {
                if let Err(e) = &result {
                    error!("Gossip stopped: {e:#}");
                }
                result.map(|()| SUCCESS_EXIT_CODE)
            }
            result = serving => {
                result.map(|()| SUCCESS_EXIT_CODE)
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                Ok(SUCCESS_EXIT_CODE)
            }
        }
    }
}
