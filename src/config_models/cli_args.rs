use std::net::IpAddr;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::models::peer::parse_seed_list;
use crate::models::peer::PeerParseError;
use crate::models::peer::PublicKey;
use crate::models::peer::Seed;

/// Used when `--p2p-factor` is not given.
pub const DEFAULT_P2P_FACTOR: u32 = 1;

/// The `gossip-node` command-line program runs one member of a gossip
/// discovery network.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
    /// IP on which to listen for gossip connections. Also advertised to
    /// other peers as this node's address.
    #[clap(short, long, default_value = "127.0.0.1")]
    pub listen_addr: IpAddr,

    /// Port on which to listen for gossip connections. 0 picks a free port.
    #[clap(long, default_value = "3002")]
    pub peer_port: u16,

    /// Hex public key identifying this node. A random key is generated if
    /// omitted.
    #[clap(long)]
    pub public_key: Option<PublicKey>,

    /// Bootstrap peers, as `ip:port:publicKey` entries separated by `;`.
    ///
    /// E.g. --seeds "10.0.0.1:3002:ab01;10.0.0.2:3002:cd02"
    #[clap(long, default_value = "")]
    pub seeds: String,

    /// Time between two gossip ticks, e.g. `3s` or `500ms`.
    #[clap(long, default_value = "3s", value_parser = humantime::parse_duration)]
    pub gossip_interval: Duration,

    /// Latitude advertised for this node.
    #[clap(long, default_value = "0.0", allow_negative_numbers = true)]
    pub latitude: f64,

    /// Longitude advertised for this node.
    #[clap(long, default_value = "0.0", allow_negative_numbers = true)]
    pub longitude: f64,

    /// Fan-out factor advertised to other peers.
    #[clap(long, default_value_t = DEFAULT_P2P_FACTOR)]
    pub p2p_factor: u32,

    /// NTP server, as `host:port`, the local clock is checked against.
    #[clap(long, default_value = "pool.ntp.org:123")]
    pub ntp_server: String,

    /// Largest tolerated difference between the local clock and NTP time.
    /// Beyond it the node only serves stored data.
    #[clap(long, default_value = "500ms", value_parser = humantime::parse_duration)]
    pub max_clock_offset: Duration,

    /// Endpoint, as `host:port`, whose TCP reachability means Internet
    /// access.
    #[clap(long, default_value = "1.1.1.1:53")]
    pub internet_probe: String,

    /// Timeout of outbound gossip connections, of answers to them, and of
    /// the network probes.
    #[clap(long, default_value = "3s", value_parser = humantime::parse_duration)]
    pub connect_timeout: Duration,

    /// Mount point whose free space is advertised.
    #[clap(long, default_value = "/")]
    pub disk_path: PathBuf,

    /// Enable tokio tracing for consumption by the tokio-console application
    /// note: this will attempt to connect to localhost:6669
    #[clap(long, name = "tokio-console", default_value = "false")]
    pub tokio_console: bool,
}

impl Args {
    pub fn own_listen_address(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.peer_port)
    }

    pub fn seed_list(&self) -> Result<Vec<Seed>, PeerParseError> {
        parse_seed_list(&self.seeds)
    }
}

impl Default for Args {
    fn default() -> Self {
        let empty: Vec<String> = vec![];
        Self::parse_from(empty)
    }
}
