use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use gossip_discovery::config_models::cli_args::Args;
use gossip_discovery::gossip::service::DiscoveryService;
use gossip_discovery::system::networker::sntp_server_reply;
use gossip_discovery::system::networker::NTP_PACKET_LENGTH;
use tokio::net::TcpListener;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// Loopback stand-ins for the Internet probe endpoint and the NTP server,
/// so nodes under test never leave the host.
pub struct LocalNetwork {
    pub internet_probe: SocketAddr,
    pub ntp_server: SocketAddr,
}

impl LocalNetwork {
    pub async fn start() -> anyhow::Result<Self> {
        let probe_listener = TcpListener::bind("127.0.0.1:0").await?;
        let internet_probe = probe_listener.local_addr()?;
        tokio::spawn(async move {
            while let Ok((_connection, _)) = probe_listener.accept().await {}
        });

        let ntp_socket = UdpSocket::bind("127.0.0.1:0").await?;
        let ntp_server = ntp_socket.local_addr()?;
        tokio::spawn(async move {
            let mut request = [0u8; NTP_PACKET_LENGTH];
            while let Ok((_, client)) = ntp_socket.recv_from(&mut request).await {
                let reply = sntp_server_reply(&request, SystemTime::now());
                let _ = ntp_socket.send_to(&reply, client).await;
            }
        });

        Ok(Self {
            internet_probe,
            ntp_server,
        })
    }

    /// Arguments of a node on a free loopback port, ticking fast.
    pub fn node_args(&self) -> Args {
        Args {
            peer_port: 0,
            gossip_interval: Duration::from_millis(100),
            connect_timeout: Duration::from_secs(1),
            internet_probe: self.internet_probe.to_string(),
            ntp_server: self.ntp_server.to_string(),
            ..Args::default()
        }
    }
}

pub struct GossipNode {
    pub service: Arc<DiscoveryService>,
    pub address: SocketAddr,
    pub handle: JoinHandle<anyhow::Result<i32>>,
}

impl GossipNode {
    pub async fn start(args: Args) -> anyhow::Result<Self> {
        let node = gossip_discovery::initialize(args).await?;
        let service = node.service();
        let address = node.local_address();
        let handle = tokio::spawn(node.run());

        Ok(Self {
            service,
            address,
            handle,
        })
    }

    pub async fn knows(&self, public_key: &str) -> anyhow::Result<bool> {
        Ok(self
            .service
            .known_peers()
            .await?
            .iter()
            .any(|peer| peer.identity().public_key().to_string() == public_key))
    }
}
