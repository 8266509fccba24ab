mod common;

use std::time::Duration;

use common::gossip_node::GossipNode;
use common::gossip_node::LocalNetwork;
use common::logging;
use gossip_discovery::models::peer::PeerStatus;
use gossip_discovery::models::peer::PublicKey;

const ALICE_KEY: &str = "a11ce0000000000000000000000000000000000000000000000000000000000a";
const BOB_KEY: &str = "b0b000000000000000000000000000000000000000000000000000000000000b";

async fn eventually<F, Fut>(deadline: Duration, mut condition: F) -> anyhow::Result<bool>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<bool>>,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if condition().await? {
            return Ok(true);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    Ok(false)
}

/// test: two nodes find each other through a seed
///
/// scenario:
/// 1. alice starts with an unreachable seed only.
/// 2. bob starts with alice as his seed.
/// 3. bob's SYN makes alice ask for bob's record and offer hers.
/// 4. both end up knowing the other.
#[tokio::test(flavor = "multi_thread")]
pub async fn two_nodes_discover_each_other() -> anyhow::Result<()> {
    logging::tracing_logger();
    let network = LocalNetwork::start().await?;

    let alice = GossipNode::start(gossip_discovery::config_models::cli_args::Args {
        public_key: Some(ALICE_KEY.parse::<PublicKey>()?),
        seeds: "127.0.0.1:1:ff".to_string(),
        ..network.node_args()
    })
    .await?;

    let bob = GossipNode::start(gossip_discovery::config_models::cli_args::Args {
        public_key: Some(BOB_KEY.parse::<PublicKey>()?),
        seeds: format!("127.0.0.1:{}:{ALICE_KEY}", alice.address.port()),
        ..network.node_args()
    })
    .await?;

    let (alice, bob) = (&alice, &bob);
    let converged = eventually(Duration::from_secs(10), || async move {
        Ok(alice.knows(BOB_KEY).await? && bob.knows(ALICE_KEY).await?)
    })
    .await?;
    assert!(converged, "nodes did not discover each other");

    assert!(!alice.handle.is_finished());
    assert!(!bob.handle.is_finished());
    alice.handle.abort();
    bob.handle.abort();
    Ok(())
}

/// test: a node without Internet access classifies itself faulty and keeps
/// gossiping
#[tokio::test(flavor = "multi_thread")]
pub async fn node_without_internet_is_faulty() -> anyhow::Result<()> {
    logging::tracing_logger();
    let network = LocalNetwork::start().await?;

    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await?.local_addr()?;
    let node = GossipNode::start(gossip_discovery::config_models::cli_args::Args {
        seeds: "127.0.0.1:1:ff".to_string(),
        internet_probe: closed.to_string(),
        ..network.node_args()
    })
    .await?;

    let node = &node;
    let faulty = eventually(Duration::from_secs(10), || async move {
        Ok(node.service.local_peer().await.status() == PeerStatus::Faulty)
    })
    .await?;
    assert!(faulty, "node did not notice missing Internet access");
    assert!(!node.handle.is_finished());

    node.handle.abort();
    Ok(())
}

/// test: a node without seeds stops gossiping with an error
#[tokio::test(flavor = "multi_thread")]
pub async fn node_without_seeds_stops() -> anyhow::Result<()> {
    logging::tracing_logger();
    let network = LocalNetwork::start().await?;

    let node = GossipNode::start(network.node_args()).await?;

    let result = tokio::time::timeout(Duration::from_secs(10), node.handle).await??;
    assert!(result.is_err());
    Ok(())
}
