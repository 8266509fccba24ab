pub mod gossip_node;
pub mod logging;
