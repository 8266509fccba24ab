//! Probes of the host this node runs on.

pub mod informer;
pub mod networker;
