use std::net::SocketAddr;

/// Failures of the transport carrying SYN and ACK messages.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MessengerError {
    /// The target did not answer. Gossip carries on with other targets.
    #[error("peer {0} is unreachable")]
    Unreachable(SocketAddr),

    #[error("transport failure talking to {peer}: {reason}")]
    Transport { peer: SocketAddr, reason: String },
}

impl MessengerError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// Failures of the Internet and NTP network probes.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum NetworkCheckError {
    #[error("system clock is shifted by {offset_millis} ms from network time")]
    ClockShifted { offset_millis: i64 },

    #[error("no reply from NTP server {0}")]
    NoNtpReply(String),

    #[error("internet is unreachable: {0}")]
    Internet(String),

    #[error("network check failed: {0}")]
    Other(String),
}

impl NetworkCheckError {
    /// True for the NTP conditions that degrade a node to storage-only
    /// rather than stopping it.
    pub fn is_clock_degradation(&self) -> bool {
        matches!(self, Self::ClockShifted { .. } | Self::NoNtpReply(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GossipError {
    #[error("cannot start a gossip cycle without any seed")]
    NoSeeds,

    #[error(transparent)]
    Messenger(#[from] MessengerError),

    #[error("gossip round task failed")]
    RoundTask(#[from] tokio::task::JoinError),
}
