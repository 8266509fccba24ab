use std::fmt::Display;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use super::PeerParseError;

/// Length of the keys generated by [`PublicKey::random`].
pub const GENERATED_KEY_LENGTH: usize = 32;

/// The network-wide identifier of a peer.
///
/// The key is treated as an opaque, comparable byte string. It is rendered
/// and parsed as lower-case hex.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Generate a random key. Used when a node is started without an
    /// explicit identity.
    pub fn random() -> Self {
        Self(rand::random::<[u8; GENERATED_KEY_LENGTH]>().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl FromStr for PublicKey {
    type Err = PeerParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PeerParseError::PublicKey(s.to_string()));
        }

        hex::decode(trimmed)
            .map(Self)
            .map_err(|_| PeerParseError::PublicKey(s.to_string()))
    }
}

/// Immutable identity of a peer: where to reach it and who it is.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PeerIdentity {
    address: SocketAddr,
    public_key: PublicKey,
}

impl PeerIdentity {
    pub fn new(ip: IpAddr, port: u16, public_key: PublicKey) -> Self {
        Self {
            address: SocketAddr::new(ip, port),
            public_key,
        }
    }

    pub fn from_address(address: SocketAddr, public_key: PublicKey) -> Self {
        Self {
            address,
            public_key,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn ip(&self) -> IpAddr {
        self.address.ip()
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Two identities denote the same peer iff their public keys match.
    pub fn same_peer(&self, other: &PeerIdentity) -> bool {
        self.public_key == other.public_key
    }
}

impl Display for PeerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.ip(), self.port(), self.public_key)
    }
}

/// Parses the `ip:port:publicKey` form. The IP may be IPv6, so the string is
/// split from the right.
impl FromStr for PeerIdentity {
    type Err = PeerParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().rsplitn(3, ':');
        let (Some(key), Some(port), Some(ip)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(PeerParseError::Malformed(s.to_string()));
        };

        let ip = ip
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map_err(|_| PeerParseError::Ip(ip.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| PeerParseError::Port(port.to_string()))?;
        let public_key = key.parse::<PublicKey>()?;

        Ok(Self::new(ip, port, public_key))
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::net::Ipv6Addr;

    use super::*;

    #[test]
    fn parse_ipv4_identity() {
        let identity: PeerIdentity = "10.0.0.1:3000:0a0b".parse().unwrap();
        assert_eq!(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), identity.ip());
        assert_eq!(3000, identity.port());
        assert_eq!(&PublicKey::new(vec![0x0a, 0x0b]), identity.public_key());
        assert_eq!("10.0.0.1:3000:0a0b", identity.to_string());
    }

    #[test]
    fn parse_ipv6_identity() {
        let identity: PeerIdentity = "::1:3000:ff".parse().unwrap();
        assert_eq!(IpAddr::V6(Ipv6Addr::LOCALHOST), identity.ip());
        assert_eq!(3000, identity.port());

        let bracketed: PeerIdentity = "[::1]:3000:ff".parse().unwrap();
        assert_eq!(identity, bracketed);
    }

    #[test]
    fn reject_malformed_identities() {
        assert_eq!(
            Err(PeerParseError::Malformed("10.0.0.1".to_string())),
            "10.0.0.1".parse::<PeerIdentity>()
        );
        assert_eq!(
            Err(PeerParseError::Port("port".to_string())),
            "10.0.0.1:port:ff".parse::<PeerIdentity>()
        );
        assert_eq!(
            Err(PeerParseError::Ip("ten".to_string())),
            "ten:3000:ff".parse::<PeerIdentity>()
        );
        assert!(matches!(
            "10.0.0.1:3000:not-hex".parse::<PeerIdentity>(),
            Err(PeerParseError::PublicKey(_))
        ));
        assert!(matches!(
            "10.0.0.1:3000:".parse::<PeerIdentity>(),
            Err(PeerParseError::PublicKey(_))
        ));
    }

    #[test]
    fn identities_are_the_same_peer_iff_keys_match() {
        let key = PublicKey::new(vec![1, 2, 3]);
        let a = PeerIdentity::new(Ipv4Addr::LOCALHOST.into(), 3000, key.clone());
        let moved = PeerIdentity::new(Ipv4Addr::new(10, 0, 0, 1).into(), 4000, key);
        let other = PeerIdentity::new(Ipv4Addr::LOCALHOST.into(), 3000, PublicKey::random());

        assert!(a.same_peer(&moved));
        assert!(!a.same_peer(&other));
    }
}
