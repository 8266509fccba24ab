use std::fmt::Display;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use super::PeerIdentity;
use super::PeerParseError;
use super::PublicKey;

/// Separator between entries of a configured seed list.
pub const SEED_LIST_SEPARATOR: char = ';';

/// A well-known bootstrap peer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Seed(PeerIdentity);

impl Seed {
    pub fn new(identity: PeerIdentity) -> Self {
        Self(identity)
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.0
    }

    pub fn public_key(&self) -> &PublicKey {
        self.0.public_key()
    }
}

impl From<PeerIdentity> for Seed {
    fn from(identity: PeerIdentity) -> Self {
        Self(identity)
    }
}

impl From<Seed> for PeerIdentity {
    fn from(seed: Seed) -> Self {
        seed.0
    }
}

impl Display for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Seed {
    type Err = PeerParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<PeerIdentity>().map(Self)
    }
}

/// Parse a `;`-separated list of `ip:port:publicKey` triples. Empty entries
/// are skipped so trailing separators are harmless.
pub fn parse_seed_list(list: &str) -> Result<Vec<Seed>, PeerParseError> {
    list.split(SEED_LIST_SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_seed_list_with_trailing_separator() {
        let seeds = parse_seed_list("10.0.0.1:3000:aa; 10.0.0.2:3001:bb;").unwrap();
        assert_eq!(2, seeds.len());
        assert_eq!(3001, seeds[1].identity().port());
        assert_eq!(&PublicKey::new(vec![0xaa]), seeds[0].public_key());
    }

    #[test]
    fn empty_seed_list_is_empty() {
        assert!(parse_seed_list("").unwrap().is_empty());
        assert!(parse_seed_list(" ; ").unwrap().is_empty());
    }

    #[test]
    fn one_bad_entry_rejects_the_list() {
        assert!(parse_seed_list("10.0.0.1:3000:aa;10.0.0.2:bb").is_err());
    }
}
