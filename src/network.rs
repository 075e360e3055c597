//! Network registry: the chains a BOLT 11 invoice can target.

use crate::error::{Bolt11Error, Result};

/// A target chain's bech32 prefix, address version bytes, and the set of
/// witness versions it accepts on a fallback address.
///
/// This is a read-only configuration record, not a feature switch: the five
/// predefined instances below are the only values BOLT 11 defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Network {
    pub bech32_prefix: &'static str,
    pub p2pkh_version_byte: u8,
    pub p2sh_version_byte: u8,
    pub valid_witness_versions: &'static [u8],
}

const SEGWIT_VERSIONS: &[u8] = &[
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16,
];

pub const BITCOIN: Network = Network {
    bech32_prefix: "bc",
    p2pkh_version_byte: 0x00,
    p2sh_version_byte: 0x05,
    valid_witness_versions: SEGWIT_VERSIONS,
};

pub const TESTNET: Network = Network {
    bech32_prefix: "tb",
    p2pkh_version_byte: 0x6f,
    p2sh_version_byte: 0xc4,
    valid_witness_versions: SEGWIT_VERSIONS,
};

pub const SIGNET: Network = Network {
    bech32_prefix: "tbs",
    p2pkh_version_byte: 0x6f,
    p2sh_version_byte: 0xc4,
    valid_witness_versions: SEGWIT_VERSIONS,
};

pub const REGTEST: Network = Network {
    bech32_prefix: "bcrt",
    p2pkh_version_byte: 0x6f,
    p2sh_version_byte: 0xc4,
    valid_witness_versions: SEGWIT_VERSIONS,
};

pub const SIMNET: Network = Network {
    bech32_prefix: "sb",
    p2pkh_version_byte: 0x3f,
    p2sh_version_byte: 0x7b,
    valid_witness_versions: SEGWIT_VERSIONS,
};

/// All predefined networks, longest bech32 prefix first so a greedy prefix
/// match (`bcrt` before `bc`) never misparses the HRP.
const ALL: &[Network] = &[REGTEST, SIGNET, TESTNET, SIMNET, BITCOIN];

impl Network {
    /// Look a network up by its exact bech32 prefix (e.g. `"tb"`).
    pub fn by_prefix(prefix: &str) -> Result<Network> {
        ALL.iter()
            .find(|n| n.bech32_prefix == prefix)
            .copied()
            .ok_or_else(|| Bolt11Error::UnknownNetwork(prefix.to_string()))
    }

    /// Split `ln<prefix><amount?>` into the matching network and the
    /// remaining amount token, preferring the longest known prefix.
    pub fn split_hrp(rest: &str) -> Result<(Network, &str)> {
        for network in ALL {
            if let Some(amount) = rest.strip_prefix(network.bech32_prefix) {
                return Ok((*network, amount));
            }
        }
        Err(Bolt11Error::UnknownNetwork(rest.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regtest_matches_before_bitcoin() {
        let (network, amount) = Network::split_hrp("bcrt2500u").unwrap();
        assert_eq!(network, REGTEST);
        assert_eq!(amount, "2500u");
    }

    #[test]
    fn bitcoin_without_amount() {
        let (network, amount) = Network::split_hrp("bc").unwrap();
        assert_eq!(network, BITCOIN);
        assert_eq!(amount, "");
    }

    #[test]
    fn unknown_prefix_is_an_error() {
        assert_eq!(
            Network::split_hrp("xx1").unwrap_err(),
            Bolt11Error::UnknownNetwork("xx1".to_string())
        );
    }

    #[test]
    fn by_prefix_lookup() {
        assert_eq!(Network::by_prefix("tbs").unwrap(), SIGNET);
        assert!(Network::by_prefix("zz").is_err());
    }
}
