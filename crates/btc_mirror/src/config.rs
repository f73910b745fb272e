//! Mirror configuration: network rules and the genesis anchor.
//!
//! A config file is JSON:
//! `{ "network": "mainnet",
//!    "genesis": { "height": 0, "hash": "<hex>", "time": 0, "bits": 486604799 } }`.
//! `genesis` may be omitted, in which case the network's block 0 is used.
use std::fs;
use std::io;
use std::path::Path;

use btc_crypto::BlockHash;
use hex_literal::hex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::{AnchorError, StateDelta};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Anchor(#[from] AnchorError),
}

/// Which difficulty rules the mirror enforces.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    /// Testnet headers may drop to minimum difficulty, so the expected-target
    /// and retarget-floor rules are skipped. Proof-of-work against the
    /// header's own bits is still enforced.
    Testnet,
}

impl Network {
    pub fn enforces_difficulty(self) -> bool {
        matches!(self, Network::Mainnet)
    }

    /// Block 0 of the network.
    pub fn default_genesis(self) -> GenesisAnchor {
        match self {
            Network::Mainnet => GenesisAnchor {
                height: 0,
                hash: BlockHash(hex!(
                    "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
                )),
                time: 1_231_006_505,
                bits: 0x1d00ffff,
            },
            Network::Testnet => GenesisAnchor {
                height: 0,
                hash: BlockHash(hex!(
                    "000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f4943"
                )),
                time: 1_296_688_602,
                bits: 0x1d00ffff,
            },
        }
    }
}

/// Trusted starting point of the mirrored chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAnchor {
    pub height: u32,
    #[serde(with = "hash_hex")]
    pub hash: BlockHash,
    pub time: u32,
    /// Compact target of the anchor's retarget period.
    pub bits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub network: Network,
    pub genesis: GenesisAnchor,
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    network: Network,
    genesis: Option<GenesisAnchor>,
}

impl MirrorConfig {
    pub fn for_network(network: Network) -> Self {
        MirrorConfig {
            network,
            genesis: network.default_genesis(),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(s)?;
        let config = MirrorConfig {
            network: file.network,
            genesis: file
                .genesis
                .unwrap_or_else(|| file.network.default_genesis()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), AnchorError> {
        StateDelta::genesis(&self.genesis).map(|_| ())
    }
}

mod hash_hex {
    use btc_crypto::BlockHash;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(hash: &BlockHash, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hash.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BlockHash, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(D::Error::custom)
    }
}
