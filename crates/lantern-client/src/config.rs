//! Client configuration: the trusted bootstrap committee, the chain
//! parameters it belongs to, and the default endpoints per network.

use clap::ValueEnum;
use lantern_core::types::beacon::{compute_sync_period_at_slot, BlsPublicKey, SYNC_COMMITTEE_SIZE};
use lantern_core::ChainConfig;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid bootstrap data: {0}")]
    InvalidBootstrap(String),

    #[error("genesis committee has {0} keys, expected {}", SYNC_COMMITTEE_SIZE)]
    CommitteeSize(usize),

    #[error("no {strategy} provers configured for {network}")]
    NoProvers {
        strategy: StrategyKind,
        network: Network,
    },
}

/// Supported beacon networks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Network {
    Mainnet,
    Sepolia,
}

impl Network {
    pub fn chain_config(self) -> ChainConfig {
        match self {
            Network::Mainnet => ChainConfig::mainnet(),
            Network::Sepolia => ChainConfig::sepolia(),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Sepolia => write!(f, "sepolia"),
        }
    }
}

/// Which sync strategy a set of provers speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum StrategyKind {
    Light,
    Optimistic,
    Superlight,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Light => write!(f, "light"),
            StrategyKind::Optimistic => write!(f, "optimistic"),
            StrategyKind::Superlight => write!(f, "superlight"),
        }
    }
}

/// The trusted starting point: a sync committee and the slot it was read at.
///
/// Loaded from a bootstrap JSON file:
///
/// ```json
/// {
///   "committee_pk": ["0x...", "..."],
///   "slot": "7995392",
///   "genesis_time": 1606824023,
///   "genesis_validator_root": "0x4b36..."
/// }
/// ```
///
/// `slot` and `genesis_time` may be JSON numbers or decimal strings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GenesisData {
    #[serde(rename = "committee_pk")]
    pub committee: Vec<BlsPublicKey>,
    #[serde(deserialize_with = "u64_from_any")]
    pub slot: u64,
    #[serde(rename = "genesis_time", default, deserialize_with = "opt_u64_from_any")]
    pub time: Option<u64>,
    #[serde(default, deserialize_with = "opt_root_from_hex")]
    pub genesis_validator_root: Option<[u8; 32]>,
}

impl GenesisData {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let data: GenesisData =
            serde_json::from_str(json).map_err(|e| ConfigError::InvalidBootstrap(e.to_string()))?;
        if data.committee.len() != SYNC_COMMITTEE_SIZE {
            return Err(ConfigError::CommitteeSize(data.committee.len()));
        }
        Ok(data)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn period(&self) -> u64 {
        compute_sync_period_at_slot(self.slot)
    }
}

/// Everything a [`Client`](crate::client::Client) needs besides its collaborators.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub genesis: GenesisData,
    pub chain: ChainConfig,
    /// Cap on the number of configured provers to use; `None` uses all of them.
    pub max_provers: Option<usize>,
}

impl ClientConfig {
    /// Config for `network`. Chain genesis parameters carried by the
    /// bootstrap file take precedence over the preset.
    pub fn for_network(
        network: Network,
        genesis: GenesisData,
        max_provers: Option<usize>,
    ) -> Self {
        let mut chain = network.chain_config();
        if let Some(time) = genesis.time {
            chain.genesis_time = time;
        }
        if let Some(root) = genesis.genesis_validator_root {
            chain.genesis_validators_root = root;
        }
        Self {
            genesis,
            chain,
            max_provers,
        }
    }

    pub fn genesis_period(&self) -> u64 {
        self.genesis.period()
    }

    /// The first `max_provers` of `urls`, or all of them.
    pub fn select<'a>(&self, urls: &'a [String]) -> &'a [String] {
        match self.max_provers {
            Some(max) => &urls[..max.min(urls.len())],
            None => urls,
        }
    }
}

const MAINNET_BEACON_API: &str = "https://lodestar-mainnet.chainsafe.io";
const SEPOLIA_BEACON_API: &str = "https://lodestar-sepolia.chainsafe.io";

/// Default beacon API and prover URLs per network. Built once and passed
/// to whoever constructs clients.
#[derive(Clone, Debug, Default)]
pub struct EndpointTable {
    beacon_api: BTreeMap<Network, String>,
    provers: BTreeMap<(StrategyKind, Network), Vec<String>>,
}

impl EndpointTable {
    pub fn defaults() -> Self {
        Self::default()
            .with_beacon_api(Network::Mainnet, MAINNET_BEACON_API)
            .with_beacon_api(Network::Sepolia, SEPOLIA_BEACON_API)
            // Light provers are plain beacon nodes.
            .with_provers(StrategyKind::Light, Network::Mainnet, [MAINNET_BEACON_API])
            .with_provers(StrategyKind::Light, Network::Sepolia, [SEPOLIA_BEACON_API])
            .with_provers(
                StrategyKind::Optimistic,
                Network::Mainnet,
                [
                    "https://light-optimistic-mainnet-1.herokuapp.com",
                    "https://light-optimistic-mainnet-2.herokuapp.com",
                ],
            )
            .with_provers(
                StrategyKind::Optimistic,
                Network::Sepolia,
                [
                    "https://light-optimistic-goerli-1.herokuapp.com",
                    "https://light-optimistic-goerli-2.herokuapp.com",
                ],
            )
    }

    pub fn with_beacon_api(mut self, network: Network, url: impl Into<String>) -> Self {
        self.beacon_api.insert(network, url.into());
        self
    }

    pub fn with_provers<I, U>(mut self, strategy: StrategyKind, network: Network, urls: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<String>,
    {
        self.provers
            .insert((strategy, network), urls.into_iter().map(Into::into).collect());
        self
    }

    pub fn beacon_api(&self, network: Network) -> Option<&str> {
        self.beacon_api.get(&network).map(String::as_str)
    }

    pub fn provers(&self, strategy: StrategyKind, network: Network) -> Result<&[String], ConfigError> {
        self.provers
            .get(&(strategy, network))
            .filter(|urls| !urls.is_empty())
            .map(Vec::as_slice)
            .ok_or(ConfigError::NoProvers { strategy, network })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    fn into_u64<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s.trim().parse().map_err(E::custom),
        }
    }
}

fn u64_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    NumberOrString::deserialize(deserializer)?.into_u64()
}

fn opt_u64_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Option::<NumberOrString>::deserialize(deserializer)?
        .map(NumberOrString::into_u64)
        .transpose()
}

fn opt_root_from_hex<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<[u8; 32]>, D::Error> {
    Option::<String>::deserialize(deserializer)?
        .map(|s| crate::beacon_api::hex_to_bytes32(&s).map_err(serde::de::Error::custom))
        .transpose()
}
