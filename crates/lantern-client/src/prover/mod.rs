//! Prover capability tiers and their adapters.
//!
//! A prover is an untrusted service. The traits below are the narrow
//! contracts the sync strategies consume; every value they return is checked
//! by lantern-core before it influences the client's state.

pub mod beacon;
pub mod optimistic;
pub mod superlight;

pub use beacon::BeaconApiClient;
pub use optimistic::HttpOptimisticProver;
pub use superlight::HttpSuperlightProver;

use crate::network::NetworkError;
use async_trait::async_trait;
use lantern_core::merkle::{Hash, MerkleError, Peak};
use lantern_core::types::beacon::{BlsPublicKey, LightClientUpdate};
use lantern_core::SszError;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProverError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("failed to decode prover response: {0}")]
    Decode(String),

    #[error("{0} unavailable")]
    NotFound(String),

    #[error("node is not part of the committed tree")]
    UnknownNode,

    #[error("integrity mismatch: {0}")]
    IntegrityMismatch(String),

    #[error(transparent)]
    Ssz(#[from] SszError),

    #[error(transparent)]
    Merkle(#[from] MerkleError),
}

/// A concrete period, or whatever the prover considers current.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeriodOrLatest {
    Period(u64),
    Latest,
}

impl fmt::Display for PeriodOrLatest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodOrLatest::Period(p) => write!(f, "{}", p),
            PeriodOrLatest::Latest => f.write_str("latest"),
        }
    }
}

/// A committee together with its proof inside the prover's mountain range.
/// `proof` reaches the root of the peak holding the leaf, not the MMR root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafWithProof {
    pub sync_committee: Vec<BlsPublicKey>,
    pub root_hash: Hash,
    pub proof: Vec<Vec<Hash>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MmrInfo {
    pub root_hash: Hash,
    pub peaks: Vec<Peak>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    pub is_leaf: bool,
    pub children: Option<Vec<Hash>>,
}

/// Serves committee transitions one period at a time.
#[async_trait]
pub trait LightProver: Send + Sync {
    /// The update attested in `period`, which installs committee `period + 1`.
    /// Implementations may prefetch up to `cache_count` periods, never past
    /// `current_period`.
    async fn get_sync_update(
        &self,
        period: u64,
        current_period: u64,
        cache_count: u64,
    ) -> Result<LightClientUpdate, ProverError>;
}

/// Commits to committee hashes per period and backs them with full data on demand.
#[async_trait]
pub trait OptimisticProver: Send + Sync {
    async fn get_committee(&self, period: PeriodOrLatest) -> Result<Vec<BlsPublicKey>, ProverError>;

    async fn get_committee_hash(
        &self,
        period: u64,
        current_period: u64,
        cache_count: u64,
    ) -> Result<Hash, ProverError>;

    async fn get_sync_update(&self, period: u64) -> Result<LightClientUpdate, ProverError>;
}

/// Commits to every committee hash since genesis with a single MMR.
#[async_trait]
pub trait SuperlightProver: Send + Sync {
    async fn get_leaf_with_proof(&self, period: PeriodOrLatest) -> Result<LeafWithProof, ProverError>;

    async fn get_mmr_info(&self) -> Result<MmrInfo, ProverError>;

    async fn get_node(&self, tree_root: &Hash, node_hash: &Hash) -> Result<TreeNode, ProverError>;

    async fn get_sync_update(&self, period: u64, cache_count: u64) -> Result<LightClientUpdate, ProverError>;
}

/// Number of periods to request starting at `period`.
pub(crate) fn batch_len(period: u64, current_period: u64, cache_count: u64) -> u64 {
    (current_period.saturating_sub(period) + 1).min(cache_count.max(1))
}

/// Drop cached entries for periods the walk has already passed.
pub(crate) fn evict_below<V>(cache: &mut HashMap<u64, V>, period: u64) {
    cache.retain(|&p, _| p >= period);
}
