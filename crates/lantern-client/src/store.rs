//! In-memory store of committee updates.
//!
//! The store keeps updates exactly as they were handed in. It does not
//! verify anything: a light sync records only updates that passed
//! verification, while tests fill stores with forged histories to play
//! dishonest provers. Because every lookup the prover traits need can be
//! answered from the updates alone, a store doubles as an in-process prover
//! of every tier.

use crate::prover::{
    LeafWithProof, LightProver, MmrInfo, OptimisticProver, PeriodOrLatest, ProverError,
    SuperlightProver, TreeNode,
};
use async_trait::async_trait;
use lantern_core::merkle::{Hash, MerkleMountainRange};
use lantern_core::ssz::sha256;
use lantern_core::types::beacon::{BlsPublicKey, LightClientUpdate};
use lantern_core::committee_hash;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::trace;

pub struct UpdateStore {
    genesis_period: u64,
    genesis_committee: Vec<BlsPublicKey>,
    degree: usize,
    inner: RwLock<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    /// `updates[p]` is attested in period `p` and installs committee `p + 1`.
    updates: BTreeMap<u64, LightClientUpdate>,
    /// Rebuilt lazily after every insert.
    mmr: Option<MerkleMountainRange>,
}

impl UpdateStore {
    pub fn new(genesis_period: u64, genesis_committee: Vec<BlsPublicKey>, degree: usize) -> Self {
        Self {
            genesis_period,
            genesis_committee,
            degree,
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// A store holding `updates`, which must be consecutive from genesis.
    pub fn with_updates(
        genesis_period: u64,
        genesis_committee: Vec<BlsPublicKey>,
        degree: usize,
        updates: impl IntoIterator<Item = LightClientUpdate>,
    ) -> Self {
        let updates = updates
            .into_iter()
            .enumerate()
            .map(|(i, u)| (genesis_period + i as u64, u))
            .collect();
        Self {
            genesis_period,
            genesis_committee,
            degree,
            inner: RwLock::new(StoreInner { updates, mmr: None }),
        }
    }

    pub fn genesis_period(&self) -> u64 {
        self.genesis_period
    }

    pub async fn add_update(&self, period: u64, update: LightClientUpdate) -> Result<(), ProverError> {
        if update.next_sync_committee.is_none() {
            return Err(ProverError::Decode(format!(
                "update for period {} carries no next sync committee",
                period
            )));
        }
        let mut inner = self.inner.write().await;
        inner.updates.insert(period, update);
        inner.mmr = None;
        trace!(period, "update stored");
        Ok(())
    }

    pub async fn update(&self, period: u64) -> Result<LightClientUpdate, ProverError> {
        self.inner
            .read()
            .await
            .updates
            .get(&period)
            .cloned()
            .ok_or_else(|| ProverError::NotFound(format!("update for period {}", period)))
    }

    /// The last period whose committee is known.
    pub async fn latest_period(&self) -> u64 {
        let inner = self.inner.read().await;
        self.contiguous_end(&inner.updates)
    }

    pub async fn committee(&self, period: u64) -> Result<Vec<BlsPublicKey>, ProverError> {
        let inner = self.inner.read().await;
        self.committee_at(&inner.updates, period).map(<[_]>::to_vec)
    }

    pub async fn committee_hashes(&self, start_period: u64, count: u64) -> Result<Vec<Hash>, ProverError> {
        let inner = self.inner.read().await;
        (start_period..start_period + count)
            .map(|p| self.committee_at(&inner.updates, p).map(committee_hash))
            .collect()
    }

    fn contiguous_end(&self, updates: &BTreeMap<u64, LightClientUpdate>) -> u64 {
        let mut period = self.genesis_period;
        while updates.contains_key(&period) {
            period += 1;
        }
        period
    }

    fn committee_at<'a>(
        &'a self,
        updates: &'a BTreeMap<u64, LightClientUpdate>,
        period: u64,
    ) -> Result<&'a [BlsPublicKey], ProverError> {
        if period == self.genesis_period {
            return Ok(&self.genesis_committee);
        }
        let missing = || ProverError::NotFound(format!("committee for period {}", period));
        if period < self.genesis_period {
            return Err(missing());
        }
        updates
            .get(&(period - 1))
            .and_then(|u| u.next_sync_committee.as_ref())
            .map(|c| c.pubkeys.as_slice())
            .ok_or_else(missing)
    }

    async fn with_mmr<R>(
        &self,
        f: impl FnOnce(&MerkleMountainRange) -> Result<R, ProverError>,
    ) -> Result<R, ProverError> {
        let mut guard = self.inner.write().await;
        let StoreInner { updates, mmr } = &mut *guard;
        if mmr.is_none() {
            let leaves = (self.genesis_period..=self.contiguous_end(updates))
                .map(|p| self.committee_at(updates, p).map(committee_hash))
                .collect::<Result<Vec<_>, _>>()?;
            *mmr = Some(MerkleMountainRange::new(sha256, self.degree, &leaves)?);
        }
        match mmr.as_ref() {
            Some(mmr) => f(mmr),
            None => Err(ProverError::NotFound("mountain range".into())),
        }
    }
}

#[async_trait]
impl LightProver for UpdateStore {
    async fn get_sync_update(
        &self,
        period: u64,
        _current_period: u64,
        _cache_count: u64,
    ) -> Result<LightClientUpdate, ProverError> {
        self.update(period).await
    }
}

#[async_trait]
impl OptimisticProver for UpdateStore {
    async fn get_committee(&self, period: PeriodOrLatest) -> Result<Vec<BlsPublicKey>, ProverError> {
        let period = match period {
            PeriodOrLatest::Period(p) => p,
            PeriodOrLatest::Latest => self.latest_period().await,
        };
        self.committee(period).await
    }

    async fn get_committee_hash(
        &self,
        period: u64,
        _current_period: u64,
        _cache_count: u64,
    ) -> Result<Hash, ProverError> {
        let inner = self.inner.read().await;
        self.committee_at(&inner.updates, period).map(committee_hash)
    }

    async fn get_sync_update(&self, period: u64) -> Result<LightClientUpdate, ProverError> {
        self.update(period).await
    }
}

#[async_trait]
impl SuperlightProver for UpdateStore {
    async fn get_leaf_with_proof(&self, period: PeriodOrLatest) -> Result<LeafWithProof, ProverError> {
        let period = match period {
            PeriodOrLatest::Period(p) => p,
            PeriodOrLatest::Latest => self.latest_period().await,
        };
        let sync_committee = self.committee(period).await?;
        let index = (period - self.genesis_period) as usize;
        self.with_mmr(|mmr| {
            let proof = mmr.generate_proof(index)?;
            Ok(LeafWithProof {
                sync_committee,
                root_hash: mmr.root_hash(),
                proof: proof.proof,
            })
        })
        .await
    }

    async fn get_mmr_info(&self) -> Result<MmrInfo, ProverError> {
        self.with_mmr(|mmr| {
            Ok(MmrInfo {
                root_hash: mmr.root_hash(),
                peaks: mmr.peaks(),
            })
        })
        .await
    }

    async fn get_node(&self, tree_root: &Hash, node_hash: &Hash) -> Result<TreeNode, ProverError> {
        self.with_mmr(|mmr| {
            let tree = mmr.tree(tree_root).ok_or(ProverError::UnknownNode)?;
            let node = tree.node_by_hash(node_hash).ok_or(ProverError::UnknownNode)?;
            Ok(TreeNode {
                is_leaf: node.is_leaf(),
                children: (!node.is_leaf()).then(|| tree.children_hashes(node)),
            })
        })
        .await
    }

    async fn get_sync_update(&self, period: u64, _cache_count: u64) -> Result<LightClientUpdate, ProverError> {
        self.update(period).await
    }
}
