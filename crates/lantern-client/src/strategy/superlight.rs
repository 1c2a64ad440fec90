use super::{
    transition_matches_committee, FightOutcome, ProverInfo, SyncStrategy, SyncTarget,
    DEFAULT_TREE_DEGREE,
};
use crate::error::ClientError;
use crate::prover::{PeriodOrLatest, SuperlightProver};
use async_trait::async_trait;
use futures::future::join_all;
use lantern_core::merkle::{log_floor, Hash, MerkleMountainVerify, MerkleVerify, Peak};
use lantern_core::ssz::sha256;
use lantern_core::types::beacon::{BlsPublicKey, SYNC_COMMITTEE_SIZE};
use lantern_core::{committee_hash, is_committee_same, ChainConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A prover's mountain-range commitment over every period since genesis.
#[derive(Clone, Debug)]
struct MmrClaim {
    index: usize,
    root: Hash,
    peaks: Vec<Peak>,
}

/// Where a bisection ended: a party was caught forging a node, or both
/// trees are well-formed down to the first leaf they disagree on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bisection {
    Decided(FightOutcome),
    FirstDifference(usize),
}

/// Bisection sync over MMR commitments of committee hashes.
///
/// A dispute costs `O(log_n size)` node requests followed by a single
/// committee-update check at the first differing period.
pub struct SuperlightSync {
    chain: ChainConfig,
    provers: Vec<Arc<dyn SuperlightProver>>,
    degree: usize,
    tree_verify: MerkleVerify,
    mountain_verify: MerkleMountainVerify,
}

impl SuperlightSync {
    pub fn new(chain: ChainConfig, provers: Vec<Arc<dyn SuperlightProver>>) -> Self {
        Self::with_degree(chain, provers, DEFAULT_TREE_DEGREE)
    }

    pub fn with_degree(
        chain: ChainConfig,
        provers: Vec<Arc<dyn SuperlightProver>>,
        degree: usize,
    ) -> Self {
        Self {
            chain,
            provers,
            degree,
            tree_verify: MerkleVerify::new(sha256, degree),
            mountain_verify: MerkleMountainVerify::new(sha256, degree),
        }
    }

    /// The committee at `period`, accepted only with a valid proof against
    /// the claim's peaks.
    async fn verified_committee(
        &self,
        target: &SyncTarget,
        claim: &MmrClaim,
        period: PeriodOrLatest,
    ) -> Option<Vec<BlsPublicKey>> {
        let (peak, index) = match period {
            PeriodOrLatest::Latest => {
                let last = claim.peaks.last()?;
                (last, last.size.checked_sub(1)?)
            }
            PeriodOrLatest::Period(p) => {
                let leaf = p.checked_sub(target.genesis_period)? as usize;
                self.mountain_verify.peak_and_index(&claim.peaks, leaf)?
            }
        };

        let leaf = match self.provers[claim.index].get_leaf_with_proof(period).await {
            Ok(leaf) => leaf,
            Err(e) => {
                warn!(prover = claim.index, %period, error = %e, "failed to fetch leaf");
                return None;
            }
        };
        if leaf.sync_committee.len() != SYNC_COMMITTEE_SIZE {
            warn!(prover = claim.index, %period, "leaf committee has the wrong size");
            return None;
        }
        let leaf_hash = committee_hash(&leaf.sync_committee);
        if !self
            .tree_verify
            .verify(&leaf_hash, index, &peak.root_hash, &leaf.proof)
        {
            warn!(prover = claim.index, %period, "leaf proof does not match the committed peak");
            return None;
        }
        Some(leaf.sync_committee)
    }

    /// Children of `node` in the tree rooted at `tree_root`, if the prover
    /// serves exactly `degree` of them hashing back to `node`.
    async fn verified_children(&self, claim: &MmrClaim, tree_root: &Hash, node: &Hash) -> Option<Vec<Hash>> {
        let info = match self.provers[claim.index].get_node(tree_root, node).await {
            Ok(info) => info,
            Err(e) => {
                warn!(prover = claim.index, error = %e, "failed to fetch node");
                return None;
            }
        };
        let children = info.children?;
        (children.len() == self.degree && sha256(&children.concat()) == *node).then_some(children)
    }

    /// Descend `steps` levels from two differing peak roots to the first leaf
    /// where the trees disagree. Returns the leaf index inside the peak.
    async fn tree_vs_tree(
        &self,
        first: &MmrClaim,
        second: &MmrClaim,
        root1: Hash,
        root2: Hash,
        steps: usize,
    ) -> Result<Bisection, ClientError> {
        let (mut node1, mut node2, mut index) = (root1, root2, 0usize);
        for _ in 0..steps {
            debug!(
                node1 = %hex::encode(&node1[..4]),
                node2 = %hex::encode(&node2[..4]),
                "compare nodes"
            );
            let children1 = self.verified_children(first, &root1, &node1).await;
            let children2 = self.verified_children(second, &root2, &node2).await;
            let (children1, children2) = match (children1, children2) {
                (Some(c1), Some(c2)) => (c1, c2),
                (c1, c2) => {
                    return FightOutcome::decide(c1.is_some(), c2.is_some()).map(Bisection::Decided)
                }
            };

            let Some(i) = (0..self.degree).find(|&i| children1[i] != children2[i]) else {
                return Err(ClientError::ProtocolViolation(
                    "differing nodes can not have identical children".into(),
                ));
            };
            node1 = children1[i];
            node2 = children2[i];
            index = index * self.degree + i;
        }
        debug!(index, "found first point of disagreement");
        Ok(Bisection::FirstDifference(index))
    }

    /// Settle a dispute over leaf `leaf_index` of the range.
    async fn check_node_and_prev_update(
        &self,
        target: &SyncTarget,
        first: &MmrClaim,
        second: &MmrClaim,
        leaf_index: usize,
    ) -> Result<FightOutcome, ClientError> {
        let period = target.genesis_period + leaf_index as u64;
        let committee1 = self
            .verified_committee(target, first, PeriodOrLatest::Period(period))
            .await;
        let committee2 = self
            .verified_committee(target, second, PeriodOrLatest::Period(period))
            .await;
        let (committee1, committee2) = match (committee1, committee2) {
            (Some(c1), Some(c2)) => (c1, c2),
            (c1, c2) => return FightOutcome::decide(c1.is_some(), c2.is_some()),
        };

        if leaf_index == 0 {
            return FightOutcome::decide(
                is_committee_same(&target.genesis_committee, &committee1),
                is_committee_same(&target.genesis_committee, &committee2),
            );
        }

        // Both trees agree on every leaf before the disputed one.
        let prev_period = PeriodOrLatest::Period(period - 1);
        let prev_committee = match self.verified_committee(target, first, prev_period).await {
            Some(c) => c,
            None => match self.verified_committee(target, second, prev_period).await {
                Some(c) => c,
                None => return Ok(FightOutcome::BothLose),
            },
        };

        let mut valid = [false; 2];
        for (slot, (claim, committee)) in [(first, &committee1), (second, &committee2)]
            .into_iter()
            .enumerate()
        {
            valid[slot] = match self.provers[claim.index].get_sync_update(period - 1, 1).await {
                Ok(update) => transition_matches_committee(
                    &self.chain,
                    &prev_committee,
                    &update,
                    period - 1,
                    committee,
                ),
                Err(e) => {
                    warn!(prover = claim.index, period, error = %e, "failed to fetch update for fight");
                    false
                }
            };
        }
        FightOutcome::decide(valid[0], valid[1])
    }

    async fn peaks_vs_peaks(
        &self,
        target: &SyncTarget,
        first: &MmrClaim,
        second: &MmrClaim,
    ) -> Result<FightOutcome, ClientError> {
        if first.peaks.len() != second.peaks.len() {
            return Err(ClientError::ProtocolViolation(
                "there should be an equal number of peaks".into(),
            ));
        }
        let mut offset = 0;
        for (peak1, peak2) in first.peaks.iter().zip(&second.peaks) {
            if peak1.root_hash != peak2.root_hash {
                info!(
                    peak1 = %hex::encode(&peak1.root_hash[..4]),
                    peak2 = %hex::encode(&peak2.root_hash[..4]),
                    size = peak1.size,
                    "tree vs tree"
                );
                let steps = log_floor(peak1.size, self.degree);
                return match self
                    .tree_vs_tree(first, second, peak1.root_hash, peak2.root_hash, steps)
                    .await?
                {
                    Bisection::Decided(outcome) => Ok(outcome),
                    Bisection::FirstDifference(index) => {
                        self.check_node_and_prev_update(target, first, second, index + offset)
                            .await
                    }
                };
            }
            offset += peak1.size;
        }
        Err(ClientError::ProtocolViolation("all peaks should not be same".into()))
    }

    async fn tournament(&self, target: &SyncTarget, claims: Vec<MmrClaim>) -> Result<Vec<MmrClaim>, ClientError> {
        let mut winners: Vec<MmrClaim> = Vec::new();
        for claim in claims {
            let Some(current) = winners.first().cloned() else {
                winners.push(claim);
                continue;
            };
            if current.root == claim.root {
                debug!(prover = claim.index, "joined the existing winners");
                winners.push(claim);
                continue;
            }

            info!(winner = current.index, challenger = claim.index, "peaks vs peaks");
            match self.peaks_vs_peaks(target, &current, &claim).await? {
                FightOutcome::FirstWins => debug!(prover = claim.index, "challenger defeated"),
                FightOutcome::SecondWins => {
                    info!(prover = claim.index, "challenger defeated all existing winners");
                    winners = vec![claim];
                }
                FightOutcome::BothLose => {
                    warn!(winner = current.index, challenger = claim.index, "both parties failed");
                    winners.remove(0);
                }
            }
        }
        Ok(winners)
    }
}

#[async_trait]
impl SyncStrategy for SuperlightSync {
    async fn sync_from_genesis(&self, target: &SyncTarget) -> Result<Vec<ProverInfo>, ClientError> {
        let size = (target.current_period.saturating_sub(target.genesis_period) + 1) as usize;
        info!(
            provers = self.provers.len(),
            from = target.genesis_period,
            to = target.current_period,
            "superlight sync started"
        );

        let infos = join_all(self.provers.iter().map(|p| p.get_mmr_info())).await;
        let claims: Vec<MmrClaim> = infos
            .into_iter()
            .enumerate()
            .filter_map(|(index, info)| match info {
                Ok(info) if self.mountain_verify.verify(&info.root_hash, &info.peaks, size) => {
                    Some(MmrClaim {
                        index,
                        root: info.root_hash,
                        peaks: info.peaks,
                    })
                }
                Ok(_) => {
                    warn!(prover = index, "prover filtered because of incorrect MMR");
                    None
                }
                Err(e) => {
                    warn!(prover = index, error = %e, "failed to fetch MMR");
                    None
                }
            })
            .collect();
        if claims.is_empty() {
            return Err(ClientError::ProversDishonest);
        }

        let winners = self.tournament(target, claims).await?;
        for winner in &winners {
            if let Some(sync_committee) = self
                .verified_committee(target, winner, PeriodOrLatest::Latest)
                .await
            {
                info!(prover = winner.index, period = target.current_period, "superlight sync finished");
                return Ok(vec![ProverInfo {
                    index: winner.index,
                    sync_committee,
                }]);
            }
        }
        Err(ClientError::AllWinnersCheated)
    }
}
