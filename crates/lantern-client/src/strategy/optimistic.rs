use super::{
    transition_matches_hash, FightOutcome, ProverInfo, SyncStrategy, SyncTarget, DEFAULT_BATCH_SIZE,
};
use crate::error::ClientError;
use crate::prover::{OptimisticProver, PeriodOrLatest, ProverError};
use async_trait::async_trait;
use futures::future::join_all;
use lantern_core::committee_hash;
use lantern_core::merkle::Hash;
use lantern_core::types::beacon::BlsPublicKey;
use lantern_core::ChainConfig;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A prover's committee-hash claim for the period under dispute.
#[derive(Clone, Copy, Debug)]
struct Claim {
    index: usize,
    committee_hash: Hash,
}

/// Tournament sync over per-period committee-hash claims.
///
/// Provers only send 32-byte hashes while they agree. When they disagree,
/// the current winner and the challenger each have to back their claim with
/// the committee update that installs it.
pub struct OptimisticSync {
    chain: ChainConfig,
    provers: Vec<Arc<dyn OptimisticProver>>,
    batch_size: u64,
}

impl OptimisticSync {
    pub fn new(chain: ChainConfig, provers: Vec<Arc<dyn OptimisticProver>>) -> Self {
        Self {
            chain,
            provers,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// The committee of `period` as served by prover `index`, accepted only
    /// if it hashes to `expected`.
    async fn get_committee(
        &self,
        target: &SyncTarget,
        period: u64,
        index: usize,
        expected: &Hash,
    ) -> Result<Vec<BlsPublicKey>, ProverError> {
        if period == target.genesis_period {
            return Ok(target.genesis_committee.clone());
        }
        let committee = self.provers[index]
            .get_committee(PeriodOrLatest::Period(period))
            .await?;
        if committee_hash(&committee) != *expected {
            return Err(ProverError::IntegrityMismatch(format!(
                "prover {} responded with an incorrect committee for period {}",
                index, period
            )));
        }
        Ok(committee)
    }

    /// Can prover `claim.index` prove that the transition out of
    /// `period - 1` installs the committee it claimed for `period`?
    async fn check_committee_hash_at(
        &self,
        claim: &Claim,
        period: u64,
        prev_committee: &[BlsPublicKey],
    ) -> bool {
        match self.provers[claim.index].get_sync_update(period - 1).await {
            Ok(update) => transition_matches_hash(
                &self.chain,
                prev_committee,
                &update,
                period - 1,
                &claim.committee_hash,
            ),
            Err(e) => {
                warn!(prover = claim.index, period, error = %e, "failed to fetch update for fight");
                false
            }
        }
    }

    async fn fight(
        &self,
        target: &SyncTarget,
        first: &Claim,
        second: &Claim,
        period: u64,
        prev_hash: &Hash,
    ) -> Result<FightOutcome, ClientError> {
        let mut prev_committee = None;
        for claim in [first, second] {
            match self.get_committee(target, period - 1, claim.index, prev_hash).await {
                Ok(committee) => {
                    prev_committee = Some(committee);
                    break;
                }
                Err(e) => warn!(
                    prover = claim.index,
                    period = period - 1,
                    error = %e,
                    "failed to fetch previous committee"
                ),
            }
        }
        let Some(prev_committee) = prev_committee else {
            warn!(period, "neither party could serve the previous committee");
            return Ok(FightOutcome::BothLose);
        };

        let first_valid = self.check_committee_hash_at(first, period, &prev_committee).await;
        let second_valid = self.check_committee_hash_at(second, period, &prev_committee).await;
        FightOutcome::decide(first_valid, second_valid)
    }

    async fn tournament(
        &self,
        target: &SyncTarget,
        claims: Vec<Claim>,
        period: u64,
        prev_hash: &Hash,
    ) -> Result<Vec<Claim>, ClientError> {
        let mut winners: Vec<Claim> = Vec::new();
        for claim in claims {
            let Some(current) = winners.first().copied() else {
                winners.push(claim);
                continue;
            };
            if current.committee_hash == claim.committee_hash {
                debug!(prover = claim.index, "joined the existing winners");
                winners.push(claim);
                continue;
            }

            info!(period, winner = current.index, challenger = claim.index, "fight");
            match self.fight(target, &current, &claim, period, prev_hash).await? {
                FightOutcome::FirstWins => {
                    debug!(prover = claim.index, "challenger defeated");
                }
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
impl SyncStrategy for OptimisticSync {
    async fn sync_from_genesis(&self, target: &SyncTarget) -> Result<Vec<ProverInfo>, ClientError> {
        let current_period = target.current_period;
        info!(
            provers = self.provers.len(),
            from = target.genesis_period,
            to = current_period,
            "optimistic sync started"
        );

        let mut last_hash = committee_hash(&target.genesis_committee);
        let mut claims: Vec<Claim> = (0..self.provers.len())
            .map(|index| Claim {
                index,
                committee_hash: [0u8; 32],
            })
            .collect();

        let mut period = target.genesis_period + 1;
        while period <= current_period {
            let hashes = join_all(claims.iter().map(|c| {
                self.provers[c.index].get_committee_hash(period, current_period, self.batch_size)
            }))
            .await;

            claims = claims
                .into_iter()
                .zip(hashes)
                .filter_map(|(claim, hash)| match hash {
                    Ok(committee_hash) => Some(Claim {
                        index: claim.index,
                        committee_hash,
                    }),
                    Err(e) => {
                        warn!(prover = claim.index, period, error = %e, "prover silent, excluded");
                        None
                    }
                })
                .collect();

            let disagree = claims
                .windows(2)
                .any(|w| w[0].committee_hash != w[1].committee_hash);
            if disagree {
                claims = self.tournament(target, claims, period, &last_hash).await?;
            }

            match claims.as_slice() {
                [] => return Err(ClientError::ProversDishonest),
                [only] => {
                    debug!(prover = only.index, period, "single winner left, skipping to the current period");
                    last_hash = self.provers[only.index]
                        .get_committee_hash(current_period, current_period, self.batch_size)
                        .await
                        .map_err(|e| {
                            warn!(prover = only.index, error = %e, "last winner went silent");
                            ClientError::ProversDishonest
                        })?;
                    break;
                }
                [first, ..] => last_hash = first.committee_hash,
            }
            period += 1;
        }

        for claim in &claims {
            match self.get_committee(target, current_period, claim.index, &last_hash).await {
                Ok(sync_committee) => {
                    info!(prover = claim.index, period = current_period, "optimistic sync finished");
                    return Ok(vec![ProverInfo {
                        index: claim.index,
                        sync_committee,
                    }]);
                }
                Err(e) => warn!(prover = claim.index, error = %e, "seemingly honest prover responded incorrectly"),
            }
        }
        Err(ClientError::ProversDishonest)
    }
}
