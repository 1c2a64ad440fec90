//! Sync strategies: ways of getting from the genesis committee to the
//! committee of the current period while trusting none of the provers.
//!
//! - [`LightSync`] walks one prover at a time and hands over to the next
//!   prover at the first bad update.
//! - [`OptimisticSync`] compares per-period committee hashes across provers
//!   and settles disagreements with a fight over the disputed transition.
//! - [`SuperlightSync`] compares whole mountain-range commitments and
//!   bisects down to the first disputed period.

pub mod light;
pub mod optimistic;
pub mod superlight;

pub use light::LightSync;
pub use optimistic::OptimisticSync;
pub use superlight::SuperlightSync;

use crate::error::ClientError;
use async_trait::async_trait;
use lantern_core::types::beacon::{BlsPublicKey, LightClientUpdate};
use lantern_core::{committee_hash, is_committee_same, verify_committee_update, ChainConfig};
use lantern_core::merkle::Hash;
use tracing::warn;

/// Batch size for update and hash fetches.
pub const DEFAULT_BATCH_SIZE: u64 = 200;

/// Arity of the committee-hash trees served by MMR provers.
pub const DEFAULT_TREE_DEGREE: usize = 200;

/// What a strategy has to reach, and where it starts from.
#[derive(Clone, Debug)]
pub struct SyncTarget {
    pub genesis_period: u64,
    pub genesis_committee: Vec<BlsPublicKey>,
    pub current_period: u64,
}

/// A prover considered honest, and the current committee it led to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProverInfo {
    pub index: usize,
    pub sync_committee: Vec<BlsPublicKey>,
}

#[async_trait]
pub trait SyncStrategy: Send + Sync {
    /// Candidates for the committee of `target.current_period`, best first.
    async fn sync_from_genesis(&self, target: &SyncTarget) -> Result<Vec<ProverInfo>, ClientError>;
}

#[async_trait]
impl<S: SyncStrategy + ?Sized> SyncStrategy for Box<S> {
    async fn sync_from_genesis(&self, target: &SyncTarget) -> Result<Vec<ProverInfo>, ClientError> {
        (**self).sync_from_genesis(target).await
    }
}

/// Result of a pairwise dispute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FightOutcome {
    FirstWins,
    SecondWins,
    BothLose,
}

impl FightOutcome {
    /// Settle a dispute from each party's verdict. Two valid conflicting
    /// transitions from the same committee cannot exist.
    pub fn decide(first_valid: bool, second_valid: bool) -> Result<Self, ClientError> {
        match (first_valid, second_valid) {
            (true, false) => Ok(FightOutcome::FirstWins),
            (false, true) => Ok(FightOutcome::SecondWins),
            (false, false) => Ok(FightOutcome::BothLose),
            (true, true) => Err(ClientError::ProtocolViolation(
                "both updates can not be correct at the same time".into(),
            )),
        }
    }
}

/// Verify `update` as the transition out of `period` and return the
/// committee it installs, or `None` when it is rejected.
pub(crate) fn verify_transition(
    chain: &ChainConfig,
    prev_committee: &[BlsPublicKey],
    update: &LightClientUpdate,
    period: u64,
) -> Option<Vec<BlsPublicKey>> {
    match verify_committee_update(chain, prev_committee, update, period) {
        Ok(next) => Some(next),
        Err(e) => {
            warn!(period, error = %e, "committee update rejected");
            None
        }
    }
}

/// Does `update`, applied to `prev_committee` in `period`, install a
/// committee whose hash is `claimed`?
pub(crate) fn transition_matches_hash(
    chain: &ChainConfig,
    prev_committee: &[BlsPublicKey],
    update: &LightClientUpdate,
    period: u64,
    claimed: &Hash,
) -> bool {
    verify_transition(chain, prev_committee, update, period)
        .is_some_and(|next| committee_hash(&next) == *claimed)
}

/// Does `update`, applied to `prev_committee` in `period`, install exactly `claimed`?
pub(crate) fn transition_matches_committee(
    chain: &ChainConfig,
    prev_committee: &[BlsPublicKey],
    update: &LightClientUpdate,
    period: u64,
    claimed: &[BlsPublicKey],
) -> bool {
    verify_transition(chain, prev_committee, update, period)
        .is_some_and(|next| is_committee_same(&next, claimed))
}
