//! Shared fixtures for the integration scenarios.

#![allow(dead_code)]

use async_trait::async_trait;
use lantern_client::{
    ClientConfig, GenesisData, OptimisticUpdateSource, ProverError, SyncTarget, UpdateStore,
};
use lantern_core::test_utils::*;
use lantern_core::types::beacon::{OptimisticUpdate, SLOTS_PER_SYNC_COMMITTEE_PERIOD};
use std::sync::{Arc, Mutex};

/// A prover serving `history`, with committee-hash trees of arity `degree`.
pub fn prover(history: &CommitteeChain, degree: usize) -> Arc<UpdateStore> {
    Arc::new(UpdateStore::with_updates(
        0,
        history.committee(0).to_vec(),
        degree,
        history.updates.clone(),
    ))
}

pub fn target(history: &CommitteeChain, current_period: u64) -> SyncTarget {
    SyncTarget {
        genesis_period: 0,
        genesis_committee: history.committee(0).to_vec(),
        current_period,
    }
}

pub fn config(history: &CommitteeChain) -> ClientConfig {
    ClientConfig {
        genesis: GenesisData {
            committee: history.committee(0).to_vec(),
            slot: 0,
            time: None,
            genesis_validator_root: None,
        },
        chain: test_chain(),
        max_provers: None,
    }
}

/// A chain head in `period`, signed by that period's committee.
pub fn head(history: &CommitteeChain, period: u64, block_number: u64) -> OptimisticUpdate {
    sign_optimistic_update(
        &test_chain(),
        history.keys(period),
        period * SLOTS_PER_SYNC_COMMITTEE_PERIOD + block_number,
        sample_execution_header(block_number),
    )
}

pub fn slot_in(period: u64) -> u64 {
    period * SLOTS_PER_SYNC_COMMITTEE_PERIOD + 1
}

/// Serves queued chain heads in order and keeps repeating the last one.
pub struct HeadFeed(Mutex<Vec<OptimisticUpdate>>);

impl HeadFeed {
    pub fn new(heads: Vec<OptimisticUpdate>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(heads)))
    }

    /// Replace whatever is queued with `head`.
    pub fn set(&self, head: OptimisticUpdate) {
        *self.0.lock().unwrap() = vec![head];
    }
}

#[async_trait]
impl OptimisticUpdateSource for HeadFeed {
    async fn latest_optimistic_update(&self) -> Result<OptimisticUpdate, ProverError> {
        let mut heads = self.0.lock().unwrap();
        match heads.len() {
            0 => Err(ProverError::NotFound("optimistic update".into())),
            1 => Ok(heads[0].clone()),
            _ => Ok(heads.remove(0)),
        }
    }
}
