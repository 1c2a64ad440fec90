//! Chain parameters: genesis, slot timing and the fork schedule.
//!
//! The fork schedule decides two things a verifier cannot guess: the fork
//! version mixed into the signing domain, and the generalized indices of the
//! state fields a light client update proves (Electra deepened the state tree).

use crate::types::beacon::{compute_epoch_at_slot, compute_sync_period_at_slot};
use hex_literal::hex;
use serde::{Deserialize, Serialize};

/// Seconds per slot on every network we ship presets for.
pub const SECONDS_PER_SLOT: u64 = 12;

/// Generalized index of the execution payload inside `BeaconBlockBody`.
pub const EXECUTION_PAYLOAD_GINDEX: u64 = 25;
pub const EXECUTION_PAYLOAD_DEPTH: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkName {
    Phase0,
    Altair,
    Bellatrix,
    Capella,
    Deneb,
    Electra,
}

impl ForkName {
    /// (gindex, depth) of `finalized_checkpoint.root` in the beacon state.
    pub fn finalized_root_gindex(self) -> (u64, usize) {
        if self >= ForkName::Electra {
            (169, 7)
        } else {
            (105, 6)
        }
    }

    /// (gindex, depth) of `next_sync_committee` in the beacon state.
    pub fn next_sync_committee_gindex(self) -> (u64, usize) {
        if self >= ForkName::Electra {
            (87, 6)
        } else {
            (55, 5)
        }
    }

    /// Whether light client headers carry an execution payload header.
    pub fn has_execution_header(self) -> bool {
        self >= ForkName::Capella
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fork {
    pub name: ForkName,
    pub epoch: u64,
    pub version: [u8; 4],
}

/// Static parameters of one beacon chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Unix time of slot 0.
    pub genesis_time: u64,
    pub genesis_validators_root: [u8; 32],
    pub seconds_per_slot: u64,
    /// Ordered by activation epoch, genesis fork first.
    pub forks: Vec<Fork>,
}

impl ChainConfig {
    pub fn mainnet() -> Self {
        Self {
            genesis_time: 1606824023,
            genesis_validators_root: hex!(
                "4b363db94e286120d76eb905340fdd4e54bfe9f06bf33ff6cf5ad27f511bfe95"
            ),
            seconds_per_slot: SECONDS_PER_SLOT,
            forks: vec![
                fork(ForkName::Phase0, 0, [0x00, 0x00, 0x00, 0x00]),
                fork(ForkName::Altair, 74240, [0x01, 0x00, 0x00, 0x00]),
                fork(ForkName::Bellatrix, 144896, [0x02, 0x00, 0x00, 0x00]),
                fork(ForkName::Capella, 194048, [0x03, 0x00, 0x00, 0x00]),
                fork(ForkName::Deneb, 269568, [0x04, 0x00, 0x00, 0x00]),
                fork(ForkName::Electra, 364032, [0x05, 0x00, 0x00, 0x00]),
            ],
        }
    }

    pub fn sepolia() -> Self {
        Self {
            genesis_time: 1655733600,
            genesis_validators_root: hex!(
                "d8ea171f3c94aea21ebc42a1ed61052acf3f9209c00e4efbaaddac09ed9b8078"
            ),
            seconds_per_slot: SECONDS_PER_SLOT,
            forks: vec![
                fork(ForkName::Phase0, 0, [0x90, 0x00, 0x00, 0x69]),
                fork(ForkName::Altair, 50, [0x90, 0x00, 0x00, 0x70]),
                fork(ForkName::Bellatrix, 100, [0x90, 0x00, 0x00, 0x71]),
                fork(ForkName::Capella, 56832, [0x90, 0x00, 0x00, 0x72]),
                fork(ForkName::Deneb, 132608, [0x90, 0x00, 0x00, 0x73]),
                fork(ForkName::Electra, 222464, [0x90, 0x00, 0x00, 0x74]),
            ],
        }
    }

    /// The fork active at `slot`. Falls back to phase0 on an empty schedule.
    pub fn fork_at_slot(&self, slot: u64) -> ForkName {
        self.active_fork(slot)
            .map(|f| f.name)
            .unwrap_or(ForkName::Phase0)
    }

    pub fn fork_version_at_slot(&self, slot: u64) -> [u8; 4] {
        self.active_fork(slot).map(|f| f.version).unwrap_or_default()
    }

    /// Fork version for the domain of a sync aggregate produced at
    /// `signature_slot`: the committee signs the block of the previous slot.
    pub fn signature_fork_version(&self, signature_slot: u64) -> [u8; 4] {
        self.fork_version_at_slot(signature_slot.max(1) - 1)
    }

    fn active_fork(&self, slot: u64) -> Option<&Fork> {
        let epoch = compute_epoch_at_slot(slot);
        self.forks
            .iter()
            .rev()
            .find(|f| f.epoch <= epoch)
            .or_else(|| self.forks.first())
    }

    /// Slot at unix time `now`; zero before genesis.
    pub fn slot_at(&self, now: u64) -> u64 {
        now.saturating_sub(self.genesis_time) / self.seconds_per_slot.max(1)
    }

    pub fn period_at(&self, now: u64) -> u64 {
        compute_sync_period_at_slot(self.slot_at(now))
    }
}

fn fork(name: ForkName, epoch: u64, version: [u8; 4]) -> Fork {
    Fork {
        name,
        epoch,
        version,
    }
}
