//! In-memory verified client state.
//!
//! The trusted committee only changes at the single point where a sync
//! completes. Everything here was verified before it was recorded.

use lantern_core::types::beacon::BlsPublicKey;
use serde::{Deserialize, Serialize};

/// Where the client is in its sync lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// No committee past the bootstrap one has been verified yet.
    Unsynced,
    /// A strategy run is in flight, or the clock moved past the latest
    /// verified period.
    Syncing,
    /// The latest verified committee belongs to the current period.
    Synced,
}

/// The latest verified committee and bookkeeping around it.
#[derive(Debug, Default)]
pub(crate) struct ClientState {
    latest_period: Option<u64>,
    latest_committee: Vec<BlsPublicKey>,
    in_flight: bool,
    pub(crate) progress: SyncProgress,
}

impl ClientState {
    pub(crate) fn latest_period(&self) -> Option<u64> {
        self.latest_period
    }

    pub(crate) fn latest_committee(&self) -> Option<&[BlsPublicKey]> {
        self.latest_period.map(|_| self.latest_committee.as_slice())
    }

    pub(crate) fn sync_state(&self, current_period: u64) -> SyncState {
        match self.latest_period {
            _ if self.in_flight => SyncState::Syncing,
            None => SyncState::Unsynced,
            Some(period) if period == current_period => SyncState::Synced,
            Some(_) => SyncState::Syncing,
        }
    }

    pub(crate) fn begin_sync(&mut self, target_period: u64) {
        self.in_flight = true;
        self.progress.target_period = Some(target_period);
    }

    pub(crate) fn finish_sync(&mut self, period: u64, committee: Vec<BlsPublicKey>) {
        self.in_flight = false;
        self.latest_period = Some(period);
        self.latest_committee = committee;
        self.progress.latest_period = Some(period);
        self.progress.syncs_completed += 1;
    }

    pub(crate) fn abort_sync(&mut self) {
        self.in_flight = false;
        self.progress.syncs_failed += 1;
    }
}

/// Counters for diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Latest period with a verified committee.
    pub latest_period: Option<u64>,
    /// Period the last sync run aimed for.
    pub target_period: Option<u64>,
    pub syncs_completed: u64,
    pub syncs_failed: u64,
    /// Optimistic updates that verified against the latest committee.
    pub updates_verified: u64,
    /// Optimistic updates rejected by signature or branch checks.
    pub updates_rejected: u64,
}

impl SyncProgress {
    /// Fraction of the way from `genesis_period` to the target (0.0 - 1.0).
    pub fn sync_percentage(&self, genesis_period: u64) -> f64 {
        let Some(target) = self.target_period else {
            return 0.0;
        };
        let latest = self.latest_period.unwrap_or(genesis_period);
        if target <= genesis_period {
            return if self.latest_period.is_some() { 1.0 } else { 0.0 };
        }
        (latest.saturating_sub(genesis_period) as f64 / (target - genesis_period) as f64).min(1.0)
    }
}
