use lantern_core::config::ChainConfig;
use lantern_core::types::beacon::compute_sync_period_at_slot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current beacon slot.
pub trait SlotClock: Send + Sync {
    fn current_slot(&self) -> u64;

    fn current_period(&self) -> u64 {
        compute_sync_period_at_slot(self.current_slot())
    }
}

/// Wall-clock slot derived from the chain's genesis time.
#[derive(Clone, Debug)]
pub struct SystemClock {
    chain: ChainConfig,
}

impl SystemClock {
    pub fn new(chain: ChainConfig) -> Self {
        Self { chain }
    }
}

impl SlotClock for SystemClock {
    fn current_slot(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.chain.slot_at(now)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    slot: AtomicU64,
}

impl ManualClock {
    pub fn at_slot(slot: u64) -> Self {
        Self {
            slot: AtomicU64::new(slot),
        }
    }

    pub fn set_slot(&self, slot: u64) {
        self.slot.store(slot, Ordering::SeqCst);
    }
}

impl SlotClock for ManualClock {
    fn current_slot(&self) -> u64 {
        self.slot.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_core::types::beacon::SLOTS_PER_SYNC_COMMITTEE_PERIOD;

    #[test]
    fn test_manual_clock_period() {
        let clock = ManualClock::at_slot(3 * SLOTS_PER_SYNC_COMMITTEE_PERIOD + 5);
        assert_eq!(clock.current_period(), 3);
        clock.set_slot(4 * SLOTS_PER_SYNC_COMMITTEE_PERIOD);
        assert_eq!(clock.current_period(), 4);
    }

    #[test]
    fn test_system_clock_is_past_mainnet_genesis() {
        let clock = SystemClock::new(ChainConfig::mainnet());
        assert!(clock.current_period() > 0);
    }
}
