//! The polling client: keeps a verified sync committee for the current
//! period and turns signed chain heads into verified execution info.

use crate::clock::SlotClock;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::execution::{ExecutionResolver, OptimisticUpdateSource};
use crate::state::{ClientState, SyncProgress, SyncState};
use crate::strategy::{SyncStrategy, SyncTarget};
use lantern_core::types::beacon::BlsPublicKey;
use lantern_core::types::execution::ExecutionInfo;
use lantern_core::verify_optimistic_update;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One beacon slot.
pub const POLLING_DELAY: Duration = Duration::from_millis(13_000);

/// How [`Client::get_next_valid_execution_info`] spaces its attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryPolicy {
    Fixed {
        delay: Duration,
        max_retries: u32,
    },
    /// Doubles the delay after every failed attempt, capped at `max_delay`.
    Exponential {
        initial: Duration,
        max_delay: Duration,
        max_retries: u32,
    },
}

impl RetryPolicy {
    fn max_retries(&self) -> u32 {
        match *self {
            RetryPolicy::Fixed { max_retries, .. } | RetryPolicy::Exponential { max_retries, .. } => {
                max_retries
            }
        }
    }

    /// Delay before retry number `retry` (zero-based).
    fn delay(&self, retry: u32) -> Duration {
        match *self {
            RetryPolicy::Fixed { delay, .. } => delay,
            RetryPolicy::Exponential {
                initial, max_delay, ..
            } => initial
                .checked_mul(2u32.saturating_pow(retry))
                .unwrap_or(max_delay)
                .min(max_delay),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Fixed {
            delay: POLLING_DELAY,
            max_retries: 10,
        }
    }
}

/// A running [`Client::subscribe`] loop. Dropping it also stops the loop
/// once the tick in progress completes.
pub struct Subscription {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stop polling and wait for the loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "subscription task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

pub struct Client<S> {
    config: ClientConfig,
    strategy: S,
    clock: Arc<dyn SlotClock>,
    updates: Arc<dyn OptimisticUpdateSource>,
    resolver: Arc<dyn ExecutionResolver>,
    strict: bool,
    sync_guard: Mutex<()>,
    state: Mutex<ClientState>,
}

impl<S: SyncStrategy> Client<S> {
    pub fn new(
        config: ClientConfig,
        strategy: S,
        clock: Arc<dyn SlotClock>,
        updates: Arc<dyn OptimisticUpdateSource>,
        resolver: Arc<dyn ExecutionResolver>,
    ) -> Self {
        Self {
            config,
            strategy,
            clock,
            updates,
            resolver,
            strict: false,
            sync_guard: Mutex::new(()),
            state: Mutex::new(ClientState::default()),
        }
    }

    /// In strict mode a rejected optimistic update is an error instead of
    /// an empty result.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn current_period(&self) -> u64 {
        self.clock.current_period()
    }

    pub async fn state(&self) -> SyncState {
        self.state.lock().await.sync_state(self.current_period())
    }

    pub async fn is_synced(&self) -> bool {
        self.state.lock().await.latest_period() == Some(self.current_period())
    }

    pub async fn latest_period(&self) -> Option<u64> {
        self.state.lock().await.latest_period()
    }

    pub async fn latest_committee(&self) -> Option<Vec<BlsPublicKey>> {
        self.state.lock().await.latest_committee().map(<[_]>::to_vec)
    }

    pub async fn progress(&self) -> SyncProgress {
        self.state.lock().await.progress.clone()
    }

    /// Bring the trusted committee up to the current period. A no-op while
    /// the latest verified period is still current.
    pub async fn sync(&self) -> Result<(), ClientError> {
        let _guard = self.sync_guard.lock().await;
        let current_period = self.current_period();
        {
            let mut state = self.state.lock().await;
            if state.latest_period().is_some_and(|p| current_period <= p) {
                return Ok(());
            }
            state.begin_sync(current_period);
        }

        let target = SyncTarget {
            genesis_period: self.config.genesis_period(),
            genesis_committee: self.config.genesis.committee.clone(),
            current_period,
        };
        let result = self
            .strategy
            .sync_from_genesis(&target)
            .await
            .and_then(|infos| infos.into_iter().next().ok_or(ClientError::EmptyProverInfos));

        let mut state = self.state.lock().await;
        match result {
            Ok(winner) => {
                info!(period = current_period, prover = winner.index, "synced");
                state.finish_sync(current_period, winner.sync_committee);
                Ok(())
            }
            Err(e) => {
                state.abort_sync();
                Err(e)
            }
        }
    }

    /// Verify the latest signed chain head against the trusted committee
    /// and resolve it to execution info. `Ok(None)` means the update was
    /// rejected outside strict mode.
    pub async fn get_latest_execution(&self) -> Result<Option<ExecutionInfo>, ClientError> {
        let committee = self
            .latest_committee()
            .await
            .ok_or(ClientError::NotSynced)?;
        let update = self.updates.latest_optimistic_update().await?;

        if let Err(e) = verify_optimistic_update(&self.config.chain, &committee, &update) {
            warn!(slot = update.attested_header.beacon.slot, error = %e, "optimistic update rejected");
            self.state.lock().await.progress.updates_rejected += 1;
            if self.strict {
                return Err(ClientError::InvalidOptimisticUpdate(e));
            }
            return Ok(None);
        }
        self.state.lock().await.progress.updates_verified += 1;

        let info = self.resolver.resolve(&update.attested_header).await?;
        debug!(
            slot = update.attested_header.beacon.slot,
            block_number = info.block_number,
            "execution verified"
        );
        Ok(Some(info))
    }

    /// Retry [`get_latest_execution`](Self::get_latest_execution) until it
    /// yields execution info or `policy` runs out.
    pub async fn get_next_valid_execution_info(
        &self,
        policy: RetryPolicy,
    ) -> Result<ExecutionInfo, ClientError> {
        let max_retries = policy.max_retries();
        for attempt in 0..=max_retries {
            match self.get_latest_execution().await {
                Ok(Some(info)) => return Ok(info),
                Ok(None) => debug!(attempt, "no valid execution yet"),
                Err(e) => warn!(attempt, error = %e, "execution fetch failed"),
            }
            if attempt < max_retries {
                tokio::time::sleep(policy.delay(attempt)).await;
            }
        }
        Err(ClientError::NoValidExecution)
    }

    /// One poll: sync, then fetch the head. Returns the execution info only
    /// when its block hash differs from `last_block_hash`.
    async fn poll(
        &self,
        last_block_hash: &mut Option<[u8; 32]>,
    ) -> Result<Option<ExecutionInfo>, ClientError> {
        self.sync().await?;
        let Some(info) = self.get_latest_execution().await? else {
            return Ok(None);
        };
        if *last_block_hash == Some(info.block_hash) {
            debug!(block_number = info.block_number, "head unchanged");
            return Ok(None);
        }
        *last_block_hash = Some(info.block_hash);
        Ok(Some(info))
    }
}

impl<S: SyncStrategy + 'static> Client<S> {
    /// Poll every `interval`, starting immediately. `callback` receives each
    /// new verified head. Errors are logged and the loop carries on; the next
    /// tick is scheduled only after the previous one completed.
    pub fn subscribe<F, Fut>(self: &Arc<Self>, interval: Duration, mut callback: F) -> Subscription
    where
        F: FnMut(ExecutionInfo) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let client = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut last_block_hash = None;
            loop {
                match client.poll(&mut last_block_hash).await {
                    Ok(Some(info)) => {
                        info!(
                            block_number = info.block_number,
                            block_hash = %info.block_hash_hex(),
                            "new verified head"
                        );
                        callback(info).await;
                    }
                    Ok(None) => {}
                    Err(e) => error!(error = %e, "poll failed"),
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("subscription stopped");
        });
        Subscription { shutdown, handle }
    }
}
