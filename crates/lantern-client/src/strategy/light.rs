use super::{verify_transition, ProverInfo, SyncStrategy, SyncTarget, DEFAULT_BATCH_SIZE};
use crate::error::ClientError;
use crate::prover::LightProver;
use crate::store::UpdateStore;
use async_trait::async_trait;
use lantern_core::types::beacon::BlsPublicKey;
use lantern_core::ChainConfig;
use std::sync::Arc;
use tracing::{info, warn};

/// Sequential sync: trust one prover until it serves a bad update, then
/// continue from the last verified committee with the next prover.
pub struct LightSync {
    chain: ChainConfig,
    provers: Vec<Arc<dyn LightProver>>,
    batch_size: u64,
    store: Option<Arc<UpdateStore>>,
}

impl LightSync {
    pub fn new(chain: ChainConfig, provers: Vec<Arc<dyn LightProver>>) -> Self {
        Self {
            chain,
            provers,
            batch_size: DEFAULT_BATCH_SIZE,
            store: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Record every verified update into `store`.
    pub fn with_store(mut self, store: Arc<UpdateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Walk `prover` from `start_period`. Returns the last verified
    /// committee and the period it belongs to.
    async fn sync_prover(
        &self,
        index: usize,
        start_period: u64,
        current_period: u64,
        start_committee: Vec<BlsPublicKey>,
    ) -> (Vec<BlsPublicKey>, u64) {
        let prover = &self.provers[index];
        let mut committee = start_committee;
        for period in start_period..current_period {
            let update = match prover
                .get_sync_update(period, current_period, self.batch_size)
                .await
            {
                Ok(update) => update,
                Err(e) => {
                    warn!(prover = index, period, error = %e, "failed to fetch update");
                    return (committee, period);
                }
            };

            let Some(next) = verify_transition(&self.chain, &committee, &update, period) else {
                warn!(prover = index, period, "found invalid update");
                return (committee, period);
            };

            if let Some(store) = &self.store {
                if let Err(e) = store.add_update(period, update).await {
                    warn!(period, error = %e, "failed to store update");
                }
            }
            committee = next;
        }
        (committee, current_period)
    }
}

#[async_trait]
impl SyncStrategy for LightSync {
    async fn sync_from_genesis(&self, target: &SyncTarget) -> Result<Vec<ProverInfo>, ClientError> {
        let current_period = target.current_period;
        let mut start_period = target.genesis_period;
        let mut start_committee = target.genesis_committee.clone();
        info!(
            provers = self.provers.len(),
            from = start_period,
            to = current_period,
            "light sync started"
        );

        for index in 0..self.provers.len() {
            info!(prover = index, from = start_period, "validating prover");
            let (committee, period) = self
                .sync_prover(index, start_period, current_period, start_committee)
                .await;
            if period == current_period {
                return Ok(vec![ProverInfo {
                    index,
                    sync_committee: committee,
                }]);
            }
            start_period = period;
            start_committee = committee;
        }
        Err(ClientError::NoHonestProver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prover::ProverError;
    use lantern_core::test_utils::*;
    use lantern_core::types::beacon::LightClientUpdate;
    use std::sync::Mutex;

    /// Serves a fixed history and records which periods were asked for.
    struct ScriptedProver {
        history: CommitteeChain,
        asked: Mutex<Vec<u64>>,
    }

    impl ScriptedProver {
        fn new(history: CommitteeChain) -> Arc<Self> {
            Arc::new(Self {
                history,
                asked: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl LightProver for ScriptedProver {
        async fn get_sync_update(
            &self,
            period: u64,
            _current_period: u64,
            _cache_count: u64,
        ) -> Result<LightClientUpdate, ProverError> {
            self.asked.lock().unwrap().push(period);
            self.history
                .updates
                .get(period as usize)
                .cloned()
                .ok_or_else(|| ProverError::NotFound(format!("period {}", period)))
        }
    }

    fn target(history: &CommitteeChain) -> SyncTarget {
        SyncTarget {
            genesis_period: 0,
            genesis_committee: history.committee(0).to_vec(),
            current_period: history.last_period(),
        }
    }

    #[tokio::test]
    async fn test_hands_over_at_first_bad_update() {
        let chain = test_chain();
        let honest = CommitteeChain::honest(&chain, 4);
        let forked = honest.forked(&chain, 3, 9);

        let liar = ScriptedProver::new(forked);
        let good = ScriptedProver::new(honest.clone());
        let sync = LightSync::new(chain, vec![liar.clone(), good.clone()]);

        let infos = sync.sync_from_genesis(&target(&honest)).await.unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].index, 1);
        assert_eq!(infos[0].sync_committee, honest.committee(4));

        // The liar's update out of period 2 fails; the next prover resumes there.
        assert_eq!(*liar.asked.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(*good.asked.lock().unwrap(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_no_honest_prover() {
        let chain = test_chain();
        let honest = CommitteeChain::honest(&chain, 3);
        let liar = ScriptedProver::new(honest.forked(&chain, 1, 5));
        let sync = LightSync::new(chain, vec![liar]);

        let err = sync.sync_from_genesis(&target(&honest)).await.unwrap_err();
        assert!(matches!(err, ClientError::NoHonestProver));
        assert_eq!(err.to_string(), "no honest prover found");
    }

    #[tokio::test]
    async fn test_records_verified_updates_in_store() {
        let chain = test_chain();
        let honest = CommitteeChain::honest(&chain, 3);
        let store = Arc::new(UpdateStore::new(0, honest.committee(0).to_vec(), 2));
        let sync = LightSync::new(chain, vec![ScriptedProver::new(honest.clone())])
            .with_store(store.clone());

        sync.sync_from_genesis(&target(&honest)).await.unwrap();
        assert_eq!(store.latest_period().await, 3);
        assert_eq!(store.committee(3).await.unwrap(), honest.committee(3));
    }
}
