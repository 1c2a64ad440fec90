mod common;

use common::{prover, target};
use lantern_client::{
    ClientError, LightProver, LightSync, OptimisticProver, OptimisticSync, SuperlightProver,
    SuperlightSync, SyncStrategy, UpdateStore,
};
use lantern_core::test_utils::*;
use lantern_core::types::beacon::MIN_SYNC_COMMITTEE_PARTICIPANTS;
use std::sync::Arc;

#[tokio::test]
async fn test_light_sync_with_bare_supermajority() {
    let chain = test_chain();
    let c0 = CommitteeKeys::generate(1, 0);
    let c1 = CommitteeKeys::generate(1, 1);
    let update = sign_update(&chain, &c0, 0, &c1, MIN_SYNC_COMMITTEE_PARTICIPANTS);
    assert_eq!(update.sync_aggregate.num_participants(), 342);

    let store = Arc::new(UpdateStore::with_updates(0, c0.pubkeys.clone(), 2, [update]));
    let sync = LightSync::new(chain, vec![store as Arc<dyn LightProver>]);
    let infos = sync
        .sync_from_genesis(&lantern_client::SyncTarget {
            genesis_period: 0,
            genesis_committee: c0.pubkeys.clone(),
            current_period: 1,
        })
        .await
        .unwrap();

    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].index, 0);
    assert_eq!(infos[0].sync_committee, c1.pubkeys);
}

#[tokio::test]
async fn test_light_sync_one_short_of_supermajority() {
    let chain = test_chain();
    let c0 = CommitteeKeys::generate(1, 0);
    let c1 = CommitteeKeys::generate(1, 1);
    let update = sign_update(&chain, &c0, 0, &c1, MIN_SYNC_COMMITTEE_PARTICIPANTS - 1);

    let store = Arc::new(UpdateStore::with_updates(0, c0.pubkeys.clone(), 2, [update]));
    let sync = LightSync::new(chain, vec![store as Arc<dyn LightProver>]);
    let err = sync
        .sync_from_genesis(&lantern_client::SyncTarget {
            genesis_period: 0,
            genesis_committee: c0.pubkeys,
            current_period: 1,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NoHonestProver));
}

#[tokio::test]
async fn test_light_sync_resumes_where_the_liar_stopped() {
    let chain = test_chain();
    let honest = CommitteeChain::honest(&chain, 5);
    let liars = [honest.forked(&chain, 2, 11), honest.forked(&chain, 4, 12)];
    let mut provers: Vec<Arc<dyn LightProver>> = liars
        .iter()
        .map(|h| prover(h, 2) as Arc<dyn LightProver>)
        .collect();
    provers.push(prover(&honest, 2));

    let sync = LightSync::new(chain, provers).with_batch_size(2);
    let infos = sync.sync_from_genesis(&target(&honest, 5)).await.unwrap();
    assert_eq!(infos[0].index, 2);
    assert_eq!(infos[0].sync_committee, honest.committee(5));
}

#[tokio::test]
async fn test_tournament_converges_on_the_honest_prover() {
    let chain = test_chain();
    let honest = CommitteeChain::honest(&chain, 4);
    // Distinct wrong committees from period 2 on; the honest prover comes last.
    let mut provers: Vec<Arc<dyn OptimisticProver>> = (0..3)
        .map(|seed| prover(&honest.forked(&chain, 2, 20 + seed), 2) as Arc<dyn OptimisticProver>)
        .collect();
    provers.push(prover(&honest, 2));

    let sync = OptimisticSync::new(chain, provers);
    let infos = sync.sync_from_genesis(&target(&honest, 4)).await.unwrap();
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].index, 3);
    assert_eq!(infos[0].sync_committee, honest.committee(4));
}

#[tokio::test]
async fn test_tournament_without_honest_prover() {
    let chain = test_chain();
    let honest = CommitteeChain::honest(&chain, 4);
    let provers: Vec<Arc<dyn OptimisticProver>> = (0..2)
        .map(|seed| prover(&honest.forked(&chain, 3, 30 + seed), 2) as Arc<dyn OptimisticProver>)
        .collect();

    let sync = OptimisticSync::new(chain, provers);
    let err = sync.sync_from_genesis(&target(&honest, 4)).await.unwrap_err();
    assert!(matches!(err, ClientError::ProversDishonest));
    assert_eq!(err.to_string(), "none of the provers responded honestly");
}

#[tokio::test]
async fn test_fight_at_period_five_picks_the_provable_claim() {
    let chain = test_chain();
    let honest = CommitteeChain::honest(&chain, 6);
    let liar = honest.forked(&chain, 5, 40);
    let provers: Vec<Arc<dyn OptimisticProver>> = vec![prover(&liar, 2), prover(&honest, 2)];

    let sync = OptimisticSync::new(chain, provers).with_batch_size(3);
    let infos = sync.sync_from_genesis(&target(&honest, 6)).await.unwrap();
    assert_eq!(infos[0].index, 1);
    assert_eq!(infos[0].sync_committee, honest.committee(6));
}

#[tokio::test]
async fn test_superlight_bisection_with_several_liars() {
    let chain = test_chain();
    let honest = CommitteeChain::honest(&chain, 9);
    let mut provers: Vec<Arc<dyn SuperlightProver>> = [(3, 50), (7, 51)]
        .into_iter()
        .map(|(fork, seed)| {
            prover(&honest.forked(&chain, fork, seed), 3) as Arc<dyn SuperlightProver>
        })
        .collect();
    provers.insert(1, prover(&honest, 3));

    let sync = SuperlightSync::with_degree(chain, provers, 3);
    let infos = sync.sync_from_genesis(&target(&honest, 9)).await.unwrap();
    assert_eq!(infos[0].index, 1);
    assert_eq!(infos[0].sync_committee, honest.committee(9));
}

#[tokio::test]
async fn test_strategies_agree_on_an_honest_history() {
    let chain = test_chain();
    let honest = CommitteeChain::honest(&chain, 3);
    let store = prover(&honest, 2);
    let t = target(&honest, 3);

    let light = LightSync::new(chain.clone(), vec![store.clone() as Arc<dyn LightProver>]);
    let optimistic = OptimisticSync::new(chain.clone(), vec![store.clone() as Arc<dyn OptimisticProver>]);
    let superlight = SuperlightSync::with_degree(chain, vec![store as Arc<dyn SuperlightProver>], 2);

    let strategies: Vec<Box<dyn SyncStrategy>> =
        vec![Box::new(light), Box::new(optimistic), Box::new(superlight)];
    for strategy in &strategies {
        let infos = strategy.sync_from_genesis(&t).await.unwrap();
        assert_eq!(infos[0].sync_committee, honest.committee(3));
    }
}
