mod common;

use common::{config, head, prover, slot_in, HeadFeed};
use lantern_client::{
    Client, ClientError, HeaderExecutionResolver, ManualClock, OptimisticProver, OptimisticSync,
    RetryPolicy, SyncState,
};
use lantern_core::test_utils::*;
use lantern_core::{verify_optimistic_update, VerificationError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn client(
    history: &CommitteeChain,
    clock: Arc<ManualClock>,
    feed: Arc<HeadFeed>,
) -> Client<OptimisticSync> {
    let chain = test_chain();
    let liar = history.forked(&chain, 1, 60);
    let provers: Vec<Arc<dyn OptimisticProver>> = vec![prover(&liar, 2), prover(history, 2)];
    Client::new(
        config(history),
        OptimisticSync::new(chain, provers),
        clock,
        feed,
        Arc::new(HeaderExecutionResolver),
    )
}

#[tokio::test]
async fn test_sync_then_verify_head() {
    let history = CommitteeChain::honest(&test_chain(), 3);
    let clock = Arc::new(ManualClock::at_slot(slot_in(3)));
    let feed = HeadFeed::new(vec![head(&history, 3, 21)]);
    let client = client(&history, clock, feed);

    assert_eq!(client.state().await, SyncState::Unsynced);
    client.sync().await.unwrap();
    assert_eq!(client.state().await, SyncState::Synced);
    assert_eq!(client.latest_committee().await.unwrap(), history.committee(3));

    let info = client.get_latest_execution().await.unwrap().unwrap();
    assert_eq!(info.block_number, 21);
    assert_eq!(info.block_hash, sample_execution_header(21).block_hash);
}

#[tokio::test]
async fn test_stale_committee_reports_invalid_signatures() {
    let chain = test_chain();
    let history = CommitteeChain::honest(&chain, 3);
    let stale_head = head(&history, 2, 5);

    let err = verify_optimistic_update(&chain, history.committee(3), &stale_head).unwrap_err();
    assert!(matches!(err, VerificationError::InvalidSignature));
    assert!(err.to_string().starts_with("invalid signatures"));

    let clock = Arc::new(ManualClock::at_slot(slot_in(3)));
    let feed = HeadFeed::new(vec![stale_head]);
    let lenient = client(&history, clock.clone(), feed.clone());
    lenient.sync().await.unwrap();
    assert_eq!(lenient.get_latest_execution().await.unwrap(), None);

    let strict = client(&history, clock, feed).with_strict(true);
    strict.sync().await.unwrap();
    let err = strict.get_latest_execution().await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidOptimisticUpdate(_)));
}

#[tokio::test(start_paused = true)]
async fn test_retries_run_out() {
    let history = CommitteeChain::honest(&test_chain(), 2);
    let clock = Arc::new(ManualClock::at_slot(slot_in(2)));
    let feed = HeadFeed::new(vec![head(&history, 1, 5)]);
    let client = client(&history, clock, feed);
    client.sync().await.unwrap();

    let policy = RetryPolicy::Fixed {
        delay: Duration::from_secs(12),
        max_retries: 2,
    };
    let err = client.get_next_valid_execution_info(policy).await.unwrap_err();
    assert_eq!(err.to_string(), "no valid execution payload found");
    assert_eq!(client.progress().await.updates_rejected, 3);
}

#[tokio::test(start_paused = true)]
async fn test_subscription_follows_the_chain_across_periods() {
    let history = CommitteeChain::honest(&test_chain(), 3);
    let clock = Arc::new(ManualClock::at_slot(slot_in(2)));
    let feed = HeadFeed::new(vec![head(&history, 2, 1), head(&history, 2, 1)]);
    let client = Arc::new(client(&history, clock.clone(), feed.clone()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = client.subscribe(Duration::from_secs(13), move |info| {
        let sink = sink.clone();
        async move {
            sink.lock().unwrap().push(info.block_number);
        }
    });

    // Ticks at 0s and 13s see the same head.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(*seen.lock().unwrap(), vec![1]);

    // The period rolls over and the next head is signed by the new committee.
    clock.set_slot(slot_in(3));
    feed.set(head(&history, 3, 2));
    tokio::time::sleep(Duration::from_secs(13)).await;
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    assert_eq!(client.latest_period().await, Some(3));
    assert_eq!(client.progress().await.syncs_completed, 2);

    subscription.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_subscription_survives_errors() {
    let history = CommitteeChain::honest(&test_chain(), 2);
    let clock = Arc::new(ManualClock::at_slot(slot_in(2)));
    let feed = HeadFeed::new(vec![]);
    let client = Arc::new(client(&history, clock, feed.clone()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = client.subscribe(Duration::from_secs(13), move |info| {
        let sink = sink.clone();
        async move {
            sink.lock().unwrap().push(info.block_number);
        }
    });

    // No head available yet: the first ticks fail and are logged.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(seen.lock().unwrap().is_empty());
    assert!(!subscription.is_finished());

    feed.set(head(&history, 2, 9));
    tokio::time::sleep(Duration::from_secs(13)).await;
    assert_eq!(*seen.lock().unwrap(), vec![9]);

    subscription.stop().await;
}
