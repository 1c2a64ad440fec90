//! # Lantern Client
//!
//! The networked half of the Lantern light client. It talks to any number
//! of untrusted provers, runs one of the sync strategies to agree on the
//! sync committee of the current period, then keeps verifying the chain
//! head against that committee.
//!
//! ## Architecture
//!
//! - `prover`: capability traits (`LightProver`, `OptimisticProver`,
//!   `SuperlightProver`) and their HTTP adapters
//! - `strategy`: light, optimistic (tournament) and superlight (MMR
//!   bisection) sync from the bootstrap committee
//! - `client`: the polling client and its subscription loop
//! - `store`: an in-memory store of verified updates that can itself serve
//!   as a prover
//!
//! Every byte a prover returns goes through `lantern_core` verification
//! before it is trusted. A prover that fails is dropped, never retried
//! within the same sync.

pub mod beacon_api;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod execution;
pub mod network;
pub mod prover;
pub mod state;
pub mod store;
pub mod strategy;

pub use client::{Client, RetryPolicy, Subscription, POLLING_DELAY};
pub use clock::{ManualClock, SlotClock, SystemClock};
pub use config::{ClientConfig, ConfigError, EndpointTable, GenesisData, Network, StrategyKind};
pub use error::ClientError;
pub use execution::{ExecutionResolver, HeaderExecutionResolver, OptimisticUpdateSource};
pub use prover::{
    BeaconApiClient, HttpOptimisticProver, HttpSuperlightProver, LightProver, OptimisticProver,
    PeriodOrLatest, ProverError, SuperlightProver,
};
pub use state::{SyncProgress, SyncState};
pub use store::UpdateStore;
pub use strategy::{
    FightOutcome, LightSync, OptimisticSync, ProverInfo, SuperlightSync, SyncStrategy, SyncTarget,
    DEFAULT_BATCH_SIZE, DEFAULT_TREE_DEGREE,
};
