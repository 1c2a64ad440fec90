//! # Lantern Core
//!
//! Pure Rust verification logic for a multi-prover Ethereum light client.
//!
//! This crate contains **no networking code**. Everything a prover hands the
//! client passes through these functions before it is trusted.
//!
//! ## Trust Model
//!
//! - **Sync committee verification** (`consensus` module): verifies BLS12-381
//!   aggregate signatures from the 512-member sync committee and the state
//!   proofs of committee transitions. Trusts that 2/3+ of the committee is
//!   honest (same assumption as Ethereum itself).
//!
//! - **Authenticated data structures** (`merkle` module): fixed-arity Merkle
//!   trees and Merkle Mountain Ranges over committee hashes. Provers commit to
//!   a whole period range at once; disputes are settled by bisecting these
//!   commitments. No trust assumptions beyond the hash function.
//!
//! ## Usage
//!
//! ```ignore
//! use lantern_core::consensus::{verify_committee_update, verify_optimistic_update};
//! use lantern_core::merkle::{MerkleMountainRange, MerkleMountainVerify};
//! ```

pub mod config;
pub mod consensus;
pub mod merkle;
pub mod ssz;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used types for convenience
pub use config::{ChainConfig, Fork, ForkName};
pub use consensus::{
    light_client::{verify_committee_update, verify_light_client_header, verify_optimistic_update},
    sync_committee::{
        committee_hash, is_committee_same, verify_sync_committee_signature, VerificationError,
    },
};
pub use merkle::{MerkleError, MerkleMountainRange, MerkleMountainVerify, MerkleTree, MerkleVerify, Peak};
pub use ssz::SszError;
pub use types::{beacon::*, execution::*};
