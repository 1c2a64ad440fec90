use crate::config::ChainConfig;
use crate::ssz::{hash_beacon_block_header, hash_fork_data, hash_signing_data, sha256, sha256_pair, SszError};
use crate::types::beacon::*;
use thiserror::Error;

/// Errors that can occur while verifying sync committee signed data.
/// Each variant is a specific, actionable rejection reason.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("insufficient signatures: {participants}/512 participants (need at least {required})")]
    InsufficientParticipation {
        participants: usize,
        required: usize,
    },

    #[error("invalid signatures: the aggregate signature does not verify against the participating committee members")]
    InvalidSignature,

    #[error("Invalid BLS public key at index {index}: {reason}")]
    InvalidPublicKey { index: usize, reason: String },

    #[error("Sync committee has {got} members, expected 512")]
    InvalidCommitteeSize { got: usize },

    #[error("Signature slot {signature_slot} is not after attested header slot {attested_slot}")]
    InvalidSlotOrder {
        signature_slot: u64,
        attested_slot: u64,
    },

    #[error("Attested header slot {attested_slot} is not after finalized header slot {finalized_slot}")]
    InvalidFinalityOrder {
        attested_slot: u64,
        finalized_slot: u64,
    },

    #[error("Update is for period {got}, expected period {expected}")]
    PeriodMismatch { expected: u64, got: u64 },

    #[error("Update carries no next sync committee")]
    MissingNextSyncCommittee,

    #[error("Invalid Merkle branch for finalized header: branch verification failed")]
    InvalidFinalityBranch,

    #[error("Invalid Merkle branch for next sync committee: branch verification failed")]
    InvalidNextSyncCommitteeBranch,

    #[error("Header at slot {slot} is missing its execution payload header")]
    MissingExecutionHeader { slot: u64 },

    #[error("Invalid Merkle branch for execution payload: branch verification failed")]
    InvalidExecutionBranch,

    #[error("SSZ error: {0}")]
    Ssz(#[from] SszError),

    #[error("BLS aggregation error: {0}")]
    BlsError(String),
}

/// Compute the signing root for a beacon block header.
/// This is what the sync committee actually signs: not the header directly,
/// but hash_tree_root(header) wrapped in a signing domain.
pub fn compute_signing_root(header: &BeaconBlockHeader, domain: &[u8; 32]) -> Result<[u8; 32], SszError> {
    let header_root = hash_beacon_block_header(header)?;
    hash_signing_data(&header_root, domain)
}

/// Compute the domain for sync committee signing.
/// domain = domain_type + fork_data_root[:28]
pub fn compute_domain(
    domain_type: &[u8; 4],
    fork_version: &[u8; 4],
    genesis_validators_root: &[u8; 32],
) -> Result<[u8; 32], SszError> {
    let fork_data_root = hash_fork_data(fork_version, genesis_validators_root)?;
    let mut domain = [0u8; 32];
    domain[..4].copy_from_slice(domain_type);
    domain[4..].copy_from_slice(&fork_data_root[..28]);
    Ok(domain)
}

/// Signing domain for a sync aggregate produced at `signature_slot`.
pub fn sync_committee_domain(chain: &ChainConfig, signature_slot: u64) -> Result<[u8; 32], SszError> {
    compute_domain(
        &DOMAIN_SYNC_COMMITTEE,
        &chain.signature_fork_version(signature_slot),
        &chain.genesis_validators_root,
    )
}

/// Verify a sync committee signature over a beacon block header.
/// This is the core trust anchor: if this passes, the header is legitimate.
///
/// Requires >= 2/3 of the 512 sync committee members to have signed.
/// Participation is checked before any cryptography, so an under-signed
/// aggregate is always reported as `insufficient signatures`.
pub fn verify_sync_committee_signature(
    committee: &[BlsPublicKey],
    sync_aggregate: &SyncAggregate,
    header: &BeaconBlockHeader,
    signature_slot: u64,
    chain: &ChainConfig,
) -> Result<(), VerificationError> {
    if committee.len() != SYNC_COMMITTEE_SIZE {
        return Err(VerificationError::InvalidCommitteeSize {
            got: committee.len(),
        });
    }

    let num_participants = sync_aggregate.num_participants();
    if num_participants < MIN_SYNC_COMMITTEE_PARTICIPANTS {
        return Err(VerificationError::InsufficientParticipation {
            participants: num_participants,
            required: MIN_SYNC_COMMITTEE_PARTICIPANTS,
        });
    }

    if signature_slot <= header.slot {
        return Err(VerificationError::InvalidSlotOrder {
            signature_slot,
            attested_slot: header.slot,
        });
    }

    let domain = sync_committee_domain(chain, signature_slot)?;
    let signing_root = compute_signing_root(header, &domain)?;

    let participant_pubkeys: Vec<&BlsPublicKey> = sync_aggregate
        .participant_indices()
        .into_iter()
        .map(|i| &committee[i])
        .collect();

    verify_aggregate_bls_signature(
        &participant_pubkeys,
        &signing_root,
        &sync_aggregate.sync_committee_signature,
    )
}

/// Verify an aggregate BLS12-381 signature.
/// Uses the blst library for actual cryptographic verification.
fn verify_aggregate_bls_signature(
    pubkeys: &[&BlsPublicKey],
    message: &[u8; 32],
    signature: &BlsSignature,
) -> Result<(), VerificationError> {
    use blst::min_pk::{AggregatePublicKey, PublicKey, Signature};
    use blst::BLST_ERROR;

    if pubkeys.is_empty() {
        return Err(VerificationError::InsufficientParticipation {
            participants: 0,
            required: MIN_SYNC_COMMITTEE_PARTICIPANTS,
        });
    }

    // A signature that does not even decode is as bad as a wrong one.
    let sig = Signature::from_bytes(&signature.0).map_err(|_| VerificationError::InvalidSignature)?;

    let pks: Vec<PublicKey> = pubkeys
        .iter()
        .enumerate()
        .map(|(i, pk)| {
            PublicKey::from_bytes(&pk.0).map_err(|e| VerificationError::InvalidPublicKey {
                index: i,
                reason: format!("{:?}", e),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let pk_refs: Vec<&PublicKey> = pks.iter().collect();
    let agg_pk = AggregatePublicKey::aggregate(&pk_refs, false).map_err(|e| {
        VerificationError::BlsError(format!("Failed to aggregate public keys: {:?}", e))
    })?;

    let result = sig.verify(false, message, BLS_DST, &[], &agg_pk.to_public_key(), false);
    if result != BLST_ERROR::BLST_SUCCESS {
        return Err(VerificationError::InvalidSignature);
    }

    Ok(())
}

/// Domain separation tag for Ethereum BLS signatures (proof-of-possession scheme).
pub const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Verify a Merkle branch (SSZ proof) against an expected root.
/// `index` may be the generalized index: only its low `depth` bits are read.
pub fn verify_merkle_branch(
    leaf: &[u8; 32],
    branch: &[[u8; 32]],
    depth: usize,
    index: u64,
    root: &[u8; 32],
) -> bool {
    if branch.len() != depth {
        return false;
    }

    let mut current = *leaf;
    for (i, node) in branch.iter().enumerate() {
        if (index >> i) & 1 == 1 {
            current = sha256_pair(node, &current);
        } else {
            current = sha256_pair(&current, node);
        }
    }

    current == *root
}

/// Committee hash used as MMR leaf and tournament claim:
/// sha256 over the 512 compressed keys, back to back.
pub fn committee_hash(pubkeys: &[BlsPublicKey]) -> [u8; 32] {
    let bytes: Vec<u8> = pubkeys.iter().flat_map(|pk| pk.0).collect();
    sha256(&bytes)
}

/// Element-wise, order-sensitive committee equality.
pub fn is_committee_same(a: &[BlsPublicKey], b: &[BlsPublicKey]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}
