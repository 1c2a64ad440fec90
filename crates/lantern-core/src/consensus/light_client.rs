use crate::config::{ChainConfig, EXECUTION_PAYLOAD_DEPTH, EXECUTION_PAYLOAD_GINDEX};
use crate::consensus::sync_committee::{
    verify_merkle_branch, verify_sync_committee_signature, VerificationError,
};
use crate::ssz::{hash_beacon_block_header, hash_execution_payload_header, hash_sync_committee};
use crate::types::beacon::*;
use tracing::debug;

/// Verify a committee transition and return the next committee's keys.
///
/// `prev_committee` is the committee of `expected_period`, which is the
/// period the update must be attested in. The pipeline:
/// 1. Structural checks: expected period, next committee present with 512
///    members, finality ordering. No cryptography has run yet.
/// 2. Sync committee BLS signature (participation first, then the aggregate).
/// 3. Finality branch, when the update carries a finalized header.
/// 4. Next sync committee branch against the attested state root.
///
/// The returned keys are exactly `update.next_sync_committee.pubkeys`.
pub fn verify_committee_update(
    chain: &ChainConfig,
    prev_committee: &[BlsPublicKey],
    update: &LightClientUpdate,
    expected_period: u64,
) -> Result<Vec<BlsPublicKey>, VerificationError> {
    let period = update.period();
    if period != expected_period {
        return Err(VerificationError::PeriodMismatch {
            expected: expected_period,
            got: period,
        });
    }

    let next_committee = update
        .next_sync_committee
        .as_ref()
        .ok_or(VerificationError::MissingNextSyncCommittee)?;
    if next_committee.validate().is_err() {
        return Err(VerificationError::InvalidCommitteeSize {
            got: next_committee.pubkeys.len(),
        });
    }

    let has_finality = !update.finalized_header.is_zero();
    if has_finality && update.attested_header.slot < update.finalized_header.slot {
        return Err(VerificationError::InvalidFinalityOrder {
            attested_slot: update.attested_header.slot,
            finalized_slot: update.finalized_header.slot,
        });
    }

    verify_sync_committee_signature(
        prev_committee,
        &update.sync_aggregate,
        &update.attested_header,
        update.signature_slot,
        chain,
    )?;

    let fork = chain.fork_at_slot(update.attested_header.slot);

    if has_finality && !update.finality_branch.is_empty() {
        let (gindex, depth) = fork.finalized_root_gindex();
        let finalized_root = hash_beacon_block_header(&update.finalized_header)?;
        if !verify_merkle_branch(
            &finalized_root,
            &update.finality_branch,
            depth,
            gindex,
            &update.attested_header.state_root,
        ) {
            return Err(VerificationError::InvalidFinalityBranch);
        }
    }

    let (gindex, depth) = fork.next_sync_committee_gindex();
    let committee_root = hash_sync_committee(next_committee)?;
    if !verify_merkle_branch(
        &committee_root,
        &update.next_sync_committee_branch,
        depth,
        gindex,
        &update.attested_header.state_root,
    ) {
        return Err(VerificationError::InvalidNextSyncCommitteeBranch);
    }

    debug!(
        period,
        participants = update.sync_aggregate.num_participants(),
        "committee update verified"
    );
    Ok(next_committee.pubkeys.clone())
}

/// Verify a signed chain-head attestation against `committee`.
///
/// For Capella and later headers the execution payload header must also be
/// proven into the beacon block body.
pub fn verify_optimistic_update(
    chain: &ChainConfig,
    committee: &[BlsPublicKey],
    update: &OptimisticUpdate,
) -> Result<(), VerificationError> {
    verify_sync_committee_signature(
        committee,
        &update.sync_aggregate,
        &update.attested_header.beacon,
        update.signature_slot,
        chain,
    )?;
    verify_light_client_header(chain, &update.attested_header)
}

/// Check the execution payload header of a light client header against the
/// beacon block body root. Pre-Capella headers have nothing to check.
pub fn verify_light_client_header(
    chain: &ChainConfig,
    header: &LightClientHeader,
) -> Result<(), VerificationError> {
    let slot = header.beacon.slot;
    if !chain.fork_at_slot(slot).has_execution_header() {
        return Ok(());
    }

    let execution = header
        .execution
        .as_ref()
        .ok_or(VerificationError::MissingExecutionHeader { slot })?;
    let execution_root = hash_execution_payload_header(execution)?;

    if !verify_merkle_branch(
        &execution_root,
        &header.execution_branch,
        EXECUTION_PAYLOAD_DEPTH,
        EXECUTION_PAYLOAD_GINDEX,
        &header.beacon.body_root,
    ) {
        return Err(VerificationError::InvalidExecutionBranch);
    }
    Ok(())
}
