//! Beacon API JSON format adapter.
//!
//! The beacon chain REST API (and the provers, which reuse its update format)
//! speak a different JSON dialect than lantern-core's internal types. This
//! module defines serde types matching the wire format and converts them.
//!
//! Key differences:
//! - API uses string numbers ("12345"), core uses u64
//! - API uses 0x-prefixed hex strings, core uses byte arrays
//! - API nests headers as { beacon: {...}, execution: {...} }
//! - API wraps everything in { data: {...} }

use alloy_primitives::U256;
use lantern_core::merkle::Peak;
use lantern_core::types::beacon::*;
use lantern_core::types::execution::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Hex conversion helpers
// ---------------------------------------------------------------------------

pub fn hex_to_bytes32(s: &str) -> Result<[u8; 32], String> {
    let bytes = hex_to_bytes(s)?;
    if bytes.len() != 32 {
        return Err(format!("expected 32 bytes, got {}", bytes.len()));
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

pub fn hex_to_bytes20(s: &str) -> Result<[u8; 20], String> {
    let bytes = hex_to_bytes(s)?;
    if bytes.len() != 20 {
        return Err(format!("expected 20 bytes, got {}", bytes.len()));
    }
    let mut arr = [0u8; 20];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| format!("hex decode: {}", e))
}

pub fn hex_to_pubkey(s: &str) -> Result<BlsPublicKey, String> {
    BlsPublicKey::from_bytes(&hex_to_bytes(s)?).map_err(|e| e.to_string())
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn parse_u64_string(s: &str) -> Result<u64, String> {
    s.parse::<u64>().map_err(|e| format!("parse u64: {}", e))
}

/// Decimal uint256 to the little-endian bytes SSZ hashes.
fn parse_u256_le(s: &str) -> Result<[u8; 32], String> {
    let value = U256::from_str_radix(s, 10).map_err(|e| format!("parse uint256: {}", e))?;
    Ok(value.to_le_bytes::<32>())
}

fn parse_branch(branch: &[String]) -> Result<Vec<[u8; 32]>, String> {
    branch.iter().map(|s| hex_to_bytes32(s)).collect()
}

// ---------------------------------------------------------------------------
// Beacon API: Envelopes
// ---------------------------------------------------------------------------

/// `{ "version": "deneb", "data": {...} }`
#[derive(Deserialize, Serialize)]
pub struct ApiVersioned<T> {
    #[serde(default)]
    pub version: Option<String>,
    pub data: T,
}

// ---------------------------------------------------------------------------
// Beacon API: Light client update (committee transition)
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize)]
pub struct ApiLightClientUpdate {
    pub attested_header: ApiLightClientHeader,
    pub next_sync_committee: ApiSyncCommittee,
    pub next_sync_committee_branch: Vec<String>,
    pub finalized_header: ApiLightClientHeader,
    pub finality_branch: Vec<String>,
    pub sync_aggregate: ApiSyncAggregate,
    pub signature_slot: String,
}

impl ApiLightClientUpdate {
    pub fn to_core(&self) -> Result<LightClientUpdate, String> {
        Ok(LightClientUpdate {
            attested_header: self.attested_header.beacon.to_core()?,
            next_sync_committee: Some(self.next_sync_committee.to_core()?),
            next_sync_committee_branch: parse_branch(&self.next_sync_committee_branch)?,
            finalized_header: self.finalized_header.beacon.to_core()?,
            finality_branch: parse_branch(&self.finality_branch)?,
            sync_aggregate: self.sync_aggregate.to_core()?,
            signature_slot: parse_u64_string(&self.signature_slot)?,
        })
    }

    /// Wire form of a core update. The headers go out without execution parts.
    pub fn from_core(update: &LightClientUpdate) -> Result<Self, String> {
        let next = update
            .next_sync_committee
            .as_ref()
            .ok_or("update has no next sync committee")?;
        Ok(Self {
            attested_header: ApiLightClientHeader::beacon_only(&update.attested_header),
            next_sync_committee: ApiSyncCommittee::from_core(next),
            next_sync_committee_branch: update
                .next_sync_committee_branch
                .iter()
                .map(|h| bytes_to_hex(h))
                .collect(),
            finalized_header: ApiLightClientHeader::beacon_only(&update.finalized_header),
            finality_branch: update.finality_branch.iter().map(|h| bytes_to_hex(h)).collect(),
            sync_aggregate: ApiSyncAggregate::from_core(&update.sync_aggregate),
            signature_slot: update.signature_slot.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Beacon API: Optimistic update
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize)]
pub struct ApiOptimisticUpdate {
    pub attested_header: ApiLightClientHeader,
    pub sync_aggregate: ApiSyncAggregate,
    pub signature_slot: String,
}

impl ApiOptimisticUpdate {
    pub fn to_core(&self) -> Result<OptimisticUpdate, String> {
        Ok(OptimisticUpdate {
            attested_header: self.attested_header.to_core()?,
            sync_aggregate: self.sync_aggregate.to_core()?,
            signature_slot: parse_u64_string(&self.signature_slot)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Beacon API: Shared sub-structures
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize)]
pub struct ApiLightClientHeader {
    pub beacon: ApiBeaconBlockHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ApiExecutionPayloadHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_branch: Option<Vec<String>>,
}

impl ApiLightClientHeader {
    pub fn to_core(&self) -> Result<LightClientHeader, String> {
        Ok(LightClientHeader {
            beacon: self.beacon.to_core()?,
            execution: self.execution.as_ref().map(|e| e.to_core()).transpose()?,
            execution_branch: self
                .execution_branch
                .as_deref()
                .map(parse_branch)
                .transpose()?
                .unwrap_or_default(),
        })
    }

    fn beacon_only(header: &BeaconBlockHeader) -> Self {
        Self {
            beacon: ApiBeaconBlockHeader::from_core(header),
            execution: None,
            execution_branch: None,
        }
    }
}

#[derive(Deserialize, Serialize)]
pub struct ApiBeaconBlockHeader {
    pub slot: String,
    pub proposer_index: String,
    pub parent_root: String,
    pub state_root: String,
    pub body_root: String,
}

impl ApiBeaconBlockHeader {
    pub fn to_core(&self) -> Result<BeaconBlockHeader, String> {
        Ok(BeaconBlockHeader {
            slot: parse_u64_string(&self.slot)?,
            proposer_index: parse_u64_string(&self.proposer_index)?,
            parent_root: hex_to_bytes32(&self.parent_root)?,
            state_root: hex_to_bytes32(&self.state_root)?,
            body_root: hex_to_bytes32(&self.body_root)?,
        })
    }

    pub fn from_core(header: &BeaconBlockHeader) -> Self {
        Self {
            slot: header.slot.to_string(),
            proposer_index: header.proposer_index.to_string(),
            parent_root: bytes_to_hex(&header.parent_root),
            state_root: bytes_to_hex(&header.state_root),
            body_root: bytes_to_hex(&header.body_root),
        }
    }
}

#[derive(Deserialize, Serialize)]
pub struct ApiExecutionPayloadHeader {
    pub parent_hash: String,
    pub fee_recipient: String,
    pub state_root: String,
    pub receipts_root: String,
    pub logs_bloom: String,
    pub prev_randao: String,
    pub block_number: String,
    pub gas_limit: String,
    pub gas_used: String,
    pub timestamp: String,
    pub extra_data: String,
    pub base_fee_per_gas: String,
    pub block_hash: String,
    pub transactions_root: String,
    pub withdrawals_root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_gas_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excess_blob_gas: Option<String>,
}

impl ApiExecutionPayloadHeader {
    pub fn to_core(&self) -> Result<ExecutionPayloadHeader, String> {
        Ok(ExecutionPayloadHeader {
            parent_hash: hex_to_bytes32(&self.parent_hash)?,
            fee_recipient: hex_to_bytes20(&self.fee_recipient)?,
            state_root: hex_to_bytes32(&self.state_root)?,
            receipts_root: hex_to_bytes32(&self.receipts_root)?,
            logs_bloom: hex_to_bytes(&self.logs_bloom)?,
            prev_randao: hex_to_bytes32(&self.prev_randao)?,
            block_number: parse_u64_string(&self.block_number)?,
            gas_limit: parse_u64_string(&self.gas_limit)?,
            gas_used: parse_u64_string(&self.gas_used)?,
            timestamp: parse_u64_string(&self.timestamp)?,
            extra_data: hex_to_bytes(&self.extra_data)?,
            base_fee_per_gas: parse_u256_le(&self.base_fee_per_gas)?,
            block_hash: hex_to_bytes32(&self.block_hash)?,
            transactions_root: hex_to_bytes32(&self.transactions_root)?,
            withdrawals_root: hex_to_bytes32(&self.withdrawals_root)?,
            blob_gas_used: self.blob_gas_used.as_deref().map(parse_u64_string).transpose()?,
            excess_blob_gas: self.excess_blob_gas.as_deref().map(parse_u64_string).transpose()?,
        })
    }
}

#[derive(Deserialize, Serialize)]
pub struct ApiSyncAggregate {
    pub sync_committee_bits: String,
    pub sync_committee_signature: String,
}

impl ApiSyncAggregate {
    pub fn to_core(&self) -> Result<SyncAggregate, String> {
        let bits_bytes = hex_to_bytes(&self.sync_committee_bits)?;
        let bits = SyncAggregate::bits_from_bytes(&bits_bytes)
            .map_err(|e| format!("sync committee bits: {}", e))?;

        let sig_bytes = hex_to_bytes(&self.sync_committee_signature)?;
        let signature = BlsSignature::from_bytes(&sig_bytes)
            .map_err(|e| format!("BLS signature: {}", e))?;

        Ok(SyncAggregate {
            sync_committee_bits: bits,
            sync_committee_signature: signature,
        })
    }

    pub fn from_core(aggregate: &SyncAggregate) -> Self {
        Self {
            sync_committee_bits: bytes_to_hex(aggregate.sync_committee_bits.as_raw_slice()),
            sync_committee_signature: bytes_to_hex(&aggregate.sync_committee_signature.0),
        }
    }
}

#[derive(Deserialize, Serialize)]
pub struct ApiSyncCommittee {
    pub pubkeys: Vec<String>,
    pub aggregate_pubkey: String,
}

impl ApiSyncCommittee {
    pub fn to_core(&self) -> Result<SyncCommittee, String> {
        let pubkeys: Vec<BlsPublicKey> = self
            .pubkeys
            .iter()
            .enumerate()
            .map(|(i, hex_pk)| hex_to_pubkey(hex_pk).map_err(|e| format!("pubkey[{}]: {}", i, e)))
            .collect::<Result<_, _>>()?;

        let aggregate_pubkey = hex_to_pubkey(&self.aggregate_pubkey)
            .map_err(|e| format!("aggregate_pubkey: {}", e))?;

        Ok(SyncCommittee {
            pubkeys,
            aggregate_pubkey,
        })
    }

    pub fn from_core(committee: &SyncCommittee) -> Self {
        Self {
            pubkeys: committee.pubkeys.iter().map(|pk| bytes_to_hex(&pk.0)).collect(),
            aggregate_pubkey: bytes_to_hex(&committee.aggregate_pubkey.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Beacon API: Signed block (for resolving execution metadata)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ApiSignedBlock {
    pub message: ApiBlockMessage,
}

#[derive(Deserialize)]
pub struct ApiBlockMessage {
    pub slot: String,
    pub proposer_index: String,
    pub parent_root: String,
    pub state_root: String,
    pub body: ApiBlockBody,
}

#[derive(Deserialize)]
pub struct ApiBlockBody {
    pub execution_payload: ApiExecutionPayload,
}

#[derive(Deserialize)]
pub struct ApiWithdrawal {
    pub index: String,
    pub validator_index: String,
    pub address: String,
    pub amount: String,
}

#[derive(Deserialize)]
pub struct ApiExecutionPayload {
    pub parent_hash: String,
    pub fee_recipient: String,
    pub state_root: String,
    pub receipts_root: String,
    pub logs_bloom: String,
    pub prev_randao: String,
    pub block_number: String,
    pub gas_limit: String,
    pub gas_used: String,
    pub timestamp: String,
    pub extra_data: String,
    pub base_fee_per_gas: String,
    pub block_hash: String,
    pub transactions: Vec<String>,
    #[serde(default)]
    pub withdrawals: Vec<ApiWithdrawal>,
    #[serde(default)]
    pub blob_gas_used: Option<String>,
    #[serde(default)]
    pub excess_blob_gas: Option<String>,
}

impl ApiExecutionPayload {
    pub fn to_core(&self) -> Result<ExecutionPayload, String> {
        let withdrawals = self
            .withdrawals
            .iter()
            .map(|w| {
                Ok(Withdrawal {
                    index: parse_u64_string(&w.index)?,
                    validator_index: parse_u64_string(&w.validator_index)?,
                    address: hex_to_bytes20(&w.address)?,
                    amount: parse_u64_string(&w.amount)?,
                })
            })
            .collect::<Result<_, String>>()?;

        Ok(ExecutionPayload {
            parent_hash: hex_to_bytes32(&self.parent_hash)?,
            fee_recipient: hex_to_bytes20(&self.fee_recipient)?,
            state_root: hex_to_bytes32(&self.state_root)?,
            receipts_root: hex_to_bytes32(&self.receipts_root)?,
            logs_bloom: hex_to_bytes(&self.logs_bloom)?,
            prev_randao: hex_to_bytes32(&self.prev_randao)?,
            block_number: parse_u64_string(&self.block_number)?,
            gas_limit: parse_u64_string(&self.gas_limit)?,
            gas_used: parse_u64_string(&self.gas_used)?,
            timestamp: parse_u64_string(&self.timestamp)?,
            extra_data: hex_to_bytes(&self.extra_data)?,
            base_fee_per_gas: parse_u256_le(&self.base_fee_per_gas)?,
            block_hash: hex_to_bytes32(&self.block_hash)?,
            transactions: self
                .transactions
                .iter()
                .map(|tx| hex_to_bytes(tx))
                .collect::<Result<_, _>>()?,
            withdrawals,
            blob_gas_used: self.blob_gas_used.as_deref().map(parse_u64_string).transpose()?,
            excess_blob_gas: self.excess_blob_gas.as_deref().map(parse_u64_string).transpose()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Superlight prover: MMR, tree nodes and leaves
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPeak {
    pub root_hash: String,
    pub size: u64,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMmrInfo {
    pub root_hash: String,
    pub peaks: Vec<ApiPeak>,
}

impl ApiMmrInfo {
    pub fn to_core(&self) -> Result<([u8; 32], Vec<Peak>), String> {
        let peaks = self
            .peaks
            .iter()
            .map(|p| {
                Ok(Peak {
                    root_hash: hex_to_bytes32(&p.root_hash)?,
                    size: usize::try_from(p.size).map_err(|e| e.to_string())?,
                })
            })
            .collect::<Result<_, String>>()?;
        Ok((hex_to_bytes32(&self.root_hash)?, peaks))
    }
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTreeNode {
    pub is_leaf: bool,
    #[serde(default)]
    pub children: Option<Vec<String>>,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLeafWithProof {
    pub sync_committee: Vec<String>,
    pub root_hash: String,
    pub proof: Vec<Vec<String>>,
}
