//! SSZ containers and codecs.
//!
//! The beacon types in [`crate::types`] stay plain Rust so they serialize to
//! JSON cleanly. Whenever something has to be hashed or decoded the SSZ way,
//! it is mirrored into one of the `ssz_rs` containers below and the library
//! does the merkleization.

use crate::types::beacon::*;
use crate::types::execution::{ExecutionPayload, Withdrawal};
use sha2::{Digest, Sha256};
use ssz_rs::prelude::*;
use thiserror::Error;

pub const BYTES_PER_LOGS_BLOOM: usize = 256;
pub const MAX_EXTRA_DATA_BYTES: usize = 32;
pub const MAX_BYTES_PER_TRANSACTION: usize = 1 << 30;
pub const MAX_TRANSACTIONS_PER_PAYLOAD: usize = 1 << 20;
pub const MAX_WITHDRAWALS_PER_PAYLOAD: usize = 16;

/// Upper bound of the hash and update lists provers serve in one response.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Branch depths of the altair `LightClientUpdate` container.
pub const NEXT_SYNC_COMMITTEE_DEPTH: usize = 5;
pub const FINALITY_DEPTH: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SszError {
    #[error("Invalid {what} length: expected {expected} bytes, got {got}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{what} of {got} bytes exceeds the maximum of {max}")]
    TooLong {
        what: &'static str,
        max: usize,
        got: usize,
    },

    #[error("SSZ decode failed: {0}")]
    Decode(String),

    #[error("SSZ encode failed: {0}")]
    Encode(String),

    #[error("hash_tree_root failed: {0}")]
    Merkleization(String),
}

/// SHA256 hash of arbitrary data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// SHA256 hash of two 32-byte values concatenated.
pub fn sha256_pair(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(a);
    data[32..].copy_from_slice(b);
    sha256(&data)
}

pub type Bytes32 = Vector<u8, 32>;
pub type BlsPubkeyBytes = Vector<u8, BLS_PUBKEY_LEN>;

#[derive(Debug, Default, Clone, PartialEq, Eq, SimpleSerialize)]
pub struct SszBeaconBlockHeader {
    pub slot: u64,
    pub proposer_index: u64,
    pub parent_root: Bytes32,
    pub state_root: Bytes32,
    pub body_root: Bytes32,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, SimpleSerialize)]
pub struct SszSyncCommittee {
    pub pubkeys: Vector<BlsPubkeyBytes, SYNC_COMMITTEE_SIZE>,
    pub aggregate_pubkey: BlsPubkeyBytes,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, SimpleSerialize)]
pub struct SszSyncAggregate {
    pub sync_committee_bits: Bitvector<SYNC_COMMITTEE_SIZE>,
    pub sync_committee_signature: Vector<u8, BLS_SIGNATURE_LEN>,
}

/// `altair.LightClientUpdate`, the format committee-hash provers serve.
#[derive(Debug, Default, Clone, PartialEq, Eq, SimpleSerialize)]
pub struct SszLightClientUpdate {
    pub attested_header: SszBeaconBlockHeader,
    pub next_sync_committee: SszSyncCommittee,
    pub next_sync_committee_branch: Vector<Bytes32, NEXT_SYNC_COMMITTEE_DEPTH>,
    pub finalized_header: SszBeaconBlockHeader,
    pub finality_branch: Vector<Bytes32, FINALITY_DEPTH>,
    pub sync_aggregate: SszSyncAggregate,
    pub signature_slot: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, SimpleSerialize)]
pub struct SszWithdrawal {
    pub index: u64,
    pub validator_index: u64,
    pub address: Vector<u8, 20>,
    pub amount: u64,
}

pub type Transaction = List<u8, MAX_BYTES_PER_TRANSACTION>;

#[derive(Debug, Default, Clone, PartialEq, Eq, SimpleSerialize)]
pub struct SszExecutionPayloadHeaderCapella {
    pub parent_hash: Bytes32,
    pub fee_recipient: Vector<u8, 20>,
    pub state_root: Bytes32,
    pub receipts_root: Bytes32,
    pub logs_bloom: Vector<u8, BYTES_PER_LOGS_BLOOM>,
    pub prev_randao: Bytes32,
    pub block_number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: List<u8, MAX_EXTRA_DATA_BYTES>,
    /// uint256 kept as its 32 little-endian bytes, which hash identically.
    pub base_fee_per_gas: Bytes32,
    pub block_hash: Bytes32,
    pub transactions_root: Bytes32,
    pub withdrawals_root: Bytes32,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, SimpleSerialize)]
pub struct SszExecutionPayloadHeaderDeneb {
    pub parent_hash: Bytes32,
    pub fee_recipient: Vector<u8, 20>,
    pub state_root: Bytes32,
    pub receipts_root: Bytes32,
    pub logs_bloom: Vector<u8, BYTES_PER_LOGS_BLOOM>,
    pub prev_randao: Bytes32,
    pub block_number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: List<u8, MAX_EXTRA_DATA_BYTES>,
    pub base_fee_per_gas: Bytes32,
    pub block_hash: Bytes32,
    pub transactions_root: Bytes32,
    pub withdrawals_root: Bytes32,
    pub blob_gas_used: u64,
    pub excess_blob_gas: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, SimpleSerialize)]
pub struct ForkData {
    pub current_version: Vector<u8, 4>,
    pub genesis_validators_root: Bytes32,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, SimpleSerialize)]
pub struct SigningData {
    pub object_root: Bytes32,
    pub domain: Bytes32,
}

// --- Conversions ---

fn byte_vector<const N: usize>(what: &'static str, bytes: &[u8]) -> Result<Vector<u8, N>, SszError> {
    Vector::try_from(bytes.to_vec()).map_err(|_| SszError::InvalidLength {
        what,
        expected: N,
        got: bytes.len(),
    })
}

fn byte_list<const N: usize>(what: &'static str, bytes: &[u8]) -> Result<List<u8, N>, SszError> {
    List::try_from(bytes.to_vec()).map_err(|_| SszError::TooLong {
        what,
        max: N,
        got: bytes.len(),
    })
}

fn to_root(bytes: &Bytes32) -> [u8; 32] {
    let mut root = [0u8; 32];
    root.copy_from_slice(bytes);
    root
}

fn to_pubkey(bytes: &BlsPubkeyBytes) -> BlsPublicKey {
    let mut pk = [0u8; BLS_PUBKEY_LEN];
    pk.copy_from_slice(bytes);
    BlsPublicKey(pk)
}

fn root_of<T: Merkleized>(mut value: T) -> Result<[u8; 32], SszError> {
    let node = value
        .hash_tree_root()
        .map_err(|e| SszError::Merkleization(e.to_string()))?;
    let mut root = [0u8; 32];
    root.copy_from_slice(node.as_ref());
    Ok(root)
}

fn decode<T: SimpleSerialize>(bytes: &[u8]) -> Result<T, SszError> {
    ssz_rs::deserialize::<T>(bytes).map_err(|e| SszError::Decode(e.to_string()))
}

impl SszBeaconBlockHeader {
    pub fn from_header(header: &BeaconBlockHeader) -> Result<Self, SszError> {
        Ok(Self {
            slot: header.slot,
            proposer_index: header.proposer_index,
            parent_root: byte_vector("parent root", &header.parent_root)?,
            state_root: byte_vector("state root", &header.state_root)?,
            body_root: byte_vector("body root", &header.body_root)?,
        })
    }

    pub fn to_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: self.slot,
            proposer_index: self.proposer_index,
            parent_root: to_root(&self.parent_root),
            state_root: to_root(&self.state_root),
            body_root: to_root(&self.body_root),
        }
    }
}

impl SszSyncCommittee {
    pub fn from_committee(committee: &SyncCommittee) -> Result<Self, SszError> {
        Ok(Self {
            pubkeys: pubkey_vector(&committee.pubkeys)?,
            aggregate_pubkey: byte_vector("aggregate pubkey", &committee.aggregate_pubkey.0)?,
        })
    }

    /// `None` for the zeroed committee of an update without a transition.
    pub fn to_committee(&self) -> Option<SyncCommittee> {
        if *self == Self::default() {
            return None;
        }
        Some(SyncCommittee {
            pubkeys: self.pubkeys.iter().map(to_pubkey).collect(),
            aggregate_pubkey: to_pubkey(&self.aggregate_pubkey),
        })
    }
}

fn pubkey_vector(
    pubkeys: &[BlsPublicKey],
) -> Result<Vector<BlsPubkeyBytes, SYNC_COMMITTEE_SIZE>, SszError> {
    let keys = pubkeys
        .iter()
        .map(|pk| byte_vector("pubkey", &pk.0))
        .collect::<Result<Vec<_>, _>>()?;
    Vector::try_from(keys).map_err(|_| SszError::InvalidLength {
        what: "sync committee",
        expected: SYNC_COMMITTEE_SIZE,
        got: pubkeys.len(),
    })
}

impl SszSyncAggregate {
    pub fn from_aggregate(aggregate: &SyncAggregate) -> Result<Self, SszError> {
        Ok(Self {
            sync_committee_bits: decode(aggregate.sync_committee_bits.as_raw_slice())?,
            sync_committee_signature: byte_vector(
                "signature",
                &aggregate.sync_committee_signature.0,
            )?,
        })
    }

    pub fn to_aggregate(&self) -> Result<SyncAggregate, SszError> {
        let bits = ssz_rs::serialize(&self.sync_committee_bits)
            .map_err(|e| SszError::Encode(e.to_string()))?;
        let signature = BlsSignature::from_bytes(&self.sync_committee_signature).map_err(|_| {
            SszError::InvalidLength {
                what: "signature",
                expected: BLS_SIGNATURE_LEN,
                got: self.sync_committee_signature.len(),
            }
        })?;
        Ok(SyncAggregate {
            sync_committee_bits: SyncAggregate::bits_from_bytes(&bits).map_err(|_| {
                SszError::InvalidLength {
                    what: "sync committee bits",
                    expected: SYNC_COMMITTEE_SIZE / 8,
                    got: bits.len(),
                }
            })?,
            sync_committee_signature: signature,
        })
    }
}

fn branch_vector<const N: usize>(
    what: &'static str,
    branch: &[[u8; 32]],
) -> Result<Vector<Bytes32, N>, SszError> {
    // Updates without a finality proof carry a zeroed branch.
    if branch.is_empty() {
        return Ok(Vector::default());
    }
    let nodes = branch
        .iter()
        .map(|node| byte_vector(what, node))
        .collect::<Result<Vec<_>, _>>()?;
    Vector::try_from(nodes).map_err(|_| SszError::InvalidLength {
        what,
        expected: N,
        got: branch.len(),
    })
}

impl SszLightClientUpdate {
    pub fn from_update(update: &LightClientUpdate) -> Result<Self, SszError> {
        Ok(Self {
            attested_header: SszBeaconBlockHeader::from_header(&update.attested_header)?,
            next_sync_committee: match &update.next_sync_committee {
                Some(committee) => SszSyncCommittee::from_committee(committee)?,
                None => SszSyncCommittee::default(),
            },
            next_sync_committee_branch: branch_vector(
                "next sync committee branch",
                &update.next_sync_committee_branch,
            )?,
            finalized_header: SszBeaconBlockHeader::from_header(&update.finalized_header)?,
            finality_branch: branch_vector("finality branch", &update.finality_branch)?,
            sync_aggregate: SszSyncAggregate::from_aggregate(&update.sync_aggregate)?,
            signature_slot: update.signature_slot,
        })
    }

    pub fn to_update(&self) -> Result<LightClientUpdate, SszError> {
        Ok(LightClientUpdate {
            attested_header: self.attested_header.to_header(),
            next_sync_committee: self.next_sync_committee.to_committee(),
            next_sync_committee_branch: self.next_sync_committee_branch.iter().map(to_root).collect(),
            finalized_header: self.finalized_header.to_header(),
            finality_branch: self.finality_branch.iter().map(to_root).collect(),
            sync_aggregate: self.sync_aggregate.to_aggregate()?,
            signature_slot: self.signature_slot,
        })
    }
}

impl SszWithdrawal {
    fn from_withdrawal(withdrawal: &Withdrawal) -> Result<Self, SszError> {
        Ok(Self {
            index: withdrawal.index,
            validator_index: withdrawal.validator_index,
            address: byte_vector("withdrawal address", &withdrawal.address)?,
            amount: withdrawal.amount,
        })
    }
}

impl SszExecutionPayloadHeaderCapella {
    pub fn from_header(header: &ExecutionPayloadHeader) -> Result<Self, SszError> {
        Ok(Self {
            parent_hash: byte_vector("parent hash", &header.parent_hash)?,
            fee_recipient: byte_vector("fee recipient", &header.fee_recipient)?,
            state_root: byte_vector("state root", &header.state_root)?,
            receipts_root: byte_vector("receipts root", &header.receipts_root)?,
            logs_bloom: byte_vector("logs bloom", &header.logs_bloom)?,
            prev_randao: byte_vector("prev randao", &header.prev_randao)?,
            block_number: header.block_number,
            gas_limit: header.gas_limit,
            gas_used: header.gas_used,
            timestamp: header.timestamp,
            extra_data: byte_list("extra data", &header.extra_data)?,
            base_fee_per_gas: byte_vector("base fee", &header.base_fee_per_gas)?,
            block_hash: byte_vector("block hash", &header.block_hash)?,
            transactions_root: byte_vector("transactions root", &header.transactions_root)?,
            withdrawals_root: byte_vector("withdrawals root", &header.withdrawals_root)?,
        })
    }

    fn with_blob_gas(self, blob_gas_used: u64, excess_blob_gas: u64) -> SszExecutionPayloadHeaderDeneb {
        SszExecutionPayloadHeaderDeneb {
            parent_hash: self.parent_hash,
            fee_recipient: self.fee_recipient,
            state_root: self.state_root,
            receipts_root: self.receipts_root,
            logs_bloom: self.logs_bloom,
            prev_randao: self.prev_randao,
            block_number: self.block_number,
            gas_limit: self.gas_limit,
            gas_used: self.gas_used,
            timestamp: self.timestamp,
            extra_data: self.extra_data,
            base_fee_per_gas: self.base_fee_per_gas,
            block_hash: self.block_hash,
            transactions_root: self.transactions_root,
            withdrawals_root: self.withdrawals_root,
            blob_gas_used,
            excess_blob_gas,
        }
    }
}

// --- Roots ---

/// hash_tree_root of a BeaconBlockHeader.
pub fn hash_beacon_block_header(header: &BeaconBlockHeader) -> Result<[u8; 32], SszError> {
    root_of(SszBeaconBlockHeader::from_header(header)?)
}

/// hash_tree_root of the SyncCommittee container, as committed in the beacon state.
pub fn hash_sync_committee(committee: &SyncCommittee) -> Result<[u8; 32], SszError> {
    root_of(SszSyncCommittee::from_committee(committee)?)
}

/// hash_tree_root of an ExecutionPayloadHeader. The Deneb layout is used
/// when the blob-gas fields are present, Capella otherwise.
pub fn hash_execution_payload_header(
    header: &ExecutionPayloadHeader,
) -> Result<[u8; 32], SszError> {
    let capella = SszExecutionPayloadHeaderCapella::from_header(header)?;
    match (header.blob_gas_used, header.excess_blob_gas) {
        (Some(blob_gas_used), Some(excess_blob_gas)) => {
            root_of(capella.with_blob_gas(blob_gas_used, excess_blob_gas))
        }
        _ => root_of(capella),
    }
}

/// hash_tree_root of `List[Transaction, MAX_TRANSACTIONS_PER_PAYLOAD]`.
pub fn hash_transactions(transactions: &[Vec<u8>]) -> Result<[u8; 32], SszError> {
    let txs = transactions
        .iter()
        .map(|tx| byte_list::<MAX_BYTES_PER_TRANSACTION>("transaction", tx))
        .collect::<Result<Vec<Transaction>, _>>()?;
    let list = List::<Transaction, MAX_TRANSACTIONS_PER_PAYLOAD>::try_from(txs).map_err(|_| {
        SszError::TooLong {
            what: "transaction list",
            max: MAX_TRANSACTIONS_PER_PAYLOAD,
            got: transactions.len(),
        }
    })?;
    root_of(list)
}

/// hash_tree_root of `List[Withdrawal, MAX_WITHDRAWALS_PER_PAYLOAD]`.
pub fn hash_withdrawals(withdrawals: &[Withdrawal]) -> Result<[u8; 32], SszError> {
    let items = withdrawals
        .iter()
        .map(SszWithdrawal::from_withdrawal)
        .collect::<Result<Vec<_>, _>>()?;
    let list = List::<SszWithdrawal, MAX_WITHDRAWALS_PER_PAYLOAD>::try_from(items).map_err(|_| {
        SszError::TooLong {
            what: "withdrawal list",
            max: MAX_WITHDRAWALS_PER_PAYLOAD,
            got: withdrawals.len(),
        }
    })?;
    root_of(list)
}

/// Collapse a full payload into its header by hashing the two lists.
pub fn payload_to_header(payload: &ExecutionPayload) -> Result<ExecutionPayloadHeader, SszError> {
    Ok(ExecutionPayloadHeader {
        parent_hash: payload.parent_hash,
        fee_recipient: payload.fee_recipient,
        state_root: payload.state_root,
        receipts_root: payload.receipts_root,
        logs_bloom: payload.logs_bloom.clone(),
        prev_randao: payload.prev_randao,
        block_number: payload.block_number,
        gas_limit: payload.gas_limit,
        gas_used: payload.gas_used,
        timestamp: payload.timestamp,
        extra_data: payload.extra_data.clone(),
        base_fee_per_gas: payload.base_fee_per_gas,
        block_hash: payload.block_hash,
        transactions_root: hash_transactions(&payload.transactions)?,
        withdrawals_root: hash_withdrawals(&payload.withdrawals)?,
        blob_gas_used: payload.blob_gas_used,
        excess_blob_gas: payload.excess_blob_gas,
    })
}

pub fn hash_fork_data(
    fork_version: &[u8; 4],
    genesis_validators_root: &[u8; 32],
) -> Result<[u8; 32], SszError> {
    root_of(ForkData {
        current_version: byte_vector("fork version", fork_version)?,
        genesis_validators_root: byte_vector("genesis validators root", genesis_validators_root)?,
    })
}

pub fn hash_signing_data(object_root: &[u8; 32], domain: &[u8; 32]) -> Result<[u8; 32], SszError> {
    root_of(SigningData {
        object_root: byte_vector("object root", object_root)?,
        domain: byte_vector("domain", domain)?,
    })
}

// --- Wire codecs ---

/// Decode `Vector[BLSPubkey, 512]`.
pub fn decode_committee(bytes: &[u8]) -> Result<Vec<BlsPublicKey>, SszError> {
    let expected = SYNC_COMMITTEE_SIZE * BLS_PUBKEY_LEN;
    if bytes.len() != expected {
        return Err(SszError::InvalidLength {
            what: "sync committee",
            expected,
            got: bytes.len(),
        });
    }
    let pubkeys: Vector<BlsPubkeyBytes, SYNC_COMMITTEE_SIZE> = decode(bytes)?;
    Ok(pubkeys.iter().map(to_pubkey).collect())
}

/// Decode `List[Bytes32, MAX_BATCH_SIZE]`.
pub fn decode_hashes(bytes: &[u8]) -> Result<Vec<[u8; 32]>, SszError> {
    let hashes: List<Bytes32, MAX_BATCH_SIZE> = decode(bytes)?;
    Ok(hashes.iter().map(to_root).collect())
}

/// Decode a single altair `LightClientUpdate`.
pub fn decode_light_client_update(bytes: &[u8]) -> Result<LightClientUpdate, SszError> {
    decode::<SszLightClientUpdate>(bytes)?.to_update()
}

/// Decode `List[LightClientUpdate, MAX_BATCH_SIZE]`.
pub fn decode_light_client_updates(bytes: &[u8]) -> Result<Vec<LightClientUpdate>, SszError> {
    let updates: List<SszLightClientUpdate, MAX_BATCH_SIZE> = decode(bytes)?;
    updates.iter().map(SszLightClientUpdate::to_update).collect()
}

/// Encode a single update in the altair layout.
pub fn encode_light_client_update(update: &LightClientUpdate) -> Result<Vec<u8>, SszError> {
    let value = SszLightClientUpdate::from_update(update)?;
    ssz_rs::serialize(&value).map_err(|e| SszError::Encode(e.to_string()))
}

/// Encode a batch as `List[LightClientUpdate, MAX_BATCH_SIZE]`.
pub fn encode_light_client_updates(updates: &[LightClientUpdate]) -> Result<Vec<u8>, SszError> {
    let items = updates
        .iter()
        .map(SszLightClientUpdate::from_update)
        .collect::<Result<Vec<_>, _>>()?;
    let list: List<SszLightClientUpdate, MAX_BATCH_SIZE> =
        List::try_from(items).map_err(|_| SszError::TooLong {
            what: "update batch",
            max: MAX_BATCH_SIZE,
            got: updates.len(),
        })?;
    ssz_rs::serialize(&list).map_err(|e| SszError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_execution_payload, sign_update, test_chain, CommitteeKeys};
    use hex_literal::hex;

    /// Size of a fixed-layout altair update on the wire.
    const ALTAIR_UPDATE_LEN: usize = 112 + (512 * 48 + 48) + 5 * 32 + 112 + 6 * 32 + (64 + 96) + 8;

    fn header_bytes(header: &BeaconBlockHeader) -> Vec<u8> {
        [
            &header.slot.to_le_bytes()[..],
            &header.proposer_index.to_le_bytes(),
            &header.parent_root,
            &header.state_root,
            &header.body_root,
        ]
        .concat()
    }

    /// Lays an update out field by field, the way the prover serializes it.
    fn altair_update_bytes(update: &LightClientUpdate) -> Vec<u8> {
        let committee = update.next_sync_committee.as_ref().unwrap();
        let mut out = header_bytes(&update.attested_header);
        for pk in &committee.pubkeys {
            out.extend_from_slice(&pk.0);
        }
        out.extend_from_slice(&committee.aggregate_pubkey.0);
        out.extend(update.next_sync_committee_branch.concat());
        out.extend(header_bytes(&update.finalized_header));
        out.extend(update.finality_branch.concat());
        out.extend_from_slice(update.sync_aggregate.sync_committee_bits.as_raw_slice());
        out.extend_from_slice(&update.sync_aggregate.sync_committee_signature.0);
        out.extend_from_slice(&update.signature_slot.to_le_bytes());
        out
    }

    #[test]
    fn test_sha256_pair_order_matters() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_ne!(sha256_pair(&a, &b), sha256_pair(&b, &a));
    }

    #[test]
    fn test_empty_header_root_is_zero_subtree() {
        // Five zero chunks padded to eight: the depth-3 zero hash.
        assert_eq!(
            hash_beacon_block_header(&BeaconBlockHeader::default()).unwrap(),
            hex!("c78009fdf07fc56a11f122370658a353aaa542ed63e44c4bc15ff4cd105ab33c")
        );
    }

    #[test]
    fn test_devnet_header_root() {
        let header = BeaconBlockHeader {
            slot: 100000,
            proposer_index: 0,
            parent_root: [1; 32],
            state_root: [1; 32],
            body_root: hex!("045a26b541713c820616774b2082317cdd74dcff424c255c803e558843e55371"),
        };
        assert_eq!(
            hash_beacon_block_header(&header).unwrap(),
            hex!("73f9724ff84f3d0a63e8f272d8e5b06d5a1d90c8e4b55ede33199016e1cc7edd")
        );
    }

    #[test]
    fn test_zeroed_sync_committee_root() {
        let committee = SyncCommittee {
            pubkeys: vec![BlsPublicKey([0; 48]); SYNC_COMMITTEE_SIZE],
            aggregate_pubkey: BlsPublicKey([0; 48]),
        };
        assert_eq!(
            hash_sync_committee(&committee).unwrap(),
            hex!("173669ae8794c057def63b20372114a628abb029354a2ef50d7a1aaa9a3dab4a")
        );
    }

    #[test]
    fn test_short_sync_committee_is_rejected() {
        let committee = SyncCommittee {
            pubkeys: vec![BlsPublicKey([1; 48]); 32],
            aggregate_pubkey: BlsPublicKey([2; 48]),
        };
        assert!(matches!(
            hash_sync_committee(&committee),
            Err(SszError::InvalidLength { what: "sync committee", got: 32, .. })
        ));
    }

    /// A Deneb payload header from a devnet block, proven into that block's
    /// body root with the branch the beacon node served.
    #[test]
    fn test_deneb_payload_header_proves_into_real_body_root() {
        let mut base_fee_per_gas = [0u8; 32];
        base_fee_per_gas[..8].copy_from_slice(&27136u64.to_le_bytes());
        let header = ExecutionPayloadHeader {
            parent_hash: hex!("f55156c2b27326547193bcd2501c8300a0f3617a7d71f096fc992955f042ea50"),
            fee_recipient: hex!("8943545177806ed17b9f23f0a21ee5948ecaa776"),
            state_root: hex!("47baba45d0ee0f0abaa42d7fbdba87908052d81fe33806576215bcf136167510"),
            receipts_root: hex!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421"),
            logs_bloom: vec![0; BYTES_PER_LOGS_BLOOM],
            prev_randao: hex!("707a729f27185bfd88c746532e0909f7f4604dc5b25b6d9ffb5cfec6ca7987d9"),
            block_number: 80,
            gas_limit: 30_000_000,
            gas_used: 0,
            timestamp: 1_732_901_097,
            extra_data: hex!("d883010e06846765746888676f312e32322e34856c696e7578").to_vec(),
            base_fee_per_gas,
            block_hash: hex!("c001e15851608006eb33999e829bb265706929091f4c9a08f6853f6fbe96a730"),
            transactions_root: hex!("7ffe241ea60187fdb0187bfa22de35d1f9bed7ab061d9401fd47e34a54fbede1"),
            withdrawals_root: hex!("28ba1834a3a7b657460ce79fa3a1d909ab8828fd557659d4d0554a9bdbc0ec30"),
            blob_gas_used: Some(0),
            excess_blob_gas: Some(0),
        };
        let branch = [
            hex!("d320d2b395e1065b0b2e3dbb7843c6d77cb7830ef340ffc968caa0f92e26f080"),
            hex!("6c6dd63656639d153a2e86a9cab291e7a26e957ad635fec872d2836e92340c23"),
            hex!("db56114e00fdd4c1f85c892bf35ac9a89289aaecb1ebd0a96cde606a748b5d71"),
            hex!("ee70868f724f428f301007b0967c82d9c31fb5fd549d7f25342605169b90a3d6"),
        ];
        let body_root = hex!("045a26b541713c820616774b2082317cdd74dcff424c255c803e558843e55371");

        let root = hash_execution_payload_header(&header).unwrap();
        assert_eq!(
            root,
            hex!("93704f8234cd552795eeec933482b90f03c2b15b69383169f3a964464797ca66")
        );
        assert!(crate::consensus::sync_committee::verify_merkle_branch(
            &root, &branch, 4, 25, &body_root
        ));

        // The Capella layout of the same fields is a different container.
        let capella = ExecutionPayloadHeader {
            blob_gas_used: None,
            excess_blob_gas: None,
            ..header.clone()
        };
        assert_ne!(hash_execution_payload_header(&capella).unwrap(), root);
    }

    #[test]
    fn test_execution_header_field_limits() {
        let mut header = payload_to_header(&sample_execution_payload(10)).unwrap();
        header.logs_bloom = vec![0; 10];
        assert!(matches!(
            hash_execution_payload_header(&header),
            Err(SszError::InvalidLength { what: "logs bloom", .. })
        ));

        header.logs_bloom = vec![0; BYTES_PER_LOGS_BLOOM];
        header.extra_data = vec![0; MAX_EXTRA_DATA_BYTES + 1];
        assert!(matches!(
            hash_execution_payload_header(&header),
            Err(SszError::TooLong { what: "extra data", .. })
        ));
    }

    #[test]
    fn test_payload_lists_change_the_header() {
        let payload = sample_execution_payload(10);
        let header = payload_to_header(&payload).unwrap();

        let mut fewer = payload.clone();
        fewer.transactions.pop();
        assert_ne!(payload_to_header(&fewer).unwrap().transactions_root, header.transactions_root);
        assert_eq!(payload_to_header(&fewer).unwrap().withdrawals_root, header.withdrawals_root);

        fewer.withdrawals.clear();
        assert_ne!(payload_to_header(&fewer).unwrap().withdrawals_root, header.withdrawals_root);
    }

    #[test]
    fn test_decode_committee_from_concatenated_keys() {
        let pubkeys: Vec<BlsPublicKey> = (0..SYNC_COMMITTEE_SIZE)
            .map(|i| BlsPublicKey([(i % 251) as u8; 48]))
            .collect();
        let bytes: Vec<u8> = pubkeys.iter().flat_map(|pk| pk.0).collect();
        assert_eq!(decode_committee(&bytes).unwrap(), pubkeys);
        assert!(matches!(
            decode_committee(&bytes[1..]),
            Err(SszError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_decode_hashes_rejects_partial_chunk() {
        let bytes = [[1u8; 32], [2u8; 32]].concat();
        assert_eq!(decode_hashes(&bytes).unwrap(), vec![[1; 32], [2; 32]]);
        assert!(decode_hashes(&[]).unwrap().is_empty());
        assert!(matches!(decode_hashes(&bytes[..40]), Err(SszError::Decode(_))));
    }

    #[test]
    fn test_decode_altair_update() {
        let chain = test_chain();
        let update = sign_update(
            &chain,
            &CommitteeKeys::generate(1, 3),
            3,
            &CommitteeKeys::generate(1, 4),
            400,
        );
        let bytes = altair_update_bytes(&update);
        assert_eq!(bytes.len(), ALTAIR_UPDATE_LEN);

        let decoded = decode_light_client_update(&bytes).unwrap();
        assert_eq!(decoded, update);
        assert_eq!(decoded.sync_aggregate.num_participants(), 400);

        assert!(matches!(
            decode_light_client_update(&bytes[..bytes.len() - 1]),
            Err(SszError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_update_batch() {
        let chain = test_chain();
        let keys: Vec<CommitteeKeys> = (0..3).map(|p| CommitteeKeys::generate(1, p)).collect();
        let updates = vec![
            sign_update(&chain, &keys[0], 0, &keys[1], 512),
            sign_update(&chain, &keys[1], 1, &keys[2], 512),
        ];
        // Fixed-size elements: a list is the items back to back.
        let bytes: Vec<u8> = updates.iter().flat_map(altair_update_bytes).collect();
        assert_eq!(decode_light_client_updates(&bytes).unwrap(), updates);
    }

    #[test]
    fn test_encoded_update_matches_field_layout() {
        let chain = test_chain();
        let update = sign_update(
            &chain,
            &CommitteeKeys::generate(1, 5),
            5,
            &CommitteeKeys::generate(1, 6),
            342,
        );
        assert_eq!(
            encode_light_client_update(&update).unwrap(),
            altair_update_bytes(&update)
        );
        let batch = encode_light_client_updates(std::slice::from_ref(&update)).unwrap();
        assert_eq!(decode_light_client_updates(&batch).unwrap(), vec![update]);
    }

    #[test]
    fn test_oversized_branch_is_rejected() {
        let chain = test_chain();
        let mut update = sign_update(
            &chain,
            &CommitteeKeys::generate(1, 0),
            0,
            &CommitteeKeys::generate(1, 1),
            512,
        );
        update.finality_branch.push([0u8; 32]);
        assert!(matches!(
            encode_light_client_update(&update),
            Err(SszError::InvalidLength { what: "finality branch", .. })
        ));
    }

    #[test]
    fn test_zeroed_committee_decodes_as_missing() {
        assert!(SszSyncCommittee::default().to_committee().is_none());
    }
}
