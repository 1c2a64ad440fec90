use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

/// Number of validators in the Ethereum beacon chain sync committee.
pub const SYNC_COMMITTEE_SIZE: usize = 512;

/// Number of bytes in a BLS12-381 public key (compressed).
pub const BLS_PUBKEY_LEN: usize = 48;

/// Number of bytes in a BLS12-381 signature (compressed).
pub const BLS_SIGNATURE_LEN: usize = 96;

/// Slots per sync committee period (256 epochs * 32 slots/epoch = 8192).
pub const SLOTS_PER_SYNC_COMMITTEE_PERIOD: u64 = 8192;

/// Epochs per sync committee period.
pub const EPOCHS_PER_SYNC_COMMITTEE_PERIOD: u64 = 256;

/// Slots per epoch.
pub const SLOTS_PER_EPOCH: u64 = 32;

/// Domain type for sync committee signatures.
pub const DOMAIN_SYNC_COMMITTEE: [u8; 4] = [0x07, 0x00, 0x00, 0x00];

/// Minimum number of sync committee participants required: ceil(2 * 512 / 3).
pub const MIN_SYNC_COMMITTEE_PARTICIPANTS: usize = (SYNC_COMMITTEE_SIZE * 2 + 2) / 3;

/// Sync committee period containing `slot`.
pub fn compute_sync_period_at_slot(slot: u64) -> u64 {
    slot / SLOTS_PER_SYNC_COMMITTEE_PERIOD
}

/// Epoch containing `slot`.
pub fn compute_epoch_at_slot(slot: u64) -> u64 {
    slot / SLOTS_PER_EPOCH
}

/// A BLS12-381 public key (48 bytes, compressed G1 point).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlsPublicKey(pub [u8; BLS_PUBKEY_LEN]);

impl Serialize for BlsPublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl<'de> Deserialize<'de> for BlsPublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl BlsPublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, &'static str> {
        if bytes.len() != BLS_PUBKEY_LEN {
            return Err("Invalid BLS public key length");
        }
        let mut arr = [0u8; BLS_PUBKEY_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Short hex prefix for log lines.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

/// A BLS12-381 signature (96 bytes, compressed G2 point).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlsSignature(pub [u8; BLS_SIGNATURE_LEN]);

impl Serialize for BlsSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl<'de> Deserialize<'de> for BlsSignature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl BlsSignature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, &'static str> {
        if bytes.len() != BLS_SIGNATURE_LEN {
            return Err("Invalid BLS signature length");
        }
        let mut arr = [0u8; BLS_SIGNATURE_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }
}

/// A beacon chain block header.
/// Enough to follow the chain without storing full blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconBlockHeader {
    /// Slot number of this block.
    pub slot: u64,
    /// Index of the validator who proposed this block.
    pub proposer_index: u64,
    /// Root hash of the parent beacon block.
    pub parent_root: [u8; 32],
    /// Root hash of the beacon state after processing this block.
    pub state_root: [u8; 32],
    /// Root hash of the block body.
    pub body_root: [u8; 32],
}

impl BeaconBlockHeader {
    /// Sync committee period of this header's slot.
    pub fn period(&self) -> u64 {
        compute_sync_period_at_slot(self.slot)
    }

    /// An all-zero header marks "no finalized header" in non-finality updates.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// The sync committee SSZ container as it travels inside updates:
/// 512 member keys plus their aggregate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCommittee {
    /// 512 BLS public keys of committee members.
    pub pubkeys: Vec<BlsPublicKey>,
    /// Aggregated public key for fast signature verification.
    pub aggregate_pubkey: BlsPublicKey,
}

impl SyncCommittee {
    /// Validate the sync committee has the correct number of members.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.pubkeys.len() != SYNC_COMMITTEE_SIZE {
            return Err("Sync committee must have exactly 512 members");
        }
        Ok(())
    }
}

/// Participation bits of the sync committee, one per seat, in SSZ bit order.
pub type SyncCommitteeBits = BitArray<[u8; SYNC_COMMITTEE_SIZE / 8], Lsb0>;

/// The aggregate BLS signature from the sync committee.
/// Contains a bitvector indicating which of the 512 members signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAggregate {
    /// Bit `i` is set when committee member `i` signed.
    #[serde(with = "committee_bits_hex")]
    pub sync_committee_bits: SyncCommitteeBits,
    /// The aggregated BLS signature from all participating members.
    pub sync_committee_signature: BlsSignature,
}

impl SyncAggregate {
    pub fn bits_from_bytes(bytes: &[u8]) -> Result<SyncCommitteeBits, &'static str> {
        let raw: [u8; SYNC_COMMITTEE_SIZE / 8] = bytes
            .try_into()
            .map_err(|_| "Sync committee bits must be 64 bytes")?;
        Ok(BitArray::new(raw))
    }

    /// Count how many sync committee members participated (set bits).
    pub fn num_participants(&self) -> usize {
        self.sync_committee_bits.count_ones()
    }

    /// Check if a specific committee member (by index) participated.
    pub fn has_participant(&self, index: usize) -> bool {
        self.sync_committee_bits
            .get(index)
            .map(|bit| *bit)
            .unwrap_or(false)
    }

    /// Get the indices of all participating committee members.
    pub fn participant_indices(&self) -> Vec<usize> {
        self.sync_committee_bits.iter_ones().collect()
    }
}

mod committee_bits_hex {
    use super::{SyncAggregate, SyncCommitteeBits};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bits: &SyncCommitteeBits, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bits.as_raw_slice())))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SyncCommitteeBits, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)?;
        SyncAggregate::bits_from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Execution payload header: the link between beacon and execution layers.
/// Capella layout; the two blob-gas fields exist from Deneb on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPayloadHeader {
    pub parent_hash: [u8; 32],
    pub fee_recipient: [u8; 20],
    pub state_root: [u8; 32],
    pub receipts_root: [u8; 32],
    /// 256-byte logs bloom.
    pub logs_bloom: Vec<u8>,
    pub prev_randao: [u8; 32],
    pub block_number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    /// At most 32 bytes.
    pub extra_data: Vec<u8>,
    /// uint256, little-endian as SSZ stores it.
    pub base_fee_per_gas: [u8; 32],
    /// Hash of the execution block.
    pub block_hash: [u8; 32],
    pub transactions_root: [u8; 32],
    pub withdrawals_root: [u8; 32],
    pub blob_gas_used: Option<u64>,
    pub excess_blob_gas: Option<u64>,
}

/// A light client header: the beacon header plus, from Capella on, the
/// execution payload header and its inclusion branch into the block body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightClientHeader {
    pub beacon: BeaconBlockHeader,
    pub execution: Option<ExecutionPayloadHeader>,
    pub execution_branch: Vec<[u8; 32]>,
}

impl From<BeaconBlockHeader> for LightClientHeader {
    fn from(beacon: BeaconBlockHeader) -> Self {
        Self {
            beacon,
            execution: None,
            execution_branch: vec![],
        }
    }
}

/// A light client update from the beacon chain.
/// This is what provers hand us to move from one sync committee to the next.
/// Every field must be cryptographically verified before accepting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightClientUpdate {
    /// The header that the sync committee is attesting to.
    pub attested_header: BeaconBlockHeader,
    /// The next sync committee (present on committee transitions).
    pub next_sync_committee: Option<SyncCommittee>,
    /// Merkle branch proving next_sync_committee against the attested state.
    pub next_sync_committee_branch: Vec<[u8; 32]>,
    /// The latest finalized header that this update references (zero if none).
    pub finalized_header: BeaconBlockHeader,
    /// Merkle branch proving finalized_header against the attested state.
    pub finality_branch: Vec<[u8; 32]>,
    /// The aggregate signature from the sync committee.
    pub sync_aggregate: SyncAggregate,
    /// The slot at which the signature was produced.
    pub signature_slot: u64,
}

impl LightClientUpdate {
    /// The period this update was signed in, derived from the attested header.
    pub fn period(&self) -> u64 {
        self.attested_header.period()
    }
}

/// A signed attestation of the chain head without a committee transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimisticUpdate {
    pub attested_header: LightClientHeader,
    pub sync_aggregate: SyncAggregate,
    pub signature_slot: u64,
}
