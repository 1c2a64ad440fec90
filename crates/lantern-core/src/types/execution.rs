use serde::{Deserialize, Serialize};

/// Verified execution-chain metadata handed to subscribers.
/// Only built once the block body behind a signed header has been matched
/// against the header's committed body root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionInfo {
    pub block_hash: [u8; 32],
    pub block_number: u64,
}

impl ExecutionInfo {
    /// Block hash as a 0x-prefixed hex string.
    pub fn block_hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.block_hash))
    }
}

/// A validator withdrawal as carried in the execution payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub index: u64,
    pub validator_index: u64,
    pub address: [u8; 20],
    /// Amount in Gwei.
    pub amount: u64,
}

/// A full execution payload as served by the beacon block endpoint.
/// Only the parts needed to re-derive the payload header root are kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPayload {
    pub parent_hash: [u8; 32],
    pub fee_recipient: [u8; 20],
    pub state_root: [u8; 32],
    pub receipts_root: [u8; 32],
    pub logs_bloom: Vec<u8>,
    pub prev_randao: [u8; 32],
    pub block_number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Vec<u8>,
    pub base_fee_per_gas: [u8; 32],
    pub block_hash: [u8; 32],
    /// Opaque RLP-encoded transactions.
    pub transactions: Vec<Vec<u8>>,
    pub withdrawals: Vec<Withdrawal>,
    pub blob_gas_used: Option<u64>,
    pub excess_blob_gas: Option<u64>,
}
