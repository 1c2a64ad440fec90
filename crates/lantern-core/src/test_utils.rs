//! Deterministic BLS fixtures for tests: committees with real keys, signed
//! committee transitions with valid state proofs, and forked chains whose
//! transitions are signed by the wrong committee.
//!
//! Each committee has 8 distinct secret keys repeated across the 512 seats,
//! which keeps signing cheap while exercising the real aggregate path.

use crate::config::{ChainConfig, Fork, ForkName, EXECUTION_PAYLOAD_GINDEX};
use crate::consensus::sync_committee::{compute_signing_root, sync_committee_domain, BLS_DST};
use crate::ssz::{
    hash_beacon_block_header, hash_execution_payload_header, hash_sync_committee,
    payload_to_header, sha256, sha256_pair,
};
use crate::types::beacon::*;
use crate::types::execution::{ExecutionPayload, Withdrawal};
use blst::min_pk::{AggregatePublicKey, AggregateSignature, PublicKey, SecretKey, Signature};
use std::collections::HashMap;

const DISTINCT_KEYS: usize = 8;

/// A chain with every fork up to Deneb active from genesis.
pub fn test_chain() -> ChainConfig {
    let forks = [
        (ForkName::Phase0, [0x10, 0, 0, 0]),
        (ForkName::Altair, [0x11, 0, 0, 0]),
        (ForkName::Bellatrix, [0x12, 0, 0, 0]),
        (ForkName::Capella, [0x13, 0, 0, 0]),
        (ForkName::Deneb, [0x14, 0, 0, 0]),
    ];
    ChainConfig {
        genesis_time: 1_600_000_000,
        genesis_validators_root: [0x42; 32],
        seconds_per_slot: 12,
        forks: forks
            .into_iter()
            .map(|(name, version)| Fork {
                name,
                epoch: 0,
                version,
            })
            .collect(),
    }
}

#[derive(Clone, Debug)]
pub struct CommitteeKeys {
    secret_keys: Vec<SecretKey>,
    pub pubkeys: Vec<BlsPublicKey>,
}

impl CommitteeKeys {
    /// Keys for `(seed, period)`. Different seeds model different key sets
    /// for the same period.
    pub fn generate(seed: u64, period: u64) -> Self {
        let secret_keys: Vec<SecretKey> = (0..DISTINCT_KEYS as u64)
            .map(|i| {
                let ikm = sha256(
                    &[seed.to_le_bytes(), period.to_le_bytes(), i.to_le_bytes()].concat(),
                );
                SecretKey::key_gen(&ikm, &[]).expect("32-byte ikm")
            })
            .collect();
        let distinct: Vec<BlsPublicKey> = secret_keys
            .iter()
            .map(|sk| BlsPublicKey(sk.sk_to_pk().compress()))
            .collect();
        let pubkeys = (0..SYNC_COMMITTEE_SIZE)
            .map(|i| distinct[i % DISTINCT_KEYS])
            .collect();
        Self {
            secret_keys,
            pubkeys,
        }
    }

    /// The SSZ container form, aggregate key included.
    pub fn sync_committee(&self) -> SyncCommittee {
        let distinct: Vec<PublicKey> = self.secret_keys.iter().map(SecretKey::sk_to_pk).collect();
        let seats: Vec<&PublicKey> = (0..SYNC_COMMITTEE_SIZE)
            .map(|i| &distinct[i % DISTINCT_KEYS])
            .collect();
        let aggregate = AggregatePublicKey::aggregate(&seats, false).expect("non-empty committee");
        SyncCommittee {
            pubkeys: self.pubkeys.clone(),
            aggregate_pubkey: BlsPublicKey(aggregate.to_public_key().compress()),
        }
    }

    /// Sign `header` with the first `participants` seats.
    pub fn sign(
        &self,
        chain: &ChainConfig,
        header: &BeaconBlockHeader,
        signature_slot: u64,
        participants: usize,
    ) -> SyncAggregate {
        let domain = sync_committee_domain(chain, signature_slot).expect("fork data root");
        let signing_root = compute_signing_root(header, &domain).expect("header root");
        let signatures: Vec<Signature> = self
            .secret_keys
            .iter()
            .map(|sk| sk.sign(&signing_root, BLS_DST, &[]))
            .collect();

        let mut bits = SyncCommitteeBits::ZERO;
        let mut seats = Vec::new();
        for i in 0..participants.min(SYNC_COMMITTEE_SIZE) {
            bits.set(i, true);
            seats.push(&signatures[i % DISTINCT_KEYS]);
        }

        let signature = if seats.is_empty() {
            BlsSignature([0u8; BLS_SIGNATURE_LEN])
        } else {
            let aggregate = AggregateSignature::aggregate(&seats, false).expect("valid signatures");
            BlsSignature(aggregate.to_signature().compress())
        };

        SyncAggregate {
            sync_committee_bits: bits,
            sync_committee_signature: signature,
        }
    }
}

/// A sparse binary tree addressed by generalized index. Unset nodes at the
/// bottom level get deterministic filler hashes.
pub struct StateTree {
    depth: u32,
    filler: u64,
    nodes: HashMap<u64, [u8; 32]>,
}

impl StateTree {
    pub fn new(depth: usize, filler: u64) -> Self {
        Self {
            depth: depth as u32,
            filler,
            nodes: HashMap::new(),
        }
    }

    pub fn set(&mut self, gindex: u64, value: [u8; 32]) {
        self.nodes.insert(gindex, value);
    }

    fn node(&self, gindex: u64) -> [u8; 32] {
        if let Some(value) = self.nodes.get(&gindex) {
            return *value;
        }
        let level = 63 - gindex.leading_zeros();
        if level >= self.depth {
            sha256(&[self.filler.to_le_bytes(), gindex.to_le_bytes()].concat())
        } else {
            sha256_pair(&self.node(gindex * 2), &self.node(gindex * 2 + 1))
        }
    }

    pub fn root(&self) -> [u8; 32] {
        self.node(1)
    }

    /// Sibling path from `gindex` up to the root, bottom first.
    pub fn branch(&self, gindex: u64) -> Vec<[u8; 32]> {
        let mut branch = Vec::new();
        let mut g = gindex;
        while g > 1 {
            branch.push(self.node(g ^ 1));
            g >>= 1;
        }
        branch
    }
}

/// A committee transition attested in `period`, signed by `signer` and
/// installing `next`, with finality and next-committee proofs that hold.
pub fn sign_update(
    chain: &ChainConfig,
    signer: &CommitteeKeys,
    period: u64,
    next: &CommitteeKeys,
    participants: usize,
) -> LightClientUpdate {
    let attested_slot = period * SLOTS_PER_SYNC_COMMITTEE_PERIOD + 200;
    let fork = chain.fork_at_slot(attested_slot);
    let (finality_gindex, finality_depth) = fork.finalized_root_gindex();
    let (committee_gindex, committee_depth) = fork.next_sync_committee_gindex();

    let finalized_header = BeaconBlockHeader {
        slot: attested_slot - 64,
        proposer_index: 7,
        parent_root: [0x0f; 32],
        state_root: [0x0e; 32],
        body_root: [0x0d; 32],
    };
    let next_sync_committee = next.sync_committee();

    let mut state = StateTree::new(finality_depth.max(committee_depth), period);
    state.set(
        finality_gindex,
        hash_beacon_block_header(&finalized_header).expect("header root"),
    );
    state.set(
        committee_gindex,
        hash_sync_committee(&next_sync_committee).expect("512 members"),
    );

    let attested_header = BeaconBlockHeader {
        slot: attested_slot,
        proposer_index: period,
        parent_root: sha256(&period.to_le_bytes()),
        state_root: state.root(),
        body_root: [0xbb; 32],
    };
    let signature_slot = attested_slot + 1;
    let sync_aggregate = signer.sign(chain, &attested_header, signature_slot, participants);

    LightClientUpdate {
        attested_header,
        next_sync_committee: Some(next_sync_committee),
        next_sync_committee_branch: state.branch(committee_gindex),
        finalized_header,
        finality_branch: state.branch(finality_gindex),
        sync_aggregate,
        signature_slot,
    }
}

/// A payload with a couple of transactions and one withdrawal.
pub fn sample_execution_payload(block_number: u64) -> ExecutionPayload {
    ExecutionPayload {
        parent_hash: sha256(&(block_number - 1).to_le_bytes()),
        fee_recipient: [0xfe; 20],
        state_root: [0x5a; 32],
        receipts_root: [0x5b; 32],
        logs_bloom: vec![0u8; 256],
        prev_randao: [0x5c; 32],
        block_number,
        gas_limit: 30_000_000,
        gas_used: 42_000,
        timestamp: 1_700_000_000 + block_number * 12,
        extra_data: b"lantern".to_vec(),
        base_fee_per_gas: {
            let mut fee = [0u8; 32];
            fee[..8].copy_from_slice(&7_000_000_000u64.to_le_bytes());
            fee
        },
        block_hash: sha256(&block_number.to_le_bytes()),
        transactions: vec![vec![0x02, 0xf8, 0x70, 0x01], vec![0xf8, 0x6c, 0x80]],
        withdrawals: vec![Withdrawal {
            index: 4,
            validator_index: 1234,
            address: [0xaa; 20],
            amount: 17_000,
        }],
        blob_gas_used: Some(0),
        excess_blob_gas: Some(0),
    }
}

pub fn sample_execution_header(block_number: u64) -> ExecutionPayloadHeader {
    payload_to_header(&sample_execution_payload(block_number)).expect("well-formed payload")
}

/// A chain-head attestation at `slot` carrying `execution` with a valid body proof.
pub fn sign_optimistic_update(
    chain: &ChainConfig,
    signer: &CommitteeKeys,
    slot: u64,
    execution: ExecutionPayloadHeader,
) -> OptimisticUpdate {
    let mut body = StateTree::new(4, slot);
    body.set(
        EXECUTION_PAYLOAD_GINDEX,
        hash_execution_payload_header(&execution).expect("well-formed header"),
    );
    let beacon = BeaconBlockHeader {
        slot,
        proposer_index: 3,
        parent_root: [0x01; 32],
        state_root: [0x02; 32],
        body_root: body.root(),
    };
    let signature_slot = slot + 1;
    let sync_aggregate = signer.sign(chain, &beacon, signature_slot, 480);
    OptimisticUpdate {
        attested_header: LightClientHeader {
            beacon,
            execution: Some(execution),
            execution_branch: body.branch(EXECUTION_PAYLOAD_GINDEX),
        },
        sync_aggregate,
        signature_slot,
    }
}

/// Committees for periods `0..=last_period` and the transitions between them.
#[derive(Clone, Debug)]
pub struct CommitteeChain {
    pub committees: Vec<CommitteeKeys>,
    /// `updates[p]` is attested in period `p` and installs committee `p + 1`.
    pub updates: Vec<LightClientUpdate>,
}

impl CommitteeChain {
    pub fn honest(chain: &ChainConfig, last_period: u64) -> Self {
        let committees: Vec<CommitteeKeys> = (0..=last_period)
            .map(|p| CommitteeKeys::generate(1, p))
            .collect();
        let updates = (0..last_period as usize)
            .map(|p| {
                sign_update(
                    chain,
                    &committees[p],
                    p as u64,
                    &committees[p + 1],
                    SYNC_COMMITTEE_SIZE,
                )
            })
            .collect();
        Self {
            committees,
            updates,
        }
    }

    /// Same history before `fork_period`, then committees from key set
    /// `seed`. The forged committee signs its own installation, so the
    /// transition into `fork_period` fails against the real committee.
    pub fn forked(&self, chain: &ChainConfig, fork_period: u64, seed: u64) -> Self {
        assert!(fork_period >= 1, "genesis can't be forked");
        let fork = fork_period as usize;
        let last = self.last_period();

        let mut committees = self.committees[..fork].to_vec();
        committees.extend((fork_period..=last).map(|p| CommitteeKeys::generate(seed, p)));

        let mut updates = self.updates[..fork - 1].to_vec();
        for p in (fork - 1)..last as usize {
            let signer = if p == fork - 1 {
                &committees[fork]
            } else {
                &committees[p]
            };
            updates.push(sign_update(
                chain,
                signer,
                p as u64,
                &committees[p + 1],
                SYNC_COMMITTEE_SIZE,
            ));
        }
        Self {
            committees,
            updates,
        }
    }

    pub fn last_period(&self) -> u64 {
        self.committees.len() as u64 - 1
    }

    pub fn keys(&self, period: u64) -> &CommitteeKeys {
        &self.committees[period as usize]
    }

    pub fn committee(&self, period: u64) -> &[BlsPublicKey] {
        &self.committees[period as usize].pubkeys
    }

    pub fn update(&self, period: u64) -> &LightClientUpdate {
        &self.updates[period as usize]
    }
}
