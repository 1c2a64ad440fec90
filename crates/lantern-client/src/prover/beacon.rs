//! Beacon node REST API as a data source.
//!
//! A beacon node is just another untrusted prover: its committee updates go
//! through the same verification as any other, and the blocks it serves are
//! re-hashed against the body root of an already verified header.

use super::{batch_len, evict_below, LightProver, ProverError};
use crate::beacon_api::{
    hex_to_bytes32, ApiLightClientUpdate, ApiOptimisticUpdate, ApiSignedBlock, ApiVersioned,
};
use crate::execution::{ExecutionResolver, OptimisticUpdateSource};
use crate::network::{join_url, HttpClient};
use async_trait::async_trait;
use lantern_core::config::{EXECUTION_PAYLOAD_DEPTH, EXECUTION_PAYLOAD_GINDEX};
use lantern_core::consensus::sync_committee::verify_merkle_branch;
use lantern_core::ssz::{hash_execution_payload_header, payload_to_header};
use lantern_core::types::beacon::{LightClientHeader, LightClientUpdate, OptimisticUpdate};
use lantern_core::types::execution::{ExecutionInfo, ExecutionPayload};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

pub struct BeaconApiClient {
    base_url: String,
    http: HttpClient,
    cached_updates: Mutex<HashMap<u64, LightClientUpdate>>,
}

impl BeaconApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(base_url, HttpClient::default())
    }

    pub fn with_http(base_url: impl Into<String>, http: HttpClient) -> Self {
        Self {
            base_url: base_url.into(),
            http,
            cached_updates: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_updates(
        &self,
        start_period: u64,
        count: u64,
    ) -> Result<Vec<LightClientUpdate>, ProverError> {
        let url = join_url(
            &self.base_url,
            &format!(
                "/eth/v1/beacon/light_client/updates?start_period={}&count={}",
                start_period, count
            ),
        );
        let resp: Vec<ApiVersioned<ApiLightClientUpdate>> = self.http.fetch_json(&url).await?;
        resp.iter()
            .map(|u| u.data.to_core().map_err(ProverError::Decode))
            .collect()
    }

    async fn fetch_block(&self, slot: u64) -> Result<ApiSignedBlock, ProverError> {
        let url = join_url(&self.base_url, &format!("/eth/v2/beacon/blocks/{}", slot));
        let resp: ApiVersioned<ApiSignedBlock> = self.http.fetch_json(&url).await?;
        Ok(resp.data)
    }
}

#[async_trait]
impl LightProver for BeaconApiClient {
    async fn get_sync_update(
        &self,
        period: u64,
        current_period: u64,
        cache_count: u64,
    ) -> Result<LightClientUpdate, ProverError> {
        let mut cache = self.cached_updates.lock().await;
        evict_below(&mut cache, period);
        if !cache.contains_key(&period) {
            let count = batch_len(period, current_period, cache_count);
            debug!(period, count, url = %self.base_url, "fetching committee updates");
            let updates = self.fetch_updates(period, count).await?;
            for (i, update) in updates.into_iter().enumerate() {
                cache.insert(period + i as u64, update);
            }
        }
        cache
            .get(&period)
            .cloned()
            .ok_or_else(|| ProverError::NotFound(format!("committee update for period {}", period)))
    }
}

#[async_trait]
impl OptimisticUpdateSource for BeaconApiClient {
    async fn latest_optimistic_update(&self) -> Result<OptimisticUpdate, ProverError> {
        let url = join_url(&self.base_url, "/eth/v1/beacon/light_client/optimistic_update");
        let resp: ApiVersioned<ApiOptimisticUpdate> = self.http.fetch_json(&url).await?;
        resp.data.to_core().map_err(ProverError::Decode)
    }
}

#[async_trait]
impl ExecutionResolver for BeaconApiClient {
    async fn resolve(&self, header: &LightClientHeader) -> Result<ExecutionInfo, ProverError> {
        let block = self.fetch_block(header.beacon.slot).await?;
        let message = &block.message;

        let slot: u64 = message
            .slot
            .parse()
            .map_err(|e| ProverError::Decode(format!("block slot: {}", e)))?;
        let parent_root = hex_to_bytes32(&message.parent_root).map_err(ProverError::Decode)?;
        let state_root = hex_to_bytes32(&message.state_root).map_err(ProverError::Decode)?;
        if slot != header.beacon.slot
            || parent_root != header.beacon.parent_root
            || state_root != header.beacon.state_root
        {
            return Err(ProverError::IntegrityMismatch(format!(
                "block served for slot {} is not the attested block",
                header.beacon.slot
            )));
        }

        let payload = message
            .body
            .execution_payload
            .to_core()
            .map_err(ProverError::Decode)?;
        check_payload_against_header(header, &payload)
    }
}

/// Re-derive the payload header root from the full payload and prove it into
/// the header's body root.
pub(crate) fn check_payload_against_header(
    header: &LightClientHeader,
    payload: &ExecutionPayload,
) -> Result<ExecutionInfo, ProverError> {
    let payload_root = hash_execution_payload_header(&payload_to_header(payload)?)?;
    if !verify_merkle_branch(
        &payload_root,
        &header.execution_branch,
        EXECUTION_PAYLOAD_DEPTH,
        EXECUTION_PAYLOAD_GINDEX,
        &header.beacon.body_root,
    ) {
        return Err(ProverError::IntegrityMismatch(format!(
            "execution payload of block {} does not match body root 0x{}",
            payload.block_number,
            hex::encode(header.beacon.body_root)
        )));
    }

    if let Some(execution) = &header.execution {
        if execution.block_hash != payload.block_hash {
            return Err(ProverError::IntegrityMismatch(format!(
                "block hash 0x{} differs from the attested execution header",
                hex::encode(payload.block_hash)
            )));
        }
    }

    Ok(ExecutionInfo {
        block_hash: payload.block_hash,
        block_number: payload.block_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_core::test_utils::*;

    #[test]
    fn test_payload_matching_body_root_resolves() {
        let chain = test_chain();
        let keys = CommitteeKeys::generate(1, 0);
        let payload = sample_execution_payload(77);
        let update = sign_optimistic_update(&chain, &keys, 100, sample_execution_header(77));

        let info = check_payload_against_header(&update.attested_header, &payload).unwrap();
        assert_eq!(info.block_number, 77);
        assert_eq!(info.block_hash, payload.block_hash);
    }

    #[test]
    fn test_tampered_transactions_are_an_integrity_error() {
        let chain = test_chain();
        let keys = CommitteeKeys::generate(1, 0);
        let mut payload = sample_execution_payload(77);
        let update = sign_optimistic_update(&chain, &keys, 100, sample_execution_header(77));

        payload.transactions.push(vec![0xde, 0xad]);
        let err = check_payload_against_header(&update.attested_header, &payload).unwrap_err();
        assert!(matches!(err, ProverError::IntegrityMismatch(_)));
    }

    #[test]
    fn test_payload_for_another_block_is_rejected() {
        let chain = test_chain();
        let keys = CommitteeKeys::generate(1, 0);
        let update = sign_optimistic_update(&chain, &keys, 100, sample_execution_header(77));

        let other = sample_execution_payload(78);
        assert!(check_payload_against_header(&update.attested_header, &other).is_err());
    }

    #[tokio::test]
    async fn test_update_cache_drops_passed_periods() {
        use crate::prover::test_server::serve;

        let chain = test_chain();
        let keys: Vec<CommitteeKeys> = (0..4).map(|p| CommitteeKeys::generate(3, p)).collect();
        let updates: Vec<LightClientUpdate> = (0..3)
            .map(|p| sign_update(&chain, &keys[p], p as u64, &keys[p + 1], 512))
            .collect();
        let body = |batch: &[LightClientUpdate]| -> Vec<u8> {
            let wire: Vec<ApiVersioned<ApiLightClientUpdate>> = batch
                .iter()
                .map(|u| ApiVersioned {
                    version: Some("deneb".into()),
                    data: ApiLightClientUpdate::from_core(u).unwrap(),
                })
                .collect();
            serde_json::to_vec(&wire).unwrap()
        };
        let server = serve(HashMap::from([
            (
                "/eth/v1/beacon/light_client/updates?start_period=0&count=2".to_string(),
                body(&updates[..2]),
            ),
            (
                "/eth/v1/beacon/light_client/updates?start_period=2&count=1".to_string(),
                body(&updates[2..]),
            ),
        ]))
        .await;
        let client = BeaconApiClient::with_http(server.base_url.clone(), HttpClient::loopback());

        assert_eq!(client.get_sync_update(0, 2, 2).await.unwrap(), updates[0]);
        assert_eq!(client.get_sync_update(1, 2, 2).await.unwrap(), updates[1]);
        assert_eq!(client.cached_updates.lock().await.len(), 1);

        assert_eq!(client.get_sync_update(2, 2, 2).await.unwrap(), updates[2]);
        assert_eq!(
            client.cached_updates.lock().await.keys().copied().collect::<Vec<_>>(),
            vec![2]
        );
        assert_eq!(server.requests().await.len(), 2);
    }
}
