use super::{batch_len, evict_below, OptimisticProver, PeriodOrLatest, ProverError};
use crate::network::{join_url, HttpClient};
use async_trait::async_trait;
use lantern_core::merkle::Hash;
use lantern_core::ssz::{decode_committee, decode_hashes, decode_light_client_update};
use lantern_core::types::beacon::{BlsPublicKey, LightClientUpdate};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Client for a committee-hash prover.
///
/// Committees, hash lists and updates all travel as raw SSZ. Hashes are
/// fetched in batches and cached per period until the walk moves past them.
pub struct HttpOptimisticProver {
    base_url: String,
    http: HttpClient,
    cached_hashes: Mutex<HashMap<u64, Hash>>,
}

impl HttpOptimisticProver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(base_url, HttpClient::default())
    }

    pub fn with_http(base_url: impl Into<String>, http: HttpClient) -> Self {
        Self {
            base_url: base_url.into(),
            http,
            cached_hashes: Mutex::new(HashMap::new()),
        }
    }

    async fn fetch_hashes(&self, start_period: u64, count: u64) -> Result<Vec<Hash>, ProverError> {
        let url = join_url(&self.base_url, &hashes_path(start_period, count));
        let bytes = self.http.fetch_bytes(&url).await?;
        Ok(decode_hashes(&bytes)?)
    }
}

fn hashes_path(start_period: u64, count: u64) -> String {
    format!(
        "/sync-committee/hashes?startPeriod={}&maxCount={}",
        start_period, count
    )
}

#[async_trait]
impl OptimisticProver for HttpOptimisticProver {
    async fn get_committee(&self, period: PeriodOrLatest) -> Result<Vec<BlsPublicKey>, ProverError> {
        let url = join_url(&self.base_url, &format!("/sync-committee/{}", period));
        let bytes = self.http.fetch_bytes(&url).await?;
        Ok(decode_committee(&bytes)?)
    }

    async fn get_committee_hash(
        &self,
        period: u64,
        current_period: u64,
        cache_count: u64,
    ) -> Result<Hash, ProverError> {
        let mut cache = self.cached_hashes.lock().await;
        evict_below(&mut cache, period);
        if !cache.contains_key(&period) {
            let count = batch_len(period, current_period, cache_count);
            debug!(period, count, url = %self.base_url, "fetching committee hashes");
            let hashes = self.fetch_hashes(period, count).await?;
            for (i, hash) in hashes.into_iter().enumerate() {
                cache.insert(period + i as u64, hash);
            }
        }
        cache
            .get(&period)
            .copied()
            .ok_or_else(|| ProverError::NotFound(format!("committee hash for period {}", period)))
    }

    async fn get_sync_update(&self, period: u64) -> Result<LightClientUpdate, ProverError> {
        let url = join_url(&self.base_url, &format!("/sync-update/{}", period));
        let bytes = self.http.fetch_bytes(&url).await?;
        Ok(decode_light_client_update(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prover::test_server::serve;
    use lantern_core::ssz::encode_light_client_update;
    use lantern_core::test_utils::{sign_update, test_chain, CommitteeKeys};
    use std::collections::HashMap;

    #[test]
    fn test_hashes_path_uses_camel_case_query() {
        assert_eq!(
            hashes_path(12, 200),
            "/sync-committee/hashes?startPeriod=12&maxCount=200"
        );
    }

    #[tokio::test]
    async fn test_unreachable_prover_is_a_network_error() {
        let prover = HttpOptimisticProver::with_http(
            "http://127.0.0.1:9",
            HttpClient::new(std::time::Duration::from_millis(200)),
        );
        let err = prover.get_committee_hash(1, 5, 10).await.unwrap_err();
        assert!(matches!(err, ProverError::Network(_)));
    }

    #[tokio::test]
    async fn test_sync_update_is_decoded_from_ssz() {
        let update = sign_update(
            &test_chain(),
            &CommitteeKeys::generate(2, 6),
            6,
            &CommitteeKeys::generate(2, 7),
            480,
        );
        let body = encode_light_client_update(&update).unwrap();
        let server = serve(HashMap::from([("/sync-update/6".to_string(), body)])).await;

        let prover = HttpOptimisticProver::with_http(server.base_url.clone(), HttpClient::loopback());
        assert_eq!(prover.get_sync_update(6).await.unwrap(), update);

        let err = prover.get_sync_update(7).await.unwrap_err();
        assert!(matches!(err, ProverError::Network(_)));
    }

    #[tokio::test]
    async fn test_truncated_update_is_an_ssz_error() {
        let update = sign_update(
            &test_chain(),
            &CommitteeKeys::generate(2, 1),
            1,
            &CommitteeKeys::generate(2, 2),
            512,
        );
        let mut body = encode_light_client_update(&update).unwrap();
        body.truncate(body.len() - 8);
        let server = serve(HashMap::from([("/sync-update/1".to_string(), body)])).await;

        let prover = HttpOptimisticProver::with_http(server.base_url.clone(), HttpClient::loopback());
        let err = prover.get_sync_update(1).await.unwrap_err();
        assert!(matches!(err, ProverError::Ssz(_)));
    }

    #[tokio::test]
    async fn test_hash_cache_drops_passed_periods() {
        let batch = |start: u8, count: u8| -> Vec<u8> {
            (start..start + count).flat_map(|p| [p; 32]).collect()
        };
        let server = serve(HashMap::from([
            (hashes_path(1, 3), batch(1, 3)),
            (hashes_path(4, 3), batch(4, 3)),
        ]))
        .await;
        let prover = HttpOptimisticProver::with_http(server.base_url.clone(), HttpClient::loopback());

        assert_eq!(prover.get_committee_hash(1, 6, 3).await.unwrap(), [1; 32]);
        assert_eq!(prover.get_committee_hash(3, 6, 3).await.unwrap(), [3; 32]);
        assert_eq!(server.requests().await.len(), 1);
        {
            let cache = prover.cached_hashes.lock().await;
            assert!(cache.keys().all(|p| *p >= 3));
        }

        assert_eq!(prover.get_committee_hash(4, 6, 3).await.unwrap(), [4; 32]);
        let cache = prover.cached_hashes.lock().await;
        let mut periods: Vec<u64> = cache.keys().copied().collect();
        periods.sort();
        assert_eq!(periods, vec![4, 5, 6]);
        drop(cache);
        assert_eq!(server.requests().await, vec![hashes_path(1, 3), hashes_path(4, 3)]);
    }
}
