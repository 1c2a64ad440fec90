use super::{
    evict_below, LeafWithProof, MmrInfo, PeriodOrLatest, ProverError, SuperlightProver, TreeNode,
};
use crate::beacon_api::{
    bytes_to_hex, hex_to_bytes32, hex_to_pubkey, ApiLeafWithProof, ApiLightClientUpdate,
    ApiMmrInfo, ApiTreeNode, ApiVersioned,
};
use crate::network::{join_url, HttpClient};
use async_trait::async_trait;
use lantern_core::merkle::Hash;
use lantern_core::types::beacon::LightClientUpdate;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Client for an MMR prover: JSON over HTTP.
pub struct HttpSuperlightProver {
    base_url: String,
    http: HttpClient,
    cached_updates: Mutex<HashMap<u64, LightClientUpdate>>,
}

impl HttpSuperlightProver {
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

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

fn decode(field: &str, err: String) -> ProverError {
    ProverError::Decode(format!("{}: {}", field, err))
}

pub(crate) fn leaf_from_api(api: &ApiLeafWithProof) -> Result<LeafWithProof, ProverError> {
    let sync_committee = api
        .sync_committee
        .iter()
        .map(|pk| hex_to_pubkey(pk))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| decode("syncCommittee", e))?;
    let proof = api
        .proof
        .iter()
        .map(|step| step.iter().map(|h| hex_to_bytes32(h)).collect())
        .collect::<Result<Vec<Vec<Hash>>, _>>()
        .map_err(|e| decode("proof", e))?;
    Ok(LeafWithProof {
        sync_committee,
        root_hash: hex_to_bytes32(&api.root_hash).map_err(|e| decode("rootHash", e))?,
        proof,
    })
}

pub(crate) fn node_from_api(api: &ApiTreeNode) -> Result<TreeNode, ProverError> {
    let children = api
        .children
        .as_ref()
        .map(|c| c.iter().map(|h| hex_to_bytes32(h)).collect::<Result<Vec<_>, _>>())
        .transpose()
        .map_err(|e| decode("children", e))?;
    Ok(TreeNode {
        is_leaf: api.is_leaf,
        children,
    })
}

#[async_trait]
impl SuperlightProver for HttpSuperlightProver {
    async fn get_leaf_with_proof(&self, period: PeriodOrLatest) -> Result<LeafWithProof, ProverError> {
        let api: ApiLeafWithProof = self.http.fetch_json(&self.url(&format!("/leaf/{}", period))).await?;
        leaf_from_api(&api)
    }

    async fn get_mmr_info(&self) -> Result<MmrInfo, ProverError> {
        let api: ApiMmrInfo = self.http.fetch_json(&self.url("/mmr")).await?;
        let (root_hash, peaks) = api.to_core().map_err(|e| decode("mmr", e))?;
        Ok(MmrInfo { root_hash, peaks })
    }

    async fn get_node(&self, tree_root: &Hash, node_hash: &Hash) -> Result<TreeNode, ProverError> {
        let path = format!(
            "/tree/{}/node/{}",
            bytes_to_hex(tree_root),
            bytes_to_hex(node_hash)
        );
        let api: ApiTreeNode = self.http.fetch_json(&self.url(&path)).await?;
        node_from_api(&api)
    }

    async fn get_sync_update(&self, period: u64, cache_count: u64) -> Result<LightClientUpdate, ProverError> {
        let mut cache = self.cached_updates.lock().await;
        evict_below(&mut cache, period);
        if !cache.contains_key(&period) {
            let count = cache_count.max(1);
            debug!(period, count, url = %self.base_url, "fetching committee updates");
            let path = format!("/sync-updates?startPeriod={}&maxCount={}", period, count);
            let resp: Vec<ApiVersioned<ApiLightClientUpdate>> =
                self.http.fetch_json(&self.url(&path)).await?;
            for (i, update) in resp.iter().enumerate() {
                let update = update.data.to_core().map_err(ProverError::Decode)?;
                cache.insert(period + i as u64, update);
            }
        }
        cache
            .get(&period)
            .cloned()
            .ok_or_else(|| ProverError::NotFound(format!("committee update for period {}", period)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_with_proof_json() {
        let pk = format!("0x{}", "a1".repeat(48));
        let json = serde_json::json!({
            "syncCommittee": vec![pk; 512],
            "rootHash": format!("0x{}", "01".repeat(32)),
            "proof": [[format!("0x{}", "02".repeat(32))], [format!("0x{}", "03".repeat(32))]]
        });
        let api: ApiLeafWithProof = serde_json::from_value(json).unwrap();
        let leaf = leaf_from_api(&api).unwrap();
        assert_eq!(leaf.sync_committee.len(), 512);
        assert_eq!(leaf.proof.len(), 2);
        assert_eq!(leaf.proof[1][0], [0x03; 32]);
    }

    #[test]
    fn test_leaf_node_has_no_children() {
        let api: ApiTreeNode = serde_json::from_value(serde_json::json!({ "isLeaf": true })).unwrap();
        let node = node_from_api(&api).unwrap();
        assert!(node.is_leaf);
        assert!(node.children.is_none());
    }

    #[test]
    fn test_bad_child_hash_is_a_decode_error() {
        let api: ApiTreeNode = serde_json::from_value(serde_json::json!({
            "isLeaf": false,
            "children": ["0x1234"]
        }))
        .unwrap();
        assert!(matches!(node_from_api(&api), Err(ProverError::Decode(_))));
    }

    #[tokio::test]
    async fn test_update_cache_drops_passed_periods() {
        use crate::prover::test_server::serve;
        use lantern_core::test_utils::{sign_update, test_chain, CommitteeKeys};

        let chain = test_chain();
        let keys: Vec<CommitteeKeys> = (0..3).map(|p| CommitteeKeys::generate(4, p)).collect();
        let updates: Vec<LightClientUpdate> = (0..2)
            .map(|p| sign_update(&chain, &keys[p], p as u64, &keys[p + 1], 512))
            .collect();
        let wire: Vec<ApiVersioned<ApiLightClientUpdate>> = updates
            .iter()
            .map(|u| ApiVersioned {
                version: None,
                data: ApiLightClientUpdate::from_core(u).unwrap(),
            })
            .collect();
        let server = serve(HashMap::from([(
            "/sync-updates?startPeriod=0&maxCount=2".to_string(),
            serde_json::to_vec(&wire).unwrap(),
        )]))
        .await;
        let prover = HttpSuperlightProver::with_http(server.base_url.clone(), HttpClient::loopback());

        assert_eq!(prover.get_sync_update(0, 2).await.unwrap(), updates[0]);
        assert_eq!(prover.get_sync_update(1, 2).await.unwrap(), updates[1]);
        assert_eq!(
            prover.cached_updates.lock().await.keys().copied().collect::<Vec<_>>(),
            vec![1]
        );
        assert_eq!(server.requests().await.len(), 1);
    }
}
