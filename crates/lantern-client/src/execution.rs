//! Sources of chain-head attestations and resolution of a verified beacon
//! header into execution metadata.

use crate::prover::ProverError;
use async_trait::async_trait;
use lantern_core::types::beacon::{LightClientHeader, OptimisticUpdate};
use lantern_core::types::execution::ExecutionInfo;

/// Supplies the latest signed chain head. The update is unverified.
#[async_trait]
pub trait OptimisticUpdateSource: Send + Sync {
    async fn latest_optimistic_update(&self) -> Result<OptimisticUpdate, ProverError>;
}

/// Turns a header whose signature already verified into `{block_hash, block_number}`.
#[async_trait]
pub trait ExecutionResolver: Send + Sync {
    async fn resolve(&self, header: &LightClientHeader) -> Result<ExecutionInfo, ProverError>;
}

/// Reads the execution header carried by the update itself. Its inclusion in
/// the block body is checked together with the update signature, so no
/// second fetch is needed.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeaderExecutionResolver;

#[async_trait]
impl ExecutionResolver for HeaderExecutionResolver {
    async fn resolve(&self, header: &LightClientHeader) -> Result<ExecutionInfo, ProverError> {
        let execution = header.execution.as_ref().ok_or_else(|| {
            ProverError::NotFound(format!("execution header at slot {}", header.beacon.slot))
        })?;
        Ok(ExecutionInfo {
            block_hash: execution.block_hash,
            block_number: execution.block_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_core::test_utils::sample_execution_header;
    use lantern_core::types::beacon::BeaconBlockHeader;

    #[tokio::test]
    async fn test_header_resolver_reads_execution_header() {
        let execution = sample_execution_header(1234);
        let header = LightClientHeader {
            beacon: BeaconBlockHeader::default(),
            execution: Some(execution.clone()),
            execution_branch: vec![],
        };
        let info = HeaderExecutionResolver.resolve(&header).await.unwrap();
        assert_eq!(info.block_number, 1234);
        assert_eq!(info.block_hash, execution.block_hash);
    }

    #[tokio::test]
    async fn test_header_resolver_requires_execution_header() {
        let header = LightClientHeader::from(BeaconBlockHeader::default());
        let err = HeaderExecutionResolver.resolve(&header).await.unwrap_err();
        assert!(matches!(err, ProverError::NotFound(_)));
    }
}
