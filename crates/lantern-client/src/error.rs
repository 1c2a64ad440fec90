use crate::config::ConfigError;
use crate::prover::ProverError;
use lantern_core::{MerkleError, VerificationError};
use thiserror::Error;

/// Errors surfaced by sync strategies and the polling client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Every light prover stopped before reaching the current period.
    #[error("no honest prover found")]
    NoHonestProver,

    /// The tournament ran out of winners.
    #[error("none of the provers responded honestly")]
    ProversDishonest,

    /// Every surviving MMR winner failed the final leaf proof.
    #[error("all winners cheated")]
    AllWinnersCheated,

    /// Two conflicting claims both verified. The threshold makes this
    /// impossible for honest data, so the run is aborted.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("sync strategy returned no prover")]
    EmptyProverInfos,

    #[error("client has not synced a committee yet")]
    NotSynced,

    #[error("optimistic update rejected: {0}")]
    InvalidOptimisticUpdate(#[source] VerificationError),

    #[error("no valid execution payload found")]
    NoValidExecution,

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Prover(#[from] ProverError),

    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion_messages() {
        assert_eq!(ClientError::NoHonestProver.to_string(), "no honest prover found");
        assert_eq!(
            ClientError::ProversDishonest.to_string(),
            "none of the provers responded honestly"
        );
        assert_eq!(
            ClientError::NoValidExecution.to_string(),
            "no valid execution payload found"
        );
    }

    #[test]
    fn test_optimistic_rejection_keeps_reason() {
        let err = ClientError::InvalidOptimisticUpdate(VerificationError::InsufficientParticipation {
            participants: 12,
            required: 342,
        });
        assert!(err.to_string().contains("insufficient signatures"));
    }
}
