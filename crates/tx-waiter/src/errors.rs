//! Errors raised while waiting for a transaction.

use std::time::Duration;

use stakeflow_primitives::TxHash;
use staking_manager::GatewayError;
use thiserror::Error;

/// Errors returned by [`TxWaiter`](crate::TxWaiter).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// No receipt appeared within the budget. The transaction may still be mined.
    #[error("transaction {tx_hash} not confirmed after {waited:?}")]
    Timeout {
        /// Transaction that was waited on.
        tx_hash: TxHash,

        /// Budget that elapsed.
        waited: Duration,
    },

    /// The receipt lookup failed.
    #[error("could not fetch receipt of {tx_hash}: {source}")]
    Chain {
        /// Transaction that was waited on.
        tx_hash: TxHash,

        /// Underlying error.
        #[source]
        source: GatewayError,
    },
}

impl WaitError {
    /// The transaction the error refers to.
    pub const fn tx_hash(&self) -> TxHash {
        match self {
            Self::Timeout { tx_hash, .. } | Self::Chain { tx_hash, .. } => *tx_hash,
        }
    }
}
