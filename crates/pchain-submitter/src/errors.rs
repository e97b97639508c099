//! Errors raised while talking to the platform chain.

use std::time::Duration;

use stakeflow_primitives::ids::PlatformTxId;
use thiserror::Error;

/// Errors reported by a [`PlatformChainClient`](crate::PlatformChainClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// The transaction or its message is malformed.
    #[error("malformed transaction: {0}")]
    Malformed(String),

    /// The message was already applied by an earlier transaction.
    #[error("message already applied: {0}")]
    AlreadyApplied(String),

    /// The platform chain refused the transaction for another reason.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The platform-chain node could not be reached.
    #[error("transport: {0}")]
    Transport(String),

    /// A response could not be decoded.
    #[error("decode: {0}")]
    Decode(String),
}

/// Errors returned by [`PlatformSubmitter`](crate::PlatformSubmitter).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The signed message does not fit the operation; nothing was submitted.
    #[error("message does not fit the operation: {0}")]
    Malformed(String),

    /// The platform chain refused or could not process a request.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// The transaction was dropped after being issued. It can be issued again.
    #[error("transaction {tx_id} dropped: {reason}")]
    Dropped {
        /// Dropped transaction.
        tx_id: PlatformTxId,

        /// Reason given by the platform chain.
        reason: String,
    },

    /// The transaction was not committed within the budget. It may still be.
    #[error("transaction {tx_id} not committed after {waited:?}")]
    Timeout {
        /// Issued transaction.
        tx_id: PlatformTxId,

        /// Budget that elapsed.
        waited: Duration,
    },
}
