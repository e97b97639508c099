//! Errors surfaced by the staking-manager gateway.

use alloy::primitives::Bytes;
use thiserror::Error;

/// Errors returned by [`StakingManager`](crate::StakingManager) calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The wallet refused to sign the transaction.
    #[error("transaction rejected by the signer")]
    UserRejected,

    /// The contract reverted the call.
    ///
    /// `name` is the contract error whose selector matches `data`, if any.
    #[error("call reverted ({})", name.as_deref().unwrap_or("unrecognized error"))]
    Reverted {
        /// Name of the contract error.
        name: Option<String>,

        /// Raw revert data.
        data: Bytes,
    },

    /// The RPC endpoint could not be reached or returned an error unrelated to the call.
    #[error("transport: {0}")]
    Transport(String),

    /// A response could not be decoded.
    #[error("decode: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Creates a [`GatewayError::Reverted`] for the named contract error.
    pub fn reverted(name: impl Into<String>) -> Self {
        Self::Reverted {
            name: Some(name.into()),
            data: Bytes::new(),
        }
    }

    /// The name of the contract error, if the call reverted with a known one.
    pub fn revert_name(&self) -> Option<&str> {
        match self {
            Self::Reverted { name, .. } => name.as_deref(),
            _ => None,
        }
    }
}

/// Result of a gateway call.
pub type GatewayResult<T> = Result<T, GatewayError>;
