//! Errors raised while signing warp messages.

use stakeflow_primitives::{ids::ValidationId, warp::WarpCodecError};
use thiserror::Error;

/// Errors returned by a [`SignatureAggregator`](crate::SignatureAggregator).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregatorError {
    /// Validators holding less than the requested share of stake signed.
    ///
    /// This is the only error that makes the signer retry with a lower quorum.
    #[error("insufficient quorum at {quorum}%: {reason}")]
    InsufficientQuorum {
        /// Requested quorum percentage.
        quorum: u8,

        /// Detail reported by the aggregator.
        reason: String,
    },

    /// The aggregator refused the request, e.g. because the message is malformed.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The aggregator could not be reached.
    #[error("transport: {0}")]
    Transport(String),

    /// The response could not be decoded.
    #[error("decode: {0}")]
    Decode(String),
}

impl From<WarpCodecError> for AggregatorError {
    fn from(value: WarpCodecError) -> Self {
        Self::Decode(value.to_string())
    }
}

/// Errors returned by [`WarpSigner::sign`](crate::WarpSigner::sign).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignError {
    /// Every quorum of the policy was tried and none was reached.
    #[error("no quorum reached, tried {attempted:?}")]
    QuorumExhausted {
        /// Quorums tried, in order.
        attempted: Vec<u8>,
    },

    /// The aggregator failed for a reason other than an insufficient quorum.
    #[error("aggregation at {quorum}% failed: {source}")]
    Aggregator {
        /// Quorum of the failed attempt.
        quorum: u8,

        /// Quorums tried, in order, including the failed one.
        attempted: Vec<u8>,

        /// Underlying error.
        #[source]
        source: AggregatorError,
    },

    /// The aggregator returned a signature over a different message.
    #[error("aggregator signed a different message")]
    Malformed,
}

impl SignError {
    /// The quorums tried before giving up.
    pub fn attempted_quorums(&self) -> &[u8] {
        match self {
            Self::QuorumExhausted { attempted } | Self::Aggregator { attempted, .. } => attempted,
            Self::Malformed => &[],
        }
    }
}

/// Errors raised while building an uptime proof.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UptimeError {
    /// The uptime could not be fetched.
    #[error("uptime source: {0}")]
    Source(String),

    /// The validator's node does not report this validation.
    #[error("validator {0} not found")]
    UnknownValidator(ValidationId),

    /// The uptime message could not be signed.
    #[error(transparent)]
    Sign(#[from] SignError),
}
