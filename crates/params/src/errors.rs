//! Errors for the staking parameters.

use thiserror::Error;

/// Error while validating a [`QuorumPolicy`](crate::quorum::QuorumPolicy).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    /// The policy lists no quorum.
    #[error("quorum policy must list at least one quorum")]
    EmptyQuorumPolicy,

    /// A quorum is outside `1..=100`.
    #[error("quorum {0} is outside 1..=100")]
    QuorumOutOfRange(u8),

    /// The quorums are not strictly descending.
    #[error("quorums must be strictly descending, got {prev} then {next}")]
    QuorumNotDescending {
        /// The earlier quorum.
        prev: u8,

        /// The quorum that follows it.
        next: u8,
    },
}
