//! The error-kind taxonomy reported to callers of the staking saga.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of every failure a step can surface.
///
/// Each library crate has its own error type; the orchestrator maps all of them onto one of these
/// kinds so callers can decide what to do next without matching on the underlying errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The wallet refused to sign the transaction.
    UserRejectedSigning,

    /// The staking manager does not know the identifier, or it is malformed.
    InvalidKey,

    /// The minimum stake duration has not elapsed, or the record is in the wrong status.
    DurationOrStatusViolation,

    /// No quorum in the policy produced an aggregate signature.
    SignatureAggregationFailure,

    /// The transaction was not confirmed within the budget. The outcome is unknown.
    TransactionTimeout,

    /// The platform chain, or the staking manager on its behalf, rejected a cross-chain message.
    PlatformChainRejection,

    /// There is nothing to claim.
    NoClaimableValue,

    /// Another step is already running for the same key.
    OperationInFlight,

    /// The step was called out of order or with stale artifacts.
    InvalidPhase,

    /// The transaction was mined but reverted, or was reverted for an unrecognized reason.
    TransactionReverted,

    /// A chain or service endpoint could not be reached.
    ChainUnavailable,

    /// The ledger disagrees with what the completed step should have produced.
    LedgerMismatch,

    /// Persisting or loading the operation failed.
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The user-triggered steps of the saga.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepName {
    /// Submitting the `initiate*` transaction.
    Initiate,

    /// Aggregating signatures over the emitted message.
    Sign,

    /// Submitting the signed message to the platform chain.
    SubmitToPlatform,

    /// Submitting the `complete*` transaction.
    Complete,

    /// Claiming accumulated delegation fees.
    ClaimFees,
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initiate => "initiate",
            Self::Sign => "sign",
            Self::SubmitToPlatform => "submit-to-platform",
            Self::Complete => "complete",
            Self::ClaimFees => "claim-fees",
        };
        f.write_str(name)
    }
}
