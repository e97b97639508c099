//! Error types for the orchestrator crate.

use pchain_submitter::{PlatformError, SubmitError};
use stakeflow_db::DbError;
use stakeflow_primitives::{
    errors::{ErrorKind, StepName},
    ids::PlatformTxId,
    operation::{OperationFailure, OperationKey},
    TxHash,
};
use staking_manager::GatewayError;
use thiserror::Error;
use tx_waiter::WaitError;
use warp_signer::{SignError, UptimeError};

/// Failure of one step of a saga.
///
/// Carries the key and step so the caller can retry the same step, and the transaction the
/// failure refers to when its outcome is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{step} of {key} failed ({kind}): {message}")]
pub struct StepError {
    /// Operation the step was run for.
    pub key: OperationKey,

    /// Step that failed.
    pub step: StepName,

    /// Classification of the failure.
    pub kind: ErrorKind,

    /// Human-readable detail.
    pub message: String,

    /// Execution-chain transaction the failure refers to.
    pub tx_hash: Option<TxHash>,

    /// Platform-chain transaction the failure refers to.
    pub platform_tx_id: Option<PlatformTxId>,

    /// Quorums tried, in order, when aggregation failed.
    pub attempted_quorums: Vec<u8>,
}

impl StepError {
    /// Creates an error of `kind`.
    pub fn new(
        key: OperationKey,
        step: StepName,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            key,
            step,
            kind,
            message: message.into(),
            tx_hash: None,
            platform_tx_id: None,
            attempted_quorums: Vec::new(),
        }
    }

    /// Attaches the execution-chain transaction the failure refers to.
    pub fn with_tx(mut self, tx_hash: TxHash) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }

    pub(crate) fn in_flight(key: OperationKey, step: StepName) -> Self {
        Self::new(
            key,
            step,
            ErrorKind::OperationInFlight,
            "another step is running for this key",
        )
    }

    pub(crate) fn claimed_elsewhere(key: OperationKey, step: StepName, claimed_at: u64) -> Self {
        Self::new(
            key,
            step,
            ErrorKind::OperationInFlight,
            format!("another session claimed this key at unix time {claimed_at} to broadcast"),
        )
    }

    pub(crate) fn invalid_phase(
        key: OperationKey,
        step: StepName,
        message: impl Into<String>,
    ) -> Self {
        Self::new(key, step, ErrorKind::InvalidPhase, message)
    }

    pub(crate) fn ledger_mismatch(
        key: OperationKey,
        step: StepName,
        message: impl Into<String>,
    ) -> Self {
        Self::new(key, step, ErrorKind::LedgerMismatch, message)
    }

    pub(crate) fn gateway(key: OperationKey, step: StepName, err: &GatewayError) -> Self {
        Self::new(key, step, classify_gateway(err), err.to_string())
    }

    pub(crate) fn wait(key: OperationKey, step: StepName, err: &WaitError) -> Self {
        let kind = match err {
            WaitError::Timeout { .. } => ErrorKind::TransactionTimeout,
            WaitError::Chain { source, .. } => classify_gateway(source),
        };
        Self::new(key, step, kind, err.to_string()).with_tx(err.tx_hash())
    }

    pub(crate) fn sign(key: OperationKey, step: StepName, err: &SignError) -> Self {
        Self {
            attempted_quorums: err.attempted_quorums().to_vec(),
            ..Self::new(
                key,
                step,
                ErrorKind::SignatureAggregationFailure,
                err.to_string(),
            )
        }
    }

    pub(crate) fn uptime(key: OperationKey, step: StepName, err: &UptimeError) -> Self {
        match err {
            UptimeError::Sign(sign) => Self::sign(key, step, sign),
            UptimeError::UnknownValidator(_) => {
                Self::new(key, step, ErrorKind::InvalidKey, err.to_string())
            }
            UptimeError::Source(_) => {
                Self::new(key, step, ErrorKind::ChainUnavailable, err.to_string())
            }
        }
    }

    pub(crate) fn submit(key: OperationKey, step: StepName, err: &SubmitError) -> Self {
        let (kind, platform_tx_id) = match err {
            SubmitError::Malformed(_) => (ErrorKind::PlatformChainRejection, None),
            SubmitError::Platform(PlatformError::Transport(_) | PlatformError::Decode(_)) => {
                (ErrorKind::ChainUnavailable, None)
            }
            SubmitError::Platform(_) => (ErrorKind::PlatformChainRejection, None),
            SubmitError::Dropped { tx_id, .. } => (ErrorKind::PlatformChainRejection, Some(*tx_id)),
            SubmitError::Timeout { tx_id, .. } => (ErrorKind::TransactionTimeout, Some(*tx_id)),
        };
        Self {
            platform_tx_id,
            ..Self::new(key, step, kind, err.to_string())
        }
    }

    pub(crate) fn storage(key: OperationKey, step: StepName, err: &DbError) -> Self {
        Self::new(key, step, ErrorKind::Storage, err.to_string())
    }

    /// Whether the step may still succeed without being resubmitted.
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::TransactionTimeout)
    }

    /// Whether the failure leaves the persisted operation untouched.
    pub(crate) const fn is_caller_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::OperationInFlight | ErrorKind::InvalidPhase | ErrorKind::Storage
        )
    }

    /// The failure as recorded on the operation.
    pub fn to_failure(&self) -> OperationFailure {
        OperationFailure {
            step: self.step,
            kind: self.kind,
            message: self.message.clone(),
            tx_hash: self.tx_hash,
        }
    }
}

fn classify_gateway(err: &GatewayError) -> ErrorKind {
    match err {
        GatewayError::UserRejected => ErrorKind::UserRejectedSigning,
        GatewayError::Reverted { name, .. } => classify_revert(name.as_deref()),
        GatewayError::Transport(_) | GatewayError::Decode(_) => ErrorKind::ChainUnavailable,
    }
}

/// Maps a staking-manager revert onto the error taxonomy.
pub fn classify_revert(name: Option<&str>) -> ErrorKind {
    match name {
        Some(
            "InvalidValidationID"
            | "InvalidDelegationID"
            | "InvalidNodeID"
            | "InvalidBLSKeyLength"
            | "UnauthorizedOwner",
        ) => ErrorKind::InvalidKey,
        Some(
            "MinStakeDurationNotPassed"
            | "InvalidValidatorStatus"
            | "InvalidDelegatorStatus"
            | "UnexpectedRegistrationStatus"
            | "InvalidStakeAmount",
        ) => ErrorKind::DurationOrStatusViolation,
        Some(
            "InvalidWarpMessage"
            | "InvalidWarpSourceChainID"
            | "InvalidWarpMessageIndex"
            | "MessageAlreadyConsumed",
        ) => ErrorKind::PlatformChainRejection,
        _ => ErrorKind::TransactionReverted,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use stakeflow_primitives::ids::ValidationId;

    use super::*;

    fn key() -> OperationKey {
        OperationKey::Validation(ValidationId::from([1u8; 32]))
    }

    #[test]
    fn reverts_are_classified_by_name() {
        assert_eq!(
            classify_revert(Some("InvalidValidationID")),
            ErrorKind::InvalidKey
        );
        assert_eq!(
            classify_revert(Some("MinStakeDurationNotPassed")),
            ErrorKind::DurationOrStatusViolation
        );
        assert_eq!(
            classify_revert(Some("MessageAlreadyConsumed")),
            ErrorKind::PlatformChainRejection
        );
        assert_eq!(classify_revert(None), ErrorKind::TransactionReverted);
    }

    #[test]
    fn timeouts_carry_the_transaction() {
        let tx_hash = TxHash::repeat_byte(7);
        let err = StepError::wait(
            key(),
            StepName::Initiate,
            &WaitError::Timeout {
                tx_hash,
                waited: Duration::from_secs(10),
            },
        );

        assert!(err.is_timeout());
        assert_eq!(err.tx_hash, Some(tx_hash));
        assert_eq!(err.to_failure().tx_hash, Some(tx_hash));
    }

    #[test]
    fn user_rejection_is_reported_as_such() {
        let err = StepError::gateway(key(), StepName::Complete, &GatewayError::UserRejected);
        assert_eq!(err.kind, ErrorKind::UserRejectedSigning);
    }

    #[test]
    fn aggregation_failure_lists_quorums() {
        let err = StepError::sign(
            key(),
            StepName::Sign,
            &SignError::QuorumExhausted {
                attempted: vec![67, 50, 33],
            },
        );

        assert_eq!(err.kind, ErrorKind::SignatureAggregationFailure);
        assert_eq!(err.attempted_quorums, vec![67, 50, 33]);
    }

    #[test]
    fn platform_timeout_keeps_the_platform_tx() {
        let tx_id = PlatformTxId::from([3u8; 32]);
        let err = StepError::submit(
            key(),
            StepName::SubmitToPlatform,
            &SubmitError::Timeout {
                tx_id,
                waited: Duration::from_secs(60),
            },
        );

        assert!(err.is_timeout());
        assert_eq!(err.platform_tx_id, Some(tx_id));
    }
}
