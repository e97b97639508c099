//! The caller-facing result of a step.
//!
//! Callers that do not link against this crate (a UI, a script driving the CLI) get one
//! serializable shape per step: a success carrying the identifiers the next step needs, or a
//! failure tagged with its [`ErrorKind`].

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use stakeflow_primitives::{
    errors::{ErrorKind, StepName},
    ids::PlatformTxId,
    operation::OperationKey,
    TxHash,
};

use crate::{
    artifacts::{Completed, FeeClaim, Initiated, MessageSigned, PlatformConfirmed},
    errors::StepError,
};

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepReport {
    /// The step succeeded.
    Success {
        /// Operation the step ran for.
        key: OperationKey,

        /// Step that ran.
        step: StepName,

        /// Execution-chain transaction the step confirmed.
        tx_hash: Option<TxHash>,

        /// Platform-chain transaction the step confirmed.
        platform_tx_id: Option<PlatformTxId>,

        /// Validation or delegation ID of the operation.
        derived_id: Option<B256>,

        /// Quorum percentage the step's signature was aggregated at: the message's for `Sign`,
        /// the uptime proof's for an `Initiate` that attached one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quorum_used: Option<u8>,

        /// Human-readable summary.
        message: String,
    },

    /// The step failed.
    Failure {
        /// Operation the step ran for.
        key: OperationKey,

        /// Step that failed.
        step: StepName,

        /// Classification of the failure.
        error_kind: ErrorKind,

        /// Human-readable detail.
        message: String,

        /// Execution-chain transaction whose outcome the caller may need to check.
        tx_hash: Option<TxHash>,

        /// Platform-chain transaction whose outcome the caller may need to check.
        platform_tx_id: Option<PlatformTxId>,

        /// Quorums tried, when signature aggregation failed.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attempted_quorums: Vec<u8>,
    },
}

impl StepReport {
    /// Reports the outcome of a step.
    pub fn from_result<T: Reportable>(result: &Result<T, StepError>) -> Self {
        match result {
            Ok(artifact) => Self::success(artifact),
            Err(err) => Self::from(err),
        }
    }

    /// Reports a successful step.
    pub fn success(artifact: &impl Reportable) -> Self {
        Self::Success {
            key: artifact.key(),
            step: artifact.step(),
            tx_hash: artifact.tx_hash(),
            platform_tx_id: artifact.platform_tx_id(),
            derived_id: artifact.derived_id(),
            quorum_used: artifact.quorum_used(),
            message: artifact.summary(),
        }
    }

    /// Returns `true` for [`StepReport::Success`].
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<&StepError> for StepReport {
    fn from(err: &StepError) -> Self {
        Self::Failure {
            key: err.key,
            step: err.step,
            error_kind: err.kind,
            message: err.message.clone(),
            tx_hash: err.tx_hash,
            platform_tx_id: err.platform_tx_id,
            attempted_quorums: err.attempted_quorums.clone(),
        }
    }
}

/// An artifact that can be summarized in a [`StepReport`].
pub trait Reportable {
    /// Operation the artifact belongs to.
    fn key(&self) -> OperationKey;

    /// Step that produced the artifact.
    fn step(&self) -> StepName;

    /// Execution-chain transaction the step confirmed, if any.
    fn tx_hash(&self) -> Option<TxHash> {
        None
    }

    /// Platform-chain transaction the step confirmed, if any.
    fn platform_tx_id(&self) -> Option<PlatformTxId> {
        None
    }

    /// Validation or delegation ID, once known.
    fn derived_id(&self) -> Option<B256>;

    /// Quorum percentage a signature produced by the step was aggregated at.
    fn quorum_used(&self) -> Option<u8> {
        None
    }

    /// Human-readable summary.
    fn summary(&self) -> String;
}

impl Reportable for Initiated {
    fn key(&self) -> OperationKey {
        self.key
    }

    fn step(&self) -> StepName {
        StepName::Initiate
    }

    fn tx_hash(&self) -> Option<TxHash> {
        Some(self.tx_hash)
    }

    fn derived_id(&self) -> Option<B256> {
        Some(self.derived_id)
    }

    fn quorum_used(&self) -> Option<u8> {
        self.uptime_quorum
    }

    fn summary(&self) -> String {
        let mut summary =
            format!("{} initiated, message {} awaits signatures", self.kind, self.message.id());
        if let Some(quorum) = self.uptime_quorum {
            summary.push_str(&format!(", uptime proof signed at {quorum}% quorum"));
        }
        summary
    }
}

impl Reportable for MessageSigned {
    fn key(&self) -> OperationKey {
        self.key
    }

    fn step(&self) -> StepName {
        StepName::Sign
    }

    fn derived_id(&self) -> Option<B256> {
        Some(self.derived_id)
    }

    fn quorum_used(&self) -> Option<u8> {
        Some(self.signed.quorum_used)
    }

    fn summary(&self) -> String {
        format!(
            "message {} signed at {}% quorum",
            self.signed.id(),
            self.signed.quorum_used
        )
    }
}

impl Reportable for PlatformConfirmed {
    fn key(&self) -> OperationKey {
        self.key
    }

    fn step(&self) -> StepName {
        StepName::SubmitToPlatform
    }

    fn platform_tx_id(&self) -> Option<PlatformTxId> {
        Some(self.platform_tx_id)
    }

    fn derived_id(&self) -> Option<B256> {
        Some(self.derived_id)
    }

    fn summary(&self) -> String {
        format!(
            "platform chain applied the message, acknowledgement at message index {}",
            self.message_index
        )
    }
}

impl Reportable for Completed {
    fn key(&self) -> OperationKey {
        self.key
    }

    fn step(&self) -> StepName {
        StepName::Complete
    }

    fn tx_hash(&self) -> Option<TxHash> {
        Some(self.tx_hash)
    }

    fn derived_id(&self) -> Option<B256> {
        Some(self.derived_id)
    }

    fn summary(&self) -> String {
        let mut summary = format!(
            "{} completed, status {:?}, weight {}",
            self.kind,
            self.entity.status(),
            self.entity.weight()
        );
        if let Some(settlement) = &self.settlement {
            summary.push_str(&format!(
                ", returned {} wei with {} wei rewards",
                settlement.stake_returned, settlement.rewards
            ));
        }
        summary
    }
}

impl Reportable for FeeClaim {
    fn key(&self) -> OperationKey {
        OperationKey::Fees(self.validation_id)
    }

    fn step(&self) -> StepName {
        StepName::ClaimFees
    }

    fn tx_hash(&self) -> Option<TxHash> {
        Some(self.tx_hash)
    }

    fn derived_id(&self) -> Option<B256> {
        Some(self.validation_id.into())
    }

    fn summary(&self) -> String {
        format!("claimed {} wei of delegation fees", self.amount)
    }
}
