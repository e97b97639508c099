//! The persisted record of one staking saga.

use std::{fmt, str::FromStr};

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    errors::{ErrorKind, StepName},
    ids::{BlsProofOfPossession, BlsPublicKey, DelegationId, NodeId, PlatformTxId, ValidationId},
    warp::{SignedMessage, UnsignedMessage},
    TxHash,
};

/// The four sagas the orchestrators drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Register a new validator.
    RegisterValidator,

    /// Add a delegation to an existing validator.
    AddDelegation,

    /// Remove a validator.
    RemoveValidator,

    /// Remove a delegation.
    RemoveDelegation,
}

impl OperationKind {
    /// Returns `true` for the kinds that add weight.
    pub const fn is_registration(&self) -> bool {
        matches!(self, Self::RegisterValidator | Self::AddDelegation)
    }

    /// Returns `true` for the kinds that remove weight.
    pub const fn is_removal(&self) -> bool {
        !self.is_registration()
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identifies the subject of an operation.
///
/// Validation and delegation IDs are derived by the staking manager, so registrations are keyed by
/// what the caller knows before the first step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationKey {
    /// A validator registration, keyed by the node being registered.
    Node(NodeId),

    /// A delegation, keyed by the validator and the delegating account.
    Delegator {
        /// Validator receiving the delegation.
        validation_id: ValidationId,

        /// Account delegating stake.
        delegator: Address,
    },

    /// A validator removal.
    Validation(ValidationId),

    /// A delegation removal.
    Delegation(DelegationId),

    /// A fee claim. Never persisted; only used for in-flight exclusion.
    Fees(ValidationId),
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(node_id) => write!(f, "node:{node_id}"),
            Self::Delegator {
                validation_id,
                delegator,
            } => write!(f, "delegator:{validation_id}:{delegator}"),
            Self::Validation(validation_id) => write!(f, "validation:{validation_id}"),
            Self::Delegation(delegation_id) => write!(f, "delegation:{delegation_id}"),
            Self::Fees(validation_id) => write!(f, "fees:{validation_id}"),
        }
    }
}

/// Error parsing an [`OperationKey`] from its display form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid operation key {input:?}: {reason}")]
pub struct ParseKeyError {
    input: String,
    reason: String,
}

impl FromStr for OperationKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &dyn fmt::Display| ParseKeyError {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let (prefix, rest) = s.split_once(':').ok_or_else(|| err(&"missing prefix"))?;

        match prefix {
            "node" => rest.parse().map(Self::Node).map_err(|e| err(&e)),
            "validation" => rest.parse().map(Self::Validation).map_err(|e| err(&e)),
            "delegation" => rest.parse().map(Self::Delegation).map_err(|e| err(&e)),
            "fees" => rest.parse().map(Self::Fees).map_err(|e| err(&e)),
            "delegator" => {
                let (validation_id, delegator) = rest
                    .split_once(':')
                    .ok_or_else(|| err(&"missing delegator address"))?;
                Ok(Self::Delegator {
                    validation_id: validation_id.parse().map_err(|e| err(&e))?,
                    delegator: delegator.parse().map_err(|e| err(&e))?,
                })
            }
            other => Err(err(&format!("unknown prefix {other}"))),
        }
    }
}

/// Phases of an operation, in the order they are reached.
///
/// [`OperationPhase::Failed`] sorts last but is not "after" the others; use
/// [`StakeOperation::checkpoint`] to find how far a failed operation got.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationPhase {
    /// The `initiate*` transaction was broadcast. Once it is confirmed the derived ID and the
    /// emitted message are recorded.
    Initiated,

    /// The emitted message has an aggregate signature.
    MessageSigned,

    /// The platform-chain transaction was issued.
    PlatformChainSubmitted,

    /// The platform chain accepted the message and returned its acknowledgement.
    PlatformChainConfirmed,

    /// The `complete*` transaction was confirmed.
    Completed,

    /// A step failed. Terminal until the caller retries a step.
    Failed,
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Parameters of a validator registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRegistrationParams {
    /// Node to register.
    pub node_id: NodeId,

    /// BLS key of the node.
    pub bls_public_key: BlsPublicKey,

    /// Proof of possession of the BLS key.
    pub bls_proof_of_possession: BlsProofOfPossession,

    /// Stake to lock, in wei.
    pub stake: U256,

    /// Minimum time the stake stays locked, in seconds.
    pub min_stake_duration: u64,

    /// Fee charged to delegators, in basis points.
    pub delegation_fee_bips: u16,

    /// Recipient of validation rewards.
    pub reward_recipient: Address,
}

/// Parameters of a delegation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationParams {
    /// Validator to delegate to.
    pub validation_id: ValidationId,

    /// Account delegating the stake.
    pub delegator: Address,

    /// Stake to delegate, in wei.
    pub stake: U256,

    /// Recipient of delegation rewards.
    pub reward_recipient: Address,
}

/// Parameters of a validator removal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRemovalParams {
    /// Validator to remove.
    pub validation_id: ValidationId,

    /// Whether to attach a signed uptime proof to the removal.
    pub include_uptime_proof: bool,
}

/// Parameters of a delegation removal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRemovalParams {
    /// Delegation to remove.
    pub delegation_id: DelegationId,

    /// Whether to attach a signed uptime proof of the delegated validator.
    pub include_uptime_proof: bool,
}

/// The parameters an operation was started with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeIntent {
    /// See [`ValidatorRegistrationParams`].
    RegisterValidator(ValidatorRegistrationParams),

    /// See [`DelegationParams`].
    AddDelegation(DelegationParams),

    /// See [`ValidatorRemovalParams`].
    RemoveValidator(ValidatorRemovalParams),

    /// See [`DelegationRemovalParams`].
    RemoveDelegation(DelegationRemovalParams),
}

impl StakeIntent {
    /// The kind of operation this intent starts.
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::RegisterValidator(_) => OperationKind::RegisterValidator,
            Self::AddDelegation(_) => OperationKind::AddDelegation,
            Self::RemoveValidator(_) => OperationKind::RemoveValidator,
            Self::RemoveDelegation(_) => OperationKind::RemoveDelegation,
        }
    }

    /// The key the operation is tracked under.
    pub const fn key(&self) -> OperationKey {
        match self {
            Self::RegisterValidator(params) => OperationKey::Node(params.node_id),
            Self::AddDelegation(params) => OperationKey::Delegator {
                validation_id: params.validation_id,
                delegator: params.delegator,
            },
            Self::RemoveValidator(params) => OperationKey::Validation(params.validation_id),
            Self::RemoveDelegation(params) => OperationKey::Delegation(params.delegation_id),
        }
    }
}

/// Stake and rewards paid out by a completed removal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Stake returned to the owner.
    pub stake_returned: U256,

    /// Rewards credited to the owner.
    pub rewards: U256,

    /// Delegation fees credited to the validator. Zero for validator removals.
    pub fees: U256,

    /// Uptime the rewards were computed from, if a proof was attached.
    pub uptime_secs: Option<u64>,
}

/// Everything an operation has produced so far.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationArtifacts {
    /// Hash of the `initiate*` transaction.
    pub initiate_tx: Option<TxHash>,

    /// Validation or delegation ID derived by the staking manager.
    pub derived_id: Option<B256>,

    /// Message emitted by the `initiate*` transaction.
    pub unsigned_message: Option<UnsignedMessage>,

    /// Aggregate-signed form of [`Self::unsigned_message`].
    pub signed_message: Option<SignedMessage>,

    /// Platform-chain transaction carrying the signed message.
    pub platform_tx_id: Option<PlatformTxId>,

    /// Index at which the platform chain logged the acknowledgement.
    pub message_index: Option<u32>,

    /// Signed acknowledgement issued by the platform chain.
    pub acknowledgement: Option<SignedMessage>,

    /// Hash of the `complete*` transaction.
    pub complete_tx: Option<TxHash>,

    /// Weight the registration event reported, checked again on completion.
    pub expected_weight: Option<u64>,

    /// Uptime attested by the proof attached to a removal.
    pub uptime_secs: Option<u64>,

    /// Quorum percentage the uptime proof was signed at.
    pub uptime_quorum: Option<u8>,

    /// Payout of a completed removal.
    pub settlement: Option<Settlement>,
}

/// Why an operation failed, or why its last step did not finish.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFailure {
    /// Step that was attempted.
    pub step: StepName,

    /// Classification of the failure.
    pub kind: ErrorKind,

    /// Human-readable detail.
    pub message: String,

    /// Transaction the failure refers to, if any.
    pub tx_hash: Option<TxHash>,
}

/// One run of a saga for one [`OperationKey`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeOperation {
    /// Which saga this is.
    pub kind: OperationKind,

    /// Subject of the operation.
    pub key: OperationKey,

    /// Parameters of the first step. `None` for operations rebuilt from caller artifacts.
    pub intent: Option<StakeIntent>,

    /// Current phase.
    pub phase: OperationPhase,

    /// Last phase reached before any failure.
    pub checkpoint: OperationPhase,

    /// Outputs of the steps so far.
    pub artifacts: OperationArtifacts,

    /// Last failure observed, including timeouts that did not change the phase.
    pub last_error: Option<OperationFailure>,

    /// Unix time at which a session claimed the key to broadcast the `initiate*` transaction.
    /// Cleared once the transaction's hash is recorded.
    #[serde(default)]
    pub claimed_at: Option<u64>,
}

impl StakeOperation {
    /// Starts a new operation for `intent`.
    pub fn new(intent: StakeIntent) -> Self {
        Self {
            kind: intent.kind(),
            key: intent.key(),
            intent: Some(intent),
            phase: OperationPhase::Initiated,
            checkpoint: OperationPhase::Initiated,
            artifacts: OperationArtifacts::default(),
            last_error: None,
            claimed_at: None,
        }
    }

    /// Rebuilds an operation from artifacts the caller carried over from another session.
    pub fn adopt(
        kind: OperationKind,
        key: OperationKey,
        phase: OperationPhase,
        artifacts: OperationArtifacts,
    ) -> Self {
        Self {
            kind,
            key,
            intent: None,
            phase,
            checkpoint: phase,
            artifacts,
            last_error: None,
            claimed_at: None,
        }
    }

    /// Moves the operation to `phase` and records it as the checkpoint.
    pub fn advance(&mut self, phase: OperationPhase) {
        self.phase = phase;
        self.checkpoint = phase;
        self.last_error = None;
    }

    /// Moves the operation to [`OperationPhase::Failed`]. The checkpoint is kept.
    pub fn fail(&mut self, failure: OperationFailure) {
        self.phase = OperationPhase::Failed;
        self.last_error = Some(failure);
    }

    /// Records a failure without leaving the current phase.
    pub fn note_error(&mut self, failure: OperationFailure) {
        self.last_error = Some(failure);
    }

    /// Returns a fresh operation that continues a failed one from its checkpoint.
    pub fn resumed(&self) -> Self {
        Self {
            phase: self.checkpoint,
            last_error: None,
            ..self.clone()
        }
    }

    /// Moves the operation back to an earlier phase, discarding the platform-chain artifacts
    /// produced after it.
    pub fn rewind_to(&mut self, phase: OperationPhase) {
        if phase < OperationPhase::PlatformChainSubmitted {
            self.artifacts.platform_tx_id = None;
        }
        if phase < OperationPhase::PlatformChainConfirmed {
            self.artifacts.message_index = None;
            self.artifacts.acknowledgement = None;
        }
        self.phase = phase;
        self.checkpoint = phase;
    }

    /// Returns `true` once the operation is [`OperationPhase::Completed`] or
    /// [`OperationPhase::Failed`].
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self.phase,
            OperationPhase::Completed | OperationPhase::Failed
        )
    }

    /// Returns `true` if a new operation may overwrite this record: it is terminal, or it is a
    /// broadcast claim older than `stale_before`.
    pub fn is_replaceable(&self, stale_before: u64) -> bool {
        self.is_terminal() || self.claimed_at.is_some_and(|at| at < stale_before)
    }

    /// Returns `true` if the operation has reached `phase`, looking through failures.
    pub fn reached(&self, phase: OperationPhase) -> bool {
        self.checkpoint >= phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn removal() -> StakeOperation {
        StakeOperation::new(StakeIntent::RemoveValidator(ValidatorRemovalParams {
            validation_id: ValidationId::from([1u8; 32]),
            include_uptime_proof: false,
        }))
    }

    fn failure() -> OperationFailure {
        OperationFailure {
            step: StepName::SubmitToPlatform,
            kind: ErrorKind::PlatformChainRejection,
            message: "malformed".to_string(),
            tx_hash: None,
        }
    }

    #[test]
    fn keys_round_trip_through_display() {
        let keys = [
            OperationKey::Node(NodeId::from([1u8; 20])),
            OperationKey::Delegator {
                validation_id: ValidationId::from([2u8; 32]),
                delegator: Address::repeat_byte(3),
            },
            OperationKey::Validation(ValidationId::from([4u8; 32])),
            OperationKey::Delegation(DelegationId::from([5u8; 32])),
            OperationKey::Fees(ValidationId::from([6u8; 32])),
        ];

        for key in keys {
            assert_eq!(key.to_string().parse::<OperationKey>(), Ok(key));
        }
        assert!("bogus:00".parse::<OperationKey>().is_err());
        assert!("node".parse::<OperationKey>().is_err());
    }

    #[test]
    fn new_operation_is_keyed_by_intent() {
        let op = removal();

        assert_eq!(op.kind, OperationKind::RemoveValidator);
        assert_eq!(
            op.key,
            OperationKey::Validation(ValidationId::from([1u8; 32]))
        );
        assert_eq!(op.phase, OperationPhase::Initiated);
        assert!(!op.is_terminal());
    }

    #[test]
    fn failure_keeps_checkpoint_and_resume_restores_it() {
        let mut op = removal();
        op.advance(OperationPhase::MessageSigned);
        op.fail(failure());

        assert!(op.is_terminal());
        assert_eq!(op.checkpoint, OperationPhase::MessageSigned);
        assert!(op.reached(OperationPhase::MessageSigned));

        let resumed = op.resumed();
        assert_eq!(resumed.phase, OperationPhase::MessageSigned);
        assert!(resumed.last_error.is_none());
        assert_eq!(resumed.artifacts, op.artifacts);
    }

    #[test]
    fn rewind_discards_platform_artifacts() {
        let mut op = removal();
        op.artifacts.platform_tx_id = Some(PlatformTxId::from([9u8; 32]));
        op.artifacts.message_index = Some(4);
        op.advance(OperationPhase::PlatformChainConfirmed);

        op.rewind_to(OperationPhase::MessageSigned);

        assert_eq!(op.phase, OperationPhase::MessageSigned);
        assert!(op.artifacts.platform_tx_id.is_none());
        assert!(op.artifacts.message_index.is_none());
    }

    #[test]
    fn note_error_keeps_phase() {
        let mut op = removal();
        op.note_error(failure());

        assert_eq!(op.phase, OperationPhase::Initiated);
        assert!(op.last_error.is_some());
    }
}
