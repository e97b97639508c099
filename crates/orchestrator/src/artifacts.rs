//! What each step hands to the next one.
//!
//! Artifacts are plain serializable values so that a caller can carry them between sessions. When
//! the persisted record of an operation is missing, the step rebuilds it from the artifact it was
//! given; when the record exists, the artifact must agree with it.

use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};
use stakeflow_primitives::{
    ids::{PlatformTxId, ValidationId},
    operation::{
        OperationArtifacts, OperationKey, OperationKind, OperationPhase, Settlement,
        StakeOperation,
    },
    records::{Delegation, StakeStatus, Validator},
    warp::{SignedMessage, UnsignedMessage},
    TxHash,
};

/// The `initiate*` transaction was confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initiated {
    /// Operation the artifact belongs to.
    pub key: OperationKey,

    /// Kind of the operation.
    pub kind: OperationKind,

    /// Hash of the `initiate*` transaction.
    pub tx_hash: TxHash,

    /// Validation or delegation ID the operation is about.
    pub derived_id: B256,

    /// Message emitted by the transaction.
    pub message: UnsignedMessage,

    /// Quorum the attached uptime proof was signed at, for removals that carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_quorum: Option<u8>,
}

impl Initiated {
    /// Rebuilds the artifact from a persisted operation, if it got that far.
    pub fn from_operation(op: &StakeOperation) -> Option<Self> {
        Some(Self {
            key: op.key,
            kind: op.kind,
            tx_hash: op.artifacts.initiate_tx?,
            derived_id: op.artifacts.derived_id?,
            message: op.artifacts.unsigned_message.clone()?,
            uptime_quorum: op.artifacts.uptime_quorum,
        })
    }

    pub(crate) fn adopt(&self) -> StakeOperation {
        StakeOperation::adopt(
            self.kind,
            self.key,
            OperationPhase::Initiated,
            OperationArtifacts {
                initiate_tx: Some(self.tx_hash),
                derived_id: Some(self.derived_id),
                unsigned_message: Some(self.message.clone()),
                uptime_quorum: self.uptime_quorum,
                ..Default::default()
            },
        )
    }
}

/// The emitted message carries an aggregate signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSigned {
    /// Operation the artifact belongs to.
    pub key: OperationKey,

    /// Kind of the operation.
    pub kind: OperationKind,

    /// Validation or delegation ID the operation is about.
    pub derived_id: B256,

    /// The signed message, with the quorum it was signed at.
    pub signed: SignedMessage,
}

impl MessageSigned {
    /// Rebuilds the artifact from a persisted operation, if it got that far.
    pub fn from_operation(op: &StakeOperation) -> Option<Self> {
        Some(Self {
            key: op.key,
            kind: op.kind,
            derived_id: op.artifacts.derived_id?,
            signed: op.artifacts.signed_message.clone()?,
        })
    }

    pub(crate) fn adopt(&self) -> StakeOperation {
        StakeOperation::adopt(
            self.kind,
            self.key,
            OperationPhase::MessageSigned,
            OperationArtifacts {
                derived_id: Some(self.derived_id),
                unsigned_message: Some(self.signed.unsigned.clone()),
                signed_message: Some(self.signed.clone()),
                ..Default::default()
            },
        )
    }
}

/// The platform chain applied the message and acknowledged it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfirmed {
    /// Operation the artifact belongs to.
    pub key: OperationKey,

    /// Kind of the operation.
    pub kind: OperationKind,

    /// Validation or delegation ID the operation is about.
    pub derived_id: B256,

    /// Platform-chain transaction that carried the message.
    pub platform_tx_id: PlatformTxId,

    /// Index at which the platform chain logged the acknowledgement. A `complete*` call made with
    /// an artifact whose index differs from the recorded one is stale.
    pub message_index: u32,

    /// Signed acknowledgement issued by the platform chain.
    pub acknowledgement: SignedMessage,
}

impl PlatformConfirmed {
    /// Rebuilds the artifact from a persisted operation, if it got that far.
    pub fn from_operation(op: &StakeOperation) -> Option<Self> {
        Some(Self {
            key: op.key,
            kind: op.kind,
            derived_id: op.artifacts.derived_id?,
            platform_tx_id: op.artifacts.platform_tx_id?,
            message_index: op.artifacts.message_index?,
            acknowledgement: op.artifacts.acknowledgement.clone()?,
        })
    }

    pub(crate) fn adopt(&self) -> StakeOperation {
        StakeOperation::adopt(
            self.kind,
            self.key,
            OperationPhase::PlatformChainConfirmed,
            OperationArtifacts {
                derived_id: Some(self.derived_id),
                platform_tx_id: Some(self.platform_tx_id),
                message_index: Some(self.message_index),
                acknowledgement: Some(self.acknowledgement.clone()),
                ..Default::default()
            },
        )
    }
}

/// A validator or delegation as read back from the staking manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeEntity {
    /// See [`Validator`].
    Validator(Validator),

    /// See [`Delegation`].
    Delegation(Delegation),
}

impl StakeEntity {
    /// Lifecycle status of the entity.
    pub const fn status(&self) -> StakeStatus {
        match self {
            Self::Validator(validator) => validator.status,
            Self::Delegation(delegation) => delegation.status,
        }
    }

    /// Weight of the entity. For validators this includes delegated weight.
    pub const fn weight(&self) -> u64 {
        match self {
            Self::Validator(validator) => validator.weight,
            Self::Delegation(delegation) => delegation.weight,
        }
    }
}

/// The `complete*` transaction was confirmed and the ledger agrees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completed {
    /// Operation the artifact belongs to.
    pub key: OperationKey,

    /// Kind of the operation.
    pub kind: OperationKind,

    /// Hash of the `complete*` transaction.
    pub tx_hash: TxHash,

    /// Validation or delegation ID the operation was about.
    pub derived_id: B256,

    /// The entity after completion.
    pub entity: StakeEntity,

    /// Stake and rewards paid out, for removals.
    pub settlement: Option<Settlement>,
}

/// Delegation fees paid out to a validator owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeClaim {
    /// Validator whose fees were claimed.
    pub validation_id: ValidationId,

    /// Hash of the claim transaction.
    pub tx_hash: TxHash,

    /// Amount paid out, in wei.
    pub amount: U256,
}
