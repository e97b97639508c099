//! Chain-neutral view of execution-chain transactions and the staking manager's events.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{
    ids::{DelegationId, NodeId, ValidationId},
    warp::UnsignedMessage,
    TxHash,
};

/// Handle to a transaction that has been broadcast but not yet confirmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingTx {
    /// Hash of the broadcast transaction.
    pub tx_hash: TxHash,
}

impl PendingTx {
    /// Creates a handle for `tx_hash`.
    pub const fn new(tx_hash: TxHash) -> Self {
        Self { tx_hash }
    }
}

impl From<TxHash> for PendingTx {
    fn from(tx_hash: TxHash) -> Self {
        Self { tx_hash }
    }
}

/// A mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Hash of the transaction.
    pub tx_hash: TxHash,

    /// Block the transaction was included in.
    pub block_number: u64,

    /// `false` if execution reverted.
    pub success: bool,

    /// Staking events emitted by the transaction, in log order.
    pub events: Vec<StakingEvent>,
}

impl Receipt {
    /// Returns the first event for which `f` returns `Some`.
    pub fn find_event<T>(&self, f: impl FnMut(&StakingEvent) -> Option<T>) -> Option<T> {
        self.events.iter().find_map(f)
    }

    /// Returns the first cross-chain message emitted by the transaction.
    pub fn warp_message(&self) -> Option<&UnsignedMessage> {
        self.events.iter().find_map(|event| match event {
            StakingEvent::WarpMessageSent { message, .. } => Some(message),
            _ => None,
        })
    }
}

/// Events emitted by the staking manager and the warp messenger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakingEvent {
    /// A cross-chain message was emitted.
    WarpMessageSent {
        /// Contract that sent the message.
        sender: Address,

        /// The emitted message.
        message: UnsignedMessage,
    },

    /// A validator registration was initiated.
    ValidatorRegistrationInitiated {
        /// Derived validation ID.
        validation_id: ValidationId,

        /// Node being registered.
        node_id: NodeId,

        /// Requested weight.
        weight: u64,
    },

    /// A validator registration was completed.
    ValidatorRegistrationCompleted {
        /// Registered validator.
        validation_id: ValidationId,
    },

    /// A validator removal was initiated.
    ValidatorRemovalInitiated {
        /// Validator being removed.
        validation_id: ValidationId,
    },

    /// A validator removal was completed and the stake returned.
    ValidatorRemovalCompleted {
        /// Removed validator.
        validation_id: ValidationId,

        /// Stake returned to the owner.
        stake_returned: U256,

        /// Rewards credited to the owner.
        rewards: U256,
    },

    /// The uptime recorded for a validator changed.
    UptimeUpdated {
        /// Validator whose uptime changed.
        validation_id: ValidationId,

        /// New uptime in seconds.
        uptime_secs: u64,
    },

    /// A delegation was initiated.
    DelegatorRegistrationInitiated {
        /// Derived delegation ID.
        delegation_id: DelegationId,

        /// Validator the delegation adds weight to.
        validation_id: ValidationId,

        /// Delegated weight.
        weight: u64,
    },

    /// A delegation was completed.
    DelegatorRegistrationCompleted {
        /// Completed delegation.
        delegation_id: DelegationId,
    },

    /// A delegation removal was initiated.
    DelegatorRemovalInitiated {
        /// Delegation being removed.
        delegation_id: DelegationId,
    },

    /// A delegation removal was completed and the stake returned.
    DelegatorRemovalCompleted {
        /// Removed delegation.
        delegation_id: DelegationId,

        /// Stake returned to the delegator.
        stake_returned: U256,

        /// Rewards credited to the delegator.
        rewards: U256,

        /// Fees credited to the validator.
        fees: U256,
    },

    /// Accumulated delegation fees were paid out to a validator owner.
    DelegationFeesClaimed {
        /// Validator whose fees were claimed.
        validation_id: ValidationId,

        /// Amount paid out.
        amount: U256,
    },
}
