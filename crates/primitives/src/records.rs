//! Ledger records mirrored from the staking manager.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::ids::{BlsPublicKey, DelegationId, NodeId, ValidationId};

/// Lifecycle status shared by validators and delegations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StakeStatus {
    /// Registration initiated on the execution chain, not yet acknowledged by the platform chain.
    PendingAdded,

    /// Registration completed on both ledgers.
    Active,

    /// Removal initiated, weight change not yet acknowledged.
    PendingRemoved,

    /// Removal completed; stake has been returned.
    Removed,
}

impl StakeStatus {
    /// Maps the staking manager's status code to a [`StakeStatus`].
    ///
    /// Code `0` means the record does not exist. The contract distinguishes "completed" and
    /// "invalidated" removals (codes `4` and `5`); both are [`StakeStatus::Removed`] here.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::PendingAdded),
            2 => Some(Self::Active),
            3 => Some(Self::PendingRemoved),
            4 | 5 => Some(Self::Removed),
            _ => None,
        }
    }
}

/// A validator as recorded by the staking manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Primary key, derived on registration.
    pub validation_id: ValidationId,

    /// Platform-chain node of the validator.
    pub node_id: NodeId,

    /// BLS key the validator signs warp messages with.
    pub bls_public_key: BlsPublicKey,

    /// Current weight, including delegated weight.
    pub weight: u64,

    /// Lifecycle status.
    pub status: StakeStatus,

    /// Owner of the stake.
    pub owner: Address,

    /// Start of the validation period, in seconds since the unix epoch. Zero until active.
    pub start_time: u64,
}

/// A delegation as recorded by the staking manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Primary key, derived on delegation.
    pub delegation_id: DelegationId,

    /// Validator this delegation adds weight to. Not an owning reference.
    pub validation_id: ValidationId,

    /// Delegated weight.
    pub weight: u64,

    /// Lifecycle status.
    pub status: StakeStatus,

    /// Owner of the delegated stake.
    pub owner: Address,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_lifecycle() {
        assert_eq!(StakeStatus::from_code(0), None);
        assert_eq!(StakeStatus::from_code(2), Some(StakeStatus::Active));
        assert_eq!(StakeStatus::from_code(5), Some(StakeStatus::Removed));
        assert_eq!(StakeStatus::from_code(9), None);
    }
}
