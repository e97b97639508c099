//! ABI of the staking-manager contract and of the warp messenger precompile.

// items generated by `sol!` carry no docs
#![allow(missing_docs)]

use alloy::{
    primitives::{address, Address},
    sol,
    sol_types::SolError,
};

/// Address of the warp messenger precompile.
pub const WARP_PRECOMPILE: Address = address!("0200000000000000000000000000000000000005");

sol! {
    /// Staking-manager contract holding stake on the execution chain.
    #[derive(Debug, PartialEq, Eq)]
    interface IStakingManager {
        struct ValidatorInfo {
            uint8 status;
            bytes nodeID;
            bytes blsPublicKey;
            uint64 weight;
            uint64 startTime;
            address owner;
        }

        struct DelegatorInfo {
            uint8 status;
            bytes32 validationID;
            uint64 weight;
            address owner;
        }

        // ── Validators ───────────────────────────────────────────────
        function initiateValidatorRegistration(
            bytes nodeID,
            bytes blsPublicKey,
            bytes blsProofOfPossession,
            uint16 delegationFeeBips,
            uint64 minStakeDuration,
            address rewardRecipient
        ) external payable returns (bytes32 validationID);
        function completeValidatorRegistration(uint32 messageIndex) external returns (bytes32 validationID);
        function initiateValidatorRemoval(bytes32 validationID, bool includeUptimeProof, uint32 messageIndex) external;
        function completeValidatorRemoval(uint32 messageIndex) external returns (bytes32 validationID);

        // ── Delegators ───────────────────────────────────────────────
        function initiateDelegatorRegistration(bytes32 validationID, address rewardRecipient) external payable returns (bytes32 delegationID);
        function completeDelegatorRegistration(bytes32 delegationID, uint32 messageIndex) external;
        function initiateDelegatorRemoval(bytes32 delegationID, bool includeUptimeProof, uint32 messageIndex) external;
        function completeDelegatorRemoval(bytes32 delegationID, uint32 messageIndex) external;
        function claimDelegationFees(bytes32 validationID) external;

        // ── Views ────────────────────────────────────────────────────
        function getValidator(bytes32 validationID) external view returns (ValidatorInfo memory);
        function getDelegator(bytes32 delegationID) external view returns (DelegatorInfo memory);
        function valueToClaim(bytes32 validationID) external view returns (uint256);

        // ── Events ───────────────────────────────────────────────────
        event ValidatorRegistrationInitiated(bytes32 indexed validationID, bytes20 indexed nodeID, bytes32 registrationMessageID, uint64 weight);
        event ValidatorRegistrationCompleted(bytes32 indexed validationID, uint64 startTime);
        event ValidatorRemovalInitiated(bytes32 indexed validationID, bytes32 setWeightMessageID, uint64 endTime);
        event ValidatorRemovalCompleted(bytes32 indexed validationID, uint256 stakeReturned, uint256 rewards);
        event UptimeUpdated(bytes32 indexed validationID, uint64 uptime);
        event DelegatorRegistrationInitiated(bytes32 indexed delegationID, bytes32 indexed validationID, address indexed delegator, uint64 nonce, uint64 delegatorWeight, bytes32 setWeightMessageID);
        event DelegatorRegistrationCompleted(bytes32 indexed delegationID, bytes32 indexed validationID, uint64 startTime);
        event DelegatorRemovalInitiated(bytes32 indexed delegationID, bytes32 indexed validationID);
        event DelegatorRemovalCompleted(bytes32 indexed delegationID, bytes32 indexed validationID, uint256 stakeReturned, uint256 rewards, uint256 fees);
        event DelegationFeesClaimed(bytes32 indexed validationID, address indexed recipient, uint256 amount);

        // ── Errors ───────────────────────────────────────────────────
        error InvalidValidationID(bytes32 validationID);
        error InvalidDelegationID(bytes32 delegationID);
        error InvalidNodeID(bytes nodeID);
        error InvalidBLSKeyLength(uint256 length);
        error MinStakeDurationNotPassed(uint64 endTime);
        error InvalidValidatorStatus(uint8 status);
        error InvalidDelegatorStatus(uint8 status);
        error UnexpectedRegistrationStatus(bool validRegistration);
        error InvalidWarpMessage();
        error InvalidWarpSourceChainID(bytes32 sourceChainID);
        error InvalidWarpMessageIndex(uint32 messageIndex);
        error MessageAlreadyConsumed(bytes32 messageID);
        error InvalidStakeAmount(uint256 stakeAmount);
        error UnauthorizedOwner(address sender);
    }

    /// Warp messenger precompile.
    #[derive(Debug, PartialEq, Eq)]
    interface IWarpMessenger {
        event SendWarpMessage(address indexed sourceAddress, bytes32 indexed unsignedMessageID, bytes message);
    }
}

macro_rules! known_errors {
    ($($err:ident),* $(,)?) => {
        /// Selectors and names of the errors the staking manager can revert with.
        pub const KNOWN_ERRORS: &[([u8; 4], &str)] = &[
            $((<IStakingManager::$err as SolError>::SELECTOR, stringify!($err)),)*
        ];
    };
}

known_errors!(
    InvalidValidationID,
    InvalidDelegationID,
    InvalidNodeID,
    InvalidBLSKeyLength,
    MinStakeDurationNotPassed,
    InvalidValidatorStatus,
    InvalidDelegatorStatus,
    UnexpectedRegistrationStatus,
    InvalidWarpMessage,
    InvalidWarpSourceChainID,
    InvalidWarpMessageIndex,
    MessageAlreadyConsumed,
    InvalidStakeAmount,
    UnauthorizedOwner,
);

/// Returns the name of the contract error encoded in `revert_data`, if it is a known one.
pub fn revert_name(revert_data: &[u8]) -> Option<&'static str> {
    let selector = revert_data.get(..4)?;
    KNOWN_ERRORS
        .iter()
        .find(|(known, _)| known.as_slice() == selector)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::B256;

    use super::*;

    #[test]
    fn known_revert_is_named() {
        let data = IStakingManager::InvalidValidationID {
            validationID: B256::repeat_byte(1),
        }
        .abi_encode();

        assert_eq!(revert_name(&data), Some("InvalidValidationID"));
    }

    #[test]
    fn unknown_or_short_revert_is_unnamed() {
        assert_eq!(revert_name(&[0xde, 0xad, 0xbe, 0xef, 0x00]), None);
        assert_eq!(revert_name(&[0x01]), None);
    }

    #[test]
    fn selectors_are_distinct() {
        for (i, (a, _)) in KNOWN_ERRORS.iter().enumerate() {
            for (b, _) in &KNOWN_ERRORS[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
