//! Parameters and messages for tests.

use alloy_primitives::{Address, U256};
use stakeflow_primitives::{
    ids::{BlsProofOfPossession, BlsPublicKey, NodeId, ValidationId},
    operation::{DelegationParams, ValidatorRegistrationParams},
    warp::{StakingPayload, UnsignedMessage},
};

use crate::SimNetwork;

/// Thirty days, in seconds.
pub const THIRTY_DAYS: u64 = 30 * 24 * 60 * 60;

/// Registration of the node `[node_byte; 20]` staking `stake` for thirty days.
pub fn validator_params(node_byte: u8, stake: u64) -> ValidatorRegistrationParams {
    ValidatorRegistrationParams {
        node_id: NodeId::from([node_byte; 20]),
        bls_public_key: BlsPublicKey::from([node_byte; 48]),
        bls_proof_of_possession: BlsProofOfPossession::from([node_byte; 96]),
        stake: U256::from(stake),
        min_stake_duration: THIRTY_DAYS,
        delegation_fee_bips: 1_000,
        reward_recipient: Address::repeat_byte(node_byte),
    }
}

/// Delegation of `stake` from `Address::repeat_byte(delegator_byte)` to `validation_id`.
pub fn delegation_params(
    validation_id: ValidationId,
    delegator_byte: u8,
    stake: u64,
) -> DelegationParams {
    DelegationParams {
        validation_id,
        delegator: Address::repeat_byte(delegator_byte),
        stake: U256::from(stake),
        reward_recipient: Address::repeat_byte(delegator_byte),
    }
}

/// A registration message as the staking manager of `net` would emit it.
pub fn registration_message(net: &SimNetwork, node_byte: u8, weight: u64) -> UnsignedMessage {
    let config = net.config();
    StakingPayload::RegisterL1Validator {
        subnet_id: config.subnet_id,
        node_id: NodeId::from([node_byte; 20]),
        bls_public_key: BlsPublicKey::from([node_byte; 48]),
        expiry: net.now() + 24 * 60 * 60,
        weight,
    }
    .to_message(
        config.network_id,
        config.source_chain_id,
        config.staking_manager.to_vec(),
    )
}
