//! The interface the orchestrators use to talk to the staking manager.

use std::future::Future;

use alloy::primitives::U256;
use stakeflow_primitives::{
    events::PendingTx,
    ids::{DelegationId, ValidationId},
    operation::{DelegationParams, ValidatorRegistrationParams},
    records::{Delegation, Validator},
    warp::SignedMessage,
};

use crate::errors::GatewayResult;

/// Calls on the staking-manager contract.
///
/// State-changing calls return a [`PendingTx`] as soon as the transaction is broadcast. Signed
/// messages passed in are attached to the transaction so the contract can verify them. A
/// `complete*` call attaches only the acknowledgement and reads it back at its position in the
/// attached list.
pub trait StakingManager: Send + Sync {
    // ── Validators ───────────────────────────────────────────────────

    /// Locks the stake and emits the registration message for a new validator.
    fn initiate_validator_registration(
        &self,
        params: &ValidatorRegistrationParams,
    ) -> impl Future<Output = GatewayResult<PendingTx>> + Send;

    /// Activates a validator once the platform chain acknowledged its registration.
    fn complete_validator_registration(
        &self,
        acknowledgement: &SignedMessage,
    ) -> impl Future<Output = GatewayResult<PendingTx>> + Send;

    /// Emits the weight-zero message for a validator, optionally attesting its uptime.
    fn initiate_validator_removal(
        &self,
        validation_id: ValidationId,
        uptime_proof: Option<&SignedMessage>,
    ) -> impl Future<Output = GatewayResult<PendingTx>> + Send;

    /// Returns the stake and rewards of a removed validator.
    fn complete_validator_removal(
        &self,
        acknowledgement: &SignedMessage,
    ) -> impl Future<Output = GatewayResult<PendingTx>> + Send;

    // ── Delegators ───────────────────────────────────────────────────

    /// Locks delegated stake and emits the weight-increase message.
    fn initiate_delegator_registration(
        &self,
        params: &DelegationParams,
    ) -> impl Future<Output = GatewayResult<PendingTx>> + Send;

    /// Activates a delegation once the platform chain acknowledged the new weight.
    fn complete_delegator_registration(
        &self,
        delegation_id: DelegationId,
        acknowledgement: &SignedMessage,
    ) -> impl Future<Output = GatewayResult<PendingTx>> + Send;

    /// Emits the weight-decrease message for a delegation, optionally attesting the uptime of
    /// its validator.
    fn initiate_delegator_removal(
        &self,
        delegation_id: DelegationId,
        uptime_proof: Option<&SignedMessage>,
    ) -> impl Future<Output = GatewayResult<PendingTx>> + Send;

    /// Returns the stake and rewards of a removed delegation.
    fn complete_delegator_removal(
        &self,
        delegation_id: DelegationId,
        acknowledgement: &SignedMessage,
    ) -> impl Future<Output = GatewayResult<PendingTx>> + Send;

    /// Pays out the delegation fees accumulated by a validator.
    fn claim_delegation_fees(
        &self,
        validation_id: ValidationId,
    ) -> impl Future<Output = GatewayResult<PendingTx>> + Send;

    // ── Views ────────────────────────────────────────────────────────

    /// Gets, if present, the [`Validator`] for `validation_id`.
    fn get_validator(
        &self,
        validation_id: ValidationId,
    ) -> impl Future<Output = GatewayResult<Option<Validator>>> + Send;

    /// Gets, if present, the [`Delegation`] for `delegation_id`.
    fn get_delegator(
        &self,
        delegation_id: DelegationId,
    ) -> impl Future<Output = GatewayResult<Option<Delegation>>> + Send;

    /// Returns the delegation fees `validation_id` can claim.
    fn value_to_claim(
        &self,
        validation_id: ValidationId,
    ) -> impl Future<Output = GatewayResult<U256>> + Send;
}
