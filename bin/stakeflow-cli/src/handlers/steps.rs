//! Handlers that advance an operation by one step.

use anyhow::Result;
use pchain_submitter::PlatformChainClient;
use stakeflow_db::OperationDb;
use stakeflow_orchestrator::{
    artifacts::{Initiated, MessageSigned, PlatformConfirmed},
    ExecutionChain,
};
use stakeflow_primitives::operation::{
    DelegationParams, DelegationRemovalParams, ValidatorRegistrationParams,
    ValidatorRemovalParams,
};
use tracing::info;
use warp_signer::{SignatureAggregator, UptimeSource};

use super::{
    output::{emit, read_artifact},
    Session,
};
use crate::cli::{
    AddDelegationArgs, ClaimFeesArgs, RegisterValidatorArgs, RemoveDelegationArgs,
    RemoveValidatorArgs, StepArgs,
};

impl<G, A, P, U, D> Session<G, A, P, U, D>
where
    G: ExecutionChain,
    A: SignatureAggregator,
    P: PlatformChainClient,
    U: UptimeSource,
    D: OperationDb,
{
    pub(super) async fn register_validator(&self, args: RegisterValidatorArgs) -> Result<()> {
        let params = ValidatorRegistrationParams {
            node_id: args.node_id,
            bls_public_key: args.bls_public_key,
            bls_proof_of_possession: args.bls_pop,
            stake: args.stake,
            min_stake_duration: args.min_stake_duration,
            delegation_fee_bips: args.delegation_fee_bips,
            reward_recipient: args.reward_recipient.unwrap_or(self.sender),
        };
        info!(action = "initiating validator registration", node_id = %params.node_id);

        let result = self.registration.initiate_validator(params).await;
        emit(result, args.output.out.as_deref())
    }

    pub(super) async fn add_delegation(&self, args: AddDelegationArgs) -> Result<()> {
        let params = DelegationParams {
            validation_id: args.validation_id,
            delegator: self.sender,
            stake: args.stake,
            reward_recipient: args.reward_recipient.unwrap_or(self.sender),
        };
        info!(
            action = "initiating delegation",
            validation_id = %params.validation_id,
            delegator = %params.delegator
        );

        let result = self.registration.initiate_delegation(params).await;
        emit(result, args.output.out.as_deref())
    }

    pub(super) async fn remove_validator(&self, args: RemoveValidatorArgs) -> Result<()> {
        let params = ValidatorRemovalParams {
            validation_id: args.validation_id,
            include_uptime_proof: args.uptime_proof,
        };
        info!(action = "initiating validator removal", validation_id = %params.validation_id);

        let result = self.removal.initiate_validator_removal(params).await;
        emit(result, args.output.out.as_deref())
    }

    pub(super) async fn remove_delegation(&self, args: RemoveDelegationArgs) -> Result<()> {
        let params = DelegationRemovalParams {
            delegation_id: args.delegation_id,
            include_uptime_proof: args.uptime_proof,
        };
        info!(action = "initiating delegation removal", delegation_id = %params.delegation_id);

        let result = self.removal.initiate_delegation_removal(params).await;
        emit(result, args.output.out.as_deref())
    }

    pub(super) async fn sign(&self, args: StepArgs) -> Result<()> {
        let initiated: Initiated = read_artifact(&args.artifact)?;
        info!(action = "aggregating signatures", key = %initiated.key);

        let result = if initiated.kind.is_registration() {
            self.registration.sign(&initiated).await
        } else {
            self.removal.sign(&initiated).await
        };
        emit(result, args.output.out.as_deref())
    }

    pub(super) async fn submit(&self, args: StepArgs) -> Result<()> {
        let signed: MessageSigned = read_artifact(&args.artifact)?;
        info!(action = "submitting to the platform chain", key = %signed.key);

        let result = if signed.kind.is_registration() {
            self.registration.submit_to_platform(&signed).await
        } else {
            self.removal.submit_to_platform(&signed).await
        };
        emit(result, args.output.out.as_deref())
    }

    pub(super) async fn complete(&self, args: StepArgs) -> Result<()> {
        let confirmed: PlatformConfirmed = read_artifact(&args.artifact)?;
        info!(
            action = "completing",
            key = %confirmed.key,
            message_index = confirmed.message_index
        );

        let result = if confirmed.kind.is_registration() {
            self.registration.complete(&confirmed).await
        } else {
            self.removal.complete(&confirmed).await
        };
        emit(result, args.output.out.as_deref())
    }

    pub(super) async fn claim_fees(&self, args: ClaimFeesArgs) -> Result<()> {
        info!(action = "claiming delegation fees", validation_id = %args.validation_id);

        let result = self.fees.claim(args.validation_id).await;
        emit(result, None)
    }
}
