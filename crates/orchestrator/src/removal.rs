//! Drives validator and delegation removals from intent to returned stake.

use std::sync::Arc;

use pchain_submitter::PlatformChainClient;
use stakeflow_db::OperationDb;
use stakeflow_primitives::{
    errors::StepName,
    operation::{DelegationRemovalParams, StakeIntent, ValidatorRemovalParams},
};
use warp_signer::{SignatureAggregator, UptimeSource};

use crate::{
    artifacts::{Completed, Initiated, MessageSigned, PlatformConfirmed},
    context::{ExecutionChain, StakeContext},
    errors::StepError,
    saga::Family,
};

/// The removal saga: `initiate` → `sign` → `submit_to_platform` → `complete`.
///
/// When asked to, `initiate` first fetches the validator's uptime, has it signed with the same
/// quorum descent as any other message and attaches the proof to the initiating transaction.
#[derive(Debug)]
pub struct RemovalOrchestrator<G, A, P, U, D> {
    ctx: Arc<StakeContext<G, A, P, U, D>>,
}

impl<G, A, P, U, D> Clone for RemovalOrchestrator<G, A, P, U, D> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
        }
    }
}

impl<G, A, P, U, D> RemovalOrchestrator<G, A, P, U, D>
where
    G: ExecutionChain,
    A: SignatureAggregator,
    P: PlatformChainClient,
    U: UptimeSource,
    D: OperationDb,
{
    /// Creates an orchestrator sharing `ctx`.
    pub const fn new(ctx: Arc<StakeContext<G, A, P, U, D>>) -> Self {
        Self { ctx }
    }

    /// Starts removing a validator and waits for the weight-zero message.
    pub async fn initiate_validator_removal(
        &self,
        params: ValidatorRemovalParams,
    ) -> Result<Initiated, StepError> {
        self.ctx.initiate(StakeIntent::RemoveValidator(params)).await
    }

    /// Starts removing a delegation and waits for the weight-decrease message.
    pub async fn initiate_delegation_removal(
        &self,
        params: DelegationRemovalParams,
    ) -> Result<Initiated, StepError> {
        self.ctx.initiate(StakeIntent::RemoveDelegation(params)).await
    }

    /// Aggregates signatures over the emitted message.
    pub async fn sign(&self, initiated: &Initiated) -> Result<MessageSigned, StepError> {
        Family::Removal.ensure(initiated.kind, initiated.key, StepName::Sign)?;
        self.ctx.sign(initiated).await
    }

    /// Lowers the validator's weight on the platform chain.
    pub async fn submit_to_platform(
        &self,
        signed: &MessageSigned,
    ) -> Result<PlatformConfirmed, StepError> {
        Family::Removal.ensure(signed.kind, signed.key, StepName::SubmitToPlatform)?;
        self.ctx.submit_to_platform(signed).await
    }

    /// Consumes the platform chain's acknowledgement and releases the stake.
    pub async fn complete(&self, confirmed: &PlatformConfirmed) -> Result<Completed, StepError> {
        Family::Removal.ensure(confirmed.kind, confirmed.key, StepName::Complete)?;
        self.ctx.complete(confirmed).await
    }
}
