//! Drives validator registrations and delegations from intent to active weight.

use std::sync::Arc;

use pchain_submitter::PlatformChainClient;
use stakeflow_db::OperationDb;
use stakeflow_primitives::{
    errors::StepName,
    operation::{DelegationParams, StakeIntent, ValidatorRegistrationParams},
};
use warp_signer::{SignatureAggregator, UptimeSource};

use crate::{
    artifacts::{Completed, Initiated, MessageSigned, PlatformConfirmed},
    context::{ExecutionChain, StakeContext},
    errors::StepError,
    saga::Family,
};

/// The registration saga: `initiate` → `sign` → `submit_to_platform` → `complete`.
///
/// Each step is called by the user with the artifact returned by the previous one. A step that
/// already succeeded returns its recorded artifact instead of running again.
#[derive(Debug)]
pub struct RegistrationOrchestrator<G, A, P, U, D> {
    ctx: Arc<StakeContext<G, A, P, U, D>>,
}

impl<G, A, P, U, D> Clone for RegistrationOrchestrator<G, A, P, U, D> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
        }
    }
}

impl<G, A, P, U, D> RegistrationOrchestrator<G, A, P, U, D>
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

    /// Locks the stake of a new validator and waits for the registration message.
    pub async fn initiate_validator(
        &self,
        params: ValidatorRegistrationParams,
    ) -> Result<Initiated, StepError> {
        self.ctx
            .initiate(StakeIntent::RegisterValidator(params))
            .await
    }

    /// Locks delegated stake and waits for the weight-increase message.
    pub async fn initiate_delegation(
        &self,
        params: DelegationParams,
    ) -> Result<Initiated, StepError> {
        self.ctx.initiate(StakeIntent::AddDelegation(params)).await
    }

    /// Aggregates signatures over the emitted message.
    pub async fn sign(&self, initiated: &Initiated) -> Result<MessageSigned, StepError> {
        Family::Registration.ensure(initiated.kind, initiated.key, StepName::Sign)?;
        self.ctx.sign(initiated).await
    }

    /// Registers the validator, or raises its weight, on the platform chain.
    pub async fn submit_to_platform(
        &self,
        signed: &MessageSigned,
    ) -> Result<PlatformConfirmed, StepError> {
        Family::Registration.ensure(signed.kind, signed.key, StepName::SubmitToPlatform)?;
        self.ctx.submit_to_platform(signed).await
    }

    /// Consumes the platform chain's acknowledgement and activates the validator or delegation.
    pub async fn complete(&self, confirmed: &PlatformConfirmed) -> Result<Completed, StepError> {
        Family::Registration.ensure(confirmed.kind, confirmed.key, StepName::Complete)?;
        self.ctx.complete(confirmed).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use stakeflow_db::InMemoryOperationDb;
    use stakeflow_primitives::{
        errors::ErrorKind,
        ids::ValidationId,
        operation::{OperationKey, OperationKind, OperationPhase},
        records::StakeStatus,
    };
    use stakeflow_test_utils::{
        fixtures::{delegation_params, validator_params},
        SimNetwork,
    };
    use staking_manager::StakingManager;

    use super::*;
    use crate::{
        artifacts::StakeEntity,
        testing::{sim_context, sim_context_with_db, SimContext},
    };

    type SimRegistration = RegistrationOrchestrator<
        SimNetwork,
        SimNetwork,
        SimNetwork,
        SimNetwork,
        stakeflow_db::InMemoryOperationDb,
    >;

    fn orchestrator(net: &SimNetwork) -> (SimRegistration, Arc<SimContext>) {
        let ctx = sim_context(net);
        (RegistrationOrchestrator::new(ctx.clone()), ctx)
    }

    async fn confirmed_registration(
        registration: &SimRegistration,
        node_byte: u8,
        stake: u64,
    ) -> PlatformConfirmed {
        let initiated = registration
            .initiate_validator(validator_params(node_byte, stake))
            .await
            .unwrap();
        let signed = registration.sign(&initiated).await.unwrap();
        registration.submit_to_platform(&signed).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn registration_activates_validator_with_requested_weight() {
        let net = SimNetwork::default();
        let (registration, ctx) = orchestrator(&net);

        let initiated = registration
            .initiate_validator(validator_params(1, 100))
            .await
            .unwrap();
        assert_eq!(initiated.kind, OperationKind::RegisterValidator);

        let signed = registration.sign(&initiated).await.unwrap();
        assert_eq!(signed.signed.quorum_used, 67);

        let confirmed = registration.submit_to_platform(&signed).await.unwrap();
        let validation_id = ValidationId::from(confirmed.derived_id);
        assert_eq!(net.platform_weight(validation_id), Some(100));

        let completed = registration.complete(&confirmed).await.unwrap();
        let StakeEntity::Validator(validator) = completed.entity else {
            panic!("expected a validator, got {:?}", completed.entity);
        };
        assert_eq!(validator.status, StakeStatus::Active);
        assert_eq!(validator.weight, 100);
        assert!(completed.settlement.is_none());

        let op = ctx.operation(initiated.key).await.unwrap().unwrap();
        assert_eq!(op.phase, OperationPhase::Completed);
        assert_eq!(op.artifacts.complete_tx, Some(completed.tx_hash));
    }

    #[tokio::test(start_paused = true)]
    async fn second_complete_is_rejected_without_changing_weight() {
        let net = SimNetwork::default();
        let (registration, _ctx) = orchestrator(&net);
        let confirmed = confirmed_registration(&registration, 2, 100).await;

        registration.complete(&confirmed).await.unwrap();
        let broadcasts = net.broadcast_count();

        let err = registration.complete(&confirmed).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PlatformChainRejection);
        assert_eq!(err.step, StepName::Complete);
        assert_eq!(net.broadcast_count(), broadcasts);

        // A session without the record is stopped by the contract instead.
        let (fresh, _) = orchestrator(&net);
        let err = fresh.complete(&confirmed).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PlatformChainRejection);

        let validator = net
            .get_validator(ValidationId::from(confirmed.derived_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(validator.weight, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_initiate_is_reconciled_without_resubmitting() {
        let net = SimNetwork::default();
        let (registration, ctx) = orchestrator(&net);
        net.stall_receipts(true);

        let err = registration
            .initiate_validator(validator_params(3, 100))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TransactionTimeout);
        let tx_hash = err.tx_hash.unwrap();

        let op = ctx.operation(err.key).await.unwrap().unwrap();
        assert_eq!(op.phase, OperationPhase::Initiated);
        assert_eq!(op.artifacts.initiate_tx, Some(tx_hash));
        assert_eq!(
            op.last_error.map(|failure| failure.kind),
            Some(ErrorKind::TransactionTimeout)
        );

        assert!(ctx.check_tx(tx_hash).await.unwrap().is_none());
        net.release_receipts();
        assert!(ctx.check_tx(tx_hash).await.unwrap().unwrap().success);

        let initiated = registration
            .initiate_validator(validator_params(3, 100))
            .await
            .unwrap();
        assert_eq!(initiated.tx_hash, tx_hash);
        assert_eq!(net.broadcast_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reinitiating_returns_the_recorded_artifact() {
        let net = SimNetwork::default();
        let (registration, _ctx) = orchestrator(&net);

        let first = registration
            .initiate_validator(validator_params(4, 100))
            .await
            .unwrap();
        registration.sign(&first).await.unwrap();

        let again = registration
            .initiate_validator(validator_params(4, 100))
            .await
            .unwrap();
        assert_eq!(again, first);

        let mut other = validator_params(4, 100);
        other.stake = alloy_primitives::U256::from(200u64);
        let err = registration.initiate_validator(other).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPhase);
        assert_eq!(net.broadcast_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_initiates_for_one_key_are_exclusive() {
        let net = SimNetwork::default();
        let (registration, ctx) = orchestrator(&net);
        net.set_receipt_delay(3);

        let (first, second) = tokio::join!(
            registration.initiate_validator(validator_params(5, 100)),
            registration.initiate_validator(validator_params(5, 100)),
        );

        let results = [first, second];
        let in_flight = results
            .iter()
            .filter(|res| matches!(res, Err(err) if err.kind == ErrorKind::OperationInFlight))
            .count();
        assert_eq!(in_flight, 1);
        assert_eq!(results.iter().filter(|res| res.is_ok()).count(), 1);
        assert_eq!(net.broadcast_count(), 1);

        let key = OperationKey::Node(validator_params(5, 100).node_id);
        assert!(!ctx.in_flight().is_in_flight(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_sharing_a_store_broadcast_once() {
        let net = SimNetwork::default();
        let db = InMemoryOperationDb::default();
        let first = RegistrationOrchestrator::new(sim_context_with_db(&net, db.clone()));
        let second = RegistrationOrchestrator::new(sim_context_with_db(&net, db.clone()));
        // keeps the first session inside the wallet prompt while the second one starts
        net.set_wallet_delay(Duration::from_secs(5));

        let (initiated, rejected) = tokio::join!(
            first.initiate_validator(validator_params(15, 100)),
            second.initiate_validator(validator_params(15, 100)),
        );

        let initiated = initiated.unwrap();
        let err = rejected.unwrap_err();
        assert_eq!(err.kind, ErrorKind::OperationInFlight);
        assert!(err.tx_hash.is_none());
        assert_eq!(net.broadcast_count(), 1);

        let op = db.get_operation(initiated.key).await.unwrap().unwrap();
        assert_eq!(op.claimed_at, None);
        assert_eq!(op.artifacts.initiate_tx, Some(initiated.tx_hash));

        let again = second
            .initiate_validator(validator_params(15, 100))
            .await
            .unwrap();
        assert_eq!(again, initiated);
        assert_eq!(net.broadcast_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_initiate_releases_the_key_and_resumes_on_the_same_tx() {
        let net = SimNetwork::default();
        let (registration, ctx) = orchestrator(&net);
        let key = OperationKey::Node(validator_params(16, 100).node_id);
        net.stall_receipts(true);

        let dropped = tokio::time::timeout(
            Duration::from_secs(1),
            registration.initiate_validator(validator_params(16, 100)),
        )
        .await;
        assert!(dropped.is_err(), "initiate should still be waiting");
        assert!(!ctx.in_flight().is_in_flight(&key));

        let op = ctx.operation(key).await.unwrap().unwrap();
        let tx_hash = op.artifacts.initiate_tx.unwrap();
        assert_eq!(op.phase, OperationPhase::Initiated);

        net.release_receipts();
        let initiated = registration
            .initiate_validator(validator_params(16, 100))
            .await
            .unwrap();
        assert_eq!(initiated.tx_hash, tx_hash);
        assert_eq!(net.broadcast_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn adopted_signature_times_out_and_resumes_on_the_same_platform_tx() {
        let net = SimNetwork::default();
        let (registration, _ctx) = orchestrator(&net);
        let initiated = registration
            .initiate_validator(validator_params(17, 100))
            .await
            .unwrap();
        let signed = registration.sign(&initiated).await.unwrap();

        // another session that only has the artifact
        let (fresh, fresh_ctx) = orchestrator(&net);
        net.set_platform_delay(150);
        let err = fresh.submit_to_platform(&signed).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TransactionTimeout);
        let tx_id = err.platform_tx_id.unwrap();

        let op = fresh_ctx.operation(signed.key).await.unwrap().unwrap();
        assert!(op.intent.is_none());
        assert_eq!(op.phase, OperationPhase::PlatformChainSubmitted);
        assert_eq!(op.artifacts.platform_tx_id, Some(tx_id));

        let confirmed = fresh.submit_to_platform(&signed).await.unwrap();
        assert_eq!(confirmed.platform_tx_id, tx_id);
        assert_eq!(net.platform_tx_count(), 1);

        let completed = fresh.complete(&confirmed).await.unwrap();
        assert_eq!(completed.entity.weight(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn quorum_descent_is_reported_on_the_artifact() {
        let net = SimNetwork::default();
        let (registration, _ctx) = orchestrator(&net);
        let initiated = registration
            .initiate_validator(validator_params(6, 100))
            .await
            .unwrap();

        net.set_available_stake(50);
        let signed = registration.sign(&initiated).await.unwrap();

        assert_eq!(signed.signed.quorum_used, 50);
        assert_eq!(net.quorum_requests(), vec![67, 50]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_quorums_fail_and_retry_resumes() {
        let net = SimNetwork::default();
        let (registration, ctx) = orchestrator(&net);
        let initiated = registration
            .initiate_validator(validator_params(7, 100))
            .await
            .unwrap();

        net.set_available_stake(20);
        let err = registration.sign(&initiated).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::SignatureAggregationFailure);
        assert_eq!(err.attempted_quorums, vec![67, 50, 33]);

        let op = ctx.operation(initiated.key).await.unwrap().unwrap();
        assert_eq!(op.phase, OperationPhase::Failed);
        assert_eq!(op.checkpoint, OperationPhase::Initiated);

        net.set_available_stake(100);
        let signed = registration.sign(&initiated).await.unwrap();
        assert_eq!(signed.signed.quorum_used, 67);
        assert_eq!(net.broadcast_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_message_index_is_rejected() {
        let net = SimNetwork::default();
        let (registration, _ctx) = orchestrator(&net);
        let mut confirmed = confirmed_registration(&registration, 8, 100).await;

        confirmed.message_index += 5;
        let err = registration.complete(&confirmed).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::InvalidPhase);
        assert_eq!(net.broadcast_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_platform_tx_rewinds_to_signed() {
        let net = SimNetwork::default();
        let (registration, ctx) = orchestrator(&net);
        let initiated = registration
            .initiate_validator(validator_params(9, 100))
            .await
            .unwrap();
        let signed = registration.sign(&initiated).await.unwrap();

        net.drop_next_platform_tx("insufficient fee balance");
        let err = registration.submit_to_platform(&signed).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PlatformChainRejection);
        assert!(err.platform_tx_id.is_some());

        let op = ctx.operation(signed.key).await.unwrap().unwrap();
        assert_eq!(op.checkpoint, OperationPhase::MessageSigned);
        assert!(op.artifacts.platform_tx_id.is_none());

        let confirmed = registration.submit_to_platform(&signed).await.unwrap();
        assert_ne!(Some(confirmed.platform_tx_id), err.platform_tx_id);
        assert_eq!(net.platform_tx_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reverted_initiate_fails_and_can_be_retried() {
        let net = SimNetwork::default();
        let (registration, ctx) = orchestrator(&net);
        net.revert_next_tx();

        let err = registration
            .initiate_validator(validator_params(10, 100))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TransactionReverted);
        assert!(err.tx_hash.is_some());

        let op = ctx.operation(err.key).await.unwrap().unwrap();
        assert_eq!(op.phase, OperationPhase::Failed);

        registration
            .initiate_validator(validator_params(10, 100))
            .await
            .unwrap();
        assert_eq!(net.broadcast_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wallet_rejection_is_reported() {
        let net = SimNetwork::default();
        let (registration, _ctx) = orchestrator(&net);
        net.set_wallet_rejects(true);

        let err = registration
            .initiate_validator(validator_params(11, 100))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::UserRejectedSigning);
        assert_eq!(err.key, OperationKey::Node(validator_params(11, 100).node_id));
        assert_eq!(net.broadcast_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn delegation_adds_weight_to_the_validator() {
        let net = SimNetwork::default();
        let (registration, _ctx) = orchestrator(&net);
        let confirmed = confirmed_registration(&registration, 12, 100).await;
        registration.complete(&confirmed).await.unwrap();
        let validation_id = ValidationId::from(confirmed.derived_id);

        let initiated = registration
            .initiate_delegation(delegation_params(validation_id, 0xd1, 40))
            .await
            .unwrap();
        assert_eq!(initiated.kind, OperationKind::AddDelegation);
        let signed = registration.sign(&initiated).await.unwrap();
        let confirmed = registration.submit_to_platform(&signed).await.unwrap();
        let completed = registration.complete(&confirmed).await.unwrap();

        let StakeEntity::Delegation(delegation) = completed.entity else {
            panic!("expected a delegation, got {:?}", completed.entity);
        };
        assert_eq!(delegation.status, StakeStatus::Active);
        assert_eq!(delegation.weight, 40);
        assert_eq!(net.platform_weight(validation_id), Some(140));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_platform_chain_times_out_and_resumes() {
        let net = SimNetwork::default();
        let (registration, ctx) = orchestrator(&net);
        let initiated = registration
            .initiate_validator(validator_params(13, 100))
            .await
            .unwrap();
        let signed = registration.sign(&initiated).await.unwrap();

        // More polls than fit in one finality budget, fewer than fit in two.
        net.set_platform_delay(150);
        let err = registration.submit_to_platform(&signed).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TransactionTimeout);
        let tx_id = err.platform_tx_id.unwrap();
        let op = ctx.operation(signed.key).await.unwrap().unwrap();
        assert_eq!(op.phase, OperationPhase::PlatformChainSubmitted);
        assert_eq!(op.artifacts.platform_tx_id, Some(tx_id));

        let confirmed = registration.submit_to_platform(&signed).await.unwrap();
        assert_eq!(confirmed.platform_tx_id, tx_id);
        assert_eq!(net.platform_tx_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn removal_artifacts_are_refused() {
        let net = SimNetwork::default();
        let (registration, _ctx) = orchestrator(&net);
        let mut initiated = registration
            .initiate_validator(validator_params(14, 100))
            .await
            .unwrap();

        initiated.kind = OperationKind::RemoveValidator;
        let err = registration.sign(&initiated).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPhase);
    }
}
