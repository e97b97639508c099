//! The steps shared by the registration and removal sagas.
//!
//! Every step takes the in-flight guard for its key, loads (or adopts) the persisted operation,
//! does its one piece of work and persists the outcome before returning. A step never resubmits a
//! transaction whose hash is already recorded; it waits on the recorded one instead.

use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::{B256, U256};
use pchain_submitter::{PlatformChainClient, SubmitError};
use stakeflow_db::OperationDb;
use stakeflow_primitives::{
    errors::{ErrorKind, StepName},
    events::{PendingTx, Receipt, StakingEvent},
    ids::{DelegationId, ValidationId},
    operation::{
        OperationKey, OperationKind, OperationPhase, Settlement, StakeIntent, StakeOperation,
    },
    records::StakeStatus,
    warp::SignedMessage,
};
use staking_manager::{GatewayError, StakingManager};
use tracing::{debug, error, info, warn};
use warp_signer::{SignatureAggregator, UptimeSource};

use crate::{
    artifacts::{Completed, Initiated, MessageSigned, PlatformConfirmed, StakeEntity},
    context::{ExecutionChain, StakeContext},
    errors::StepError,
    guard::InFlightGuard,
};

/// Which half of the lifecycle an orchestrator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Family {
    Registration,
    Removal,
}

impl Family {
    /// Rejects artifacts of the other half of the lifecycle.
    pub(crate) fn ensure(
        self,
        kind: OperationKind,
        key: OperationKey,
        step: StepName,
    ) -> Result<(), StepError> {
        let matches = match self {
            Self::Registration => kind.is_registration(),
            Self::Removal => kind.is_removal(),
        };
        if matches {
            return Ok(());
        }

        Err(StepError::invalid_phase(
            key,
            step,
            format!("{kind} is not handled by the {self:?} orchestrator"),
        ))
    }
}

impl<G, A, P, U, D> StakeContext<G, A, P, U, D>
where
    G: ExecutionChain,
    A: SignatureAggregator,
    P: PlatformChainClient,
    U: UptimeSource,
    D: OperationDb,
{
    // ── Step plumbing ────────────────────────────────────────────────

    pub(crate) fn acquire(
        &self,
        key: OperationKey,
        step: StepName,
    ) -> Result<InFlightGuard, StepError> {
        self.in_flight.try_acquire(key).ok_or_else(|| {
            warn!(%key, %step, "rejecting step, another one is in flight");
            StepError::in_flight(key, step)
        })
    }

    async fn load(
        &self,
        key: OperationKey,
        step: StepName,
    ) -> Result<Option<StakeOperation>, StepError> {
        self.db
            .get_operation(key)
            .await
            .map_err(|e| StepError::storage(key, step, &e))
    }

    async fn save(&self, op: &StakeOperation, step: StepName) -> Result<(), StepError> {
        self.db
            .put_operation(op)
            .await
            .map_err(|e| StepError::storage(op.key, step, &e))
    }

    /// Loads the operation a later step continues, rebuilding it from the caller's artifact if
    /// this store has never seen it.
    async fn checkout(
        &self,
        kind: OperationKind,
        key: OperationKey,
        step: StepName,
        adopt: impl FnOnce() -> StakeOperation,
    ) -> Result<StakeOperation, StepError> {
        let existing = self.load(key, step).await?;
        resume_or_adopt(existing, kind, key, step, adopt)
    }

    /// Records `err` on the operation and returns it.
    ///
    /// Timeouts leave the phase alone since the transaction may still land. Caller errors leave
    /// the record untouched.
    async fn fail_step(&self, op: &mut StakeOperation, err: StepError) -> StepError {
        if err.is_caller_error() {
            return err;
        }

        if err.is_timeout() {
            warn!(
                key = %op.key,
                step = %err.step,
                tx_hash = ?err.tx_hash,
                "step timed out, outcome unknown"
            );
            op.note_error(err.to_failure());
        } else {
            error!(key = %op.key, step = %err.step, kind = %err.kind, %err, "step failed");
            op.fail(err.to_failure());
        }

        if let Err(db_err) = self.db.put_operation(op).await {
            error!(key = %op.key, %db_err, "could not persist failed step");
        }

        err
    }

    // ── Initiate ─────────────────────────────────────────────────────

    pub(crate) async fn initiate(&self, intent: StakeIntent) -> Result<Initiated, StepError> {
        let key = intent.key();
        let step = StepName::Initiate;
        if let Some(field) = zero_identifier(&intent) {
            return Err(StepError::new(
                key,
                step,
                ErrorKind::InvalidKey,
                format!("{field} must not be zero"),
            ));
        }
        let _guard = self.acquire(key, step)?;

        let mut op = match self.load(key, step).await? {
            None => StakeOperation::new(intent.clone()),
            Some(existing) if existing.phase == OperationPhase::Completed => {
                info!(%key, "previous operation completed, starting a new one");
                StakeOperation::new(intent.clone())
            }
            Some(existing) if is_restartable(&existing, &intent) => {
                info!(%key, "previous operation failed before broadcasting, starting a new one");
                StakeOperation::new(intent.clone())
            }
            Some(existing) => {
                let same_intent = existing.kind == intent.kind()
                    && existing.intent.as_ref().map_or(true, |recorded| *recorded == intent);
                if !same_intent {
                    return Err(StepError::invalid_phase(
                        key,
                        step,
                        format!(
                            "a {} with other parameters is pending ({})",
                            existing.kind, existing.phase
                        ),
                    ));
                }

                if existing.phase == OperationPhase::Failed {
                    existing.resumed()
                } else {
                    existing
                }
            }
        };

        if let Some(initiated) = Initiated::from_operation(&op) {
            info!(
                %key,
                tx_hash = %initiated.tx_hash,
                "already initiated, returning recorded artifact"
            );
            return Ok(initiated);
        }
        if op.reached(OperationPhase::MessageSigned) {
            return Err(StepError::invalid_phase(
                key,
                step,
                format!("operation is already {}", op.checkpoint),
            ));
        }

        let pending = match op.artifacts.initiate_tx {
            Some(tx_hash) => {
                info!(%key, %tx_hash, "waiting on recorded initiate transaction");
                PendingTx::new(tx_hash)
            }
            None => {
                self.claim_broadcast(&mut op, step).await?;
                let pending = match self.send_initiate(&mut op, &intent).await {
                    Ok(pending) => pending,
                    Err(err) => return Err(self.fail_step(&mut op, err).await),
                };
                op.artifacts.initiate_tx = Some(pending.tx_hash);
                op.claimed_at = None;
                self.save(&op, step)
                    .await
                    .map_err(|e| e.with_tx(pending.tx_hash))?;

                info!(
                    %key,
                    kind = %op.kind,
                    tx_hash = %pending.tx_hash,
                    "initiate transaction broadcast"
                );
                pending
            }
        };

        let receipt = match self.waiter.wait(&pending, None).await {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.fail_step(&mut op, StepError::wait(key, step, &e)).await),
        };
        if !receipt.success {
            op.artifacts.initiate_tx = None;
            let err = StepError::new(
                key,
                step,
                ErrorKind::TransactionReverted,
                "initiate transaction reverted",
            )
            .with_tx(receipt.tx_hash);
            return Err(self.fail_step(&mut op, err).await);
        }

        let derived_id = match record_initiation(&mut op, &receipt) {
            Ok(derived_id) => derived_id,
            Err(reason) => {
                let err = StepError::ledger_mismatch(key, step, reason).with_tx(receipt.tx_hash);
                return Err(self.fail_step(&mut op, err).await);
            }
        };
        let Some(message) = receipt.warp_message().cloned() else {
            let err = StepError::ledger_mismatch(key, step, "no cross-chain message was emitted")
                .with_tx(receipt.tx_hash);
            return Err(self.fail_step(&mut op, err).await);
        };
        op.artifacts.unsigned_message = Some(message.clone());
        op.advance(OperationPhase::Initiated);
        self.save(&op, step)
            .await
            .map_err(|e| e.with_tx(receipt.tx_hash))?;

        info!(
            %key,
            %derived_id,
            message_id = %message.id(),
            block = receipt.block_number,
            "operation initiated"
        );
        Ok(Initiated {
            key,
            kind: op.kind,
            tx_hash: receipt.tx_hash,
            derived_id,
            message,
            uptime_quorum: op.artifacts.uptime_quorum,
        })
    }

    /// Records in the store that this session is about to broadcast for the key.
    ///
    /// The in-flight guard only covers this process; the claim keeps other processes sharing the
    /// store from broadcasting a second `initiate*` transaction meanwhile.
    async fn claim_broadcast(
        &self,
        op: &mut StakeOperation,
        step: StepName,
    ) -> Result<(), StepError> {
        let key = op.key;
        let now = unix_now();
        let stale_before = now.saturating_sub(self.params.timeouts.broadcast_claim.as_secs());
        let held_since = op.claimed_at;

        op.claimed_at = Some(now);
        let claimed = self
            .db
            .claim_operation(op, stale_before)
            .await
            .map_err(|e| StepError::storage(key, step, &e))?;
        if !claimed {
            let held_since = held_since.unwrap_or(now);
            warn!(%key, %step, held_since, "rejecting step, another session is broadcasting");
            return Err(StepError::claimed_elsewhere(key, step, held_since));
        }

        debug!(%key, claimed_at = now, "claimed key for broadcast");
        Ok(())
    }

    async fn send_initiate(
        &self,
        op: &mut StakeOperation,
        intent: &StakeIntent,
    ) -> Result<PendingTx, StepError> {
        let key = op.key;
        let step = StepName::Initiate;

        let sent = match intent {
            StakeIntent::RegisterValidator(params) => {
                self.gateway.initiate_validator_registration(params).await
            }
            StakeIntent::AddDelegation(params) => {
                self.gateway.initiate_delegator_registration(params).await
            }
            StakeIntent::RemoveValidator(params) => {
                let proof = if params.include_uptime_proof {
                    Some(self.prove_uptime(op, params.validation_id).await?)
                } else {
                    None
                };
                self.gateway
                    .initiate_validator_removal(params.validation_id, proof.as_ref())
                    .await
            }
            StakeIntent::RemoveDelegation(params) => {
                let proof = if params.include_uptime_proof {
                    let validation_id =
                        self.delegated_validator(key, params.delegation_id).await?;
                    Some(self.prove_uptime(op, validation_id).await?)
                } else {
                    None
                };
                self.gateway
                    .initiate_delegator_removal(params.delegation_id, proof.as_ref())
                    .await
            }
        };

        sent.map_err(|e| StepError::gateway(key, step, &e))
    }

    async fn delegated_validator(
        &self,
        key: OperationKey,
        delegation_id: DelegationId,
    ) -> Result<ValidationId, StepError> {
        let step = StepName::Initiate;
        let delegation = self
            .gateway
            .get_delegator(delegation_id)
            .await
            .map_err(|e| StepError::gateway(key, step, &e))?
            .ok_or_else(|| {
                StepError::new(
                    key,
                    step,
                    ErrorKind::InvalidKey,
                    format!("unknown delegation {delegation_id}"),
                )
            })?;

        Ok(delegation.validation_id)
    }

    async fn prove_uptime(
        &self,
        op: &mut StakeOperation,
        validation_id: ValidationId,
    ) -> Result<SignedMessage, StepError> {
        let proof = self
            .uptime
            .prove(&self.signer, validation_id, self.signing_subnet_id)
            .await
            .map_err(|e| StepError::uptime(op.key, StepName::Initiate, &e))?;
        op.artifacts.uptime_secs = Some(proof.uptime_secs);
        op.artifacts.uptime_quorum = Some(proof.signed.quorum_used);

        Ok(proof.signed)
    }

    // ── Sign ─────────────────────────────────────────────────────────

    pub(crate) async fn sign(&self, initiated: &Initiated) -> Result<MessageSigned, StepError> {
        let key = initiated.key;
        let step = StepName::Sign;
        let _guard = self.acquire(key, step)?;

        let mut op = self
            .checkout(initiated.kind, key, step, || initiated.adopt())
            .await?;

        if op.reached(OperationPhase::MessageSigned) {
            return MessageSigned::from_operation(&op)
                .filter(|signed| signed.derived_id == initiated.derived_id)
                .inspect(|_| info!(%key, "already signed, returning recorded artifact"))
                .ok_or_else(|| {
                    StepError::invalid_phase(
                        key,
                        step,
                        format!("operation is already {}", op.checkpoint),
                    )
                });
        }
        if op.artifacts.derived_id.is_none() {
            return Err(StepError::invalid_phase(
                key,
                step,
                "initiate transaction has not been confirmed",
            ));
        }
        if op.artifacts.derived_id != Some(initiated.derived_id)
            || op.artifacts.unsigned_message.as_ref() != Some(&initiated.message)
        {
            return Err(StepError::invalid_phase(
                key,
                step,
                "artifact does not match the recorded operation",
            ));
        }

        let signed = match self
            .signer
            .sign(&initiated.message, self.signing_subnet_id)
            .await
        {
            Ok(signed) => signed,
            Err(e) => return Err(self.fail_step(&mut op, StepError::sign(key, step, &e)).await),
        };

        op.artifacts.signed_message = Some(signed.clone());
        op.advance(OperationPhase::MessageSigned);
        self.save(&op, step).await?;

        info!(%key, quorum = signed.quorum_used, message_id = %signed.id(), "message signed");
        Ok(MessageSigned {
            key,
            kind: op.kind,
            derived_id: initiated.derived_id,
            signed,
        })
    }

    // ── Submit to platform ───────────────────────────────────────────

    pub(crate) async fn submit_to_platform(
        &self,
        signed: &MessageSigned,
    ) -> Result<PlatformConfirmed, StepError> {
        let key = signed.key;
        let step = StepName::SubmitToPlatform;
        let _guard = self.acquire(key, step)?;

        let mut op = self
            .checkout(signed.kind, key, step, || signed.adopt())
            .await?;

        if op.reached(OperationPhase::PlatformChainConfirmed) {
            return PlatformConfirmed::from_operation(&op)
                .filter(|confirmed| confirmed.derived_id == signed.derived_id)
                .inspect(|_| info!(%key, "already confirmed, returning recorded artifact"))
                .ok_or_else(|| {
                    StepError::invalid_phase(
                        key,
                        step,
                        format!("operation is already {}", op.checkpoint),
                    )
                });
        }
        if !op.reached(OperationPhase::MessageSigned) {
            return Err(StepError::invalid_phase(key, step, "message has not been signed"));
        }
        if op.artifacts.derived_id != Some(signed.derived_id)
            || op.artifacts.signed_message.as_ref() != Some(&signed.signed)
        {
            return Err(StepError::invalid_phase(
                key,
                step,
                "artifact does not match the recorded operation",
            ));
        }

        let tx_id = match op.artifacts.platform_tx_id {
            Some(tx_id) => {
                info!(%key, %tx_id, "waiting on recorded platform transaction");
                tx_id
            }
            None => {
                let tx_id = match self.submitter.issue(op.kind, signed.signed.clone()).await {
                    Ok(tx_id) => tx_id,
                    Err(e) => {
                        return Err(self.fail_step(&mut op, StepError::submit(key, step, &e)).await)
                    }
                };
                op.artifacts.platform_tx_id = Some(tx_id);
                op.advance(OperationPhase::PlatformChainSubmitted);
                self.save(&op, step).await.map_err(|e| StepError {
                    platform_tx_id: Some(tx_id),
                    ..e
                })?;
                tx_id
            }
        };

        let confirmation = match self.submitter.await_finality(tx_id, None).await {
            Ok(confirmation) => confirmation,
            Err(e @ SubmitError::Dropped { .. }) => {
                op.rewind_to(OperationPhase::MessageSigned);
                return Err(self.fail_step(&mut op, StepError::submit(key, step, &e)).await);
            }
            Err(e) => return Err(self.fail_step(&mut op, StepError::submit(key, step, &e)).await),
        };

        op.artifacts.message_index = Some(confirmation.message_index);
        op.artifacts.acknowledgement = Some(confirmation.acknowledgement.clone());
        op.advance(OperationPhase::PlatformChainConfirmed);
        self.save(&op, step).await?;

        info!(
            %key,
            %tx_id,
            message_index = confirmation.message_index,
            "platform chain confirmed"
        );
        Ok(PlatformConfirmed {
            key,
            kind: op.kind,
            derived_id: signed.derived_id,
            platform_tx_id: tx_id,
            message_index: confirmation.message_index,
            acknowledgement: confirmation.acknowledgement,
        })
    }

    // ── Complete ─────────────────────────────────────────────────────

    pub(crate) async fn complete(
        &self,
        confirmed: &PlatformConfirmed,
    ) -> Result<Completed, StepError> {
        let key = confirmed.key;
        let step = StepName::Complete;
        let _guard = self.acquire(key, step)?;

        let existing = self.load(key, step).await?;
        if let Some(op) = &existing {
            if op.phase == OperationPhase::Completed
                && op.artifacts.derived_id == Some(confirmed.derived_id)
            {
                if op.artifacts.message_index != Some(confirmed.message_index) {
                    return Err(StepError::invalid_phase(
                        key,
                        step,
                        format!("stale message index {}", confirmed.message_index),
                    ));
                }
                let err = StepError::new(
                    key,
                    step,
                    ErrorKind::PlatformChainRejection,
                    format!(
                        "acknowledgement at message index {} was already consumed",
                        confirmed.message_index
                    ),
                );
                return Err(match op.artifacts.complete_tx {
                    Some(tx_hash) => err.with_tx(tx_hash),
                    None => err,
                });
            }
        }

        let mut op = resume_or_adopt(existing, confirmed.kind, key, step, || confirmed.adopt())?;

        if !op.reached(OperationPhase::PlatformChainConfirmed) {
            return Err(StepError::invalid_phase(
                key,
                step,
                "platform chain has not confirmed the message",
            ));
        }
        if op.artifacts.derived_id != Some(confirmed.derived_id)
            || op.artifacts.message_index != Some(confirmed.message_index)
            || op.artifacts.acknowledgement.as_ref() != Some(&confirmed.acknowledgement)
        {
            return Err(StepError::invalid_phase(
                key,
                step,
                format!(
                    "stale message index {}, the recorded acknowledgement differs",
                    confirmed.message_index
                ),
            ));
        }

        let pending = match op.artifacts.complete_tx {
            Some(tx_hash) => {
                info!(%key, %tx_hash, "waiting on recorded complete transaction");
                PendingTx::new(tx_hash)
            }
            None => {
                let pending = match self.send_complete(confirmed).await {
                    Ok(pending) => pending,
                    Err(err) => return Err(self.fail_step(&mut op, err).await),
                };
                op.artifacts.complete_tx = Some(pending.tx_hash);
                self.save(&op, step)
                    .await
                    .map_err(|e| e.with_tx(pending.tx_hash))?;

                info!(
                    %key,
                    tx_hash = %pending.tx_hash,
                    message_index = confirmed.message_index,
                    "complete transaction broadcast"
                );
                pending
            }
        };

        let receipt = match self
            .waiter
            .wait(&pending, Some(self.params.timeouts.completion))
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.fail_step(&mut op, StepError::wait(key, step, &e)).await),
        };
        if !receipt.success {
            op.artifacts.complete_tx = None;
            let err = StepError::new(
                key,
                step,
                ErrorKind::TransactionReverted,
                "complete transaction reverted",
            )
            .with_tx(receipt.tx_hash);
            return Err(self.fail_step(&mut op, err).await);
        }

        let settlement = match settlement(op.kind, &receipt, op.artifacts.uptime_secs) {
            Ok(settlement) => settlement,
            Err(reason) => {
                let err = StepError::ledger_mismatch(key, step, reason).with_tx(receipt.tx_hash);
                return Err(self.fail_step(&mut op, err).await);
            }
        };

        let entity = match self.verified_entity(&op, confirmed.derived_id).await {
            Ok(entity) => entity,
            Err(err) => return Err(self.fail_step(&mut op, err.with_tx(receipt.tx_hash)).await),
        };

        op.artifacts.settlement = settlement.clone();
        op.advance(OperationPhase::Completed);
        self.save(&op, step)
            .await
            .map_err(|e| e.with_tx(receipt.tx_hash))?;

        info!(
            %key,
            kind = %op.kind,
            tx_hash = %receipt.tx_hash,
            status = ?entity.status(),
            weight = entity.weight(),
            "operation completed"
        );
        Ok(Completed {
            key,
            kind: op.kind,
            tx_hash: receipt.tx_hash,
            derived_id: confirmed.derived_id,
            entity,
            settlement,
        })
    }

    async fn send_complete(&self, confirmed: &PlatformConfirmed) -> Result<PendingTx, StepError> {
        let ack = &confirmed.acknowledgement;
        let delegation_id = DelegationId::from(confirmed.derived_id);

        let sent = match confirmed.kind {
            OperationKind::RegisterValidator => {
                self.gateway.complete_validator_registration(ack).await
            }
            OperationKind::RemoveValidator => self.gateway.complete_validator_removal(ack).await,
            OperationKind::AddDelegation => {
                self.gateway
                    .complete_delegator_registration(delegation_id, ack)
                    .await
            }
            OperationKind::RemoveDelegation => {
                self.gateway
                    .complete_delegator_removal(delegation_id, ack)
                    .await
            }
        };

        sent.map_err(|e| StepError::gateway(confirmed.key, StepName::Complete, &e))
    }

    /// Reads the entity back and checks that the ledger reflects the completed operation.
    async fn verified_entity(
        &self,
        op: &StakeOperation,
        derived_id: B256,
    ) -> Result<StakeEntity, StepError> {
        let key = op.key;
        let step = StepName::Complete;
        let gateway_err = |e: GatewayError| StepError::gateway(key, step, &e);

        let entity = if matches!(
            op.kind,
            OperationKind::RegisterValidator | OperationKind::RemoveValidator
        ) {
            self.gateway
                .get_validator(ValidationId::from(derived_id))
                .await
                .map_err(gateway_err)?
                .map(StakeEntity::Validator)
        } else {
            self.gateway
                .get_delegator(DelegationId::from(derived_id))
                .await
                .map_err(gateway_err)?
                .map(StakeEntity::Delegation)
        };
        let Some(entity) = entity else {
            return Err(StepError::ledger_mismatch(
                key,
                step,
                format!("{derived_id} is not known to the staking manager"),
            ));
        };
        debug!(%key, ?entity, "read back completed entity");

        let expected_status = if op.kind.is_registration() {
            StakeStatus::Active
        } else {
            StakeStatus::Removed
        };
        if entity.status() != expected_status {
            return Err(StepError::ledger_mismatch(
                key,
                step,
                format!("status is {:?}, expected {expected_status:?}", entity.status()),
            ));
        }

        // Validators accumulate delegated weight, so only a fresh registration is compared.
        let compare_weight = matches!(
            op.kind,
            OperationKind::RegisterValidator | OperationKind::AddDelegation
        );
        if let Some(expected) = op.artifacts.expected_weight.filter(|_| compare_weight) {
            if entity.weight() != expected {
                return Err(StepError::ledger_mismatch(
                    key,
                    step,
                    format!("weight is {}, expected {expected}", entity.weight()),
                ));
            }
        }

        Ok(entity)
    }
}

/// Continues `existing`, or rebuilds the operation from the caller's artifact if this store has
/// never seen it.
fn resume_or_adopt(
    existing: Option<StakeOperation>,
    kind: OperationKind,
    key: OperationKey,
    step: StepName,
    adopt: impl FnOnce() -> StakeOperation,
) -> Result<StakeOperation, StepError> {
    let Some(op) = existing else {
        info!(%key, %kind, %step, "adopting operation from caller artifacts");
        return Ok(adopt());
    };

    if op.kind != kind {
        return Err(StepError::invalid_phase(
            key,
            step,
            format!("recorded operation is a {}, artifact is for a {kind}", op.kind),
        ));
    }

    if op.phase == OperationPhase::Failed {
        info!(%key, %step, checkpoint = %op.checkpoint, "resuming failed operation");
        return Ok(op.resumed());
    }

    Ok(op)
}

/// A failed operation that never got a transaction out may be restarted with new parameters.
fn is_restartable(existing: &StakeOperation, intent: &StakeIntent) -> bool {
    existing.phase == OperationPhase::Failed
        && existing.checkpoint == OperationPhase::Initiated
        && existing.artifacts.initiate_tx.is_none()
        && existing.intent.as_ref() != Some(intent)
}

/// Names the identifier of `intent` that is all zeroes. The staking manager never derives such an
/// ID, so the wallet is not asked to sign for one.
fn zero_identifier(intent: &StakeIntent) -> Option<&'static str> {
    match intent {
        StakeIntent::RegisterValidator(params) => params.node_id.is_zero().then_some("node ID"),
        StakeIntent::AddDelegation(params) => {
            params.validation_id.is_zero().then_some("validation ID")
        }
        StakeIntent::RemoveValidator(params) => {
            params.validation_id.is_zero().then_some("validation ID")
        }
        StakeIntent::RemoveDelegation(params) => {
            params.delegation_id.is_zero().then_some("delegation ID")
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

/// Records what the `initiate*` receipt reports and returns the derived ID.
fn record_initiation(op: &mut StakeOperation, receipt: &Receipt) -> Result<B256, String> {
    let (derived_id, expected_weight) = match (op.kind, op.key) {
        (OperationKind::RegisterValidator, _) => receipt
            .find_event(|event| match event {
                StakingEvent::ValidatorRegistrationInitiated {
                    validation_id,
                    weight,
                    ..
                } => Some((B256::from(*validation_id), Some(*weight))),
                _ => None,
            })
            .ok_or("no ValidatorRegistrationInitiated event")?,
        (OperationKind::AddDelegation, _) => receipt
            .find_event(|event| match event {
                StakingEvent::DelegatorRegistrationInitiated {
                    delegation_id,
                    weight,
                    ..
                } => Some((B256::from(*delegation_id), Some(*weight))),
                _ => None,
            })
            .ok_or("no DelegatorRegistrationInitiated event")?,
        (OperationKind::RemoveValidator, OperationKey::Validation(expected)) => {
            receipt
                .find_event(|event| match event {
                    StakingEvent::ValidatorRemovalInitiated { validation_id }
                        if *validation_id == expected =>
                    {
                        Some(())
                    }
                    _ => None,
                })
                .ok_or(format!("no ValidatorRemovalInitiated event for {expected}"))?;
            (B256::from(expected), None)
        }
        (OperationKind::RemoveDelegation, OperationKey::Delegation(expected)) => {
            receipt
                .find_event(|event| match event {
                    StakingEvent::DelegatorRemovalInitiated { delegation_id }
                        if *delegation_id == expected =>
                    {
                        Some(())
                    }
                    _ => None,
                })
                .ok_or(format!("no DelegatorRemovalInitiated event for {expected}"))?;
            (B256::from(expected), None)
        }
        (kind, key) => return Err(format!("{kind} cannot be keyed by {key}")),
    };

    if let Some(uptime_secs) = receipt.find_event(|event| match event {
        StakingEvent::UptimeUpdated { uptime_secs, .. } => Some(*uptime_secs),
        _ => None,
    }) {
        op.artifacts.uptime_secs = Some(uptime_secs);
    }
    op.artifacts.derived_id = Some(derived_id);
    op.artifacts.expected_weight = expected_weight;

    Ok(derived_id)
}

/// Extracts the payout of a removal from its `complete*` receipt.
fn settlement(
    kind: OperationKind,
    receipt: &Receipt,
    uptime_secs: Option<u64>,
) -> Result<Option<Settlement>, String> {
    let settlement = match kind {
        OperationKind::RegisterValidator | OperationKind::AddDelegation => return Ok(None),
        OperationKind::RemoveValidator => receipt.find_event(|event| match event {
            StakingEvent::ValidatorRemovalCompleted {
                stake_returned,
                rewards,
                ..
            } => Some(Settlement {
                stake_returned: *stake_returned,
                rewards: *rewards,
                fees: U256::ZERO,
                uptime_secs,
            }),
            _ => None,
        }),
        OperationKind::RemoveDelegation => receipt.find_event(|event| match event {
            StakingEvent::DelegatorRemovalCompleted {
                stake_returned,
                rewards,
                fees,
                ..
            } => Some(Settlement {
                stake_returned: *stake_returned,
                rewards: *rewards,
                fees: *fees,
                uptime_secs,
            }),
            _ => None,
        }),
    };

    settlement
        .map(Some)
        .ok_or_else(|| format!("no removal settlement event for {kind}"))
}
