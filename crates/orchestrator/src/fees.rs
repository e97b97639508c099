//! Claiming of accumulated delegation fees.
//!
//! Fees accrue to a validator whenever one of its delegations completes removal, so claiming is
//! not part of any saga and may be repeated. Claims are not persisted.

use std::sync::Arc;

use pchain_submitter::PlatformChainClient;
use stakeflow_db::OperationDb;
use stakeflow_primitives::{
    errors::{ErrorKind, StepName},
    events::StakingEvent,
    ids::ValidationId,
    operation::OperationKey,
};
use staking_manager::StakingManager;
use tracing::info;
use warp_signer::{SignatureAggregator, UptimeSource};

use crate::{
    artifacts::FeeClaim,
    context::{ExecutionChain, StakeContext},
    errors::StepError,
};

/// Pays out the delegation fees of a validator.
#[derive(Debug)]
pub struct FeeClaimer<G, A, P, U, D> {
    ctx: Arc<StakeContext<G, A, P, U, D>>,
}

impl<G, A, P, U, D> FeeClaimer<G, A, P, U, D>
where
    G: ExecutionChain,
    A: SignatureAggregator,
    P: PlatformChainClient,
    U: UptimeSource,
    D: OperationDb,
{
    /// Creates a claimer sharing `ctx`.
    pub const fn new(ctx: Arc<StakeContext<G, A, P, U, D>>) -> Self {
        Self { ctx }
    }

    /// Claims the fees `validation_id` has accumulated.
    ///
    /// Fails with [`ErrorKind::NoClaimableValue`] without sending anything when there are none.
    pub async fn claim(&self, validation_id: ValidationId) -> Result<FeeClaim, StepError> {
        let key = OperationKey::Fees(validation_id);
        let step = StepName::ClaimFees;
        if validation_id.is_zero() {
            return Err(StepError::new(
                key,
                step,
                ErrorKind::InvalidKey,
                "validation ID must not be zero",
            ));
        }
        let _guard = self.ctx.acquire(key, step)?;
        let gateway_err = |e| StepError::gateway(key, step, &e);

        let claimable = self
            .ctx
            .gateway
            .value_to_claim(validation_id)
            .await
            .map_err(gateway_err)?;
        if claimable.is_zero() {
            info!(%validation_id, "no delegation fees to claim");
            return Err(StepError::new(
                key,
                step,
                ErrorKind::NoClaimableValue,
                format!("{validation_id} has no delegation fees to claim"),
            ));
        }

        let pending = self
            .ctx
            .gateway
            .claim_delegation_fees(validation_id)
            .await
            .map_err(gateway_err)?;
        info!(%validation_id, %claimable, tx_hash = %pending.tx_hash, "fee claim broadcast");

        let receipt = self
            .ctx
            .waiter
            .wait(&pending, None)
            .await
            .map_err(|e| StepError::wait(key, step, &e))?;
        if !receipt.success {
            return Err(StepError::new(
                key,
                step,
                ErrorKind::TransactionReverted,
                "fee claim reverted",
            )
            .with_tx(receipt.tx_hash));
        }

        let amount = receipt
            .find_event(|event| match event {
                StakingEvent::DelegationFeesClaimed {
                    validation_id: claimed,
                    amount,
                } if *claimed == validation_id => Some(*amount),
                _ => None,
            })
            .ok_or_else(|| {
                StepError::ledger_mismatch(key, step, "no DelegationFeesClaimed event")
                    .with_tx(receipt.tx_hash)
            })?;

        info!(%validation_id, %amount, tx_hash = %receipt.tx_hash, "delegation fees claimed");
        Ok(FeeClaim {
            validation_id,
            tx_hash: receipt.tx_hash,
            amount,
        })
    }
}
