//! [`StakingManager`] over an `alloy` provider.

use alloy::{
    eips::BlockNumberOrTag,
    network::TransactionBuilder,
    primitives::{Address, Bytes, U256},
    providers::Provider,
    rpc::types::TransactionRequest,
    sol_types::SolCall,
    transports::TransportError,
};
use stakeflow_primitives::{
    events::{PendingTx, Receipt},
    ids::{BlsPublicKey, DelegationId, NodeId, ValidationId},
    operation::{DelegationParams, ValidatorRegistrationParams},
    records::{Delegation, StakeStatus, Validator},
    warp::SignedMessage,
    TxHash,
};
use tracing::{debug, trace};

use crate::{
    errors::{GatewayError, GatewayResult},
    interface::{self, IStakingManager as SM},
    predicate,
    receipt::decode_receipt,
    traits::StakingManager,
};

/// JSON-RPC error code wallets return when the user declines to sign.
pub const USER_REJECTED_CODE: i64 = 4001;

/// Position of the acknowledgement among the predicates of a `complete*` transaction. The
/// acknowledgement is the only message attached, so the contract reads it at index 0.
pub const ACKNOWLEDGEMENT_INDEX: u32 = 0;

/// The staking manager deployed at `address`, reached through `provider`.
///
/// The provider must carry a wallet able to sign for the accounts sending transactions.
#[derive(Debug, Clone)]
pub struct AlloyStakingManager<P> {
    provider: P,
    address: Address,
}

impl<P: Provider> AlloyStakingManager<P> {
    /// Creates a gateway for the contract at `address`.
    pub const fn new(provider: P, address: Address) -> Self {
        Self { provider, address }
    }

    /// Address of the staking-manager contract.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Looks up the receipt of `tx_hash` once, without waiting.
    pub async fn receipt(&self, tx_hash: TxHash) -> GatewayResult<Option<Receipt>> {
        trace!(%tx_hash, "fetching receipt");
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(map_rpc_error)?;

        receipt
            .map(|receipt| decode_receipt(&receipt, self.address))
            .transpose()
    }

    async fn send<C: SolCall>(
        &self,
        call: C,
        value: U256,
        from: Option<Address>,
        messages: &[&SignedMessage],
    ) -> GatewayResult<PendingTx> {
        let tx = request(self.address, &call, value, from, messages);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(map_rpc_error)?;
        let tx_hash = *pending.tx_hash();
        debug!(%tx_hash, call = C::SIGNATURE, "broadcast staking manager call");

        Ok(PendingTx::new(tx_hash))
    }

    async fn view<C: SolCall>(&self, call: C) -> GatewayResult<C::Return> {
        let tx = TransactionRequest::default()
            .with_to(self.address)
            .with_input(call.abi_encode());
        let data: Bytes = self
            .provider
            .raw_request("eth_call".into(), (tx, BlockNumberOrTag::Latest))
            .await
            .map_err(map_rpc_error)?;

        C::abi_decode_returns(&data, true)
            .map_err(|e| GatewayError::Decode(format!("{}: {e}", C::SIGNATURE)))
    }
}

impl<P: Provider> StakingManager for AlloyStakingManager<P> {
    async fn initiate_validator_registration(
        &self,
        params: &ValidatorRegistrationParams,
    ) -> GatewayResult<PendingTx> {
        let call = SM::initiateValidatorRegistrationCall {
            nodeID: Bytes::copy_from_slice(params.node_id.as_bytes()),
            blsPublicKey: Bytes::copy_from_slice(params.bls_public_key.as_bytes()),
            blsProofOfPossession: Bytes::copy_from_slice(params.bls_proof_of_possession.as_bytes()),
            delegationFeeBips: params.delegation_fee_bips,
            minStakeDuration: params.min_stake_duration,
            rewardRecipient: params.reward_recipient,
        };
        self.send(call, params.stake, None, &[]).await
    }

    async fn complete_validator_registration(
        &self,
        acknowledgement: &SignedMessage,
    ) -> GatewayResult<PendingTx> {
        let call = complete_validator_registration_call();
        self.send(call, U256::ZERO, None, &[acknowledgement]).await
    }

    async fn initiate_validator_removal(
        &self,
        validation_id: ValidationId,
        uptime_proof: Option<&SignedMessage>,
    ) -> GatewayResult<PendingTx> {
        // the proof, when present, is the only predicate in the tx
        let call = SM::initiateValidatorRemovalCall {
            validationID: validation_id.into(),
            includeUptimeProof: uptime_proof.is_some(),
            messageIndex: 0,
        };
        let messages: Vec<_> = uptime_proof.into_iter().collect();
        self.send(call, U256::ZERO, None, &messages).await
    }

    async fn complete_validator_removal(
        &self,
        acknowledgement: &SignedMessage,
    ) -> GatewayResult<PendingTx> {
        let call = complete_validator_removal_call();
        self.send(call, U256::ZERO, None, &[acknowledgement]).await
    }

    async fn initiate_delegator_registration(
        &self,
        params: &DelegationParams,
    ) -> GatewayResult<PendingTx> {
        let call = SM::initiateDelegatorRegistrationCall {
            validationID: params.validation_id.into(),
            rewardRecipient: params.reward_recipient,
        };
        self.send(call, params.stake, Some(params.delegator), &[])
            .await
    }

    async fn complete_delegator_registration(
        &self,
        delegation_id: DelegationId,
        acknowledgement: &SignedMessage,
    ) -> GatewayResult<PendingTx> {
        let call = complete_delegator_registration_call(delegation_id);
        self.send(call, U256::ZERO, None, &[acknowledgement]).await
    }

    async fn initiate_delegator_removal(
        &self,
        delegation_id: DelegationId,
        uptime_proof: Option<&SignedMessage>,
    ) -> GatewayResult<PendingTx> {
        let call = SM::initiateDelegatorRemovalCall {
            delegationID: delegation_id.into(),
            includeUptimeProof: uptime_proof.is_some(),
            messageIndex: 0,
        };
        let messages: Vec<_> = uptime_proof.into_iter().collect();
        self.send(call, U256::ZERO, None, &messages).await
    }

    async fn complete_delegator_removal(
        &self,
        delegation_id: DelegationId,
        acknowledgement: &SignedMessage,
    ) -> GatewayResult<PendingTx> {
        let call = complete_delegator_removal_call(delegation_id);
        self.send(call, U256::ZERO, None, &[acknowledgement]).await
    }

    async fn claim_delegation_fees(&self, validation_id: ValidationId) -> GatewayResult<PendingTx> {
        let call = SM::claimDelegationFeesCall {
            validationID: validation_id.into(),
        };
        self.send(call, U256::ZERO, None, &[]).await
    }

    async fn get_validator(&self, validation_id: ValidationId) -> GatewayResult<Option<Validator>> {
        let info = self
            .view(SM::getValidatorCall {
                validationID: validation_id.into(),
            })
            .await?
            ._0;

        let Some(status) = StakeStatus::from_code(info.status) else {
            return Ok(None);
        };

        Ok(Some(Validator {
            validation_id,
            node_id: NodeId::from(fixed::<20>("nodeID", &info.nodeID)?),
            bls_public_key: BlsPublicKey::from(fixed::<48>("blsPublicKey", &info.blsPublicKey)?),
            weight: info.weight,
            status,
            owner: info.owner,
            start_time: info.startTime,
        }))
    }

    async fn get_delegator(
        &self,
        delegation_id: DelegationId,
    ) -> GatewayResult<Option<Delegation>> {
        let info = self
            .view(SM::getDelegatorCall {
                delegationID: delegation_id.into(),
            })
            .await?
            ._0;

        Ok(StakeStatus::from_code(info.status).map(|status| Delegation {
            delegation_id,
            validation_id: info.validationID.into(),
            weight: info.weight,
            status,
            owner: info.owner,
        }))
    }

    async fn value_to_claim(&self, validation_id: ValidationId) -> GatewayResult<U256> {
        let value = self
            .view(SM::valueToClaimCall {
                validationID: validation_id.into(),
            })
            .await?
            ._0;

        Ok(value)
    }
}

// ── Completion calls ─────────────────────────────────────────────

const fn complete_validator_registration_call() -> SM::completeValidatorRegistrationCall {
    SM::completeValidatorRegistrationCall {
        messageIndex: ACKNOWLEDGEMENT_INDEX,
    }
}

const fn complete_validator_removal_call() -> SM::completeValidatorRemovalCall {
    SM::completeValidatorRemovalCall {
        messageIndex: ACKNOWLEDGEMENT_INDEX,
    }
}

fn complete_delegator_registration_call(
    delegation_id: DelegationId,
) -> SM::completeDelegatorRegistrationCall {
    SM::completeDelegatorRegistrationCall {
        delegationID: delegation_id.into(),
        messageIndex: ACKNOWLEDGEMENT_INDEX,
    }
}

fn complete_delegator_removal_call(
    delegation_id: DelegationId,
) -> SM::completeDelegatorRemovalCall {
    SM::completeDelegatorRemovalCall {
        delegationID: delegation_id.into(),
        messageIndex: ACKNOWLEDGEMENT_INDEX,
    }
}

/// Builds the transaction calling `call` on `to`, attaching `messages` as predicates in order.
fn request<C: SolCall>(
    to: Address,
    call: &C,
    value: U256,
    from: Option<Address>,
    messages: &[&SignedMessage],
) -> TransactionRequest {
    let mut tx = TransactionRequest::default()
        .with_to(to)
        .with_input(call.abi_encode())
        .with_value(value);
    if let Some(from) = from {
        tx = tx.with_from(from);
    }
    if !messages.is_empty() {
        tx = tx.with_access_list(predicate::access_list(messages.iter().copied()));
    }

    tx
}

fn fixed<const N: usize>(field: &str, bytes: &[u8]) -> GatewayResult<[u8; N]> {
    bytes.try_into().map_err(|_| {
        GatewayError::Decode(format!("{field}: expected {N} bytes, got {}", bytes.len()))
    })
}

/// Maps an RPC error onto a [`GatewayError`], naming the contract error when the revert data
/// carries a known selector.
pub fn map_rpc_error(err: TransportError) -> GatewayError {
    if let Some(payload) = err.as_error_resp() {
        if payload.code == USER_REJECTED_CODE {
            return GatewayError::UserRejected;
        }
        if let Some(data) = payload.as_revert_data() {
            let name = interface::revert_name(&data).map(str::to_owned);
            return GatewayError::Reverted { name, data };
        }
    }

    GatewayError::Transport(err.to_string())
}
