//! The simulated execution chain and the state shared with the other simulated services.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use alloy_primitives::{Address, Bytes, FixedBytes, B256, U256};
use parking_lot::{Mutex, MutexGuard};
use sha2::{Digest, Sha256};
use stakeflow_primitives::{
    events::{PendingTx, Receipt, StakingEvent},
    ids::{ChainId, DelegationId, PlatformTxId, SubnetId, ValidationId},
    operation::{DelegationParams, ValidatorRegistrationParams},
    records::{Delegation, StakeStatus, Validator},
    warp::{SignedMessage, StakingPayload, UnsignedMessage, SIGNATURE_LEN},
    TxHash,
};
use staking_manager::{GatewayError, GatewayResult, StakingManager};
use tx_waiter::ReceiptSource;

/// Chain ID the platform chain signs its acknowledgements with.
pub const PLATFORM_CHAIN_ID: ChainId = ChainId(FixedBytes::ZERO);

/// Rewards paid per second of attested uptime, in wei.
pub const REWARD_PER_SECOND: u64 = 1;

const GENESIS_TIME: u64 = 1_700_000_000;
const REGISTRATION_EXPIRY: u64 = 24 * 60 * 60;
const BIPS: u64 = 10_000;

/// Identity of the simulated chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Network both chains belong to.
    pub network_id: u32,

    /// Chain ID of the execution chain.
    pub source_chain_id: ChainId,

    /// Subnet the execution chain validates.
    pub subnet_id: SubnetId,

    /// Address of the staking-manager contract.
    pub staking_manager: Address,

    /// Account that sends every transaction.
    pub sender: Address,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            network_id: 5,
            source_chain_id: ChainId::from([0xc1; 32]),
            subnet_id: SubnetId::from([0x5b; 32]),
            staking_manager: Address::repeat_byte(0x5a),
            sender: Address::repeat_byte(0xaa),
        }
    }
}

#[derive(Debug)]
pub(crate) struct SimValidator {
    pub(crate) validator: Validator,
    stake: U256,
    min_stake_duration: u64,
    fee_bips: u16,
    pub(crate) nonce: u64,
    uptime_secs: Option<u64>,
    fees_accrued: U256,
}

#[derive(Debug)]
struct SimDelegation {
    delegation: Delegation,
    stake: U256,
}

#[derive(Debug)]
struct SimReceipt {
    receipt: Receipt,
    polls_left: u32,
    released: bool,
}

#[derive(Debug)]
pub(crate) struct PlatformEntry {
    pub(crate) weight: u64,
    pub(crate) nonce: u64,
}

#[derive(Debug)]
pub(crate) enum SimPlatformTx {
    Committed {
        polls_left: u32,
        message_index: u32,
        acknowledgement: SignedMessage,
    },
    Dropped {
        reason: String,
    },
}

/// Everything the simulated services share.
#[derive(Debug)]
pub(crate) struct SimState {
    now: u64,
    tx_nonce: u64,
    block_number: u64,
    receipts: HashMap<TxHash, SimReceipt>,
    receipt_delay_polls: u32,
    stall_receipts: bool,
    revert_next: bool,
    wallet_rejects: bool,
    wallet_delay: Option<Duration>,
    chain_down: bool,
    validators: BTreeMap<ValidationId, SimValidator>,
    delegations: BTreeMap<DelegationId, SimDelegation>,
    consumed_indices: HashSet<u32>,

    pub(crate) platform_validators: HashMap<ValidationId, PlatformEntry>,
    pub(crate) applied_messages: HashSet<B256>,
    pub(crate) platform_txs: HashMap<PlatformTxId, SimPlatformTx>,
    pub(crate) acknowledgements: Vec<SignedMessage>,
    pub(crate) platform_delay_polls: u32,
    pub(crate) drop_next_platform_tx: Option<String>,
    pub(crate) issued_platform_txs: u64,

    pub(crate) available_stake_pct: u8,
    pub(crate) aggregator_down: bool,
    pub(crate) quorum_requests: Vec<u8>,
    pub(crate) uptimes: HashMap<ValidationId, u64>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            now: GENESIS_TIME,
            tx_nonce: 0,
            block_number: 0,
            receipts: HashMap::new(),
            receipt_delay_polls: 0,
            stall_receipts: false,
            revert_next: false,
            wallet_rejects: false,
            wallet_delay: None,
            chain_down: false,
            validators: BTreeMap::new(),
            delegations: BTreeMap::new(),
            consumed_indices: HashSet::new(),
            platform_validators: HashMap::new(),
            applied_messages: HashSet::new(),
            platform_txs: HashMap::new(),
            acknowledgements: Vec::new(),
            platform_delay_polls: 0,
            drop_next_platform_tx: None,
            issued_platform_txs: 0,
            available_stake_pct: 100,
            aggregator_down: false,
            quorum_requests: Vec::new(),
            uptimes: HashMap::new(),
        }
    }
}

impl SimState {
    fn broadcast(&mut self, success: bool, events: Vec<StakingEvent>) -> PendingTx {
        self.tx_nonce += 1;
        self.block_number += 1;
        let tx_hash = sha256(&[b"stakeflow-sim-tx", &self.tx_nonce.to_be_bytes()]);

        self.receipts.insert(
            tx_hash,
            SimReceipt {
                receipt: Receipt {
                    tx_hash,
                    block_number: self.block_number,
                    success,
                    events,
                },
                polls_left: self.receipt_delay_polls,
                released: !self.stall_receipts,
            },
        );

        PendingTx::new(tx_hash)
    }

    fn validator_mut(&mut self, validation_id: ValidationId) -> GatewayResult<&mut SimValidator> {
        self.validators
            .get_mut(&validation_id)
            .ok_or_else(|| GatewayError::reverted("InvalidValidationID"))
    }

    fn delegation_mut(&mut self, delegation_id: DelegationId) -> GatewayResult<&mut SimDelegation> {
        self.delegations
            .get_mut(&delegation_id)
            .ok_or_else(|| GatewayError::reverted("InvalidDelegationID"))
    }

    /// Validates a platform acknowledgement without consuming it, returning where the platform
    /// logged it together with its payload.
    fn check_acknowledgement(
        &self,
        acknowledgement: &SignedMessage,
    ) -> GatewayResult<(u32, StakingPayload)> {
        if acknowledgement.unsigned.source_chain_id != PLATFORM_CHAIN_ID {
            return Err(GatewayError::reverted("InvalidWarpSourceChainID"));
        }
        let logged = self
            .acknowledgements
            .iter()
            .position(|issued| issued.unsigned == acknowledgement.unsigned);
        let Some(logged) = logged.and_then(|i| u32::try_from(i).ok()) else {
            return Err(GatewayError::reverted("InvalidWarpMessage"));
        };
        if acknowledgement.signature != sim_signature(&acknowledgement.unsigned) {
            return Err(GatewayError::reverted("InvalidWarpMessage"));
        }
        if self.consumed_indices.contains(&logged) {
            return Err(GatewayError::reverted("MessageAlreadyConsumed"));
        }

        let payload = acknowledgement
            .unsigned
            .staking_payload()
            .map_err(|_| GatewayError::reverted("InvalidWarpMessage"))?;
        Ok((logged, payload))
    }

    fn record_uptime(
        &mut self,
        config: &SimConfig,
        validation_id: ValidationId,
        proof: Option<&SignedMessage>,
    ) -> GatewayResult<Option<StakingEvent>> {
        let Some(proof) = proof else {
            return Ok(None);
        };
        if proof.unsigned.source_chain_id != config.source_chain_id {
            return Err(GatewayError::reverted("InvalidWarpSourceChainID"));
        }
        if proof.signature != sim_signature(&proof.unsigned) {
            return Err(GatewayError::reverted("InvalidWarpMessage"));
        }
        let uptime_secs = match proof.unsigned.staking_payload() {
            Ok(StakingPayload::ValidationUptime {
                validation_id: attested,
                uptime_secs,
            }) if attested == validation_id => uptime_secs,
            _ => return Err(GatewayError::reverted("InvalidWarpMessage")),
        };

        let validator = self.validator_mut(validation_id)?;
        let uptime_secs = validator.uptime_secs.unwrap_or(0).max(uptime_secs);
        validator.uptime_secs = Some(uptime_secs);

        Ok(Some(StakingEvent::UptimeUpdated {
            validation_id,
            uptime_secs,
        }))
    }
}

/// A simulated execution chain, platform chain, signature aggregator and uptime endpoint.
///
/// Clones share the same state. Contract effects are applied when a transaction is broadcast;
/// the receipt becomes visible according to the configured delay or stall.
#[derive(Debug, Clone, Default)]
pub struct SimNetwork {
    config: SimConfig,
    state: Arc<Mutex<SimState>>,
}

impl SimNetwork {
    /// Creates a network with the given identity.
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            state: Arc::default(),
        }
    }

    /// Identity of the simulated chains.
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock()
    }

    // ── Execution chain controls ─────────────────────────────────────

    /// Current block time, in seconds since the unix epoch.
    pub fn now(&self) -> u64 {
        self.lock().now
    }

    /// Moves the block time forward.
    pub fn advance_time(&self, secs: u64) {
        self.lock().now += secs;
    }

    /// Makes receipts of new transactions invisible for `polls` lookups.
    pub fn set_receipt_delay(&self, polls: u32) {
        self.lock().receipt_delay_polls = polls;
    }

    /// Withholds the receipts of new transactions until [`Self::release_receipts`].
    pub fn stall_receipts(&self, stall: bool) {
        self.lock().stall_receipts = stall;
    }

    /// Makes every withheld receipt visible.
    pub fn release_receipts(&self) {
        let mut state = self.lock();
        state.stall_receipts = false;
        for receipt in state.receipts.values_mut() {
            receipt.released = true;
        }
    }

    /// Mines the next transaction with a failed status and no effect.
    pub fn revert_next_tx(&self) {
        self.lock().revert_next = true;
    }

    /// Makes the wallet refuse to sign.
    pub fn set_wallet_rejects(&self, rejects: bool) {
        self.lock().wallet_rejects = rejects;
    }

    /// Makes the wallet take `delay` before signing each transaction.
    pub fn set_wallet_delay(&self, delay: Duration) {
        self.lock().wallet_delay = Some(delay);
    }

    /// Makes every execution-chain call fail with a transport error.
    pub fn set_chain_down(&self, down: bool) {
        self.lock().chain_down = down;
    }

    /// Number of transactions broadcast so far.
    pub fn broadcast_count(&self) -> u64 {
        self.lock().tx_nonce
    }

    // ── Validator-side controls ──────────────────────────────────────

    /// Share of stake that signs any message the aggregator is asked about.
    pub fn set_available_stake(&self, pct: u8) {
        self.lock().available_stake_pct = pct;
    }

    /// Makes the aggregator unreachable.
    pub fn set_aggregator_down(&self, down: bool) {
        self.lock().aggregator_down = down;
    }

    /// Quorums requested from the aggregator so far, in order.
    pub fn quorum_requests(&self) -> Vec<u8> {
        self.lock().quorum_requests.clone()
    }

    /// Sets the uptime the validator's node reports.
    pub fn set_uptime(&self, validation_id: ValidationId, uptime_secs: u64) {
        self.lock().uptimes.insert(validation_id, uptime_secs);
    }

    // ── Platform chain controls ──────────────────────────────────────

    /// Keeps new platform transactions processing for `polls` status lookups.
    pub fn set_platform_delay(&self, polls: u32) {
        self.lock().platform_delay_polls = polls;
    }

    /// Drops the next platform transaction with `reason`.
    pub fn drop_next_platform_tx(&self, reason: impl Into<String>) {
        self.lock().drop_next_platform_tx = Some(reason.into());
    }

    /// Number of platform transactions issued so far.
    pub fn platform_tx_count(&self) -> u64 {
        self.lock().issued_platform_txs
    }

    /// Weight the platform chain records for `validation_id`.
    pub fn platform_weight(&self, validation_id: ValidationId) -> Option<u64> {
        self.lock()
            .platform_validators
            .get(&validation_id)
            .map(|entry| entry.weight)
    }

    async fn begin(&self) -> GatewayResult<MutexGuard<'_, SimState>> {
        let delay = self.lock().wallet_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.lock();
        if state.chain_down {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        if state.wallet_rejects {
            return Err(GatewayError::UserRejected);
        }
        Ok(state)
    }

    /// Like [`Self::begin`] for calls that need no signature.
    fn view(&self) -> GatewayResult<MutexGuard<'_, SimState>> {
        let state = self.lock();
        if state.chain_down {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        Ok(state)
    }

    fn warp_event(&self, payload: &StakingPayload) -> StakingEvent {
        StakingEvent::WarpMessageSent {
            sender: self.config.staking_manager,
            message: payload.to_message(
                self.config.network_id,
                self.config.source_chain_id,
                self.config.staking_manager.to_vec(),
            ),
        }
    }
}

/// Signature the simulated validators produce over `message`.
pub(crate) fn sim_signature(message: &UnsignedMessage) -> FixedBytes<SIGNATURE_LEN> {
    let mut signature = [0u8; SIGNATURE_LEN];
    signature[..32].copy_from_slice(message.id().as_slice());
    FixedBytes::from(signature)
}

/// Signs `message` as the simulated validators would at `quorum`.
pub(crate) fn sim_sign(message: UnsignedMessage, quorum: u8) -> SignedMessage {
    SignedMessage {
        signature: sim_signature(&message),
        unsigned: message,
        signers: Bytes::from_static(&[0xff]),
        quorum_used: quorum,
    }
}

pub(crate) fn sha256(parts: &[&[u8]]) -> B256 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    B256::from_slice(&hasher.finalize())
}

fn weight_of(stake: U256) -> GatewayResult<u64> {
    if stake.is_zero() || stake > U256::from(u64::MAX) {
        return Err(GatewayError::reverted("InvalidStakeAmount"));
    }
    Ok(stake.to::<u64>())
}

impl StakingManager for SimNetwork {
    async fn initiate_validator_registration(
        &self,
        params: &ValidatorRegistrationParams,
    ) -> GatewayResult<PendingTx> {
        let mut state = self.begin().await?;
        if std::mem::take(&mut state.revert_next) {
            return Ok(state.broadcast(false, Vec::new()));
        }
        if params.node_id.is_zero() {
            return Err(GatewayError::reverted("InvalidNodeID"));
        }
        if state.validators.values().any(|v| {
            v.validator.node_id == params.node_id && v.validator.status != StakeStatus::Removed
        }) {
            return Err(GatewayError::reverted("InvalidNodeID"));
        }
        let weight = weight_of(params.stake)?;

        let payload = StakingPayload::RegisterL1Validator {
            subnet_id: self.config.subnet_id,
            node_id: params.node_id,
            bls_public_key: params.bls_public_key,
            expiry: state.now + REGISTRATION_EXPIRY,
            weight,
        };
        let validation_id = ValidationId::from(sha256(&[&payload.encode()]));
        let warp_event = self.warp_event(&payload);

        state.validators.insert(
            validation_id,
            SimValidator {
                validator: Validator {
                    validation_id,
                    node_id: params.node_id,
                    bls_public_key: params.bls_public_key,
                    weight,
                    status: StakeStatus::PendingAdded,
                    owner: self.config.sender,
                    start_time: 0,
                },
                stake: params.stake,
                min_stake_duration: params.min_stake_duration,
                fee_bips: params.delegation_fee_bips,
                nonce: 0,
                uptime_secs: None,
                fees_accrued: U256::ZERO,
            },
        );

        Ok(state.broadcast(
            true,
            vec![
                warp_event,
                StakingEvent::ValidatorRegistrationInitiated {
                    validation_id,
                    node_id: params.node_id,
                    weight,
                },
            ],
        ))
    }

    async fn complete_validator_registration(
        &self,
        acknowledgement: &SignedMessage,
    ) -> GatewayResult<PendingTx> {
        let mut state = self.begin().await?;
        if std::mem::take(&mut state.revert_next) {
            return Ok(state.broadcast(false, Vec::new()));
        }
        let (message_index, payload) = state.check_acknowledgement(acknowledgement)?;
        let validation_id = match payload {
            StakingPayload::L1ValidatorRegistration {
                validation_id,
                registered: true,
            } => validation_id,
            StakingPayload::L1ValidatorRegistration {
                registered: false, ..
            } => return Err(GatewayError::reverted("UnexpectedRegistrationStatus")),
            _ => return Err(GatewayError::reverted("InvalidWarpMessage")),
        };

        let now = state.now;
        let validator = state.validator_mut(validation_id)?;
        if validator.validator.status != StakeStatus::PendingAdded {
            return Err(GatewayError::reverted("InvalidValidatorStatus"));
        }
        validator.validator.status = StakeStatus::Active;
        validator.validator.start_time = now;
        state.consumed_indices.insert(message_index);

        Ok(state.broadcast(
            true,
            vec![StakingEvent::ValidatorRegistrationCompleted { validation_id }],
        ))
    }

    async fn initiate_validator_removal(
        &self,
        validation_id: ValidationId,
        uptime_proof: Option<&SignedMessage>,
    ) -> GatewayResult<PendingTx> {
        let mut state = self.begin().await?;
        if std::mem::take(&mut state.revert_next) {
            return Ok(state.broadcast(false, Vec::new()));
        }
        let now = state.now;
        {
            let validator = state.validator_mut(validation_id)?;
            if validator.validator.status != StakeStatus::Active {
                return Err(GatewayError::reverted("InvalidValidatorStatus"));
            }
            if now < validator.validator.start_time + validator.min_stake_duration {
                return Err(GatewayError::reverted("MinStakeDurationNotPassed"));
            }
        }
        let uptime_event = state.record_uptime(&self.config, validation_id, uptime_proof)?;

        let validator = state.validator_mut(validation_id)?;
        validator.nonce += 1;
        validator.validator.status = StakeStatus::PendingRemoved;
        let payload = StakingPayload::L1ValidatorWeight {
            validation_id,
            nonce: validator.nonce,
            weight: 0,
        };
        let warp_event = self.warp_event(&payload);

        let mut events: Vec<_> = uptime_event.into_iter().collect();
        events.push(warp_event);
        events.push(StakingEvent::ValidatorRemovalInitiated { validation_id });

        Ok(state.broadcast(true, events))
    }

    async fn complete_validator_removal(
        &self,
        acknowledgement: &SignedMessage,
    ) -> GatewayResult<PendingTx> {
        let mut state = self.begin().await?;
        if std::mem::take(&mut state.revert_next) {
            return Ok(state.broadcast(false, Vec::new()));
        }
        let (message_index, payload) = state.check_acknowledgement(acknowledgement)?;
        let validation_id = match payload {
            StakingPayload::L1ValidatorRegistration {
                validation_id,
                registered: false,
            } => validation_id,
            StakingPayload::L1ValidatorRegistration {
                registered: true, ..
            } => return Err(GatewayError::reverted("UnexpectedRegistrationStatus")),
            _ => return Err(GatewayError::reverted("InvalidWarpMessage")),
        };

        let validator = state.validator_mut(validation_id)?;
        if validator.validator.status != StakeStatus::PendingRemoved {
            return Err(GatewayError::reverted("InvalidValidatorStatus"));
        }
        validator.validator.status = StakeStatus::Removed;
        validator.validator.weight = 0;
        let stake_returned = validator.stake;
        let rewards = U256::from(validator.uptime_secs.unwrap_or(0) * REWARD_PER_SECOND);
        state.consumed_indices.insert(message_index);

        Ok(state.broadcast(
            true,
            vec![StakingEvent::ValidatorRemovalCompleted {
                validation_id,
                stake_returned,
                rewards,
            }],
        ))
    }

    async fn initiate_delegator_registration(
        &self,
        params: &DelegationParams,
    ) -> GatewayResult<PendingTx> {
        let mut state = self.begin().await?;
        if std::mem::take(&mut state.revert_next) {
            return Ok(state.broadcast(false, Vec::new()));
        }
        let weight = weight_of(params.stake)?;
        let validation_id = params.validation_id;

        let validator = state.validator_mut(validation_id)?;
        if validator.validator.status != StakeStatus::Active {
            return Err(GatewayError::reverted("InvalidValidatorStatus"));
        }
        validator.nonce += 1;
        let nonce = validator.nonce;
        let payload = StakingPayload::L1ValidatorWeight {
            validation_id,
            nonce,
            weight: validator.validator.weight + weight,
        };
        let delegation_id =
            DelegationId::from(sha256(&[validation_id.as_bytes(), &nonce.to_be_bytes()]));
        let warp_event = self.warp_event(&payload);

        state.delegations.insert(
            delegation_id,
            SimDelegation {
                delegation: Delegation {
                    delegation_id,
                    validation_id,
                    weight,
                    status: StakeStatus::PendingAdded,
                    owner: params.delegator,
                },
                stake: params.stake,
            },
        );

        Ok(state.broadcast(
            true,
            vec![
                warp_event,
                StakingEvent::DelegatorRegistrationInitiated {
                    delegation_id,
                    validation_id,
                    weight,
                },
            ],
        ))
    }

    async fn complete_delegator_registration(
        &self,
        delegation_id: DelegationId,
        acknowledgement: &SignedMessage,
    ) -> GatewayResult<PendingTx> {
        let mut state = self.begin().await?;
        if std::mem::take(&mut state.revert_next) {
            return Ok(state.broadcast(false, Vec::new()));
        }
        let (message_index, payload) = state.check_acknowledgement(acknowledgement)?;

        let delegation = state.delegation_mut(delegation_id)?;
        let (validation_id, weight) = (delegation.delegation.validation_id, delegation.delegation.weight);
        if delegation.delegation.status != StakeStatus::PendingAdded {
            return Err(GatewayError::reverted("InvalidDelegatorStatus"));
        }
        if !matches!(payload, StakingPayload::L1ValidatorWeight { validation_id: acked, .. } if acked == validation_id)
        {
            return Err(GatewayError::reverted("InvalidWarpMessage"));
        }
        delegation.delegation.status = StakeStatus::Active;
        state.validator_mut(validation_id)?.validator.weight += weight;
        state.consumed_indices.insert(message_index);

        Ok(state.broadcast(
            true,
            vec![StakingEvent::DelegatorRegistrationCompleted { delegation_id }],
        ))
    }

    async fn initiate_delegator_removal(
        &self,
        delegation_id: DelegationId,
        uptime_proof: Option<&SignedMessage>,
    ) -> GatewayResult<PendingTx> {
        let mut state = self.begin().await?;
        if std::mem::take(&mut state.revert_next) {
            return Ok(state.broadcast(false, Vec::new()));
        }
        let delegation = state.delegation_mut(delegation_id)?;
        if delegation.delegation.status != StakeStatus::Active {
            return Err(GatewayError::reverted("InvalidDelegatorStatus"));
        }
        let (validation_id, weight) = (delegation.delegation.validation_id, delegation.delegation.weight);
        let uptime_event = state.record_uptime(&self.config, validation_id, uptime_proof)?;

        let validator = state.validator_mut(validation_id)?;
        validator.nonce += 1;
        let payload = StakingPayload::L1ValidatorWeight {
            validation_id,
            nonce: validator.nonce,
            weight: validator.validator.weight.saturating_sub(weight),
        };
        let warp_event = self.warp_event(&payload);
        state.delegation_mut(delegation_id)?.delegation.status = StakeStatus::PendingRemoved;

        let mut events: Vec<_> = uptime_event.into_iter().collect();
        events.push(warp_event);
        events.push(StakingEvent::DelegatorRemovalInitiated { delegation_id });

        Ok(state.broadcast(true, events))
    }

    async fn complete_delegator_removal(
        &self,
        delegation_id: DelegationId,
        acknowledgement: &SignedMessage,
    ) -> GatewayResult<PendingTx> {
        let mut state = self.begin().await?;
        if std::mem::take(&mut state.revert_next) {
            return Ok(state.broadcast(false, Vec::new()));
        }
        let (message_index, payload) = state.check_acknowledgement(acknowledgement)?;

        let delegation = state.delegation_mut(delegation_id)?;
        let (validation_id, weight, stake) = (
            delegation.delegation.validation_id,
            delegation.delegation.weight,
            delegation.stake,
        );
        if delegation.delegation.status != StakeStatus::PendingRemoved {
            return Err(GatewayError::reverted("InvalidDelegatorStatus"));
        }
        if !matches!(payload, StakingPayload::L1ValidatorWeight { validation_id: acked, .. } if acked == validation_id)
        {
            return Err(GatewayError::reverted("InvalidWarpMessage"));
        }
        delegation.delegation.status = StakeStatus::Removed;

        let validator = state.validator_mut(validation_id)?;
        validator.validator.weight = validator.validator.weight.saturating_sub(weight);
        let earned = validator.uptime_secs.unwrap_or(0) * REWARD_PER_SECOND;
        let fees = earned * u64::from(validator.fee_bips) / BIPS;
        validator.fees_accrued += U256::from(fees);
        state.consumed_indices.insert(message_index);

        Ok(state.broadcast(
            true,
            vec![StakingEvent::DelegatorRemovalCompleted {
                delegation_id,
                stake_returned: stake,
                rewards: U256::from(earned - fees),
                fees: U256::from(fees),
            }],
        ))
    }

    async fn claim_delegation_fees(&self, validation_id: ValidationId) -> GatewayResult<PendingTx> {
        let mut state = self.begin().await?;
        if std::mem::take(&mut state.revert_next) {
            return Ok(state.broadcast(false, Vec::new()));
        }
        let validator = state.validator_mut(validation_id)?;
        let amount = std::mem::take(&mut validator.fees_accrued);

        Ok(state.broadcast(
            true,
            vec![StakingEvent::DelegationFeesClaimed {
                validation_id,
                amount,
            }],
        ))
    }

    async fn get_validator(&self, validation_id: ValidationId) -> GatewayResult<Option<Validator>> {
        let state = self.view()?;
        Ok(state
            .validators
            .get(&validation_id)
            .map(|v| v.validator.clone()))
    }

    async fn get_delegator(
        &self,
        delegation_id: DelegationId,
    ) -> GatewayResult<Option<Delegation>> {
        let state = self.view()?;
        Ok(state
            .delegations
            .get(&delegation_id)
            .map(|d| d.delegation.clone()))
    }

    async fn value_to_claim(&self, validation_id: ValidationId) -> GatewayResult<U256> {
        let state = self.view()?;
        Ok(state
            .validators
            .get(&validation_id)
            .map(|v| v.fees_accrued)
            .unwrap_or_default())
    }
}

impl ReceiptSource for SimNetwork {
    async fn receipt(&self, tx_hash: TxHash) -> GatewayResult<Option<Receipt>> {
        let mut state = self.lock();
        if state.chain_down {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        let Some(sim) = state.receipts.get_mut(&tx_hash) else {
            return Ok(None);
        };
        if !sim.released {
            return Ok(None);
        }
        if sim.polls_left > 0 {
            sim.polls_left -= 1;
            return Ok(None);
        }

        Ok(Some(sim.receipt.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{delegation_params, validator_params};

    async fn mined(net: &SimNetwork, pending: PendingTx) -> Receipt {
        net.receipt(pending.tx_hash).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn registration_emits_message_and_pending_validator() {
        let net = SimNetwork::default();
        let pending = net
            .initiate_validator_registration(&validator_params(1, 100))
            .await
            .unwrap();
        let receipt = mined(&net, pending).await;

        let validation_id = receipt
            .find_event(|event| match event {
                StakingEvent::ValidatorRegistrationInitiated { validation_id, .. } => {
                    Some(*validation_id)
                }
                _ => None,
            })
            .unwrap();
        let message = receipt.warp_message().unwrap();
        assert!(matches!(
            message.staking_payload().unwrap(),
            StakingPayload::RegisterL1Validator { weight: 100, .. }
        ));

        let validator = net.get_validator(validation_id).await.unwrap().unwrap();
        assert_eq!(validator.status, StakeStatus::PendingAdded);
    }

    #[tokio::test]
    async fn duplicate_node_is_rejected() {
        let net = SimNetwork::default();
        net.initiate_validator_registration(&validator_params(1, 100))
            .await
            .unwrap();

        let err = net
            .initiate_validator_registration(&validator_params(1, 100))
            .await
            .unwrap_err();
        assert_eq!(err.revert_name(), Some("InvalidNodeID"));
    }

    #[tokio::test]
    async fn stalled_receipts_appear_after_release() {
        let net = SimNetwork::default();
        net.stall_receipts(true);
        let pending = net
            .initiate_validator_registration(&validator_params(2, 100))
            .await
            .unwrap();

        assert!(net.receipt(pending.tx_hash).await.unwrap().is_none());
        net.release_receipts();
        assert!(mined(&net, pending).await.success);
    }

    #[tokio::test]
    async fn delegation_to_unknown_validator_reverts() {
        let net = SimNetwork::default();
        let err = net
            .initiate_delegator_registration(&delegation_params(ValidationId::from([9u8; 32]), 3, 10))
            .await
            .unwrap_err();

        assert_eq!(err.revert_name(), Some("InvalidValidationID"));
    }

    #[tokio::test]
    async fn wallet_rejection_and_outage_are_reported() {
        let net = SimNetwork::default();
        net.set_wallet_rejects(true);
        assert_eq!(
            net.initiate_validator_registration(&validator_params(1, 100))
                .await
                .unwrap_err(),
            GatewayError::UserRejected
        );

        net.set_chain_down(true);
        assert!(matches!(
            net.get_validator(ValidationId::from([1u8; 32])).await,
            Err(GatewayError::Transport(_))
        ));
    }
}
