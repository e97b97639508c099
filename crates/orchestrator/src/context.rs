//! Everything a step needs, passed explicitly instead of through globals.

use pchain_submitter::{PlatformChainClient, PlatformSubmitter};
use stakeflow_db::{DbResult, OperationDb};
use stakeflow_params::StakeParams;
use stakeflow_primitives::{
    events::Receipt,
    ids::{ChainId, SubnetId},
    operation::{OperationKey, StakeOperation},
    TxHash,
};
use staking_manager::StakingManager;
use tx_waiter::{ReceiptSource, TxWaiter, WaitError};
use warp_signer::{SignatureAggregator, UptimeProver, UptimeSource, WarpSigner};

use crate::guard::InFlightRegistry;

/// An execution chain: the staking manager and the receipts of its transactions.
pub trait ExecutionChain: StakingManager + ReceiptSource + Clone {}

impl<T: StakingManager + ReceiptSource + Clone> ExecutionChain for T {}

/// Static configuration of a [`StakeContext`].
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Quorum policy and waiting budgets.
    pub params: StakeParams,

    /// Subnet whose validators sign the execution chain's messages.
    pub signing_subnet_id: SubnetId,

    /// Network both chains belong to.
    pub network_id: u32,

    /// Chain ID of the execution chain.
    pub source_chain_id: ChainId,
}

/// The collaborators of every step, shared by the orchestrators.
#[derive(Debug)]
pub struct StakeContext<G, A, P, U, D> {
    pub(crate) gateway: G,
    pub(crate) waiter: TxWaiter<G>,
    pub(crate) signer: WarpSigner<A>,
    pub(crate) submitter: PlatformSubmitter<P>,
    pub(crate) uptime: UptimeProver<U>,
    pub(crate) db: D,
    pub(crate) in_flight: InFlightRegistry,
    pub(crate) params: StakeParams,
    pub(crate) signing_subnet_id: SubnetId,
}

impl<G, A, P, U, D> StakeContext<G, A, P, U, D>
where
    G: ExecutionChain,
    A: SignatureAggregator,
    P: PlatformChainClient,
    U: UptimeSource,
    D: OperationDb,
{
    /// Wires the collaborators together.
    pub fn new(
        gateway: G,
        aggregator: A,
        platform: P,
        uptime_source: U,
        db: D,
        config: ContextConfig,
    ) -> Self {
        let ContextConfig {
            params,
            signing_subnet_id,
            network_id,
            source_chain_id,
        } = config;

        Self {
            waiter: TxWaiter::new(gateway.clone(), &params.timeouts),
            gateway,
            signer: WarpSigner::new(aggregator, params.quorum.clone()),
            submitter: PlatformSubmitter::new(platform, params.platform, &params.timeouts),
            uptime: UptimeProver::new(uptime_source, network_id, source_chain_id),
            db,
            in_flight: InFlightRegistry::default(),
            params,
            signing_subnet_id,
        }
    }

    /// The persisted operation for `key`, if any.
    pub async fn operation(&self, key: OperationKey) -> DbResult<Option<StakeOperation>> {
        self.db.get_operation(key).await
    }

    /// Operations that are neither completed nor failed.
    pub async fn pending_operations(&self) -> DbResult<Vec<StakeOperation>> {
        self.db.pending_operations().await
    }

    /// Looks up the receipt of `tx_hash` once, to reconcile a step that timed out.
    pub async fn check_tx(&self, tx_hash: TxHash) -> Result<Option<Receipt>, WaitError> {
        self.waiter.check(tx_hash).await
    }

    /// The in-flight registry.
    pub const fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }
}
