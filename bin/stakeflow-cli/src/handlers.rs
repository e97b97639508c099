//! Command handlers.
//!
//! Each invocation runs one step against live endpoints. The step's artifact can be written to a
//! file and handed to the next invocation, and the operation record in the database lets an
//! interrupted step be retried.

mod output;
mod query;
mod steps;

use std::sync::Arc;

use alloy::{
    network::EthereumWallet,
    primitives::Address,
    providers::ProviderBuilder,
    signers::local::PrivateKeySigner,
};
use anyhow::{Context, Result};
use pchain_submitter::{JsonRpcPlatformClient, PlatformChainClient};
use stakeflow_db::{OperationDb, SqliteOperationDb};
use stakeflow_orchestrator::{
    ExecutionChain, FeeClaimer, RegistrationOrchestrator, RemovalOrchestrator, StakeContext,
};
use staking_manager::AlloyStakingManager;
use tracing::info;
use warp_signer::{HttpAggregator, JsonRpcUptimeSource, SignatureAggregator, UptimeSource};

use crate::{cli::Commands, config::Config};

/// Connects to every endpoint named in `config` and runs `command`.
pub(crate) async fn handle(command: Commands, config: Config) -> Result<()> {
    let signer = load_signer(&config.private_key_env)?;
    let sender = signer.address();
    info!(event = "loaded signing key", %sender);

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::new(signer))
        .on_http(config.execution_rpc_url.parse()?);
    let gateway = AlloyStakingManager::new(provider, config.staking_manager);

    let aggregator = HttpAggregator::new(config.aggregator_url.clone());
    let platform = JsonRpcPlatformClient::connect(&config.platform_rpc_url)
        .context("could not create platform-chain client")?;
    let uptime = JsonRpcUptimeSource::connect(&config.uptime_rpc_url)
        .context("could not create uptime client")?;

    let db = SqliteOperationDb::open(&config.db_path, config.db.clone())
        .await
        .with_context(|| format!("could not open database {}", config.db_path.display()))?;

    let ctx = StakeContext::new(
        gateway,
        aggregator,
        platform,
        uptime,
        db,
        config.context_config(),
    );

    Session::new(Arc::new(ctx), sender).run(command).await
}

fn load_signer(var: &str) -> Result<PrivateKeySigner> {
    let key = std::env::var(var)
        .with_context(|| format!("expected the hex-encoded signing key in ${var}"))?;

    key.trim()
        .parse::<PrivateKeySigner>()
        .with_context(|| format!("${var} does not hold a valid signing key"))
}

/// The orchestrators of one invocation, sharing a context.
pub(crate) struct Session<G, A, P, U, D> {
    ctx: Arc<StakeContext<G, A, P, U, D>>,
    registration: RegistrationOrchestrator<G, A, P, U, D>,
    removal: RemovalOrchestrator<G, A, P, U, D>,
    fees: FeeClaimer<G, A, P, U, D>,

    /// Account the wallet signs for. Delegations and reward recipients default to it.
    sender: Address,
}

impl<G, A, P, U, D> Session<G, A, P, U, D>
where
    G: ExecutionChain,
    A: SignatureAggregator,
    P: PlatformChainClient,
    U: UptimeSource,
    D: OperationDb,
{
    pub(crate) fn new(ctx: Arc<StakeContext<G, A, P, U, D>>, sender: Address) -> Self {
        Self {
            registration: RegistrationOrchestrator::new(ctx.clone()),
            removal: RemovalOrchestrator::new(ctx.clone()),
            fees: FeeClaimer::new(ctx.clone()),
            ctx,
            sender,
        }
    }

    pub(crate) async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::RegisterValidator(args) => self.register_validator(args).await,
            Commands::AddDelegation(args) => self.add_delegation(args).await,
            Commands::RemoveValidator(args) => self.remove_validator(args).await,
            Commands::RemoveDelegation(args) => self.remove_delegation(args).await,
            Commands::Sign(args) => self.sign(args).await,
            Commands::Submit(args) => self.submit(args).await,
            Commands::Complete(args) => self.complete(args).await,
            Commands::ClaimFees(args) => self.claim_fees(args).await,
            Commands::Status(args) => self.status(args).await,
            Commands::CheckTx(args) => self.check_tx(args).await,
        }
    }
}
