//! Read-only handlers.

use anyhow::{bail, Result};
use pchain_submitter::PlatformChainClient;
use serde_json::json;
use stakeflow_db::OperationDb;
use stakeflow_orchestrator::ExecutionChain;
use tracing::info;
use warp_signer::{SignatureAggregator, UptimeSource};

use super::{output::print_json, Session};
use crate::cli::{CheckTxArgs, StatusArgs};

impl<G, A, P, U, D> Session<G, A, P, U, D>
where
    G: ExecutionChain,
    A: SignatureAggregator,
    P: PlatformChainClient,
    U: UptimeSource,
    D: OperationDb,
{
    pub(super) async fn status(&self, args: StatusArgs) -> Result<()> {
        let Some(key) = args.key else {
            let pending = self.ctx.pending_operations().await?;
            info!(event = "listed pending operations", count = pending.len());

            return print_json(&pending);
        };

        match self.ctx.operation(key).await? {
            Some(operation) => print_json(&operation),
            None => bail!("no operation recorded for {key}"),
        }
    }

    /// Reports a transaction whose confirmation timed out, so the caller can tell whether to
    /// retry the step or wait longer.
    pub(super) async fn check_tx(&self, args: CheckTxArgs) -> Result<()> {
        let tx_hash = args.tx_hash;

        match self.ctx.check_tx(tx_hash).await? {
            Some(receipt) => {
                let status = if receipt.success {
                    "succeeded"
                } else {
                    "reverted"
                };
                print_json(&json!({
                    "tx_hash": tx_hash,
                    "status": status,
                    "block_number": receipt.block_number,
                }))
            }
            None => print_json(&json!({ "tx_hash": tx_hash, "status": "pending" })),
        }
    }
}
