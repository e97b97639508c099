//! Issuing platform-chain transactions and waiting for them to be committed.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use stakeflow_params::{platform::PlatformParams, timeouts::TimeoutParams};
use stakeflow_primitives::{ids::PlatformTxId, operation::OperationKind, warp::SignedMessage};
use tokio::{select, time::sleep};
use tracing::{debug, info, warn};

use crate::{
    client::{PlatformChainClient, PlatformTxStatus},
    errors::SubmitError,
    tx::PlatformTx,
};

/// A committed platform-chain transaction and the acknowledgement it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfirmation {
    /// The committed transaction.
    pub tx_id: PlatformTxId,

    /// Index the `complete*` call names the acknowledgement by.
    pub message_index: u32,

    /// Signed acknowledgement of the applied message.
    pub acknowledgement: SignedMessage,
}

/// Submits signed messages to the platform chain.
#[derive(Debug, Clone)]
pub struct PlatformSubmitter<C> {
    client: C,
    params: PlatformParams,
    finality_timeout: Duration,
    poll_interval: Duration,
}

impl<C: PlatformChainClient> PlatformSubmitter<C> {
    /// Creates a submitter using the finality budget and polling interval of `timeouts`.
    pub const fn new(client: C, params: PlatformParams, timeouts: &TimeoutParams) -> Self {
        Self {
            client,
            params,
            finality_timeout: timeouts.platform_finality,
            poll_interval: timeouts.poll_interval,
        }
    }

    /// Issues the transaction finalizing an operation of `kind` and waits for it to be committed.
    pub async fn submit(
        &self,
        kind: OperationKind,
        signed_message: SignedMessage,
    ) -> Result<PlatformConfirmation, SubmitError> {
        let tx_id = self.issue(kind, signed_message).await?;
        self.await_finality(tx_id, None).await
    }

    /// Issues the transaction finalizing an operation of `kind` without waiting.
    pub async fn issue(
        &self,
        kind: OperationKind,
        signed_message: SignedMessage,
    ) -> Result<PlatformTxId, SubmitError> {
        let message_id = signed_message.id();
        let tx = PlatformTx::for_operation(kind, signed_message, &self.params)?;
        let tx_id = self.client.issue_tx(&tx).await?;

        info!(%tx_id, %message_id, %kind, "issued platform transaction");
        Ok(tx_id)
    }

    /// Waits for `tx_id` to be committed.
    ///
    /// `timeout` overrides the default finality budget. Calling this again after a
    /// [`SubmitError::Timeout`] resumes waiting on the same transaction.
    pub async fn await_finality(
        &self,
        tx_id: PlatformTxId,
        timeout: Option<Duration>,
    ) -> Result<PlatformConfirmation, SubmitError> {
        let budget = timeout.unwrap_or(self.finality_timeout);

        select! {
            biased;

            res = self.poll_until_decided(tx_id) => res,

            _ = sleep(budget) => {
                warn!(%tx_id, ?budget, "platform transaction not committed within budget");
                Err(SubmitError::Timeout { tx_id, waited: budget })
            }
        }
    }

    async fn poll_until_decided(
        &self,
        tx_id: PlatformTxId,
    ) -> Result<PlatformConfirmation, SubmitError> {
        loop {
            match self.client.tx_status(tx_id).await? {
                PlatformTxStatus::Committed {
                    message_index,
                    acknowledgement,
                } => {
                    info!(%tx_id, message_index, "platform transaction committed");
                    return Ok(PlatformConfirmation {
                        tx_id,
                        message_index,
                        acknowledgement,
                    });
                }
                PlatformTxStatus::Dropped { reason } => {
                    warn!(%tx_id, %reason, "platform transaction dropped");
                    return Err(SubmitError::Dropped { tx_id, reason });
                }
                PlatformTxStatus::Processing => {
                    debug!(%tx_id, "platform transaction still processing");
                    sleep(self.poll_interval).await;
                }
            }
        }
    }
}
