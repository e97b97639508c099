//! Bounded waiting for receipts.

use std::time::Duration;

use stakeflow_params::timeouts::TimeoutParams;
use stakeflow_primitives::{
    events::{PendingTx, Receipt},
    TxHash,
};
use tokio::{select, time::sleep};
use tracing::{debug, info, warn};

use crate::{errors::WaitError, source::ReceiptSource};

/// Polls a [`ReceiptSource`] until a transaction is mined or its budget runs out.
#[derive(Debug, Clone)]
pub struct TxWaiter<R> {
    source: R,
    default_timeout: Duration,
    poll_interval: Duration,
}

impl<R: ReceiptSource> TxWaiter<R> {
    /// Creates a waiter that uses the confirmation budget and polling interval of `timeouts`.
    pub const fn new(source: R, timeouts: &TimeoutParams) -> Self {
        Self {
            source,
            default_timeout: timeouts.confirmation,
            poll_interval: timeouts.poll_interval,
        }
    }

    /// The receipt source.
    pub const fn source(&self) -> &R {
        &self.source
    }

    /// Waits for `pending` to be mined.
    ///
    /// `timeout` overrides the default budget for this call. On [`WaitError::Timeout`] the
    /// outcome is unknown; nothing is resubmitted.
    pub async fn wait(
        &self,
        pending: &PendingTx,
        timeout: Option<Duration>,
    ) -> Result<Receipt, WaitError> {
        let tx_hash = pending.tx_hash;
        let budget = timeout.unwrap_or(self.default_timeout);

        select! {
            biased;

            res = self.poll_until_mined(tx_hash) => res,

            _ = sleep(budget) => {
                warn!(%tx_hash, ?budget, "transaction not confirmed within budget");
                Err(WaitError::Timeout { tx_hash, waited: budget })
            }
        }
    }

    /// Looks up the receipt of `tx_hash` once.
    ///
    /// Used to reconcile an operation whose wait timed out.
    pub async fn check(&self, tx_hash: TxHash) -> Result<Option<Receipt>, WaitError> {
        self.source
            .receipt(tx_hash)
            .await
            .map_err(|source| WaitError::Chain { tx_hash, source })
    }

    async fn poll_until_mined(&self, tx_hash: TxHash) -> Result<Receipt, WaitError> {
        loop {
            match self.check(tx_hash).await? {
                Some(receipt) => {
                    info!(
                        %tx_hash,
                        block = receipt.block_number,
                        success = receipt.success,
                        "transaction mined"
                    );
                    return Ok(receipt);
                }
                None => {
                    debug!(%tx_hash, "receipt not yet available");
                    sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use staking_manager::{GatewayError, GatewayResult};

    use super::*;

    /// Serves a receipt after `ready_after` lookups, or an error if `fail` is set.
    #[derive(Debug, Default)]
    struct CountingSource {
        lookups: AtomicUsize,
        ready_after: usize,
        fail: bool,
    }

    impl CountingSource {
        fn ready_after(ready_after: usize) -> Arc<Self> {
            Arc::new(Self {
                ready_after,
                ..Default::default()
            })
        }
    }

    impl ReceiptSource for CountingSource {
        async fn receipt(&self, tx_hash: TxHash) -> GatewayResult<Option<Receipt>> {
            if self.fail {
                return Err(GatewayError::Transport("connection refused".to_string()));
            }
            let seen = self.lookups.fetch_add(1, Ordering::SeqCst) + 1;

            Ok((seen > self.ready_after).then(|| Receipt {
                tx_hash,
                block_number: seen as u64,
                success: true,
                events: Vec::new(),
            }))
        }
    }

    fn pending() -> PendingTx {
        PendingTx::new(TxHash::repeat_byte(0xab))
    }

    #[tokio::test(start_paused = true)]
    async fn returns_receipt_once_mined() {
        let source = CountingSource::ready_after(3);
        let waiter = TxWaiter::new(source.clone(), &TimeoutParams::default());

        let receipt = waiter.wait(&pending(), None).await.expect("must be mined");

        assert_eq!(receipt.tx_hash, pending().tx_hash);
        assert_eq!(source.lookups.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_carries_hash_and_budget() {
        let source = CountingSource::ready_after(usize::MAX);
        let waiter = TxWaiter::new(source, &TimeoutParams::default());

        let err = waiter.wait(&pending(), None).await.unwrap_err();

        assert_eq!(
            err,
            WaitError::Timeout {
                tx_hash: pending().tx_hash,
                waited: TimeoutParams::default().confirmation,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn per_call_budget_overrides_default_and_check_reconciles() {
        // mined on the 5th lookup, i.e. after 2s of polling
        let source = CountingSource::ready_after(4);
        let waiter = TxWaiter::new(source, &TimeoutParams::default());

        let err = waiter
            .wait(&pending(), Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert_eq!(err.tx_hash(), pending().tx_hash);
        assert!(matches!(err, WaitError::Timeout { .. }));

        // the lookups made while waiting count; a few more and the receipt shows up
        let mut reconciled = None;
        for _ in 0..5 {
            reconciled = waiter.check(pending().tx_hash).await.expect("no chain error");
            if reconciled.is_some() {
                break;
            }
        }
        assert!(reconciled.expect("must eventually be mined").success);
    }

    #[tokio::test(start_paused = true)]
    async fn chain_errors_are_not_timeouts() {
        let source = Arc::new(CountingSource {
            fail: true,
            ..Default::default()
        });
        let waiter = TxWaiter::new(source, &TimeoutParams::default());

        let err = waiter.wait(&pending(), None).await.unwrap_err();

        assert!(matches!(err, WaitError::Chain { .. }), "{err:?}");
    }
}
