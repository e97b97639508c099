//! Budgets for the steps that wait on a chain.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::default::{
    BROADCAST_CLAIM_TIMEOUT, COMPLETION_TIMEOUT, CONFIRMATION_TIMEOUT, PLATFORM_FINALITY_TIMEOUT,
    POLL_INTERVAL,
};

/// How long each waiting step may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutParams {
    /// Budget for `initiate*` and fee-claim transactions.
    pub confirmation: Duration,

    /// Budget for `complete*` transactions.
    pub completion: Duration,

    /// Budget for a platform-chain transaction to be committed.
    pub platform_finality: Duration,

    /// Delay between two lookups while waiting.
    pub poll_interval: Duration,

    /// How long a claim to broadcast an `initiate*` transaction holds off other sessions.
    pub broadcast_claim: Duration,
}

impl Default for TimeoutParams {
    fn default() -> Self {
        Self {
            confirmation: CONFIRMATION_TIMEOUT,
            completion: COMPLETION_TIMEOUT,
            platform_finality: PLATFORM_FINALITY_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            broadcast_claim: BROADCAST_CLAIM_TIMEOUT,
        }
    }
}
