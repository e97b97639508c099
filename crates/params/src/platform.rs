//! Parameters of the platform-chain transactions.

use serde::{Deserialize, Serialize};

use crate::default::REGISTRATION_BALANCE;

/// Parameters of the transactions issued on the platform chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformParams {
    /// Balance attached to a validator registration to pay its continuous fee.
    pub registration_balance: u64,
}

impl Default for PlatformParams {
    fn default() -> Self {
        Self {
            registration_balance: REGISTRATION_BALANCE,
        }
    }
}
