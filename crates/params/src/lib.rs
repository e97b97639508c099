//! This crate contains the parameters that govern how the staking saga talks to both chains: the
//! signature quorum policy, confirmation budgets and platform-chain fees.

mod default;
pub mod errors;
pub mod platform;
pub mod quorum;
pub mod timeouts;

use serde::{Deserialize, Serialize};

use crate::{platform::PlatformParams, quorum::QuorumPolicy, timeouts::TimeoutParams};

/// All the parameters of the staking saga.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeParams {
    /// Quorums tried, in order, when aggregating signatures.
    #[serde(default)]
    pub quorum: QuorumPolicy,

    /// Waiting budgets.
    #[serde(default)]
    pub timeouts: TimeoutParams,

    /// Platform-chain parameters.
    #[serde(default)]
    pub platform: PlatformParams,
}
