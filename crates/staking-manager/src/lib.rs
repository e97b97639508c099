//! Gateway to the staking-manager contract on the execution chain.
//!
//! Every state-changing call returns as soon as the transaction is broadcast; waiting for
//! confirmation is the job of the `tx-waiter` crate. Errors are passed through without
//! interpretation so the caller can classify them.

pub mod client;
pub mod errors;
pub mod interface;
pub mod predicate;
pub mod receipt;
pub mod traits;

pub use client::AlloyStakingManager;
pub use errors::{GatewayError, GatewayResult};
pub use traits::StakingManager;
