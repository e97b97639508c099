//! Drives the staking saga across the execution chain and the platform chain.
//!
//! Each step is a discrete, caller-triggered async call that returns the artifact the next step
//! needs:
//!
//! - [`RegistrationOrchestrator`] moves a validator registration or a delegation from intent to
//!   active: initiate, sign, submit to the platform chain, complete.
//! - [`RemovalOrchestrator`] does the same for removals, optionally attaching a signed uptime proof
//!   to the initiating transaction.
//! - [`FeeClaimer`] pays out accumulated delegation fees, outside of any saga.
//!
//! Every step persists the [`StakeOperation`](stakeflow_primitives::operation::StakeOperation) it
//! advances, and no two steps run concurrently for the same key.

pub mod artifacts;
pub mod context;
pub mod errors;
pub mod fees;
pub mod guard;
pub mod registration;
pub mod removal;
pub mod report;
mod saga;

#[cfg(test)]
mod testing;

pub use context::{ContextConfig, ExecutionChain, StakeContext};
pub use errors::StepError;
pub use fees::FeeClaimer;
pub use registration::RegistrationOrchestrator;
pub use removal::RemovalOrchestrator;
pub use report::{Reportable, StepReport};
