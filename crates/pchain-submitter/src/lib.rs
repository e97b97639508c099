//! Submits signed warp messages to the platform chain and waits for them to be committed.
//!
//! Issuing and waiting are separate calls so that a caller can record the platform transaction
//! before waiting, and reconcile a timed-out wait later without resubmitting.

pub mod client;
pub mod errors;
pub mod submitter;
pub mod tx;

pub use client::{JsonRpcPlatformClient, PlatformChainClient, PlatformTxStatus};
pub use errors::{PlatformError, SubmitError};
pub use submitter::{PlatformConfirmation, PlatformSubmitter};
pub use tx::{PlatformAction, PlatformTx};
