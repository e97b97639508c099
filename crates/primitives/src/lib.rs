//! This crate contains the types shared by every other crate in the workspace: identifiers,
//! ledger records, the warp message codec, the persisted [`StakeOperation`](operation::StakeOperation)
//! and the error-kind taxonomy reported to callers.
//!
//! It lies at the bottom of the crate-hierarchy in this workspace i.e., it does not depend on any
//! other crate in this workspace.

pub mod errors;
pub mod events;
pub mod ids;
pub mod operation;
pub mod records;
pub mod warp;

/// Hash of an execution-chain transaction.
pub type TxHash = alloy_primitives::B256;
