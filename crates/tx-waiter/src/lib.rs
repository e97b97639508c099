//! Waits, within a bounded budget, for execution-chain transactions to be mined.
//!
//! A timeout does not mean the transaction failed: it may still be mined later. The error carries
//! the hash so the caller can reconcile with [`TxWaiter::check`].

pub mod errors;
pub mod source;
pub mod waiter;

pub use errors::WaitError;
pub use source::ReceiptSource;
pub use waiter::TxWaiter;
