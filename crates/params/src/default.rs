//! Default values for the staking saga.

use std::time::Duration;

/// Quorum percentages tried in order when aggregating signatures.
pub(crate) const QUORUM_DESCENT: [u8; 3] = [67, 50, 33];

/// Budget for an `initiate*` transaction to be confirmed.
pub(crate) const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Budget for a `complete*` transaction to be confirmed.
///
/// Completions verify a warp predicate and are slower to be included.
pub(crate) const COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

/// Budget for a platform-chain transaction to be committed.
pub(crate) const PLATFORM_FINALITY_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a session's claim to broadcast an `initiate*` transaction keeps other sessions out.
///
/// Covers the wallet prompt; a claim older than this was left by a session that went away.
pub(crate) const BROADCAST_CLAIM_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Delay between two receipt or status lookups.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Balance, in nano-units of the platform token, that pays for a new validator's continuous fee.
pub(crate) const REGISTRATION_BALANCE: u64 = 100_000_000;
