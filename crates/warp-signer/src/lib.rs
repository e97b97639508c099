//! Aggregates validator signatures over warp messages.
//!
//! Aggregation starts at the highest quorum of the [`QuorumPolicy`](stakeflow_params::quorum::QuorumPolicy)
//! and descends only when the aggregator reports that not enough stake signed. The crate also
//! builds and signs the uptime proofs attached to removals.

pub mod aggregator;
pub mod errors;
pub mod http;
pub mod signer;
pub mod uptime;

pub use aggregator::{AggregationRequest, SignatureAggregator};
pub use errors::{AggregatorError, SignError, UptimeError};
pub use http::HttpAggregator;
pub use signer::WarpSigner;
pub use uptime::{JsonRpcUptimeSource, UptimeProof, UptimeProver, UptimeSource};
