//! The signature aggregator interface.

use std::{future::Future, sync::Arc};

use alloy_primitives::Bytes;
use stakeflow_primitives::{
    ids::SubnetId,
    warp::{SignedMessage, UnsignedMessage},
};

use crate::errors::AggregatorError;

/// A single aggregation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationRequest {
    /// Message to collect signatures over.
    pub message: UnsignedMessage,

    /// Extra data validators need to decide whether to sign, if any.
    pub justification: Option<Bytes>,

    /// Subnet whose validators sign.
    pub signing_subnet_id: SubnetId,

    /// Share of the subnet's stake that must sign, in percent.
    pub quorum_percentage: u8,
}

/// Collects BLS signatures from a subnet's validators and aggregates them.
pub trait SignatureAggregator: Send + Sync {
    /// Aggregates signatures over `request.message` at `request.quorum_percentage`.
    fn aggregate(
        &self,
        request: &AggregationRequest,
    ) -> impl Future<Output = Result<SignedMessage, AggregatorError>> + Send;
}

impl<T: SignatureAggregator> SignatureAggregator for Arc<T> {
    fn aggregate(
        &self,
        request: &AggregationRequest,
    ) -> impl Future<Output = Result<SignedMessage, AggregatorError>> + Send {
        self.as_ref().aggregate(request)
    }
}
