//! Uptime proofs attached to removals.
//!
//! Rewards depend on how long a validator was online. The validator's own node reports its
//! uptime; the validators of the signing subnet then attest it by signing a `ValidationUptime`
//! message.

use std::future::Future;

use jsonrpsee::{
    core::{client::ClientT, RpcResult},
    http_client::{HttpClient, HttpClientBuilder},
    proc_macros::rpc,
};
use serde::{Deserialize, Serialize};
use stakeflow_primitives::{
    ids::{ChainId, SubnetId, ValidationId},
    warp::{SignedMessage, StakingPayload, UnsignedMessage},
};
use tracing::info;

use crate::{aggregator::SignatureAggregator, errors::UptimeError, signer::WarpSigner};

/// Arguments of `validators.getCurrentValidators`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCurrentValidatorsArgs {
    /// Restricts the reply to these validations. Empty means all.
    #[serde(rename = "validationIDs")]
    pub validation_ids: Vec<ValidationId>,
}

/// One entry of the `validators.getCurrentValidators` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentValidator {
    /// The validation.
    #[serde(rename = "validationID")]
    pub validation_id: ValidationId,

    /// Seconds the node observed the validator online.
    pub uptime_seconds: u64,

    /// Whether the validator is currently active.
    pub is_active: bool,
}

/// Reply of `validators.getCurrentValidators`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCurrentValidatorsReply {
    /// Validators known to the node.
    pub validators: Vec<CurrentValidator>,
}

/// Validator-info RPC served by the validator's execution-chain node.
#[rpc(client)]
pub trait ValidatorsApi {
    /// Lists the current validators with their uptime.
    #[method(name = "validators.getCurrentValidators")]
    async fn get_current_validators(
        &self,
        args: GetCurrentValidatorsArgs,
    ) -> RpcResult<GetCurrentValidatorsReply>;
}

/// Reports how long a validator has been online.
pub trait UptimeSource: Send + Sync {
    /// Returns the uptime of `validation_id`, in seconds.
    fn uptime(
        &self,
        validation_id: ValidationId,
    ) -> impl Future<Output = Result<u64, UptimeError>> + Send;
}

/// [`UptimeSource`] over the `validators` JSON-RPC API.
#[derive(Debug, Clone)]
pub struct JsonRpcUptimeSource<C = HttpClient> {
    client: C,
}

impl JsonRpcUptimeSource<HttpClient> {
    /// Connects to the node at `url`.
    pub fn connect(url: &str) -> Result<Self, UptimeError> {
        let client = HttpClientBuilder::default()
            .build(url)
            .map_err(|e| UptimeError::Source(e.to_string()))?;

        Ok(Self { client })
    }
}

impl<C> JsonRpcUptimeSource<C> {
    /// Wraps an existing client.
    pub const fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: ClientT + Send + Sync> UptimeSource for JsonRpcUptimeSource<C> {
    async fn uptime(&self, validation_id: ValidationId) -> Result<u64, UptimeError> {
        let reply = self
            .client
            .get_current_validators(GetCurrentValidatorsArgs {
                validation_ids: vec![validation_id],
            })
            .await
            .map_err(|e| UptimeError::Source(e.to_string()))?;

        reply
            .validators
            .into_iter()
            .find(|v| v.validation_id == validation_id)
            .map(|v| v.uptime_seconds)
            .ok_or(UptimeError::UnknownValidator(validation_id))
    }
}

/// A signed attestation of a validator's uptime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UptimeProof {
    /// Attested uptime, in seconds.
    pub uptime_secs: u64,

    /// The signed `ValidationUptime` message.
    pub signed: SignedMessage,
}

/// Builds and signs uptime proofs for validators of one execution chain.
#[derive(Debug, Clone)]
pub struct UptimeProver<S> {
    source: S,
    network_id: u32,
    source_chain_id: ChainId,
}

impl<S: UptimeSource> UptimeProver<S> {
    /// Creates a prover for validators of `source_chain_id` on `network_id`.
    pub const fn new(source: S, network_id: u32, source_chain_id: ChainId) -> Self {
        Self {
            source,
            network_id,
            source_chain_id,
        }
    }

    /// Builds the unsigned `ValidationUptime` message for `validation_id`.
    ///
    /// The message is vouched for by the chain itself, so its source address is empty.
    pub fn uptime_message(&self, validation_id: ValidationId, uptime_secs: u64) -> UnsignedMessage {
        StakingPayload::ValidationUptime {
            validation_id,
            uptime_secs,
        }
        .to_message(self.network_id, self.source_chain_id, Vec::new())
    }

    /// Fetches the uptime of `validation_id` and has it signed through `signer`, descending
    /// through the signer's quorum policy.
    pub async fn prove<A: SignatureAggregator>(
        &self,
        signer: &WarpSigner<A>,
        validation_id: ValidationId,
        signing_subnet_id: SubnetId,
    ) -> Result<UptimeProof, UptimeError> {
        let uptime_secs = self.source.uptime(validation_id).await?;
        let message = self.uptime_message(validation_id, uptime_secs);
        let signed = signer.sign(&message, signing_subnet_id).await?;

        info!(%validation_id, uptime_secs, quorum = signed.quorum_used, "signed uptime proof");
        Ok(UptimeProof {
            uptime_secs,
            signed,
        })
    }
}
