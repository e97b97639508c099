//! The platform-chain node interface.

use std::{future::Future, sync::Arc};

use jsonrpsee::{
    core::{client::ClientT, ClientError, RpcResult},
    http_client::{HttpClient, HttpClientBuilder},
    proc_macros::rpc,
};
use serde::{Deserialize, Serialize};
use stakeflow_primitives::{ids::PlatformTxId, warp::SignedMessage};

use crate::{errors::PlatformError, tx::PlatformTx};

/// Status of an issued platform-chain transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformTxStatus {
    /// Accepted but not yet committed.
    Processing,

    /// Committed. The acknowledgement can be consumed on the execution chain.
    Committed {
        /// Index the `complete*` call names the acknowledgement by.
        message_index: u32,

        /// Signed acknowledgement of the applied message.
        acknowledgement: SignedMessage,
    },

    /// Dropped without being committed.
    Dropped {
        /// Reason given by the node.
        reason: String,
    },
}

/// Calls on a platform-chain node.
pub trait PlatformChainClient: Send + Sync {
    /// Issues `tx` and returns its ID.
    fn issue_tx(
        &self,
        tx: &PlatformTx,
    ) -> impl Future<Output = Result<PlatformTxId, PlatformError>> + Send;

    /// Looks up the status of `tx_id` once.
    fn tx_status(
        &self,
        tx_id: PlatformTxId,
    ) -> impl Future<Output = Result<PlatformTxStatus, PlatformError>> + Send;
}

impl<T: PlatformChainClient> PlatformChainClient for Arc<T> {
    fn issue_tx(
        &self,
        tx: &PlatformTx,
    ) -> impl Future<Output = Result<PlatformTxId, PlatformError>> + Send {
        self.as_ref().issue_tx(tx)
    }

    fn tx_status(
        &self,
        tx_id: PlatformTxId,
    ) -> impl Future<Output = Result<PlatformTxStatus, PlatformError>> + Send {
        self.as_ref().tx_status(tx_id)
    }
}

// ── JSON-RPC ─────────────────────────────────────────────────────────

/// Arguments of `platform.issueTx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueTxArgs {
    /// Hex-encoded transaction bytes.
    pub tx: String,
}

/// Reply of `platform.issueTx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueTxReply {
    /// ID of the issued transaction.
    #[serde(rename = "txID")]
    pub tx_id: PlatformTxId,
}

/// Arguments of `platform.getTxStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStatusArgs {
    /// Transaction to look up.
    #[serde(rename = "txID")]
    pub tx_id: PlatformTxId,
}

/// Reply of `platform.getTxStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxStatusReply {
    /// One of `Processing`, `Committed`, `Dropped`.
    pub status: String,

    /// Why the transaction was dropped.
    #[serde(default)]
    pub reason: Option<String>,

    /// Index of the acknowledgement, once committed.
    #[serde(default)]
    pub message_index: Option<u32>,

    /// Hex-encoded signed acknowledgement, once committed.
    #[serde(default)]
    pub acknowledgement: Option<String>,

    /// Quorum the acknowledgement was signed at.
    #[serde(default)]
    pub quorum: Option<u8>,
}

/// The platform-chain node's JSON-RPC API.
#[rpc(client)]
pub trait PlatformApi {
    /// Issues a signed transaction.
    #[method(name = "platform.issueTx")]
    async fn issue_tx(&self, args: IssueTxArgs) -> RpcResult<IssueTxReply>;

    /// Returns the status of a transaction.
    #[method(name = "platform.getTxStatus")]
    async fn get_tx_status(&self, args: TxStatusArgs) -> RpcResult<TxStatusReply>;
}

/// [`PlatformChainClient`] over the node's JSON-RPC API.
#[derive(Debug, Clone)]
pub struct JsonRpcPlatformClient<C = HttpClient> {
    client: C,
}

impl JsonRpcPlatformClient<HttpClient> {
    /// Connects to the node at `url`.
    pub fn connect(url: &str) -> Result<Self, PlatformError> {
        let client = HttpClientBuilder::default()
            .build(url)
            .map_err(|e| PlatformError::Transport(e.to_string()))?;

        Ok(Self { client })
    }
}

impl<C> JsonRpcPlatformClient<C> {
    /// Wraps an existing client.
    pub const fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: ClientT + Send + Sync> PlatformChainClient for JsonRpcPlatformClient<C> {
    async fn issue_tx(&self, tx: &PlatformTx) -> Result<PlatformTxId, PlatformError> {
        let reply = PlatformApiClient::issue_tx(
            &self.client,
            IssueTxArgs {
                tx: hex::encode(tx.encode()),
            },
        )
        .await
        .map_err(map_client_error)?;

        Ok(reply.tx_id)
    }

    async fn tx_status(&self, tx_id: PlatformTxId) -> Result<PlatformTxStatus, PlatformError> {
        let reply = self
            .client
            .get_tx_status(TxStatusArgs { tx_id })
            .await
            .map_err(map_client_error)?;

        reply.try_into()
    }
}

impl TryFrom<TxStatusReply> for PlatformTxStatus {
    type Error = PlatformError;

    fn try_from(reply: TxStatusReply) -> Result<Self, Self::Error> {
        match reply.status.as_str() {
            "Processing" => Ok(Self::Processing),
            "Dropped" => Ok(Self::Dropped {
                reason: reply.reason.unwrap_or_default(),
            }),
            "Committed" => {
                let missing = |field| PlatformError::Decode(format!("committed without {field}"));
                let message_index = reply.message_index.ok_or_else(|| missing("messageIndex"))?;
                let acknowledgement = reply
                    .acknowledgement
                    .ok_or_else(|| missing("acknowledgement"))?;
                let bytes = hex::decode(acknowledgement.trim_start_matches("0x"))
                    .map_err(|e| PlatformError::Decode(e.to_string()))?;
                let acknowledgement = SignedMessage::decode(&bytes, reply.quorum.unwrap_or(0))
                    .map_err(|e| PlatformError::Decode(e.to_string()))?;

                Ok(Self::Committed {
                    message_index,
                    acknowledgement,
                })
            }
            other => Err(PlatformError::Decode(format!("unknown status {other}"))),
        }
    }
}

fn map_client_error(err: ClientError) -> PlatformError {
    match err {
        ClientError::Call(call) => {
            let message = call.message().to_string();
            let lower = message.to_lowercase();
            if lower.contains("already") {
                PlatformError::AlreadyApplied(message)
            } else if lower.contains("malformed") || lower.contains("invalid") {
                PlatformError::Malformed(message)
            } else {
                PlatformError::Rejected(message)
            }
        }
        ClientError::ParseError(e) => PlatformError::Decode(e.to_string()),
        other => PlatformError::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use jsonrpsee::types::ErrorObject;

    use super::*;
    use crate::tx::tests::weight_change;

    fn call_error(message: &str) -> ClientError {
        ClientError::Call(ErrorObject::owned(-32000, message.to_string(), None::<()>))
    }

    #[test]
    fn call_errors_are_classified() {
        assert!(matches!(
            map_client_error(call_error("message already applied")),
            PlatformError::AlreadyApplied(_)
        ));
        assert!(matches!(
            map_client_error(call_error("malformed warp message")),
            PlatformError::Malformed(_)
        ));
        assert!(matches!(
            map_client_error(call_error("insufficient balance")),
            PlatformError::Rejected(_)
        ));
    }

    #[test]
    fn committed_reply_decodes_acknowledgement() {
        let ack = weight_change();
        let reply = TxStatusReply {
            status: "Committed".to_string(),
            reason: None,
            message_index: Some(3),
            acknowledgement: Some(format!("0x{}", hex::encode(ack.encode()))),
            quorum: Some(67),
        };

        assert_eq!(
            PlatformTxStatus::try_from(reply),
            Ok(PlatformTxStatus::Committed {
                message_index: 3,
                acknowledgement: ack,
            })
        );
    }

    #[test]
    fn committed_reply_without_index_is_rejected() {
        let reply = TxStatusReply {
            status: "Committed".to_string(),
            reason: None,
            message_index: None,
            acknowledgement: None,
            quorum: None,
        };

        assert!(matches!(
            PlatformTxStatus::try_from(reply),
            Err(PlatformError::Decode(_))
        ));
    }
}
