//! [`SignatureAggregator`] over the aggregator's HTTP API.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use stakeflow_primitives::warp::SignedMessage;
use tracing::debug;

use crate::{
    aggregator::{AggregationRequest, SignatureAggregator},
    errors::AggregatorError,
};

/// Path of the aggregation endpoint.
pub const AGGREGATE_PATH: &str = "/aggregate-signatures";

/// Fragments of a server-side error body that mean the requested share of stake did not sign.
const INSUFFICIENT_QUORUM_MARKERS: [&str; 3] = [
    "threshold of signatures",
    "threshold of stake",
    "insufficient weight",
];

/// Body of `POST /aggregate-signatures`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
struct AggregateRequestBody {
    /// Hex-encoded unsigned message.
    message: String,

    /// Hex-encoded justification.
    #[serde(skip_serializing_if = "Option::is_none")]
    justification: Option<String>,

    /// Hex-encoded subnet ID.
    signing_subnet_id: String,

    quorum_percentage: u8,
}

impl From<&AggregationRequest> for AggregateRequestBody {
    fn from(request: &AggregationRequest) -> Self {
        Self {
            message: hex::encode(request.message.encode()),
            justification: request.justification.as_ref().map(hex::encode),
            signing_subnet_id: hex::encode(request.signing_subnet_id.as_bytes()),
            quorum_percentage: request.quorum_percentage,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AggregateResponseBody {
    /// Hex-encoded signed message.
    signed_message: String,
}

/// Talks to a signature-aggregator service at `base_url`.
#[derive(Debug, Clone)]
pub struct HttpAggregator {
    client: Client,
    base_url: String,
}

impl HttpAggregator {
    /// Creates an aggregator client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Creates an aggregator client reusing `client`.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn endpoint(&self) -> String {
        format!("{}{AGGREGATE_PATH}", self.base_url)
    }
}

impl SignatureAggregator for HttpAggregator {
    async fn aggregate(
        &self,
        request: &AggregationRequest,
    ) -> Result<SignedMessage, AggregatorError> {
        let quorum = request.quorum_percentage;
        debug!(message_id = %request.message.id(), quorum, "requesting signature aggregation");

        let response = self
            .client
            .post(self.endpoint())
            .json(&AggregateRequestBody::from(request))
            .send()
            .await
            .map_err(|e| AggregatorError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, quorum, body));
        }

        let body: AggregateResponseBody = response
            .json()
            .await
            .map_err(|e| AggregatorError::Decode(e.to_string()))?;
        let bytes = hex::decode(body.signed_message.trim_start_matches("0x"))
            .map_err(|e| AggregatorError::Decode(e.to_string()))?;

        Ok(SignedMessage::decode(&bytes, quorum)?)
    }
}

/// Maps a failed response onto an error.
///
/// A 4xx is a request the aggregator refused to process, whatever its body says; only a server
/// error can report a quorum shortfall, which is what makes the caller retry at a lower quorum.
fn classify_failure(status: StatusCode, quorum: u8, body: String) -> AggregatorError {
    if status.is_client_error() {
        return AggregatorError::Rejected(format!("{status}: {body}"));
    }

    let lower = body.to_lowercase();
    if INSUFFICIENT_QUORUM_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
    {
        return AggregatorError::InsufficientQuorum {
            quorum,
            reason: body,
        };
    }

    AggregatorError::Transport(format!("{status}: {body}"))
}

#[cfg(test)]
mod tests {
    use stakeflow_primitives::{
        ids::{ChainId, SubnetId},
        warp::UnsignedMessage,
    };

    use super::*;

    #[test]
    fn request_body_uses_aggregator_field_names() {
        let request = AggregationRequest {
            message: UnsignedMessage::new(1, ChainId::default(), vec![0xab]),
            justification: None,
            signing_subnet_id: SubnetId::from([0x01; 32]),
            quorum_percentage: 67,
        };

        let json = serde_json::to_value(AggregateRequestBody::from(&request)).expect("serialize");

        assert_eq!(json["quorum-percentage"], 67);
        assert_eq!(json["signing-subnet-id"], "01".repeat(32));
        assert_eq!(json["message"], hex::encode(request.message.encode()));
        assert!(json.get("justification").is_none());
    }

    #[test]
    fn quorum_failures_are_recognized() {
        let err = classify_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            67,
            "failed to collect a threshold of signatures".to_string(),
        );
        assert!(matches!(err, AggregatorError::InsufficientQuorum { quorum: 67, .. }));

        let err = classify_failure(StatusCode::BAD_REQUEST, 67, "bad message".to_string());
        assert!(matches!(err, AggregatorError::Rejected(_)));

        let err = classify_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            50,
            "failed to connect to a threshold of stake: insufficient weight".to_string(),
        );
        assert!(matches!(err, AggregatorError::InsufficientQuorum { quorum: 50, .. }));

        let err = classify_failure(StatusCode::BAD_GATEWAY, 67, String::new());
        assert!(matches!(err, AggregatorError::Transport(_)));
    }

    #[test]
    fn malformed_requests_do_not_lower_the_quorum() {
        let err = classify_failure(
            StatusCode::BAD_REQUEST,
            67,
            "invalid quorum-percentage: must be between 1 and 100".to_string(),
        );
        assert!(matches!(err, AggregatorError::Rejected(_)), "{err:?}");

        // a 4xx that happens to mention a threshold is still a refusal
        let err = classify_failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            67,
            "threshold of signatures must be a percentage".to_string(),
        );
        assert!(matches!(err, AggregatorError::Rejected(_)), "{err:?}");

        let err = classify_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            67,
            "quorum-percentage field could not be decoded".to_string(),
        );
        assert!(matches!(err, AggregatorError::Transport(_)), "{err:?}");
    }

    #[test]
    fn endpoint_ignores_trailing_slash() {
        let aggregator = HttpAggregator::new("http://localhost:8080/");
        assert_eq!(
            aggregator.endpoint(),
            "http://localhost:8080/aggregate-signatures"
        );
    }
}
