//! Signing with quorum descent.

use alloy_primitives::Bytes;
use stakeflow_params::quorum::QuorumPolicy;
use stakeflow_primitives::{
    ids::SubnetId,
    warp::{SignedMessage, UnsignedMessage},
};
use tracing::{error, info, warn};

use crate::{
    aggregator::{AggregationRequest, SignatureAggregator},
    errors::{AggregatorError, SignError},
};

/// Signs warp messages, descending through a [`QuorumPolicy`].
#[derive(Debug, Clone)]
pub struct WarpSigner<A> {
    aggregator: A,
    policy: QuorumPolicy,
}

impl<A: SignatureAggregator> WarpSigner<A> {
    /// Creates a signer that asks `aggregator` for signatures at the quorums of `policy`.
    pub const fn new(aggregator: A, policy: QuorumPolicy) -> Self {
        Self { aggregator, policy }
    }

    /// The quorum policy.
    pub const fn policy(&self) -> &QuorumPolicy {
        &self.policy
    }

    /// Signs `message` with the validators of `signing_subnet_id`.
    ///
    /// The returned [`SignedMessage::quorum_used`] is the first quorum of the policy at which
    /// aggregation succeeded.
    pub async fn sign(
        &self,
        message: &UnsignedMessage,
        signing_subnet_id: SubnetId,
    ) -> Result<SignedMessage, SignError> {
        self.sign_with_justification(message, None, signing_subnet_id)
            .await
    }

    /// Like [`Self::sign`], passing `justification` to the validators.
    pub async fn sign_with_justification(
        &self,
        message: &UnsignedMessage,
        justification: Option<Bytes>,
        signing_subnet_id: SubnetId,
    ) -> Result<SignedMessage, SignError> {
        let message_id = message.id();
        let mut request = AggregationRequest {
            message: message.clone(),
            justification,
            signing_subnet_id,
            quorum_percentage: self.policy.highest(),
        };
        let mut attempted = Vec::with_capacity(self.policy.as_slice().len());

        for &quorum in self.policy.as_slice() {
            request.quorum_percentage = quorum;
            attempted.push(quorum);

            match self.aggregator.aggregate(&request).await {
                Ok(signed) => {
                    if signed.unsigned != *message {
                        error!(
                            %message_id,
                            quorum,
                            "aggregator returned a signature over another message"
                        );
                        return Err(SignError::Malformed);
                    }
                    info!(%message_id, quorum, "aggregated signatures");

                    return Ok(SignedMessage {
                        quorum_used: quorum,
                        ..signed
                    });
                }
                Err(AggregatorError::InsufficientQuorum { reason, .. }) => {
                    warn!(%message_id, quorum, %reason, "quorum not reached, descending");
                }
                Err(source) => {
                    error!(%message_id, quorum, %source, "aggregation failed");
                    return Err(SignError::Aggregator {
                        quorum,
                        attempted,
                        source,
                    });
                }
            }
        }

        error!(%message_id, ?attempted, "quorum policy exhausted");
        Err(SignError::QuorumExhausted { attempted })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use alloy_primitives::FixedBytes;
    use stakeflow_primitives::{ids::ChainId, warp::SIGNATURE_LEN};

    use super::*;

    /// Signs when the requested quorum is at most `available`; records every quorum asked for.
    #[derive(Debug)]
    pub(crate) struct StakeAggregator {
        pub(crate) available: u8,
        pub(crate) failure: Option<AggregatorError>,
        pub(crate) tamper: bool,
        pub(crate) requests: Mutex<Vec<u8>>,
    }

    impl StakeAggregator {
        pub(crate) fn with_available(available: u8) -> Self {
            Self {
                available,
                failure: None,
                tamper: false,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn requested(&self) -> Vec<u8> {
            self.requests.lock().expect("not poisoned").clone()
        }
    }

    impl SignatureAggregator for StakeAggregator {
        async fn aggregate(
            &self,
            request: &AggregationRequest,
        ) -> Result<SignedMessage, AggregatorError> {
            self.requests
                .lock()
                .expect("not poisoned")
                .push(request.quorum_percentage);

            if let Some(failure) = &self.failure {
                return Err(failure.clone());
            }
            if request.quorum_percentage > self.available {
                return Err(AggregatorError::InsufficientQuorum {
                    quorum: request.quorum_percentage,
                    reason: format!("only {}% signed", self.available),
                });
            }

            let mut unsigned = request.message.clone();
            if self.tamper {
                unsigned.network_id += 1;
            }
            Ok(SignedMessage {
                unsigned,
                signers: vec![0xff].into(),
                signature: FixedBytes::from([7u8; SIGNATURE_LEN]),
                quorum_used: 0,
            })
        }
    }

    pub(crate) fn message() -> UnsignedMessage {
        UnsignedMessage::new(1, ChainId::from([1u8; 32]), vec![1, 2, 3])
    }

    #[tokio::test]
    async fn first_quorum_wins_when_reached() {
        let signer = WarpSigner::new(StakeAggregator::with_available(80), QuorumPolicy::default());

        let signed = signer.sign(&message(), SubnetId::default()).await.expect("must sign");

        assert_eq!(signed.quorum_used, 67);
        assert_eq!(signer.aggregator.requested(), vec![67]);
    }

    #[tokio::test]
    async fn descends_on_insufficient_quorum() {
        let signer = WarpSigner::new(StakeAggregator::with_available(55), QuorumPolicy::default());

        let signed = signer.sign(&message(), SubnetId::default()).await.expect("must sign");

        assert_eq!(signed.quorum_used, 50);
        assert_eq!(signed.unsigned, message());
        assert_eq!(signer.aggregator.requested(), vec![67, 50]);
    }

    #[tokio::test]
    async fn exhaustion_reports_every_attempt() {
        let signer = WarpSigner::new(StakeAggregator::with_available(10), QuorumPolicy::default());

        let err = signer.sign(&message(), SubnetId::default()).await.unwrap_err();

        assert_eq!(
            err,
            SignError::QuorumExhausted {
                attempted: vec![67, 50, 33]
            }
        );
    }

    #[tokio::test]
    async fn other_failures_stop_the_descent() {
        let mut aggregator = StakeAggregator::with_available(100);
        aggregator.failure = Some(AggregatorError::Rejected("malformed message".to_string()));
        let signer = WarpSigner::new(aggregator, QuorumPolicy::default());

        let err = signer.sign(&message(), SubnetId::default()).await.unwrap_err();

        assert_eq!(err.attempted_quorums(), &[67]);
        assert!(matches!(err, SignError::Aggregator { quorum: 67, .. }));
        assert_eq!(signer.aggregator.requested(), vec![67]);
    }

    #[tokio::test]
    async fn signature_over_another_message_is_rejected() {
        let mut aggregator = StakeAggregator::with_available(100);
        aggregator.tamper = true;
        let signer = WarpSigner::new(aggregator, QuorumPolicy::default());

        let err = signer.sign(&message(), SubnetId::default()).await.unwrap_err();

        assert_eq!(err, SignError::Malformed);
    }

    #[tokio::test]
    async fn custom_policy_is_followed() {
        let policy = QuorumPolicy::new(vec![90, 75, 60]).expect("valid policy");
        let signer = WarpSigner::new(StakeAggregator::with_available(70), policy);

        let signed = signer.sign(&message(), SubnetId::default()).await.expect("must sign");

        assert_eq!(signed.quorum_used, 60);
        assert_eq!(signer.aggregator.requested(), vec![90, 75, 60]);
    }
}
