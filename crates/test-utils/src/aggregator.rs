//! The simulated signature aggregator and uptime endpoint.

use stakeflow_primitives::{ids::ValidationId, warp::SignedMessage};
use warp_signer::{
    AggregationRequest, AggregatorError, SignatureAggregator, UptimeError, UptimeSource,
};

use crate::network::{sim_sign, SimNetwork};

impl SignatureAggregator for SimNetwork {
    async fn aggregate(
        &self,
        request: &AggregationRequest,
    ) -> Result<SignedMessage, AggregatorError> {
        let mut state = self.lock();
        let quorum = request.quorum_percentage;
        state.quorum_requests.push(quorum);

        if state.aggregator_down {
            return Err(AggregatorError::Transport("aggregator unreachable".to_string()));
        }
        if quorum > state.available_stake_pct {
            return Err(AggregatorError::InsufficientQuorum {
                quorum,
                reason: format!("only {}% of stake signed", state.available_stake_pct),
            });
        }

        Ok(sim_sign(request.message.clone(), quorum))
    }
}

impl UptimeSource for SimNetwork {
    async fn uptime(&self, validation_id: ValidationId) -> Result<u64, UptimeError> {
        self.lock()
            .uptimes
            .get(&validation_id)
            .copied()
            .ok_or(UptimeError::UnknownValidator(validation_id))
    }
}

#[cfg(test)]
mod tests {
    use stakeflow_primitives::ids::SubnetId;

    use super::*;
    use crate::fixtures::registration_message;

    #[tokio::test]
    async fn aggregation_fails_above_available_stake() {
        let net = SimNetwork::default();
        net.set_available_stake(50);
        let mut request = AggregationRequest {
            message: registration_message(&net, 1, 100),
            justification: None,
            signing_subnet_id: SubnetId::from([1u8; 32]),
            quorum_percentage: 67,
        };

        assert!(matches!(
            net.aggregate(&request).await,
            Err(AggregatorError::InsufficientQuorum { quorum: 67, .. })
        ));

        request.quorum_percentage = 50;
        let signed = net.aggregate(&request).await.unwrap();
        assert_eq!(signed.quorum_used, 50);
        assert_eq!(net.quorum_requests(), vec![67, 50]);
    }

    #[tokio::test]
    async fn uptime_is_reported_for_known_validators() {
        let net = SimNetwork::default();
        let validation_id = ValidationId::from([4u8; 32]);
        assert!(net.uptime(validation_id).await.is_err());

        net.set_uptime(validation_id, 86_400);
        assert_eq!(net.uptime(validation_id).await.unwrap(), 86_400);
    }
}
