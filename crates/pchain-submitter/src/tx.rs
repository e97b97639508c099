//! Platform-chain transactions carrying signed warp messages.

use stakeflow_params::platform::PlatformParams;
use stakeflow_primitives::{
    operation::OperationKind,
    warp::{SignedMessage, StakingPayload},
};

use crate::errors::SubmitError;

/// Type ID of a validator registration transaction.
pub const REGISTER_L1_VALIDATOR_TX: u16 = 0x24;

/// Type ID of a weight change transaction.
pub const SET_L1_VALIDATOR_WEIGHT_TX: u16 = 0x25;

/// What the transaction does with its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformAction {
    /// Registers a new validator, funding its continuous fee with `balance`.
    RegisterValidator {
        /// Initial fee balance.
        balance: u64,
    },

    /// Changes the weight of an existing validator, up for delegations and down for removals.
    SetWeight,
}

/// A platform-chain transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformTx {
    /// What the transaction does.
    pub action: PlatformAction,

    /// The message authorizing it.
    pub signed_message: SignedMessage,
}

impl PlatformTx {
    /// Builds the transaction finalizing an operation of `kind`.
    ///
    /// Fails if the signed message does not carry the payload the operation needs.
    pub fn for_operation(
        kind: OperationKind,
        signed_message: SignedMessage,
        params: &PlatformParams,
    ) -> Result<Self, SubmitError> {
        let payload = signed_message
            .unsigned
            .staking_payload()
            .map_err(|e| SubmitError::Malformed(e.to_string()))?;

        let action = match (kind, &payload) {
            (OperationKind::RegisterValidator, StakingPayload::RegisterL1Validator { .. }) => {
                PlatformAction::RegisterValidator {
                    balance: params.registration_balance,
                }
            }
            (
                OperationKind::AddDelegation
                | OperationKind::RemoveValidator
                | OperationKind::RemoveDelegation,
                StakingPayload::L1ValidatorWeight { .. },
            ) => PlatformAction::SetWeight,
            (kind, payload) => {
                return Err(SubmitError::Malformed(format!(
                    "{kind} cannot be finalized by {payload:?}"
                )))
            }
        };

        Ok(Self {
            action,
            signed_message,
        })
    }

    /// Type ID of the transaction.
    pub const fn type_id(&self) -> u16 {
        match self.action {
            PlatformAction::RegisterValidator { .. } => REGISTER_L1_VALIDATOR_TX,
            PlatformAction::SetWeight => SET_L1_VALIDATOR_WEIGHT_TX,
        }
    }

    /// Encodes the transaction: `type u16 | len u32 | signed message [| balance u64]`.
    pub fn encode(&self) -> Vec<u8> {
        let message = self.signed_message.encode();
        let mut out = Vec::with_capacity(2 + 4 + message.len() + 8);
        out.extend_from_slice(&self.type_id().to_be_bytes());
        // signed messages are far below 4 GiB
        out.extend_from_slice(&(message.len() as u32).to_be_bytes());
        out.extend_from_slice(&message);
        if let PlatformAction::RegisterValidator { balance } = self.action {
            out.extend_from_slice(&balance.to_be_bytes());
        }
        out
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use alloy_primitives::FixedBytes;
    use stakeflow_primitives::{
        ids::{BlsPublicKey, ChainId, NodeId, SubnetId, ValidationId},
        warp::SIGNATURE_LEN,
    };

    use super::*;

    pub(crate) fn signed(payload: StakingPayload) -> SignedMessage {
        SignedMessage {
            unsigned: payload.to_message(1, ChainId::from([1u8; 32]), vec![0xaa; 20]),
            signers: vec![0x0f].into(),
            signature: FixedBytes::from([2u8; SIGNATURE_LEN]),
            quorum_used: 67,
        }
    }

    pub(crate) fn registration() -> SignedMessage {
        signed(StakingPayload::RegisterL1Validator {
            subnet_id: SubnetId::default(),
            node_id: NodeId::from([3u8; 20]),
            bls_public_key: BlsPublicKey::from([4u8; 48]),
            expiry: 1_000,
            weight: 100,
        })
    }

    pub(crate) fn weight_change() -> SignedMessage {
        signed(StakingPayload::L1ValidatorWeight {
            validation_id: ValidationId::from([5u8; 32]),
            nonce: 1,
            weight: 0,
        })
    }

    #[test]
    fn registration_carries_balance() {
        let params = PlatformParams::default();
        let tx = PlatformTx::for_operation(OperationKind::RegisterValidator, registration(), &params)
            .expect("fits");

        let encoded = tx.encode();

        assert_eq!(&encoded[..2], &REGISTER_L1_VALIDATOR_TX.to_be_bytes());
        assert_eq!(
            &encoded[encoded.len() - 8..],
            &params.registration_balance.to_be_bytes()
        );
    }

    #[test]
    fn weight_changes_serve_delegations_and_removals() {
        for kind in [
            OperationKind::AddDelegation,
            OperationKind::RemoveValidator,
            OperationKind::RemoveDelegation,
        ] {
            let tx = PlatformTx::for_operation(kind, weight_change(), &PlatformParams::default())
                .expect("fits");
            assert_eq!(tx.action, PlatformAction::SetWeight);
            assert_eq!(tx.encode().len(), 2 + 4 + weight_change().encode().len());
        }
    }

    #[test]
    fn mismatched_payload_is_malformed() {
        let err = PlatformTx::for_operation(
            OperationKind::RegisterValidator,
            weight_change(),
            &PlatformParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SubmitError::Malformed(_)));

        let err = PlatformTx::for_operation(
            OperationKind::RemoveValidator,
            registration(),
            &PlatformParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SubmitError::Malformed(_)));
    }
}
