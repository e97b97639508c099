//! The simulated platform chain.

use pchain_submitter::{
    PlatformAction, PlatformChainClient, PlatformError, PlatformTx, PlatformTxStatus,
};
use stakeflow_primitives::{ids::PlatformTxId, warp::StakingPayload};

use crate::network::{
    sha256, sim_sign, sim_signature, PlatformEntry, SimNetwork, SimPlatformTx, PLATFORM_CHAIN_ID,
};

/// Quorum of platform-chain validators that signs every acknowledgement.
const ACKNOWLEDGEMENT_QUORUM: u8 = 67;

impl PlatformChainClient for SimNetwork {
    async fn issue_tx(&self, tx: &PlatformTx) -> Result<PlatformTxId, PlatformError> {
        let mut state = self.lock();
        let signed = &tx.signed_message;

        if signed.signature != sim_signature(&signed.unsigned) {
            return Err(PlatformError::Malformed("invalid aggregate signature".to_string()));
        }
        if signed.unsigned.source_chain_id != self.config().source_chain_id {
            return Err(PlatformError::Malformed(format!(
                "unknown source chain {}",
                signed.unsigned.source_chain_id
            )));
        }
        let message_id = signed.id();
        if state.applied_messages.contains(&message_id) {
            return Err(PlatformError::AlreadyApplied(message_id.to_string()));
        }
        let payload = signed
            .unsigned
            .staking_payload()
            .map_err(|e| PlatformError::Malformed(e.to_string()))?;

        state.issued_platform_txs += 1;
        let tx_id = PlatformTxId::from(sha256(&[
            &tx.encode(),
            &state.issued_platform_txs.to_be_bytes(),
        ]));

        if let Some(reason) = state.drop_next_platform_tx.take() {
            state
                .platform_txs
                .insert(tx_id, SimPlatformTx::Dropped { reason });
            return Ok(tx_id);
        }

        let acknowledged = match (tx.action, &payload) {
            (
                PlatformAction::RegisterValidator { .. },
                StakingPayload::RegisterL1Validator { weight, .. },
            ) => {
                let validation_id = sha256(&[&payload.encode()]).into();
                state.platform_validators.insert(
                    validation_id,
                    PlatformEntry {
                        weight: *weight,
                        nonce: 0,
                    },
                );
                StakingPayload::L1ValidatorRegistration {
                    validation_id,
                    registered: true,
                }
            }
            (
                PlatformAction::SetWeight,
                StakingPayload::L1ValidatorWeight {
                    validation_id,
                    nonce,
                    weight,
                },
            ) => {
                let entry = state
                    .platform_validators
                    .get_mut(validation_id)
                    .ok_or_else(|| {
                        PlatformError::Rejected(format!("unknown validator {validation_id}"))
                    })?;
                if *nonce <= entry.nonce {
                    return Err(PlatformError::Rejected(format!(
                        "stale nonce {nonce}, expected above {}",
                        entry.nonce
                    )));
                }
                entry.nonce = *nonce;
                entry.weight = *weight;
                if *weight == 0 {
                    state.platform_validators.remove(validation_id);
                    StakingPayload::L1ValidatorRegistration {
                        validation_id: *validation_id,
                        registered: false,
                    }
                } else {
                    payload.clone()
                }
            }
            (action, payload) => {
                return Err(PlatformError::Malformed(format!(
                    "{action:?} cannot carry {payload:?}"
                )))
            }
        };

        let config = self.config();
        let acknowledgement = sim_sign(
            acknowledged.to_message(config.network_id, PLATFORM_CHAIN_ID, Vec::new()),
            ACKNOWLEDGEMENT_QUORUM,
        );
        let message_index = state.acknowledgements.len() as u32;
        state.acknowledgements.push(acknowledgement.clone());
        state.applied_messages.insert(message_id);

        let polls_left = state.platform_delay_polls;
        state.platform_txs.insert(
            tx_id,
            SimPlatformTx::Committed {
                polls_left,
                message_index,
                acknowledgement,
            },
        );

        Ok(tx_id)
    }

    async fn tx_status(&self, tx_id: PlatformTxId) -> Result<PlatformTxStatus, PlatformError> {
        let mut state = self.lock();
        match state.platform_txs.get_mut(&tx_id) {
            None => Err(PlatformError::Rejected(format!("unknown transaction {tx_id}"))),
            Some(SimPlatformTx::Dropped { reason }) => Ok(PlatformTxStatus::Dropped {
                reason: reason.clone(),
            }),
            Some(SimPlatformTx::Committed { polls_left, .. }) if *polls_left > 0 => {
                *polls_left -= 1;
                Ok(PlatformTxStatus::Processing)
            }
            Some(SimPlatformTx::Committed {
                message_index,
                acknowledgement,
                ..
            }) => Ok(PlatformTxStatus::Committed {
                message_index: *message_index,
                acknowledgement: acknowledgement.clone(),
            }),
        }
    }
}
