//! Decoding of execution-chain receipts into [`StakingEvent`]s.

use alloy::{
    network::ReceiptResponse,
    primitives::Address,
    rpc::types::{Log, TransactionReceipt},
    sol_types::SolEvent,
};
use stakeflow_primitives::{
    events::{Receipt, StakingEvent},
    warp::UnsignedMessage,
};

use crate::{
    errors::{GatewayError, GatewayResult},
    interface::{IStakingManager as SM, IWarpMessenger, WARP_PRECOMPILE},
};

/// Converts an RPC receipt into a [`Receipt`], keeping only the events emitted by
/// `staking_manager` and the warp precompile.
pub fn decode_receipt(
    receipt: &TransactionReceipt,
    staking_manager: Address,
) -> GatewayResult<Receipt> {
    let events = receipt
        .inner
        .logs()
        .iter()
        .filter_map(|log| decode_log(log, staking_manager).transpose())
        .collect::<GatewayResult<Vec<_>>>()?;

    Ok(Receipt {
        tx_hash: receipt.transaction_hash(),
        block_number: receipt.block_number().unwrap_or_default(),
        success: receipt.status(),
        events,
    })
}

/// Decodes a single log. Logs from other contracts, or with unknown topics, yield `None`.
pub fn decode_log(log: &Log, staking_manager: Address) -> GatewayResult<Option<StakingEvent>> {
    let Some(topic0) = log.topics().first().copied() else {
        return Ok(None);
    };
    let emitter = log.inner.address;

    if emitter == WARP_PRECOMPILE && topic0 == IWarpMessenger::SendWarpMessage::SIGNATURE_HASH {
        let sent = decode::<IWarpMessenger::SendWarpMessage>(log)?;
        let message = UnsignedMessage::decode(&sent.message)
            .map_err(|e| GatewayError::Decode(format!("warp message: {e}")))?;

        return Ok(Some(StakingEvent::WarpMessageSent {
            sender: sent.sourceAddress,
            message,
        }));
    }

    if emitter != staking_manager {
        return Ok(None);
    }

    let event = match topic0 {
        t if t == SM::ValidatorRegistrationInitiated::SIGNATURE_HASH => {
            let e = decode::<SM::ValidatorRegistrationInitiated>(log)?;
            StakingEvent::ValidatorRegistrationInitiated {
                validation_id: e.validationID.into(),
                node_id: e.nodeID.into(),
                weight: e.weight,
            }
        }
        t if t == SM::ValidatorRegistrationCompleted::SIGNATURE_HASH => {
            let e = decode::<SM::ValidatorRegistrationCompleted>(log)?;
            StakingEvent::ValidatorRegistrationCompleted {
                validation_id: e.validationID.into(),
            }
        }
        t if t == SM::ValidatorRemovalInitiated::SIGNATURE_HASH => {
            let e = decode::<SM::ValidatorRemovalInitiated>(log)?;
            StakingEvent::ValidatorRemovalInitiated {
                validation_id: e.validationID.into(),
            }
        }
        t if t == SM::ValidatorRemovalCompleted::SIGNATURE_HASH => {
            let e = decode::<SM::ValidatorRemovalCompleted>(log)?;
            StakingEvent::ValidatorRemovalCompleted {
                validation_id: e.validationID.into(),
                stake_returned: e.stakeReturned,
                rewards: e.rewards,
            }
        }
        t if t == SM::UptimeUpdated::SIGNATURE_HASH => {
            let e = decode::<SM::UptimeUpdated>(log)?;
            StakingEvent::UptimeUpdated {
                validation_id: e.validationID.into(),
                uptime_secs: e.uptime,
            }
        }
        t if t == SM::DelegatorRegistrationInitiated::SIGNATURE_HASH => {
            let e = decode::<SM::DelegatorRegistrationInitiated>(log)?;
            StakingEvent::DelegatorRegistrationInitiated {
                delegation_id: e.delegationID.into(),
                validation_id: e.validationID.into(),
                weight: e.delegatorWeight,
            }
        }
        t if t == SM::DelegatorRegistrationCompleted::SIGNATURE_HASH => {
            let e = decode::<SM::DelegatorRegistrationCompleted>(log)?;
            StakingEvent::DelegatorRegistrationCompleted {
                delegation_id: e.delegationID.into(),
            }
        }
        t if t == SM::DelegatorRemovalInitiated::SIGNATURE_HASH => {
            let e = decode::<SM::DelegatorRemovalInitiated>(log)?;
            StakingEvent::DelegatorRemovalInitiated {
                delegation_id: e.delegationID.into(),
            }
        }
        t if t == SM::DelegatorRemovalCompleted::SIGNATURE_HASH => {
            let e = decode::<SM::DelegatorRemovalCompleted>(log)?;
            StakingEvent::DelegatorRemovalCompleted {
                delegation_id: e.delegationID.into(),
                stake_returned: e.stakeReturned,
                rewards: e.rewards,
                fees: e.fees,
            }
        }
        t if t == SM::DelegationFeesClaimed::SIGNATURE_HASH => {
            let e = decode::<SM::DelegationFeesClaimed>(log)?;
            StakingEvent::DelegationFeesClaimed {
                validation_id: e.validationID.into(),
                amount: e.amount,
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(event))
}

fn decode<E: SolEvent>(log: &Log) -> GatewayResult<E> {
    log.log_decode::<E>()
        .map(|decoded| decoded.inner.data)
        .map_err(|e| GatewayError::Decode(format!("{}: {e}", E::SIGNATURE)))
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Log as PrimitiveLog, B256, U256};
    use stakeflow_primitives::{
        ids::{ChainId, ValidationId},
        warp::StakingPayload,
    };

    use super::*;

    const MANAGER: Address = Address::repeat_byte(0x11);

    fn rpc_log(address: Address, event: &impl SolEvent) -> Log {
        Log {
            inner: PrimitiveLog {
                address,
                data: event.encode_log_data(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn staking_events_are_decoded() {
        let event = SM::ValidatorRemovalCompleted {
            validationID: B256::repeat_byte(7),
            stakeReturned: U256::from(100),
            rewards: U256::from(86_400),
        };

        let decoded = decode_log(&rpc_log(MANAGER, &event), MANAGER).expect("must decode");

        assert_eq!(
            decoded,
            Some(StakingEvent::ValidatorRemovalCompleted {
                validation_id: ValidationId::from([7u8; 32]),
                stake_returned: U256::from(100),
                rewards: U256::from(86_400),
            })
        );
    }

    #[test]
    fn warp_messages_are_decoded_from_the_precompile() {
        let message = StakingPayload::L1ValidatorWeight {
            validation_id: ValidationId::from([1u8; 32]),
            nonce: 1,
            weight: 0,
        }
        .to_message(1, ChainId::from([2u8; 32]), MANAGER.to_vec());
        let event = IWarpMessenger::SendWarpMessage {
            sourceAddress: MANAGER,
            unsignedMessageID: message.id(),
            message: message.encode().into(),
        };

        let decoded =
            decode_log(&rpc_log(WARP_PRECOMPILE, &event), MANAGER).expect("must decode");

        assert_eq!(
            decoded,
            Some(StakingEvent::WarpMessageSent {
                sender: MANAGER,
                message,
            })
        );
    }

    #[test]
    fn foreign_logs_are_skipped() {
        let event = SM::UptimeUpdated {
            validationID: B256::ZERO,
            uptime: 1,
        };

        let decoded =
            decode_log(&rpc_log(Address::repeat_byte(0x22), &event), MANAGER).expect("no error");

        assert_eq!(decoded, None);
    }

    #[test]
    fn garbled_warp_payload_is_a_decode_error() {
        let event = IWarpMessenger::SendWarpMessage {
            sourceAddress: MANAGER,
            unsignedMessageID: B256::ZERO,
            message: vec![0, 1, 2].into(),
        };

        let err = decode_log(&rpc_log(WARP_PRECOMPILE, &event), MANAGER).unwrap_err();

        assert!(matches!(err, GatewayError::Decode(_)), "{err:?}");
    }
}
