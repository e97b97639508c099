//! Codec for the cross-chain (warp) messages exchanged between the execution chain and the
//! platform chain.
//!
//! All integers are big-endian. Every variable-length field is prefixed with its length as a
//! `u32`.

use alloy_primitives::{Bytes, FixedBytes, B256};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::ids::{BlsPublicKey, ChainId, NodeId, SubnetId, ValidationId};

/// Codec version prefixed to every encoded structure.
pub const CODEC_VERSION: u16 = 0;

/// Type ID of an [`AddressedCall`] payload.
pub const ADDRESSED_CALL_TYPE_ID: u32 = 1;

/// Type ID of the bitset signature appended to a [`SignedMessage`].
pub const BITSET_SIGNATURE_TYPE_ID: u32 = 0;

/// Length of an aggregate BLS signature.
pub const SIGNATURE_LEN: usize = 96;

/// Errors raised while decoding warp messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WarpCodecError {
    /// The input ended before the structure was complete.
    #[error("unexpected end of input: needed {needed} bytes at offset {offset}")]
    Truncated {
        /// Offset at which the read was attempted.
        offset: usize,

        /// Number of bytes the read required.
        needed: usize,
    },

    /// The codec version is not supported.
    #[error("unsupported codec version {0}")]
    UnsupportedCodec(u16),

    /// The type ID does not name a known structure.
    #[error("unknown type id {0}")]
    UnknownType(u32),

    /// Bytes were left over after the structure was decoded.
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),

    /// A field had an invalid value.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,

        /// Why the value was rejected.
        reason: String,
    },
}

/// A cross-chain message before any validator has signed it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedMessage {
    /// Network the message is valid on.
    pub network_id: u32,

    /// Chain that emitted the message.
    pub source_chain_id: ChainId,

    /// Encoded payload, usually an [`AddressedCall`].
    pub payload: Bytes,
}

impl UnsignedMessage {
    /// Creates a new message.
    pub fn new(network_id: u32, source_chain_id: ChainId, payload: impl Into<Bytes>) -> Self {
        Self {
            network_id,
            source_chain_id,
            payload: payload.into(),
        }
    }

    /// Encodes the message into its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + 4 + 32 + 4 + self.payload.len());
        out.extend_from_slice(&CODEC_VERSION.to_be_bytes());
        out.extend_from_slice(&self.network_id.to_be_bytes());
        out.extend_from_slice(self.source_chain_id.as_bytes());
        put_bytes(&mut out, &self.payload);
        out
    }

    /// Decodes a message, rejecting trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, WarpCodecError> {
        let mut reader = Reader::new(bytes);
        let msg = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(msg)
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, WarpCodecError> {
        reader.codec()?;
        let network_id = reader.u32()?;
        let source_chain_id = ChainId::from(reader.array::<32>()?);
        let payload = reader.bytes()?.to_vec();

        Ok(Self::new(network_id, source_chain_id, payload))
    }

    /// The message ID: SHA-256 of the encoded message.
    pub fn id(&self) -> B256 {
        B256::from_slice(&Sha256::digest(self.encode()))
    }

    /// Decodes the payload as an [`AddressedCall`] carrying a [`StakingPayload`].
    pub fn staking_payload(&self) -> Result<StakingPayload, WarpCodecError> {
        let call = AddressedCall::decode(&self.payload)?;
        StakingPayload::decode(&call.payload)
    }
}

/// A payload attributed to an address on the source chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressedCall {
    /// Sender on the source chain. Empty for messages the chain itself vouches for.
    pub source_address: Bytes,

    /// Inner message.
    pub payload: Bytes,
}

impl AddressedCall {
    /// Encodes the call into its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + 4 + 8 + self.source_address.len() + self.payload.len());
        out.extend_from_slice(&CODEC_VERSION.to_be_bytes());
        out.extend_from_slice(&ADDRESSED_CALL_TYPE_ID.to_be_bytes());
        put_bytes(&mut out, &self.source_address);
        put_bytes(&mut out, &self.payload);
        out
    }

    /// Decodes a call, rejecting trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, WarpCodecError> {
        let mut reader = Reader::new(bytes);
        reader.codec()?;
        let type_id = reader.u32()?;
        if type_id != ADDRESSED_CALL_TYPE_ID {
            return Err(WarpCodecError::UnknownType(type_id));
        }
        let source_address = Bytes::copy_from_slice(reader.bytes()?);
        let payload = Bytes::copy_from_slice(reader.bytes()?);
        reader.finish()?;

        Ok(Self {
            source_address,
            payload,
        })
    }
}

/// The staking-related messages carried inside an [`AddressedCall`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakingPayload {
    /// Attests how long a validator has been online.
    ValidationUptime {
        /// Validator the attestation is about.
        validation_id: ValidationId,

        /// Seconds the validator has been observed online.
        uptime_secs: u64,
    },

    /// Asks the platform chain to register a new validator.
    RegisterL1Validator {
        /// Subnet the validator joins.
        subnet_id: SubnetId,

        /// Node of the validator.
        node_id: NodeId,

        /// BLS key of the validator.
        bls_public_key: BlsPublicKey,

        /// Unix timestamp after which the registration can no longer be applied.
        expiry: u64,

        /// Initial weight.
        weight: u64,
    },

    /// Platform-chain acknowledgement of a registration, or of its invalidation.
    L1ValidatorRegistration {
        /// Validator the acknowledgement is about.
        validation_id: ValidationId,

        /// `true` if the validator is registered, `false` if the registration is void.
        registered: bool,
    },

    /// Sets the weight of a validator. Emitted by the execution chain for delegation changes and
    /// removals, echoed by the platform chain as the acknowledgement.
    L1ValidatorWeight {
        /// Validator whose weight changes.
        validation_id: ValidationId,

        /// Strictly increasing per validator; stale nonces are rejected.
        nonce: u64,

        /// New weight. Zero removes the validator.
        weight: u64,
    },
}

impl StakingPayload {
    const VALIDATION_UPTIME: u32 = 0;
    const REGISTER_L1_VALIDATOR: u32 = 1;
    const L1_VALIDATOR_REGISTRATION: u32 = 2;
    const L1_VALIDATOR_WEIGHT: u32 = 3;

    /// Encodes the payload into its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&CODEC_VERSION.to_be_bytes());
        match self {
            Self::ValidationUptime {
                validation_id,
                uptime_secs,
            } => {
                out.extend_from_slice(&Self::VALIDATION_UPTIME.to_be_bytes());
                out.extend_from_slice(validation_id.as_bytes());
                out.extend_from_slice(&uptime_secs.to_be_bytes());
            }
            Self::RegisterL1Validator {
                subnet_id,
                node_id,
                bls_public_key,
                expiry,
                weight,
            } => {
                out.extend_from_slice(&Self::REGISTER_L1_VALIDATOR.to_be_bytes());
                out.extend_from_slice(subnet_id.as_bytes());
                put_bytes(&mut out, node_id.as_bytes());
                out.extend_from_slice(bls_public_key.as_bytes());
                out.extend_from_slice(&expiry.to_be_bytes());
                out.extend_from_slice(&weight.to_be_bytes());
            }
            Self::L1ValidatorRegistration {
                validation_id,
                registered,
            } => {
                out.extend_from_slice(&Self::L1_VALIDATOR_REGISTRATION.to_be_bytes());
                out.extend_from_slice(validation_id.as_bytes());
                out.push(u8::from(*registered));
            }
            Self::L1ValidatorWeight {
                validation_id,
                nonce,
                weight,
            } => {
                out.extend_from_slice(&Self::L1_VALIDATOR_WEIGHT.to_be_bytes());
                out.extend_from_slice(validation_id.as_bytes());
                out.extend_from_slice(&nonce.to_be_bytes());
                out.extend_from_slice(&weight.to_be_bytes());
            }
        }
        out
    }

    /// Decodes a payload, rejecting trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, WarpCodecError> {
        let mut reader = Reader::new(bytes);
        reader.codec()?;
        let payload = match reader.u32()? {
            Self::VALIDATION_UPTIME => Self::ValidationUptime {
                validation_id: ValidationId::from(reader.array::<32>()?),
                uptime_secs: reader.u64()?,
            },
            Self::REGISTER_L1_VALIDATOR => {
                let subnet_id = SubnetId::from(reader.array::<32>()?);
                let node_id = reader.bytes()?;
                let node_id: [u8; 20] =
                    node_id
                        .try_into()
                        .map_err(|_| WarpCodecError::InvalidField {
                            field: "node_id",
                            reason: format!("expected 20 bytes, got {}", node_id.len()),
                        })?;
                Self::RegisterL1Validator {
                    subnet_id,
                    node_id: NodeId::from(node_id),
                    bls_public_key: BlsPublicKey::from(reader.array::<48>()?),
                    expiry: reader.u64()?,
                    weight: reader.u64()?,
                }
            }
            Self::L1_VALIDATOR_REGISTRATION => Self::L1ValidatorRegistration {
                validation_id: ValidationId::from(reader.array::<32>()?),
                registered: match reader.array::<1>()? {
                    [0] => false,
                    [1] => true,
                    [other] => {
                        return Err(WarpCodecError::InvalidField {
                            field: "registered",
                            reason: format!("not a boolean: {other}"),
                        })
                    }
                },
            },
            Self::L1_VALIDATOR_WEIGHT => Self::L1ValidatorWeight {
                validation_id: ValidationId::from(reader.array::<32>()?),
                nonce: reader.u64()?,
                weight: reader.u64()?,
            },
            other => return Err(WarpCodecError::UnknownType(other)),
        };
        reader.finish()?;

        Ok(payload)
    }

    /// The validation this payload is about, if it names one.
    pub fn validation_id(&self) -> Option<ValidationId> {
        match self {
            Self::ValidationUptime { validation_id, .. }
            | Self::L1ValidatorRegistration { validation_id, .. }
            | Self::L1ValidatorWeight { validation_id, .. } => Some(*validation_id),
            Self::RegisterL1Validator { .. } => None,
        }
    }

    /// Wraps the payload in an [`AddressedCall`] from `source_address` and then in an
    /// [`UnsignedMessage`].
    pub fn to_message(
        &self,
        network_id: u32,
        source_chain_id: ChainId,
        source_address: impl Into<Bytes>,
    ) -> UnsignedMessage {
        let call = AddressedCall {
            source_address: source_address.into(),
            payload: self.encode().into(),
        };
        UnsignedMessage::new(network_id, source_chain_id, call.encode())
    }
}

/// An [`UnsignedMessage`] together with the aggregate signature of a quorum of validators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    /// The message that was signed.
    pub unsigned: UnsignedMessage,

    /// Bitset of the validators that contributed to the signature.
    pub signers: Bytes,

    /// Aggregate BLS signature.
    pub signature: FixedBytes<SIGNATURE_LEN>,

    /// Quorum percentage at which aggregation succeeded. Not part of the wire format.
    pub quorum_used: u8,
}

impl SignedMessage {
    /// Encodes the message into its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.unsigned.encode();
        out.extend_from_slice(&BITSET_SIGNATURE_TYPE_ID.to_be_bytes());
        put_bytes(&mut out, &self.signers);
        out.extend_from_slice(self.signature.as_slice());
        out
    }

    /// Decodes a signed message. The quorum is not carried on the wire, so the caller supplies it.
    pub fn decode(bytes: &[u8], quorum_used: u8) -> Result<Self, WarpCodecError> {
        let mut reader = Reader::new(bytes);
        let unsigned = UnsignedMessage::read(&mut reader)?;
        let type_id = reader.u32()?;
        if type_id != BITSET_SIGNATURE_TYPE_ID {
            return Err(WarpCodecError::UnknownType(type_id));
        }
        let signers = Bytes::copy_from_slice(reader.bytes()?);
        let signature = FixedBytes::from(reader.array::<SIGNATURE_LEN>()?);
        reader.finish()?;

        Ok(Self {
            unsigned,
            signers,
            signature,
            quorum_used,
        })
    }

    /// The ID of the signed message.
    pub fn id(&self) -> B256 {
        self.unsigned.id()
    }
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    // payloads are far below 4 GiB; saturate rather than wrap if that ever changes
    let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
}

/// A cursor over an input buffer.
#[derive(Debug)]
struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], WarpCodecError> {
        let end = self
            .offset
            .checked_add(needed)
            .filter(|end| *end <= self.buf.len())
            .ok_or(WarpCodecError::Truncated {
                offset: self.offset,
                needed,
            })?;
        let slice = &self.buf[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], WarpCodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, WarpCodecError> {
        self.array().map(u16::from_be_bytes)
    }

    fn u32(&mut self) -> Result<u32, WarpCodecError> {
        self.array().map(u32::from_be_bytes)
    }

    fn u64(&mut self) -> Result<u64, WarpCodecError> {
        self.array().map(u64::from_be_bytes)
    }

    fn bytes(&mut self) -> Result<&'a [u8], WarpCodecError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn codec(&mut self) -> Result<(), WarpCodecError> {
        match self.u16()? {
            CODEC_VERSION => Ok(()),
            other => Err(WarpCodecError::UnsupportedCodec(other)),
        }
    }

    fn finish(&self) -> Result<(), WarpCodecError> {
        match self.buf.len() - self.offset {
            0 => Ok(()),
            rest => Err(WarpCodecError::TrailingBytes(rest)),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn weight_message(nonce: u64, weight: u64) -> UnsignedMessage {
        StakingPayload::L1ValidatorWeight {
            validation_id: ValidationId::from([3u8; 32]),
            nonce,
            weight,
        }
        .to_message(5, ChainId::from([9u8; 32]), vec![0xaa; 20])
    }

    #[test]
    fn unsigned_message_layout() {
        let msg = UnsignedMessage::new(1, ChainId::from([2u8; 32]), vec![0xde, 0xad]);
        let encoded = msg.encode();

        assert_eq!(&encoded[..2], &[0, 0], "codec version");
        assert_eq!(&encoded[2..6], &[0, 0, 0, 1], "network id");
        assert_eq!(&encoded[6..38], &[2u8; 32], "source chain");
        assert_eq!(&encoded[38..42], &[0, 0, 0, 2], "payload length");
        assert_eq!(&encoded[42..], &[0xde, 0xad]);
    }

    #[test]
    fn message_id_is_sha256_of_encoding() {
        let msg = weight_message(1, 100);
        let expected = B256::from_slice(&Sha256::digest(msg.encode()));

        assert_eq!(msg.id(), expected);
        assert_ne!(msg.id(), weight_message(2, 100).id());
    }

    #[test]
    fn staking_payload_is_recovered_from_message() {
        let msg = weight_message(7, 42);
        let payload = msg.staking_payload().expect("must decode");

        assert_eq!(
            payload,
            StakingPayload::L1ValidatorWeight {
                validation_id: ValidationId::from([3u8; 32]),
                nonce: 7,
                weight: 42,
            }
        );
        assert_eq!(payload.validation_id(), Some(ValidationId::from([3u8; 32])));
    }

    #[test]
    fn truncated_input_is_rejected() {
        let encoded = weight_message(1, 1).encode();
        let err = UnsignedMessage::decode(&encoded[..encoded.len() - 1]).unwrap_err();

        assert!(matches!(err, WarpCodecError::Truncated { .. }), "{err:?}");
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut encoded = weight_message(1, 1).encode();
        encoded.push(0);

        assert_eq!(
            UnsignedMessage::decode(&encoded),
            Err(WarpCodecError::TrailingBytes(1))
        );
    }

    #[test]
    fn unknown_codec_and_type_are_rejected() {
        let mut encoded = weight_message(1, 1).encode();
        encoded[1] = 1;
        assert_eq!(
            UnsignedMessage::decode(&encoded),
            Err(WarpCodecError::UnsupportedCodec(1))
        );

        let mut payload = StakingPayload::ValidationUptime {
            validation_id: ValidationId::default(),
            uptime_secs: 1,
        }
        .encode();
        payload[5] = 42;
        assert_eq!(
            StakingPayload::decode(&payload),
            Err(WarpCodecError::UnknownType(42))
        );
    }

    #[test]
    fn signed_message_keeps_unsigned_prefix() {
        let unsigned = weight_message(3, 10);
        let signed = SignedMessage {
            unsigned: unsigned.clone(),
            signers: vec![0b1011].into(),
            signature: FixedBytes::from([4u8; SIGNATURE_LEN]),
            quorum_used: 50,
        };
        let encoded = signed.encode();

        assert!(encoded.starts_with(&unsigned.encode()));
        assert_eq!(SignedMessage::decode(&encoded, 50), Ok(signed.clone()));
        assert_eq!(signed.id(), unsigned.id());
    }

    fn arb_payload() -> impl Strategy<Value = StakingPayload> {
        prop_oneof![
            (any::<[u8; 32]>(), any::<u64>()).prop_map(|(id, uptime_secs)| {
                StakingPayload::ValidationUptime {
                    validation_id: id.into(),
                    uptime_secs,
                }
            }),
            (
                any::<[u8; 32]>(),
                any::<[u8; 20]>(),
                any::<u64>(),
                any::<u64>()
            )
                .prop_map(|(subnet, node, expiry, weight)| {
                    StakingPayload::RegisterL1Validator {
                        subnet_id: subnet.into(),
                        node_id: node.into(),
                        bls_public_key: BlsPublicKey::from([1u8; 48]),
                        expiry,
                        weight,
                    }
                }),
            (any::<[u8; 32]>(), any::<bool>()).prop_map(|(id, registered)| {
                StakingPayload::L1ValidatorRegistration {
                    validation_id: id.into(),
                    registered,
                }
            }),
            (any::<[u8; 32]>(), any::<u64>(), any::<u64>()).prop_map(|(id, nonce, weight)| {
                StakingPayload::L1ValidatorWeight {
                    validation_id: id.into(),
                    nonce,
                    weight,
                }
            }),
        ]
    }

    proptest! {
        #[test]
        fn payloads_survive_message_wrapping(payload in arb_payload(), network_id in any::<u32>()) {
            let msg = payload.to_message(network_id, ChainId::default(), Vec::new());
            let decoded = UnsignedMessage::decode(&msg.encode()).expect("must decode");

            prop_assert_eq!(decoded.staking_payload().expect("must decode"), payload);
        }

        #[test]
        fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = UnsignedMessage::decode(&bytes);
            let _ = StakingPayload::decode(&bytes);
        }
    }
}
