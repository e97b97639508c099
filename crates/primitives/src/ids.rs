//! Identifiers used across both ledgers.

use std::{fmt, str::FromStr};

use alloy_primitives::{hex, FixedBytes};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident, $len:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub FixedBytes<$len>);

        impl $name {
            /// Returns `true` if every byte of the identifier is zero.
            ///
            /// The staking manager returns the zero value for identifiers it does not know.
            pub fn is_zero(&self) -> bool {
                self.0.is_zero()
            }

            /// Returns the raw bytes of the identifier.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0 .0
            }
        }

        impl From<FixedBytes<$len>> for $name {
            fn from(value: FixedBytes<$len>) -> Self {
                Self(value)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(value: [u8; $len]) -> Self {
                Self(FixedBytes(value))
            }
        }

        impl From<$name> for FixedBytes<$len> {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                FixedBytes::<$len>::from_str(s).map(Self)
            }
        }
    };
}

id_newtype!(
    /// Identifier of a validation period, derived by the staking manager when a registration is
    /// initiated.
    ValidationId,
    32
);

id_newtype!(
    /// Identifier of a delegation, derived by the staking manager when a delegation is initiated.
    DelegationId,
    32
);

id_newtype!(
    /// Platform-chain node identifier of a validator.
    NodeId,
    20
);

id_newtype!(
    /// Compressed BLS public key of a validator.
    BlsPublicKey,
    48
);

id_newtype!(
    /// BLS proof of possession for a [`BlsPublicKey`].
    BlsProofOfPossession,
    96
);

id_newtype!(
    /// Identifier of a platform-chain transaction.
    PlatformTxId,
    32
);

id_newtype!(
    /// Identifier of a subnet whose validators sign warp messages.
    SubnetId,
    32
);

id_newtype!(
    /// Identifier of the blockchain a warp message originates from.
    ChainId,
    32
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        let id = ValidationId::from([7u8; 32]);
        let parsed: ValidationId = id.to_string().parse().expect("must parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn zero_ids_are_detected() {
        assert!(DelegationId::default().is_zero());
        assert!(!NodeId::from([1u8; 20]).is_zero());
    }

    #[test]
    fn serde_is_transparent_hex() {
        let id = NodeId::from([0xab; 20]);
        let json = serde_json::to_string(&id).expect("must serialize");
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(20)));
    }
}
