//! The quorum descent used when aggregating signatures.

use serde::{Deserialize, Serialize};

use crate::{default::QUORUM_DESCENT, errors::ParamsError};

/// Quorum percentages to try, highest first.
///
/// Aggregation starts at the first quorum and only moves to the next one when the aggregator
/// reports that not enough stake signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct QuorumPolicy(Vec<u8>);

impl QuorumPolicy {
    /// Creates a policy, checking that it is non-empty, strictly descending and that every
    /// quorum is in `1..=100`.
    pub fn new(quorums: Vec<u8>) -> Result<Self, ParamsError> {
        if quorums.is_empty() {
            return Err(ParamsError::EmptyQuorumPolicy);
        }
        if let Some(bad) = quorums.iter().find(|q| !(1..=100).contains(*q)) {
            return Err(ParamsError::QuorumOutOfRange(*bad));
        }
        if let Some(pair) = quorums.windows(2).find(|pair| pair[0] <= pair[1]) {
            return Err(ParamsError::QuorumNotDescending {
                prev: pair[0],
                next: pair[1],
            });
        }

        Ok(Self(quorums))
    }

    /// The quorums in the order they are tried.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// The first quorum tried.
    pub fn highest(&self) -> u8 {
        // non-empty by construction
        self.0[0]
    }
}

impl Default for QuorumPolicy {
    fn default() -> Self {
        Self(QUORUM_DESCENT.to_vec())
    }
}

impl TryFrom<Vec<u8>> for QuorumPolicy {
    type Error = ParamsError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QuorumPolicy> for Vec<u8> {
    fn from(value: QuorumPolicy) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn default_descends_from_67() {
        let policy = QuorumPolicy::default();

        assert_eq!(policy.as_slice(), &[67, 50, 33]);
        assert_eq!(policy.highest(), 67);
    }

    #[test]
    fn invalid_policies_are_rejected() {
        assert_eq!(QuorumPolicy::new(vec![]), Err(ParamsError::EmptyQuorumPolicy));
        assert_eq!(
            QuorumPolicy::new(vec![101, 50]),
            Err(ParamsError::QuorumOutOfRange(101))
        );
        assert_eq!(
            QuorumPolicy::new(vec![67, 0]),
            Err(ParamsError::QuorumOutOfRange(0))
        );
        assert_eq!(
            QuorumPolicy::new(vec![50, 50]),
            Err(ParamsError::QuorumNotDescending { prev: 50, next: 50 })
        );
    }

    #[test]
    fn deserialization_validates() {
        #[derive(Debug, Deserialize)]
        struct Wrapper {
            #[allow(dead_code)]
            quorum: QuorumPolicy,
        }

        assert!(toml::from_str::<Wrapper>("quorum = [67, 50]").is_ok());
        assert!(toml::from_str::<Wrapper>("quorum = [50, 67]").is_err());
    }

    proptest! {
        #[test]
        fn accepted_policies_descend_within_range(quorums in proptest::collection::vec(any::<u8>(), 0..6)) {
            if let Ok(policy) = QuorumPolicy::new(quorums) {
                let slice = policy.as_slice();
                prop_assert!(!slice.is_empty());
                prop_assert!(slice.iter().all(|q| (1..=100).contains(q)));
                prop_assert!(slice.windows(2).all(|w| w[0] > w[1]));
            }
        }
    }
}
