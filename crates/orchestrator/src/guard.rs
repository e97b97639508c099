//! Mutual exclusion of steps on the same key.

use std::{collections::HashSet, sync::Arc};

use parking_lot::Mutex;
use stakeflow_primitives::operation::OperationKey;
use tracing::trace;

/// The set of keys with a step in flight.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    keys: Arc<Mutex<HashSet<OperationKey>>>,
}

impl InFlightRegistry {
    /// Marks `key` as in flight, unless it already is.
    ///
    /// The key is released when the returned guard is dropped, including when the step's future
    /// is dropped before completing.
    pub fn try_acquire(&self, key: OperationKey) -> Option<InFlightGuard> {
        if !self.keys.lock().insert(key) {
            return None;
        }
        trace!(%key, "acquired in-flight guard");

        Some(InFlightGuard {
            keys: self.keys.clone(),
            key,
        })
    }

    /// Returns `true` if a step is running for `key`.
    pub fn is_in_flight(&self, key: &OperationKey) -> bool {
        self.keys.lock().contains(key)
    }
}

/// Releases its key on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<Mutex<HashSet<OperationKey>>>,
    key: OperationKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys.lock().remove(&self.key);
        trace!(key = %self.key, "released in-flight guard");
    }
}

#[cfg(test)]
mod tests {
    use stakeflow_primitives::ids::ValidationId;

    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let registry = InFlightRegistry::default();
        let key = OperationKey::Validation(ValidationId::from([1u8; 32]));
        let other = OperationKey::Validation(ValidationId::from([2u8; 32]));

        let guard = registry.try_acquire(key).unwrap();
        assert!(registry.try_acquire(key).is_none());
        assert!(registry.try_acquire(other).is_some());
        assert!(registry.is_in_flight(&key));

        drop(guard);
        assert!(!registry.is_in_flight(&key));
        assert!(registry.try_acquire(key).is_some());
    }
}
