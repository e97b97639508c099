//! Packing of signed warp messages into transaction access lists.
//!
//! The execution chain reads warp messages from the access-list entries addressed to the warp
//! precompile. Each entry holds one message, terminated by a `0xff` delimiter and zero-padded to a
//! whole number of 32-byte storage keys.

use alloy::{
    primitives::B256,
    rpc::types::{AccessList, AccessListItem},
};
use stakeflow_primitives::warp::SignedMessage;

use crate::interface::WARP_PRECOMPILE;

const DELIMITER: u8 = 0xff;

/// Packs `bytes` into storage keys.
pub fn pack(bytes: &[u8]) -> Vec<B256> {
    let mut padded = Vec::with_capacity(bytes.len() + 32);
    padded.extend_from_slice(bytes);
    padded.push(DELIMITER);
    padded.resize(padded.len().div_ceil(32) * 32, 0);

    padded.chunks_exact(32).map(B256::from_slice).collect()
}

/// Recovers the bytes packed by [`pack`], or `None` if the padding is malformed.
pub fn unpack(keys: &[B256]) -> Option<Vec<u8>> {
    let mut bytes: Vec<u8> = keys.iter().flat_map(|key| key.0).collect();
    let end = bytes.iter().rposition(|b| *b != 0)?;
    if bytes[end] != DELIMITER || bytes.len() - end > 32 {
        return None;
    }
    bytes.truncate(end);
    Some(bytes)
}

/// Builds the access list carrying `messages`, in order.
///
/// The position of a message in this list is the `messageIndex` the contract reads it with, which
/// is unrelated to where the platform chain logged the message.
pub fn access_list<'a>(messages: impl IntoIterator<Item = &'a SignedMessage>) -> AccessList {
    AccessList(
        messages
            .into_iter()
            .map(|message| AccessListItem {
                address: WARP_PRECOMPILE,
                storage_keys: pack(&message.encode()),
            })
            .collect(),
    )
}
