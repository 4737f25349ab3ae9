//! Data nodes: the leaves shared by all `K` key-position tries.

use super::bits::StoredKey;
use super::branch::ParentLink;

/// One data node embedded in a slot. Holds `K` stored keys (one per trie),
/// `K` parent links (one per trie), the allocation flag, and the caller's
/// payload.
///
/// `free_next` is `Some` exactly when the node sits on the data free list;
/// `allocated` is `true` exactly when it holds a live user record (slot 0
/// is always allocated, see I1).
#[derive(Clone, Debug)]
pub struct DataNode<const K: usize, const B: usize, V> {
    pub sequence: u32,
    pub allocated: bool,
    pub keys: [StoredKey<B>; K],
    pub links: [ParentLink; K],
    pub free_next: Option<u32>,
    pub payload: V,
}

impl<const K: usize, const B: usize, V: Default> DataNode<K, B, V> {
    pub fn root(sequence: u32, payload: V) -> Self {
        DataNode {
            sequence,
            allocated: true,
            keys: [StoredKey::impossible(); K],
            links: [ParentLink::head(); K],
            free_next: None,
            payload,
        }
    }

    pub fn empty(sequence: u32) -> Self {
        DataNode {
            sequence,
            allocated: false,
            keys: [StoredKey::zero(); K],
            links: [ParentLink::head(); K],
            free_next: None,
            payload: V::default(),
        }
    }
}
