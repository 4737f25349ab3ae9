//! A fixed-capacity, in-memory, multi-key PATRICIA trie.
//!
//! [`Patch`] maps tuples of `K` fixed-width binary keys to user records: a
//! lookup supplying any non-empty subset of a record's `K` keys returns
//! that single record. Internally this is `K` independent bit-level tries
//! whose leaves — the data nodes — are shared: inserting a record
//! allocates one data node and exactly `K` branch nodes (one per trie),
//! atomically, out of a pool sized at construction. No allocation occurs
//! after construction; capacity is fixed for the container's lifetime.
//!
//! # Invariants
//!
//! - Slot 0 is permanently allocated and holds the "impossible" key: every
//!   byte of every one of its `K` stored keys, including the sentinel, is
//!   `0xFF`. No real key can equal it, because real keys are always stored
//!   with a `0` sentinel.
//! - The allocated-record count equals the number of slots in `1..=cap`
//!   whose data node is allocated.
//! - Every branch node reachable from a trie's head has a valid parent in
//!   that same trie (except the head itself) and two children that are
//!   each either another branch node in that trie or an allocated data
//!   node.
//! - For every allocated data node and every key position, the node's
//!   parent link in that position's trie names a branch node whose child
//!   on the recorded side is that data node.
//! - For every key position, no two allocated data nodes share that
//!   position's key value.
//! - A node is never simultaneously on a free list and reachable from a
//!   trie.
//! - Every node's stored sequence number equals its slot index.

pub mod bits;
pub mod branch;
pub mod data;
pub mod enumerate;
pub mod pool;
pub mod verify;

use std::fmt;

use bits::{bit, highest_differing_bit, StoredKey};
use branch::{ChildRef, ParentLink, ParentRef};
pub use branch::Side;
use pool::Pool;

pub use verify::VerifyError;

/// One key position's worth of input: whether this position is used in the
/// operation, and if so, its `B` bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeySlot<const B: usize> {
    pub used: bool,
    pub bytes: [u8; B],
}

impl<const B: usize> KeySlot<B> {
    pub fn used(bytes: [u8; B]) -> Self {
        KeySlot { used: true, bytes }
    }

    pub fn unused() -> Self {
        KeySlot {
            used: false,
            bytes: [0; B],
        }
    }
}

/// The `K`-position key input to `search`, `insert`, and `remove`: the
/// typed counterpart of the wire format's `K · (1 + B)`-byte buffer.
pub type Keys<const K: usize, const B: usize> = [KeySlot<B>; K];

/// A handle to a data node, returned by `insert`, `search`, and `remove`.
/// Valid until the next mutating call (`insert`, `remove`, or `reset`) on
/// the same container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ref {
    slot: u32,
}

impl Ref {
    pub fn slot_index(self) -> u32 {
        self.slot
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstructError {
    BadParameters { cap: usize, k: usize, b: usize },
}

impl fmt::Display for ConstructError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ConstructError::BadParameters { cap, k, b } = self;
        write!(
            f,
            "bad parameters: cap={cap}, k={k}, b={b} (all three must be at least 1)"
        )
    }
}

impl std::error::Error for ConstructError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertError {
    KeyExists(Ref),
    Full,
    BadFlag,
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertError::KeyExists(_) => write!(f, "a key position already has this value"),
            InsertError::Full => write!(f, "no free slot available"),
            InsertError::BadFlag => write!(f, "insert requires every key position's use flag set"),
        }
    }
}

impl std::error::Error for InsertError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnumerateError {
    KeyPositionOutOfRange { k: usize, positions: usize },
}

impl fmt::Display for EnumerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let EnumerateError::KeyPositionOutOfRange { k, positions } = self;
        write!(f, "key position {k} out of range 0..{positions}")
    }
}

impl std::error::Error for EnumerateError {}

/// A fixed-capacity multi-key PATRICIA trie over `K` positions of `B`-byte
/// keys, holding payloads of type `V`.
pub struct Patch<const K: usize, const B: usize, V> {
    pool: Pool<K, B, V>,
    cap: usize,
}

impl<const K: usize, const B: usize, V: Default + Clone> Patch<K, B, V> {
    /// Builds and initializes a container with room for `cap` records. The
    /// root payload fills slot 0's permanently-allocated record.
    pub fn new(cap: usize, root_payload: V) -> Result<Self, ConstructError> {
        if cap < 1 || K < 1 || B < 1 {
            return Err(ConstructError::BadParameters { cap, k: K, b: B });
        }
        Ok(Patch {
            pool: Pool::new(cap, root_payload),
            cap,
        })
    }

    /// Resets the container to the empty state in place, without
    /// reallocating the underlying arena.
    pub fn reset(&mut self) {
        self.pool.relink_free_lists(self.cap);
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn count(&self) -> u32 {
        self.pool.allocated_count
    }

    pub fn get(&self, r: Ref) -> &V {
        &self.pool.data(r.slot).payload
    }

    pub fn get_mut(&mut self, r: Ref) -> &mut V {
        &mut self.pool.data_mut(r.slot).payload
    }

    fn local_keys(keys: &Keys<K, B>) -> [Option<StoredKey<B>>; K] {
        std::array::from_fn(|k| keys[k].used.then(|| StoredKey::real(keys[k].bytes)))
    }

    /// Descends trie `k` from the head, following `local`'s bits, until a
    /// data node is reached. Returns that data node's slot — the node the
    /// key would collide with on insert, or the answer on search, whether
    /// or not its stored key actually equals `local`.
    fn descend_to_leaf(&self, k: usize, local: &StoredKey<B>) -> u32 {
        let mut branch_slot = 0u32;
        loop {
            let branch = self.pool.branch(k, branch_slot);
            let side = Side::from_bit(bit(local, branch.test_bit));
            match branch.child(side) {
                ChildRef::Data(slot) => return slot,
                ChildRef::Branch(slot) => branch_slot = slot,
            }
        }
    }

    /// §4.3 search: every used position must reach the same data node and
    /// match its stored key exactly.
    pub fn search(&self, keys: &Keys<K, B>) -> Option<Ref> {
        let locals = Self::local_keys(keys);
        let mut found: Option<u32> = None;
        let mut any_used = false;
        for k in 0..K {
            let Some(local) = &locals[k] else { continue };
            any_used = true;
            let slot = self.descend_to_leaf(k, local);
            match found {
                None => found = Some(slot),
                Some(prev) if prev != slot => return None,
                _ => {}
            }
            if self.pool.data(slot).keys[k] != *local {
                return None;
            }
        }
        if !any_used {
            return None;
        }
        found.map(|slot| Ref { slot })
    }

    /// §4.4 insert: two-pass search-then-splice, allocating one data node
    /// and `K` branch nodes atomically.
    pub fn insert(&mut self, keys: &Keys<K, B>, payload: V) -> Result<Ref, InsertError> {
        if keys.iter().any(|slot| !slot.used) {
            return Err(InsertError::BadFlag);
        }
        let locals: [StoredKey<B>; K] = std::array::from_fn(|k| StoredKey::real(keys[k].bytes));

        let mut terminating = [0u32; K];
        for k in 0..K {
            let slot = self.descend_to_leaf(k, &locals[k]);
            if self.pool.data(slot).keys[k] == locals[k] {
                return Err(InsertError::KeyExists(Ref { slot }));
            }
            terminating[k] = slot;
        }

        let data_slot = match self.pool.alloc_data() {
            Some(slot) => slot,
            None => return Err(InsertError::Full),
        };
        let mut branch_slots = [0u32; K];
        for k in 0..K {
            match self.pool.alloc_branch(k) {
                Some(slot) => branch_slots[k] = slot,
                None => {
                    for j in 0..k {
                        self.pool.free_branch(j, branch_slots[j]);
                    }
                    self.pool.free_data(data_slot);
                    return Err(InsertError::Full);
                }
            }
        }

        for k in 0..K {
            let key_bit = highest_differing_bit(&locals[k], &self.pool.data(terminating[k]).keys[k]);

            let mut parent_slot = 0u32;
            let mut side = Side::from_bit(bit(&locals[k], self.pool.branch(k, 0).test_bit));
            let mut child = self.pool.branch(k, 0).child(side);
            loop {
                match child {
                    ChildRef::Data(_) => break,
                    ChildRef::Branch(next_slot) => {
                        let next = self.pool.branch(k, next_slot);
                        if next.test_bit <= key_bit {
                            break;
                        }
                        parent_slot = next_slot;
                        side = Side::from_bit(bit(&locals[k], next.test_bit));
                        child = next.child(side);
                    }
                }
            }

            let new_branch_slot = branch_slots[k];
            let data_side = Side::from_bit(bit(&locals[k], key_bit));
            let old_side = data_side.opposite();

            match child {
                ChildRef::Branch(s) => {
                    self.pool.branch_mut(k, s).link = ParentLink {
                        parent: ParentRef::Branch(new_branch_slot),
                        side: old_side,
                    };
                }
                ChildRef::Data(s) => {
                    self.pool.data_mut(s).links[k] = ParentLink {
                        parent: ParentRef::Branch(new_branch_slot),
                        side: old_side,
                    };
                }
            }

            {
                let new_branch = self.pool.branch_mut(k, new_branch_slot);
                new_branch.link = ParentLink {
                    parent: ParentRef::Branch(parent_slot),
                    side,
                };
                new_branch.test_bit = key_bit;
                new_branch.set_child(old_side, child);
                new_branch.set_child(data_side, ChildRef::Data(data_slot));
            }

            self.pool
                .branch_mut(k, parent_slot)
                .set_child(side, ChildRef::Branch(new_branch_slot));

            let data = self.pool.data_mut(data_slot);
            data.keys[k] = locals[k];
            data.links[k] = ParentLink {
                parent: ParentRef::Branch(new_branch_slot),
                side: data_side,
            };
        }

        let data = self.pool.data_mut(data_slot);
        data.allocated = true;
        data.payload = payload;
        self.pool.allocated_count += 1;

        Ok(Ref { slot: data_slot })
    }

    /// §4.5 remove: locates the record via `search`'s any-non-empty-subset
    /// rule, then splices each trie's branch node out symmetrically.
    pub fn remove(&mut self, keys: &Keys<K, B>) -> Option<Ref> {
        let found = self.search(keys)?;
        let d = found.slot;

        for k in 0..K {
            let link = self.pool.data(d).links[k];
            let ParentRef::Branch(bp_slot) = link.parent else {
                unreachable!("an allocated non-root data node always has a branch parent")
            };
            let bp = self.pool.branch(k, bp_slot).clone();
            let sibling_side = link.side.opposite();
            let sibling = bp.child(sibling_side);

            let ParentRef::Branch(gp_slot) = bp.link.parent else {
                unreachable!("a spliceable branch node is never the head itself")
            };
            let gp_side = bp.link.side;

            self.pool
                .branch_mut(k, gp_slot)
                .set_child(gp_side, sibling);
            match sibling {
                ChildRef::Branch(s) => {
                    self.pool.branch_mut(k, s).link = ParentLink {
                        parent: ParentRef::Branch(gp_slot),
                        side: gp_side,
                    };
                }
                ChildRef::Data(s) => {
                    self.pool.data_mut(s).links[k] = ParentLink {
                        parent: ParentRef::Branch(gp_slot),
                        side: gp_side,
                    };
                }
            }

            self.pool.free_branch(k, bp_slot);
        }

        self.pool.free_data(d);
        self.pool.allocated_count -= 1;
        Some(found)
    }

    /// §4.6 in-order enumeration of trie `k`, ascending by that position's
    /// key value, excluding the root.
    pub fn enumerate(&self, k: usize) -> Result<Vec<Ref>, EnumerateError> {
        if k >= K {
            return Err(EnumerateError::KeyPositionOutOfRange { k, positions: K });
        }
        let head_child = self.pool.branch(k, 0).child(Side::from_bit(0));
        Ok(enumerate::enumerate(&self.pool, head_child, k))
    }

    /// §4.7 verifier: returns the first failing structural check, if any.
    pub fn verify(&self) -> Result<(), VerifyError> {
        verify::verify(&self.pool, self.cap, Self::search_self, None)
    }

    /// As [`Patch::verify`], additionally rendering a diagnostic report of
    /// every free and allocated node's slot and keys.
    pub fn verify_report(&self) -> (Result<(), VerifyError>, String) {
        let mut report = String::new();
        let result = verify::verify(&self.pool, self.cap, Self::search_self, Some(&mut report));
        (result, report)
    }

    fn search_self(pool: &Pool<K, B, V>, slot: u32, k: usize) -> Option<u32> {
        let local = pool.data(slot).keys[k];
        let mut branch_slot = 0u32;
        loop {
            let branch = pool.branch(k, branch_slot);
            let side = Side::from_bit(bit(&local, branch.test_bit));
            match branch.child(side) {
                ChildRef::Data(found) => {
                    return (pool.data(found).keys[k] == local).then_some(found)
                }
                ChildRef::Branch(next) => branch_slot = next,
            }
        }
    }
}

impl<const K: usize, const B: usize, V> fmt::Debug for Patch<K, B, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patch")
            .field("cap", &self.cap)
            .field("count", &self.pool.allocated_count)
            .finish()
    }
}
