//! The fixed-size node arena: `CAP + 1` slots, each embedding one data node
//! and `K` branch nodes, plus the free lists threaded through them.

use super::bits::{key_bits, StoredKey};
use super::branch::{BranchNode, ParentLink};
use super::data::DataNode;

/// One slot: a data node and its `K` branch nodes, one per key position.
#[derive(Clone, Debug)]
pub struct Slot<const K: usize, const B: usize, V> {
    pub data: DataNode<K, B, V>,
    pub branches: [BranchNode; K],
}

/// The arena plus its `K` branch free lists and one data free list.
///
/// Free-list heads are `Option<u32>` slot indices; `None` is the empty
/// list. List order is slot 1, 2, .., CAP at construction (§4.2), but
/// insert/remove push and pop from the head so order drifts under use —
/// nothing depends on it beyond "every free slot is reachable exactly
/// once" (I7).
#[derive(Clone, Debug)]
pub struct Pool<const K: usize, const B: usize, V> {
    pub slots: Vec<Slot<K, B, V>>,
    pub branch_free: [Option<u32>; K],
    pub data_free: Option<u32>,
    pub allocated_count: u32,
}

impl<const K: usize, const B: usize, V: Default + Clone> Pool<K, B, V> {
    /// Builds a pool of `cap + 1` slots (slot 0 the permanent root) and
    /// threads the free lists through slots `1..=cap`. `cap` must already
    /// be validated positive by the caller.
    pub fn new(cap: usize, root_payload: V) -> Self {
        let key_bits = key_bits(B);
        let mut slots = Vec::with_capacity(cap + 1);

        slots.push(Slot {
            data: DataNode::root(0, root_payload),
            branches: std::array::from_fn(|_| BranchNode::head(0, key_bits)),
        });

        for seq in 1..=cap as u32 {
            slots.push(Slot {
                data: DataNode::empty(seq),
                branches: std::array::from_fn(|_| BranchNode::head(seq, key_bits)),
            });
        }

        let mut pool = Pool {
            slots,
            branch_free: [None; K],
            data_free: None,
            allocated_count: 0,
        };
        pool.relink_free_lists(cap);
        pool
    }

    /// Re-threads the free lists and resets allocation state in place,
    /// without reallocating the slot vector. Used by `reset`.
    pub fn relink_free_lists(&mut self, cap: usize) {
        self.data_free = if cap >= 1 { Some(1) } else { None };
        for seq in 1..=cap as u32 {
            let slot = &mut self.slots[seq as usize];
            slot.data.allocated = false;
            slot.data.keys = [StoredKey::zero(); K];
            slot.data.links = [ParentLink::head(); K];
            slot.data.free_next = if (seq as usize) < cap { Some(seq + 1) } else { None };
        }

        for k in 0..K {
            self.branch_free[k] = if cap >= 1 { Some(1) } else { None };
            for seq in 1..=cap as u32 {
                let slot = &mut self.slots[seq as usize];
                slot.branches[k] = BranchNode::head(seq, key_bits(B));
                slot.branches[k].free_next =
                    if (seq as usize) < cap { Some(seq + 1) } else { None };
            }
        }
        self.allocated_count = 0;
    }

    pub fn cap(&self) -> usize {
        self.slots.len() - 1
    }

    #[inline]
    pub fn data(&self, slot: u32) -> &DataNode<K, B, V> {
        &self.slots[slot as usize].data
    }

    #[inline]
    pub fn data_mut(&mut self, slot: u32) -> &mut DataNode<K, B, V> {
        &mut self.slots[slot as usize].data
    }

    #[inline]
    pub fn branch(&self, k: usize, slot: u32) -> &BranchNode {
        &self.slots[slot as usize].branches[k]
    }

    #[inline]
    pub fn branch_mut(&mut self, k: usize, slot: u32) -> &mut BranchNode {
        &mut self.slots[slot as usize].branches[k]
    }

    /// Detaches one data node from the data free list, if any.
    pub fn alloc_data(&mut self) -> Option<u32> {
        let slot = self.data_free?;
        self.data_free = self.slots[slot as usize].data.free_next.take();
        Some(slot)
    }

    /// Returns a data node to the data free list.
    pub fn free_data(&mut self, slot: u32) {
        let node = &mut self.slots[slot as usize].data;
        node.allocated = false;
        node.free_next = self.data_free;
        self.data_free = Some(slot);
    }

    /// Detaches one branch node from key position `k`'s free list, if any.
    pub fn alloc_branch(&mut self, k: usize) -> Option<u32> {
        let slot = self.branch_free[k]?;
        self.branch_free[k] = self.slots[slot as usize].branches[k].free_next.take();
        Some(slot)
    }

    /// Returns a branch node to key position `k`'s free list.
    pub fn free_branch(&mut self, k: usize, slot: u32) {
        let node = &mut self.slots[slot as usize].branches[k];
        node.free_next = self.branch_free[k];
        self.branch_free[k] = Some(slot);
    }
}
