//! In-order enumeration of a single key position's trie.

use super::branch::{ChildRef, Side};
use super::pool::Pool;
use super::Ref;

/// Depth-first left-then-right walk of trie `k`, collecting data-node slot
/// indices in ascending key-`k` order. The root (slot 0) is walked last
/// and excluded from the result, matching the "user records only" result
/// of an in-order descent: the head's own right child is never real, so
/// the walk starts at the head's left child and only the final leaf along
/// the all-ones path is the root.
pub fn enumerate<const K: usize, const B: usize, V: Default + Clone>(
    pool: &Pool<K, B, V>,
    head: ChildRef,
    k: usize,
) -> Vec<Ref> {
    let mut out = Vec::new();
    walk(pool, head, k, &mut out);
    out.pop();
    out
}

fn walk<const K: usize, const B: usize, V: Default + Clone>(
    pool: &Pool<K, B, V>,
    node: ChildRef,
    k: usize,
    out: &mut Vec<Ref>,
) {
    match node {
        ChildRef::Data(slot) => out.push(Ref { slot }),
        ChildRef::Branch(slot) => {
            let branch = pool.branch(k, slot);
            walk(pool, branch.child(Side::Left), k, out);
            walk(pool, branch.child(Side::Right), k, out);
        }
    }
}
