//! Structural verifier: exhaustively cross-checks the invariants in
//! `super::Patch`'s module docs against the live pool state.

use std::fmt;

use super::bits::{key_bits, StoredKey};
use super::branch::{ChildRef, ParentRef, Side};
use super::pool::Pool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum VerifyError {
    HeadCorrupt = 1,
    SlotMismatch = 2,
    CountMismatch = 3,
    DuplicateKey = 4,
    FreeListCorrupt = 5,
    LinkageInvalid = 6,
    SelfSearchMismatch = 7,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            VerifyError::HeadCorrupt => "head branch or root data node corrupt",
            VerifyError::SlotMismatch => "slot sequence number or allocation flag mismatch",
            VerifyError::CountMismatch => "allocated/free data node count mismatch",
            VerifyError::DuplicateKey => "two allocated data nodes share a key at some position",
            VerifyError::FreeListCorrupt => "a free list references a node that is not free",
            VerifyError::LinkageInvalid => "branch or parent linkage is invalid",
            VerifyError::SelfSearchMismatch => "re-searching an allocated node's own keys failed",
        };
        write!(f, "{msg} (code {})", *self as u8)
    }
}

impl std::error::Error for VerifyError {}

/// Runs every check in order, returning the first failure. `report`, when
/// `Some`, receives a line of diagnostics for every free and allocated
/// node before (and regardless of) the checks' outcome.
pub fn verify<
    const K: usize,
    const B: usize,
    V: Default + Clone,
    F: Fn(&Pool<K, B, V>, u32, usize) -> Option<u32>,
>(
    pool: &Pool<K, B, V>,
    cap: usize,
    search_self: F,
    mut report: Option<&mut String>,
) -> Result<(), VerifyError> {
    if let Some(buf) = report.as_deref_mut() {
        render_report(pool, cap, buf);
    }

    check_head(pool)?;
    check_slots(pool, cap)?;
    check_counts(pool, cap)?;
    check_duplicates(pool, cap)?;
    check_free_lists(pool, cap)?;
    check_linkage(pool, cap)?;
    check_self_search(pool, cap, search_self)?;
    Ok(())
}

/// The head branch for every key position is slot 0's k-th branch node:
/// slot 0 is permanently allocated (I1), so reusing its branches as heads
/// means the head never passes through a free list.
fn check_head<const K: usize, const B: usize, V: Default + Clone>(
    pool: &Pool<K, B, V>,
) -> Result<(), VerifyError> {
    let kb = key_bits(B);
    let root = pool.data(0);
    if !root.allocated || root.keys.iter().any(|k| *k != StoredKey::impossible()) {
        return Err(VerifyError::HeadCorrupt);
    }
    for k in 0..K {
        let head = pool.branch(k, 0);
        if head.test_bit != kb
            || head.link.parent != ParentRef::None
            || head.left != ChildRef::Data(0)
            || head.right != ChildRef::Data(0)
        {
            return Err(VerifyError::HeadCorrupt);
        }
    }
    Ok(())
}

fn check_slots<const K: usize, const B: usize, V: Default + Clone>(
    pool: &Pool<K, B, V>,
    cap: usize,
) -> Result<(), VerifyError> {
    for seq in 0..=cap as u32 {
        let slot = &pool.slots[seq as usize];
        if slot.data.sequence != seq {
            return Err(VerifyError::SlotMismatch);
        }
        for branch in &slot.branches {
            if branch.sequence != seq {
                return Err(VerifyError::SlotMismatch);
            }
            if branch.test_bit > key_bits(B) {
                return Err(VerifyError::SlotMismatch);
            }
        }
    }
    Ok(())
}

fn check_counts<const K: usize, const B: usize, V: Default + Clone>(
    pool: &Pool<K, B, V>,
    cap: usize,
) -> Result<(), VerifyError> {
    let allocated = pool.slots.iter().filter(|s| s.data.allocated).count() as u32;
    if allocated != pool.allocated_count + 1 {
        return Err(VerifyError::CountMismatch);
    }
    if pool.slots.len() != cap + 1 {
        return Err(VerifyError::CountMismatch);
    }
    Ok(())
}

fn check_duplicates<const K: usize, const B: usize, V: Default + Clone>(
    pool: &Pool<K, B, V>,
    cap: usize,
) -> Result<(), VerifyError> {
    use itertools::Itertools;

    for k in 0..K {
        let present: Vec<StoredKey<B>> = (1..=cap as u32)
            .map(|seq| pool.data(seq))
            .filter(|data| data.allocated)
            .map(|data| data.keys[k])
            .collect();
        if present.iter().tuple_combinations().any(|(a, b)| a == b) {
            return Err(VerifyError::DuplicateKey);
        }
    }
    Ok(())
}

/// Walks the data free list, rejecting a node visited twice or an
/// allocated node found on it. Returns one flag per slot (`true` = free).
fn free_data_set<const K: usize, const B: usize, V: Default + Clone>(
    pool: &Pool<K, B, V>,
    cap: usize,
) -> Result<Vec<bool>, VerifyError> {
    let mut seen = vec![false; cap + 1];
    let mut cursor = pool.data_free;
    while let Some(slot) = cursor {
        if pool.data(slot).allocated || seen[slot as usize] {
            return Err(VerifyError::FreeListCorrupt);
        }
        seen[slot as usize] = true;
        cursor = pool.data(slot).free_next;
    }
    Ok(seen)
}

/// As `free_data_set`, for key position `k`'s branch free list.
fn free_branch_set<const K: usize, const B: usize, V: Default + Clone>(
    pool: &Pool<K, B, V>,
    cap: usize,
    k: usize,
) -> Result<Vec<bool>, VerifyError> {
    let mut seen = vec![false; cap + 1];
    let mut cursor = pool.branch_free[k];
    while let Some(slot) = cursor {
        if seen[slot as usize] {
            return Err(VerifyError::FreeListCorrupt);
        }
        seen[slot as usize] = true;
        cursor = pool.branch(k, slot).free_next;
    }
    Ok(seen)
}

fn check_free_lists<const K: usize, const B: usize, V: Default + Clone>(
    pool: &Pool<K, B, V>,
    cap: usize,
) -> Result<(), VerifyError> {
    let data_free = free_data_set(pool, cap)?;
    let free_count = data_free.iter().filter(|&&free| free).count();
    let expected_free = match (cap as u32).checked_sub(pool.allocated_count) {
        Some(free) => free as usize,
        None => return Err(VerifyError::FreeListCorrupt),
    };
    if free_count != expected_free {
        // I3: free + allocated data nodes must total CAP+1. A node that
        // is neither allocated nor reachable from this list is an orphan.
        return Err(VerifyError::FreeListCorrupt);
    }

    for k in 0..K {
        free_branch_set(pool, cap, k)?;
    }
    Ok(())
}

/// Top-down walk of trie `k` from its head, validating every reachable
/// branch node's two children: a branch child must not be on this
/// position's free list and must record `branch_slot` as its parent on
/// the matching side; a data child must be allocated, and (except the
/// root, whose own parent link is not meaningful before the trie's first
/// insert for this position) must record the same back-reference.
fn check_trie_structure<const K: usize, const B: usize, V: Default + Clone>(
    pool: &Pool<K, B, V>,
    k: usize,
    free_branches: &[bool],
    visited: &mut [bool],
    branch_slot: u32,
) -> Result<(), VerifyError> {
    let branch = pool.branch(k, branch_slot);
    for side in [Side::Left, Side::Right] {
        match branch.child(side) {
            ChildRef::Branch(child_slot) => {
                if free_branches[child_slot as usize] {
                    return Err(VerifyError::LinkageInvalid);
                }
                let child = pool.branch(k, child_slot);
                if child.link.parent != ParentRef::Branch(branch_slot) || child.link.side != side {
                    return Err(VerifyError::LinkageInvalid);
                }
                if !visited[child_slot as usize] {
                    visited[child_slot as usize] = true;
                    check_trie_structure(pool, k, free_branches, visited, child_slot)?;
                }
            }
            ChildRef::Data(data_slot) => {
                if !pool.data(data_slot).allocated {
                    return Err(VerifyError::LinkageInvalid);
                }
                if data_slot != 0 {
                    let link = pool.data(data_slot).links[k];
                    if link.parent != ParentRef::Branch(branch_slot) || link.side != side {
                        return Err(VerifyError::LinkageInvalid);
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_linkage<const K: usize, const B: usize, V: Default + Clone>(
    pool: &Pool<K, B, V>,
    cap: usize,
) -> Result<(), VerifyError> {
    for k in 0..K {
        let free_branches = free_branch_set(pool, cap, k)?;
        let mut visited = vec![false; cap + 1];
        check_trie_structure(pool, k, &free_branches, &mut visited, 0)?;
    }

    for k in 0..K {
        for seq in 1..=cap as u32 {
            let data = pool.data(seq);
            if !data.allocated {
                continue;
            }
            let link = data.links[k];
            let ParentRef::Branch(parent_slot) = link.parent else {
                return Err(VerifyError::LinkageInvalid);
            };
            let parent = pool.branch(k, parent_slot);
            let expected = parent.child(link.side);
            if expected != ChildRef::Data(seq) {
                return Err(VerifyError::LinkageInvalid);
            }
        }
    }
    Ok(())
}

fn check_self_search<
    const K: usize,
    const B: usize,
    V: Default + Clone,
    F: Fn(&Pool<K, B, V>, u32, usize) -> Option<u32>,
>(
    pool: &Pool<K, B, V>,
    cap: usize,
    search_self: F,
) -> Result<(), VerifyError> {
    for seq in 1..=cap as u32 {
        let data = pool.data(seq);
        if !data.allocated {
            continue;
        }
        for k in 0..K {
            match search_self(pool, seq, k) {
                Some(found) if found == seq => {}
                _ => return Err(VerifyError::SelfSearchMismatch),
            }
        }
    }
    Ok(())
}

fn render_report<const K: usize, const B: usize, V: Default + Clone>(
    pool: &Pool<K, B, V>,
    cap: usize,
    buf: &mut String,
) {
    use std::fmt::Write as _;
    let _ = writeln!(buf, "patchpool diagnostic report: cap={cap}, positions={K}");
    for seq in 0..=cap as u32 {
        let data = pool.data(seq);
        let _ = write!(buf, "slot {seq}: allocated={} keys=", data.allocated);
        for key in &data.keys {
            let _ = write!(buf, "{key:?} ");
        }
        let _ = writeln!(buf);
    }
    let _ = writeln!(buf, "data_free head: {:?}", pool.data_free);
    for k in 0..K {
        let _ = writeln!(buf, "branch_free[{k}] head: {:?}", pool.branch_free[k]);
    }
}
