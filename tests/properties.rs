#![cfg(feature = "proptest")]

use std::collections::HashSet;

use proptest::prelude::*;

use patchpool::{InsertError, KeySlot, Patch};

const CAP: usize = 16;
const K: usize = 2;
const B: usize = 2;

fn keys(a: u16, b: u16) -> [KeySlot<B>; K] {
    [KeySlot::used(a.to_be_bytes()), KeySlot::used(b.to_be_bytes())]
}

fn arb_pair() -> impl Strategy<Value = (u16, u16)> {
    (0u16..64, 0u16..64)
}

proptest! {
    #[test]
    fn p1_empty_after_init(_unused in 0u8..1) {
        let patch: Patch<K, B, u32> = Patch::new(CAP, 0).unwrap();
        prop_assert_eq!(patch.count(), 0);
        prop_assert_eq!(patch.search(&keys(0, 0)), None);
        for k in 0..K {
            prop_assert_eq!(patch.enumerate(k).unwrap().len(), 0);
        }
        prop_assert_eq!(patch.verify(), Ok(()));
    }

    #[test]
    fn p2_insert_then_search((a, b) in arb_pair()) {
        let mut patch: Patch<K, B, u32> = Patch::new(CAP, 0).unwrap();
        let k = keys(a, b);
        if let Ok(r) = patch.insert(&k, 1) {
            prop_assert_eq!(patch.search(&k), Some(r));
            let only_first = [KeySlot::used(a.to_be_bytes()), KeySlot::unused()];
            prop_assert_eq!(patch.search(&only_first), Some(r));
        }
    }

    #[test]
    fn p3_count_tracks_successful_mutations(pairs in prop::collection::vec(arb_pair(), 0..20)) {
        let mut patch: Patch<K, B, u32> = Patch::new(CAP, 0).unwrap();
        let mut expected = 0u32;
        for (a, b) in pairs {
            let k = keys(a, b);
            match patch.insert(&k, 1) {
                Ok(_) => expected += 1,
                Err(InsertError::KeyExists(_)) | Err(InsertError::Full) => {}
                Err(InsertError::BadFlag) => unreachable!(),
            }
            prop_assert_eq!(patch.count(), expected);
        }
    }

    #[test]
    fn p4_duplicate_rejection_per_position((a, b) in arb_pair(), other_b in 0u16..64) {
        let mut patch: Patch<K, B, u32> = Patch::new(CAP, 0).unwrap();
        prop_assume!(patch.insert(&keys(a, b), 1).is_ok());
        let colliding = keys(a, other_b);
        prop_assert!(matches!(patch.insert(&colliding, 2), Err(InsertError::KeyExists(_))));
        prop_assert_eq!(patch.count(), 1);
    }

    #[test]
    fn p5_capacity_bound(pairs in prop::collection::vec(arb_pair(), 0..64)) {
        let mut patch: Patch<K, B, u32> = Patch::new(4, 0).unwrap();
        let mut seen = HashSet::new();
        let mut inserted = 0;
        for (a, b) in pairs {
            if !seen.insert((a, b)) {
                continue;
            }
            match patch.insert(&keys(a, b), 1) {
                Ok(_) => inserted += 1,
                Err(InsertError::Full) => {
                    prop_assert_eq!(inserted, 4);
                    let before = patch.count();
                    prop_assert_eq!(before, 4);
                }
                Err(InsertError::KeyExists(_)) => {}
                Err(InsertError::BadFlag) => unreachable!(),
            }
            prop_assert!(patch.count() <= 4);
        }
    }

    #[test]
    fn p6_remove_idempotence((a, b) in arb_pair()) {
        let mut patch: Patch<K, B, u32> = Patch::new(CAP, 0).unwrap();
        let k = keys(a, b);
        if patch.insert(&k, 1).is_ok() {
            prop_assert!(patch.remove(&k).is_some());
            prop_assert_eq!(patch.search(&k), None);
            prop_assert_eq!(patch.remove(&k), None);
        }
    }

    #[test]
    fn p7_round_trip_fill_drain(pairs in prop::collection::vec(arb_pair(), 0..20)) {
        let mut patch: Patch<K, B, u32> = Patch::new(CAP, 0).unwrap();
        let mut inserted = Vec::new();
        let mut seen = HashSet::new();
        for (a, b) in pairs {
            if seen.insert((a, b)) && patch.insert(&keys(a, b), 1).is_ok() {
                inserted.push((a, b));
            }
        }
        for (a, b) in inserted {
            prop_assert!(patch.remove(&keys(a, b)).is_some());
        }
        prop_assert_eq!(patch.count(), 0);
        prop_assert_eq!(patch.verify(), Ok(()));
        for k in 0..K {
            prop_assert_eq!(patch.enumerate(k).unwrap().len(), 0);
        }
    }

    #[test]
    fn p9_enumerate_is_sorted(pairs in prop::collection::vec(arb_pair(), 0..20)) {
        // Payload carries key position 0's value, so enumerate(0)'s order
        // can be checked directly against the payloads it yields.
        let mut patch: Patch<K, B, u32> = Patch::new(CAP, 0).unwrap();
        let mut seen = HashSet::new();
        for (a, b) in pairs {
            if seen.insert((a, b)) {
                let _ = patch.insert(&keys(a, b), a as u32);
            }
        }
        let refs = patch.enumerate(0).unwrap();
        let values: Vec<u32> = refs.iter().map(|r| *patch.get(*r)).collect();
        let mut sorted = values.clone();
        sorted.sort_unstable();
        prop_assert_eq!(values, sorted);
        prop_assert_eq!(refs.len() as u32, patch.count());
    }

    #[test]
    fn p10_verifier_soundness(pairs in prop::collection::vec((arb_pair(), any::<bool>()), 0..30)) {
        let mut patch: Patch<K, B, u32> = Patch::new(CAP, 0).unwrap();
        for ((a, b), do_remove) in pairs {
            let k = keys(a, b);
            if do_remove {
                let _ = patch.remove(&k);
            } else {
                let _ = patch.insert(&k, 1);
            }
            prop_assert_eq!(patch.verify(), Ok(()));
        }
    }
}
