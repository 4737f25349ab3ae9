use criterion::{black_box, criterion_group, criterion_main, Criterion};

use patchpool::patch::{KeySlot, Patch};

const CAP: usize = 10_000;
const K: usize = 3;
const B: usize = 8;

fn keys_for(n: u64) -> [KeySlot<B>; K] {
    std::array::from_fn(|k| {
        let mut bytes = [0u8; B];
        bytes[..8].copy_from_slice(&(n.wrapping_mul(k as u64 + 1)).to_be_bytes());
        KeySlot::used(bytes)
    })
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("patch insert 10000", |b| {
        b.iter(|| {
            let mut patch = Patch::<K, B, u64>::new(CAP, 0).unwrap();
            for n in 0..CAP as u64 {
                patch.insert(black_box(&keys_for(n)), n).unwrap();
            }
            patch
        })
    });

    c.bench_function("patch search 10000", |b| {
        let mut patch = Patch::<K, B, u64>::new(CAP, 0).unwrap();
        for n in 0..CAP as u64 {
            patch.insert(&keys_for(n), n).unwrap();
        }
        b.iter(|| {
            for n in 0..CAP as u64 {
                black_box(patch.search(black_box(&keys_for(n))));
            }
        })
    });

    c.bench_function("patch remove-then-reinsert 10000", |b| {
        let mut patch = Patch::<K, B, u64>::new(CAP, 0).unwrap();
        for n in 0..CAP as u64 {
            patch.insert(&keys_for(n), n).unwrap();
        }
        b.iter(|| {
            for n in 0..CAP as u64 {
                black_box(patch.remove(black_box(&keys_for(n))));
            }
            for n in 0..CAP as u64 {
                patch.insert(black_box(&keys_for(n)), n).unwrap();
            }
        })
    });

    c.bench_function("patch enumerate 10000", |b| {
        let mut patch = Patch::<K, B, u64>::new(CAP, 0).unwrap();
        for n in 0..CAP as u64 {
            patch.insert(&keys_for(n), n).unwrap();
        }
        b.iter(|| black_box(patch.enumerate(black_box(0)).unwrap()))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
