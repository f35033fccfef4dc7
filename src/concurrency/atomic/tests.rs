//! Tests for the huge atomic arrays.

use super::*;
use std::thread;

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn atomic_arrays_are_send_sync() {
    assert_send_sync::<HugeAtomicLongArray>();
    assert_send_sync::<HugeAtomicDoubleArray>();
    assert_send_sync::<HugeAtomicBitSet>();
}

#[test]
fn long_array_basic_operations() {
    let a = HugeAtomicLongArray::new(10).unwrap();
    assert_eq!(a.len(), 10);
    assert_eq!(a.get(3), 0);
    a.set(3, 5);
    assert_eq!(a.get_and_add(3, 2), 5);
    assert_eq!(a.get(3), 7);
    assert!(a.compare_and_set(3, 7, 9));
    assert!(!a.compare_and_set(3, 7, 11));
    assert_eq!(a.compare_exchange(3, 0, 1), Err(9));
    assert_eq!(a.update(3, |v| v * 2), 18);
    a.fill(-1);
    assert_eq!(a.get(9), -1);
}

#[test]
#[should_panic(expected = "out of range")]
fn long_array_rejects_out_of_range() {
    let a = HugeAtomicLongArray::new(2).unwrap();
    a.get(2);
}

#[test]
fn double_array_cas_compares_bits() {
    let a = HugeAtomicDoubleArray::new(4).unwrap();
    a.set(0, 1.5);
    assert!(a.compare_and_set(0, 1.5, 2.5));
    assert_eq!(a.get(0), 2.5);
    assert_eq!(a.compare_exchange(0, 1.5, 0.0), Err(2.5));
    a.add_to(1, 0.25);
    a.add_to(1, 0.25);
    assert_eq!(a.get(1), 0.5);
    assert_eq!(a.get_and_add(1, 1.0), 0.5);
    assert_eq!(a.update(2, |v| v.max(3.0)), 3.0);
    a.fill(f64::INFINITY);
    assert_eq!(a.get(3), f64::INFINITY);
}

#[test]
fn concurrent_add_to_loses_no_updates() {
    const THREADS: u64 = 8;
    const ADDS: u64 = 10_000;
    let longs = HugeAtomicLongArray::new(4).unwrap();
    let doubles = HugeAtomicDoubleArray::new(4).unwrap();

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ADDS {
                    longs.add_to(1, 1);
                    doubles.add_to(1, 1.0);
                }
            });
        }
    });

    assert_eq!(longs.get(1), (THREADS * ADDS) as i64);
    assert_eq!(doubles.get(1), (THREADS * ADDS) as f64);
    assert_eq!(longs.get(0), 0);
}

#[test]
fn concurrent_update_with_cas_retry_computes_max() {
    let a = HugeAtomicLongArray::new(1).unwrap();
    thread::scope(|s| {
        for t in 0..4i64 {
            let a = &a;
            s.spawn(move || {
                for i in 0..1000 {
                    let candidate = i * 4 + t;
                    a.update(0, |cur| cur.max(candidate));
                }
            });
        }
    });
    assert_eq!(a.get(0), 3999);
}

#[test]
fn bitset_basic() {
    let b = HugeAtomicBitSet::new(130).unwrap();
    assert_eq!(b.len(), 130);
    assert!(!b.get(0));
    assert!(!b.get_and_set(0));
    assert!(b.get_and_set(0));
    b.set(129);
    assert!(b.get(129));
    assert_eq!(b.cardinality(), 2);
    b.clear(0);
    assert!(!b.get(0));
    b.clear_all();
    assert_eq!(b.cardinality(), 0);
}

#[test]
fn bitset_all_set_respects_partial_last_word() {
    let b = HugeAtomicBitSet::new(70).unwrap();
    assert!(!b.all_set());
    for i in 0..69 {
        b.set(i);
    }
    assert!(!b.all_set());
    b.set(69);
    assert!(b.all_set());

    let empty = HugeAtomicBitSet::new(0).unwrap();
    assert!(empty.all_set());

    let aligned = HugeAtomicBitSet::new(128).unwrap();
    aligned.set_range(0, 128);
    assert!(aligned.all_set());
    assert_eq!(aligned.cardinality(), 128);
}

#[test]
fn bitset_set_range() {
    let b = HugeAtomicBitSet::new(300).unwrap();
    b.set_range(3, 5);
    assert_eq!(b.cardinality(), 2);
    assert!(b.get(3) && b.get(4) && !b.get(5));
    b.clear_all();
    b.set_range(60, 200);
    assert_eq!(b.cardinality(), 140);
    assert!(!b.get(59) && b.get(60) && b.get(199) && !b.get(200));
    b.set_range(7, 7);
    assert_eq!(b.cardinality(), 140);
}

#[test]
fn bitset_concurrent_neighbor_bits_do_not_clobber() {
    let b = HugeAtomicBitSet::new(64 * 4).unwrap();
    thread::scope(|s| {
        for t in 0..4u64 {
            let b = &b;
            s.spawn(move || {
                // interleaved bits: every thread writes into every word
                for i in (t..256).step_by(4) {
                    b.set(i);
                }
            });
        }
    });
    assert!(b.all_set());
}
