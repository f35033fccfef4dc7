use pregel_engine::collections::huge::PAGE_SIZE_IN_BYTES;
use pregel_engine::{HugeArray, HugeAtomicDoubleArray, HugeAtomicLongArray, MemoryBudget, PageLayout};
use proptest::prelude::*;

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn shared_structures_are_send_sync() {
    assert_send_sync::<HugeArray<u64>>();
    assert_send_sync::<HugeAtomicLongArray>();
    assert_send_sync::<HugeAtomicDoubleArray>();
    assert_send_sync::<pregel_engine::HugeAtomicBitSet>();
    assert_send_sync::<pregel_engine::TerminationFlag>();
}

#[test]
fn page_boundaries_with_default_layout() {
    let page = PageLayout::of::<u32>().page_size();
    assert_eq!(page, (PAGE_SIZE_IN_BYTES / 4) as u64);

    let size = 3 * page + 17;
    let mut array: HugeArray<u32> = HugeArray::new(size).unwrap();
    assert_eq!(array.page_count(), 4);

    let boundaries: Vec<u64> = (1..=3).flat_map(|k| [k * page - 1, k * page]).chain([0, size - 1]).collect();
    for &i in &boundaries {
        array.set(i, i as u32 ^ 0xA5A5);
    }
    for &i in &boundaries {
        assert_eq!(*array.get(i), i as u32 ^ 0xA5A5);
    }
    assert!(array.try_get(size).is_err());
}

#[test]
fn cursor_reconstructs_global_indices() {
    let page = PageLayout::of::<u64>().page_size();
    let size = 2 * page + 5;
    let array = HugeArray::from_fn(size, |i| i).unwrap();
    let mut cursor = array.cursor_range(page - 3, size - 1);
    let mut seen = 0;
    while cursor.next() {
        for (local, &v) in cursor.slice().iter().enumerate() {
            assert_eq!(v, cursor.base() + (cursor.offset() + local) as u64);
        }
        seen += cursor.slice().len() as u64;
    }
    assert_eq!(seen, size - 1 - (page - 3));
    assert!(!cursor.next());
}

#[test]
fn budget_rejects_oversized_arrays() {
    let err = HugeArray::<u64>::with_budget(1 << 20, &MemoryBudget::bytes(1 << 20)).unwrap_err();
    assert!(matches!(err, pregel_engine::Error::Allocation { .. }));
    assert!(HugeArray::<u8>::with_budget(1 << 19, &MemoryBudget::bytes(1 << 20)).is_ok());
}

#[test]
fn concurrent_add_to_loses_no_updates() {
    const THREADS: i64 = 8;
    const ADDS: i64 = 25_000;
    let longs = HugeAtomicLongArray::new(4).unwrap();
    let doubles = HugeAtomicDoubleArray::new(4).unwrap();
    std::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ADDS {
                    longs.add_to(2, 1);
                    doubles.add_to(2, 1.0);
                }
            });
        }
    });
    assert_eq!(longs.get(2), THREADS * ADDS);
    assert_eq!(doubles.get(2), (THREADS * ADDS) as f64);
    assert_eq!(longs.get(1), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn set_then_get_round_trips(size in 1u64..40_000, picks in proptest::collection::vec(any::<u64>(), 1..64)) {
        let mut array: HugeArray<u64> = HugeArray::new(size).unwrap();
        for &p in &picks {
            array.set(p % size, p);
        }
        for &p in picks.iter().rev() {
            // the last write to an index wins
            let i = p % size;
            let last = picks.iter().rev().find(|&&q| q % size == i).copied();
            prop_assert_eq!(Some(*array.get(i)), last);
        }
    }
}
