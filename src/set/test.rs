use std::collections::BTreeSet;

use super::{next_prime, Set};
use crate::rng::{uniform_source, RngKind};

fn shuffled(count: u64, seed: [u64; 4]) -> Vec<u64> {
    let mut rng = uniform_source(RngKind::Xoshiro256Plus, &seed, 0);
    let mut values: Vec<u64> = (0..count).collect();
    for i in (1..values.len()).rev() {
        let j = (rng.next_u64() % (i as u64 + 1)) as usize;
        values.swap(i, j);
    }
    values
}

fn log2_bound(size: usize) -> u32 {
    2 * (usize::BITS - size.next_power_of_two().leading_zeros())
}

#[test]
fn next_prime_walks_the_lattice() {
    assert_eq!(next_prime(0), 2);
    assert_eq!(next_prime(2), 3);
    assert_eq!(next_prime(4), 5);
    assert_eq!(next_prime(24), 29);
    assert_eq!(next_prime(29), 31);
    assert_eq!(next_prime(90), 97);
}

#[test]
fn insert_contains_remove() {
    let mut set = Set::new();
    assert!(set.is_empty());

    assert!(set.insert(3u64));
    assert!(set.insert(1));
    assert!(set.insert(2));
    assert!(!set.insert(2));

    assert_eq!(set.len(), 3);
    assert!(set.contains(&1));
    assert!(!set.contains(&4));

    assert!(set.remove(&1));
    assert!(!set.remove(&1));
    assert_eq!(set.len(), 2);
    assert!(!set.contains(&1));
}

#[test]
fn matches_reference_model_under_random_ops() {
    let mut rng = uniform_source(RngKind::Xoshiro256Plus, &[7, 7, 7, 7], 1);
    let mut set = Set::new();
    let mut model = BTreeSet::new();

    for round in 0..4000 {
        let value = rng.next_u64() % 512;
        if rng.next_u64() % 3 == 0 {
            assert_eq!(set.remove(&value), model.remove(&value), "round {round}");
        } else {
            assert_eq!(set.insert(value), model.insert(value), "round {round}");
        }
        assert_eq!(set.len(), model.len());

        if round % 256 == 0 {
            set.core().check_tree_invariants().unwrap();
        }
    }

    set.core().check_tree_invariants().unwrap();
    for value in 0..512 {
        assert_eq!(set.contains(&value), model.contains(&value));
    }

    let in_order: Vec<u64> = set.iter().copied().collect();
    let expected: Vec<u64> = model.iter().copied().collect();
    assert_eq!(in_order, expected);
}

#[test]
fn iteration_is_strictly_increasing() {
    let mut set = Set::new();
    for value in shuffled(300, [9, 9, 9, 9]) {
        set.insert(value);
    }

    let values: Vec<u64> = set.iter().copied().collect();
    assert_eq!(values.len(), 300);
    assert!(values.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn insertion_order_does_not_matter() {
    let forward: Set<u64> = (0..200).collect();
    let backward: Set<u64> = (0..200).rev().collect();
    let scrambled: Set<u64> = shuffled(200, [5, 6, 7, 8]).into_iter().collect();

    let mut lists = [forward.to_list(), backward.to_list(), scrambled.to_list()];
    for list in &mut lists {
        list.sort_unstable();
    }
    assert_eq!(lists[0], lists[1]);
    assert_eq!(lists[0], lists[2]);

    assert_eq!(forward, backward);
    assert_eq!(forward, scrambled);
}

#[test]
fn adversarial_resize_keeps_tree_balanced() {
    let mut set = Set::new();
    let values = shuffled(10_000, [7, 7, 7, 7]);

    let mut checkpoint = 2;
    for value in values {
        set.insert(value);

        if set.len() == checkpoint {
            checkpoint *= 2;

            let in_order: Vec<u64> = set.iter().copied().collect();
            assert!(in_order.windows(2).all(|pair| pair[0] < pair[1]));

            set.core().check_tree_invariants().unwrap();
            let (min_depth, max_depth) = set.tree_depths();
            assert!(
                max_depth - min_depth <= log2_bound(set.len()),
                "depth spread {min_depth}..{max_depth} at size {}",
                set.len()
            );
        }
    }
    assert_eq!(set.len(), 10_000);
}

#[test]
fn removal_keeps_invariants() {
    let mut set = Set::new();
    for value in shuffled(1000, [3, 1, 4, 1]) {
        set.insert(value);
    }
    for value in shuffled(1000, [2, 7, 1, 8]) {
        if value % 2 == 0 {
            assert!(set.remove(&value));
        }
        if value % 128 == 0 {
            set.core().check_tree_invariants().unwrap();
        }
    }

    set.core().check_tree_invariants().unwrap();
    assert_eq!(set.len(), 500);
    assert!(set.iter().all(|value| value % 2 == 1));
}

#[test]
fn cursor_survives_resizes() {
    let mut set = Set::new();
    set.insert(42u64);

    let mut cursor = set.find(&42).unwrap();

    // Push the table through several growth steps.
    for value in 1000..3000 {
        set.insert(value);
    }
    assert_eq!(set.resolve(&mut cursor), Some(&42));

    for value in 1000..2000 {
        set.remove(&value);
    }
    assert_eq!(set.resolve(&mut cursor), Some(&42));

    set.remove(&42);
    assert_eq!(set.resolve(&mut cursor), None);
}

#[test]
fn cursor_advances_in_order() {
    let mut set = Set::new();
    for value in [10u64, 20, 30] {
        set.insert(value);
    }

    let mut cursor = set.find(&10).unwrap();
    assert!(set.advance(&mut cursor));
    assert_eq!(cursor.value(), &20);

    // A resize between steps must not derail the walk.
    for value in 100..400 {
        set.insert(value);
    }
    assert!(set.advance(&mut cursor));
    assert_eq!(cursor.value(), &30);
}

#[test]
fn clone_is_copy_on_write() {
    let mut original: Set<u64> = (0..10).collect();
    let shared = original.clone();

    original.insert(99);
    assert!(original.contains(&99));
    assert!(!shared.contains(&99));
    assert_eq!(shared.len(), 10);
}

#[test]
fn set_algebra() {
    let a: Set<u64> = (0..10).collect();
    let b: Set<u64> = (5..15).collect();

    let union: Vec<u64> = a.union(&b).iter().copied().collect();
    assert_eq!(union, (0..15).collect::<Vec<_>>());

    let intersection: Vec<u64> = a.intersection(&b).iter().copied().collect();
    assert_eq!(intersection, (5..10).collect::<Vec<_>>());

    let difference: Vec<u64> = a.difference(&b).iter().copied().collect();
    assert_eq!(difference, (0..5).collect::<Vec<_>>());

    let mut c = a.clone();
    c.union_with(&b);
    assert_eq!(c, a.union(&b));

    let mut d = a.clone();
    d.intersect_with(&b);
    assert_eq!(d, a.intersection(&b));

    let mut e = a.clone();
    e.subtract(&b);
    assert_eq!(e, a.difference(&b));
}

#[test]
fn cartesian_product_orders_pairs() {
    let a: Set<u64> = [2u64, 1].into_iter().collect();
    let b: Set<char> = ['y', 'x'].into_iter().collect();

    let product = a.cartesian_product(&b);
    let pairs: Vec<(u64, char)> = product.iter().cloned().collect();
    assert_eq!(pairs, vec![(1, 'x'), (1, 'y'), (2, 'x'), (2, 'y')]);
}

#[test]
fn clear_resets_to_default_table() {
    let mut set: Set<u64> = (0..100).collect();
    let grown = set.table_size();
    set.clear();

    assert!(set.is_empty());
    assert!(set.table_size() < grown);
    assert!(set.insert(1));
}

#[test]
fn reserve_rejects_too_small() {
    let mut set: Set<u64> = (0..50).collect();
    assert!(!set.reserve(10));
    assert!(set.reserve(100));
    assert_eq!(set.len(), 50);
    set.core().check_tree_invariants().unwrap();
}

#[test]
fn sets_order_and_hash_by_content() {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let a: Set<u64> = [1u64, 2].into_iter().collect();
    let b: Set<u64> = [2u64, 1].into_iter().collect();
    let c: Set<u64> = [1u64, 3].into_iter().collect();

    assert_eq!(a.cmp(&b), std::cmp::Ordering::Equal);
    assert!(a < c);
    assert!(c > b);

    let digest = |set: &Set<u64>| {
        let mut hasher = DefaultHasher::new();
        set.hash(&mut hasher);
        hasher.finish()
    };
    assert_eq!(digest(&a), digest(&b));
    assert_ne!(digest(&a), digest(&c));
}

#[test]
fn sets_nest_as_values() {
    let a: Set<u64> = [1u64, 2].into_iter().collect();
    let b: Set<u64> = [2u64, 1].into_iter().collect();
    let c: Set<u64> = [1u64, 3].into_iter().collect();

    let mut nested = Set::new();
    assert!(nested.insert(a.clone()));
    assert!(nested.insert(c.clone()));
    assert!(!nested.insert(b), "content-equal inner set is a duplicate");

    assert_eq!(nested.len(), 2);
    let in_order: Vec<Set<u64>> = nested.iter().cloned().collect();
    assert_eq!(in_order, vec![a, c]);
}

#[test]
fn seeded_hash_changes_layout_not_content() {
    let a: Set<u64> = (0..64).collect();
    let mut b = Set::with_hash_seed(0xDEAD_BEEF);
    for value in 0..64 {
        b.insert(value);
    }

    assert_eq!(a, b);
    let ordered: Vec<u64> = b.iter().copied().collect();
    assert_eq!(ordered, (0..64).collect::<Vec<_>>());
}
