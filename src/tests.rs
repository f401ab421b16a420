use std::{collections::BTreeSet, ops::Range};

use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

fn insert_find_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(Box::new(TestNode {
            links: Links::new(),
            key,
        }));
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }

    assert_eq!(tree.len(), keys.len());
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

#[test]
fn four_elems_find() {
    for_each_permutation(4, insert_find_all);
}

#[test]
fn six_elems_find() {
    for_each_permutation(6, insert_find_all);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.remove(key).expect("item not found");
        assert_eq!(node.key, *key);
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        let node = tree.get_raw(key).expect("item not found");
        unsafe { tree.remove_at(node) };
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    for_each_permutation(3, insert_remove_all);
}

#[test]
fn remove_four() {
    for_each_permutation(4, insert_remove_all);
}

#[test]
fn remove_six() {
    for_each_permutation(6, insert_remove_all);
}

// Calls `f` with every permutation of `0..n`, generated by Heap's algorithm.
fn for_each_permutation(n: u32, mut f: impl FnMut(&[u32])) {
    fn heap(k: usize, keys: &mut [u32], f: &mut dyn FnMut(&[u32])) {
        if k <= 1 {
            f(keys);
            return;
        }

        for i in 0..k - 1 {
            heap(k - 1, keys, f);
            if k % 2 == 0 {
                keys.swap(i, k - 1);
            } else {
                keys.swap(0, k - 1);
            }
        }

        heap(k - 1, keys, f);
    }

    let mut keys: Vec<u32> = (0..n).collect();
    heap(keys.len(), &mut keys, &mut f);
}

#[test]
fn remove_absent_key_is_reported() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    assert!(tree.remove(&3).is_none());

    tree.insert(TestNode::new(1));
    tree.insert(TestNode::new(5));

    assert!(tree.remove(&3).is_none());
    assert_eq!(tree.len(), 2);
    tree.assert_invariants();
}

#[test]
fn duplicate_insert_returns_item() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    assert!(tree.insert(TestNode::new(7)).is_none());

    let rejected = tree.insert(TestNode::new(7)).expect("duplicate is handed back");
    assert_eq!(rejected.key, 7);
    assert_eq!(tree.len(), 1);
}

#[test_log::test]
fn walk_from_minimum_with_successor() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [50, 20, 80, 10, 30, 70, 90, 25, 35, 75] {
        tree.insert(TestNode::new(key));
    }

    let mut seen = Vec::new();
    let mut cursor = tree.cursor_first();
    while let Some(node) = cursor.get() {
        seen.push(node.key);
        cursor.move_next();
    }

    assert_eq!(seen, [10, 20, 25, 30, 35, 50, 70, 75, 80, 90]);
}

#[test]
fn clear_releases_everything() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in 0..257 {
        tree.insert(TestNode::new(key));
    }

    tree.clear();
    assert!(tree.is_empty());
    assert_eq!(tree.height(), 0);

    // The tree is still usable.
    tree.insert(TestNode::new(1));
    assert_eq!(tree.len(), 1);
}

#[test]
fn debug_lists_keys() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [3, 1, 2] {
        tree.insert(TestNode::new(key));
    }

    assert_eq!(format!("{tree:?}"), "{1, 2, 3}");
}

// By the AVL height bound.
fn max_height(len: usize) -> usize {
    (1.4405 * ((len + 2) as f64).log2() - 0.3277).floor() as usize
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn cursor_equivalence(
        values in proptest::collection::vec(any::<u32>(), 0..100),
        ops in proptest::collection::vec(model::cursor_op_strategy(), FUZZ_RANGE),
    ) {
        model::run_cursor_equivalence(values, ops);
    }
}

proptest::proptest! {
    #[test]
    fn select_and_rank_agree_with_sorted_keys(
        keys in proptest::collection::btree_set(any::<i32>(), 0..300),
        probes in proptest::collection::vec(any::<i32>(), 0..50),
    ) {
        let set: AvlSet<i32> = keys.iter().copied().collect();
        let sorted: Vec<i32> = keys.iter().copied().collect();

        for (i, key) in sorted.iter().enumerate() {
            prop_assert_eq!(set.select(i + 1), Ok(key));
            prop_assert_eq!(set.rank(key), i);
        }

        prop_assert!(set.select(0).is_err());
        prop_assert!(set.select(sorted.len() + 1).is_err());

        for probe in probes {
            prop_assert_eq!(set.rank(&probe), sorted.partition_point(|&k| k < probe));
        }
    }

    #[test]
    fn successor_walk_visits_sorted_keys(keys in proptest::collection::vec(any::<u32>(), 0..300)) {
        let mut tree: AvlTree<TestNode> = AvlTree::new();
        for &key in &keys {
            tree.insert(TestNode::new(key));
        }

        let expected: BTreeSet<u32> = keys.into_iter().collect();

        let mut forward = Vec::new();
        let mut cursor = tree.cursor_first();
        while let Some(node) = cursor.get() {
            forward.push(node.key);
            cursor.move_next();
        }
        prop_assert!(forward.iter().eq(expected.iter()));

        let mut backward = Vec::new();
        let mut cursor = tree.cursor_last();
        while let Some(node) = cursor.get() {
            backward.push(node.key);
            cursor.move_prev();
        }
        prop_assert!(backward.iter().eq(expected.iter().rev()));
    }

    #[test]
    fn split_then_join_keeps_key_set(
        keys in proptest::collection::btree_set(0u32..10_000, 1..300),
        pick in any::<proptest::sample::Index>(),
    ) {
        let set: AvlSet<u32> = keys.iter().copied().collect();
        let sorted: Vec<u32> = keys.iter().copied().collect();
        let pivot = *pick.get(&sorted);

        let (left, right, found) = set.split(&pivot);
        prop_assert!(found);
        prop_assert!(left.validate());
        prop_assert!(right.validate());
        prop_assert!(left.iter().all(|&k| k < pivot));
        prop_assert!(right.iter().all(|&k| k > pivot));

        let joined = AvlSet::join(left, pivot, right);
        prop_assert!(joined.validate());
        prop_assert!(joined.iter().eq(keys.iter()));
    }

    #[test]
    fn insert_delete_keeps_invariants(
        inserts in proptest::collection::vec(0u16..512, 0..400),
        deletes in proptest::collection::vec(0u16..512, 0..400),
    ) {
        let mut set = AvlSet::new();

        for key in inserts {
            let _ = set.insert(key);
            prop_assert_eq!(set.check(), Ok(()));
        }

        for key in deletes {
            let _ = set.delete(&key);
            prop_assert_eq!(set.check(), Ok(()));
        }
    }

    #[test]
    fn height_within_avl_bound(keys in proptest::collection::vec(any::<u32>(), 0..2000)) {
        let set: AvlSet<u32> = keys.into_iter().collect();
        prop_assert!(set.height() <= max_height(set.len()));
    }

    #[test]
    fn serialization_preserves_shape(keys in proptest::collection::vec(any::<i32>(), 0..300)) {
        let set: AvlSet<i32> = keys.into_iter().collect();
        let bytes = set.to_bytes();
        prop_assert_eq!(bytes.len(), HEADER_LEN + RECORD_LEN * set.len());

        let decoded = AvlSet::from_bytes(&bytes).expect("round trip");
        prop_assert!(decoded.validate());
        prop_assert_eq!(decoded.preorder_with_nulls(), set.preorder_with_nulls());
        prop_assert_eq!(decoded.to_bytes(), bytes);
    }

    #[test]
    fn decoding_garbage_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..200)) {
        if let Ok(set) = AvlSet::from_bytes(&bytes) {
            prop_assert!(set.validate());
        }
    }
}
