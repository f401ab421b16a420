//! Joining trees around a pivot and splitting them around a key.
//!
//! Both work directly on detached subtrees with the rotation primitives, instead of re-inserting
//! items one at a time.

use core::{borrow::Borrow, cmp::Ordering, ptr::NonNull};

use tracing::trace;

use crate::{
    balance::{height, rebalance_to_root, update_metrics},
    link_child, links, AvlTree, Dir, Link, Links, TreeNode,
};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Joins `left`, `pivot` and `right` into a single tree.
    ///
    /// Every key in `left` must be less than the pivot's key, and every key in `right` greater.
    /// Both trees are consumed: their items move into the returned tree.
    ///
    /// This operation completes in _O(|h(left) - h(right)| + 1)_ time.
    ///
    /// # Panics
    ///
    /// With debug assertions enabled, panics if the keys are not ordered as described above.
    /// Without them the order is not checked, and violating it leaves the returned tree out of
    /// search order.
    pub fn join(mut left: Self, pivot: T::Handle, mut right: Self) -> Self {
        let pivot = T::into_ptr(pivot);

        if cfg!(debug_assertions) {
            let ordered = unsafe {
                let key = pivot.as_ref().key();
                left.last_raw().map_or(true, |max| max.as_ref().key() < key)
                    && right.first_raw().map_or(true, |min| key < min.as_ref().key())
            };

            if !ordered {
                drop(unsafe { T::from_ptr(pivot) });
                panic!("`join` requires left < pivot < right");
            }
        }

        let root = unsafe { join_raw(left.take_root(), pivot, right.take_root()) };
        unsafe { AvlTree::from_root(root) }
    }

    /// Splits the tree into the items with keys less than `key` and those with keys greater than
    /// `key`.
    ///
    /// The item with key equal to `key`, if any, is returned separately. The tree is consumed.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn split<Q>(mut self, key: &Q) -> (Self, Option<T::Handle>, Self)
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (left, found, right) = unsafe { split_raw(self.take_root(), key) };

        let wrap = |root: Link<T>| match root {
            Some(root) => unsafe { AvlTree::from_root(root) },
            None => AvlTree::new(),
        };

        (
            wrap(left),
            found.map(|node| unsafe { T::from_ptr(node) }),
            wrap(right),
        )
    }

    /// Moves all items of `other` into `self`, leaving `other` empty.
    ///
    /// Every key in `self` must be less than every key in `other`. The least item of `other` is
    /// taken out as the pivot of a [`join`](AvlTree::join).
    pub fn append(&mut self, other: &mut Self) {
        let Some(pivot) = other.pop_first() else {
            return;
        };

        let left = AvlTree {
            root: self.take_root(),
        };
        let right = AvlTree {
            root: other.take_root(),
        };

        *self = AvlTree::join(left, pivot, right);
    }
}

// Joins two detached subtrees around a detached `pivot`, returning the root of the result.
//
// All keys under `left` must be less than the pivot's key, and all keys under `right` greater.
pub(crate) unsafe fn join_raw<T>(left: Link<T>, pivot: NonNull<T>, right: Link<T>) -> NonNull<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe {
        links(pivot).reset();

        let (left_height, right_height) = (height(left), height(right));

        match (left, right) {
            (Some(tall), _) if left_height > right_height + 1 => {
                join_into_taller(tall, pivot, right, Dir::Right)
            }

            (_, Some(tall)) if right_height > left_height + 1 => {
                join_into_taller(tall, pivot, left, Dir::Left)
            }

            _ => {
                link_child(pivot, Dir::Left, left);
                link_child(pivot, Dir::Right, right);
                update_metrics(pivot);
                pivot
            }
        }
    }
}

// Joins the short subtree into the tall one along the tall subtree's `side` spine, which is the
// side adjacent to the short subtree's keys.
unsafe fn join_into_taller<T>(
    tall: NonNull<T>,
    pivot: NonNull<T>,
    short: Link<T>,
    side: Dir,
) -> NonNull<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe {
        let short_height = height(short);

        // Descend the spine until reaching a subtree no more than one level taller than `short`.
        let mut parent = tall;
        let mut spine = links(parent).child(side);
        let mut depth = 1;

        while height(spine) > short_height + 1 {
            parent = spine.expect("a subtree taller than another cannot be empty");
            spine = links(parent).child(side);
            depth += 1;
        }

        trace!(depth, short_height, "join descended spine");

        // The pivot takes the spine subtree's place, with the short subtree on its outer side.
        link_child(pivot, !side, spine);
        link_child(pivot, side, short);
        update_metrics(pivot);
        link_child(parent, side, Some(pivot));

        // The pivot is at most two levels taller than the subtree it replaced, so the
        // ordinary single and double rotations restore the balance on the way up.
        rebalance_to_root(parent)
    }
}

// Splits the detached subtree at `node` around `key`.
//
// Returns the detached subtrees of keys less than and greater than `key`, and the detached node
// with key equal to `key` if there was one.
unsafe fn split_raw<T, Q>(node: Link<T>, key: &Q) -> (Link<T>, Link<T>, Link<T>)
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: Borrow<Q>,
    Q: Ord + ?Sized,
{
    let Some(node) = node else {
        return (None, None, None);
    };

    unsafe {
        let left = detach(links(node).left());
        let right = detach(links(node).right());

        match key.cmp(node.as_ref().key().borrow()) {
            Ordering::Equal => {
                links(node).reset();
                (left, Some(node), right)
            }

            Ordering::Less => {
                let (less, found, greater) = split_raw(left, key);
                (less, found, Some(join_raw(greater, node, right)))
            }

            Ordering::Greater => {
                let (less, found, greater) = split_raw(right, key);
                (Some(join_raw(left, node, less)), found, greater)
            }
        }
    }
}

// Clears the parent link of `node`, making it the root of a detached subtree.
#[inline]
unsafe fn detach<T>(node: Link<T>) -> Link<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    if let Some(node) = node {
        unsafe { links(node).set_parent(None) };
    }

    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TestNode;

    fn tree_of(keys: impl IntoIterator<Item = u32>) -> AvlTree<TestNode> {
        let mut tree = AvlTree::new();
        for key in keys {
            tree.insert(TestNode::new(key));
        }
        tree
    }

    fn keys(tree: &AvlTree<TestNode>) -> Vec<u32> {
        tree.iter().map(|n| n.key).collect()
    }

    #[test]
    fn join_similar_heights() {
        let joined = AvlTree::join(tree_of([1, 2, 3]), TestNode::new(4), tree_of([5, 6, 7]));

        joined.assert_invariants();
        assert_eq!(keys(&joined), [1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(joined.root().map(|r| unsafe { r.as_ref().key }), Some(4));
    }

    #[test]
    fn join_small_into_large() {
        let joined = AvlTree::join(tree_of([0]), TestNode::new(1), tree_of(2..500));

        joined.assert_invariants();
        assert_eq!(keys(&joined), (0..500).collect::<Vec<_>>());

        let joined = AvlTree::join(tree_of(0..500), TestNode::new(500), tree_of([]));

        joined.assert_invariants();
        assert_eq!(joined.len(), 501);
    }

    #[test]
    fn join_empty_trees() {
        let joined = AvlTree::join(tree_of([]), TestNode::new(7), tree_of([]));

        joined.assert_invariants();
        assert_eq!(keys(&joined), [7]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "left < pivot < right")]
    fn join_rejects_overlap() {
        let _ = AvlTree::join(tree_of([1, 5]), TestNode::new(3), tree_of([4]));
    }

    #[test]
    fn split_present_key() {
        let (less, found, greater) = tree_of(0..100).split(&40);

        less.assert_invariants();
        greater.assert_invariants();
        assert_eq!(keys(&less), (0..40).collect::<Vec<_>>());
        assert_eq!(found.map(|n| n.key), Some(40));
        assert_eq!(keys(&greater), (41..100).collect::<Vec<_>>());
    }

    #[test]
    fn split_absent_key() {
        let (less, found, greater) = tree_of((0..50).map(|k| k * 2)).split(&31);

        less.assert_invariants();
        greater.assert_invariants();
        assert!(found.is_none());
        assert_eq!(less.len(), 16);
        assert_eq!(greater.len(), 34);
        assert!(greater.iter().all(|n| n.key > 31));
    }

    #[test]
    fn split_then_join_restores_keys() {
        for pivot in 0..30 {
            let (less, found, greater) = tree_of(0..30).split(&pivot);
            let joined = AvlTree::join(less, found.expect("pivot is present"), greater);

            joined.assert_invariants();
            assert_eq!(keys(&joined), (0..30).collect::<Vec<_>>());
        }
    }

    #[test]
    fn append_disjoint() {
        let mut low = tree_of(0..10);
        let mut high = tree_of(10..300);

        low.append(&mut high);

        low.assert_invariants();
        assert!(high.is_empty());
        assert_eq!(keys(&low), (0..300).collect::<Vec<_>>());

        let mut empty = tree_of([]);
        empty.append(&mut low);
        empty.assert_invariants();
        assert_eq!(empty.len(), 300);
    }
}
