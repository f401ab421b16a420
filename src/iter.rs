use core::{iter::FusedIterator, marker::PhantomData};

use crate::{
    cursor::{predecessor, successor},
    AvlTree, Link, Links, TreeNode,
};

/// An iterator over a contiguous run of items of an [`AvlTree`], in ascending key order.
///
/// Each step follows parent links to the in-order neighbour, so iteration needs no stack. A full
/// traversal takes _O(n)_ time overall.
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    front: Link<T>,
    back: Link<T>,
    len: usize,
    phantom: PhantomData<&'tree AvlTree<T>>,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree AvlTree<T>) -> Self {
        Iter {
            front: tree.first_raw(),
            back: tree.last_raw(),
            len: tree.len(),
            phantom: PhantomData,
        }
    }

    // An iterator over the `len` items from `front` to `back` inclusive.
    pub(crate) fn between(front: Link<T>, back: Link<T>, len: usize) -> Self {
        debug_assert_eq!(len == 0, front.is_none());

        Iter {
            front,
            back,
            len,
            phantom: PhantomData,
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let cur = self.front?;
        self.len -= 1;
        self.front = unsafe { successor(cur) };

        Some(unsafe { cur.as_ref() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T: TreeNode<Links<T>> + ?Sized> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let cur = self.back?;
        self.len -= 1;
        self.back = unsafe { predecessor(cur) };

        Some(unsafe { cur.as_ref() })
    }
}

impl<T: TreeNode<Links<T>> + ?Sized> ExactSizeIterator for Iter<'_, T> {}

impl<T: TreeNode<Links<T>> + ?Sized> FusedIterator for Iter<'_, T> {}

impl<T: TreeNode<Links<T>> + ?Sized> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Iter {
            front: self.front,
            back: self.back,
            len: self.len,
            phantom: PhantomData,
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> IntoIterator for &'tree AvlTree<T> {
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::{model::TestNode, AvlTree};

    #[test]
    fn iterates_both_ends() {
        let mut tree: AvlTree<TestNode> = AvlTree::new();
        for key in [4, 2, 6, 1, 3, 5, 7] {
            tree.insert(TestNode::new(key));
        }

        let mut iter = tree.iter();
        assert_eq!(iter.len(), 7);
        assert_eq!(iter.next().map(|n| n.key), Some(1));
        assert_eq!(iter.next_back().map(|n| n.key), Some(7));
        assert_eq!(iter.len(), 5);

        let middle: Vec<u32> = iter.map(|n| n.key).collect();
        assert_eq!(middle, [2, 3, 4, 5, 6]);

        let reversed: Vec<u32> = tree.iter().rev().map(|n| n.key).collect();
        assert_eq!(reversed, [7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn ends_meet_without_overlap() {
        let mut tree: AvlTree<TestNode> = AvlTree::new();
        for key in 0..10 {
            tree.insert(TestNode::new(key));
        }

        let mut iter = tree.iter();
        let mut seen = Vec::new();
        loop {
            match (iter.next(), iter.next_back()) {
                (Some(a), Some(b)) => {
                    seen.push(a.key);
                    seen.push(b.key);
                }
                (Some(a), None) => seen.push(a.key),
                (None, _) => break,
            }
        }

        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn empty_tree_yields_nothing() {
        let tree: AvlTree<TestNode> = AvlTree::new();
        assert_eq!(tree.iter().next().map(|n| n.key), None);
        assert_eq!(tree.iter().next_back().map(|n| n.key), None);
    }
}
