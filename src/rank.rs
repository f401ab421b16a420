//! Order statistics over the subtree sizes stored in every node.
//!
//! Both queries follow a single root-to-leaf path, so they take _O(log(n))_ time.

use core::{
    borrow::Borrow,
    cmp::Ordering,
    ops::{Bound, RangeBounds},
    pin::Pin,
};

use crate::{balance::size, links, AvlTree, Iter, Link, Links, OutOfRange, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns the `index`-th smallest item, counting from 1.
    ///
    /// Fails with [`OutOfRange`] if `index` is 0 or greater than the number of items.
    pub fn select(&self, index: usize) -> Result<Pin<&T>, OutOfRange> {
        index
            .checked_sub(1)
            .and_then(|i| self.select_raw(i))
            .map(|node| unsafe { Pin::new_unchecked(node.as_ref()) })
            .ok_or(OutOfRange {
                index,
                len: self.len(),
            })
    }

    /// Returns the number of items whose key is strictly less than `key`.
    ///
    /// `key` need not be present in the tree. The result is in `0..=self.len()`.
    pub fn rank<Q>(&self, key: &Q) -> usize
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.count_below(key, false)
    }

    /// Returns the item with the least key strictly greater than `key`.
    pub fn successor_of<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.select_raw(self.count_below(key, true))?;
        Some(unsafe { Pin::new_unchecked(node.as_ref()) })
    }

    /// Returns the item with the greatest key strictly less than `key`.
    pub fn predecessor_of<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let below = self.count_below(key, false).checked_sub(1)?;
        let node = self.select_raw(below)?;
        Some(unsafe { Pin::new_unchecked(node.as_ref()) })
    }

    /// Returns an iterator over the items whose keys fall within `range`, in ascending order.
    ///
    /// The iterator's length is known up front: it is computed from two rank queries, and its
    /// ends are located with two selects.
    pub fn range<Q, R>(&self, range: R) -> Iter<'_, T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
        R: RangeBounds<Q>,
    {
        let start = match range.start_bound() {
            Bound::Included(key) => self.count_below(key, false),
            Bound::Excluded(key) => self.count_below(key, true),
            Bound::Unbounded => 0,
        };

        let end = match range.end_bound() {
            Bound::Included(key) => self.count_below(key, true),
            Bound::Excluded(key) => self.count_below(key, false),
            Bound::Unbounded => self.len(),
        };

        if start >= end {
            return Iter::between(None, None, 0);
        }

        Iter::between(self.select_raw(start), self.select_raw(end - 1), end - start)
    }

    // Returns the node with `index` smaller nodes, counting from 0.
    pub(crate) fn select_raw(&self, index: usize) -> Link<T> {
        let mut opt_cur = self.root();
        let mut index = index;

        while let Some(cur) = opt_cur {
            unsafe {
                let left = links(cur).left();
                let left_size = size(left);

                match index.cmp(&left_size) {
                    Ordering::Less => opt_cur = left,
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => {
                        index -= left_size + 1;
                        opt_cur = links(cur).right();
                    }
                }
            }
        }

        None
    }

    // Counts the keys less than `key`, or less than or equal to it if `inclusive`.
    pub(crate) fn count_below<Q>(&self, key: &Q, inclusive: bool) -> usize
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root();
        let mut count = 0;

        while let Some(cur) = opt_cur {
            unsafe {
                let counts_cur = match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => false,
                    Ordering::Equal => inclusive,
                    Ordering::Greater => true,
                };

                if counts_cur {
                    // `cur` and its whole left subtree are below `key`.
                    count += size(links(cur).left()) + 1;
                    opt_cur = links(cur).right();
                } else {
                    opt_cur = links(cur).left();
                }
            }
        }

        count
    }
}
