use core::{borrow::Borrow, fmt, ops::RangeBounds};

use crate::{map::MapNode, AvlMap, InvariantViolation, OutOfRange};

/// An ordered set based on an AVL tree with order statistics.
///
/// This is the plain-keyed form of [`AvlMap`]. It reports the outcome of insertions and deletions
/// as [`Insertion`] and [`Removal`] values rather than through `Option`s.
pub struct AvlSet<K: Ord + fmt::Debug> {
    pub(crate) map: AvlMap<K, ()>,
}

/// The outcome of [`AvlSet::insert`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub enum Insertion {
    /// The key was added.
    Inserted,
    /// An equal key was already in the set, which is unchanged.
    AlreadyPresent,
}

/// The outcome of [`AvlSet::delete`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub enum Removal {
    /// The key was removed.
    Deleted,
    /// The key was not in the set, which is unchanged.
    NotFound,
}

impl<K: Ord + fmt::Debug> AvlSet<K> {
    /// Creates a new, empty `AvlSet`.
    pub const fn new() -> Self {
        AvlSet { map: AvlMap::new() }
    }

    /// Returns `true` if the set contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the number of elements in the set.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns the height of the underlying tree: 0 when empty, 1 for a single key.
    pub fn height(&self) -> usize {
        self.map.height()
    }

    /// Adds `key` to the set, unless an equal key is already present.
    pub fn insert(&mut self, key: K) -> Insertion {
        match self.map.tree.insert(MapNode::new(key, ())) {
            None => Insertion::Inserted,
            Some(_) => Insertion::AlreadyPresent,
        }
    }

    /// Removes `key` from the set.
    pub fn delete<Q>(&mut self, key: &Q) -> Removal
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.map.remove(key) {
            Some(()) => Removal::Deleted,
            None => Removal::NotFound,
        }
    }

    /// Removes `key` from the set and returns the stored key, if it was present.
    pub fn take<Q>(&mut self, key: &Q) -> Option<K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.map.remove_entry(key).map(|(key, ())| key)
    }

    /// Returns `true` if the set contains `key`.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Returns the stored key equal to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.map.get_key_value(key).map(|(key, _)| key)
    }

    /// Returns the minimum key of the set.
    pub fn first(&self) -> Option<&K> {
        self.map.first_key_value().map(|(key, _)| key)
    }

    /// Returns the maximum key of the set.
    pub fn last(&self) -> Option<&K> {
        self.map.last_key_value().map(|(key, _)| key)
    }

    /// Removes and returns the minimum key of the set.
    pub fn pop_first(&mut self) -> Option<K> {
        self.map.pop_first().map(|(key, ())| key)
    }

    /// Removes and returns the maximum key of the set.
    pub fn pop_last(&mut self) -> Option<K> {
        self.map.pop_last().map(|(key, ())| key)
    }

    /// Returns the least key strictly greater than `key`, which need not be in the set.
    pub fn successor<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.map.next_after(key).map(|(key, _)| key)
    }

    /// Returns the greatest key strictly less than `key`, which need not be in the set.
    pub fn predecessor<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.map.next_before(key).map(|(key, _)| key)
    }

    /// Returns the `index`-th smallest key, counting from 1.
    ///
    /// Fails with [`OutOfRange`] unless `1 <= index <= self.len()`.
    pub fn select(&self, index: usize) -> Result<&K, OutOfRange> {
        self.map.select(index).map(|(key, _)| key)
    }

    /// Returns the number of keys in the set strictly less than `key`.
    pub fn rank<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.map.rank(key)
    }

    /// Returns an iterator over the keys of the set, in ascending order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator + Clone + '_ {
        self.map.keys()
    }

    /// Returns an iterator over the keys within `range`, in ascending order.
    pub fn range<Q, R>(
        &self,
        range: R,
    ) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator + Clone + '_
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
        R: RangeBounds<Q>,
    {
        self.map.range(range).map(|(key, _)| key)
    }

    /// Joins `left`, `pivot` and `right` into one set.
    ///
    /// Every key in `left` must be less than `pivot`, and every key in `right` greater.
    ///
    /// # Panics
    ///
    /// With debug assertions enabled, panics if the keys are not ordered as described above.
    pub fn join(left: Self, pivot: K, right: Self) -> Self {
        AvlSet {
            map: AvlMap::join(left.map, pivot, (), right.map),
        }
    }

    /// Splits the set into the keys less than `key` and the keys greater than `key`.
    ///
    /// The returned flag tells whether `key` itself was in the set. It is in neither half.
    pub fn split<Q>(self, key: &Q) -> (Self, Self, bool)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (left, found, right) = self.map.split(key);

        (AvlSet { map: left }, AvlSet { map: right }, found.is_some())
    }

    /// Moves all keys of `other` into `self`, leaving `other` empty.
    ///
    /// # Panics
    ///
    /// With debug assertions enabled, panics unless every key in `self` is less than every key in
    /// `other`.
    pub fn append(&mut self, other: &mut Self) {
        self.map.append(&mut other.map);
    }

    /// Clears the set, removing all elements.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Returns `true` if every invariant of the underlying tree holds.
    pub fn validate(&self) -> bool {
        self.map.validate()
    }

    /// Checks every invariant of the underlying tree, returning the first violation found.
    pub fn check(&self) -> Result<(), InvariantViolation> {
        self.map.check()
    }

    /// Renders the shape of the set as a preorder walk, writing `#` for every missing child.
    ///
    /// Two sets render identically exactly when their trees have the same shape and keys.
    pub fn preorder_with_nulls(&self) -> String
    where
        K: fmt::Display,
    {
        self.map.tree.preorder_with_nulls()
    }

    /// Writes the tree in Graphviz `dot` format, labelling nodes with key, height and size.
    pub fn dotgraph(&self, out: &mut impl fmt::Write) -> fmt::Result
    where
        K: fmt::Display,
    {
        self.map.tree.dotgraph(out)
    }
}

impl<K: Ord + fmt::Debug> Default for AvlSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug> fmt::Debug for AvlSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: Ord + fmt::Debug> PartialEq for AvlSet<K> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Ord + fmt::Debug> Eq for AvlSet<K> {}

impl<K: Ord + fmt::Debug> Extend<K> for AvlSet<K> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            let _ = self.insert(key);
        }
    }
}

impl<K: Ord + fmt::Debug> FromIterator<K> for AvlSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = AvlSet::new();
        set.extend(iter);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_height(len: usize) -> usize {
        (1.4405 * ((len + 2) as f64).log2() - 0.3277).floor() as usize
    }

    #[test_log::test]
    fn insert_reports_outcome() {
        let mut set = AvlSet::new();

        for key in [5, 3, 8, 1, 4, 7, 9] {
            assert_eq!(set.insert(key), Insertion::Inserted);
            assert!(set.validate(), "invalid after inserting {key}");
        }

        assert_eq!(set.insert(4), Insertion::AlreadyPresent);
        assert_eq!(set.len(), 7);
        assert!(set.iter().copied().eq([1, 3, 4, 5, 7, 8, 9]));
        assert_eq!(set.select(3), Ok(&4));
        assert_eq!(set.rank(&6), 4);
    }

    #[test_log::test]
    fn delete_root_with_two_children() {
        let mut set: AvlSet<i32> = [5, 3, 8, 1, 4, 7, 9].into_iter().collect();
        assert_eq!(set.preorder_with_nulls(), "5 3 1 # # 4 # # 8 7 # # 9 # #");

        assert_eq!(set.delete(&5), Removal::Deleted);
        assert_eq!(set.delete(&5), Removal::NotFound);

        set.check().expect("tree should stay valid");
        assert!(set.iter().copied().eq([1, 3, 4, 7, 8, 9]));
        assert_eq!(set.preorder_with_nulls(), "7 3 1 # # 4 # # 8 # 9 # #");
    }

    #[test]
    fn select_out_of_range() {
        let set: AvlSet<i32> = (1..=10).collect();

        assert_eq!(set.select(0), Err(OutOfRange { index: 0, len: 10 }));
        assert_eq!(set.select(11), Err(OutOfRange { index: 11, len: 10 }));
        assert_eq!(set.select(10), Ok(&10));
    }

    #[test]
    fn sequential_inserts_stay_shallow() {
        let set: AvlSet<u32> = (0..1000).collect();

        assert!(set.validate());
        assert_eq!(set.len(), 1000);
        assert!(set.height() <= max_height(1000), "height {}", set.height());
        assert!(set.height() >= 10);
    }

    #[test]
    fn neighbours() {
        let set: AvlSet<i32> = [10, 20, 30].into_iter().collect();

        assert_eq!(set.successor(&10), Some(&20));
        assert_eq!(set.successor(&25), Some(&30));
        assert_eq!(set.successor(&30), None);
        assert_eq!(set.predecessor(&10), None);
        assert_eq!(set.predecessor(&11), Some(&10));
    }

    #[test]
    fn split_reports_membership() {
        let set: AvlSet<i32> = (0..40).collect();

        let (left, right, found) = set.split(&17);
        assert!(found);
        assert!(left.iter().copied().eq(0..17));
        assert!(right.iter().copied().eq(18..40));

        let (left, right, found) = AvlSet::join(left, 17, right).split(&100);
        assert!(!found);
        assert_eq!(left.len(), 40);
        assert!(right.is_empty());
    }

    #[test]
    fn strings_borrow_as_str() {
        let mut set: AvlSet<String> = ["pear", "apple", "fig"].map(String::from).into_iter().collect();

        assert!(set.contains("fig"));
        assert_eq!(set.first().map(String::as_str), Some("apple"));
        assert_eq!(set.take("pear").as_deref(), Some("pear"));
        assert_eq!(set.delete("pear"), Removal::NotFound);
        assert_eq!(format!("{set:?}"), r#"{"apple", "fig"}"#);
    }
}
