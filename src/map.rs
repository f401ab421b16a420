use core::{
    borrow::Borrow,
    fmt,
    marker::PhantomPinned,
    mem,
    ops::RangeBounds,
    pin::Pin,
    ptr::{self, NonNull},
};

use cordyceps::Linked;

use crate::{AvlTree, Entry, InvariantViolation, Links, OutOfRange, TreeNode};

/// An ordered map based on an [AVL tree] with order statistics.
///
/// Every entry lives in its own heap allocation, made before the entry is linked into the tree.
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlMap<K: Ord + fmt::Debug, V> {
    pub(crate) tree: AvlTree<MapNode<K, V>>,
}

pub(crate) struct MapNode<K, V> {
    links: Links<MapNode<K, V>>,
    pub(crate) key: K,
    pub(crate) value: V,
    _unpin: PhantomPinned,
}

impl<K, V> MapNode<K, V> {
    pub(crate) fn new(key: K, value: V) -> Box<Self> {
        Box::new(MapNode {
            links: Links::new(),
            key,
            value,
            _unpin: PhantomPinned,
        })
    }

    fn into_pair(self: Box<Self>) -> (K, V) {
        let MapNode { key, value, .. } = *self;
        (key, value)
    }
}

unsafe impl<K, V> Linked<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<MapNode<K, V>>> {
        // SAFETY: a field of a non-null struct pointer is non-null.
        unsafe { NonNull::new_unchecked(ptr::addr_of_mut!((*ptr.as_ptr()).links)) }
    }
}

impl<K: Ord + fmt::Debug, V> TreeNode<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Key = K;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

// Pinning is not structural for `key` and `value`.
fn pair<K, V>(node: Pin<&MapNode<K, V>>) -> (&K, &V) {
    let node = Pin::get_ref(node);
    (&node.key, &node.value)
}

impl<K: Ord + fmt::Debug, V> AvlMap<K, V> {
    /// Creates a new, empty `AvlMap`.
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns `true` if the map contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the map.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the underlying tree: 0 when empty, 1 for a single entry.
    pub fn height(&self) -> usize {
        self.tree.height()
    }

    /// Returns `true` if the map contains a value associated with `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Returns a reference to the value associated with `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).map(|node| pair(node).1)
    }

    /// Returns the stored key and the value associated with `key`.
    #[inline]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).map(pair)
    }

    /// Returns a mutable reference to the value associated with `key`.
    #[inline]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        // SAFETY: only the value is handed out, never the links or the key.
        unsafe { self.tree.get_mut(key) }
            // SAFETY: Pinning is not structural for `node.value`.
            .map(|node| unsafe { &mut node.get_unchecked_mut().value })
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map already had a value for `key`, the value is replaced and the old one returned.
    /// The stored key is left as it was.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.tree.entry(&key) {
            Entry::Occupied(mut entry) => {
                // SAFETY: only the value is modified.
                let node = unsafe { entry.get_mut().get_unchecked_mut() };
                Some(mem::replace(&mut node.value, value))
            }

            Entry::Vacant(entry) => {
                // SAFETY: the entry was looked up with `key`.
                unsafe { entry.insert(MapNode::new(key, value)) };
                None
            }
        }
    }

    /// Removes the value associated with `key` from the map.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes the entry for `key` from the map, returning the stored key and value.
    #[inline]
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key).map(MapNode::into_pair)
    }

    /// Returns the first key-value pair in the map.
    ///
    /// The returned key is the minimum key in the map.
    #[inline]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.tree.first().map(pair)
    }

    /// Removes and returns the first key-value pair in the map.
    ///
    /// The returned key is the minimum key in the map.
    #[inline]
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        self.tree.pop_first().map(MapNode::into_pair)
    }

    /// Returns the last key-value pair in the map.
    ///
    /// The returned key is the maximum key in the map.
    #[inline]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.tree.last().map(pair)
    }

    /// Removes and returns the last key-value pair in the map.
    ///
    /// The returned key is the maximum key in the map.
    #[inline]
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        self.tree.pop_last().map(MapNode::into_pair)
    }

    /// Returns the entry with the least key strictly greater than `key`.
    ///
    /// `key` need not be present in the map.
    pub fn next_after<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.successor_of(key).map(pair)
    }

    /// Returns the entry with the greatest key strictly less than `key`.
    ///
    /// `key` need not be present in the map.
    pub fn next_before<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.predecessor_of(key).map(pair)
    }

    /// Returns the entry with the `index`-th smallest key, counting from 1.
    pub fn select(&self, index: usize) -> Result<(&K, &V), OutOfRange> {
        self.tree.select(index).map(pair)
    }

    /// Returns the number of keys in the map strictly less than `key`.
    pub fn rank<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.rank(key)
    }

    /// Returns an iterator over the entries of the map, in ascending key order.
    pub fn iter(
        &self,
    ) -> impl DoubleEndedIterator<Item = (&K, &V)> + ExactSizeIterator + Clone + '_ {
        self.tree.iter().map(|node| (&node.key, &node.value))
    }

    /// Returns an iterator over the keys of the map, in ascending order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator + Clone + '_ {
        self.tree.iter().map(|node| &node.key)
    }

    /// Returns an iterator over the entries whose keys fall within `range`, in ascending order.
    pub fn range<Q, R>(
        &self,
        range: R,
    ) -> impl DoubleEndedIterator<Item = (&K, &V)> + ExactSizeIterator + Clone + '_
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
        R: RangeBounds<Q>,
    {
        self.tree
            .range(range)
            .map(|node| (&node.key, &node.value))
    }

    /// Joins `left`, the entry `(key, value)` and `right` into a single map.
    ///
    /// Every key in `left` must be less than `key`, and every key in `right` greater. This runs in
    /// time proportional to the difference in height of the two maps.
    ///
    /// # Panics
    ///
    /// With debug assertions enabled, panics if the keys are not ordered as described above.
    pub fn join(left: Self, key: K, value: V, right: Self) -> Self {
        AvlMap {
            tree: AvlTree::join(left.tree, MapNode::new(key, value), right.tree),
        }
    }

    /// Splits the map into the entries with keys less than `key` and those with keys greater.
    ///
    /// The entry for `key` itself, if present, is returned separately.
    pub fn split<Q>(self, key: &Q) -> (Self, Option<(K, V)>, Self)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (left, found, right) = self.tree.split(key);

        (
            AvlMap { tree: left },
            found.map(MapNode::into_pair),
            AvlMap { tree: right },
        )
    }

    /// Moves all entries of `other` into `self`, leaving `other` empty.
    ///
    /// # Panics
    ///
    /// With debug assertions enabled, panics unless every key in `self` is less than every key in
    /// `other`.
    pub fn append(&mut self, other: &mut Self) {
        self.tree.append(&mut other.tree);
    }

    /// Clears the map, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Returns `true` if every invariant of the underlying tree holds.
    pub fn validate(&self) -> bool {
        self.tree.validate()
    }

    /// Checks every invariant of the underlying tree, returning the first violation found.
    pub fn check(&self) -> Result<(), InvariantViolation> {
        self.tree.check()
    }
}

impl<K: Ord + fmt::Debug, V> Default for AvlMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for AvlMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord + fmt::Debug, V: PartialEq> PartialEq for AvlMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Ord + fmt::Debug, V: Eq> Eq for AvlMap<K, V> {}

impl<K: Ord + fmt::Debug, V> Extend<(K, V)> for AvlMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Ord + fmt::Debug, V> FromIterator<(K, V)> for AvlMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = AvlMap::new();
        map.extend(iter);
        map
    }
}
