//! An intrusive AVL tree augmented with subtree sizes.
//!
//! Besides the usual ordered-dictionary operations, the size augmentation answers order
//! statistics queries ([`AvlTree::select`], [`AvlTree::rank`]) in _O(log(n))_ time, and the stored
//! heights let [`AvlTree::join`] and [`AvlTree::split`] run without re-inserting keys one by one.
//!
//! [`AvlMap`] and [`AvlSet`] are owning wrappers for callers that do not need intrusive nodes.
//! `AvlSet<i32>` additionally has a shape-preserving binary encoding, see [`AvlSet::serialize`].

// Conventions used in comments:
// - `h(x)` is the height of the subtree rooted at `x`. A missing child has height 0, a leaf 1.
// - `s(x)` is the number of nodes in the subtree rooted at `x`.
// - The balance factor of `x` is `h(left(x)) - h(right(x))`.
//
// The invariants of the tree, which hold whenever no `&mut self` method is running:
// 1. In-order keys are strictly increasing.
// 2. Every balance factor is -1, 0 or 1.
// 3. `h(x) = 1 + max(h(left(x)), h(right(x)))`.
// 4. `s(x) = 1 + s(left(x)) + s(right(x))`.
// 5. Every child's parent link points back at its parent, and the root has no parent.
//
// By (2), a tree of `n` nodes is at most `1.4405 * log2(n + 2) - 0.3277` high.

use core::{cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, ops::Not, pin::Pin, ptr::NonNull};
use std::borrow::Borrow;

use cordyceps::Linked;

mod balance;
mod check;
mod codec;
mod cursor;
mod debug;
mod entry;
mod error;
mod iter;
mod join;
mod map;
mod rank;
mod set;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

pub use codec::{DecodeOptions, FORMAT_VERSION, HEADER_LEN, MAGIC, RECORD_LEN};
pub use cursor::{Cursor, CursorMut};
pub use entry::{Entry, OccupiedEntry, VacantEntry};
pub use error::{CorruptStream, Error, InvariantViolation, OutOfRange, Result};
pub use iter::Iter;
pub use map::AvlMap;
pub use set::{AvlSet, Insertion, Removal};

use balance::{rebalance_to_root, size};

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree whose nodes also record the size of their subtree.
///
/// The tree owns its items through their [`Linked::Handle`]s: inserting converts the handle into
/// a pointer, and removing an item (or dropping the tree) converts it back exactly once.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
}

/// The links embedded in every item of an [`AvlTree`].
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    height: u8,
    size: usize,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None }
    }

    /// Takes ownership of a detached subtree rooted at `root`.
    ///
    /// # Safety
    ///
    /// `root` must have no parent and must not be reachable from any other tree.
    pub(crate) unsafe fn from_root(root: NonNull<T>) -> AvlTree<T> {
        debug_assert!(unsafe { links(root).parent() }.is_none());
        AvlTree { root: Some(root) }
    }

    /// Detaches the whole node structure from the tree, leaving it empty.
    pub(crate) fn take_root(&mut self) -> Link<T> {
        self.root.take()
    }

    pub(crate) fn root(&self) -> Link<T> {
        self.root
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of elements in the tree.
    ///
    /// This is read off the root's size field, so it takes constant time.
    pub fn len(&self) -> usize {
        unsafe { size(self.root) }
    }

    /// Returns the height of the tree: 0 when empty, 1 for a single element.
    pub fn height(&self) -> usize {
        unsafe { balance::height(self.root).into() }
    }

    /// Returns a reference to the item corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a pinned mutable reference to the item corresponding to `key`.
    ///
    /// # Safety
    ///
    /// The caller must not modify the links of the item, nor change its key in a way that alters
    /// how it compares with the other keys in the tree.
    pub unsafe fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    /// Returns `true` if the tree holds an item with key `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    /// Returns a cursor pointing at the item corresponding to `key`, if there is one.
    pub fn find<Q>(&self, key: &Q) -> Option<Cursor<'_, T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        Some(Cursor::at(self, ptr))
    }

    /// Returns a mutable cursor pointing at the item corresponding to `key`, if there is one.
    pub fn find_mut<Q>(&mut self, key: &Q) -> Option<CursorMut<'_, T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        Some(CursorMut::at(self, ptr))
    }

    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = links(cur).left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = links(cur).right(),
                }
            }
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        self.first_raw()
            .map(|first| unsafe { Pin::new_unchecked(first.as_ref()) })
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        self.last_raw()
            .map(|last| unsafe { Pin::new_unchecked(last.as_ref()) })
    }

    pub(crate) fn first_raw(&self) -> Link<T> {
        self.root.map(|root| unsafe { extreme(root, Dir::Left) })
    }

    pub(crate) fn last_raw(&self) -> Link<T> {
        self.root.map(|root| unsafe { extreme(root, Dir::Right) })
    }

    /// Returns an iterator over the items of the tree, in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns a cursor pointing at the minimum element of the tree.
    pub fn cursor_first(&self) -> Cursor<'_, T> {
        Cursor::first(self)
    }

    /// Returns a cursor pointing at the maximum element of the tree.
    pub fn cursor_last(&self) -> Cursor<'_, T> {
        Cursor::last(self)
    }

    /// Returns a mutable cursor pointing at the minimum element of the tree.
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::first(self)
    }

    /// Returns a mutable cursor pointing at the maximum element of the tree.
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::last(self)
    }

    /// Returns the entry for `key`, which is either occupied by an item or vacant.
    pub fn entry<Q>(&mut self, key: &Q) -> Entry<'_, T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let Some(mut parent) = self.root else {
            return Entry::vacant_root(self);
        };

        loop {
            let dir = match key.cmp(unsafe { parent.as_ref().key().borrow() }) {
                Ordering::Less => Dir::Left,
                Ordering::Equal => return Entry::occupied(self, parent),
                Ordering::Greater => Dir::Right,
            };

            match unsafe { links(parent).child(dir) } {
                Some(child) => parent = child,
                None => return Entry::vacant_child(self, parent, dir),
            }
        }
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already holds an item with an equal key, the tree is left unchanged and `item`
    /// is handed back to the caller.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);

        let Some(mut parent) = self.root else {
            // Tree is empty. Set `item` as the root and return.
            unsafe { self.insert_as_root(ptr) };
            return None;
        };

        // Descend the tree, looking for a free slot.
        loop {
            let dir = match unsafe { ptr.as_ref().key().cmp(parent.as_ref().key()) } {
                Ordering::Less => Dir::Left,
                Ordering::Equal => return Some(unsafe { T::from_ptr(ptr) }),
                Ordering::Greater => Dir::Right,
            };

            match unsafe { links(parent).child(dir) } {
                Some(child) => parent = child,
                None => {
                    unsafe { self.insert_as_child(parent, dir, ptr) };
                    return None;
                }
            }
        }
    }

    pub(crate) unsafe fn insert_as_root(&mut self, ptr: NonNull<T>) {
        debug_assert!(self.root.is_none());

        unsafe { links(ptr).reset() };
        self.root = Some(ptr);
    }

    // Links `ptr` as the `dir` child of `parent` and restores the invariants on the path to the
    // root.
    //
    // # Safety
    //
    // `parent` must be an element of `self` whose `dir` child is missing, and `ptr`'s key must
    // belong in that slot.
    pub(crate) unsafe fn insert_as_child(&mut self, parent: NonNull<T>, dir: Dir, ptr: NonNull<T>) {
        unsafe {
            debug_assert!(links(parent).child(dir).is_none());

            links(ptr).reset();
            link_child(parent, dir, Some(ptr));
            self.rebalance_upward(Some(parent));
        }
    }

    /// Removes the item corresponding to `key` from the tree and returns it.
    ///
    /// Returns `None`, leaving the tree unchanged, if no item has that key.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        Some(unsafe { self.remove_at(node) })
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = self.first_raw()?;
        Some(unsafe { self.remove_at(first) })
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = self.last_raw()?;
        Some(unsafe { self.remove_at(last) })
    }

    // Unlinks `node` from the tree and returns ownership of it.
    //
    // # Safety
    //
    // `node` must be an element of `self`, and not of any other tree.
    pub(crate) unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        // There are two cases:
        //
        // 1. `node` has at most one child.
        //
        //    The child (if any) is elevated into `node`'s place. Heights can only have changed on
        //    the path from `node`'s parent to the root.
        //
        // 2. `node` has two children.
        //
        //    `node`'s successor, the least node of its right subtree, has no left child. It is
        //    unlinked from its position as in case 1 and then takes over `node`'s place and
        //    children. The physical removal happened at the successor's old parent (or at the
        //    successor itself if it was `node`'s right child), so that is where rebalancing
        //    starts.
        unsafe {
            let parent = links(node).parent();
            let left = links(node).left();
            let right = links(node).right();

            let rebalance_from = match (left, right) {
                (Some(left), Some(right)) => {
                    let successor = extreme(right, Dir::Left);

                    let from = if successor == right {
                        successor
                    } else {
                        let successor_parent = links(successor)
                            .parent()
                            .expect("successor below `right` must have a parent");

                        // Elevate the successor's right child to replace it.
                        link_child(successor_parent, Dir::Left, links(successor).right());
                        link_child(successor, Dir::Right, Some(right));

                        successor_parent
                    };

                    link_child(successor, Dir::Left, Some(left));
                    links(successor).set_parent(parent);
                    self.replace_child_or_set_root(parent, node, Some(successor));

                    Some(from)
                }

                (Some(child), None) | (None, Some(child)) => {
                    links(child).set_parent(parent);
                    self.replace_child_or_set_root(parent, node, Some(child));
                    parent
                }

                (None, None) => {
                    self.replace_child_or_set_root(parent, node, None);
                    parent
                }
            };

            links(node).reset();
            self.rebalance_upward(rebalance_from);

            T::from_ptr(node)
        }
    }

    // Rebalances every node from `start` up to the root, then records the resulting root.
    pub(crate) unsafe fn rebalance_upward(&mut self, start: Link<T>) {
        if let Some(start) = start {
            self.root = Some(unsafe { rebalance_to_root(start) });
        }
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root.take();

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node. It is the left child of its parent, if it has one.
                let min = extreme(cur, Dir::Left);
                let parent = links(min).parent();
                let right = links(min).right();

                // Elevate the node's right child (which may be None).
                if let Some(parent) = parent {
                    debug_assert_eq!(links(parent).left(), Some(min));
                    links(parent).set_left(right);
                }

                if let Some(right) = right {
                    links(right).set_parent(parent);
                }

                // Drop the node.
                links(min).reset();
                drop(T::from_ptr(min));

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> fmt::Debug for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|item| item.key())).finish()
    }
}

// Node-level helpers ==========================================================

#[inline]
pub(crate) unsafe fn links<'a, T>(node: NonNull<T>) -> &'a Links<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe { T::links(node).as_ref() }
}

// Sets `child` as the `dir` child of `parent`, and `parent` as the parent of `child`.
#[inline]
pub(crate) unsafe fn link_child<T>(parent: NonNull<T>, dir: Dir, child: Link<T>)
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe {
        links(parent).set_child(dir, child);

        if let Some(child) = child {
            links(child).set_parent(Some(parent));
        }
    }
}

// Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
//
// `new_child`'s parent pointer is not updated.
//
// # Safety
//
// The caller must ensure that `old_child` is a child node of `parent`.
#[inline]
pub(crate) unsafe fn replace_child<T>(parent: NonNull<T>, old_child: NonNull<T>, new_child: Link<T>)
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe {
        let dir = which_child(parent, old_child);
        links(parent).set_child(dir, new_child);
    }
}

#[inline]
pub(crate) unsafe fn which_child<T>(parent: NonNull<T>, child: NonNull<T>) -> Dir
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe {
        if links(parent).left() == Some(child) {
            Dir::Left
        } else {
            debug_assert_eq!(links(parent).right(), Some(child), "not a child of `parent`");
            Dir::Right
        }
    }
}

// Returns the node reached by following `dir` links from `node` for as long as possible.
#[inline]
pub(crate) unsafe fn extreme<T>(node: NonNull<T>, dir: Dir) -> NonNull<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    let mut cur = node;

    while let Some(next) = unsafe { links(cur).child(dir) } {
        cur = next;
    }

    cur
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                height: 1,
                size: 1,
                _unpin: PhantomPinned,
            }),
        }
    }

    /// Returns the links to the state of a detached leaf.
    #[inline]
    fn reset(&self) {
        unsafe {
            let inner = &mut *self.inner.get();
            inner.parent = None;
            inner.children = [None; 2];
            inner.height = 1;
            inner.size = 1;
        }
    }

    #[inline]
    fn height(&self) -> u8 {
        unsafe { (*self.inner.get()).height }
    }

    #[inline]
    fn size(&self) -> usize {
        unsafe { (*self.inner.get()).size }
    }

    #[inline]
    fn set_metrics(&self, height: u8, size: usize) {
        unsafe {
            let inner = &mut *self.inner.get();
            inner.height = height;
            inner.size = size;
        }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&self, parent: Link<T>) -> Link<T> {
        unsafe { core::mem::replace(&mut (*self.inner.get()).parent, parent) }
    }

    #[inline]
    fn set_child(&self, dir: Dir, child: Link<T>) -> Link<T> {
        unsafe { core::mem::replace(&mut (*self.inner.get()).children[dir as usize], child) }
    }

    #[inline]
    fn set_left(&self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("height", &self.height())
            .field("size", &self.size())
            .finish()
    }
}
