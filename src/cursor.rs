use core::{marker::PhantomData, pin::Pin, ptr::NonNull};

use crate::{balance::size, extreme, links, which_child, AvlTree, Dir, Link, Links, TreeNode};

/// Returns the in-order successor of `node`, or `None` if `node` is the maximum.
///
/// Only parent links are followed upward, so no auxiliary storage is needed.
pub(crate) unsafe fn successor<T>(node: NonNull<T>) -> Link<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe { step(node, Dir::Right) }
}

/// Returns the in-order predecessor of `node`, or `None` if `node` is the minimum.
pub(crate) unsafe fn predecessor<T>(node: NonNull<T>) -> Link<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe { step(node, Dir::Left) }
}

// Moves one position in-order towards `dir`.
unsafe fn step<T>(node: NonNull<T>, dir: Dir) -> Link<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe {
        // The neighbour is the extreme node of the subtree on the `dir` side, if there is one.
        if let Some(child) = links(node).child(dir) {
            return Some(extreme(child, !dir));
        }

        // Otherwise ascend until arriving from the `!dir` side.
        let mut cur = node;
        while let Some(parent) = links(cur).parent() {
            if which_child(parent, cur) == !dir {
                return Some(parent);
            }

            cur = parent;
        }

        None
    }
}

// Returns the 1-based in-order position of `node` within its tree.
unsafe fn position<T>(node: NonNull<T>) -> usize
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe {
        let mut position = size(links(node).left()) + 1;

        // Every ancestor reached from its right side precedes `node`, along with its left subtree.
        let mut cur = node;
        while let Some(parent) = links(cur).parent() {
            if which_child(parent, cur) == Dir::Right {
                position += size(links(parent).left()) + 1;
            }

            cur = parent;
        }

        position
    }
}

/// A cursor over an [`AvlTree`].
///
/// A cursor points either to an element of the tree or to a "ghost" non-element that connects the
/// last element to the first.
pub struct Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    curs: CursorRaw<T>,
    phantom: PhantomData<&'tree AvlTree<T>>,
}

impl<'tree, T> Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn first(tree: &'tree AvlTree<T>) -> Cursor<'tree, T> {
        Cursor::raw(tree, tree.first_raw())
    }

    pub(crate) fn last(tree: &'tree AvlTree<T>) -> Cursor<'tree, T> {
        Cursor::raw(tree, tree.last_raw())
    }

    pub(crate) fn at(tree: &'tree AvlTree<T>, node: NonNull<T>) -> Cursor<'tree, T> {
        Cursor::raw(tree, Some(node))
    }

    fn raw(tree: &'tree AvlTree<T>, ptr: Link<T>) -> Cursor<'tree, T> {
        Cursor {
            curs: CursorRaw {
                tree: NonNull::from(tree),
                ptr,
            },
            phantom: PhantomData,
        }
    }

    /// Moves the cursor to the next element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method moves it to the first
    /// element. If it is pointing to the last element, this method moves it to the "ghost"
    /// non-element.
    pub fn move_next(&mut self) {
        unsafe { self.curs.move_next() }
    }

    /// Moves the cursor to the previous element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method moves it to the last
    /// element. If it is pointing to the first element, this method moves it to the "ghost"
    /// non-element.
    pub fn move_prev(&mut self) {
        unsafe { self.curs.move_prev() }
    }

    /// Returns a reference to the item pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    pub fn get(&self) -> Option<&'tree T> {
        unsafe { self.curs.get() }
    }

    /// Returns a reference to the next item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the first element.
    /// If it is pointing to the last element, this method returns `None`.
    pub fn peek_next(&self) -> Option<&'tree T> {
        unsafe { self.curs.peek_next() }
    }

    /// Returns a reference to the previous item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the last element.
    /// If it is pointing to the first element, this method returns `None`.
    pub fn peek_prev(&self) -> Option<&'tree T> {
        unsafe { self.curs.peek_prev() }
    }

    /// Returns the 1-based rank of the current element among all elements of the tree.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    pub fn position(&self) -> Option<usize> {
        self.curs.ptr.map(|p| unsafe { position(p) })
    }
}

impl<T> Clone for Cursor<'_, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn clone(&self) -> Self {
        Cursor {
            curs: CursorRaw {
                tree: self.curs.tree,
                ptr: self.curs.ptr,
            },
            phantom: PhantomData,
        }
    }
}

/// A cursor over an [`AvlTree`] which supports editing operations.
///
/// A cursor points either to an element of the tree or to a "ghost" non-element that connects the
/// last element to the first.
pub struct CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    curs: CursorRaw<T>,
    phantom: PhantomData<&'tree mut AvlTree<T>>,
}

impl<'tree, T> CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn first(tree: &'tree mut AvlTree<T>) -> CursorMut<'tree, T> {
        let ptr = tree.first_raw();
        CursorMut::raw(tree, ptr)
    }

    pub(crate) fn last(tree: &'tree mut AvlTree<T>) -> CursorMut<'tree, T> {
        let ptr = tree.last_raw();
        CursorMut::raw(tree, ptr)
    }

    pub(crate) fn at(tree: &'tree mut AvlTree<T>, node: NonNull<T>) -> CursorMut<'tree, T> {
        CursorMut::raw(tree, Some(node))
    }

    fn raw(tree: &'tree mut AvlTree<T>, ptr: Link<T>) -> CursorMut<'tree, T> {
        CursorMut {
            curs: CursorRaw {
                tree: NonNull::from(tree),
                ptr,
            },
            phantom: PhantomData,
        }
    }

    /// Returns a read-only cursor pointing to the current element.
    ///
    /// The `CursorMut` remains immutably borrowed for the lifetime of the returned `Cursor`.
    pub fn as_cursor(&self) -> Cursor<'_, T> {
        Cursor {
            curs: CursorRaw {
                tree: self.curs.tree,
                ptr: self.curs.ptr,
            },
            phantom: PhantomData,
        }
    }

    /// Moves the cursor to the next element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method will move it to the first
    /// element. If it is pointing to the last element, this method will move it to the "ghost"
    /// non-element.
    pub fn move_next(&mut self) {
        unsafe { self.curs.move_next() }
    }

    /// Moves the cursor to the previous element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method will move it to the last
    /// element. If it is pointing to the first element, this method will move it to the "ghost"
    /// non-element.
    pub fn move_prev(&mut self) {
        unsafe { self.curs.move_prev() }
    }

    /// Returns a reference to the item pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    pub fn get(&self) -> Option<&T> {
        unsafe { self.curs.get() }
    }

    /// Returns a pinned mutable reference to the item pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    ///
    /// # Safety
    ///
    /// The caller must ensure that modifications to the returned value do not violate the
    /// invariants of the tree. In particular, the result of comparisons between the key of the
    /// returned item and the keys of other items in the tree must not change.
    pub unsafe fn get_mut(&mut self) -> Option<Pin<&mut T>> {
        unsafe { self.curs.get_mut() }
    }

    /// Returns a reference to the next item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the first element.
    /// If it is pointing to the last element, this method returns `None`.
    pub fn peek_next(&self) -> Option<&T> {
        unsafe { self.curs.peek_next() }
    }

    /// Returns a reference to the previous item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the last element.
    /// If it is pointing to the first element, this method returns `None`.
    pub fn peek_prev(&self) -> Option<&T> {
        unsafe { self.curs.peek_prev() }
    }

    /// Returns the 1-based rank of the current element among all elements of the tree.
    pub fn position(&self) -> Option<usize> {
        self.curs.ptr.map(|p| unsafe { position(p) })
    }

    /// Removes the current element from the tree.
    ///
    /// This returns the removed element and moves the cursor to the next element. If the cursor is
    /// pointing to the "ghost" non-element, this method returns `None`, and neither the tree nor
    /// the cursor is modified.
    pub fn remove_current(&mut self) -> Option<T::Handle> {
        unsafe { self.curs.remove_current() }
    }

    /// Removes the current element from the tree.
    ///
    /// This returns the removed element and moves the cursor to the previous element. If the cursor is
    /// pointing to the "ghost" non-element, this method returns `None`, and neither the tree nor
    /// the cursor is modified.
    pub fn remove_current_and_move_prev(&mut self) -> Option<T::Handle> {
        unsafe { self.curs.remove_current_and_move_prev() }
    }
}

struct CursorRaw<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: NonNull<AvlTree<T>>,
    ptr: Link<T>,
}

impl<T> CursorRaw<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe fn move_next(&mut self) {
        self.ptr = unsafe { self.peek_next_raw() };
    }

    unsafe fn move_prev(&mut self) {
        self.ptr = unsafe { self.peek_prev_raw() };
    }

    unsafe fn peek_next_raw(&self) -> Link<T> {
        match self.ptr {
            Some(p) => unsafe { successor(p) },
            None => unsafe { self.tree.as_ref().first_raw() },
        }
    }

    unsafe fn peek_prev_raw(&self) -> Link<T> {
        match self.ptr {
            Some(p) => unsafe { predecessor(p) },
            None => unsafe { self.tree.as_ref().last_raw() },
        }
    }

    unsafe fn get<'a>(&self) -> Option<&'a T> {
        self.ptr.map(|p| unsafe { p.as_ref() })
    }

    unsafe fn get_mut<'a>(&mut self) -> Option<Pin<&'a mut T>> {
        self.ptr
            .map(|mut p| unsafe { Pin::new_unchecked(p.as_mut()) })
    }

    unsafe fn peek_next<'a>(&self) -> Option<&'a T> {
        unsafe { self.peek_next_raw() }.map(|p| unsafe { p.as_ref() })
    }

    unsafe fn peek_prev<'a>(&self) -> Option<&'a T> {
        unsafe { self.peek_prev_raw() }.map(|p| unsafe { p.as_ref() })
    }

    unsafe fn remove_current(&mut self) -> Option<T::Handle> {
        let remove = self.ptr?;

        unsafe {
            self.move_next();
            Some(self.tree.as_mut().remove_at(remove))
        }
    }

    unsafe fn remove_current_and_move_prev(&mut self) -> Option<T::Handle> {
        let remove = self.ptr?;

        unsafe {
            self.move_prev();
            Some(self.tree.as_mut().remove_at(remove))
        }
    }
}
