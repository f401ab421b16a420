use core::{pin::Pin, ptr::NonNull};

use crate::{link_child, links, replace_child, AvlTree, Dir, Links, TreeNode};

/// A view into a single entry in an [`AvlTree`], which may be either vacant or occupied.
///
/// Returned by [`AvlTree::entry`].
pub enum Entry<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    Vacant(VacantEntry<'tree, T>),
    Occupied(OccupiedEntry<'tree, T>),
}

impl<'tree, T> Entry<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn vacant_root(tree: &'tree mut AvlTree<T>) -> Self {
        Entry::Vacant(VacantEntry {
            tree,
            insert_as: InsertAs::Root,
        })
    }

    pub(crate) fn vacant_child(tree: &'tree mut AvlTree<T>, parent: NonNull<T>, dir: Dir) -> Self {
        Entry::Vacant(VacantEntry {
            tree,
            insert_as: InsertAs::Child { parent, dir },
        })
    }

    pub(crate) fn occupied(tree: &'tree mut AvlTree<T>, node: NonNull<T>) -> Self {
        Entry::Occupied(OccupiedEntry { tree, node })
    }
}

pub(crate) enum InsertAs<T: ?Sized> {
    Root,
    Child { parent: NonNull<T>, dir: Dir },
}

/// A vacant entry: the tree holds no item with the key the entry was looked up with.
pub struct VacantEntry<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: &'tree mut AvlTree<T>,
    insert_as: InsertAs<T>,
}

impl<'tree, T> VacantEntry<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Inserts `item` at the position of this entry and rebalances the tree.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the key returned by `item.key()` is equal to the key used to
    /// retrieve this entry.
    pub unsafe fn insert(self, item: T::Handle) -> Pin<&'tree mut T> {
        let mut ptr = T::into_ptr(item);

        unsafe {
            match self.insert_as {
                InsertAs::Root => self.tree.insert_as_root(ptr),

                InsertAs::Child { parent, dir } => {
                    debug_assert_eq!(
                        ptr.as_ref().key() < parent.as_ref().key(),
                        dir == Dir::Left,
                        "item does not belong at this entry"
                    );
                    self.tree.insert_as_child(parent, dir, ptr);
                }
            }

            Pin::new_unchecked(ptr.as_mut())
        }
    }
}

/// An occupied entry: the tree holds an item with the key the entry was looked up with.
pub struct OccupiedEntry<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: &'tree mut AvlTree<T>,
    node: NonNull<T>,
}

impl<'tree, T> OccupiedEntry<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a reference to the item in the entry.
    pub fn get(&self) -> &'tree T {
        // SAFETY: `self.tree` is mutably borrowed for `'tree`
        unsafe { self.node.as_ref() }
    }

    /// Returns a pinned mutable reference to the item in the entry.
    ///
    /// # Safety
    ///
    /// The caller must ensure that neither the links nor the key of the mutably borrowed item are
    /// modified, as doing so may result in undefined behavior.
    pub unsafe fn get_mut(&mut self) -> Pin<&'tree mut T> {
        // SAFETY: `self.tree` is mutably borrowed for `'tree`, and `self.node` is guaranteed pinned
        // by contract with `Linked`.
        unsafe { Pin::new_unchecked(self.node.as_mut()) }
    }

    /// Puts `item` in the place of the entry's item, returning the previous item.
    ///
    /// The shape of the tree is unchanged: the new item takes over the old one's parent, children,
    /// height and size.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `item`'s key is equivalent to the key of the existing item.
    pub unsafe fn insert(&mut self, item: T::Handle) -> T::Handle {
        let new_ptr = T::into_ptr(item);
        let old_ptr = core::mem::replace(&mut self.node, new_ptr);

        unsafe {
            debug_assert!(new_ptr.as_ref().key() == old_ptr.as_ref().key());

            let old = links(old_ptr);
            let parent = old.parent();
            let new = links(new_ptr);

            new.reset();
            new.set_metrics(old.height(), old.size());
            new.set_parent(parent);
            link_child(new_ptr, Dir::Left, old.left());
            link_child(new_ptr, Dir::Right, old.right());

            match parent {
                Some(parent) => replace_child(parent, old_ptr, Some(new_ptr)),
                None => self.tree.root = Some(new_ptr),
            }

            old.reset();

            T::from_ptr(old_ptr)
        }
    }

    /// Removes and returns the item pointed to by this entry.
    pub fn remove(self) -> T::Handle {
        unsafe { self.tree.remove_at(self.node) }
    }
}
