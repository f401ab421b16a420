use core::ptr::NonNull;

use crate::{links, AvlTree, Dir, InvariantViolation, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns `true` if every invariant of the tree holds.
    ///
    /// This walks the whole tree, so it takes _O(n)_ time. It is meant for tests.
    pub fn validate(&self) -> bool {
        self.check().is_ok()
    }

    /// Checks search order, balance, stored heights and sizes, and parent links of every node.
    ///
    /// Returns the first violation found in a preorder walk.
    pub fn check(&self) -> Result<(), InvariantViolation> {
        let Some(root) = self.root() else {
            return Ok(());
        };

        unsafe {
            if links(root).parent().is_some() {
                return Err(InvariantViolation::RootHasParent);
            }

            check_at(root, None, None).map(drop)
        }
    }

    #[doc(hidden)]
    #[track_caller]
    pub fn assert_invariants(&self) {
        if let Err(violation) = self.check() {
            panic!("tree invariant violated: {violation}; tree: {self:?}");
        }
    }
}

// Checks the subtree at `node`, whose keys must lie strictly between `lower` and `upper`.
//
// Returns the recomputed height and size of the subtree.
unsafe fn check_at<'a, T>(
    node: NonNull<T>,
    lower: Option<&'a T::Key>,
    upper: Option<&'a T::Key>,
) -> Result<(u8, usize), InvariantViolation>
where
    T: TreeNode<Links<T>> + ?Sized + 'a,
{
    let key: &'a T::Key = unsafe { node.as_ref().key() };
    let describe = || format!("{key:?}");

    if lower.is_some_and(|lower| key <= lower) || upper.is_some_and(|upper| key >= upper) {
        return Err(InvariantViolation::Order { key: describe() });
    }

    let mut heights = [0u8; 2];
    let mut sizes = [0usize; 2];

    for dir in [Dir::Left, Dir::Right] {
        let Some(child) = (unsafe { links(node).child(dir) }) else {
            continue;
        };

        if unsafe { links(child).parent() } != Some(node) {
            return Err(InvariantViolation::Parent { key: describe() });
        }

        let (lower, upper) = match dir {
            Dir::Left => (lower, Some(key)),
            Dir::Right => (Some(key), upper),
        };

        (heights[dir as usize], sizes[dir as usize]) = unsafe { check_at(child, lower, upper)? };
    }

    let [left_height, right_height] = heights;
    if left_height.abs_diff(right_height) > 1 {
        return Err(InvariantViolation::Balance {
            key: describe(),
            factor: i16::from(left_height) - i16::from(right_height),
        });
    }

    let links = unsafe { links(node) };

    let height = 1 + left_height.max(right_height);
    if links.height() != height {
        return Err(InvariantViolation::Height {
            key: describe(),
            stored: links.height(),
            actual: height,
        });
    }

    let size = 1 + sizes[0] + sizes[1];
    if links.size() != size {
        return Err(InvariantViolation::Size {
            key: describe(),
            stored: links.size(),
            actual: size,
        });
    }

    Ok((height, size))
}
