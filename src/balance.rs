//! Height and size bookkeeping, rotations and rebalancing.
//!
//! Everything here operates on raw subtrees and never touches an `AvlTree`'s root pointer, so the
//! same primitives serve both in-tree updates and the detached subtrees built by join and split.

use core::ptr::NonNull;

use tracing::trace;

use crate::{links, replace_child, Dir, Link, Links, TreeNode};

/// Returns the height of the subtree at `node`, or 0 for a missing subtree.
#[inline]
pub(crate) unsafe fn height<T>(node: Link<T>) -> u8
where
    T: TreeNode<Links<T>> + ?Sized,
{
    node.map_or(0, |n| unsafe { links(n).height() })
}

/// Returns the number of nodes in the subtree at `node`.
#[inline]
pub(crate) unsafe fn size<T>(node: Link<T>) -> usize
where
    T: TreeNode<Links<T>> + ?Sized,
{
    node.map_or(0, |n| unsafe { links(n).size() })
}

#[inline]
pub(crate) unsafe fn balance_factor<T>(node: NonNull<T>) -> i16
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe {
        let links = links(node);
        i16::from(height(links.left())) - i16::from(height(links.right()))
    }
}

/// Recomputes the height and size of `node` from its children.
#[inline]
pub(crate) unsafe fn update_metrics<T>(node: NonNull<T>)
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe {
        let links = links(node);
        let (left, right) = (links.left(), links.right());

        links.set_metrics(
            1 + height(left).max(height(right)),
            1 + size(left) + size(right),
        );
    }
}

// Rotates `down` in direction `dir`: its `!dir` child `up` takes its place, and `down` becomes
// the `dir` child of `up`. The `dir` child of `up` moves across to become the `!dir` child of
// `down`.
//
// Returns `up`, whose parent link now points at `down`'s former parent. That parent's child link
// still points at `down` and must be fixed by the caller.
pub(crate) unsafe fn rotate<T>(down: NonNull<T>, dir: Dir) -> NonNull<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe {
        let up = links(down)
            .child(!dir)
            .expect("rotation requires a child on the rising side");

        let across = links(up).child(dir);
        links(down).set_child(!dir, across);
        if let Some(across) = across {
            links(across).set_parent(Some(down));
        }

        links(up).set_child(dir, Some(down));
        let parent = links(down).set_parent(Some(up));
        links(up).set_parent(parent);

        // `down` is now below `up`, so it is recomputed first.
        update_metrics(down);
        update_metrics(up);

        up
    }
}

// Recomputes the metrics of `node` and, if its balance factor is outside [-1, 1], restores the
// balance with a single or double rotation.
//
// Both subtrees of `node` must satisfy all invariants and differ in height by at most 2.
//
// Returns the root of the rebalanced subtree, which is `node` itself if no rotation was needed.
// As with `rotate`, the caller must relink the result into `node`'s former parent.
pub(crate) unsafe fn rebalance<T>(node: NonNull<T>) -> NonNull<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe {
        update_metrics(node);

        let bf = balance_factor(node);
        if (-1..=1).contains(&bf) {
            return node;
        }

        let (heavy_dir, rotate_dir) = if bf > 1 {
            (Dir::Left, Dir::Right)
        } else {
            (Dir::Right, Dir::Left)
        };

        let heavy = links(node)
            .child(heavy_dir)
            .expect("the taller side of an unbalanced node cannot be empty");

        // The heavy child leaning away from `heavy_dir` needs a first rotation to bring its inner
        // grandchild up.
        let heavy_bf = balance_factor(heavy);
        let leans_inward = match heavy_dir {
            Dir::Left => heavy_bf < 0,
            Dir::Right => heavy_bf > 0,
        };

        if leans_inward {
            trace!(key = ?node.as_ref().key(), case = rotation_case(heavy_dir, true), "rebalance");
            let new_heavy = rotate(heavy, heavy_dir);
            links(node).set_child(heavy_dir, Some(new_heavy));
        } else {
            trace!(key = ?node.as_ref().key(), case = rotation_case(heavy_dir, false), "rebalance");
        }

        rotate(node, rotate_dir)
    }
}

fn rotation_case(heavy_dir: Dir, double: bool) -> &'static str {
    match (heavy_dir, double) {
        (Dir::Left, false) => "LL",
        (Dir::Left, true) => "LR",
        (Dir::Right, false) => "RR",
        (Dir::Right, true) => "RL",
    }
}

// Rebalances every node on the path from `start` to the root of its subtree, relinking rotated
// subtrees into their parents along the way.
//
// Returns the root of the whole subtree, which has no parent.
pub(crate) unsafe fn rebalance_to_root<T>(start: NonNull<T>) -> NonNull<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    let mut cur = start;

    loop {
        unsafe {
            let parent = links(cur).parent();
            let local_root = rebalance(cur);

            match parent {
                Some(parent) => {
                    if local_root != cur {
                        replace_child(parent, cur, Some(local_root));
                    }

                    cur = parent;
                }

                None => return local_root,
            }
        }
    }
}
