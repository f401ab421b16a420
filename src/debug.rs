use core::{fmt, ptr::NonNull};
use std::collections::VecDeque;

use crate::{links, AvlTree, Link, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: fmt::Display,
{
    /// Writes the tree in Graphviz `dot` format.
    ///
    /// Nodes on the same level share a rank, and each is labelled with its key, height and
    /// subtree size. Missing children are drawn as points.
    pub fn dotgraph<W: fmt::Write>(&self, w: &mut W) -> fmt::Result {
        let Some(root) = self.root() else {
            return write!(w, "digraph \"avl\" {{}}");
        };

        enum Item<T: ?Sized> {
            Node(NonNull<T>),
            Missing(u32),
        }

        let mut queue = VecDeque::new();
        queue.push_back(Item::Node(root));

        write!(w, "digraph \"avl\" {{\n subgraph \"levels\" {{")?;

        let mut missing = 0;
        let mut edges = String::new();

        while !queue.is_empty() {
            use fmt::Write;

            write!(w, "{{rank=same; ")?;

            for item in queue.split_off(0) {
                let node = match item {
                    Item::Node(node) => node,
                    Item::Missing(id) => {
                        write!(w, "\"missing{id}\" [shape=point]; ")?;
                        continue;
                    }
                };

                let key = unsafe { node.as_ref().key() };
                let node_links = unsafe { links(node) };
                write!(
                    w,
                    "\"{key}\" [label=\"{key} h={} s={}\"]; ",
                    node_links.height(),
                    node_links.size()
                )?;

                for child in [node_links.left(), node_links.right()] {
                    match child {
                        Some(child) => {
                            let child_key = unsafe { child.as_ref().key() };
                            queue.push_back(Item::Node(child));
                            writeln!(edges, "\"{key}\" -> \"{child_key}\";")?;
                        }
                        None => {
                            queue.push_back(Item::Missing(missing));
                            writeln!(edges, "\"{key}\" -> \"missing{missing}\";")?;
                            missing += 1;
                        }
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&edges)?;

        w.write_str(" }\n}")
    }

    /// Returns the keys in preorder, separated by spaces, with `#` standing for each missing
    /// child.
    ///
    /// The string determines the shape of the tree, so two trees render identically exactly when
    /// they are structurally isomorphic with equal keys.
    pub fn preorder_with_nulls(&self) -> String {
        let mut out = String::new();
        self.write_preorder(&mut out)
            .expect("writing to a String cannot fail");
        out
    }

    /// Writes the rendering of [`preorder_with_nulls`](AvlTree::preorder_with_nulls) to `w`.
    pub fn write_preorder<W: fmt::Write>(&self, w: &mut W) -> fmt::Result {
        let mut stack: Vec<Link<T>> = vec![self.root()];
        let mut sep = "";

        while let Some(item) = stack.pop() {
            w.write_str(sep)?;
            sep = " ";

            let Some(node) = item else {
                w.write_str("#")?;
                continue;
            };

            unsafe {
                write!(w, "{}", node.as_ref().key())?;
                stack.push(links(node).right());
                stack.push(links(node).left());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{model::TestNode, AvlTree};

    fn tree_of(keys: impl IntoIterator<Item = u32>) -> AvlTree<TestNode> {
        let mut tree = AvlTree::new();
        for key in keys {
            tree.insert(TestNode::new(key));
        }
        tree
    }

    #[test]
    fn preorder_marks_missing_children() {
        assert_eq!(tree_of([]).preorder_with_nulls(), "#");
        assert_eq!(tree_of([1]).preorder_with_nulls(), "1 # #");
        assert_eq!(tree_of([2, 1]).preorder_with_nulls(), "2 1 # # #");
        assert_eq!(tree_of([1, 2, 3]).preorder_with_nulls(), "2 1 # # 3 # #");
    }

    #[test]
    fn dotgraph_lists_levels() {
        let mut out = String::new();
        tree_of([1, 2, 3]).dotgraph(&mut out).unwrap();

        assert!(out.starts_with("digraph \"avl\" {"));
        assert!(out.contains("\"2\" [label=\"2 h=2 s=3\"];"));
        assert!(out.contains("\"2\" -> \"1\";"));
        assert!(out.contains("\"3\" -> \"missing3\";"));
        assert_eq!(out.matches("rank=same").count(), 3);

        let mut empty = String::new();
        tree_of([]).dotgraph(&mut empty).unwrap();
        assert_eq!(empty, "digraph \"avl\" {}");
    }
}
