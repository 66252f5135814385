/*
Rendering of dependency trees for the terminal. Kept as a trait so graph and
node share the same entry point.
 */
use termtree::Tree;

use crate::domain::{DependencyGraph, ResponseNode};

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

impl TreeNodeConvert for ResponseNode {
    fn to_tree_string(&self) -> Tree<String> {
        let label = format!("{} (w={})", self.id(), self.weight());

        // Recursively construct the children
        let leaves: Vec<_> = self
            .children()
            .iter()
            .map(|c| c.to_tree_string())
            .collect();

        Tree::new(label).with_leaves(leaves)
    }
}

impl TreeNodeConvert for DependencyGraph {
    fn to_tree_string(&self) -> Tree<String> {
        if self.is_empty() {
            return Tree::new("No combined responses".to_string());
        }
        let leaves: Vec<_> = self.roots().iter().map(|r| r.to_tree_string()).collect();
        Tree::new("objectives".to_string()).with_leaves(leaves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_composite_when_rendering_then_children_indented() {
        let node = ResponseNode::composite(
            "F",
            1.0,
            vec![ResponseNode::leaf("A", 0.5), ResponseNode::leaf("B", 0.5)],
        );

        let rendered = node.to_tree_string().to_string();

        assert!(rendered.starts_with("F (w=1)\n"));
        assert!(rendered.contains("A (w=0.5)"));
        assert!(rendered.contains("B (w=0.5)"));
    }
}
