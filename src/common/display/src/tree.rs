//! Tree display utilities for terms.

use std::fmt;

/// A node in a display tree.
pub trait TreeNode {
    /// Short label of this node, e.g. the constructor name.
    fn label(&self) -> String;

    /// Child nodes, in display order.
    fn children(&self) -> Vec<&dyn TreeNode>;

    /// Additional details shown after the label.
    fn details(&self) -> Option<String> {
        None
    }
}

/// Renders a [`TreeNode`] with box-drawing connectors.
pub struct DisplayTree<'a> {
    root: &'a dyn TreeNode,
}

impl<'a> DisplayTree<'a> {
    /// Create a new display tree.
    pub fn new(root: &'a dyn TreeNode) -> Self {
        Self { root }
    }

    fn fmt_header(f: &mut fmt::Formatter<'_>, node: &dyn TreeNode) -> fmt::Result {
        write!(f, "{}", node.label())?;
        if let Some(details) = node.details() {
            write!(f, " ({details})")?;
        }
        writeln!(f)
    }

    fn fmt_node(
        f: &mut fmt::Formatter<'_>,
        node: &dyn TreeNode,
        prefix: &str,
        is_last: bool,
    ) -> fmt::Result {
        let connector = if is_last { "└─ " } else { "├─ " };
        write!(f, "{prefix}{connector}")?;
        Self::fmt_header(f, node)?;

        let children = node.children();
        let child_prefix = format!("{prefix}{}", if is_last { "   " } else { "│  " });
        for (i, child) in children.iter().enumerate() {
            Self::fmt_node(f, *child, &child_prefix, i + 1 == children.len())?;
        }

        Ok(())
    }
}

impl fmt::Display for DisplayTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Self::fmt_header(f, self.root)?;

        let children = self.root.children();
        for (i, child) in children.iter().enumerate() {
            Self::fmt_node(f, *child, "", i + 1 == children.len())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestNode {
        name: &'static str,
        children: Vec<TestNode>,
    }

    impl TreeNode for TestNode {
        fn label(&self) -> String {
            self.name.to_string()
        }

        fn children(&self) -> Vec<&dyn TreeNode> {
            self.children.iter().map(|c| c as &dyn TreeNode).collect()
        }

        fn details(&self) -> Option<String> {
            (self.name == "For").then(|| "u".to_string())
        }
    }

    #[test]
    fn test_display_tree() {
        let tree = TestNode {
            name: "For",
            children: vec![
                TestNode {
                    name: "Table",
                    children: vec![],
                },
                TestNode {
                    name: "Yield",
                    children: vec![TestNode {
                        name: "Var",
                        children: vec![],
                    }],
                },
            ],
        };

        let output = DisplayTree::new(&tree).to_string();
        assert_eq!(output, "For (u)\n├─ Table\n└─ Yield\n   └─ Var\n");
    }
}
