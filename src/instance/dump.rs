//! Serializable snapshot of a subtree.

use serde::{Deserialize, Serialize};

use super::{InstanceId, MapTree};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDump {
    pub class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeDump>,
}

impl TreeDump {
    pub fn capture(tree: &MapTree, id: InstanceId) -> Option<Self> {
        let node = tree.get(id)?;
        let children = node
            .children()
            .iter()
            .filter_map(|c| TreeDump::capture(tree, *c))
            .collect();
        Some(Self {
            class: node.class().to_string(),
            name: node.display_name(),
            record: node.record().map(|r| r.0),
            children,
        })
    }

    /// Same class/name/nesting/order, ignoring record slots.
    pub fn same_shape(&self, other: &TreeDump) -> bool {
        self.class == other.class
            && self.name == other.name
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(other.children.iter())
                .all(|(a, b)| a.same_shape(b))
    }

    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TreeDump::count).sum::<usize>()
    }

    /// Indented text form, one instance per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(&self.class);
        if let Some(n) = &self.name {
            out.push_str(" \"");
            out.push_str(n);
            out.push('"');
        }
        if let Some(r) = self.record {
            out.push_str(&format!(" [#{}]", r));
        }
        out.push('\n');
        for c in &self.children {
            c.render_into(out, depth + 1);
        }
    }
}
