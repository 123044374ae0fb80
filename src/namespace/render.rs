/*!
 * Listing entries and tree rendering
 */

use std::fmt;

use super::clock::Timestamp;
use super::error::NamespaceResult;
use super::node::{Node, NodeId, NodeType};
use super::Namespace;
use crate::utils::format_permissions;

/// One row of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Entry name
    pub name: String,
    /// Directory or file
    pub node_type: NodeType,
    /// Owning user
    pub owner: String,
    /// Permission bits
    pub permissions: u32,
    /// Content length for files, child count for directories
    pub size: u64,
    pub ctime: Timestamp,
    pub mtime: Timestamp,
    pub atime: Timestamp,
}

impl ListEntry {
    pub(crate) fn from_node(node: &Node) -> Self {
        Self {
            name: node.name.clone(),
            node_type: node.node_type(),
            owner: node.metadata.owner.clone(),
            permissions: node.metadata.permissions,
            size: node.size(),
            ctime: node.metadata.ctime,
            mtime: node.metadata.mtime,
            atime: node.metadata.atime,
        }
    }

    /// Mode string such as `drwxr-xr-x`
    pub fn mode_string(&self) -> String {
        format_permissions(self.permissions, self.node_type == NodeType::Directory)
    }
}

impl fmt::Display for ListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = if self.node_type == NodeType::Directory {
            "/"
        } else {
            ""
        };
        write!(
            f,
            "{} {:<8} {:>6} c={} m={} a={} {}{}",
            self.mode_string(),
            self.owner,
            self.size,
            self.ctime,
            self.mtime,
            self.atime,
            self.name,
            suffix
        )
    }
}

impl Namespace {
    /// Render the subtree at `path` with box-drawing connectors
    pub fn tree(&self, path: &str) -> NamespaceResult<String> {
        let id = self.resolve(path)?;
        let node = &self.nodes[id];

        let mut out = String::new();
        if id == self.root {
            out.push_str("/\n");
        } else {
            out.push_str(&node.name);
            out.push_str(if node.is_dir() { "/\n" } else { "\n" });
        }
        self.render_children(id, "", &mut out);
        Ok(out)
    }

    fn render_children(&self, id: NodeId, prefix: &str, out: &mut String) {
        let Some(children) = self.nodes[id].children() else {
            return;
        };

        let count = children.len();
        for (index, child) in children.values().enumerate() {
            let last = index + 1 == count;
            let node = &self.nodes[*child];

            out.push_str(prefix);
            out.push_str(if last { "└── " } else { "├── " });
            out.push_str(&node.name);
            out.push_str(if node.is_dir() { "/\n" } else { "\n" });

            let nested = format!("{}{}", prefix, if last { "    " } else { "│   " });
            self.render_children(*child, &nested, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_renders_connectors() {
        let mut ns = Namespace::new();
        ns.make_directory("/etc").unwrap();
        ns.write_file("/etc/hosts", "127.0.0.1").unwrap();
        ns.make_directory("/tmp").unwrap();

        let rendered = ns.tree("/").unwrap();
        assert_eq!(rendered, "/\n├── etc/\n│   └── hosts\n└── tmp/\n");

        assert_eq!(ns.tree("/etc").unwrap(), "etc/\n└── hosts\n");
        assert!(ns.tree("/missing").is_err());
    }

    #[test]
    fn list_entry_formats_like_ls() {
        let mut ns = Namespace::new();
        ns.write_file("/a.txt", "hello").unwrap();
        let entry = ns.list("/a.txt").unwrap().remove(0);
        assert_eq!(entry.mode_string(), "-rw-r--r--");
        let line = entry.to_string();
        assert!(line.starts_with("-rw-r--r-- root"));
        assert!(line.ends_with(" a.txt"));
    }
}
