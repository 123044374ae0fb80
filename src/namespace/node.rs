/*!
 * Core node types for the namespace store
 */

use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use super::clock::Timestamp;

/// Owner assigned to nodes created without an explicit owner
pub const DEFAULT_OWNER: &str = "root";

/// Default mode for new directories (rwxr-xr-x)
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Default mode for new files (rw-r--r--)
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Deepest a node may sit below the root, counted in path segments.
///
/// A saved directory at depth `d` nests `2d + 2` JSON objects, and
/// serde_json refuses more than 127 levels when reading, so the store
/// never builds a tree deeper than this.
pub const MAX_DEPTH: usize = 60;

/// Stable index of a node inside the store's arena.
///
/// Ids are only meaningful for the store that issued them and are
/// invalidated when a load replaces the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

/// Kind of a namespace entry, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Directory containing other entries
    Directory,
    /// Regular file holding text content
    File,
}

/// Metadata carried by every node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Owning user name
    pub owner: String,
    /// Unix-style permission bits (stored, never enforced)
    pub permissions: u32,
    /// Creation time
    pub ctime: Timestamp,
    /// Last modification time
    pub mtime: Timestamp,
    /// Last access time
    pub atime: Timestamp,
}

impl Metadata {
    /// Metadata for a node created at `now` with the given mode
    pub fn new(permissions: u32, now: Timestamp) -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            permissions,
            ctime: now,
            mtime: now,
            atime: now,
        }
    }
}

/// Payload of a node: children for directories, content for files
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Directory mapping child names to their arena ids
    Directory {
        /// Children ordered by name
        children: BTreeMap<String, NodeId>,
    },
    /// File with its text content
    File {
        /// File content
        content: String,
    },
}

/// A node in the namespace tree
#[derive(Debug, Clone)]
pub struct Node {
    /// Entry name ("/" for the root)
    pub name: String,
    /// Non-owning link to the containing directory (None for the root)
    pub parent: Option<NodeId>,
    /// Node metadata
    pub metadata: Metadata,
    /// Directory or file payload
    pub kind: NodeKind,
}

impl Node {
    /// Create an empty directory node
    pub fn directory(name: impl Into<String>, parent: Option<NodeId>, now: Timestamp) -> Self {
        Self {
            name: name.into(),
            parent,
            metadata: Metadata::new(DEFAULT_DIR_MODE, now),
            kind: NodeKind::Directory {
                children: BTreeMap::new(),
            },
        }
    }

    /// Create an empty file node
    pub fn file(name: impl Into<String>, parent: Option<NodeId>, now: Timestamp) -> Self {
        Self {
            name: name.into(),
            parent,
            metadata: Metadata::new(DEFAULT_FILE_MODE, now),
            kind: NodeKind::File {
                content: String::new(),
            },
        }
    }

    /// Kind of this node
    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Directory { .. } => NodeType::Directory,
            NodeKind::File { .. } => NodeType::File,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    /// Children of a directory, `None` for files
    pub fn children(&self) -> Option<&BTreeMap<String, NodeId>> {
        match &self.kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }

    /// Content of a file, `None` for directories
    pub fn content(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::File { content } => Some(content),
            NodeKind::Directory { .. } => None,
        }
    }

    /// Size as shown in listings: content bytes for files, child count for directories
    pub fn size(&self) -> u64 {
        match &self.kind {
            NodeKind::File { content } => content.len() as u64,
            NodeKind::Directory { children } => children.len() as u64,
        }
    }
}

/// Slot storage for the tree.
///
/// Directories own their children through the id map; a freed slot is
/// recycled by the next insertion.
#[derive(Debug, Clone, Default)]
pub(crate) struct Arena {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
}

impl Arena {
    pub(crate) fn insert(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(node);
                NodeId(index)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<Node> {
        let node = self.slots.get_mut(id.0)?.take();
        if node.is_some() {
            self.free.push(id.0);
        }
        node
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl Index<NodeId> for Arena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        match self.get(id) {
            Some(node) => node,
            None => panic!("stale node id {:?}", id),
        }
    }
}

impl IndexMut<NodeId> for Arena {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("stale node id {:?}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_recycles_freed_slots() {
        let mut arena = Arena::default();
        let a = arena.insert(Node::file("a", None, 0));
        let b = arena.insert(Node::file("b", None, 0));
        assert_eq!(arena.len(), 2);

        let removed = arena.remove(a).map(|n| n.name);
        assert_eq!(removed.as_deref(), Some("a"));
        assert!(arena.get(a).is_none());
        assert!(arena.remove(a).is_none());

        let c = arena.insert(Node::directory("c", None, 0));
        assert_eq!(c, a);
        assert_eq!(arena.get(b).map(|n| n.name.as_str()), Some("b"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn node_kind_accessors() {
        let dir = Node::directory("d", None, 4);
        assert!(dir.is_dir());
        assert_eq!(dir.node_type(), NodeType::Directory);
        assert!(dir.content().is_none());
        assert_eq!(dir.metadata.permissions, DEFAULT_DIR_MODE);
        assert_eq!(dir.metadata.ctime, 4);

        let file = Node::file("f", None, 5);
        assert!(file.is_file());
        assert_eq!(file.content(), Some(""));
        assert!(file.children().is_none());
        assert_eq!(file.metadata.owner, DEFAULT_OWNER);
    }
}
