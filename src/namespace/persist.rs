/*!
 * JSON persistence for the namespace store
 *
 * One object per node, tagged by `"type": "dir" | "file"`. Directories
 * carry a `children` object keyed by child name, files a `content` string.
 * Unknown keys are ignored on load; missing metadata falls back to the
 * defaults used for freshly created nodes.
 */

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::clock::Timestamp;
use super::error::{NamespaceError, NamespaceResult};
use super::node::{
    Arena, Metadata, Node, NodeId, NodeKind, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, DEFAULT_OWNER,
    MAX_DEPTH,
};
use super::path::is_valid_name;
use super::Namespace;

fn default_owner() -> String {
    DEFAULT_OWNER.to_string()
}

fn default_dir_mode() -> u32 {
    DEFAULT_DIR_MODE
}

fn default_file_mode() -> u32 {
    DEFAULT_FILE_MODE
}

/// Deserialize a `children` object, rejecting repeated names
fn unique_children<'de, D>(deserializer: D) -> Result<BTreeMap<String, PersistedNode>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ChildrenVisitor;

    impl<'de> Visitor<'de> for ChildrenVisitor {
        type Value = BTreeMap<String, PersistedNode>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an object mapping child names to nodes")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut children = BTreeMap::new();
            while let Some((name, node)) = access.next_entry::<String, PersistedNode>()? {
                if children.contains_key(&name) {
                    return Err(de::Error::custom(format!("duplicate child name {:?}", name)));
                }
                children.insert(name, node);
            }
            Ok(children)
        }
    }

    deserializer.deserialize_map(ChildrenVisitor)
}

/// Serialized form of a node and, for directories, its whole subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PersistedNode {
    /// Directory node
    Dir {
        #[serde(default)]
        name: String,
        #[serde(default = "default_owner")]
        owner: String,
        #[serde(default = "default_dir_mode")]
        permissions: u32,
        #[serde(default)]
        ctime: Timestamp,
        #[serde(default)]
        mtime: Timestamp,
        #[serde(default)]
        atime: Timestamp,
        #[serde(default, deserialize_with = "unique_children")]
        children: BTreeMap<String, PersistedNode>,
    },
    /// File node
    File {
        #[serde(default)]
        name: String,
        #[serde(default = "default_owner")]
        owner: String,
        #[serde(default = "default_file_mode")]
        permissions: u32,
        #[serde(default)]
        ctime: Timestamp,
        #[serde(default)]
        mtime: Timestamp,
        #[serde(default)]
        atime: Timestamp,
        #[serde(default)]
        content: String,
    },
}

impl PersistedNode {
    /// Largest timestamp anywhere in this subtree
    pub fn max_timestamp(&self) -> Timestamp {
        match self {
            PersistedNode::Dir {
                ctime,
                mtime,
                atime,
                children,
                ..
            } => children
                .values()
                .map(PersistedNode::max_timestamp)
                .fold(*ctime.max(mtime).max(atime), Timestamp::max),
            PersistedNode::File {
                ctime,
                mtime,
                atime,
                ..
            } => *ctime.max(mtime).max(atime),
        }
    }
}

impl Namespace {
    /// Snapshot the whole tree in its persisted form
    pub fn to_persisted(&self) -> PersistedNode {
        self.persist_node(self.root)
    }

    fn persist_node(&self, id: NodeId) -> PersistedNode {
        let node = &self.nodes[id];
        let meta = &node.metadata;
        match &node.kind {
            NodeKind::Directory { children } => PersistedNode::Dir {
                name: node.name.clone(),
                owner: meta.owner.clone(),
                permissions: meta.permissions,
                ctime: meta.ctime,
                mtime: meta.mtime,
                atime: meta.atime,
                children: children
                    .iter()
                    .map(|(name, child)| (name.clone(), self.persist_node(*child)))
                    .collect(),
            },
            NodeKind::File { content } => PersistedNode::File {
                name: node.name.clone(),
                owner: meta.owner.clone(),
                permissions: meta.permissions,
                ctime: meta.ctime,
                mtime: meta.mtime,
                atime: meta.atime,
                content: content.clone(),
            },
        }
    }

    /// Serialize the tree as pretty-printed JSON
    pub fn to_json(&self) -> NamespaceResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_persisted())?)
    }

    /// Save the tree to `destination`.
    ///
    /// The JSON is written to a temporary file next to the destination and
    /// renamed over it, so an existing state file is replaced only by a
    /// complete one.
    pub fn save(&self, destination: impl AsRef<Path>) -> NamespaceResult<()> {
        let destination = destination.as_ref();
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(&mut temp);
            serde_json::to_writer_pretty(&mut writer, &self.to_persisted())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        temp.persist(destination).map_err(|err| err.error)?;

        info!(
            "saved {} nodes to {}",
            self.node_count(),
            destination.display()
        );
        Ok(())
    }

    /// Replace the tree with a persisted one.
    ///
    /// The new tree is built in full before anything is swapped in, so a
    /// failure leaves the store untouched. On success the working
    /// directory is reset to the root and the clock is advanced to at
    /// least the largest loaded timestamp.
    pub fn restore(&mut self, root: PersistedNode) -> NamespaceResult<()> {
        if !matches!(root, PersistedNode::Dir { .. }) {
            return Err(NamespaceError::Malformed(
                "top-level node must be a directory".to_string(),
            ));
        }

        let max_timestamp = root.max_timestamp();
        let mut nodes = Arena::default();
        let new_root = build(&mut nodes, root, "/".to_string(), None, 0)?;

        self.nodes = nodes;
        self.root = new_root;
        self.cwd = new_root;
        self.clock.advance_to(max_timestamp);
        Ok(())
    }

    /// Replace the tree with one parsed from a JSON string
    pub fn load_json(&mut self, json: &str) -> NamespaceResult<()> {
        let root: PersistedNode = serde_json::from_str(json)?;
        self.restore(root)
    }

    /// Replace the tree with the one saved at `source`
    pub fn load(&mut self, source: impl AsRef<Path>) -> NamespaceResult<()> {
        let source = source.as_ref();
        let json = fs::read_to_string(source)?;
        self.load_json(&json)?;

        info!(
            "loaded {} nodes from {} (clock now {})",
            self.node_count(),
            source.display(),
            self.now()
        );
        Ok(())
    }
}

/// Recursively insert a persisted subtree into `nodes`.
///
/// The map key is the authoritative child name; the embedded `name` field
/// is only informational.
fn build(
    nodes: &mut Arena,
    persisted: PersistedNode,
    name: String,
    parent: Option<NodeId>,
    depth: usize,
) -> NamespaceResult<NodeId> {
    if depth > MAX_DEPTH {
        return Err(NamespaceError::Malformed(format!(
            "tree is deeper than {} levels",
            MAX_DEPTH
        )));
    }

    match persisted {
        PersistedNode::File {
            owner,
            permissions,
            ctime,
            mtime,
            atime,
            content,
            ..
        } => Ok(nodes.insert(Node {
            name,
            parent,
            metadata: Metadata {
                owner,
                permissions,
                ctime,
                mtime,
                atime,
            },
            kind: NodeKind::File { content },
        })),
        PersistedNode::Dir {
            owner,
            permissions,
            ctime,
            mtime,
            atime,
            children,
            ..
        } => {
            let id = nodes.insert(Node {
                name,
                parent,
                metadata: Metadata {
                    owner,
                    permissions,
                    ctime,
                    mtime,
                    atime,
                },
                kind: NodeKind::Directory {
                    children: BTreeMap::new(),
                },
            });

            let mut linked = BTreeMap::new();
            for (child_name, child) in children {
                if !is_valid_name(&child_name) {
                    return Err(NamespaceError::Malformed(format!(
                        "invalid child name {:?}",
                        child_name
                    )));
                }
                let child_id = build(nodes, child, child_name.clone(), Some(id), depth + 1)?;
                linked.insert(child_name, child_id);
            }

            nodes[id].kind = NodeKind::Directory { children: linked };
            Ok(id)
        }
    }
}
