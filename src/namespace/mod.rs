/*!
 * Simulated hierarchical namespace store
 *
 * An arena-backed tree of directories and files with unix-like metadata,
 * a current working directory, a logical clock for timestamps and JSON
 * persistence. The store is passive: callers get `Ok` on success and a
 * [`NamespaceError`] describing the rejection otherwise, and a rejected
 * operation never mutates the tree.
 */

mod clock;
mod error;
mod node;
mod path;
mod persist;
mod render;

use std::collections::BTreeMap;

use log::debug;

pub use clock::{LogicalClock, Timestamp};
pub use error::{NamespaceError, NamespaceResult};
pub use node::{
    Metadata, Node, NodeId, NodeKind, NodeType, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE,
    DEFAULT_OWNER, MAX_DEPTH,
};
pub use path::{is_valid_name, ParsedPath};
pub use persist::PersistedNode;
pub use render::ListEntry;

use node::Arena;

/// The namespace store
#[derive(Debug, Clone)]
pub struct Namespace {
    /// Node storage; the root owns everything reachable through children maps
    nodes: Arena,
    /// Root directory ("/")
    root: NodeId,
    /// Current working directory, always a live directory
    cwd: NodeId,
    /// Timestamp source
    clock: LogicalClock,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl Namespace {
    /// Create a store holding only the root directory
    pub fn new() -> Self {
        let clock = LogicalClock::new();
        let mut nodes = Arena::default();
        let root = nodes.insert(Node::directory("/", None, clock.now()));
        Self {
            nodes,
            root,
            cwd: root,
            clock,
        }
    }

    /// Id of the root directory
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Id of the current working directory
    pub fn cwd(&self) -> NodeId {
        self.cwd
    }

    /// Current logical time
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Look up a node by id
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Number of live nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Resolve a path to a node id.
    ///
    /// Absolute paths start at the root, everything else at the current
    /// directory. "." is a no-op, ".." moves to the parent (a no-op at the
    /// root), and the empty path resolves to the current directory.
    pub fn resolve(&self, path: &str) -> NamespaceResult<NodeId> {
        self.resolve_parsed(&ParsedPath::parse(path), path)
    }

    /// Resolve a path and return the node it names
    pub fn stat(&self, path: &str) -> NamespaceResult<&Node> {
        let id = self.resolve(path)?;
        Ok(&self.nodes[id])
    }

    /// Whether `path` names an existing node
    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok()
    }

    fn resolve_parsed(&self, parsed: &ParsedPath<'_>, original: &str) -> NamespaceResult<NodeId> {
        let mut current = if parsed.absolute { self.root } else { self.cwd };

        for segment in &parsed.segments {
            match *segment {
                "." => {}
                ".." => {
                    if let Some(parent) = self.nodes[current].parent {
                        current = parent;
                    }
                }
                name => {
                    let children = self.nodes[current]
                        .children()
                        .ok_or_else(|| NamespaceError::NotADirectory(original.trim().to_string()))?;
                    current = *children
                        .get(name)
                        .ok_or_else(|| NamespaceError::NotFound(original.trim().to_string()))?;
                }
            }
        }

        Ok(current)
    }

    /// Resolve the directory that would contain `path` and the final name.
    ///
    /// Fails if the parent is missing or not a directory, or if the final
    /// segment is not usable as an entry name.
    fn resolve_parent(&self, path: &str) -> NamespaceResult<(NodeId, String)> {
        let (parent_path, name) = ParsedPath::parse(path)
            .split_last()
            .ok_or_else(|| NamespaceError::InvalidName(path.trim().to_string()))?;
        if !is_valid_name(name) {
            return Err(NamespaceError::InvalidName(name.to_string()));
        }

        let parent = self.resolve_parsed(&parent_path, path)?;
        if !self.nodes[parent].is_dir() {
            return Err(NamespaceError::NotADirectory(path.trim().to_string()));
        }

        Ok((parent, name.to_string()))
    }

    fn child(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[dir]
            .children()
            .and_then(|children| children.get(name).copied())
    }

    fn children_mut(&mut self, dir: NodeId) -> Option<&mut BTreeMap<String, NodeId>> {
        match &mut self.nodes[dir].kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }

    /// Insert `node` under the directory `parent`
    fn attach(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        node.parent = Some(parent);
        let name = node.name.clone();
        let id = self.nodes.insert(node);
        if let Some(children) = self.children_mut(parent) {
            children.insert(name, id);
        }
        id
    }

    /// Unlink `name` from `parent` and free its slot
    fn detach(&mut self, parent: NodeId, name: &str) -> Option<Node> {
        let id = self.children_mut(parent)?.remove(name)?;
        self.nodes.remove(id)
    }

    fn touch_mtime(&mut self, id: NodeId, now: Timestamp) {
        self.nodes[id].metadata.mtime = now;
    }

    /// Number of segments between the root and `id`
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes.get(id).and_then(|node| node.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes[parent].parent;
        }
        depth
    }

    // A new child of `parent` must stay within MAX_DEPTH
    fn check_depth(&self, parent: NodeId, path: &str) -> NamespaceResult<()> {
        if self.depth(parent) >= MAX_DEPTH {
            return Err(NamespaceError::TooDeep(path.trim().to_string()));
        }
        Ok(())
    }

    /// Create a directory
    pub fn make_directory(&mut self, path: &str) -> NamespaceResult<NodeId> {
        let (parent, name) = self.resolve_parent(path)?;
        if self.child(parent, &name).is_some() {
            return Err(NamespaceError::AlreadyExists(path.trim().to_string()));
        }
        self.check_depth(parent, path)?;

        let now = self.clock.tick();
        let id = self.attach(parent, Node::directory(name, None, now));
        self.touch_mtime(parent, now);
        debug!("mkdir {} at t={}", self.path_of(id), now);
        Ok(id)
    }

    /// Create an empty file, or refresh the modification time of an existing one
    pub fn create_or_touch_file(&mut self, path: &str) -> NamespaceResult<NodeId> {
        let (parent, name) = self.resolve_parent(path)?;

        if let Some(existing) = self.child(parent, &name) {
            if self.nodes[existing].is_dir() {
                return Err(NamespaceError::IsADirectory(path.trim().to_string()));
            }
            let now = self.clock.tick();
            self.touch_mtime(existing, now);
            debug!("touch {} at t={}", self.path_of(existing), now);
            return Ok(existing);
        }
        self.check_depth(parent, path)?;

        let now = self.clock.tick();
        let id = self.attach(parent, Node::file(name, None, now));
        self.touch_mtime(parent, now);
        debug!("create {} at t={}", self.path_of(id), now);
        Ok(id)
    }

    /// Remove a file
    pub fn remove_file(&mut self, path: &str) -> NamespaceResult<()> {
        let (parent, name) = self.resolve_parent(path)?;
        let target = self
            .child(parent, &name)
            .ok_or_else(|| NamespaceError::NotFound(path.trim().to_string()))?;
        if self.nodes[target].is_dir() {
            return Err(NamespaceError::IsADirectory(path.trim().to_string()));
        }

        let now = self.clock.tick();
        self.detach(parent, &name);
        self.touch_mtime(parent, now);
        debug!("rm {} at t={}", path.trim(), now);
        Ok(())
    }

    /// Remove an empty directory
    pub fn remove_directory(&mut self, path: &str) -> NamespaceResult<()> {
        let (parent, name) = match ParsedPath::parse(path).split_last() {
            Some(_) => self.resolve_parent(path)?,
            None => return Err(NamespaceError::Busy(path.trim().to_string())),
        };
        let target = self
            .child(parent, &name)
            .ok_or_else(|| NamespaceError::NotFound(path.trim().to_string()))?;

        match self.nodes[target].children() {
            None => return Err(NamespaceError::NotADirectory(path.trim().to_string())),
            Some(children) if !children.is_empty() => {
                return Err(NamespaceError::DirectoryNotEmpty(path.trim().to_string()))
            }
            Some(_) => {}
        }
        if target == self.cwd {
            return Err(NamespaceError::Busy(path.trim().to_string()));
        }

        let now = self.clock.tick();
        self.detach(parent, &name);
        self.touch_mtime(parent, now);
        debug!("rmdir {} at t={}", path.trim(), now);
        Ok(())
    }

    /// Overwrite a file's content, creating the file if it does not exist
    pub fn write_file(&mut self, path: &str, text: &str) -> NamespaceResult<()> {
        let (parent, name) = self.resolve_parent(path)?;

        let target = match self.child(parent, &name) {
            Some(existing) if self.nodes[existing].is_dir() => {
                return Err(NamespaceError::IsADirectory(path.trim().to_string()));
            }
            Some(existing) => {
                let now = self.clock.tick();
                self.touch_mtime(existing, now);
                existing
            }
            None => {
                self.check_depth(parent, path)?;
                let now = self.clock.tick();
                self.attach(parent, Node::file(name, None, now))
            }
        };

        let now = self.clock.now();
        if let NodeKind::File { content } = &mut self.nodes[target].kind {
            content.clear();
            content.push_str(text);
        }
        self.touch_mtime(parent, now);
        debug!(
            "write {} ({} bytes) at t={}",
            self.path_of(target),
            text.len(),
            now
        );
        Ok(())
    }

    /// Read a file's content, updating its access time
    pub fn read_file(&mut self, path: &str) -> NamespaceResult<String> {
        let id = self.resolve(path)?;
        let content = self.nodes[id]
            .content()
            .ok_or_else(|| NamespaceError::IsADirectory(path.trim().to_string()))?
            .to_string();

        let now = self.clock.tick();
        self.nodes[id].metadata.atime = now;
        Ok(content)
    }

    /// List a directory's children, or a single self-entry for a file.
    ///
    /// Updates the access time of the listed node.
    pub fn list(&mut self, path: &str) -> NamespaceResult<Vec<ListEntry>> {
        let id = self.resolve(path)?;
        let now = self.clock.tick();
        self.nodes[id].metadata.atime = now;

        let node = &self.nodes[id];
        let entries = match node.children() {
            None => vec![ListEntry::from_node(node)],
            Some(children) => children
                .values()
                .map(|child| ListEntry::from_node(&self.nodes[*child]))
                .collect(),
        };
        Ok(entries)
    }

    /// Change the current working directory; the empty path means the root
    pub fn change_directory(&mut self, path: &str) -> NamespaceResult<()> {
        if path.trim().is_empty() {
            self.cwd = self.root;
            return Ok(());
        }

        let id = self.resolve(path)?;
        if !self.nodes[id].is_dir() {
            return Err(NamespaceError::NotADirectory(path.trim().to_string()));
        }
        self.cwd = id;
        Ok(())
    }

    /// Absolute path of the current working directory
    pub fn current_directory_path(&self) -> String {
        self.path_of(self.cwd)
    }

    /// Absolute path of a node, rebuilt by walking parent links
    pub fn path_of(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = self.nodes.get(id);
        while let Some(node) = current {
            match node.parent {
                Some(parent) => {
                    parts.push(node.name.as_str());
                    current = self.nodes.get(parent);
                }
                None => break,
            }
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Namespace {
        let mut ns = Namespace::new();
        ns.make_directory("/home").unwrap();
        ns.make_directory("/home/user").unwrap();
        ns.write_file("/home/user/notes.txt", "hi").unwrap();
        ns.make_directory("/tmp").unwrap();
        ns
    }

    #[test]
    fn resolve_returns_node_named_after_last_segment() {
        let ns = sample();
        let id = ns.resolve("/home/user/notes.txt").unwrap();
        assert_eq!(ns.node(id).unwrap().name, "notes.txt");

        let id = ns.resolve("//home///user/").unwrap();
        assert_eq!(ns.node(id).unwrap().name, "user");
    }

    #[test]
    fn resolve_dotdot_from_child_returns_parent() {
        let mut ns = sample();
        ns.make_directory("/home/user/child").unwrap();
        ns.change_directory("/home/user/child").unwrap();
        let parent = ns.resolve("..").unwrap();
        assert_eq!(parent, ns.resolve("/home/user").unwrap());
        assert_eq!(ns.resolve("./../..").unwrap(), ns.resolve("/home").unwrap());
    }

    #[test]
    fn resolve_dotdot_at_root_stays_at_root() {
        let ns = sample();
        assert_eq!(ns.resolve("/../..").unwrap(), ns.root());
        assert_eq!(ns.resolve("/../home").unwrap(), ns.resolve("/home").unwrap());
    }

    #[test]
    fn resolve_missing_segment_is_not_found() {
        let ns = sample();
        assert!(matches!(
            ns.resolve("/home/nobody/file"),
            Err(NamespaceError::NotFound(_))
        ));
        assert!(matches!(
            ns.resolve("/home/user/notes.txt/x"),
            Err(NamespaceError::NotADirectory(_))
        ));
    }

    #[test]
    fn resolve_trims_whitespace_and_handles_relative() {
        let mut ns = sample();
        ns.change_directory("/home").unwrap();
        assert_eq!(
            ns.resolve("  user/notes.txt  ").unwrap(),
            ns.resolve("/home/user/notes.txt").unwrap()
        );
        assert_eq!(ns.resolve("").unwrap(), ns.cwd());
    }

    #[test]
    fn mkdir_rejects_collisions_and_missing_parents() {
        let mut ns = sample();
        assert!(matches!(
            ns.make_directory("/home"),
            Err(NamespaceError::AlreadyExists(_))
        ));
        assert!(matches!(
            ns.make_directory("/nope/dir"),
            Err(NamespaceError::NotFound(_))
        ));
        assert!(matches!(
            ns.make_directory("/home/user/notes.txt/dir"),
            Err(NamespaceError::NotADirectory(_))
        ));
        assert!(matches!(
            ns.make_directory("/"),
            Err(NamespaceError::InvalidName(_))
        ));
        assert!(matches!(
            ns.make_directory("/home/.."),
            Err(NamespaceError::InvalidName(_))
        ));
    }

    #[test]
    fn mkdir_sets_metadata_and_parent_mtime() {
        let mut ns = Namespace::new();
        let before = ns.now();
        let id = ns.make_directory("/srv").unwrap();
        let node = ns.node(id).unwrap();
        assert_eq!(node.metadata.owner, DEFAULT_OWNER);
        assert_eq!(node.metadata.permissions, DEFAULT_DIR_MODE);
        assert!(node.metadata.ctime > before);
        assert_eq!(node.parent, Some(ns.root()));
        assert_eq!(ns.node(ns.root()).unwrap().metadata.mtime, node.metadata.ctime);
    }

    #[test]
    fn touch_existing_file_refreshes_mtime_only() {
        let mut ns = sample();
        let id = ns.resolve("/home/user/notes.txt").unwrap();
        let old = ns.node(id).unwrap().metadata.mtime;

        assert_eq!(ns.create_or_touch_file("/home/user/notes.txt").unwrap(), id);
        let node = ns.node(id).unwrap();
        assert!(node.metadata.mtime > old);
        assert_eq!(node.content(), Some("hi"));

        assert!(matches!(
            ns.create_or_touch_file("/home"),
            Err(NamespaceError::IsADirectory(_))
        ));
        assert!(matches!(
            ns.create_or_touch_file("/missing/file"),
            Err(NamespaceError::NotFound(_))
        ));
    }

    #[test]
    fn touch_creates_empty_file() {
        let mut ns = sample();
        let id = ns.create_or_touch_file("/tmp/empty").unwrap();
        let node = ns.node(id).unwrap();
        assert!(node.is_file());
        assert_eq!(node.content(), Some(""));
        assert_eq!(node.metadata.permissions, DEFAULT_FILE_MODE);
    }

    #[test]
    fn remove_file_checks_kind() {
        let mut ns = sample();
        assert!(matches!(
            ns.remove_file("/home/user"),
            Err(NamespaceError::IsADirectory(_))
        ));
        assert!(matches!(
            ns.remove_file("/home/user/ghost"),
            Err(NamespaceError::NotFound(_))
        ));

        let count = ns.node_count();
        ns.remove_file("/home/user/notes.txt").unwrap();
        assert!(!ns.exists("/home/user/notes.txt"));
        assert_eq!(ns.node_count(), count - 1);
    }

    #[test]
    fn remove_non_empty_directory_is_rejected_without_mutation() {
        let mut ns = sample();
        let clock = ns.now();
        let count = ns.node_count();

        for _ in 0..2 {
            assert!(matches!(
                ns.remove_directory("/home/user"),
                Err(NamespaceError::DirectoryNotEmpty(_))
            ));
        }
        assert_eq!(ns.now(), clock);
        assert_eq!(ns.node_count(), count);
        assert!(ns.exists("/home/user/notes.txt"));
    }

    #[test]
    fn remove_directory_rules() {
        let mut ns = sample();
        assert!(matches!(
            ns.remove_directory("/home/user/notes.txt"),
            Err(NamespaceError::NotADirectory(_))
        ));
        assert!(matches!(
            ns.remove_directory("/"),
            Err(NamespaceError::Busy(_))
        ));

        ns.change_directory("/tmp").unwrap();
        assert!(matches!(
            ns.remove_directory("/tmp"),
            Err(NamespaceError::Busy(_))
        ));

        ns.change_directory("/").unwrap();
        ns.remove_directory("/tmp").unwrap();
        assert!(!ns.exists("/tmp"));
    }

    #[test]
    fn write_file_with_missing_parent_creates_nothing() {
        let mut ns = sample();
        let count = ns.node_count();
        let clock = ns.now();
        assert!(matches!(
            ns.write_file("/nowhere/a.txt", "x"),
            Err(NamespaceError::NotFound(_))
        ));
        assert_eq!(ns.node_count(), count);
        assert_eq!(ns.now(), clock);
        assert!(!ns.exists("/nowhere"));
    }

    #[test]
    fn write_file_overwrites_and_rejects_directories() {
        let mut ns = sample();
        ns.write_file("/home/user/notes.txt", "second").unwrap();
        assert_eq!(ns.read_file("/home/user/notes.txt").unwrap(), "second");

        assert!(matches!(
            ns.write_file("/home/user", "x"),
            Err(NamespaceError::IsADirectory(_))
        ));

        let file = ns.stat("/home/user/notes.txt").unwrap().metadata.mtime;
        let parent = ns.stat("/home/user").unwrap().metadata.mtime;
        assert_eq!(file, parent);
    }

    #[test]
    fn read_file_updates_atime() {
        let mut ns = sample();
        let before = ns.stat("/home/user/notes.txt").unwrap().metadata.atime;
        assert_eq!(ns.read_file("/home/user/notes.txt").unwrap(), "hi");
        let after = ns.stat("/home/user/notes.txt").unwrap().metadata.atime;
        assert!(after > before);

        assert!(matches!(
            ns.read_file("/home"),
            Err(NamespaceError::IsADirectory(_))
        ));
        assert!(matches!(
            ns.read_file("/home/none"),
            Err(NamespaceError::NotFound(_))
        ));
    }

    #[test]
    fn list_directory_and_file() {
        let mut ns = sample();
        ns.write_file("/home/user/a.txt", "abc").unwrap();

        let names: Vec<_> = ns
            .list("/home/user")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.txt", "notes.txt"]);

        let entries = ns.list("/home/user/a.txt").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[0].size, 3);

        assert!(ns.list("/absent").is_err());
    }

    #[test]
    fn change_directory_and_pwd() {
        let mut ns = sample();
        assert_eq!(ns.current_directory_path(), "/");

        ns.change_directory("home/user").unwrap();
        assert_eq!(ns.current_directory_path(), "/home/user");

        ns.change_directory("..").unwrap();
        assert_eq!(ns.current_directory_path(), "/home");

        assert!(matches!(
            ns.change_directory("user/notes.txt"),
            Err(NamespaceError::NotADirectory(_))
        ));
        assert!(ns.change_directory("missing").is_err());
        assert_eq!(ns.current_directory_path(), "/home");

        ns.change_directory("").unwrap();
        assert_eq!(ns.current_directory_path(), "/");
    }

    #[test]
    fn clock_ticks_only_on_success() {
        let mut ns = Namespace::new();
        assert_eq!(ns.now(), 0);
        ns.make_directory("/a").unwrap();
        assert_eq!(ns.now(), 1);
        assert!(ns.make_directory("/a").is_err());
        assert_eq!(ns.now(), 1);
        ns.write_file("/a/f", "x").unwrap();
        assert_eq!(ns.now(), 2);
    }

    #[test]
    fn creation_stops_at_max_depth() {
        let mut ns = Namespace::new();
        let mut created = 0;
        for _ in 0..200 {
            if ns.make_directory("d").is_err() {
                break;
            }
            ns.change_directory("d").unwrap();
            created += 1;
        }
        assert_eq!(created, MAX_DEPTH);
        assert_eq!(ns.depth(ns.cwd()), MAX_DEPTH);

        let clock = ns.now();
        let count = ns.node_count();
        assert!(matches!(ns.make_directory("d"), Err(NamespaceError::TooDeep(_))));
        assert!(matches!(
            ns.create_or_touch_file("f"),
            Err(NamespaceError::TooDeep(_))
        ));
        assert!(matches!(ns.write_file("f", "x"), Err(NamespaceError::TooDeep(_))));
        assert_eq!(ns.now(), clock);
        assert_eq!(ns.node_count(), count);

        // Below the limit files can still be created
        ns.change_directory("..").unwrap();
        ns.write_file("f", "x").unwrap();
        assert_eq!(ns.depth(ns.resolve("f").unwrap()), MAX_DEPTH);
    }
}
