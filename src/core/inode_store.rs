// FILE: src/core/inode_store.rs
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

// SAFETY: Cap the reverse mapping to 65536 nodes.
// The hash is deterministic, so an evicted node is re-learned on the next
// lookup of the same virtual position; only long-idle kernel handles would
// notice, and the attribute TTL is zero anyway.
const NODE_CACHE_CAPACITY: usize = 65536;

/// What a synthetic inode number denotes in the virtual namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// `/<category>` — a synthetic directory materialized from the index.
    Category(String),
    /// `/<name>` — a direct child of the root, backed by a real entry.
    Entry(String),
    /// `/<category>/<name>` — a file addressed through its category.
    CategoryEntry { category: String, name: String },
}

impl Node {
    /// Basename of the backing file, if this node resolves to one.
    pub fn filename(&self) -> Option<&str> {
        match self {
            Node::Category(_) => None,
            Node::Entry(name) => Some(name),
            Node::CategoryEntry { name, .. } => Some(name),
        }
    }
}

/// InodeStore: the authority on which inode number means what.
///
/// `fuser` addresses everything by inode, but the overlay thinks in virtual
/// paths. Each virtual position hashes to a stable inode (high bit set so it
/// never collides with the root's inode 1), and a bounded reverse mapping
/// recovers the node when the kernel comes back with a bare number.
#[derive(Debug)]
pub struct InodeStore {
    nodes: Mutex<LruCache<u64, Node>>,
}

impl Default for InodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeStore {
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(LruCache::new(NonZeroUsize::new(NODE_CACHE_CAPACITY).unwrap())),
        }
    }

    /// Inode of a synthetic category directory: stable hash of the name.
    pub fn category_inode(&self, category: &str) -> u64 {
        let ino = Self::hash_to_inode(category);
        self.remember(ino, Node::Category(category.to_string()));
        ino
    }

    /// Inode of a root entry (`/<name>`).
    pub fn entry_inode(&self, name: &str) -> u64 {
        let ino = Self::hash_to_inode(&format!("/{name}"));
        self.remember(ino, Node::Entry(name.to_string()));
        ino
    }

    /// Inode of a file addressed through a category (`/<category>/<name>`).
    pub fn category_entry_inode(&self, category: &str, name: &str) -> u64 {
        let ino = Self::hash_to_inode(&format!("/{category}/{name}"));
        self.remember(
            ino,
            Node::CategoryEntry {
                category: category.to_string(),
                name: name.to_string(),
            },
        );
        ino
    }

    /// Reverse lookup: what does this inode denote?
    pub fn resolve(&self, ino: u64) -> Option<Node> {
        let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        nodes.get(&ino).cloned()
    }

    fn remember(&self, ino: u64, node: Node) {
        let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        nodes.put(ino, node);
    }

    /// Deterministic hash (high bit set to avoid colliding with inode 1).
    pub fn hash_to_inode(s: &str) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish() | 0x8000000000000000
    }
}
