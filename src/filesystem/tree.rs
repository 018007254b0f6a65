//! Path-indexed tree shared by the in-memory and archive sources

use std::collections::{BTreeSet, HashMap};
use std::time::SystemTime;

use crate::error::{Result, VfsError};
use crate::filesystem::{DirEntry, Metadata};
use crate::path;

pub(crate) enum Node<T> {
    File { info: Metadata, payload: T },
    Dir { info: Metadata, children: BTreeSet<String> },
}

impl<T> Node<T> {
    pub(crate) fn info(&self) -> &Metadata {
        match self {
            Node::File { info, .. } | Node::Dir { info, .. } => info,
        }
    }
}

/// Flat map from full path to node; directories keep their children sorted
pub(crate) struct Tree<T> {
    nodes: HashMap<String, Node<T>>,
}

impl<T> Tree<T> {
    pub(crate) fn new(root_mtime: Option<SystemTime>) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            path::ROOT.to_string(),
            Node::Dir {
                info: Metadata::directory(path::ROOT, root_mtime),
                children: BTreeSet::new(),
            },
        );
        Self { nodes }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Node<T>> {
        self.nodes.get(name)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Insert a directory and any missing parents
    pub(crate) fn insert_dir(&mut self, name: &str, mtime: Option<SystemTime>) -> Result<()> {
        if name == path::ROOT {
            return Ok(());
        }
        self.ensure_parents(name, mtime)?;
        match self.nodes.get(name) {
            Some(Node::Dir { .. }) => Ok(()),
            Some(Node::File { .. }) => Err(VfsError::not_a_directory("mkdir", name)),
            None => {
                self.nodes.insert(
                    name.to_string(),
                    Node::Dir {
                        info: Metadata::directory(path::base(name), mtime),
                        children: BTreeSet::new(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Insert a file, creating missing parents; a later insert replaces an earlier one
    pub(crate) fn insert_file(&mut self, name: &str, info: Metadata, payload: T) -> Result<()> {
        if name == path::ROOT {
            return Err(VfsError::invalid_path("create", name));
        }
        self.ensure_parents(name, info.mtime)?;
        if let Some(Node::Dir { .. }) = self.nodes.get(name) {
            return Err(VfsError::invalid_path("create", name));
        }
        self.nodes
            .insert(name.to_string(), Node::File { info, payload });
        Ok(())
    }

    /// Entries of a directory in name order
    pub(crate) fn listing(&self, name: &str) -> Option<Vec<DirEntry>> {
        let Node::Dir { children, .. } = self.nodes.get(name)? else {
            return None;
        };
        Some(
            children
                .iter()
                .filter_map(|child| self.nodes.get(&path::join(name, child)))
                .map(|node| DirEntry::new(node.info().clone()))
                .collect(),
        )
    }

    fn ensure_parents(&mut self, name: &str, mtime: Option<SystemTime>) -> Result<()> {
        let mut child = name;
        loop {
            let parent = path::parent(child);
            let child_base = path::base(child).to_string();
            match self.nodes.get_mut(parent) {
                Some(Node::Dir { children, .. }) => {
                    children.insert(child_base);
                    return Ok(());
                }
                Some(Node::File { .. }) => {
                    return Err(VfsError::not_a_directory("mkdir", parent));
                }
                None => {
                    let mut children = BTreeSet::new();
                    children.insert(child_base);
                    self.nodes.insert(
                        parent.to_string(),
                        Node::Dir {
                            info: Metadata::directory(path::base(parent), mtime),
                            children,
                        },
                    );
                    child = parent;
                }
            }
        }
    }
}
