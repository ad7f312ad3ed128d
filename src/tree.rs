use crate::settings::expand_home;
use crate::structs::Resource;

use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(usize);

#[derive(Debug, Serialize)]
struct Node {
    resource: Resource,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Resources of one site, nested the way the listing indents them.
///
/// Nodes live in an arena in row order; the first row is the root.
#[derive(Debug, Serialize)]
pub struct ResourceTree {
    nodes: Vec<Node>,
    root_path: PathBuf,
}

impl ResourceTree {
    /// Rebuilds nesting from indentation. Returns `None` for an empty listing.
    ///
    /// Indentation is trusted as is: a row that jumps several levels deeper
    /// simply becomes a child of the innermost open row.
    pub fn build<I>(resources: I) -> Option<Self>
    where
        I: IntoIterator<Item = Resource>,
    {
        let mut nodes: Vec<Node> = Vec::new();
        let mut open: Vec<NodeId> = Vec::new();

        for resource in resources {
            let id = NodeId(nodes.len());
            let indent = resource.indent;
            nodes.push(Node {
                resource,
                parent: None,
                children: Vec::new(),
            });

            open.truncate(indent);
            open.push(id);
            if open.len() > 1 {
                let parent = open[open.len() - 2];
                nodes[parent.0].children.push(id);
                nodes[id.0].parent = Some(parent);
            }
        }

        if nodes.is_empty() {
            return None;
        }
        Some(ResourceTree {
            nodes,
            root_path: PathBuf::new(),
        })
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Every parentless node, in row order. Normally just the root.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids().filter(|&id| self.nodes[id.0].parent.is_none())
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn resource(&self, id: NodeId) -> &Resource {
        &self.nodes[id.0].resource
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn set_root_path(&mut self, path: impl Into<PathBuf>) {
        self.root_path = path.into();
    }

    /// Where the node's contents belong locally: the root path followed by
    /// the titles of the folders between the root and this node, the node
    /// itself included when it is a folder.
    pub fn local_directory(&self, id: NodeId) -> PathBuf {
        let mut folders = Vec::new();
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            let resource = &self.nodes[current.0].resource;
            if resource.filetype.is_folder() {
                folders.push(resource.title.as_str());
            }
            current = parent;
        }

        let mut dir = self.root_path.clone();
        for title in folders.into_iter().rev() {
            dir.push(title);
        }
        dir
    }

    /// Pre-order walk over every root, pruning any node (and its subtree)
    /// whose home-expanded local directory is in `skip`.
    ///
    /// Paths are compared component-wise, so `/x/a/` and `/x/a` are the
    /// same entry.
    pub fn walk<'a>(&'a self, skip: &'a [PathBuf]) -> Walk<'a> {
        let mut pending: Vec<NodeId> = self.roots().collect();
        pending.reverse();
        Walk {
            tree: self,
            skip,
            pending,
        }
    }
}

pub struct Walk<'a> {
    tree: &'a ResourceTree,
    skip: &'a [PathBuf],
    pending: Vec<NodeId>,
}

impl Iterator for Walk<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(id) = self.pending.pop() {
            let dir = expand_home(self.tree.local_directory(id));
            if self.skip.iter().any(|s| *s == dir) {
                log::info!("skipping {}", dir.display());
                continue;
            }
            self.pending
                .extend(self.tree.children(id).iter().rev().copied());
            return Some(id);
        }
        None
    }
}
