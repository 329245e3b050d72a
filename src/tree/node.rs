//! Directory node data model.
//!
//! Nodes serialize to the document shape clients send and receive:
//!
//! ```json
//! {"id": "...", "name": "docs", "type": "directory", "path": "root/docs", "children": [...]}
//! {"id": "...", "name": "a.txt", "type": "file", "path": "root/docs/a.txt", "links": [...]}
//! ```

use serde::{Deserialize, Serialize};

/// Name and path of every user's root directory.
pub const ROOT_NAME: &str = "root";

/// A file or directory in a user's virtual tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// Unique id, absent on nodes a client has declared but that are not yet stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name, unique among siblings.
    pub name: String,
    /// Slash-separated path used to resolve the parent on insertion.
    #[serde(default)]
    pub path: String,
    /// File or directory payload.
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// What a node holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    /// Chunk locators in chunk-index order.
    File {
        #[serde(default)]
        links: Vec<String>,
    },
    /// Child nodes in display order.
    Directory {
        #[serde(default)]
        children: Vec<DirectoryNode>,
    },
}

/// Node type without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    File,
    Directory,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::File => "file",
            NodeType::Directory => "directory",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DirectoryNode {
    /// A fresh root directory with a new id.
    pub fn root() -> Self {
        let mut root = Self::directory(ROOT_NAME, ROOT_NAME);
        root.id = Some(new_id());
        root
    }

    /// A declared (id-less) directory.
    pub fn directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            path: path.into(),
            kind: NodeKind::Directory {
                children: Vec::new(),
            },
        }
    }

    /// A declared (id-less) file with no links yet.
    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            path: path.into(),
            kind: NodeKind::File { links: Vec::new() },
        }
    }

    /// Builder-style child append; no effect on files.
    pub fn with_child(mut self, child: DirectoryNode) -> Self {
        if let Some(children) = self.children_mut() {
            children.push(child);
        }
        self
    }

    /// Builder-style id setter.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::File { .. } => NodeType::File,
            NodeKind::Directory { .. } => NodeType::Directory,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    /// Children of a directory; empty for files.
    pub fn children(&self) -> &[DirectoryNode] {
        match &self.kind {
            NodeKind::Directory { children } => children,
            NodeKind::File { .. } => &[],
        }
    }

    /// Mutable children of a directory, `None` for files.
    pub fn children_mut(&mut self) -> Option<&mut Vec<DirectoryNode>> {
        match &mut self.kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }

    /// Links of a file, `None` for directories.
    pub fn links(&self) -> Option<&[String]> {
        match &self.kind {
            NodeKind::File { links } => Some(links),
            NodeKind::Directory { .. } => None,
        }
    }

    /// Replace a file's links. Returns false for directories.
    pub fn set_links(&mut self, new_links: Vec<String>) -> bool {
        match &mut self.kind {
            NodeKind::File { links } => {
                *links = new_links;
                true
            }
            NodeKind::Directory { .. } => false,
        }
    }

    /// Number of nodes in this subtree, including self.
    #[cfg(test)]
    pub fn count(&self) -> usize {
        1 + self.children().iter().map(DirectoryNode::count).sum::<usize>()
    }
}

/// Generate a fresh node id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
