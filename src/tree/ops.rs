//! Tree operations: id assignment, search, path insertion and deletion.

use super::node::{new_id, DirectoryNode, NodeKind, NodeType};
use crate::{DspaceError, Result};

/// Node field a search can match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeField {
    Id,
    Name,
    Path,
}

impl NodeField {
    fn matches(&self, node: &DirectoryNode, value: &str) -> bool {
        match self {
            NodeField::Id => node.id.as_deref() == Some(value),
            NodeField::Name => node.name == value,
            NodeField::Path => node.path == value,
        }
    }
}

/// Give `node` and every descendant a fresh id.
pub fn assign_ids(node: &mut DirectoryNode) {
    node.id = Some(new_id());
    if let Some(children) = node.children_mut() {
        children.iter_mut().for_each(assign_ids);
    }
}

/// First node in pre-order (self, then children in order) whose `field` equals `value`.
pub fn find_by_field<'a>(
    node: &'a DirectoryNode,
    field: NodeField,
    value: &str,
) -> Option<&'a DirectoryNode> {
    if field.matches(node, value) {
        return Some(node);
    }
    node.children()
        .iter()
        .find_map(|child| find_by_field(child, field, value))
}

/// Mutable variant of [`find_by_field`].
pub fn find_by_field_mut<'a>(
    node: &'a mut DirectoryNode,
    field: NodeField,
    value: &str,
) -> Option<&'a mut DirectoryNode> {
    if field.matches(node, value) {
        return Some(node);
    }
    match &mut node.kind {
        NodeKind::Directory { children } => children
            .iter_mut()
            .find_map(|child| find_by_field_mut(child, field, value)),
        NodeKind::File { .. } => None,
    }
}

/// Parent directory of a slash-separated path, or `None` for top-level paths.
fn parent_path(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() && parent != "." => Some(parent),
        _ => None,
    }
}

/// Last segment of a slash-separated path.
fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Attach `node` to the directory its path names as parent.
///
/// The parent is the first directory in pre-order whose path equals the
/// node's parent path. Missing ancestors are created top-down until an
/// existing directory (or the root) is reached. A node whose path is the
/// root's own path is the root and is left alone. Top-level paths attach
/// directly to the root.
pub fn insert_by_path(node: DirectoryNode, root: &mut DirectoryNode) -> Result<()> {
    if node.path == root.path {
        return Ok(());
    }

    let parent = parent_path(&node.path)
        .filter(|parent| *parent != root.path)
        .map(str::to_string);
    let Some(parent) = parent else {
        return merge_child(root, node);
    };

    match find_by_field_mut(root, NodeField::Path, &parent) {
        Some(existing) => merge_child(existing, node),
        None => {
            let synthesized = DirectoryNode::directory(base_name(&parent), parent.as_str())
                .with_id(new_id())
                .with_child(node);
            insert_by_path(synthesized, root)
        }
    }
}

/// Add `node` to `parent`'s children, keeping sibling names unique.
///
/// A file replaces a same-named file in place. A directory is merged into a
/// same-named directory child by child.
pub fn merge_child(parent: &mut DirectoryNode, node: DirectoryNode) -> Result<()> {
    let parent_label = parent.path.clone();
    let children = parent.children_mut().ok_or_else(|| {
        DspaceError::Validation(format!("cannot add {} under file {}", node.name, parent_label))
    })?;

    let Some(index) = children.iter().position(|c| c.name == node.name) else {
        children.push(node);
        return Ok(());
    };

    let existing = &mut children[index];
    match (existing.node_type(), node.node_type()) {
        (NodeType::File, NodeType::File) => {
            *existing = node;
            Ok(())
        }
        (NodeType::Directory, NodeType::Directory) => {
            if let NodeKind::Directory { children: incoming } = node.kind {
                for child in incoming {
                    merge_child(existing, child)?;
                }
            }
            Ok(())
        }
        (existing_type, new_type) => Err(DspaceError::Validation(format!(
            "{} already exists as a {}, cannot store a {} with that name",
            node.name, existing_type, new_type
        ))),
    }
}

/// Remove the first node in pre-order whose id is `id`, with its subtree.
///
/// The root itself is never removed. Returns whether a node was removed.
pub fn delete_by_id(root: &mut DirectoryNode, id: &str) -> bool {
    let Some(children) = root.children_mut() else {
        return false;
    };

    for index in 0..children.len() {
        if children[index].id.as_deref() == Some(id) {
            children.remove(index);
            return true;
        }
        if delete_by_id(&mut children[index], id) {
            return true;
        }
    }
    false
}

/// Every descendant of `node` in pre-order, with its path relative to `node`.
pub fn descendants(node: &DirectoryNode) -> Vec<(String, &DirectoryNode)> {
    fn walk<'a>(node: &'a DirectoryNode, prefix: &str, out: &mut Vec<(String, &'a DirectoryNode)>) {
        for child in node.children() {
            let path = if prefix.is_empty() {
                child.name.clone()
            } else {
                format!("{}/{}", prefix, child.name)
            };
            out.push((path.clone(), child));
            walk(child, &path, out);
        }
    }

    let mut out = Vec::new();
    walk(node, "", &mut out);
    out
}

/// Reject names that cannot be used as a single path segment.
pub fn validate_names(node: &DirectoryNode) -> Result<()> {
    let name = node.name.as_str();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(DspaceError::Validation(format!("invalid node name: {:?}", name)));
    }
    node.children().iter().try_for_each(validate_names)
}
