//! Per-user virtual directory tree.
//!
//! The tree holds no bytes. File nodes carry the ordered chunk locators
//! produced by the chunk store; directories carry their children.

mod node;
mod ops;

pub use node::{new_id, DirectoryNode, NodeKind, NodeType, ROOT_NAME};
pub use ops::{
    assign_ids, delete_by_id, descendants, find_by_field, find_by_field_mut, insert_by_path,
    merge_child, validate_names, NodeField,
};
