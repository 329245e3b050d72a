//! Request-scoped orchestration over the chunk store and directory trees.

mod delete;
mod directory;
mod retrieval;
mod upload;

pub use delete::{delete_node, DeleteOutcome};
pub use directory::{get_directory, update_directory, MAX_UPDATE_ATTEMPTS};
pub use retrieval::{archive_entries, ArchiveStream, Retrieval, RetrievalService};
pub use upload::{UploadOutcome, UploadRequest, UploadService, UploadedFile};
