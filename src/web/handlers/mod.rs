//! API handlers.

mod directory;
mod storage;

pub use directory::*;
pub use storage::*;

use std::sync::Arc;

use crate::db::Database;
use crate::storage::ChunkStore;

/// Shared database handle.
pub type SharedDatabase = Arc<Database>;

/// State shared by every handler.
pub struct AppState {
    /// Users and their directory documents.
    pub db: SharedDatabase,
    /// Chunk store bound to a logged-in platform session.
    pub store: Arc<ChunkStore>,
    /// User acting on requests without a user header.
    pub default_user: String,
    /// Largest accepted request body, in bytes.
    pub max_upload_size: usize,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        db: SharedDatabase,
        store: Arc<ChunkStore>,
        default_user: impl Into<String>,
        max_upload_size: usize,
    ) -> Self {
        Self {
            db,
            store,
            default_user: default_user.into(),
            max_upload_size,
        }
    }
}
