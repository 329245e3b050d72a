//! Dspace - per-user file storage on a chat platform
//!
//! Files are split into chunks, each chunk is posted as a message attachment
//! across a pool of channels, and every user keeps a virtual directory tree
//! whose file nodes point at those messages.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod service;
pub mod storage;
pub mod tree;
pub mod web;

pub use config::Config;
pub use db::{Database, User, UserRepository};
pub use error::{DspaceError, Result};
pub use storage::{ChunkStore, StoragePlatform};
pub use tree::DirectoryNode;
