//! Chunked blob storage on a message platform.
//!
//! Files are split into fixed-size chunks. Each chunk is posted as one
//! attachment on a channel picked round-robin from the pool, and the
//! returned [`ChunkLocator`]s, kept in chunk order, are the only record
//! of where the file lives.

pub mod archive;
pub mod chunk_store;
pub mod discord;
pub mod distributor;
pub mod label;
pub mod locator;
pub mod memory;
pub mod platform;
pub mod retry;

pub use archive::{ArchiveBuilder, ArchiveEntry};
pub use chunk_store::{ChunkStore, RetrievedFile};
pub use discord::DiscordPlatform;
pub use distributor::ChannelDistributor;
pub use label::{extension_of, ChunkKind, ChunkLabel};
pub use locator::ChunkLocator;
pub use memory::MemoryPlatform;
pub use platform::{Attachment, Channel, StoragePlatform};
pub use retry::RetryPolicy;
