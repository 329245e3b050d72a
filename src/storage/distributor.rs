//! Round-robin channel assignment.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::platform::Channel;
use crate::{DspaceError, Result};

/// Hands out storage channels in a fixed cyclic order.
///
/// The cursor is advanced with a single atomic read-modify-write, so two
/// concurrent `next()` calls never observe the same cursor value.
#[derive(Debug)]
pub struct ChannelDistributor {
    channels: Vec<Channel>,
    cursor: AtomicUsize,
}

impl ChannelDistributor {
    /// Create a distributor over a non-empty channel pool.
    pub fn new(channels: Vec<Channel>) -> Result<Self> {
        if channels.is_empty() {
            return Err(DspaceError::Config(
                "channel pool must contain at least one channel".to_string(),
            ));
        }

        Ok(Self {
            channels,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Return the channel at the cursor and advance it.
    pub fn next(&self) -> Channel {
        let len = self.channels.len();
        let index = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
            .unwrap_or_else(|c| c);
        self.channels[index].clone()
    }

    /// Index of the channel the next call will return.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// The channel pool, in assignment order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Number of channels in the pool.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Always false; an empty pool is rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
