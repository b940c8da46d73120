//! Transactional Delivery
//!
//! Frames for one channel are staged in a [`Transaction`] and written as a
//! single burst on commit. While a burst is being written the transport is
//! held exclusively, so frames from different channels never interleave.
//!
//! At most one transaction may be open per channel. Dropping a transaction
//! without committing discards everything it staged and releases the
//! channel claim.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::channel::Channel;
use crate::error::{Result, SyncError};
use crate::transport::FrameTransport;

/// Hands out per-channel delivery transactions over a shared transport
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    transport: Arc<Mutex<Box<dyn FrameTransport>>>,
    open: Arc<StdMutex<HashSet<Channel>>>,
}

impl DeliveryQueue {
    /// Create a queue writing to `transport`
    pub fn new<T: FrameTransport + 'static>(transport: T) -> Self {
        Self {
            transport: Arc::new(Mutex::new(Box::new(transport))),
            open: Arc::new(StdMutex::new(HashSet::new())),
        }
    }

    /// Open a transaction on `channel`.
    ///
    /// Fails fast with [`SyncError::TransactionInFlight`] if the channel
    /// already has one open.
    pub fn begin(&self, channel: Channel) -> Result<Transaction> {
        let mut open = self
            .open
            .lock()
            .map_err(|_| SyncError::invalid_state("delivery queue lock poisoned"))?;
        if !open.insert(channel) {
            return Err(SyncError::TransactionInFlight(channel));
        }

        Ok(Transaction {
            transport: Arc::clone(&self.transport),
            open: Arc::clone(&self.open),
            channel,
            frames: Vec::new(),
            committed: false,
        })
    }
}

/// One channel's staged burst
#[derive(Debug)]
pub struct Transaction {
    transport: Arc<Mutex<Box<dyn FrameTransport>>>,
    open: Arc<StdMutex<HashSet<Channel>>>,
    channel: Channel,
    frames: Vec<Vec<u8>>,
    committed: bool,
}

impl Transaction {
    /// Channel this transaction will deliver on
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Number of staged frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether nothing has been staged yet
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Stage a raw payload
    pub fn write(&mut self, payload: Vec<u8>) {
        self.frames.push(payload);
    }

    /// Serialize `value` as JSON and stage it
    pub fn write_json<T: Serialize>(&mut self, value: &T) -> Result<()> {
        self.frames.push(serde_json::to_vec(value)?);
        Ok(())
    }

    /// Write the staged frames to the transport in append order.
    ///
    /// The transport is held for the whole burst. A write failure aborts
    /// the remainder of the burst and propagates; the channel claim is
    /// released either way. Returns the number of frames written.
    pub async fn commit(mut self) -> Result<usize> {
        let frames = std::mem::take(&mut self.frames);
        let count = frames.len();

        let mut transport = self.transport.lock().await;
        for frame in &frames {
            transport.write_frame(self.channel, frame).await?;
        }
        drop(transport);

        self.committed = true;
        debug!(channel = %self.channel, frames = count, "committed delivery burst");
        Ok(count)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.committed && !self.frames.is_empty() {
            debug!(
                channel = %self.channel,
                staged = self.frames.len(),
                "transaction dropped, discarding staged frames"
            );
        }
        match self.open.lock() {
            Ok(mut open) => {
                open.remove(&self.channel);
            }
            Err(poisoned) => {
                poisoned.into_inner().remove(&self.channel);
            }
        }
    }
}
