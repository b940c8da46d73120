//! Frame Transport
//!
//! The seam between the sync engine and whatever link carries frames to the
//! companion device. The engine only ever needs "write this payload on this
//! channel"; framing, encryption, and reconnection live below this trait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::channel::Channel;
use crate::error::{Result, SyncError};

/// Channel-addressed frame sink
#[async_trait]
pub trait FrameTransport: Send + Sync + std::fmt::Debug {
    /// Write one payload on `channel`.
    ///
    /// An error means the link is unusable for the rest of the burst.
    async fn write_frame(&mut self, channel: Channel, payload: &[u8]) -> Result<()>;
}

/// In-memory transport that captures written frames.
///
/// Clones share the same capture buffer, so a test can keep one handle
/// while the engine owns another.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    frames: Arc<Mutex<Vec<(Channel, Vec<u8>)>>>,
    connected: Arc<AtomicBool>,
}

impl MemoryTransport {
    /// Create a connected transport with an empty capture buffer
    pub fn new() -> Self {
        Self {
            frames: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulate the link going down (or coming back)
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// All captured frames, in write order
    pub fn frames(&self) -> Vec<(Channel, Vec<u8>)> {
        self.frames.lock().unwrap().clone()
    }

    /// Captured payloads written on one channel, in write order
    pub fn frames_for(&self, channel: Channel) -> Vec<Vec<u8>> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Drop everything captured so far
    pub fn clear(&self) {
        self.frames.lock().unwrap().clear();
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameTransport for MemoryTransport {
    async fn write_frame(&mut self, channel: Channel, payload: &[u8]) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::Disconnected);
        }
        self.frames
            .lock()
            .unwrap()
            .push((channel, payload.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_captured_in_order() {
        let mut transport = MemoryTransport::new();
        transport
            .write_frame(Channel::MessageStream, b"one")
            .await
            .unwrap();
        transport
            .write_frame(Channel::ConversationStream, b"two")
            .await
            .unwrap();
        transport
            .write_frame(Channel::MessageStream, b"three")
            .await
            .unwrap();

        let frames = transport.frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].0, Channel::MessageStream);
        assert_eq!(frames[1].1, b"two");

        let messages = transport.frames_for(Channel::MessageStream);
        assert_eq!(messages, vec![b"one".to_vec(), b"three".to_vec()]);
    }

    #[tokio::test]
    async fn test_disconnected_write_fails() {
        let mut transport = MemoryTransport::new();
        transport.set_connected(false);

        let err = transport
            .write_frame(Channel::MessageStream, b"lost")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Disconnected));
        assert!(transport.frames().is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_capture_buffer() {
        let mut transport = MemoryTransport::new();
        let observer = transport.clone();

        transport
            .write_frame(Channel::PresenceStream, b"state")
            .await
            .unwrap();
        assert_eq!(observer.frames().len(), 1);

        observer.clear();
        assert!(transport.frames().is_empty());
    }
}
