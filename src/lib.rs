//! Deskbridge Sync Protocol
//!
//! This library implements the desktop side of the Deskbridge companion
//! protocol: a paired device asks to "catch up" on messaging activity, and
//! the engine answers by merging short and multimedia messages into one
//! contact-enriched stream and delivering it, along with conversation
//! summaries and presence pushes, over channel-addressed frame bursts.

pub mod address;
pub mod channel;
pub mod config;
pub mod contacts;
pub mod conversation;
pub mod delivery;
pub mod frame;
pub mod merge;
pub mod presence;
pub mod record;
pub mod session;
pub mod store;
pub mod transport;
pub mod worker;

mod error;

// Re-export local types
pub use address::NormalizedAddress;
pub use channel::{
    Channel, SyncKind, TriggerEvent, CHANNEL_STREAM_CONVERSATIONS, CHANNEL_STREAM_MESSAGES,
    CHANNEL_STREAM_NOTIFICATIONS, CHANNEL_STREAM_PRESENCE, CHANNEL_SYNC_ALL,
    CHANNEL_SYNC_CONVERSATIONS, CHANNEL_SYNC_MESSAGES, CHANNEL_SYNC_MULTIMEDIA,
};
pub use config::SyncConfig;
pub use contacts::{ContactDirectory, ContactEntry, ContactEnricher, Identity};
pub use delivery::{DeliveryQueue, Transaction};
pub use error::{Result, SyncError};
pub use frame::{
    CallEventKind, CallFrame, ConversationFrame, DevicePush, MessageFrame, NotificationFrame,
};
pub use merge::merge_newest_first;
pub use presence::{PlaybackState, PresenceDebouncer};
pub use record::{ConversationSummary, Direction, MessageRecord};
pub use session::{DeviceHandler, SessionState, SyncReport, SyncSession, SyncStores};
pub use store::{
    ConversationRow, ConversationStore, MultimediaPart, MultimediaRow, MultimediaStore,
    ShortMessageRow, ShortMessageStore, SyncWatermark,
};
pub use transport::{FrameTransport, MemoryTransport};
pub use worker::SessionWorker;

/// Protocol revision we implement.
/// Revision 5 collapsed the three single-kind triggers into `sync-all`.
pub const PROTOCOL_REVISION: u32 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_revision() {
        assert_eq!(PROTOCOL_REVISION, 5);
    }
}
