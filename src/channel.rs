//! Channels and Sync Triggers
//!
//! The transport exposes a small set of named logical channels. Inbound
//! channels carry sync triggers from the companion device; outbound channels
//! carry the frame streams this engine produces (messages, conversations,
//! presence, notifications).
//!
//! Protocol history note: earlier revisions split the trigger surface into one
//! channel per record kind. The current revision uses the single
//! [`CHANNEL_SYNC_ALL`] trigger with separated outbound streams; the legacy
//! trigger channels survive only as a compatibility mapping onto [`SyncKind`]
//! and can be switched off in configuration.

use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::warn;

/// Legacy trigger: sync short messages only
pub const CHANNEL_SYNC_MESSAGES: &str = "deskbridge.sync.messages";
/// Legacy trigger: sync multimedia messages only
pub const CHANNEL_SYNC_MULTIMEDIA: &str = "deskbridge.sync.multimedia";
/// Legacy trigger: sync conversation summaries only
pub const CHANNEL_SYNC_CONVERSATIONS: &str = "deskbridge.sync.conversations";
/// Canonical trigger: sync conversations and merged messages
pub const CHANNEL_SYNC_ALL: &str = "deskbridge.sync.all";

/// Outbound stream of message frames
pub const CHANNEL_STREAM_MESSAGES: &str = "deskbridge.stream.messages";
/// Outbound stream of conversation frames
pub const CHANNEL_STREAM_CONVERSATIONS: &str = "deskbridge.stream.conversations";
/// Outbound stream of "now playing" presence frames
pub const CHANNEL_STREAM_PRESENCE: &str = "deskbridge.stream.presence";
/// Outbound stream of notification and call frames
pub const CHANNEL_STREAM_NOTIFICATIONS: &str = "deskbridge.stream.notifications";

/// A named logical channel on the device link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Legacy short-message sync trigger
    SyncMessages,
    /// Legacy multimedia-message sync trigger
    SyncMultimedia,
    /// Legacy conversation sync trigger
    SyncConversations,
    /// Canonical unified sync trigger
    SyncAll,
    /// Message frame stream (outbound)
    MessageStream,
    /// Conversation frame stream (outbound)
    ConversationStream,
    /// Presence frame stream (outbound)
    PresenceStream,
    /// Notification/call frame stream (outbound)
    NotificationStream,
}

impl Channel {
    /// The channel's wire identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::SyncMessages => CHANNEL_SYNC_MESSAGES,
            Channel::SyncMultimedia => CHANNEL_SYNC_MULTIMEDIA,
            Channel::SyncConversations => CHANNEL_SYNC_CONVERSATIONS,
            Channel::SyncAll => CHANNEL_SYNC_ALL,
            Channel::MessageStream => CHANNEL_STREAM_MESSAGES,
            Channel::ConversationStream => CHANNEL_STREAM_CONVERSATIONS,
            Channel::PresenceStream => CHANNEL_STREAM_PRESENCE,
            Channel::NotificationStream => CHANNEL_STREAM_NOTIFICATIONS,
        }
    }

    /// Parse a wire identifier into a channel
    pub fn parse_str(s: &str) -> Option<Channel> {
        match s {
            CHANNEL_SYNC_MESSAGES => Some(Channel::SyncMessages),
            CHANNEL_SYNC_MULTIMEDIA => Some(Channel::SyncMultimedia),
            CHANNEL_SYNC_CONVERSATIONS => Some(Channel::SyncConversations),
            CHANNEL_SYNC_ALL => Some(Channel::SyncAll),
            CHANNEL_STREAM_MESSAGES => Some(Channel::MessageStream),
            CHANNEL_STREAM_CONVERSATIONS => Some(Channel::ConversationStream),
            CHANNEL_STREAM_PRESENCE => Some(Channel::PresenceStream),
            CHANNEL_STREAM_NOTIFICATIONS => Some(Channel::NotificationStream),
            _ => None,
        }
    }

    /// Whether this channel carries inbound sync triggers
    pub fn is_trigger(&self) -> bool {
        matches!(
            self,
            Channel::SyncMessages
                | Channel::SyncMultimedia
                | Channel::SyncConversations
                | Channel::SyncAll
        )
    }

    /// Whether this channel carries an outbound frame stream
    pub fn is_stream(&self) -> bool {
        !self.is_trigger()
    }

    /// Whether this channel is part of the legacy per-kind trigger split
    pub fn is_legacy_trigger(&self) -> bool {
        matches!(
            self,
            Channel::SyncMessages | Channel::SyncMultimedia | Channel::SyncConversations
        )
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The scope of one sync session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// Short messages only (legacy)
    Messages,
    /// Multimedia messages only (legacy)
    Multimedia,
    /// Conversation summaries only (legacy)
    Conversations,
    /// Conversations followed by the merged message stream (canonical)
    All,
}

impl SyncKind {
    /// Map a trigger channel to the sync kind it requests
    ///
    /// This is the compatibility shim for the legacy trigger split; the
    /// pipeline itself only ever sees a [`SyncKind`]. Stream channels map to
    /// `None`.
    pub fn from_channel(channel: Channel) -> Option<SyncKind> {
        match channel {
            Channel::SyncMessages => Some(SyncKind::Messages),
            Channel::SyncMultimedia => Some(SyncKind::Multimedia),
            Channel::SyncConversations => Some(SyncKind::Conversations),
            Channel::SyncAll => Some(SyncKind::All),
            _ => None,
        }
    }

    /// Whether this kind pulls from the short-message store
    pub fn wants_short_messages(&self) -> bool {
        matches!(self, SyncKind::Messages | SyncKind::All)
    }

    /// Whether this kind pulls from the multimedia store
    pub fn wants_multimedia(&self) -> bool {
        matches!(self, SyncKind::Multimedia | SyncKind::All)
    }

    /// Whether this kind ships conversation summaries
    pub fn wants_conversations(&self) -> bool {
        matches!(self, SyncKind::Conversations | SyncKind::All)
    }

    /// Short name for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::Messages => "messages",
            SyncKind::Multimedia => "multimedia",
            SyncKind::Conversations => "conversations",
            SyncKind::All => "all",
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An inbound trigger event delivered by the transport
///
/// The payload is opaque to the transport: its presence on a trigger channel
/// is signal enough. When it does parse as JSON carrying a `sync` cursor, the
/// cursor refines the session watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Channel the event arrived on
    pub channel: Channel,
    /// Raw payload bytes, possibly empty
    pub payload: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct TriggerBody {
    #[serde(default, deserialize_with = "deserialize_cursor")]
    sync: Option<i64>,
}

/// Deserialize a cursor that peers send as either a number or a numeric
/// string
fn deserialize_cursor<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(n.as_i64()),
        Some(serde_json::Value::String(s)) => Ok(s.trim().parse().ok()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "sync cursor must be a number or string, got: {}",
            other
        ))),
    }
}

impl TriggerEvent {
    /// Create a trigger event with a raw payload
    pub fn new(channel: Channel, payload: Vec<u8>) -> Self {
        Self { channel, payload }
    }

    /// Create a trigger event with no payload
    pub fn bare(channel: Channel) -> Self {
        Self {
            channel,
            payload: Vec::new(),
        }
    }

    /// Create a trigger event carrying a `sync` cursor (epoch milliseconds)
    pub fn with_cursor(channel: Channel, cursor: i64) -> Self {
        let payload = json!({ "sync": cursor }).to_string().into_bytes();
        Self { channel, payload }
    }

    /// Extract the optional watermark cursor from the payload
    ///
    /// A missing, empty or malformed payload yields `None` (the decode-fault
    /// policy: fall back to the default watermark rather than failing the
    /// session).
    pub fn cursor(&self) -> Option<i64> {
        if self.payload.is_empty() {
            return None;
        }
        match serde_json::from_slice::<TriggerBody>(&self.payload) {
            Ok(body) => body.sync,
            Err(e) => {
                warn!("Malformed trigger payload on {}: {}", self.channel, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CHANNELS: [Channel; 8] = [
        Channel::SyncMessages,
        Channel::SyncMultimedia,
        Channel::SyncConversations,
        Channel::SyncAll,
        Channel::MessageStream,
        Channel::ConversationStream,
        Channel::PresenceStream,
        Channel::NotificationStream,
    ];

    #[test]
    fn test_wire_name_round_trip() {
        for channel in ALL_CHANNELS {
            assert_eq!(Channel::parse_str(channel.as_str()), Some(channel));
        }
    }

    #[test]
    fn test_unknown_channel() {
        assert_eq!(Channel::parse_str("deskbridge.sync.heartrate"), None);
        assert_eq!(Channel::parse_str(""), None);
    }

    #[test]
    fn test_trigger_stream_partition() {
        for channel in ALL_CHANNELS {
            assert_ne!(channel.is_trigger(), channel.is_stream());
        }
        assert!(Channel::SyncAll.is_trigger());
        assert!(!Channel::SyncAll.is_legacy_trigger());
        assert!(Channel::SyncMessages.is_legacy_trigger());
        assert!(Channel::PresenceStream.is_stream());
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            SyncKind::from_channel(Channel::SyncMessages),
            Some(SyncKind::Messages)
        );
        assert_eq!(
            SyncKind::from_channel(Channel::SyncAll),
            Some(SyncKind::All)
        );
        assert_eq!(SyncKind::from_channel(Channel::MessageStream), None);
    }

    #[test]
    fn test_kind_store_selection() {
        assert!(SyncKind::Messages.wants_short_messages());
        assert!(!SyncKind::Messages.wants_multimedia());
        assert!(!SyncKind::Messages.wants_conversations());

        assert!(SyncKind::All.wants_short_messages());
        assert!(SyncKind::All.wants_multimedia());
        assert!(SyncKind::All.wants_conversations());

        assert!(SyncKind::Conversations.wants_conversations());
        assert!(!SyncKind::Conversations.wants_short_messages());
    }

    #[test]
    fn test_cursor_from_number() {
        let event = TriggerEvent::new(Channel::SyncAll, br#"{"sync": 1699000000000}"#.to_vec());
        assert_eq!(event.cursor(), Some(1_699_000_000_000));
    }

    #[test]
    fn test_cursor_from_string() {
        let event = TriggerEvent::new(Channel::SyncAll, br#"{"sync": "1699000000000"}"#.to_vec());
        assert_eq!(event.cursor(), Some(1_699_000_000_000));
    }

    #[test]
    fn test_cursor_absent() {
        assert_eq!(TriggerEvent::bare(Channel::SyncAll).cursor(), None);

        let event = TriggerEvent::new(Channel::SyncAll, br#"{}"#.to_vec());
        assert_eq!(event.cursor(), None);

        let event = TriggerEvent::new(Channel::SyncAll, br#"{"sync": null}"#.to_vec());
        assert_eq!(event.cursor(), None);
    }

    #[test]
    fn test_cursor_malformed_payload() {
        let event = TriggerEvent::new(Channel::SyncAll, b"not json at all".to_vec());
        assert_eq!(event.cursor(), None);

        let event = TriggerEvent::new(Channel::SyncAll, br#"{"sync": "garbage"}"#.to_vec());
        assert_eq!(event.cursor(), None);
    }

    #[test]
    fn test_with_cursor_round_trip() {
        let event = TriggerEvent::with_cursor(Channel::SyncMessages, 42);
        assert_eq!(event.cursor(), Some(42));
        assert_eq!(event.channel, Channel::SyncMessages);
    }
}
