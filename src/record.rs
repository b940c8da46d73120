//! Message Records and Conversation Summaries
//!
//! The normalized shapes the merge pipeline works with. Raw store rows are
//! converted into [`MessageRecord`]s by the source adapter (`store` module);
//! conversation rows become [`ConversationSummary`]s in the aggregator. Both
//! carry timestamps in epoch milliseconds regardless of the source store's
//! native unit.

use serde::{Deserialize, Serialize};

use crate::address::NormalizedAddress;
use crate::contacts::Identity;

/// Store box type for received messages
pub const BOX_TYPE_INBOX: i32 = 1;
/// Store box type for sent messages
pub const BOX_TYPE_SENT: i32 = 2;
/// Store box type for queued outgoing messages
pub const BOX_TYPE_OUTBOX: i32 = 4;

/// Substitute body for a multimedia message with no renderable content
pub const PLACEHOLDER_MULTIMEDIA: &str = "[Multimedia Item]";
/// Substitute body contributed by an image part
pub const PLACEHOLDER_IMAGE: &str = "[Image]";
/// Substitute body contributed by a video part
pub const PLACEHOLDER_VIDEO: &str = "[Video]";

/// Prefix tagging record ids that originate from the short-message store
pub const SHORT_ID_PREFIX: &str = "sms_";
/// Prefix tagging record ids that originate from the multimedia store
pub const MULTIMEDIA_ID_PREFIX: &str = "mms_";

/// Build a globally unique record id for a short-message store row
pub fn short_message_id(store_id: i64) -> String {
    format!("{SHORT_ID_PREFIX}{store_id}")
}

/// Build a globally unique record id for a multimedia store row
pub fn multimedia_message_id(store_id: i64) -> String {
    format!("{MULTIMEDIA_ID_PREFIX}{store_id}")
}

/// Direction of a message, in wire vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received message
    Inbox,
    /// Sent message
    Sent,
    /// Queued outgoing message
    Outbox,
}

impl Direction {
    /// Wire string for this direction
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbox => "inbox",
            Direction::Sent => "sent",
            Direction::Outbox => "outbox",
        }
    }

    /// Map a short-message store box type to a direction
    ///
    /// Box types other than inbox/outbox (drafts, failed, queued) surface as
    /// `sent`, matching how the companion renders them.
    pub fn from_box_type(box_type: i32) -> Direction {
        match box_type {
            BOX_TYPE_INBOX => Direction::Inbox,
            BOX_TYPE_OUTBOX => Direction::Outbox,
            _ => Direction::Sent,
        }
    }

    /// Map a multimedia store box type to a direction
    ///
    /// The multimedia store only distinguishes received from everything else.
    pub fn from_multimedia_box_type(box_type: i32) -> Direction {
        if box_type == BOX_TYPE_INBOX {
            Direction::Inbox
        } else {
            Direction::Sent
        }
    }

    /// Whether this direction is inbound
    pub fn is_inbound(&self) -> bool {
        matches!(self, Direction::Inbox)
    }
}

/// One communication event, normalized from either store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Globally unique id, tagged with the origin store (`sms_`/`mms_`)
    pub message_id: String,

    /// Conversation/thread the record belongs to
    pub conversation_id: i64,

    /// Epoch milliseconds, normalized regardless of source store
    pub timestamp: i64,

    /// Message direction
    pub direction: Direction,

    /// Message body; never empty (non-text payloads carry a placeholder)
    pub content: String,

    /// Counterparty address in canonical form
    pub address: NormalizedAddress,

    /// Sender identity, attached after merge
    pub identity: Option<Identity>,
}

impl MessageRecord {
    /// Whether the record is an inbound message
    pub fn is_inbound(&self) -> bool {
        self.direction.is_inbound()
    }
}

/// Summary of one conversation with recent activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation/thread id
    pub conversation_id: i64,

    /// Number of messages in the conversation
    pub message_count: i64,

    /// Whether more than one participant is involved
    pub is_group: bool,

    /// Most recent message content
    pub snippet: String,

    /// Timestamp of the most recent activity, epoch milliseconds
    pub last_activity: i64,

    /// Unread indicator; the raw store exposes a read bit, not a count
    pub unread_count: i64,

    /// Identity of the single participant; only populated for 1:1 threads
    pub identity: Option<Identity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_box_type() {
        assert_eq!(Direction::from_box_type(BOX_TYPE_INBOX), Direction::Inbox);
        assert_eq!(Direction::from_box_type(BOX_TYPE_SENT), Direction::Sent);
        assert_eq!(Direction::from_box_type(BOX_TYPE_OUTBOX), Direction::Outbox);
        // Drafts and failed messages render as sent
        assert_eq!(Direction::from_box_type(3), Direction::Sent);
        assert_eq!(Direction::from_box_type(5), Direction::Sent);
    }

    #[test]
    fn test_direction_from_multimedia_box_type() {
        assert_eq!(
            Direction::from_multimedia_box_type(BOX_TYPE_INBOX),
            Direction::Inbox
        );
        assert_eq!(Direction::from_multimedia_box_type(2), Direction::Sent);
        assert_eq!(Direction::from_multimedia_box_type(4), Direction::Sent);
    }

    #[test]
    fn test_direction_wire_values() {
        assert_eq!(
            serde_json::to_string(&Direction::Inbox).unwrap(),
            r#""inbox""#
        );
        assert_eq!(serde_json::to_string(&Direction::Sent).unwrap(), r#""sent""#);
        assert_eq!(
            serde_json::to_string(&Direction::Outbox).unwrap(),
            r#""outbox""#
        );
        assert!(Direction::Inbox.is_inbound());
        assert!(!Direction::Outbox.is_inbound());
    }

    #[test]
    fn test_id_tagging_prevents_collision() {
        // The same numeric store id must map to distinct record ids
        assert_eq!(short_message_id(17), "sms_17");
        assert_eq!(multimedia_message_id(17), "mms_17");
        assert_ne!(short_message_id(17), multimedia_message_id(17));
    }
}
