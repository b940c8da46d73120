//! Wire Frames
//!
//! JSON payloads written to the stream channels, one record per frame.
//!
//! Message frame:
//! ```json
//! {
//!     "messageId": "sms_42",
//!     "conversationId": 7,
//!     "date": 1700000000000,
//!     "number": "5551234567",
//!     "direction": "inbox",
//!     "content": "hello",
//!     "name": "Alice Example",
//!     "email": "alice@example.com",
//!     "image": "https://www.gravatar.com/avatar/..."
//! }
//! ```
//!
//! Conversation frame:
//! ```json
//! {
//!     "id": 7,
//!     "snippet": "see you there",
//!     "isGroup": false,
//!     "count": 25,
//!     "date": 1700000000000,
//!     "name": "Alice Example",
//!     "email": "alice@example.com",
//!     "image": "https://www.gravatar.com/avatar/..."
//! }
//! ```
//!
//! Call and notification frames share the notification stream; receivers
//! dispatch on the presence of the `number` field.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::contacts::Identity;
use crate::presence::PlaybackState;
use crate::record::{ConversationSummary, Direction, MessageRecord};

/// One message on the message stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFrame {
    pub message_id: String,
    pub conversation_id: i64,
    /// Epoch milliseconds
    pub date: i64,
    pub number: String,
    pub direction: Direction,
    pub content: String,
    pub name: String,
    pub email: String,
    pub image: String,
}

impl MessageFrame {
    /// Build the frame for a record, falling back to the unknown identity
    pub fn from_record(record: &MessageRecord) -> Self {
        let identity = record.identity.clone().unwrap_or_else(Identity::unknown);
        Self {
            message_id: record.message_id.clone(),
            conversation_id: record.conversation_id,
            date: record.timestamp,
            number: record.address.as_str().to_string(),
            direction: record.direction,
            content: record.content.clone(),
            name: identity.display_name,
            email: identity.email,
            image: identity.avatar_url,
        }
    }
}

/// One conversation on the conversation stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationFrame {
    pub id: i64,
    pub snippet: String,
    pub is_group: bool,
    pub count: i64,
    /// Epoch milliseconds of the last activity
    pub date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl ConversationFrame {
    /// Build the frame for a summary. Identity fields ride along only for
    /// one-on-one conversations.
    pub fn from_summary(summary: &ConversationSummary) -> Self {
        let identity = summary.identity.clone();
        Self {
            id: summary.conversation_id,
            snippet: summary.snippet.clone(),
            is_group: summary.is_group,
            count: summary.message_count,
            date: summary.last_activity,
            name: identity.as_ref().map(|i| i.display_name.clone()),
            email: identity.as_ref().map(|i| i.email.clone()),
            image: identity.map(|i| i.avatar_url),
        }
    }
}

/// Call lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallEventKind {
    #[serde(rename = "ringing")]
    Ringing,
    #[serde(rename = "talking")]
    Talking,
    #[serde(rename = "missedCall")]
    MissedCall,
    #[serde(rename = "ended")]
    Ended,
}

impl CallEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ringing => "ringing",
            Self::Talking => "talking",
            Self::MissedCall => "missedCall",
            Self::Ended => "ended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ringing" => Some(Self::Ringing),
            "talking" => Some(Self::Talking),
            "missedCall" => Some(Self::MissedCall),
            "ended" => Some(Self::Ended),
            _ => None,
        }
    }
}

/// One call event on the notification stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    pub event: CallEventKind,
    pub number: String,
    pub name: String,
}

/// One app notification on the notification stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFrame {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Embedder-side events pushed at the device outside a sync session
#[derive(Debug, Clone)]
pub enum DevicePush {
    Notification(NotificationFrame),
    Call(CallFrame),
    NowPlaying(Arc<PlaybackState>),
}

impl DevicePush {
    /// Stream channel this push is delivered on
    pub fn stream_channel(&self) -> Channel {
        match self {
            Self::Notification(_) | Self::Call(_) => Channel::NotificationStream,
            Self::NowPlaying(_) => Channel::PresenceStream,
        }
    }
}
