//! Sync Session Controller
//!
//! Runs one device's catch-up protocol:
//!
//! ```text
//! Idle -> AwaitingTrigger -> Resolving -> Fetching -> Merging -> Delivering -> Idle
//! ```
//!
//! The terminal state is `Idle` on success and failure alike. A failure
//! aborts whatever had not been delivered yet and never re-sends frames a
//! committed burst already flushed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::channel::{Channel, SyncKind, TriggerEvent};
use crate::config::SyncConfig;
use crate::contacts::{ContactDirectory, ContactEnricher};
use crate::conversation;
use crate::delivery::DeliveryQueue;
use crate::error::{Result, SyncError};
use crate::frame::{ConversationFrame, DevicePush, MessageFrame};
use crate::merge::merge_newest_first;
use crate::presence::PresenceDebouncer;
use crate::store::{
    fetch_multimedia_messages, fetch_short_messages, ConversationStore, MultimediaStore,
    ShortMessageStore, SyncWatermark,
};

/// Protocol states of one sync session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingTrigger,
    Resolving,
    Fetching,
    Merging,
    Delivering,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingTrigger => "awaiting-trigger",
            Self::Resolving => "resolving",
            Self::Fetching => "fetching",
            Self::Merging => "merging",
            Self::Delivering => "delivering",
        }
    }

    /// Whether a new trigger may start a session from this state
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Idle | Self::AwaitingTrigger)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What one completed sync delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub kind: SyncKind,
    pub conversations: usize,
    pub messages: usize,
}

/// The message stores one device syncs from
#[derive(Debug, Clone)]
pub struct SyncStores {
    pub short_messages: Arc<dyn ShortMessageStore>,
    pub multimedia: Arc<dyn MultimediaStore>,
    pub conversations: Arc<dyn ConversationStore>,
}

/// Per-device protocol handler
#[async_trait]
pub trait DeviceHandler: Send {
    /// Stable identifier of the paired device
    fn device_id(&self) -> &str;

    /// Trigger channels this handler wants notifications for
    fn channels(&self) -> Vec<Channel>;

    /// Called once after the transport link is up
    async fn initialize(&mut self) -> Result<()>;

    /// Handle a trigger event. Returns `Ok(None)` when the channel is not
    /// one this handler reacts to.
    async fn on_trigger(&mut self, event: TriggerEvent) -> Result<Option<SyncReport>>;

    /// Handle an embedder-side push (notification, call, now-playing)
    async fn on_notification(&mut self, push: DevicePush) -> Result<()>;
}

/// One paired device's sync session
#[derive(Debug)]
pub struct SyncSession {
    device_id: String,
    config: SyncConfig,
    stores: SyncStores,
    directory: Arc<dyn ContactDirectory>,
    queue: DeliveryQueue,
    presence: PresenceDebouncer,
    state: SessionState,
}

impl SyncSession {
    pub fn new(
        device_id: impl Into<String>,
        config: SyncConfig,
        stores: SyncStores,
        directory: Arc<dyn ContactDirectory>,
        queue: DeliveryQueue,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            config,
            stores,
            directory,
            queue,
            presence: PresenceDebouncer::new(),
            state: SessionState::Idle,
        }
    }

    /// Current protocol state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Forget per-link state after a disconnect.
    ///
    /// The presence cache belongs to the link, not the device, so the next
    /// connection starts with a clean slate.
    pub fn reset(&mut self) {
        self.presence.reset();
        self.transition(SessionState::Idle);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(device = %self.device_id, from = %self.state, to = %next, "session state");
        }
        self.state = next;
    }

    /// Map a trigger channel to the sync kind it requests, honoring the
    /// legacy-trigger switch.
    fn dispatch(&self, event: &TriggerEvent) -> Option<SyncKind> {
        let Some(kind) = SyncKind::from_channel(event.channel) else {
            debug!(device = %self.device_id, channel = %event.channel, "channel is not a sync trigger, ignoring");
            return None;
        };
        if event.channel.is_legacy_trigger() && !self.config.accept_legacy_triggers {
            debug!(device = %self.device_id, channel = %event.channel, "legacy trigger ignored");
            return None;
        }
        Some(kind)
    }

    fn resolve_watermark(&self, kind: SyncKind, event: &TriggerEvent) -> SyncWatermark {
        if let Some(cursor) = event.cursor() {
            debug!(device = %self.device_id, cursor, "watermark from trigger cursor");
            return SyncWatermark::new(cursor);
        }
        let now_ms = Utc::now().timestamp_millis();
        SyncWatermark::from_lookback(now_ms, self.config.lookback_for(kind))
    }

    async fn run_sync(&mut self, kind: SyncKind, event: &TriggerEvent) -> Result<SyncReport> {
        self.transition(SessionState::Resolving);
        let watermark = self.resolve_watermark(kind, event);
        info!(
            device = %self.device_id,
            kind = %kind,
            since = watermark.since_millis(),
            "sync session started"
        );

        self.transition(SessionState::Fetching);
        let (short, multimedia) = if kind.wants_short_messages() && kind.wants_multimedia() {
            tokio::join!(
                fetch_short_messages(self.stores.short_messages.as_ref(), watermark),
                fetch_multimedia_messages(self.stores.multimedia.as_ref(), watermark),
            )
        } else if kind.wants_short_messages() {
            let short = fetch_short_messages(self.stores.short_messages.as_ref(), watermark).await;
            (short, Vec::new())
        } else if kind.wants_multimedia() {
            let multimedia =
                fetch_multimedia_messages(self.stores.multimedia.as_ref(), watermark).await;
            (Vec::new(), multimedia)
        } else {
            (Vec::new(), Vec::new())
        };

        self.transition(SessionState::Merging);
        let mut enricher = ContactEnricher::new(Arc::clone(&self.directory));
        let mut records = merge_newest_first(short, multimedia);
        for record in &mut records {
            record.identity = Some(enricher.enrich(&record.address).await);
        }
        let summaries = if kind.wants_conversations() {
            conversation::aggregate(
                self.stores.conversations.as_ref(),
                &mut enricher,
                watermark,
            )
            .await
        } else {
            Vec::new()
        };

        self.transition(SessionState::Delivering);
        let mut conversations = 0;
        if kind.wants_conversations() {
            let mut tx = self.queue.begin(Channel::ConversationStream)?;
            for summary in &summaries {
                tx.write_json(&ConversationFrame::from_summary(summary))?;
            }
            conversations = tx.commit().await?;
        }

        let mut messages = 0;
        if kind.wants_short_messages() || kind.wants_multimedia() {
            let mut tx = self.queue.begin(Channel::MessageStream)?;
            for record in &records {
                tx.write_json(&MessageFrame::from_record(record))?;
            }
            messages = tx.commit().await?;
        }

        info!(
            device = %self.device_id,
            conversations,
            messages,
            resolved = enricher.resolved_count(),
            "sync session delivered"
        );
        Ok(SyncReport {
            kind,
            conversations,
            messages,
        })
    }

    async fn push_single<T: serde::Serialize>(&self, channel: Channel, value: &T) -> Result<()> {
        let mut tx = self.queue.begin(channel)?;
        tx.write_json(value)?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl DeviceHandler for SyncSession {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn channels(&self) -> Vec<Channel> {
        if self.config.accept_legacy_triggers {
            vec![
                Channel::SyncAll,
                Channel::SyncMessages,
                Channel::SyncMultimedia,
                Channel::SyncConversations,
            ]
        } else {
            vec![Channel::SyncAll]
        }
    }

    async fn initialize(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(SyncError::invalid_state(format!(
                "cannot initialize in state {}",
                self.state
            )));
        }
        // The debounce buffer belongs to the link, not the device.
        self.presence.reset();
        info!(device = %self.device_id, channels = ?self.channels(), "session ready");
        self.transition(SessionState::AwaitingTrigger);
        Ok(())
    }

    async fn on_trigger(&mut self, event: TriggerEvent) -> Result<Option<SyncReport>> {
        let Some(kind) = self.dispatch(&event) else {
            return Ok(None);
        };
        if !self.state.is_ready() {
            return Err(SyncError::invalid_state(format!(
                "trigger on {} while {}",
                event.channel, self.state
            )));
        }

        let result = self.run_sync(kind, &event).await;
        self.transition(SessionState::Idle);
        match &result {
            Ok(report) => debug!(device = %self.device_id, ?report, "sync complete"),
            Err(e) => warn!(device = %self.device_id, error = %e, "sync aborted"),
        }
        result.map(Some)
    }

    async fn on_notification(&mut self, push: DevicePush) -> Result<()> {
        let channel = push.stream_channel();
        match push {
            DevicePush::NowPlaying(state) => {
                if !self.presence.offer(&state) {
                    debug!(device = %self.device_id, "playback state unchanged, not pushed");
                    return Ok(());
                }
                self.push_single(channel, &*state).await
            }
            DevicePush::Notification(frame) => self.push_single(channel, &frame).await,
            DevicePush::Call(frame) => self.push_single(channel, &frame).await,
        }
    }
}
