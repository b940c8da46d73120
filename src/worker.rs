//! Session Worker
//!
//! One task per paired device. Commands are queued and handled strictly in
//! arrival order, so two triggers can never run overlapping sync sessions
//! against the same device's channels.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::channel::TriggerEvent;
use crate::error::{Result, SyncError};
use crate::frame::DevicePush;
use crate::session::{DeviceHandler, SyncReport};

const COMMAND_QUEUE_DEPTH: usize = 32;

enum SessionCommand {
    Trigger(TriggerEvent, oneshot::Sender<Result<Option<SyncReport>>>),
    Push(DevicePush, oneshot::Sender<Result<()>>),
}

/// Handle to a device's session task
#[derive(Debug)]
pub struct SessionWorker {
    device_id: String,
    commands: mpsc::Sender<SessionCommand>,
    handle: JoinHandle<()>,
}

impl SessionWorker {
    /// Spawn the session task for `handler`
    pub fn spawn<H: DeviceHandler + 'static>(mut handler: H) -> Self {
        let device_id = handler.device_id().to_string();
        let (commands, mut queue) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        let task_device = device_id.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = handler.initialize().await {
                warn!(device = %task_device, error = %e, "session initialization failed");
            }
            while let Some(command) = queue.recv().await {
                match command {
                    SessionCommand::Trigger(event, reply) => {
                        let _ = reply.send(handler.on_trigger(event).await);
                    }
                    SessionCommand::Push(push, reply) => {
                        let _ = reply.send(handler.on_notification(push).await);
                    }
                }
            }
            debug!(device = %task_device, "session worker stopped");
        });

        Self {
            device_id,
            commands,
            handle,
        }
    }

    /// Device this worker serves
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Queue a trigger and wait for the session's outcome
    pub async fn trigger(&self, event: TriggerEvent) -> Result<Option<SyncReport>> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(SessionCommand::Trigger(event, reply))
            .await
            .map_err(|_| SyncError::SessionUnavailable(self.device_id.clone()))?;
        outcome
            .await
            .map_err(|_| SyncError::SessionUnavailable(self.device_id.clone()))?
    }

    /// Queue an embedder push and wait for it to be delivered
    pub async fn notify(&self, push: DevicePush) -> Result<()> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(SessionCommand::Push(push, reply))
            .await
            .map_err(|_| SyncError::SessionUnavailable(self.device_id.clone()))?;
        outcome
            .await
            .map_err(|_| SyncError::SessionUnavailable(self.device_id.clone()))?
    }

    /// Drain the queue and stop the task
    pub async fn shutdown(self) {
        drop(self.commands);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_test::assert_ok;

    use crate::channel::Channel;
    use crate::config::SyncConfig;
    use crate::delivery::DeliveryQueue;
    use crate::session::{SyncSession, SyncStores};
    use crate::store::memory::{
        MemoryContactDirectory, MemoryConversationStore, MemoryMultimediaStore,
        MemoryShortMessageStore,
    };
    use crate::transport::MemoryTransport;

    fn session(transport: MemoryTransport) -> SyncSession {
        SyncSession::new(
            "device-1",
            SyncConfig::default(),
            SyncStores {
                short_messages: Arc::new(MemoryShortMessageStore::new()),
                multimedia: Arc::new(MemoryMultimediaStore::new()),
                conversations: Arc::new(MemoryConversationStore::new()),
            },
            Arc::new(MemoryContactDirectory::new()),
            DeliveryQueue::new(transport),
        )
    }

    #[derive(Debug)]
    struct RecordingHandler {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl DeviceHandler for RecordingHandler {
        fn device_id(&self) -> &str {
            "recorder"
        }

        fn channels(&self) -> Vec<Channel> {
            vec![Channel::SyncAll]
        }

        async fn initialize(&mut self) -> Result<()> {
            Ok(())
        }

        async fn on_trigger(&mut self, event: TriggerEvent) -> Result<Option<SyncReport>> {
            // Yield so a racing command would have a chance to overtake if
            // the worker did not serialize.
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.log
                .lock()
                .unwrap()
                .push(format!("trigger:{}", event.channel));
            Ok(None)
        }

        async fn on_notification(&mut self, push: DevicePush) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("push:{}", push.stream_channel()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_trigger_round_trip() {
        let transport = MemoryTransport::new();
        let worker = SessionWorker::spawn(session(transport));

        let report = worker.trigger(TriggerEvent::bare(Channel::SyncAll)).await;
        let report = assert_ok!(report);
        assert_eq!(report.unwrap().messages, 0);

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_commands_run_in_arrival_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let worker = SessionWorker::spawn(RecordingHandler { log: log.clone() });

        let trigger = worker.trigger(TriggerEvent::bare(Channel::SyncAll));
        let push = worker.notify(DevicePush::NowPlaying(Arc::new(
            crate::presence::PlaybackState::new("Track", "Artist", true),
        )));
        let (trigger, push) = tokio::join!(trigger, push);
        assert_ok!(trigger);
        assert_ok!(push);

        let log = log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "trigger:deskbridge.sync.all".to_string(),
                "push:deskbridge.stream.presence".to_string(),
            ]
        );
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_task() {
        let worker = SessionWorker::spawn(session(MemoryTransport::new()));
        assert_eq!(worker.device_id(), "device-1");
        worker.shutdown().await;
    }
}
