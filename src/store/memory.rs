//! In-Memory Reference Stores
//!
//! Store and directory implementations backed by plain collections, used by
//! the crate's own tests and by embedders as fakes. Every store carries a
//! failure switch so degraded-path behavior (§ error handling) is testable
//! without a real backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::address::NormalizedAddress;
use crate::contacts::{ContactDirectory, ContactEntry};
use crate::error::{Result, SyncError};
use crate::store::{
    ConversationRow, ConversationStore, MultimediaRow, MultimediaStore, ShortMessageRow,
    ShortMessageStore, SyncWatermark,
};

/// In-memory short-message store
#[derive(Debug, Default)]
pub struct MemoryShortMessageStore {
    rows: Mutex<Vec<ShortMessageRow>>,
    failing: AtomicBool,
}

impl MemoryShortMessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row
    pub fn push(&self, row: ShortMessageRow) {
        self.rows.lock().unwrap().push(row);
    }

    /// Make every query fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ShortMessageStore for MemoryShortMessageStore {
    async fn query_since(&self, watermark: SyncWatermark) -> Result<Vec<ShortMessageRow>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Store("short-message store unavailable".into()));
        }
        let mut rows: Vec<ShortMessageRow> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.date > watermark.since_millis())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }
}

/// In-memory multimedia store
#[derive(Debug, Default)]
pub struct MemoryMultimediaStore {
    rows: Mutex<Vec<MultimediaRow>>,
    failing: AtomicBool,
}

impl MemoryMultimediaStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row
    pub fn push(&self, row: MultimediaRow) {
        self.rows.lock().unwrap().push(row);
    }

    /// Make every query fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MultimediaStore for MemoryMultimediaStore {
    async fn query_since(&self, watermark: SyncWatermark) -> Result<Vec<MultimediaRow>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Store("multimedia store unavailable".into()));
        }
        // Seconds-native date column, so the bound is taken in seconds too.
        let mut rows: Vec<MultimediaRow> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.date > watermark.since_seconds())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }
}

/// In-memory conversation table with a participant-id → address map
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    rows: Mutex<Vec<ConversationRow>>,
    recipients: Mutex<HashMap<i64, String>>,
    failing: AtomicBool,
}

impl MemoryConversationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a conversation row
    pub fn push(&self, row: ConversationRow) {
        self.rows.lock().unwrap().push(row);
    }

    /// Map a participant id to its canonical address
    pub fn map_recipient(&self, participant_id: i64, address: &str) {
        self.recipients
            .lock()
            .unwrap()
            .insert(participant_id, address.to_string());
    }

    /// Make every query fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn conversations_since(&self, watermark: SyncWatermark) -> Result<Vec<ConversationRow>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Store("conversation store unavailable".into()));
        }
        let mut rows: Vec<ConversationRow> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.date > watermark.since_millis())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }

    async fn recipient_address(&self, participant_id: i64) -> Result<Option<String>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Store("conversation store unavailable".into()));
        }
        Ok(self.recipients.lock().unwrap().get(&participant_id).cloned())
    }
}

/// In-memory contact directory
#[derive(Debug, Default)]
pub struct MemoryContactDirectory {
    contacts: Mutex<HashMap<String, ContactEntry>>,
    emails: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryContactDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a contact reachable at `address`, with an optional email
    pub fn insert(&self, address: &str, display_name: &str, email: Option<&str>) {
        let normalized = NormalizedAddress::new(address);
        let contact_key = format!("key-{}", normalized.as_str());
        self.contacts.lock().unwrap().insert(
            normalized.as_str().to_string(),
            ContactEntry {
                display_name: display_name.to_string(),
                contact_key: contact_key.clone(),
            },
        );
        if let Some(email) = email {
            self.emails
                .lock()
                .unwrap()
                .insert(contact_key, email.to_string());
        }
    }

    /// Make every lookup fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContactDirectory for MemoryContactDirectory {
    async fn lookup(&self, address: &NormalizedAddress) -> Result<Option<ContactEntry>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Directory("contact directory unavailable".into()));
        }
        Ok(self.contacts.lock().unwrap().get(address.as_str()).cloned())
    }

    async fn lookup_email(&self, contact_key: &str) -> Result<Option<String>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Directory("contact directory unavailable".into()));
        }
        Ok(self.emails.lock().unwrap().get(contact_key).cloned())
    }
}
