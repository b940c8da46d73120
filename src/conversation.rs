//! Conversation Aggregation
//!
//! Builds [`ConversationSummary`] values for the conversation-stream burst.
//! Rows come from a [`ConversationStore`]; single-participant conversations
//! get an identity attached through the contact enricher, group
//! conversations are shipped bare.

use tracing::{debug, warn};

use crate::address::NormalizedAddress;
use crate::contacts::{ContactEnricher, Identity};
use crate::record::ConversationSummary;
use crate::store::{ConversationRow, ConversationStore, SyncWatermark};

/// Aggregate conversation summaries newer than `watermark`, newest first.
///
/// Conversations with no messages are skipped. A store failure degrades to
/// an empty list so the rest of the sync can proceed.
pub async fn aggregate(
    store: &dyn ConversationStore,
    enricher: &mut ContactEnricher,
    watermark: SyncWatermark,
) -> Vec<ConversationSummary> {
    let rows = match store.conversations_since(watermark).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, "conversation store query failed, skipping conversations");
            return Vec::new();
        }
    };

    let mut summaries = Vec::with_capacity(rows.len());
    for row in rows {
        if row.message_count <= 0 {
            continue;
        }

        let is_group = row.participant_ids.len() > 1;
        let identity = if is_group {
            None
        } else {
            Some(resolve_identity(store, enricher, &row).await)
        };

        summaries.push(ConversationSummary {
            conversation_id: row.id,
            message_count: row.message_count,
            is_group,
            snippet: row.snippet,
            last_activity: row.date,
            unread_count: if row.read { 0 } else { 1 },
            identity,
        });
    }

    summaries.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
    summaries
}

/// Resolve the counterpart identity of a one-on-one conversation.
async fn resolve_identity(
    store: &dyn ConversationStore,
    enricher: &mut ContactEnricher,
    row: &ConversationRow,
) -> Identity {
    let Some(&participant_id) = row.participant_ids.first() else {
        debug!(conversation_id = row.id, "conversation has no participants");
        return Identity::unknown();
    };

    match store.recipient_address(participant_id).await {
        Ok(Some(address)) => enricher.enrich(&NormalizedAddress::new(&address)).await,
        Ok(None) => {
            debug!(participant_id, "no address for participant");
            Identity::unknown()
        }
        Err(e) => {
            warn!(participant_id, error = %e, "recipient lookup failed");
            Identity::unknown()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::store::memory::{MemoryContactDirectory, MemoryConversationStore};

    fn conversation(id: i64, participants: &[i64], count: i64, date: i64) -> ConversationRow {
        ConversationRow {
            id,
            participant_ids: participants.to_vec(),
            message_count: count,
            snippet: format!("snippet {id}"),
            date,
            read: true,
        }
    }

    fn enricher(directory: Arc<MemoryContactDirectory>) -> ContactEnricher {
        ContactEnricher::new(directory)
    }

    #[tokio::test]
    async fn test_empty_conversations_are_skipped() {
        let store = MemoryConversationStore::new();
        store.push(conversation(1, &[5], 0, 100));
        store.push(conversation(2, &[5], 3, 200));
        store.map_recipient(5, "5551234567");

        let mut enricher = enricher(Arc::new(MemoryContactDirectory::new()));
        let summaries = aggregate(&store, &mut enricher, SyncWatermark::new(0)).await;

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].conversation_id, 2);
    }

    #[tokio::test]
    async fn test_group_conversations_carry_no_identity() {
        let store = MemoryConversationStore::new();
        store.push(conversation(1, &[5, 6, 7], 10, 100));

        let mut enricher = enricher(Arc::new(MemoryContactDirectory::new()));
        let summaries = aggregate(&store, &mut enricher, SyncWatermark::new(0)).await;

        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].is_group);
        assert!(summaries[0].identity.is_none());
    }

    #[tokio::test]
    async fn test_single_participant_resolves_identity() {
        let store = MemoryConversationStore::new();
        store.push(conversation(1, &[5], 4, 100));
        store.map_recipient(5, "555-123-4567");

        let directory = Arc::new(MemoryContactDirectory::new());
        directory.insert("5551234567", "Alice Example", Some("alice@example.com"));

        let mut enricher = enricher(directory);
        let summaries = aggregate(&store, &mut enricher, SyncWatermark::new(0)).await;

        let identity = summaries[0].identity.as_ref().unwrap();
        assert!(!summaries[0].is_group);
        assert_eq!(identity.display_name, "Alice Example");
        assert_eq!(identity.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_missing_recipient_degrades_to_unknown() {
        let store = MemoryConversationStore::new();
        store.push(conversation(1, &[99], 4, 100));

        let mut enricher = enricher(Arc::new(MemoryContactDirectory::new()));
        let summaries = aggregate(&store, &mut enricher, SyncWatermark::new(0)).await;

        let identity = summaries[0].identity.as_ref().unwrap();
        assert!(identity.is_unknown());
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_empty() {
        let store = MemoryConversationStore::new();
        store.push(conversation(1, &[5], 4, 100));
        store.set_failing(true);

        let mut enricher = enricher(Arc::new(MemoryContactDirectory::new()));
        let summaries = aggregate(&store, &mut enricher, SyncWatermark::new(0)).await;
        assert!(summaries.is_empty());
    }

    #[tokio::test]
    async fn test_unread_placeholder_follows_read_bit() {
        let store = MemoryConversationStore::new();
        let mut unread = conversation(1, &[5], 2, 100);
        unread.read = false;
        store.push(unread);
        store.push(conversation(2, &[5], 2, 200));
        store.map_recipient(5, "5551234567");

        let mut enricher = enricher(Arc::new(MemoryContactDirectory::new()));
        let summaries = aggregate(&store, &mut enricher, SyncWatermark::new(0)).await;

        assert_eq!(summaries[0].conversation_id, 2);
        assert_eq!(summaries[0].unread_count, 0);
        assert_eq!(summaries[1].unread_count, 1);
    }

    #[tokio::test]
    async fn test_summaries_newest_first() {
        let store = MemoryConversationStore::new();
        store.push(conversation(1, &[5], 1, 100));
        store.push(conversation(2, &[5], 1, 300));
        store.push(conversation(3, &[5], 1, 200));
        store.map_recipient(5, "5551234567");

        let mut enricher = enricher(Arc::new(MemoryContactDirectory::new()));
        let summaries = aggregate(&store, &mut enricher, SyncWatermark::new(0)).await;

        let ids: Vec<i64> = summaries.iter().map(|s| s.conversation_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
