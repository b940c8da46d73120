//! Record Merging
//!
//! Combines short-message and multimedia records into the single
//! newest-first list a sync burst delivers.

use crate::record::MessageRecord;

/// Merge two record lists into one, newest first.
///
/// The sort is stable, so records sharing a timestamp keep their input
/// order (short messages ahead of multimedia).
pub fn merge_newest_first(
    short: Vec<MessageRecord>,
    multimedia: Vec<MessageRecord>,
) -> Vec<MessageRecord> {
    let mut merged = short;
    merged.extend(multimedia);
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged
}
