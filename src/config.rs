//! Sync Engine Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::SyncKind;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

fn default_message_lookback_days() -> u64 {
    2
}

fn default_full_lookback_days() -> u64 {
    10
}

fn default_accept_legacy_triggers() -> bool {
    true
}

/// Tunables for one device's sync sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Lookback window for message-only syncs, in days
    #[serde(default = "default_message_lookback_days")]
    pub message_lookback_days: u64,

    /// Lookback window for conversation and full syncs, in days
    #[serde(default = "default_full_lookback_days")]
    pub full_lookback_days: u64,

    /// Whether the three legacy single-kind trigger channels are honored
    #[serde(default = "default_accept_legacy_triggers")]
    pub accept_legacy_triggers: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            message_lookback_days: default_message_lookback_days(),
            full_lookback_days: default_full_lookback_days(),
            accept_legacy_triggers: default_accept_legacy_triggers(),
        }
    }
}

impl SyncConfig {
    /// Lookback window for message-only syncs
    pub fn message_lookback(&self) -> Duration {
        Duration::from_secs(self.message_lookback_days * SECS_PER_DAY)
    }

    /// Lookback window for conversation and full syncs
    pub fn full_lookback(&self) -> Duration {
        Duration::from_secs(self.full_lookback_days * SECS_PER_DAY)
    }

    /// Lookback window to apply when no cursor came with the trigger
    pub fn lookback_for(&self, kind: SyncKind) -> Duration {
        match kind {
            SyncKind::Messages | SyncKind::Multimedia => self.message_lookback(),
            SyncKind::Conversations | SyncKind::All => self.full_lookback(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.message_lookback_days, 2);
        assert_eq!(config.full_lookback_days, 10);
        assert!(config.accept_legacy_triggers);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_partial_document_overrides_one_field() {
        let config: SyncConfig = serde_json::from_str(r#"{"message_lookback_days": 5}"#).unwrap();
        assert_eq!(config.message_lookback_days, 5);
        assert_eq!(config.full_lookback_days, 10);
        assert!(config.accept_legacy_triggers);
    }

    #[test]
    fn test_serialization_round_trip() {
        let config = SyncConfig {
            message_lookback_days: 1,
            full_lookback_days: 30,
            accept_legacy_triggers: false,
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SyncConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_lookback_durations() {
        let config = SyncConfig::default();
        assert_eq!(config.message_lookback(), Duration::from_secs(2 * 86_400));
        assert_eq!(config.full_lookback(), Duration::from_secs(10 * 86_400));

        assert_eq!(
            config.lookback_for(SyncKind::Messages),
            config.message_lookback()
        );
        assert_eq!(
            config.lookback_for(SyncKind::Multimedia),
            config.message_lookback()
        );
        assert_eq!(
            config.lookback_for(SyncKind::Conversations),
            config.full_lookback()
        );
        assert_eq!(config.lookback_for(SyncKind::All), config.full_lookback());
    }
}
