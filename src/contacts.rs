//! Contact Enrichment
//!
//! Resolves a normalized address to a display identity: name, email and a
//! deterministic avatar URL. The directory itself is an external collaborator
//! behind [`ContactDirectory`]; this module owns the resolution order, the
//! fallback identity and the per-session memoization.
//!
//! Resolution order: primary lookup by address → secondary email lookup for
//! the avatar key → fall back to the `"Unknown"` identity when either the
//! contact is absent or the directory faults. "Absent" (`Ok(None)`) and
//! "faulted" (`Err`) are distinct outcomes; both degrade the same way but the
//! latter is logged as a warning.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::address::NormalizedAddress;
use crate::error::Result;

/// Display name used when no contact matches an address
pub const UNKNOWN_NAME: &str = "Unknown";

const AVATAR_URL_PREFIX: &str = "https://www.gravatar.com/avatar/";
const AVATAR_SIZE: u32 = 55;

/// Build the avatar URL for an email address
///
/// The email is trimmed and lowercased, digested with SHA-256 and rendered
/// into a fixed URL template. The function is total: the empty string yields
/// the well-known empty-input digest, so every identity carries a usable
/// avatar reference.
pub fn avatar_url(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    format!("{AVATAR_URL_PREFIX}{}?s={AVATAR_SIZE}", hex::encode(digest))
}

/// A resolved display identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Contact display name, or [`UNKNOWN_NAME`]
    pub display_name: String,

    /// Contact email; empty when none is known
    pub email: String,

    /// Deterministic avatar URL derived from the email
    pub avatar_url: String,
}

impl Identity {
    /// Create an identity, deriving the avatar URL from the email
    pub fn new<N: Into<String>, E: Into<String>>(display_name: N, email: E) -> Self {
        let email = email.into();
        let avatar_url = avatar_url(&email);
        Self {
            display_name: display_name.into(),
            email,
            avatar_url,
        }
    }

    /// The fallback identity for unresolved addresses
    pub fn unknown() -> Self {
        Identity::new(UNKNOWN_NAME, "")
    }

    /// Whether this is the fallback identity
    pub fn is_unknown(&self) -> bool {
        self.display_name == UNKNOWN_NAME && self.email.is_empty()
    }
}

/// A directory match for an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactEntry {
    /// Contact display name
    pub display_name: String,

    /// Directory-internal key for secondary lookups
    pub contact_key: String,
}

/// External contact directory collaborator
///
/// `Ok(None)` means "no such contact" and is an expected outcome; `Err` is a
/// real directory fault. Implementations must never signal absence through
/// `Err`.
#[async_trait]
pub trait ContactDirectory: Send + Sync + std::fmt::Debug {
    /// Look up a contact by normalized address
    async fn lookup(&self, address: &NormalizedAddress) -> Result<Option<ContactEntry>>;

    /// Look up a contact's email by directory key
    async fn lookup_email(&self, contact_key: &str) -> Result<Option<String>>;
}

/// Memoizing enrichment front-end over a [`ContactDirectory`]
///
/// One enricher serves one sync session: many records in a conversation share
/// the same address, and the memo keeps that at one directory round-trip per
/// address. The cache must not outlive the session (directory contents may
/// change between syncs) and must not be shared across devices.
#[derive(Debug)]
pub struct ContactEnricher {
    directory: Arc<dyn ContactDirectory>,
    cache: HashMap<NormalizedAddress, Identity>,
}

impl ContactEnricher {
    /// Create an enricher for one sync session
    pub fn new(directory: Arc<dyn ContactDirectory>) -> Self {
        Self {
            directory,
            cache: HashMap::new(),
        }
    }

    /// Resolve an address to an identity, consulting the session memo first
    ///
    /// Never fails: absent contacts and directory faults both yield the
    /// fallback identity, so enrichment can never block message delivery.
    pub async fn enrich(&mut self, address: &NormalizedAddress) -> Identity {
        if let Some(identity) = self.cache.get(address) {
            return identity.clone();
        }

        let identity = self.resolve(address).await;
        self.cache.insert(address.clone(), identity.clone());
        identity
    }

    /// Number of addresses resolved so far in this session
    pub fn resolved_count(&self) -> usize {
        self.cache.len()
    }

    async fn resolve(&self, address: &NormalizedAddress) -> Identity {
        let entry = match self.directory.lookup(address).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("No contact for address {}", address);
                return Identity::unknown();
            }
            Err(e) => {
                warn!("Directory lookup failed for {}: {}", address, e);
                return Identity::unknown();
            }
        };

        let email = match self.directory.lookup_email(&entry.contact_key).await {
            Ok(Some(email)) => email,
            Ok(None) => String::new(),
            Err(e) => {
                warn!(
                    "Email lookup failed for contact {}: {}",
                    entry.contact_key, e
                );
                String::new()
            }
        };

        Identity::new(entry.display_name, email)
    }
}
