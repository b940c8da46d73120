//! Address Normalization
//!
//! Phone-number-like identifiers arrive from the raw stores in inconsistent
//! shapes: with dashes, with embedded whitespace, with a leading `+1` country
//! prefix, or already canonical. Everything downstream (contact lookup,
//! enrichment memoization, frame encoding) keys on one canonical form, so the
//! normalization lives in the [`NormalizedAddress`] constructor and nowhere
//! else.
//!
//! Normalization is pure and idempotent: feeding a canonical address back
//! through the constructor yields the same value.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A phone-number-like identifier in canonical form
///
/// Canonical means: no dashes, no whitespace, no leading `+1` country prefix.
/// Anything else (short codes, alphanumeric sender ids, email-style addresses
/// some stores emit) passes through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedAddress(String);

impl NormalizedAddress {
    /// Normalize a raw address into canonical form
    pub fn new(raw: &str) -> Self {
        let mut canonical: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '-' && !c.is_whitespace())
            .collect();

        // Strip repeatedly so stacked prefixes cannot survive one pass and
        // reappear on the next (idempotence).
        while let Some(rest) = canonical.strip_prefix("+1") {
            canonical = rest.to_string();
        }

        NormalizedAddress(canonical)
    }

    /// The canonical address string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the address normalized to nothing (unknown sender)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NormalizedAddress {
    fn from(raw: &str) -> Self {
        NormalizedAddress::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_country_prefix() {
        assert_eq!(NormalizedAddress::new("+15551234567").as_str(), "5551234567");
    }

    #[test]
    fn test_strips_dashes_and_whitespace() {
        assert_eq!(NormalizedAddress::new("555-123-4567").as_str(), "5551234567");
        assert_eq!(NormalizedAddress::new(" 555 123 4567 ").as_str(), "5551234567");
        assert_eq!(
            NormalizedAddress::new("+1 555-123-4567").as_str(),
            "5551234567"
        );
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "+15551234567",
            "555-123-4567",
            "+1+15550001111",
            "5551234567",
            "SHORTCODE",
            "12345",
            "",
            "++15551234567",
        ];
        for input in inputs {
            let once = NormalizedAddress::new(input);
            let twice = NormalizedAddress::new(once.as_str());
            assert_eq!(once, twice, "normalization not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_non_numeric_passthrough() {
        assert_eq!(NormalizedAddress::new("BANKALERT").as_str(), "BANKALERT");
    }

    #[test]
    fn test_empty() {
        let addr = NormalizedAddress::new("");
        assert!(addr.is_empty());
        assert_eq!(addr.as_str(), "");
    }

    #[test]
    fn test_display() {
        let addr = NormalizedAddress::new("+1555-0000");
        assert_eq!(format!("{addr}"), "5550000");
    }
}
