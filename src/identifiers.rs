//! Type-safe identifiers.
//!
//! | Type | Used for |
//! |------|----------|
//! | [`MessageId`] | `id` field of every outbound envelope |
//! | [`SubscriptionId`] | Token returned when a handler is registered |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Length of the random suffix appended to message ids.
const MESSAGE_ID_SUFFIX_LEN: usize = 9;

/// Source of subscription ids, shared by every client in the process.
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// MessageId
// ============================================================================

/// Identifier of an outbound envelope.
///
/// Format: `<epoch-ms>-<9 random chars>`. Collisions are practically
/// impossible but not cryptographically excluded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generates an id stamped with `timestamp_ms`.
    #[must_use]
    pub fn generate(timestamp_ms: u64) -> Self {
        let random = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{timestamp_ms}-{}",
            &random[..MESSAGE_ID_SUFFIX_LEN]
        ))
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SubscriptionId
// ============================================================================

/// Opaque token naming one registered handler.
///
/// Unique across all clients in the process, so [`RealtimeClient::off`]
/// needs no topic to find the handler.
///
/// [`RealtimeClient::off`]: crate::RealtimeClient::off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Allocates the next id.
    #[inline]
    #[must_use]
    pub(crate) fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_format() {
        let id = MessageId::generate(1_700_000_000_123);
        let (timestamp, suffix) = id.as_str().split_once('-').expect("has separator");

        assert_eq!(timestamp, "1700000000123");
        assert_eq!(suffix.len(), MESSAGE_ID_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_message_ids_differ() {
        let a = MessageId::generate(1);
        let b = MessageId::generate(1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_message_id_serializes_as_string() {
        let id = MessageId::generate(42);
        let json = serde_json::to_value(&id).expect("serialize");
        assert_eq!(json.as_str(), Some(id.as_str()));
    }

    #[test]
    fn test_subscription_ids_increase() {
        let a = SubscriptionId::next();
        let b = SubscriptionId::next();
        assert!(b > a);
        assert_eq!(a.to_string(), format!("sub-{}", a.as_u64()));
    }
}
