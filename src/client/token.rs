//! Authentication token sources.
//!
//! On every successful open the session asks its [`TokenProvider`] for a
//! token and, when one is available, sends `{"type":"auth"}` before any other
//! frame.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::RwLock;

// ============================================================================
// TokenProvider
// ============================================================================

/// Supplies the current authentication token, if any.
pub trait TokenProvider: Send + Sync + 'static {
    /// Returns the token to authenticate with.
    fn token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync + 'static,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

// ============================================================================
// TokenStore
// ============================================================================

/// In-memory token slot the application updates on login and logout.
#[derive(Debug, Default)]
pub struct TokenStore {
    token: RwLock<Option<String>>,
}

impl TokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `token`.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Replaces the stored token.
    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    /// Forgets the stored token.
    pub fn clear(&self) {
        *self.token.write() = None;
    }
}

impl TokenProvider for TokenStore {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_set_and_clear() {
        let store = TokenStore::new();
        assert_eq!(store.token(), None);

        store.set("abc");
        assert_eq!(store.token().as_deref(), Some("abc"));

        store.clear();
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_closure_provider() {
        let provider = || Some("from-closure".to_string());
        assert_eq!(TokenProvider::token(&provider).as_deref(), Some("from-closure"));
    }
}
