//! In-memory session store for the bouncer client.
//!
//! Holds the access/refresh token pair for the lifetime of the process.
//! Tokens are never persisted; a new process starts unauthenticated.
//!
//! The store is a cloneable handle that is dependency-injected into the
//! auth and device clients. All mutations replace or remove the whole
//! token pair, so observers never see a partial session.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// An access/refresh token pair.
///
/// Either both tokens are present (authenticated) or the store holds
/// nothing at all. camelCase matches the refresh endpoint payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Short-lived bearer credential authorizing API calls.
    pub access_token: String,
    /// Longer-lived credential used to obtain a new access token.
    pub refresh_token: String,
}

/// Session state held behind the store lock.
#[derive(Debug, Clone)]
struct SessionState {
    tokens: TokenPair,
    user_id: Option<String>,
}

/// Cloneable handle to the process-wide session.
///
/// Created empty at startup, populated on successful login or refresh,
/// and cleared entirely on any authentication failure or unrecovered
/// request failure.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<SessionState>>>,
}

impl SessionStore {
    /// Create a new, empty session store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current token pair, if authenticated.
    pub fn current(&self) -> Option<TokenPair> {
        self.inner
            .read()
            .expect("session lock poisoned")
            .as_ref()
            .map(|state| state.tokens.clone())
    }

    /// Get the user id recorded at login, if any.
    pub fn user_id(&self) -> Option<String> {
        self.inner
            .read()
            .expect("session lock poisoned")
            .as_ref()
            .and_then(|state| state.user_id.clone())
    }

    /// Whether a token pair is currently held.
    pub fn is_authenticated(&self) -> bool {
        self.inner
            .read()
            .expect("session lock poisoned")
            .is_some()
    }

    /// Replace the token pair, keeping any previously recorded user id.
    ///
    /// Used by the refresh flow, which rotates tokens without changing
    /// who is logged in.
    pub fn set(&self, tokens: TokenPair) {
        let mut guard = self.inner.write().expect("session lock poisoned");
        let user_id = guard.as_ref().and_then(|state| state.user_id.clone());
        *guard = Some(SessionState { tokens, user_id });
        debug!("Session tokens replaced");
    }

    /// Replace the whole session (login flow).
    pub fn set_session(&self, tokens: TokenPair, user_id: impl Into<String>) {
        let mut guard = self.inner.write().expect("session lock poisoned");
        *guard = Some(SessionState {
            tokens,
            user_id: Some(user_id.into()),
        });
        debug!("Session established");
    }

    /// Drop the session entirely.
    pub fn clear(&self) {
        let mut guard = self.inner.write().expect("session lock poisoned");
        if guard.take().is_some() {
            debug!("Session cleared");
        }
    }
}
