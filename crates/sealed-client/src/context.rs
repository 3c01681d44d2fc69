//! Session-scoped context shared by interceptors and retries
//!
//! One `Context` exists per client instance and is shared (`Arc<Context>`)
//! by every call in flight. Interceptors read a consistent `ContextSnapshot`
//! taken at the start of each attempt; writes go through the guarded
//! operations below, never through free-form field assignment.
//!
//! The server public key carries a generation counter. Key rotation is a
//! compare-and-swap on that counter so that concurrent callers who hit the
//! same stale key converge on a single rotation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};
use uuid::Uuid;

use crate::constants::{ACCESS_TOKEN_HEADER, DEFAULT_CLIENT_ID};

/// The fixed set of context keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    SessionId,
    ApiKey,
    AccessToken,
    RefreshToken,
    /// Server public key negotiated during key exchange
    PublicKey,
    ClientId,
    /// Name of the header that carries the bearer credential
    AuthHeaderSelector,
}

impl ContextKey {
    pub const ALL: [ContextKey; 7] = [
        ContextKey::SessionId,
        ContextKey::ApiKey,
        ContextKey::AccessToken,
        ContextKey::RefreshToken,
        ContextKey::PublicKey,
        ContextKey::ClientId,
        ContextKey::AuthHeaderSelector,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ContextKey::SessionId => "session_id",
            ContextKey::ApiKey => "api_key",
            ContextKey::AccessToken => "access_token",
            ContextKey::RefreshToken => "refresh_token",
            ContextKey::PublicKey => "public_key",
            ContextKey::ClientId => "client_id",
            ContextKey::AuthHeaderSelector => "auth_header_selector",
        }
    }

    /// Credentials are redacted from Debug output.
    fn is_credential(&self) -> bool {
        matches!(
            self,
            ContextKey::ApiKey | ContextKey::AccessToken | ContextKey::RefreshToken
        )
    }
}

/// Outcome of a compare-and-swap key rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// This caller published the new key
    Rotated { generation: u64 },
    /// Another caller already rotated past the observed generation
    Joined { generation: u64 },
}

impl Rotation {
    pub fn generation(&self) -> u64 {
        match self {
            Rotation::Rotated { generation } | Rotation::Joined { generation } => *generation,
        }
    }
}

#[derive(Clone, Default)]
struct ContextState {
    values: HashMap<ContextKey, String>,
    key_generation: u64,
}

/// Point-in-time copy of the context, read by interceptors for one attempt.
#[derive(Clone)]
pub struct ContextSnapshot {
    session_id: String,
    state: ContextState,
}

impl ContextSnapshot {
    /// Value for `key`, empty when unset.
    pub fn get(&self, key: ContextKey) -> &str {
        if key == ContextKey::SessionId {
            return &self.session_id;
        }
        self.state.values.get(&key).map(String::as_str).unwrap_or("")
    }

    /// The negotiated server key, if any.
    pub fn public_key(&self) -> Option<&str> {
        Some(self.get(ContextKey::PublicKey)).filter(|k| !k.is_empty())
    }

    /// Generation of the public key this snapshot saw.
    pub fn key_generation(&self) -> u64 {
        self.state.key_generation
    }
}

impl fmt::Debug for ContextSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextSnapshot")
            .field("session_id", &self.session_id)
            .field("key_generation", &self.state.key_generation)
            .finish_non_exhaustive()
    }
}

/// Session-scoped mutable key/value state.
pub struct Context {
    session_id: String,
    state: RwLock<ContextState>,
}

impl Context {
    /// Create a context with a fresh session id.
    ///
    /// All credential fields start empty; `client_id` and the auth header
    /// selector start at the given values.
    pub fn new(client_id: &str, auth_header: &str) -> Self {
        let session_id = Uuid::new_v4().to_string();
        let mut values = HashMap::new();
        let client_id = if client_id.is_empty() {
            DEFAULT_CLIENT_ID
        } else {
            client_id
        };
        values.insert(ContextKey::ClientId, client_id.to_string());
        values.insert(ContextKey::AuthHeaderSelector, auth_header.to_string());
        info!(session_id = %session_id, client_id, "session context created");
        Self {
            session_id,
            state: RwLock::new(ContextState {
                values,
                key_generation: 0,
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Value for `key`, empty when unset.
    pub fn get(&self, key: ContextKey) -> String {
        if key == ContextKey::SessionId {
            return self.session_id.clone();
        }
        self.read().values.get(&key).cloned().unwrap_or_default()
    }

    /// Last-write-wins update.
    ///
    /// The session id is immutable and writing it is rejected. Writing the
    /// public key directly counts as a key rotation and bumps the generation.
    pub fn set(&self, key: ContextKey, value: impl Into<String>) -> common::Result<()> {
        if key == ContextKey::SessionId {
            return Err(common::Error::Context(
                "session id is fixed for the lifetime of the client".into(),
            ));
        }
        let value = value.into();
        let mut state = self.write();
        if key == ContextKey::PublicKey {
            state.key_generation += 1;
        }
        state.values.insert(key, value);
        debug!(session_id = %self.session_id, key = key.label(), "context updated");
        Ok(())
    }

    /// Consistent copy of all values.
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            session_id: self.session_id.clone(),
            state: self.read().clone(),
        }
    }

    /// Current public key generation (0 until the first key is published).
    pub fn key_generation(&self) -> u64 {
        self.read().key_generation
    }

    /// Publish `key` only if nobody rotated since `observed_generation`.
    ///
    /// The check and the write happen under one write lock, so among callers
    /// that observed the same generation exactly one gets `Rotated`.
    pub fn rotate_public_key(&self, observed_generation: u64, key: &str) -> Rotation {
        let mut state = self.write();
        if state.key_generation != observed_generation {
            return Rotation::Joined {
                generation: state.key_generation,
            };
        }
        state.key_generation += 1;
        state
            .values
            .insert(ContextKey::PublicKey, key.to_string());
        Rotation::Rotated {
            generation: state.key_generation,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ContextState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ContextState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_ID, ACCESS_TOKEN_HEADER)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        let mut debug = f.debug_struct("Context");
        debug.field("session_id", &self.session_id);
        for key in ContextKey::ALL {
            if key == ContextKey::SessionId {
                continue;
            }
            let value = state.values.get(&key).map(String::as_str).unwrap_or("");
            if key.is_credential() && !value.is_empty() {
                debug.field(key.label(), &"[REDACTED]");
            } else {
                debug.field(key.label(), &value);
            }
        }
        debug.field("key_generation", &state.key_generation).finish()
    }
}
