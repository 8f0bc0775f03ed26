//! Token persistence with validation on the way in and the way out.

use crate::{
    KeyValueStore, MemoryStorage, StorageKeys, StorageResult, TokenCodec, TokenError, UserIdentity,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Snapshot of what is stored, safe to print. Never carries the token itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenDiagnostics {
    pub token_present: bool,
    pub token_length: usize,
    pub identity_present: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
}

/// Durable home of the access token and the cached [`UserIdentity`].
///
/// Three layers are managed:
/// - `primary`: long-lived store holding `accessToken`, `user`, and unrelated
///   application settings
/// - `session`: process-scoped store, cleared wholesale on purge
/// - `cookies`: cookie jar, cleared wholesale on purge
///
/// Only structurally valid, unexpired tokens are ever returned. Backend
/// errors are logged and degrade to the logged-out answer.
pub struct TokenStore {
    primary: Box<dyn KeyValueStore>,
    session: Box<dyn KeyValueStore>,
    cookies: Box<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(
        primary: Box<dyn KeyValueStore>,
        session: Box<dyn KeyValueStore>,
        cookies: Box<dyn KeyValueStore>,
    ) -> Self {
        Self {
            primary,
            session,
            cookies,
        }
    }

    /// All three layers in memory.
    pub fn in_memory() -> Self {
        Self::new(
            Box::new(MemoryStorage::new()),
            Box::new(MemoryStorage::new()),
            Box::new(MemoryStorage::new()),
        )
    }

    // ==========================================
    // Token
    // ==========================================

    /// Persist `token`, replacing any previous one.
    ///
    /// Blank or structurally malformed tokens are refused. Returns whether
    /// the token was stored.
    pub fn save(&self, token: &str) -> bool {
        let token = token.trim();
        if token.is_empty() {
            warn!("Refusing to store empty token");
            return false;
        }
        if let Err(e) = TokenCodec::decode(token) {
            warn!(error = %e, "Refusing to store malformed token");
            return false;
        }

        match self.primary.set(StorageKeys::ACCESS_TOKEN, token) {
            Ok(()) => {
                info!(token_len = token.len(), "Stored access token");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to store access token");
                false
            }
        }
    }

    /// The stored token if it is usable.
    ///
    /// A blank, malformed, or expired token is purged and reads as `None`.
    pub fn read(&self) -> Option<String> {
        let token = self.read_raw()?;
        match TokenCodec::validate(&token) {
            Ok(_) => Some(token),
            Err(TokenError::Expired) => {
                info!("Stored token expired, purging");
                self.purge();
                None
            }
            Err(e) => {
                warn!(error = %e, "Stored token invalid, purging");
                self.purge();
                None
            }
        }
    }

    /// The stored token string without validation, as long as it is not blank.
    ///
    /// Logout uses this to revoke even an expired token.
    pub fn read_raw(&self) -> Option<String> {
        match self.primary.get(StorageKeys::ACCESS_TOKEN) {
            Ok(Some(token)) if !token.trim().is_empty() => Some(token),
            Ok(Some(_)) => {
                debug!("Stored token is blank, purging");
                self.purge();
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read access token");
                None
            }
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.read().is_some()
    }

    /// Remove the token, the cached identity, and every auth-related trace
    /// from all layers.
    ///
    /// Each layer is attempted even when an earlier one fails.
    pub fn purge(&self) {
        let mut removed = 0usize;

        for key in [StorageKeys::ACCESS_TOKEN, StorageKeys::USER] {
            removed += count_deleted(self.primary.delete(key), key);
        }

        match self.session.clear() {
            Ok(n) => removed += n,
            Err(e) => warn!(error = %e, "Failed to clear session store"),
        }

        match self.primary.list_keys() {
            Ok(keys) => {
                for key in keys
                    .iter()
                    .filter(|key| StorageKeys::is_auth_related(key))
                {
                    removed += count_deleted(self.primary.delete(key), key);
                }
            }
            Err(e) => warn!(error = %e, "Failed to list stored keys"),
        }

        match self.cookies.clear() {
            Ok(n) => removed += n,
            Err(e) => warn!(error = %e, "Failed to clear cookies"),
        }

        info!(removed, "Purged session data");
    }

    // ==========================================
    // Cached identity
    // ==========================================

    pub fn save_identity(&self, identity: &UserIdentity) -> bool {
        let json = match serde_json::to_string(identity) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to encode user identity");
                return false;
            }
        };
        match self.primary.set(StorageKeys::USER, &json) {
            Ok(()) => {
                debug!(nickname = %identity.nickname, "Cached user identity");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to cache user identity");
                false
            }
        }
    }

    /// The cached identity. Unparseable contents read as `None`.
    pub fn read_identity(&self) -> Option<UserIdentity> {
        let raw = match self.primary.get(StorageKeys::USER) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read user identity");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(identity) => Some(identity),
            Err(e) => {
                debug!(error = %e, "Cached user identity is unreadable");
                None
            }
        }
    }

    pub fn clear_identity(&self) {
        if let Err(e) = self.primary.delete(StorageKeys::USER) {
            warn!(error = %e, "Failed to clear user identity");
        }
    }

    /// Describe the stored session without exposing the token.
    pub fn diagnostics(&self) -> TokenDiagnostics {
        let raw = match self.primary.get(StorageKeys::ACCESS_TOKEN) {
            Ok(raw) => raw.filter(|token| !token.trim().is_empty()),
            Err(_) => None,
        };
        let identity_present = matches!(self.primary.get(StorageKeys::USER), Ok(Some(_)));

        let Some(token) = raw else {
            return TokenDiagnostics {
                token_present: false,
                token_length: 0,
                identity_present,
                expires_at: None,
                expired: false,
            };
        };

        let claims = TokenCodec::decode(&token).ok();
        TokenDiagnostics {
            token_present: true,
            token_length: token.len(),
            identity_present,
            expires_at: claims
                .as_ref()
                .and_then(|c| c.exp)
                .and_then(|exp| DateTime::from_timestamp(exp, 0)),
            expired: claims.map_or(true, |c| TokenCodec::is_expired(&c)),
        }
    }
}

fn count_deleted(result: StorageResult<bool>, key: &str) -> usize {
    match result {
        Ok(true) => 1,
        Ok(false) => 0,
        Err(e) => {
            warn!(key, error = %e, "Failed to delete key");
            0
        }
    }
}
