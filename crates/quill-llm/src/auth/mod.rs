//! Credentials, their storage seam, and the token manager

mod manager;
mod notice;
mod refresh;

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use secrecy::{ExposeSecret, SecretString};

pub use self::manager::{TokenManager, refresh_due};
pub use self::notice::SignInNotice;
pub use self::refresh::{HttpTokenRefresher, TokenRefresher};

/// Access and refresh credentials for one backend identity
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Bearer value sent with every request
    pub access_token: Option<SecretString>,
    /// Token exchanged for a fresh pair
    pub refresh_token: Option<SecretString>,
    /// Expiry recorded with the refresh token, in Unix seconds
    pub expires_at: Option<i64>,
}

impl Credentials {
    /// Credentials holding only an access token
    pub fn access_only(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(SecretString::from(access_token.into())),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Full credential set
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>, expires_at: i64) -> Self {
        Self {
            access_token: Some(SecretString::from(access_token.into())),
            refresh_token: Some(SecretString::from(refresh_token.into())),
            expires_at: Some(expires_at),
        }
    }

    /// Access token, if present and non-empty
    pub fn usable_access_token(&self) -> Option<&SecretString> {
        self.access_token.as_ref().filter(|t| !t.expose_secret().is_empty())
    }

    /// Refresh token, if present and non-empty
    pub fn usable_refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref().filter(|t| !t.expose_secret().is_empty())
    }
}

/// External secret store the token manager persists through
///
/// `set(identity, None)` must clear whatever is stored for the identity.
pub trait CredentialStore: Send + Sync {
    /// Current credentials for an identity
    fn get(&self, identity: &str) -> Option<Credentials>;

    /// Replace (or clear) the credentials for an identity
    fn set(&self, identity: &str, credentials: Option<Credentials>);
}

/// In-process credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, Credentials>>,
}

impl MemoryCredentialStore {
    /// Store pre-seeded with one identity
    pub fn with(identity: &str, credentials: Credentials) -> Self {
        let store = Self::default();
        store.set(identity, Some(credentials));
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, identity: &str) -> Option<Credentials> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }

    fn set(&self, identity: &str, credentials: Option<Credentials>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match credentials {
            Some(credentials) => {
                entries.insert(identity.to_owned(), credentials);
            }
            None => {
                entries.remove(identity);
            }
        }
    }
}

/// Host hooks for authentication state changes
///
/// Both methods default to no-ops.
pub trait AuthListener: Send + Sync {
    /// New credentials were stored; hosts typically re-fetch user info here
    fn credentials_refreshed(&self, _identity: &str) {}

    /// Credentials were invalidated and the user should sign in again
    fn sign_in_required(&self, _identity: &str) {}
}
