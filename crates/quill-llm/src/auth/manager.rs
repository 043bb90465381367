use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use quill_config::AuthConfig;
use reqwest::Client;
use secrecy::SecretString;
use tokio::sync::Mutex;

use super::{AuthListener, CredentialStore, Credentials, HttpTokenRefresher, SignInNotice, TokenRefresher};
use crate::error::LlmError;

/// Whether a record expiring at `expires_at` must be refreshed at `now`
///
/// An expiry exactly `lead` seconds away is already due.
pub fn refresh_due(expires_at: i64, now: i64, lead: Duration) -> bool {
    let lead = i64::try_from(lead.as_secs()).unwrap_or(i64::MAX);
    expires_at <= now.saturating_add(lead)
}

/// Owns the credentials of one backend identity and hands out bearer tokens
///
/// Refresh attempts are serialized per manager, so concurrent dispatches never
/// spend the same refresh token twice.
pub struct TokenManager {
    identity: String,
    store: Arc<dyn CredentialStore>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    listener: Option<Arc<dyn AuthListener>>,
    lead_time: Duration,
    fallback_on_refresh_failure: bool,
    sign_in: SignInNotice,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    /// Create a manager without a refresher
    pub fn new(identity: impl Into<String>, store: Arc<dyn CredentialStore>, config: &AuthConfig) -> Self {
        Self {
            identity: identity.into(),
            store,
            refresher: None,
            listener: None,
            lead_time: config.refresh_lead_time,
            fallback_on_refresh_failure: config.fallback_on_refresh_failure,
            sign_in: SignInNotice::new(config.sign_in_cooldown),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Create from configuration, with an HTTP refresher when `refresh_url` is set
    pub fn from_config(config: &AuthConfig, client: Client, store: Arc<dyn CredentialStore>) -> Self {
        let manager = Self::new(config.identity.clone(), store, config);
        match &config.refresh_url {
            Some(url) => manager.with_refresher(Arc::new(HttpTokenRefresher::new(client, url.clone()))),
            None => manager,
        }
    }

    /// Use the given refresher
    #[must_use]
    pub fn with_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Notify the given listener of refreshes and sign-in prompts
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn AuthListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Identity this manager serves
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Return a bearer token, refreshing first when the record is due
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Unauthorized` when no usable access token exists
    /// after any refresh attempt, or the refresh error itself when fallback
    /// is disabled.
    pub async fn access_token(&self) -> Result<SecretString, LlmError> {
        let current = self.store.get(&self.identity);
        if self.needs_refresh(current.as_ref(), now()) {
            return self.refresh().await;
        }
        usable(current.as_ref())
    }

    /// Clear stored credentials after an unauthorized response
    ///
    /// Fires `sign_in_required` at most once per cooldown window.
    pub fn invalidate(&self) {
        self.store.set(&self.identity, None);
        tracing::warn!(identity = %self.identity, "credentials invalidated");

        if self.sign_in.try_acquire() {
            if let Some(listener) = &self.listener {
                listener.sign_in_required(&self.identity);
            }
        } else {
            tracing::debug!(identity = %self.identity, "sign-in notice suppressed by cooldown");
        }
    }

    /// Store credentials obtained by a fresh sign-in
    pub fn sign_in(&self, credentials: Credentials) {
        self.store.set(&self.identity, Some(credentials));
        self.sign_in.reset();
    }

    fn needs_refresh(&self, current: Option<&Credentials>, now: i64) -> bool {
        let Some(creds) = current else {
            return false;
        };
        if self.refresher.is_none() || creds.usable_refresh_token().is_none() {
            return false;
        }
        creds.usable_access_token().is_none()
            || creds
                .expires_at
                .is_some_and(|expires_at| refresh_due(expires_at, now, self.lead_time))
    }

    async fn refresh(&self) -> Result<SecretString, LlmError> {
        let _guard = self.refresh_lock.lock().await;

        // Another dispatch may have refreshed while this one waited
        let current = self.store.get(&self.identity);
        if !self.needs_refresh(current.as_ref(), now()) {
            return usable(current.as_ref());
        }
        let (Some(creds), Some(refresher)) = (current, &self.refresher) else {
            return usable(None);
        };
        let Some(refresh_token) = creds.usable_refresh_token() else {
            return usable(Some(&creds));
        };

        tracing::debug!(identity = %self.identity, "refreshing access token");
        match refresher.refresh(refresh_token).await {
            Ok(mut fresh) => {
                if fresh.refresh_token.is_none() {
                    fresh.refresh_token.clone_from(&creds.refresh_token);
                }
                self.store.set(&self.identity, Some(fresh.clone()));
                tracing::info!(identity = %self.identity, "access token refreshed");
                if let Some(listener) = &self.listener {
                    listener.credentials_refreshed(&self.identity);
                }
                usable(Some(&fresh))
            }
            Err(e) if self.fallback_on_refresh_failure => {
                tracing::warn!(identity = %self.identity, error = %e, "token refresh failed, using existing access token");
                usable(Some(&creds))
            }
            Err(e) => {
                tracing::warn!(identity = %self.identity, error = %e, "token refresh failed");
                Err(e)
            }
        }
    }
}

fn usable(creds: Option<&Credentials>) -> Result<SecretString, LlmError> {
    creds
        .and_then(Credentials::usable_access_token)
        .cloned()
        .ok_or_else(|| LlmError::Unauthorized("access token is empty".to_owned()))
}

fn now() -> i64 {
    Timestamp::now().as_second()
}
