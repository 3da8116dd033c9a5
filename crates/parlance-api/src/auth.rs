//! Token lifecycle management.
//!
//! The [`TokenManager`] is the single owner of the stored credential. It
//! refreshes the access token proactively, a safety buffer ahead of the
//! server-declared expiry, so requests never race expiry mid-flight, and
//! it collapses concurrent refresh attempts into one network call.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::credentials::{Credential, CredentialStore, StoreError};

/// How far ahead of expiry a refresh is triggered, in milliseconds.
pub const EXPIRY_BUFFER_MS: i64 = 60 * 60 * 1000;

/// Refresh attempt budget before the session is reported invalid.
pub const MAX_REFRESH_ATTEMPTS: u32 = 3;

/// A freshly issued access/refresh token pair, before expiry decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Errors surfaced by authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The credential store failed underneath the manager.
    #[error("credential store failure: {0}")]
    Store(#[from] StoreError),
    /// The server rejected the identity or refresh token.
    #[error("authentication rejected: {0}")]
    Rejected(String),
    /// The authentication endpoint could not be reached or answered
    /// outside the expected protocol.
    #[error("network failure during authentication: {0}")]
    Transport(String),
}

/// Network operations the manager needs from the authentication endpoint.
///
/// A capability rather than a concrete client so the refresh policy can be
/// exercised against a scripted transport.
#[async_trait]
pub trait AuthTransport: Send + Sync {
    async fn login(&self, identity: &str, device_token: &str) -> Result<TokenPair, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;
}

pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis() as i64
}

/// Owner of the stored credential and its refresh policy.
pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    transport: Arc<dyn AuthTransport>,
    /// Serializes refresh work so concurrent callers share one in-flight
    /// refresh instead of issuing duplicates.
    refresh_gate: Mutex<()>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn CredentialStore>, transport: Arc<dyn AuthTransport>) -> Self {
        Self {
            store,
            transport,
            refresh_gate: Mutex::new(()),
        }
    }

    /// Exchanges an identity for a fresh credential and persists it.
    pub async fn login(&self, identity: &str, device_token: &str) -> Result<Credential, AuthError> {
        let pair = self.transport.login(identity, device_token).await?;
        let credential =
            Credential::from_token_pair(pair.access_token, pair.refresh_token, now_epoch_ms());
        self.store.store(&credential)?;
        log::info!(
            "Logged in, access token valid until epoch {}ms",
            credential.expiry_epoch_ms
        );
        Ok(credential)
    }

    /// Whether a token pair is present in the store.
    ///
    /// Presence does not imply the access token is still valid; callers
    /// that are about to dispatch go through [`Self::refresh_if_needed`].
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self.store.load(),
            Ok(Some(credential))
                if !credential.access_token.is_empty() && !credential.refresh_token.is_empty()
        )
    }

    /// The currently stored access token, if any.
    pub fn access_token(&self) -> Option<String> {
        self.store
            .load()
            .ok()
            .flatten()
            .map(|credential| credential.access_token)
    }

    /// Ensures the stored access token is valid for at least the expiry
    /// buffer, refreshing it if not.
    ///
    /// Returns `true` when a usable credential is in place afterwards and
    /// `false` when there is none or the refresh budget was exhausted.
    /// A `false` means the session is invalid; recovery is an explicit
    /// re-login, never an automatic background action.
    pub async fn refresh_if_needed(&self) -> bool {
        let _gate = self.refresh_gate.lock().await;

        let credential = match self.store.load() {
            Ok(Some(credential)) => credential,
            Ok(None) => return false,
            Err(error) => {
                log::error!("Could not read the stored credential: {error}");
                return false;
            }
        };

        if !credential.is_due_for_refresh(now_epoch_ms(), EXPIRY_BUFFER_MS) {
            return true;
        }

        for attempt in 1..=MAX_REFRESH_ATTEMPTS {
            match self.transport.refresh(&credential.refresh_token).await {
                Ok(pair) => {
                    let refreshed = Credential::from_token_pair(
                        pair.access_token,
                        pair.refresh_token,
                        now_epoch_ms(),
                    );
                    if let Err(error) = self.store.store(&refreshed) {
                        log::error!("Could not persist the refreshed credential: {error}");
                        return false;
                    }
                    log::info!("Refreshed the access token on attempt {attempt}");
                    return true;
                }
                Err(error) => {
                    log::warn!(
                        "Token refresh attempt {attempt}/{MAX_REFRESH_ATTEMPTS} failed: {error}"
                    );
                    if attempt < MAX_REFRESH_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(attempt as u64 * 1000)).await;
                    }
                }
            }
        }

        false
    }

    /// Clears the stored credential. The only path that destroys one.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.store.clear()?;
        log::info!("Cleared stored credentials");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use base64::Engine;

    use super::*;
    use crate::credentials::{FALLBACK_TTL_MS, MemoryCredentialStore};

    fn jwt_with_exp(exp_secs: i64) -> String {
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(format!("{{\"exp\":{exp_secs}}}"));
        format!("header.{payload}.signature")
    }

    fn pair(tag: &str) -> TokenPair {
        TokenPair {
            access_token: format!("access-{tag}"),
            refresh_token: format!("refresh-{tag}"),
        }
    }

    /// Transport that answers refresh calls from a script and counts them.
    #[derive(Default)]
    struct ScriptedTransport {
        refresh_script: Mutex<VecDeque<Result<TokenPair, String>>>,
        refresh_calls: AtomicU32,
        login_pair: Option<TokenPair>,
    }

    impl ScriptedTransport {
        fn scripted(script: Vec<Result<TokenPair, String>>) -> Self {
            Self {
                refresh_script: Mutex::new(script.into()),
                ..Self::default()
            }
        }

        fn calls(&self) -> u32 {
            self.refresh_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthTransport for ScriptedTransport {
        async fn login(&self, _identity: &str, _device_token: &str) -> Result<TokenPair, AuthError> {
            self.login_pair
                .clone()
                .ok_or_else(|| AuthError::Rejected("no login scripted".into()))
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, AuthError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.refresh_script
                .lock()
                .unwrap()
                .pop_front()
                .expect("refresh called more often than scripted")
                .map_err(AuthError::Transport)
        }
    }

    fn manager_with(
        credential: Option<Credential>,
        transport: Arc<ScriptedTransport>,
    ) -> TokenManager {
        let store: Arc<dyn CredentialStore> = match credential {
            Some(credential) => Arc::new(MemoryCredentialStore::with_credential(credential)),
            None => Arc::new(MemoryCredentialStore::default()),
        };
        TokenManager::new(store, transport)
    }

    fn credential_expiring_in(ms_from_now: i64) -> Credential {
        Credential {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expiry_epoch_ms: now_epoch_ms() + ms_from_now,
        }
    }

    #[tokio::test]
    async fn fresh_credential_skips_the_network() {
        let transport = Arc::new(ScriptedTransport::default());
        let manager = manager_with(
            Some(credential_expiring_in(EXPIRY_BUFFER_MS + 60_000)),
            transport.clone(),
        );

        assert!(manager.refresh_if_needed().await);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn expiry_inside_the_buffer_triggers_a_refresh() {
        let transport = Arc::new(ScriptedTransport::scripted(vec![Ok(pair("new"))]));
        let manager = manager_with(
            Some(credential_expiring_in(EXPIRY_BUFFER_MS - 1)),
            transport.clone(),
        );

        assert!(manager.refresh_if_needed().await);
        assert_eq!(transport.calls(), 1);
        assert_eq!(manager.access_token().as_deref(), Some("access-new"));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_retries_with_backoff_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::scripted(vec![
            Err("connection reset".into()),
            Err("connection reset".into()),
            Ok(pair("third")),
        ]));
        let manager = manager_with(Some(credential_expiring_in(0)), transport.clone());

        let started = tokio::time::Instant::now();
        assert!(manager.refresh_if_needed().await);

        assert_eq!(transport.calls(), 3);
        // Backoff of 1s after the first failure and 2s after the second.
        assert_eq!(started.elapsed(), Duration::from_millis(3000));
        assert_eq!(manager.access_token().as_deref(), Some("access-third"));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_refresh_reports_an_invalid_session() {
        let transport = Arc::new(ScriptedTransport::scripted(vec![
            Err("timeout".into()),
            Err("timeout".into()),
            Err("timeout".into()),
        ]));
        let manager = manager_with(Some(credential_expiring_in(0)), transport.clone());

        assert!(!manager.refresh_if_needed().await);
        assert_eq!(transport.calls(), 3);
        // The stale credential is left in place for a later explicit login.
        assert_eq!(manager.access_token().as_deref(), Some("access"));
    }

    #[tokio::test]
    async fn missing_credential_is_an_invalid_session() {
        let transport = Arc::new(ScriptedTransport::default());
        let manager = manager_with(None, transport.clone());

        assert!(!manager.refresh_if_needed().await);
        assert_eq!(transport.calls(), 0);
        assert!(!manager.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let transport = Arc::new(ScriptedTransport::scripted(vec![
            Err("connection reset".into()),
            Ok(pair("shared")),
        ]));
        let manager = manager_with(Some(credential_expiring_in(0)), transport.clone());

        let (first, second) =
            tokio::join!(manager.refresh_if_needed(), manager.refresh_if_needed());

        assert!(first && second);
        // Two attempts by the first caller; the second observed the result.
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn login_decodes_expiry_and_persists() {
        let exp_secs = (now_epoch_ms() / 1000) + 7200;
        let transport = Arc::new(ScriptedTransport {
            login_pair: Some(TokenPair {
                access_token: jwt_with_exp(exp_secs),
                refresh_token: "refresh-login".into(),
            }),
            ..ScriptedTransport::default()
        });
        let manager = manager_with(None, transport);

        let credential = manager.login("user@example.com", "device-1").await.unwrap();
        assert_eq!(credential.expiry_epoch_ms, exp_secs * 1000);
        assert!(manager.is_authenticated());
    }

    #[tokio::test]
    async fn login_with_opaque_token_uses_fallback_ttl() {
        let transport = Arc::new(ScriptedTransport {
            login_pair: Some(TokenPair {
                access_token: "opaque".into(),
                refresh_token: "refresh-login".into(),
            }),
            ..ScriptedTransport::default()
        });
        let manager = manager_with(None, transport);

        let before = now_epoch_ms();
        let credential = manager.login("user@example.com", "device-1").await.unwrap();
        let offset = credential.expiry_epoch_ms - before;
        assert!(
            (FALLBACK_TTL_MS..FALLBACK_TTL_MS + 5_000).contains(&offset),
            "fallback expiry was {offset}ms from login"
        );
    }

    #[tokio::test]
    async fn logout_destroys_the_credential() {
        let transport = Arc::new(ScriptedTransport::default());
        let manager = manager_with(Some(credential_expiring_in(1_000_000)), transport);

        assert!(manager.is_authenticated());
        manager.logout().unwrap();
        assert!(!manager.is_authenticated());
        assert_eq!(manager.access_token(), None);
    }
}
