//! Credential model and the store capability it is persisted through.

use std::path::PathBuf;
use std::sync::Mutex;

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Lifetime assumed for an access token whose expiry claim cannot be
/// decoded, in milliseconds.
pub const FALLBACK_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// The stored token pair and its expiry.
///
/// `expiry_epoch_ms` always reflects the `exp` claim decoded from
/// `access_token`, or `now + FALLBACK_TTL_MS` when the token carries no
/// readable claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Server-declared expiry of `access_token`, as epoch milliseconds.
    pub expiry_epoch_ms: i64,
}

impl Credential {
    /// Builds a credential from a freshly issued token pair, decoding the
    /// access token's expiry claim.
    pub fn from_token_pair(access_token: String, refresh_token: String, now_ms: i64) -> Self {
        let expiry_epoch_ms =
            decode_expiry_epoch_ms(&access_token).unwrap_or(now_ms + FALLBACK_TTL_MS);
        Self {
            access_token,
            refresh_token,
            expiry_epoch_ms,
        }
    }

    /// Whether the access token should be refreshed now.
    ///
    /// The boundary is inclusive: a token exactly `buffer_ms` away from
    /// expiry is already due, so a request issued now cannot race the
    /// expiry mid-flight.
    pub fn is_due_for_refresh(&self, now_ms: i64, buffer_ms: i64) -> bool {
        now_ms >= self.expiry_epoch_ms - buffer_ms
    }
}

/// Reads the `exp` claim out of a JWT-shaped access token.
///
/// The payload segment is base64url without padding; `exp` is in seconds
/// since the epoch. Any deviation from that shape yields `None` and the
/// caller falls back to a conservative lifetime.
fn decode_expiry_epoch_ms(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_i64()?.checked_mul(1000)
}

/// Errors that can occur while reading or writing the credential store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O error occurred while accessing the backing file.
    #[error("failed to access credential storage: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to serialize the credential for persistence.
    #[error("failed to serialize credential: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// The stored credential file is corrupt or has an unexpected shape.
    #[error("failed to deserialize credential: {0}")]
    Deserialize(#[from] toml::de::Error),
}

/// Durable storage for the credential.
///
/// The token manager is the only writer. The store is a capability so an
/// embedding shell can substitute a platform keystore, and tests an
/// in-memory map.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Credential>, StoreError>;
    fn store(&self, credential: &Credential) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// File-backed store keeping the credential as TOML under the user's
/// config directory.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(Some(toml::from_str(&contents)?))
    }

    fn store(&self, credential: &Credential) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(credential)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            inner: Mutex::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credential>, StoreError> {
        Ok(self.inner.lock().expect("credential lock poisoned").clone())
    }

    fn store(&self, credential: &Credential) -> Result<(), StoreError> {
        *self.inner.lock().expect("credential lock poisoned") = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.inner.lock().expect("credential lock poisoned") = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_exp(exp_secs: i64) -> String {
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(format!("{{\"exp\":{exp_secs}}}"));
        format!("header.{payload}.signature")
    }

    #[test]
    fn expiry_comes_from_the_token_claim() {
        let credential =
            Credential::from_token_pair(jwt_with_exp(1_900_000_000), "refresh".into(), 0);
        assert_eq!(credential.expiry_epoch_ms, 1_900_000_000_000);
    }

    #[test]
    fn opaque_token_falls_back_to_conservative_ttl() {
        let credential =
            Credential::from_token_pair("not-a-jwt".into(), "refresh".into(), 5_000);
        assert_eq!(credential.expiry_epoch_ms, 5_000 + FALLBACK_TTL_MS);
    }

    #[test]
    fn garbage_payload_falls_back_to_conservative_ttl() {
        let credential =
            Credential::from_token_pair("a.!!!not-base64!!!.c".into(), "refresh".into(), 0);
        assert_eq!(credential.expiry_epoch_ms, FALLBACK_TTL_MS);
    }

    #[test]
    fn refresh_boundary_is_inclusive_of_the_buffer() {
        let credential = Credential {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expiry_epoch_ms: 10_000,
        };
        assert!(credential.is_due_for_refresh(9_000, 1_000));
        assert!(!credential.is_due_for_refresh(8_999, 1_000));
    }

    #[test]
    fn file_store_round_trips_and_clears() {
        let path = std::env::temp_dir().join(format!(
            "parlance-credentials-test-{}.toml",
            std::process::id()
        ));
        let store = FileCredentialStore::new(path.clone());
        store.clear().unwrap();

        assert!(store.load().unwrap().is_none());

        let credential = Credential {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expiry_epoch_ms: 42,
        };
        store.store(&credential).unwrap();
        assert_eq!(store.load().unwrap(), Some(credential));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        let _ = std::fs::remove_file(path);
    }
}
