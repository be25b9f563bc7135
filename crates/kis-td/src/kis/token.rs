//! Access-token lifecycle: reuse a cached credential, or exchange the app
//! key/secret for a new one and persist it.
//!
//! The broker rate-limits (and may temporarily block) token issuance, so a
//! credential is reused from disk for as long as it stays usable. The only
//! network call here is the exchange in [`TokenManager::acquire_at`] when no
//! usable credential exists.
//!
//! # Known gap
//!
//! Load → exchange → save is serialized within one process by an async mutex.
//! Two processes sharing one credential file are not coordinated.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use kis_core::error::{KisError, Result};
use kis_core::logging::redact;
use kis_core::time_util::now_secs;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A credential is refreshed this many seconds before it actually expires.
pub const SAFETY_MARGIN_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// A bearer token and the instant it stops being accepted.
///
/// Never mutated in place; a refresh produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque bearer token.
    pub access_token: String,
    /// Expiry as seconds since Unix epoch.
    #[serde(deserialize_with = "epoch_secs")]
    pub expires_at: i64,
}

impl Credential {
    /// `true` while `now` is more than [`SAFETY_MARGIN_SECS`] before expiry.
    pub fn is_usable_at(&self, now: i64) -> bool {
        now < self.expires_at.saturating_sub(SAFETY_MARGIN_SECS)
    }

    /// Seconds left until expiry (negative once expired).
    pub fn remaining_secs(&self, now: i64) -> i64 {
        self.expires_at - now
    }
}

/// Accepts integer or fractional epoch seconds; fractions are truncated.
fn epoch_secs<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() {
        return Err(serde::de::Error::custom("expires_at is not a finite number"));
    }
    Ok(secs as i64)
}

/// Result of a successful token exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    /// Time-to-live in seconds.
    pub ttl_secs: u64,
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Exchanges application credentials for an access token.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Perform one exchange. Failures should be [`KisError::Auth`].
    async fn exchange(&self, app_key: &str, app_secret: &str) -> Result<IssuedToken>;
}

/// Durable slot holding at most one [`Credential`].
pub trait CredentialStore: Send + Sync {
    /// Read the stored credential. Missing or unreadable storage is `None`.
    fn load(&self) -> Option<Credential>;

    /// Overwrite the stored credential.
    fn save(&self, credential: &Credential) -> std::io::Result<()>;
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// JSON file store (`{"access_token": "...", "expires_at": 1700000000}`).
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<Credential> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("[kis-token] no cached token at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("[kis-token] cannot read {}: {e}", self.path.display());
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!("[kis-token] ignoring corrupt token file {}: {e}", self.path.display());
                None
            }
        }
    }

    fn save(&self, credential: &Credential) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(credential)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)
    }
}

/// In-process store, for tests and callers that do not want a token file.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: std::sync::Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with `credential`.
    pub fn with(credential: Credential) -> Self {
        Self {
            slot: std::sync::Mutex::new(Some(credential)),
        }
    }

    /// The currently stored credential.
    pub fn current(&self) -> Option<Credential> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<Credential> {
        self.current()
    }

    fn save(&self, credential: &Credential) -> std::io::Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(credential.clone());
        Ok(())
    }
}

// Lets callers keep a handle on a store they hand to the manager.
impl<S: CredentialStore + ?Sized> CredentialStore for Arc<S> {
    fn load(&self) -> Option<Credential> {
        (**self).load()
    }

    fn save(&self, credential: &Credential) -> std::io::Result<()> {
        (**self).save(credential)
    }
}

// ---------------------------------------------------------------------------
// TokenManager
// ---------------------------------------------------------------------------

/// Owns the single cached credential.
pub struct TokenManager {
    app_key: String,
    app_secret: String,
    store: Box<dyn CredentialStore>,
    exchange: Arc<dyn TokenExchange>,
    /// Last known credential; `None` until the store has been read.
    cached: Mutex<Option<Credential>>,
}

impl TokenManager {
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        store: Box<dyn CredentialStore>,
        exchange: Arc<dyn TokenExchange>,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            store,
            exchange,
            cached: Mutex::new(None),
        }
    }

    /// [`acquire_at`](Self::acquire_at) with the wall clock.
    pub async fn acquire(&self) -> Result<Credential> {
        self.acquire_at(now_secs()).await
    }

    /// Return a credential usable at `now`, refreshing it if necessary.
    ///
    /// # Errors
    ///
    /// - [`KisError::Config`] if the app key or secret is empty (no network
    ///   call is attempted).
    /// - [`KisError::Auth`] if the exchange fails; nothing is persisted.
    pub async fn acquire_at(&self, now: i64) -> Result<Credential> {
        if self.app_key.trim().is_empty() || self.app_secret.trim().is_empty() {
            return Err(KisError::Config("app_key and app_secret are required".into()));
        }

        let mut cached = self.cached.lock().await;
        if cached.is_none() {
            *cached = self.store.load().filter(|c| {
                let blank = c.access_token.trim().is_empty();
                if blank {
                    warn!("[kis-token] ignoring stored credential with an empty token");
                }
                !blank
            });
        }

        if let Some(credential) = cached.as_ref() {
            if credential.is_usable_at(now) {
                debug!(
                    "[kis-token] reusing cached token, {}s remaining",
                    credential.remaining_secs(now)
                );
                return Ok(credential.clone());
            }
            info!("[kis-token] cached token expired or about to expire, refreshing");
        }

        let issued = self
            .exchange
            .exchange(&self.app_key, &self.app_secret)
            .await
            .map_err(|e| match e {
                KisError::Auth(_) => e,
                other => KisError::Auth(other.to_string()),
            })?;
        if issued.access_token.is_empty() {
            return Err(KisError::Auth("token exchange returned an empty token".into()));
        }

        let credential = Credential {
            access_token: issued.access_token,
            expires_at: now.saturating_add(i64::try_from(issued.ttl_secs).unwrap_or(i64::MAX)),
        };
        if let Err(e) = self.store.save(&credential) {
            warn!("[kis-token] issued token could not be persisted: {e}");
        }
        info!(
            "[kis-token] new token {}... valid for {}s",
            redact(&credential.access_token),
            issued.ttl_secs
        );

        *cached = Some(credential.clone());
        Ok(credential)
    }
}
