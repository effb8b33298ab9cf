//! Sproutly Auth client for Rust
//!
//! This crate provides authentication functionality for the Sproutly API,
//! including login, password changes, token storage, and session management.
//!
//! Tokens are held as an opaque access/refresh pair behind a pluggable
//! [`TokenStore`]; the default store writes to the OS keychain. A persisted
//! session snapshot (the last-known user and their children) allows the
//! embedding app to restore state on relaunch without a network round trip.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use keyring::Entry;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Result type
pub type Result<T> = std::result::Result<T, AuthError>;

/// Error type
#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Server returned a non-JSON response ({status}): {snippet}")]
    InvalidResponse { status: u16, snippet: String },

    #[error("{0}")]
    Rejected(String),

    #[error("Token storage error: {0}")]
    StorageError(String),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "sproutly_access_token";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "sproutly_refresh_token";
/// Storage key for the persisted session snapshot.
pub const SESSION_KEY: &str = "sproutly_session";

const KEYRING_SERVICE: &str = "sproutly";

/// Pluggable storage for the token pair and the session snapshot.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn store(&self, key: &str, value: &str) -> Result<()>;
    async fn retrieve(&self, key: &str) -> Result<Option<String>>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Token store backed by the OS keychain.
pub struct KeyringStore;

impl KeyringStore {
    pub fn new() -> Self {
        Self
    }

    fn entry(key: &str) -> Result<Entry> {
        Entry::new(KEYRING_SERVICE, key)
            .map_err(|e| AuthError::StorageError(format!("keyring entry for {key}: {e}")))
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for KeyringStore {
    async fn store(&self, key: &str, value: &str) -> Result<()> {
        Self::entry(key)?
            .set_password(value)
            .map_err(|e| AuthError::StorageError(format!("failed to store {key}: {e}")))
    }

    async fn retrieve(&self, key: &str) -> Result<Option<String>> {
        match Self::entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AuthError::StorageError(format!(
                "failed to read {key}: {e}"
            ))),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match Self::entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AuthError::StorageError(format!(
                "failed to delete {key}: {e}"
            ))),
        }
    }
}

/// In-memory token store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn store(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.write().unwrap().remove(key);
        Ok(())
    }
}

/// The logged-in user as the login endpoint reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub role: String,
    #[serde(default)]
    pub children: Vec<SessionChild>,
}

/// A child associated with the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionChild {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub class_name: Option<String>,
}

/// Session snapshot persisted for relaunch restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub user: SessionUser,
    pub stored_at: DateTime<Utc>,
}

/// The current token pair.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    exp: Option<i64>,
}

impl Session {
    /// Whether the access token's `exp` claim has passed.
    ///
    /// The signature is not verified; the server remains the authority on
    /// rejecting a token. A token that cannot be decoded is treated as
    /// non-expiring, matching the long-lived-session contract.
    pub fn is_expired(&self) -> bool {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        match decode::<JwtClaims>(&self.access_token, &DecodingKey::from_secret(&[]), &validation)
        {
            Ok(data) => match data.claims.exp {
                Some(exp) => Utc::now().timestamp() >= exp,
                None => false,
            },
            Err(_) => false,
        }
    }
}

/// Auth lifecycle notifications, broadcast on a watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedOut,
    SignedIn,
    SessionExpired,
}

/// Single-flight guard for session-expiry handling.
///
/// `begin` returns `true` to exactly one caller per debounce window; every
/// other caller inside the window gets `false`. The window self-resets, so
/// a later expiry (after the window) wins the flight again.
pub struct ExpiryGuard {
    window: Duration,
    fired_at: Mutex<Option<Instant>>,
}

impl ExpiryGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            fired_at: Mutex::new(None),
        }
    }

    pub fn begin(&self) -> bool {
        let mut fired_at = self.fired_at.lock().unwrap();
        match *fired_at {
            Some(at) if at.elapsed() < self.window => false,
            _ => {
                *fired_at = Some(Instant::now());
                true
            }
        }
    }
}

/// Successful login result.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub user: SessionUser,
    pub session: Session,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Text(String),
    Nested { message: String },
}

/// Response body shared by the login and password endpoints. The access
/// token is accepted under either field name the backend has used.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponseBody {
    success: Option<bool>,
    #[serde(alias = "token")]
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<SessionUser>,
    error: Option<ErrorField>,
    message: Option<String>,
}

impl AuthResponseBody {
    fn error_message(&self, status: reqwest::StatusCode) -> String {
        match &self.error {
            Some(ErrorField::Text(text)) => text.clone(),
            Some(ErrorField::Nested { message }) => message.clone(),
            None => match &self.message {
                Some(message) => message.clone(),
                None => format!(
                    "API error: {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                ),
            },
        }
    }
}

/// Client for Sproutly authentication.
///
/// Owns the token pair, the persisted session snapshot, and the
/// single-flight expiry guard consulted by the request layer on 401.
pub struct AuthClient {
    /// Base URL up to and including the API prefix.
    base_url: String,

    /// HTTP client used for requests.
    client: Client,

    /// Token and session storage.
    store: Arc<dyn TokenStore>,

    /// Single-flight guard for concurrent 401s.
    guard: ExpiryGuard,

    events: watch::Sender<AuthEvent>,
}

impl AuthClient {
    /// Default debounce window for concurrent session-expiry handling.
    pub const DEFAULT_EXPIRY_DEBOUNCE: Duration = Duration::from_secs(3);

    pub fn new(base_url: &str, client: Client, store: Arc<dyn TokenStore>) -> Self {
        Self::new_with_debounce(base_url, client, store, Self::DEFAULT_EXPIRY_DEBOUNCE)
    }

    /// Create a client with a custom expiry-debounce window (tests shrink it).
    pub fn new_with_debounce(
        base_url: &str,
        client: Client,
        store: Arc<dyn TokenStore>,
        debounce: Duration,
    ) -> Self {
        let (events, _) = watch::channel(AuthEvent::SignedOut);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            store,
            guard: ExpiryGuard::new(debounce),
            events,
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth{}", self.base_url, path)
    }

    /// Subscribe to auth lifecycle events (sign-in, sign-out, expiry).
    pub fn subscribe(&self) -> watch::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Log in with phone number and password.
    ///
    /// The body is read as text and parsed manually so that a non-JSON
    /// response (a proxy error page, say) produces a descriptive error
    /// instead of an opaque decode failure. On success both tokens are
    /// stored and the session snapshot is persisted.
    pub async fn login(&self, phone: &str, password: &str) -> Result<LoginResponse> {
        let url = self.auth_url("/login");
        let body = serde_json::json!({ "phone": phone, "password": password });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let parsed: AuthResponseBody =
            serde_json::from_str(&text).map_err(|_| AuthError::InvalidResponse {
                status: status.as_u16(),
                snippet: snippet(&text),
            })?;

        if !status.is_success() || parsed.success == Some(false) {
            return Err(AuthError::Rejected(parsed.error_message(status)));
        }

        let access_token = parsed.access_token.ok_or_else(|| {
            AuthError::Rejected("Login response did not include an access token".to_string())
        })?;
        let user = parsed.user.ok_or_else(|| {
            AuthError::Rejected("Login response did not include a user".to_string())
        })?;

        self.store_tokens(&access_token, parsed.refresh_token.as_deref())
            .await;
        self.persist_session(&user).await;
        let _ = self.events.send(AuthEvent::SignedIn);

        Ok(LoginResponse {
            user,
            session: Session {
                access_token,
                refresh_token: parsed.refresh_token,
            },
        })
    }

    /// Change a parent's password (self-service flow).
    pub async fn change_password(&self, phone: &str, new_password: &str) -> Result<()> {
        let body = serde_json::json!({ "phone": phone, "newPassword": new_password });
        self.post_password(self.auth_url("/change-password"), body)
            .await
    }

    /// Change a staff member's password; requires the old password.
    pub async fn change_password_staff(
        &self,
        phone: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let body = serde_json::json!({
            "phone": phone,
            "oldPassword": old_password,
            "newPassword": new_password,
        });
        self.post_password(self.auth_url("/change-password-staff"), body)
            .await
    }

    async fn post_password(&self, url: String, body: serde_json::Value) -> Result<()> {
        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let parsed: AuthResponseBody =
            serde_json::from_str(&text).map_err(|_| AuthError::InvalidResponse {
                status: status.as_u16(),
                snippet: snippet(&text),
            })?;

        if !status.is_success() || parsed.success == Some(false) {
            return Err(AuthError::Rejected(parsed.error_message(status)));
        }

        Ok(())
    }

    /// Persist the token pair. Failures are logged, never propagated; a
    /// device that cannot store tokens simply behaves as logged out.
    pub async fn store_tokens(&self, access: &str, refresh: Option<&str>) {
        if let Err(e) = self.store.store(ACCESS_TOKEN_KEY, access).await {
            warn!("failed to store access token: {e}");
        }
        if let Some(refresh) = refresh {
            if let Err(e) = self.store.store(REFRESH_TOKEN_KEY, refresh).await {
                warn!("failed to store refresh token: {e}");
            }
        }
    }

    /// Read the access token; `None` on any storage failure.
    pub async fn access_token(&self) -> Option<String> {
        match self.store.retrieve(ACCESS_TOKEN_KEY).await {
            Ok(token) => token,
            Err(e) => {
                warn!("failed to read access token: {e}");
                None
            }
        }
    }

    /// Read the refresh token; `None` on any storage failure.
    pub async fn refresh_token(&self) -> Option<String> {
        match self.store.retrieve(REFRESH_TOKEN_KEY).await {
            Ok(token) => token,
            Err(e) => {
                warn!("failed to read refresh token: {e}");
                None
            }
        }
    }

    /// The current token pair, if an access token is stored.
    pub async fn current_session(&self) -> Option<Session> {
        let access_token = self.access_token().await?;
        Some(Session {
            access_token,
            refresh_token: self.refresh_token().await,
        })
    }

    /// Delete both tokens. Failures are logged, never propagated.
    pub async fn clear_tokens(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.store.delete(key).await {
                warn!("failed to delete {key}: {e}");
            }
        }
    }

    /// Persist the session snapshot used for relaunch restore.
    pub async fn persist_session(&self, user: &SessionUser) {
        let snapshot = StoredSession {
            user: user.clone(),
            stored_at: Utc::now(),
        };
        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                if let Err(e) = self.store.store(SESSION_KEY, &json).await {
                    warn!("failed to persist session snapshot: {e}");
                }
            }
            Err(e) => warn!("failed to serialize session snapshot: {e}"),
        }
    }

    /// Restore the persisted session snapshot. A corrupt blob is logged and
    /// treated as a miss.
    pub async fn restore_session(&self) -> Option<StoredSession> {
        let json = match self.store.retrieve(SESSION_KEY).await {
            Ok(json) => json?,
            Err(e) => {
                warn!("failed to read session snapshot: {e}");
                return None;
            }
        };
        match serde_json::from_str(&json) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("discarding corrupt session snapshot: {e}");
                None
            }
        }
    }

    /// Sign out locally: clear tokens and the session snapshot, then
    /// broadcast [`AuthEvent::SignedOut`].
    pub async fn sign_out(&self) {
        self.clear_tokens().await;
        if let Err(e) = self.store.delete(SESSION_KEY).await {
            warn!("failed to delete session snapshot: {e}");
        }
        let _ = self.events.send(AuthEvent::SignedOut);
    }

    /// Handle a 401 from any endpoint.
    ///
    /// The first caller per debounce window clears all stored state and
    /// broadcasts [`AuthEvent::SessionExpired`]; concurrent callers inside
    /// the window are no-ops. Returns whether this call won the flight.
    pub async fn handle_unauthorized(&self) -> bool {
        if !self.guard.begin() {
            debug!("session expiry already handled within the debounce window");
            return false;
        }

        self.clear_tokens().await;
        if let Err(e) = self.store.delete(SESSION_KEY).await {
            warn!("failed to delete session snapshot: {e}");
        }
        let _ = self.events.send(AuthEvent::SessionExpired);
        true
    }
}

fn snippet(text: &str) -> String {
    const MAX: usize = 120;
    let trimmed = text.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut end = MAX;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: i64,
    }

    fn token_with_exp(exp: i64) -> String {
        let claims = TestClaims {
            sub: "42".to_string(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    #[test]
    fn expiry_guard_is_single_flight() {
        let guard = ExpiryGuard::new(Duration::from_secs(3));
        assert!(guard.begin());
        assert!(!guard.begin());
        assert!(!guard.begin());
    }

    #[test]
    fn expiry_guard_resets_after_window() {
        let guard = ExpiryGuard::new(Duration::from_millis(10));
        assert!(guard.begin());
        std::thread::sleep(Duration::from_millis(20));
        assert!(guard.begin());
    }

    #[test]
    fn session_expiry_follows_exp_claim() {
        let expired = Session {
            access_token: token_with_exp(Utc::now().timestamp() - 60),
            refresh_token: None,
        };
        assert!(expired.is_expired());

        let live = Session {
            access_token: token_with_exp(Utc::now().timestamp() + 3600),
            refresh_token: None,
        };
        assert!(!live.is_expired());
    }

    #[test]
    fn malformed_token_is_treated_as_long_lived() {
        let session = Session {
            access_token: "not-a-jwt".to_string(),
            refresh_token: None,
        };
        assert!(!session.is_expired());
    }

    #[test]
    fn memory_store_round_trips() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            store.store("k", "v").await.unwrap();
            assert_eq!(store.retrieve("k").await.unwrap(), Some("v".to_string()));
            store.delete("k").await.unwrap();
            assert_eq!(store.retrieve("k").await.unwrap(), None);
        });
    }

    #[test]
    fn session_snapshot_round_trips() {
        tokio_test::block_on(async {
            let store = Arc::new(MemoryStore::new());
            let auth = AuthClient::new("http://localhost", Client::new(), store);

            let user = SessionUser {
                id: 7,
                name: "Asha".to_string(),
                phone: "9999999990".to_string(),
                role: "parent".to_string(),
                children: vec![SessionChild {
                    id: 5,
                    name: "Kiran".to_string(),
                    class_name: Some("Nursery A".to_string()),
                }],
            };

            auth.persist_session(&user).await;
            let restored = auth.restore_session().await.unwrap();
            assert_eq!(restored.user.id, 7);
            assert_eq!(restored.user.children.len(), 1);

            auth.sign_out().await;
            assert!(auth.restore_session().await.is_none());
        });
    }

    #[test]
    fn corrupt_snapshot_is_a_miss() {
        tokio_test::block_on(async {
            let store = Arc::new(MemoryStore::new());
            store.store(SESSION_KEY, "{not json").await.unwrap();
            let auth = AuthClient::new("http://localhost", Client::new(), store);
            assert!(auth.restore_session().await.is_none());
        });
    }

    #[test]
    fn error_message_prefers_explicit_error_field() {
        let body: AuthResponseBody = serde_json::from_str(
            r#"{"success": false, "error": "Invalid credentials", "message": "fallback"}"#,
        )
        .unwrap();
        assert_eq!(
            body.error_message(reqwest::StatusCode::UNAUTHORIZED),
            "Invalid credentials"
        );

        let nested: AuthResponseBody = serde_json::from_str(
            r#"{"success": false, "error": {"message": "Account disabled"}}"#,
        )
        .unwrap();
        assert_eq!(
            nested.error_message(reqwest::StatusCode::FORBIDDEN),
            "Account disabled"
        );

        let bare: AuthResponseBody =
            serde_json::from_str(r#"{"success": false, "message": "Phone not registered"}"#)
                .unwrap();
        assert_eq!(
            bare.error_message(reqwest::StatusCode::NOT_FOUND),
            "Phone not registered"
        );

        let empty: AuthResponseBody = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(
            empty.error_message(reqwest::StatusCode::BAD_GATEWAY),
            "API error: 502 Bad Gateway"
        );
    }
}
