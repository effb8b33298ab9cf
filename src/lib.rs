//! Sproutly Rust Client Library
//!
//! A Rust client library for the Sproutly preschool management API,
//! providing authenticated access to the parent, teacher, and driver
//! surfaces plus a local offline cache with a pending-action outbox.

pub mod clock;
pub mod config;
pub mod driver;
pub mod endpoint;
pub mod error;
mod fetch;
pub mod media;
pub mod parent;
pub mod sync;
pub mod teacher;
pub mod types;

use std::sync::Arc;

use reqwest::Client;

use crate::clock::{Clock, SystemClock};
use crate::config::ClientOptions;
use crate::driver::DriverClient;
use crate::endpoint::ApiPath;
use crate::fetch::Transport;
use crate::media::MediaClient;
use crate::parent::ParentClient;
use crate::sync::SyncEngine;
use crate::teacher::TeacherClient;

pub use crate::error::Error;

/// Authentication building blocks, re-exported from `sproutly-rust-auth`.
pub mod auth {
    pub use sproutly_rust_auth::*;
}

/// Offline cache building blocks, re-exported from `sproutly-rust-cache`.
pub mod cache {
    pub use sproutly_rust_cache::*;
}

use crate::auth::{AuthClient, KeyringStore, TokenStore};
use crate::cache::OfflineCache;

/// The main entry point for the Sproutly Rust client
pub struct Sproutly {
    /// The base URL for the Sproutly backend
    pub url: String,
    /// HTTP client used for requests
    pub http_client: Client,
    /// Client options
    pub options: ClientOptions,
    auth: Arc<AuthClient>,
    clock: Arc<dyn Clock>,
    transport: Transport,
}

impl Sproutly {
    /// Create a new Sproutly client with the OS keychain as token storage
    ///
    /// # Example
    ///
    /// ```
    /// use sproutly_rust::Sproutly;
    ///
    /// let sproutly = Sproutly::new("https://api.sproutly.example");
    /// ```
    pub fn new(base_url: &str) -> Self {
        Self::new_with_options(base_url, ClientOptions::default())
    }

    /// Create a new Sproutly client with custom options
    ///
    /// # Example
    ///
    /// ```
    /// use sproutly_rust::{config::ClientOptions, Sproutly};
    /// use std::time::Duration;
    ///
    /// let options = ClientOptions::default()
    ///     .with_request_timeout(Some(Duration::from_secs(10)));
    /// let sproutly = Sproutly::new_with_options("https://api.sproutly.example", options);
    /// ```
    pub fn new_with_options(base_url: &str, options: ClientOptions) -> Self {
        Self::new_with_store(base_url, options, Arc::new(KeyringStore::new()))
    }

    /// Create a new Sproutly client with explicit token storage (tests use
    /// an in-memory store)
    pub fn new_with_store(
        base_url: &str,
        options: ClientOptions,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        let http_client = Client::new();
        let paths = ApiPath::new(base_url, &options.api_prefix);

        let auth = Arc::new(AuthClient::new_with_debounce(
            &paths.root(),
            http_client.clone(),
            store,
            options.expiry_debounce,
        ));
        let transport = Transport::new(
            http_client.clone(),
            paths,
            auth.clone(),
            options.request_timeout,
        );

        Self {
            url: base_url.to_string(),
            http_client,
            options,
            auth,
            clock: Arc::new(SystemClock),
            transport,
        }
    }

    /// Replace the time source (tests pin the calendar date)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get a reference to the auth client for login and token management
    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    /// Create a client for the parent surface
    pub fn parent(&self) -> ParentClient {
        ParentClient::new(
            self.transport.clone(),
            self.clock.clone(),
            self.options.timezone,
        )
    }

    /// Create a client for the teacher surface
    pub fn teacher(&self) -> TeacherClient {
        TeacherClient::new(self.transport.clone())
    }

    /// Create a client for the driver surface
    pub fn driver(&self) -> DriverClient {
        DriverClient::new(self.transport.clone())
    }

    /// Create a client for media uploads
    pub fn media(&self) -> MediaClient {
        MediaClient::new(self.transport.clone())
    }

    /// Create a sync engine that replays the given cache's outbox through
    /// this client
    pub fn sync_engine(&self, cache: OfflineCache) -> SyncEngine {
        SyncEngine::new(cache, self.teacher(), self.driver())
    }

    /// Sign out: clear tokens and the session snapshot, and purge the
    /// offline cache when one is in use
    pub async fn sign_out(&self, cache: Option<&OfflineCache>) -> Result<(), Error> {
        self.auth.sign_out().await;
        if let Some(cache) = cache {
            cache.clear_all_cache().await?;
        }
        Ok(())
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::cache::OfflineCache;
    pub use crate::config::ClientOptions;
    pub use crate::error::Error;
    pub use crate::Sproutly;
}
