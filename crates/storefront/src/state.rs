//! Application state shared across handlers.

use std::sync::Arc;

use vidriera_core::StatusPolicy;

use crate::config::StorefrontConfig;
use crate::db::Store;
use crate::services::auth::GoogleClient;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the store and configuration.
pub struct AppState<S> {
    inner: Arc<AppStateInner<S>>,
}

struct AppStateInner<S> {
    config: StorefrontConfig,
    store: S,
    google: GoogleClient,
}

// Manual impl: `S` itself need not be `Clone` for the handle to be.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Store> AppState<S> {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `store` - Storage backend (`PgStore` in production)
    #[must_use]
    pub fn new(config: StorefrontConfig, store: S) -> Self {
        let google = GoogleClient::new(&config.google);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                google,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Get a reference to the Google OAuth client.
    #[must_use]
    pub fn google(&self) -> &GoogleClient {
        &self.inner.google
    }

    #[must_use]
    pub fn status_policy(&self) -> StatusPolicy {
        self.inner.config.status_policy
    }
}
