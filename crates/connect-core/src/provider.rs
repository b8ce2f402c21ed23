//! Connection provider trait and provider registry
//!
//! A [`ConnectionProvider`] is an external service capable of establishing a
//! live connection for a given account. Providers are resolved through a
//! [`ProviderRegistry`] keyed by [`ProviderId`]; the failover engine never
//! holds providers directly, it looks them up per attempt.
//!
//! The shipped [`InMemoryProviderRegistry`] is a `DashMap`-backed registry
//! suitable for embedding and for tests.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trunkline_connect_core::provider::{InMemoryProviderRegistry, ProviderRegistry, ConnectionProvider};
//! use trunkline_connect_core::types::ProviderId;
//!
//! # fn example(gsm_provider: Arc<dyn ConnectionProvider>) {
//! let registry = InMemoryProviderRegistry::new();
//! registry.register(gsm_provider);
//!
//! if let Some(provider) = registry.resolve(&ProviderId::new("carrier.gsm")) {
//!     println!("resolved provider {}", provider.provider_id());
//! }
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::processor::AttemptResponder;
use crate::types::{Call, ConnectionRequest, ProviderId};

/// An external service that can establish connections for accounts
///
/// `create_connection` is asynchronous in outcome: the provider must
/// eventually invoke exactly one of the responder's callbacks
/// (`success`, `failed`, or `cancelled`), possibly long after the method
/// itself returned. `abort_connection` is a best-effort request to cancel
/// an in-flight attempt or discard an already-created connection.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Component identifier this provider is registered under
    fn provider_id(&self) -> ProviderId;

    /// Begin establishing a connection for `call`
    ///
    /// The outcome arrives later through `responder`; exactly one callback
    /// per issued request.
    async fn create_connection(
        &self,
        call: Arc<Call>,
        request: ConnectionRequest,
        responder: AttemptResponder,
    );

    /// Best-effort request to cancel the in-flight attempt or discard the
    /// created connection for `call`
    async fn abort_connection(&self, call: Arc<Call>);
}

/// Resolves provider component identifiers to live provider handles
pub trait ProviderRegistry: Send + Sync {
    /// Look up the provider registered under `id`, if any
    fn resolve(&self, id: &ProviderId) -> Option<Arc<dyn ConnectionProvider>>;
}

/// In-memory provider registry backed by a concurrent map
pub struct InMemoryProviderRegistry {
    providers: DashMap<ProviderId, Arc<dyn ConnectionProvider>>,
}

impl InMemoryProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
        }
    }

    /// Register a provider under its own component identifier
    ///
    /// A later registration under the same identifier replaces the earlier
    /// one.
    pub fn register(&self, provider: Arc<dyn ConnectionProvider>) {
        let id = provider.provider_id();
        debug!(provider = %id, "registering connection provider");
        self.providers.insert(id, provider);
    }

    /// Remove the provider registered under `id`, returning it if present
    pub fn unregister(&self, id: &ProviderId) -> Option<Arc<dyn ConnectionProvider>> {
        debug!(provider = %id, "unregistering connection provider");
        self.providers.remove(id).map(|(_, provider)| provider)
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no providers are registered
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for InMemoryProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry for InMemoryProviderRegistry {
    fn resolve(&self, id: &ProviderId) -> Option<Arc<dyn ConnectionProvider>> {
        self.providers.get(id).map(|entry| entry.value().clone())
    }
}
