//! # trunkline-connect-core
//!
//! Connection-attempt failover for outgoing calls: given a call that needs
//! a live transport connection, build an ordered list of candidate
//! (manager, target) account pairs and try them one at a time against a
//! registry of connection providers until one succeeds, the caller aborts,
//! or every candidate is exhausted.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              ConnectionAttemptProcessor              │
//! │  candidate builder ──► failover drain ──► responder  │
//! └───────┬───────────────────┬──────────────────┬───────┘
//!         │                   │                  │
//!   AccountRegistrar    ProviderRegistry   CreateConnectionResponse
//!   CallClassifier      ConnectionProvider      (caller sink)
//! ```
//!
//! Collaborators are traits injected at construction, so the ordering
//! rules (connection-manager insertion, emergency override) and the
//! failover state machine are testable in isolation.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use trunkline_connect_core::{
//!     AccountCapabilities, AccountHandle, AccountRecord, AttemptResponder, Call,
//!     ConnectionAttemptProcessor, ConnectionProvider, ConnectionRequest,
//!     CreateConnectionResponse, DisconnectCode, EmergencyConfig, EstablishedConnection,
//!     InMemoryAccountRegistrar, InMemoryProviderRegistry, ProviderId, StaticCallClassifier,
//! };
//!
//! // A provider that connects every request immediately.
//! struct EchoProvider;
//!
//! #[async_trait]
//! impl ConnectionProvider for EchoProvider {
//!     fn provider_id(&self) -> ProviderId {
//!         ProviderId::new("demo.echo")
//!     }
//!
//!     async fn create_connection(
//!         &self,
//!         _call: Arc<Call>,
//!         request: ConnectionRequest,
//!         responder: AttemptResponder,
//!     ) {
//!         let connection = EstablishedConnection::new(request.call_id, request.account.clone());
//!         responder.success(request, connection).await;
//!     }
//!
//!     async fn abort_connection(&self, _call: Arc<Call>) {}
//! }
//!
//! struct ChannelResponse(tokio::sync::mpsc::UnboundedSender<&'static str>);
//!
//! #[async_trait]
//! impl CreateConnectionResponse for ChannelResponse {
//!     async fn on_success(&self, _request: ConnectionRequest, _connection: EstablishedConnection) {
//!         let _ = self.0.send("success");
//!     }
//!     async fn on_failed(&self, _code: DisconnectCode, _message: Option<String>) {
//!         let _ = self.0.send("failed");
//!     }
//!     async fn on_cancelled(&self) {
//!         let _ = self.0.send("cancelled");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(InMemoryProviderRegistry::new());
//!     registry.register(Arc::new(EchoProvider));
//!
//!     let target = AccountHandle::new(ProviderId::new("demo.echo"), "demo");
//!     let registrar = Arc::new(InMemoryAccountRegistrar::new());
//!     registrar.register_account(AccountRecord::new(
//!         target.clone(),
//!         AccountCapabilities::CALL_PROVIDER,
//!     ));
//!
//!     let classifier = Arc::new(StaticCallClassifier::new(EmergencyConfig::default()));
//!     let call = Arc::new(Call::new("5551234", Some(target)));
//!
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let processor = ConnectionAttemptProcessor::new(
//!         call,
//!         registry,
//!         registrar,
//!         classifier,
//!         Box::new(ChannelResponse(tx)),
//!     );
//!
//!     processor.process().await;
//!     assert_eq!(rx.recv().await, Some("success"));
//! }
//! ```
//!
//! ## Guarantees
//!
//! - **Exactly-once delivery** - one terminal callback per `process()` run,
//!   for every interleaving of provider callbacks and `abort()`.
//! - **Ordering fidelity** - candidates are tried strictly in order, at most
//!   one in flight; a missing provider is skipped silently.
//! - **Last failure wins** - an exhausted run reports the most recent
//!   explicit provider failure, or the default outgoing-failure code.
//! - **Safe cancellation** - `abort()` invalidates the in-flight attempt;
//!   a success racing the abort has its connection discarded, not leaked.

pub mod account;
pub mod attempts;
pub mod classify;
pub mod error;
pub mod pending;
pub mod processor;
pub mod provider;
pub mod types;

pub use account::{AccountRegistrar, InMemoryAccountRegistrar};
pub use attempts::build_attempt_records;
pub use classify::{CallClassifier, EmergencyConfig, StaticCallClassifier};
pub use error::{ConnectError, ConnectResult};
pub use pending::PendingCallStore;
pub use processor::{
    AttemptResponder, ConnectionAttemptProcessor, CreateConnectionResponse, ProcessorState,
};
pub use provider::{ConnectionProvider, InMemoryProviderRegistry, ProviderRegistry};
pub use types::{
    AccountCapabilities, AccountHandle, AccountRecord, Call, CallAttemptRecord, CallId,
    ConnectionRequest, DisconnectCode, EstablishedConnection, ProviderId,
};
