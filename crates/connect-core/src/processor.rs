//! Connection-attempt failover engine
//!
//! [`ConnectionAttemptProcessor`] cycles a call through an ordered list of
//! candidate (manager, target) account pairs until a provider establishes a
//! connection, the caller aborts, or every candidate is exhausted. Exactly
//! one terminal callback is delivered to the caller's
//! [`CreateConnectionResponse`] per processing run.
//!
//! ```text
//! process()
//!    │
//!    ▼
//! build candidates ──► drain ──► resolve provider ──► create_connection
//!                        ▲            │ (not found:            │
//!                        │            │  skip silently)        ▼
//!                        │            └────────────► AttemptResponder
//!                        │                                     │
//!                        └──────────── failed ◄────────────────┤
//!                                                   success / cancelled
//!                                                        │
//!                                                        ▼
//!                                               terminal callback
//! ```
//!
//! ## State machine
//!
//! `Pending -> {Succeeded | Failed | Cancelled}`, all terminal. Every entry
//! point checks the state under one lock, and the response sink is *taken*
//! exactly once on the transition, so a terminal outcome can never be
//! delivered twice no matter how provider callbacks race against `abort()`.
//!
//! ## Attempt tokens
//!
//! Each issued attempt is stamped with a fresh token; the
//! [`AttemptResponder`] handed to the provider carries it. Callbacks whose
//! token no longer matches the engine's current token are stale and are
//! dropped, with one exception: a stale *success* still instructs the
//! provider that produced it to discard the connection it created, so a
//! success racing an abort cannot leak a live connection.
//!
//! ## Threading
//!
//! The engine assumes serialized invocation of `process`, `abort`, and the
//! responder callbacks. The internal lock keeps the state transitions
//! coherent if a late provider callback arrives from another task, but
//! overlapping `process()` calls remain a caller contract violation.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::account::AccountRegistrar;
use crate::attempts::build_attempt_records;
use crate::classify::CallClassifier;
use crate::provider::{ConnectionProvider, ProviderRegistry};
use crate::types::{
    Call, CallAttemptRecord, ConnectionRequest, DisconnectCode, EstablishedConnection,
};

/// Terminal outcome sink implemented by the caller
///
/// Exactly one of these callbacks fires exactly once per
/// [`ConnectionAttemptProcessor::process`] run. An `abort()` that preempts
/// any other terminal state delivers `on_cancelled`.
#[async_trait]
pub trait CreateConnectionResponse: Send + Sync {
    /// A provider established the connection
    async fn on_success(&self, request: ConnectionRequest, connection: EstablishedConnection);

    /// Every candidate failed or was unavailable; `code` and `message` are
    /// the last recorded provider failure, or the default outgoing-failure
    /// code when no attempt ever failed explicitly
    async fn on_failed(&self, code: DisconnectCode, message: Option<String>);

    /// Processing was cancelled before a connection was established
    async fn on_cancelled(&self);
}

/// Lifecycle state of a processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// Candidates are being (or are about to be) tried
    Pending,
    /// A provider established the connection
    Succeeded,
    /// All candidates were exhausted
    Failed,
    /// Processing was cancelled
    Cancelled,
}

impl ProcessorState {
    /// Whether this state is terminal
    pub fn is_terminal(self) -> bool {
        self != ProcessorState::Pending
    }
}

struct ProcessorInner {
    state: ProcessorState,
    started: bool,
    records: VecDeque<CallAttemptRecord>,
    response: Option<Box<dyn CreateConnectionResponse>>,
    last_code: DisconnectCode,
    last_message: Option<String>,
    attempt_token: u64,
}

/// Single-use failover engine for one call's establishment phase
///
/// Collaborators are injected at construction; the processor holds no
/// global state. Construct, call [`process`](Self::process) once, and
/// optionally [`abort`](Self::abort) at any time before a terminal outcome.
pub struct ConnectionAttemptProcessor {
    call: Arc<Call>,
    registry: Arc<dyn ProviderRegistry>,
    registrar: Arc<dyn AccountRegistrar>,
    classifier: Arc<dyn CallClassifier>,
    // Handed to responders so late callbacks can find their way back.
    weak_self: Weak<ConnectionAttemptProcessor>,
    inner: Mutex<ProcessorInner>,
}

enum DrainAction {
    Skip {
        record: CallAttemptRecord,
    },
    Exhausted {
        sink: Option<Box<dyn CreateConnectionResponse>>,
        code: DisconnectCode,
        message: Option<String>,
    },
    Attempt {
        record: CallAttemptRecord,
        provider: Arc<dyn ConnectionProvider>,
        token: u64,
    },
}

impl ConnectionAttemptProcessor {
    /// Create a processor for `call`
    pub fn new(
        call: Arc<Call>,
        registry: Arc<dyn ProviderRegistry>,
        registrar: Arc<dyn AccountRegistrar>,
        classifier: Arc<dyn CallClassifier>,
        response: Box<dyn CreateConnectionResponse>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            call,
            registry,
            registrar,
            classifier,
            weak_self: weak_self.clone(),
            inner: Mutex::new(ProcessorInner {
                state: ProcessorState::Pending,
                started: false,
                records: VecDeque::new(),
                response: Some(response),
                last_code: DisconnectCode::OUTGOING_FAILURE,
                last_message: None,
                attempt_token: 0,
            }),
        })
    }

    /// The call this processor is establishing
    pub fn call(&self) -> &Arc<Call> {
        &self.call
    }

    /// Current lifecycle state
    pub fn state(&self) -> ProcessorState {
        self.inner.lock().state
    }

    /// Build the candidate list and start draining it
    ///
    /// Not re-entrant; a second invocation is ignored with a warning.
    pub async fn process(&self) {
        debug!(call_id = %self.call.id(), "process");
        let records = build_attempt_records(
            &self.call,
            self.registrar.as_ref(),
            self.classifier.as_ref(),
        );
        {
            let mut inner = self.inner.lock();
            if inner.started {
                warn!(call_id = %self.call.id(), "process() invoked twice, ignoring");
                return;
            }
            inner.started = true;
            if inner.state.is_terminal() {
                debug!(call_id = %self.call.id(), state = ?inner.state, "aborted before processing started");
                return;
            }
            inner.records = records.into();
        }
        self.advance().await;
    }

    /// Cancel processing
    ///
    /// Takes the response sink first so that any provider callback racing
    /// in afterwards observes a terminal engine. The provider bound to the
    /// call (if any) is asked to abort its in-flight attempt, and
    /// `on_cancelled` is delivered iff no terminal outcome had been
    /// delivered yet. Idempotent after the first terminal outcome.
    pub async fn abort(&self) {
        debug!(call_id = %self.call.id(), "abort");
        let sink = {
            let mut inner = self.inner.lock();
            // Invalidate the in-flight attempt token so its responder goes
            // stale even relative to the captured provider.
            inner.attempt_token = inner.attempt_token.wrapping_add(1);
            if !inner.state.is_terminal() {
                inner.state = ProcessorState::Cancelled;
            }
            inner.response.take()
        };

        if let Some(provider) = self.call.provider() {
            provider.abort_connection(self.call.clone()).await;
            self.call.clear_provider();
        }
        if let Some(sink) = sink {
            sink.on_cancelled().await;
        }
    }

    /// Drain candidates until an attempt is issued, the list is exhausted,
    /// or a terminal state is observed
    ///
    /// Provider-not-found candidates are skipped inline with no async
    /// yield: a missing provider is a configuration gap, not a connection
    /// failure, so it neither counts as an attempt nor touches the
    /// last-error memo.
    async fn advance(&self) {
        let Some(this) = self.weak_self.upgrade() else {
            return;
        };
        loop {
            let action = {
                let mut inner = self.inner.lock();
                if inner.state.is_terminal() {
                    debug!(state = ?inner.state, "advance after terminal state, nothing to do");
                    return;
                }
                match inner.records.pop_front() {
                    None => {
                        inner.state = ProcessorState::Failed;
                        DrainAction::Exhausted {
                            sink: inner.response.take(),
                            code: inner.last_code,
                            message: inner.last_message.clone(),
                        }
                    }
                    Some(record) => {
                        match self.registry.resolve(&record.manager_account.provider) {
                            None => DrainAction::Skip { record },
                            Some(provider) => {
                                inner.attempt_token = inner.attempt_token.wrapping_add(1);
                                DrainAction::Attempt {
                                    record,
                                    provider,
                                    token: inner.attempt_token,
                                }
                            }
                        }
                    }
                }
            };

            match action {
                DrainAction::Skip { record } => {
                    info!(attempt = %record, "no provider registered for attempt, skipping");
                }
                DrainAction::Exhausted {
                    sink,
                    code,
                    message,
                } => {
                    info!(call_id = %self.call.id(), code = %code, "no more candidates, failing");
                    self.call.clear_provider();
                    if let Some(sink) = sink {
                        sink.on_failed(code, message).await;
                    }
                    return;
                }
                DrainAction::Attempt {
                    record,
                    provider,
                    token,
                } => {
                    info!(
                        attempt = %record,
                        provider = %provider.provider_id(),
                        "trying attempt"
                    );
                    self.call.set_manager_account(record.manager_account.clone());
                    self.call.set_target_account(record.target_account.clone());
                    self.call.set_provider(provider.clone());

                    let request = ConnectionRequest {
                        call_id: self.call.id(),
                        account: record.target_account,
                        handle: self.call.handle().to_string(),
                    };
                    let responder = AttemptResponder {
                        processor: this.clone(),
                        provider: provider.clone(),
                        token,
                    };
                    provider.create_connection(self.call.clone(), request, responder).await;
                    return;
                }
            }
        }
    }
}

/// Per-attempt continuation handed to a provider
///
/// Scoped to the specific provider instance and attempt token it was issued
/// for. Stale callbacks (after `abort()`, after a terminal outcome, or
/// duplicates from the same provider) are dropped, except that a stale
/// success still tells *this* provider to discard the connection it
/// created.
#[derive(Clone)]
pub struct AttemptResponder {
    processor: Arc<ConnectionAttemptProcessor>,
    provider: Arc<dyn ConnectionProvider>,
    token: u64,
}

impl AttemptResponder {
    /// Report that the provider established the connection
    pub async fn success(&self, request: ConnectionRequest, connection: EstablishedConnection) {
        let sink = {
            let mut inner = self.processor.inner.lock();
            if inner.state.is_terminal() || self.token != inner.attempt_token {
                None
            } else {
                inner.state = ProcessorState::Succeeded;
                inner.response.take()
            }
        };

        match sink {
            Some(sink) => {
                info!(
                    call_id = %self.processor.call.id(),
                    provider = %self.provider.provider_id(),
                    "connection established"
                );
                sink.on_success(request, connection).await;
            }
            None => {
                warn!(
                    provider = %self.provider.provider_id(),
                    "late connection success, discarding connection"
                );
                self.provider
                    .abort_connection(self.processor.call.clone())
                    .await;
            }
        }
    }

    /// Report that the attempt failed; advances to the next candidate
    pub async fn failed(&self, code: DisconnectCode, message: Option<String>) {
        {
            let mut inner = self.processor.inner.lock();
            if self.token != inner.attempt_token {
                debug!(
                    provider = %self.provider.provider_id(),
                    "stale failure signal, ignoring"
                );
                return;
            }
            inner.last_code = code;
            inner.last_message = message.clone();
        }
        debug!(
            code = %code,
            message = message.as_deref().unwrap_or(""),
            "connection attempt failed"
        );
        self.processor.advance().await;
    }

    /// Report that the provider cancelled the attempt
    pub async fn cancelled(&self) {
        let sink = {
            let mut inner = self.processor.inner.lock();
            if inner.state.is_terminal() || self.token != inner.attempt_token {
                None
            } else {
                inner.state = ProcessorState::Cancelled;
                inner.response.take()
            }
        };

        match sink {
            Some(sink) => {
                info!(call_id = %self.processor.call.id(), "connection attempt cancelled by provider");
                sink.on_cancelled().await;
            }
            None => debug!("late cancellation signal, ignoring"),
        }
    }
}
