//! Pending incoming-call store
//!
//! Correlates an inbound connection request with the call details that
//! arrive asynchronously from the servicing provider. A call is registered
//! when its details are requested and removed by whichever resolution
//! (success or failure) lands first; the loser of that race observes the
//! call as already resolved and backs off.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::error::{ConnectError, ConnectResult};
use crate::types::{Call, CallId};

/// Tracks calls whose details have been requested but not yet delivered
///
/// Single-shot per call: `register` admits a call id once, and exactly one
/// of `resolve_success` / `resolve_failure` removes it.
pub struct PendingCallStore {
    pending: DashMap<CallId, Arc<Call>>,
}

impl PendingCallStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Register a call awaiting details
    ///
    /// Errors if the call is already pending; callers must not request
    /// details for the same call twice.
    pub fn register(&self, call: Arc<Call>) -> ConnectResult<()> {
        let call_id = call.id();
        if self.pending.contains_key(&call_id) {
            return Err(ConnectError::DuplicatePendingCall { call_id });
        }
        debug!(call_id = %call_id, "registered pending incoming call");
        self.pending.insert(call_id, call);
        Ok(())
    }

    /// Resolve a pending call successfully, removing and returning it
    ///
    /// Returns `None` when the call was never pending or was already
    /// resolved.
    pub fn resolve_success(&self, call_id: CallId) -> Option<Arc<Call>> {
        let call = self.pending.remove(&call_id).map(|(_, call)| call);
        if let Some(call) = &call {
            debug!(call_id = %call.id(), "pending incoming call resolved");
        }
        call
    }

    /// Resolve a pending call as failed, removing and returning it
    pub fn resolve_failure(&self, call_id: CallId) -> Option<Arc<Call>> {
        let call = self.pending.remove(&call_id).map(|(_, call)| call);
        if let Some(call) = &call {
            info!(call_id = %call.id(), "failed to get details for incoming call");
        }
        call
    }

    /// Whether `call_id` is currently pending
    pub fn contains(&self, call_id: &CallId) -> bool {
        self.pending.contains_key(call_id)
    }

    /// Number of pending calls
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no calls are pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for PendingCallStore {
    fn default() -> Self {
        Self::new()
    }
}
