//! Error types for the connect-core library

use thiserror::Error;

use crate::types::{AccountHandle, CallId};

/// Result type for connect-core operations
pub type ConnectResult<T> = Result<T, ConnectError>;

/// Errors that can occur in connect-core
///
/// Provider-level connection failures are not represented here; they arrive
/// as `DisconnectCode` data through the response callbacks and are absorbed
/// by the failover engine. This enum covers the errors the crate itself can
/// surface to callers.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// A call was registered as pending while already pending
    #[error("call {call_id} is already pending")]
    DuplicatePendingCall { call_id: CallId },

    /// An account lookup failed
    #[error("account not found: {handle}")]
    AccountNotFound { handle: AccountHandle },

    /// An operation was invoked in a state that does not permit it
    #[error("invalid state: {message}")]
    InvalidState { message: String },
}

impl ConnectError {
    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an account lookup error
    pub fn account_not_found(handle: AccountHandle) -> Self {
        Self::AccountNotFound { handle }
    }
}
