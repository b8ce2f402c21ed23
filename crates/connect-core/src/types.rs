//! Core type definitions for connection-attempt processing
//!
//! This module contains the identity types, capability bitset, disconnect
//! codes, and call/request/connection structures used throughout the
//! connect-core library.
//!
//! # Type Categories
//!
//! - **Identity Types** - `CallId`, `ProviderId`, `AccountHandle`
//! - **Account Types** - `AccountCapabilities`, `AccountRecord`
//! - **Attempt Types** - `CallAttemptRecord`, `DisconnectCode`
//! - **Call Types** - `Call`, `ConnectionRequest`, `EstablishedConnection`
//!
//! # Usage Examples
//!
//! ## Building an Account Handle
//!
//! ```rust
//! use trunkline_connect_core::types::{AccountHandle, ProviderId};
//!
//! let handle = AccountHandle::new(ProviderId::new("carrier.gsm"), "sub0");
//! assert_eq!(handle.provider.as_str(), "carrier.gsm");
//! assert_eq!(handle.account_id, "sub0");
//! ```
//!
//! ## Checking Capabilities
//!
//! ```rust
//! use trunkline_connect_core::types::AccountCapabilities;
//!
//! let caps = AccountCapabilities::SIM_SUBSCRIPTION;
//! assert!(caps.contains(AccountCapabilities::SIM_SUBSCRIPTION));
//! assert!(!AccountCapabilities::NONE.contains(AccountCapabilities::SIM_SUBSCRIPTION));
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::ConnectionProvider;

/// Unique identifier for a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub Uuid);

impl CallId {
    /// Generate a fresh call identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque component identifier for a connection provider
///
/// Providers register under this identifier and account handles reference
/// it to say which provider backs the account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    /// Create a provider id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a provider-backed account
///
/// Pairs the provider component that services the account with the
/// provider-scoped account identifier. Two handles are equal only when
/// both parts match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountHandle {
    /// Provider component that services this account
    pub provider: ProviderId,
    /// Provider-scoped account identifier
    pub account_id: String,
}

impl AccountHandle {
    /// Create a new account handle
    pub fn new(provider: ProviderId, account_id: impl Into<String>) -> Self {
        Self {
            provider,
            account_id: account_id.into(),
        }
    }
}

impl fmt::Display for AccountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.account_id)
    }
}

/// Capability bitset for an account
///
/// A thin newtype over the raw capability bits so call sites read as
/// `caps.contains(AccountCapabilities::SIM_SUBSCRIPTION)` instead of raw
/// bit arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountCapabilities(pub u32);

impl AccountCapabilities {
    /// No capabilities
    pub const NONE: Self = Self(0);
    /// The account is backed by a SIM subscription; only these accounts
    /// may be routed through a connection manager
    pub const SIM_SUBSCRIPTION: Self = Self(1 << 0);
    /// The account can place calls
    pub const CALL_PROVIDER: Self = Self(1 << 1);

    /// Whether every bit in `other` is set in `self`
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two capability sets
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// A registered account and its capabilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    /// Identity of the account
    pub handle: AccountHandle,
    /// Capability bits for the account
    pub capabilities: AccountCapabilities,
}

impl AccountRecord {
    /// Create an account record
    pub fn new(handle: AccountHandle, capabilities: AccountCapabilities) -> Self {
        Self {
            handle,
            capabilities,
        }
    }
}

/// Disconnect cause code reported by providers
///
/// Codes are provider-supplied data, not a closed enum; the well-known
/// values are exposed as associated constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectCode(pub u32);

impl DisconnectCode {
    /// The remote party was busy
    pub const BUSY: Self = Self(4);
    /// Network congestion prevented the connection
    pub const CONGESTION: Self = Self(5);
    /// Unspecified provider-side error
    pub const ERROR_UNSPECIFIED: Self = Self(36);
    /// An outgoing connection could not be established; also the default
    /// reported when no attempt ever produced a more specific cause
    pub const OUTGOING_FAILURE: Self = Self(43);
    /// An outgoing connection was cancelled before completion
    pub const OUTGOING_CANCELED: Self = Self(44);
}

impl fmt::Display for DisconnectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One candidate (manager, target) pair to try against a provider
///
/// Immutable once built. `manager_account` names the provider that will be
/// asked to broker the connection; `target_account` is the identity the
/// provider is told to use when establishing it. The two are equal when no
/// connection manager is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAttemptRecord {
    /// Account whose provider brokers the connection attempt
    pub manager_account: AccountHandle,
    /// Account the provider is instructed to connect as
    pub target_account: AccountHandle,
}

impl CallAttemptRecord {
    /// Create an attempt record
    pub fn new(manager_account: AccountHandle, target_account: AccountHandle) -> Self {
        Self {
            manager_account,
            target_account,
        }
    }

    /// Create a record that targets an account through itself (no manager)
    pub fn direct(account: AccountHandle) -> Self {
        Self {
            manager_account: account.clone(),
            target_account: account,
        }
    }
}

impl fmt::Display for CallAttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CallAttemptRecord({}, {})",
            self.manager_account, self.target_account
        )
    }
}

/// A call whose connection is being established
///
/// The call is owned by the caller and shared as `Arc<Call>`. The mutable
/// bindings (target account, manager account, bound provider) are adjusted
/// by the failover engine while it owns the establishment phase; no other
/// component may mutate them during that window.
pub struct Call {
    id: CallId,
    handle: String,
    target_account: RwLock<Option<AccountHandle>>,
    manager_account: RwLock<Option<AccountHandle>>,
    provider: RwLock<Option<Arc<dyn ConnectionProvider>>>,
}

impl Call {
    /// Create a call dialing `handle`, optionally pinned to a target account
    pub fn new(handle: impl Into<String>, target_account: Option<AccountHandle>) -> Self {
        Self {
            id: CallId::new(),
            handle: handle.into(),
            target_account: RwLock::new(target_account),
            manager_account: RwLock::new(None),
            provider: RwLock::new(None),
        }
    }

    /// Unique identifier for this call
    pub fn id(&self) -> CallId {
        self.id
    }

    /// The dialed address
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// The explicitly requested target account, if any
    pub fn target_account(&self) -> Option<AccountHandle> {
        self.target_account.read().clone()
    }

    /// Bind the target account for the current attempt
    pub fn set_target_account(&self, account: AccountHandle) {
        *self.target_account.write() = Some(account);
    }

    /// The manager account in effect, if any
    pub fn manager_account(&self) -> Option<AccountHandle> {
        self.manager_account.read().clone()
    }

    /// Bind the manager account for the current attempt
    pub fn set_manager_account(&self, account: AccountHandle) {
        *self.manager_account.write() = Some(account);
    }

    /// The provider currently attempting (or servicing) this call
    pub fn provider(&self) -> Option<Arc<dyn ConnectionProvider>> {
        self.provider.read().clone()
    }

    /// Bind the provider handling the current attempt
    pub fn set_provider(&self, provider: Arc<dyn ConnectionProvider>) {
        *self.provider.write() = Some(provider);
    }

    /// Release the provider binding
    pub fn clear_provider(&self) {
        *self.provider.write() = None;
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .field("target_account", &*self.target_account.read())
            .field("manager_account", &*self.manager_account.read())
            .field(
                "provider",
                &self.provider.read().as_ref().map(|p| p.provider_id()),
            )
            .finish()
    }
}

/// The request handed to a provider for one connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    /// Call the connection is for
    pub call_id: CallId,
    /// Account the provider should connect as
    pub account: AccountHandle,
    /// The dialed address
    pub handle: String,
}

/// A live connection returned by a provider on success
#[derive(Debug, Clone)]
pub struct EstablishedConnection {
    /// Call the connection belongs to
    pub call_id: CallId,
    /// Account the connection was established through
    pub account: AccountHandle,
    /// When the provider reported the connection live
    pub connected_at: DateTime<Utc>,
}

impl EstablishedConnection {
    /// Create a connection record stamped with the current time
    pub fn new(call_id: CallId, account: AccountHandle) -> Self {
        Self {
            call_id,
            account,
            connected_at: Utc::now(),
        }
    }
}
