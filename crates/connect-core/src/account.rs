//! Account registrar trait and in-memory implementation
//!
//! The registrar answers three questions for the candidate builder: which
//! account (if any) is the designated connection manager, what capabilities
//! a given account carries, and which accounts are currently enabled (in
//! registration order). The failover engine takes the registrar as an
//! injected dependency so the candidate-building rules can be tested
//! without any platform runtime behind them.

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{ConnectError, ConnectResult};
use crate::types::{AccountCapabilities, AccountHandle, AccountRecord};

/// Source of account identity and capability information
pub trait AccountRegistrar: Send + Sync {
    /// The process-wide designated connection manager account, if one is
    /// configured
    fn designated_manager(&self) -> Option<AccountHandle>;

    /// Look up the record for `handle`, if registered
    fn account(&self, handle: &AccountHandle) -> Option<AccountRecord>;

    /// All enabled accounts, in registration order
    fn enabled_accounts(&self) -> Vec<AccountHandle>;
}

#[derive(Default)]
struct RegistrarInner {
    accounts: Vec<AccountRecord>,
    manager: Option<AccountHandle>,
}

/// In-memory account registrar
///
/// Keeps accounts in insertion order, which is also the enumeration order
/// reported by `enabled_accounts` and therefore the order emergency
/// candidates are tried in.
#[derive(Default)]
pub struct InMemoryAccountRegistrar {
    inner: RwLock<RegistrarInner>,
}

impl InMemoryAccountRegistrar {
    /// Create an empty registrar
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account
    ///
    /// Re-registering a handle replaces its capabilities in place and keeps
    /// the original position in enumeration order.
    pub fn register_account(&self, record: AccountRecord) {
        let mut inner = self.inner.write();
        debug!(account = %record.handle, "registering account");
        if let Some(existing) = inner
            .accounts
            .iter_mut()
            .find(|existing| existing.handle == record.handle)
        {
            existing.capabilities = record.capabilities;
        } else {
            inner.accounts.push(record);
        }
    }

    /// Configure or clear the designated connection manager
    pub fn set_designated_manager(&self, manager: Option<AccountHandle>) {
        self.inner.write().manager = manager;
    }

    /// Replace the capability bits of an already-registered account
    pub fn update_capabilities(
        &self,
        handle: &AccountHandle,
        capabilities: AccountCapabilities,
    ) -> ConnectResult<()> {
        let mut inner = self.inner.write();
        let record = inner
            .accounts
            .iter_mut()
            .find(|record| &record.handle == handle)
            .ok_or_else(|| ConnectError::account_not_found(handle.clone()))?;
        record.capabilities = capabilities;
        Ok(())
    }
}

impl AccountRegistrar for InMemoryAccountRegistrar {
    fn designated_manager(&self) -> Option<AccountHandle> {
        self.inner.read().manager.clone()
    }

    fn account(&self, handle: &AccountHandle) -> Option<AccountRecord> {
        self.inner
            .read()
            .accounts
            .iter()
            .find(|record| &record.handle == handle)
            .cloned()
    }

    fn enabled_accounts(&self) -> Vec<AccountHandle> {
        self.inner
            .read()
            .accounts
            .iter()
            .map(|record| record.handle.clone())
            .collect()
    }
}
