//! Candidate builder for connection attempts
//!
//! Derives the ordered list of [`CallAttemptRecord`] candidates the failover
//! engine will try, in three passes applied in strict order:
//!
//! 1. **Seed** - the call's explicitly requested target account, targeting
//!    itself, or nothing when no target is set.
//! 2. **Connection-manager insertion** - when exactly one record was seeded
//!    and a distinct designated manager is configured, SIM-subscription
//!    accounts are rerouted through the manager.
//! 3. **Emergency override** - emergency-classified handles discard the
//!    whole list and rebuild it from the enabled built-in telephony
//!    accounts, in registrar enumeration order. This pass wins over the
//!    manager pass entirely.
//!
//! The passes are plain functions over injected collaborators, so every
//! rule is testable without a runtime behind it.

use tracing::{debug, info};

use crate::account::AccountRegistrar;
use crate::classify::CallClassifier;
use crate::types::{AccountCapabilities, Call, CallAttemptRecord};

/// Build the ordered candidate list for `call`
pub fn build_attempt_records(
    call: &Call,
    registrar: &dyn AccountRegistrar,
    classifier: &dyn CallClassifier,
) -> Vec<CallAttemptRecord> {
    let mut records = Vec::new();
    if let Some(target) = call.target_account() {
        records.push(CallAttemptRecord::direct(target));
    }
    adjust_for_connection_manager(&mut records, registrar);
    adjust_for_emergency(&mut records, call.handle(), registrar, classifier);
    records
}

/// Reroute the sole seeded record through the designated connection manager
/// when one applies
///
/// Connection managers are only allowed to manage SIM subscriptions, and
/// only when the manager is distinct from the target itself.
pub(crate) fn adjust_for_connection_manager(
    records: &mut [CallAttemptRecord],
    registrar: &dyn AccountRegistrar,
) {
    let Some(manager) = eligible_connection_manager(records, registrar) else {
        debug!("connection manager not applicable, leaving attempts unchanged");
        return;
    };

    let target = records[0].target_account.clone();
    debug!(manager = %manager, target = %target, "routing attempt through connection manager");
    records[0] = CallAttemptRecord::new(manager, target);
}

fn eligible_connection_manager(
    records: &[CallAttemptRecord],
    registrar: &dyn AccountRegistrar,
) -> Option<crate::types::AccountHandle> {
    // Manager insertion only ever applies to a freshly seeded single-record
    // list; anything else was already adjusted or is empty.
    if records.len() != 1 {
        return None;
    }

    let manager = registrar.designated_manager()?;
    let target = &records[0].target_account;
    if &manager == target {
        return None;
    }

    let account = registrar.account(target)?;
    if !account
        .capabilities
        .contains(AccountCapabilities::SIM_SUBSCRIPTION)
    {
        return None;
    }

    Some(manager)
}

/// Replace the candidate list with the built-in telephony accounts when the
/// dialed handle is an emergency number
pub(crate) fn adjust_for_emergency(
    records: &mut Vec<CallAttemptRecord>,
    dialed: &str,
    registrar: &dyn AccountRegistrar,
    classifier: &dyn CallClassifier,
) {
    if !classifier.is_emergency_number(dialed) {
        return;
    }

    info!("emergency number detected, restricting attempts to built-in telephony accounts");
    records.clear();
    for account in registrar.enabled_accounts() {
        if classifier.is_builtin_telephony(&account.provider) {
            info!(account = %account, "will try built-in telephony account for emergency");
            records.push(CallAttemptRecord::direct(account));
        }
    }
}
