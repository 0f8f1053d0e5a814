//! Session manager implementation

use dashmap::DashMap;
use std::sync::Arc;

use vigil_core::types::AccountId;

use super::SessionSlot;

/// Owns the session slots for all accounts.
///
/// Slots are created lazily at `Idle` the first time an account is touched
/// and live for the rest of the process; stop resets a slot rather than
/// removing it.
pub struct SessionManager {
    /// Slots indexed by account ID
    slots: DashMap<AccountId, Arc<SessionSlot>>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Get the slot for an account, creating it at `Idle` if needed
    pub fn slot(&self, account_id: &AccountId) -> Arc<SessionSlot> {
        self.slots
            .entry(account_id.clone())
            .or_insert_with(|| Arc::new(SessionSlot::new(account_id.clone())))
            .clone()
    }

    /// Get the slot for an account if one has been created
    pub fn get(&self, account_id: &AccountId) -> Option<Arc<SessionSlot>> {
        self.slots.get(account_id).map(|r| Arc::clone(&r))
    }

    /// Number of created slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no slot has been created yet
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::ipc::Phase;

    #[test]
    fn test_slot_created_lazily_at_idle() {
        let manager = SessionManager::new();
        assert!(manager.is_empty());

        let slot = manager.slot(&AccountId::new("main"));
        assert_eq!(slot.lock().phase, Phase::Idle);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_slot_is_reused() {
        let manager = SessionManager::new();
        let a = manager.slot(&AccountId::new("main"));
        let b = manager.slot(&AccountId::new("main"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_get_missing_slot() {
        let manager = SessionManager::new();
        assert!(manager.get(&AccountId::new("missing")).is_none());
    }
}
