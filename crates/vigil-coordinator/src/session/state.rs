//! Session state for one account

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use vigil_core::client::ServiceConnection;
use vigil_core::ipc::Phase;
use vigil_core::types::AccountId;

/// Runtime state of one account's session.
///
/// Invariants:
/// - `conn` is present iff the phase is `Active` or `AwaitingChallenge`
///   (the connection survives the challenge wait; while a handshake attempt
///   is mid-flight the attempt owns it instead)
/// - `epoch` increases on every dispatched attempt and on stop; an attempt
///   whose captured epoch no longer matches must discard its outcome
pub struct Session {
    /// Current authentication phase
    pub phase: Phase,
    /// Live connection handle, if any
    pub conn: Option<Box<dyn ServiceConnection>>,
    /// Generation counter for in-flight attempt invalidation
    pub epoch: u64,
}

impl Session {
    /// Fresh session at `Idle`
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            conn: None,
            epoch: 0,
        }
    }

    /// Whether a handshake is currently in flight or parked
    pub fn handshake_in_progress(&self) -> bool {
        matches!(
            self.phase,
            Phase::Authenticating | Phase::AwaitingChallenge { .. }
        )
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("phase", &self.phase)
            .field("conn", &self.conn.as_ref().map(|_| "<connection>"))
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Shared handle to one account's session.
///
/// All mutation goes through the mutex; it is only ever held for short,
/// non-awaiting critical sections, so outcome delivery is atomic with
/// respect to concurrent status reads.
pub struct SessionSlot {
    /// Account this slot belongs to
    pub account_id: AccountId,
    state: Mutex<Session>,
}

impl SessionSlot {
    /// Create a slot at `Idle`
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            state: Mutex::new(Session::new()),
        }
    }

    /// Lock the session state. Recovers from a poisoned mutex: the state is
    /// a plain value and remains usable even if a writer panicked.
    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new();
        assert_eq!(session.phase, Phase::Idle);
        assert!(session.conn.is_none());
        assert_eq!(session.epoch, 0);
        assert!(!session.handshake_in_progress());
    }

    #[test]
    fn test_handshake_in_progress() {
        let mut session = Session::new();
        session.phase = Phase::Authenticating;
        assert!(session.handshake_in_progress());

        session.phase = Phase::AwaitingChallenge {
            kind: vigil_core::types::ChallengeKind::Mobile,
        };
        assert!(session.handshake_in_progress());

        session.phase = Phase::Active;
        assert!(!session.handshake_in_progress());
    }

    #[test]
    fn test_debug_does_not_require_conn_debug() {
        let slot = SessionSlot::new(AccountId::new("main"));
        let rendered = format!("{:?}", *slot.lock());
        assert!(rendered.contains("Idle"));
    }
}
