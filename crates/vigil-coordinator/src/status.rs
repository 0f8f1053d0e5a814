//! Status projection
//!
//! Derives the human-facing view a front-end renders from raw session state.
//! Pure: no side effects, no external calls.

use vigil_core::ipc::{Phase, SessionView};

use crate::session::Session;

/// Project a session into its front-end view
pub fn project(session: &Session) -> SessionView {
    let phase = session.phase.clone();
    let (label, is_active, awaiting) = match &phase {
        Phase::Idle => ("inactive".to_string(), false, None),
        Phase::Authenticating => ("signing in".to_string(), false, None),
        Phase::AwaitingChallenge { kind } => {
            (format!("awaiting {} code", kind), false, Some(*kind))
        }
        Phase::Active => ("active".to_string(), true, None),
        Phase::Failed { reason } => (format!("failed: {}", reason), false, None),
    };

    SessionView {
        phase,
        label,
        is_active,
        awaiting,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::client::RejectReason;
    use vigil_core::types::ChallengeKind;

    fn session_in(phase: Phase) -> Session {
        let mut session = Session::new();
        session.phase = phase;
        session
    }

    #[test]
    fn test_idle_view() {
        let view = project(&session_in(Phase::Idle));
        assert_eq!(view.label, "inactive");
        assert!(!view.is_active);
        assert!(view.awaiting.is_none());
    }

    #[test]
    fn test_active_view() {
        let view = project(&session_in(Phase::Active));
        assert_eq!(view.label, "active");
        assert!(view.is_active);
    }

    #[test]
    fn test_awaiting_challenge_view() {
        let view = project(&session_in(Phase::AwaitingChallenge {
            kind: ChallengeKind::Mobile,
        }));
        assert_eq!(view.label, "awaiting mobile code");
        assert_eq!(view.awaiting, Some(ChallengeKind::Mobile));
        assert!(!view.is_active);
    }

    #[test]
    fn test_failed_view_distinct_from_idle() {
        let failed = project(&session_in(Phase::Failed {
            reason: RejectReason::InvalidCredentials,
        }));
        let idle = project(&session_in(Phase::Idle));

        assert_ne!(failed.phase, idle.phase);
        assert_eq!(failed.label, "failed: invalid credentials");
    }
}
