//! Handshake attempt execution and outcome classification
//!
//! One attempt = one external login call, executed on the blocking pool.
//! Every code path through an attempt terminates in exactly one
//! [`AttemptOutcome`], including panics inside the client library; a session
//! can therefore never be left stuck in `Authenticating`.

use std::panic::{catch_unwind, AssertUnwindSafe};

use vigil_core::client::{
    LoginOutcome, RejectReason, ServiceConnection, ServiceConnector,
};
use vigil_core::registry::AccountConfig;
use vigil_core::types::{ChallengeCode, ChallengeKind};

/// Classified result of one handshake attempt
pub enum AttemptOutcome {
    /// Signed in; the connection is live and activities are declared
    Authenticated(Box<dyn ServiceConnection>),
    /// The service wants a code; the connection is kept for the resume
    ChallengeRequired(ChallengeKind, Box<dyn ServiceConnection>),
    /// Rejected; the connection has been released
    Rejected(RejectReason),
}

/// Run one handshake attempt.
///
/// Resumes on `conn` when the caller holds a live connection from an earlier
/// challenge; otherwise dials fresh. A fresh dial after `Failed` is the
/// explicit retry path, not an accident of state loss.
pub fn run_attempt(
    connector: &dyn ServiceConnector,
    account: &AccountConfig,
    conn: Option<Box<dyn ServiceConnection>>,
    code: Option<&ChallengeCode>,
) -> AttemptOutcome {
    let account_id = account.id.clone();

    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut conn = conn.unwrap_or_else(|| connector.dial());

        match conn.login(&account.credentials, code) {
            LoginOutcome::Authenticated => {
                tracing::info!("Account {} signed in", account_id);
                if let Err(e) = conn.declare_activities(&account.activities) {
                    tracing::warn!("Account {}: {}", account_id, e);
                }
                AttemptOutcome::Authenticated(conn)
            }
            LoginOutcome::ChallengeRequired(kind) => {
                tracing::info!("Account {} needs a {} code", account_id, kind);
                AttemptOutcome::ChallengeRequired(kind, conn)
            }
            LoginOutcome::Rejected(reason) => {
                tracing::warn!("Account {} login rejected: {}", account_id, reason);
                conn.logout();
                AttemptOutcome::Rejected(reason)
            }
        }
    }));

    match result {
        Ok(outcome) => outcome,
        Err(_) => {
            // The client panicked mid-handshake; the connection (if any) was
            // dropped during unwind. Classify as a transient rejection.
            tracing::error!("Account {}: handshake attempt panicked", account.id);
            AttemptOutcome::Rejected(RejectReason::Internal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimConnector, SimOutcome, SimStep};
    use vigil_core::types::{AccountId, Credentials};

    fn account() -> AccountConfig {
        AccountConfig {
            id: AccountId::new("main"),
            credentials: Credentials {
                identity: "user".to_string(),
                secret: "pw".to_string(),
            },
            activities: vec![10, 20],
        }
    }

    #[test]
    fn test_authenticated_declares_activities() {
        let connector = SimConnector::new();
        let outcome = run_attempt(&connector, &account(), None, None);

        assert!(matches!(outcome, AttemptOutcome::Authenticated(_)));
        assert_eq!(connector.declared(), vec![vec![10, 20]]);
    }

    #[test]
    fn test_challenge_keeps_connection() {
        let connector = SimConnector::new();
        connector.push(SimStep::new(SimOutcome::ChallengeRequired(
            ChallengeKind::Mobile,
        )));

        let outcome = run_attempt(&connector, &account(), None, None);
        match outcome {
            AttemptOutcome::ChallengeRequired(kind, _conn) => {
                assert_eq!(kind, ChallengeKind::Mobile);
            }
            _ => panic!("expected challenge"),
        }
        // Connection not released while parked
        assert_eq!(connector.logout_count(), 0);
    }

    #[test]
    fn test_rejected_releases_connection() {
        let connector = SimConnector::new();
        connector.push(SimStep::new(SimOutcome::Rejected(
            RejectReason::InvalidCredentials,
        )));

        let outcome = run_attempt(&connector, &account(), None, None);
        assert!(matches!(
            outcome,
            AttemptOutcome::Rejected(RejectReason::InvalidCredentials)
        ));
        assert_eq!(connector.logout_count(), 1);
    }

    #[test]
    fn test_panic_classified_as_internal_rejection() {
        let connector = SimConnector::new();
        connector.push(SimStep::new(SimOutcome::Fault));

        let outcome = run_attempt(&connector, &account(), None, None);
        assert!(matches!(
            outcome,
            AttemptOutcome::Rejected(RejectReason::Internal)
        ));
    }
}
