//! External-service client traits
//!
//! The coordinator treats the external service as a black box behind these
//! traits. `login` is a blocking call (network round trips, possibly
//! multi-second); the coordinator always runs it on the blocking pool, never
//! on the control path.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ActivityId, ChallengeCode, ChallengeKind, Credentials};

/// Why the external service rejected a login attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Identity or secret is wrong; retry needs reconfiguration
    InvalidCredentials,
    /// The account is locked at the service side
    AccountLocked,
    /// Transient network or service failure; retry may succeed
    ServiceUnavailable,
    /// Unclassified fault inside the client; treated as transient
    Internal,
}

impl RejectReason {
    /// Whether the operator should be told a plain retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, RejectReason::ServiceUnavailable | RejectReason::Internal)
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidCredentials => write!(f, "invalid credentials"),
            RejectReason::AccountLocked => write!(f, "account locked"),
            RejectReason::ServiceUnavailable => write!(f, "service unavailable"),
            RejectReason::Internal => write!(f, "internal fault"),
        }
    }
}

/// Result of one external login call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Signed in; the connection is live
    Authenticated,
    /// The service demands an out-of-band code before completing the login
    ChallengeRequired(ChallengeKind),
    /// Login rejected; the connection is unusable
    Rejected(RejectReason),
}

/// Error from an activity declaration
#[derive(Debug, Clone, thiserror::Error)]
#[error("Activity declaration failed: {0}")]
pub struct ActivityError(pub String);

/// A live connection to the external service for one account.
///
/// The connection object survives a `ChallengeRequired` outcome so that a
/// subsequent `login` with the code resumes the same handshake instead of
/// re-dialing from zero.
pub trait ServiceConnection: Send {
    /// Run the (blocking) login handshake, optionally carrying a challenge
    /// code from an earlier `ChallengeRequired` outcome.
    fn login(&mut self, credentials: &Credentials, code: Option<&ChallengeCode>) -> LoginOutcome;

    /// Declare which activities the account should appear engaged in
    fn declare_activities(&mut self, activities: &[ActivityId]) -> Result<(), ActivityError>;

    /// Terminate the connection. Must be idempotent: calling `logout` on an
    /// already-terminated connection is a no-op, never a fault.
    fn logout(&mut self);
}

/// Factory for service connections, one per handshake chain
pub trait ServiceConnector: Send + Sync {
    /// Open a fresh, not-yet-authenticated connection
    fn dial(&self) -> Box<dyn ServiceConnection>;
}
