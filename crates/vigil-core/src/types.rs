//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a configured account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    /// Create a new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity of the operator/front-end session that issued a command.
///
/// A requester owns at most one pending challenge at a time; codes it submits
/// are routed back to whichever handshake it triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequesterId(pub i64);

impl RequesterId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RequesterId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Activity identifier declared to the external service once authenticated
pub type ActivityId = u32;

/// Kind of out-of-band challenge the external service may demand mid-login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    /// One-time code from the mobile authenticator app
    Mobile,
    /// One-time code delivered by email
    Email,
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeKind::Mobile => write!(f, "mobile"),
            ChallengeKind::Email => write!(f, "email"),
        }
    }
}

/// A one-time code tagged with the challenge kind it answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeCode {
    pub kind: ChallengeKind,
    pub value: String,
}

/// Login credentials for one account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Login name at the external service
    pub identity: String,
    /// Password; never logged
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}
