//! IPC protocol for front-end to coordinator communication
//!
//! JSON-encoded messages, one per line, over TCP on localhost (127.0.0.1).
//! TCP is used instead of Unix sockets for cross-platform compatibility.
//! Any chat bot or CLI front-end speaks this protocol; the coordinator never
//! renders UI itself.

use serde::{Deserialize, Serialize};

use crate::client::RejectReason;
use crate::types::ChallengeKind;

/// Authentication phase of one account session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    /// No session; nothing running
    Idle,
    /// A handshake attempt is in flight
    Authenticating,
    /// The handshake is parked until a code of the given kind arrives
    AwaitingChallenge { kind: ChallengeKind },
    /// Signed in and reporting activity
    Active,
    /// The last handshake was rejected; sticks until the next start
    Failed { reason: RejectReason },
}

/// Non-blocking, human-facing snapshot of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Current phase
    pub phase: Phase,
    /// Short status label for menus ("active", "awaiting mobile code", ...)
    pub label: String,
    /// Whether the account is signed in
    pub is_active: bool,
    /// Challenge kind the session is parked on, if any
    pub awaiting: Option<ChallengeKind>,
}

/// Result of a start command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StartResult {
    /// Handshake resolved within the grace period: signed in
    Active,
    /// Handshake resolved within the grace period: code needed
    AwaitingChallenge { kind: ChallengeKind },
    /// Handshake resolved within the grace period: rejected
    Failed { reason: RejectReason },
    /// Handshake still in flight; poll status
    Pending,
    /// The session was stopped before the handshake resolved
    Stopped,
    /// The session was already signed in; nothing dispatched
    AlreadyActive,
    /// A handshake for this account is already in flight
    InProgress,
    /// The requester already has a pending challenge for another account
    ChallengePending,
}

/// Result of a code submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SubmitResult {
    /// Code accepted: signed in
    Active,
    /// Code rejected; a fresh challenge of the same kind is pending
    AwaitingChallenge { kind: ChallengeKind },
    /// Handshake rejected outright
    Failed { reason: RejectReason },
    /// Handshake still in flight; poll status
    Pending,
    /// The session was stopped before the handshake resolved
    Stopped,
    /// The requester has no challenge to answer
    NoPendingChallenge,
}

/// Result of a stop command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StopResult {
    /// Session torn down, handle released
    Stopped,
    /// Nothing was running
    NotRunning,
}

/// One row of the account listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    /// Account ID
    pub account_id: String,
    /// Login name, for display
    pub identity: String,
    /// Number of configured activities
    pub activity_count: usize,
    /// Session snapshot
    pub view: SessionView,
}

/// IPC request from a front-end to the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcRequest {
    /// Start (sign in) an account
    Start {
        account_id: String,
        requester_id: i64,
    },

    /// Submit a challenge code for the requester's pending challenge
    SubmitCode { requester_id: i64, code: String },

    /// Stop (sign out) an account
    Stop { account_id: String },

    /// Get the status snapshot for one account
    Status { account_id: String },

    /// List all accounts with their status, in registry order
    ListAccounts,

    /// Ping (for keepalive)
    Ping,

    /// Shutdown the coordinator
    Shutdown,
}

/// IPC response from the coordinator to a front-end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcResponse {
    /// Outcome of a start command
    Start(StartResult),

    /// Outcome of a code submission
    Submit(SubmitResult),

    /// Outcome of a stop command
    Stop(StopResult),

    /// Status snapshot
    Status(SessionView),

    /// Account listing
    Accounts { accounts: Vec<AccountStatus> },

    /// Generic success
    Ok,

    /// Error response
    Error { message: String },

    /// Pong response
    Pong,
}

/// IPC event pushed from the coordinator to connected front-ends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcEvent {
    /// A session's phase changed (handshake resolved, stop completed, ...)
    SessionUpdated {
        account_id: String,
        view: SessionView,
    },
}
