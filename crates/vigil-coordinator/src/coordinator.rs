//! Session coordinator
//!
//! Owns every session slot and the pending-challenge table, and exposes the
//! command surface front-ends drive: start, stop, submit-code, status. The
//! blocking login handshake always runs on the blocking pool; the control
//! path waits at most `grace_period` for it to resolve and otherwise returns
//! a provisional `Pending` result for the caller to poll.
//!
//! # Atomicity
//!
//! All session mutation happens under the slot mutex in short critical
//! sections that never span an `.await`. Outcome delivery from an attempt is
//! the attempt's last write and is performed under the same mutex, so a
//! concurrent status read observes either the pre-attempt or the fully
//! updated post-attempt state, never a partial update.
//!
//! # Cancellation
//!
//! Every dispatched attempt captures the session epoch. Stop (and any later
//! dispatch) bumps the epoch; an attempt that completes against a stale
//! epoch logs out its connection and discards the result, so a stopped
//! session is never resurrected.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, oneshot};

use vigil_core::client::{ServiceConnection, ServiceConnector};
use vigil_core::config::CoordinatorConfig;
use vigil_core::error::SessionError;
use vigil_core::ipc::{
    AccountStatus, IpcEvent, Phase, SessionView, StartResult, StopResult, SubmitResult,
};
use vigil_core::registry::{AccountConfig, AccountRegistry};
use vigil_core::types::{AccountId, ChallengeCode, RequesterId};

use crate::handshake::{self, AttemptOutcome};
use crate::pending::PendingChallenges;
use crate::session::{Session, SessionManager};
use crate::status;

/// State shared between the control path and in-flight handshake attempts
struct Shared {
    sessions: SessionManager,
    pending: PendingChallenges,
    events: broadcast::Sender<IpcEvent>,
}

impl Shared {
    /// Deliver an attempt outcome into the session. Runs on the blocking
    /// pool; must be the attempt's last write.
    fn apply_outcome(
        &self,
        account_id: &AccountId,
        requester: RequesterId,
        epoch: u64,
        outcome: AttemptOutcome,
    ) {
        let Some(slot) = self.sessions.get(account_id) else {
            return;
        };

        let (delivered, stale_conn) = {
            let mut session = slot.lock();
            if session.epoch != epoch {
                // The session was stopped or redispatched while this attempt
                // was in flight; discard the result and release the handle.
                tracing::info!(
                    "Account {}: discarding stale handshake outcome (epoch {} != {})",
                    account_id,
                    epoch,
                    session.epoch
                );
                let conn = match outcome {
                    AttemptOutcome::Authenticated(conn)
                    | AttemptOutcome::ChallengeRequired(_, conn) => Some(conn),
                    AttemptOutcome::Rejected(_) => None,
                };
                (false, conn)
            } else {
                match outcome {
                    AttemptOutcome::Authenticated(conn) => {
                        session.phase = Phase::Active;
                        session.conn = Some(conn);
                    }
                    AttemptOutcome::ChallengeRequired(kind, conn) => {
                        session.phase = Phase::AwaitingChallenge { kind };
                        session.conn = Some(conn);
                        self.pending.insert(requester, account_id.clone(), kind);
                    }
                    AttemptOutcome::Rejected(reason) => {
                        session.phase = Phase::Failed { reason };
                        session.conn = None;
                    }
                }
                (true, None)
            }
        };

        if let Some(mut conn) = stale_conn {
            conn.logout();
        }
        // A discarded outcome changed nothing, so clients hear nothing
        if delivered {
            self.emit_update(account_id, &slot.lock());
        }
    }

    fn emit_update(&self, account_id: &AccountId, session: &Session) {
        // Ignored when no front-end is subscribed
        let _ = self.events.send(IpcEvent::SessionUpdated {
            account_id: account_id.to_string(),
            view: status::project(session),
        });
    }
}

/// The session lifecycle and challenge-coordination engine
pub struct Coordinator {
    registry: Arc<AccountRegistry>,
    connector: Arc<dyn ServiceConnector>,
    shared: Arc<Shared>,
    grace_period: Duration,
    stop_timeout: Duration,
}

impl Coordinator {
    /// Create a coordinator over the given registry and service connector
    pub fn new(
        registry: Arc<AccountRegistry>,
        connector: Arc<dyn ServiceConnector>,
        config: &CoordinatorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            registry,
            connector,
            shared: Arc::new(Shared {
                sessions: SessionManager::new(),
                pending: PendingChallenges::new(),
                events,
            }),
            grace_period: config.grace_period,
            stop_timeout: config.stop_timeout,
        }
    }

    /// The account registry this coordinator serves
    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    /// Subscribe to session-update events
    pub fn subscribe(&self) -> broadcast::Receiver<IpcEvent> {
        self.shared.events.subscribe()
    }

    /// Start (sign in) an account on behalf of a requester.
    ///
    /// Dispatches a handshake attempt and waits up to the grace period for
    /// it to resolve; returns `Pending` if it has not. A requester that
    /// already has a pending challenge for a different account is rejected
    /// with `ChallengePending` rather than silently superseded.
    pub async fn start(
        &self,
        account_id: &AccountId,
        requester: RequesterId,
    ) -> Result<StartResult, SessionError> {
        let account = self
            .registry
            .get(account_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownAccount(account_id.clone()))?;

        // One challenge per requester: reject a second start while a
        // challenge for another account is still waiting on this requester.
        if let Some(entry) = self.shared.pending.get(requester) {
            if &entry.account_id != account_id {
                tracing::info!(
                    "Requester {} start of {} rejected: challenge pending for {}",
                    requester,
                    account_id,
                    entry.account_id
                );
                return Ok(StartResult::ChallengePending);
            }
        }

        let slot = self.shared.sessions.slot(account_id);
        let epoch = {
            let mut session = slot.lock();
            match session.phase {
                Phase::Active => return Ok(StartResult::AlreadyActive),
                Phase::Authenticating | Phase::AwaitingChallenge { .. } => {
                    return Ok(StartResult::InProgress)
                }
                Phase::Idle | Phase::Failed { .. } => {}
            }
            session.phase = Phase::Authenticating;
            session.conn = None;
            session.epoch += 1;
            session.epoch
        };

        tracing::info!("Starting account {} for requester {}", account_id, requester);
        let done = self.dispatch(account, requester, epoch, None, None);

        let phase = self.wait_for_outcome(account_id, done).await;
        Ok(match phase {
            Phase::Active => StartResult::Active,
            Phase::AwaitingChallenge { kind } => StartResult::AwaitingChallenge { kind },
            Phase::Failed { reason } => StartResult::Failed { reason },
            Phase::Authenticating => StartResult::Pending,
            // Stopped out from under us during the grace wait
            Phase::Idle => StartResult::Stopped,
        })
    }

    /// Submit a challenge code for the requester's pending challenge.
    ///
    /// Resumes the parked handshake with the recorded challenge kind. A
    /// wrong code re-enters `AwaitingChallenge` with a fresh pending entry
    /// for the same requester; it never fails the session.
    pub async fn submit_code(
        &self,
        requester: RequesterId,
        code: &str,
    ) -> Result<SubmitResult, SessionError> {
        let Some(entry) = self.shared.pending.remove(requester) else {
            return Ok(SubmitResult::NoPendingChallenge);
        };

        let account = self
            .registry
            .get(&entry.account_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownAccount(entry.account_id.clone()))?;
        let account_id = entry.account_id;

        let slot = self.shared.sessions.slot(&account_id);
        let (epoch, conn) = {
            let mut session = slot.lock();
            if !matches!(session.phase, Phase::AwaitingChallenge { .. }) {
                // The session moved on (stopped or restarted) since the
                // challenge was recorded; nothing to resume.
                return Ok(SubmitResult::NoPendingChallenge);
            }
            session.phase = Phase::Authenticating;
            session.epoch += 1;
            (session.epoch, session.conn.take())
        };

        if conn.is_none() {
            // Resuming without the original connection falls back to a
            // fresh dial inside the attempt.
            tracing::warn!(
                "Account {}: challenge resume without live connection",
                account_id
            );
        }

        tracing::info!(
            "Submitting {} code for account {} (requester {})",
            entry.kind,
            account_id,
            requester
        );
        let challenge = ChallengeCode {
            kind: entry.kind,
            value: code.to_string(),
        };
        let done = self.dispatch(account, requester, epoch, conn, Some(challenge));

        let phase = self.wait_for_outcome(&account_id, done).await;
        Ok(match phase {
            Phase::Active => SubmitResult::Active,
            Phase::AwaitingChallenge { kind } => SubmitResult::AwaitingChallenge { kind },
            Phase::Failed { reason } => SubmitResult::Failed { reason },
            Phase::Authenticating => SubmitResult::Pending,
            // Stopped out from under us during the grace wait
            Phase::Idle => SubmitResult::Stopped,
        })
    }

    /// Stop (sign out) an account.
    ///
    /// Invalidates any in-flight attempt, clears pending challenges that
    /// reference the account, and waits up to `stop_timeout` for a graceful
    /// logout before degrading to forced release. Idempotent.
    pub async fn stop(&self, account_id: &AccountId) -> Result<StopResult, SessionError> {
        if !self.registry.contains(account_id) {
            return Err(SessionError::UnknownAccount(account_id.clone()));
        }

        let Some(slot) = self.shared.sessions.get(account_id) else {
            return Ok(StopResult::NotRunning);
        };

        let conn = {
            let mut session = slot.lock();
            if session.phase == Phase::Idle {
                return Ok(StopResult::NotRunning);
            }
            // Invalidate any attempt still in flight
            session.epoch += 1;
            session.phase = Phase::Idle;
            session.conn.take()
        };

        self.shared.pending.purge_account(account_id);
        self.shared.emit_update(account_id, &slot.lock());

        if let Some(mut conn) = conn {
            let graceful = tokio::task::spawn_blocking(move || conn.logout());
            if tokio::time::timeout(self.stop_timeout, graceful)
                .await
                .is_err()
            {
                // The logout keeps running on the blocking pool and the
                // connection is dropped when it finishes; the caller is not
                // kept waiting.
                tracing::warn!(
                    "Account {}: graceful logout timed out, forcing release",
                    account_id
                );
            }
        }

        tracing::info!("Stopped account {}", account_id);
        Ok(StopResult::Stopped)
    }

    /// Non-blocking status snapshot for one account
    pub fn status(&self, account_id: &AccountId) -> Result<SessionView, SessionError> {
        if !self.registry.contains(account_id) {
            return Err(SessionError::UnknownAccount(account_id.clone()));
        }
        Ok(match self.shared.sessions.get(account_id) {
            Some(slot) => status::project(&slot.lock()),
            None => status::project(&Session::new()),
        })
    }

    /// Status of every account, in registry order
    pub fn statuses(&self) -> Vec<AccountStatus> {
        self.registry
            .list()
            .iter()
            .filter_map(|id| {
                let account = self.registry.get(id)?;
                let view = self.status(id).ok()?;
                Some(AccountStatus {
                    account_id: id.to_string(),
                    identity: account.credentials.identity.clone(),
                    activity_count: account.activities.len(),
                    view,
                })
            })
            .collect()
    }

    /// Dispatch a handshake attempt on the blocking pool.
    ///
    /// The returned receiver resolves once the attempt has delivered its
    /// outcome into the session.
    fn dispatch(
        &self,
        account: AccountConfig,
        requester: RequesterId,
        epoch: u64,
        conn: Option<Box<dyn ServiceConnection>>,
        code: Option<ChallengeCode>,
    ) -> oneshot::Receiver<()> {
        let (done_tx, done_rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let connector = Arc::clone(&self.connector);

        tokio::task::spawn_blocking(move || {
            let outcome = handshake::run_attempt(connector.as_ref(), &account, conn, code.as_ref());
            shared.apply_outcome(&account.id, requester, epoch, outcome);
            // The waiter may have timed out and gone away
            let _ = done_tx.send(());
        });

        done_rx
    }

    /// Wait up to the grace period for an attempt to resolve, then snapshot
    /// the phase. On timeout the caller gets the (still `Authenticating`)
    /// phase and reports `Pending`.
    async fn wait_for_outcome(&self, account_id: &AccountId, done: oneshot::Receiver<()>) -> Phase {
        let _ = tokio::time::timeout(self.grace_period, done).await;
        match self.shared.sessions.get(account_id) {
            Some(slot) => slot.lock().phase.clone(),
            None => Phase::Idle,
        }
    }
}
