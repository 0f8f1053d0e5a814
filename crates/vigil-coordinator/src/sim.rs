//! Simulated external-service connector
//!
//! Stands in for the real wire-level client, which lives outside this
//! repository. Each login pops the next scripted step (default:
//! authenticate immediately), so tests can walk a session through challenge
//! and failure paths, and the daemon binary can be exercised end to end
//! without a real service.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use vigil_core::client::{
    ActivityError, LoginOutcome, RejectReason, ServiceConnection, ServiceConnector,
};
use vigil_core::types::{ActivityId, ChallengeCode, ChallengeKind, Credentials};

/// Outcome of one scripted login call
#[derive(Debug, Clone, Copy)]
pub enum SimOutcome {
    /// Sign in successfully
    Authenticated,
    /// Demand a code of the given kind
    ChallengeRequired(ChallengeKind),
    /// Reject the login
    Rejected(RejectReason),
    /// Panic inside the login call (exercises fault classification)
    Fault,
}

/// One scripted login step
#[derive(Debug, Clone, Copy)]
pub struct SimStep {
    /// Outcome to report
    pub outcome: SimOutcome,
    /// How long the login call blocks before reporting it
    pub delay: Duration,
}

impl SimStep {
    /// Step that resolves immediately
    pub fn new(outcome: SimOutcome) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
        }
    }

    /// Step that blocks for `delay` before resolving
    pub fn after(outcome: SimOutcome, delay: Duration) -> Self {
        Self { outcome, delay }
    }
}

struct SimShared {
    script: Mutex<VecDeque<SimStep>>,
    logouts: AtomicUsize,
    declared: Mutex<Vec<Vec<ActivityId>>>,
}

impl SimShared {
    fn next_step(&self) -> SimStep {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(SimStep {
                outcome: SimOutcome::Authenticated,
                delay: Duration::ZERO,
            })
    }
}

/// Scriptable in-process [`ServiceConnector`]
#[derive(Clone)]
pub struct SimConnector {
    shared: Arc<SimShared>,
}

impl SimConnector {
    /// Connector whose every login authenticates immediately
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SimShared {
                script: Mutex::new(VecDeque::new()),
                logouts: AtomicUsize::new(0),
                declared: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Append a scripted step; consumed by login calls in FIFO order
    pub fn push(&self, step: SimStep) {
        self.shared
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
    }

    /// How many connections have been logged out
    pub fn logout_count(&self) -> usize {
        self.shared.logouts.load(Ordering::SeqCst)
    }

    /// Activity sets declared so far, in order
    pub fn declared(&self) -> Vec<Vec<ActivityId>> {
        self.shared
            .declared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for SimConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceConnector for SimConnector {
    fn dial(&self) -> Box<dyn ServiceConnection> {
        Box::new(SimConnection {
            shared: Arc::clone(&self.shared),
            logged_out: false,
        })
    }
}

struct SimConnection {
    shared: Arc<SimShared>,
    logged_out: bool,
}

impl ServiceConnection for SimConnection {
    fn login(&mut self, _credentials: &Credentials, _code: Option<&ChallengeCode>) -> LoginOutcome {
        let step = self.shared.next_step();
        if !step.delay.is_zero() {
            std::thread::sleep(step.delay);
        }
        match step.outcome {
            SimOutcome::Authenticated => LoginOutcome::Authenticated,
            SimOutcome::ChallengeRequired(kind) => LoginOutcome::ChallengeRequired(kind),
            SimOutcome::Rejected(reason) => LoginOutcome::Rejected(reason),
            SimOutcome::Fault => panic!("scripted fault in simulated login"),
        }
    }

    fn declare_activities(&mut self, activities: &[ActivityId]) -> Result<(), ActivityError> {
        self.shared
            .declared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(activities.to_vec());
        Ok(())
    }

    fn logout(&mut self) {
        // Idempotent: only the first call counts
        if !self.logged_out {
            self.logged_out = true;
            self.shared.logouts.fetch_add(1, Ordering::SeqCst);
        }
    }
}
