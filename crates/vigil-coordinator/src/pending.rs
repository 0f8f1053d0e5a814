//! Pending-challenge table
//!
//! Maps a requester to the single challenge it has been asked to answer.
//! Entries are created when a handshake attempt reports `ChallengeRequired`
//! and removed on code submission, on stop of the account, or when a newer
//! challenge for the same requester supersedes the old one.

use dashmap::DashMap;
use std::time::Instant;

use vigil_core::types::{AccountId, ChallengeKind, RequesterId};

/// One parked challenge waiting for its code
#[derive(Debug, Clone)]
pub struct PendingChallenge {
    /// Account whose handshake is parked
    pub account_id: AccountId,
    /// Kind of code the service asked for
    pub kind: ChallengeKind,
    /// When the challenge was recorded
    pub created_at: Instant,
}

/// Table of pending challenges, keyed by requester.
///
/// At most one entry per requester; inserting for a requester that already
/// has one replaces it.
pub struct PendingChallenges {
    entries: DashMap<RequesterId, PendingChallenge>,
}

impl PendingChallenges {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Record a challenge for a requester, superseding any prior entry
    pub fn insert(&self, requester: RequesterId, account_id: AccountId, kind: ChallengeKind) {
        let prior = self.entries.insert(
            requester,
            PendingChallenge {
                account_id,
                kind,
                created_at: Instant::now(),
            },
        );
        if let Some(prior) = prior {
            tracing::warn!(
                "Requester {} challenge for account {} superseded",
                requester,
                prior.account_id
            );
        }
    }

    /// Take the pending challenge for a requester, if any
    pub fn remove(&self, requester: RequesterId) -> Option<PendingChallenge> {
        self.entries.remove(&requester).map(|(_, entry)| entry)
    }

    /// Look up the pending challenge for a requester without removing it
    pub fn get(&self, requester: RequesterId) -> Option<PendingChallenge> {
        self.entries.get(&requester).map(|r| r.clone())
    }

    /// Drop every entry that references the given account
    pub fn purge_account(&self, account_id: &AccountId) {
        self.entries.retain(|_, entry| &entry.account_id != account_id);
    }

    /// Number of pending challenges
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PendingChallenges {
    fn default() -> Self {
        Self::new()
    }
}
