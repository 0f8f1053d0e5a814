//! Account registry
//!
//! Validates the raw config entries into immutable [`AccountConfig`] records,
//! keyed by account ID. Loaded once at startup; read-only afterwards, so it
//! is safe to share behind an `Arc` without further synchronization.

use std::collections::HashMap;

use crate::config::CoordinatorConfig;
use crate::error::ConfigError;
use crate::types::{AccountId, ActivityId, Credentials};

/// Immutable per-account configuration
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Account identifier
    pub id: AccountId,
    /// Login credentials
    pub credentials: Credentials,
    /// Activities to declare once signed in
    pub activities: Vec<ActivityId>,
}

/// Read-only registry of all configured accounts
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: HashMap<AccountId, AccountConfig>,
    /// IDs in config order, for stable listing
    order: Vec<AccountId>,
}

impl AccountRegistry {
    /// Build a registry from the coordinator configuration.
    ///
    /// Fails if any account entry is missing `identity` or `secret`, carries
    /// an activity outside the valid ID range, or reuses an ID.
    pub fn load(config: &CoordinatorConfig) -> Result<Self, ConfigError> {
        let mut accounts = HashMap::new();
        let mut order = Vec::new();

        for entry in &config.accounts {
            let id = AccountId::new(entry.id.clone());

            if accounts.contains_key(&id) {
                return Err(ConfigError::Invalid(format!(
                    "Duplicate account id: {}",
                    id
                )));
            }

            let identity = entry
                .identity
                .clone()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ConfigError::MissingField {
                    account: entry.id.clone(),
                    field: "identity".to_string(),
                })?;

            let secret = entry
                .secret
                .clone()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ConfigError::MissingField {
                    account: entry.id.clone(),
                    field: "secret".to_string(),
                })?;

            let mut activities = Vec::with_capacity(entry.activities.len());
            for &raw in &entry.activities {
                let activity: ActivityId =
                    raw.try_into().map_err(|_| ConfigError::InvalidActivity {
                        account: entry.id.clone(),
                        value: raw.to_string(),
                    })?;
                activities.push(activity);
            }

            order.push(id.clone());
            accounts.insert(
                id.clone(),
                AccountConfig {
                    id,
                    credentials: Credentials { identity, secret },
                    activities,
                },
            );
        }

        Ok(Self { accounts, order })
    }

    /// Get an account by ID
    pub fn get(&self, id: &AccountId) -> Option<&AccountConfig> {
        self.accounts.get(id)
    }

    /// Whether the registry knows this account
    pub fn contains(&self, id: &AccountId) -> bool {
        self.accounts.contains_key(id)
    }

    /// Account IDs in config order
    pub fn list(&self) -> &[AccountId] {
        &self.order
    }

    /// Number of configured accounts
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
