//! Core error types for Vigil
//!
//! State-conflict outcomes (already active, nothing pending, wrong code) are
//! not errors; they live in the result enums in [`crate::ipc`]. The types
//! here cover configuration problems and commands that reference accounts
//! the registry does not know.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::AccountId;

/// Top-level error type for the Vigil ecosystem
#[derive(Error, Debug)]
pub enum VigilError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Command referenced an account not present in the registry
    #[error("Unknown account: {0}")]
    UnknownAccount(AccountId),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Account section is missing a required field
    #[error("Account {account}: missing required field `{field}`")]
    MissingField { account: String, field: String },

    /// Activity entry is not a valid activity ID
    #[error("Account {account}: invalid activity `{value}`")]
    InvalidActivity { account: String, value: String },
}
