//! vigil-core: shared types, configuration and client traits for Vigil
//!
//! Vigil keeps a small fixed set of long-lived external-service sessions
//! signed in, one per configured account. This crate holds everything the
//! coordinator daemon and its front-ends share: account identifiers and
//! credentials, the registry loaded from the TOML config, the error taxonomy,
//! the service-client traits the coordinator drives, and the JSON IPC
//! protocol spoken by front-ends.

pub mod client;
pub mod config;
pub mod error;
pub mod ipc;
pub mod registry;
pub mod types;

pub use error::{ConfigError, SessionError, VigilError};
pub use registry::{AccountConfig, AccountRegistry};
pub use types::{AccountId, ActivityId, ChallengeCode, ChallengeKind, Credentials, RequesterId};
