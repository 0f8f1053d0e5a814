//! Per-account session state

mod manager;
mod state;

pub use manager::SessionManager;
pub use state::{Session, SessionSlot};
