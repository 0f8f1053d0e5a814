//! vigil-coordinator: the session lifecycle and challenge-coordination engine
//!
//! The coordinator owns one session per configured account, runs the blocking
//! external login handshake off the control path, parks handshakes that hit
//! an out-of-band challenge until a code arrives, and answers status queries
//! without blocking. Front-ends (chat bots, CLIs) drive it over a localhost
//! JSON-lines IPC protocol.

pub mod coordinator;
pub mod handshake;
pub mod ipc;
pub mod pending;
pub mod session;
pub mod sim;
pub mod status;

pub use coordinator::Coordinator;
