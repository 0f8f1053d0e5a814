//! IPC server for front-end communication

mod server;

pub use server::IpcServer;
