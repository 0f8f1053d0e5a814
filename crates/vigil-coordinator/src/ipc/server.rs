//! IPC server implementation
//!
//! Listens on localhost TCP for requests from chat-bot or CLI front-ends.
//! Uses TCP on 127.0.0.1 for cross-platform compatibility (works on Unix,
//! macOS, Windows). One JSON request per line, one JSON response per line;
//! session-update events are pushed to every connected client as they occur.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use vigil_core::ipc::{IpcRequest, IpcResponse};
use vigil_core::types::{AccountId, RequesterId};

use crate::coordinator::Coordinator;

/// IPC server for front-end communication
///
/// Listens on localhost (127.0.0.1) only - not accessible from network.
pub struct IpcServer {
    /// Address to bind (127.0.0.1:port)
    pub address: String,
    /// The coordinator serving requests
    coordinator: Arc<Coordinator>,
    /// Requesters allowed to issue session commands; empty means everyone
    allowed_requesters: Vec<i64>,
    /// Cancellation token for shutdown
    shutdown_token: Option<CancellationToken>,
}

impl IpcServer {
    /// Create a new IPC server
    pub fn new(
        address: String,
        coordinator: Arc<Coordinator>,
        allowed_requesters: Vec<i64>,
    ) -> Self {
        Self {
            address,
            coordinator,
            allowed_requesters,
            shutdown_token: None,
        }
    }

    /// Set the shutdown token (call before run)
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = Some(token);
        self
    }

    /// Start the IPC server
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.address)
            .await
            .with_context(|| format!("Failed to bind IPC server to {}", self.address))?;

        tracing::info!("IPC server listening on {}", self.address);

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    // Only accept connections from localhost
                    if !peer_addr.ip().is_loopback() {
                        tracing::warn!("Rejected non-localhost connection from {}", peer_addr);
                        continue;
                    }

                    let coordinator = Arc::clone(&self.coordinator);
                    let allowed = self.allowed_requesters.clone();
                    let shutdown_token = self.shutdown_token.clone();

                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_client(stream, coordinator, allowed, shutdown_token).await
                        {
                            tracing::warn!("IPC client error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept IPC connection: {}", e);
                }
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    coordinator: Arc<Coordinator>,
    allowed_requesters: Vec<i64>,
    shutdown_token: Option<CancellationToken>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    // Session-update events are pushed to the client as they occur
    let mut event_rx = coordinator.subscribe();

    loop {
        tokio::select! {
            // Handle incoming requests
            result = reader.read_line(&mut line) => {
                match result {
                    Ok(0) => break, // EOF
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            line.clear();
                            continue;
                        }

                        let response = match serde_json::from_str::<IpcRequest>(trimmed) {
                            Ok(request) => handle_request(
                                request,
                                &coordinator,
                                &allowed_requesters,
                                shutdown_token.as_ref(),
                            ).await,
                            Err(e) => IpcResponse::Error {
                                message: format!("Invalid request: {}", e),
                            },
                        };

                        let mut response_json = serde_json::to_string(&response)?;
                        response_json.push('\n');
                        writer.write_all(response_json.as_bytes()).await?;

                        line.clear();
                    }
                    Err(e) => {
                        return Err(e.into());
                    }
                }
            }

            // Forward session-update events to the client
            result = event_rx.recv() => {
                match result {
                    Ok(event) => {
                        let mut event_json = serde_json::to_string(&event)?;
                        event_json.push('\n');
                        writer.write_all(event_json.as_bytes()).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("IPC client lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Whether the requester may drive session commands.
///
/// An empty access list admits everyone; a non-empty one is a strict allow
/// list.
fn requester_allowed(allowed: &[i64], requester_id: i64) -> bool {
    allowed.is_empty() || allowed.contains(&requester_id)
}

async fn handle_request(
    request: IpcRequest,
    coordinator: &Coordinator,
    allowed_requesters: &[i64],
    shutdown_token: Option<&CancellationToken>,
) -> IpcResponse {
    match request {
        IpcRequest::Start {
            account_id,
            requester_id,
        } => {
            if !requester_allowed(allowed_requesters, requester_id) {
                tracing::warn!("Requester {} denied access to start", requester_id);
                return IpcResponse::Error {
                    message: "access denied".to_string(),
                };
            }

            match coordinator
                .start(&AccountId::new(account_id), RequesterId::new(requester_id))
                .await
            {
                Ok(result) => IpcResponse::Start(result),
                Err(e) => IpcResponse::Error {
                    message: e.to_string(),
                },
            }
        }

        IpcRequest::SubmitCode { requester_id, code } => {
            if !requester_allowed(allowed_requesters, requester_id) {
                tracing::warn!("Requester {} denied access to submit_code", requester_id);
                return IpcResponse::Error {
                    message: "access denied".to_string(),
                };
            }

            match coordinator
                .submit_code(RequesterId::new(requester_id), &code)
                .await
            {
                Ok(result) => IpcResponse::Submit(result),
                Err(e) => IpcResponse::Error {
                    message: e.to_string(),
                },
            }
        }

        IpcRequest::Stop { account_id } => {
            match coordinator.stop(&AccountId::new(account_id)).await {
                Ok(result) => IpcResponse::Stop(result),
                Err(e) => IpcResponse::Error {
                    message: e.to_string(),
                },
            }
        }

        IpcRequest::Status { account_id } => {
            match coordinator.status(&AccountId::new(account_id)) {
                Ok(view) => IpcResponse::Status(view),
                Err(e) => IpcResponse::Error {
                    message: e.to_string(),
                },
            }
        }

        IpcRequest::ListAccounts => IpcResponse::Accounts {
            accounts: coordinator.statuses(),
        },

        IpcRequest::Ping => IpcResponse::Pong,

        IpcRequest::Shutdown => {
            tracing::info!("Shutdown requested via IPC");
            if let Some(token) = shutdown_token {
                token.cancel();
                IpcResponse::Ok
            } else {
                IpcResponse::Error {
                    message: "Shutdown not supported (no shutdown token configured)".to_string(),
                }
            }
        }
    }
}
