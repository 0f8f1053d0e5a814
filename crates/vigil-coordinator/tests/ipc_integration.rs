//! IPC integration tests
//!
//! Drives a live IPC server over TCP the way a front-end would.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use vigil_core::config::{AccountEntry, CoordinatorConfig};
use vigil_core::ipc::{IpcRequest, IpcResponse, Phase, StartResult, StopResult, SubmitResult};
use vigil_core::registry::AccountRegistry;
use vigil_coordinator::ipc::IpcServer;
use vigil_coordinator::sim::SimConnector;
use vigil_coordinator::Coordinator;

/// Base port for test servers - each test gets a unique offset
static PORT_COUNTER: AtomicU16 = AtomicU16::new(0);

/// Get a unique port for this test
fn get_test_port() -> u16 {
    // Use a range of ports starting from 39000
    let offset = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);
    39000 + offset
}

fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        grace_period: Duration::from_secs(2),
        stop_timeout: Duration::from_secs(2),
        accounts: vec![
            AccountEntry {
                id: "main".to_string(),
                identity: Some("main-user".to_string()),
                secret: Some("pw".to_string()),
                activities: vec![10, 20],
            },
            AccountEntry {
                id: "alt".to_string(),
                identity: Some("alt-user".to_string()),
                secret: Some("pw".to_string()),
                activities: vec![30],
            },
        ],
        ..CoordinatorConfig::default()
    }
}

/// Spin up a coordinator and IPC server on a fresh port
fn start_server(
    config: CoordinatorConfig,
    connector: SimConnector,
    shutdown: Option<CancellationToken>,
) -> (String, Arc<Coordinator>, tokio::task::JoinHandle<()>) {
    let address = format!("127.0.0.1:{}", get_test_port());
    let registry = Arc::new(AccountRegistry::load(&config).expect("valid test config"));
    let coordinator = Arc::new(Coordinator::new(registry, Arc::new(connector), &config));

    let mut server = IpcServer::new(
        address.clone(),
        Arc::clone(&coordinator),
        config.allowed_requesters.clone(),
    );
    if let Some(token) = shutdown {
        server = server.with_shutdown_token(token);
    }

    let handle = tokio::spawn(async move {
        let _ = server.run().await;
    });

    (address, coordinator, handle)
}

/// IPC test client wrapper
struct TestClient {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: BufWriter<tokio::net::tcp::OwnedWriteHalf>,
}

impl TestClient {
    async fn connect(address: &str) -> Self {
        // Retry connection a few times in case server isn't ready
        let mut last_err = None;
        for _ in 0..10 {
            match TcpStream::connect(address).await {
                Ok(stream) => {
                    let (reader, writer) = stream.into_split();
                    return Self {
                        reader: BufReader::new(reader),
                        writer: BufWriter::new(writer),
                    };
                }
                Err(e) => {
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
        panic!(
            "Failed to connect to IPC server at {}: {:?}",
            address, last_err
        );
    }

    async fn send_request(&mut self, request: IpcRequest) -> IpcResponse {
        // Send request
        let mut request_json =
            serde_json::to_string(&request).expect("Failed to serialize request");
        request_json.push('\n');
        self.writer
            .write_all(request_json.as_bytes())
            .await
            .expect("Failed to write request");
        self.writer.flush().await.expect("Failed to flush");

        // Read response, skipping any pushed events
        loop {
            let mut response_line = String::new();
            self.reader
                .read_line(&mut response_line)
                .await
                .expect("Failed to read response");

            if response_line.is_empty() {
                panic!("Server sent empty response (connection closed?)");
            }

            // Session-update events share the wire with responses
            if let Ok(resp) = serde_json::from_str::<IpcResponse>(&response_line) {
                return resp;
            }
        }
    }
}

#[tokio::test]
async fn test_ipc_ping_pong() {
    let (address, _, server_handle) = start_server(test_config(), SimConnector::new(), None);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut client = TestClient::connect(&address).await;

    let response = client.send_request(IpcRequest::Ping).await;
    assert!(matches!(response, IpcResponse::Pong));

    server_handle.abort();
}

#[tokio::test]
async fn test_ipc_list_accounts_all_idle() {
    let (address, _, server_handle) = start_server(test_config(), SimConnector::new(), None);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut client = TestClient::connect(&address).await;

    let response = client.send_request(IpcRequest::ListAccounts).await;
    match response {
        IpcResponse::Accounts { accounts } => {
            assert_eq!(accounts.len(), 2);
            assert_eq!(accounts[0].account_id, "main");
            assert_eq!(accounts[1].account_id, "alt");
            assert!(accounts.iter().all(|a| a.view.phase == Phase::Idle));
        }
        other => panic!("Expected Accounts response, got {:?}", other),
    }

    server_handle.abort();
}

#[tokio::test]
async fn test_ipc_start_status_stop_roundtrip() {
    let (address, _, server_handle) = start_server(test_config(), SimConnector::new(), None);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut client = TestClient::connect(&address).await;

    let response = client
        .send_request(IpcRequest::Start {
            account_id: "main".to_string(),
            requester_id: 1,
        })
        .await;
    match response {
        IpcResponse::Start(result) => assert_eq!(result, StartResult::Active),
        other => panic!("Expected Start response, got {:?}", other),
    }

    let response = client
        .send_request(IpcRequest::Status {
            account_id: "main".to_string(),
        })
        .await;
    match response {
        IpcResponse::Status(view) => {
            assert!(view.is_active);
            assert_eq!(view.label, "active");
        }
        other => panic!("Expected Status response, got {:?}", other),
    }

    let response = client
        .send_request(IpcRequest::Stop {
            account_id: "main".to_string(),
        })
        .await;
    match response {
        IpcResponse::Stop(result) => assert_eq!(result, StopResult::Stopped),
        other => panic!("Expected Stop response, got {:?}", other),
    }

    server_handle.abort();
}

#[tokio::test]
async fn test_ipc_unknown_account_is_error() {
    let (address, _, server_handle) = start_server(test_config(), SimConnector::new(), None);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut client = TestClient::connect(&address).await;

    let response = client
        .send_request(IpcRequest::Status {
            account_id: "ghost".to_string(),
        })
        .await;
    match response {
        IpcResponse::Error { message } => {
            assert!(message.contains("ghost"));
        }
        other => panic!("Expected Error response, got {:?}", other),
    }

    server_handle.abort();
}

#[tokio::test]
async fn test_ipc_submit_without_challenge() {
    let (address, _, server_handle) = start_server(test_config(), SimConnector::new(), None);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut client = TestClient::connect(&address).await;

    let response = client
        .send_request(IpcRequest::SubmitCode {
            requester_id: 1,
            code: "ABC12".to_string(),
        })
        .await;
    match response {
        IpcResponse::Submit(result) => assert_eq!(result, SubmitResult::NoPendingChallenge),
        other => panic!("Expected Submit response, got {:?}", other),
    }

    server_handle.abort();
}

#[tokio::test]
async fn test_ipc_access_list_enforced() {
    let config = CoordinatorConfig {
        allowed_requesters: vec![100],
        ..test_config()
    };
    let (address, coordinator, server_handle) = start_server(config, SimConnector::new(), None);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut client = TestClient::connect(&address).await;

    // Unlisted requester is turned away before the coordinator is touched
    let response = client
        .send_request(IpcRequest::Start {
            account_id: "main".to_string(),
            requester_id: 999,
        })
        .await;
    match response {
        IpcResponse::Error { message } => {
            assert!(message.contains("access denied"));
        }
        other => panic!("Expected Error response, got {:?}", other),
    }
    assert_eq!(
        coordinator
            .status(&vigil_core::types::AccountId::new("main"))
            .expect("known account")
            .phase,
        Phase::Idle
    );

    // The listed requester goes through
    let response = client
        .send_request(IpcRequest::Start {
            account_id: "main".to_string(),
            requester_id: 100,
        })
        .await;
    match response {
        IpcResponse::Start(result) => assert_eq!(result, StartResult::Active),
        other => panic!("Expected Start response, got {:?}", other),
    }

    server_handle.abort();
}

#[tokio::test]
async fn test_ipc_shutdown() {
    let cancel = CancellationToken::new();
    let (address, _, server_handle) =
        start_server(test_config(), SimConnector::new(), Some(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut client = TestClient::connect(&address).await;

    let response = client.send_request(IpcRequest::Shutdown).await;
    assert!(matches!(response, IpcResponse::Ok));

    // Verify cancellation token was triggered
    assert!(cancel.is_cancelled());

    server_handle.abort();
}

#[tokio::test]
async fn test_ipc_concurrent_clients() {
    let (address, _, server_handle) = start_server(test_config(), SimConnector::new(), None);

    tokio::time::sleep(Duration::from_millis(50)).await;

    // Spawn multiple concurrent clients
    let mut handles = vec![];
    for i in 0..5 {
        let addr = address.clone();
        handles.push(tokio::spawn(async move {
            let mut client = TestClient::connect(&addr).await;

            // Each client sends multiple pings
            for _ in 0..3 {
                let response = client.send_request(IpcRequest::Ping).await;
                assert!(
                    matches!(response, IpcResponse::Pong),
                    "Client {} expected Pong",
                    i
                );
            }
        }));
    }

    // Wait for all clients to complete
    let result = timeout(Duration::from_secs(5), async {
        for handle in handles {
            handle.await.expect("Client task failed");
        }
    })
    .await;

    assert!(result.is_ok(), "Concurrent client test timed out");

    server_handle.abort();
}
