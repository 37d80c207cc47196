//! Robustness tests for the chat server.
//!
//! These tests verify the server handles hostile or unlucky clients without
//! disturbing anyone else:
//! - Lines split across many TCP segments
//! - Over-long lines and malformed names
//! - Name collisions and name reuse
//! - Abrupt disconnects and server shutdown
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use huddle_core::SessionName;
use huddled::config::ServerConfig;
use huddled::registry::{spawn_registry, RegistryHandle};
use huddled::server::ChatServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

const READ_TIMEOUT: Duration = Duration::from_secs(2);
const REGISTRY_WAIT_TIMEOUT: Duration = Duration::from_secs(2);
const REGISTRY_POLL_INTERVAL: Duration = Duration::from_millis(10);
const FRAGMENT_DELAY: Duration = Duration::from_millis(20);
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// Test Helpers
// ============================================================================

fn loopback_config() -> ServerConfig {
    ServerConfig {
        bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        ..ServerConfig::default()
    }
}

struct TestServer {
    addr: SocketAddr,
    registry: RegistryHandle,
    cancel_token: CancellationToken,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(loopback_config()).await
    }

    async fn spawn_with(config: ServerConfig) -> Self {
        let registry = spawn_registry(config.max_sessions);
        let cancel_token = CancellationToken::new();

        let server = ChatServer::bind(&config, registry.clone(), cancel_token.clone())
            .await
            .expect("bind test server");
        let addr = server.local_addr().expect("local addr");

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        TestServer {
            addr,
            registry,
            cancel_token,
        }
    }

    async fn connect(&self) -> TestClient {
        TestClient::connect(self.addr).await
    }

    async fn join(&self, name: &str) -> TestClient {
        let mut client = self.connect().await;
        client.send(name).await;
        self.wait_for_session(name, true).await;
        client
    }

    async fn wait_for_session(&self, name: &str, present: bool) {
        let start = tokio::time::Instant::now();
        while start.elapsed() < REGISTRY_WAIT_TIMEOUT {
            let found = self
                .registry
                .get_session(SessionName::new(name))
                .await
                .is_some();
            if found == present {
                return;
            }
            sleep(REGISTRY_POLL_INTERVAL).await;
        }
        panic!("session {name} present={present} not reached within {REGISTRY_WAIT_TIMEOUT:?}");
    }

    async fn wait_for_count(&self, expected: usize) {
        let start = tokio::time::Instant::now();
        while start.elapsed() < REGISTRY_WAIT_TIMEOUT {
            if self.registry.get_all_sessions().await.len() == expected {
                return;
            }
            sleep(REGISTRY_POLL_INTERVAL).await;
        }
        panic!("registry did not reach {expected} sessions");
    }

    async fn session_count(&self) -> usize {
        self.registry.get_all_sessions().await.len()
    }

    fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect to server");
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.send_raw(format!("{line}\n").as_bytes()).await;
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Closes the write side, leaving the read side open.
    async fn half_close(&mut self) {
        self.writer.shutdown().await.unwrap();
    }

    /// Writes `bytes` one chunk at a time with a pause between chunks.
    async fn send_fragmented(&mut self, bytes: &[u8], chunk: usize) {
        for piece in bytes.chunks(chunk) {
            self.send_raw(piece).await;
            sleep(FRAGMENT_DELAY).await;
        }
    }

    async fn expect_line(&mut self, expected: &str) {
        let mut line = String::new();
        let read = timeout(READ_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .expect("read from server");
        assert!(read > 0, "stream closed while expecting {expected:?}");
        assert_eq!(line.trim_end_matches('\n'), expected);
    }

    /// Asserts the server closed the connection. A reset counts as closed:
    /// the server may drop the socket with unread input still queued.
    async fn expect_closed(&mut self) {
        let mut line = String::new();
        let result = timeout(READ_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for the server to close");
        match result {
            Ok(0) | Err(_) => {}
            Ok(_) => panic!("expected a closed stream, got {line:?}"),
        }
    }
}

// ============================================================================
// Fragmentation Tests
// ============================================================================

#[tokio::test]
async fn test_line_split_across_writes() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("Alice").await;
    let mut bob = server.join("Bob").await;

    alice.send_raw(b"Hel").await;
    sleep(FRAGMENT_DELAY).await;
    alice.send_raw(b"lo Bo").await;
    sleep(FRAGMENT_DELAY).await;
    alice.send_raw(b"b\n").await;

    bob.expect_line("Alice: Hello Bob").await;

    server.shutdown();
}

#[tokio::test]
async fn test_byte_at_a_time_delivery() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("Alice").await;
    let mut bob = server.join("Bob").await;

    alice.send_fragmented(b"one\ntwo\n", 1).await;

    bob.expect_line("Alice: one").await;
    bob.expect_line("Alice: two").await;

    server.shutdown();
}

#[tokio::test]
async fn test_fragmented_handshake() {
    let server = TestServer::spawn().await;

    let mut bob = server.join("Bob").await;

    let mut alice = server.connect().await;
    alice.send_fragmented(b"Ali", 2).await;
    alice.send_raw(b"ce\n").await;
    server.wait_for_session("Alice", true).await;

    alice.send("made it").await;
    bob.expect_line("Alice: made it").await;

    server.shutdown();
}

#[tokio::test]
async fn test_handshake_coalesced_with_first_message() {
    let server = TestServer::spawn().await;

    let mut bob = server.join("Bob").await;

    let mut dave = server.connect().await;
    dave.send_raw(b"Dave\nhi all\n").await;

    bob.expect_line("Dave: hi all").await;

    server.shutdown();
}

#[tokio::test]
async fn test_partial_line_then_more_lines_in_one_write() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("Alice").await;
    let mut bob = server.join("Bob").await;

    alice.send_raw(b"first ha").await;
    sleep(FRAGMENT_DELAY).await;
    alice.send_raw(b"lf\nsecond\nthi").await;
    sleep(FRAGMENT_DELAY).await;
    alice.send_raw(b"rd\n").await;

    bob.expect_line("Alice: first half").await;
    bob.expect_line("Alice: second").await;
    bob.expect_line("Alice: third").await;

    server.shutdown();
}

// ============================================================================
// Line Handling Tests
// ============================================================================

#[tokio::test]
async fn test_crlf_terminated_lines() {
    let server = TestServer::spawn().await;

    let mut bob = server.join("Bob").await;

    let mut alice = server.connect().await;
    alice.send_raw(b"Alice\r\n").await;
    server.wait_for_session("Alice", true).await;

    alice.send_raw(b"windows line\r\n").await;
    bob.expect_line("Alice: windows line").await;

    server.shutdown();
}

#[tokio::test]
async fn test_empty_lines_are_ignored() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("Alice").await;
    let mut bob = server.join("Bob").await;

    alice.send_raw(b"\n\n\nreal\n").await;
    bob.expect_line("Alice: real").await;

    server.shutdown();
}

#[tokio::test]
async fn test_overlong_line_closes_only_that_session() {
    let config = ServerConfig {
        max_line_length: 64,
        max_name_length: 16,
        ..loopback_config()
    };
    let server = TestServer::spawn_with(config).await;

    let mut alice = server.join("Alice").await;
    let mut bob = server.join("Bob").await;
    let mut charlie = server.join("Charlie").await;

    let flood = format!("{}\n", "x".repeat(200));
    alice.send_raw(flood.as_bytes()).await;

    alice.expect_closed().await;
    server.wait_for_session("Alice", false).await;

    // Everyone else carries on
    bob.send("still fine").await;
    charlie.expect_line("Bob: still fine").await;

    server.shutdown();
}

#[tokio::test]
async fn test_line_at_limit_is_accepted() {
    let config = ServerConfig {
        max_line_length: 64,
        max_name_length: 16,
        ..loopback_config()
    };
    let server = TestServer::spawn_with(config).await;

    let mut alice = server.join("Alice").await;
    let mut bob = server.join("Bob").await;

    let body = "y".repeat(64);
    alice.send(&body).await;
    bob.expect_line(&format!("Alice: {body}")).await;

    server.shutdown();
}

// ============================================================================
// Handshake Tests
// ============================================================================

#[tokio::test]
async fn test_empty_name_closes_connection() {
    let server = TestServer::spawn().await;

    let mut client = server.connect().await;
    client.send("").await;
    client.expect_closed().await;

    assert_eq!(server.session_count().await, 0);
    server.shutdown();
}

#[tokio::test]
async fn test_whitespace_name_closes_connection() {
    let server = TestServer::spawn().await;

    let mut client = server.connect().await;
    client.send("   ").await;
    client.expect_closed().await;

    assert_eq!(server.session_count().await, 0);
    server.shutdown();
}

#[tokio::test]
async fn test_overlong_name_closes_connection() {
    let config = ServerConfig {
        max_name_length: 8,
        ..loopback_config()
    };
    let server = TestServer::spawn_with(config).await;

    let mut client = server.connect().await;
    client.send("Bartholomew").await;
    client.expect_closed().await;

    assert_eq!(server.session_count().await, 0);
    server.shutdown();
}

#[tokio::test]
async fn test_name_collision_rejects_newcomer() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("Alice").await;
    let mut bob = server.join("Bob").await;

    let mut impostor = server.connect().await;
    impostor.send("Alice").await;
    impostor.expect_closed().await;

    // The original Alice is untouched
    bob.send("hi Alice").await;
    alice.expect_line("Bob: hi Alice").await;
    assert_eq!(server.session_count().await, 2);

    server.shutdown();
}

#[tokio::test]
async fn test_name_reusable_after_exit() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("Alice").await;
    let mut bob = server.join("Bob").await;

    alice.send("!exit").await;
    bob.expect_line("Alice: !exit").await;
    alice.expect_closed().await;
    server.wait_for_session("Alice", false).await;

    let mut alice_again = server.join("Alice").await;
    alice_again.send("back").await;
    bob.expect_line("Alice: back").await;

    server.shutdown();
}

#[tokio::test]
async fn test_capacity_limit_rejects_extra_session() {
    let config = ServerConfig {
        max_sessions: 2,
        ..loopback_config()
    };
    let server = TestServer::spawn_with(config).await;

    let _alice = server.join("Alice").await;
    let _bob = server.join("Bob").await;

    let mut charlie = server.connect().await;
    charlie.send("Charlie").await;
    charlie.expect_closed().await;

    assert_eq!(server.session_count().await, 2);
    server.shutdown();
}

// ============================================================================
// Disconnect Tests
// ============================================================================

#[tokio::test]
async fn test_abrupt_disconnect_removes_session() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("Alice").await;
    let bob = server.join("Bob").await;
    let mut charlie = server.join("Charlie").await;

    drop(bob);
    server.wait_for_session("Bob", false).await;

    // Broadcasting to a room Bob just left still works
    alice.send("who is left").await;
    charlie.expect_line("Alice: who is left").await;
    assert_eq!(server.session_count().await, 2);

    server.shutdown();
}

#[tokio::test]
async fn test_unterminated_fragment_at_close_is_not_routed() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("Alice").await;
    let mut bob = server.join("Bob").await;
    let mut charlie = server.join("Charlie").await;

    alice.send_raw(b"bye").await;
    alice.half_close().await;

    server.wait_for_session("Alice", false).await;
    alice.expect_closed().await;

    // Bob's first delivery is Charlie's line, not Alice's fragment
    charlie.send("after").await;
    bob.expect_line("Charlie: after").await;

    server.shutdown();
}

#[tokio::test]
async fn test_unterminated_exit_is_a_plain_disconnect() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("Alice").await;
    let mut bob = server.join("Bob").await;
    let mut charlie = server.join("Charlie").await;

    alice.send_raw(b"!exit").await;
    alice.half_close().await;

    server.wait_for_session("Alice", false).await;

    charlie.send("still here").await;
    bob.expect_line("Charlie: still here").await;

    server.shutdown();
}

#[tokio::test]
async fn test_disconnect_before_handshake() {
    let server = TestServer::spawn().await;

    let client = server.connect().await;
    drop(client);

    let mut alice = server.join("Alice").await;
    let mut bob = server.join("Bob").await;
    alice.send("unaffected").await;
    bob.expect_line("Alice: unaffected").await;

    server.wait_for_count(2).await;
    server.shutdown();
}

#[tokio::test]
async fn test_rapid_connect_disconnect() {
    let server = TestServer::spawn().await;

    for i in 0..20 {
        let mut client = server.connect().await;
        client.send(&format!("Guest{i}")).await;
        drop(client);
    }

    let mut alice = server.join("Alice").await;
    let mut bob = server.join("Bob").await;
    alice.send("quiet now").await;
    bob.expect_line("Alice: quiet now").await;

    // Every guest eventually deregisters
    server.wait_for_count(2).await;
    server.shutdown();
}

#[tokio::test]
async fn test_shutdown_closes_clients() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("Alice").await;
    let mut bob = server.join("Bob").await;

    server.shutdown();

    alice.expect_closed().await;
    bob.expect_closed().await;
    server.wait_for_count(0).await;

    sleep(SHUTDOWN_GRACE_PERIOD).await;
    assert!(
        TcpStream::connect(server.addr).await.is_err(),
        "listener should be closed after shutdown"
    );
}
