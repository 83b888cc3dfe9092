//! Integration tests for the TCP server

use parlor::config::Config;
use parlor::server::ServerListener;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

struct TestServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(Config::default()).await
    }

    async fn start_with(mut config: Config) -> Self {
        config.server.port = 0;

        let server = ServerListener::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let handle = tokio::spawn(async move { server.run(shutdown_rx).await });

        Self {
            addr,
            shutdown_tx,
            handle,
        }
    }

    async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = timeout(Duration::from_secs(2), self.handle).await;
    }
}

struct TestConn {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestConn {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = timeout(Duration::from_secs(2), TcpStream::connect(addr))
            .await
            .expect("Should connect to server")
            .unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    /// Connect and complete name negotiation
    async fn login(addr: SocketAddr, name: &str) -> Self {
        let mut conn = Self::connect(addr).await;
        conn.expect("Enter username").await;
        conn.send(name).await;
        conn.expect(&format!("Welcome, {}!", name.to_uppercase())).await;
        conn
    }

    async fn send(&mut self, line: &str) {
        self.send_raw(line.as_bytes()).await;
        self.send_raw(b"\n").await;
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn next_line(&mut self) -> Option<String> {
        timeout(Duration::from_secs(2), self.lines.next_line())
            .await
            .expect("Should receive a line")
            .unwrap()
    }

    /// Read until a line containing `needle` arrives
    async fn expect(&mut self, needle: &str) -> String {
        loop {
            match self.next_line().await {
                Some(line) if line.contains(needle) => return line,
                Some(_) => continue,
                None => panic!("Connection closed while waiting for {:?}", needle),
            }
        }
    }
}

#[tokio::test]
async fn test_name_negotiation() {
    let server = TestServer::start().await;
    let mut conn = TestConn::connect(server.addr).await;

    let prompt = conn.expect("Enter username").await;
    assert!(prompt.contains("SHIFT_LEAD"));

    conn.send("zed").await;
    conn.expect("'ZED' is not allowed").await;

    conn.send("bob").await;
    conn.expect("Welcome, BOB!").await;
    conn.expect("BOB joined. Type /menu for commands.").await;
    conn.expect("Online: BOB(FREE)").await;

    server.stop().await;
}

#[tokio::test]
async fn test_duplicate_login_rejected() {
    let server = TestServer::start().await;
    let _bob = TestConn::login(server.addr, "BOB").await;

    let mut other = TestConn::connect(server.addr).await;
    other.expect("Enter username").await;
    other.send("BOB").await;
    other.expect("BOB is already logged in elsewhere.").await;

    server.stop().await;
}

#[tokio::test]
async fn test_chat_between_two_clients() {
    let server = TestServer::start().await;
    let mut bob = TestConn::login(server.addr, "BOB").await;
    let mut alice = TestConn::login(server.addr, "ALICE").await;

    bob.send("/chat alice").await;
    bob.expect("Chat room 1 opened between BOB and ALICE").await;
    alice.expect("Chat room 1 opened between BOB and ALICE").await;
    alice
        .expect("Online: BOB(BUSY)[in room 1], ALICE(BUSY)[in room 1]")
        .await;

    alice.send("hi bob").await;
    bob.expect("ALICE: hi bob").await;

    bob.send("/leave").await;
    bob.expect("Left chat room 1.").await;
    alice.expect("Chat room 1 closed.").await;

    server.stop().await;
}

#[tokio::test]
async fn test_quit_closes_connection_and_notifies_others() {
    let server = TestServer::start().await;
    let mut alice = TestConn::login(server.addr, "ALICE").await;
    let mut bob = TestConn::login(server.addr, "BOB").await;

    bob.send("goodbye").await;
    bob.expect("Goodbye!").await;

    // Remaining lines drain, then the server hangs up
    while bob.next_line().await.is_some() {}

    alice.expect("BOB left.").await;

    // The name is free again
    let _again = TestConn::login(server.addr, "BOB").await;

    server.stop().await;
}

#[tokio::test]
async fn test_hangup_during_negotiation_is_harmless() {
    let server = TestServer::start().await;

    let mut early = TestConn::connect(server.addr).await;
    early.expect("Enter username").await;
    drop(early);

    let mut eva = TestConn::login(server.addr, "EVA").await;
    eva.send("/whoami").await;
    eva.expect("You are EVA | status: FREE").await;

    server.stop().await;
}

#[tokio::test]
async fn test_commands_before_login_are_names() {
    let server = TestServer::start().await;
    let mut conn = TestConn::connect(server.addr).await;

    conn.expect("Enter username").await;
    conn.send("/chat ALICE").await;
    conn.expect("is not allowed").await;
    conn.expect("Enter username").await;

    server.stop().await;
}

#[tokio::test]
async fn test_invalid_utf8_keeps_session_alive() {
    let server = TestServer::start().await;
    let mut bob = TestConn::login(server.addr, "bob").await;

    bob.send_raw(b"caf\xe9\n/whoami\n").await;
    bob.expect("No active chat").await;
    bob.expect("You are BOB | status: FREE").await;

    server.stop().await;
}

#[tokio::test]
async fn test_oversized_line_rejected_and_session_continues() {
    let mut config = Config::default();
    config.server.max_line_len = 32;
    let server = TestServer::start_with(config).await;
    let mut bob = TestConn::login(server.addr, "BOB").await;

    bob.send(&"x".repeat(100)).await;
    bob.expect("Line too long (limit 32 bytes)").await;

    bob.send("/whoami").await;
    bob.expect("You are BOB | status: FREE").await;

    server.stop().await;
}
