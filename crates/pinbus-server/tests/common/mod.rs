//! Shared harness: a real relay on loopback plus a framed test client.

// Each integration test binary compiles this module separately and uses a
// different subset of it.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use pinbus_core::{AccountId, DashId, ServerConfig};
use pinbus_server::protocol::{Command, Frame, FrameCodec, Status, MAX_FRAME_SIZE};
use pinbus_server::registry::{AcceptAllReceipts, NoopNotifier, TokenRegistry};
use pinbus_server::server::RelayServer;
use pinbus_server::storage::InMemoryStorage;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A relay serving on ephemeral loopback ports.
pub struct TestServer {
    pub hardware_addr: SocketAddr,
    pub app_addr: SocketAddr,
}

impl TestServer {
    /// Start a relay seeded with `(token, account, dash)` bindings.
    pub async fn start(seeds: &[(&str, &str, i64)]) -> Self {
        let registry = TokenRegistry::new();
        for (token, account, dash) in seeds {
            registry.insert(*token, AccountId::new(*account), DashId(*dash));
        }

        let config = ServerConfig::default().with_addrs(
            "127.0.0.1:0".parse().unwrap(),
            "127.0.0.1:0".parse().unwrap(),
        );
        let server = RelayServer::bind(
            &config,
            Arc::new(registry),
            Arc::new(InMemoryStorage::new()),
            Arc::new(AcceptAllReceipts),
            Arc::new(NoopNotifier),
        )
        .await
        .expect("bind relay");

        let hardware_addr = server.hardware_addr();
        let app_addr = server.app_addr();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self {
            hardware_addr,
            app_addr,
        }
    }
}

/// A framed client speaking the relay protocol.
pub struct TestClient {
    framed: Framed<TcpStream, FrameCodec>,
}

impl TestClient {
    /// Connect to the hardware listener.
    pub async fn connect_hardware(server: &TestServer) -> Self {
        Self::connect(server.hardware_addr).await
    }

    /// Connect to the application listener.
    pub async fn connect_app(server: &TestServer) -> Self {
        Self::connect(server.app_addr).await
    }

    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        Self {
            framed: Framed::new(stream, FrameCodec::with_max_frame_size(MAX_FRAME_SIZE)),
        }
    }

    /// Send one frame.
    pub async fn send(&mut self, id: u32, command: Command, body: &str) {
        self.framed
            .send(Frame::new(id, command, body).encode())
            .await
            .expect("send frame");
    }

    /// Send raw payload bytes, bypassing frame construction.
    pub async fn send_raw(&mut self, payload: Bytes) {
        self.framed.send(payload).await.expect("send raw frame");
    }

    /// Receive and parse the next frame.
    pub async fn recv(&mut self) -> Frame {
        let raw = timeout(RECV_TIMEOUT, self.framed.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .expect("decode error");
        Frame::parse(&raw).expect("unparseable frame")
    }

    /// Assert the connection was closed by the server.
    pub async fn expect_closed(&mut self) {
        let next = timeout(RECV_TIMEOUT, self.framed.next())
            .await
            .expect("timed out waiting for close");
        assert!(
            next.is_none() || next.unwrap().is_err(),
            "expected the server to close the connection"
        );
    }

    /// Receive a frame and assert it is `response <status>` echoing `id`.
    pub async fn expect_response(&mut self, id: u32, status: Status) {
        let frame = self.recv().await;
        assert_eq!(frame.id, id, "correlation id mismatch");
        assert_eq!(frame.command(), Some(Command::Response));
        assert_eq!(Status::parse(&frame.body), Some(status));
    }

    /// Log in and assert success.
    pub async fn login(&mut self, id: u32, token: &str) {
        self.send(id, Command::Login, token).await;
        self.expect_response(id, Status::Ok).await;
    }

    /// Query the energy balance.
    pub async fn energy(&mut self, id: u32) -> u32 {
        self.send(id, Command::GetEnergy, "").await;
        let frame = self.recv().await;
        assert_eq!(frame.id, id);
        assert_eq!(frame.command(), Some(Command::GetEnergy));
        frame.body.parse().expect("numeric balance")
    }
}
