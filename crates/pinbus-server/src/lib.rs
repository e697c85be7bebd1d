//! pinbus-server - bidirectional IoT relay daemon library.
//!
//! The relay couples physical devices with the operator applications that
//! watch and steer them. Both sides connect over TCP, authenticate with an
//! opaque token, and exchange length-prefixed text frames; the server fans
//! hardware frames out to every application of the account and application
//! frames back to every device, verbatim and in per-sender order.
//!
//! # Modules
//!
//! - [`protocol`]: wire framing and message grammar
//! - [`session`]: the live-connection directory and per-account session
//!   state
//! - [`handshake`]: token login and promotion to an authenticated session
//! - [`routing`]: the authenticated dispatch table (relay, dashboard
//!   mutations, energy quota)
//! - [`storage`]: profile persistence behind a narrow trait
//! - [`registry`]: external collaborator interfaces (identity, receipts,
//!   notifications)
//! - [`server`]: dual-listener accept loop and per-connection tasks

pub mod handshake;
pub mod protocol;
pub mod registry;
pub mod routing;
pub mod server;
pub mod session;
pub mod storage;

pub use handshake::{HandshakeProcessor, LoginOutcome, Session};
pub use registry::{
    AcceptAllReceipts, DeviceEvent, IdentityResolver, NoopNotifier, NotificationTrigger,
    ReceiptValidator, TokenIdentity, TokenRegistry,
};
pub use routing::Router;
pub use server::RelayServer;
pub use session::{ConnectionClass, ConnectionHandle, ConnectionId, SessionDirectory};
pub use storage::{InMemoryStorage, Storage, StorageError};
