//! Login handshake.
//!
//! Every connection starts unauthenticated and must present
//! `login <token>` before anything else. The processor resolves the token,
//! registers the connection in the session directory, and produces the
//! [`Session`] that selects the authenticated dispatch table for the rest
//! of the socket's lifetime — the explicit state transition that replaces
//! handler-chain surgery.
//!
//! Rejections leave the connection in the unauthenticated state: a client
//! may retry with another login frame on the same socket.

use std::sync::Arc;

use bytes::Bytes;
use pinbus_core::{AccountId, DashId};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::protocol::{Command, Frame, Status};
use crate::registry::IdentityResolver;
use crate::session::{AccountEntry, ConnectionClass, ConnectionHandle, ConnectionId, SessionDirectory};

/// An authenticated connection's binding.
///
/// Immutable for the socket's lifetime; a second login attempt is answered
/// with `ILLEGAL_COMMAND`.
#[derive(Debug, Clone)]
pub struct Session {
    /// Account the token resolved to.
    pub account: AccountId,
    /// Dashboard the token is bound to.
    pub dash: DashId,
    /// Class of the connection (from the accepting listener).
    pub class: ConnectionClass,
    /// Connection identity for directory bookkeeping.
    pub connection: ConnectionId,
    /// The account's directory entry.
    pub entry: Arc<AccountEntry>,
}

/// Result of processing a frame on an unauthenticated connection.
#[derive(Debug)]
pub enum LoginOutcome {
    /// Respond with this status and stay unauthenticated.
    Rejected(Status),
    /// Respond `OK`; the connection is now authenticated.
    Authenticated {
        session: Session,
        /// Cached pin-mode frame to push unsolicited after the `OK`.
        replay: Option<Bytes>,
    },
}

/// Consumes the first frame(s) of a socket and promotes it to a session.
pub struct HandshakeProcessor {
    resolver: Arc<dyn IdentityResolver>,
    directory: Arc<SessionDirectory>,
}

impl HandshakeProcessor {
    /// Create a processor over the shared resolver and directory.
    pub fn new(resolver: Arc<dyn IdentityResolver>, directory: Arc<SessionDirectory>) -> Self {
        Self {
            resolver,
            directory,
        }
    }

    /// Process one frame from an unauthenticated connection.
    ///
    /// `outbound` is the connection's bounded queue sender; on success it
    /// becomes the handle other connections fan out through.
    pub fn process(
        &self,
        frame: &Frame,
        class: ConnectionClass,
        connection: ConnectionId,
        outbound: &mpsc::Sender<Bytes>,
    ) -> LoginOutcome {
        if frame.command() != Some(Command::Login) {
            return LoginOutcome::Rejected(Status::NotAuthenticated);
        }

        // The body must be exactly one whitespace-delimited token.
        let mut parts = frame.body.split_whitespace();
        let token = match (parts.next(), parts.next()) {
            (Some(token), None) => token,
            _ => return LoginOutcome::Rejected(Status::IllegalCommand),
        };

        let Some(identity) = self.resolver.resolve(token) else {
            debug!(%class, connection = %connection, "login with invalid token");
            return LoginOutcome::Rejected(Status::InvalidToken);
        };

        let handle = ConnectionHandle::new(connection, class, outbound.clone());
        let entry = self.directory.register(&identity.account, handle);
        info!(account = %identity.account, %class, dash = %identity.dash, "{class} joined");

        // Replay the last pin-mode directive to hardware joining the
        // account's active dashboard.
        let replay = if class == ConnectionClass::Hardware
            && entry.active_dash() == Some(identity.dash)
        {
            entry.pin_mode()
        } else {
            None
        };

        LoginOutcome::Authenticated {
            session: Session {
                account: identity.account,
                dash: identity.dash,
                class,
                connection,
                entry,
            },
            replay,
        }
    }
}
