//! Dual-listener TCP relay server.
//!
//! Two listeners, one accept loop: hardware and application clients speak
//! the same framed protocol on different ports, and a connection's class
//! is determined solely by which listener accepted it, never by client
//! assertion. A semaphore caps concurrent connections across both
//! listeners.
//!
//! Each accepted socket runs in its own task around a single [`Framed`]
//! transport. The task owns both directions: inbound frames are parsed and
//! dispatched, and frames other connections fan out arrive on the
//! connection's bounded queue and are written out by the same loop. Login
//! frames are capped small; the decoder is widened only after the
//! handshake succeeds.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use pinbus_core::{EnergyLedger, ServerConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::handshake::{HandshakeProcessor, LoginOutcome, Session};
use crate::protocol::{Frame, FrameCodec, ProtocolError, ProtocolResult, Status};
use crate::registry::{DeviceEvent, IdentityResolver, NotificationTrigger, ReceiptValidator};
use crate::routing::Router;
use crate::session::{ConnectionClass, ConnectionId, SessionDirectory};
use crate::storage::Storage;

/// State shared by every connection task.
struct Shared {
    handshake: HandshakeProcessor,
    router: Router,
    directory: Arc<SessionDirectory>,
    notifier: Arc<dyn NotificationTrigger>,
    outbound_queue_depth: usize,
}

/// The relay server: both listeners plus the shared dispatch state.
pub struct RelayServer {
    hardware_listener: TcpListener,
    app_listener: TcpListener,
    hardware_addr: SocketAddr,
    app_addr: SocketAddr,
    connection_sem: Arc<Semaphore>,
    shared: Arc<Shared>,
}

impl RelayServer {
    /// Bind both listeners and assemble the dispatch state.
    ///
    /// # Errors
    ///
    /// Returns an error if either address cannot be bound.
    pub async fn bind(
        config: &ServerConfig,
        resolver: Arc<dyn IdentityResolver>,
        storage: Arc<dyn Storage>,
        receipts: Arc<dyn ReceiptValidator>,
        notifier: Arc<dyn NotificationTrigger>,
    ) -> ProtocolResult<Self> {
        let hardware_listener = TcpListener::bind(config.hardware_addr).await.map_err(|e| {
            ProtocolError::Io(io::Error::new(
                e.kind(),
                format!("failed to bind hardware listener to {}: {e}", config.hardware_addr),
            ))
        })?;
        let app_listener = TcpListener::bind(config.app_addr).await.map_err(|e| {
            ProtocolError::Io(io::Error::new(
                e.kind(),
                format!("failed to bind app listener to {}: {e}", config.app_addr),
            ))
        })?;
        let hardware_addr = hardware_listener.local_addr()?;
        let app_addr = app_listener.local_addr()?;

        let directory = Arc::new(SessionDirectory::new());
        let ledger = Arc::new(EnergyLedger::with_initial_balance(
            config.price_table(),
            config.initial_energy,
        ));

        info!(
            hardware = %hardware_addr,
            app = %app_addr,
            max_connections = config.max_connections,
            "relay listeners bound"
        );

        Ok(Self {
            hardware_listener,
            app_listener,
            hardware_addr,
            app_addr,
            connection_sem: Arc::new(Semaphore::new(config.max_connections)),
            shared: Arc::new(Shared {
                handshake: HandshakeProcessor::new(resolver, Arc::clone(&directory)),
                router: Router::new(ledger, storage, receipts),
                directory,
                notifier,
                outbound_queue_depth: config.outbound_queue_depth,
            }),
        })
    }

    /// Bound address of the hardware listener.
    #[must_use]
    pub const fn hardware_addr(&self) -> SocketAddr {
        self.hardware_addr
    }

    /// Bound address of the application listener.
    #[must_use]
    pub const fn app_addr(&self) -> SocketAddr {
        self.app_addr
    }

    /// Accept connections forever, spawning one task per socket.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting fails fatally; per-connection errors
    /// only terminate that connection's task.
    pub async fn run(self) -> ProtocolResult<()> {
        loop {
            let (stream, class, permit) = self.accept().await?;
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                serve_connection(shared, stream, class, permit).await;
            });
        }
    }

    /// Accept the next connection from either listener.
    ///
    /// Blocks while the connection limit is reached; the permit is held
    /// for the connection's lifetime.
    async fn accept(&self) -> ProtocolResult<(TcpStream, ConnectionClass, OwnedSemaphorePermit)> {
        let permit = self
            .connection_sem
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ProtocolError::Io(io::Error::other("connection semaphore closed")))?;

        // The accepting listener fixes the connection's class.
        let (stream, class) = tokio::select! {
            result = self.hardware_listener.accept() => {
                let (stream, _addr) = result?;
                (stream, ConnectionClass::Hardware)
            }
            result = self.app_listener.accept() => {
                let (stream, _addr) = result?;
                (stream, ConnectionClass::Application)
            }
        };

        Ok((stream, class, permit))
    }
}

/// Drive one connection until it closes.
async fn serve_connection(
    shared: Arc<Shared>,
    stream: TcpStream,
    class: ConnectionClass,
    _permit: OwnedSemaphorePermit,
) {
    let connection = ConnectionId::next();
    debug!(%class, %connection, "connection accepted");

    let mut framed = Framed::new(stream, FrameCodec::new());
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Bytes>(shared.outbound_queue_depth);
    let mut session: Option<Session> = None;

    loop {
        tokio::select! {
            inbound = framed.next() => {
                let raw = match inbound {
                    Some(Ok(raw)) => raw,
                    Some(Err(err)) => {
                        debug!(%class, %connection, %err, "closing connection on protocol error");
                        break;
                    }
                    None => break,
                };
                let frame = match Frame::parse(&raw) {
                    Ok(frame) => frame,
                    Err(err) => {
                        debug!(%class, %connection, %err, "closing connection on unparseable frame");
                        break;
                    }
                };

                let reply = match &session {
                    Some(active) => shared.router.dispatch(active, &frame, &raw),
                    None => match shared.handshake.process(&frame, class, connection, &outbound_tx) {
                        LoginOutcome::Rejected(status) => Some(Frame::response(frame.id, status)),
                        LoginOutcome::Authenticated { session: opened, replay } => {
                            // Login frames are small; everything after may
                            // carry full payloads.
                            framed.codec_mut().upgrade_to_full_frame_size();
                            if framed.send(Frame::response(frame.id, Status::Ok).encode()).await.is_err() {
                                break;
                            }
                            if let Some(cached) = replay {
                                if framed.send(cached).await.is_err() {
                                    break;
                                }
                            }
                            if class == ConnectionClass::Hardware {
                                shared.notifier.fire(DeviceEvent::Online {
                                    account: opened.account.clone(),
                                });
                            }
                            session = Some(opened);
                            None
                        }
                    },
                };
                if let Some(reply) = reply {
                    if framed.send(reply.encode()).await.is_err() {
                        break;
                    }
                }
            }
            fanned = outbound_rx.recv() => {
                // The sender half lives in the directory; `None` means the
                // queue was torn down.
                let Some(frame) = fanned else { break };
                if framed.send(frame).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(closed) = session {
        shared
            .directory
            .unregister(&closed.account, closed.class, closed.connection);
        if closed.class == ConnectionClass::Hardware {
            shared.notifier.fire(DeviceEvent::Offline {
                account: closed.account,
            });
        }
        debug!(%class, %connection, "connection closed");
    } else {
        debug!(%class, %connection, "unauthenticated connection closed");
    }

    if framed.close().await.is_err() {
        warn!(%connection, "error closing transport");
    }
}
