//! Session directory: the shared registry of live connections per account.
//!
//! The directory maps an account onto its hardware and application
//! connections plus the account's runtime session state (active dashboard
//! pointer and the cached pin-mode frame replayed at hardware login).
//!
//! Entries are created on first touch and live for the process lifetime;
//! the connection lists inside them empty out on disconnect. Each entry
//! carries its own locks, so two unrelated accounts never contend; no lock
//! is held across an await point — delivery goes through each connection's
//! bounded outbound queue via `try_send`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use bytes::Bytes;
use pinbus_core::{AccountId, DashId};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Class of a connection, determined solely by the accepting listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionClass {
    /// A physical device.
    Hardware,
    /// An operator-facing client.
    Application,
}

impl ConnectionClass {
    /// The other side of the relay.
    #[must_use]
    pub const fn peer(self) -> Self {
        match self {
            Self::Hardware => Self::Application,
            Self::Application => Self::Hardware,
        }
    }
}

impl fmt::Display for ConnectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardware => write!(f, "hardware"),
            Self::Application => write!(f, "app"),
        }
    }
}

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next connection id.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handle to a live connection's outbound queue.
///
/// Cloneable; the queue sender is the only channel the directory (and thus
/// other connections) has to a socket.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Connection identity, used for idempotent unregistration.
    pub id: ConnectionId,
    /// Class of the connection.
    pub class: ConnectionClass,
    outbound: mpsc::Sender<Bytes>,
}

impl ConnectionHandle {
    /// Create a handle over a connection's outbound queue sender.
    #[must_use]
    pub fn new(id: ConnectionId, class: ConnectionClass, outbound: mpsc::Sender<Bytes>) -> Self {
        Self {
            id,
            class,
            outbound,
        }
    }

    /// Queue a frame for delivery, never blocking.
    ///
    /// A full queue means this peer is too slow to keep up; its frame is
    /// dropped so delivery to other connections of the account is not
    /// stalled. Returns `true` if the frame was queued.
    pub fn push(&self, frame: Bytes) -> bool {
        match self.outbound.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(connection = %self.id, "outbound queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Per-account directory entry.
///
/// Holds the live connection lists for both classes and the account's
/// session state. All locks are leaf locks guarding plain data.
#[derive(Debug, Default)]
pub struct AccountEntry {
    hardware: Mutex<Vec<ConnectionHandle>>,
    apps: Mutex<Vec<ConnectionHandle>>,
    active_dash: Mutex<Option<DashId>>,
    pin_mode: Mutex<Option<Bytes>>,
}

impl AccountEntry {
    fn list(&self, class: ConnectionClass) -> &Mutex<Vec<ConnectionHandle>> {
        match class {
            ConnectionClass::Hardware => &self.hardware,
            ConnectionClass::Application => &self.apps,
        }
    }

    /// Add a connection to its class list.
    pub fn register(&self, handle: ConnectionHandle) {
        self.list(handle.class)
            .lock()
            .expect("lock poisoned")
            .push(handle);
    }

    /// Remove a connection; a no-op if it was already removed.
    pub fn unregister(&self, class: ConnectionClass, id: ConnectionId) {
        self.list(class)
            .lock()
            .expect("lock poisoned")
            .retain(|handle| handle.id != id);
    }

    /// Number of live connections of a class.
    #[must_use]
    pub fn connection_count(&self, class: ConnectionClass) -> usize {
        self.list(class).lock().expect("lock poisoned").len()
    }

    /// Queue `frame` on every connection of `class`, returning how many
    /// queues accepted it.
    ///
    /// Handles are snapshotted out of the lock first: a fan-out racing an
    /// unregister either includes or excludes that connection, and a
    /// closed queue is simply skipped.
    pub fn fan_out(&self, class: ConnectionClass, frame: &Bytes) -> usize {
        let handles: Vec<ConnectionHandle> =
            self.list(class).lock().expect("lock poisoned").clone();
        handles
            .iter()
            .filter(|handle| handle.push(frame.clone()))
            .count()
    }

    /// The account's active dashboard, if any.
    #[must_use]
    pub fn active_dash(&self) -> Option<DashId> {
        *self.active_dash.lock().expect("lock poisoned")
    }

    /// Set the active dashboard.
    pub fn set_active_dash(&self, dash: DashId) {
        *self.active_dash.lock().expect("lock poisoned") = Some(dash);
    }

    /// Clear the active dashboard and any cached pin-mode frame.
    pub fn deactivate(&self) {
        *self.active_dash.lock().expect("lock poisoned") = None;
        *self.pin_mode.lock().expect("lock poisoned") = None;
    }

    /// Drop session state referring to a deleted dashboard.
    pub fn forget_dash(&self, dash: DashId) {
        if self.active_dash() == Some(dash) {
            self.deactivate();
        }
    }

    /// Cache the last pin-mode frame for replay at hardware login.
    pub fn cache_pin_mode(&self, frame: Bytes) {
        *self.pin_mode.lock().expect("lock poisoned") = Some(frame);
    }

    /// The cached pin-mode frame, if any.
    #[must_use]
    pub fn pin_mode(&self) -> Option<Bytes> {
        self.pin_mode.lock().expect("lock poisoned").clone()
    }
}

/// Concurrent registry mapping accounts onto their live connections.
///
/// Process-wide singleton shared by every connection task.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    accounts: RwLock<HashMap<AccountId, Arc<AccountEntry>>>,
}

impl SessionDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the account's entry, creating it on first touch.
    pub fn entry(&self, account: &AccountId) -> Arc<AccountEntry> {
        if let Some(entry) = self.accounts.read().expect("lock poisoned").get(account) {
            return Arc::clone(entry);
        }
        let mut accounts = self.accounts.write().expect("lock poisoned");
        Arc::clone(accounts.entry(account.clone()).or_default())
    }

    /// Fetch the account's entry without creating it.
    #[must_use]
    pub fn get(&self, account: &AccountId) -> Option<Arc<AccountEntry>> {
        self.accounts
            .read()
            .expect("lock poisoned")
            .get(account)
            .map(Arc::clone)
    }

    /// Register a connection under (account, class).
    pub fn register(&self, account: &AccountId, handle: ConnectionHandle) -> Arc<AccountEntry> {
        let entry = self.entry(account);
        debug!(%account, class = %handle.class, connection = %handle.id, "session registered");
        entry.register(handle);
        entry
    }

    /// Unregister a connection; idempotent.
    pub fn unregister(&self, account: &AccountId, class: ConnectionClass, id: ConnectionId) {
        if let Some(entry) = self.get(account) {
            entry.unregister(class, id);
            debug!(%account, %class, connection = %id, "session unregistered");
        }
    }

    /// Queue `frame` on every connection of (account, class).
    ///
    /// An unknown account is an empty set, not an error; returns the
    /// number of queues that accepted the frame.
    pub fn fan_out(&self, account: &AccountId, class: ConnectionClass, frame: &Bytes) -> usize {
        self.get(account)
            .map_or(0, |entry| entry.fan_out(class, frame))
    }
}
