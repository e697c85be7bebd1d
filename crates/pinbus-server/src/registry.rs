//! External collaborator interfaces.
//!
//! Identity, receipt validation, and notification delivery are external
//! concerns; the core consumes them through these narrow traits. The
//! in-memory implementations back the standalone daemon and the test
//! suites.

use std::collections::HashMap;
use std::sync::RwLock;

use pinbus_core::{AccountId, DashId};
use tracing::debug;

/// Identity a token resolves to: one account and one dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub account: AccountId,
    pub dash: DashId,
}

/// Maps an opaque token onto (account, dashboard).
///
/// Token issuance and revocation are external; a token resolves to at most
/// one identity at lookup time.
pub trait IdentityResolver: Send + Sync {
    /// Resolve a token, or `None` if it matches no account.
    fn resolve(&self, token: &str) -> Option<TokenIdentity>;
}

/// In-memory token table.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    tokens: RwLock<HashMap<String, TokenIdentity>>,
}

impl TokenRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a token to (account, dashboard).
    pub fn insert(&self, token: impl Into<String>, account: AccountId, dash: DashId) {
        self.tokens
            .write()
            .expect("lock poisoned")
            .insert(token.into(), TokenIdentity { account, dash });
    }
}

impl IdentityResolver for TokenRegistry {
    fn resolve(&self, token: &str) -> Option<TokenIdentity> {
        self.tokens
            .read()
            .expect("lock poisoned")
            .get(token)
            .cloned()
    }
}

/// Validates `addEnergy` purchase receipts.
///
/// Real receipt validation (store queries, signature checks) lives
/// outside the relay.
pub trait ReceiptValidator: Send + Sync {
    /// Returns `true` if the receipt is valid and may be credited.
    fn validate(&self, receipt: &str) -> bool;
}

/// Accepts every non-empty receipt.
///
/// The stand-in validator for development and tests; an empty receipt is
/// still rejected so the command shape stays enforced.
#[derive(Debug, Default)]
pub struct AcceptAllReceipts;

impl ReceiptValidator for AcceptAllReceipts {
    fn validate(&self, receipt: &str) -> bool {
        !receipt.is_empty()
    }
}

/// Events the routing engine raises for the notification pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A hardware connection authenticated.
    Online { account: AccountId },
    /// A hardware connection went away.
    Offline { account: AccountId },
}

/// Fire-and-forget notification hook.
///
/// Delivery content and transport are out of scope; implementations must
/// not block.
pub trait NotificationTrigger: Send + Sync {
    /// Fire an event. Failures are the implementation's problem.
    fn fire(&self, event: DeviceEvent);
}

/// Logs events and otherwise does nothing.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl NotificationTrigger for NoopNotifier {
    fn fire(&self, event: DeviceEvent) {
        debug!(?event, "notification event");
    }
}
