//! Profile storage behind a narrow trait.
//!
//! Durable persistence is an external collaborator; the routing engine
//! only needs create/delete for dashboards and widgets plus an existence
//! probe. Deletions return the removed object so the caller can compute
//! refunds from what was actually stored, not from what the client
//! claimed.

use std::collections::HashMap;
use std::sync::RwLock;

use pinbus_core::{AccountId, DashId, Dashboard, Widget, WidgetId};
use thiserror::Error;

/// Storage failures.
///
/// Not-found and duplicate variants are ordinary per-request outcomes; a
/// `Backend` failure means the collaborator itself broke and the caller
/// must compensate any ledger debit already applied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("dashboard {0} not found")]
    DashNotFound(DashId),

    #[error("dashboard {0} already exists")]
    DashExists(DashId),

    #[error("widget {widget} not found in dashboard {dash}")]
    WidgetNotFound { dash: DashId, widget: WidgetId },

    #[error("widget {widget} already exists in dashboard {dash}")]
    WidgetExists { dash: DashId, widget: WidgetId },

    /// The storage backend itself failed.
    #[error("storage backend error: {reason}")]
    Backend { reason: String },
}

/// Narrow persistence interface consumed by the routing engine.
pub trait Storage: Send + Sync {
    /// Persist a new dashboard.
    ///
    /// # Errors
    ///
    /// [`StorageError::DashExists`] if the id is taken.
    fn create_dash(&self, account: &AccountId, dash: Dashboard) -> Result<(), StorageError>;

    /// Remove a dashboard, returning it with all contained widgets.
    ///
    /// # Errors
    ///
    /// [`StorageError::DashNotFound`] if absent.
    fn delete_dash(&self, account: &AccountId, dash: DashId) -> Result<Dashboard, StorageError>;

    /// Persist a new widget inside a dashboard.
    ///
    /// # Errors
    ///
    /// [`StorageError::DashNotFound`] or [`StorageError::WidgetExists`].
    fn create_widget(
        &self,
        account: &AccountId,
        dash: DashId,
        widget: Widget,
    ) -> Result<(), StorageError>;

    /// Remove a widget, returning it.
    ///
    /// # Errors
    ///
    /// [`StorageError::DashNotFound`] or [`StorageError::WidgetNotFound`].
    fn delete_widget(
        &self,
        account: &AccountId,
        dash: DashId,
        widget: WidgetId,
    ) -> Result<Widget, StorageError>;

    /// Whether the dashboard exists for this account.
    fn dash_exists(&self, account: &AccountId, dash: DashId) -> bool;
}

/// Process-local profile store.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    profiles: RwLock<HashMap<AccountId, HashMap<DashId, Dashboard>>>,
}

impl InMemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for InMemoryStorage {
    fn create_dash(&self, account: &AccountId, dash: Dashboard) -> Result<(), StorageError> {
        let mut profiles = self.profiles.write().expect("lock poisoned");
        let dashes = profiles.entry(account.clone()).or_default();
        if dashes.contains_key(&dash.id) {
            return Err(StorageError::DashExists(dash.id));
        }
        dashes.insert(dash.id, dash);
        Ok(())
    }

    fn delete_dash(&self, account: &AccountId, dash: DashId) -> Result<Dashboard, StorageError> {
        let mut profiles = self.profiles.write().expect("lock poisoned");
        profiles
            .get_mut(account)
            .and_then(|dashes| dashes.remove(&dash))
            .ok_or(StorageError::DashNotFound(dash))
    }

    fn create_widget(
        &self,
        account: &AccountId,
        dash: DashId,
        widget: Widget,
    ) -> Result<(), StorageError> {
        let mut profiles = self.profiles.write().expect("lock poisoned");
        let board = profiles
            .get_mut(account)
            .and_then(|dashes| dashes.get_mut(&dash))
            .ok_or(StorageError::DashNotFound(dash))?;
        if board.has_widget(widget.id) {
            return Err(StorageError::WidgetExists {
                dash,
                widget: widget.id,
            });
        }
        board.widgets.push(widget);
        Ok(())
    }

    fn delete_widget(
        &self,
        account: &AccountId,
        dash: DashId,
        widget: WidgetId,
    ) -> Result<Widget, StorageError> {
        let mut profiles = self.profiles.write().expect("lock poisoned");
        let board = profiles
            .get_mut(account)
            .and_then(|dashes| dashes.get_mut(&dash))
            .ok_or(StorageError::DashNotFound(dash))?;
        board
            .remove_widget(widget)
            .ok_or(StorageError::WidgetNotFound { dash, widget })
    }

    fn dash_exists(&self, account: &AccountId, dash: DashId) -> bool {
        self.profiles
            .read()
            .expect("lock poisoned")
            .get(account)
            .is_some_and(|dashes| dashes.contains_key(&dash))
    }
}
