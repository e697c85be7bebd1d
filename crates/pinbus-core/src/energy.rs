//! Energy quota ledger.
//!
//! Every account owns one non-negative energy balance. Widget creation
//! debits the widget type's price before the widget is persisted; widget
//! and dashboard deletion credit the prices back, so deleting a dashboard
//! restores the balance that existed before any of its widgets were
//! created.
//!
//! # Concurrency
//!
//! Balances live behind one mutex per account, so a debit and a concurrent
//! credit (or two concurrent debits) against the same account are strictly
//! serialized, while unrelated accounts never contend. Critical sections
//! are plain integer read-modify-write; no caller-supplied code runs under
//! the lock and no lock is held across an await point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;

use crate::model::{AccountId, WidgetType};

/// Initial balance granted to an account on first contact.
///
/// Overridable only through [`EnergyLedger::with_initial_balance`], which
/// test harnesses use to start accounts at a non-default value.
pub const DEFAULT_INITIAL_ENERGY: u32 = 2000;

/// Errors from ledger operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnergyError {
    /// A debit would drive the balance negative.
    ///
    /// The operation had no effect; the balance is unchanged.
    #[error("insufficient energy: required {required}, available {available}")]
    InsufficientBalance {
        /// Amount the operation tried to debit.
        required: u32,
        /// Balance at the time of the attempt.
        available: u32,
    },
}

/// Fixed energy price per widget type.
///
/// The defaults are configuration constants, not protocol; deployments
/// override individual entries via the server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTable {
    prices: HashMap<WidgetType, u32>,
}

impl Default for PriceTable {
    fn default() -> Self {
        let prices = [
            (WidgetType::Button, 200),
            (WidgetType::Slider, 200),
            (WidgetType::Led, 100),
            (WidgetType::Gauge, 300),
            (WidgetType::Lcd, 400),
            (WidgetType::Terminal, 500),
            (WidgetType::Timer, 200),
            (WidgetType::Rtc, 100),
        ]
        .into_iter()
        .collect();
        Self { prices }
    }
}

impl PriceTable {
    /// Build a table from the defaults with per-type overrides applied.
    #[must_use]
    pub fn with_overrides(overrides: &HashMap<WidgetType, u32>) -> Self {
        let mut table = Self::default();
        for (kind, price) in overrides {
            table.prices.insert(*kind, *price);
        }
        table
    }

    /// The creation price of a widget type.
    #[must_use]
    pub fn price(&self, kind: WidgetType) -> u32 {
        self.prices.get(&kind).copied().unwrap_or(0)
    }
}

/// Per-account energy ledger.
///
/// Shared process-wide; lives for the process lifetime alongside the
/// session directory.
#[derive(Debug)]
pub struct EnergyLedger {
    prices: PriceTable,
    initial: u32,
    balances: RwLock<HashMap<AccountId, Arc<Mutex<u32>>>>,
}

impl EnergyLedger {
    /// Create a ledger with the default initial balance.
    #[must_use]
    pub fn new(prices: PriceTable) -> Self {
        Self::with_initial_balance(prices, DEFAULT_INITIAL_ENERGY)
    }

    /// Create a ledger that grants `initial` energy to new accounts.
    #[must_use]
    pub fn with_initial_balance(prices: PriceTable, initial: u32) -> Self {
        Self {
            prices,
            initial,
            balances: RwLock::new(HashMap::new()),
        }
    }

    /// The creation price of a widget type.
    #[must_use]
    pub fn price(&self, kind: WidgetType) -> u32 {
        self.prices.price(kind)
    }

    /// Sum of prices over an iterator of widget types.
    pub fn price_sum(&self, kinds: impl IntoIterator<Item = WidgetType>) -> u32 {
        kinds.into_iter().map(|k| self.price(k)).sum()
    }

    /// Atomically subtract `amount`, rejecting underflow with no effect.
    ///
    /// Returns the new balance on success.
    ///
    /// # Errors
    ///
    /// Returns [`EnergyError::InsufficientBalance`] if the account holds
    /// less than `amount`; the balance is left untouched.
    pub fn debit(&self, account: &AccountId, amount: u32) -> Result<u32, EnergyError> {
        let cell = self.cell(account);
        let mut balance = cell.lock().expect("lock poisoned");
        match balance.checked_sub(amount) {
            Some(rest) => {
                *balance = rest;
                Ok(rest)
            }
            None => Err(EnergyError::InsufficientBalance {
                required: amount,
                available: *balance,
            }),
        }
    }

    /// Add `amount` to the account's balance, returning the new balance.
    ///
    /// Saturates at `u32::MAX`; no upper bound is specified and credits
    /// must always succeed.
    pub fn credit(&self, account: &AccountId, amount: u32) -> u32 {
        let cell = self.cell(account);
        let mut balance = cell.lock().expect("lock poisoned");
        *balance = balance.saturating_add(amount);
        *balance
    }

    /// The account's current balance.
    #[must_use]
    pub fn balance(&self, account: &AccountId) -> u32 {
        *self.cell(account).lock().expect("lock poisoned")
    }

    /// Fetch the account's balance cell, seeding it on first contact.
    fn cell(&self, account: &AccountId) -> Arc<Mutex<u32>> {
        if let Some(cell) = self
            .balances
            .read()
            .expect("lock poisoned")
            .get(account)
        {
            return Arc::clone(cell);
        }
        let mut balances = self.balances.write().expect("lock poisoned");
        Arc::clone(
            balances
                .entry(account.clone())
                .or_insert_with(|| Arc::new(Mutex::new(self.initial))),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn ledger() -> EnergyLedger {
        EnergyLedger::new(PriceTable::default())
    }

    #[test]
    fn fresh_account_starts_at_default() {
        let ledger = ledger();
        assert_eq!(ledger.balance(&AccountId::new("a")), DEFAULT_INITIAL_ENERGY);
    }

    #[test]
    fn initial_balance_is_injectable() {
        let ledger = EnergyLedger::with_initial_balance(PriceTable::default(), 4100);
        assert_eq!(ledger.balance(&AccountId::new("a")), 4100);
    }

    #[test]
    fn debit_and_credit_round_trip() {
        let ledger = ledger();
        let account = AccountId::new("a");
        assert_eq!(ledger.debit(&account, 300), Ok(1700));
        assert_eq!(ledger.credit(&account, 300), 2000);
    }

    #[test]
    fn underflowing_debit_is_rejected_without_effect() {
        let ledger = ledger();
        let account = AccountId::new("a");
        ledger.debit(&account, 1900).unwrap();
        let err = ledger.debit(&account, 200).unwrap_err();
        assert_eq!(
            err,
            EnergyError::InsufficientBalance {
                required: 200,
                available: 100,
            }
        );
        assert_eq!(ledger.balance(&account), 100);
    }

    #[test]
    fn accounts_do_not_share_balances() {
        let ledger = ledger();
        ledger.debit(&AccountId::new("a"), 500).unwrap();
        assert_eq!(ledger.balance(&AccountId::new("b")), DEFAULT_INITIAL_ENERGY);
    }

    #[test]
    fn default_prices_match_test_literals() {
        let prices = PriceTable::default();
        assert_eq!(prices.price(WidgetType::Button), 200);
        assert_eq!(prices.price(WidgetType::Lcd), 400);
    }

    #[test]
    fn overrides_replace_single_entries() {
        let overrides = [(WidgetType::Button, 180)].into_iter().collect();
        let prices = PriceTable::with_overrides(&overrides);
        assert_eq!(prices.price(WidgetType::Button), 180);
        assert_eq!(prices.price(WidgetType::Lcd), 400);
    }

    /// Concurrent debit/credit storm against one account must match the
    /// sequential oracle: no lost updates.
    #[test]
    fn concurrent_mutations_match_sequential_oracle() {
        let ledger = Arc::new(EnergyLedger::with_initial_balance(
            PriceTable::default(),
            100_000,
        ));
        let account = AccountId::new("stress");
        // Touch once so all threads race on the same cell.
        let _ = ledger.balance(&account);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let ledger = Arc::clone(&ledger);
            let account = account.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    ledger.debit(&account, 3).unwrap();
                    ledger.credit(&account, 2);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Oracle: 4 threads x 1000 iterations x net -1.
        assert_eq!(ledger.balance(&account), 100_000 - 4 * 1000);
    }

    #[test]
    fn credit_saturates_instead_of_overflowing() {
        let ledger = EnergyLedger::with_initial_balance(PriceTable::default(), u32::MAX - 1);
        let account = AccountId::new("a");
        assert_eq!(ledger.credit(&account, 10), u32::MAX);
    }
}
