//! pinbus-core - domain model for the pinbus relay server.
//!
//! This crate holds the I/O-free half of the relay: identifiers, the
//! widget/dashboard data model carried in protocol payload bodies, the
//! per-account energy ledger that gates configuration-mutating commands,
//! and the server configuration.
//!
//! # Modules
//!
//! - [`model`]: identifiers ([`model::AccountId`], [`model::DashId`],
//!   [`model::WidgetId`]) and the serde data model ([`model::Widget`],
//!   [`model::Dashboard`])
//! - [`energy`]: quota ledger ([`energy::EnergyLedger`],
//!   [`energy::PriceTable`])
//! - [`config`]: daemon configuration ([`config::ServerConfig`])

pub mod config;
pub mod energy;
pub mod model;

pub use config::ServerConfig;
pub use energy::{EnergyError, EnergyLedger, PriceTable, DEFAULT_INITIAL_ENERGY};
pub use model::{AccountId, DashId, Dashboard, Widget, WidgetId, WidgetType};
