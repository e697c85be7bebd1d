//! Server configuration.
//!
//! Loaded from a TOML file by the daemon binary; every field has a default
//! so an empty file (or no file at all) yields a runnable development
//! configuration. Token seeds exist because identity is an external
//! concern: the in-memory resolver has to be fed from somewhere when the
//! daemon runs standalone.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::energy::{PriceTable, DEFAULT_INITIAL_ENERGY};
use crate::model::WidgetType;

/// Default listen address for hardware connections.
const DEFAULT_HARDWARE_ADDR: &str = "127.0.0.1:8442";

/// Default listen address for application connections.
const DEFAULT_APP_ADDR: &str = "127.0.0.1:8443";

/// Maximum concurrent connections across both listeners.
const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Default depth of each connection's outbound frame queue.
const DEFAULT_OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Configuration load failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was being read.
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Path that was being parsed.
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// A token seed mapping an opaque token onto (account, dashboard).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSeed {
    /// Opaque token presented at login.
    pub token: String,
    /// Account the token belongs to.
    pub account: String,
    /// Dashboard the token is bound to.
    pub dash_id: i64,
}

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address for hardware (device) connections.
    pub hardware_addr: SocketAddr,

    /// Listen address for application (operator) connections.
    pub app_addr: SocketAddr,

    /// Maximum concurrent connections across both listeners.
    pub max_connections: usize,

    /// Bounded per-connection outbound queue depth.
    ///
    /// A connection whose queue is full drops its own frames rather than
    /// stalling delivery to other connections of the same account.
    pub outbound_queue_depth: usize,

    /// Energy granted to an account on first contact.
    pub initial_energy: u32,

    /// Widget price overrides, merged over the built-in defaults.
    pub prices: HashMap<WidgetType, u32>,

    /// Token seeds for the in-memory identity resolver.
    pub tokens: Vec<TokenSeed>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hardware_addr: DEFAULT_HARDWARE_ADDR.parse().expect("default addr parses"),
            app_addr: DEFAULT_APP_ADDR.parse().expect("default addr parses"),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            outbound_queue_depth: DEFAULT_OUTBOUND_QUEUE_DEPTH,
            initial_energy: DEFAULT_INITIAL_ENERGY,
            prices: HashMap::new(),
            tokens: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Set both listen addresses.
    #[must_use]
    pub const fn with_addrs(mut self, hardware: SocketAddr, app: SocketAddr) -> Self {
        self.hardware_addr = hardware;
        self.app_addr = app;
        self
    }

    /// Set the connection cap.
    #[must_use]
    pub const fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the initial energy grant.
    #[must_use]
    pub const fn with_initial_energy(mut self, initial: u32) -> Self {
        self.initial_energy = initial;
        self
    }

    /// The effective price table: defaults overlaid with overrides.
    #[must_use]
    pub fn price_table(&self) -> PriceTable {
        PriceTable::with_overrides(&self.prices)
    }
}
