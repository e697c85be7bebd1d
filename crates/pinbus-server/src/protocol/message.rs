//! Text protocol messages.
//!
//! A frame payload is UTF-8 text of the shape:
//!
//! ```text
//! <correlationId> <command>[ <body>]
//! ```
//!
//! A command's structured payload, if any, follows a single NUL (0x00)
//! byte inside the body, e.g. `createWidget 2\0{"id":7,...}` carries the
//! dash id `2` as a plain argument and the widget JSON after the
//! separator.
//!
//! Correlation ids are client-assigned, starting at 1, and echoed verbatim
//! on every response. Id [`SERVER_PUSH_ID`] (0) is reserved for
//! server-initiated pushes, which correlate to no request.
//!
//! A payload whose id or keyword cannot be extracted is a framing-level
//! corruption and closes the connection; an intact frame with an unknown
//! keyword is answered per-request with `ILLEGAL_COMMAND`.

use std::fmt;

use bytes::Bytes;

use super::error::{ProtocolError, ProtocolResult};

/// Correlation id used for unsolicited server-initiated frames.
pub const SERVER_PUSH_ID: u32 = 0;

/// NUL separator between a command's plain arguments and its structured
/// payload.
pub const BODY_SEPARATOR: char = '\0';

/// Commands understood by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `login <token>` — promote an anonymous socket to a session.
    Login,
    /// `ping` — keep-alive.
    Ping,
    /// `hardware <body>` — pin read/write relay between the two classes.
    Hardware,
    /// `createDash <json>` — create a dashboard (debits contained widgets).
    CreateDash,
    /// `deleteDash <dashId>` — delete a dashboard (refunds its widgets).
    DeleteDash,
    /// `createWidget <dashId>\0<json>` — create a widget (debits its price).
    CreateWidget,
    /// `deleteWidget <dashId> <widgetId>` — delete a widget (refunds it).
    DeleteWidget,
    /// `getEnergy` — query the account balance.
    GetEnergy,
    /// `addEnergy <amount>\0<receipt>` — credit after receipt validation.
    AddEnergy,
    /// `activate <dashId>` — set the account's active dashboard.
    Activate,
    /// `deactivate` — clear the account's active dashboard.
    Deactivate,
    /// `response <STATUS>` — server→client status (never client-sent).
    Response,
}

impl Command {
    /// Parse a command keyword.
    #[must_use]
    pub fn parse(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "login" => Self::Login,
            "ping" => Self::Ping,
            "hardware" => Self::Hardware,
            "createDash" => Self::CreateDash,
            "deleteDash" => Self::DeleteDash,
            "createWidget" => Self::CreateWidget,
            "deleteWidget" => Self::DeleteWidget,
            "getEnergy" => Self::GetEnergy,
            "addEnergy" => Self::AddEnergy,
            "activate" => Self::Activate,
            "deactivate" => Self::Deactivate,
            "response" => Self::Response,
            _ => return None,
        })
    }

    /// The wire keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Ping => "ping",
            Self::Hardware => "hardware",
            Self::CreateDash => "createDash",
            Self::DeleteDash => "deleteDash",
            Self::CreateWidget => "createWidget",
            Self::DeleteWidget => "deleteWidget",
            Self::GetEnergy => "getEnergy",
            Self::AddEnergy => "addEnergy",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Response => "response",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response status codes carried in `response` frame bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Request succeeded.
    Ok,
    /// Login token resolved to no account.
    InvalidToken,
    /// Mutating command rejected by the quota ledger; nothing changed.
    EnergyLimit,
    /// Unknown command or malformed arguments.
    IllegalCommand,
    /// Non-login command on an unauthenticated connection.
    NotAuthenticated,
    /// Command not allowed for this connection class or rejected receipt.
    NotAllowed,
    /// Relay target class has zero connections for this account.
    DeviceNotInNetwork,
    /// App-originated relay with no active dashboard set.
    NoActiveDashboard,
    /// External storage failed; any ledger debit was compensated.
    ServerError,
}

impl Status {
    /// Parse a status body.
    #[must_use]
    pub fn parse(body: &str) -> Option<Self> {
        Some(match body {
            "OK" => Self::Ok,
            "INVALID_TOKEN" => Self::InvalidToken,
            "ENERGY_LIMIT" => Self::EnergyLimit,
            "ILLEGAL_COMMAND" => Self::IllegalCommand,
            "NOT_AUTHENTICATED" => Self::NotAuthenticated,
            "NOT_ALLOWED" => Self::NotAllowed,
            "DEVICE_NOT_IN_NETWORK" => Self::DeviceNotInNetwork,
            "NO_ACTIVE_DASHBOARD" => Self::NoActiveDashboard,
            "SERVER_ERROR" => Self::ServerError,
            _ => return None,
        })
    }

    /// The wire body.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::EnergyLimit => "ENERGY_LIMIT",
            Self::IllegalCommand => "ILLEGAL_COMMAND",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::NotAllowed => "NOT_ALLOWED",
            Self::DeviceNotInNetwork => "DEVICE_NOT_IN_NETWORK",
            Self::NoActiveDashboard => "NO_ACTIVE_DASHBOARD",
            Self::ServerError => "SERVER_ERROR",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed protocol frame.
///
/// The keyword is kept as received so unknown commands can be answered
/// per-request instead of tearing down the connection; [`Frame::command`]
/// resolves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Client-assigned correlation id ([`SERVER_PUSH_ID`] on pushes).
    pub id: u32,
    /// Command keyword as received.
    pub keyword: String,
    /// Everything after the keyword; may contain spaces and NUL.
    pub body: String,
}

impl Frame {
    /// Build a frame for a known command.
    pub fn new(id: u32, command: Command, body: impl Into<String>) -> Self {
        Self {
            id,
            keyword: command.as_str().to_string(),
            body: body.into(),
        }
    }

    /// Build a `response <STATUS>` frame.
    #[must_use]
    pub fn response(id: u32, status: Status) -> Self {
        Self::new(id, Command::Response, status.as_str())
    }

    /// Parse a frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidFrame`] when the payload is not
    /// UTF-8 or the `<id> <command>` head cannot be extracted. These are
    /// connection-fatal.
    pub fn parse(payload: &[u8]) -> ProtocolResult<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| ProtocolError::invalid_frame("payload is not valid UTF-8"))?;

        let (id_part, rest) = text
            .split_once(' ')
            .ok_or_else(|| ProtocolError::invalid_frame("missing command keyword"))?;

        let id: u32 = id_part
            .parse()
            .map_err(|_| ProtocolError::invalid_frame(format!("bad correlation id {id_part:?}")))?;

        let (keyword, body) = match rest.split_once(' ') {
            Some((keyword, body)) => (keyword, body),
            None => (rest, ""),
        };
        if keyword.is_empty() {
            return Err(ProtocolError::invalid_frame("empty command keyword"));
        }

        Ok(Self {
            id,
            keyword: keyword.to_string(),
            body: body.to_string(),
        })
    }

    /// Resolve the keyword to a known command.
    #[must_use]
    pub fn command(&self) -> Option<Command> {
        Command::parse(&self.keyword)
    }

    /// The body split at the NUL separator: plain arguments and the
    /// structured payload, if present.
    #[must_use]
    pub fn split_body(&self) -> (&str, Option<&str>) {
        match self.body.split_once(BODY_SEPARATOR) {
            Some((args, payload)) => (args, Some(payload)),
            None => (self.body.as_str(), None),
        }
    }

    /// Encode to a frame payload.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut text = String::with_capacity(12 + self.keyword.len() + self.body.len());
        text.push_str(&self.id.to_string());
        text.push(' ');
        text.push_str(&self.keyword);
        if !self.body.is_empty() {
            text.push(' ');
            text.push_str(&self.body);
        }
        Bytes::from(text)
    }
}
