//! Wire protocol: framing and text messages.
//!
//! The protocol stack, bottom up:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │    Commands / Responses (message)       │  <id> <command> [<body>]
//! ├─────────────────────────────────────────┤
//! │        Framing (framing)                │  Length-prefixed
//! ├─────────────────────────────────────────┤
//! │            TCP transport                │
//! └─────────────────────────────────────────┘
//! ```
//!
//! - [`error`]: framing error types ([`ProtocolError`], size limits)
//! - [`framing`]: length-prefixed [`FrameCodec`] with the pre-login limit
//! - [`message`]: [`Frame`] parser/builders, [`Command`] and [`Status`]
//!   vocabularies

pub mod error;
pub mod framing;
pub mod message;

pub use error::{ProtocolError, ProtocolResult, MAX_FRAME_SIZE, MAX_LOGIN_FRAME_SIZE};
pub use framing::FrameCodec;
pub use message::{Command, Frame, Status, SERVER_PUSH_ID};
