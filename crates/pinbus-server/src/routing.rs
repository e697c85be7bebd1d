//! Routing engine for authenticated frames.
//!
//! Dispatch is by command keyword. Three command families:
//!
//! - **Relay** (`hardware`): no storage mutation; frames are fanned out
//!   verbatim to every connection of the other class for the account.
//!   Per-sender ordering is preserved because each sender's frames pass
//!   through its single connection task in arrival order.
//! - **Mutating** (`createDash`, `deleteDash`, `createWidget`,
//!   `deleteWidget`): gated by the energy ledger. Debit happens before
//!   persistence; a storage failure is compensated with a credit before
//!   the failure status is returned, so the balance invariant holds under
//!   failure.
//! - **Quota / session** (`getEnergy`, `addEnergy`, `activate`,
//!   `deactivate`, `ping`).
//!
//! Every failure here is per-request: the offending connection gets a
//! status response and nothing else changes. Only the framing layer below
//! ever closes connections.

use std::sync::Arc;

use bytes::Bytes;
use pinbus_core::{DashId, Dashboard, EnergyLedger, Widget, WidgetId};
use tracing::{debug, trace, warn};

use crate::handshake::Session;
use crate::protocol::{Command, Frame, Status, SERVER_PUSH_ID};
use crate::registry::ReceiptValidator;
use crate::session::ConnectionClass;
use crate::storage::{Storage, StorageError};

/// First body token of a pin-mode directive.
const PIN_MODE_PREFIX: &str = "pm";

/// Routes authenticated frames.
///
/// Shared process-wide; holds the collaborators every connection task
/// dispatches through.
pub struct Router {
    ledger: Arc<EnergyLedger>,
    storage: Arc<dyn Storage>,
    receipts: Arc<dyn ReceiptValidator>,
}

impl Router {
    /// Create a router over the shared ledger and collaborators.
    pub fn new(
        ledger: Arc<EnergyLedger>,
        storage: Arc<dyn Storage>,
        receipts: Arc<dyn ReceiptValidator>,
    ) -> Self {
        Self {
            ledger,
            storage,
            receipts,
        }
    }

    /// The shared ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<EnergyLedger> {
        &self.ledger
    }

    /// Dispatch one authenticated frame.
    ///
    /// `raw` is the frame payload as received, used for verbatim fan-out.
    /// Returns the correlated reply to send to the sender, if any.
    pub fn dispatch(&self, session: &Session, frame: &Frame, raw: &Bytes) -> Option<Frame> {
        let Some(command) = frame.command() else {
            debug!(keyword = %frame.keyword, "unknown command");
            return Some(Frame::response(frame.id, Status::IllegalCommand));
        };

        if session.class == ConnectionClass::Hardware && app_only(command) {
            return Some(Frame::response(frame.id, Status::NotAllowed));
        }

        match command {
            Command::Hardware => self.relay(session, frame, raw),
            Command::CreateDash => Some(self.create_dash(session, frame)),
            Command::DeleteDash => Some(self.delete_dash(session, frame)),
            Command::CreateWidget => Some(self.create_widget(session, frame)),
            Command::DeleteWidget => Some(self.delete_widget(session, frame)),
            Command::GetEnergy => Some(Frame::new(
                frame.id,
                Command::GetEnergy,
                self.ledger.balance(&session.account).to_string(),
            )),
            Command::AddEnergy => Some(self.add_energy(session, frame)),
            Command::Activate => Some(self.activate(session, frame)),
            Command::Deactivate => {
                session.entry.deactivate();
                Some(Frame::response(frame.id, Status::Ok))
            }
            Command::Ping => Some(Frame::response(frame.id, Status::Ok)),
            // The binding is immutable for the socket's lifetime, and
            // `response` is a server-to-client frame.
            Command::Login | Command::Response => {
                Some(Frame::response(frame.id, Status::IllegalCommand))
            }
        }
    }

    /// Pure data relay between the two connection classes.
    fn relay(&self, session: &Session, frame: &Frame, raw: &Bytes) -> Option<Frame> {
        match session.class {
            ConnectionClass::Hardware => {
                // Device → apps is fire-and-forget: absent apps are normal
                // and not an error to the device.
                let delivered = session.entry.fan_out(ConnectionClass::Application, raw);
                trace!(account = %session.account, delivered, "hardware frame relayed to apps");
                None
            }
            ConnectionClass::Application => {
                if session.entry.active_dash().is_none() {
                    return Some(Frame::response(frame.id, Status::NoActiveDashboard));
                }

                // Remember the last pin-mode directive for replay to
                // hardware joining the active dashboard later, stripped of
                // the client's correlation id.
                if frame.body.split_whitespace().next() == Some(PIN_MODE_PREFIX) {
                    let cached = Frame::new(SERVER_PUSH_ID, Command::Hardware, frame.body.clone());
                    session.entry.cache_pin_mode(cached.encode());
                }

                if session.entry.connection_count(ConnectionClass::Hardware) == 0 {
                    return Some(Frame::response(frame.id, Status::DeviceNotInNetwork));
                }

                let delivered = session.entry.fan_out(ConnectionClass::Hardware, raw);
                trace!(account = %session.account, delivered, "app frame relayed to hardware");
                None
            }
        }
    }

    /// `createDash <json>` — debit contained widgets, then persist.
    fn create_dash(&self, session: &Session, frame: &Frame) -> Frame {
        let dash: Dashboard = match serde_json::from_str(frame.body.trim()) {
            Ok(dash) => dash,
            Err(err) => {
                debug!(account = %session.account, %err, "bad createDash body");
                return Frame::response(frame.id, Status::IllegalCommand);
            }
        };

        let cost = self.ledger.price_sum(dash.widgets.iter().map(|w| w.kind));
        if cost > 0 && self.ledger.debit(&session.account, cost).is_err() {
            return Frame::response(frame.id, Status::EnergyLimit);
        }

        match self.storage.create_dash(&session.account, dash) {
            Ok(()) => Frame::response(frame.id, Status::Ok),
            Err(err) => {
                if cost > 0 {
                    self.ledger.credit(&session.account, cost);
                }
                self.storage_failure(session, frame.id, &err)
            }
        }
    }

    /// `deleteDash <dashId>` — remove, then refund every contained widget.
    fn delete_dash(&self, session: &Session, frame: &Frame) -> Frame {
        let Some(dash_id) = parse_dash_id(&frame.body) else {
            return Frame::response(frame.id, Status::IllegalCommand);
        };

        match self.storage.delete_dash(&session.account, dash_id) {
            Ok(removed) => {
                let refund = self.ledger.price_sum(removed.widgets.iter().map(|w| w.kind));
                if refund > 0 {
                    self.ledger.credit(&session.account, refund);
                }
                session.entry.forget_dash(dash_id);
                Frame::response(frame.id, Status::Ok)
            }
            Err(err) => self.storage_failure(session, frame.id, &err),
        }
    }

    /// `createWidget <dashId>\0<json>` — debit the price, then persist.
    fn create_widget(&self, session: &Session, frame: &Frame) -> Frame {
        let (args, payload) = frame.split_body();
        let (Some(dash_id), Some(json)) = (parse_dash_id(args), payload) else {
            return Frame::response(frame.id, Status::IllegalCommand);
        };
        let widget: Widget = match serde_json::from_str(json) {
            Ok(widget) => widget,
            Err(err) => {
                debug!(account = %session.account, %err, "bad createWidget body");
                return Frame::response(frame.id, Status::IllegalCommand);
            }
        };

        let price = self.ledger.price(widget.kind);
        if self.ledger.debit(&session.account, price).is_err() {
            return Frame::response(frame.id, Status::EnergyLimit);
        }

        match self.storage.create_widget(&session.account, dash_id, widget) {
            Ok(()) => Frame::response(frame.id, Status::Ok),
            Err(err) => {
                // Compensating credit: the debit must not outlive a failed
                // persistence.
                self.ledger.credit(&session.account, price);
                self.storage_failure(session, frame.id, &err)
            }
        }
    }

    /// `deleteWidget <dashId> <widgetId>` — remove, then refund.
    fn delete_widget(&self, session: &Session, frame: &Frame) -> Frame {
        let mut parts = frame.body.split_whitespace();
        let ids = (parts.next(), parts.next(), parts.next());
        let (Some(dash), Some(widget), None) = ids else {
            return Frame::response(frame.id, Status::IllegalCommand);
        };
        let (Some(dash_id), Ok(widget_id)) = (parse_dash_id(dash), widget.parse::<i64>()) else {
            return Frame::response(frame.id, Status::IllegalCommand);
        };

        match self
            .storage
            .delete_widget(&session.account, dash_id, WidgetId(widget_id))
        {
            Ok(removed) => {
                self.ledger
                    .credit(&session.account, self.ledger.price(removed.kind));
                Frame::response(frame.id, Status::Ok)
            }
            Err(err) => self.storage_failure(session, frame.id, &err),
        }
    }

    /// `addEnergy <amount>\0<receipt>` — credit after receipt validation.
    fn add_energy(&self, session: &Session, frame: &Frame) -> Frame {
        let (args, payload) = frame.split_body();
        let (Ok(amount), Some(receipt)) = (args.trim().parse::<u32>(), payload) else {
            return Frame::response(frame.id, Status::IllegalCommand);
        };

        if !self.receipts.validate(receipt) {
            debug!(account = %session.account, "addEnergy receipt rejected");
            return Frame::response(frame.id, Status::NotAllowed);
        }

        self.ledger.credit(&session.account, amount);
        Frame::response(frame.id, Status::Ok)
    }

    /// `activate <dashId>` — set the account's active dashboard.
    fn activate(&self, session: &Session, frame: &Frame) -> Frame {
        let Some(dash_id) = parse_dash_id(&frame.body) else {
            return Frame::response(frame.id, Status::IllegalCommand);
        };
        if !self.storage.dash_exists(&session.account, dash_id) {
            return Frame::response(frame.id, Status::IllegalCommand);
        }
        session.entry.set_active_dash(dash_id);
        Frame::response(frame.id, Status::Ok)
    }

    /// Map a storage error onto a response, logging backend failures.
    fn storage_failure(&self, session: &Session, id: u32, err: &StorageError) -> Frame {
        match err {
            StorageError::Backend { reason } => {
                warn!(account = %session.account, %reason, "storage backend failure");
                Frame::response(id, Status::ServerError)
            }
            other => {
                debug!(account = %session.account, %other, "storage rejected command");
                Frame::response(id, Status::IllegalCommand)
            }
        }
    }
}

/// Commands an application may issue but hardware may not.
const fn app_only(command: Command) -> bool {
    matches!(
        command,
        Command::CreateDash
            | Command::DeleteDash
            | Command::CreateWidget
            | Command::DeleteWidget
            | Command::GetEnergy
            | Command::AddEnergy
            | Command::Activate
            | Command::Deactivate
    )
}

fn parse_dash_id(raw: &str) -> Option<DashId> {
    raw.trim().parse::<i64>().ok().map(DashId)
}
