//! Identifiers and the widget/dashboard data model.
//!
//! Dashboards and widgets arrive as JSON payload bodies on mutating
//! commands (e.g. `createWidget 2\0{"id":7,...}`). Identifiers inside the
//! bodies are client-assigned; the server never invents them. `createdAt`
//! is likewise caller-supplied and stored verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Owning identity for tokens, dashboards, and an energy balance.
///
/// Opaque to the protocol layer; supplied by the identity resolver at
/// login time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create an account id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Dashboard (project) identifier, unique within an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DashId(pub i64);

impl fmt::Display for DashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Widget identifier, unique within its dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetId(pub i64);

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Widget type, drawn from a fixed enumeration.
///
/// The type determines the widget's fixed energy price (see
/// [`crate::energy::PriceTable`]); everything else about widget semantics
/// is out of scope for the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WidgetType {
    Button,
    Slider,
    Led,
    Gauge,
    Lcd,
    Terminal,
    Timer,
    Rtc,
}

impl WidgetType {
    /// All known widget types, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Button,
        Self::Slider,
        Self::Led,
        Self::Gauge,
        Self::Lcd,
        Self::Terminal,
        Self::Timer,
        Self::Rtc,
    ];
}

/// A configurable UI element bound to a hardware pin.
///
/// Unknown JSON fields are tolerated; clients evolve independently of the
/// relay and the relay only cares about identity and type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: WidgetId,

    /// Widget type; determines the creation price.
    #[serde(rename = "type")]
    pub kind: WidgetType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(rename = "pinType", default, skip_serializing_if = "Option::is_none")]
    pub pin_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
}

/// A named collection of widgets belonging to an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: DashId,

    #[serde(default)]
    pub name: String,

    /// Creation timestamp supplied by the caller, stored verbatim.
    #[serde(rename = "createdAt", default)]
    pub created_at: i64,

    #[serde(default)]
    pub widgets: Vec<Widget>,
}

impl Dashboard {
    /// Look up a widget by id.
    #[must_use]
    pub fn widget(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    /// Returns `true` if the dashboard contains a widget with this id.
    #[must_use]
    pub fn has_widget(&self, id: WidgetId) -> bool {
        self.widget(id).is_some()
    }

    /// Remove and return a widget by id.
    pub fn remove_widget(&mut self, id: WidgetId) -> Option<Widget> {
        let idx = self.widgets.iter().position(|w| w.id == id)?;
        Some(self.widgets.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widget_deserializes_client_json() {
        let json = r#"{"id":7, "x":2, "y":2, "label":"Some Text 2",
                       "type":"BUTTON", "pinType":"DIGITAL", "pin":2}"#;
        let widget: Widget = serde_json::from_str(json).unwrap();
        assert_eq!(widget.id, WidgetId(7));
        assert_eq!(widget.kind, WidgetType::Button);
        assert_eq!(widget.pin_type.as_deref(), Some("DIGITAL"));
        assert_eq!(widget.pin, Some(2));
    }

    #[test]
    fn widget_tolerates_unknown_fields() {
        let json = r#"{"id":1, "type":"LCD", "frequency":1000, "color":600}"#;
        let widget: Widget = serde_json::from_str(json).unwrap();
        assert_eq!(widget.kind, WidgetType::Lcd);
    }

    #[test]
    fn dashboard_created_at_is_caller_supplied() {
        let json = r#"{"id":2, "createdAt":1458856800001, "name":"test board"}"#;
        let dash: Dashboard = serde_json::from_str(json).unwrap();
        assert_eq!(dash.id, DashId(2));
        assert_eq!(dash.created_at, 1_458_856_800_001);
        assert!(dash.widgets.is_empty());
    }

    #[test]
    fn dashboard_remove_widget() {
        let json = r#"{"id":2, "widgets":[
            {"id":1, "type":"BUTTON"},
            {"id":2, "type":"LCD"}
        ]}"#;
        let mut dash: Dashboard = serde_json::from_str(json).unwrap();
        let removed = dash.remove_widget(WidgetId(1)).unwrap();
        assert_eq!(removed.kind, WidgetType::Button);
        assert!(!dash.has_widget(WidgetId(1)));
        assert!(dash.has_widget(WidgetId(2)));
        assert!(dash.remove_widget(WidgetId(1)).is_none());
    }

    #[test]
    fn widget_type_rejects_unknown() {
        let err = serde_json::from_str::<Widget>(r#"{"id":1, "type":"HOLOGRAM"}"#);
        assert!(err.is_err());
    }
}
