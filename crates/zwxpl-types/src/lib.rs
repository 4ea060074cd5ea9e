use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Process exit code after an orderly shutdown.
pub const EXIT_OK: i32 = 0;
/// Process exit code when the mesh driver reports a failure.
pub const EXIT_DRIVER_FAILED: i32 = 1;
/// Process exit code when the bus gateway cannot bind its socket.
pub const EXIT_BUS_BIND_FAILED: i32 = 2;
/// Process exit code when configuration or the alias table cannot be loaded.
pub const EXIT_CONFIG: i32 = 3;

/// Identity of a single value point on the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId {
    pub node_id: u8,
    pub class_id: u8,
    pub instance: u8,
    pub index: u16,
}

impl ValueId {
    pub fn new(node_id: u8, class_id: u8, instance: u8, index: u16) -> Self {
        Self {
            node_id,
            class_id,
            instance,
            index,
        }
    }
}

/// Renders as `node-class-instance-index`, the raw coordinate form used by
/// the schema dump and the raw-addressing command syntax.
impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.node_id, self.class_id, self.instance, self.index
        )
    }
}

/// A value as carried by the mesh driver.
///
/// The driver reports booleans, integers, decimals and free text depending on
/// the value's type; the variant order matters for untagged decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ZValue {
    /// Numeric view of the value. Text is parsed; booleans map to 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ZValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ZValue::Int(i) => Some(*i as f64),
            ZValue::Float(f) => Some(*f),
            ZValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Truthiness used by the binary-switch projection.
    pub fn as_bool(&self) -> bool {
        match self {
            ZValue::Bool(b) => *b,
            ZValue::Text(s) => s.eq_ignore_ascii_case("true"),
            other => other.as_f64().is_some_and(|v| v != 0.0),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Default for ZValue {
    fn default() -> Self {
        ZValue::Int(0)
    }
}

impl fmt::Display for ZValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZValue::Bool(b) => write!(f, "{b}"),
            ZValue::Int(i) => write!(f, "{i}"),
            ZValue::Float(v) => write!(f, "{v}"),
            ZValue::Text(s) => f.write_str(s),
        }
    }
}

/// A single observable/writable point on a node, as last reported by the
/// mesh driver.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshValue {
    pub node_id: u8,
    pub class_id: u8,
    pub instance: u8,
    pub index: u16,
    pub label: String,
    pub value: ZValue,
    pub units: String,
    pub help: String,
    pub write_only: bool,
    pub read_only: bool,
    pub genre: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub min: i64,
    pub max: i64,
}

impl MeshValue {
    pub fn id(&self) -> ValueId {
        ValueId::new(self.node_id, self.class_id, self.instance, self.index)
    }

    /// The label token used in external addresses: the human label for the
    /// first instance, the instance number otherwise.
    pub fn label_token(&self) -> String {
        if self.instance == 1 && !self.label.is_empty() {
            self.label.clone()
        } else {
            self.instance.to_string()
        }
    }
}

/// Node metadata reported once the driver has finished interviewing a node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeInfo {
    pub manufacturer: String,
    pub manufacturer_id: String,
    pub product: String,
    pub product_type: String,
    pub product_id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    #[serde(alias = "loc")]
    pub location: String,
}

/// Events emitted by the mesh driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum MeshEvent {
    DriverReady { home_id: u32 },
    DriverFailed,
    NodeAdded { node_id: u8 },
    ValueAdded { node_id: u8, class_id: u8, value: MeshValue },
    ValueChanged { node_id: u8, class_id: u8, value: MeshValue },
    ValueRemoved { node_id: u8, class_id: u8, index: u16 },
    NodeReady { node_id: u8, info: NodeInfo },
    Notification { node_id: u8, code: u8 },
    ScanComplete,
    ControllerCommand { result: i32, state: i32 },
}

/// Commands sent to the mesh driver. Serialised as JSON frames tagged by
/// `op` when the driver lives behind a gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MeshCommand {
    Connect {
        port: String,
        logging: bool,
        console_output: bool,
    },
    Disconnect { port: String },
    EnablePoll { node_id: u8, class_id: u8, intensity: u8 },
    SetValue {
        #[serde(flatten)]
        id: ValueId,
        value: ZValue,
    },
    AddNode { secure: bool },
    RemoveNode,
}

/// An inbound bus message: a schema name plus a flat key/value body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BusMessage {
    #[serde(rename = "bodyName", alias = "body_name")]
    pub body_name: String,
    #[serde(default)]
    pub body: Map<String, Value>,
}

impl BusMessage {
    pub fn new(body_name: impl Into<String>) -> Self {
        Self {
            body_name: body_name.into(),
            body: Map::new(),
        }
    }

    /// Builder-style body field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.body.insert(key.to_string(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.body.get(key).filter(|v| !v.is_null())
    }

    /// A body field rendered as text; numbers and booleans are stringified.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.field(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Events emitted by the bus client.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    Message(BusMessage),
    Error(String),
}

/// The single event type fed into the bridge session, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    Mesh(MeshEvent),
    Bus(BusEvent),
    Shutdown,
}

/// Body of an outward status or trigger announcement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusBody {
    pub device: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<bool>,
}

impl StatusBody {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn current(mut self, current: impl Into<Value>) -> Self {
        self.current = Some(current.into());
        self
    }

    /// Empty unit strings are dropped.
    pub fn units(mut self, units: impl Into<String>) -> Self {
        let units = units.into();
        if !units.is_empty() {
            self.units = Some(units);
        }
        self
    }

    pub fn security(mut self, secure: bool) -> Self {
        self.security = Some(secure);
        self
    }
}

/// Whether an announcement is an idempotent status or a state-change trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementKind {
    Stat,
    Trig,
}

/// Envelope for an announcement travelling over the in-process event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "zwave.gateway"
    pub source: String,
    pub kind: AnnouncementKind,
    pub body: StatusBody,
}

impl Announcement {
    pub fn new(source: impl Into<String>, kind: AnnouncementKind, body: StatusBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            kind,
            body,
        }
    }
}

/// Error type shared by every bridge crate.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Alias Table Error: {0}")]
    AliasTable(String),

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Gateway Error: {0}")]
    Gateway(String),

    #[error("Serialization Error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Invalid value for {device}: {value}")]
    InvalidValue { device: String, value: String },
}
