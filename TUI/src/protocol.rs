// Wire types for the planner chat socket: JSON text frames in both directions.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::{ClientError, Result};

/// Text for a loosely typed field: strings as-is, other values as compact JSON.
fn display_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(display_text(&Value::deserialize(deserializer)?).unwrap_or_default())
}

fn optional_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(display_text(&Value::deserialize(deserializer)?))
}

/// A list of lines. A lone scalar becomes a one-line list.
fn text_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.iter().filter_map(display_text).collect(),
        other => display_text(&other).into_iter().collect(),
    })
}

/// Function calls, skipping entries that are not objects.
fn call_list<'de, D>(deserializer: D) -> std::result::Result<Vec<FunctionCall>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            warn!("function_calls_made is not a list: {}", other);
            return Ok(Vec::new());
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<FunctionCall>(item) {
            Ok(call) => Some(call),
            Err(err) => {
                warn!("skipping malformed function call: {}", err);
                None
            }
        })
        .collect())
}

/// Citation map kept as raw values; each entry is validated when rendered.
fn citation_map<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map.into_iter().collect(),
        Value::Null => BTreeMap::new(),
        other => {
            warn!("citations is not an object: {}", other);
            BTreeMap::new()
        }
    })
}

/// Messages pushed by the server, keyed on the envelope's `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Thought(String),
    Status(String),
    AdminUpdate(AdminSnapshot),
    FinalResponse(FinalResponse),
    Error(String),
    SystemMessage(String),
}

impl ServerMessage {
    pub fn tag(&self) -> &'static str {
        match self {
            ServerMessage::Thought(_) => "thought",
            ServerMessage::Status(_) => "status",
            ServerMessage::AdminUpdate(_) => "admin_update",
            ServerMessage::FinalResponse(_) => "final_response",
            ServerMessage::Error(_) => "error",
            ServerMessage::SystemMessage(_) => "system_message",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Diagnostic state mirrored into the admin panel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdminSnapshot {
    #[serde(default, deserialize_with = "text_list")]
    pub understanding_thoughts: Vec<String>,
    #[serde(default, deserialize_with = "call_list")]
    pub function_calls_made: Vec<FunctionCall>,
    #[serde(default, deserialize_with = "text_list")]
    pub summarization_thoughts: Vec<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub error: Option<String>,
}

impl AdminSnapshot {
    /// The snapshot shown at the start of every turn and after a reset.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, deserialize_with = "optional_text")]
    pub name: Option<String>,
    /// Filled from model-produced arguments, so any JSON shape may arrive.
    #[serde(default, deserialize_with = "optional_text")]
    pub query: Option<String>,
    #[serde(default)]
    pub all_args: Option<Value>,
    /// `None` while the call is still running.
    #[serde(default)]
    pub raw_result: Option<Value>,
}

impl FunctionCall {
    fn result_field(&self, key: &str) -> Option<&Value> {
        self.raw_result.as_ref().and_then(|r| r.get(key))
    }

    fn result_flag(&self, key: &str) -> bool {
        self.result_field(key).map_or(false, |v| match v {
            Value::Bool(b) => *b,
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
            _ => true,
        })
    }

    pub fn asked_for_sticky(&self) -> bool {
        self.result_flag("asked_for_sticky")
    }

    pub fn rejected(&self) -> bool {
        self.result_flag("rejected")
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.result_field("rejection_reason")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Non-empty string field of a citation object.
fn citation_field<'a>(citation: &'a Value, key: &str) -> Option<&'a str> {
    citation.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinalResponse {
    #[serde(default, deserialize_with = "text")]
    pub ai_message: String,
    /// `{title, link}` objects keyed by rank. Entries of any other shape are skipped.
    #[serde(default, deserialize_with = "citation_map")]
    pub citations: BTreeMap<String, Value>,
}

/// A citation that is safe to show: both title and link are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub key: String,
    pub title: String,
    pub link: String,
}

fn compare_citation_keys(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

impl FinalResponse {
    /// Citations ordered by numeric rank, incomplete entries dropped.
    pub fn sorted_citations(&self) -> Vec<Source> {
        let mut keys: Vec<&String> = self.citations.keys().collect();
        keys.sort_by(|a, b| compare_citation_keys(a, b));

        keys.into_iter()
            .filter_map(|key| {
                let citation = self.citations.get(key)?;
                Some(Source {
                    key: key.clone(),
                    title: citation_field(citation, "title")?.to_string(),
                    link: citation_field(citation, "link")?.to_string(),
                })
            })
            .collect()
    }
}

fn string_payload(kind: &str, data: Value) -> Result<String> {
    match data {
        Value::String(s) => Ok(s),
        other => Err(ClientError::Protocol(format!(
            "{} payload must be a string, got {}",
            kind, other
        ))),
    }
}

/// Parse one inbound text frame.
///
/// Returns `Ok(None)` for tags this client does not know; those are logged
/// and otherwise ignored.
pub fn decode_server_message(text: &str) -> Result<Option<ServerMessage>> {
    let envelope: Envelope = serde_json::from_str(text)?;
    let data = envelope.data;

    let message = match envelope.kind.as_str() {
        "thought" => ServerMessage::Thought(string_payload("thought", data)?),
        "status" => ServerMessage::Status(string_payload("status", data)?),
        "error" => ServerMessage::Error(string_payload("error", data)?),
        "system_message" => ServerMessage::SystemMessage(string_payload("system_message", data)?),
        "admin_update" => ServerMessage::AdminUpdate(serde_json::from_value(data)?),
        "final_response" => ServerMessage::FinalResponse(serde_json::from_value(data)?),
        other => {
            warn!("received unknown message type: {}", other);
            return Ok(None);
        }
    };

    Ok(Some(message))
}

/// Messages sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Query(String),
    Reset,
}

impl ClientMessage {
    pub fn to_value(&self) -> Value {
        match self {
            ClientMessage::Query(message) => json!({ "message": message }),
            ClientMessage::Reset => json!({ "type": "reset" }),
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_value())?)
    }
}
