use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizePayload {
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RemoteErrorPayload {
    /// Accepts `{ "message": ... }`, a bare string, or nothing at all.
    fn from_value(value: Option<Value>) -> Self {
        match value {
            Some(Value::String(message)) => Self {
                message: Some(message),
            },
            Some(Value::Object(map)) => Self {
                message: map
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            _ => Self::default(),
        }
    }

    pub fn describe(&self) -> &str {
        self.message.as_deref().unwrap_or("unspecified widget error")
    }
}

/// Messages the embedded widget posts to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum WidgetMessage {
    #[serde(rename = "widget:ready")]
    Ready,
    #[serde(rename = "widget:resize")]
    Resize(ResizePayload),
    #[serde(rename = "widget:error")]
    Error(RemoteErrorPayload),
    #[serde(rename = "widget:action")]
    Action(Option<Value>),
}

impl WidgetMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            WidgetMessage::Ready => "ready",
            WidgetMessage::Resize(_) => "resize",
            WidgetMessage::Error(_) => "error",
            WidgetMessage::Action(_) => "action",
        }
    }
}

/// A parsed message plus the instance it names, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub target_id: Option<String>,
    pub message: WidgetMessage,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message is not a typed object: {0}")]
    NotAMessage(serde_json::Error),
    #[error("unhandled widget message type: {0}")]
    UnknownType(String),
    #[error("malformed {kind} payload: {source}")]
    MalformedPayload {
        kind: &'static str,
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(rename = "targetId", default)]
    target_id: Option<String>,
}

/// Validate `data` against the declared message type before anything acts on it.
pub fn parse_message(data: &Value) -> Result<Envelope, ProtocolError> {
    let raw = RawMessage::deserialize(data).map_err(ProtocolError::NotAMessage)?;
    let kind = raw.kind.strip_prefix("widget:").unwrap_or(&raw.kind);

    let message = match kind {
        "ready" => WidgetMessage::Ready,
        "resize" => {
            let payload = raw.payload.unwrap_or(Value::Null);
            let resize = ResizePayload::deserialize(payload).map_err(|source| {
                ProtocolError::MalformedPayload {
                    kind: "resize",
                    source,
                }
            })?;
            WidgetMessage::Resize(resize)
        }
        "error" => WidgetMessage::Error(RemoteErrorPayload::from_value(raw.payload)),
        "action" => WidgetMessage::Action(raw.payload),
        _ => return Err(ProtocolError::UnknownType(raw.kind)),
    };

    Ok(Envelope {
        target_id: raw.target_id,
        message,
    })
}
