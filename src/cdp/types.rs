use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing command frame.
#[derive(Debug, Serialize)]
pub struct CdpCommand {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Routes the command to an attached target when set.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Every incoming frame is decoded into this shape first and then split by
/// [`classify`](Self::classify).
#[derive(Debug, Deserialize)]
pub struct RawCdpMessage {
    pub id: Option<u64>,
    pub method: Option<String>,
    pub params: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<CdpProtocolError>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Error object the browser returns in place of `result`.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpProtocolError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug)]
pub struct CdpResponse {
    pub id: u64,
    pub result: Result<Value, CdpProtocolError>,
}

/// An unsolicited notification such as `Runtime.consoleAPICalled`.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

pub enum MessageKind {
    Response(CdpResponse),
    Event(CdpEvent),
}

impl RawCdpMessage {
    /// Frames carrying an `id` are replies; frames with only a `method` are
    /// events. Anything else is dropped.
    #[must_use]
    pub fn classify(self) -> Option<MessageKind> {
        if let Some(id) = self.id {
            let result = match self.error {
                Some(error) => Err(error),
                None => Ok(self.result.unwrap_or(Value::Null)),
            };
            return Some(MessageKind::Response(CdpResponse { id, result }));
        }
        self.method.map(|method| {
            MessageKind::Event(CdpEvent {
                method,
                params: self.params.unwrap_or(Value::Null),
                session_id: self.session_id,
            })
        })
    }
}
