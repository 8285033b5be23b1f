//! Push-channel wire format.
//!
//! Every WebSocket text frame carries one JSON envelope of the form
//! `{"event": "<name>", "data": <payload>}`.
//!
//! | direction       | event          | payload          |
//! |-----------------|----------------|------------------|
//! | server → client | `metrics`      | [`MetricsSample`] |
//! | client → server | `chat_message` | [`ChatQuery`]     |
//! | server → client | `ai_response`  | [`ChatReply`]     |

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metrics::MetricsSample;
use crate::responder::{ChatQuery, ChatReply};

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Metrics(MetricsSample),
    AiResponse(ChatReply),
}

impl ServerEvent {
    /// Serialize to the text of a single frame.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Events clients send to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    ChatMessage(ChatQuery),
}

impl ClientEvent {
    pub fn from_frame(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_metrics_event_envelope() {
        let sample = crate::metrics::generate(&mut StdRng::seed_from_u64(5));
        let frame = ServerEvent::Metrics(sample).to_frame().unwrap();
        let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "metrics");
        assert_eq!(v["data"]["status"], "UP");
    }

    #[test]
    fn test_ai_response_envelope() {
        let frame = ServerEvent::AiResponse(ChatReply {
            text: "hello".to_string(),
        })
        .to_frame()
        .unwrap();
        assert_eq!(frame, r#"{"event":"ai_response","data":{"text":"hello"}}"#);
    }

    #[test]
    fn test_chat_message_parses() {
        let ev = ClientEvent::from_frame(r#"{"event":"chat_message","data":{"query":"cost?"}}"#)
            .unwrap();
        assert_eq!(
            ev,
            ClientEvent::ChatMessage(ChatQuery {
                query: "cost?".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        assert!(ClientEvent::from_frame(r#"{"event":"subscribe","data":{}}"#).is_err());
    }

    #[test]
    fn test_chat_message_without_query_is_rejected() {
        assert!(ClientEvent::from_frame(r#"{"event":"chat_message","data":{}}"#).is_err());
        assert!(ClientEvent::from_frame("not json").is_err());
    }
}
