//! Messaging host boundary types.
//!
//! The host delivers `{conversationId, participantId, text}` events and
//! displays `{content, citations[], aiGenerated}` replies. Everything else
//! about the chat platform (transport, identity, rendering) lives outside
//! this service.

use serde::{Deserialize, Serialize};

use crate::pipeline::reconcile::Citation;

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
    #[serde(rename = "participantId")]
    pub participant_id: String,
    pub text: String,
}

impl IncomingMessage {
    /// History key: one sequence per conversation + participant pair.
    pub fn conversation_key(&self) -> String {
        format!("{}:{}", self.conversation_id, self.participant_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMessage {
    pub content: String,
    pub citations: Vec<Citation>,
    /// Attached here, at the host boundary — never by the reconciler.
    #[serde(rename = "aiGenerated")]
    pub ai_generated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_event_deserializes_from_host_field_names() {
        let raw = r#"{"conversationId": "c1", "participantId": "p1", "text": "hi"}"#;
        let msg: IncomingMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.conversation_key(), "c1:p1");
        assert_eq!(msg.text, "hi");
    }

    #[test]
    fn outbound_message_serializes_host_field_names() {
        let msg = OutgoingMessage {
            content: "A[1]".to_string(),
            citations: vec![Citation {
                name: "T".to_string(),
                abstract_text: "C".to_string(),
            }],
            ai_generated: true,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["aiGenerated"], true);
        assert_eq!(json["citations"][0]["abstract"], "C");
    }
}
