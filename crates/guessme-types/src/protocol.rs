//! Wire formats for the REST predictor and the streaming protocol.

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{geometry::Point, prediction::Prediction, GuessmeError, Result};

/// Sortable 26-character client identifier carried by every streaming frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub const LEN: usize = 26;

    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Wrap an identifier read back from storage. Only emptiness is rejected;
    /// whatever was persisted keeps being reused.
    pub fn from_stored(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StrokeData {
    #[serde(default)]
    pub points: Vec<Point>,
}

/// Client to server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Stroke {
        #[serde(rename = "clientId")]
        client_id: ClientId,
        data: StrokeData,
    },
    Submit {
        #[serde(rename = "clientId")]
        client_id: ClientId,
    },
    Clear {
        #[serde(rename = "clientId")]
        client_id: ClientId,
    },
}

impl ClientMessage {
    pub fn stroke(client_id: ClientId, points: Vec<Point>) -> Self {
        ClientMessage::Stroke {
            client_id,
            data: StrokeData { points },
        }
    }

    /// Parse one inbound text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| GuessmeError::Protocol(err.to_string()))
    }

    pub fn client_id(&self) -> &ClientId {
        match self {
            ClientMessage::Stroke { client_id, .. }
            | ClientMessage::Submit { client_id }
            | ClientMessage::Clear { client_id } => client_id,
        }
    }
}

/// Server to client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Predictions {
        #[serde(rename = "clientId")]
        client_id: ClientId,
        data: Vec<Prediction>,
    },
    Final {
        #[serde(rename = "clientId")]
        client_id: ClientId,
        data: Prediction,
    },
}

impl ServerMessage {
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| GuessmeError::Protocol(err.to_string()))
    }

    pub fn client_id(&self) -> &ClientId {
        match self {
            ServerMessage::Predictions { client_id, .. } | ServerMessage::Final { client_id, .. } => {
                client_id
            }
        }
    }
}

/// Body of `POST /predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub points: Vec<Point>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_ids_are_ulids() {
        let id = ClientId::generate();
        assert_eq!(id.as_str().len(), ClientId::LEN);
        assert_ne!(id, ClientId::generate());
    }

    #[test]
    fn stored_ids_are_reused_verbatim() {
        let id = ClientId::from_stored("01ARZ3NDEKTSV4RRFFQ69G5FAV").expect("stored id");
        assert_eq!(id.as_str(), "01ARZ3NDEKTSV4RRFFQ69G5FAV");
        assert!(ClientId::from_stored("   ").is_none());
    }

    #[test]
    fn client_frames_match_wire_contract() {
        let id = ClientId::from_stored("client-a").unwrap();
        let stroke = ClientMessage::stroke(id.clone(), vec![Point::new(10.0, 20.0)]);
        assert_eq!(
            serde_json::to_value(&stroke).unwrap(),
            json!({"type": "stroke", "clientId": "client-a", "data": {"points": [{"x": 10.0, "y": 20.0}]}})
        );

        let submit = ClientMessage::Submit { client_id: id };
        assert_eq!(
            serde_json::to_value(&submit).unwrap(),
            json!({"type": "submit", "clientId": "client-a"})
        );
    }

    #[test]
    fn server_frames_parse_in_any_field_order() {
        let predictions: ServerMessage = serde_json::from_str(
            r#"{"clientId":"c1","type":"predictions","data":[{"label":"Cat","confidence":87}]}"#,
        )
        .expect("predictions frame");
        match predictions {
            ServerMessage::Predictions { client_id, data } => {
                assert_eq!(client_id.as_str(), "c1");
                assert_eq!(data, vec![Prediction::new("Cat", 87.0)]);
            }
            other => panic!("unexpected frame {other:?}"),
        }

        let final_frame: ServerMessage = serde_json::from_str(
            r#"{"data":{"label":"-","confidence":0},"type":"final","clientId":"c1"}"#,
        )
        .expect("final frame");
        assert_eq!(
            final_frame,
            ServerMessage::Final {
                client_id: ClientId::from_stored("c1").unwrap(),
                data: Prediction::placeholder(),
            }
        );
    }

    #[test]
    fn unknown_frame_type_is_an_error() {
        let parsed = serde_json::from_str::<ServerMessage>(r#"{"clientId":"c1","type":"bogus"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn decode_reports_protocol_errors() {
        let err = ServerMessage::decode("{not json").unwrap_err();
        assert!(matches!(err, GuessmeError::Protocol(_)));
        let err = ClientMessage::decode(r#"{"type":"stroke"}"#).unwrap_err();
        assert!(matches!(err, GuessmeError::Protocol(_)));

        let submit = ClientMessage::decode(r#"{"type":"submit","clientId":"c1"}"#).unwrap();
        assert_eq!(submit.client_id().as_str(), "c1");
    }
}
