//! Message definitions for the AppSync realtime websocket protocol.
//!
//! Every frame on the wire is a JSON text message of the shape
//! `{"type": ..., "id": ..., "payload": ...}` with `id` and `payload`
//! omitted when absent.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::endpoint::AuthExtension;

/// A GraphQL request document: an opaque query string plus optional
/// variables.
///
/// The query is never parsed or validated by this crate; it is serialized
/// verbatim for the server to interpret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// The GraphQL document to execute
    pub query: String,
    /// The variable mapping for the document, omitted from the wire when
    /// absent. Expected to be a JSON object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
}

impl Request {
    /// Constructs a Request with no variables
    pub fn new(query: impl Into<String>) -> Self {
        Request {
            query: query.into(),
            variables: None,
        }
    }

    /// Sets the variable mapping for this request
    pub fn variables(self, variables: serde_json::Value) -> Self {
        Request {
            variables: Some(variables),
            ..self
        }
    }
}

/// The payload object carried by data, error and HTTP response frames.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Payload {
    /// The raw result document, opaque until the caller decodes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Box<RawValue>>,
    /// Protocol extensions attached to the payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<PayloadExtensions>,
    /// Server-reported errors, in the order the server reported them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<PayloadError>,
}

impl Payload {
    /// Decodes the raw data document into a caller-supplied type.
    pub fn decode_data<T>(&self) -> Result<T, crate::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| crate::Error::Decode("payload carries no data".into()))?;

        serde_json::from_str(data.get()).map_err(|error| crate::Error::Decode(error.to_string()))
    }

    /// The `errorType` of each server-reported error, in order.
    pub fn error_types(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|error| error.error_type.clone())
            .collect()
    }
}

/// The extensions object of a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadExtensions {
    /// The auth extension the server attached, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<AuthExtension>,
}

/// A single server-reported error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadError {
    /// The server's classification of the error
    #[serde(rename = "errorType", default)]
    pub error_type: String,
}

/// Messages sent from client to server.
pub(crate) enum ClientMessage<'a> {
    ConnectionInit,
    Start {
        id: &'a str,
        request: &'a Request,
        authorization: &'a AuthExtension,
    },
}

impl Serialize for ClientMessage<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::{Error as _, SerializeMap};

        match self {
            ClientMessage::ConnectionInit => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("type", "connection_init")?;
                map.end()
            }
            ClientMessage::Start {
                id,
                request,
                authorization,
            } => {
                // The document is embedded as a string, so it ends up
                // double-encoded on the wire.
                let data = serde_json::to_string(request).map_err(S::Error::custom)?;

                #[derive(Serialize)]
                struct StartPayload<'a> {
                    data: String,
                    extensions: StartExtensions<'a>,
                }

                #[derive(Serialize)]
                struct StartExtensions<'a> {
                    authorization: &'a AuthExtension,
                }

                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("type", "start")?;
                map.serialize_entry("id", id)?;
                map.serialize_entry(
                    "payload",
                    &StartPayload {
                        data,
                        extensions: StartExtensions {
                            authorization: *authorization,
                        },
                    },
                )?;
                map.end()
            }
        }
    }
}

/// Messages received from the server.
#[derive(Debug)]
pub enum Event {
    /// The server accepted the connection handshake
    ConnectionAck,
    /// The server declined the connection handshake
    ConnectionError {
        /// Details of the rejection, if the server supplied any
        payload: Option<Payload>,
    },
    /// The server acknowledged a subscription start
    StartAck {
        /// Correlation id of the acknowledged subscription
        id: Option<String>,
    },
    /// A keep-alive, carrying nothing
    KeepAlive,
    /// A pushed subscription result
    Data {
        /// Correlation id of the subscription this result belongs to
        id: Option<String>,
        /// The pushed result
        payload: Payload,
    },
    /// The server reported an error on the connection or subscription
    Error {
        /// Correlation id, when the error relates to a subscription
        id: Option<String>,
        /// Details of the error, if the server supplied any
        payload: Option<Payload>,
    },
    /// A message kind this client does not know about.
    ///
    /// Tolerated in every state for forward compatibility.
    Unknown {
        /// The unrecognised `type` field
        kind: String,
    },
}

impl Event {
    /// The wire-level kind of this event
    pub fn kind(&self) -> &str {
        match self {
            Event::ConnectionAck => "connection_ack",
            Event::ConnectionError { .. } => "connection_error",
            Event::StartAck { .. } => "start_ack",
            Event::KeepAlive => "ka",
            Event::Data { .. } => "data",
            Event::Error { .. } => "error",
            Event::Unknown { kind } => kind,
        }
    }

    /// The error types carried by this event's payload, if any.
    pub(crate) fn error_types(&self) -> Vec<String> {
        match self {
            Event::ConnectionError { payload } | Event::Error { payload, .. } => payload
                .as_ref()
                .map(Payload::error_types)
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Frame {
            r#type: String,
            #[serde(default)]
            id: Option<String>,
            #[serde(default)]
            payload: Option<Payload>,
        }

        let frame = Frame::deserialize(deserializer)?;

        Ok(match frame.r#type.as_str() {
            "connection_ack" => Event::ConnectionAck,
            "connection_error" => Event::ConnectionError {
                payload: frame.payload,
            },
            "start_ack" => Event::StartAck { id: frame.id },
            "ka" => Event::KeepAlive,
            "data" => Event::Data {
                id: frame.id,
                payload: frame.payload.ok_or_else(|| {
                    serde::de::Error::custom("received a data frame without a payload")
                })?,
            },
            "error" => Event::Error {
                id: frame.id,
                payload: frame.payload,
            },
            _ => Event::Unknown { kind: frame.r#type },
        })
    }
}
