//! The abstraction this crate drives websocket connections through.

use futures::future::BoxFuture;

use crate::{
    endpoint::AuthExtension,
    protocol::{ClientMessage, Request},
    Error,
};

/// Abstraction around a websocket connection.
///
/// A built in implementation is provided for `async_tungstenite` behind the
/// `tungstenite` feature. Users wishing to drive another websocket client
/// should implement this trait; tests can implement it with a scripted fake
/// to exercise the protocol without a socket.
pub trait Connection {
    /// Receive the next message on this connection.
    ///
    /// Returns `None` once the underlying connection has dropped.
    fn receive(&mut self) -> BoxFuture<'_, Option<Message>>;

    /// Send a message on this connection.
    fn send(&mut self, message: Message) -> BoxFuture<'_, Result<(), Error>>;
}

/// A websocket message.
///
/// Websocket client libraries usually provide their own version of this
/// enum. The [Connection] impl for a given client handles translation to &
/// from it.
pub enum Message {
    /// A message containing the given text payload
    Text(String),
    /// A message that closes the connection with the given code & reason
    Close {
        /// The status code for this close message
        code: Option<u16>,
        /// Some text explaining the reason the connection is being closed
        reason: Option<String>,
    },
    /// A ping
    Ping,
    /// A reply to a ping
    Pong,
}

impl Message {
    pub(crate) fn deserialize<T>(self) -> Result<T, Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let Message::Text(text) = self else {
            panic!("don't call deserialize on non-text messages");
        };

        serde_json::from_str(&text).map_err(|error| Error::Decode(error.to_string()))
    }

    pub(crate) fn connection_init() -> Self {
        Self::Text(
            serde_json::to_string(&ClientMessage::ConnectionInit)
                .expect("the init message has no payload so this can't fail"),
        )
    }

    pub(crate) fn start(
        id: &str,
        request: &Request,
        authorization: &AuthExtension,
    ) -> Result<Self, Error> {
        let encoded = serde_json::to_string(&ClientMessage::Start {
            id,
            request,
            authorization,
        })
        .map_err(|error| Error::Serializing(error.to_string()))?;

        Ok(Self::Text(encoded))
    }

    pub(crate) fn close() -> Self {
        Self::Close {
            code: Some(1000),
            reason: Some("subscription finished".into()),
        }
    }
}
