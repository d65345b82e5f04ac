use async_tungstenite::tungstenite::{
    self, client::IntoClientRequest, http::HeaderValue, protocol::CloseFrame,
};
use futures::{future::BoxFuture, AsyncRead, AsyncWrite, SinkExt, StreamExt};

use crate::{
    connection::{Connection, Message},
    endpoint::RealtimeEndpoint,
    logging::trace,
    Error,
};

/// Dials a resolved realtime endpoint.
///
/// Both the base messaging protocol and the auth-carrying string are
/// offered in `Sec-WebSocket-Protocol`; the server is expected to select
/// the former.
pub async fn connect(
    endpoint: &RealtimeEndpoint,
) -> Result<async_tungstenite::WebSocketStream<async_tungstenite::tokio::ConnectStream>, Error> {
    let mut request = endpoint
        .url
        .as_str()
        .into_client_request()
        .map_err(|error| Error::Connect(error.to_string()))?;

    let offered = endpoint.subprotocols().join(", ");

    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_str(&offered).map_err(|error| Error::Connect(error.to_string()))?,
    );

    trace!("dialing {}", endpoint.url);

    let (connection, _) = async_tungstenite::tokio::connect_async(request)
        .await
        .map_err(|error| Error::Connect(error.to_string()))?;

    Ok(connection)
}

impl<T> Connection for async_tungstenite::WebSocketStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn receive(&mut self) -> BoxFuture<'_, Option<Message>> {
        Box::pin(async move {
            loop {
                match self.next().await?.ok()? {
                    tungstenite::Message::Text(text) => return Some(Message::Text(text)),
                    tungstenite::Message::Ping(_) => return Some(Message::Ping),
                    tungstenite::Message::Pong(_) => return Some(Message::Pong),
                    tungstenite::Message::Close(frame) => {
                        return Some(Message::Close {
                            code: frame.as_ref().map(|frame| frame.code.into()),
                            reason: frame.map(|frame| frame.reason.to_string()),
                        })
                    }
                    tungstenite::Message::Frame(_) | tungstenite::Message::Binary(_) => continue,
                }
            }
        })
    }

    fn send(&mut self, message: Message) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            <Self as SinkExt<tungstenite::Message>>::send(
                self,
                match message {
                    Message::Text(text) => tungstenite::Message::Text(text),
                    Message::Close { code, reason } => {
                        tungstenite::Message::Close(code.zip(reason).map(|(code, reason)| {
                            CloseFrame {
                                code: code.into(),
                                reason: reason.into(),
                            }
                        }))
                    }
                    Message::Ping => tungstenite::Message::Ping(vec![]),
                    Message::Pong => tungstenite::Message::Pong(vec![]),
                },
            )
            .await
            .map_err(|error| Error::Send(error.to_string()))
        })
    }
}
