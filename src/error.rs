use std::time::Duration;

#[derive(thiserror::Error, Debug)]
/// Error type
pub enum Error {
    /// The service endpoint could not be parsed as a URL
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Dialing the realtime endpoint failed
    #[error("failed to connect: {0}")]
    Connect(String),
    /// The server declined the connection handshake
    #[error("handshake rejected by server: {0}")]
    HandshakeRejected(String),
    /// The server declined the subscription start
    #[error("subscription rejected by server, error types: {0:?}")]
    SubscriptionRejected(Vec<String>),
    /// The server pushed an error frame on an active subscription
    #[error("server reported stream errors: {0:?}")]
    Stream(Vec<String>),
    /// No message arrived within the read window
    #[error("read timed out after {0:?}")]
    ReadTimeout(Duration),
    /// A message could not be written within the write window
    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),
    /// The overall operation deadline elapsed
    #[error("gave up waiting after {0:?}")]
    Timeout(Duration),
    /// The trigger action failed, so no data was awaited
    #[error("trigger action failed: {0}")]
    Trigger(String),
    /// The data handler returned an error
    #[error("data handler failed: {0}")]
    Handler(String),
    /// The operation was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,
    /// An HTTP request failed or returned an unexpected status
    #[cfg(feature = "http")]
    #[error("http request failed: {0}")]
    Http(String),
    /// Unexpected close frame
    #[error("got close frame. code: {0}, reason: {1}")]
    Close(u16, String),
    /// Decoding / parsing error
    #[error("message decode error, reason: {0}")]
    Decode(String),
    /// Serializing error
    #[error("couldn't serialize message, reason: {0}")]
    Serializing(String),
    /// Sending error
    #[error("message sending error, reason: {0}")]
    Send(String),
    /// Unknown error
    #[error("unknown: {0}")]
    Unknown(String),
}

/// A boxed error, used where callers hand us failures of their own types.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
