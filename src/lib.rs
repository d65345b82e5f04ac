//! # appsync-ws-client
//!
//! appsync-ws-client talks to GraphQL services of the AWS AppSync family,
//! which expose two interaction modes over two transports: one-shot
//! queries & mutations over HTTP POST, and server-push subscriptions over
//! a persistent websocket using the AppSync realtime handshake.
//!
//! The interesting part of that service family is the *rendezvous*
//! pattern: the server correlates pushed results to your identity, not to
//! the request that triggered them, so a subscription must be opened and
//! fully acknowledged before the HTTP call that causes the server to
//! publish, or the result is silently lost. [Client::rendezvous]
//! and [Rendezvous] sequence subscribe → trigger → await push → close as
//! one bounded, cancellable operation.
//!
//! Websocket transport is pluggable through the [Connection] trait, with a
//! built in [async-tungstenite][async-tungstenite] implementation behind
//! the `tungstenite` feature (on by default). The HTTP path lives behind
//! the `http` feature (also on by default).
//!
//! [async-tungstenite]: https://github.com/sdroege/async-tungstenite

#![warn(missing_docs)]

mod client;
mod connection;
mod endpoint;
mod error;
mod logging;
mod protocol;
mod rendezvous;
mod subscriber;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "tungstenite")]
mod native;

#[doc(hidden)]
pub mod __doc_utils {
    //! Only public for use in doc tests, not part of the public API.
    pub use crate::doc_utils::Conn;
}

mod doc_utils;

pub use client::{Client, ClientBuilder};
pub use connection::{Connection, Message};
pub use endpoint::{AuthExtension, RealtimeEndpoint, GRAPHQL_WS_PROTOCOL};
pub use error::{BoxError, Error};
pub use protocol::{Event, Payload, PayloadError, PayloadExtensions, Request};
pub use rendezvous::{
    Rendezvous, DEFAULT_OPERATION_DEADLINE, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT,
};

#[cfg(feature = "http")]
pub use http::DEFAULT_REQUEST_TIMEOUT;

#[cfg(feature = "tungstenite")]
pub use native::connect;
