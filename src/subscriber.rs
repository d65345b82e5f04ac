//! The per-connection protocol state machine.
//!
//! A [Subscriber] owns its connection exclusively and drives it through a
//! strict linear lifecycle: handshake, subscription start, then the active
//! read loop. There are no backward transitions and at most one
//! subscription in flight per connection, so every loop below is a plain
//! sequential read with no dispatch table.

use std::{future::Future, time::Duration};

use futures::{future::FutureExt, pin_mut, select};
use futures_timer::Delay;
use tokio_util::sync::CancellationToken;

use crate::{
    connection::{Connection, Message},
    endpoint::AuthExtension,
    error::BoxError,
    logging::{trace, warning},
    protocol::{Event, Payload, Request},
    Error,
};

pub(crate) struct Subscriber {
    connection: Box<dyn Connection + Send>,
    auth: AuthExtension,
    id: String,
    read_timeout: Duration,
    write_timeout: Duration,
    deadline: Duration,
    budget: Delay,
    cancel: CancellationToken,
}

impl Subscriber {
    pub(crate) fn new(
        connection: Box<dyn Connection + Send>,
        auth: AuthExtension,
        id: String,
        read_timeout: Duration,
        write_timeout: Duration,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Subscriber {
            connection,
            auth,
            id,
            read_timeout,
            write_timeout,
            deadline,
            budget: Delay::new(deadline),
            cancel,
        }
    }

    /// Sends `connection_init` and reads until the server acknowledges the
    /// connection.
    pub(crate) async fn initialize(&mut self) -> Result<(), Error> {
        self.send(Message::connection_init()).await?;

        loop {
            match self.read().await? {
                Event::ConnectionAck => {
                    trace!("connection_ack received, handshake completed");
                    return Ok(());
                }
                Event::ConnectionError { payload } => {
                    return Err(Error::HandshakeRejected(describe_rejection(payload)));
                }
                event => {
                    warning!("received unexpected {} during handshake", event.kind());
                }
            }
        }
    }

    /// Sends the start message for this subscriber's correlation id and
    /// reads until the server acknowledges it.
    pub(crate) async fn start(&mut self, subscription: &Request) -> Result<(), Error> {
        let message = Message::start(&self.id, subscription, &self.auth)?;
        self.send(message).await?;

        loop {
            match self.read().await? {
                Event::KeepAlive => {}
                Event::StartAck { id } if id.as_deref() == Some(self.id.as_str()) => {
                    trace!("subscription {} acknowledged", self.id);
                    return Ok(());
                }
                Event::StartAck { id } => {
                    // Should not happen with a single in-flight subscription
                    warning!("received start_ack for {:?}, expected {}", id, self.id);
                }
                event @ Event::Error { .. } => {
                    let error_types = event.error_types();

                    for error_type in &error_types {
                        warning!("server rejected subscription: {}", error_type);
                    }

                    return Err(Error::SubscriptionRejected(error_types));
                }
                event => {
                    warning!("received unexpected {} while starting", event.kind());
                }
            }
        }
    }

    /// Reads pushed messages, forwarding each matching payload to the
    /// handler until it reports completion by returning `false`.
    pub(crate) async fn stream<Handler>(&mut self, mut handler: Handler) -> Result<(), Error>
    where
        Handler: FnMut(&Payload) -> Result<bool, BoxError>,
    {
        loop {
            match self.read().await? {
                Event::KeepAlive => {}
                Event::Data { id, payload } if id.as_deref() == Some(self.id.as_str()) => {
                    trace!("received data for subscription {}", self.id);

                    let keep_going =
                        handler(&payload).map_err(|error| Error::Handler(error.to_string()))?;

                    if !keep_going {
                        trace!("data handler requested stop");
                        return Ok(());
                    }
                }
                Event::Data { id, .. } => {
                    warning!("dropping data for subscription {:?}, expected {}", id, self.id);
                }
                event @ Event::Error { .. } => {
                    let error_types = event.error_types();

                    for error_type in &error_types {
                        warning!("server reported stream error: {}", error_type);
                    }

                    return Err(Error::Stream(error_types));
                }
                event => {
                    warning!("received unexpected {} on active subscription", event.kind());
                }
            }
        }
    }

    /// Runs a caller-supplied future under this operation's deadline and
    /// cancellation signal.
    pub(crate) async fn bounded<T>(&mut self, task: impl Future<Output = T>) -> Result<T, Error> {
        let deadline = self.deadline;

        let task = task.fuse();
        let cancelled = self.cancel.cancelled().fuse();
        pin_mut!(task, cancelled);

        let mut budget = (&mut self.budget).fuse();

        select! {
            value = task => Ok(value),
            _ = budget => Err(Error::Timeout(deadline)),
            _ = cancelled => Err(Error::Cancelled),
        }
    }

    /// Closes the connection. Best effort: a peer that won't take the close
    /// frame within the write window is abandoned.
    ///
    /// Consumes the subscriber, so a connection is closed at most once, and
    /// deliberately ignores the cancellation signal so an aborted operation
    /// still closes cleanly.
    pub(crate) async fn close(mut self) {
        trace!("closing connection for subscription {}", self.id);

        let send = self.connection.send(Message::close()).fuse();
        let window = Delay::new(self.write_timeout).fuse();
        pin_mut!(send, window);

        select! {
            _ = send => {}
            _ = window => warning!("timed out sending close frame"),
        }
    }

    /// Reads the next protocol event.
    ///
    /// The inactivity window re-arms on every read, so a peer that keeps
    /// sending keep-alives is treated as healthy. Websocket-level ping/pong
    /// frames are handled below the protocol and also re-arm the window.
    async fn read(&mut self) -> Result<Event, Error> {
        let read_timeout = self.read_timeout;
        let deadline = self.deadline;

        loop {
            let received = {
                let receive = self.connection.receive().fuse();
                let window = Delay::new(read_timeout).fuse();
                let cancelled = self.cancel.cancelled().fuse();
                pin_mut!(receive, window, cancelled);

                let mut budget = (&mut self.budget).fuse();

                select! {
                    received = receive => received,
                    _ = window => return Err(Error::ReadTimeout(read_timeout)),
                    _ = budget => return Err(Error::Timeout(deadline)),
                    _ = cancelled => return Err(Error::Cancelled),
                }
            };

            match received {
                None => return Err(Error::Unknown("connection dropped".into())),
                Some(Message::Ping | Message::Pong) => continue,
                Some(Message::Close { code, reason }) => {
                    return Err(Error::Close(
                        code.unwrap_or_default(),
                        reason.unwrap_or_default(),
                    ));
                }
                Some(message @ Message::Text(_)) => return message.deserialize(),
            }
        }
    }

    async fn send(&mut self, message: Message) -> Result<(), Error> {
        let write_timeout = self.write_timeout;
        let deadline = self.deadline;

        let send = self.connection.send(message).fuse();
        let window = Delay::new(write_timeout).fuse();
        let cancelled = self.cancel.cancelled().fuse();
        pin_mut!(send, window, cancelled);

        let mut budget = (&mut self.budget).fuse();

        select! {
            result = send => result,
            _ = window => Err(Error::WriteTimeout(write_timeout)),
            _ = budget => Err(Error::Timeout(deadline)),
            _ = cancelled => Err(Error::Cancelled),
        }
    }
}

fn describe_rejection(payload: Option<Payload>) -> String {
    match payload {
        Some(payload) if !payload.errors.is_empty() => payload.error_types().join(", "),
        Some(payload) => serde_json::to_string(&payload)
            .unwrap_or_else(|_| "unprintable rejection payload".into()),
        None => "no details supplied".into(),
    }
}
