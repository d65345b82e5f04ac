//! Trigger-and-wait coordination over a realtime connection.
//!
//! The service family this crate targets correlates pushed results to the
//! caller's identity on the server side, not to anything the client sends
//! with the trigger. The subscription therefore has to be fully
//! acknowledged *before* the trigger runs, or the server may publish into
//! the void and the result is silently lost. [Rendezvous::run] sequences
//! that ordering as one bounded, cancellable operation.

use std::{future::Future, time::Duration};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    connection::Connection,
    endpoint::AuthExtension,
    error::BoxError,
    logging::trace,
    protocol::{Payload, Request},
    subscriber::Subscriber,
    Error,
};

/// How long a rendezvous may take end to end, unless overridden
pub const DEFAULT_OPERATION_DEADLINE: Duration = Duration::from_secs(180);

/// How long a single read may wait for the peer, unless overridden
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a single write may take, unless overridden
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// A single trigger-and-wait operation over an already established
/// connection.
///
/// Configure it builder-style, then consume it with [run](Rendezvous::run).
/// Each run generates a fresh correlation id; a `Rendezvous` is never
/// reused.
///
/// ```no_run
/// use appsync_ws_client::{AuthExtension, Rendezvous, Request};
/// #
/// # async fn example() -> Result<(), appsync_ws_client::Error> {
/// # let connection = appsync_ws_client::__doc_utils::Conn;
/// let auth = AuthExtension::new("svc.example.com", "token");
///
/// Rendezvous::new(auth)
///     .deadline(std::time::Duration::from_secs(60))
///     .run(
///         connection,
///         &Request::new("subscription OnPublish { onPublish { id } }"),
///         || async { Ok(()) },
///         |_payload| Ok(false),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Rendezvous {
    auth: AuthExtension,
    deadline: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    cancel: CancellationToken,
}

impl Rendezvous {
    /// Creates a Rendezvous with default timeouts and the given auth
    /// snapshot.
    pub fn new(auth: AuthExtension) -> Self {
        Rendezvous {
            auth,
            deadline: DEFAULT_OPERATION_DEADLINE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the wall-clock budget for the whole operation: handshake,
    /// subscription start, trigger and the wait for data.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Sets the rolling inactivity window applied to each read.
    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Sets the window applied to each write.
    pub fn write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Sets the token that cancels this operation.
    ///
    /// Cancelling fails any in-flight read or write promptly and unwinds
    /// the state machine; the connection is still closed on the way out.
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the operation: handshake, subscription start, the trigger
    /// action (exactly once, strictly after the matching start_ack), then
    /// streams pushed payloads to `handler` until it returns `false`.
    ///
    /// Failures are surfaced whole; nothing is retried internally. The
    /// connection is closed exactly once on every path, including
    /// cancellation and deadline expiry.
    pub async fn run<Conn, Trigger, TriggerFut, Handler>(
        self,
        connection: Conn,
        subscription: &Request,
        trigger: Trigger,
        handler: Handler,
    ) -> Result<(), Error>
    where
        Conn: Connection + Send + 'static,
        Trigger: FnOnce() -> TriggerFut,
        TriggerFut: Future<Output = Result<(), BoxError>>,
        Handler: FnMut(&Payload) -> Result<bool, BoxError>,
    {
        let id = Uuid::new_v4().to_string();

        trace!("starting rendezvous operation {}", id);

        let mut subscriber = Subscriber::new(
            Box::new(connection),
            self.auth,
            id,
            self.read_timeout,
            self.write_timeout,
            self.deadline,
            self.cancel,
        );

        let outcome = run_to_completion(&mut subscriber, subscription, trigger, handler).await;

        subscriber.close().await;

        outcome
    }
}

async fn run_to_completion<Trigger, TriggerFut, Handler>(
    subscriber: &mut Subscriber,
    subscription: &Request,
    trigger: Trigger,
    handler: Handler,
) -> Result<(), Error>
where
    Trigger: FnOnce() -> TriggerFut,
    TriggerFut: Future<Output = Result<(), BoxError>>,
    Handler: FnMut(&Payload) -> Result<bool, BoxError>,
{
    subscriber.initialize().await?;
    subscriber.start(subscription).await?;

    // The subscription is acknowledged; only now may the server-side work
    // be kicked off. If the trigger fails there is nothing to wait for.
    subscriber
        .bounded(trigger())
        .await?
        .map_err(|error| Error::Trigger(error.to_string()))?;

    subscriber.stream(handler).await
}
