use std::time::Duration;

use url::Url;

use crate::{
    endpoint::RealtimeEndpoint,
    rendezvous::{DEFAULT_OPERATION_DEADLINE, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT},
    Error,
};

/// A configured client for one service endpoint and one credential
/// snapshot.
///
/// The credential is immutable for the client's lifetime; it is not
/// refreshed, parsed or validated here. An expired credential surfaces as
/// a handshake or request rejection from the server.
#[derive(Debug)]
pub struct Client {
    endpoint: Url,
    access_token: String,
    read_timeout: Duration,
    write_timeout: Duration,
    operation_timeout: Duration,
    #[cfg(feature = "http")]
    http: reqwest::Client,
}

impl Client {
    /// Creates a Client with default timeouts.
    pub fn new(endpoint: &str, access_token: impl Into<String>) -> Result<Client, Error> {
        Client::builder().build(endpoint, access_token)
    }

    /// Creates a ClientBuilder.
    ///
    /// Same as calling `ClientBuilder::new()`.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The HTTP service endpoint this client talks to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Derives the realtime dial parameters for this client's endpoint and
    /// credential snapshot.
    pub fn realtime_endpoint(&self) -> Result<RealtimeEndpoint, Error> {
        RealtimeEndpoint::resolve(&self.endpoint, &self.access_token)
    }

    #[cfg(feature = "http")]
    pub(crate) fn access_token(&self) -> &str {
        &self.access_token
    }

    #[cfg(feature = "http")]
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

#[cfg(feature = "tungstenite")]
impl Client {
    /// Runs a full trigger-and-wait operation against this client's
    /// endpoint: dial, handshake, subscription start, then the trigger
    /// (strictly after the subscription is acknowledged) and the wait for
    /// pushed data.
    ///
    /// The whole operation is bounded by the client's operation timeout
    /// and by `cancel`; see [Rendezvous](crate::Rendezvous) for the exact
    /// semantics. Use [Rendezvous](crate::Rendezvous) directly to drive a
    /// connection you dialed yourself.
    ///
    /// ```no_run
    /// use appsync_ws_client::{Client, Request};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # async fn example() -> Result<(), appsync_ws_client::Error> {
    /// let client = Client::new("https://svc.example.com/graphql", "token")?;
    ///
    /// let subscription = Request::new("subscription OnPublish { onPublish { id } }");
    /// let query = Request::new("query Publish { publish { id } }");
    ///
    /// let mut result = None;
    ///
    /// client
    ///     .rendezvous(
    ///         &subscription,
    ///         CancellationToken::new(),
    ///         || async {
    ///             client.execute(&query).await?;
    ///             Ok(())
    ///         },
    ///         |payload| {
    ///             result = Some(payload.decode_data::<serde_json::Value>()?);
    ///             Ok(false)
    ///         },
    ///     )
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn rendezvous<Trigger, TriggerFut, Handler>(
        &self,
        subscription: &crate::Request,
        cancel: tokio_util::sync::CancellationToken,
        trigger: Trigger,
        handler: Handler,
    ) -> Result<(), Error>
    where
        Trigger: FnOnce() -> TriggerFut,
        TriggerFut: std::future::Future<Output = Result<(), crate::BoxError>>,
        Handler: FnMut(&crate::Payload) -> Result<bool, crate::BoxError>,
    {
        use futures::{future::FutureExt, pin_mut, select};
        use futures_timer::Delay;
        use std::time::Instant;

        let realtime = self.realtime_endpoint()?;
        let deadline = self.operation_timeout;
        let started = Instant::now();

        let connection = {
            let connect = crate::native::connect(&realtime).fuse();
            let budget = Delay::new(deadline).fuse();
            let cancelled = cancel.cancelled().fuse();
            pin_mut!(connect, budget, cancelled);

            select! {
                connection = connect => connection?,
                _ = budget => return Err(Error::Timeout(deadline)),
                _ = cancelled => return Err(Error::Cancelled),
            }
        };

        crate::Rendezvous::new(realtime.auth)
            .deadline(deadline.saturating_sub(started.elapsed()))
            .read_timeout(self.read_timeout)
            .write_timeout(self.write_timeout)
            .cancellation(cancel)
            .run(connection, subscription, trigger, handler)
            .await
    }
}

/// Builder for [Client]s.
///
/// ```rust
/// use appsync_ws_client::Client;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), appsync_ws_client::Error> {
/// let client = Client::builder()
///     .operation_timeout(Duration::from_secs(60))
///     .build("https://svc.example.com/graphql", "token")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ClientBuilder {
    read_timeout: Duration,
    write_timeout: Duration,
    operation_timeout: Duration,
    #[cfg(feature = "http")]
    request_timeout: Duration,
}

impl ClientBuilder {
    /// Creates a ClientBuilder with default timeouts.
    pub fn new() -> Self {
        ClientBuilder {
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_DEADLINE,
            #[cfg(feature = "http")]
            request_timeout: crate::http::DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the rolling inactivity window applied to each realtime read.
    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Sets the window applied to each realtime write.
    pub fn write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Sets the wall-clock budget for a whole rendezvous operation.
    pub fn operation_timeout(mut self, operation_timeout: Duration) -> Self {
        self.operation_timeout = operation_timeout;
        self
    }

    /// Sets the bound on one-shot HTTP calls.
    #[cfg(feature = "http")]
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Constructs a Client.
    ///
    /// The endpoint is parsed eagerly; a malformed address fails here with
    /// [Error::InvalidEndpoint] rather than on first use.
    pub fn build(self, endpoint: &str, access_token: impl Into<String>) -> Result<Client, Error> {
        let endpoint =
            Url::parse(endpoint).map_err(|error| Error::InvalidEndpoint(error.to_string()))?;

        #[cfg(feature = "http")]
        let http = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|error| Error::Http(error.to_string()))?;

        Ok(Client {
            endpoint,
            access_token: access_token.into(),
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            operation_timeout: self.operation_timeout,
            #[cfg(feature = "http")]
            http,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
