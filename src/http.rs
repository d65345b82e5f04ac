//! The one-shot HTTP execution path, used standalone for queries and
//! mutations and as the trigger action inside a rendezvous.

use std::time::Duration;

use reqwest::{header, StatusCode};

use crate::{
    client::Client,
    logging::trace,
    protocol::{Payload, Request},
    Error,
};

/// How long a one-shot HTTP call may take, unless overridden
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl Client {
    /// Executes a query or mutation as a one-shot HTTP call.
    ///
    /// Server-reported GraphQL errors do not fail the call; they are
    /// returned in the payload for the caller to inspect. Transport
    /// failures and non-OK statuses surface as [Error::Http].
    pub async fn execute(&self, request: &Request) -> Result<Payload, Error> {
        trace!("executing request against {}", self.endpoint());

        let response = self
            .http()
            .post(self.endpoint().as_str())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, self.access_token())
            .json(request)
            .send()
            .await
            .map_err(|error| Error::Http(error.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|error| Error::Http(error.to_string()))?;

        if status != StatusCode::OK {
            return Err(Error::Http(format!(
                "unexpected status code: {status} {:?}",
                String::from_utf8_lossy(&body)
            )));
        }

        serde_json::from_slice(&body).map_err(|error| Error::Decode(error.to_string()))
    }
}
