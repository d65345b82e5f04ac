//! Derivation of realtime connection parameters from an HTTP service
//! endpoint.
//!
//! AppSync deployments come in two shapes: the managed gateway exposes a
//! dedicated `*-realtime-api` hostname, while self-hosted proxies serve
//! realtime traffic from the same host under a `/realtime` path. Both
//! derivations are pure functions of the HTTP endpoint.

use base64::prelude::{Engine as _, BASE64_URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// The base messaging sub-protocol offered on every dial.
pub const GRAPHQL_WS_PROTOCOL: &str = "graphql-ws";

const HEADER_PROTOCOL_PREFIX: &str = "header-";

/// The auth material a realtime connection presents, encoded into the dial's
/// sub-protocol offer and repeated verbatim in the start message's
/// extensions.
///
/// Both encodings are derived from the same credential snapshot; a
/// connection never mixes auth material from two fetch attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthExtension {
    /// Hostname of the HTTP service endpoint
    pub host: String,
    /// The opaque bearer credential, uninterpreted by this crate
    #[serde(rename = "Authorization")]
    pub authorization: String,
}

impl AuthExtension {
    /// Constructs an AuthExtension for the given host and credential
    pub fn new(host: impl Into<String>, authorization: impl Into<String>) -> Self {
        AuthExtension {
            host: host.into(),
            authorization: authorization.into(),
        }
    }
}

/// The resolved dial parameters for a realtime connection.
#[derive(Debug, Clone)]
pub struct RealtimeEndpoint {
    /// The derived websocket address
    pub url: Url,
    /// The auth extension to repeat in the start message
    pub auth: AuthExtension,
    subprotocol: String,
}

impl RealtimeEndpoint {
    /// Derives the realtime address and sub-protocol offer for an HTTP
    /// service endpoint and a credential snapshot.
    ///
    /// Hosts following the managed gateway naming convention are rewritten
    /// to their realtime counterpart; any other host keeps its address and
    /// gains a `/realtime` path suffix. `https` maps to `wss`, anything
    /// else to `ws`.
    pub fn resolve(endpoint: &Url, access_token: &str) -> Result<RealtimeEndpoint, Error> {
        let host = endpoint
            .host_str()
            .ok_or_else(|| Error::InvalidEndpoint(format!("endpoint {endpoint} has no host")))?
            .to_owned();

        let auth = AuthExtension::new(&host, access_token);

        let mut url = endpoint.clone();

        if host.contains(".appsync-api.") && host.contains(".amazonaws.") {
            let realtime_host = host.replacen(".appsync-api.", ".appsync-realtime-api.", 1);

            url.set_host(Some(&realtime_host))
                .map_err(|error| Error::InvalidEndpoint(error.to_string()))?;
        } else {
            let path = format!("{}/realtime", url.path().trim_end_matches('/'));
            url.set_path(&path);
        }

        let scheme = if endpoint.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };

        url.set_scheme(scheme).map_err(|()| {
            Error::InvalidEndpoint(format!("cannot derive a realtime scheme for {endpoint}"))
        })?;

        let encoded_auth = serde_json::to_string(&auth)
            .map_err(|error| Error::Serializing(error.to_string()))?;

        let subprotocol = format!(
            "{HEADER_PROTOCOL_PREFIX}{}",
            BASE64_URL_SAFE_NO_PAD.encode(encoded_auth)
        );

        Ok(RealtimeEndpoint {
            url,
            auth,
            subprotocol,
        })
    }

    /// The sub-protocols to offer when dialing: the base messaging protocol
    /// and the auth-carrying string. The server selects the former and
    /// inspects the latter for credentials.
    pub fn subprotocols(&self) -> [&str; 2] {
        [GRAPHQL_WS_PROTOCOL, &self.subprotocol]
    }
}
