//! Full round trips against a local server: real dial, sub-protocol
//! negotiation, HTTP trigger and push delivery.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use assert_matches::assert_matches;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use appsync_ws_client::{Client, Error, Request};
use subscription_server::SubscriptionServer;

mod subscription_server;

fn client_for(server: &SubscriptionServer, token: &str) -> Client {
    Client::builder()
        .operation_timeout(Duration::from_secs(10))
        .build(&server.http_url(), token)
        .unwrap()
}

#[tokio::test]
async fn rendezvous_round_trip() {
    let server = SubscriptionServer::start().await;
    let client = client_for(&server, SubscriptionServer::TOKEN);

    let subscription = Request::new("subscription OnPublish { onPublish { id } }");
    let mutation = Request::new("mutation Publish { publish { id } }");

    let received = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&received);

    let result = client
        .rendezvous(
            &subscription,
            CancellationToken::new(),
            || async {
                client.execute(&mutation).await?;
                Ok(())
            },
            move |payload| {
                *sink.lock().unwrap() = Some(payload.decode_data::<serde_json::Value>()?);
                Ok(false)
            },
        )
        .await;

    assert_matches!(result, Ok(()));
    assert_eq!(
        received.lock().unwrap().take().unwrap(),
        json!({"onPublish": {"id": "published-1"}})
    );
}

#[tokio::test]
async fn rejected_credentials_fail_the_handshake_before_the_trigger() {
    let server = SubscriptionServer::start().await;
    let client = client_for(&server, "stale-token");

    let triggered = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&triggered);

    let result = client
        .rendezvous(
            &Request::new("subscription OnPublish { onPublish { id } }"),
            CancellationToken::new(),
            move || {
                *flag.lock().unwrap() = true;
                futures::future::ready(Ok(()))
            },
            |_: &appsync_ws_client::Payload| Ok(false),
        )
        .await;

    assert_matches!(result, Err(Error::HandshakeRejected(reason)) => {
        assert!(reason.contains("UnauthorizedException"));
    });
    assert!(!*triggered.lock().unwrap());
}

#[tokio::test]
async fn failing_trigger_aborts_the_rendezvous() {
    let server = SubscriptionServer::start().await;
    let client = client_for(&server, SubscriptionServer::TOKEN);

    // The mutation hits the HTTP endpoint with a stale credential, so the
    // trigger itself fails after the subscription is up.
    let bad_client = client_for(&server, "stale-token");
    let mutation = Request::new("mutation Publish { publish { id } }");

    let result = client
        .rendezvous(
            &Request::new("subscription OnPublish { onPublish { id } }"),
            CancellationToken::new(),
            || async {
                bad_client.execute(&mutation).await?;
                Ok(())
            },
            |_: &appsync_ws_client::Payload| Ok(false),
        )
        .await;

    assert_matches!(result, Err(Error::Trigger(_)));
}

#[tokio::test]
async fn dialing_an_unreachable_endpoint_fails_to_connect() {
    // Nothing listens on this port
    let client = Client::builder()
        .operation_timeout(Duration::from_secs(5))
        .build("http://127.0.0.1:9/graphql", "token")
        .unwrap();

    let result = client
        .rendezvous(
            &Request::new("subscription OnPublish { onPublish { id } }"),
            CancellationToken::new(),
            || futures::future::ready(Ok(())),
            |_: &appsync_ws_client::Payload| Ok(false),
        )
        .await;

    assert_matches!(result, Err(Error::Connect(_)));
}
