//! A local HTTP + websocket server speaking the realtime wire protocol,
//! for driving the real dial and execute paths in tests.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::prelude::{Engine as _, BASE64_URL_SAFE_NO_PAD};
use serde_json::{json, Value};
use tokio::sync::broadcast;

pub struct SubscriptionServer {
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    port: u16,
    publish: broadcast::Sender<Value>,
}

impl Drop for SubscriptionServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.send(()).ok();
        }
    }
}

#[derive(Clone)]
struct AppState {
    publish: broadcast::Sender<Value>,
}

impl SubscriptionServer {
    pub const TOKEN: &'static str = "test-access-token";

    pub async fn start() -> SubscriptionServer {
        let (publish, _) = broadcast::channel(16);

        let app = Router::new()
            .route("/graphql", post(graphql_handler))
            .route("/graphql/realtime", get(realtime_handler))
            .with_state(AppState {
                publish: publish.clone(),
            });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (shutdown_sender, shutdown_receiver) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_receiver.await.ok();
                })
                .await
                .unwrap();
        });

        tokio::time::sleep(Duration::from_millis(20)).await;

        SubscriptionServer {
            port,
            shutdown: Some(shutdown_sender),
            publish,
        }
    }

    pub fn http_url(&self) -> String {
        format!("http://127.0.0.1:{}/graphql", self.port)
    }

    #[allow(unused)]
    pub fn publish(&self, update: Value) {
        self.publish.send(update).ok();
    }
}

async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        != Some(SubscriptionServer::TOKEN)
    {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"errors": [{"errorType": "UnauthorizedException"}]})),
        );
    }

    let query = request["query"].as_str().unwrap_or_default();

    // A "Boom" document simulates a server-side GraphQL failure
    if query.contains("Boom") {
        return (
            StatusCode::OK,
            Json(json!({"errors": [{"errorType": "InternalError"}]})),
        );
    }

    // Executing a mutation publishes the result to any open subscription
    if query.starts_with("mutation") {
        state
            .publish
            .send(json!({"onPublish": {"id": "published-1"}}))
            .ok();
    }

    (
        StatusCode::OK,
        Json(json!({"data": {"publish": {"id": "published-1"}}})),
    )
}

async fn realtime_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let authorized = subprotocol_token(&headers).as_deref() == Some(SubscriptionServer::TOKEN);

    ws.protocols(["graphql-ws"])
        .on_upgrade(move |socket| drive_protocol(socket, state, authorized))
        .into_response()
}

/// Pulls the bearer token out of the `header-` sub-protocol offer.
fn subprotocol_token(headers: &HeaderMap) -> Option<String> {
    let offered = headers.get("sec-websocket-protocol")?.to_str().ok()?;

    let encoded = offered
        .split(',')
        .map(str::trim)
        .find_map(|protocol| protocol.strip_prefix("header-"))?;

    let auth: Value = serde_json::from_slice(&BASE64_URL_SAFE_NO_PAD.decode(encoded).ok()?).ok()?;

    Some(auth["Authorization"].as_str()?.to_owned())
}

async fn drive_protocol(mut socket: WebSocket, state: AppState, authorized: bool) {
    let mut updates = state.publish.subscribe();
    let mut subscription_id: Option<String> = None;

    loop {
        tokio::select! {
            message = socket.recv() => {
                let Some(Ok(WsMessage::Text(text))) = message else { return };
                let frame: Value = serde_json::from_str(&text).unwrap();

                match frame["type"].as_str().unwrap_or_default() {
                    "connection_init" if !authorized => {
                        send_frame(&mut socket, json!({
                            "type": "connection_error",
                            "payload": {"errors": [{"errorType": "UnauthorizedException"}]},
                        }))
                        .await;
                        return;
                    }
                    "connection_init" => {
                        send_frame(&mut socket, json!({"type": "connection_ack"})).await;
                        send_frame(&mut socket, json!({"type": "ka"})).await;
                    }
                    "start" => {
                        let id = frame["id"].as_str().unwrap().to_owned();

                        // The document must arrive double-encoded, with the
                        // auth extension repeated in the payload.
                        let document_ok =
                            serde_json::from_str::<Value>(frame["payload"]["data"].as_str().unwrap_or_default())
                                .map(|document| document["query"].is_string())
                                .unwrap_or(false);
                        let auth_repeated = frame["payload"]["extensions"]["authorization"]
                            ["Authorization"]
                            .as_str()
                            == Some(SubscriptionServer::TOKEN);

                        if !document_ok || !auth_repeated {
                            send_frame(&mut socket, json!({
                                "type": "error",
                                "id": id,
                                "payload": {"errors": [{"errorType": "MalformedRequestError"}]},
                            }))
                            .await;
                            continue;
                        }

                        send_frame(&mut socket, json!({"type": "start_ack", "id": id})).await;
                        subscription_id = Some(id);
                    }
                    _ => {}
                }
            }
            update = updates.recv() => {
                let (Ok(data), Some(id)) = (update, subscription_id.as_ref()) else { continue };

                send_frame(&mut socket, json!({"type": "ka"})).await;
                send_frame(&mut socket, json!({
                    "type": "data",
                    "id": id,
                    "payload": {"data": data},
                }))
                .await;
            }
        }
    }
}

async fn send_frame(socket: &mut WebSocket, frame: Value) {
    socket.send(WsMessage::Text(frame.to_string())).await.ok();
}
