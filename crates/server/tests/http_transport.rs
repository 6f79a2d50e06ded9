//! Requests through the axum router: bearer header, websocket init payload
//! and the health check.

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tower::util::ServiceExt;

use common::{FakeChat, FakeSpeech, Harness};
use yapgpt_server::auth::Claims;

const ME: &str = "{ me { name email } }";

async fn harness() -> Harness {
    Harness::new(FakeChat::default(), FakeSpeech::default()).await
}

fn graphql_request(query: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/graphql")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder
        .body(Body::from(json!({ "query": query }).to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn post(h: &Harness, query: &str, authorization: Option<&str>) -> Value {
    let app = yapgpt_server::app(h.state.clone());
    let response = app.oneshot(graphql_request(query, authorization)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    extract_json(response.into_body()).await
}

fn first_error_code(body: &Value) -> &str {
    body["errors"][0]["extensions"]["code"].as_str().unwrap_or_default()
}

fn expired_token(h: &Harness, id: &str) -> String {
    let past = Utc::now() - chrono::Duration::hours(3);
    h.state
        .auth
        .encode_claims(&Claims {
            username: "ada".into(),
            email: "ada@example.com".into(),
            id: id.into(),
            iat: past.timestamp(),
            exp: (past + chrono::Duration::minutes(5)).timestamp(),
        })
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let h = harness().await;
    let app = yapgpt_server::app(h.state.clone());

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).starts_with("OK"));
}

#[tokio::test]
async fn test_bearer_header_identifies_caller() {
    let h = harness().await;
    let (_, token) = h.register("ada", "ada@example.com", "secret123").await;

    let body = post(&h, ME, Some(&format!("Bearer {token}"))).await;
    assert!(body.get("errors").is_none(), "{body}");
    assert_eq!(body["data"]["me"]["name"], "ada");
    assert_eq!(body["data"]["me"]["email"], "ada@example.com");
}

#[tokio::test]
async fn test_missing_or_expired_token_is_unauthenticated() {
    let h = harness().await;
    let (id, _) = h.register("ada", "ada@example.com", "secret123").await;

    let anonymous = post(&h, ME, None).await;
    assert_eq!(first_error_code(&anonymous), "UNAUTHENTICATED");

    let expired = format!("Bearer {}", expired_token(&h, &id));
    let body = post(&h, ME, Some(&expired)).await;
    assert_eq!(first_error_code(&body), "UNAUTHENTICATED");

    let garbage = post(&h, ME, Some("Bearer not-a-jwt")).await;
    assert_eq!(first_error_code(&garbage), "UNAUTHENTICATED");
}

/// Serve the app on an ephemeral port and return its websocket URL
async fn serve(h: &Harness) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = yapgpt_server::app(h.state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{addr}/ws")
}

/// Run `query` over a graphql-transport-ws connection and return the first
/// message answering it
async fn ws_execute(url: &str, init_payload: Value, query: &str) -> Value {
    let mut request = url.into_client_request().unwrap();
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        "graphql-transport-ws".parse().unwrap(),
    );
    let (mut socket, _) = tokio_tungstenite::connect_async(request).await.unwrap();

    let init = json!({ "type": "connection_init", "payload": init_payload });
    socket.send(Message::text(init.to_string())).await.unwrap();
    let subscribe = json!({ "id": "1", "type": "subscribe", "payload": { "query": query } });
    socket.send(Message::text(subscribe.to_string())).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(message) = socket.next().await {
            let message = message.unwrap();
            let Ok(text) = message.to_text() else { continue };
            let Ok(value) = serde_json::from_str::<Value>(text) else { continue };
            if value["id"] == "1" && (value["type"] == "next" || value["type"] == "error") {
                return value;
            }
        }
        panic!("websocket closed without answering");
    })
    .await
    .expect("no answer over websocket")
}

#[tokio::test]
async fn test_websocket_init_payload_identifies_caller() {
    let h = harness().await;
    let (_, token) = h.register("ada", "ada@example.com", "secret123").await;
    let url = serve(&h).await;

    let answer = ws_execute(&url, json!({ "Authorization": format!("Bearer {token}") }), ME).await;
    assert_eq!(answer["payload"]["data"]["me"]["name"], "ada", "{answer}");

    let anonymous = ws_execute(&url, json!({}), ME).await;
    assert!(anonymous.to_string().contains("UNAUTHENTICATED"), "{anonymous}");
}
