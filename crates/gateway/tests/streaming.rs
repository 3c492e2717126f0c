//! End-to-end tests: an in-process server on 127.0.0.1:0 driven by the
//! stream client and plain `reqwest`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use sr_client::{send_message, ClientError, StreamClient, StreamClientBuilder};
use sr_domain::config::{Config, EmitterConfig};
use sr_gateway::state::AppState;
use sr_protocol::{Frame, FrameDecoder};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    base: String,
    state: AppState,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let config = Config {
            emitter: EmitterConfig {
                thinking_delay_ms: 10,
                chunk_delay_min_ms: 1,
                chunk_delay_max_ms: 3,
                end_delay_ms: 5,
                reply_template: "Echo: {message}".into(),
            },
            ..Default::default()
        };
        let state = AppState::new(Arc::new(config));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(sr_gateway::server::serve(listener, state.clone(), async {
            let _ = stopped.await;
        }));

        Self {
            base,
            state,
            stop: Some(stop),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

/// Route every interesting event into one channel, in arrival order.
fn record(client: &StreamClient) -> mpsc::UnboundedReceiver<(String, Value)> {
    let (tx, rx) = mpsc::unbounded_channel();
    for name in [
        "connected",
        "heartbeat",
        "message_start",
        "message_chunk",
        "message_end",
        "error",
        "server_shutdown",
    ] {
        let tx = tx.clone();
        client.on(name, move |data: &Value| {
            let _ = tx.send((name.to_string(), data.clone()));
        });
    }
    rx
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<(String, Value)>) -> (String, Value) {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Read raw body chunks until one full frame decodes.
async fn next_frame(
    response: &mut reqwest::Response,
    decoder: &mut FrameDecoder,
    pending: &mut Vec<Frame>,
) -> Option<Frame> {
    loop {
        if !pending.is_empty() {
            return Some(pending.remove(0));
        }
        let chunk = tokio::time::timeout(WAIT, response.chunk())
            .await
            .expect("timed out reading stream")
            .unwrap()?;
        pending.extend(decoder.push_bytes(&chunk));
    }
}

#[tokio::test]
async fn send_streams_reply_to_connected_client() {
    let server = TestServer::start().await;
    let client = StreamClientBuilder::new()
        .url(server.url("/connect"))
        .auto_reconnect(false)
        .build()
        .unwrap();
    let mut events = record(&client);

    client.connect().unwrap();
    let (name, data) = next_event(&mut events).await;
    assert_eq!(name, "connected");
    assert_eq!(data["message"], "connected");
    let id = data["clientId"].as_str().unwrap().to_string();
    client.set_client_id(id.clone());
    assert!(client.is_connected());

    let http = reqwest::Client::new();
    let count: Value = http.get(server.url("/count")).send().await.unwrap().json().await.unwrap();
    assert_eq!(count["count"], 1);
    assert_eq!(count["clients"][0], id.as_str());

    send_message(&http, &server.base, &id, "hi").await.unwrap();

    let (name, data) = next_event(&mut events).await;
    assert_eq!(name, "message_start");
    assert_eq!(data["type"], "start");

    let mut text = String::new();
    let mut next_index = 0;
    let full = loop {
        let (name, data) = next_event(&mut events).await;
        match name.as_str() {
            "message_chunk" => {
                assert_eq!(data["index"], next_index);
                next_index += 1;
                text.push_str(data["content"].as_str().unwrap());
            }
            "message_end" => break data["fullMessage"].as_str().unwrap().to_string(),
            other => panic!("unexpected event {other}"),
        }
    };
    assert_eq!(text, "Echo: hi");
    assert_eq!(full, "Echo: hi");
    assert_eq!(next_index, "Echo: hi".len());

    client.disconnect();
    server.stop().await;
}

#[tokio::test]
async fn send_rejections_map_to_status_codes() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();

    let err = send_message(&http, &server.base, "anything", "   ").await.unwrap_err();
    assert_eq!(err, ClientError::InvalidArgument("empty message".into()));

    let err = send_message(&http, &server.base, "123-nobodyhere", "hi").await.unwrap_err();
    assert_eq!(err, ClientError::NotFound("client not connected".into()));

    let res = http
        .post(server.url("/send"))
        .json(&serde_json::json!({ "message": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing client id");

    server.stop().await;
}

#[tokio::test]
async fn connect_sets_stream_headers_and_sends_connected_first() {
    let server = TestServer::start().await;
    let mut response = reqwest::Client::new()
        .get(server.url("/connect"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["content-type"], "text/event-stream");
    assert_eq!(headers["cache-control"], "no-cache");
    assert_eq!(headers["x-accel-buffering"], "no");

    let mut decoder = FrameDecoder::new();
    let mut pending = Vec::new();
    let first = next_frame(&mut response, &mut decoder, &mut pending)
        .await
        .unwrap();
    assert_eq!(first.event(), "connected");
    let id = first.data()["clientId"].as_str().unwrap();
    assert!(server.state.registry.contains(id));

    let health: Value = reqwest::get(server.url("/health")).await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["activeConnections"], 1);

    drop(response);
    server.stop().await;
}

#[tokio::test]
async fn shutdown_sends_notice_and_closes_streams() {
    let server = TestServer::start().await;
    let mut response = reqwest::Client::new()
        .get(server.url("/connect"))
        .send()
        .await
        .unwrap();

    let mut decoder = FrameDecoder::new();
    let mut pending = Vec::new();
    let first = next_frame(&mut response, &mut decoder, &mut pending)
        .await
        .unwrap();
    assert_eq!(first.event(), "connected");

    let registry = server.state.registry.clone();
    let stopping = tokio::spawn(server.stop());

    let notice = next_frame(&mut response, &mut decoder, &mut pending)
        .await
        .unwrap();
    assert_eq!(notice.event(), "server_shutdown");
    assert!(notice.data()["message"].is_string());
    assert!(next_frame(&mut response, &mut decoder, &mut pending)
        .await
        .is_none());

    stopping.await.unwrap();
    assert!(registry.is_empty());
    assert!(registry.is_closed());
}
