//! Relay harness shared by the end-to-end suites.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use signal_relay::registry::RegistrySnapshot;
use signal_relay::{serve, AppState, Registry};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct Relay {
    pub addr: SocketAddr,
    pub registry: Registry,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Relay {
    pub async fn start() -> Self {
        Self::start_with(None).await
    }

    pub async fn start_with(metrics: Option<PrometheusHandle>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener bind");
        let addr = listener.local_addr().expect("local addr");
        let registry = Registry::new();
        let state = AppState::new(registry.clone(), metrics);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            serve(listener, state, async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
        });
        Self {
            addr,
            registry,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub async fn connect(&self) -> Client {
        let (client, _) = connect_async(self.ws_url())
            .await
            .expect("websocket connect");
        client
    }

    pub async fn join(&self, role: &str) -> Client {
        let mut client = self.connect().await;
        send(&mut client, json!({ "type": role })).await;
        client
    }

    /// Polls the registry until `check` holds.
    pub async fn wait_until(&self, check: impl Fn(&RegistrySnapshot) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let snapshot = self.registry.snapshot();
            if check(&snapshot) {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "registry never reached expected state: {snapshot:?}"
            );
            sleep(Duration::from_millis(10)).await;
        }
    }

    /// Issues a bare HTTP/1.1 request and returns `(status line, body)`.
    pub async fn http_get(&self, path: &str) -> (String, String) {
        let mut stream = TcpStream::connect(self.addr).await.expect("tcp connect");
        let request = format!("GET {path} HTTP/1.1\r\nHost: relay.test\r\nConnection: close\r\n\r\n");
        stream
            .write_all(request.as_bytes())
            .await
            .expect("write request");
        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .await
            .expect("read response");
        let (head, body) = response
            .split_once("\r\n\r\n")
            .unwrap_or((response.as_str(), ""));
        let status = head.lines().next().unwrap_or_default().to_owned();
        (status, body.to_owned())
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn send(client: &mut Client, value: Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

pub async fn recv(client: &mut Client) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("server frame is JSON");
        }
    }
}

pub async fn assert_silent(client: &mut Client) {
    let next = timeout(Duration::from_millis(200), client.next()).await;
    assert!(next.is_err(), "expected no frame, got {next:?}");
}
