//! Mock HTTP servers for integration tests

use mockito::{Mock, Server, ServerGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storyboard_runtime::usage::InMemoryUsageRecorder;
use storyboard_runtime::{GenerationClient, GenerationClientBuilder, RetryPolicy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

pub const PATH: &str = "/api/proxy";

/// Retry policies with tiny delays so retry tests stay fast.
pub fn fast_builder(base_url: &str) -> GenerationClientBuilder {
    GenerationClientBuilder::new()
        .base_url(base_url)
        .timeout(Duration::from_secs(5))
        .local_retry(RetryPolicy::linear(3, Duration::from_millis(5)))
        .outer_retry(RetryPolicy::exponential(3, Duration::from_millis(5)))
}

pub fn client_with_recorder(base_url: &str) -> (GenerationClient, Arc<InMemoryUsageRecorder>) {
    let recorder = Arc::new(InMemoryUsageRecorder::default());
    let client = fast_builder(base_url)
        .usage_recorder(recorder.clone())
        .build()
        .expect("client builds");
    (client, recorder)
}

/// Test fixture that manages a mockito server
pub struct MockServerFixture {
    pub server: Arc<Mutex<ServerGuard>>,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self {
            server: Arc::new(Mutex::new(server)),
            base_url,
        }
    }

    pub fn client(&self) -> GenerationClient {
        fast_builder(&self.base_url).build().expect("client builds")
    }

    /// Streaming reply: each line is sent followed by a blank line.
    pub async fn mock_sse_stream(&self, lines: &[&str]) -> Mock {
        let body = lines
            .iter()
            .map(|line| format!("{}\n\n", line))
            .collect::<String>();
        let mut server = self.server.lock().await;
        server
            .mock("POST", PATH)
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await
    }

    pub async fn mock_json_response(&self, status: u16, body: &str, hits: usize) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", PATH)
            .with_status(status.into())
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }
}

/// What the scripted server does with the n-th connection.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Complete response with the given status and body.
    Status(u16, String),
    /// 200 with an event-stream body, sent in full.
    Stream(String),
    /// Announces a long body, sends `prefix`, then closes the connection.
    Truncated(String),
    /// Announces a long body, sends `prefix`, then goes silent.
    Stall(String),
    /// Accepts the request and never answers.
    Hang,
}

/// Raw TCP server that answers each connection from a script. The last
/// entry repeats once the script runs out. Every response closes the
/// connection, so one connection is one attempt.
pub struct ScriptedServer {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl ScriptedServer {
    pub async fn start(script: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((sock, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let reply = script.get(n).or(script.last()).cloned();
                tokio::spawn(async move {
                    if let Some(reply) = reply {
                        serve(sock, reply).await;
                    }
                });
            }
        });
        Self {
            base_url: format!("http://{}", addr),
            hits,
        }
    }

    /// Connections accepted so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn read_request(sock: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match sock.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
        let len = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + len {
            return;
        }
    }
}

async fn serve(mut sock: TcpStream, reply: Reply) {
    read_request(&mut sock).await;
    let head = |status: u16, ctype: &str, len: usize| {
        format!(
            "HTTP/1.1 {} Scripted\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
            status, ctype, len
        )
    };
    match reply {
        Reply::Status(status, body) => {
            let _ = sock
                .write_all(format!("{}{}", head(status, "application/json", body.len()), body).as_bytes())
                .await;
        }
        Reply::Stream(body) => {
            let _ = sock
                .write_all(format!("{}{}", head(200, "text/event-stream", body.len()), body).as_bytes())
                .await;
        }
        Reply::Truncated(prefix) => {
            let _ = sock
                .write_all(format!("{}{}", head(200, "text/event-stream", 100_000), prefix).as_bytes())
                .await;
            let _ = sock.flush().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Reply::Stall(prefix) => {
            let _ = sock
                .write_all(format!("{}{}", head(200, "text/event-stream", 100_000), prefix).as_bytes())
                .await;
            let _ = sock.flush().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Reply::Hang => {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    }
    let _ = sock.shutdown().await;
}

/// One event-stream line carrying a flat delta.
pub fn delta_line(text: &str) -> String {
    format!("data: {}\n\n", serde_json::json!({ "delta": text }))
}
