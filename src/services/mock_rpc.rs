//! Local JSON-RPC server for tests
//!
//! Serves one request per connection on 127.0.0.1 and records every request
//! body so tests can assert on methods and params.

use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

type Handler = dyn Fn(&Value) -> (u16, Value) + Send + Sync;

pub(crate) struct MockRpc {
    pub url: String,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl MockRpc {
    /// Start serving. `handler` maps a request body to (HTTP status, response body).
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Value) -> (u16, Value) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let recorded = requests.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let handler = handler.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let _ = serve(socket, handler, recorded).await;
                });
            }
        });

        Self { url, requests }
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

/// JSON-RPC success body echoing the request id
pub(crate) fn result(request: &Value, result: Value) -> (u16, Value) {
    let body = serde_json::json!({ "jsonrpc": "2.0", "id": request["id"], "result": result });
    (200, body)
}

/// JSON-RPC error body echoing the request id
pub(crate) fn rpc_error(request: &Value, code: i64, message: &str) -> (u16, Value) {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": request["id"],
        "error": { "code": code, "message": message },
    });
    (200, body)
}

async fn serve(
    mut socket: TcpStream,
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<Value>>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let end = buf.len().min(header_end + length);
    let request: Value = serde_json::from_slice(&buf[header_end..end]).unwrap_or(Value::Null);
    requests.lock().unwrap().push(request.clone());

    let (status, body) = handler(&request);
    let body = body.to_string();
    let response = format!(
        "HTTP/1.1 {} Mock\r\ncontent-type: application/json\r\n\
         content-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}
