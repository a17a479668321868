use crate::app::App;
use crate::constants::protocol::{PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};
use crate::errors::{ErrorCode, McpError};
use crate::mcp::envelope::{tool_failure, tool_success};
use crate::mcp::protocol::{parse_request, request_key, JsonRpcRequest, JsonRpcResponse};
use crate::services::logger::Logger;
use crate::services::tool_registry::ToolRegistry;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinError, JoinHandle};

enum Routed {
    Reply(Option<JsonRpcResponse>),
    Call { id: Value, name: String, args: Value },
}

/// Tool calls running on one stdio connection, keyed by request id.
///
/// Each entry carries a sequence number so a finished or cancelled call only
/// ever removes its own entry, even after the id has been reused.
#[derive(Clone, Default)]
struct InflightCalls {
    next_seq: Arc<AtomicU64>,
    calls: Arc<Mutex<HashMap<String, (u64, AbortHandle)>>>,
}

impl InflightCalls {
    fn start<F>(&self, key: &str, spawn: F) -> Result<(u64, JoinHandle<Value>), McpError>
    where
        F: FnOnce() -> JoinHandle<Value>,
    {
        let mut calls = self.calls.lock().unwrap_or_else(|err| err.into_inner());
        if calls.contains_key(key) {
            return Err(McpError::new(
                ErrorCode::InvalidRequest,
                format!("Request id {} is already in flight", key),
            ));
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let handle = spawn();
        calls.insert(key.to_string(), (seq, handle.abort_handle()));
        Ok((seq, handle))
    }

    fn cancel(&self, key: &str) -> bool {
        let entry = self
            .calls
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .remove(key);
        match entry {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn finish(&self, key: &str, seq: u64) {
        let mut calls = self.calls.lock().unwrap_or_else(|err| err.into_inner());
        if matches!(calls.get(key), Some((current, _)) if *current == seq) {
            calls.remove(key);
        }
    }
}

/// Aborts the tool task when the awaiting request future is dropped.
struct AbortOnDrop(JoinHandle<Value>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// MCP method dispatch shared by the stdio and HTTP transports.
#[derive(Clone)]
pub struct McpServer {
    logger: Logger,
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(app: &App) -> Self {
        Self::from_registry(app.logger.clone(), app.registry.clone())
    }

    pub fn from_registry(logger: Logger, registry: Arc<ToolRegistry>) -> Self {
        Self {
            logger: logger.child("mcp"),
            registry,
        }
    }

    fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
        })
    }

    fn handle_tools_list(&self) -> Value {
        serde_json::json!({ "tools": self.registry.list() })
    }

    /// Runs one tool and wraps the outcome as a `tools/call` result.
    pub async fn call_tool(&self, name: &str, args: Value) -> Value {
        match self.registry.invoke(name, args).await {
            Ok(result) => tool_success(&result),
            Err(err) => tool_failure(&err),
        }
    }

    fn tool_call_params(params: &Value) -> Result<(String, Value), McpError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        if name.is_empty() {
            return Err(McpError::invalid_params("Missing tool name"));
        }
        let args = params.get("arguments").cloned().unwrap_or(Value::Null);
        Ok((name.to_string(), args))
    }

    /// `inflight` is `None` on HTTP, where every request stands alone and
    /// cancellation happens by dropping the request.
    fn route(&self, request: JsonRpcRequest, inflight: Option<&InflightCalls>) -> Routed {
        let Some(id) = request.id.clone() else {
            if request.method == "notifications/cancelled" {
                if let Some(inflight) = inflight {
                    self.cancel(inflight, &request.params);
                }
            }
            return Routed::Reply(None);
        };
        let reply = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.handle_initialize()),
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "tools/list" => JsonRpcResponse::success(id, self.handle_tools_list()),
            "tools/call" => match Self::tool_call_params(&request.params) {
                Ok((name, args)) => return Routed::Call { id, name, args },
                Err(err) => JsonRpcResponse::failure(id, err),
            },
            method if method.starts_with("notifications/") => {
                JsonRpcResponse::success(id, serde_json::json!({}))
            }
            method => JsonRpcResponse::failure(
                id,
                McpError::new(ErrorCode::MethodNotFound, format!("Method not found: {}", method)),
            ),
        };
        Routed::Reply(Some(reply))
    }

    fn cancel(&self, inflight: &InflightCalls, params: &Value) {
        let Some(request_id) = params.get("requestId") else {
            return;
        };
        if inflight.cancel(&request_key(request_id)) {
            self.logger.info(
                "tool call cancelled",
                Some(&serde_json::json!({
                    "request_id": request_id,
                    "reason": params.get("reason"),
                })),
            );
        }
    }

    /// Starts a tool call on its own task so panics and cancellation stay contained.
    fn spawn_tool(&self, name: String, args: Value) -> JoinHandle<Value> {
        let server = self.clone();
        tokio::spawn(async move { server.call_tool(&name, args).await })
    }

    fn call_outcome(&self, id: Value, outcome: Result<Value, JoinError>) -> Option<JsonRpcResponse> {
        match outcome {
            Ok(result) => Some(JsonRpcResponse::success(id, result)),
            // Cancelled requests get no response.
            Err(err) if err.is_cancelled() => None,
            Err(err) => {
                self.logger.error(
                    "tool task panicked",
                    Some(&serde_json::json!({ "request_id": id, "error": err.to_string() })),
                );
                Some(JsonRpcResponse::failure(
                    id,
                    McpError::internal("Internal error: tool call panicked"),
                ))
            }
        }
    }

    /// Handles one message to completion. Used by the HTTP transport.
    ///
    /// Dropping the returned future aborts a running tool call.
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let request = match parse_request(raw) {
            Ok(request) => request,
            Err(response) => return Some(response),
        };
        match self.route(request, None) {
            Routed::Reply(reply) => reply,
            Routed::Call { id, name, args } => {
                let mut task = AbortOnDrop(self.spawn_tool(name, args));
                let outcome = (&mut task.0).await;
                self.call_outcome(id, outcome)
            }
        }
    }

    /// Newline-delimited JSON-RPC over any reader/writer pair.
    ///
    /// Each `tools/call` runs on its own task; responses are written in
    /// completion order by a single writer task. Returns after the input ends
    /// and every in-flight call has answered.
    pub async fn serve_lines<R, W>(&self, reader: R, writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let inflight = InflightCalls::default();
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(async move {
            let mut writer = BufWriter::new(writer);
            while let Some(response) = rx.recv().await {
                let mut payload = match serde_json::to_string(&response) {
                    Ok(payload) => payload,
                    Err(_) => continue,
                };
                payload.push('\n');
                writer.write_all(payload.as_bytes()).await?;
                writer.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let mut lines = reader.lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|err| McpError::internal(format!("failed to read input: {}", err)))?
        {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let request = match parse_request(trimmed) {
                Ok(request) => request,
                Err(response) => {
                    let _ = tx.send(response);
                    continue;
                }
            };
            match self.route(request, Some(&inflight)) {
                Routed::Reply(Some(response)) => {
                    let _ = tx.send(response);
                }
                Routed::Reply(None) => {}
                Routed::Call { id, name, args } => {
                    let key = request_key(&id);
                    match inflight.start(&key, || self.spawn_tool(name, args)) {
                        Ok((seq, handle)) => {
                            let server = self.clone();
                            let inflight = inflight.clone();
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                let outcome = handle.await;
                                inflight.finish(&key, seq);
                                if let Some(response) = server.call_outcome(id, outcome) {
                                    let _ = tx.send(response);
                                }
                            });
                        }
                        Err(err) => {
                            let _ = tx.send(JsonRpcResponse::failure(id, err));
                        }
                    }
                }
            }
        }
        drop(tx);

        writer_task
            .await
            .map_err(|err| McpError::internal(format!("writer task failed: {}", err)))?
            .map_err(|err| McpError::internal(format!("failed to write output: {}", err)))
    }

    pub async fn run_stdio(&self) -> Result<(), McpError> {
        self.logger.info("serving MCP over stdio", None);
        self.serve_lines(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }
}
