//! Tool-provider transports.
//!
//! A transport is the live, process-local connection to a tool provider.
//! The wire protocol is a narrow JSON request/response pair: an
//! `initialize` call returning `{transport_id, tools}` and a `tools/call`
//! returning an arbitrarily-shaped result. URL-style transports speak it
//! over HTTP POST; command-style transports speak line-delimited JSON over
//! the child process's stdio.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::debug;
use ulid::Ulid;

use super::{ConnectParams, ProviderError, ToolSpec};

/// A live connection to a tool provider.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Provider-assigned transport identifier.
    fn transport_id(&self) -> &str;

    /// Invoke a tool by name. The result shape is provider-defined.
    async fn invoke(&self, name: &str, arguments: &Value) -> Result<Value, ProviderError>;
}

/// Result of a successful connect: the live transport plus the tool
/// catalog captured during the handshake.
pub struct Connection {
    pub transport: Arc<dyn ToolTransport>,
    pub tools: Vec<ToolSpec>,
}

/// Connect (or reconnect) using the given descriptor.
pub async fn connect(
    params: &ConnectParams,
    client: &reqwest::Client,
) -> Result<Connection, ProviderError> {
    params.validate()?;

    match params {
        ConnectParams::Url { url } => HttpToolTransport::connect(client.clone(), url).await,
        ConnectParams::Command { command, args } => {
            StdioToolTransport::connect(command, args).await
        }
    }
}

/// Seam for establishing transports, so the resolver can be exercised
/// against an in-memory provider in tests.
#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> Result<Connection, ProviderError>;
}

/// The production connector.
#[derive(Clone, Default)]
pub struct ProviderConnector {
    client: reqwest::Client,
}

impl ProviderConnector {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolConnector for ProviderConnector {
    async fn connect(&self, params: &ConnectParams) -> Result<Connection, ProviderError> {
        connect(params, &self.client).await
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Deserialize)]
struct InitializeResponse {
    transport_id: String,
    #[serde(default)]
    tools: Vec<ToolSpec>,
}

#[derive(Deserialize)]
struct CallResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Deserialize)]
struct WireError {
    message: String,
}

fn unwrap_call(response: CallResponse) -> Result<Value, ProviderError> {
    if let Some(err) = response.error {
        return Err(ProviderError::Invocation(err.message));
    }
    Ok(response.result.unwrap_or(Value::Null))
}

// ============================================================================
// HTTP Transport
// ============================================================================

/// URL-style transport with a stateless handshake; supports reconnect.
pub struct HttpToolTransport {
    client: reqwest::Client,
    url: String,
    transport_id: String,
}

impl HttpToolTransport {
    async fn connect(client: reqwest::Client, url: &str) -> Result<Connection, ProviderError> {
        let response = client
            .post(url)
            .json(&json!({"method": "initialize"}))
            .send()
            .await
            .map_err(|e| ProviderError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Connect(format!(
                "initialize returned status {}",
                response.status()
            )));
        }

        let init: InitializeResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Connect(e.to_string()))?;

        debug!(url = %url, transport_id = %init.transport_id, tools = init.tools.len(), "connected to tool provider");

        Ok(Connection {
            transport: Arc::new(Self {
                client,
                url: url.to_string(),
                transport_id: init.transport_id,
            }),
            tools: init.tools,
        })
    }
}

#[async_trait]
impl ToolTransport for HttpToolTransport {
    fn transport_id(&self) -> &str {
        &self.transport_id
    }

    async fn invoke(&self, name: &str, arguments: &Value) -> Result<Value, ProviderError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({
                "method": "tools/call",
                "transport_id": self.transport_id,
                "params": {"name": name, "arguments": arguments},
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Invocation(format!(
                "tools/call returned status {}",
                response.status()
            )));
        }

        unwrap_call(response.json().await?)
    }
}

// ============================================================================
// Stdio Transport
// ============================================================================

/// Command-style transport over a spawned child process. Not
/// reconnectable: the provider's side state dies with the child.
pub struct StdioToolTransport {
    transport_id: String,
    // One request in flight at a time; the child reads line-by-line.
    io: Mutex<StdioPipes>,
    _child: Child,
}

struct StdioPipes {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StdioToolTransport {
    async fn connect(command: &str, args: &[String]) -> Result<Connection, ProviderError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProviderError::Connect(format!("failed to spawn '{command}': {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::Process("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::Process("child stdout unavailable".into()))?;

        let mut pipes = StdioPipes {
            stdin,
            stdout: BufReader::new(stdout),
        };

        let init: InitializeResponse =
            Self::round_trip(&mut pipes, &json!({"method": "initialize"})).await?;

        // Some stdio providers assign no id; give the handle a local one.
        let transport_id = if init.transport_id.is_empty() {
            Ulid::new().to_string()
        } else {
            init.transport_id
        };

        debug!(command = %command, transport_id = %transport_id, tools = init.tools.len(), "spawned tool provider");

        Ok(Connection {
            transport: Arc::new(Self {
                transport_id,
                io: Mutex::new(pipes),
                _child: child,
            }),
            tools: init.tools,
        })
    }

    async fn round_trip<T: serde::de::DeserializeOwned>(
        pipes: &mut StdioPipes,
        request: &Value,
    ) -> Result<T, ProviderError> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| ProviderError::Process(e.to_string()))?;
        line.push('\n');

        pipes
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ProviderError::Process(e.to_string()))?;
        pipes
            .stdin
            .flush()
            .await
            .map_err(|e| ProviderError::Process(e.to_string()))?;

        let mut response = String::new();
        let n = pipes
            .stdout
            .read_line(&mut response)
            .await
            .map_err(|e| ProviderError::Process(e.to_string()))?;
        if n == 0 {
            return Err(ProviderError::Process("child closed stdout".into()));
        }

        serde_json::from_str(response.trim())
            .map_err(|e| ProviderError::Process(format!("malformed response: {e}")))
    }
}

#[async_trait]
impl ToolTransport for StdioToolTransport {
    fn transport_id(&self) -> &str {
        &self.transport_id
    }

    async fn invoke(&self, name: &str, arguments: &Value) -> Result<Value, ProviderError> {
        let mut io = self.io.lock().await;
        let response: CallResponse = Self::round_trip(
            &mut io,
            &json!({
                "method": "tools/call",
                "params": {"name": name, "arguments": arguments},
            }),
        )
        .await?;
        unwrap_call(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_response_unwraps_result() {
        let response: CallResponse =
            serde_json::from_str(r#"{"result": {"content": "ok"}}"#).unwrap();
        let value = unwrap_call(response).unwrap();
        assert_eq!(value["content"], "ok");
    }

    #[test]
    fn call_response_surfaces_error() {
        let response: CallResponse =
            serde_json::from_str(r#"{"error": {"message": "boom"}}"#).unwrap();
        assert!(matches!(
            unwrap_call(response),
            Err(ProviderError::Invocation(m)) if m == "boom"
        ));
    }

    #[test]
    fn missing_result_becomes_null() {
        let response: CallResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(unwrap_call(response).unwrap(), Value::Null);
    }
}
