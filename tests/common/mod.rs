//! Common test utilities: scripted model providers, tool transports and
//! a fully wired test app.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use futures::StreamExt;
use serde_json::{json, Value};

use reqflow::config::ModelConfig;
use reqflow::llm::{
    ChatRequest, ChatResponse, LlmError, ModelProvider, ModelRegistry, ModelStream, StreamEvent,
};
use reqflow::mcp::{
    ConnectParams, Connection, ProviderError, ToolConnector, ToolSpec, ToolTransport,
    TransportRegistry,
};
use reqflow::server::{build_app, AppState};
use reqflow::session::{FileSessionStore, SessionResolver, SessionStore};

pub const MOCK_MODEL: &str = "mock-model";
pub const MOCK_BASE_URL: &str = "http://mock.invalid/v1";

// ============================================================================
// Scripted Model Provider
// ============================================================================

/// A model provider that replays scripted responses and records every
/// request it sees.
#[derive(Default)]
pub struct ScriptedProvider {
    streams: Mutex<VecDeque<Vec<Result<StreamEvent, LlmError>>>>,
    chats: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_stream(&self, events: Vec<Result<StreamEvent, LlmError>>) {
        self.streams.lock().unwrap().push_back(events);
    }

    pub fn push_chat(&self, response: Result<ChatResponse, LlmError>) {
        self.chats.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        self.chats.lock().unwrap().pop_front().unwrap_or(Err(LlmError::Api {
            status: 500,
            message: "no scripted chat response".to_string(),
        }))
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ModelStream, LlmError> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![Ok(StreamEvent::Done)]);
        Ok(futures::stream::iter(script).boxed())
    }
}

/// Build a non-streaming response from content and a tool-call list.
pub fn chat_response(content: Option<&str>, tool_calls: Value) -> ChatResponse {
    serde_json::from_value(json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": content,
                "tool_calls": if tool_calls.as_array().is_some_and(|a| a.is_empty()) {
                    Value::Null
                } else {
                    tool_calls
                },
            },
            "finish_reason": "stop",
        }]
    }))
    .unwrap()
}

pub fn wire_tool_call(id: &str, name: &str, arguments: &str) -> Value {
    json!({
        "id": id,
        "type": "function",
        "function": {"name": name, "arguments": arguments},
    })
}

// ============================================================================
// Scripted Tool Transport
// ============================================================================

/// A tool transport that replays scripted results and records every
/// invocation.
pub struct ScriptedTransport {
    id: String,
    results: Mutex<VecDeque<Result<Value, ProviderError>>>,
    invocations: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            results: Mutex::new(VecDeque::new()),
            invocations: Mutex::new(Vec::new()),
        })
    }

    pub fn push_result(&self, result: Result<Value, ProviderError>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolTransport for ScriptedTransport {
    fn transport_id(&self) -> &str {
        &self.id
    }

    async fn invoke(&self, name: &str, arguments: &Value) -> Result<Value, ProviderError> {
        self.invocations
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({"content": "ok"})))
    }
}

// ============================================================================
// Scripted Connector
// ============================================================================

/// A connector that replays scripted connect outcomes.
#[derive(Default)]
pub struct ScriptedConnector {
    outcomes: Mutex<VecDeque<Result<Connection, ProviderError>>>,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_outcome(&self, outcome: Result<Connection, ProviderError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }
}

#[async_trait]
impl ToolConnector for ScriptedConnector {
    async fn connect(&self, _params: &ConnectParams) -> Result<Connection, ProviderError> {
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Connect("no scripted outcome".to_string())))
    }
}

pub fn tool_spec(name: &str) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: format!("{name} test tool"),
        input_schema: None,
    }
}

pub fn connection(transport: Arc<ScriptedTransport>, tools: &[&str]) -> Connection {
    Connection {
        transport,
        tools: tools.iter().map(|n| tool_spec(n)).collect(),
    }
}

// ============================================================================
// Test App
// ============================================================================

pub struct TestHarness {
    pub app: Router,
    pub provider: Arc<ScriptedProvider>,
    pub connector: Arc<ScriptedConnector>,
    pub store: Arc<dyn SessionStore>,
    pub transports: TransportRegistry,
}

/// Build a fully wired app around scripted collaborators.
pub fn test_harness() -> TestHarness {
    use tempfile::TempDir;

    let tmp = TempDir::new().unwrap();
    // Leak the TempDir so it doesn't get cleaned up during the test.
    let tmp = Box::leak(Box::new(tmp));
    let sessions_path = tmp.path().join("sessions");

    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(
        &sessions_path,
        Duration::from_secs(3600),
    ));
    let transports = TransportRegistry::new();
    let connector = ScriptedConnector::new();
    let resolver = SessionResolver::new(store.clone(), transports.clone(), connector.clone(), 2);

    let provider = ScriptedProvider::new();
    let models = ModelRegistry::new(vec![ModelConfig {
        name: MOCK_MODEL.to_string(),
        base_url: MOCK_BASE_URL.to_string(),
        api_key: None,
        temperature: None,
    }]);
    models.seed(MOCK_BASE_URL, provider.clone());

    let state = AppState {
        store: store.clone(),
        resolver,
        models,
        keep_alive_interval_seconds: 15,
        turn_timeout_seconds: 30,
        max_connections: 16,
        max_body_bytes: 1024 * 1024,
    };

    TestHarness {
        app: build_app(state, 30),
        provider,
        connector,
        store,
        transports,
    }
}

// ============================================================================
// SSE Event Parsing Helper
// ============================================================================

/// Parse SSE events from a response body.
pub fn parse_sse_events(body: &str) -> Vec<(String, String)> {
    let mut events = Vec::new();
    let mut current_event = String::new();
    let mut current_data = String::new();

    for line in body.lines() {
        if let Some(event_name) = line.strip_prefix("event:") {
            current_event = event_name.trim().to_string();
        } else if let Some(data) = line.strip_prefix("data:") {
            current_data = data.trim().to_string();
        } else if line.is_empty() && !current_event.is_empty() {
            events.push((current_event.clone(), current_data.clone()));
            current_event.clear();
            current_data.clear();
        }
    }

    if !current_event.is_empty() {
        events.push((current_event, current_data));
    }

    events
}
