//! Tool-provider integration: connect descriptors, catalog types, live
//! transports, and the process-local transport registry.

mod client;
mod registry;

pub use client::{
    connect, Connection, HttpToolTransport, ProviderConnector, StdioToolTransport, ToolConnector,
    ToolTransport,
};
pub use registry::TransportRegistry;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::{FunctionDefinition, ToolDefinition};

// ============================================================================
// Connect Descriptors
// ============================================================================

/// Provider-specific connection parameters.
///
/// URL-style descriptors use a stateless handshake and support reconnecting
/// from stored parameters after the owning process restarts. Command-style
/// descriptors spawn a child process whose lifetime is bound to this
/// process, so they are never reconnectable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ConnectParams {
    Url {
        url: String,
    },
    Command {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl ConnectParams {
    /// Whether a fresh transport can be re-established from these
    /// parameters alone.
    #[must_use]
    pub fn reconnectable(&self) -> bool {
        matches!(self, Self::Url { .. })
    }

    /// Reject descriptors missing required fields before any upstream call.
    pub fn validate(&self) -> Result<(), ProviderError> {
        match self {
            Self::Url { url } if url.trim().is_empty() => {
                Err(ProviderError::InvalidParams("url must not be empty".into()))
            }
            Self::Command { command, .. } if command.trim().is_empty() => Err(
                ProviderError::InvalidParams("command must not be empty".into()),
            ),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Tool Catalog
// ============================================================================

/// One entry of the tool catalog returned by the provider at connect time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the tool's input.
    #[serde(default)]
    pub input_schema: Option<serde_json::Value>,
}

impl ToolSpec {
    /// Build the provider-facing tool schema for the model API.
    ///
    /// A catalog cached in the durable session record round-trips through
    /// this without re-contacting the provider.
    #[must_use]
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name.clone(),
                description: self.description.clone(),
                parameters: self.input_schema.clone(),
            },
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors from tool-provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection parameters are missing required fields.
    #[error("invalid connection parameters: {0}")]
    InvalidParams(String),

    /// Connect or reconnect failed.
    #[error("failed to connect to tool provider: {0}")]
    Connect(String),

    /// HTTP transport failure.
    #[error("tool provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Child process transport failure.
    #[error("tool provider process error: {0}")]
    Process(String),

    /// The provider reported an error for a tool invocation.
    #[error("tool invocation failed: {0}")]
    Invocation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_params_parse_from_json() {
        let params: ConnectParams =
            serde_json::from_value(json!({"url": "https://tools.example/mcp"})).unwrap();
        assert!(params.reconnectable());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn command_params_parse_from_json() {
        let params: ConnectParams =
            serde_json::from_value(json!({"command": "mcp-server", "args": ["--stdio"]})).unwrap();
        assert!(!params.reconnectable());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn empty_url_rejected() {
        let params = ConnectParams::Url { url: "  ".into() };
        assert!(matches!(
            params.validate(),
            Err(ProviderError::InvalidParams(_))
        ));
    }

    #[test]
    fn empty_command_rejected() {
        let params = ConnectParams::Command {
            command: String::new(),
            args: vec![],
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn tool_spec_round_trips_to_definition() {
        let spec = ToolSpec {
            name: "search_x".into(),
            description: "Search".into(),
            input_schema: Some(json!({"type": "object"})),
        };
        let serialized = serde_json::to_string(&spec).unwrap();
        let reread: ToolSpec = serde_json::from_str(&serialized).unwrap();
        let def = reread.to_definition();
        assert_eq!(def.function.name, "search_x");
        assert_eq!(def.function.parameters, Some(json!({"type": "object"})));
    }
}
