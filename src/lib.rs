//! Streaming orchestrator for conversational tool use.
//!
//! Sits between chat clients and OpenAI-compatible model endpoints,
//! brokering tool sessions: it provisions and reuses tool provider
//! transports, runs the two-pass tool-call loop per turn, and
//! multiplexes everything the client needs to render as a single SSE
//! stream.

pub mod api;
pub mod client;
pub mod config;
pub mod handlers;
pub mod llm;
pub mod mcp;
pub mod server;
pub mod session;
pub mod sse_decode;
pub mod turn;
